//! Profile vectorizer: one embedding per user.

use std::sync::Arc;

use tracing::{debug, instrument};

use karbin_core::similarity::l2_normalize;
use karbin_core::text::profile_text;
use karbin_core::{EmbeddingBackend, Error, Result, UserId, UserProfile, UserStore};

/// A user's profile together with the text that represents it.
#[derive(Debug, Clone)]
pub struct ProfileText {
    pub profile: UserProfile,
    pub text: String,
}

/// Builds user vectors in the same embedding space as job vectors.
pub struct ProfileVectorizer {
    users: Arc<dyn UserStore>,
    embedder: Arc<dyn EmbeddingBackend>,
}

impl ProfileVectorizer {
    pub fn new(users: Arc<dyn UserStore>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self { users, embedder }
    }

    /// Load the profile and compose its text. `None` means the profile has
    /// no title, skills, or experience to embed.
    pub async fn profile_text(&self, user_id: UserId) -> Result<Option<ProfileText>> {
        let profile = self.users.profile(user_id).await?;
        Ok(profile_text(&profile).map(|text| ProfileText { profile, text }))
    }

    /// Embed composed profile text into a unit vector.
    pub async fn embed(&self, profile: &ProfileText) -> Result<Vec<f32>> {
        let mut vectors = self
            .embedder
            .embed_texts(std::slice::from_ref(&profile.text))
            .await?;

        let mut vector = match vectors.pop() {
            Some(v) if vectors.is_empty() => v,
            _ => {
                return Err(Error::Embedding(
                    "expected exactly one vector for profile text".to_string(),
                ))
            }
        };

        if !l2_normalize(&mut vector) {
            return Err(Error::Embedding(format!(
                "profile of user {} embedded to a zero vector",
                profile.profile.user_id
            )));
        }
        Ok(vector)
    }

    /// The user's vector, or `None` for a profile too sparse to embed.
    #[instrument(
        skip(self),
        fields(subsystem = "search", component = "vectorizer", op = "vectorize")
    )]
    pub async fn vectorize(&self, user_id: UserId) -> Result<Option<Vec<f32>>> {
        let Some(profile) = self.profile_text(user_id).await? else {
            debug!("Profile has no embeddable text");
            return Ok(None);
        };
        self.embed(&profile).await.map(Some)
    }
}
