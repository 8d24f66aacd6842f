//! Typed records shared across the recommendation pipeline.
//!
//! Rows are converted into these at the storage boundary; nothing past the
//! store traits handles untyped column maps.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable job identifier (primary key of the job store).
pub type JobId = i64;

/// Stable user identifier.
pub type UserId = i64;

/// An active or inactive job posting as read from the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub company: String,
    pub city: Option<String>,
    pub province: Option<String>,
    pub category_id: Option<i64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub min_experience: Option<i32>,
    pub is_full_time: bool,
    pub is_part_time: bool,
    pub is_remote: bool,
    pub is_internship: bool,
    pub is_active: bool,
    pub posted_at: DateTime<Utc>,
    pub source_link: Option<String>,
    /// Required skill names, in store order.
    pub skills: Vec<String>,
}

impl Job {
    /// Display fields for this job.
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            title: self.title.clone(),
            company: self.company.clone(),
            city: self.city.clone(),
            province: self.province.clone(),
            source_link: self.source_link.clone(),
            skills: self.skills.clone(),
        }
    }
}

/// Minimal display metadata joined onto final results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub title: String,
    pub company: String,
    pub city: Option<String>,
    pub province: Option<String>,
    pub source_link: Option<String>,
    pub skills: Vec<String>,
}

impl JobSummary {
    /// "City, Province", skipping whichever part is missing.
    pub fn location(&self) -> String {
        [self.city.as_deref(), self.province.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Structured preferences that drive the hard filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub preferred_provinces: Vec<String>,
    pub wants_full_time: bool,
    pub wants_part_time: bool,
    pub wants_remote: bool,
    pub wants_onsite: bool,
    pub wants_internship: bool,
    /// Years of experience the user declares; jobs asking for more are excluded.
    pub experience_level: Option<i32>,
    pub preferred_category_id: Option<i64>,
}

impl UserPreferences {
    /// Parse the comma-separated province column into a clean list.
    pub fn parse_provinces(raw: Option<&str>) -> Vec<String> {
        raw.map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
    }
}

/// Free-text side of a user's profile, used to build the embedding text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub title: Option<String>,
    pub skills: Vec<String>,
    /// Work-experience descriptions, one per entry.
    pub experience: Vec<String>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_experience(mut self, description: impl Into<String>) -> Self {
        self.experience.push(description.into());
        self
    }
}

/// A (job, similarity) pair produced inside one ranking pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub job_id: JobId,
    pub score: f32,
}

impl ScoredCandidate {
    pub fn new(job_id: JobId, score: f32) -> Self {
        Self { job_id, score }
    }

    /// Ranking order: score descending, then job id ascending.
    pub fn rank_order(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.job_id.cmp(&other.job_id))
    }
}

/// Sort candidates into ranking order.
pub fn sort_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(ScoredCandidate::rank_order);
}

/// One entry of the final, ordered recommendation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub job_id: JobId,
    pub title: String,
    pub company: String,
    pub location: String,
    pub link: Option<String>,
    pub score: f32,
    pub reason: String,
    /// Skills shared by the user and the job, in job order.
    pub matched_skills: Vec<String>,
    /// Whether `score` came from the pairwise re-ranker.
    pub reranked: bool,
}

/// Outcome of a recommendation request that did not fail.
///
/// An empty `Results` means "no matches yet"; `IncompleteProfile` means the
/// user has nothing to embed. Callers present the two differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "results", rename_all = "snake_case")]
pub enum Recommendations {
    Results(Vec<RecommendationResult>),
    IncompleteProfile,
}

impl Recommendations {
    /// Results, or an empty slice for an incomplete profile.
    pub fn results(&self) -> &[RecommendationResult] {
        match self {
            Recommendations::Results(results) => results,
            Recommendations::IncompleteProfile => &[],
        }
    }

    pub fn is_incomplete_profile(&self) -> bool {
        matches!(self, Recommendations::IncompleteProfile)
    }
}
