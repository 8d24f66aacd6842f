//! In-memory stores and fixtures for pipeline tests.
//!
//! The stores evaluate [`CandidateFilter`] clauses in memory, so the whole
//! pipeline runs without PostgreSQL.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use karbin_core::candidate_filter::skill_overlap;
use karbin_core::text::{job_text, profile_text};
use karbin_core::{
    CandidateFilter, Error, Job, JobId, JobStore, JobSummary, RecommenderConfig, Result, UserId,
    UserPreferences, UserProfile, UserStore,
};
use karbin_inference::mock::MockEmbedder;
use karbin_search::{IndexState, RecommendationEngine, SnapshotBuilder};

pub const DIM: usize = 3;

/// A recent, active, full-time job in Tehran.
pub fn job(id: JobId, title: &str, skills: &[&str]) -> Job {
    Job {
        id,
        title: title.to_string(),
        company: format!("Company {id}"),
        city: Some("Tehran".to_string()),
        province: Some("Tehran".to_string()),
        category_id: Some(1),
        category: Some("Engineering".to_string()),
        description: Some(format!("{title} role")),
        min_experience: None,
        is_full_time: true,
        is_part_time: false,
        is_remote: false,
        is_internship: false,
        is_active: true,
        posted_at: Utc::now() - Duration::days(1),
        source_link: Some(format!("https://jobs.example/{id}")),
        skills: skills.iter().map(|s| s.to_string()).collect(),
    }
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Vec<Job>,
    user_skills: HashMap<UserId, Vec<String>>,
    /// Jobs whose summaries have gone missing, as if deleted after filtering.
    no_summary: HashSet<JobId>,
    fail: bool,
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn candidate_ids(&self, filter: &CandidateFilter) -> Result<HashSet<JobId>> {
        if self.fail {
            return Err(Error::Internal("job store offline".to_string()));
        }
        let skills = filter
            .skill_user()
            .and_then(|u| self.user_skills.get(&u))
            .cloned()
            .unwrap_or_default();
        let now = Utc::now();
        Ok(self
            .jobs
            .iter()
            .filter(|j| filter.matches(j, &skills, now))
            .map(|j| j.id)
            .collect())
    }

    async fn summaries(&self, ids: &[JobId]) -> Result<Vec<JobSummary>> {
        let wanted: HashSet<JobId> = ids.iter().copied().collect();
        Ok(self
            .jobs
            .iter()
            .filter(|j| wanted.contains(&j.id) && !self.no_summary.contains(&j.id))
            .map(Job::summary)
            .collect())
    }

    async fn embeddable_jobs(&self, limit: Option<i64>) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.iter().filter(|j| j.is_active).cloned().collect();
        jobs.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(a.id.cmp(&b.id)));
        if let Some(limit) = limit {
            jobs.truncate(limit.max(0) as usize);
        }
        Ok(jobs)
    }

    async fn skill_popularity(&self) -> Result<HashMap<JobId, u64>> {
        Ok(self
            .jobs
            .iter()
            .filter_map(|j| {
                let users = self
                    .user_skills
                    .values()
                    .filter(|skills| skill_overlap(&j.skills, skills) > 0)
                    .count() as u64;
                (users > 0).then_some((j.id, users))
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    prefs: HashMap<UserId, UserPreferences>,
    profiles: HashMap<UserId, UserProfile>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn preferences(&self, user_id: UserId) -> Result<Option<UserPreferences>> {
        Ok(self.prefs.get(&user_id).cloned())
    }

    async fn profile(&self, user_id: UserId) -> Result<UserProfile> {
        Ok(self
            .profiles
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserProfile::new(user_id)))
    }
}

/// Builder for a complete in-memory world: jobs, users, fixed vectors.
pub struct World {
    jobs: MemoryJobStore,
    users: MemoryUserStore,
    embedder: MockEmbedder,
    /// Jobs present in the store but embedded after the index was built.
    unindexed: HashSet<JobId>,
}

impl World {
    pub fn new() -> Self {
        Self {
            jobs: MemoryJobStore::default(),
            users: MemoryUserStore::default(),
            embedder: MockEmbedder::new().with_dimension(DIM),
            unindexed: HashSet::new(),
        }
    }

    /// Add a job whose embedding is `vector`.
    pub fn job(mut self, job: Job, vector: [f32; DIM]) -> Self {
        self.embedder = self.embedder.with_vector(job_text(&job), vector.to_vec());
        self.jobs.jobs.push(job);
        self
    }

    /// Add a job that exists in the store but not in the index.
    pub fn unindexed_job(mut self, job: Job) -> Self {
        self.unindexed.insert(job.id);
        self.jobs.jobs.push(job);
        self
    }

    /// Add a job that is filtered and ranked but has no summary.
    pub fn job_without_summary(mut self, job: Job, vector: [f32; DIM]) -> Self {
        self.jobs.no_summary.insert(job.id);
        self.job(job, vector)
    }

    /// Add a user with a profile row, whose profile embeds to `vector`.
    pub fn user(mut self, prefs: UserPreferences, profile: UserProfile, vector: [f32; DIM]) -> Self {
        if let Some(text) = profile_text(&profile) {
            self.embedder = self.embedder.with_vector(text, vector.to_vec());
        }
        self.jobs
            .user_skills
            .insert(profile.user_id, profile.skills.clone());
        self.users.prefs.insert(profile.user_id, prefs);
        self.users.profiles.insert(profile.user_id, profile);
        self
    }

    /// Add a user with profile data but no preferences row.
    pub fn user_without_row(mut self, profile: UserProfile) -> Self {
        self.users.profiles.insert(profile.user_id, profile);
        self
    }

    /// Make embedding fail for this user's profile text.
    pub fn failing_profile(mut self, profile: &UserProfile) -> Self {
        if let Some(text) = profile_text(profile) {
            self.embedder = self.embedder.failing_on(text);
        }
        self
    }

    pub fn failing_job_store(mut self) -> Self {
        self.jobs.fail = true;
        self
    }

    pub fn embedder(&self) -> MockEmbedder {
        self.embedder.clone()
    }

    /// Build the index from the store and return a ready engine.
    pub async fn engine(self, config: RecommenderConfig) -> RecommendationEngine {
        let state = self.index_state().await;
        self.engine_with_state(config, state)
    }

    pub async fn index_state(&self) -> IndexState {
        let indexed = MemoryJobStore {
            jobs: self
                .jobs
                .jobs
                .iter()
                .filter(|j| !self.unindexed.contains(&j.id))
                .cloned()
                .collect(),
            ..Default::default()
        };
        let snapshot = SnapshotBuilder::new(Arc::new(indexed), Arc::new(self.embedder.clone()))
            .build(None)
            .await
            .expect("snapshot builds");
        IndexState::Ready(Arc::new(snapshot.into_index().expect("index builds")))
    }

    pub fn engine_with_state(self, config: RecommenderConfig, state: IndexState) -> RecommendationEngine {
        RecommendationEngine::new(
            Arc::new(self.jobs),
            Arc::new(self.users),
            Arc::new(self.embedder),
            config,
        )
        .with_index_state(state)
    }
}

/// Preferences that add no clause beyond the base filter and skill gate.
pub fn open_prefs() -> UserPreferences {
    UserPreferences::default()
}
