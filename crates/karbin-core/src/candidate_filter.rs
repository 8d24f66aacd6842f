//! Typed hard-filter model for candidate generation.
//!
//! A [`CandidateFilter`] is an ordered list of [`FilterClause`]s combined
//! conjunctively. Stores render the clauses into their own query language
//! (see the SQL builder in `karbin-db`); [`CandidateFilter::matches`]
//! evaluates the same clauses against an in-memory [`Job`].
//!
//! # Example
//!
//! ```
//! use karbin_core::{CandidateFilter, FilterClause, RecommenderConfig, UserPreferences};
//!
//! let prefs = UserPreferences {
//!     wants_full_time: true,
//!     wants_remote: true,
//!     wants_onsite: true,
//!     ..Default::default()
//! };
//! let filter = CandidateFilter::for_user(1, &prefs, &RecommenderConfig::default());
//!
//! // Full-time only is exclusive, remote + onsite is not.
//! assert!(filter.clauses().contains(&FilterClause::FullTime));
//! assert!(!filter.clauses().iter().any(|c| matches!(c, FilterClause::Remote { .. })));
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RecommenderConfig;
use crate::models::{Job, UserId, UserPreferences};

/// One boolean eligibility constraint on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "clause", rename_all = "snake_case")]
pub enum FilterClause {
    /// Job is marked active.
    Active,
    /// Job was posted within the last `days` days.
    PostedWithin { days: u32 },
    /// At least `min` distinct skills shared with the user.
    MinSkillOverlap { user_id: UserId, min: u32 },
    /// Job belongs to the category.
    Category { category_id: i64 },
    /// Job province is one of the listed provinces.
    ProvinceIn { provinces: Vec<String> },
    /// Job asks for at most `level` years of experience.
    MaxExperience { level: i32 },
    FullTime,
    PartTime,
    /// `remote: true` keeps remote jobs, `false` keeps onsite jobs.
    Remote { remote: bool },
    Internship,
}

impl FilterClause {
    /// Short stable name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            FilterClause::Active => "active",
            FilterClause::PostedWithin { .. } => "posted_within",
            FilterClause::MinSkillOverlap { .. } => "min_skill_overlap",
            FilterClause::Category { .. } => "category",
            FilterClause::ProvinceIn { .. } => "province_in",
            FilterClause::MaxExperience { .. } => "max_experience",
            FilterClause::FullTime => "full_time",
            FilterClause::PartTime => "part_time",
            FilterClause::Remote { .. } => "remote",
            FilterClause::Internship => "internship",
        }
    }

    /// Evaluate this clause against a job.
    ///
    /// `user_skills` are the skill names of the user named by a
    /// `MinSkillOverlap` clause; comparison is case-insensitive.
    pub fn matches(&self, job: &Job, user_skills: &[String], now: DateTime<Utc>) -> bool {
        match self {
            FilterClause::Active => job.is_active,
            FilterClause::PostedWithin { days } => {
                job.posted_at >= now - Duration::days(i64::from(*days))
            }
            FilterClause::MinSkillOverlap { min, .. } => {
                skill_overlap(&job.skills, user_skills) >= *min as usize
            }
            FilterClause::Category { category_id } => job.category_id == Some(*category_id),
            FilterClause::ProvinceIn { provinces } => job
                .province
                .as_ref()
                .is_some_and(|p| provinces.iter().any(|wanted| wanted == p)),
            // A job without a stated floor asks for nothing.
            FilterClause::MaxExperience { level } => job.min_experience.unwrap_or(0) <= *level,
            FilterClause::FullTime => job.is_full_time,
            FilterClause::PartTime => job.is_part_time,
            FilterClause::Remote { remote } => job.is_remote == *remote,
            FilterClause::Internship => job.is_internship,
        }
    }
}

/// Number of distinct skills present in both lists (case-insensitive).
pub fn skill_overlap(job_skills: &[String], user_skills: &[String]) -> usize {
    let user: std::collections::HashSet<String> =
        user_skills.iter().map(|s| s.trim().to_lowercase()).collect();
    let job: std::collections::HashSet<String> =
        job_skills.iter().map(|s| s.trim().to_lowercase()).collect();
    job.intersection(&user).filter(|s| !s.is_empty()).count()
}

/// Conjunction of filter clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFilter {
    clauses: Vec<FilterClause>,
}

impl CandidateFilter {
    /// Create an empty filter (matches every job).
    pub fn new() -> Self {
        Self::default()
    }

    /// Base eligibility: active and posted within the recency window.
    pub fn base(recency_window_days: u32) -> Self {
        Self::new()
            .with(FilterClause::Active)
            .with(FilterClause::PostedWithin {
                days: recency_window_days,
            })
    }

    /// Derive the hard filters for a user from their preferences.
    ///
    /// Work-mode clauses are added only when the preference is exclusive:
    /// wanting both modes, or neither, leaves that dimension open. The
    /// internship flag is strict. A skill threshold of zero adds no clause.
    pub fn for_user(user_id: UserId, prefs: &UserPreferences, config: &RecommenderConfig) -> Self {
        let mut filter = Self::base(config.recency_window_days);

        if config.min_skill_overlap > 0 {
            filter.push(FilterClause::MinSkillOverlap {
                user_id,
                min: config.min_skill_overlap,
            });
        }

        if config.category_filter {
            if let Some(category_id) = prefs.preferred_category_id {
                filter.push(FilterClause::Category { category_id });
            }
        }

        if !prefs.preferred_provinces.is_empty() {
            filter.push(FilterClause::ProvinceIn {
                provinces: prefs.preferred_provinces.clone(),
            });
        }

        if let Some(level) = prefs.experience_level {
            filter.push(FilterClause::MaxExperience { level });
        }

        match (prefs.wants_full_time, prefs.wants_part_time) {
            (true, false) => filter.push(FilterClause::FullTime),
            (false, true) => filter.push(FilterClause::PartTime),
            _ => {}
        }

        match (prefs.wants_remote, prefs.wants_onsite) {
            (true, false) => filter.push(FilterClause::Remote { remote: true }),
            (false, true) => filter.push(FilterClause::Remote { remote: false }),
            _ => {}
        }

        if prefs.wants_internship {
            filter.push(FilterClause::Internship);
        }

        filter
    }

    /// Ground-truth relevance used by offline evaluation: eligible jobs that
    /// share at least `min_overlap` skills with the user, ignoring every
    /// other preference.
    pub fn skill_ground_truth(user_id: UserId, min_overlap: u32, recency_window_days: u32) -> Self {
        Self::base(recency_window_days).with(FilterClause::MinSkillOverlap {
            user_id,
            min: min_overlap.max(1),
        })
    }

    /// Add a clause (builder style).
    pub fn with(mut self, clause: FilterClause) -> Self {
        self.push(clause);
        self
    }

    /// Add a clause.
    pub fn push(&mut self, clause: FilterClause) {
        self.clauses.push(clause);
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// User whose skills the overlap clause compares against, if any.
    pub fn skill_user(&self) -> Option<UserId> {
        self.clauses.iter().find_map(|c| match c {
            FilterClause::MinSkillOverlap { user_id, .. } => Some(*user_id),
            _ => None,
        })
    }

    /// Evaluate every clause against `job`.
    pub fn matches(&self, job: &Job, user_skills: &[String], now: DateTime<Utc>) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.matches(job, user_skills, now))
    }

    /// Clause names, for logging.
    pub fn clause_names(&self) -> Vec<&'static str> {
        self.clauses.iter().map(FilterClause::name).collect()
    }
}
