//! Match explanations and display metadata for final results.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use karbin_core::{defaults, JobId, JobSummary, RecommendationResult};

use crate::rerank::RankedJob;

/// Job skills the user also has, compared case-insensitively, in job order
/// and without repeats.
pub fn matched_skills(job_skills: &[String], user_skills: &[String]) -> Vec<String> {
    let user: HashSet<String> = user_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut seen = HashSet::new();
    job_skills
        .iter()
        .filter(|skill| {
            let key = skill.trim().to_lowercase();
            user.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect()
}

/// Human-readable reason for a match.
pub fn match_reason(matched: &[String]) -> String {
    if matched.is_empty() {
        defaults::GENERIC_MATCH_REASON.to_string()
    } else {
        format!("Matches skills: {}", matched.join(", "))
    }
}

/// Join display metadata and reasons onto ranked jobs, keeping their order.
///
/// A job with no summary (deleted since filtering) is logged and skipped.
pub fn explain(
    ranked: &[RankedJob],
    summaries: &HashMap<JobId, JobSummary>,
    user_skills: &[String],
) -> Vec<RecommendationResult> {
    ranked
        .iter()
        .filter_map(|job| {
            let Some(summary) = summaries.get(&job.job_id) else {
                warn!(
                    subsystem = "search",
                    component = "explainer",
                    job_id = job.job_id,
                    "Ranked job has no display metadata, dropping"
                );
                return None;
            };

            let matched = matched_skills(&summary.skills, user_skills);
            Some(RecommendationResult {
                job_id: job.job_id,
                title: summary.title.clone(),
                company: summary.company.clone(),
                location: summary.location(),
                link: summary.source_link.clone(),
                score: job.score,
                reason: match_reason(&matched),
                matched_skills: matched,
                reranked: job.reranked,
            })
        })
        .collect()
}
