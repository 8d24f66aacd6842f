//! Embedding text composition for users and jobs.
//!
//! Both sides are written in the same "label: value" sentence style so that
//! cosine similarity between a user vector and a job vector is meaningful.

use crate::models::{Job, UserProfile};

/// Build the embedding text for a user profile.
///
/// Layout: `"{title}. Skills include: {a, b}. Past work experience: {...}"`,
/// skipping any part that is empty. Returns `None` when nothing is left,
/// which callers treat as an incomplete profile.
pub fn profile_text(profile: &UserProfile) -> Option<String> {
    let mut parts: Vec<String> = Vec::with_capacity(3);

    if let Some(title) = profile.title.as_deref().map(str::trim) {
        if !title.is_empty() {
            parts.push(title.to_string());
        }
    }

    let skills = join_non_empty(&profile.skills, ", ");
    if !skills.is_empty() {
        parts.push(format!("Skills include: {skills}"));
    }

    let experience = join_non_empty(&profile.experience, " ");
    if !experience.is_empty() {
        parts.push(format!("Past work experience: {experience}"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(". "))
    }
}

/// Build the embedding text for a job posting.
///
/// Layout: `"{title}. {category} in {city}. Skills: {skills}. Description: {description}"`.
/// Missing fields render as empty strings so every job has the same shape.
pub fn job_text(job: &Job) -> String {
    format!(
        "{}. {} in {}. Skills: {}. Description: {}",
        job.title.trim(),
        job.category.as_deref().unwrap_or("").trim(),
        job.city.as_deref().unwrap_or("").trim(),
        join_non_empty(&job.skills, ", "),
        job.description.as_deref().unwrap_or("").trim(),
    )
}

/// Text describing a job to the pairwise re-ranker.
pub fn job_pair_text(title: &str, company: &str, skills: &[String]) -> String {
    let skills = join_non_empty(skills, ", ");
    if skills.is_empty() {
        format!("{} at {}", title.trim(), company.trim())
    } else {
        format!("{} at {}. Skills: {}", title.trim(), company.trim(), skills)
    }
}

fn join_non_empty(items: &[String], sep: &str) -> String {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_profile_text_all_parts() {
        let profile = UserProfile::new(1)
            .with_title("Senior Python Developer")
            .with_skills(["Python", "Django"])
            .with_experience("Built REST APIs")
            .with_experience("Maintained Celery workers");

        assert_eq!(
            profile_text(&profile).unwrap(),
            "Senior Python Developer. Skills include: Python, Django. \
             Past work experience: Built REST APIs Maintained Celery workers"
        );
    }

    #[test]
    fn test_profile_text_skips_empty_parts() {
        let profile = UserProfile::new(1).with_skills(["", "SQL"]);
        assert_eq!(profile_text(&profile).unwrap(), "Skills include: SQL");
    }

    #[test]
    fn test_profile_text_sparse_profile_is_none() {
        assert!(profile_text(&UserProfile::new(1)).is_none());

        let blank = UserProfile::new(1)
            .with_title("   ")
            .with_skills([""])
            .with_experience("");
        assert!(profile_text(&blank).is_none());
    }

    #[test]
    fn test_job_text_handles_missing_fields() {
        let job = Job {
            id: 1,
            title: "Backend Developer".into(),
            company: "Snapp".into(),
            city: Some("Isfahan".into()),
            province: None,
            category_id: None,
            category: None,
            description: None,
            min_experience: None,
            is_full_time: true,
            is_part_time: false,
            is_remote: true,
            is_internship: false,
            is_active: true,
            posted_at: Utc::now(),
            source_link: None,
            skills: vec!["Go".into(), "Kafka".into()],
        };

        assert_eq!(
            job_text(&job),
            "Backend Developer.  in Isfahan. Skills: Go, Kafka. Description: "
        );
    }

    #[test]
    fn test_job_pair_text() {
        assert_eq!(job_pair_text("QA", "Tapsi", &[]), "QA at Tapsi");
        assert_eq!(
            job_pair_text("QA", "Tapsi", &["Selenium".to_string()]),
            "QA at Tapsi. Skills: Selenium"
        );
    }
}
