//! Job store implementation.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};

use karbin_core::{CandidateFilter, Error, Job, JobId, JobStore, JobSummary, Result};

use crate::candidate_filter::{bind_params, CandidateFilterQueryBuilder};

/// PostgreSQL implementation of JobStore.
pub struct PgJobStore {
    pool: Pool<Postgres>,
}

impl PgJobStore {
    /// Create a new PgJobStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    #[instrument(
        skip(self, filter),
        fields(subsystem = "db", component = "job_store", op = "candidate_ids")
    )]
    async fn candidate_ids(&self, filter: &CandidateFilter) -> Result<HashSet<JobId>> {
        let start = Instant::now();
        let (sql, params) = CandidateFilterQueryBuilder::new(filter, 0).select_ids();

        let rows = bind_params(sqlx::query(&sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let ids: HashSet<JobId> = rows.iter().map(|row| row.get::<i64, _>("id")).collect();

        debug!(
            clauses = ?filter.clause_names(),
            candidate_count = ids.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Candidate filter executed"
        );
        Ok(ids)
    }

    async fn summaries(&self, ids: &[JobId]) -> Result<Vec<JobSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT jp.id, jp.title, COALESCE(c.name, '') AS company, jp.city, jp.province,
                    jp.source_link,
                    COALESCE(ARRAY_AGG(s.name ORDER BY s.name) FILTER (WHERE s.name IS NOT NULL),
                             ARRAY[]::text[]) AS skills
             FROM job_postings jp
             LEFT JOIN companies c ON c.id = jp.company_id
             LEFT JOIN job_skill js ON js.job_id = jp.id
             LEFT JOIN skills s ON s.id = js.skill_id
             WHERE jp.id = ANY($1)
             GROUP BY jp.id, c.name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| JobSummary {
                id: row.get("id"),
                title: row.get("title"),
                company: row.get("company"),
                city: row.get("city"),
                province: row.get("province"),
                source_link: row.get("source_link"),
                skills: row.get("skills"),
            })
            .collect())
    }

    #[instrument(
        skip(self),
        fields(subsystem = "db", component = "job_store", op = "embeddable_jobs")
    )]
    async fn embeddable_jobs(&self, limit: Option<i64>) -> Result<Vec<Job>> {
        // LIMIT NULL means no limit.
        let rows = sqlx::query(
            "SELECT jp.id, jp.title, COALESCE(c.name, '') AS company, jp.city, jp.province,
                    jp.category_id, cat.name AS category, jp.job_description,
                    jp.minimum_experience, jp.is_full_time, jp.is_part_time, jp.is_remote,
                    jp.is_internship, jp.is_active, jp.scraped_at, jp.source_link,
                    COALESCE(ARRAY_AGG(s.name ORDER BY s.name) FILTER (WHERE s.name IS NOT NULL),
                             ARRAY[]::text[]) AS skills
             FROM job_postings jp
             LEFT JOIN companies c ON c.id = jp.company_id
             LEFT JOIN categories cat ON cat.id = jp.category_id
             LEFT JOIN job_skill js ON js.job_id = jp.id
             LEFT JOIN skills s ON s.id = js.skill_id
             WHERE jp.is_active = TRUE
             GROUP BY jp.id, c.name, cat.name
             ORDER BY jp.scraped_at DESC, jp.id
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let jobs: Vec<Job> = rows
            .into_iter()
            .map(|row| Job {
                id: row.get("id"),
                title: row.get("title"),
                company: row.get("company"),
                city: row.get("city"),
                province: row.get("province"),
                category_id: row.get("category_id"),
                category: row.get("category"),
                description: row.get("job_description"),
                min_experience: row.get("minimum_experience"),
                is_full_time: row.get("is_full_time"),
                is_part_time: row.get("is_part_time"),
                is_remote: row.get("is_remote"),
                is_internship: row.get("is_internship"),
                is_active: row.get("is_active"),
                posted_at: row.get("scraped_at"),
                source_link: row.get("source_link"),
                skills: row.get("skills"),
            })
            .collect();

        debug!(result_count = jobs.len(), "Loaded embeddable jobs");
        Ok(jobs)
    }

    async fn skill_popularity(&self) -> Result<HashMap<JobId, u64>> {
        let rows = sqlx::query(
            "SELECT js.job_id, COUNT(DISTINCT us.user_id) AS users
             FROM job_skill js
             JOIN user_skills us ON js.skill_id = us.skill_id
             GROUP BY js.job_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let users: i64 = row.get("users");
                (row.get::<i64, _>("job_id"), users.max(0) as u64)
            })
            .collect())
    }
}
