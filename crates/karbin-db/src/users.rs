//! User store implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use karbin_core::{Error, Result, UserId, UserPreferences, UserProfile, UserStore};

/// PostgreSQL implementation of UserStore.
pub struct PgUserStore {
    pool: Pool<Postgres>,
}

impl PgUserStore {
    /// Create a new PgUserStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Skill names of a user, alphabetically.
    pub async fn skills(&self, user_id: UserId) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT s.name FROM skills s
             JOIN user_skills us ON s.id = us.skill_id
             WHERE us.user_id = $1
             ORDER BY s.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(|row| row.get("name")).collect())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn preferences(&self, user_id: UserId) -> Result<Option<UserPreferences>> {
        let row = sqlx::query(
            "SELECT preferred_provinces, wants_full_time, wants_part_time,
                    wants_remote, wants_onsite, wants_internship,
                    experience_level, preferred_category_id
             FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| {
            let provinces: Option<String> = row.get("preferred_provinces");
            UserPreferences {
                preferred_provinces: UserPreferences::parse_provinces(provinces.as_deref()),
                wants_full_time: row.get("wants_full_time"),
                wants_part_time: row.get("wants_part_time"),
                wants_remote: row.get("wants_remote"),
                wants_onsite: row.get("wants_onsite"),
                wants_internship: row.get("wants_internship"),
                experience_level: row.get("experience_level"),
                preferred_category_id: row.get("preferred_category_id"),
            }
        }))
    }

    async fn profile(&self, user_id: UserId) -> Result<UserProfile> {
        let title = sqlx::query_scalar::<_, Option<String>>(
            "SELECT professional_title FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .flatten();

        let skills = self.skills(user_id).await?;

        let experience = sqlx::query_scalar::<_, String>(
            "SELECT description FROM work_experiences
             WHERE user_id = $1 AND description IS NOT NULL AND description <> ''
             ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(UserProfile {
            user_id,
            title,
            skills,
            experience,
        })
    }
}
