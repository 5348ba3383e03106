//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.
//! Reads `users` joined with `user_preferences`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::domain::{DiscoveryQuery, Gender, GenderPreference, GeoPoint, Preferences, User, UserRepository};
use crate::shared::error::AppError;

const SELECT_USERS: &str = r#"
    SELECT u.id, u.username, u.display_name, u.avatar_url, u.gender, u.birthdate,
           u.latitude, u.longitude, u.is_online, u.last_seen,
           p.interested_in, p.min_age, p.max_age, p.max_distance_km
    FROM users u
    LEFT JOIN user_preferences p ON p.user_id = u.id
"#;

/// Database row for a user with its preferences.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    gender: Option<String>,
    birthdate: Option<NaiveDate>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    is_online: bool,
    last_seen: Option<DateTime<Utc>>,
    interested_in: Option<String>,
    min_age: Option<i32>,
    max_age: Option<i32>,
    max_distance_km: Option<f64>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            gender: self.gender.as_deref().and_then(Gender::parse),
            birthdate: self.birthdate,
            location: GeoPoint::from_parts(self.latitude, self.longitude),
            preferences: Preferences {
                interested_in: self
                    .interested_in
                    .as_deref()
                    .map(GenderPreference::parse)
                    .unwrap_or_default(),
                min_age: self.min_age.and_then(|v| u32::try_from(v).ok()),
                max_age: self.max_age.and_then(|v| u32::try_from(v).ok()),
                max_distance_km: self.max_distance_km,
            },
            is_online: self.is_online,
            last_seen: self.last_seen,
        }
    }
}

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("{} WHERE u.id = $1", SELECT_USERS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("{} WHERE u.id = ANY($1)", SELECT_USERS);
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_user()).collect())
    }

    async fn find_discoverable(&self, query: &DiscoveryQuery) -> Result<Vec<User>, AppError> {
        let sql = format!(
            r#"{} WHERE NOT (u.id = ANY($1))
              AND ($2::text[] IS NULL OR lower(u.gender) = ANY($2))
              AND ($3::date IS NULL OR u.birthdate >= $3)
              AND ($4::date IS NULL OR u.birthdate <= $4)
              AND ($5::float8 IS NULL OR u.latitude IS NULL OR u.longitude IS NULL
                   OR (u.latitude BETWEEN $5 AND $6 AND u.longitude BETWEEN $7 AND $8))
            ORDER BY u.id"#,
            SELECT_USERS
        );
        let spellings: Option<Vec<&str>> = query.gender.map(|g| g.spellings().to_vec());
        let area = query.area;
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&query.exclude)
            .bind(spellings)
            .bind(query.born_on_or_after)
            .bind(query.born_on_or_before)
            .bind(area.map(|a| a.min_latitude))
            .bind(area.map(|a| a.max_latitude))
            .bind(area.map(|a| a.min_longitude))
            .bind(area.map(|a| a.max_longitude))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_user()).collect())
    }

    async fn set_online(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_online = TRUE, last_seen = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_offline(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_online = FALSE, last_seen = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
