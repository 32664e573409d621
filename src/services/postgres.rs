use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::config::DatabaseSettings;
use crate::core::distance::{calculate_bounding_box, EARTH_RADIUS_KM};
use crate::models::{
    CandidateQuery, Conversation, GeoPoint, LookingFor, Match, Profile, Swipe, SwipeAction,
    SwipeStats, UserPair,
};
use crate::services::store::{Store, StoreError, StoreResult};

/// Slack added to the SQL radius so that rounding differences between the SQL
/// haversine and the scorer never drop a candidate inside the radius
const RADIUS_SLACK_KM: f64 = 0.05;

const MATCH_COLUMNS: &str = r#"
    id, user_low, user_high, conversation_id, matched_at, is_active,
    unmatched_by, unmatched_at, blocked_by, block_reason,
    last_message_preview, last_message_at, last_message_by, message_count, unread
"#;

const SWIPE_COLUMNS: &str =
    "id, from_user, to_user, action, is_match, match_date, created_at, swiped_at";

/// PostgreSQL backed store
///
/// Every multi-row write runs in one transaction. The partial unique index
/// `uniq_matches_active_pair` enforces one active match per pair, and losing
/// that race surfaces as [`StoreError::Conflict`].
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run the embedded migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_settings(settings: &DatabaseSettings) -> StoreResult<Self> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            &settings.url,
            settings.max_connections.unwrap_or(10),
            settings.min_connections.unwrap_or(1),
            Duration::from_secs(settings.acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(settings.idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Wrap an existing pool; migrations are the caller's concern
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_match(&self, match_id: Uuid) -> StoreResult<Match> {
        let query = format!("SELECT {} FROM matches WHERE id = $1", MATCH_COLUMNS);
        let row = sqlx::query(&query)
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))?;

        match_from_row(&row)
    }
}

/// Translate driver errors into the store taxonomy
fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
        // serialization_failure, deadlock_detected
        if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
            return StoreError::Unavailable(db.message().to_string());
        }
    }
    StoreError::SqlxError(err)
}

fn profile_from_row(row: &PgRow) -> StoreResult<Profile> {
    let looking_for: String = row.try_get("looking_for")?;
    let age: i16 = row.try_get("age")?;
    let verification_score: i16 = row.try_get("verification_score")?;
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;

    Ok(Profile {
        user_id: row.try_get("user_id")?,
        display_name: row.try_get("display_name")?,
        age: u8::try_from(age).map_err(|_| StoreError::InvalidInput(format!("age {} out of range", age)))?,
        gender: row.try_get("gender")?,
        interested_in: row.try_get::<Vec<String>, _>("interested_in")?.into_iter().collect(),
        looking_for: LookingFor::from_str(&looking_for).map_err(StoreError::InvalidInput)?,
        bio: row.try_get("bio")?,
        interests: row.try_get::<Vec<String>, _>("interests")?.into_iter().collect(),
        photos: row.try_get("photos")?,
        location: latitude
            .zip(longitude)
            .map(|(lat, lon)| GeoPoint::new(lon, lat)),
        is_searchable: row.try_get("is_searchable")?,
        is_active: row.try_get("is_active")?,
        blocked_users: row.try_get::<Vec<String>, _>("blocked_users")?.into_iter().collect(),
        total_matches: row.try_get::<i32, _>("total_matches")?.max(0) as u32,
        total_swipes: row.try_get::<i32, _>("total_swipes")?.max(0) as u32,
        verification_score: verification_score.clamp(0, u8::MAX as i16) as u8,
        boost_expires_at: row.try_get("boost_expires_at")?,
        push_token: row.try_get("push_token")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn swipe_from_row(row: &PgRow) -> StoreResult<Swipe> {
    let action: String = row.try_get("action")?;

    Ok(Swipe {
        id: row.try_get("id")?,
        from_user: row.try_get("from_user")?,
        to_user: row.try_get("to_user")?,
        action: SwipeAction::from_str(&action).map_err(StoreError::InvalidInput)?,
        is_match: row.try_get("is_match")?,
        match_date: row.try_get("match_date")?,
        created_at: row.try_get("created_at")?,
        swiped_at: row.try_get("swiped_at")?,
    })
}

fn match_from_row(row: &PgRow) -> StoreResult<Match> {
    let unread: Json<BTreeMap<String, u32>> = row.try_get("unread")?;

    Ok(Match {
        id: row.try_get("id")?,
        users: UserPair {
            low: row.try_get("user_low")?,
            high: row.try_get("user_high")?,
        },
        conversation_id: row.try_get("conversation_id")?,
        matched_at: row.try_get("matched_at")?,
        is_active: row.try_get("is_active")?,
        unmatched_by: row.try_get("unmatched_by")?,
        unmatched_at: row.try_get("unmatched_at")?,
        blocked_by: row.try_get("blocked_by")?,
        block_reason: row.try_get("block_reason")?,
        last_message_preview: row.try_get("last_message_preview")?,
        last_message_at: row.try_get("last_message_at")?,
        last_message_by: row.try_get("last_message_by")?,
        message_count: row.try_get::<i32, _>("message_count")?.max(0) as u32,
        unread: unread.0,
    })
}

fn conversation_from_row(row: &PgRow) -> StoreResult<Conversation> {
    Ok(Conversation {
        id: row.try_get("id")?,
        participants: UserPair {
            low: row.try_get("user_low")?,
            high: row.try_get("user_high")?,
        },
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Store for PostgresStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn get_profiles(&self, user_ids: &[String]) -> StoreResult<Vec<Profile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT * FROM profiles WHERE user_id = ANY($1)")
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.iter().map(profile_from_row).collect()
    }

    async fn update_location(
        &self,
        user_id: &str,
        location: GeoPoint,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE profiles SET latitude = $2, longitude = $3, updated_at = $4 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn search_candidates(&self, query: &CandidateQuery) -> StoreResult<Vec<Profile>> {
        let bbox = calculate_bounding_box(query.center.latitude, query.center.longitude, query.radius_km);

        // Latitude band prunes through the index, haversine decides the radius
        let sql = format!(
            r#"
            SELECT * FROM (
                SELECT p.*,
                    {radius} * 2 * ASIN(LEAST(1.0, SQRT(
                        POWER(SIN(RADIANS(p.latitude - $2) / 2), 2)
                        + COS(RADIANS($2)) * COS(RADIANS(p.latitude))
                        * POWER(SIN(RADIANS(p.longitude - $3) / 2), 2)
                    ))) AS distance_km
                FROM profiles p
                WHERE p.user_id <> $1
                  AND p.is_searchable
                  AND p.is_active
                  AND p.latitude IS NOT NULL
                  AND p.longitude IS NOT NULL
                  AND p.latitude BETWEEN $4 AND $5
                  AND p.gender = ANY($6)
                  AND p.age BETWEEN $7 AND $8
                  AND NOT (p.user_id = ANY($9))
                  AND NOT ($1 = ANY(p.blocked_users))
            ) candidates
            WHERE distance_km <= $10
            ORDER BY distance_km, user_id
            LIMIT $11
            "#,
            radius = EARTH_RADIUS_KM
        );

        let rows = sqlx::query(&sql)
            .bind(&query.requester_id)
            .bind(query.center.latitude)
            .bind(query.center.longitude)
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(&query.genders)
            .bind(query.min_age as i16)
            .bind(query.max_age as i16)
            .bind(&query.exclude_user_ids)
            .bind(query.radius_km + RADIUS_SLACK_KM)
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(
            "Radius query for {} returned {} rows",
            query.requester_id,
            rows.len()
        );

        rows.iter().map(profile_from_row).collect()
    }

    async fn swiped_target_ids(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT to_user FROM swipes WHERE from_user = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(rows.iter().map(|row| row.get("to_user")).collect())
    }

    async fn upsert_swipe(
        &self,
        from_user: &str,
        to_user: &str,
        action: SwipeAction,
        now: DateTime<Utc>,
    ) -> StoreResult<(Swipe, Option<SwipeAction>)> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT action FROM swipes WHERE from_user = $1 AND to_user = $2 FOR UPDATE",
        )
        .bind(from_user)
        .bind(to_user)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;
        let previous = previous
            .as_deref()
            .map(SwipeAction::from_str)
            .transpose()
            .map_err(StoreError::InvalidInput)?;

        let query = format!(
            r#"
            INSERT INTO swipes (id, from_user, to_user, action, is_match, created_at, swiped_at)
            VALUES ($1, $2, $3, $4, FALSE, $5, $5)
            ON CONFLICT (from_user, to_user)
            DO UPDATE SET
                action = EXCLUDED.action,
                swiped_at = EXCLUDED.swiped_at
            RETURNING {}
            "#,
            SWIPE_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(from_user)
            .bind(to_user)
            .bind(action.as_str())
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_db_error)?;

        let swipe = swipe_from_row(&row)?;

        sqlx::query("UPDATE profiles SET total_swipes = total_swipes + 1 WHERE user_id = $1")
            .bind(from_user)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok((swipe, previous))
    }

    async fn find_swipe(&self, from_user: &str, to_user: &str) -> StoreResult<Option<Swipe>> {
        let query = format!(
            "SELECT {} FROM swipes WHERE from_user = $1 AND to_user = $2",
            SWIPE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(from_user)
            .bind(to_user)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.as_ref().map(swipe_from_row).transpose()
    }

    async fn flag_swipe_match(
        &self,
        from_user: &str,
        to_user: &str,
        matched_at: DateTime<Utc>,
    ) -> StoreResult<Option<Swipe>> {
        let query = format!(
            r#"
            UPDATE swipes SET is_match = TRUE, match_date = $3
            WHERE from_user = $1 AND to_user = $2
            RETURNING {}
            "#,
            SWIPE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(from_user)
            .bind(to_user)
            .bind(matched_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.as_ref().map(swipe_from_row).transpose()
    }

    async fn undo_last_swipe(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(Swipe, Option<Match>)>> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let query = format!(
            r#"
            SELECT {} FROM swipes
            WHERE from_user = $1
            ORDER BY swiped_at DESC, created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
            SWIPE_COLUMNS
        );
        let Some(row) = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error)?
        else {
            tx.rollback().await.map_err(map_db_error)?;
            return Ok(None);
        };
        let swipe = swipe_from_row(&row)?;

        sqlx::query("DELETE FROM swipes WHERE id = $1")
            .bind(swipe.id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        let mut reverted = None;
        if swipe.is_match {
            let pair = UserPair::new(&swipe.from_user, &swipe.to_user);
            let query = format!(
                r#"
                UPDATE matches SET is_active = FALSE, unmatched_by = $3, unmatched_at = $4
                WHERE user_low = $1 AND user_high = $2 AND is_active
                RETURNING {}
                "#,
                MATCH_COLUMNS
            );
            let row = sqlx::query(&query)
                .bind(&pair.low)
                .bind(&pair.high)
                .bind(user_id)
                .bind(now)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_error)?;

            if let Some(row) = row {
                let m = match_from_row(&row)?;
                sqlx::query("UPDATE conversations SET is_active = FALSE WHERE id = $1")
                    .bind(m.conversation_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_db_error)?;
                reverted = Some(m);
            }
        }

        tx.commit().await.map_err(map_db_error)?;

        Ok(Some((swipe, reverted)))
    }

    async fn received_likes(
        &self,
        user_id: &str,
        exclude_user_ids: &[String],
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<Swipe>, u64)> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM swipes
            WHERE to_user = $1
              AND action IN ('like', 'superlike')
              AND NOT (from_user = ANY($2))
              AND EXISTS (
                  SELECT 1 FROM profiles p
                  WHERE p.user_id = swipes.from_user
                    AND p.is_active
                    AND NOT ($1 = ANY(p.blocked_users))
              )
            "#,
        )
        .bind(user_id)
        .bind(exclude_user_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        let query = format!(
            r#"
            SELECT {} FROM swipes
            WHERE to_user = $1
              AND action IN ('like', 'superlike')
              AND NOT (from_user = ANY($2))
              AND EXISTS (
                  SELECT 1 FROM profiles p
                  WHERE p.user_id = swipes.from_user
                    AND p.is_active
                    AND NOT ($1 = ANY(p.blocked_users))
              )
            ORDER BY swiped_at DESC, id
            LIMIT $3 OFFSET $4
            "#,
            SWIPE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(exclude_user_ids)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        let swipes = rows.iter().map(swipe_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok((swipes, total.max(0) as u64))
    }

    async fn swipe_stats(&self, user_id: &str) -> StoreResult<SwipeStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE from_user = $1 AND action = 'like') AS likes_sent,
                COUNT(*) FILTER (WHERE from_user = $1 AND action = 'dislike') AS dislikes_sent,
                COUNT(*) FILTER (WHERE from_user = $1 AND action = 'superlike') AS superlikes_sent,
                COUNT(*) FILTER (WHERE to_user = $1 AND action IN ('like', 'superlike')) AS likes_received
            FROM swipes
            WHERE from_user = $1 OR to_user = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        let active_matches: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matches WHERE is_active AND (user_low = $1 OR user_high = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(SwipeStats {
            likes_sent: row.get::<i64, _>("likes_sent").max(0) as u64,
            dislikes_sent: row.get::<i64, _>("dislikes_sent").max(0) as u64,
            superlikes_sent: row.get::<i64, _>("superlikes_sent").max(0) as u64,
            likes_received: row.get::<i64, _>("likes_received").max(0) as u64,
            active_matches: active_matches.max(0) as u64,
        })
    }

    async fn create_match(&self, pair: &UserPair, now: DateTime<Utc>) -> StoreResult<Match> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let conversation = Conversation::new(pair.clone(), now);
        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_low, user_high, is_active, created_at)
            VALUES ($1, $2, $3, TRUE, $4)
            "#,
        )
        .bind(conversation.id)
        .bind(&pair.low)
        .bind(&pair.high)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let candidate = Match::new(pair.clone(), conversation.id, now);
        let query = format!(
            r#"
            INSERT INTO matches (id, user_low, user_high, conversation_id, matched_at, is_active, message_count, unread)
            VALUES ($1, $2, $3, $4, $5, TRUE, 0, '{{}}'::jsonb)
            ON CONFLICT (user_low, user_high) WHERE is_active DO NOTHING
            RETURNING {}
            "#,
            MATCH_COLUMNS
        );
        let inserted = sqlx::query(&query)
            .bind(candidate.id)
            .bind(&pair.low)
            .bind(&pair.high)
            .bind(conversation.id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error)?;

        let Some(row) = inserted else {
            tx.rollback().await.map_err(map_db_error)?;
            return Err(StoreError::Conflict(format!(
                "active match already exists for {} / {}",
                pair.low, pair.high
            )));
        };
        let created = match_from_row(&row)?;

        sqlx::query(
            r#"
            UPDATE swipes SET is_match = TRUE, match_date = $3
            WHERE (from_user = $1 AND to_user = $2) OR (from_user = $2 AND to_user = $1)
            "#,
        )
        .bind(&pair.low)
        .bind(&pair.high)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query("UPDATE profiles SET total_matches = total_matches + 1 WHERE user_id = ANY($1)")
            .bind(pair.as_array().to_vec())
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(created)
    }

    async fn find_active_match(&self, pair: &UserPair) -> StoreResult<Option<Match>> {
        let query = format!(
            "SELECT {} FROM matches WHERE user_low = $1 AND user_high = $2 AND is_active",
            MATCH_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&pair.low)
            .bind(&pair.high)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn get_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        match self.fetch_match(match_id).await {
            Ok(found) => Ok(Some(found)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_active_matches(
        &self,
        user_id: &str,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<Match>, u64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matches WHERE is_active AND (user_low = $1 OR user_high = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        let query = format!(
            r#"
            SELECT {} FROM matches
            WHERE is_active AND (user_low = $1 OR user_high = $1)
            ORDER BY matched_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
            MATCH_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        let matches = rows.iter().map(match_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok((matches, total.max(0) as u64))
    }

    async fn unmatch(&self, match_id: Uuid, acting_user: &str, now: DateTime<Utc>) -> StoreResult<Match> {
        let query = format!(
            r#"
            UPDATE matches SET is_active = FALSE, unmatched_by = $2, unmatched_at = $3
            WHERE id = $1 AND is_active
            RETURNING {}
            "#,
            MATCH_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(match_id)
            .bind(acting_user)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        match row {
            Some(row) => match_from_row(&row),
            // Already inactive: report the current state
            None => self.fetch_match(match_id).await,
        }
    }

    async fn block_match(
        &self,
        match_id: Uuid,
        acting_user: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Match> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let query = format!("SELECT {} FROM matches WHERE id = $1 FOR UPDATE", MATCH_COLUMNS);
        let current = sqlx::query(&query)
            .bind(match_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))?;
        let current = match_from_row(&current)?;

        let other = current
            .users
            .other(acting_user)
            .map(str::to_string)
            .ok_or_else(|| StoreError::InvalidInput(format!("{} is not part of match {}", acting_user, match_id)))?;

        // SET expressions see the pre-update row, so the first blocker wins
        let query = format!(
            r#"
            UPDATE matches SET
                is_active = FALSE,
                block_reason = CASE WHEN blocked_by IS NULL THEN $3 ELSE block_reason END,
                blocked_by = COALESCE(blocked_by, $2),
                unmatched_at = COALESCE(unmatched_at, $4)
            WHERE id = $1
            RETURNING {}
            "#,
            MATCH_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(match_id)
            .bind(acting_user)
            .bind(reason)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_db_error)?;
        let blocked = match_from_row(&row)?;

        sqlx::query("UPDATE conversations SET is_active = FALSE WHERE id = $1")
            .bind(blocked.conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        sqlx::query(
            r#"
            UPDATE profiles
            SET blocked_users = array_append(blocked_users, $2), updated_at = $3
            WHERE user_id = $1 AND NOT ($2 = ANY(blocked_users))
            "#,
        )
        .bind(acting_user)
        .bind(&other)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(blocked)
    }

    async fn record_message(
        &self,
        match_id: Uuid,
        sender: &str,
        preview: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Match> {
        let current = self.fetch_match(match_id).await?;
        let recipient = current
            .users
            .other(sender)
            .map(str::to_string)
            .ok_or_else(|| StoreError::InvalidInput(format!("{} is not part of match {}", sender, match_id)))?;

        let query = format!(
            r#"
            UPDATE matches SET
                last_message_preview = $3,
                last_message_at = $4,
                last_message_by = $2,
                message_count = message_count + 1,
                unread = jsonb_set(
                    unread,
                    ARRAY[$5::text],
                    to_jsonb(COALESCE((unread ->> $5::text)::int, 0) + 1)
                )
            WHERE id = $1 AND is_active
            RETURNING {}
            "#,
            MATCH_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(match_id)
            .bind(sender)
            .bind(preview)
            .bind(now)
            .bind(&recipient)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        match row {
            Some(row) => match_from_row(&row),
            // Deactivated after the read above, or gone entirely
            None => {
                self.fetch_match(match_id).await?;
                Err(StoreError::InvalidInput(format!("match {} is no longer active", match_id)))
            }
        }
    }

    async fn mark_read(&self, match_id: Uuid, user_id: &str) -> StoreResult<Match> {
        let query = format!(
            r#"
            UPDATE matches SET unread = jsonb_set(unread, ARRAY[$2::text], '0'::jsonb)
            WHERE id = $1
            RETURNING {}
            "#,
            MATCH_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(match_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))?;

        match_from_row(&row)
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, user_low, user_high, is_active, created_at FROM conversations WHERE id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    /// Health check for the database connection
    async fn health_check(&self) -> StoreResult<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(map_db_error)
    }
}
