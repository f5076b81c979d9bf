//! PostgreSQL + PostGIS conversation store.
//!
//! Implements [`ConversationStore`] with:
//! - Per-conversation sequence numbers assigned inside the insert
//! - JSONB message content
//! - Point geometries in SRID 4326, read back with `ST_Y` / `ST_X`
//! - Label search with `ILIKE` over `properties->>'label'`
//!
//! Run the migration in `migrations/001_init.sql` (or `geoagent migrate`)
//! before first use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

use geoagent_config::DatabaseConfig;
use geoagent_core::error::StoreError;
use geoagent_core::feature::{GeoFeature, StoredFeature};
use geoagent_core::message::ConversationId;
use geoagent_core::store::{ConversationRecord, ConversationStore, MessageKind, StoredMessage};

const FEATURE_COLUMNS: &str = "gf.id, gf.message_id, gf.feature_type, \
     ST_Y(gf.geometry) AS latitude, ST_X(gf.geometry) AS longitude, \
     gf.properties->>'label' AS label, gf.created_at";

const MESSAGE_COLUMNS: &str = "id, conversation_id, type, sequence_number, timestamp, content";

/// Serializes sequence assignment per conversation until the transaction ends.
const SEQUENCE_LOCK: &str = "SELECT pg_advisory_xact_lock(hashtext($1))";

/// PostgreSQL-backed conversation store.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with a connection URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Storage(format!("Invalid database URL: {e}")))?;
        Self::connect_with(options, max_connections).await
    }

    /// Connect using the `[database]` section of the configuration.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, StoreError> {
        Self::connect_with(connect_options(config)?, config.max_connections).await
    }

    pub async fn connect_with(options: PgConnectOptions, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("PostgreSQL connection failed: {e}")))?;

        info!("Connected to PostgreSQL conversation store");
        Ok(Self { pool })
    }

    /// Create from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the schema migration.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let migration_sql = include_str!("../migrations/001_init.sql");

        sqlx::raw_sql(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        info!("Conversation schema migration complete");
        Ok(())
    }
}

/// Connection options for `config`.
///
/// A configured URL is used as is. Otherwise the individual fields are passed
/// through unencoded, so passwords may contain any character.
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, StoreError> {
    if let Some(url) = &config.url {
        return PgConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid DATABASE_URL: {e}")));
    }

    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .database(&config.name);
    Ok(match &config.password {
        Some(password) => options.password(password),
        None => options,
    })
}

/// Escape `LIKE` metacharacters so user text matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn query_failed(context: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::QueryFailed(format!("{context}: {e}"))
}

fn row_to_conversation(row: &PgRow) -> Result<ConversationRecord, StoreError> {
    let map = query_failed("Failed to decode conversation");
    Ok(ConversationRecord {
        id: ConversationId(row.try_get("id").map_err(&map)?),
        title: row.try_get("title").map_err(&map)?,
        created_at: row.try_get("created_at").map_err(&map)?,
        updated_at: row.try_get("updated_at").map_err(&map)?,
    })
}

fn row_to_message(row: &PgRow) -> Result<StoredMessage, StoreError> {
    let map = query_failed("Failed to decode message");
    let kind: String = row.try_get("type").map_err(&map)?;
    Ok(StoredMessage {
        id: row.try_get("id").map_err(&map)?,
        conversation_id: ConversationId(row.try_get("conversation_id").map_err(&map)?),
        kind: MessageKind::parse(&kind)
            .ok_or_else(|| StoreError::QueryFailed(format!("Unknown message type {kind}")))?,
        sequence_number: row.try_get("sequence_number").map_err(&map)?,
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp").map_err(&map)?,
        content: row.try_get("content").map_err(&map)?,
    })
}

fn row_to_feature(row: &PgRow) -> Result<StoredFeature, StoreError> {
    let map = query_failed("Failed to decode feature");
    Ok(StoredFeature {
        id: row.try_get("id").map_err(&map)?,
        message_id: row.try_get("message_id").map_err(&map)?,
        feature_type: row.try_get("feature_type").map_err(&map)?,
        latitude: row.try_get("latitude").map_err(&map)?,
        longitude: row.try_get("longitude").map_err(&map)?,
        label: row.try_get("label").map_err(&map)?,
        created_at: row.try_get("created_at").map_err(&map)?,
    })
}

#[async_trait]
impl ConversationStore for PostgresStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn create_conversation(
        &self,
        id: Option<ConversationId>,
        title: Option<String>,
    ) -> Result<ConversationRecord, StoreError> {
        let id = id.unwrap_or_default();
        let row = sqlx::query(
            "INSERT INTO conversations (id, title) VALUES ($1, $2) \
             RETURNING id, title, created_at, updated_at",
        )
        .bind(&id.0)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to create conversation: {e}")))?;

        debug!(conversation_id = %id, "Created conversation");
        row_to_conversation(&row)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<ConversationRecord>, StoreError> {
        let row = sqlx::query("SELECT id, title, created_at, updated_at FROM conversations WHERE id = $1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("Failed to get conversation"))?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    async fn list_conversations(&self, limit: i64, offset: i64) -> Result<Vec<ConversationRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, created_at, updated_at FROM conversations \
             ORDER BY updated_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list conversations"))?;

        rows.iter().map(row_to_conversation).collect()
    }

    async fn append_message(
        &self,
        conversation_id: &ConversationId,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> Result<StoredMessage, StoreError> {
        let sql = format!(
            "INSERT INTO messages (id, conversation_id, type, sequence_number, content) \
             VALUES ($1, $2, $3, \
                 (SELECT COALESCE(MAX(sequence_number), 0) + 1 FROM messages WHERE conversation_id = $2), \
                 $4) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let failed = |e: sqlx::Error| StoreError::Storage(format!("Failed to store {} message: {e}", kind.as_str()));

        let mut tx = self.pool.begin().await.map_err(failed)?;
        sqlx::query(SEQUENCE_LOCK)
            .bind(&conversation_id.0)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&conversation_id.0)
            .bind(kind.as_str())
            .bind(&content)
            .fetch_one(&mut *tx)
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)?;

        let message = row_to_message(&row)?;
        debug!(
            conversation_id = %conversation_id,
            kind = kind.as_str(),
            sequence = message.sequence_number,
            "Stored message"
        );
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<StoredMessage>, StoreError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 ORDER BY sequence_number ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(&conversation_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("Failed to load messages"))?;

        rows.iter().map(row_to_message).collect()
    }

    async fn append_feature(&self, message_id: &str, feature: &GeoFeature) -> Result<(), StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO geo_features (id, message_id, feature_type, geometry, properties) \
             VALUES ($1, $2, $3, ST_SetSRID(ST_MakePoint($4, $5), 4326), $6) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&feature.id)
        .bind(message_id)
        .bind(feature.kind.as_str())
        .bind(feature.longitude)
        .bind(feature.latitude)
        .bind(serde_json::json!({ "label": feature.label }))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to store feature: {e}")))?
        .rows_affected();

        if inserted == 0 {
            warn!(feature_id = %feature.id, message_id, "Feature already stored, keeping the existing row");
        } else {
            debug!(feature_id = %feature.id, message_id, "Stored feature");
        }
        Ok(())
    }

    async fn message_features(&self, message_id: &str) -> Result<Vec<StoredFeature>, StoreError> {
        let sql = format!(
            "SELECT {FEATURE_COLUMNS} FROM geo_features gf WHERE gf.message_id = $1 ORDER BY gf.created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(message_id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("Failed to load message features"))?;

        rows.iter().map(row_to_feature).collect()
    }

    async fn conversation_features(&self, conversation_id: &ConversationId) -> Result<Vec<StoredFeature>, StoreError> {
        let sql = format!(
            "SELECT {FEATURE_COLUMNS} FROM geo_features gf \
             JOIN messages m ON gf.message_id = m.id \
             WHERE m.conversation_id = $1 \
             ORDER BY gf.created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(&conversation_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("Failed to load conversation features"))?;

        rows.iter().map(row_to_feature).collect()
    }

    async fn find_features_by_label(
        &self,
        conversation_id: &ConversationId,
        query: &str,
    ) -> Result<Vec<StoredFeature>, StoreError> {
        let sql = format!(
            "SELECT {FEATURE_COLUMNS} FROM geo_features gf \
             JOIN messages m ON gf.message_id = m.id \
             WHERE m.conversation_id = $1 AND gf.properties->>'label' ILIKE $2 \
             ORDER BY gf.created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(&conversation_id.0)
            .bind(like_pattern(query))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("Failed to search features"))?;

        rows.iter().map(row_to_feature).collect()
    }

    async fn delete_feature(&self, feature_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM geo_features WHERE id = $1")
            .bind(feature_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to delete feature: {e}")))?;

        let deleted = result.rows_affected() > 0;
        debug!(feature_id, deleted, "Delete feature");
        Ok(deleted)
    }

    async fn touch(&self, conversation_id: &ConversationId) -> Result<(), StoreError> {
        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(&conversation_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to touch conversation: {e}")))?;
        Ok(())
    }
}

// ── Unit tests (no DB required) ──────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("Seattle"), "%Seattle%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }

    #[test]
    fn connect_options_keep_reserved_characters_in_password() {
        let config = DatabaseConfig {
            password: Some("p@ss/w#rd".into()),
            ..Default::default()
        };
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_username(), "postgres");
        assert_eq!(options.get_database(), Some("magma_soup"));
    }

    #[test]
    fn connect_options_prefer_database_url() {
        let config = DatabaseConfig {
            url: Some("postgres://app@db.internal:6543/maps".into()),
            host: "ignored".into(),
            ..Default::default()
        };
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("maps"));
    }

    #[test]
    fn invalid_database_url_is_reported() {
        let config = DatabaseConfig {
            url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(connect_options(&config).is_err());
    }

    #[test]
    fn sequence_lock_is_scoped_to_transaction_and_conversation() {
        assert!(SEQUENCE_LOCK.contains("pg_advisory_xact_lock"));
        assert!(SEQUENCE_LOCK.contains("hashtext($1)"));
    }

    #[test]
    fn migration_creates_every_table() {
        let sql = include_str!("../migrations/001_init.sql");
        for table in ["conversations", "messages", "geo_features"] {
            assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
        }
        assert!(sql.contains("geometry(Point, 4326)"));
        assert!(sql.contains("UNIQUE (conversation_id, sequence_number)"));
    }
}
