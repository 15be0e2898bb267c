//! services/bot/src/adapters/db.rs
//!
//! This module contains the durable session store, the PostgreSQL implementation
//! of the `SessionStore` port from the `core` crate. It handles all interactions
//! with the database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lead_bot_core::domain::{ConversationState, Session, SessionPatch, SessionStats};
use lead_bot_core::ports::{PortError, PortResult, SessionStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tracing::{debug, info};

//=========================================================================================
// Schema
//=========================================================================================

const CREATE_SESSIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    correspondent_id      TEXT PRIMARY KEY,
    display_name          TEXT,
    full_name             TEXT,
    email                 TEXT,
    state                 TEXT NOT NULL DEFAULT 'welcome'
        CHECK (state IN ('welcome', 'awaiting_confirmation', 'awaiting_name', 'awaiting_email', 'completed')),
    registration_complete BOOLEAN NOT NULL DEFAULT FALSE,
    login_url             TEXT,
    created_at            TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at            TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_activity_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_sessions_email ON sessions (email)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_state ON sessions (state)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_last_activity ON sessions (last_activity_at)",
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A session store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new `PgSessionStore` over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and makes sure the schema exists.
    ///
    /// Any failure here means the durable backend cannot be used.
    pub async fn connect(database_url: &str, max_connections: u32) -> PortResult<Self> {
        info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| PortError::StoreUnavailable(e.to_string()))?;
        let store = Self::new(pool);
        store
            .ensure_schema()
            .await
            .map_err(|e| PortError::StoreUnavailable(format!("schema setup failed: {}", e)))?;
        Ok(store)
    }

    /// Creates the `sessions` table and its indexes when missing.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_SESSIONS_TABLE).execute(&self.pool).await?;
        for statement in CREATE_INDEXES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Session schema is ready.");
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    correspondent_id: String,
    display_name: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    state: String,
    registration_complete: bool,
    login_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        let state = self
            .state
            .parse::<ConversationState>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Session {
            correspondent_id: self.correspondent_id,
            display_name: self.display_name,
            full_name: self.full_name,
            email: self.email,
            state,
            registration_complete: self.registration_complete,
            login_url: self.login_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_activity_at: self.last_activity_at,
        })
    }
}

#[derive(FromRow)]
struct StateCountRecord {
    state: String,
    count: i64,
    completed: i64,
}

fn records_to_domain(records: Vec<SessionRecord>) -> PortResult<Vec<Session>> {
    records.into_iter().map(SessionRecord::to_domain).collect()
}

/// Maps driver errors onto the port taxonomy.
fn port_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => PortError::AlreadyExists(db.message().to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => PortError::StoreUnavailable(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for PgSessionStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, correspondent_id: &str) -> PortResult<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT correspondent_id, display_name, full_name, email, state, registration_complete, login_url, created_at, updated_at, last_activity_at FROM sessions WHERE correspondent_id = $1",
        )
        .bind(correspondent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?;
        record.map(SessionRecord::to_domain).transpose()
    }

    async fn create(&self, correspondent_id: &str, display_name: Option<&str>) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "INSERT INTO sessions (correspondent_id, display_name) VALUES ($1, $2) RETURNING correspondent_id, display_name, full_name, email, state, registration_complete, login_url, created_at, updated_at, last_activity_at",
        )
        .bind(correspondent_id)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match port_error(e) {
            PortError::AlreadyExists(_) => {
                PortError::AlreadyExists(format!("Session {} already exists", correspondent_id))
            }
            other => other,
        })?;
        debug!(correspondent = %correspondent_id, "Created session row");
        record.to_domain()
    }

    async fn update(&self, correspondent_id: &str, patch: SessionPatch) -> PortResult<Session> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        let current = sqlx::query_as::<_, SessionRecord>(
            "SELECT correspondent_id, display_name, full_name, email, state, registration_complete, login_url, created_at, updated_at, last_activity_at FROM sessions WHERE correspondent_id = $1 FOR UPDATE",
        )
        .bind(correspondent_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(port_error)?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", correspondent_id)))?
        .to_domain()?;

        let next = patch.apply(&current, Utc::now());
        sqlx::query(
            "UPDATE sessions SET full_name = $2, email = $3, state = $4, registration_complete = $5, login_url = $6, updated_at = $7, last_activity_at = $8 WHERE correspondent_id = $1",
        )
        .bind(correspondent_id)
        .bind(&next.full_name)
        .bind(&next.email)
        .bind(next.state.as_str())
        .bind(next.registration_complete)
        .bind(&next.login_url)
        .bind(next.updated_at)
        .bind(next.last_activity_at)
        .execute(&mut *tx)
        .await
        .map_err(port_error)?;

        tx.commit().await.map_err(port_error)?;
        debug!(correspondent = %correspondent_id, state = %next.state, "Updated session row");
        Ok(next)
    }

    async fn list_all(&self) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            "SELECT correspondent_id, display_name, full_name, email, state, registration_complete, login_url, created_at, updated_at, last_activity_at FROM sessions ORDER BY last_activity_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        records_to_domain(records)
    }

    async fn list_by_state(&self, state: ConversationState) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            "SELECT correspondent_id, display_name, full_name, email, state, registration_complete, login_url, created_at, updated_at, last_activity_at FROM sessions WHERE state = $1 ORDER BY last_activity_at DESC",
        )
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        records_to_domain(records)
    }

    async fn list_completed(&self) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            "SELECT correspondent_id, display_name, full_name, email, state, registration_complete, login_url, created_at, updated_at, last_activity_at FROM sessions WHERE registration_complete ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        records_to_domain(records)
    }

    async fn delete(&self, correspondent_id: &str) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE correspondent_id = $1")
            .bind(correspondent_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> PortResult<SessionStats> {
        let rows = sqlx::query_as::<_, StateCountRecord>(
            "SELECT state, COUNT(*) AS count, COUNT(*) FILTER (WHERE registration_complete) AS completed FROM sessions GROUP BY state",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        stats_from_counts(rows)
    }
}

fn stats_from_counts(rows: Vec<StateCountRecord>) -> PortResult<SessionStats> {
    let mut stats = SessionStats::default();
    for row in rows {
        let state = row
            .state
            .parse::<ConversationState>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let count = u64::try_from(row.count).unwrap_or_default();
        let completed = u64::try_from(row.completed).unwrap_or_default();
        stats.total += count;
        stats.completed += completed;
        stats.pending += count - completed.min(count);
        *stats.by_state.entry(state).or_insert(0) += count;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: &str) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            correspondent_id: "391234@c.us".to_string(),
            display_name: Some("Maria".to_string()),
            full_name: None,
            email: None,
            state: state.to_string(),
            registration_complete: false,
            login_url: None,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        }
    }

    #[test]
    fn record_converts_to_domain() {
        let session = record("awaiting_email").to_domain().unwrap();
        assert_eq!(session.state, ConversationState::AwaitingEmail);
        assert_eq!(session.display_name.as_deref(), Some("Maria"));
    }

    #[test]
    fn legacy_state_names_still_load() {
        let session = record("waiting_for_yes").to_domain().unwrap();
        assert_eq!(session.state, ConversationState::AwaitingConfirmation);
    }

    #[test]
    fn unknown_state_is_unexpected() {
        assert!(matches!(record("lost").to_domain(), Err(PortError::Unexpected(_))));
    }

    #[test]
    fn schema_constraint_lists_every_state() {
        for state in ConversationState::ALL {
            assert!(CREATE_SESSIONS_TABLE.contains(&format!("'{}'", state.as_str())));
        }
    }

    #[test]
    fn driver_errors_map_to_port_errors() {
        assert!(matches!(port_error(sqlx::Error::RowNotFound), PortError::NotFound(_)));
        assert!(matches!(port_error(sqlx::Error::PoolTimedOut), PortError::StoreUnavailable(_)));
        assert!(matches!(
            port_error(sqlx::Error::Protocol("bad frame".into())),
            PortError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn grouped_counts_become_stats() {
        let rows = vec![
            StateCountRecord {
                state: "completed".to_string(),
                count: 3,
                completed: 3,
            },
            StateCountRecord {
                state: "awaiting_name".to_string(),
                count: 2,
                completed: 0,
            },
        ];
        let stats = stats_from_counts(rows).unwrap();
        assert_eq!((stats.total, stats.completed, stats.pending), (5, 3, 2));
        assert_eq!(stats.by_state.get(&ConversationState::AwaitingName), Some(&2));
    }
}
