//! services/api/src/adapters/db.rs
//!
//! PostgreSQL implementation of the `ActivityRepository` port. The request and
//! the generated plan are stored as JSONB documents next to a few indexed
//! columns.

use activity_planner_core::{
    ActivityRepository, GeneratedActivity, GenerationRequest, PortError, PortResult, Provider,
    StoredActivity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An activity store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgActivityStore {
    pool: PgPool,
}

impl PgActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations. Called once at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// Database Record Struct
//=========================================================================================

#[derive(FromRow)]
struct ActivityRecord {
    id: Uuid,
    provider: String,
    request: Json<GenerationRequest>,
    generated_activity: Json<GeneratedActivity>,
    created_at: DateTime<Utc>,
}

impl ActivityRecord {
    fn into_domain(self) -> PortResult<StoredActivity> {
        let provider: Provider = self.provider.parse().map_err(|_| {
            PortError::Unexpected(format!(
                "activity {} has unknown provider '{}'",
                self.id, self.provider
            ))
        })?;
        Ok(StoredActivity {
            id: self.id,
            provider,
            request: self.request.0,
            generated_activity: self.generated_activity.0,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `ActivityRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ActivityRepository for PgActivityStore {
    async fn create_activity(
        &self,
        provider: Provider,
        request: &GenerationRequest,
        activity: GeneratedActivity,
    ) -> PortResult<StoredActivity> {
        let record = sqlx::query_as::<_, ActivityRecord>(
            "INSERT INTO activities (id, provider, request, generated_activity) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, provider, request, generated_activity, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(provider.as_str())
        .bind(Json(request))
        .bind(Json(&activity))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.into_domain()
    }

    async fn get_activity(&self, id: Uuid) -> PortResult<StoredActivity> {
        let record = sqlx::query_as::<_, ActivityRecord>(
            "SELECT id, provider, request, generated_activity, created_at \
             FROM activities WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Activity {} not found", id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        record.into_domain()
    }
}
