use crate::error::DbError;
use crate::models::{datetime_to_timestamp, ProvisionRunRow};
use chrono::{DateTime, Utc};
use factory_core::{ProvisionRun, ProvisionState, UpdateRunRequest};
use sqlx::SqlitePool;
use tracing::debug;

const RUN_COLUMNS: &str =
    "id, project_slug, state, metadata, error, failed_state, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub state: Option<ProvisionState>,
}

/// Durable store for provisioning runs, keyed by project slug.
///
/// `create` is the serialization point between competing orchestrations: it
/// refuses to overwrite a live run. Deletion is soft, so the slug becomes
/// free again while the record stays around until purged.
#[derive(Clone)]
pub struct ProvisionRunRepository {
    pool: SqlitePool,
}

impl ProvisionRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, project_slug: &str) -> Result<ProvisionRun, DbError> {
        let run = ProvisionRun::new(project_slug);
        let row = ProvisionRunRow::try_from(&run)?;

        let result = sqlx::query(
            r#"
            INSERT INTO provision_runs (id, project_slug, state, metadata, error, failed_state, created_at, updated_at, deleted_at)
            VALUES (?, ?, ?, ?, NULL, NULL, ?, ?, NULL)
            ON CONFLICT(project_slug) DO UPDATE SET
                id = excluded.id,
                state = excluded.state,
                metadata = excluded.metadata,
                error = NULL,
                failed_state = NULL,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                deleted_at = NULL
            WHERE provision_runs.deleted_at IS NOT NULL
            "#,
        )
        .bind(&row.id)
        .bind(&row.project_slug)
        .bind(&row.state)
        .bind(&row.metadata)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::AlreadyExists(project_slug.to_string()));
        }

        debug!(project_slug = %project_slug, "Provision run created");
        Ok(run)
    }

    pub async fn find_by_slug(&self, project_slug: &str) -> Result<Option<ProvisionRun>, DbError> {
        let row: Option<ProvisionRunRow> = sqlx::query_as(&format!(
            "SELECT {} FROM provision_runs WHERE project_slug = ? AND deleted_at IS NULL",
            RUN_COLUMNS
        ))
        .bind(project_slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain()).transpose()
    }

    pub async fn get(&self, project_slug: &str) -> Result<ProvisionRun, DbError> {
        self.find_by_slug(project_slug)
            .await?
            .ok_or_else(|| DbError::RunNotFound(project_slug.to_string()))
    }

    pub async fn list(&self, filter: &RunFilter) -> Result<Vec<ProvisionRun>, DbError> {
        let rows: Vec<ProvisionRunRow> = match filter.state {
            Some(state) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM provision_runs WHERE deleted_at IS NULL AND state = ? ORDER BY created_at DESC",
                    RUN_COLUMNS
                ))
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM provision_runs WHERE deleted_at IS NULL ORDER BY created_at DESC",
                    RUN_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    /// Live runs that stopped short of a terminal state.
    pub async fn find_unfinished(&self) -> Result<Vec<ProvisionRun>, DbError> {
        let rows: Vec<ProvisionRunRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM provision_runs
            WHERE deleted_at IS NULL AND state NOT IN ('COMPLETE', 'FAILED')
            ORDER BY created_at ASC
            "#,
            RUN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    /// Merges `update` into the stored run and bumps `updated_at`.
    ///
    /// System metadata is merged key by key without replacing recorded
    /// values; see [`factory_core::RunMetadata::merge`].
    pub async fn update(
        &self,
        project_slug: &str,
        update: &UpdateRunRequest,
    ) -> Result<ProvisionRun, DbError> {
        let mut run = self.get(project_slug).await?;
        run.apply(update);
        let row = ProvisionRunRow::try_from(&run)?;

        let result = sqlx::query(
            r#"
            UPDATE provision_runs
            SET state = ?, metadata = ?, error = ?, failed_state = ?, updated_at = ?
            WHERE project_slug = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&row.state)
        .bind(&row.metadata)
        .bind(&row.error)
        .bind(&row.failed_state)
        .bind(row.updated_at)
        .bind(&row.project_slug)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::RunNotFound(project_slug.to_string()));
        }

        Ok(run)
    }

    /// Soft-deletes the run. External resources are left untouched.
    pub async fn delete(&self, project_slug: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE provision_runs SET deleted_at = ? WHERE project_slug = ? AND deleted_at IS NULL",
        )
        .bind(datetime_to_timestamp(Utc::now()))
        .bind(project_slug)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Hard-deletes soft-deleted runs removed before `before`.
    pub async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query(
            "DELETE FROM provision_runs WHERE deleted_at IS NOT NULL AND deleted_at < ?",
        )
        .bind(datetime_to_timestamp(before))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
