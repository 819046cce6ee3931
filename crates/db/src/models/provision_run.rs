use chrono::{DateTime, TimeZone, Utc};
use factory_core::{ProvisionRun, ProvisionState, RunMetadata};
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProvisionRunRow {
    pub id: String,
    pub project_slug: String,
    pub state: String,
    pub metadata: String,
    pub error: Option<String>,
    pub failed_state: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ProvisionRunRow {
    pub fn into_domain(self) -> Result<ProvisionRun, DbError> {
        let corrupt = |reason: String| DbError::Corrupt {
            slug: self.project_slug.clone(),
            reason,
        };

        let state = ProvisionState::parse(&self.state)
            .ok_or_else(|| corrupt(format!("unknown state {}", self.state)))?;
        let metadata: RunMetadata = serde_json::from_str(&self.metadata)
            .map_err(|e| corrupt(format!("unreadable metadata: {}", e)))?;
        let failed_state = match &self.failed_state {
            Some(s) => Some(
                ProvisionState::parse(s)
                    .ok_or_else(|| corrupt(format!("unknown failed state {}", s)))?,
            ),
            None => None,
        };

        Ok(ProvisionRun {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            project_slug: self.project_slug,
            state,
            metadata,
            error: self.error,
            failed_state,
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
        })
    }
}

impl TryFrom<&ProvisionRun> for ProvisionRunRow {
    type Error = DbError;

    fn try_from(run: &ProvisionRun) -> Result<Self, Self::Error> {
        let metadata = serde_json::to_string(&run.metadata).map_err(|e| DbError::Corrupt {
            slug: run.project_slug.clone(),
            reason: format!("unserializable metadata: {}", e),
        })?;

        Ok(Self {
            id: run.id.to_string(),
            project_slug: run.project_slug.clone(),
            state: run.state.as_str().to_string(),
            metadata,
            error: run.error.clone(),
            failed_state: run.failed_state.map(|s| s.as_str().to_string()),
            created_at: datetime_to_timestamp(run.created_at),
            updated_at: datetime_to_timestamp(run.updated_at),
        })
    }
}

pub(crate) fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

pub(crate) fn datetime_to_timestamp(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}
