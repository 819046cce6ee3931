use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Provision run not found: {0}")]
    RunNotFound(String),

    #[error("Provision run already exists: {0}")]
    AlreadyExists(String),

    #[error("Corrupt provision run {slug}: {reason}")]
    Corrupt { slug: String, reason: String },
}
