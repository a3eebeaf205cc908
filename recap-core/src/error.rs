use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecapError {
    #[error("Missing required fields: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl RecapError {
    /// True for errors caused by the request itself rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RecapError::Validation { .. }
                | RecapError::InvalidQuery(_)
                | RecapError::InvalidBody(_)
                | RecapError::Unauthorized
                | RecapError::NotFound
        )
    }
}
