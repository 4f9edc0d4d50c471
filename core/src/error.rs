use thiserror::Error;

#[derive(Error, Debug)]
pub enum FraudError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signal ingestion failed for edge {edge}: {source}")]
    SignalIngestion {
        edge: String,
        #[source]
        source: Box<FraudError>,
    },

    #[error("Detector '{detector}' failed: {source}")]
    Detection {
        detector: &'static str,
        #[source]
        source: Box<FraudError>,
    },

    #[error("Enforcement failed for user {user}: {source}")]
    EnforcementApplication {
        user: String,
        #[source]
        source: Box<FraudError>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type FraudResult<T> = Result<T, FraudError>;
