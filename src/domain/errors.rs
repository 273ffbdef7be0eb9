use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration key: {0}")]
    MissingKey(&'static str),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Topic not registered on this bus: {0}")]
    UnknownTopic(String),

    #[error("Failed to encode payload for topic {topic}: {source}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Subscription to topic {0} closed")]
    Closed(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("Quantity must be a positive whole number, got {0}")]
    InvalidQuantity(i64),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("No market price available for {0}")]
    NoMarketPrice(String),

    #[error("No open position in {0} to sell")]
    NoPosition(String),

    #[error("No portfolio registered for {0}")]
    UnknownPortfolio(String),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient cash: required {required:.2}, available {available:.2}")]
    InsufficientCash { required: f64, available: f64 },

    #[error("No open position in {0}")]
    NoPosition(String),
}
