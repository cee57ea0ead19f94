use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// All engine errors, categorized by domain.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // ── Configuration ──
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    // ── Sizing ──
    #[error("Volume {requested} normalizes to zero")]
    ZeroVolume { requested: Decimal },

    // ── Basket lifecycle ──
    #[error("Basket already open: {0}")]
    BasketAlreadyOpen(String),

    #[error("Order {0} still in flight")]
    OrderInFlight(Uuid),

    // ── Execution ──
    #[error("Order {order_id} rejected: {reason}")]
    ExecutionRejected { order_id: Uuid, reason: String },

    #[error("Cancel of order {order_id} failed: {reason}")]
    CancelFailed { order_id: Uuid, reason: String },

    // ── Ledger ──
    #[error("Inconsistent fill: {unmatched} of {requested} could not be matched")]
    InconsistentFill { requested: Decimal, unmatched: Decimal },

    // ── Serialization ──
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ── Files ──
    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Failed to write file: {0}")]
    FileWrite(String),
}

/// Serializable error response for the host.
#[derive(Debug, Serialize, Clone)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        let code = match err {
            EngineError::InvalidConfig(_) => "INVALID_CONFIG",
            EngineError::InvalidInstrument(_) => "INVALID_INSTRUMENT",
            EngineError::ZeroVolume { .. } => "ZERO_VOLUME",
            EngineError::BasketAlreadyOpen(_) => "BASKET_ALREADY_OPEN",
            EngineError::OrderInFlight(_) => "ORDER_IN_FLIGHT",
            EngineError::ExecutionRejected { .. } => "EXECUTION_REJECTED",
            EngineError::CancelFailed { .. } => "CANCEL_FAILED",
            EngineError::InconsistentFill { .. } => "INCONSISTENT_FILL",
            EngineError::Serialization(_) => "SERIALIZATION",
            EngineError::FileRead(_) => "FILE_READ",
            EngineError::FileWrite(_) => "FILE_WRITE",
        };
        ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

// Hosts forward errors as structured payloads.
impl Serialize for EngineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let response = ErrorResponse::from(self);
        response.serialize(serializer)
    }
}

// ── Conversions from external errors ──

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::FileRead(err.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::FileWrite(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_response_code() {
        let err = EngineError::ZeroVolume {
            requested: dec!(0.004),
        };
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "ZERO_VOLUME");
        assert!(response.message.contains("0.004"));
    }

    #[test]
    fn test_error_serializes_as_response() {
        let err = EngineError::InvalidConfig("max_orders must be positive".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_CONFIG");
        assert_eq!(
            json["message"],
            "Invalid configuration: max_orders must be positive"
        );
    }
}
