use thiserror::Error;

/// Errors produced by type construction and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("risk score {0} is outside 0..=100")]
    RiskScoreOutOfRange(u8),

    #[error("confidence {value} for typology {typology} is outside [0, 1]")]
    ConfidenceOutOfRange { typology: String, value: String },

    #[error("unknown case status: {0}")]
    UnknownStatus(String),
}
