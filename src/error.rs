use thiserror::Error;

/// Failures raised by the aggregation and summarization core and the
/// validation of inputs handed to it.
#[derive(Error, Debug, PartialEq)]
pub enum CoreError {
    #[error("Missing animalId")]
    MissingAnimalId,

    #[error("Invalid animalId: {0}")]
    InvalidAnimalId(String),

    #[error("Unknown activity level: {0}")]
    UnknownActivityLevel(String),

    #[error("Unknown {field}: {value}")]
    UnknownVariant { field: &'static str, value: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}
