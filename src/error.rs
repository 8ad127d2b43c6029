use thiserror::Error;

/// Domain failures raised inside the wrappers.
///
/// These never cross a public operation: [`crate::guard`] logs them and turns
/// them into an empty result.
#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Api key is required")]
    MissingApiKey,

    #[error("Invalid vehicle type: {0} (1 for bus, 2 for tram)")]
    InvalidVehicleType(u8),

    #[error("Invalid measure units: {0}")]
    InvalidUnit(String),

    #[error("Empty {0}")]
    EmptyInput(&'static str),

    #[error("API error: {0}")]
    Api(String),

    #[error("Malformed GPGGA sentence: {0}")]
    MalformedSentence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
