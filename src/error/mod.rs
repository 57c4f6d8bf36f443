use thiserror::Error;

#[derive(Error, Debug)]
pub enum HormosolError {
    /// The optimizer was given nothing to schedule
    #[error("At least one medication must be available")]
    EmptyMedications,

    /// A scalar setting is outside its valid range
    #[error("Invalid parameter: {param} = {value}")]
    InvalidParameter { param: String, value: String },

    /// Kinetic constants that cannot describe a real formulation
    #[error("Invalid medication {name}: {reason}")]
    InvalidMedication { name: String, reason: String },

    /// Ester doses are adjusted by volume, which needs the vial concentration
    #[error("No concentration (mg/mL) configured for ester {name}")]
    MissingConcentration { name: String },

    #[error("Invalid reference curve: {reason}")]
    InvalidReference { reason: String },

    #[error("Failed to set up logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HormosolError {
    pub(crate) fn invalid_parameter(param: &str, value: impl ToString) -> Self {
        HormosolError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
        }
    }
}
