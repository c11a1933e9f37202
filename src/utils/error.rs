use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Network architecture mismatch: {message}")]
    ArchitectureError { message: String },

    #[error("Simulation failed: {message}")]
    SimulationError { message: String },

    #[error("Evolution failed at generation {generation}: {message}")]
    EvolutionError { generation: usize, message: String },

    #[error("Experiment data not found: {path}")]
    MissingDataError { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Storage,
    Model,
    Simulation,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl NavError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            NavError::ConfigValidationError { .. }
            | NavError::InvalidConfigValueError { .. }
            | NavError::MissingConfigError { .. } => ErrorCategory::Configuration,
            NavError::IoError(_)
            | NavError::CsvError(_)
            | NavError::SerializationError(_)
            | NavError::MissingDataError { .. } => ErrorCategory::Storage,
            NavError::ArchitectureError { .. } => ErrorCategory::Model,
            NavError::SimulationError { .. } | NavError::EvolutionError { .. } => {
                ErrorCategory::Simulation
            }
            NavError::TaskError(_) => ErrorCategory::Runtime,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Model => ErrorSeverity::High,
            ErrorCategory::Simulation => ErrorSeverity::Medium,
            ErrorCategory::Runtime => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            NavError::ConfigValidationError { .. } | NavError::InvalidConfigValueError { .. } => {
                "Check the TOML configuration against the documented sections and value ranges"
            }
            NavError::MissingConfigError { .. } => "Add the missing key to the configuration file",
            NavError::ArchitectureError { .. } => {
                "Make sure the parameter vector was produced with the same [network] settings"
            }
            NavError::MissingDataError { .. } => {
                "Run `navsim evolve` for this experiment first or fix the experiment name"
            }
            NavError::IoError(_) | NavError::CsvError(_) | NavError::SerializationError(_) => {
                "Verify the output directory exists and is writable"
            }
            NavError::SimulationError { .. } => {
                "Try a larger arena or fewer agents so that spawn positions can be found"
            }
            NavError::EvolutionError { .. } => "Inspect the logs of the failing generation and retry",
            NavError::TaskError(_) => "A worker thread panicked; rerun with --verbose for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Storage => format!("Could not read or write experiment data: {}", self),
            ErrorCategory::Model => format!("Controller could not be built: {}", self),
            ErrorCategory::Simulation => format!("Simulation did not complete: {}", self),
            ErrorCategory::Runtime => format!("Internal runtime failure: {}", self),
        }
    }

    pub(crate) fn config(field: &str, message: impl Into<String>) -> Self {
        NavError::ConfigValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
