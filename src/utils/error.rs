use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Extraction service returned {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Malformed extraction payload: {message}")]
    MalformedPayload { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Submission of '{file}' failed: {message}")]
    SubmissionError { file: String, message: String },

    #[error("Batch {generation} was superseded by a newer file selection")]
    BatchSuperseded { generation: u64 },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Submission,
    Export,
    Configuration,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ValidationError { .. } => ErrorCategory::Validation,
            EtlError::ApiError(_)
            | EtlError::UnexpectedStatus { .. }
            | EtlError::MalformedPayload { .. }
            | EtlError::SubmissionError { .. }
            | EtlError::BatchSuperseded { .. } => ErrorCategory::Submission,
            EtlError::ZipError(_)
            | EtlError::CsvError(_)
            | EtlError::JsonError(_)
            | EtlError::SerializationError { .. } => ErrorCategory::Export,
            EtlError::UrlError(_)
            | EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::IoError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation => ErrorSeverity::High,
            ErrorCategory::Submission => match self {
                EtlError::BatchSuperseded { .. } => ErrorSeverity::Low,
                _ => ErrorSeverity::Medium,
            },
            ErrorCategory::Export => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ValidationError { .. } => {
                "Select at most 10 files with an allowed extension and try again"
            }
            EtlError::SubmissionError { .. }
            | EtlError::ApiError(_)
            | EtlError::UnexpectedStatus { .. } => {
                "Check that the extraction service is reachable, then upload the batch again"
            }
            EtlError::MalformedPayload { .. } => {
                "The extraction service answered with an unexpected body; check the endpoint and extract path"
            }
            EtlError::BatchSuperseded { .. } => "No action needed; the newer batch is being processed",
            EtlError::SerializationError { .. } => {
                "Make sure at least one file was extracted before exporting"
            }
            EtlError::ZipError(_) | EtlError::CsvError(_) | EtlError::JsonError(_) => {
                "Retry the export; if it keeps failing, report the input that triggers it"
            }
            EtlError::UrlError(_)
            | EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Fix the configuration value and run again",
            EtlError::IoError(_) => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::ValidationError { message } => message.clone(),
            EtlError::SubmissionError { file, .. } => {
                format!("Upload failed while processing '{}'. Please try again.", file)
            }
            EtlError::SerializationError { message } => format!("Export failed: {}", message),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
