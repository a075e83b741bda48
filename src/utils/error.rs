use thiserror::Error;

#[derive(Error, Debug)]
pub enum MgnError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Settings file error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    #[error("Access denied: {message}")]
    AccessDeniedError { message: String },

    #[error("Migration factory request failed ({status}): {message}")]
    FactoryError { status: u16, message: String },

    #[error("{service} call failed in account {account} ({region}): {message}")]
    CloudError {
        service: String,
        account: String,
        region: String,
        message: String,
    },

    #[error("Target instances no longer exist in account {account} ({region})")]
    TargetsTerminatedError { account: String, region: String },

    #[error("Server {server} is archived in Application Migration Service (Account: {account}, Region: {region})")]
    ArchivedServerError {
        server: String,
        account: String,
        region: String,
    },

    #[error("Credentials for {server} unavailable: {message}")]
    CredentialsError { server: String, message: String },

    #[error("Remote command on {host} failed: {message}")]
    RemoteCommandError { host: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authentication,
    Network,
    Cloud,
    Remote,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MgnError {
    pub fn config(message: impl Into<String>) -> Self {
        MgnError::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MgnError::ConfigError { .. }
            | MgnError::MissingConfigError { .. }
            | MgnError::InvalidConfigValueError { .. }
            | MgnError::TomlError(_) => ErrorCategory::Configuration,
            MgnError::AuthenticationError { .. }
            | MgnError::AccessDeniedError { .. }
            | MgnError::CredentialsError { .. } => ErrorCategory::Authentication,
            MgnError::ApiError(_) | MgnError::FactoryError { .. } => ErrorCategory::Network,
            MgnError::CloudError { .. }
            | MgnError::TargetsTerminatedError { .. }
            | MgnError::ArchivedServerError { .. } => ErrorCategory::Cloud,
            MgnError::RemoteCommandError { .. } | MgnError::IoError(_) => ErrorCategory::Remote,
            MgnError::SerializationError(_) | MgnError::ValidationError { .. } => {
                ErrorCategory::Data
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MgnError::ApiError(_) | MgnError::CloudError { .. } => ErrorSeverity::Medium,
            MgnError::AccessDeniedError { .. } | MgnError::AuthenticationError { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MgnError::ConfigError { .. }
            | MgnError::MissingConfigError { .. }
            | MgnError::InvalidConfigValueError { .. } => {
                "Check the command line arguments and FactoryEndpoints.json"
            }
            MgnError::TomlError(_) => "Check the syntax of the settings file",
            MgnError::AuthenticationError { .. } => {
                "Verify the migration factory service account username and password"
            }
            MgnError::AccessDeniedError { .. } => {
                "Ask an administrator to grant your user access to the server attributes"
            }
            MgnError::ApiError(_) | MgnError::FactoryError { .. } => {
                "Check network connectivity to the migration factory API and retry"
            }
            MgnError::CloudError { .. } => {
                "Check that the automation role exists in the target account and can be assumed"
            }
            MgnError::TargetsTerminatedError { .. } => {
                "The launch was most likely reverted; launch the test or cutover instances again"
            }
            MgnError::ArchivedServerError { .. } => {
                "Reinstall the replication agent on the source server"
            }
            MgnError::CredentialsError { .. } => {
                "Provide a secret name or run without --no-prompts"
            }
            MgnError::RemoteCommandError { .. } | MgnError::IoError(_) => {
                "Check connectivity and permissions on the source server"
            }
            MgnError::SerializationError(_) | MgnError::ValidationError { .. } => {
                "Check the data stored in the migration factory"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Authentication => format!("Authentication problem: {}", self),
            ErrorCategory::Network => format!("Could not talk to the migration factory: {}", self),
            ErrorCategory::Cloud => format!("Cloud request failed: {}", self),
            ErrorCategory::Remote => format!("Remote operation failed: {}", self),
            ErrorCategory::Data => format!("Unexpected data: {}", self),
        }
    }

    /// Process exit code for a run aborted by this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, MgnError>;
