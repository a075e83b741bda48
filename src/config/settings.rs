use crate::utils::error::{MgnError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 120;
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 30;
pub const MAX_TIMEOUT_MINUTES: u64 = 24 * 60;
pub const DEFAULT_AUTOMATION_ROLE: &str = "CMF-MGNAutomation";

/// Optional tuning file. Every section and key has a default, so an empty
/// file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub verify: VerifySettings,
    pub aws: AwsSettings,
    pub factory: FactorySettings,
    pub linux: LinuxSettings,
    pub windows: WindowsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    pub poll_interval_seconds: u64,
    pub timeout_minutes: u64,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
        }
    }
}

impl VerifySettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    pub automation_role: String,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            automation_role: DEFAULT_AUTOMATION_ROLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorySettings {
    pub request_timeout_seconds: u64,
    pub r_type: String,
}

impl Default for FactorySettings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            r_type: "Rehost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxSettings {
    pub staging_dir: String,
    pub post_launch_dir: String,
    pub replication_user: String,
}

impl Default for LinuxSettings {
    fn default() -> Self {
        Self {
            staging_dir: "/tmp/copy_ce_files".to_string(),
            post_launch_dir: "/boot/post_launch".to_string(),
            replication_user: "aws-replication".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsSettings {
    pub post_launch_dir: String,
    pub powershell: String,
}

impl Default for WindowsSettings {
    fn default() -> Self {
        Self {
            post_launch_dir: r"c:\Program Files (x86)\AWS Replication Agent\post_launch\"
                .to_string(),
            powershell: "powershell.exe".to_string(),
        }
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Loads the file when one is given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }
}

/// Replaces `${VAR}` with the environment value, leaving unknown names intact.
fn substitute_env_vars(content: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_positive_number(
            "verify.poll_interval_seconds",
            self.verify.poll_interval_seconds,
            1,
        )?;
        validation::validate_range(
            "verify.timeout_minutes",
            self.verify.timeout_minutes,
            1,
            MAX_TIMEOUT_MINUTES,
        )?;
        validation::validate_non_empty_string("aws.automation_role", &self.aws.automation_role)?;
        validation::validate_positive_number(
            "factory.request_timeout_seconds",
            self.factory.request_timeout_seconds,
            1,
        )?;
        validation::validate_path("linux.staging_dir", &self.linux.staging_dir)?;
        validation::validate_path("linux.post_launch_dir", &self.linux.post_launch_dir)?;
        validation::validate_path("windows.post_launch_dir", &self.windows.post_launch_dir)?;

        if !self.linux.staging_dir.starts_with('/') {
            return Err(MgnError::InvalidConfigValueError {
                field: "linux.staging_dir".to_string(),
                value: self.linux.staging_dir.clone(),
                reason: "Remote directories must be absolute".to_string(),
            });
        }

        Ok(())
    }
}
