use crate::config::settings::MAX_TIMEOUT_MINUTES;
use crate::utils::error::{MgnError, Result};
use crate::utils::validation::{self, Validate};
use clap::{Args, Parser};
use std::path::PathBuf;

/// Options shared by both entry points.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Wave whose servers are processed
    #[arg(long = "wave-id", alias = "Waveid")]
    pub wave_id: String,

    /// Fail instead of prompting for missing credentials
    #[arg(long, alias = "NoPrompts")]
    pub no_prompts: bool,

    /// Path to the factory endpoints file
    #[arg(long, default_value = "FactoryEndpoints.json")]
    pub endpoints: PathBuf,

    /// Optional TOML settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

impl Validate for CommonArgs {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("wave-id", &self.wave_id)?;
        validation::validate_path("endpoints", &self.endpoints.to_string_lossy())
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "mgn-file-copy")]
#[command(about = "Copy post-launch scripts to the source servers of a wave")]
pub struct FileCopyArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Local folder (as seen by PowerShell) holding the Windows scripts
    #[arg(long, alias = "WindowsSource")]
    pub windows_source: Option<String>,

    /// Local file or folder holding the Linux scripts
    #[arg(long, alias = "LinuxSource")]
    pub linux_source: Option<PathBuf>,

    /// Secret with the credentials used for every Windows server
    #[arg(long, alias = "SecretWindows")]
    pub secret_windows: Option<String>,

    /// Secret with the credentials used for every Linux server
    #[arg(long, alias = "SecretLinux")]
    pub secret_linux: Option<String>,
}

impl FileCopyArgs {
    pub fn windows_source(&self) -> Option<&str> {
        self.windows_source.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn linux_source(&self) -> Option<&PathBuf> {
        self.linux_source
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

impl Validate for FileCopyArgs {
    fn validate(&self) -> Result<()> {
        self.common.validate()?;

        if self.windows_source().is_none() && self.linux_source().is_none() {
            return Err(MgnError::config(
                "--windows-source or --linux-source is required, provide both if you want to push files to both OS",
            ));
        }

        if let Some(source) = self.linux_source() {
            if !source.exists() {
                return Err(MgnError::InvalidConfigValueError {
                    field: "linux-source".to_string(),
                    value: source.display().to_string(),
                    reason: "Path does not exist".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "mgn-verify-instances")]
#[command(about = "Verify that launched instances pass 2/2 status checks")]
pub struct VerifyArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Override the poll interval from the settings file
    #[arg(long)]
    pub poll_interval_seconds: Option<u64>,

    /// Override the timeout from the settings file
    #[arg(long)]
    pub timeout_minutes: Option<u64>,
}

impl Validate for VerifyArgs {
    fn validate(&self) -> Result<()> {
        self.common.validate()?;
        if let Some(interval) = self.poll_interval_seconds {
            validation::validate_positive_number("poll-interval-seconds", interval, 1)?;
        }
        if let Some(timeout) = self.timeout_minutes {
            validation::validate_range("timeout-minutes", timeout, 1, MAX_TIMEOUT_MINUTES)?;
        }
        Ok(())
    }
}
