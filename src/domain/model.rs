use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Accepts ids that the factory returns either as strings or as numbers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn optional_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryApp {
    #[serde(deserialize_with = "string_or_number")]
    pub app_id: String,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub wave_id: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub aws_accountid: Option<String>,
    #[serde(default)]
    pub aws_region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactoryServer {
    #[serde(deserialize_with = "string_or_number")]
    pub server_id: String,
    pub server_name: String,
    #[serde(default)]
    pub server_fqdn: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub app_id: Option<String>,
    #[serde(default, alias = "server_os")]
    pub server_os_family: Option<String>,
    #[serde(default)]
    pub r_type: Option<String>,
    #[serde(default)]
    pub secret_name: Option<String>,
}

impl FactoryServer {
    pub fn os_family(&self) -> OsFamily {
        match self.server_os_family.as_deref().map(str::to_ascii_lowercase) {
            Some(os) if os == "windows" => OsFamily::Windows,
            Some(os) if os == "linux" => OsFamily::Linux,
            _ => OsFamily::Other,
        }
    }

    /// Name used in reports: the fqdn when present, otherwise the server name.
    pub fn display_name(&self) -> &str {
        self.server_fqdn.as_deref().unwrap_or(&self.server_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Windows,
    Linux,
    Other,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Windows => write!(f, "Windows"),
            OsFamily::Linux => write!(f, "Linux"),
            OsFamily::Other => write!(f, "Other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountTarget {
    pub account_id: String,
    pub region: String,
}

impl fmt::Display for AccountTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account: {}, Region: {}", self.account_id, self.region)
    }
}

#[derive(Debug, Clone)]
pub struct AccountServers {
    pub target: AccountTarget,
    pub servers: Vec<FactoryServer>,
}

impl AccountServers {
    pub fn windows(&self) -> impl Iterator<Item = &FactoryServer> {
        self.servers
            .iter()
            .filter(|s| s.os_family() == OsFamily::Windows)
    }

    pub fn linux(&self) -> impl Iterator<Item = &FactoryServer> {
        self.servers
            .iter()
            .filter(|s| s.os_family() == OsFamily::Linux)
    }
}

#[derive(Debug, Clone)]
pub struct WaveServers {
    pub wave_id: String,
    pub accounts: Vec<AccountServers>,
}

impl WaveServers {
    pub fn has_windows(&self) -> bool {
        self.accounts.iter().any(|a| a.windows().next().is_some())
    }

    pub fn has_linux(&self) -> bool {
        self.accounts.iter().any(|a| a.linux().next().is_some())
    }

    pub fn server_count(&self) -> usize {
        self.accounts.iter().map(|a| a.servers.len()).sum()
    }
}

/// Replication source server as reported by Application Migration Service.
#[derive(Debug, Clone, Default)]
pub struct SourceServer {
    pub source_server_id: String,
    pub hostname: Option<String>,
    pub fqdn: Option<String>,
    pub archived: bool,
    pub launched_instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetInstance {
    NotInMgn,
    Pending,
    Launched(String),
}

impl TargetInstance {
    pub fn instance_id(&self) -> Option<&str> {
        match self {
            TargetInstance::Launched(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstanceHealth {
    pub instance_id: String,
    pub state: String,
    pub instance_status: String,
    pub system_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCheck {
    Passed,
    Failed,
    Impaired,
    TargetMissing,
    NotInMgn,
}

impl StatusCheck {
    pub fn migration_status(&self) -> &'static str {
        match self {
            StatusCheck::Passed => "2/2 status checks : Passed",
            StatusCheck::Failed | StatusCheck::Impaired => "2/2 status checks : Failed",
            StatusCheck::TargetMissing => "2/2 status checks : Target instance not exist",
            StatusCheck::NotInMgn => "2/2 status checks : Server not in MGN",
        }
    }

    /// Worth another round: the instance may still be booting or launching.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StatusCheck::Failed | StatusCheck::Impaired | StatusCheck::TargetMissing
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Password,
    PrivateKey,
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
    pub kind: CredentialKind,
}

impl Credentials {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: password.into(),
            kind: CredentialKind::Password,
        }
    }

    pub fn private_key(username: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: key.into(),
            kind: CredentialKind::PrivateKey,
        }
    }

    pub fn uses_key(&self) -> bool {
        self.kind == CredentialKind::PrivateKey
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("uses_key", &self.uses_key())
            .finish()
    }
}
