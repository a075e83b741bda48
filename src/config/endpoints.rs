use crate::utils::error::{MgnError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SERVER_ENDPOINT: &str = "/prod/user/servers";
pub const APP_ENDPOINT: &str = "/prod/user/apps";
pub const LOGIN_ENDPOINT: &str = "/prod/login";

/// Contents of `FactoryEndpoints.json`, written by the factory deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactoryEndpoints {
    #[serde(rename = "UserApiUrl", default)]
    pub user_api_url: Option<String>,
    #[serde(rename = "LoginApi", default)]
    pub login_api: Option<String>,
    #[serde(rename = "Region", default)]
    pub region: Option<String>,
    #[serde(rename = "UserPoolId", default)]
    pub user_pool_id: Option<String>,
}

impl FactoryEndpoints {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MgnError::config(format!("Unable to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let endpoints: FactoryEndpoints = serde_json::from_str(content)?;
        endpoints.validate()?;
        Ok(endpoints)
    }

    pub fn user_api(&self) -> Result<&str> {
        validation::validate_required_field("UserApiUrl", &self.user_api_url)
            .map(|s| s.trim_end_matches('/'))
    }

    pub fn login_api(&self) -> Result<&str> {
        validation::validate_required_field("LoginApi", &self.login_api)
            .map(|s| s.trim_end_matches('/'))
    }

    /// Name of the secret holding the factory service account.
    pub fn service_account_secret(&self) -> Option<String> {
        self.user_pool_id
            .as_deref()
            .map(|pool| format!("MFServiceAccount-{}", pool))
    }
}

impl Validate for FactoryEndpoints {
    fn validate(&self) -> Result<()> {
        let user_api = self.user_api().map_err(|_| {
            MgnError::config("Invalid FactoryEndpoints.json file, please update UserApiUrl")
        })?;
        validation::validate_url("UserApiUrl", user_api)?;

        if let Some(login_api) = &self.login_api {
            validation::validate_url("LoginApi", login_api)?;
        }
        if let Some(region) = &self.region {
            validation::validate_aws_region("Region", region)?;
        }
        Ok(())
    }
}
