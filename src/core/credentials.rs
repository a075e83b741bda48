use crate::domain::model::{Credentials, FactoryServer, OsFamily};
use crate::domain::ports::{Prompter, SecretStore};
use crate::utils::error::{MgnError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Layout of an OS credential secret stored by the factory.
#[derive(Debug, Deserialize)]
struct OsSecret {
    #[serde(rename = "USERNAME")]
    username: String,
    #[serde(rename = "PASSWORD")]
    password: String,
    #[serde(rename = "SECRET_TYPE", default)]
    secret_type: Option<String>,
    #[serde(rename = "IS_SSH_KEY", default)]
    is_ssh_key: Option<serde_json::Value>,
}

impl OsSecret {
    fn is_ssh_key(&self) -> bool {
        match &self.is_ssh_key {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

fn parse_os_secret(name: &str, server: &str, raw: &str) -> Result<Credentials> {
    let secret: OsSecret = serde_json::from_str(raw).map_err(|e| MgnError::CredentialsError {
        server: server.to_string(),
        message: format!("secret {} is not an OS credential secret: {}", name, e),
    })?;

    if let Some(kind) = secret.secret_type.as_deref() {
        if !kind.eq_ignore_ascii_case("OS") {
            return Err(MgnError::CredentialsError {
                server: server.to_string(),
                message: format!("secret {} has type {}, expected OS", name, kind),
            });
        }
    }

    Ok(if secret.is_ssh_key() {
        Credentials::private_key(secret.username, secret.password)
    } else {
        Credentials::password(secret.username, secret.password)
    })
}

/// Finds login credentials for source servers, prompting at most once per
/// OS family when no secret applies.
pub struct CredentialResolver<S: SecretStore, P: Prompter> {
    secrets: S,
    prompter: P,
    allow_prompts: bool,
    prompted: Mutex<HashMap<OsFamily, Credentials>>,
}

impl<S: SecretStore, P: Prompter> CredentialResolver<S, P> {
    pub fn new(secrets: S, prompter: P, allow_prompts: bool) -> Self {
        Self {
            secrets,
            prompter,
            allow_prompts,
            prompted: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(
        &self,
        server: &FactoryServer,
        os: OsFamily,
        secret_override: Option<&str>,
    ) -> Result<Credentials> {
        let name = server.display_name();
        let secret_name = secret_override
            .filter(|s| !s.is_empty())
            .or(server.secret_name.as_deref().filter(|s| !s.is_empty()));

        if let Some(secret_name) = secret_name {
            tracing::debug!("Using secret {} for {}", secret_name, name);
            let raw = self
                .secrets
                .secret_string(secret_name)
                .await?
                .ok_or_else(|| MgnError::CredentialsError {
                    server: name.to_string(),
                    message: format!("secret {} not found", secret_name),
                })?;
            return parse_os_secret(secret_name, name, &raw);
        }

        if let Some(creds) = self.cached(os) {
            return Ok(creds);
        }

        if !self.allow_prompts {
            return Err(MgnError::CredentialsError {
                server: name.to_string(),
                message: "no secret configured and prompts are disabled".to_string(),
            });
        }

        let creds = self.prompt(os)?;
        self.prompted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(os, creds.clone());
        Ok(creds)
    }

    fn cached(&self, os: OsFamily) -> Option<Credentials> {
        // The map is only ever inserted into whole, so a poisoned lock still
        // holds complete entries.
        self.prompted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&os)
            .cloned()
    }

    fn prompt(&self, os: OsFamily) -> Result<Credentials> {
        let username = self.prompter.input(&format!("{} username", os))?;
        if os == OsFamily::Linux {
            let key_path = self
                .prompter
                .input("Private key file (leave blank to use a password)")?;
            if !key_path.trim().is_empty() {
                let key = std::fs::read_to_string(key_path.trim())?;
                return Ok(Credentials::private_key(username, key));
            }
        }
        let password = self.prompter.password(&format!("{} password", os))?;
        Ok(Credentials::password(username, password))
    }
}
