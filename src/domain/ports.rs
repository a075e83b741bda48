use crate::domain::model::{
    AccountTarget, Credentials, InstanceHealth, SourceServer, WaveServers,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Migration factory tracking API.
#[async_trait]
pub trait FactoryApi: Send + Sync {
    async fn fetch_wave_servers(&self, wave_id: &str, r_type: &str) -> Result<WaveServers>;
    async fn update_migration_status(&self, server_id: &str, status: &str) -> Result<()>;
}

/// Per-account view of Application Migration Service and EC2.
#[async_trait]
pub trait MigrationCloud: Send + Sync {
    async fn source_servers(&self, account: &AccountTarget) -> Result<Vec<SourceServer>>;
    async fn instance_health(
        &self,
        account: &AccountTarget,
        instance_ids: &[String],
    ) -> Result<Vec<InstanceHealth>>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns `None` when the secret does not exist.
    async fn secret_string(&self, name: &str) -> Result<Option<String>>;
}

pub trait Prompter: Send + Sync {
    fn input(&self, prompt: &str) -> Result<String>;
    fn password(&self, prompt: &str) -> Result<String>;
}

impl<T: Prompter + ?Sized> Prompter for Box<T> {
    fn input(&self, prompt: &str) -> Result<String> {
        (**self).input(prompt)
    }

    fn password(&self, prompt: &str) -> Result<String> {
        (**self).password(prompt)
    }
}

#[async_trait]
pub trait PostLaunchCopier: Send + Sync {
    async fn copy_to_windows(&self, fqdn: &str, creds: &Credentials, source: &str) -> Result<()>;
    async fn copy_to_linux(&self, fqdn: &str, creds: &Credentials, source: &Path) -> Result<()>;
}
