use crate::domain::model::{AccountTarget, InstanceHealth, SourceServer};
use crate::domain::ports::{MigrationCloud, SecretStore};
use crate::utils::error::{MgnError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::config::SharedCredentialsProvider;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

fn cloud_error(service: &str, account: &AccountTarget, err: impl std::fmt::Display) -> MgnError {
    MgnError::CloudError {
        service: service.to_string(),
        account: account.account_id.clone(),
        region: account.region.clone(),
        message: err.to_string(),
    }
}

/// Session name for assumed roles: the part of the caller ARN after the
/// first `/` (the user or role name), falling back to a fixed name.
pub fn session_name_from_arn(arn: &str) -> String {
    arn.split('/')
        .nth(1)
        .filter(|s| !s.is_empty())
        .unwrap_or("mgn-automation")
        .to_string()
}

pub async fn load_base_config(region: Option<&str>) -> SdkConfig {
    let loader = aws_config::defaults(BehaviorVersion::latest());
    match region {
        Some(region) => loader.region(Region::new(region.to_string())).load().await,
        None => loader.load().await,
    }
}

/// Reaches each target account through the factory automation role.
///
/// A round lists source servers and then reads instance health for the same
/// account, so the role assumed for the listing is handed over to the health
/// lookup and the role is assumed once per account per round.
pub struct AwsGateway {
    base: SdkConfig,
    role_name: String,
    assumed: Mutex<HashMap<AccountTarget, SdkConfig>>,
}

impl AwsGateway {
    pub fn new(base: SdkConfig, role_name: impl Into<String>) -> Self {
        Self {
            base,
            role_name: role_name.into(),
            assumed: Mutex::new(HashMap::new()),
        }
    }

    fn take_assumed(&self, account: &AccountTarget) -> Option<SdkConfig> {
        self.assumed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(account)
    }

    fn keep_assumed(&self, account: &AccountTarget, config: SdkConfig) {
        self.assumed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.clone(), config);
    }

    async fn assume_role(&self, account: &AccountTarget) -> Result<SdkConfig> {
        let sts_config = aws_sdk_sts::config::Builder::from(&self.base)
            .region(Region::new(account.region.clone()))
            .build();
        let sts = aws_sdk_sts::Client::from_conf(sts_config);

        let identity = sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| cloud_error("sts:GetCallerIdentity", account, e.into_service_error()))?;
        let session_name = session_name_from_arn(identity.arn().unwrap_or_default());

        let role_arn = format!("arn:aws:iam::{}:role/{}", account.account_id, self.role_name);
        tracing::debug!("Assuming {} as {}", role_arn, session_name);
        let assumed = sts
            .assume_role()
            .role_arn(&role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| cloud_error("sts:AssumeRole", account, e.into_service_error()))?;

        let creds = assumed
            .credentials()
            .ok_or_else(|| cloud_error("sts:AssumeRole", account, "no credentials returned"))?;
        let credentials = aws_sdk_sts::config::Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            None,
            "mgn-automation-assumed-role",
        );

        Ok(self
            .base
            .to_builder()
            .region(Region::new(account.region.clone()))
            .credentials_provider(SharedCredentialsProvider::new(credentials))
            .build())
    }
}

#[async_trait]
impl MigrationCloud for AwsGateway {
    async fn source_servers(&self, account: &AccountTarget) -> Result<Vec<SourceServer>> {
        let config = self.assume_role(account).await?;
        let mgn = aws_sdk_mgn::Client::new(&config);
        self.keep_assumed(account, config);

        let mut items = mgn.describe_source_servers().into_paginator().items().send();
        let mut servers = Vec::new();
        while let Some(item) = items.next().await {
            let item = item.map_err(|e| {
                cloud_error("mgn:DescribeSourceServers", account, e.into_service_error())
            })?;
            let hints = item
                .source_properties()
                .and_then(|p| p.identification_hints());
            servers.push(SourceServer {
                source_server_id: item.source_server_id().unwrap_or_default().to_string(),
                hostname: hints.and_then(|h| h.hostname()).map(str::to_string),
                fqdn: hints.and_then(|h| h.fqdn()).map(str::to_string),
                archived: item.is_archived().unwrap_or(false),
                launched_instance_id: item
                    .launched_instance()
                    .and_then(|l| l.ec2_instance_id())
                    .map(str::to_string),
            });
        }

        tracing::debug!("{}: {} MGN source servers", account, servers.len());
        Ok(servers)
    }

    async fn instance_health(
        &self,
        account: &AccountTarget,
        instance_ids: &[String],
    ) -> Result<Vec<InstanceHealth>> {
        let config = match self.take_assumed(account) {
            Some(config) => config,
            None => self.assume_role(account).await?,
        };
        let ec2 = aws_sdk_ec2::Client::new(&config);

        let mut statuses = ec2
            .describe_instance_status()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .include_all_instances(true)
            .into_paginator()
            .items()
            .send();

        let mut health = Vec::new();
        while let Some(status) = statuses.next().await {
            let status = match status {
                Ok(status) => status,
                Err(err) => {
                    // Ids recorded by MGN disappear when the launch is reverted.
                    let code = err.as_service_error().and_then(|e| e.code());
                    if code == Some("InvalidInstanceID.NotFound") {
                        return Err(MgnError::TargetsTerminatedError {
                            account: account.account_id.clone(),
                            region: account.region.clone(),
                        });
                    }
                    return Err(cloud_error(
                        "ec2:DescribeInstanceStatus",
                        account,
                        err.into_service_error(),
                    ));
                }
            };

            health.push(InstanceHealth {
                instance_id: status.instance_id().unwrap_or_default().to_string(),
                state: status
                    .instance_state()
                    .and_then(|s| s.name())
                    .map(|n| n.as_str().to_string())
                    .unwrap_or_default(),
                instance_status: status
                    .instance_status()
                    .and_then(|s| s.status())
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                system_status: status
                    .system_status()
                    .and_then(|s| s.status())
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
            });
        }

        Ok(health)
    }
}

/// Secrets Manager in the factory's home region.
pub struct AwsSecrets {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecrets {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_secretsmanager::Client::new(config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecrets {
    async fn secret_string(&self, name: &str) -> Result<Option<String>> {
        match self.client.get_secret_value().secret_id(name).send().await {
            Ok(output) => Ok(output.secret_string().map(str::to_string)),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_resource_not_found_exception() {
                    tracing::debug!("Secret {} not found", name);
                    Ok(None)
                } else {
                    Err(MgnError::CredentialsError {
                        server: name.to_string(),
                        message: format!("unable to read secret: {}", err),
                    })
                }
            }
        }
    }
}
