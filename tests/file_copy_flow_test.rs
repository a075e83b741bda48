use anyhow::Result;
use async_trait::async_trait;
use httpmock::prelude::*;
use mgn_automation::adapters::factory::{authenticate, http_client};
use mgn_automation::adapters::remote::collect_upload_files;
use mgn_automation::adapters::{FactoryClient, NoPrompter};
use mgn_automation::core::credentials::CredentialResolver;
use mgn_automation::core::{Credentials, FactoryApi, PostLaunchCopier, SecretStore};
use mgn_automation::{CopyOptions, FactoryEndpoints, PostLaunchCopy, Settings};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

struct Secrets(HashMap<String, String>);

#[async_trait]
impl SecretStore for Secrets {
    async fn secret_string(&self, name: &str) -> mgn_automation::Result<Option<String>> {
        Ok(self.0.get(name).cloned())
    }
}

/// Records what would be pushed to each host instead of spawning ssh or PowerShell.
#[derive(Clone, Default)]
struct DryRunCopier {
    pushed: Arc<Mutex<Vec<(String, String, usize)>>>,
}

#[async_trait]
impl PostLaunchCopier for DryRunCopier {
    async fn copy_to_windows(
        &self,
        fqdn: &str,
        creds: &Credentials,
        _source: &str,
    ) -> mgn_automation::Result<()> {
        self.pushed
            .lock()
            .unwrap()
            .push((fqdn.to_string(), creds.username.clone(), 0));
        Ok(())
    }

    async fn copy_to_linux(
        &self,
        fqdn: &str,
        creds: &Credentials,
        source: &Path,
    ) -> mgn_automation::Result<()> {
        let files = collect_upload_files(source)?;
        self.pushed
            .lock()
            .unwrap()
            .push((fqdn.to_string(), creds.username.clone(), files.len()));
        Ok(())
    }
}

#[tokio::test]
async fn test_file_copy_end_to_end() -> Result<()> {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST).path("/prod/login");
            then.status(200).json_body(serde_json::json!("session-token"));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/prod/user/apps")
                .header("Authorization", "session-token");
            then.status(200).json_body(serde_json::json!([
                {"app_id": "1", "app_name": "web", "wave_id": "7", "aws_accountid": "111122223333", "aws_region": "us-east-1"}
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/prod/user/servers")
                .header("Authorization", "session-token");
            then.status(200).json_body(serde_json::json!([
                {"server_id": "1", "server_name": "win01", "server_fqdn": "win01.corp.local", "app_id": "1", "server_os_family": "windows", "r_type": "Rehost"},
                {"server_id": "2", "server_name": "lnx01", "server_fqdn": "lnx01.corp.local", "app_id": "1", "server_os_family": "linux", "r_type": "Rehost", "secret_name": "lnx01-ssh"}
            ]));
        })
        .await;

    let workdir = TempDir::new()?;
    let endpoints_path = workdir.path().join("FactoryEndpoints.json");
    std::fs::write(
        &endpoints_path,
        serde_json::json!({
            "UserApiUrl": server.base_url(),
            "LoginApi": server.base_url(),
            "Region": "us-east-1",
            "UserPoolId": "us-east-1_pool"
        })
        .to_string(),
    )?;
    let scripts = workdir.path().join("scripts");
    std::fs::create_dir(&scripts)?;
    std::fs::write(scripts.join("10-hostname.sh"), "#!/bin/sh\n")?;
    std::fs::write(scripts.join("20-agent.sh"), "#!/bin/sh\n")?;

    let settings = Settings::load(None)?;
    let endpoints = FactoryEndpoints::from_file(&endpoints_path)?;
    let secrets = Secrets(HashMap::from([
        (
            "MFServiceAccount-us-east-1_pool".to_string(),
            r#"{"username": "svc", "password": "pw"}"#.to_string(),
        ),
        (
            "windows-admin".to_string(),
            r#"{"USERNAME": "Administrator", "PASSWORD": "pw", "SECRET_TYPE": "OS"}"#.to_string(),
        ),
        (
            "lnx01-ssh".to_string(),
            r#"{"USERNAME": "ec2-user", "PASSWORD": "-----BEGIN KEY-----", "IS_SSH_KEY": "true"}"#
                .to_string(),
        ),
    ]));

    let http = http_client(Duration::from_secs(settings.factory.request_timeout_seconds))?;
    let token = authenticate(&http, &endpoints, &secrets, &NoPrompter, false).await?;
    login.assert_async().await;

    let client = FactoryClient::new(http, endpoints.user_api()?, token);
    let wave = client.fetch_wave_servers("7", &settings.factory.r_type).await?;

    let copier = DryRunCopier::default();
    let runner = PostLaunchCopy::new(
        CredentialResolver::new(secrets, NoPrompter, false),
        copier.clone(),
        CopyOptions {
            windows_source: Some(r"c:\scripts".to_string()),
            linux_source: Some(scripts),
            windows_secret: Some("windows-admin".to_string()),
            linux_secret: None,
        },
    );
    let summary = runner.run(&wave).await;

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.copied, vec!["win01.corp.local", "lnx01.corp.local"]);
    let pushed = copier.pushed.lock().unwrap().clone();
    assert_eq!(
        pushed,
        vec![
            ("win01.corp.local".to_string(), "win01\\Administrator".to_string(), 0),
            ("lnx01.corp.local".to_string(), "ec2-user".to_string(), 2),
        ]
    );
    Ok(())
}
