use crate::core::credentials::CredentialResolver;
use crate::domain::model::{FactoryServer, OsFamily, WaveServers};
use crate::domain::ports::{PostLaunchCopier, Prompter, SecretStore};
use crate::utils::error::{MgnError, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub windows_source: Option<String>,
    pub linux_source: Option<PathBuf>,
    pub windows_secret: Option<String>,
    pub linux_secret: Option<String>,
}

#[derive(Debug, Default)]
pub struct CopySummary {
    pub copied: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl CopySummary {
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() {
            0
        } else {
            1
        }
    }
}

/// Pushes post-launch scripts to every server of a wave, one server at a time.
pub struct PostLaunchCopy<S: SecretStore, P: Prompter, R: PostLaunchCopier> {
    resolver: CredentialResolver<S, P>,
    copier: R,
    options: CopyOptions,
}

impl<S: SecretStore, P: Prompter, R: PostLaunchCopier> PostLaunchCopy<S, P, R> {
    pub fn new(resolver: CredentialResolver<S, P>, copier: R, options: CopyOptions) -> Self {
        Self {
            resolver,
            copier,
            options,
        }
    }

    pub async fn run(&self, wave: &WaveServers) -> CopySummary {
        let mut summary = CopySummary::default();

        if let Some(source) = self.options.windows_source.as_deref() {
            if wave.has_windows() {
                for server in wave.accounts.iter().flat_map(|a| a.windows()) {
                    let result = self.copy_windows(server, source).await;
                    record(&mut summary, server, result);
                }
            } else {
                tracing::warn!("⚠️ There is no Windows server in Wave {}", wave.wave_id);
            }
        }

        if let Some(source) = self.options.linux_source.as_ref() {
            if wave.has_linux() {
                for server in wave.accounts.iter().flat_map(|a| a.linux()) {
                    let result = self.copy_linux(server, source).await;
                    record(&mut summary, server, result);
                }
            } else {
                tracing::warn!("⚠️ There is no Linux server in Wave {}", wave.wave_id);
            }
        }

        summary
    }

    async fn copy_windows(&self, server: &FactoryServer, source: &str) -> Result<()> {
        let fqdn = require_fqdn(server)?;
        let mut creds = self
            .resolver
            .resolve(server, OsFamily::Windows, self.options.windows_secret.as_deref())
            .await?;

        let (username, local) = qualify_windows_username(&creds.username, fqdn);
        if local {
            tracing::info!("Using local account to connect: {}", username);
        } else {
            tracing::info!("Using domain account to connect: {}", username);
        }
        creds.username = username;

        self.copier.copy_to_windows(fqdn, &creds, source).await
    }

    async fn copy_linux(&self, server: &FactoryServer, source: &Path) -> Result<()> {
        let fqdn = require_fqdn(server)?;
        let creds = self
            .resolver
            .resolve(server, OsFamily::Linux, self.options.linux_secret.as_deref())
            .await?;
        self.copier.copy_to_linux(fqdn, &creds, source).await
    }
}

fn require_fqdn(server: &FactoryServer) -> Result<&str> {
    server
        .server_fqdn
        .as_deref()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| MgnError::ValidationError {
            message: format!("server_fqdn does not exist for server: {}", server.server_name),
        })
}

fn record(summary: &mut CopySummary, server: &FactoryServer, result: Result<()>) {
    let name = server.display_name().to_string();
    match result {
        Ok(()) => {
            tracing::info!("✅ Task completed for server: {}", name);
            summary.copied.push(name);
        }
        Err(e) => {
            tracing::error!("❌ Unable to copy files to {} due to {}", name, e);
            summary.failed.push((name, e.to_string()));
        }
    }
}

/// A bare username is a local account on the target: prefix it with the
/// server's short host name. Returns the name and whether it is local.
pub fn qualify_windows_username(username: &str, fqdn: &str) -> (String, bool) {
    if username.contains('\\') || username.contains('@') {
        return (username.to_string(), false);
    }
    let host = fqdn.split('.').next().unwrap_or(fqdn);
    (format!("{}\\{}", host, username), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AccountServers, AccountTarget, Credentials};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct NoSecrets;

    #[async_trait]
    impl SecretStore for NoSecrets {
        async fn secret_string(&self, _name: &str) -> Result<Option<String>> {
            Ok(Some(r#"{"USERNAME":"Administrator","PASSWORD":"pw"}"#.to_string()))
        }
    }

    struct NoPrompt;

    impl Prompter for NoPrompt {
        fn input(&self, _prompt: &str) -> Result<String> {
            Err(MgnError::config("prompting disabled"))
        }

        fn password(&self, _prompt: &str) -> Result<String> {
            Err(MgnError::config("prompting disabled"))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingCopier {
        calls: Arc<Mutex<Vec<(String, String)>>>,
        failing_hosts: Vec<String>,
    }

    #[async_trait]
    impl PostLaunchCopier for RecordingCopier {
        async fn copy_to_windows(
            &self,
            fqdn: &str,
            creds: &Credentials,
            _source: &str,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((fqdn.to_string(), creds.username.clone()));
            if self.failing_hosts.iter().any(|h| h == fqdn) {
                return Err(MgnError::RemoteCommandError {
                    host: fqdn.to_string(),
                    message: "ErrorId: PSSessionOpenFailed".to_string(),
                });
            }
            Ok(())
        }

        async fn copy_to_linux(
            &self,
            fqdn: &str,
            creds: &Credentials,
            _source: &Path,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((fqdn.to_string(), creds.username.clone()));
            Ok(())
        }
    }

    fn server(id: &str, name: &str, os: &str, secret: Option<&str>) -> FactoryServer {
        FactoryServer {
            server_id: id.to_string(),
            server_name: name.to_string(),
            server_fqdn: Some(format!("{}.corp.local", name)),
            app_id: Some("1".to_string()),
            server_os_family: Some(os.to_string()),
            r_type: Some("Rehost".to_string()),
            secret_name: secret.map(str::to_string),
        }
    }

    fn wave(servers: Vec<FactoryServer>) -> WaveServers {
        WaveServers {
            wave_id: "4".to_string(),
            accounts: vec![AccountServers {
                target: AccountTarget {
                    account_id: "111122223333".to_string(),
                    region: "us-east-1".to_string(),
                },
                servers,
            }],
        }
    }

    #[test]
    fn test_qualify_windows_username() {
        assert_eq!(
            qualify_windows_username("Administrator", "web01.corp.local"),
            ("web01\\Administrator".to_string(), true)
        );
        assert_eq!(
            qualify_windows_username("CORP\\svc", "web01.corp.local"),
            ("CORP\\svc".to_string(), false)
        );
        assert_eq!(
            qualify_windows_username("svc@corp.local", "web01"),
            ("svc@corp.local".to_string(), false)
        );
    }

    #[tokio::test]
    async fn test_copies_only_requested_os_and_collects_failures() {
        let copier = RecordingCopier {
            failing_hosts: vec!["win02.corp.local".to_string()],
            ..Default::default()
        };
        let resolver = CredentialResolver::new(NoSecrets, NoPrompt, false);
        let runner = PostLaunchCopy::new(
            resolver,
            copier.clone(),
            CopyOptions {
                windows_source: Some(r"c:\scripts".to_string()),
                windows_secret: Some("win-secret".to_string()),
                ..Default::default()
            },
        );

        let summary = runner
            .run(&wave(vec![
                server("1", "win01", "windows", None),
                server("2", "win02", "windows", None),
                server("3", "lnx01", "linux", None),
            ]))
            .await;

        assert_eq!(summary.copied, vec!["win01.corp.local"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "win02.corp.local");
        assert_eq!(summary.exit_code(), 1);

        let calls: HashMap<String, String> = copier.calls.lock().unwrap().iter().cloned().collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls["win01.corp.local"], "win01\\Administrator");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_only_that_server() {
        struct Secrets;

        #[async_trait]
        impl SecretStore for Secrets {
            async fn secret_string(&self, name: &str) -> Result<Option<String>> {
                Ok((name == "lnx-secret")
                    .then(|| r#"{"USERNAME":"ec2-user","PASSWORD":"pw"}"#.to_string()))
            }
        }

        let copier = RecordingCopier::default();
        let runner = PostLaunchCopy::new(
            CredentialResolver::new(Secrets, NoPrompt, false),
            copier.clone(),
            CopyOptions {
                linux_source: Some(PathBuf::from("/tmp/scripts")),
                ..Default::default()
            },
        );

        let summary = runner
            .run(&wave(vec![
                server("1", "lnx01", "linux", Some("lnx-secret")),
                server("2", "lnx02", "linux", None),
            ]))
            .await;

        assert_eq!(summary.copied, vec!["lnx01.corp.local"]);
        assert_eq!(summary.failed[0].0, "lnx02.corp.local");
        assert_eq!(copier.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wave_without_requested_os_copies_nothing() {
        let copier = RecordingCopier::default();
        let runner = PostLaunchCopy::new(
            CredentialResolver::new(NoSecrets, NoPrompt, false),
            copier.clone(),
            CopyOptions {
                linux_source: Some(PathBuf::from("/tmp/scripts")),
                ..Default::default()
            },
        );

        let summary = runner
            .run(&wave(vec![server("1", "win01", "windows", None)]))
            .await;

        assert!(summary.copied.is_empty());
        assert_eq!(summary.exit_code(), 0);
        assert!(copier.calls.lock().unwrap().is_empty());
    }
}
