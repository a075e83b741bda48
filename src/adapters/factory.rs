use crate::config::endpoints::{FactoryEndpoints, APP_ENDPOINT, LOGIN_ENDPOINT, SERVER_ENDPOINT};
use crate::domain::model::{AccountServers, AccountTarget, FactoryApp, FactoryServer, WaveServers};
use crate::domain::ports::{FactoryApi, Prompter, SecretStore};
use crate::utils::error::{MgnError, Result};
use crate::utils::validation;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Deserialize)]
struct ServiceAccount {
    username: String,
    password: String,
}

pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Logs in to the migration factory and returns the session token. The
/// service account comes from Secrets Manager when available, otherwise
/// from the operator.
pub async fn authenticate<S: SecretStore, P: Prompter>(
    client: &Client,
    endpoints: &FactoryEndpoints,
    secrets: &S,
    prompter: &P,
    allow_prompts: bool,
) -> Result<String> {
    let login_api = endpoints.login_api()?;

    let mut account = None;
    if let Some(secret_name) = endpoints.service_account_secret() {
        if let Some(raw) = secrets.secret_string(&secret_name).await? {
            tracing::debug!("Using service account from secret {}", secret_name);
            account = Some(serde_json::from_str::<ServiceAccount>(&raw)?);
        }
    }

    let account = match account {
        Some(account) => account,
        None if allow_prompts => ServiceAccount {
            username: prompter.input("Factory username")?,
            password: prompter.password("Factory password")?,
        },
        None => {
            return Err(MgnError::AuthenticationError {
                message: "no service account secret found and prompts are disabled".to_string(),
            })
        }
    };

    let url = format!("{}{}", login_api, LOGIN_ENDPOINT);
    tracing::debug!("Logging in to {}", url);
    let response = client
        .post(&url)
        .json(&serde_json::json!({
            "username": account.username,
            "password": account.password,
        }))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(MgnError::AuthenticationError {
            message: format!("login returned {}: {}", status, body),
        });
    }

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::String(token)) => Ok(token),
        Ok(serde_json::Value::Object(obj)) => obj
            .get("token")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| MgnError::AuthenticationError {
                message: "login response does not contain a token".to_string(),
            }),
        _ if !body.trim().is_empty() => Ok(body.trim().to_string()),
        _ => Err(MgnError::AuthenticationError {
            message: "login response was empty".to_string(),
        }),
    }
}

async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(MgnError::AccessDeniedError {
            message: format!("{} was denied by the migration factory", action),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(MgnError::FactoryError {
            status: status.as_u16(),
            message: format!("{} failed: {}", action, body),
        });
    }
    Ok(response)
}

/// Authenticated client for the factory user API.
pub struct FactoryClient {
    client: Client,
    user_api: String,
    token: String,
}

impl FactoryClient {
    pub fn new(client: Client, user_api: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            user_api: user_api.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.user_api, path);
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.token)
            .send()
            .await?;
        let response = ensure_success(response, &format!("GET {}", path)).await?;
        Ok(response.json().await?)
    }
}

/// Groups the servers of the wave's applications by target account and
/// region, keeping the order in which the applications are listed.
pub fn group_wave_servers(
    wave_id: &str,
    r_type: &str,
    apps: Vec<FactoryApp>,
    servers: Vec<FactoryServer>,
) -> Result<WaveServers> {
    let mut accounts: Vec<AccountServers> = Vec::new();
    let mut app_index: HashMap<String, usize> = HashMap::new();

    for app in apps.into_iter().filter(|a| a.wave_id.as_deref() == Some(wave_id)) {
        let app_name = app.app_name.as_deref().unwrap_or(&app.app_id).to_string();
        let account_id = app.aws_accountid.unwrap_or_default();
        let region = app.aws_region.unwrap_or_default();
        validation::validate_aws_account_id(
            &format!("aws_accountid of app {}", app_name),
            &account_id,
        )?;
        validation::validate_aws_region(&format!("aws_region of app {}", app_name), &region)?;

        // Apps sharing an account and region share one entry, in the order
        // the first such app was listed.
        let target = AccountTarget { account_id, region };
        let index = match accounts.iter().position(|a| a.target == target) {
            Some(index) => index,
            None => {
                accounts.push(AccountServers {
                    target,
                    servers: Vec::new(),
                });
                accounts.len() - 1
            }
        };
        app_index.insert(app.app_id, index);
    }

    if app_index.is_empty() {
        return Err(MgnError::ValidationError {
            message: format!("there are no applications in wave {}", wave_id),
        });
    }

    // Servers of other waves or other migration types are dropped here.
    for server in servers {
        let rehost = server
            .r_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(r_type));
        let index = server.app_id.as_ref().and_then(|id| app_index.get(id)).copied();
        if let (true, Some(index)) = (rehost, index) {
            accounts[index].servers.push(server);
        }
    }

    // An account whose apps have no matching servers has nothing to check.
    accounts.retain(|a| !a.servers.is_empty());
    if accounts.is_empty() {
        return Err(MgnError::ValidationError {
            message: format!("there are no {} servers in wave {}", r_type, wave_id),
        });
    }

    Ok(WaveServers {
        wave_id: wave_id.to_string(),
        accounts,
    })
}

#[async_trait]
impl FactoryApi for FactoryClient {
    async fn fetch_wave_servers(&self, wave_id: &str, r_type: &str) -> Result<WaveServers> {
        let apps: Vec<FactoryApp> = self.get_json(APP_ENDPOINT).await?;
        let servers: Vec<FactoryServer> = self.get_json(SERVER_ENDPOINT).await?;
        tracing::debug!("Factory returned {} apps and {} servers", apps.len(), servers.len());

        let wave = group_wave_servers(wave_id, r_type, apps, servers)?;
        for account in &wave.accounts {
            tracing::info!("{}: {} server(s)", account.target, account.servers.len());
        }
        Ok(wave)
    }

    async fn update_migration_status(&self, server_id: &str, status: &str) -> Result<()> {
        let url = format!("{}{}/{}", self.user_api, SERVER_ENDPOINT, server_id);
        tracing::debug!("PUT {} migration_status={}", url, status);
        let response = self
            .client
            .put(&url)
            .header("Authorization", &self.token)
            .json(&serde_json::json!({ "migration_status": status }))
            .send()
            .await?;

        let response = ensure_success(response, "Update of migration_status attribute")
            .await
            .map_err(|e| match e {
                MgnError::AccessDeniedError { .. } => MgnError::AccessDeniedError {
                    message: "Access to migration_status attribute is denied".to_string(),
                },
                other => other,
            })?;

        // Only a plain 200 confirms the update.
        let status = response.status();
        if status != StatusCode::OK {
            return Err(MgnError::FactoryError {
                status: status.as_u16(),
                message: format!("Update of migration_status attribute returned {}", status),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    struct Secrets(Option<String>);

    #[async_trait]
    impl SecretStore for Secrets {
        async fn secret_string(&self, _name: &str) -> Result<Option<String>> {
            Ok(self.0.clone())
        }
    }

    struct Answers;

    impl Prompter for Answers {
        fn input(&self, _prompt: &str) -> Result<String> {
            Ok("operator".to_string())
        }

        fn password(&self, _prompt: &str) -> Result<String> {
            Ok("typed-password".to_string())
        }
    }

    fn endpoints(server: &MockServer) -> FactoryEndpoints {
        FactoryEndpoints {
            user_api_url: Some(server.base_url()),
            login_api: Some(server.base_url()),
            region: Some("us-east-1".to_string()),
            user_pool_id: Some("us-east-1_pool".to_string()),
        }
    }

    fn apps() -> serde_json::Value {
        serde_json::json!([
            {"app_id": "1", "app_name": "web", "wave_id": "5", "aws_accountid": "111122223333", "aws_region": "us-east-1"},
            {"app_id": "2", "app_name": "db", "wave_id": "5", "aws_accountid": 444455556666u64, "aws_region": "eu-west-1"},
            {"app_id": "3", "app_name": "crm", "wave_id": 5, "aws_accountid": "111122223333", "aws_region": "us-east-1"},
            {"app_id": "4", "app_name": "other", "wave_id": "6", "aws_accountid": "777788889999", "aws_region": "us-east-1"}
        ])
    }

    fn servers() -> serde_json::Value {
        serde_json::json!([
            {"server_id": "10", "server_name": "web01", "server_fqdn": "web01.corp.local", "app_id": "1", "server_os_family": "windows", "r_type": "Rehost"},
            {"server_id": "11", "server_name": "db01", "server_fqdn": "db01.corp.local", "app_id": "2", "server_os_family": "linux", "r_type": "Rehost"},
            {"server_id": "12", "server_name": "crm01", "server_fqdn": "crm01.corp.local", "app_id": "3", "server_os_family": "linux", "r_type": "rehost"},
            {"server_id": "13", "server_name": "crm02", "server_fqdn": "crm02.corp.local", "app_id": "3", "server_os_family": "linux", "r_type": "Replatform"},
            {"server_id": "14", "server_name": "oth01", "server_fqdn": "oth01.corp.local", "app_id": "4", "server_os_family": "linux", "r_type": "Rehost"}
        ])
    }

    #[tokio::test]
    async fn test_fetch_wave_servers_groups_by_account_and_region() {
        let server = MockServer::start_async().await;
        let apps_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/prod/user/apps")
                    .header("Authorization", "token-1");
                then.status(200).json_body(apps());
            })
            .await;
        let servers_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/prod/user/servers");
                then.status(200).json_body(servers());
            })
            .await;

        let client = FactoryClient::new(Client::new(), server.base_url(), "token-1");
        let wave = client.fetch_wave_servers("5", "Rehost").await.unwrap();

        apps_mock.assert_async().await;
        servers_mock.assert_async().await;
        assert_eq!(wave.accounts.len(), 2);
        assert_eq!(wave.accounts[0].target.account_id, "111122223333");
        let names: Vec<&str> = wave.accounts[0]
            .servers
            .iter()
            .map(|s| s.server_name.as_str())
            .collect();
        assert_eq!(names, vec!["web01", "crm01"]);
        assert_eq!(wave.accounts[1].target.region, "eu-west-1");
        assert!(wave.has_windows());
        assert!(wave.has_linux());
    }

    #[test]
    fn test_unknown_wave_is_an_error() {
        let apps = serde_json::from_value(apps()).unwrap();
        let servers = serde_json::from_value(servers()).unwrap();
        let err = group_wave_servers("99", "Rehost", apps, servers).unwrap_err();
        assert!(err.to_string().contains("no applications in wave 99"));
    }

    #[test]
    fn test_invalid_account_id_is_an_error() {
        let apps = serde_json::from_value(serde_json::json!([
            {"app_id": "1", "wave_id": "1", "aws_accountid": "1234", "aws_region": "us-east-1"}
        ]))
        .unwrap();
        let err = group_wave_servers("1", "Rehost", apps, Vec::new()).unwrap_err();
        assert!(matches!(err, MgnError::InvalidConfigValueError { .. }));
    }

    #[tokio::test]
    async fn test_unauthorized_listing_is_access_denied() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/prod/user/apps");
                then.status(401);
            })
            .await;

        let client = FactoryClient::new(Client::new(), server.base_url(), "expired");
        let err = client.fetch_wave_servers("5", "Rehost").await.unwrap_err();
        assert!(matches!(err, MgnError::AccessDeniedError { .. }));
    }

    #[tokio::test]
    async fn test_update_migration_status() {
        let server = MockServer::start_async().await;
        let update = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/prod/user/servers/10")
                    .header("Authorization", "token-1")
                    .json_body(serde_json::json!({"migration_status": "2/2 status checks : Passed"}));
                then.status(200);
            })
            .await;
        let denied = server
            .mock_async(|when, then| {
                when.method(PUT).path("/prod/user/servers/11");
                then.status(401);
            })
            .await;
        let broken = server
            .mock_async(|when, then| {
                when.method(PUT).path("/prod/user/servers/12");
                then.status(500).body("boom");
            })
            .await;
        let accepted = server
            .mock_async(|when, then| {
                when.method(PUT).path("/prod/user/servers/13");
                then.status(202);
            })
            .await;

        let base_url = format!("{}/", server.base_url());
        let client = FactoryClient::new(Client::new(), base_url, "token-1");
        client
            .update_migration_status("10", "2/2 status checks : Passed")
            .await
            .unwrap();
        let err = client
            .update_migration_status("11", "2/2 status checks : Passed")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("migration_status attribute is denied"));
        let err = client
            .update_migration_status("12", "2/2 status checks : Failed")
            .await
            .unwrap_err();
        assert!(matches!(err, MgnError::FactoryError { status: 500, .. }));
        let err = client
            .update_migration_status("13", "2/2 status checks : Failed")
            .await
            .unwrap_err();
        assert!(matches!(err, MgnError::FactoryError { status: 202, .. }));

        update.assert_async().await;
        denied.assert_async().await;
        broken.assert_async().await;
        accepted.assert_async().await;
    }

    #[tokio::test]
    async fn test_authenticate_with_service_account_secret() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/prod/login")
                    .json_body(serde_json::json!({"username": "svc", "password": "pw"}));
                then.status(200).json_body(serde_json::json!("id-token"));
            })
            .await;

        let secrets = Secrets(Some(r#"{"username": "svc", "password": "pw"}"#.to_string()));
        let token = authenticate(&Client::new(), &endpoints(&server), &secrets, &Answers, false)
            .await
            .unwrap();

        login.assert_async().await;
        assert_eq!(token, "id-token");
    }

    #[tokio::test]
    async fn test_authenticate_falls_back_to_prompt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/prod/login")
                    .json_body(serde_json::json!({"username": "operator", "password": "typed-password"}));
                then.status(200).json_body(serde_json::json!({"token": "prompted-token"}));
            })
            .await;

        let endpoints = endpoints(&server);
        let token = authenticate(&Client::new(), &endpoints, &Secrets(None), &Answers, true)
            .await
            .unwrap();
        assert_eq!(token, "prompted-token");
    }

    #[tokio::test]
    async fn test_authenticate_rejections() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/prod/login");
                then.status(400).body("Incorrect username or password");
            })
            .await;

        let client = Client::new();
        let endpoints = endpoints(&server);
        let no_prompt = authenticate(&client, &endpoints, &Secrets(None), &Answers, false)
            .await
            .unwrap_err();
        assert!(matches!(no_prompt, MgnError::AuthenticationError { .. }));

        let rejected = authenticate(&client, &endpoints, &Secrets(None), &Answers, true)
            .await
            .unwrap_err();
        assert!(rejected.to_string().contains("Incorrect username or password"));
    }
}
