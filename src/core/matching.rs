use crate::domain::model::{
    AccountServers, FactoryServer, InstanceHealth, SourceServer, StatusCheck, TargetInstance,
};
use crate::utils::error::{MgnError, Result};

fn eq_ignore_case(a: Option<&str>, b: &str) -> bool {
    a.is_some_and(|a| !a.is_empty() && a.eq_ignore_ascii_case(b))
}

fn is_same_server(server: &FactoryServer, source: &SourceServer) -> bool {
    if let Some(fqdn) = server.server_fqdn.as_deref() {
        if eq_ignore_case(source.fqdn.as_deref(), fqdn) {
            return true;
        }
        let short_name = fqdn.split('.').next().unwrap_or(fqdn);
        if eq_ignore_case(source.hostname.as_deref(), short_name) {
            return true;
        }
    }
    eq_ignore_case(source.hostname.as_deref(), &server.server_name)
}

/// Finds the replication source server for a factory server. MGN keeps
/// archived entries around after an agent reinstall, so a live entry wins.
pub fn find_source_server<'a>(
    server: &FactoryServer,
    source_servers: &'a [SourceServer],
) -> Option<&'a SourceServer> {
    let mut archived = None;
    for source in source_servers.iter().filter(|s| is_same_server(server, s)) {
        if !source.archived {
            return Some(source);
        }
        archived.get_or_insert(source);
    }
    archived
}

/// Resolves the launched target instance of every server in the account,
/// in the same order as `account.servers`.
pub fn resolve_targets(
    account: &AccountServers,
    source_servers: &[SourceServer],
) -> Result<Vec<TargetInstance>> {
    let mut targets = Vec::with_capacity(account.servers.len());

    for server in &account.servers {
        if server.server_fqdn.as_deref().map_or(true, str::is_empty) {
            return Err(MgnError::ValidationError {
                message: format!("server_fqdn does not exist for server: {}", server.server_name),
            });
        }

        let target = match find_source_server(server, source_servers) {
            None => TargetInstance::NotInMgn,
            Some(source) if source.archived => {
                return Err(MgnError::ArchivedServerError {
                    server: server.server_name.clone(),
                    account: account.target.account_id.clone(),
                    region: account.target.region.clone(),
                });
            }
            Some(source) => match source.launched_instance_id.as_deref() {
                Some(id) if !id.is_empty() => {
                    tracing::info!("{} : {}", server.server_name, id);
                    TargetInstance::Launched(id.to_string())
                }
                _ => {
                    tracing::warn!(
                        "Target instance does not exist for server: {}, please wait for a few minutes",
                        server.server_name
                    );
                    TargetInstance::Pending
                }
            },
        };
        targets.push(target);
    }

    Ok(targets)
}

pub fn classify(target: &TargetInstance, health: &[InstanceHealth]) -> StatusCheck {
    let instance_id = match target {
        TargetInstance::NotInMgn => return StatusCheck::NotInMgn,
        TargetInstance::Pending => return StatusCheck::TargetMissing,
        TargetInstance::Launched(id) => id,
    };

    let Some(status) = health.iter().find(|h| &h.instance_id == instance_id) else {
        return StatusCheck::Failed;
    };

    if !status.state.eq_ignore_ascii_case("running") {
        return StatusCheck::Failed;
    }

    let instance_ok = status.instance_status.eq_ignore_ascii_case("ok");
    let system_ok = status.system_status.eq_ignore_ascii_case("ok");
    if instance_ok && system_ok {
        StatusCheck::Passed
    } else if status.instance_status.eq_ignore_ascii_case("impaired") && system_ok {
        StatusCheck::Impaired
    } else {
        StatusCheck::Failed
    }
}
