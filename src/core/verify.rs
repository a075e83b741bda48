use crate::config::settings::VerifySettings;
use crate::core::matching::{classify, resolve_targets};
use crate::domain::model::{AccountServers, AccountTarget, StatusCheck, WaveServers};
use crate::domain::ports::{FactoryApi, MigrationCloud};
use crate::utils::error::{MgnError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct VerifyPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        VerifyPolicy::from(&VerifySettings::default())
    }
}

impl From<&VerifySettings> for VerifyPolicy {
    fn from(settings: &VerifySettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            timeout: settings.timeout(),
        }
    }
}

/// Status check results of one account for one round, keyed by display name.
#[derive(Debug, Clone)]
pub struct AccountReport {
    pub target: AccountTarget,
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub target_missing: Vec<String>,
    pub not_in_mgn: Vec<String>,
}

impl AccountReport {
    pub fn new(target: AccountTarget) -> Self {
        Self {
            target,
            passed: Vec::new(),
            failed: Vec::new(),
            target_missing: Vec::new(),
            not_in_mgn: Vec::new(),
        }
    }

    pub fn record(&mut self, name: &str, status: StatusCheck) {
        let bucket = match status {
            StatusCheck::Passed => &mut self.passed,
            StatusCheck::Failed | StatusCheck::Impaired => &mut self.failed,
            StatusCheck::TargetMissing => &mut self.target_missing,
            StatusCheck::NotInMgn => &mut self.not_in_mgn,
        };
        bucket.push(name.to_string());
    }

    pub fn failures(&self) -> usize {
        self.failed.len() + self.target_missing.len() + self.not_in_mgn.len()
    }

    /// Booting or still launching instances may pass on a later round.
    pub fn needs_retry(&self) -> bool {
        !self.failed.is_empty() || !self.target_missing.is_empty()
    }

    pub fn log(&self) {
        tracing::info!("#### In {} ####", self.target);
        if !self.passed.is_empty() {
            tracing::info!("✅ The following instances PASSED 2/2 status checks:");
            for name in &self.passed {
                tracing::info!("   {}", name);
            }
        }
        if !self.failed.is_empty() {
            tracing::warn!("⚠️ The following instances FAILED 2/2 status checks:");
            for name in &self.failed {
                tracing::warn!("   {}", name);
            }
        }
        if !self.target_missing.is_empty() {
            tracing::warn!("⚠️ The following source servers do not have a target instance:");
            for name in &self.target_missing {
                tracing::warn!("   {}", name);
            }
        }
        if !self.not_in_mgn.is_empty() {
            tracing::warn!("⚠️ The following source servers do not exist in App Mig Service:");
            for name in &self.not_in_mgn {
                tracing::warn!("   {}", name);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Passed,
    TimedOut,
    TargetsTerminated,
}

#[derive(Debug, Clone)]
pub struct VerifySummary {
    pub outcome: VerifyOutcome,
    pub rounds: u32,
    pub failures: usize,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub reports: Vec<AccountReport>,
}

impl VerifySummary {
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            VerifyOutcome::Passed => 0,
            VerifyOutcome::TimedOut | VerifyOutcome::TargetsTerminated => 1,
        }
    }
}

enum Round {
    Completed(Vec<AccountReport>),
    /// Reports of the accounts checked before the terminated one.
    TargetsTerminated(Vec<AccountReport>),
}

pub struct InstanceVerifier<F: FactoryApi, C: MigrationCloud> {
    factory: F,
    cloud: C,
    policy: VerifyPolicy,
}

impl<F: FactoryApi, C: MigrationCloud> InstanceVerifier<F, C> {
    pub fn new(factory: F, cloud: C, policy: VerifyPolicy) -> Self {
        Self {
            factory,
            cloud,
            policy,
        }
    }

    /// Polls every account of the wave until all servers pass 2/2 status
    /// checks or the timeout budget is spent.
    pub async fn run(&self, wave: &WaveServers) -> Result<VerifySummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut rounds = 0;

        loop {
            rounds += 1;
            tracing::info!("🔍 Status check round {} for wave {}", rounds, wave.wave_id);

            let reports = match self.run_round(wave).await? {
                Round::Completed(reports) => reports,
                Round::TargetsTerminated(reports) => {
                    tracing::error!(
                        "❌ Target instance IDs in MGN are no longer available, this is most likely due to the status being reverted and instances terminated"
                    );
                    // Terminated targets end the run; failures only cover the
                    // accounts checked before the terminated one.
                    return Ok(VerifySummary {
                        outcome: VerifyOutcome::TargetsTerminated,
                        rounds,
                        failures: reports.iter().map(AccountReport::failures).sum(),
                        elapsed: start.elapsed(),
                        started_at,
                        reports,
                    });
                }
            };

            // Servers not yet in MGN count as failures as well, so a wave
            // only passes once every server has a healthy target.
            let failures: usize = reports.iter().map(AccountReport::failures).sum();
            let elapsed = start.elapsed();

            if failures == 0 {
                tracing::info!("✅ All instances passed after {} round(s)", rounds);
                return Ok(VerifySummary {
                    outcome: VerifyOutcome::Passed,
                    rounds,
                    failures,
                    elapsed,
                    started_at,
                    reports,
                });
            }

            tracing::info!("{} seconds elapsed", elapsed.as_secs());
            // Checked before sleeping, so one more round can start up to a
            // poll interval past the timeout.
            if elapsed >= self.policy.timeout {
                tracing::warn!(
                    "⏰ It has been more than {} minutes since launching servers, please check issues on the server before running this again",
                    self.policy.timeout.as_secs() / 60
                );
                return Ok(VerifySummary {
                    outcome: VerifyOutcome::TimedOut,
                    rounds,
                    failures,
                    elapsed,
                    started_at,
                    reports,
                });
            }

            if reports.iter().any(AccountReport::needs_retry) {
                tracing::info!(
                    "⏳ Instance booting up - retry after {} seconds",
                    self.policy.poll_interval.as_secs()
                );
            } else {
                tracing::info!(
                    "⏳ Waiting for servers to appear in MGN - retry after {} seconds",
                    self.policy.poll_interval.as_secs()
                );
            }
            // Every failing round sleeps, including rounds where only
            // unreplicated servers remain.
            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }

    async fn run_round(&self, wave: &WaveServers) -> Result<Round> {
        let mut reports = Vec::with_capacity(wave.accounts.len());
        for account in &wave.accounts {
            match self.check_account(account).await {
                Ok(report) => reports.push(report),
                Err(MgnError::TargetsTerminatedError { .. }) => {
                    return Ok(Round::TargetsTerminated(reports))
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Round::Completed(reports))
    }

    async fn check_account(&self, account: &AccountServers) -> Result<AccountReport> {
        tracing::debug!("Getting target instance ids for {}", account.target);
        let source_servers = self.cloud.source_servers(&account.target).await?;
        let targets = resolve_targets(account, &source_servers)?;

        let instance_ids: Vec<String> = targets
            .iter()
            .filter_map(|t| t.instance_id().map(str::to_string))
            .collect();
        // An empty filter would describe every instance in the account.
        let health = if instance_ids.is_empty() {
            Vec::new()
        } else {
            self.cloud
                .instance_health(&account.target, &instance_ids)
                .await?
        };

        let mut report = AccountReport::new(account.target.clone());
        let mut statuses = Vec::with_capacity(account.servers.len());
        for (server, target) in account.servers.iter().zip(&targets) {
            let status = classify(target, &health);
            report.record(server.display_name(), status);
            statuses.push((server, status));
        }
        report.log();

        // Any failed update aborts the whole run; see update_migration_status.
        for (server, status) in statuses {
            self.factory
                .update_migration_status(&server.server_id, status.migration_status())
                .await?;
        }

        Ok(report)
    }
}
