use clap::Parser;
use mgn_automation::adapters::{
    aws, factory, AwsGateway, AwsSecrets, FactoryClient, NoPrompter, TerminalPrompter,
};
use mgn_automation::core::{FactoryApi, Prompter};
use mgn_automation::utils::{logger, validation::Validate};
use mgn_automation::{
    FactoryEndpoints, InstanceVerifier, MgnError, Settings, VerifyArgs, VerifyOutcome, VerifyPolicy,
    VerifySummary,
};
use std::time::Duration;

async fn run(args: &VerifyArgs) -> mgn_automation::Result<VerifySummary> {
    let mut settings = Settings::load(args.common.settings.as_deref())?;
    if let Some(interval) = args.poll_interval_seconds {
        settings.verify.poll_interval_seconds = interval;
    }
    if let Some(timeout) = args.timeout_minutes {
        settings.verify.timeout_minutes = timeout;
    }
    settings.validate()?;

    let endpoints = FactoryEndpoints::from_file(&args.common.endpoints)?;
    let allow_prompts = !args.common.no_prompts;

    let aws_config = aws::load_base_config(endpoints.region.as_deref()).await;
    let secrets = AwsSecrets::new(&aws_config);
    let prompter: Box<dyn Prompter> = if allow_prompts {
        Box::new(TerminalPrompter)
    } else {
        Box::new(NoPrompter)
    };

    tracing::info!("🔐 Login to Migration factory");
    let http = factory::http_client(Duration::from_secs(settings.factory.request_timeout_seconds))?;
    let token = factory::authenticate(&http, &endpoints, &secrets, &prompter, allow_prompts).await?;
    let client = FactoryClient::new(http, endpoints.user_api()?, token);

    tracing::info!("📋 Getting server list for wave {}", args.common.wave_id);
    let wave = client
        .fetch_wave_servers(&args.common.wave_id, &settings.factory.r_type)
        .await?;

    tracing::info!("🔍 Verify instance status");
    let cloud = AwsGateway::new(aws_config, settings.aws.automation_role.clone());
    let verifier = InstanceVerifier::new(client, cloud, VerifyPolicy::from(&settings.verify));
    verifier.run(&wave).await
}

fn report_error(e: &MgnError) -> ! {
    tracing::error!(
        "❌ Instance verification failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() {
    let args = VerifyArgs::parse();
    logger::init(args.common.verbose, args.common.json_logs);
    tracing::debug!("CLI args: {:?}", args);

    if let Err(e) = args.validate() {
        report_error(&e);
    }

    match run(&args).await {
        Ok(summary) => {
            tracing::info!(
                "Started at {}, {} round(s), {}s elapsed",
                summary.started_at.to_rfc3339(),
                summary.rounds,
                summary.elapsed.as_secs()
            );
            match summary.outcome {
                VerifyOutcome::Passed => {
                    println!("✅ All servers have had status check completed successfully.")
                }
                VerifyOutcome::TimedOut => eprintln!(
                    "❌ {} servers have status as failed or impaired or not found. Check log for details.",
                    summary.failures
                ),
                VerifyOutcome::TargetsTerminated => eprintln!(
                    "❌ Target instances are no longer available, most likely because the launch was reverted."
                ),
            }
            std::process::exit(summary.exit_code());
        }
        Err(e) => report_error(&e),
    }
}
