use clap::Parser;
use mgn_automation::adapters::{
    aws, factory, AwsSecrets, FactoryClient, NoPrompter, ProcessCopier, TerminalPrompter,
};
use mgn_automation::core::credentials::CredentialResolver;
use mgn_automation::core::{FactoryApi, Prompter};
use mgn_automation::utils::{logger, validation::Validate};
use mgn_automation::{
    CopyOptions, CopySummary, FactoryEndpoints, FileCopyArgs, MgnError, PostLaunchCopy, Settings,
};
use std::time::Duration;

async fn run(args: &FileCopyArgs) -> mgn_automation::Result<CopySummary> {
    let settings = Settings::load(args.common.settings.as_deref())?;
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

    tracing::info!("📂 Copying files to post_launch folder");
    let options = CopyOptions {
        windows_source: args.windows_source().map(str::to_string),
        linux_source: args.linux_source().cloned(),
        windows_secret: args.secret_windows.clone(),
        linux_secret: args.secret_linux.clone(),
    };
    let copier = ProcessCopier::new(settings.linux.clone(), settings.windows.clone());
    let resolver = CredentialResolver::new(secrets, prompter, allow_prompts);
    let runner = PostLaunchCopy::new(resolver, copier, options);

    Ok(runner.run(&wave).await)
}

fn report_error(e: &MgnError) -> ! {
    tracing::error!(
        "❌ File copy failed: {} (Category: {:?}, Severity: {:?})",
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
    let args = FileCopyArgs::parse();
    logger::init(args.common.verbose, args.common.json_logs);
    tracing::debug!("CLI args: {:?}", args);

    if let Err(e) = args.validate() {
        report_error(&e);
    }

    match run(&args).await {
        Ok(summary) => {
            if summary.failed.is_empty() {
                println!("✅ All servers have had scripts copied successfully.");
            } else {
                for (server, reason) in &summary.failed {
                    eprintln!("❌ {}: {}", server, reason);
                }
                eprintln!("One or more servers failed to copy scripts. Check log for details.");
            }
            std::process::exit(summary.exit_code());
        }
        Err(e) => report_error(&e),
    }
}
