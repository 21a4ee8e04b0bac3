//! CLI command implementations

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::automation::{
    format_duration, CooldownScheduler, Orchestrator, RetryExecutor, RetryPolicy,
};
use crate::config::Config;
use crate::feature::{FeatureFactory, FeaturePipeline};
use crate::ledger::{ArtifactStore, BalanceReader, GatewayClient, LedgerActions, SimulatedLedger};
use crate::notify::{MemorySink, NotificationSink, Notifier, ShutdownReason, TelegramSink};
use crate::strategy::{StrategyFactory, TokenRegistry, TokenSampler};

/// Start the automation loop
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        warn!("Running in DRY-RUN mode - actions go to an in-memory ledger");
    }

    info!("Starting chain automation on {}...", config.network.name);
    info!(
        "Cooldown: {}-{}h {}-{}m, retries: {} (base delay {}ms)",
        config.cooldown.min_hours,
        config.cooldown.max_hours,
        config.cooldown.min_minutes,
        config.cooldown.max_minutes,
        config.retry.max_retries,
        config.retry.retry_delay_ms
    );

    let telegram = TelegramSink::new(&config.telegram);
    if telegram.is_enabled() {
        info!("Telegram notifications enabled");
    } else {
        info!("Telegram notifications disabled");
    }
    let notifier = Notifier::new(Arc::new(telegram), config.network.native_symbol.clone());

    let mut orchestrator = if dry_run {
        let ledger = Arc::new(SimulatedLedger::from_config(config));
        info!("Simulated signer: {}", ledger.signer_address());
        build_orchestrator(config, ledger, notifier.clone())?
    } else {
        if config.wallet.address.is_empty() {
            anyhow::bail!("wallet.address (WALLET_ADDRESS) is required outside dry-run mode");
        }
        let gateway = GatewayClient::new(&config.gateway, config.wallet.address.clone())
            .context("Failed to initialize gateway client")?;
        match gateway.health_check().await {
            Ok(latency) => info!("Gateway reachable ({}ms)", latency.as_millis()),
            Err(e) => warn!("Gateway health check failed, continuing: {}", e),
        }
        build_orchestrator(config, Arc::new(gateway), notifier.clone())?
    };

    let handle = tokio::spawn(async move { orchestrator.run().await });

    let reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => ShutdownReason::Manual,
        _ = terminate() => ShutdownReason::System,
        joined = handle => {
            return match joined {
                Err(e) if e.is_panic() => {
                    error!("Automation task panicked: {}", e);
                    Err(anyhow::anyhow!("automation task panicked"))
                }
                Err(e) => Err(anyhow::anyhow!("automation task failed: {}", e)),
                Ok(()) => Err(anyhow::anyhow!("automation loop exited unexpectedly")),
            };
        }
    };

    info!("Received shutdown signal: {}", reason.as_str());
    notifier.send_shutdown(reason).await;
    info!("Shutdown complete");

    Ok(())
}

/// Wait for SIGTERM; never resolves where it cannot be observed
#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Cannot install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Wire the strategy, feature and automation layers over one ledger backend
pub fn build_orchestrator<L>(config: &Config, ledger: Arc<L>, notifier: Notifier) -> Result<Orchestrator>
where
    L: BalanceReader + LedgerActions + ArtifactStore + 'static,
{
    let wallet = ledger.signer_address().to_string();
    let seed = config.automation.seed;
    let registry = Arc::new(
        TokenRegistry::from_config(&config.tokens).context("Invalid token registry")?,
    );

    let strategies = StrategyFactory::new(
        ledger.clone(),
        registry.clone(),
        Arc::new(TokenSampler::new(seed)),
    );
    let factory = FeatureFactory::new(strategies, ledger.clone(), ledger.clone(), wallet.clone())
        .with_upload_config(config.upload.clone())
        .with_repetition_pause(config.automation.repetition_pause())
        .with_seed(seed);

    let pipeline = FeaturePipeline::new(
        ledger,
        registry,
        RetryExecutor::new(RetryPolicy::from_config(&config.retry), notifier.clone()),
        notifier.clone(),
        wallet,
    )
    .with_native_symbol(config.network.native_symbol.clone());

    let cooldown = CooldownScheduler::new(config.cooldown, seed.map(|s| s.wrapping_add(1)));

    let mut orchestrator = Orchestrator::new(pipeline, notifier, cooldown, factory.clone())
        .with_report_interval(config.automation.report_interval())
        .with_critical_backoff(config.automation.critical_backoff());

    for entry in &config.features {
        let feature = factory
            .from_config(entry)
            .with_context(|| format!("Failed to build feature '{}'", entry.kind))?;
        orchestrator.add_feature(feature);
    }

    Ok(orchestrator)
}

/// Show the configured feature inventory
pub async fn status(config: &Config) -> Result<()> {
    let sink: Arc<dyn NotificationSink> = Arc::new(MemorySink::new());
    let notifier = Notifier::new(sink, config.network.native_symbol.clone());
    let ledger = Arc::new(SimulatedLedger::from_config(config));
    let orchestrator = build_orchestrator(config, ledger, notifier)?;

    let mut snapshot = orchestrator.status();
    snapshot.is_running = false;

    println!("\n=== AUTOMATION STATUS ===\n");
    println!("Network: {} ({})", config.network.name, config.network.native_symbol);
    println!("Wallet: {}", display_or_unset(&config.wallet.address));
    println!("\nFeatures ({}):", snapshot.features.len());
    for name in &snapshot.features {
        println!("  - {}", name);
    }
    println!("\nDEX Features ({}):", snapshot.dex_features.len());
    for label in &snapshot.dex_features {
        println!("  - {}", label);
    }

    let cd = &config.cooldown;
    let shortest = std::time::Duration::from_secs(cd.min_hours * 3600 + cd.min_minutes * 60);
    let longest = std::time::Duration::from_secs(cd.max_hours * 3600 + cd.max_minutes * 60);
    println!(
        "\nCooldown between cycles: {} to {}",
        format_duration(shortest),
        format_duration(longest)
    );

    println!("\n{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check gateway reachability and wallet balance
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;

    print!("Gateway ({})... ", config.gateway.url);
    let gateway = match GatewayClient::new(&config.gateway, config.wallet.address.clone()) {
        Ok(client) => Some(client),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
            None
        }
    };

    if let Some(gateway) = &gateway {
        match gateway.health_check().await {
            Ok(latency) => println!("OK ({}ms)", latency.as_millis()),
            Err(e) => {
                println!("FAILED: {}", e);
                all_healthy = false;
            }
        }

        print!("Wallet... ");
        if config.wallet.address.is_empty() {
            println!("NOT CONFIGURED");
            all_healthy = false;
        } else {
            match gateway.native_balance(&config.wallet.address).await {
                Ok(balance) => println!(
                    "OK (balance: {:.6} {})",
                    balance, config.network.native_symbol
                ),
                Err(e) => {
                    println!("FAILED: {}", e);
                    all_healthy = false;
                }
            }
        }
    }

    print!("Telegram... ");
    if TelegramSink::new(&config.telegram).is_enabled() {
        println!("ENABLED");
    } else {
        println!("DISABLED");
    }

    println!();
    if all_healthy {
        println!("All systems healthy!");
    } else {
        println!("Some systems are unhealthy. Check the errors above.");
    }

    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
