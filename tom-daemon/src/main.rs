use anyhow::Result;
use clap::Parser;

use tom_core::config::TomConfig;
use tom_daemon::cli::DaemonCli;
use tom_daemon::logging::init_tracing;
use tom_daemon::orchestrator::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // File → environment → command line
    let mut config = TomConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);

    if cli.validate {
        let engine = Daemon::validate_config(&config)?;
        println!(
            "configuration OK: {} ({} targets)",
            cli.config.display(),
            engine.targets().len()
        );
        return Ok(());
    }

    init_tracing(&config.general)?;
    tom_core::metrics::describe_all();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        interface = %config.capture.interface,
        "tom starting"
    );

    let daemon = Daemon::build_from_config(config)?;
    let summary = daemon.run().await?;

    tracing::info!(
        frames = summary.stats.frames,
        hosts_purged = summary.stats.hosts_purged,
        "tom shut down"
    );
    Ok(())
}
