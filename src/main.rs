use anyhow::Result;
use clap::Parser;
use screenshotter::{
    apply_overrides, install_prometheus_recorder, load_config, setup_logging, Cli, CliRunner,
    Config,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose);

    info!("Starting screenshotter v{}", env!("CARGO_PKG_VERSION"));

    // The recorder has to exist before the screenshotter registers its handles
    let metrics_handle = if args.metrics {
        Some(install_prometheus_recorder()?)
    } else {
        None
    };

    let config = match &args.config {
        Some(path) => load_config(path).await?,
        None => Config::default(),
    };
    let config = apply_overrides(config, &args)?;
    config.validate()?;

    info!("Output path: {}", config.output_path.display());
    info!("Cache path: {}", config.cache_path.display());
    info!("Renderer timeout: {}s", config.timeout_secs);

    let runner = CliRunner::new(config).await?;
    let result = runner.run(args.command).await;

    if let Some(handle) = metrics_handle {
        print!("{}", handle.render());
    }

    if let Err(e) = result {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
