use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use fg_app::cli::Cli;
use fg_app::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // RUST_LOG wins over FORGE3D_LOG.
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match config.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: FORGE3D_LOG='{}' is not a valid tracing filter ({}); falling back to 'info'",
                    config.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &config.env_file {
        debug!(path = %path.display(), "loaded .env");
    }

    fg_app::app::run(cli, config).await
}
