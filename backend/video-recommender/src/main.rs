use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use video_recommender::cli::{self, Command};
use video_recommender::Config;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let command = Command::parse(std::env::args().skip(1))?;
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(?command, "Starting video-recommender");

    cli::run(command, &config)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("video_recommender=info,info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
