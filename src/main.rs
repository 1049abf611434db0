use clap::Parser;
use schoolwrap::app::App;
use schoolwrap::cli::Args;
use schoolwrap::config::Config;
use schoolwrap::logging::setup_logging;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logging depends on config, so a config error can only go to stderr.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_HASH"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting schoolwrap"
    );

    App::new(config).run().await
}
