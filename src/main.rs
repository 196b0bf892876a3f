//! Sprint Board server.
//!
//! `sprint-board` starts the HTTP server.
//! `sprint-board hash-password <password>` prints the value for
//! `DASHBOARD_PASSWORD_HASH`.

use sprint_board::{api, config::Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env in the working directory.
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    if let Some(command) = args.next() {
        return match (command.as_str(), args.next()) {
            ("hash-password", Some(password)) => {
                println!("{}", api::hash_password(password.trim()));
                Ok(())
            }
            _ => anyhow::bail!("usage: sprint-board [hash-password <password>]"),
        };
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))?;

    let config = Config::from_env()?;
    tracing::info!(
        "Starting sprint board on {}:{} (dev_mode: {})",
        config.host,
        config.port,
        config.dev_mode
    );

    api::serve(config).await
}
