//! vitrine-relay binary

use vitrine_relay::{Config, RelayState, logger};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    logger::init_logger(&config.log_level, config.is_production(), config.log_dir.as_deref());

    tracing::info!("Starting vitrine-relay (env: {})", config.environment);

    let state = RelayState::new(&config);
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("vitrine-relay listening on {addr}");

    tokio::select! {
        res = vitrine_relay::serve(listener, state) => {
            if let Err(e) = res {
                tracing::error!("HTTP server error: {e}");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
