use sensor_collect::record::READING_COUNT;
use sensor_collect::{init_tracing, load_or_default, run};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // RUST_LOG=debug for verbose, RUST_LOG=info for normal
    init_tracing();

    // Load configuration from CONFIG_PATH or default
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
    let config_file = format!("{}/collector.toml", config_path);
    let config = match load_or_default(&config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("[config] {}", e);
            std::process::exit(1);
        }
    };

    match run(&config).await {
        Ok(outcome) => info!(
            "[main] logged {} readings to {}{}",
            READING_COUNT - outcome.record.sample.missing(),
            outcome.path.display(),
            if outcome.header_written { " (new file)" } else { "" }
        ),
        Err(e) => {
            error!("[main] {}", e);
            std::process::exit(1);
        }
    }
}
