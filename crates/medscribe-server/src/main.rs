//! Medscribe: HTTP server for editing generated clinical reports.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("MEDSCRIBE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--help" | "-h" | "help" => {
                println!("Medscribe: clinical report editing server");
                println!();
                println!("Usage: medscribe");
                println!();
                println!("Environment:");
                println!("  PORT                     Listen port (default 3010)");
                println!("  MEDSCRIBE_DATA_DIR       Data directory (default ./data)");
                println!("  MEDSCRIBE_DEBOUNCE_MS    Autosave debounce (default 2000)");
                println!("  MEDSCRIBE_SENTINEL       Placeholder token");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'medscribe help' for usage.", arg);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = medscribe_core::MedscribeConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = medscribe_store::SqliteStore::open(&config.data_paths.db)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    let llm_config = medscribe_generate::LLMConfig::load(&config.data_paths.llm_config_file);
    let generator = medscribe_generate::LlmGenerator::new(llm_config);
    info!(
        "Generator: {}",
        generator
            .config_response()
            .active_provider
            .unwrap_or_else(|| "not configured".into())
    );

    let state = Arc::new(AppState::new(config, store, generator));
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Medscribe server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
