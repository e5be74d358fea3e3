use std::process;
use std::sync::Arc;

use clap::Parser;

use facemark_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceFactory;
use facemark_server::config::ServerConfig;
use facemark_server::router;
use facemark_server::state::AppState;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();
    config.validate()?;
    let addr = config.addr()?;

    let source = config.model_source();
    log::info!("Resolving model: {}", source.name);
    // The resolver may download with a blocking client.
    let model_path = tokio::task::spawn_blocking(move || source.resolve()).await??;
    log::info!("Using model {}", model_path.display());

    let detectors = Arc::new(OnnxBlazefaceFactory::new(model_path, config.confidence));
    let app = router(AppState::new(config, detectors));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
