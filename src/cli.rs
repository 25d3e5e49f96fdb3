//! CLI command implementations (kept out of main.rs for testability)

use tracing::info;

use crate::{
    api::{create_router, AppState},
    config::{ModelArgs, ServeConfig},
    error::{Result, ServeError},
    loader,
    service::PredictionService,
};

/// Load schema and model, degrading to an unavailable service on load failure
///
/// # Errors
///
/// Returns [`ServeError::Schema`] if the schema file is invalid. A broken
/// model artifact is not an error here.
pub fn prepare_service(args: &ModelArgs) -> Result<PredictionService> {
    let schema = args.load_schema()?;
    info!(n_features = schema.len(), %schema, "Feature schema ready");

    let loaded = loader::load_model(args.model_path());
    Ok(PredictionService::from_load(loaded, schema))
}

/// Serve the prediction API until interrupted
///
/// # Errors
///
/// Returns an error if the address is invalid, the port cannot be bound, or
/// the server fails.
pub async fn serve(config: ServeConfig) -> Result<()> {
    let addr = config.socket_addr()?;
    let service = prepare_service(&config.model)?;
    let app = create_router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    info!(%addr, "Server listening");
    info!("  GET  /         - Status text");
    info!("  GET  /health   - Health check");
    info!("  POST /predict  - Predict from a JSON record");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Server)?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available: run until the process is killed
        std::future::pending::<()>().await;
    }
}

/// Load the model, print its status and any schema drift
///
/// Returns whether the model loaded.
///
/// # Errors
///
/// Returns [`ServeError::Schema`] if the schema file is invalid.
pub fn inspect(args: &ModelArgs) -> Result<bool> {
    let service = prepare_service(args)?;
    println!("{}", service.status());

    if let Some(model) = service.model() {
        println!("Model type: {}", model.kind());
        match model.feature_names() {
            Some(names) => println!("Trained feature order: {}", names.join(", ")),
            None => println!("Trained feature order: not recorded"),
        }
        let drift = loader::schema_drift(model.as_ref(), service.schema());
        if drift.is_empty() {
            println!("Feature schema matches the model");
        }
        for finding in drift {
            println!("Warning: {finding}");
        }
    }
    Ok(service.is_ready())
}
