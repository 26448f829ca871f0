use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use agro_service_rs::{
    chat::{AgriQBotClient, GeminiClient, TextGenerator},
    config::{ClassifierBackend, Config},
    model::HostedClassifier,
    routes::{router, AppState},
    Catalog, Classifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)
            .await
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        None => Catalog::builtin(),
    };
    tracing::info!(
        plants = ?catalog.supported_plants(),
        advice = catalog.advice_len(),
        "catalog ready"
    );

    let client = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()?;

    // A classifier that cannot be loaded is fatal: the service refuses to start.
    let classifier = build_classifier(&config, &client)
        .await
        .context("failed to load classifier")?;

    let gemini = config.palm_api_key.clone().map(|key| {
        Arc::new(GeminiClient::new(
            client.clone(),
            &config.gemini_api_url,
            &config.gemini_model,
            key,
        )) as Arc<dyn TextGenerator>
    });
    if gemini.is_none() {
        tracing::warn!("PALM_API_KEY not set, /palm-chat will answer 503");
    }

    let agriqbot = Arc::new(AgriQBotClient::new(
        client.clone(),
        &config.inference_api_url,
        &config.agriqbot_model,
        config.hf_api_token.clone(),
    ));

    let state = AppState {
        catalog: Arc::new(catalog),
        classifier,
        gemini,
        agriqbot,
    };
    let app = router(state, config.body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn build_classifier(
    config: &Config,
    client: &reqwest::Client,
) -> anyhow::Result<Arc<dyn Classifier>> {
    match config.backend {
        ClassifierBackend::Hosted => {
            let classifier = HostedClassifier::new(
                client.clone(),
                &config.inference_api_url,
                &config.disease_model,
                config.hf_api_token.clone(),
            );
            tracing::info!(endpoint = classifier.endpoint(), "using hosted classifier");
            Ok(Arc::new(classifier))
        }
        #[cfg(feature = "tensorflow")]
        ClassifierBackend::TensorFlow => {
            agro_service_rs::utils::ensure_files_exist(
                client,
                &[
                    (config.model_path.as_path(), config.model_url.as_deref()),
                    (
                        config.class_list_path.as_path(),
                        config.class_list_url.as_deref(),
                    ),
                ],
                config.github_token.as_deref(),
            )
            .await?;
            let classifier = agro_service_rs::graph::GraphClassifier::load(
                &config.model_path,
                &config.class_list_path,
            )
            .await?;
            Ok(Arc::new(classifier))
        }
        #[cfg(not(feature = "tensorflow"))]
        ClassifierBackend::TensorFlow => {
            anyhow::bail!("CLASSIFIER_BACKEND=tensorflow requires building with --features tensorflow")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
