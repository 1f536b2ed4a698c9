use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use hostwatch_core::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

static DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");

/// Serve the single-page dashboard. The page is embedded at compile time;
/// the API base URL is injected once at startup.
pub async fn serve(config: Arc<Config>, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let api_base = format!("http://{}:{}", config.api.host, config.api.port);
    let page = Arc::new(DASHBOARD_HTML.replace("__API_BASE__", &api_base));

    let app = Router::new()
        .route("/", get(index))
        .with_state(page)
        .layer(TraceLayer::new_for_http());

    let host = config.dashboard.host.as_str();
    let port = config.dashboard.port;
    let listener = TcpListener::bind((host, port)).await?;
    info!("dashboard listening on {host}:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

    info!("dashboard listener stopped");
    Ok(())
}

async fn index(State(page): State<Arc<String>>) -> Html<String> {
    Html(page.as_ref().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_has_an_api_base_placeholder() {
        assert!(DASHBOARD_HTML.contains("__API_BASE__"));
    }

    #[test]
    fn api_base_injection_replaces_every_occurrence() {
        let page = DASHBOARD_HTML.replace("__API_BASE__", "http://127.0.0.1:8001");
        assert!(!page.contains("__API_BASE__"));
        assert!(page.contains("http://127.0.0.1:8001"));
    }
}
