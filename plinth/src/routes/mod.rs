pub mod apps;
pub mod backups;
pub mod names;
pub mod power;

use crate::context::Context;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(ctx: Arc<Context>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/apps", apps::router())
        .nest("/api/backups", backups::router())
        .nest("/api/names", names::router())
        .nest("/api/power", power::router())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::actions::testing::RecordingActions;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    pub async fn context() -> (Arc<RecordingActions>, Arc<Context>) {
        let actions = Arc::new(RecordingActions::default());
        let config = AppConfig::from_lookup(|key| match key {
            "PLINTH_HOSTNAME" => Some("freedombox".into()),
            "PLINTH_BACKUP_REPOSITORY" => Some("/repo".into()),
            "PLINTH_EXPORT_LOCATIONS" => Some("/media/usb0".into()),
            "PLINTH_MANIFESTS_DIR" => Some(
                std::env::temp_dir()
                    .join(format!("plinth-manifests-{}", uuid::Uuid::new_v4()))
                    .to_string_lossy()
                    .to_string(),
            ),
            _ => None,
        })
        .unwrap();
        let ctx = Arc::new(Context::new(config, actions.clone()));
        ctx.init().await.unwrap();
        (actions, ctx)
    }

    pub async fn send(ctx: Arc<Context>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = create_router(ctx).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
