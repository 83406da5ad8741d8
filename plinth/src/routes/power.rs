use crate::context::Context;
use crate::error::Error;
use crate::modules::power;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(power_status))
        .route("/restart", post(restart))
        .route("/shutdown", post(shutdown))
}

async fn power_status(State(ctx): State<Arc<Context>>) -> Json<Value> {
    let busy = power::is_package_manager_busy(ctx.actions.as_ref()).await;
    Json(json!({ "package_manager_busy": busy }))
}

async fn restart(State(ctx): State<Arc<Context>>) -> Result<(StatusCode, Json<Value>), Error> {
    power::restart(ctx.actions.as_ref()).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "restarting" }))))
}

async fn shutdown(State(ctx): State<Arc<Context>>) -> Result<(StatusCode, Json<Value>), Error> {
    power::shutdown(ctx.actions.as_ref()).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "shutting down" }))))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, send};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_shutdown_is_accepted() {
        let (actions, ctx) = context().await;
        let (status, _) = send(ctx, "POST", "/api/power/shutdown", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(actions.commands().last().unwrap(), "power shutdown");
    }

    #[tokio::test]
    async fn test_package_manager_status() {
        let (actions, ctx) = context().await;
        actions.fail("packages is-package-manager-busy", 1);
        let (_, body) = send(ctx, "GET", "/api/power", None).await;
        assert_eq!(body["package_manager_busy"], false);
    }
}
