use crate::app::{App, Capability, Component};
use crate::context::Context;
use crate::error::Error;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

pub fn router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(list_apps))
        .route("/{id}", get(get_app))
        .route("/{id}/enable", post(enable_app))
        .route("/{id}/disable", post(disable_app))
        .route("/{id}/setup", post(setup_app))
}

#[derive(Serialize)]
pub struct AppSummary {
    pub id: String,
    pub name: String,
    pub version: u32,
    pub is_essential: bool,
    pub description: Option<String>,
    pub capabilities: BTreeSet<Capability>,
    pub components: Vec<Component>,
    /// `None` when the state could not be read.
    pub enabled: Option<bool>,
}

async fn summarize(ctx: &Context, app: &App) -> AppSummary {
    let enabled = match app.is_enabled(ctx.actions.as_ref()).await {
        Ok(enabled) => Some(enabled),
        Err(e) => {
            tracing::warn!("Failed to read state of app {}: {e}", app.id());
            None
        }
    };
    let info = app.info();
    AppSummary {
        id: info.app_id.clone(),
        name: info.name.clone(),
        version: info.version,
        is_essential: info.is_essential,
        description: info.short_description.clone(),
        capabilities: app.capabilities().clone(),
        components: app.components().to_vec(),
        enabled,
    }
}

async fn list_apps(State(ctx): State<Arc<Context>>) -> Json<Vec<AppSummary>> {
    let mut summaries = Vec::new();
    for app in ctx.apps.list().await {
        summaries.push(summarize(&ctx, &app).await);
    }
    Json(summaries)
}

async fn get_app(
    State(ctx): State<Arc<Context>>,
    Path(id): Path<String>,
) -> Result<Json<AppSummary>, Error> {
    let app = ctx.apps.get(&id).await?;
    Ok(Json(summarize(&ctx, &app).await))
}

async fn enable_app(
    State(ctx): State<Arc<Context>>,
    Path(id): Path<String>,
) -> Result<Json<AppSummary>, Error> {
    let app = ctx.apps.get(&id).await?;
    app.enable(ctx.actions.as_ref()).await?;
    Ok(Json(summarize(&ctx, &app).await))
}

async fn disable_app(
    State(ctx): State<Arc<Context>>,
    Path(id): Path<String>,
) -> Result<Json<AppSummary>, Error> {
    let app = ctx.apps.get(&id).await?;
    app.disable(ctx.actions.as_ref()).await?;
    Ok(Json(summarize(&ctx, &app).await))
}

async fn setup_app(
    State(ctx): State<Arc<Context>>,
    Path(id): Path<String>,
) -> Result<Json<AppSummary>, Error> {
    let app = ctx.apps.get(&id).await?;
    app.setup(ctx.actions.as_ref()).await?;
    Ok(Json(summarize(&ctx, &app).await))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, send};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_list_apps() {
        let (_, ctx) = context().await;
        let (status, body) = send(ctx, "GET", "/api/apps", None).await;
        assert_eq!(status, StatusCode::OK);
        let apps = body.as_array().unwrap();
        assert_eq!(apps.len(), 11);
        assert_eq!(apps[0]["id"], "names");
        assert_eq!(apps[0]["enabled"], true);
    }

    #[tokio::test]
    async fn test_unknown_app_is_not_found() {
        let (_, ctx) = context().await;
        let (status, body) = send(ctx, "GET", "/api/apps/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "App not found: nope");
    }

    #[tokio::test]
    async fn test_enable_app() {
        let (actions, ctx) = context().await;
        actions.respond("firewall get-enabled-services", "[]");

        let (status, _) = send(ctx, "POST", "/api/apps/minidlna/enable", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(actions
            .commands()
            .contains(&"service enable minidlna".to_string()));
    }

    #[tokio::test]
    async fn test_essential_app_cannot_be_disabled() {
        let (_, ctx) = context().await;
        let (status, _) = send(ctx, "POST", "/api/apps/firewall/disable", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_action_is_bad_gateway() {
        let (actions, ctx) = context().await;
        actions.fail("packages install", 100);
        let (status, body) = send(ctx, "POST", "/api/apps/ikiwiki/setup", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("exit code 100"));
    }
}
