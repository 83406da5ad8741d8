use crate::backups::{Archive, ArchiveManifest, Export, OperationRecord};
use crate::context::Context;
use crate::error::Error;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub fn router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(overview))
        .route("/setup", post(setup_repository))
        .route("/archives", get(list_archives).post(create_archive))
        .route("/archives/{name}", get(get_archive).delete(delete_archive))
        .route("/archives/{name}/export", post(export_archive))
        .route("/archives/{name}/restore", post(restore_archive))
        .route("/exports", get(list_exports))
        .route("/exports/restore", post(restore_exported))
        .route("/operations", get(list_operations))
}

#[derive(Serialize)]
struct Overview {
    info: serde_json::Value,
    archives: Vec<Archive>,
    exports: Vec<Export>,
}

async fn overview(State(ctx): State<Arc<Context>>) -> Result<Json<Overview>, Error> {
    Ok(Json(Overview {
        info: ctx.backups.get_info().await?,
        archives: ctx.backups.list_archives().await?,
        exports: ctx.backups.list_exports().await?,
    }))
}

#[derive(Deserialize, Default)]
struct SetupRequest {
    passphrase: Option<String>,
}

async fn setup_repository(
    State(ctx): State<Arc<Context>>,
    body: Option<Json<SetupRequest>>,
) -> Result<StatusCode, Error> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    ctx.backups.setup(body.passphrase.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_archives(State(ctx): State<Arc<Context>>) -> Result<Json<Vec<Archive>>, Error> {
    Ok(Json(ctx.backups.list_archives().await?))
}

#[derive(Deserialize)]
struct CreateArchiveRequest {
    name: Option<String>,
    apps: Vec<String>,
    passphrase: Option<String>,
}

#[derive(Serialize)]
struct CreateArchiveResponse {
    name: String,
    manifest: ArchiveManifest,
}

async fn create_archive(
    State(ctx): State<Arc<Context>>,
    Json(body): Json<CreateArchiveRequest>,
) -> Result<(StatusCode, Json<CreateArchiveResponse>), Error> {
    let name = body.name.unwrap_or_else(default_archive_name);
    let manifest = ctx
        .backups
        .create_archive(&name, &body.apps, body.passphrase.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(CreateArchiveResponse { name, manifest })))
}

fn default_archive_name() -> String {
    format!("FreedomBox-backup_{}", chrono::Local::now().format("%Y-%m-%d_%H%M%S"))
}

async fn get_archive(
    State(ctx): State<Arc<Context>>,
    Path(name): Path<String>,
) -> Result<Json<Archive>, Error> {
    Ok(Json(ctx.backups.get_archive(&name).await?))
}

async fn delete_archive(
    State(ctx): State<Arc<Context>>,
    Path(name): Path<String>,
) -> Result<StatusCode, Error> {
    ctx.backups.delete_archive(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ExportRequest {
    location: PathBuf,
    passphrase: Option<String>,
}

#[derive(Serialize)]
struct ExportResponse {
    path: PathBuf,
}

async fn export_archive(
    State(ctx): State<Arc<Context>>,
    Path(name): Path<String>,
    Json(body): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, Error> {
    let path = ctx
        .backups
        .export_archive(&name, &body.location, body.passphrase.as_deref())
        .await?;
    Ok(Json(ExportResponse { path }))
}

#[derive(Deserialize, Default)]
struct RestoreRequest {
    apps: Option<Vec<String>>,
    passphrase: Option<String>,
}

#[derive(Serialize)]
struct RestoreResponse {
    restored: Vec<String>,
}

async fn restore_archive(
    State(ctx): State<Arc<Context>>,
    Path(name): Path<String>,
    body: Option<Json<RestoreRequest>>,
) -> Result<Json<RestoreResponse>, Error> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let restored = ctx
        .backups
        .restore_archive(&name, body.apps.as_deref(), body.passphrase.as_deref())
        .await?;
    Ok(Json(RestoreResponse { restored }))
}

async fn list_exports(State(ctx): State<Arc<Context>>) -> Result<Json<Vec<Export>>, Error> {
    Ok(Json(ctx.backups.list_exports().await?))
}

#[derive(Deserialize)]
struct RestoreExportedRequest {
    path: PathBuf,
    apps: Vec<String>,
    passphrase: Option<String>,
}

async fn restore_exported(
    State(ctx): State<Arc<Context>>,
    Json(body): Json<RestoreExportedRequest>,
) -> Result<Json<RestoreResponse>, Error> {
    let restored = ctx
        .backups
        .restore_exported(&body.path, &body.apps, body.passphrase.as_deref())
        .await?;
    Ok(Json(RestoreResponse { restored }))
}

async fn list_operations(State(ctx): State<Arc<Context>>) -> Json<Vec<OperationRecord>> {
    Json(ctx.backups.operations().list())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, send};
    use axum::http::StatusCode;
    use serde_json::json;

    const LIST: &str = r#"{"archives": [{"name": "nightly", "time": "2024-05-01T02:00:00+00:00"}]}"#;

    #[tokio::test]
    async fn test_missing_archive_is_not_found() {
        let (actions, ctx) = context().await;
        actions.respond("backups list", LIST);

        let (status, body) = send(ctx.clone(), "GET", "/api/backups/archives/nightly", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "nightly");

        let (status, _) = send(ctx, "GET", "/api/backups/archives/nonexistent", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_archive() {
        let (actions, ctx) = context().await;
        let (status, body) = send(
            ctx.clone(),
            "POST",
            "/api/backups/archives",
            Some(json!({"name": "first", "apps": ["ikiwiki", "backups"]})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "first");
        assert_eq!(body["manifest"]["apps"][0]["name"], "ikiwiki");
        assert_eq!(body["manifest"]["apps"][1]["name"], "backups");
        assert!(actions
            .commands()
            .iter()
            .any(|c| c.starts_with("backups create-archive --path /repo::first --paths /var/lib/ikiwiki ")));

        let (status, body) = send(
            ctx.clone(),
            "POST",
            "/api/backups/archives",
            Some(json!({"name": "first", "apps": ["ikiwiki"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("/repo::first"));

        let _ = std::fs::remove_dir_all(&ctx.config.manifests_dir);
    }

    #[tokio::test]
    async fn test_restore_with_corrupt_manifest_is_unprocessable() {
        let (actions, ctx) = context().await;
        actions.respond("backups list", LIST);
        actions.respond("backups get-archive-manifest", "{not json");

        let (status, _) = send(ctx.clone(), "POST", "/api/backups/archives/nightly/restore", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, operations) = send(ctx, "GET", "/api/backups/operations", None).await;
        assert_eq!(operations[0]["kind"], "restore");
        assert_eq!(operations[0]["state"], "failed");
    }

    #[tokio::test]
    async fn test_export_to_unknown_location_is_bad_request() {
        let (_, ctx) = context().await;
        let (status, _) = send(
            ctx,
            "POST",
            "/api/backups/archives/nightly/export",
            Some(json!({"location": "/etc"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
