use crate::context::Context;
use crate::names::{DomainEntry, SERVICES};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn router() -> Router<Arc<Context>> {
    Router::new().route("/", get(list_names))
}

#[derive(Serialize)]
struct NamesResponse {
    services: Vec<&'static str>,
    domain_types: Vec<String>,
    domains: Vec<DomainEntry>,
}

async fn list_names(State(ctx): State<Arc<Context>>) -> Json<NamesResponse> {
    Json(NamesResponse {
        services: SERVICES.iter().map(|(id, _, _)| *id).collect(),
        domain_types: ctx.domains.domain_types(),
        domains: ctx.domains.entries(),
    })
}
