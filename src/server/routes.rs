//! Route table and handlers

use crate::dispatch::{Credential, Dispatcher};
use crate::request::{
    resolve_body, resolve_chat, resolve_rtc, resolve_rte, resolve_rtm, RequestParams,
};
use crate::server::error::ApiError;
use crate::server::origin::{no_cache, origin_gate, OriginPolicy};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone, Debug)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

type Segments = Path<HashMap<String, String>>;
type QueryParams = Query<HashMap<String, String>>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RtcResponse {
    rtc_token: Credential,
    #[serde(skip_serializing_if = "Option::is_none")]
    rtm_token: Option<Credential>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RtmResponse {
    rtm_token: Credential,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    chat_token: Credential,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: Credential,
}

/// Build the service router. Each route answers with and without a trailing
/// slash.
pub fn build_router(dispatcher: Dispatcher, origins: OriginPolicy) -> Router {
    let routes: [(&str, MethodRouter<AppState>); 8] = [
        ("/rtc/{channelName}/{role}/{tokenType}/{rtcuid}", get(rtc_token)),
        ("/rtm/{rtmuid}", get(rtm_token)),
        ("/rte/{channelName}/{role}/{tokenType}/{rtcuid}", get(rte_token)),
        ("/rte/{channelName}/{role}/{tokenType}/{rtcuid}/{rtmuid}", get(rte_token)),
        ("/chat/{chatType}", get(chat_token)),
        ("/chat/{chatType}/{chatid}", get(chat_token)),
        ("/getToken", post(get_token)),
        ("/ping", get(ping)),
    ];

    let mut router = Router::new();
    for (path, method_router) in routes {
        router = router
            .route(path, method_router.clone())
            .route(&format!("{}/", path), method_router);
    }

    router
        .with_state(AppState { dispatcher })
        .layer(from_fn_with_state(Arc::new(origins), origin_gate))
        .layer(from_fn(no_cache))
        .layer(TraceLayer::new_for_http())
}

async fn rtc_token(
    State(state): State<AppState>,
    Path(segments): Segments,
    Query(query): QueryParams,
) -> Result<Json<RtcResponse>, ApiError> {
    let record = resolve_rtc(&RequestParams::new(segments, query))?;
    let issued = state.dispatcher.dispatch(&record)?;

    Ok(Json(RtcResponse {
        rtc_token: issued.token,
        rtm_token: None,
    }))
}

async fn rte_token(
    State(state): State<AppState>,
    Path(segments): Segments,
    Query(query): QueryParams,
) -> Result<Json<RtcResponse>, ApiError> {
    let record = resolve_rte(&RequestParams::new(segments, query))?;
    let issued = state.dispatcher.dispatch(&record)?;

    Ok(Json(RtcResponse {
        rtc_token: issued.token,
        rtm_token: issued.rtm_token,
    }))
}

async fn rtm_token(
    State(state): State<AppState>,
    Path(segments): Segments,
    Query(query): QueryParams,
) -> Result<Json<RtmResponse>, ApiError> {
    let record = resolve_rtm(&RequestParams::new(segments, query))?;
    let issued = state.dispatcher.dispatch(&record)?;

    Ok(Json(RtmResponse {
        rtm_token: issued.token,
    }))
}

async fn chat_token(
    State(state): State<AppState>,
    Path(segments): Segments,
    Query(query): QueryParams,
) -> Result<Json<ChatResponse>, ApiError> {
    let record = resolve_chat(&RequestParams::new(segments, query))?;
    let issued = state.dispatcher.dispatch(&record)?;

    Ok(Json(ChatResponse {
        chat_token: issued.token,
    }))
}

async fn get_token(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TokenResponse>, ApiError> {
    let record = resolve_body(&body)?;
    let issued = state.dispatcher.dispatch(&record)?;

    Ok(Json(TokenResponse {
        token: issued.token,
    }))
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}
