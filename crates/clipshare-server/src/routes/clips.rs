//! Clip creation and delivery route handlers.

use std::path::PathBuf;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::Response;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clipshare_core::{ClipRecord, ClipToken, Error, ExtractionRequest};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::routes::streaming_helpers::{serve_file_streaming, ServeOptions};
use crate::sweeper::{reclaim_if_expired, Reclaim};

/// Request body for `POST /clip`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClipRequest {
    /// Media file to cut from. Wins over `item_id` when both are present.
    #[serde(alias = "mediaPath")]
    pub source_path: Option<String>,
    /// Library item id, resolved to a path through the context's resolver.
    pub item_id: Option<String>,
    pub start_seconds: Option<f64>,
    pub end_seconds: Option<f64>,
    /// Lifetime in hours; `<= 0` or absent means the configured default.
    #[serde(alias = "expireHours")]
    pub expire_hours_override: Option<i64>,
}

impl CreateClipRequest {
    /// Turn the wire body into an [`ExtractionRequest`].
    pub fn into_extraction(self, ctx: &AppContext) -> Result<ExtractionRequest, Error> {
        let source_path = match (non_empty(self.source_path), non_empty(self.item_id)) {
            (Some(path), _) => PathBuf::from(path),
            (None, Some(id)) => ctx
                .resolver
                .resolve(&id)
                .ok_or_else(|| Error::not_found("media item", &id))?,
            (None, None) => {
                return Err(Error::Validation(
                    "sourcePath or itemId is required".into(),
                ))
            }
        };

        let start_seconds = self
            .start_seconds
            .ok_or_else(|| Error::Validation("startSeconds is required".into()))?;
        let end_seconds = self
            .end_seconds
            .ok_or_else(|| Error::Validation("endSeconds is required".into()))?;

        Ok(ExtractionRequest {
            source_path,
            start_seconds,
            end_seconds,
            expire_hours_override: self.expire_hours_override,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Response body for a created clip.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClipResponse {
    pub url: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Response body for `GET /clip/{token}/info`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipInfoResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// POST /clip
pub async fn create_clip(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Result<Json<CreateClipRequest>, JsonRejection>,
) -> Result<Json<CreateClipResponse>, AppError> {
    let tag = |e: Error| AppError::new(e).with_request_id(request_id.0.clone());

    let Json(body) = body.map_err(|rejection| {
        tag(Error::Validation(format!("invalid request body: {}", rejection.body_text())))
    })?;
    let request = body.into_extraction(&ctx).map_err(tag)?;

    let base_url = base_url(&ctx, &headers);
    let created = crate::clips::create_clip(&ctx, &request, &base_url)
        .await
        .map_err(tag)?;

    Ok(Json(CreateClipResponse {
        url: created.url,
        token: created.record.token.to_string(),
        expires_at: created.record.expires_at,
    }))
}

/// GET and HEAD /clip/{token}
pub async fn get_clip(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let now = ctx.clock.now();
    let record = live_record(&ctx, &token, now)?;

    let extension = record
        .output_path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| ctx.config.clips.output_extension.clone());
    let max_age = record.remaining(now).num_seconds();

    let mut extra_headers = Vec::new();
    if let Ok(v) = HeaderValue::from_str(&format!(
        "inline; filename=\"clip-{}.{extension}\"",
        record.token
    )) {
        extra_headers.push((header::CONTENT_DISPOSITION, v));
    }
    if let Ok(v) = HeaderValue::from_str(&format!("private, max-age={max_age}")) {
        extra_headers.push((header::CACHE_CONTROL, v));
    }

    let opts = ServeOptions {
        range_header: headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok()),
        head_only: method == Method::HEAD,
        extra_headers,
    };

    serve_file_streaming(&record.output_path, opts)
        .await
        .map_err(|_| clip_not_found(&token))
}

/// GET /clip/{token}/info
pub async fn clip_info(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> Result<Json<ClipInfoResponse>, AppError> {
    let record = live_record(&ctx, &token, ctx.clock.now())?;
    let size_bytes = tokio::fs::metadata(&record.output_path)
        .await
        .map(|m| m.len())
        .map_err(|_| clip_not_found(&token))?;

    Ok(Json(ClipInfoResponse {
        token: record.token.to_string(),
        expires_at: record.expires_at,
        size_bytes,
    }))
}

/// Look up an unexpired clip. Malformed, unknown, and expired tokens all
/// come back as the same not-found error; an expired clip is reclaimed on
/// the way out.
fn live_record(ctx: &AppContext, raw: &str, now: DateTime<Utc>) -> Result<ClipRecord, AppError> {
    let token: ClipToken = raw.parse().map_err(|_| clip_not_found(raw))?;
    let record = ctx.registry.lookup(&token).ok_or_else(|| clip_not_found(raw))?;

    if record.is_expired(now) {
        if reclaim_if_expired(&ctx.registry, &token, now) == Reclaim::Skipped {
            tracing::debug!(token = %token, "Expired clip already reclaimed elsewhere");
        }
        return Err(clip_not_found(raw));
    }

    Ok(record)
}

fn clip_not_found(token: &str) -> AppError {
    AppError::new(Error::not_found("clip", token))
}

/// Origin that clip links are built on.
///
/// A configured `public_base_url` wins. Otherwise the request's forwarded or
/// direct host is used, falling back to the listen address.
fn base_url(ctx: &AppContext, headers: &HeaderMap) -> String {
    if let Some(ref url) = ctx.config.server.public_base_url {
        return url.trim_end_matches('/').to_string();
    }

    let proto = first_value(headers, "x-forwarded-proto").unwrap_or("http");
    match first_value(headers, "x-forwarded-host").or_else(|| first_value(headers, "host")) {
        Some(host) => format!("{proto}://{host}"),
        None => format!(
            "http://{}:{}",
            ctx.config.server.host, ctx.config.server.port
        ),
    }
}

/// First comma-separated element of a header, if present and non-empty.
fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
