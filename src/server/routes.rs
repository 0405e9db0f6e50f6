use axum::Json;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{ApiError, AppState};
use crate::models::{ScanId, ScanStatus};
use crate::publish::ScanEvent;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    domain: String,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn start_scan(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> ApiResult<Json<Value>> {
    let scan_id = state.coordinator.start(&request.domain).await?;
    Ok(Json(json!({
        "success": true,
        "scanId": scan_id,
        "message": "Scan started",
    })))
}

pub async fn scan_status(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id: ScanId = scan_id.parse()?;
    let record = state.coordinator.get_status(&id).await?;
    let mut body = json!({
        "success": true,
        "status": record.status,
        "progress": record.progress,
        "domain": record.domain,
    });
    if let Some(error) = record.error {
        body["error"] = Value::String(error);
    }
    Ok(Json(body))
}

pub async fn scan_results(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id: ScanId = scan_id.parse()?;
    let report = state.coordinator.get_report(&id).await?;
    Ok(Json(json!({
        "success": true,
        "results": report,
    })))
}

pub async fn cancel_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id: ScanId = scan_id.parse()?;
    state.coordinator.get_status(&id).await?;
    let cancelled = state.coordinator.cancel(&id);
    Ok(Json(json!({
        "success": true,
        "cancelled": cancelled,
        "message": if cancelled { "Cancellation requested" } else { "Scan is not running" },
    })))
}

/// Live events for one scan. A scan that already finished yields its final event only.
pub async fn scan_events(
    State(state): State<AppState>,
    Path(scan_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let id: ScanId = scan_id.parse()?;
    let rx = state.events.subscribe(&id);
    let record = match state.coordinator.get_status(&id).await {
        Ok(record) => record,
        Err(e) => {
            state.events.close(&id);
            return Err(e.into());
        }
    };

    let (snapshot, live) = match record.status {
        ScanStatus::Completed => {
            state.events.close(&id);
            let report = state.coordinator.get_report(&id).await?;
            (
                ScanEvent::ScanComplete {
                    results: Box::new(report),
                },
                None,
            )
        }
        ScanStatus::Failed => {
            state.events.close(&id);
            let error = record.error.unwrap_or_else(|| "scan failed".to_string());
            (ScanEvent::ScanFailed { error }, None)
        }
        ScanStatus::Pending | ScanStatus::Scanning => (
            ScanEvent::progress(record.progress, "Connected"),
            Some(rx),
        ),
    };

    let stream = stream::once(async move { Ok::<_, Infallible>(to_sse(&snapshot)) }).chain(live_events(live));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn live_events(
    rx: Option<broadcast::Receiver<ScanEvent>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |rx| async move {
        let mut rx = rx?;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let next = if event.is_terminal() { None } else { Some(rx) };
                    return Some((Ok(to_sse(&event)), next));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

fn to_sse(event: &ScanEvent) -> Event {
    Event::default()
        .event(event.kind())
        .json_data(event)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
