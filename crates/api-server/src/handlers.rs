//! HTTP request handlers for the ingest API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use scooper_watch_analyzer::FrameJob;
use scooper_watch_common::{BoundingBox, Detection, DetectionClass, PipelineError};
use tracing::{debug, warn};

use crate::types::{
    AnalyzeFrameRequest, AnalyzeFrameResponse, ErrorResponse, HealthResponse,
    SessionStatsResponse,
};
use crate::ApiState;

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: state.manager.session_count().await,
    })
}

/// Queue one frame for analysis on its session's worker
pub async fn ingest_frame(
    State(state): State<ApiState>,
    Json(request): Json<AnalyzeFrameRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let jpeg = match &request.frame_data {
        Some(data) => Some(BASE64.decode(strip_data_url_prefix(data)).map_err(|e| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("frame_data is not valid base64: {e}"),
            )
        })?),
        None => None,
    };

    let detections = request
        .detections
        .as_ref()
        .map(|dtos| parse_inline_detections(dtos, &request));

    if jpeg.is_none() && detections.is_none() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "frame carries neither frame_data nor detections",
        ));
    }

    let job = FrameJob {
        frame_id: request.frame_id.clone(),
        frame_number: request.frame_number,
        timestamp: request.timestamp,
        jpeg,
        detections,
        source_info: request.source_info.clone(),
    };

    debug!(
        session = %request.session_id,
        frame = %request.frame_id,
        "frame queued for analysis"
    );

    match state.manager.submit(&request.session_id, job).await {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(AnalyzeFrameResponse {
                frame_id: request.frame_id,
                session_id: request.session_id,
                status: "queued".to_string(),
            }),
        )),
        Err(PipelineError::SessionHalted(session)) => {
            warn!(session = %session, "frame rejected, session halted");
            Err(error_response(
                StatusCode::CONFLICT,
                format!("session '{session}' has been halted"),
            ))
        }
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// Statistics for one session
pub async fn get_session_stats(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    match state.manager.stats(&session_id).await {
        Some(stats) => Ok(Json(SessionStatsResponse { session_id, stats })),
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("unknown session '{session_id}'"),
        )),
    }
}

/// Base64 payloads sometimes arrive with a `data:image/...` prefix
fn strip_data_url_prefix(data: &str) -> &str {
    match data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:image") => rest,
        _ => data,
    }
}

/// Inline detections reuse the same tolerant parsing as the detector
/// client: unknown classes warn and drop, missing confidence coerces to 0
fn parse_inline_detections(
    dtos: &[crate::types::DetectionDto],
    request: &AnalyzeFrameRequest,
) -> Vec<Detection> {
    let mut detections = Vec::with_capacity(dtos.len());
    for dto in dtos {
        let Some(class) = DetectionClass::parse(&dto.class_name) else {
            warn!(
                frame = %request.frame_id,
                class = %dto.class_name,
                "skipping unknown detection class"
            );
            continue;
        };
        if dto.bbox.width <= 0.0 || dto.bbox.height <= 0.0 {
            warn!(frame = %request.frame_id, "skipping detection with degenerate bbox");
            continue;
        }
        detections.push(Detection::from_bbox(
            class,
            dto.confidence.unwrap_or(0.0),
            BoundingBox::new(dto.bbox.x, dto.bbox.y, dto.bbox.width, dto.bbox.height),
            request.frame_id.clone(),
            request.timestamp,
        ));
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_url_prefix() {
        assert_eq!(
            strip_data_url_prefix("data:image/jpeg;base64,QUJD"),
            "QUJD"
        );
        assert_eq!(strip_data_url_prefix("QUJD"), "QUJD");
        // Commas in plain payloads are left alone
        assert_eq!(strip_data_url_prefix("not,an,image"), "not,an,image");
    }

    #[test]
    fn test_parse_inline_detections_filters_garbage() {
        let request = AnalyzeFrameRequest {
            frame_id: "f1".to_string(),
            session_id: "s1".to_string(),
            timestamp: chrono::Utc::now(),
            frame_data: None,
            frame_number: 1,
            source_info: scooper_watch_common::SourceInfo {
                source_type: "file".to_string(),
                path: "x.mp4".to_string(),
                fps: 10.0,
                resolution: (640, 480),
            },
            detections: None,
        };

        let dtos = vec![
            crate::types::DetectionDto {
                class_name: "hand".to_string(),
                confidence: None,
                bbox: crate::types::BboxDto {
                    x: 0.0,
                    y: 0.0,
                    width: 50.0,
                    height: 50.0,
                },
            },
            crate::types::DetectionDto {
                class_name: "spatula".to_string(),
                confidence: Some(0.9),
                bbox: crate::types::BboxDto {
                    x: 0.0,
                    y: 0.0,
                    width: 50.0,
                    height: 50.0,
                },
            },
            crate::types::DetectionDto {
                class_name: "hand".to_string(),
                confidence: Some(0.9),
                bbox: crate::types::BboxDto {
                    x: 0.0,
                    y: 0.0,
                    width: 0.0,
                    height: 50.0,
                },
            },
        ];

        let detections = parse_inline_detections(&dtos, &request);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 0.0);
    }
}
