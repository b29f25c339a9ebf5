//! Capture session Tauri commands
//!
//! Thin wrappers over [`SessionManager`]; every mutation goes through the
//! manager's serialized command path.

use crate::capture::encoder::FfmpegSegmentEncoder;
use crate::capture::webcam::{self, NokhwaStreamProvider};
use crate::capture::{CameraInfo, Facing};
use crate::recorder::{
    FlipOutcome, PreviewItem, SegmentId, SegmentSummary, SessionConfig, SessionManager,
    SessionSnapshot, SessionView, StartOutcome,
};
use crate::utils::error::ErrorResponse;
use serde::Deserialize;
use std::sync::Arc;
use tauri::State;

/// Application state for the capture session
pub struct SessionState {
    pub manager: SessionManager,
}

impl SessionState {
    /// Session backed by the native camera and FFmpeg
    pub fn native(config: SessionConfig) -> Self {
        Self {
            manager: SessionManager::new(
                config,
                Arc::new(NokhwaStreamProvider::new()),
                Arc::new(FfmpegSegmentEncoder::new()),
            ),
        }
    }
}

/// Page visibility reported by the webview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Acquire the camera (defaults to the configured facing)
#[tauri::command]
pub async fn initialize_camera(
    state: State<'_, SessionState>,
    facing: Option<Facing>,
) -> Result<SessionView, ErrorResponse> {
    let facing = match facing {
        Some(facing) => facing,
        None => state.manager.snapshot().await.facing,
    };
    state.manager.initialize(facing).await?;
    Ok(state.manager.snapshot().await.into())
}

/// "Try Again" after an error
#[tauri::command]
pub async fn retry_camera(state: State<'_, SessionState>) -> Result<SessionView, ErrorResponse> {
    state.manager.retry().await?;
    Ok(state.manager.snapshot().await.into())
}

#[tauri::command]
pub async fn flip_camera(state: State<'_, SessionState>) -> Result<FlipOutcome, ErrorResponse> {
    Ok(state.manager.flip().await?)
}

#[tauri::command]
pub async fn start_recording(
    state: State<'_, SessionState>,
) -> Result<StartOutcome, ErrorResponse> {
    Ok(state.manager.start_recording().await?)
}

/// Stop recording; `None` if nothing was recording
#[tauri::command]
pub async fn stop_recording(
    state: State<'_, SessionState>,
) -> Result<Option<SegmentSummary>, ErrorResponse> {
    Ok(state.manager.stop_recording().await?)
}

#[tauri::command]
pub async fn delete_segment(state: State<'_, SessionState>, id: SegmentId) -> Result<bool, String> {
    Ok(state.manager.delete_segment(id).await)
}

#[tauri::command]
pub async fn enter_preview(state: State<'_, SessionState>) -> Result<bool, ErrorResponse> {
    Ok(state.manager.enter_preview().await?)
}

#[tauri::command]
pub async fn exit_preview(state: State<'_, SessionState>) -> Result<bool, ErrorResponse> {
    Ok(state.manager.exit_preview().await?)
}

#[tauri::command]
pub async fn preview_current(
    state: State<'_, SessionState>,
) -> Result<PreviewItem, ErrorResponse> {
    Ok(state.manager.preview_current().await?)
}

/// Encoded bytes of the segment under the preview cursor
#[tauri::command]
pub async fn preview_current_data(
    state: State<'_, SessionState>,
) -> Result<tauri::ipc::Response, ErrorResponse> {
    let item = state.manager.preview_current().await?;
    Ok(tauri::ipc::Response::new(item.data.to_vec()))
}

/// The player reached the end of the current segment
#[tauri::command]
pub async fn advance_preview(
    state: State<'_, SessionState>,
) -> Result<PreviewItem, ErrorResponse> {
    Ok(state.manager.advance_preview().await?)
}

#[tauri::command]
pub async fn set_visibility(
    state: State<'_, SessionState>,
    visibility: Visibility,
) -> Result<(), ErrorResponse> {
    match visibility {
        Visibility::Hidden => state.manager.suspend().await?,
        Visibility::Visible => state.manager.resume().await,
    }
    Ok(())
}

#[tauri::command]
pub async fn get_session_view(state: State<'_, SessionState>) -> Result<SessionView, String> {
    Ok(state.manager.snapshot().await.into())
}

#[tauri::command]
pub async fn get_session_snapshot(
    state: State<'_, SessionState>,
) -> Result<SessionSnapshot, String> {
    Ok(state.manager.snapshot().await)
}

/// Get list of available cameras
#[tauri::command]
pub async fn get_cameras() -> Result<Vec<CameraInfo>, String> {
    tokio::task::spawn_blocking(webcam::get_cameras)
        .await
        .map_err(|e| e.to_string())
}
