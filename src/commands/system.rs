//! System-related Tauri commands
//!
//! Platform detection, capture permissions and basic system information.

use crate::capture::{self, Platform};
use crate::utils::error::{AppError, ErrorResponse};
use serde::{Deserialize, Serialize};

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub platform: Platform,
    pub os_version: String,
    pub arch: String,
}

#[tauri::command]
pub async fn get_platform() -> Result<Platform, String> {
    Ok(capture::current_platform())
}

/// Returns true if capture may be attempted
#[tauri::command]
pub async fn check_and_request_permissions() -> Result<bool, ErrorResponse> {
    let granted = tokio::task::spawn_blocking(capture::check_and_request_permissions)
        .await
        .map_err(|e| AppError::Platform(format!("Permission check failed: {}", e)))?;
    tracing::info!("Capture permissions granted: {}", granted);
    Ok(granted)
}

/// Get basic system information
#[tauri::command]
pub async fn get_system_info() -> Result<SystemInfo, String> {
    Ok(SystemInfo {
        platform: capture::current_platform(),
        os_version: get_os_version(),
        arch: std::env::consts::ARCH.to_string(),
    })
}

fn get_os_version() -> String {
    let output = if cfg!(target_os = "macos") {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
    } else if cfg!(target_os = "windows") {
        std::process::Command::new("cmd").args(["/C", "ver"]).output()
    } else {
        std::process::Command::new("uname").arg("-r").output()
    };

    output
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}
