//! Platform detection and capture permissions
//!
//! Only the desktop platforms are shipped targets. The mobile variants exist
//! so the frontend can branch on them; there is no native permission bridge
//! for them here. Their OS prompts for camera and microphone access the first
//! time a stream is opened, so a denied prompt surfaces later as
//! `CaptureError::PermissionDenied` from the stream provider.

use serde::{Deserialize, Serialize};

/// Platform the app is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Macos,
    Windows,
    Linux,
    Unknown,
}

impl Platform {
    pub fn is_mobile(self) -> bool {
        matches!(self, Self::Ios | Self::Android)
    }
}

/// Get the platform this binary was built for
pub fn current_platform() -> Platform {
    if cfg!(target_os = "ios") {
        Platform::Ios
    } else if cfg!(target_os = "android") {
        Platform::Android
    } else if cfg!(target_os = "macos") {
        Platform::Macos
    } else if cfg!(target_os = "windows") {
        Platform::Windows
    } else if cfg!(target_os = "linux") {
        Platform::Linux
    } else {
        Platform::Unknown
    }
}

/// Check camera and microphone permissions, requesting them where the
/// platform supports an up-front request.
///
/// Returns true if capture may be attempted.
pub fn check_and_request_permissions() -> bool {
    permissions_for(current_platform(), has_capture_device)
}

fn permissions_for(platform: Platform, has_device: impl FnOnce() -> bool) -> bool {
    match platform {
        // Unsupported targets: defer to the OS prompt on first stream open
        Platform::Ios | Platform::Android => true,
        Platform::Unknown => false,
        Platform::Macos | Platform::Windows | Platform::Linux => has_device(),
    }
}

#[cfg(feature = "desktop")]
fn has_capture_device() -> bool {
    let available = !crate::capture::webcam::get_cameras().is_empty();
    if !available {
        tracing::warn!("No camera available for capture");
    }
    available
}

#[cfg(not(feature = "desktop"))]
fn has_capture_device() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::Android).unwrap();
        assert_eq!(json, "\"android\"");
        assert!(Platform::Ios.is_mobile());
        assert!(!Platform::Linux.is_mobile());
    }

    #[test]
    fn test_permissions_by_platform() {
        assert!(permissions_for(Platform::Android, || false));
        assert!(permissions_for(Platform::Ios, || false));
        assert!(!permissions_for(Platform::Unknown, || true));
        assert!(permissions_for(Platform::Linux, || true));
        assert!(!permissions_for(Platform::Windows, || false));
    }

    #[test]
    fn test_current_platform_is_known_on_ci_targets() {
        if cfg!(any(target_os = "linux", target_os = "macos", target_os = "windows")) {
            assert_ne!(current_platform(), Platform::Unknown);
            assert!(!current_platform().is_mobile());
        }
    }
}
