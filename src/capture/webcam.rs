//! Desktop camera stream provider using nokhwa
//!
//! Each acquired stream owns a capture thread that holds the camera. Raw
//! frames are handed to whatever sink the encoder attached; FFmpeg does any
//! pixel format conversion.

use crate::capture::traits::{
    CameraInfo, Facing, FrameSink, FrameSource, Resolution, StreamHandle, StreamProvider,
    StreamRequest, StreamSettings, VideoHints,
};
use crate::utils::error::CaptureError;
use async_trait::async_trait;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::Camera;
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;

/// How long the capture thread idles between checks while paused
const PAUSED_POLL: Duration = Duration::from_millis(30);

/// Get list of available cameras
pub fn get_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                let name = info.human_name().to_string();

                CameraInfo {
                    id,
                    facing: guess_facing(&name),
                    name,
                    supported_resolutions: vec![
                        Resolution {
                            width: 1920,
                            height: 1080,
                        },
                        Resolution {
                            width: 1280,
                            height: 720,
                        },
                        Resolution {
                            width: 640,
                            height: 480,
                        },
                    ],
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Guess which way a camera points from its name
fn guess_facing(name: &str) -> Option<Facing> {
    let name = name.to_lowercase();
    if ["back", "rear", "environment"].iter().any(|k| name.contains(k)) {
        Some(Facing::Back)
    } else if ["front", "facetime", "user", "integrated"].iter().any(|k| name.contains(k)) {
        Some(Facing::Front)
    } else {
        None
    }
}

/// Exact match first, then a camera of unknown direction, then anything
fn select_camera(cameras: &[CameraInfo], facing: Facing) -> Option<&CameraInfo> {
    cameras
        .iter()
        .find(|camera| camera.facing == Some(facing))
        .or_else(|| cameras.iter().find(|camera| camera.facing.is_none()))
        .or_else(|| cameras.first())
}

fn camera_index(id: &str) -> CameraIndex {
    match id.parse::<u32>() {
        Ok(idx) => CameraIndex::Index(idx),
        Err(_) => CameraIndex::String(id.to_string()),
    }
}

fn requested_format(hints: &VideoHints) -> RequestedFormat<'static> {
    let kind = match (hints.ideal_width, hints.ideal_height) {
        (Some(width), Some(height)) => RequestedFormatType::Closest(CameraFormat::new(
            nokhwa::utils::Resolution::new(width, height),
            FrameFormat::YUYV,
            hints.frame_rate.unwrap_or(30),
        )),
        _ => RequestedFormatType::AbsoluteHighestResolution,
    };
    RequestedFormat::new::<RgbAFormat>(kind)
}

/// Map a nokhwa failure message onto the capture taxonomy
fn classify_error(message: &str) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CaptureError::PermissionDenied(message.to_string())
    } else if lower.contains("busy") || lower.contains("in use") {
        CaptureError::DeviceBusy(message.to_string())
    } else if lower.contains("format") || lower.contains("resolution") || lower.contains("setproperty")
    {
        CaptureError::UnsupportedConstraints(message.to_string())
    } else if lower.contains("not found") || lower.contains("no such device") {
        CaptureError::DeviceNotFound(message.to_string())
    } else {
        CaptureError::Unknown(message.to_string())
    }
}

/// FFmpeg pixel format name for a nokhwa frame format
fn ffmpeg_pixel_format(format: FrameFormat) -> &'static str {
    match format {
        FrameFormat::YUYV => "yuyv422",
        FrameFormat::NV12 => "nv12",
        FrameFormat::RAWRGB => "rgb24",
        FrameFormat::MJPEG => "mjpeg",
        other => {
            tracing::warn!("Unknown camera format {:?}, assuming yuyv422", other);
            "yuyv422"
        }
    }
}

fn microphone_available() -> bool {
    use cpal::traits::HostTrait;
    cpal::default_host().default_input_device().is_some()
}

/// Frame producer backed by a capture thread
#[derive(Default)]
struct CameraSource {
    paused: AtomicBool,
    stopped: AtomicBool,
    sink: ParkingMutex<Option<FrameSink>>,
    thread: ParkingMutex<Option<JoinHandle<()>>>,
}

impl CameraSource {
    fn deliver(&self, frame: &[u8]) {
        if let Some(sink) = self.sink.lock().as_mut() {
            sink(frame);
        }
    }
}

impl FrameSource for CameraSource {
    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn attach(&self, sink: FrameSink) {
        *self.sink.lock() = Some(sink);
    }

    fn detach(&self) {
        self.sink.lock().take();
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // At most one frame interval; the camera is closed once this returns
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Pick the camera for `facing` and decide whether audio can be recorded
fn resolve_devices(
    facing: Facing,
    want_audio: bool,
) -> Result<(CameraInfo, bool), CaptureError> {
    let cameras = get_cameras();
    let camera = select_camera(&cameras, facing)
        .cloned()
        .ok_or_else(|| CaptureError::DeviceNotFound(format!("No {} camera found", facing)))?;
    if camera.facing != Some(facing) {
        tracing::debug!("No camera clearly facing {}, using {:?}", facing, camera.name);
    }

    let audio_enabled = if want_audio && !microphone_available() {
        tracing::warn!("Audio requested but no microphone is available, recording video only");
        false
    } else {
        want_audio
    };
    Ok((camera, audio_enabled))
}

/// Opens cameras through nokhwa, one capture thread per stream
#[derive(Default)]
pub struct NokhwaStreamProvider;

impl NokhwaStreamProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamProvider for NokhwaStreamProvider {
    async fn acquire(&self, request: &StreamRequest) -> Result<StreamHandle, CaptureError> {
        // Device enumeration blocks; keep it off the runtime so the acquire
        // timeout can still fire
        let (facing, want_audio) = (request.facing, request.audio_enabled);
        let (camera, audio_enabled) =
            tokio::task::spawn_blocking(move || resolve_devices(facing, want_audio))
                .await
                .map_err(|e| CaptureError::Unknown(format!("Device query failed: {}", e)))??;

        let index = camera_index(&camera.id);
        let format = requested_format(&request.video);
        let source = Arc::new(CameraSource::default());
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_source = source.clone();
        let handle = std::thread::spawn(move || {
            let mut camera = match Camera::new(index.clone(), format) {
                Ok(camera) => camera,
                Err(e) => {
                    let _ = ready_tx.send(Err(classify_error(&e.to_string())));
                    return;
                }
            };
            if let Err(e) = camera.open_stream() {
                let _ = ready_tx.send(Err(classify_error(&e.to_string())));
                return;
            }

            let camera_format = camera.camera_format();
            let settings = StreamSettings {
                width: camera_format.resolution().width(),
                height: camera_format.resolution().height(),
                fps: camera_format.frame_rate(),
                pixel_format: ffmpeg_pixel_format(camera_format.format()).to_string(),
            };

            if ready_tx.send(Ok(settings)).is_err() {
                // The session gave up waiting
                tracing::debug!("Camera {:?} opened after acquire was abandoned", index);
                let _ = camera.stop_stream();
                return;
            }

            let mut frame_count: u64 = 0;
            while !thread_source.stopped.load(Ordering::SeqCst) {
                if thread_source.is_paused() {
                    std::thread::sleep(PAUSED_POLL);
                    continue;
                }
                // Blocks until the camera delivers the next frame
                match camera.frame() {
                    Ok(frame) => {
                        thread_source.deliver(frame.buffer());
                        frame_count += 1;
                    }
                    Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
                }
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {:?}", e);
            }
            tracing::debug!("Camera {:?} closed after {} frames", index, frame_count);
        });
        *source.thread.lock() = Some(handle);

        let settings = match ready_rx.await {
            Ok(Ok(settings)) => settings,
            Ok(Err(e)) => {
                source.stop();
                return Err(e);
            }
            Err(_) => {
                source.stop();
                return Err(CaptureError::Unknown("Camera thread exited".to_string()));
            }
        };

        tracing::info!(
            "Opened {:?} for {}: {}x{} @ {}fps ({})",
            camera.name,
            request.facing,
            settings.width,
            settings.height,
            settings.fps,
            settings.pixel_format
        );
        Ok(StreamHandle::new(request.facing, settings, audio_enabled, source))
    }

    async fn release(&self, stream: StreamHandle) {
        // Joining the capture thread blocks
        if let Err(e) = tokio::task::spawn_blocking(move || stream.stop()).await {
            tracing::warn!("Camera release task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(id: &str, name: &str) -> CameraInfo {
        CameraInfo {
            id: id.to_string(),
            name: name.to_string(),
            facing: guess_facing(name),
            supported_resolutions: Vec::new(),
        }
    }

    #[test]
    fn test_guess_facing() {
        assert_eq!(guess_facing("FaceTime HD Camera"), Some(Facing::Front));
        assert_eq!(guess_facing("Rear Camera"), Some(Facing::Back));
        assert_eq!(guess_facing("USB Video Device"), None);
    }

    #[test]
    fn test_select_camera_prefers_matching_facing() {
        let cameras = vec![camera("0", "FaceTime HD Camera"), camera("1", "Back Camera")];
        assert_eq!(select_camera(&cameras, Facing::Back).unwrap().id, "1");
        assert_eq!(select_camera(&cameras, Facing::Front).unwrap().id, "0");
    }

    #[test]
    fn test_select_camera_falls_back() {
        let cameras = vec![camera("0", "FaceTime HD Camera"), camera("1", "USB Capture")];
        assert_eq!(select_camera(&cameras, Facing::Back).unwrap().id, "1");

        let single = vec![camera("0", "FaceTime HD Camera")];
        assert_eq!(select_camera(&single, Facing::Back).unwrap().id, "0");
        assert!(select_camera(&[], Facing::Back).is_none());
    }

    #[test]
    fn test_classify_error() {
        assert_eq!(
            classify_error("Permission denied").code(),
            "PERMISSION_DENIED"
        );
        assert_eq!(classify_error("Device or resource busy").code(), "DEVICE_BUSY");
        assert_eq!(
            classify_error("Could not set format").code(),
            "UNSUPPORTED_CONSTRAINTS"
        );
        assert_eq!(classify_error("boom").code(), "UNKNOWN");
    }

    #[test]
    fn test_camera_index_parsing() {
        assert_eq!(camera_index("2"), CameraIndex::Index(2));
        assert_eq!(
            camera_index("usb-0000"),
            CameraIndex::String("usb-0000".to_string())
        );
    }
}
