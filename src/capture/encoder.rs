//! FFmpeg segment encoder
//!
//! One FFmpeg process per recording interval. Raw camera frames go in on
//! stdin, fragmented MP4 comes out on stdout and is collected in memory, so a
//! finished segment never touches the disk.

use crate::capture::traits::{
    EncodedPayload, EncoderHandle, EncodingSession, SegmentEncoder, StreamHandle, StreamSettings,
};
use crate::utils::error::CaptureError;
use async_trait::async_trait;
use parking_lot::Mutex as ParkingMutex;
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub const SEGMENT_MIME_TYPE: &str = "video/mp4";

/// Build the FFmpeg argument list for a stream's native format
fn ffmpeg_args(settings: &StreamSettings) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];

    if settings.pixel_format == "mjpeg" {
        // Compressed frames, FFmpeg decodes them
        args.extend(["-f".into(), "mjpeg".into()]);
    } else {
        args.extend([
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            settings.pixel_format.clone(),
            "-video_size".into(),
            format!("{}x{}", settings.width, settings.height),
        ]);
    }

    args.extend([
        "-framerate".into(),
        settings.fps.to_string(),
        "-i".into(),
        "-".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-crf".into(),
        "23".into(),
        "-g".into(),
        (settings.fps.max(1) * 2).to_string(),
        // Fragmented so the muxer never needs to seek back on a pipe
        "-movflags".into(),
        "frag_keyframe+empty_moov".into(),
        "-f".into(),
        "mp4".into(),
        "pipe:1".into(),
    ]);
    args
}

fn collect<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

/// Encodes each recording interval with an FFmpeg subprocess
pub struct FfmpegSegmentEncoder {
    binary: String,
}

impl Default for FfmpegSegmentEncoder {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }
}

impl FfmpegSegmentEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SegmentEncoder for FfmpegSegmentEncoder {
    async fn begin(&self, stream: &StreamHandle) -> Result<EncoderHandle, CaptureError> {
        let settings = stream.settings().clone();
        let mut child = Command::new(&self.binary)
            .args(ffmpeg_args(&settings))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CaptureError::EncoderInitFailed(format!(
                    "FFmpeg not found ({}). Please install FFmpeg",
                    self.binary
                )),
                _ => CaptureError::EncoderInitFailed(e.to_string()),
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            return Err(CaptureError::EncoderInitFailed(
                "FFmpeg pipes unavailable".to_string(),
            ));
        };

        if stream.audio_enabled() {
            tracing::debug!("Camera audio is not muxed, encoding video only");
        }
        tracing::info!(
            "Started FFmpeg segment encoder: {}x{} @ {}fps, pixel_format={}",
            settings.width,
            settings.height,
            settings.fps,
            settings.pixel_format
        );

        let input = Arc::new(ParkingMutex::new(Some(stdin)));
        let frames = Arc::new(AtomicU64::new(0));

        let sink_input = input.clone();
        let sink_frames = frames.clone();
        stream.attach_sink(Box::new(move |frame| {
            let mut guard = sink_input.lock();
            if let Some(stdin) = guard.as_mut() {
                if let Err(e) = stdin.write_all(frame) {
                    tracing::warn!("FFmpeg stopped accepting frames: {}", e);
                    guard.take();
                } else {
                    sink_frames.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));

        Ok(EncoderHandle::new(Box::new(FfmpegEncoding {
            child,
            input,
            frames,
            fps: settings.fps,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })))
    }
}

struct FfmpegEncoding {
    child: Child,
    input: Arc<ParkingMutex<Option<ChildStdin>>>,
    frames: Arc<AtomicU64>,
    fps: u32,
    stdout: JoinHandle<std::io::Result<Vec<u8>>>,
    stderr: JoinHandle<std::io::Result<Vec<u8>>>,
}

impl FfmpegEncoding {
    fn finish_blocking(mut self) -> Result<EncodedPayload, CaptureError> {
        // EOF tells FFmpeg to flush
        drop(self.input.lock().take());

        let status = self
            .child
            .wait()
            .map_err(|e| CaptureError::Unknown(format!("Failed to wait for FFmpeg: {e}")))?;
        let data = self
            .stdout
            .join()
            .map_err(|_| CaptureError::Unknown("FFmpeg reader panicked".to_string()))?
            .map_err(|e| CaptureError::Unknown(format!("Failed to read FFmpeg output: {e}")))?;
        let stderr = self
            .stderr
            .join()
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            tracing::warn!("FFmpeg exited with status {}: {}", status, stderr.trim());
            return Err(CaptureError::Unknown(format!(
                "FFmpeg exited with {status}: {}",
                stderr.trim()
            )));
        }

        let frames = self.frames.load(Ordering::Relaxed);
        if data.is_empty() {
            return Err(CaptureError::Unknown(format!(
                "FFmpeg produced no output from {frames} frames"
            )));
        }

        let encoded_ms = frames * 1_000 / u64::from(self.fps.max(1));
        tracing::info!(
            "FFmpeg segment finished: {} frames, {} bytes",
            frames,
            data.len()
        );
        Ok(EncodedPayload::new(data, SEGMENT_MIME_TYPE).with_encoded_duration(encoded_ms))
    }
}

#[async_trait]
impl EncodingSession for FfmpegEncoding {
    async fn finish(self: Box<Self>) -> Result<EncodedPayload, CaptureError> {
        tokio::task::spawn_blocking(move || (*self).finish_blocking())
            .await
            .map_err(|e| CaptureError::Unknown(format!("Encoder task failed: {e}")))?
    }

    fn discard(mut self: Box<Self>) {
        self.input.lock().take();
        if let Err(e) = self.child.kill() {
            tracing::debug!("FFmpeg already exited: {}", e);
        }
        let _ = self.child.wait();
        tracing::debug!(
            "Discarded FFmpeg segment after {} frames",
            self.frames.load(Ordering::Relaxed)
        );
    }
}
