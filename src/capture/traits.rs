//! Capture trait definitions
//!
//! Platform-agnostic seams for the camera stream provider and the segment
//! encoder. The session manager only talks to these traits; native
//! implementations live behind the `desktop` feature.

use crate::utils::error::CaptureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Which physical camera is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// User-facing camera
    Front,
    /// Environment-facing camera
    Back,
}

impl Facing {
    pub fn opposite(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

impl Default for Facing {
    fn default() -> Self {
        Self::Back
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Front => f.write_str("front"),
            Self::Back => f.write_str("back"),
        }
    }
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Facing guessed from the device name, if any
    pub facing: Option<Facing>,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Preferred (not mandatory) video parameters for a stream.
///
/// `None` everywhere means "whatever the device gives us".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoHints {
    pub ideal_width: Option<u32>,
    pub ideal_height: Option<u32>,
    pub frame_rate: Option<u32>,
}

impl VideoHints {
    pub fn unconstrained() -> Self {
        Self {
            ideal_width: None,
            ideal_height: None,
            frame_rate: None,
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.ideal_width.is_none() && self.ideal_height.is_none() && self.frame_rate.is_none()
    }
}

impl Default for VideoHints {
    fn default() -> Self {
        Self {
            ideal_width: Some(1920),
            ideal_height: Some(1080),
            frame_rate: Some(30),
        }
    }
}

/// Parameters for one stream acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: Facing,
    pub video: VideoHints,
    pub audio_enabled: bool,
}

impl StreamRequest {
    pub fn new(facing: Facing, video: VideoHints, audio_enabled: bool) -> Self {
        Self {
            facing,
            video,
            audio_enabled,
        }
    }

    /// Same request with every video hint dropped
    pub fn relaxed(&self) -> Self {
        Self {
            facing: self.facing,
            video: VideoHints::unconstrained(),
            audio_enabled: self.audio_enabled,
        }
    }
}

/// What the device actually delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// FFmpeg pixel format name of the raw frames (e.g. `yuyv422`)
    pub pixel_format: String,
}

/// Receives raw frames from a live stream
pub type FrameSink = Box<dyn FnMut(&[u8]) + Send>;

/// Live frame producer behind a [`StreamHandle`]
pub trait FrameSource: Send + Sync {
    /// Stop delivering frames without closing the device
    fn set_paused(&self, paused: bool);

    fn is_paused(&self) -> bool;

    /// Route frames to `sink`, replacing any previous sink
    fn attach(&self, sink: FrameSink);

    fn detach(&self);

    /// Close the device. Must be safe to call more than once.
    fn stop(&self);
}

/// Owned handle to a live capture stream
pub struct StreamHandle {
    id: Uuid,
    facing: Facing,
    settings: StreamSettings,
    audio_enabled: bool,
    source: Arc<dyn FrameSource>,
}

impl StreamHandle {
    pub fn new(
        facing: Facing,
        settings: StreamSettings,
        audio_enabled: bool,
        source: Arc<dyn FrameSource>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            facing,
            settings,
            audio_enabled,
            source,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn set_paused(&self, paused: bool) {
        self.source.set_paused(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.source.is_paused()
    }

    pub fn attach_sink(&self, sink: FrameSink) {
        self.source.attach(sink);
    }

    pub fn detach_sink(&self) {
        self.source.detach();
    }

    /// Stop all tracks
    pub fn stop(&self) {
        self.source.detach();
        self.source.stop();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("facing", &self.facing)
            .field("settings", &self.settings)
            .field("audio_enabled", &self.audio_enabled)
            .finish()
    }
}

/// Acquires and releases live capture streams
#[async_trait]
pub trait StreamProvider: Send + Sync {
    async fn acquire(&self, request: &StreamRequest) -> Result<StreamHandle, CaptureError>;

    async fn release(&self, stream: StreamHandle) {
        stream.stop();
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send + Sync>;

/// Encoded media produced by one start/stop cycle.
///
/// The payload owns its backing resource. An optional release hook runs
/// exactly once when the payload is dropped.
pub struct EncodedPayload {
    data: Arc<[u8]>,
    mime_type: String,
    encoded_duration_ms: Option<u64>,
    on_release: Option<ReleaseHook>,
}

impl EncodedPayload {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            encoded_duration_ms: None,
            on_release: None,
        }
    }

    /// Duration reported by the encoder, informational only
    pub fn with_encoded_duration(mut self, duration_ms: u64) -> Self {
        self.encoded_duration_ms = Some(duration_ms);
        self
    }

    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn encoded_duration_ms(&self) -> Option<u64> {
        self.encoded_duration_ms
    }
}

impl Drop for EncodedPayload {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

impl fmt::Debug for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedPayload")
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("encoded_duration_ms", &self.encoded_duration_ms)
            .finish()
    }
}

/// One in-flight encoding, created by [`SegmentEncoder::begin`]
#[async_trait]
pub trait EncodingSession: Send + Sync {
    /// Flush the encoder and hand back the encoded bytes
    async fn finish(self: Box<Self>) -> Result<EncodedPayload, CaptureError>;

    /// Throw the encoding away without producing a payload
    fn discard(self: Box<Self>);
}

/// Opaque handle to the active encoder
pub struct EncoderHandle {
    id: Uuid,
    session: Box<dyn EncodingSession>,
}

impl EncoderHandle {
    pub fn new(session: Box<dyn EncodingSession>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn finish(self) -> Result<EncodedPayload, CaptureError> {
        self.session.finish().await
    }

    pub fn discard(self) {
        self.session.discard();
    }
}

impl fmt::Debug for EncoderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderHandle").field("id", &self.id).finish()
    }
}

/// Turns a live stream into one encoded blob per start/stop cycle
#[async_trait]
pub trait SegmentEncoder: Send + Sync {
    async fn begin(&self, stream: &StreamHandle) -> Result<EncoderHandle, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_relaxed_request_drops_hints() {
        let request = StreamRequest::new(Facing::Front, VideoHints::default(), true);
        let relaxed = request.relaxed();
        assert!(relaxed.video.is_unconstrained());
        assert_eq!(relaxed.facing, Facing::Front);
        assert!(relaxed.audio_enabled);
        assert!(!request.video.is_unconstrained());
    }

    #[test]
    fn test_payload_release_hook_runs_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let payload = EncodedPayload::new(vec![1, 2, 3], "video/mp4").with_release_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let data = payload.data().clone();

        drop(payload);

        assert_eq!(released.load(Ordering::SeqCst), 1);
        // Outstanding preview buffers stay readable
        assert_eq!(&data[..], &[1, 2, 3]);
    }

    #[derive(Default)]
    struct CountingSource {
        stops: AtomicUsize,
    }

    impl FrameSource for CountingSource {
        fn set_paused(&self, _paused: bool) {}

        fn is_paused(&self) -> bool {
            false
        }

        fn attach(&self, _sink: FrameSink) {}

        fn detach(&self) {}

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_dropped_stream_stops_source() {
        let source = Arc::new(CountingSource::default());
        let settings = StreamSettings {
            width: 640,
            height: 480,
            fps: 30,
            pixel_format: "yuyv422".to_string(),
        };
        let stream = StreamHandle::new(Facing::Back, settings, false, source.clone());

        drop(stream);

        assert!(source.stops.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_facing_opposite_and_display() {
        assert_eq!(Facing::Front.opposite(), Facing::Back);
        assert_eq!(Facing::default().to_string(), "back");
    }
}
