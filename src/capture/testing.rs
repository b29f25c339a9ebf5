//! Scripted provider and encoder doubles for session tests

use super::traits::*;
use crate::utils::error::CaptureError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct FakeSource {
    paused: AtomicBool,
    stopped: AtomicBool,
    sink: Mutex<Option<FrameSink>>,
}

impl FakeSource {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn push_frame(&self, frame: &[u8]) {
        if self.is_paused() || self.is_stopped() {
            return;
        }
        if let Some(sink) = self.sink.lock().as_mut() {
            sink(frame);
        }
    }
}

impl FrameSource for FakeSource {
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
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Succeeds unless a failure has been queued for the requested facing
#[derive(Default)]
pub(crate) struct FakeProvider {
    failures: Mutex<HashMap<Facing, VecDeque<CaptureError>>>,
    delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<StreamRequest>>,
    sources: Mutex<Vec<Arc<FakeSource>>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, facing: Facing, error: CaptureError) {
        self.failures.lock().entry(facing).or_default().push_back(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().clone()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn live_streams(&self) -> usize {
        self.acquired() - self.released()
    }

    pub fn last_source(&self) -> Arc<FakeSource> {
        self.sources.lock().last().cloned().expect("no stream acquired yet")
    }
}

#[async_trait]
impl StreamProvider for FakeProvider {
    async fn acquire(&self, request: &StreamRequest) -> Result<StreamHandle, CaptureError> {
        self.requests.lock().push(request.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .lock()
            .get_mut(&request.facing)
            .and_then(|queue| queue.pop_front());
        if let Some(error) = failure {
            return Err(error);
        }

        let source = Arc::new(FakeSource::default());
        self.sources.lock().push(source.clone());
        self.acquired.fetch_add(1, Ordering::SeqCst);

        let settings = StreamSettings {
            width: request.video.ideal_width.unwrap_or(640),
            height: request.video.ideal_height.unwrap_or(480),
            fps: request.video.frame_rate.unwrap_or(30),
            pixel_format: "yuyv422".to_string(),
        };
        Ok(StreamHandle::new(
            request.facing,
            settings,
            request.audio_enabled,
            source,
        ))
    }

    async fn release(&self, stream: StreamHandle) {
        self.released.fetch_add(1, Ordering::SeqCst);
        stream.stop();
    }
}

/// Collects pushed frames and returns them as the payload
#[derive(Default)]
pub(crate) struct FakeEncoder {
    fail_begin: Mutex<Option<CaptureError>>,
    fail_finish: Mutex<Option<CaptureError>>,
    begun: AtomicUsize,
    finished: Arc<AtomicUsize>,
    discarded: Arc<AtomicUsize>,
    payloads_released: Arc<AtomicUsize>,
}

impl FakeEncoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_begin(&self, error: CaptureError) {
        *self.fail_begin.lock() = Some(error);
    }

    pub fn fail_next_finish(&self, error: CaptureError) {
        *self.fail_finish.lock() = Some(error);
    }

    pub fn begun(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn discarded(&self) -> usize {
        self.discarded.load(Ordering::SeqCst)
    }

    pub fn payloads_released(&self) -> usize {
        self.payloads_released.load(Ordering::SeqCst)
    }
}

struct FakeEncoding {
    index: usize,
    bytes: Arc<Mutex<Vec<u8>>>,
    fail: Option<CaptureError>,
    finished: Arc<AtomicUsize>,
    discarded: Arc<AtomicUsize>,
    payloads_released: Arc<AtomicUsize>,
}

#[async_trait]
impl EncodingSession for FakeEncoding {
    async fn finish(self: Box<Self>) -> Result<EncodedPayload, CaptureError> {
        let FakeEncoding {
            index,
            bytes,
            fail,
            finished,
            payloads_released,
            ..
        } = *self;
        if let Some(error) = fail {
            return Err(error);
        }
        finished.fetch_add(1, Ordering::SeqCst);

        let mut data = format!("segment-{index}:").into_bytes();
        data.extend(bytes.lock().iter());
        Ok(EncodedPayload::new(data, "video/mp4").with_release_hook(move || {
            payloads_released.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn discard(self: Box<Self>) {
        self.discarded.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SegmentEncoder for FakeEncoder {
    async fn begin(&self, stream: &StreamHandle) -> Result<EncoderHandle, CaptureError> {
        if let Some(error) = self.fail_begin.lock().take() {
            return Err(error);
        }
        let index = self.begun.fetch_add(1, Ordering::SeqCst);

        let bytes = Arc::new(Mutex::new(Vec::new()));
        let sink_bytes = bytes.clone();
        stream.attach_sink(Box::new(move |frame| {
            sink_bytes.lock().extend_from_slice(frame);
        }));

        Ok(EncoderHandle::new(Box::new(FakeEncoding {
            index,
            bytes,
            fail: self.fail_finish.lock().take(),
            finished: self.finished.clone(),
            discarded: self.discarded.clone(),
            payloads_released: self.payloads_released.clone(),
        })))
    }
}
