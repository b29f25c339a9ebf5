//! Camera capture seams and platform adapters
//!
//! This module provides the stream provider and segment encoder traits, the
//! native nokhwa/FFmpeg implementations, and platform permission helpers.

pub mod permissions;
pub mod traits;

#[cfg(feature = "desktop")]
pub mod encoder;
#[cfg(feature = "desktop")]
pub mod webcam;

#[cfg(test)]
pub(crate) mod testing;

// Re-export traits
pub use traits::{
    CameraInfo, EncodedPayload, EncoderHandle, EncodingSession, Facing, FrameSink, FrameSource,
    Resolution, SegmentEncoder, StreamHandle, StreamProvider, StreamRequest, StreamSettings,
    VideoHints,
};

pub use permissions::{check_and_request_permissions, current_platform, Platform};
