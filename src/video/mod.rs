//! Video capture and stream lifecycle.
//!
//! [`stream`] owns the exclusive camera resource and publishes frames into a
//! [`stream::VideoSink`]; [`webcam`] is the V4L2 capture backend behind it.

pub mod stream;
pub mod webcam;
