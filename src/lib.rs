//! Real-time multi-model machine perception.
//!
//! This crate implements a perception pipeline that continuously pulls frames from a live video
//! source, runs several independent perception models (object, face, pose, hand) against each
//! frame, projects every model's output into a renderable overlay, and throttles observable state
//! commits so UI updates stay decoupled from detection cadence.
//!
//! The moving parts, in data-flow order:
//!
//! * [`video::stream`] acquires and releases the exclusive camera resource and publishes frames
//!   into a [`video::stream::VideoSink`].
//! * [`scheduler`] drives one cooperative tick per rendered frame, computes the instantaneous
//!   frame rate, and gates stats commits behind a fixed minimum interval.
//! * [`perception`] owns the four model slots, their load states and the global running mode, and
//!   merges per-model outputs into a [`perception::FrameResult`].
//! * [`overlay`] converts source-pixel coordinates into destination canvas space and paints boxes,
//!   skeletons, landmark points and labels.
//! * [`history`] keeps a capped rolling log of noteworthy detections for display and export.
//!
//! # Environment Variables
//!
//! * `PERCEPT_CAMERA_NAME`: Forces the capture device to use when no explicit device name is
//!   configured. If unset, the first device with a compatible image format is used.

use log::LevelFilter;

pub mod detection;
pub mod face;
pub mod filter;
pub mod hand;
pub mod history;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod object;
pub mod overlay;
pub mod perception;
pub mod pose;
pub mod resolution;
pub mod scheduler;
pub mod slice;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this crate will log at *debug* level, `wgpu` at *warn* level. The
/// defaults can be overridden through the usual `RUST_LOG` syntax.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
