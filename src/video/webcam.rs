//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::{cmp::Reverse, env};

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::Image;
use crate::resolution::Resolution;
use crate::timer::Timer;
use crate::video::stream::{CaptureDevice, StreamConstraints, StreamError};

const ENV_VAR_CAMERA_NAME: &str = "PERCEPT_CAMERA_NAME";

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
}

fn negotiate_format(device: &Device, mut prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixel_format() == PixelFormat::JPEG || format.pixel_format() == PixelFormat::MJPG {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    // Constraints are hints: drop the resolution hint first, then the frame rate hint, before
    // giving up entirely.
    loop {
        if let Some(fmt) = negotiate_format_step(&formats, prefs) {
            return Ok((
                PixFormat::new(
                    fmt.resolution.width(),
                    fmt.resolution.height(),
                    pixel_format,
                ),
                fmt.frame_interval,
            ));
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        if prefs.resolution.take().is_none() && prefs.fps.take().is_none() {
            break;
        }
        log::debug!("retrying with relaxed prefs {:?}", prefs);
    }

    bail!("failed to negotiate a camera format")
}

fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut eligible = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();
    eligible.sort_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.frame_interval)));
    eligible.last().copied()
}

/// A V4L2 webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    width: u32,
    height: u32,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam matching `constraints`.
    ///
    /// This can block for a significant amount of time while the webcam initializes (on the
    /// order of hundreds of milliseconds).
    pub fn open(constraints: &StreamConstraints) -> Result<Self, StreamError> {
        let list = linuxvideo::list()
            .map_err(|e| StreamError::DeviceUnavailable(format!("device enumeration failed: {e}")))?;

        let mut candidates = Vec::new();
        for res in list {
            match res {
                Ok(dev) => candidates.push(dev),
                Err(e) => log::warn!("{}", e),
            }
        }

        // Facing is a soft preference, expressed by trying matching device names first.
        if constraints.facing != crate::video::stream::Facing::Any {
            candidates.sort_by_key(|dev| {
                let card = dev
                    .capabilities()
                    .map(|caps| caps.card().to_lowercase())
                    .unwrap_or_default();
                !constraints.facing.matches(&card)
            });
        }

        let mut denied = false;
        for dev in candidates {
            match Self::open_impl(dev, constraints) {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) => {
                    if is_permission_denied(&e) {
                        denied = true;
                    }
                    log::debug!("{:#}", e);
                }
            }
        }

        if denied {
            Err(StreamError::PermissionDenied(
                "the operating system refused access to the capture device".into(),
            ))
        } else {
            Err(StreamError::DeviceUnavailable(
                "no supported capture device found".into(),
            ))
        }
    }

    fn open_impl(dev: Device, constraints: &StreamConstraints) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        let name_from_env = env::var(ENV_VAR_CAMERA_NAME).ok();
        if let Some(name) = constraints.device_name.as_deref().or(name_from_env.as_deref()) {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let prefs = FramePrefs {
            resolution: constraints.resolution,
            fps: constraints.fps,
        };
        let (pixfmt, fract) = negotiate_format(&dev, prefs)?;

        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let width = format.width();
        let height = format.height();

        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {}x{} @ {:.1}Hz",
            caps.card(),
            path.display(),
            width,
            height,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream()?;

        Ok(Some(Self {
            stream,
            width,
            height,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Reads the next frame from the camera, blocking until one is available.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let width = self.width;
        let height = self.height;
        let t_decode = &self.t_decode;
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let image = match t_decode.time(|| Image::decode_jpeg(&buf)) {
                    Ok(image) => image,
                    Err(e) => {
                        // Even high-quality webcams produce occasional corrupted MJPG frames.
                        // Hand back a blank image instead of skipping: skipping causes latency
                        // spikes, and a corrupted frame yields no usable detections either way.
                        log::error!("webcam decode error: {}", e);
                        Image::new(width, height)
                    }
                };
                Ok(image)
            })
            .map_err(Into::into)
    }

    /// Returns profiling timers for webcam access and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

impl CaptureDevice for Webcam {
    fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    fn read_frame(&mut self) -> anyhow::Result<Image> {
        self.read()
    }
}

fn is_permission_denied(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .map_or(false, |io| io.kind() == std::io::ErrorKind::PermissionDenied)
    })
}
