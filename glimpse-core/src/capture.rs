//! Screen capture front end for the detection pipeline.
//!
//! [`FrameSource`] owns a pair of fixed frame buffers and hands out borrowed
//! views into them, so steady-state capture performs no per-cycle allocation.
//! Capture handles are cached per thread because most platform grabbers are
//! not safe to share across threads.

use std::{
    collections::{hash_map::Entry, HashMap},
    ops::Deref,
    sync::{Mutex, MutexGuard},
    thread::{self, ThreadId},
};

use log::{debug, error};
use screenshots::Screen;
use thiserror::Error;

use crate::frame::{CaptureRegion, Frame};

/// Failures surfaced by a capture backend.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("no display contains point ({left}, {top})")]
    NoScreen { left: i32, top: i32 },
    #[error("screen grab failed: {0}")]
    Grab(String),
    #[error("capture returned {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Raw pixels handed back by a backend, packed RGBA.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A single-threaded grabber for one screen region.
///
/// Implementations are created once per calling thread by [`FrameSource`] and
/// reused for every subsequent grab from that thread.
pub trait CaptureBackend: Send {
    fn grab(&mut self, region: &CaptureRegion) -> Result<RawCapture, CaptureError>;
}

/// Backend that grabs from a physical display via the `screenshots` crate.
pub struct ScreenBackend {
    screen: Screen,
}

impl ScreenBackend {
    /// Locate the display containing the region's top-left corner.
    pub fn open(region: &CaptureRegion) -> Result<Self, CaptureError> {
        let screen = Screen::from_point(region.left, region.top).map_err(|_| {
            CaptureError::NoScreen {
                left: region.left,
                top: region.top,
            }
        })?;
        Ok(Self { screen })
    }
}

impl CaptureBackend for ScreenBackend {
    fn grab(&mut self, region: &CaptureRegion) -> Result<RawCapture, CaptureError> {
        let info = self.screen.display_info;
        // capture_area expects coordinates relative to this display's origin.
        let x = region.left - info.x;
        let y = region.top - info.y;
        let image = self
            .screen
            .capture_area(x, y, region.width, region.height)
            .map_err(|err| CaptureError::Grab(err.to_string()))?;
        Ok(RawCapture {
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
        })
    }
}

struct Buffers {
    current: Frame,
    last_good: Frame,
}

/// Thread-safe frame source with two pre-allocated buffers.
///
/// `capture` never fails from the caller's perspective: when a grab goes wrong
/// the most recent successful frame is served instead (a black frame before
/// the first success). This keeps the downstream loop running through
/// transient capture hiccups.
pub struct FrameSource<B: CaptureBackend> {
    region: CaptureRegion,
    opener: Box<dyn Fn(&CaptureRegion) -> Result<B, CaptureError> + Send + Sync>,
    handles: Mutex<HashMap<ThreadId, B>>,
    buffers: Mutex<Buffers>,
}

impl FrameSource<ScreenBackend> {
    /// Frame source backed by the display containing `region`.
    pub fn open(region: CaptureRegion) -> Self {
        Self::with_backend(region, ScreenBackend::open)
    }
}

impl<B: CaptureBackend> FrameSource<B> {
    /// Frame source with a custom backend factory. The factory runs once per
    /// capturing thread, on that thread's first call to [`capture`][Self::capture].
    pub fn with_backend<F>(region: CaptureRegion, opener: F) -> Self
    where
        F: Fn(&CaptureRegion) -> Result<B, CaptureError> + Send + Sync + 'static,
    {
        Self {
            region,
            opener: Box::new(opener),
            handles: Mutex::new(HashMap::new()),
            buffers: Mutex::new(Buffers {
                current: Frame::zeroed(region.width, region.height),
                last_good: Frame::zeroed(region.width, region.height),
            }),
        }
    }

    pub fn region(&self) -> CaptureRegion {
        self.region
    }

    /// Grab one frame of the configured region.
    ///
    /// The returned view borrows the source's internal buffers and holds their
    /// lock, so it should be dropped before the next call to `capture`.
    pub fn capture(&self) -> FrameView<'_> {
        let grabbed = self.grab_on_current_thread().and_then(|raw| {
            let expected = self.region.pixel_count() * 4;
            if raw.data.len() == expected {
                Ok(raw)
            } else {
                Err(CaptureError::BufferSize {
                    expected,
                    actual: raw.data.len(),
                })
            }
        });

        let mut buffers = self.buffers.lock().expect("frame buffers poisoned");
        match grabbed {
            Ok(raw) => {
                buffers.current.fill_from_rgba(&raw.data);
                let Buffers { current, last_good } = &mut *buffers;
                last_good.copy_from(current);
                FrameView {
                    buffers,
                    current: true,
                }
            }
            Err(err) => {
                error!("capture failed, serving last good frame: {err}");
                FrameView {
                    buffers,
                    current: false,
                }
            }
        }
    }

    /// Release the calling thread's capture handle, if one was opened.
    /// Handles opened by other threads are left untouched; each thread is
    /// responsible for closing its own. Safe to call repeatedly.
    pub fn close(&self) {
        let mut handles = self.handles.lock().expect("capture handles poisoned");
        if handles.remove(&thread::current().id()).is_some() {
            debug!("released capture handle for {:?}", thread::current().id());
        }
    }

    fn grab_on_current_thread(&self) -> Result<RawCapture, CaptureError> {
        let mut handles = self.handles.lock().expect("capture handles poisoned");
        let backend = match handles.entry(thread::current().id()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(slot) => {
                let backend = (self.opener)(&self.region)?;
                debug!("opened capture handle for {:?}", thread::current().id());
                slot.insert(backend)
            }
        };
        backend.grab(&self.region)
    }
}

/// Borrowed view of the most recent frame.
///
/// Dereferences to the freshly captured frame when the grab succeeded, or to
/// the last good frame otherwise.
pub struct FrameView<'a> {
    buffers: MutexGuard<'a, Buffers>,
    current: bool,
}

impl FrameView<'_> {
    /// `false` when this view is a stale fallback after a failed grab.
    pub fn is_current(&self) -> bool {
        self.current
    }
}

impl Deref for FrameView<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        if self.current {
            &self.buffers.current
        } else {
            &self.buffers.last_good
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    /// Backend driven by a scripted queue of grab outcomes.
    struct FakeBackend {
        script: Arc<Mutex<VecDeque<Result<RawCapture, CaptureError>>>>,
    }

    impl CaptureBackend for FakeBackend {
        fn grab(&mut self, _region: &CaptureRegion) -> Result<RawCapture, CaptureError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CaptureError::Grab("script exhausted".into())))
        }
    }

    fn solid_capture(region: CaptureRegion, r: u8, g: u8, b: u8) -> RawCapture {
        let mut data = Vec::with_capacity(region.pixel_count() * 4);
        for _ in 0..region.pixel_count() {
            data.extend_from_slice(&[r, g, b, 255]);
        }
        RawCapture {
            data,
            width: region.width,
            height: region.height,
        }
    }

    fn scripted_source(
        region: CaptureRegion,
        script: Vec<Result<RawCapture, CaptureError>>,
    ) -> FrameSource<FakeBackend> {
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        FrameSource::with_backend(region, move |_| {
            Ok(FakeBackend {
                script: Arc::clone(&script),
            })
        })
    }

    #[test]
    fn failures_before_first_success_serve_black_frames() {
        let region = CaptureRegion::new(0, 0, 2, 2);
        let source = scripted_source(
            region,
            vec![
                Err(CaptureError::Grab("boom".into())),
                Err(CaptureError::Grab("boom".into())),
                Ok(solid_capture(region, 9, 8, 7)),
            ],
        );

        for _ in 0..2 {
            let view = source.capture();
            assert!(!view.is_current());
            assert!(view.data().iter().all(|&b| b == 0));
        }

        let view = source.capture();
        assert!(view.is_current());
        // RGBA (9, 8, 7) lands in the frame as BGR (7, 8, 9).
        assert_eq!(&view.data()[..3], &[7, 8, 9]);
    }

    #[test]
    fn last_good_frame_survives_later_failures() {
        let region = CaptureRegion::new(0, 0, 1, 1);
        let source = scripted_source(
            region,
            vec![
                Ok(solid_capture(region, 100, 50, 25)),
                Err(CaptureError::Grab("lost display".into())),
                Err(CaptureError::Grab("lost display".into())),
            ],
        );

        {
            let view = source.capture();
            assert!(view.is_current());
        }
        for _ in 0..2 {
            let view = source.capture();
            assert!(!view.is_current());
            assert_eq!(view.data(), &[25, 50, 100]);
        }
    }

    #[test]
    fn short_buffer_is_treated_as_a_failed_grab() {
        let region = CaptureRegion::new(0, 0, 2, 2);
        let source = scripted_source(
            region,
            vec![Ok(RawCapture {
                data: vec![1, 2, 3, 4],
                width: 1,
                height: 1,
            })],
        );

        let view = source.capture();
        assert!(!view.is_current());
        assert!(view.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn backend_opens_once_per_thread() {
        let region = CaptureRegion::new(0, 0, 1, 1);
        let opens = Arc::new(AtomicUsize::new(0));
        let opens_in_factory = Arc::clone(&opens);
        let source = FrameSource::with_backend(region, move |r: &CaptureRegion| {
            opens_in_factory.fetch_add(1, Ordering::SeqCst);
            let script = vec![
                Ok(solid_capture(*r, 1, 1, 1)),
                Ok(solid_capture(*r, 2, 2, 2)),
            ];
            Ok(FakeBackend {
                script: Arc::new(Mutex::new(VecDeque::from(script))),
            })
        });

        source.capture();
        source.capture();
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        let source = Arc::new(source);
        let worker = Arc::clone(&source);
        thread::spawn(move || {
            worker.capture();
            worker.capture();
        })
        .join()
        .unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn close_releases_only_this_thread_and_reopens_on_demand() {
        let region = CaptureRegion::new(0, 0, 1, 1);
        let opens = Arc::new(AtomicUsize::new(0));
        let opens_in_factory = Arc::clone(&opens);
        let source = FrameSource::with_backend(region, move |r: &CaptureRegion| {
            opens_in_factory.fetch_add(1, Ordering::SeqCst);
            Ok(FakeBackend {
                script: Arc::new(Mutex::new(VecDeque::from(vec![Ok(solid_capture(
                    *r, 5, 5, 5,
                ))]))),
            })
        });

        source.capture();
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        source.close();
        source.close();

        source.capture();
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn opener_failure_serves_last_good_frame() {
        let region = CaptureRegion::new(0, 0, 1, 1);
        let source: FrameSource<FakeBackend> = FrameSource::with_backend(region, |_| {
            Err(CaptureError::NoScreen { left: 0, top: 0 })
        });

        let view = source.capture();
        assert!(!view.is_current());
        assert!(view.data().iter().all(|&b| b == 0));
    }
}
