//! Code-scanning state machine.
//!
//! ```text
//! Idle -> CameraAcquired -> Scanning -> { Decoded | TimedOut | Stopped | Error }
//! ```
//!
//! A scan runs as one cooperative task: every frame tick is a suspension
//! point, and the shared "scanning active" flag behind [`ScanHandle`] is
//! checked at the top of each tick. The capture device is held through a
//! lease that releases it and hides the preview when dropped, so every exit
//! (success, timeout, stop, device fault, or a panic while decoding) gives
//! the camera back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use rollcall_shared::constants::{SCAN_FRAME_INTERVAL_MS, SCAN_TIMEOUT_SECS};

use crate::error::ScanError;

/// One captured image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels, row-major.
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    /// A device that is still warming up reports zero-sized frames.
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No capture API available")]
    Unsupported,

    #[error("Capture device refused: {0}")]
    Rejected(String),

    /// A single frame could not be read; the next tick retries.
    #[error("Frame capture failed: {0}")]
    Frame(String),

    /// The device went away mid-scan.
    #[error("Capture device disconnected: {0}")]
    Disconnected(String),
}

/// A camera (or any frame source) that can be held by one scan at a time.
#[async_trait]
pub trait CaptureDevice: Send {
    /// Take exclusive hold of the device.
    async fn acquire(&mut self) -> Result<(), CaptureError>;

    async fn grab_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Give the device back. Must be safe to call after a failed acquire.
    fn release(&mut self);

    /// Show or hide the live preview surface.
    fn set_preview_visible(&mut self, _visible: bool) {}
}

#[derive(Error, Debug)]
#[error("{0}")]
pub struct DecodeError(pub String);

/// Finds a machine-readable code in a frame. `Ok(None)` means the frame was
/// readable but held no code.
pub trait CodeDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Result<Option<String>, DecodeError>;
}

impl<F> CodeDecoder for F
where
    F: Fn(&Frame) -> Result<Option<String>, DecodeError> + Send + Sync,
{
    fn decode(&self, frame: &Frame) -> Result<Option<String>, DecodeError> {
        self(frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    CameraAcquired,
    Scanning,
    Decoded,
    TimedOut,
    Stopped,
    Error,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub frame_interval: Duration,
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(SCAN_FRAME_INTERVAL_MS),
            timeout: Duration::from_secs(SCAN_TIMEOUT_SECS),
        }
    }
}

/// External stop signal for a scan (user cancel, app shutdown).
#[derive(Debug, Clone)]
pub struct ScanHandle {
    active: Arc<AtomicBool>,
}

impl ScanHandle {
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("Scan stop requested");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

pub struct Scanner {
    device: Box<dyn CaptureDevice>,
    decoder: Arc<dyn CodeDecoder>,
    config: ScanConfig,
    state: ScanState,
    active: Arc<AtomicBool>,
}

impl Scanner {
    pub fn new(device: Box<dyn CaptureDevice>, decoder: Arc<dyn CodeDecoder>, config: ScanConfig) -> Self {
        Self {
            device,
            decoder,
            config,
            state: ScanState::Idle,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> ScanHandle {
        ScanHandle {
            active: self.active.clone(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Acquire the device and scan until a code is decoded, the timeout
    /// elapses, or the scan is stopped. Returns the decoded text.
    pub async fn start_scan(&mut self) -> Result<String, ScanError> {
        self.state = ScanState::Idle;
        self.active.store(true, Ordering::SeqCst);

        let result = {
            let mut lease = DeviceLease::new(self.device.as_mut());

            match lease.acquire().await {
                Err(e) => {
                    warn!(error = %e, "Camera acquisition failed");
                    Err(Exit::Unavailable(e))
                }
                Ok(()) => {
                    self.state = ScanState::CameraAcquired;
                    if self.active.load(Ordering::SeqCst) {
                        self.state = ScanState::Scanning;
                        Ok(scan_frames(lease.device(), self.decoder.as_ref(), &self.config, &self.active).await)
                    } else {
                        Ok(Exit::Stopped)
                    }
                }
            }
        };

        self.active.store(false, Ordering::SeqCst);

        let exit = result.unwrap_or_else(|e| e);
        let (state, outcome) = match exit {
            Exit::Decoded(text) => (ScanState::Decoded, Ok(text)),
            Exit::TimedOut => (ScanState::TimedOut, Err(ScanError::ScanTimeout)),
            Exit::Stopped => (ScanState::Stopped, Err(ScanError::ScanAborted)),
            Exit::Unavailable(e) => (ScanState::Error, Err(ScanError::CameraUnavailable(e.to_string()))),
            Exit::Fault(e) => (ScanState::Error, Err(ScanError::Device(e.to_string()))),
        };
        self.state = state;

        info!(state = ?state, "Scan finished");
        outcome
    }
}

enum Exit {
    Decoded(String),
    TimedOut,
    Stopped,
    Unavailable(CaptureError),
    Fault(CaptureError),
}

async fn scan_frames(
    device: &mut dyn CaptureDevice,
    decoder: &dyn CodeDecoder,
    config: &ScanConfig,
    active: &AtomicBool,
) -> Exit {
    let deadline = sleep_until(Instant::now() + config.timeout);
    tokio::pin!(deadline);

    let mut ticker = interval(config.frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => return Exit::TimedOut,
            _ = ticker.tick() => {}
        }

        if !active.load(Ordering::SeqCst) {
            return Exit::Stopped;
        }

        let frame = tokio::select! {
            biased;
            _ = &mut deadline => return Exit::TimedOut,
            frame = device.grab_frame() => frame,
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e @ CaptureError::Disconnected(_)) => return Exit::Fault(e),
            Err(e) => {
                warn!(error = %e, "scan frame error");
                continue;
            }
        };

        if frame.is_zero_area() {
            trace!("camera not ready, skipping frame");
            continue;
        }

        match decoder.decode(&frame) {
            Ok(Some(text)) => {
                debug!(len = text.len(), "code decoded");
                return Exit::Decoded(text);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "scan frame error"),
        }
    }
}

/// Exclusive hold on the capture device for the length of one scan.
struct DeviceLease<'a> {
    device: &'a mut dyn CaptureDevice,
}

impl<'a> DeviceLease<'a> {
    fn new(device: &'a mut dyn CaptureDevice) -> Self {
        device.set_preview_visible(true);
        Self { device }
    }

    async fn acquire(&mut self) -> Result<(), CaptureError> {
        self.device.acquire().await
    }

    fn device(&mut self) -> &mut dyn CaptureDevice {
        &mut *self.device
    }
}

impl Drop for DeviceLease<'_> {
    fn drop(&mut self) {
        self.device.release();
        self.device.set_preview_visible(false);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    pub(crate) struct CameraLog {
        pub acquired: AtomicBool,
        pub releases: AtomicUsize,
        pub preview_visible: AtomicBool,
        pub frames_served: AtomicUsize,
    }

    impl CameraLog {
        pub fn released(&self) -> bool {
            !self.acquired.load(Ordering::SeqCst) && self.releases.load(Ordering::SeqCst) > 0
        }
    }

    /// Serves scripted frames, then repeats `idle` forever.
    pub(crate) struct FakeCamera {
        pub log: Arc<CameraLog>,
        pub script: VecDeque<Result<Frame, CaptureError>>,
        pub idle: Frame,
        pub refuse: bool,
    }

    impl FakeCamera {
        pub fn new(script: Vec<Result<Frame, CaptureError>>) -> (Self, Arc<CameraLog>) {
            let log = Arc::new(CameraLog::default());
            let camera = Self {
                log: log.clone(),
                script: script.into(),
                idle: Frame::new(4, 4, vec![0; 64]),
                refuse: false,
            };
            (camera, log)
        }
    }

    #[async_trait]
    impl CaptureDevice for FakeCamera {
        async fn acquire(&mut self) -> Result<(), CaptureError> {
            if self.refuse {
                return Err(CaptureError::Rejected("permission denied".into()));
            }
            self.log.acquired.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn grab_frame(&mut self) -> Result<Frame, CaptureError> {
            self.log.frames_served.fetch_add(1, Ordering::SeqCst);
            self.script.pop_front().unwrap_or_else(|| Ok(self.idle.clone()))
        }

        fn release(&mut self) {
            self.log.acquired.store(false, Ordering::SeqCst);
            self.log.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn set_preview_visible(&mut self, visible: bool) {
            self.log.preview_visible.store(visible, Ordering::SeqCst);
        }
    }

    /// Decodes frames whose first byte is 0xC0, reading the rest as UTF-8.
    pub(crate) fn marker_decoder() -> Arc<dyn CodeDecoder> {
        Arc::new(|frame: &Frame| -> Result<Option<String>, DecodeError> {
            match frame.data.split_first() {
                Some((0xC0, rest)) => Ok(Some(String::from_utf8_lossy(rest).into_owned())),
                Some((0xEE, _)) => Err(DecodeError("checksum mismatch".into())),
                _ => Ok(None),
            }
        })
    }

    pub(crate) fn code_frame(text: &str) -> Frame {
        let mut data = vec![0xC0];
        data.extend_from_slice(text.as_bytes());
        Frame::new(8, 8, data)
    }

    fn scanner(camera: FakeCamera) -> Scanner {
        Scanner::new(Box::new(camera), marker_decoder(), ScanConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_decodes_and_releases() {
        let (camera, log) = FakeCamera::new(vec![
            Ok(Frame::new(0, 0, vec![])),
            Ok(Frame::new(8, 8, vec![0xEE])),
            Err(CaptureError::Frame("draw failed".into())),
            Ok(code_frame("{\"repId\":\"r1\"}")),
        ]);
        let mut scanner = scanner(camera);

        let text = scanner.start_scan().await.unwrap();

        assert_eq!(text, "{\"repId\":\"r1\"}");
        assert_eq!(scanner.state(), ScanState::Decoded);
        assert_eq!(log.frames_served.load(Ordering::SeqCst), 4);
        assert!(log.released());
        assert!(!log.preview_visible.load(Ordering::SeqCst));
        assert!(!scanner.handle().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_thirty_seconds() {
        let (camera, log) = FakeCamera::new(vec![]);
        let mut scanner = scanner(camera);
        let started = Instant::now();

        let err = scanner.start_scan().await.unwrap_err();

        assert!(matches!(err, ScanError::ScanTimeout));
        assert_eq!(scanner.state(), ScanState::TimedOut);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        assert!(log.released());
        assert!(!log.preview_visible.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_area_frames_never_decode() {
        let (mut camera, log) = FakeCamera::new(vec![]);
        camera.idle = Frame::new(0, 480, vec![0xC0, b'x']);
        let mut scanner = scanner(camera);

        let err = scanner.start_scan().await.unwrap_err();
        assert!(matches!(err, ScanError::ScanTimeout));
        assert!(log.released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_aborts_scan() {
        let (camera, log) = FakeCamera::new(vec![]);
        let mut scanner = scanner(camera);
        let handle = scanner.handle();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            handle.stop();
        });

        let err = scanner.start_scan().await.unwrap_err();
        stopper.await.unwrap();

        assert!(matches!(err, ScanError::ScanAborted));
        assert_eq!(scanner.state(), ScanState::Stopped);
        assert!(log.released());
    }

    #[tokio::test]
    async fn test_refused_camera_is_unavailable() {
        let (mut camera, log) = FakeCamera::new(vec![]);
        camera.refuse = true;
        let mut scanner = scanner(camera);

        let err = scanner.start_scan().await.unwrap_err();

        assert!(matches!(err, ScanError::CameraUnavailable(_)));
        assert_eq!(scanner.state(), ScanState::Error);
        assert!(!log.preview_visible.load(Ordering::SeqCst));
        assert_eq!(log.frames_served.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_is_fatal() {
        let (camera, log) = FakeCamera::new(vec![Err(CaptureError::Disconnected("unplugged".into()))]);
        let mut scanner = scanner(camera);

        let err = scanner.start_scan().await.unwrap_err();
        assert!(matches!(err, ScanError::Device(_)));
        assert_eq!(scanner.state(), ScanState::Error);
        assert!(log.released());
    }

    #[tokio::test]
    async fn test_decoder_panic_still_releases() {
        let (camera, log) = FakeCamera::new(vec![Ok(Frame::new(2, 2, vec![1]))]);
        let decoder: Arc<dyn CodeDecoder> =
            Arc::new(|_: &Frame| -> Result<Option<String>, DecodeError> { panic!("decoder blew up") });
        let mut scanner = Scanner::new(Box::new(camera), decoder, ScanConfig::default());

        let joined = tokio::spawn(async move { scanner.start_scan().await }).await;

        assert!(joined.unwrap_err().is_panic());
        assert!(log.released());
        assert!(!log.preview_visible.load(Ordering::SeqCst));
    }
}
