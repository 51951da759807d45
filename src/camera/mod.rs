//! Selfie capture
//!
//! [`Capturer::activate`] acquires the camera and returns a [`CaptureSession`]
//! guard. The guard stops every media track when it is cancelled, consumed by
//! a capture, or simply dropped, so the device is released on every exit path.

pub mod devices;
pub mod encode;

use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::permissions::{Capability, PermissionStore};

pub use devices::{StillImageCamera, TestPatternCamera};
pub use encode::{
    decode_data_url, encode_mirrored_jpeg, encode_mirrored_jpeg_blocking, JPEG_DATA_URL_PREFIX,
};

#[cfg(test)]
use mockall::automock;

pub const CAMERA_UNAVAILABLE_MESSAGE: &str =
    "Could not access camera. Please grant permission and try again.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("camera stream has been stopped")]
    Stopped,
    #[error("camera produced an empty frame")]
    EmptyFrame,
    #[error("failed to encode photo: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// Constraints for opening a media stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: Option<FacingMode>,
    pub audio: bool,
}

impl MediaConstraints {
    pub fn selfie() -> Self {
        Self {
            video: Some(FacingMode::User),
            audio: false,
        }
    }
}

/// A live stream from a camera device
#[cfg_attr(test, automock)]
pub trait MediaStream: Send + Sync {
    /// The frame currently shown in the preview
    fn current_frame(&self) -> Result<RgbImage, CameraError>;

    /// Stop every track of the stream, releasing the device
    fn stop_all_tracks(&mut self);

    fn is_live(&self) -> bool;
}

/// Platform camera capability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaStream>, CameraError>;
}

/// What the presentation layer should show for the camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraStatus {
    Starting,
    Live,
    Unavailable(String),
}

/// Scoped camera acquisition
pub struct CaptureSession {
    stream: Option<Box<dyn MediaStream>>,
    error: Option<String>,
    quality: u8,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("status", &self.status())
            .field("quality", &self.quality)
            .finish()
    }
}

impl CaptureSession {
    fn live(stream: Box<dyn MediaStream>, quality: u8) -> Self {
        Self {
            stream: Some(stream),
            error: None,
            quality,
        }
    }

    fn unavailable(message: impl Into<String>, quality: u8) -> Self {
        Self {
            stream: None,
            error: Some(message.into()),
            quality,
        }
    }

    pub fn status(&self) -> CameraStatus {
        match (&self.stream, &self.error) {
            (_, Some(message)) => CameraStatus::Unavailable(message.clone()),
            (Some(stream), None) if stream.is_live() => CameraStatus::Live,
            _ => CameraStatus::Unavailable(CAMERA_UNAVAILABLE_MESSAGE.to_string()),
        }
    }

    pub fn can_capture(&self) -> bool {
        self.status() == CameraStatus::Live
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Freeze the frame currently shown in the preview
    pub fn freeze_frame(&self) -> Result<RgbImage, CameraError> {
        if let Some(message) = &self.error {
            return Err(CameraError::Unavailable(message.clone()));
        }
        let stream = self.stream.as_ref().ok_or(CameraError::Stopped)?;
        if !stream.is_live() {
            return Err(CameraError::Stopped);
        }
        stream.current_frame()
    }

    /// Freeze the current frame and return it as a mirrored JPEG data URL
    pub fn capture(&self) -> Result<String, CameraError> {
        let frame = self.freeze_frame()?;
        let data_url = encode_mirrored_jpeg(&frame, self.quality)?;
        info!(
            width = frame.width(),
            height = frame.height(),
            encoded_len = data_url.len(),
            "Photo captured"
        );
        Ok(data_url)
    }

    /// Release the camera without capturing
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_all_tracks();
            debug!("Camera released");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Acquires the camera for a capture session
pub struct Capturer {
    device: Arc<dyn CameraDevice>,
    permissions: Arc<PermissionStore>,
    quality: u8,
}

impl std::fmt::Debug for Capturer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capturer")
            .field("quality", &self.quality)
            .finish_non_exhaustive()
    }
}

impl Capturer {
    pub fn new(device: Arc<dyn CameraDevice>, permissions: Arc<PermissionStore>) -> Self {
        Self {
            device,
            permissions,
            quality: 90,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Open the front-facing camera
    ///
    /// Never fails: a denied or missing camera yields a session in the
    /// unavailable state, which refuses capture but can still be cancelled.
    pub async fn activate(&self) -> CaptureSession {
        if !self.permissions.ensure(Capability::Camera).await {
            warn!("Camera permission denied");
            return CaptureSession::unavailable(CAMERA_UNAVAILABLE_MESSAGE, self.quality);
        }

        match self.device.open(&MediaConstraints::selfie()).await {
            Ok(stream) => {
                info!("Camera stream opened");
                CaptureSession::live(stream, self.quality)
            }
            Err(e) => {
                warn!(error = %e, "Could not open camera");
                CaptureSession::unavailable(CAMERA_UNAVAILABLE_MESSAGE, self.quality)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PresetPrompter;
    use image::Rgb;

    fn permissions(camera: bool) -> Arc<PermissionStore> {
        Arc::new(PermissionStore::new(Arc::new(PresetPrompter {
            location: true,
            camera,
        })))
    }

    fn stream_expecting_release() -> MockMediaStream {
        let mut stream = MockMediaStream::new();
        stream.expect_is_live().return_const(true);
        stream
            .expect_current_frame()
            .returning(|| Ok(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]))));
        stream.expect_stop_all_tracks().times(1).return_const(());
        stream
    }

    fn device_with(stream: MockMediaStream) -> MockCameraDevice {
        let mut device = MockCameraDevice::new();
        let mut stream = Some(stream);
        device
            .expect_open()
            .withf(|c| *c == MediaConstraints::selfie())
            .times(1)
            .returning(move |_| {
                stream
                    .take()
                    .map(|s| Box::new(s) as Box<dyn MediaStream>)
                    .ok_or_else(|| CameraError::Unavailable("already open".to_string()))
            });
        device
    }

    #[tokio::test]
    async fn test_capture_returns_jpeg_data_url() {
        let capturer = Capturer::new(
            Arc::new(device_with(stream_expecting_release())),
            permissions(true),
        );
        let session = capturer.activate().await;
        assert_eq!(session.status(), CameraStatus::Live);

        let photo = session.capture().unwrap();
        assert!(photo.starts_with(JPEG_DATA_URL_PREFIX));
        drop(session);
    }

    #[tokio::test]
    async fn test_frozen_frame_encodes_off_runtime() {
        let capturer = Capturer::new(
            Arc::new(device_with(stream_expecting_release())),
            permissions(true),
        );
        let session = capturer.activate().await;
        let frame = session.freeze_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 8));

        let photo = encode_mirrored_jpeg_blocking(frame, session.quality())
            .await
            .unwrap();
        assert!(photo.starts_with(JPEG_DATA_URL_PREFIX));
    }

    #[tokio::test]
    async fn test_cancel_releases_camera() {
        let capturer = Capturer::new(
            Arc::new(device_with(stream_expecting_release())),
            permissions(true),
        );
        capturer.activate().await.cancel();
    }

    #[tokio::test]
    async fn test_drop_releases_camera() {
        let capturer = Capturer::new(
            Arc::new(device_with(stream_expecting_release())),
            permissions(true),
        );
        {
            let _session = capturer.activate().await;
        }
        // The mock's `times(1)` on stop_all_tracks is verified when it drops
    }

    #[tokio::test]
    async fn test_denied_permission_disables_capture_but_allows_cancel() {
        let mut device = MockCameraDevice::new();
        device.expect_open().never();

        let capturer = Capturer::new(Arc::new(device), permissions(false));
        let session = capturer.activate().await;
        assert_eq!(
            session.status(),
            CameraStatus::Unavailable(CAMERA_UNAVAILABLE_MESSAGE.to_string())
        );
        assert!(!session.can_capture());
        assert!(matches!(session.capture(), Err(CameraError::Unavailable(_))));
        session.cancel();
    }

    #[tokio::test]
    async fn test_open_failure_yields_unavailable_session() {
        let mut device = MockCameraDevice::new();
        device
            .expect_open()
            .returning(|_| Err(CameraError::Unavailable("no device".to_string())));

        let capturer = Capturer::new(Arc::new(device), permissions(true));
        let session = capturer.activate().await;
        assert!(!session.can_capture());
    }
}
