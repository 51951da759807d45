use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{CameraDevice, CameraError, MediaConstraints, MediaStream};

/// A stream that replays frames from a closure until stopped
struct FrameStream<F> {
    next_frame: F,
    live: bool,
}

impl<F> MediaStream for FrameStream<F>
where
    F: Fn() -> RgbImage + Send + Sync,
{
    fn current_frame(&self) -> Result<RgbImage, CameraError> {
        if !self.live {
            return Err(CameraError::Stopped);
        }
        Ok((self.next_frame)())
    }

    fn stop_all_tracks(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

fn require_video(constraints: &MediaConstraints) -> Result<(), CameraError> {
    if constraints.video.is_none() {
        return Err(CameraError::Unavailable("no video track requested".to_string()));
    }
    Ok(())
}

/// Synthetic camera producing a gradient with a moving bar
#[derive(Debug)]
pub struct TestPatternCamera {
    width: u32,
    height: u32,
    frames: std::sync::Arc<AtomicU64>,
}

impl TestPatternCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            frames: std::sync::Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl CameraDevice for TestPatternCamera {
    async fn open(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaStream>, CameraError> {
        require_video(constraints)?;
        let (width, height) = (self.width, self.height);
        let frames = std::sync::Arc::clone(&self.frames);
        debug!(width, height, "Opening test pattern camera");

        let next_frame = move || {
            let tick = frames.fetch_add(1, Ordering::Relaxed);
            let bar = (tick % u64::from(width)) as u32;
            RgbImage::from_fn(width, height, |x, y| {
                if x == bar {
                    Rgb([255, 255, 255])
                } else {
                    Rgb([
                        (x * 255 / width) as u8,
                        (y * 255 / height) as u8,
                        128,
                    ])
                }
            })
        };

        Ok(Box::new(FrameStream {
            next_frame,
            live: true,
        }))
    }
}

/// Camera whose preview is a still image loaded from disk
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CameraDevice for StillImageCamera {
    async fn open(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaStream>, CameraError> {
        require_video(constraints)?;
        let path = self.path.clone();
        let frame = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| CameraError::Unavailable(format!("camera task failed: {e}")))?
            .map_err(|e| {
                CameraError::Unavailable(format!("cannot read {}: {e}", self.path.display()))
            })?
            .to_rgb8();

        debug!(path = %self.path.display(), "Opened still image camera");
        Ok(Box::new(FrameStream {
            next_frame: move || frame.clone(),
            live: true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FacingMode;

    #[tokio::test]
    async fn test_pattern_stream_stops() {
        let camera = TestPatternCamera::new(16, 8);
        let mut stream = camera.open(&MediaConstraints::selfie()).await.unwrap();
        assert!(stream.is_live());
        assert_eq!(stream.current_frame().unwrap().dimensions(), (16, 8));

        stream.stop_all_tracks();
        assert!(!stream.is_live());
        assert_eq!(stream.current_frame(), Err(CameraError::Stopped));
    }

    #[tokio::test]
    async fn test_audio_only_request_is_refused() {
        let camera = TestPatternCamera::new(4, 4);
        let constraints = MediaConstraints {
            video: None,
            audio: true,
        };
        assert!(camera.open(&constraints).await.is_err());

        let rear = MediaConstraints {
            video: Some(FacingMode::Environment),
            audio: false,
        };
        assert!(camera.open(&rear).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_image_file_is_unavailable() {
        let camera = StillImageCamera::new("/definitely/not/here.png");
        assert!(matches!(
            camera.open(&MediaConstraints::selfie()).await,
            Err(CameraError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_still_image_is_served_as_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        RgbImage::from_pixel(12, 10, Rgb([1, 2, 3])).save(&path).unwrap();

        let camera = StillImageCamera::new(&path);
        let stream = camera.open(&MediaConstraints::selfie()).await.unwrap();
        let frame = stream.current_frame().unwrap();
        assert_eq!(frame.dimensions(), (12, 10));
        assert_eq!(frame.get_pixel(0, 0), &Rgb([1, 2, 3]));
    }
}
