use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};

use super::CameraError;

pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Mirror a frame horizontally and encode it as a JPEG data URL
///
/// The preview shown to the user is mirrored, so the stored photo is too.
pub fn encode_mirrored_jpeg(frame: &RgbImage, quality: u8) -> Result<String, CameraError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(CameraError::EmptyFrame);
    }

    let mirrored = imageops::flip_horizontal(frame);
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(&mirrored)
        .map_err(|e| CameraError::Encoding(e.to_string()))?;

    Ok(format!("{JPEG_DATA_URL_PREFIX}{}", STANDARD.encode(&bytes)))
}

/// [`encode_mirrored_jpeg`] on the blocking pool, keeping the runtime free
pub async fn encode_mirrored_jpeg_blocking(
    frame: RgbImage,
    quality: u8,
) -> Result<String, CameraError> {
    tokio::task::spawn_blocking(move || encode_mirrored_jpeg(&frame, quality))
        .await
        .map_err(|e| CameraError::Encoding(format!("encoder task failed: {e}")))?
}

/// Decode the image bytes carried by a base64 data URL
pub fn decode_data_url(data_url: &str) -> Option<(String, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}
