use std::io::Cursor;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageReader;
use log::info;

use super::CaptureContext;

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Extract the encoded image from a `data:image/...;base64,` URL as produced
/// by browser tab capture.
pub fn screenshot_bytes_from_data_url(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| anyhow!("screenshot is not a data URL"))?;
    let (media_type, payload) = rest
        .split_once(BASE64_MARKER)
        .ok_or_else(|| anyhow!("screenshot data URL is not base64 encoded"))?;
    if !media_type.starts_with("image/") {
        bail!("screenshot data URL has non-image media type '{media_type}'");
    }

    STANDARD
        .decode(payload.trim())
        .context("screenshot data URL payload is not valid base64")
}

fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to sniff screenshot format")?
        .into_dimensions()
        .context("failed to decode screenshot header")
}

/// Decode the screenshot's natural size and build the session's capture
/// context. Decoding runs on the blocking pool so it never stalls input
/// handling.
pub async fn decode_capture(
    screenshot: Vec<u8>,
    viewport_width: u32,
    viewport_height: u32,
) -> Result<CaptureContext> {
    if screenshot.is_empty() {
        bail!("screenshot is empty");
    }

    let (natural_width, natural_height, screenshot) = tokio::task::spawn_blocking(move || {
        read_dimensions(&screenshot).map(|(w, h)| (w, h, screenshot))
    })
    .await
    .context("screenshot decode worker join failed")??;

    info!(
        "Screenshot decoded: {}x{} natural, {}x{} viewport, {} bytes",
        natural_width,
        natural_height,
        viewport_width,
        viewport_height,
        screenshot.len()
    );

    Ok(CaptureContext::new(
        screenshot,
        natural_width,
        natural_height,
        viewport_width,
        viewport_height,
    ))
}

#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode test png");
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_natural_dimensions() {
        let png = encode_test_png(40, 30);
        let capture = decode_capture(png, 20, 15).await.unwrap();
        assert_eq!((capture.natural_width, capture.natural_height), (40, 30));
        assert_eq!((capture.viewport_width, capture.viewport_height), (20, 15));
        assert_eq!(capture.scale().unwrap(), (2.0, 2.0));
    }

    #[tokio::test]
    async fn garbage_bytes_fail_to_decode() {
        let err = decode_capture(vec![0, 1, 2, 3], 10, 10).await.unwrap_err();
        assert!(err.to_string().contains("screenshot"));
    }

    #[tokio::test]
    async fn empty_screenshot_is_an_error() {
        assert!(decode_capture(Vec::new(), 10, 10).await.is_err());
    }

    #[test]
    fn data_url_round_trips_to_png_bytes() {
        let png = encode_test_png(2, 2);
        let url = format!("data:image/png;base64,{}", STANDARD.encode(&png));
        assert_eq!(screenshot_bytes_from_data_url(&url).unwrap(), png);
    }

    #[test]
    fn data_url_must_be_an_image() {
        assert!(screenshot_bytes_from_data_url("data:text/plain;base64,aGk=").is_err());
        assert!(screenshot_bytes_from_data_url("https://example.com/a.png").is_err());
        assert!(screenshot_bytes_from_data_url("data:image/png,raw").is_err());
    }
}
