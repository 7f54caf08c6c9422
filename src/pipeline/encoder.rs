use base64::{Engine, engine::general_purpose::STANDARD};
use fast_image_resize as fir;
use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};
use rayon::prelude::*;
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::{error::EncodeError, types::Frame};

pub const DEFAULT_JPEG_QUALITY: u8 = 80;
pub const DEFAULT_CAPTURE_SIZE: (u32, u32) = (640, 480);

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Encodes captured frames into JPEG data URLs at the capture resolution.
pub struct FrameEncoder {
    width: u32,
    height: u32,
    quality: u8,
    resizer: fir::Resizer,
}

impl FrameEncoder {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            quality: quality.clamp(1, 100),
            resizer: fir::Resizer::new(),
        }
    }

    pub fn encode(&mut self, frame: &Frame) -> Result<String, EncodeError> {
        let expected = frame.expected_len();
        if frame.rgba.len() != expected || expected == 0 {
            return Err(EncodeError::BufferMismatch {
                actual: frame.rgba.len(),
                expected,
            });
        }

        let rgb = if (frame.width, frame.height) == (self.width, self.height) {
            rgba_to_rgb(&frame.rgba)
        } else {
            rgba_to_rgb(&self.resize(frame)?)
        };

        let mut jpeg = Vec::with_capacity(rgb.len() / 8);
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            &rgb,
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )?;

        let mut url = String::with_capacity(DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
        url.push_str(DATA_URL_PREFIX);
        STANDARD.encode_string(&jpeg, &mut url);
        Ok(url)
    }

    fn resize(&mut self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        let src = fir::images::Image::from_vec_u8(
            frame.width,
            frame.height,
            frame.rgba.clone(),
            fir::PixelType::U8x4,
        )
        .map_err(|err| EncodeError::Resize(err.to_string()))?;
        let mut dst = fir::images::Image::new(self.width, self.height, fir::PixelType::U8x4);
        let options = fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
        self.resizer
            .resize(&src, &mut dst, Some(&options))
            .map_err(|err| EncodeError::Resize(err.to_string()))?;
        Ok(dst.into_vec())
    }
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = vec![0u8; rgba.len() / 4 * 3];
    rgb.par_chunks_exact_mut(3)
        .zip(rgba.par_chunks_exact(4))
        .for_each(|(dst, src)| dst.copy_from_slice(&src[..3]));
    rgb
}

/// Decodes an annotated frame sent back by the service.
///
/// Accepts both a full `data:image/jpeg;base64,` URL and a bare base64 body.
pub fn decode_data_url(url: &str) -> Result<Frame, EncodeError> {
    let body = match url.split_once(',') {
        Some((header, body)) if header.starts_with("data:image/") && header.ends_with(";base64") => {
            body
        }
        Some(_) => return Err(EncodeError::NotDataUrl),
        None => url,
    };

    let bytes = STANDARD.decode(body.trim())?;
    decode_jpeg(&bytes)
}

/// Decodes a baseline or progressive JPEG into an RGBA frame.
pub fn decode_jpeg(data: &[u8]) -> Result<Frame, EncodeError> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| EncodeError::Decode(format!("{err:?}")))?;
    let info = decoder
        .info()
        .ok_or_else(|| EncodeError::Decode("decoder reported no image info".into()))?;
    let width = u32::try_from(info.width).map_err(|err| EncodeError::Decode(err.to_string()))?;
    let height = u32::try_from(info.height).map_err(|err| EncodeError::Decode(err.to_string()))?;

    let frame = Frame::new(rgba, width, height);
    if frame.rgba.len() < frame.expected_len() {
        return Err(EncodeError::BufferMismatch {
            actual: frame.rgba.len(),
            expected: frame.expected_len(),
        });
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 128, 255]);
            }
        }
        Frame::new(rgba, width, height)
    }

    #[test]
    fn encodes_jpeg_data_url_at_capture_size() {
        let mut encoder = FrameEncoder::new(640, 480, DEFAULT_JPEG_QUALITY);
        let url = encoder.encode(&gradient(640, 480)).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let decoded = decode_data_url(&url).unwrap();
        assert_eq!((decoded.width, decoded.height), (640, 480));
        assert_eq!(decoded.rgba.len(), decoded.expected_len());
    }

    #[test]
    fn resizes_to_capture_size() {
        let mut encoder = FrameEncoder::new(64, 48, DEFAULT_JPEG_QUALITY);
        let url = encoder.encode(&gradient(128, 96)).unwrap();
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!((decoded.width, decoded.height), (64, 48));
    }

    #[test]
    fn rejects_short_buffers() {
        let mut encoder = FrameEncoder::new(4, 4, DEFAULT_JPEG_QUALITY);
        let frame = Frame::new(vec![0; 10], 4, 4);
        assert!(matches!(
            encoder.encode(&frame),
            Err(EncodeError::BufferMismatch {
                actual: 10,
                expected: 64
            })
        ));
    }

    #[test]
    fn decode_accepts_bare_base64() {
        let mut encoder = FrameEncoder::new(16, 16, DEFAULT_JPEG_QUALITY);
        let url = encoder.encode(&gradient(16, 16)).unwrap();
        let bare = url.trim_start_matches(DATA_URL_PREFIX);
        assert_eq!(decode_data_url(bare).unwrap().width, 16);
    }

    #[test]
    fn decode_rejects_non_jpeg_payloads() {
        assert!(matches!(decode_jpeg(b"not a jpeg"), Err(EncodeError::Decode(_))));
        let png_url = format!("{DATA_URL_PREFIX}{}", STANDARD.encode(b"\x89PNG\r\n\x1a\n"));
        assert!(matches!(decode_data_url(&png_url), Err(EncodeError::Decode(_))));
    }

    #[test]
    fn decode_rejects_other_urls() {
        assert!(matches!(
            decode_data_url("https://example.com,abc"),
            Err(EncodeError::NotDataUrl)
        ));
    }
}
