use anyhow::{Result, anyhow, ensure};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};

use super::encoder::decode_jpeg;
use crate::types::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PackedLayout {
    Rgb,
    Bgr,
    Gray,
}

impl PackedLayout {
    fn bytes_per_pixel(self) -> usize {
        match self {
            PackedLayout::Rgb | PackedLayout::Bgr => 3,
            PackedLayout::Gray => 1,
        }
    }
}

/// Converts a native camera buffer into an RGBA [`Frame`].
pub fn convert_camera_frame(buffer: &Buffer) -> Result<Frame> {
    let resolution = buffer.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    let data = buffer.buffer();

    match buffer.source_frame_format() {
        FrameFormat::MJPEG => Ok(decode_jpeg(data)?),
        FrameFormat::NV12 => nv12_to_rgba(data, width, height)
            .map(|rgba| Frame::new(rgba, width, height)),
        FrameFormat::YUYV => yuyv_to_rgba(data, width, height)
            .map(|rgba| Frame::new(rgba, width, height)),
        FrameFormat::RAWRGB => packed_to_rgba(data, width, height, PackedLayout::Rgb)
            .map(|rgba| Frame::new(rgba, width, height)),
        FrameFormat::RAWBGR => packed_to_rgba(data, width, height, PackedLayout::Bgr)
            .map(|rgba| Frame::new(rgba, width, height)),
        FrameFormat::GRAY => packed_to_rgba(data, width, height, PackedLayout::Gray)
            .map(|rgba| Frame::new(rgba, width, height)),
    }
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_len = pixel_count(width, height);
    let uv_len = y_len / 2;
    ensure!(
        data.len() >= y_len + uv_len,
        "NV12 buffer too small: got {}, expected {}",
        data.len(),
        y_len + uv_len
    );

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_len],
        y_stride: width,
        uv_plane: &data[y_len..y_len + uv_len],
        uv_stride: width,
        width,
        height,
    };
    let mut rgba = vec![0u8; y_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12 conversion failed: {err:?}"))?;
    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = pixel_count(width, height) * 2;
    ensure!(
        data.len() >= expected,
        "YUYV buffer too small: got {}, expected {expected}",
        data.len()
    );

    let packed = YuvPackedImage {
        yuy: &data[..expected],
        yuy_stride: width * 2,
        width,
        height,
    };
    let mut rgba = vec![0u8; pixel_count(width, height) * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV conversion failed: {err:?}"))?;
    Ok(rgba)
}

fn packed_to_rgba(data: &[u8], width: u32, height: u32, layout: PackedLayout) -> Result<Vec<u8>> {
    let bpp = layout.bytes_per_pixel();
    let expected = pixel_count(width, height) * bpp;
    ensure!(
        data.len() >= expected,
        "{layout:?} buffer too small: got {}, expected {expected}",
        data.len()
    );

    let mut rgba = vec![0u8; pixel_count(width, height) * 4];
    rgba.par_chunks_exact_mut(4)
        .zip(data[..expected].par_chunks_exact(bpp))
        .for_each(|(dst, src)| {
            let [r, g, b] = match layout {
                PackedLayout::Rgb => [src[0], src[1], src[2]],
                PackedLayout::Bgr => [src[2], src[1], src[0]],
                PackedLayout::Gray => [src[0]; 3],
            };
            dst.copy_from_slice(&[r, g, b, 255]);
        });
    Ok(rgba)
}
