use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use anyhow::anyhow;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

use super::{mailbox::FrameMailbox, rgba_converter};
use crate::error::CameraAccessError;

// macOS built-in cameras often reject YUYV even though it is reported.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::MJPEG,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
];

fn requested_formats(width: u32, height: u32) -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::HighestResolution(Resolution::new(width, height)),
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn available_cameras() -> Result<Vec<CameraDevice>, CameraAccessError> {
    let cameras =
        query(ApiBackend::Auto).map_err(|err| CameraAccessError::Query(err.to_string()))?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: info.human_name(),
        })
        .collect())
}

fn open_camera(index: &CameraIndex, width: u32, height: u32) -> anyhow::Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(width, height) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("no supported capture format")))
}

/// Opens the camera and publishes every captured frame into `mailbox`.
///
/// The camera is opened on the calling thread first so permission or device
/// errors surface here instead of inside the capture thread.
pub fn start_camera_stream(
    device: &CameraDevice,
    width: u32,
    height: u32,
    mailbox: FrameMailbox,
) -> Result<CameraStream, CameraAccessError> {
    let camera = open_camera(&device.index, width, height)
        .map_err(|err| CameraAccessError::Open(format!("{}: {err:#}", device.label)))?;
    let resolution = camera.resolution();
    log::info!(
        "camera `{}` streaming at {}x{} ({:?})",
        device.label,
        resolution.width(),
        resolution.height(),
        camera.frame_format()
    );
    // Camera handles are not Send on every backend; reopen on the capture thread.
    drop(camera);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let index = device.index.clone();

    let handle = thread::spawn(move || {
        let mut camera = match open_camera(&index, width, height) {
            Ok(camera) => camera,
            Err(err) => {
                log::error!("failed to reopen camera: {err:?}");
                return;
            }
        };

        while !stop_flag.load(Ordering::Relaxed) {
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    continue;
                }
            };

            match rgba_converter::convert_camera_frame(&buffer) {
                Ok(frame) => {
                    if mailbox.publish(frame) {
                        log::trace!("replaced an unread camera frame");
                    }
                }
                Err(err) => log::warn!("failed to convert camera frame: {err:?}"),
            }
        }

        if let Err(err) = camera.stop_stream() {
            log::warn!("failed to stop camera stream: {err:?}");
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}
