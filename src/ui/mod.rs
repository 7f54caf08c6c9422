use std::{mem, sync::Arc, thread};

use crossbeam_channel::{Receiver, TryRecvError, bounded};
use gpui::prelude::FluentBuilder;
use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div,
    img, px,
};
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    config::Config,
    error::{CameraAccessError, TransportError},
    pipeline::{
        self, CameraDevice, CameraStream, CaptureLoop, FrameEncoder, FrameMailbox, Mailbox,
        SocketConnection, ViewEvent,
    },
    reconcile::RenderInstructions,
    types::GestureSummary,
};

mod camera_view;
mod devices;
mod main_view;
mod render_util;

// Updates waiting for the next redraw; the oldest is evicted when full.
const VIEW_QUEUE_DEPTH: usize = 4;

const PREVIEW_MAX_WIDTH: f32 = 640.0;
const DEFAULT_PREVIEW_RATIO: f32 = 4.0 / 3.0;
const DEVICE_CARD_WIDTH: f32 = 210.0;

pub fn launch_ui(app: &mut App, config: Config) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Gesture Home".into()),
            ..Default::default()
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(config));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    config: Config,
    screen: Screen,
    mailbox: FrameMailbox,
    view_events: Mailbox<ViewEvent>,
    pending_connection: Option<Receiver<Result<SocketConnection, TransportError>>>,
    _camera_stream: Option<CameraStream>,
    camera_label: Option<String>,
    _capture_handle: Option<thread::JoinHandle<()>>,
    _socket_handle: Option<thread::JoinHandle<()>>,
    connection: ConnectionStatus,
    instructions: Option<RenderInstructions>,
    gesture: Option<GestureSummary>,
    violation: Option<String>,
    latest_image: Option<Arc<RenderImage>>,
    preview_ratio: f32,
}

enum Screen {
    Camera(CameraState),
    Fatal(Fatal),
    Dashboard,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Fatal {
    Camera(String),
    Service(String),
}

impl Fatal {
    fn hint(&self) -> &'static str {
        match self {
            Fatal::Camera(_) => "Check the camera connection and permissions, then restart.",
            Fatal::Service(_) => {
                "Check that the gesture service is running and reachable, then restart."
            }
        }
    }

    fn message(&self) -> &str {
        match self {
            Fatal::Camera(message) | Fatal::Service(message) => message,
        }
    }
}

struct CameraState {
    options: Vec<CameraDevice>,
    selected: usize,
}

enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected(String),
}

impl AppView {
    fn new(config: Config) -> Self {
        let mut view = Self {
            config,
            screen: Screen::Dashboard,
            mailbox: FrameMailbox::new(),
            view_events: Mailbox::with_capacity(VIEW_QUEUE_DEPTH),
            pending_connection: None,
            _camera_stream: None,
            camera_label: None,
            _capture_handle: None,
            _socket_handle: None,
            connection: ConnectionStatus::Disconnected("not connected".into()),
            instructions: None,
            gesture: None,
            violation: None,
            latest_image: None,
            preview_ratio: DEFAULT_PREVIEW_RATIO,
        };

        match camera_view::initial_camera_choice(view.config.camera) {
            Ok(camera_view::CameraChoice::Use(device)) => view.start_pipeline(&device),
            Ok(camera_view::CameraChoice::Ask(options)) => {
                view.screen = Screen::Camera(CameraState {
                    options,
                    selected: 0,
                });
            }
            Err(err) => {
                log::error!("camera unavailable: {err}");
                view.screen = err.into();
            }
        }

        view
    }

    /// Acquires the camera and starts connecting to the service in the
    /// background. Any failure is fatal; nothing is retried.
    fn start_pipeline(&mut self, device: &CameraDevice) {
        let config = &self.config;
        match pipeline::start_camera_stream(
            device,
            config.width,
            config.height,
            self.mailbox.clone(),
        ) {
            Ok(stream) => {
                self._camera_stream = Some(stream);
                self.camera_label = Some(device.label.clone());
            }
            Err(err) => {
                log::error!("failed to start camera: {err}");
                self.screen = err.into();
                return;
            }
        }

        self.pending_connection = Some(connect_in_background(config.server.clone()));
        self.connection = ConnectionStatus::Connecting;
        self.screen = Screen::Dashboard;
    }

    /// Starts the capture loop once the background connect finishes.
    fn poll_connection(&mut self) {
        let Some(pending) = &self.pending_connection else {
            return;
        };
        let result = match pending.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        };
        self.pending_connection = None;

        match result {
            Ok(connection) => self.start_capture(connection),
            Err(err) => {
                log::error!("cannot reach gesture service: {err}");
                self.screen = Screen::Fatal(Fatal::Service(err.to_string()));
            }
        }
    }

    fn start_capture(&mut self, connection: SocketConnection) {
        let config = &self.config;
        let capture = CaptureLoop::new(
            FrameEncoder::new(config.width, config.height, config.jpeg_quality),
            connection.channel,
            self.mailbox.clone(),
            self.view_events.clone(),
        );
        self._capture_handle = Some(pipeline::start_capture_loop(
            capture,
            config.capture_interval(),
            connection.events,
        ));
        self._socket_handle = Some(connection.handle);
        self.connection = ConnectionStatus::Connected;
    }
}

fn connect_in_background(server: String) -> Receiver<Result<SocketConnection, TransportError>> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(pipeline::connect(&server));
    });
    rx
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.poll_connection();

        let screen = mem::replace(&mut self.screen, Screen::Dashboard);
        let view = match &screen {
            Screen::Camera(state) => self.render_camera_picker(state, cx),
            Screen::Fatal(fatal) => self.render_fatal(fatal, cx),
            Screen::Dashboard => self.render_dashboard(window, cx),
        };
        self.screen = screen;
        view
    }
}

impl From<CameraAccessError> for Screen {
    fn from(err: CameraAccessError) -> Self {
        Screen::Fatal(Fatal::Camera(err.to_string()))
    }
}
