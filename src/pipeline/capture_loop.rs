//! Fixed-cadence capture → encode → send loop.
//!
//! A single thread multiplexes the timer and the inbound channel events, so
//! every credit transition runs to completion before the next callback.

use std::{ops::ControlFlow, thread, time::Duration};

use crossbeam_channel::{Receiver, select, tick};

use super::{
    encoder::{FrameEncoder, decode_data_url},
    mailbox::{FrameMailbox, Mailbox},
    socket::ChannelEvent,
    transport::{FlowControlledTransport, FrameChannel, SendOutcome, TransportStats},
};
use crate::{
    protocol::{FrameMessage, ProcessedFrame, ServerEvent, WireAppState},
    reconcile::{Reconciler, RenderInstructions},
    types::{Frame, GestureSummary},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Capturing,
}

#[derive(Clone, Debug)]
pub struct RenderUpdate {
    /// Annotated frame from the service, if it decoded.
    pub image: Option<Frame>,
    /// Absent for snapshots that did not come with a processed frame.
    pub gesture: Option<GestureSummary>,
    pub instructions: RenderInstructions,
}

#[derive(Clone, Debug)]
pub enum ViewEvent {
    Render(RenderUpdate),
    Violation(String),
    Disconnected(String),
}

pub struct CaptureLoop<C> {
    state: LoopState,
    encoder: FrameEncoder,
    transport: FlowControlledTransport<C>,
    reconciler: Reconciler,
    frames: FrameMailbox,
    latest: Option<Frame>,
    view: Mailbox<ViewEvent>,
}

impl<C: FrameChannel> CaptureLoop<C> {
    pub fn new(
        encoder: FrameEncoder,
        channel: C,
        frames: FrameMailbox,
        view: Mailbox<ViewEvent>,
    ) -> Self {
        Self {
            state: LoopState::Idle,
            encoder,
            transport: FlowControlledTransport::new(channel),
            reconciler: Reconciler::new(),
            frames,
            latest: None,
            view,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Marks the camera as ready. There is no way back to `Idle`.
    pub fn begin(&mut self) {
        if self.state == LoopState::Idle {
            log::info!("capture loop started");
            self.state = LoopState::Capturing;
        }
    }

    pub fn on_tick(&mut self) -> ControlFlow<()> {
        if self.state != LoopState::Capturing {
            return ControlFlow::Continue(());
        }
        if let Some(frame) = self.frames.take_latest() {
            self.latest = Some(frame);
        }
        let Some(frame) = self.latest.as_ref() else {
            return ControlFlow::Continue(());
        };

        if !self.transport.has_credit() {
            self.transport.record_drop();
            return ControlFlow::Continue(());
        }

        let image = match self.encoder.encode(frame) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("failed to encode frame: {err}");
                return ControlFlow::Continue(());
            }
        };

        match self.transport.try_send(FrameMessage { image }) {
            Ok(SendOutcome::Sent | SendOutcome::Dropped) => ControlFlow::Continue(()),
            Err(err) => {
                log::error!("failed to send frame: {err}");
                self.publish(ViewEvent::Disconnected(err.to_string()));
                ControlFlow::Break(())
            }
        }
    }

    pub fn on_channel_event(&mut self, event: ChannelEvent) -> ControlFlow<()> {
        match event {
            ChannelEvent::Server(ServerEvent::ProcessedFrame(response)) => {
                let reconciler = &mut self.reconciler;
                let update = self
                    .transport
                    .on_response(response, |response| reconcile_response(reconciler, response));
                self.publish(update);
            }
            ChannelEvent::Server(ServerEvent::StateUpdate(snapshot)) => {
                let update = reconcile_snapshot(&mut self.reconciler, snapshot, None, None);
                self.publish(update);
            }
            ChannelEvent::Server(ServerEvent::Other(name)) => {
                log::debug!("ignoring `{name}` event");
            }
            ChannelEvent::Violation(malformed) => {
                log::error!("discarding message: {malformed}");
                // An unreadable answer is still the answer to the frame in flight.
                let update = if malformed.answers_frame() {
                    self.transport.on_response(malformed, |malformed| {
                        ViewEvent::Violation(malformed.to_string())
                    })
                } else {
                    ViewEvent::Violation(malformed.to_string())
                };
                self.publish(update);
            }
            ChannelEvent::Closed(reason) => {
                log::warn!("connection closed: {reason}");
                self.publish(ViewEvent::Disconnected(reason));
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn publish(&self, event: ViewEvent) {
        if self.view.publish(event) {
            log::trace!("view is behind, dropped its oldest update");
        }
    }

    /// Runs until the channel closes.
    pub fn run(mut self, interval: Duration, events: Receiver<ChannelEvent>) {
        self.begin();
        let ticker = tick(interval);

        loop {
            let flow = select! {
                recv(ticker) -> _ => self.on_tick(),
                recv(events) -> event => match event {
                    Ok(event) => self.on_channel_event(event),
                    Err(_) => self.on_channel_event(ChannelEvent::Closed("channel dropped".into())),
                },
            };
            if flow.is_break() {
                break;
            }
        }

        let stats = self.transport.stats();
        log::info!(
            "capture loop finished: {} sent, {} dropped, {} responses",
            stats.sent,
            stats.dropped,
            stats.responses
        );
    }
}

fn reconcile_response(reconciler: &mut Reconciler, response: ProcessedFrame) -> ViewEvent {
    let image = match decode_data_url(&response.image) {
        Ok(frame) => Some(frame),
        Err(err) => {
            log::warn!("failed to decode annotated frame: {err}");
            None
        }
    };
    reconcile_snapshot(reconciler, response.state, Some(response.gesture_data), image)
}

fn reconcile_snapshot(
    reconciler: &mut Reconciler,
    snapshot: WireAppState,
    gesture: Option<GestureSummary>,
    image: Option<Frame>,
) -> ViewEvent {
    match reconciler.apply(snapshot) {
        Ok(instructions) => ViewEvent::Render(RenderUpdate {
            image,
            gesture,
            instructions: instructions.clone(),
        }),
        Err(violation) => ViewEvent::Violation(violation.to_string()),
    }
}

pub fn start_capture_loop<C>(
    capture: CaptureLoop<C>,
    interval: Duration,
    events: Receiver<ChannelEvent>,
) -> thread::JoinHandle<()>
where
    C: FrameChannel + Send + 'static,
{
    thread::spawn(move || capture.run(interval, events))
}
