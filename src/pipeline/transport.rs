//! Single-credit flow control for outbound frames.
//!
//! The transport owns exactly one send credit. A frame goes out only while the
//! credit is available; the credit comes back when the service answers. Ticks
//! that find the credit taken drop their frame, so the send rate never exceeds
//! the response rate and nothing queues up.

use crate::{error::TransportError, protocol::FrameMessage};

/// Anything that can carry a frame to the service.
pub trait FrameChannel {
    fn send_frame(&mut self, message: FrameMessage) -> Result<(), TransportError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Credit {
    Available,
    InFlight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Dropped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub sent: u64,
    pub dropped: u64,
    pub responses: u64,
}

pub struct FlowControlledTransport<C> {
    channel: C,
    credit: Credit,
    stats: TransportStats,
}

impl<C: FrameChannel> FlowControlledTransport<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            credit: Credit::Available,
            stats: TransportStats::default(),
        }
    }

    pub fn has_credit(&self) -> bool {
        self.credit == Credit::Available
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Counts a frame that was dropped before it was even encoded.
    pub fn record_drop(&mut self) {
        self.stats.dropped += 1;
        log::trace!("frame dropped, response still pending");
    }

    pub fn try_send(&mut self, message: FrameMessage) -> Result<SendOutcome, TransportError> {
        if self.credit == Credit::InFlight {
            self.record_drop();
            return Ok(SendOutcome::Dropped);
        }

        self.credit = Credit::InFlight;
        if let Err(err) = self.channel.send_frame(message) {
            // Nothing reached the wire, so nothing is in flight.
            self.credit = Credit::Available;
            return Err(err);
        }
        self.stats.sent += 1;
        Ok(SendOutcome::Sent)
    }

    /// Returns the credit, then hands the response to `handler`.
    pub fn on_response<R, T>(&mut self, response: R, handler: impl FnOnce(R) -> T) -> T {
        self.credit = Credit::Available;
        self.stats.responses += 1;
        handler(response)
    }

    #[cfg(test)]
    pub fn channel(&self) -> &C {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Vec<FrameMessage>,
        fail: bool,
    }

    impl FrameChannel for RecordingChannel {
        fn send_frame(&mut self, message: FrameMessage) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Closed);
            }
            self.sent.push(message);
            Ok(())
        }
    }

    fn frame(n: usize) -> FrameMessage {
        FrameMessage {
            image: format!("frame-{n}"),
        }
    }

    #[test]
    fn second_send_waits_for_response() {
        let mut transport = FlowControlledTransport::new(RecordingChannel::default());
        assert_eq!(transport.try_send(frame(0)).unwrap(), SendOutcome::Sent);
        assert_eq!(transport.try_send(frame(1)).unwrap(), SendOutcome::Dropped);
        assert!(!transport.has_credit());

        let echoed = transport.on_response("reply", |r| r.len());
        assert_eq!(echoed, 5);
        assert!(transport.has_credit());
        assert_eq!(transport.try_send(frame(2)).unwrap(), SendOutcome::Sent);

        let sent: Vec<_> = transport.channel().sent.iter().map(|m| m.image.as_str()).collect();
        assert_eq!(sent, vec!["frame-0", "frame-2"]);
        assert_eq!(
            transport.stats(),
            TransportStats {
                sent: 2,
                dropped: 1,
                responses: 1
            }
        );
    }

    #[test]
    fn failed_send_restores_credit() {
        let mut transport = FlowControlledTransport::new(RecordingChannel {
            fail: true,
            ..Default::default()
        });
        assert!(matches!(transport.try_send(frame(0)), Err(TransportError::Closed)));
        assert!(transport.has_credit());
        assert_eq!(transport.stats().sent, 0);
    }

    #[derive(Clone, Copy, Debug)]
    enum Step {
        Tick,
        Response,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![Just(Step::Tick), Just(Step::Response)]
    }

    proptest! {
        #[test]
        fn at_most_one_frame_in_flight(steps in proptest::collection::vec(step(), 0..200)) {
            let mut transport = FlowControlledTransport::new(RecordingChannel::default());
            let mut in_flight = 0usize;

            for (n, step) in steps.into_iter().enumerate() {
                match step {
                    Step::Tick => {
                        if transport.try_send(frame(n)).unwrap() == SendOutcome::Sent {
                            in_flight += 1;
                        }
                    }
                    // The service only answers frames it received.
                    Step::Response if in_flight > 0 => {
                        transport.on_response((), |_| ());
                        in_flight -= 1;
                    }
                    Step::Response => {}
                }
                prop_assert!(in_flight <= 1);
                prop_assert_eq!(transport.has_credit(), in_flight == 0);
            }
        }

        #[test]
        fn send_rate_is_bounded_by_response_rate(
            ticks_per_response in 1usize..20,
            responses in 0usize..30,
        ) {
            let mut transport = FlowControlledTransport::new(RecordingChannel::default());
            let total_ticks = ticks_per_response * (responses + 1);

            for tick in 0..total_ticks {
                let _ = transport.try_send(frame(tick)).unwrap();
                if (tick + 1) % ticks_per_response == 0 && transport.stats().responses < responses as u64 {
                    transport.on_response((), |_| ());
                }
            }

            let stats = transport.stats();
            prop_assert!(stats.sent <= stats.responses + 1);
            prop_assert_eq!(stats.sent + stats.dropped, total_ticks as u64);
        }
    }
}
