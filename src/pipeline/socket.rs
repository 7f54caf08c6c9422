//! Socket.IO channel to the gesture service, over the WebSocket transport.
//!
//! One I/O thread owns the socket. Outbound frames reach it through a queue
//! that the credit keeps at no more than one entry; inbound events are
//! forwarded in arrival order and server pings are answered in place.

use std::{
    io,
    net::{TcpStream, ToSocketAddrs},
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use tungstenite::{Message, WebSocket, client::IntoClientRequest};

use super::transport::FrameChannel;
use crate::{
    error::TransportError,
    protocol::{
        self, FrameMessage, MalformedEvent, ServerEvent,
        packet::{self, OpenHandshake, Packet},
    },
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub enum ChannelEvent {
    Server(ServerEvent),
    Violation(MalformedEvent),
    Closed(String),
}

/// Sending half handed to the flow-controlled transport.
#[derive(Clone, Debug)]
pub struct SocketChannel {
    outbound: Sender<String>,
}

impl FrameChannel for SocketChannel {
    fn send_frame(&mut self, message: FrameMessage) -> Result<(), TransportError> {
        let args = protocol::encode_frame(&message)?;
        self.outbound
            .send(packet::event_packet(&args))
            .map_err(|_| TransportError::Closed)
    }
}

pub struct SocketConnection {
    pub channel: SocketChannel,
    pub events: Receiver<ChannelEvent>,
    pub handle: thread::JoinHandle<()>,
}

/// Opens a Socket.IO session with the service at `server`
/// (`http://host:port` or `ws://host:port`). Blocks for at most a few
/// connect timeouts.
pub fn connect(server: &str) -> Result<SocketConnection, TransportError> {
    let connect_err = |reason: String| TransportError::Connect {
        url: server.to_string(),
        reason,
    };

    let request = packet::endpoint_url(server)
        .into_client_request()
        .map_err(|err| connect_err(err.to_string()))?;
    if request.uri().scheme_str() != Some("ws") {
        return Err(connect_err("only plain http:// and ws:// endpoints are supported".into()));
    }
    let host = request
        .uri()
        .host()
        .map(|host| host.trim_matches(|c| c == '[' || c == ']').to_string())
        .ok_or_else(|| connect_err("missing host".into()))?;
    let port = request.uri().port_u16().unwrap_or(80);

    let stream = open_tcp(&host, port).map_err(|err| connect_err(err.to_string()))?;
    stream
        .set_read_timeout(Some(CONNECT_TIMEOUT))
        .and_then(|()| stream.set_write_timeout(Some(CONNECT_TIMEOUT)))
        .map_err(|err| connect_err(err.to_string()))?;

    let (mut socket, _) =
        tungstenite::client(request, stream).map_err(|err| connect_err(err.to_string()))?;
    let session = open_session(&mut socket).map_err(connect_err)?;
    socket
        .get_ref()
        .set_read_timeout(Some(READ_POLL_INTERVAL))
        .map_err(|err| connect_err(err.to_string()))?;
    log::info!("connected to {server} (session {})", session.sid);

    let liveness = session.liveness_timeout();
    let (outbound_tx, outbound_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    let handle = thread::spawn(move || run_io_loop(socket, liveness, outbound_rx, event_tx));

    Ok(SocketConnection {
        channel: SocketChannel {
            outbound: outbound_tx,
        },
        events: event_rx,
        handle,
    })
}

fn open_tcp(host: &str, port: u16) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, format!("{host} did not resolve"));
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = err,
        }
    }
    Err(last_err)
}

/// Waits for the Engine.IO `open` packet and joins the default namespace.
fn open_session(socket: &mut WebSocket<TcpStream>) -> Result<OpenHandshake, String> {
    let mut handshake = None;
    loop {
        let text = match socket.read().map_err(|err| err.to_string())? {
            Message::Text(text) => text,
            Message::Close(_) => return Err("closed during handshake".into()),
            _ => continue,
        };
        match packet::decode_packet(&text).map_err(|err| err.to_string())? {
            Packet::Open(open) => {
                socket
                    .send(Message::Text(packet::CONNECT.into()))
                    .map_err(|err| err.to_string())?;
                handshake = Some(open);
            }
            Packet::Ping => socket
                .send(Message::Text(packet::PONG.into()))
                .map_err(|err| err.to_string())?,
            Packet::Connected => {
                return handshake.ok_or_else(|| "namespace joined before engine.io open".into());
            }
            Packet::ConnectError(message) => return Err(format!("connection refused: {message}")),
            Packet::Close | Packet::Disconnected => return Err("closed during handshake".into()),
            _ => {}
        }
    }
}

fn run_io_loop(
    mut socket: WebSocket<TcpStream>,
    liveness: Duration,
    outbound: Receiver<String>,
    events: Sender<ChannelEvent>,
) {
    let closed = |reason: String| {
        let _ = events.send(ChannelEvent::Closed(reason));
    };
    let mut last_heard = Instant::now();

    loop {
        loop {
            match outbound.try_recv() {
                Ok(text) => {
                    if let Err(err) = socket.send(Message::Text(text)) {
                        closed(format!("send failed: {err}"));
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let _ = socket.send(Message::Text(packet::DISCONNECT.into()));
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    return;
                }
            }
        }

        if last_heard.elapsed() > liveness {
            closed("server stopped answering".into());
            return;
        }

        let text = match socket.read() {
            Ok(Message::Text(text)) => {
                last_heard = Instant::now();
                text
            }
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| "closed by server".to_string());
                closed(reason);
                return;
            }
            Ok(_) => continue,
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(err) => {
                closed(err.to_string());
                return;
            }
        };

        let event = match packet::decode_packet(&text) {
            Ok(Packet::Event(args)) => match protocol::decode_server_event(&args) {
                Ok(event) => ChannelEvent::Server(event),
                Err(malformed) => ChannelEvent::Violation(malformed),
            },
            Ok(Packet::Ping) => {
                if let Err(err) = socket.send(Message::Text(packet::PONG.into())) {
                    closed(format!("send failed: {err}"));
                    return;
                }
                continue;
            }
            Ok(Packet::Close | Packet::Disconnected) => {
                closed("closed by server".into());
                return;
            }
            Ok(Packet::ConnectError(message)) => {
                closed(format!("connection refused: {message}"));
                return;
            }
            Ok(_) => continue,
            Err(violation) => ChannelEvent::Violation(MalformedEvent {
                event: None,
                violation,
            }),
        };

        if events.send(event).is_err() {
            log::debug!("event receiver dropped, closing socket");
            let _ = socket.close(None);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn frames_are_sent_as_socket_io_events() {
        let (tx, rx) = unbounded();
        let mut channel = SocketChannel { outbound: tx };
        channel
            .send_frame(FrameMessage {
                image: "data:image/jpeg;base64,AA".into(),
            })
            .unwrap();
        let text = rx.try_recv().unwrap();
        assert_eq!(text, r#"42["frame",{"image":"data:image/jpeg;base64,AA"}]"#);
    }

    #[test]
    fn send_after_shutdown_reports_closed() {
        let (tx, rx) = unbounded();
        drop(rx);
        let mut channel = SocketChannel { outbound: tx };
        let err = channel
            .send_frame(FrameMessage { image: String::new() })
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn refuses_unreachable_endpoint() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = connect(&format!("http://127.0.0.1:{port}")).err().unwrap();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn refuses_tls_endpoints() {
        let err = connect("https://gesture.example").err().unwrap();
        assert!(
            matches!(err, TransportError::Connect { reason, .. } if reason.contains("http://"))
        );
    }

    fn read_text(socket: &mut WebSocket<TcpStream>) -> String {
        loop {
            if let Message::Text(text) = socket.read().unwrap() {
                return text;
            }
        }
    }

    #[test]
    fn session_handshake_events_and_pings() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = match tungstenite::accept(stream) {
                Ok(ws) => ws,
                Err(err) => panic!("server handshake failed: {err}"),
            };
            ws.send(Message::Text(
                r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#.into(),
            ))
            .unwrap();
            assert_eq!(read_text(&mut ws), "40");
            ws.send(Message::Text(r#"40{"sid":"n1"}"#.into())).unwrap();
            ws.send(Message::Text(
                r#"42["state_update",{"mode":"SELECT_DEVICE","selected_device":null,"devices":{}}]"#
                    .into(),
            ))
            .unwrap();
            ws.send(Message::Text("2".into())).unwrap();

            let mut received = vec![read_text(&mut ws), read_text(&mut ws)];
            received.sort();
            assert_eq!(received[0], "3");
            assert!(received[1].starts_with(r#"42["frame","#));

            ws.send(Message::Text(
                r#"42["processed_frame",{"image":"","gesture_data":{"finger_count":-1},"state":{}}]"#
                    .into(),
            ))
            .unwrap();
            ws.close(None).unwrap();
            while ws.read().is_ok() {}
        });

        let mut connection = connect(&format!("http://{addr}")).unwrap();
        let event = connection.events.recv_timeout(RECV_TIMEOUT).unwrap();
        assert!(matches!(
            event,
            ChannelEvent::Server(ServerEvent::StateUpdate(ref state)) if state.mode == "SELECT_DEVICE"
        ));

        connection
            .channel
            .send_frame(FrameMessage {
                image: "data:image/jpeg;base64,AA".into(),
            })
            .unwrap();

        let event = connection.events.recv_timeout(RECV_TIMEOUT).unwrap();
        let ChannelEvent::Violation(malformed) = event else {
            panic!("expected violation, got {event:?}");
        };
        assert!(malformed.answers_frame());

        let event = connection.events.recv_timeout(RECV_TIMEOUT).unwrap();
        assert!(matches!(event, ChannelEvent::Closed(_)));
        server.join().unwrap();
    }
}
