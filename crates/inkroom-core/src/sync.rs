//! Wire protocol and WebSocket transport for collaboration.
//!
//! Messages are JSON objects tagged by `type`. Element geometry travels as a
//! versioned [`WirePath`].

use crate::canvas::MutationIntent;
use crate::shapes::{Element, ElementId, ElementKind, ElementStyle, Embed, Frame, Image, Segment, Shape, Stroke, Text};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Current `path` schema version.
pub const PATH_VERSION: u32 = 1;

fn path_version() -> u32 {
    PATH_VERSION
}

/// Errors decoding or validating wire data.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported path schema version {0}")]
    UnsupportedVersion(u32),
    #[error("non-finite number in path")]
    NonFinite,
    #[error("{0} path needs at least one point")]
    MissingPoints(ElementKind),
}

/// Serialized element geometry and attributes.
///
/// Box kinds use `x, y, w, h`. Lines and arrows run from `(x, y)` to
/// `(x + w, y + h)`. Path kinds carry `points` and ignore the box fields.
/// A missing `v` is read as the current version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePath {
    #[serde(default = "path_version")]
    pub v: u32,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub w: f64,
    #[serde(default)]
    pub h: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<[f64; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Image source or embed URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub z: i64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ElementStyle>,
}

impl WirePath {
    /// A bare box path, as older clients send it.
    pub fn rect(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            v: PATH_VERSION,
            x,
            y,
            w,
            h,
            points: None,
            text: None,
            font_size: None,
            src: None,
            angle: 0.0,
            z: 0,
            locked: false,
            style: None,
        }
    }

    pub fn from_element(element: &Element) -> Self {
        let mut path = Self::rect(0.0, 0.0, 0.0, 0.0);
        match &element.shape {
            Shape::Line(s) | Shape::Arrow(s) => {
                path.x = s.start.x;
                path.y = s.start.y;
                path.w = s.width();
                path.h = s.height();
            }
            Shape::Freehand(s) | Shape::EraserStroke(s) | Shape::LaserStroke(s) => {
                path.points = Some(s.points.iter().map(|p| [p.x, p.y]).collect());
            }
            shape => {
                if let Some(frame) = shape.frame() {
                    path.x = frame.position.x;
                    path.y = frame.position.y;
                    path.w = frame.width;
                    path.h = frame.height;
                }
            }
        }
        match &element.shape {
            Shape::Text(t) => {
                path.text = Some(t.content.clone());
                path.font_size = Some(t.font_size);
            }
            Shape::Image(i) => path.src = Some(i.src.clone()),
            Shape::Embed(e) => path.src = Some(e.url.clone()),
            _ => {}
        }
        path.angle = element.angle;
        path.z = element.z_index;
        path.locked = element.locked;
        path.style = Some(element.style.clone());
        path
    }

    /// Kind-independent checks: schema version and finite numbers.
    pub fn validate_shape(&self) -> Result<(), WireError> {
        if self.v != PATH_VERSION {
            return Err(WireError::UnsupportedVersion(self.v));
        }
        let scalars = [self.x, self.y, self.w, self.h, self.angle];
        let points = self.points.iter().flatten().flatten();
        if !scalars.iter().chain(points).chain(self.font_size.iter()).all(|n| n.is_finite()) {
            return Err(WireError::NonFinite);
        }
        Ok(())
    }

    /// Full validation against the element kind.
    pub fn validate(&self, kind: ElementKind) -> Result<(), WireError> {
        self.validate_shape()?;
        if kind.is_path() && self.points.as_ref().is_none_or(|p| p.is_empty()) {
            return Err(WireError::MissingPoints(kind));
        }
        Ok(())
    }

    /// Decode into an element of the given kind.
    pub fn into_element(self, id: impl Into<ElementId>, kind: ElementKind) -> Result<Element, WireError> {
        self.validate(kind)?;
        let frame = Frame::new(Point::new(self.x, self.y), self.w, self.h);
        let stroke = || {
            Stroke::from_points(
                self.points
                    .iter()
                    .flatten()
                    .map(|[x, y]| Point::new(*x, *y))
                    .collect(),
            )
        };
        let segment = Segment::new(Point::new(self.x, self.y), Point::new(self.x + self.w, self.y + self.h));
        let shape = match kind {
            ElementKind::Rectangle => Shape::Rectangle(frame),
            ElementKind::Ellipse => Shape::Ellipse(frame),
            ElementKind::Diamond => Shape::Diamond(frame),
            ElementKind::Line => Shape::Line(segment),
            ElementKind::Arrow => Shape::Arrow(segment),
            ElementKind::Freehand => Shape::Freehand(stroke()),
            ElementKind::EraserStroke => Shape::EraserStroke(stroke()),
            ElementKind::LaserStroke => Shape::LaserStroke(stroke()),
            ElementKind::Text => Shape::Text(Text {
                frame,
                content: self.text.clone().unwrap_or_default(),
                font_size: self.font_size.unwrap_or(Text::DEFAULT_FONT_SIZE),
            }),
            ElementKind::Image => Shape::Image(Image::new(frame, self.src.clone().unwrap_or_default())),
            ElementKind::Embed => Shape::Embed(Embed::new(frame, self.src.clone().unwrap_or_default())),
        };
        let mut element = Element::with_id(id, shape);
        element.angle = self.angle;
        element.z_index = self.z;
        element.locked = self.locked;
        if let Some(mut style) = self.style {
            style.set_opacity(style.opacity);
            element.style = style;
        }
        Ok(element)
    }
}

/// A durable element record as the server stores and replays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    pub id: ElementId,
    pub room_id: String,
    #[serde(rename = "type")]
    pub element_type: ElementKind,
    pub path: WirePath,
    pub author_id: String,
}

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom {
        room_id: String,
    },
    LeaveRoom {
        room_id: String,
    },
    CreateElement {
        id: ElementId,
        room_id: String,
        element_type: ElementKind,
        path: WirePath,
    },
    UpdateElement {
        id: ElementId,
        room_id: String,
        path: WirePath,
    },
    DeleteElement {
        id: ElementId,
        room_id: String,
    },
}

impl ClientMessage {
    /// Wire message for a mutation intent. Ephemeral kinds have none.
    pub fn from_intent(room_id: &str, intent: &MutationIntent) -> Option<Self> {
        let room_id = room_id.to_string();
        match intent {
            MutationIntent::Create(e) if !e.kind().is_ephemeral() => Some(ClientMessage::CreateElement {
                id: e.id.clone(),
                room_id,
                element_type: e.kind(),
                path: WirePath::from_element(e),
            }),
            MutationIntent::Update(e) if !e.kind().is_ephemeral() => Some(ClientMessage::UpdateElement {
                id: e.id.clone(),
                room_id,
                path: WirePath::from_element(e),
            }),
            MutationIntent::Delete(id) => Some(ClientMessage::DeleteElement {
                id: id.clone(),
                room_id,
            }),
            _ => None,
        }
    }

    /// Room the message addresses.
    pub fn room_id(&self) -> &str {
        match self {
            ClientMessage::JoinRoom { room_id }
            | ClientMessage::LeaveRoom { room_id }
            | ClientMessage::CreateElement { room_id, .. }
            | ClientMessage::UpdateElement { room_id, .. }
            | ClientMessage::DeleteElement { room_id, .. } => room_id,
        }
    }
}

/// Messages received from the server.
///
/// Element mutations are relayed verbatim, so they share field names with
/// the corresponding [`ClientMessage`] variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    CreateElement {
        id: ElementId,
        room_id: String,
        element_type: ElementKind,
        path: WirePath,
    },
    UpdateElement {
        id: ElementId,
        room_id: String,
        path: WirePath,
    },
    DeleteElement {
        id: ElementId,
        room_id: String,
    },
    /// Hydration after a join, most recently modified first.
    RoomSnapshot {
        room_id: String,
        elements: Vec<ElementRecord>,
    },
    /// Fatal rejection, sent just before the server closes the connection.
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Events surfaced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Closed,
    Text(String),
    Error(String),
}

/// Errors from a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// A text-frame duplex channel to the server. Sends are fire-and-forget.
pub trait Transport {
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Drain pending events without blocking.
    fn poll_events(&mut self) -> Vec<TransportEvent>;

    fn close(&mut self);
}

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::{Transport, TransportError, TransportEvent};
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    #[derive(Default)]
    pub struct NativeWebSocket {
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<TransportEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self::default()
        }

        /// Connect to a WebSocket server. The `Opened` event follows once
        /// the handshake completes.
        pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
            if self.cmd_tx.is_some() {
                return Err(TransportError::AlreadyConnected);
            }
            let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(TransportError::InvalidUrl(format!("scheme {}", parsed.scheme())));
            }

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<TransportEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("websocket thread: connecting to {}", url);
                let (mut socket, response) = match connect(url.as_str()) {
                    Ok(ok) => ok,
                    Err(e) => {
                        log::error!("websocket connection failed: {}", e);
                        let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                        let _ = event_tx.send(TransportEvent::Closed);
                        return;
                    }
                };
                log::info!("websocket connected, status: {}", response.status());
                let _ = event_tx.send(TransportEvent::Opened);

                if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
                    let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                    let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                }

                loop {
                    match cmd_rx.try_recv() {
                        Ok(WsCommand::Send(msg)) => {
                            if let Err(e) = socket.send(Message::Text(msg)) {
                                log::error!("websocket send error: {}", e);
                                let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                                break;
                            }
                        }
                        Ok(WsCommand::Close) => {
                            let _ = socket.close(None);
                            break;
                        }
                        Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }

                    match socket.read() {
                        Ok(Message::Text(txt)) => {
                            let _ = event_tx.send(TransportEvent::Text(txt));
                        }
                        Ok(Message::Ping(data)) => {
                            let _ = socket.send(Message::Pong(data));
                        }
                        Ok(Message::Close(_)) => {
                            log::info!("websocket received close frame");
                            break;
                        }
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(ref e))
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut => {}
                        Err(e) => {
                            log::error!("websocket read error: {}", e);
                            let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                    }
                }

                log::info!("websocket thread exiting");
                let _ = event_tx.send(TransportEvent::Closed);
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }
    }

    impl Transport for NativeWebSocket {
        fn send(&mut self, text: &str) -> Result<(), TransportError> {
            let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
            tx.send(WsCommand::Send(text.to_string()))
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        }

        fn poll_events(&mut self) -> Vec<TransportEvent> {
            match &self.event_rx {
                Some(rx) => rx.try_iter().collect(),
                None => Vec::new(),
            }
        }

        fn close(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self._thread = None;
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.close();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeWebSocket;
