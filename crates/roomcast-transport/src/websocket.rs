//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{
    ConnectRequest, Connection, ConnectionId, ConnectionReader,
    ConnectionWriter, Inbound, Incoming, Transport, TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

fn io_error(
    kind: std::io::ErrorKind,
    err: tungstenite::Error,
) -> std::io::Error {
    std::io::Error::new(kind, err)
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    /// Caps inbound messages (and each frame of them) at `limit` bytes.
    ///
    /// A peer that announces or streams more than that gets
    /// [`TransportError::MessageTooLarge`] from its reader before the
    /// payload is buffered.
    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.config = self
            .config
            .max_message_size(Some(limit))
            .max_frame_size(Some(limit));
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Incoming = WebSocketIncoming;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%addr, "accepted TCP connection");

        Ok(WebSocketIncoming {
            stream,
            addr,
            config: self.config,
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A TCP socket taken off the listener, not yet upgraded.
pub struct WebSocketIncoming {
    stream: TcpStream,
    addr: SocketAddr,
    config: WebSocketConfig,
}

impl WebSocketIncoming {
    /// The peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Incoming for WebSocketIncoming {
    type Connection = WebSocketConnection;

    async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let Self {
            stream,
            addr,
            config,
        } = self;

        let mut request = ConnectRequest::default();
        let capture = |req: &Request,
                       resp: Response|
         -> Result<Response, ErrorResponse> {
            let target = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            let mut captured = ConnectRequest::from_target(target);
            for (name, value) in req.headers() {
                if let Ok(value) = value.to_str() {
                    captured = captured.with_header(name.as_str(), value);
                }
            }
            request = captured;
            Ok(resp)
        };

        let ws = tokio_tungstenite::accept_hdr_async_with_config(
            stream,
            capture,
            Some(config),
        )
        .await
        .map_err(|e| {
            TransportError::AcceptFailed(io_error(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, path = request.path(), "accepted WebSocket connection");

        Ok(WebSocketConnection { id, request, ws })
    }
}

/// A single upgraded WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    request: ConnectRequest,
    ws: WsStream,
}

impl Connection for WebSocketConnection {
    type Reader = WebSocketReader;
    type Writer = WebSocketWriter;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn request(&self) -> &ConnectRequest {
        &self.request
    }

    fn split(self) -> (WebSocketReader, WebSocketWriter) {
        let (sink, stream) = self.ws.split();
        (
            WebSocketReader { id: self.id, stream },
            WebSocketWriter { id: self.id, sink },
        )
    }
}

/// Inbound half of a [`WebSocketConnection`].
pub struct WebSocketReader {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl ConnectionReader for WebSocketReader {
    async fn recv(&mut self) -> Result<Inbound, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Inbound::Frame(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Inbound::Frame(data.into()));
                }
                Some(Ok(Message::Pong(_))) => return Ok(Inbound::Pong),
                // tungstenite answers pings on its own
                Some(Ok(Message::Ping(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    return Ok(Inbound::Closed);
                }
                Some(Err(
                    tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed,
                )) => return Ok(Inbound::Closed),
                Some(Err(tungstenite::Error::Capacity(
                    CapacityError::MessageTooLong { size, max_size },
                ))) => {
                    tracing::debug!(id = %self.id, size, max_size, "inbound message too large");
                    return Err(TransportError::MessageTooLarge {
                        size,
                        limit: max_size,
                    });
                }
                Some(Err(e)) => {
                    tracing::debug!(id = %self.id, error = %e, "WebSocket read failed");
                    return Err(TransportError::ReceiveFailed(io_error(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }
}

/// Outbound half of a [`WebSocketConnection`].
pub struct WebSocketWriter {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl WebSocketWriter {
    async fn write(&mut self, msg: Message) -> Result<(), TransportError> {
        self.sink.send(msg).await.map_err(|e| match e {
            tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed => {
                TransportError::ConnectionClosed(self.id.to_string())
            }
            e => TransportError::SendFailed(io_error(
                std::io::ErrorKind::BrokenPipe,
                e,
            )),
        })
    }
}

impl ConnectionWriter for WebSocketWriter {
    async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        // Text frames for UTF-8 payloads (JSON), binary otherwise.
        let msg = match String::from_utf8(data) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        };
        self.write(msg).await
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.write(Message::Ping(Vec::new().into())).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.sink.close().await {
            Ok(())
            | Err(
                tungstenite::Error::ConnectionClosed
                | tungstenite::Error::AlreadyClosed,
            ) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(io_error(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))),
        }
    }
}
