//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use roomcast_transport::{
        Connection, ConnectionReader, ConnectionWriter, Inbound, Incoming,
        Transport, TransportError, WebSocketConnection, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    const WAIT: Duration = Duration::from_secs(5);

    /// Binds a transport, connects one client to `target` and returns
    /// both ends.
    async fn connect_pair(target: &str) -> (WebSocketConnection, ClientWs) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        connect_to(transport, target).await
    }

    async fn connect_to(
        mut transport: WebSocketTransport,
        target: &str,
    ) -> (WebSocketConnection, ClientWs) {
        let addr = transport.local_addr().expect("bound address");

        let server = tokio::spawn(async move {
            let incoming = transport.accept().await.expect("should accept");
            incoming.upgrade().await.expect("should upgrade")
        });

        let mut request = format!("ws://{addr}{target}")
            .into_client_request()
            .expect("valid request");
        request
            .headers_mut()
            .insert("X-User-Id", "u-7".parse().expect("header value"));
        let (client, _) = tokio_tungstenite::connect_async(request)
            .await
            .expect("client should connect");

        let conn = server.await.expect("accept task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_accept_captures_upgrade_request() {
        let (conn, _client) = connect_pair("/ws/r1?userName=alice").await;

        assert!(conn.id().into_inner() > 0);
        assert_eq!(conn.request().path(), "/ws/r1");
        assert_eq!(conn.request().query_param("userName"), Some("alice"));
        assert_eq!(conn.request().header("x-user-id"), Some("u-7"));
    }

    #[tokio::test]
    async fn test_split_halves_send_and_receive() {
        let (conn, mut client) = connect_pair("/ws/r1").await;
        let (mut reader, mut writer) = conn.split();

        // UTF-8 payloads go out as text frames.
        writer
            .send(b"hello from server".to_vec())
            .await
            .expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        client
            .send(Message::Text("hello from client".into()))
            .await
            .unwrap();
        let inbound = reader.recv().await.expect("recv should succeed");
        assert_eq!(inbound, Inbound::Frame(b"hello from client".to_vec()));
    }

    #[tokio::test]
    async fn test_ping_is_answered_with_pong() {
        let (conn, mut client) = connect_pair("/ws/r1").await;
        let (mut reader, mut writer) = conn.split();

        writer.ping().await.expect("ping should be sent");

        // The client sees the ping; tungstenite queues the pong, which is
        // flushed the next time the client stream is polled.
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_ping());
        client.flush().await.unwrap();

        let inbound = reader.recv().await.expect("recv should succeed");
        assert_eq!(inbound, Inbound::Pong);
    }

    #[tokio::test]
    async fn test_recv_reports_closed_on_client_close() {
        let (conn, mut client) = connect_pair("/ws/r1").await;
        let (mut reader, _writer) = conn.split();

        client.send(Message::Close(None)).await.unwrap();

        let inbound = reader.recv().await.expect("recv should not error");
        assert_eq!(inbound, Inbound::Closed);
    }

    #[tokio::test]
    async fn test_close_sends_close_frame() {
        let (conn, mut client) = connect_pair("/ws/r1").await;
        let (_reader, mut writer) = conn.split();

        writer.close().await.expect("close should succeed");

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_close());
    }

    #[tokio::test]
    async fn test_accept_does_not_wait_for_handshake() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        // Connects but never sends an upgrade request.
        let _idle = tokio::net::TcpStream::connect(addr).await.unwrap();
        let stalled = tokio::time::timeout(WAIT, transport.accept())
            .await
            .expect("accept should not wait for the handshake")
            .expect("should accept");

        let client = tokio::spawn(async move {
            tokio_tungstenite::connect_async(format!("ws://{addr}/ws/r2"))
                .await
                .expect("client should connect")
        });
        let incoming = tokio::time::timeout(WAIT, transport.accept())
            .await
            .expect("second accept should not be blocked")
            .expect("should accept");
        let conn = incoming.upgrade().await.expect("should upgrade");
        assert_eq!(conn.request().path(), "/ws/r2");
        client.await.unwrap();

        // The idle socket is still waiting for its handshake.
        let pending = tokio::time::timeout(Duration::from_millis(50), stalled.upgrade()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected_while_reading() {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_max_message_size(512);
        let (conn, mut client) = connect_to(transport, "/ws/r1").await;
        let (mut reader, _writer) = conn.split();

        let at_limit = "x".repeat(512);
        client
            .send(Message::Text(at_limit.clone().into()))
            .await
            .unwrap();
        let inbound = reader.recv().await.expect("recv should succeed");
        assert_eq!(inbound, Inbound::Frame(at_limit.into_bytes()));

        // The server stops reading after the header, so this send may
        // never finish. Keep it off the test task.
        tokio::spawn(async move {
            let huge = vec![0u8; 8 * 1024 * 1024];
            let _ = client.send(Message::Binary(huge.into())).await;
        });

        let err = tokio::time::timeout(WAIT, reader.recv())
            .await
            .expect("limit should trip before the payload arrives")
            .unwrap_err();
        match err {
            TransportError::MessageTooLarge { size, limit } => {
                assert!(size > 512, "reported size {size}");
                assert_eq!(limit, 512);
            }
            other => panic!("expected MessageTooLarge, got {other:?}"),
        }
    }
}
