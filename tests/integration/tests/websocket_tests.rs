//! WebSocket Transport Tests
//!
//! Run the session over a real WebSocket connection to a local
//! tokio-tungstenite server.
//!
//! Run with: cargo test -p integration-tests --test websocket_tests

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use gateway_client::events::GatewayEvent;
use gateway_client::protocol::{decode, encode, GatewayMessage, OpCode};
use gateway_client::session::{SessionError, SessionState};
use gateway_client::stream::CloseReason;
use gateway_client::{Credentials, GatewaySession};
use integration_tests::*;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerStream = WebSocketStream<TcpStream>;

async fn bind() -> Result<(TcpListener, String)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("ws://{}/?v=10&encoding=json", listener.local_addr()?);
    Ok((listener, url))
}

async fn accept(listener: &TcpListener) -> Result<ServerStream> {
    let (stream, _) = listener.accept().await?;
    Ok(tokio_tungstenite::accept_async(stream).await?)
}

async fn send(ws: &mut ServerStream, message: &GatewayMessage) -> Result<()> {
    ws.send(Message::Text(encode(message))).await?;
    Ok(())
}

/// Next non-heartbeat message from the client
async fn next_message(ws: &mut ServerStream) -> Result<GatewayMessage> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .context("Timed out waiting for the client")?
            .context("Client disconnected")??;

        if let Message::Text(text) = frame {
            let message = decode(&text)?;
            if message.op == OpCode::Heartbeat {
                send(ws, &GatewayMessage::heartbeat_ack()).await?;
                continue;
            }
            return Ok(message);
        }
    }
}

/// Read until the client's close frame
async fn client_close_code(ws: &mut ServerStream) -> Result<Option<u16>> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .context("Timed out waiting for the client")?;
        match frame {
            Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| u16::from(f.code))),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(None),
        }
    }
}

#[tokio::test]
async fn test_session_over_websocket() {
    let (listener, url) = bind().await.unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await.unwrap();
        send(&mut ws, &GatewayMessage::hello(HEARTBEAT_INTERVAL_MS)).await.unwrap();

        let identify = next_message(&mut ws).await.unwrap().as_identify().unwrap();
        assert_eq!(identify.token, TEST_TOKEN);

        send(&mut ws, &ready("ws-session", 1)).await.unwrap();
        send(&mut ws, &message("over the wire", 2)).await.unwrap();

        client_close_code(&mut ws).await.unwrap()
    });

    let mut session = GatewaySession::connect(&url, Credentials::new(TEST_TOKEN), None)
        .await
        .unwrap();
    let mut events = session.events().unwrap();

    let event = events.recv().await.unwrap();
    assert!(matches!(event.event, GatewayEvent::Ready(_)));
    let event = events.recv().await.unwrap();
    match &event.event {
        GatewayEvent::MessageCreate(message) => assert_eq!(message.content, "over the wire"),
        other => panic!("expected MESSAGE_CREATE, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Connected);

    let identity = session.close().await.unwrap();
    assert_eq!(identity.session_id, "ws-session");
    assert_eq!(identity.last_sequence, 2);

    assert_eq!(server.await.unwrap(), Some(1000));
}

#[tokio::test]
async fn test_server_close_code_reaches_session() {
    let (listener, url) = bind().await.unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await.unwrap();
        send(&mut ws, &GatewayMessage::hello(HEARTBEAT_INTERVAL_MS)).await.unwrap();
        next_message(&mut ws).await.unwrap();

        ws.close(Some(CloseFrame {
            code: CloseCode::from(4004),
            reason: "Authentication failed".into(),
        }))
        .await
        .unwrap();
    });

    let mut session = GatewaySession::connect(&url, Credentials::new("wrong"), None)
        .await
        .unwrap();
    let mut events = session.events().unwrap();

    assert!(events.recv().await.is_none());
    assert_eq!(
        events.close_reason(),
        Some(CloseReason::Fatal(SessionError::AuthenticationFailed(
            "Authentication failed".to_string()
        )))
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_connect_refused() {
    let (listener, url) = bind().await.unwrap();
    drop(listener);

    let result = GatewaySession::connect(&url, Credentials::new(TEST_TOKEN), None).await;
    assert!(matches!(result, Err(SessionError::Transport(_))));
}
