//! REST Client Tests
//!
//! Gateway discovery and current user lookup against a canned local
//! HTTP responder.
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use anyhow::Result;
use gateway_client::{gateway_endpoint, RestClient};
use gateway_common::ApiConfig;
use integration_tests::TEST_TOKEN;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one request with a fixed response; yields the raw request head
async fn respond_once(status: &'static str, body: &'static str) -> Result<(String, JoinHandle<String>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();

        String::from_utf8_lossy(&request).into_owned()
    });

    Ok((base_url, handle))
}

fn client(base_url: &str) -> RestClient {
    RestClient::new(&ApiConfig {
        base_url: base_url.to_string(),
        token: TEST_TOKEN.to_string(),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn test_gateway_discovery() {
    let (base_url, server) = respond_once("200 OK", r#"{"url":"wss://gateway.example.com"}"#)
        .await
        .unwrap();

    let url = client(&base_url).gateway_url().await.unwrap();
    assert_eq!(url, "wss://gateway.example.com");
    assert_eq!(
        gateway_endpoint(&url, 10, "json").unwrap(),
        "wss://gateway.example.com/?v=10&encoding=json"
    );

    let request = server.await.unwrap().to_lowercase();
    assert!(request.starts_with("get /gateway "));
    assert!(request.contains(&format!("authorization: bot {TEST_TOKEN}")));
}

#[tokio::test]
async fn test_current_user() {
    let (base_url, server) = respond_once(
        "200 OK",
        r#"{"id":"80351110224678912","username":"test-bot","global_name":"Test Bot","bot":true}"#,
    )
    .await
    .unwrap();

    let user = client(&base_url).current_user().await.unwrap();
    assert_eq!(user.id.into_inner(), 80_351_110_224_678_912);
    assert_eq!(user.display_name(), "Test Bot");
    assert!(user.bot);

    assert!(server.await.unwrap().starts_with("GET /users/@me "));
}

#[tokio::test]
async fn test_unauthorized() {
    let (base_url, server) = respond_once("401 Unauthorized", r#"{"message":"401: Unauthorized"}"#)
        .await
        .unwrap();

    let err = client(&base_url).gateway_url().await.unwrap_err();
    assert!(err.is_unauthorized());
    server.await.unwrap();
}

#[tokio::test]
async fn test_unexpected_body() {
    let (base_url, server) = respond_once("200 OK", r#"{"not_url":true}"#).await.unwrap();

    let err = client(&base_url).gateway_url().await.unwrap_err();
    assert!(matches!(err, gateway_client::HttpError::Decode(_)));
    server.await.unwrap();
}
