//! Test helpers for integration tests
//!
//! Provides an in-process hub backed by in-memory collaborators, a small
//! WebSocket client and HTTP helpers for the internal routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chat_common::HubConfig;
use chat_core::IdentityVerifier;
use chat_hub::testing::{InMemoryParticipants, StaticVerifier};
use chat_hub::{create_app, HubState};
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Shared token for the internal trigger routes
pub const INTERNAL_TOKEN: &str = "test-internal-token";

/// How long to wait for an expected frame
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait when asserting nothing arrives
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Default hub settings for tests
pub fn test_config() -> HubConfig {
    HubConfig {
        outbound_buffer: 100,
        trigger_buffer: 64,
        internal_token: Some(INTERNAL_TOKEN.to_string()),
    }
}

/// Hub instance bound to an ephemeral port
pub struct TestHub {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: HubState,
    pub tokens: Arc<StaticVerifier>,
    pub participants: Arc<InMemoryParticipants>,
    _handle: JoinHandle<()>,
}

impl TestHub {
    /// Start a hub with the default test config
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config()).await
    }

    /// Start a hub with custom settings
    pub async fn start_with_config(config: HubConfig) -> Result<Self> {
        let tokens = Arc::new(StaticVerifier::new());
        Self::start_with(tokens.clone(), tokens, config).await
    }

    /// Start a hub with a custom identity verifier
    pub async fn start_with_verifier(verifier: Arc<dyn IdentityVerifier>) -> Result<Self> {
        Self::start_with(verifier, Arc::new(StaticVerifier::new()), test_config()).await
    }

    async fn start_with(
        verifier: Arc<dyn IdentityVerifier>,
        tokens: Arc<StaticVerifier>,
        config: HubConfig,
    ) -> Result<Self> {
        let participants = Arc::new(InMemoryParticipants::new());
        let state = HubState::new(verifier, participants.clone(), config);
        let app = create_app(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            state,
            tokens,
            participants,
            _handle: handle,
        })
    }

    /// Get base URL for HTTP requests
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the WebSocket endpoint URL
    pub fn ws_url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// Open a raw WebSocket connection
    pub async fn connect(&self) -> Result<WsClient> {
        WsClient::connect(&self.ws_url()).await
    }

    /// Open a connection and authenticate it, returning the presence snapshot
    pub async fn connect_as(&self, user_id: i64) -> Result<(WsClient, Value)> {
        let token = self.tokens.issue(user_id);
        let mut ws = self.connect().await?;
        let snapshot = ws.authenticate(user_id, &token).await?;
        Ok((ws, snapshot))
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a POST request with JSON body and no token
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.post(&url).json(body).send().await?)
    }

    /// Make a POST request with JSON body and bearer token
    pub async fn post_auth<T: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await?)
    }

    /// POST to an internal trigger route and expect `202 Accepted`
    pub async fn trigger<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let response = self
            .post_auth(&format!("/internal{path}"), INTERNAL_TOKEN, body)
            .await?;
        assert_status(response, StatusCode::ACCEPTED).await
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close frame received from the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedWith {
    pub code: u16,
    pub reason: String,
}

/// Minimal hub client
pub struct WsClient {
    stream: WsStream,
}

impl WsClient {
    /// Connect to a hub endpoint
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;
        Ok(Self { stream })
    }

    /// Send a JSON intent
    pub async fn send_json(&mut self, value: &Value) -> Result<()> {
        self.send_text(&value.to_string()).await
    }

    /// Send a raw text frame
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a raw binary frame
    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.stream.send(Message::Binary(bytes)).await?;
        Ok(())
    }

    /// Send `authenticate` and wait for the presence snapshot
    pub async fn authenticate(&mut self, user_id: i64, token: &str) -> Result<Value> {
        self.send_json(&json!({ "type": "authenticate", "userId": user_id, "token": token }))
            .await?;
        self.expect_event("presenceSnapshot").await
    }

    /// Send `subscribeConversation`
    pub async fn subscribe(&mut self, conversation_id: i64) -> Result<()> {
        self.send_json(&json!({ "type": "subscribeConversation", "conversationId": conversation_id }))
            .await
    }

    /// Send `typing`
    pub async fn typing(&mut self, conversation_id: i64, is_typing: bool) -> Result<()> {
        self.send_json(&json!({
            "type": "typing",
            "conversationId": conversation_id,
            "isTyping": is_typing,
        }))
        .await
    }

    /// Wait for the next text frame and decode it
    pub async fn recv_event(&mut self) -> Result<Value> {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("Timed out waiting for event")?;

            match frame {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(frame))) => bail!("Connection closed: {frame:?}"),
                Some(Ok(other)) => bail!("Unexpected frame: {other:?}"),
                Some(Err(e)) => return Err(e.into()),
                None => bail!("Connection ended"),
            }
        }
    }

    /// Wait for the next event and check its `type`
    pub async fn expect_event(&mut self, event_type: &str) -> Result<Value> {
        let event = self.recv_event().await?;
        if event["type"] != event_type {
            bail!("Expected {event_type} event, got {event}");
        }
        Ok(event)
    }

    /// Wait for the close frame; any text frame before it is an error
    pub async fn expect_close(&mut self) -> Result<ClosedWith> {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("Timed out waiting for close")?;

            match frame {
                Some(Ok(Message::Close(Some(frame)))) => {
                    return Ok(ClosedWith {
                        code: u16::from(frame.code),
                        reason: frame.reason.to_string(),
                    })
                }
                Some(Ok(Message::Close(None))) => bail!("Closed without a close frame"),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Text(text))) => bail!("Expected close, got event {text}"),
                Some(Ok(other)) => bail!("Unexpected frame: {other:?}"),
                Some(Err(e)) => return Err(e.into()),
                None => bail!("Connection ended without a close frame"),
            }
        }
    }

    /// Assert no event arrives within the quiet period
    pub async fn expect_silence(&mut self) -> Result<()> {
        match tokio::time::timeout(QUIET_PERIOD, self.stream.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(Message::Text(text)))) => bail!("Expected silence, got event {text}"),
            Ok(other) => bail!("Expected silence, got {other:?}"),
        }
    }

    /// Close the connection from the client side
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(())
}

/// Poll until `condition` holds or the receive timeout elapses
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            bail!("Condition not met before timeout");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
