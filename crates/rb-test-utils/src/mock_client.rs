//! A minimal direct-WebSocket client speaking the `vchamber_v1`
//! subprotocol, for exercising a backend's `/ws` endpoint end to end
//! without a browser.

use futures_util::{SinkExt, StreamExt};
use rb_protocol::ClientMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub const SUBPROTOCOL: &str = "vchamber_v1";

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct MockClient {
    stream: WsStream,
}

impl MockClient {
    /// Connect to `ws_url` (already carrying `?rid=...&token=...`),
    /// offering the `vchamber_v1` subprotocol.
    pub async fn connect(ws_url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut request = ws_url.into_client_request()?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBPROTOCOL),
        );
        let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
        Ok(Self { stream })
    }

    /// Same as [`MockClient::connect`] but without offering a
    /// subprotocol, for exercising the mismatch-rejection path.
    pub async fn connect_without_subprotocol(
        ws_url: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (stream, _response) = tokio_tungstenite::connect_async(ws_url).await?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(msg)?;
        self.stream.send(Message::Text(json.into())).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ClientMessage, Box<dyn std::error::Error>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => return Err("connection closed by server".into()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err("connection stream ended".into()),
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.stream.send(Message::Close(None)).await?;
        Ok(())
    }
}
