//! A minimal multiplexor peer: dials a backend's `/rev` endpoint,
//! reads the proxy ID frame, then sends/receives raw multiplex frames.
//! Used to test the backend's proxy-multiplexed path without running a
//! full reverse proxy.

use futures_util::{SinkExt, StreamExt};
use rb_protocol::MultiplexFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct MockProxyLink {
    stream: WsStream,
    pub proxy_id: String,
}

impl MockProxyLink {
    pub async fn connect(rev_url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (mut stream, _response) = tokio_tungstenite::connect_async(rev_url).await?;
        let proxy_id = match stream.next().await {
            Some(Ok(Message::Text(id))) => id.to_string(),
            other => return Err(format!("expected proxy id frame, got {other:?}").into()),
        };
        Ok(Self { stream, proxy_id })
    }

    pub async fn send(&mut self, frame: &MultiplexFrame) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(frame)?;
        self.stream.send(Message::Text(json.into())).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<MultiplexFrame, Box<dyn std::error::Error>> {
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
}
