//! Dials a backend's `/rev` endpoint and runs the reader/writer loops
//! for the resulting multiplexed connection. Mirrors the backend's own
//! `run_multiplexor` (services/backend/src/multiplex.rs) from the
//! other end of the same wire protocol.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rb_protocol::multiplex::MultiplexFrame;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::state::{BackendConnection, MULTIPLEX_SEND_QUEUE_SIZE};

pub async fn dial(
    host: String,
    backends: Arc<RwLock<HashMap<String, Arc<BackendConnection>>>>,
) -> Result<Arc<BackendConnection>, ProxyError> {
    let url = format!("ws://{host}/rev");
    let (stream, _response) = tokio_tungstenite::connect_async(&url)
        .await
        .map_err(|_| ProxyError::BackendUnreachable)?;
    let (mut sink, mut source) = stream.split();

    let proxy_id = match source.next().await {
        Some(Ok(Message::Text(text))) => text.to_string(),
        _ => return Err(ProxyError::BackendUnreachable),
    };

    let (out_tx, mut out_rx) = mpsc::channel::<MultiplexFrame>(MULTIPLEX_SEND_QUEUE_SIZE);
    let conn = Arc::new(BackendConnection::new(host.clone(), proxy_id.clone(), out_tx));

    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let json = serde_json::to_string(&frame).expect("MultiplexFrame always serialises");
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader_conn = conn.clone();
    let reader_host = host.clone();
    tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            let frame = match serde_json::from_str::<MultiplexFrame>(&text) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!(host = %reader_host, %err, "dropping malformed multiplex frame");
                    continue;
                }
            };
            handle_inbound_frame(frame, &reader_conn).await;
        }

        warn!(host = %reader_host, "backend connection lost, tearing down attached clients");
        reader_conn.teardown().await;
        backends.write().await.remove(&reader_host);
        info!(host = %reader_host, "backend connection removed");
    });

    Ok(conn)
}

/// A multiplex frame arriving from the backend. Only `Payload` is
/// legal in this direction; an unknown/stale client ID on the receive
/// side is answered with a `Disconnect` upstream so the backend cleans
/// up its side too.
async fn handle_inbound_frame(frame: MultiplexFrame, conn: &Arc<BackendConnection>) {
    match frame {
        MultiplexFrame::Payload { client_id, msg } => {
            if !conn.deliver(&client_id, msg).await {
                debug!(client_id, "payload for unknown edge client, disconnecting upstream");
                conn.send_frame(MultiplexFrame::Disconnect { client_id });
            }
        }
        MultiplexFrame::Connected { client_id } | MultiplexFrame::Disconnect { client_id } => {
            debug!(client_id, "unexpected lifecycle frame from backend, dropping");
        }
    }
}
