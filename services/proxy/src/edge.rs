//! The edge-facing `/ws` endpoint: authorises a client against the
//! backend the Registry currently maps its room to, then attaches it
//! to that backend's multiplexed `/rev` connection as a logical client.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use rb_protocol::message::ClientMessage;
use rb_protocol::multiplex::MultiplexFrame;
use rb_protocol::rest::JoinResponse;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::ProxyError;
use crate::state::{AppState, BackendConnection, EDGE_SEND_QUEUE_SIZE};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub rid: String,
    pub token: String,
}

pub async fn ws_client(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Result<Response, ProxyError> {
    let host = state
        .registry
        .get(&query.rid)
        .await
        .ok()
        .flatten()
        .ok_or(ProxyError::UnknownRoom)?;

    let conn = state.get_or_connect(&host).await?;

    let resp = state
        .http
        .get(format!("http://{host}/join"))
        .query(&[
            ("rid", query.rid.as_str()),
            ("token", query.token.as_str()),
            ("remote", remote.to_string().as_str()),
            ("proxyid", conn.proxy_id.as_str()),
        ])
        .send()
        .await
        .map_err(|_| ProxyError::BackendUnreachable)?;

    if !resp.status().is_success() {
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return Err(ProxyError::JoinRejected(status));
    }

    let join: JoinResponse = resp.json().await.map_err(|_| ProxyError::BackendUnreachable)?;
    let client_id = join.cid;
    info!(client_id, room_id = %query.rid, host = %conn.host, "edge client authorised");

    Ok(ws.on_upgrade(move |socket| run_edge_client(socket, client_id, conn)))
}

async fn run_edge_client(socket: WebSocket, client_id: String, conn: Arc<BackendConnection>) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (recv_tx, mut recv_rx) = mpsc::channel::<ClientMessage>(EDGE_SEND_QUEUE_SIZE);

    conn.register_client(client_id.clone(), recv_tx).await;
    conn.send_frame(MultiplexFrame::Connected {
        client_id: client_id.clone(),
    });

    let reader_id = client_id.clone();
    let reader_conn = conn.clone();
    let reader = tokio::spawn(async move {
        while let Some(frame) = ws_stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => reader_conn.send_frame(MultiplexFrame::Payload {
                    client_id: reader_id.clone(),
                    msg,
                }),
                Err(err) => {
                    debug!(client_id = %reader_id, %err, "dropping malformed client message");
                }
            }
        }
    });

    let writer = tokio::spawn(async move {
        while let Some(msg) = recv_rx.recv().await {
            let json = serde_json::to_string(&msg).expect("ClientMessage always serialises");
            if ws_sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    tokio::select! {
        _ = reader => {},
        _ = writer => {},
    }

    conn.remove_client(&client_id).await;
    conn.send_frame(MultiplexFrame::Disconnect { client_id });
}
