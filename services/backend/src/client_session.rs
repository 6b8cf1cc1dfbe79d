//! Three cooperating flows per direct WebSocket client: reader
//! (transport -> decoded message -> client recvQueue), writer (client
//! sendQueue -> transport), and controller (recvQueue -> protocol
//! logic). Mirrors the original system's three per-client goroutines,
//! joined by channels instead of a shared mutex.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use rb_protocol::message::ClientMessage;
use rb_protocol::Received;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol_logic::{self, Outcome};
use crate::room::{ClientRole, RoomHandle};

pub const CLIENT_SEND_QUEUE_SIZE: usize = 32;
pub const CLIENT_RECV_QUEUE_SIZE: usize = 32;

pub async fn run_direct_client(
    socket: WebSocket,
    client_id: String,
    role: ClientRole,
    room: RoomHandle,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Received<ClientMessage>>(CLIENT_SEND_QUEUE_SIZE);
    let (recv_tx, mut recv_rx) = mpsc::channel::<Received<ClientMessage>>(CLIENT_RECV_QUEUE_SIZE);

    // Registers this client with the room and delivers broadcasts onto
    // its send queue for the writer flow to drain.
    let (broadcast_tx, mut broadcast_rx) = mpsc::channel::<ClientMessage>(CLIENT_SEND_QUEUE_SIZE);
    if room
        .enqueue_client(crate::room::RoomMember {
            client_id: client_id.clone(),
            role,
            send: broadcast_tx,
        })
        .await
        .is_err()
    {
        warn!(client_id = %client_id, "room vanished before client could join");
        return;
    }

    let hello = crate::room::hello_for(role);
    let _ = send_tx
        .send(Received::new(client_id.clone(), hello))
        .await;

    let reader_id = client_id.clone();
    let reader = tokio::spawn(async move {
        while let Some(frame) = ws_stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    let received = Received::new(reader_id.clone(), msg);
                    if recv_tx.try_send(received).is_err() {
                        warn!(client_id = %reader_id, "client recv queue full, evicting");
                        break;
                    }
                }
                Err(err) => {
                    debug!(client_id = %reader_id, %err, "dropping malformed client message");
                }
            }
        }
    });

    let writer_id = client_id.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = send_rx.recv() => {
                    let Some(received) = msg else { break };
                    if write_one(&mut ws_sink, received).await.is_err() {
                        break;
                    }
                }
                msg = broadcast_rx.recv() => {
                    let Some(msg) = msg else { break };
                    let received = Received::new(writer_id.clone(), msg);
                    if write_one(&mut ws_sink, received).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_sink.close().await;
    });

    let controller_id = client_id.clone();
    let controller_room = room.clone();
    let controller = tokio::spawn(async move {
        while let Some(received) = recv_rx.recv().await {
            handle_controller_message(&controller_id, role, received, &send_tx, &controller_room)
                .await;
        }
    });

    tokio::select! {
        _ = reader => {},
        _ = writer => {},
        _ = controller => {},
    }

    let _ = room.dequeue_client(client_id).await;
}

async fn handle_controller_message(
    client_id: &str,
    role: ClientRole,
    received: Received<ClientMessage>,
    send_tx: &mpsc::Sender<Received<ClientMessage>>,
    room: &RoomHandle,
) {
    match protocol_logic::handle_client_message(client_id, role, received) {
        Outcome::Reply(pong) => {
            if send_tx.try_send(pong).is_err() {
                warn!(client_id, "client send queue full, dropping pong");
            }
        }
        Outcome::Forward(update) => {
            if let Err(err) = room.send_state_update(update) {
                debug!(client_id, %err, "room dropped state update");
            }
        }
        Outcome::Ignore => {}
    }
}

async fn write_one(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    received: Received<ClientMessage>,
) -> Result<(), axum::Error> {
    let received = protocol_logic::finalise_pong(received);
    let json = serde_json::to_string(&received.message).expect("ClientMessage always serialises");
    sink.send(Message::Text(json.into())).await
}
