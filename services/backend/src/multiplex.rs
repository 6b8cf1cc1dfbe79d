//! The `/rev` side of the reverse proxy link: one physical WebSocket
//! carrying many logical client sessions, fanned out by `client_id`.
//! Mirrors [`crate::client_session`]'s reader/writer/controller split,
//! except decode and dispatch for every `/rev` connection on the
//! server are funnelled through the shared worker pool in
//! [`crate::workers`] rather than run inline on each connection's own
//! reader task.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use rb_protocol::message::ClientMessage;
use rb_protocol::multiplex::MultiplexFrame;
use rb_protocol::Received;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::protocol_logic::{self, Outcome};
use crate::room::{ClientRole, RoomHandle};
use crate::state::PendingJoins;

pub const MULTIPLEX_SEND_QUEUE_SIZE: usize = 256;

struct VirtualClient {
    role: ClientRole,
    room: RoomHandle,
}

/// Everything a job needs to process one frame for one `/rev`
/// connection, without that connection's reader/writer tasks being
/// involved in the work itself.
#[derive(Clone)]
struct ConnContext {
    clients: Arc<Mutex<HashMap<String, VirtualClient>>>,
    pending: PendingJoins,
    work_tx: mpsc::Sender<Job>,
    sink_tx: mpsc::Sender<Message>,
    proxy_id: String,
}

/// One unit of work on the shared queue: decode-and-dispatch an
/// inbound frame, or encode-and-enqueue an outbound one. Mirrors the
/// original multiplexor's `workTypeRecv`/`workTypeSend` split feeding
/// a single `processWork` function from one shared queue.
pub enum Job {
    Recv { raw: String, ctx: ConnContext },
    Send { client_id: String, received: Received<ClientMessage>, ctx: ConnContext },
}

pub async fn run_multiplexor(
    socket: WebSocket,
    proxy_id: String,
    pending: PendingJoins,
    work_tx: mpsc::Sender<Job>,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    if ws_sink
        .send(Message::Text(proxy_id.clone().into()))
        .await
        .is_err()
    {
        warn!(proxy_id, "failed to send proxy id, dropping connection");
        return;
    }

    let (sink_tx, mut sink_rx) = mpsc::channel::<Message>(MULTIPLEX_SEND_QUEUE_SIZE);
    let clients: Arc<Mutex<HashMap<String, VirtualClient>>> = Arc::new(Mutex::new(HashMap::new()));
    let ctx = ConnContext {
        clients: clients.clone(),
        pending,
        work_tx: work_tx.clone(),
        sink_tx,
        proxy_id: proxy_id.clone(),
    };

    // Writer does I/O only: every frame arriving here has already been
    // JSON-encoded by a worker.
    let writer = tokio::spawn(async move {
        while let Some(msg) = sink_rx.recv().await {
            if ws_sink.send(msg).await.is_err() {
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    while let Some(frame) = ws_stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        if work_tx
            .send(Job::Recv {
                raw: text.to_string(),
                ctx: ctx.clone(),
            })
            .await
            .is_err()
        {
            warn!(proxy_id, "multiplex work queue closed, dropping connection");
            break;
        }
    }

    writer.abort();
    let mut clients = clients.lock().await;
    for (client_id, vclient) in clients.drain() {
        let _ = vclient.room.dequeue_client(client_id).await;
    }
    info!(proxy_id, "multiplexor connection closed");
}

/// Run by a worker in the shared pool: workers hold no state of their
/// own across calls, everything needed lives on the job.
pub async fn process_job(job: Job) {
    match job {
        Job::Recv { raw, ctx } => {
            let frame = match serde_json::from_str::<MultiplexFrame>(&raw) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!(proxy_id = %ctx.proxy_id, %err, "dropping malformed multiplex frame");
                    return;
                }
            };
            handle_inbound_frame(frame, &ctx).await;
        }
        Job::Send { client_id, received, ctx } => {
            // Stamped here, at the point of actual marshal-for-send, so
            // a Pong's service_time includes queue dwell on both the
            // recv and send side rather than just decode latency.
            let received = protocol_logic::finalise_pong(received);
            let frame = MultiplexFrame::Payload {
                client_id,
                msg: received.message,
            };
            let json = serde_json::to_string(&frame).expect("MultiplexFrame always serialises");
            if ctx.sink_tx.send(Message::Text(json.into())).await.is_err() {
                debug!(proxy_id = %ctx.proxy_id, "write queue closed, dropping frame");
            }
        }
    }
}

/// Non-blocking: a worker producing a `Send` job back onto the same
/// queue it drains must never block on that queue's own capacity, or a
/// pool where every worker is mid-send could deadlock with nothing
/// left to drain it. Dropping under saturation here matches the
/// allowance spec.md gives decode/dispatch workers generally.
fn enqueue_send(ctx: &ConnContext, client_id: String, msg: ClientMessage) {
    enqueue_reply(ctx, client_id, Received::new(ctx.proxy_id.clone(), msg));
}

/// Like `enqueue_send`, but keeps the `Received`'s original decode-time
/// timestamp rather than stamping a fresh one — used for replies, so
/// `finalise_pong` measures dwell from actual receipt, not from here.
fn enqueue_reply(ctx: &ConnContext, client_id: String, received: Received<ClientMessage>) {
    if ctx
        .work_tx
        .try_send(Job::Send {
            client_id,
            received,
            ctx: ctx.clone(),
        })
        .is_err()
    {
        warn!(proxy_id = %ctx.proxy_id, "multiplex work queue saturated, dropping outbound frame");
    }
}

async fn handle_inbound_frame(frame: MultiplexFrame, ctx: &ConnContext) {
    match frame {
        MultiplexFrame::Connected { client_id } => {
            let Some(join) = ctx.pending.take(&client_id) else {
                warn!(client_id, "Connected frame for client with no pending join");
                return;
            };

            let (broadcast_tx, mut broadcast_rx) = mpsc::channel(32);
            if join
                .room
                .enqueue_client(crate::room::RoomMember {
                    client_id: client_id.clone(),
                    role: join.role,
                    send: broadcast_tx,
                })
                .await
                .is_err()
            {
                warn!(client_id, "room vanished before multiplexed client could join");
                return;
            }

            let hello = crate::room::hello_for(join.role);
            enqueue_send(ctx, client_id.clone(), hello);

            ctx.clients.lock().await.insert(
                client_id.clone(),
                VirtualClient {
                    role: join.role,
                    room: join.room,
                },
            );

            let forward_ctx = ctx.clone();
            let forward_id = client_id;
            tokio::spawn(async move {
                while let Some(msg) = broadcast_rx.recv().await {
                    enqueue_send(&forward_ctx, forward_id.clone(), msg);
                }
            });
        }

        MultiplexFrame::Disconnect { client_id } => {
            let vclient = ctx.clients.lock().await.remove(&client_id);
            if let Some(vclient) = vclient {
                let _ = vclient.room.dequeue_client(client_id).await;
            }
        }

        MultiplexFrame::Payload { client_id, msg } => {
            let role = {
                let clients = ctx.clients.lock().await;
                clients.get(&client_id).map(|v| (v.role, v.room.clone()))
            };
            let Some((role, room)) = role else {
                debug!(client_id, "Payload frame for unknown client, dropping");
                return;
            };

            let received = Received::new(client_id.clone(), msg);
            match protocol_logic::handle_client_message(&client_id, role, received) {
                Outcome::Reply(reply) => {
                    // received_at is preserved from decode time so the
                    // Send job's finalise_pong call measures queue dwell
                    // on both the recv and send side, not just from here.
                    enqueue_reply(ctx, client_id, reply);
                }
                Outcome::Forward(update) => {
                    if let Err(err) = room.send_state_update(update) {
                        debug!(client_id, %err, "room dropped state update");
                    }
                }
                Outcome::Ignore => {}
            }
        }
    }
}
