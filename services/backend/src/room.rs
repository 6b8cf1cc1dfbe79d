//! The per-room single-writer actor: the one place `PlaybackState` is
//! mutated. Everything else talks to a room through [`RoomHandle`]'s
//! channels, never through a shared lock.

use rb_protocol::message::{
    Authority, ClientMessage, HelloPayload, PlaybackStateWire, PlaybackStatus, StateUpdatePayload,
};
use rb_protocol::Received;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub const ROOM_RECV_QUEUE_SIZE: usize = 256;
pub const BROADCAST_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_MASTERLESS_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const UPDATE_COOLDOWN: Duration = Duration::from_secs(1);

/// `0.9 * UPDATE_COOLDOWN`: the buffered-update timer fires slightly
/// before the cooldown fully elapses, so the next applied update lands
/// as soon as legal rather than one tick late. The ratio must stay
/// 0.9, not 1.0 — it minimises average latency while keeping
/// broadcasts monotonic.
fn buffered_update_delay() -> Duration {
    Duration::from_secs_f64(UPDATE_COOLDOWN.as_secs_f64() * 0.9)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub source: String,
    pub status: PlaybackStatus,
    pub position: f64,
    pub speed: f64,
    pub duration: f64,
    pub last_updated: Instant,
}

impl PlaybackState {
    fn new() -> Self {
        Self {
            source: String::new(),
            status: PlaybackStatus::Stopped,
            position: 0.0,
            speed: 1.0,
            duration: 0.0,
            last_updated: Instant::now(),
        }
    }

    /// Extrapolate to "now", clamping to `[0, duration]`. Clamping to
    /// the upper bound auto-stops playback and resets `last_updated`,
    /// per the PlaybackState invariant in the data model.
    fn project(&mut self, now: Instant) {
        if self.status == PlaybackStatus::Playing {
            self.position += now.duration_since(self.last_updated).as_secs_f64() * self.speed;
        }
        if self.position >= self.duration {
            self.position = self.duration;
            self.status = PlaybackStatus::Stopped;
            self.last_updated = now;
        }
    }

    fn to_wire(&self) -> PlaybackStateWire {
        PlaybackStateWire {
            source: self.source.clone(),
            status: self.status,
            position: self.position,
            speed: self.speed,
            duration: self.duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRole {
    Master,
    Guest,
}

/// What a room needs to know about one connected client: where to
/// deliver broadcasts, and whether it may mutate state.
pub struct RoomMember {
    pub client_id: String,
    pub role: ClientRole,
    pub send: mpsc::Sender<ClientMessage>,
}

enum MembershipEvent {
    Enqueue(RoomMember),
    Dequeue(String),
}

/// Cheap, cloneable reference to a running room. Holds only channel
/// senders; the actor task owns all mutable state.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: String,
    update_tx: mpsc::Sender<Received<StateUpdatePayload>>,
    membership_tx: mpsc::Sender<MembershipEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum RoomSendError {
    #[error("room is shutting down")]
    Closed,
    #[error("room recv queue is saturated, dropping message")]
    QueueFull,
}

impl RoomHandle {
    /// Non-blocking: the room's `recvQueue` is allowed to drop under
    /// backpressure (master retries every broadcast cycle and state is
    /// idempotent), so this never awaits.
    pub fn send_state_update(
        &self,
        update: Received<StateUpdatePayload>,
    ) -> Result<(), RoomSendError> {
        self.update_tx.try_send(update).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => RoomSendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => RoomSendError::Closed,
        })
    }

    /// Membership changes must never be silently dropped, so this
    /// awaits room-side capacity rather than failing fast.
    pub async fn enqueue_client(&self, member: RoomMember) -> Result<(), RoomSendError> {
        self.membership_tx
            .send(MembershipEvent::Enqueue(member))
            .await
            .map_err(|_| RoomSendError::Closed)
    }

    pub async fn dequeue_client(&self, client_id: String) -> Result<(), RoomSendError> {
        self.membership_tx
            .send(MembershipEvent::Dequeue(client_id))
            .await
            .map_err(|_| RoomSendError::Closed)
    }
}

/// Resolves when the room's actor loop has exited, so the server can
/// remove it from the rooms map.
pub struct RoomShutdown(pub oneshot::Receiver<()>);

pub fn spawn_room(room_id: String, masterless_timeout: Duration) -> (RoomHandle, RoomShutdown) {
    let (update_tx, update_rx) = mpsc::channel(ROOM_RECV_QUEUE_SIZE);
    // Membership is logically unbuffered in the source design; a small
    // buffer avoids a rendezvous deadlock between the actor and a
    // caller enqueuing from inside the same select loop elsewhere.
    let (membership_tx, membership_rx) = mpsc::channel(8);
    let (done_tx, done_rx) = oneshot::channel();
    let handle = RoomHandle {
        room_id: room_id.clone(),
        update_tx,
        membership_tx,
    };
    tokio::spawn(run_room(
        room_id,
        masterless_timeout,
        update_rx,
        membership_rx,
        done_tx,
    ));
    (handle, RoomShutdown(done_rx))
}

async fn run_room(
    room_id: String,
    masterless_timeout: Duration,
    mut update_rx: mpsc::Receiver<Received<StateUpdatePayload>>,
    mut membership_rx: mpsc::Receiver<MembershipEvent>,
    done_tx: oneshot::Sender<()>,
) {
    let mut state = PlaybackState::new();
    let mut members: HashMap<String, RoomMember> = HashMap::new();
    let mut masters: HashSet<String> = HashSet::new();
    let mut buffered_update: Option<Received<StateUpdatePayload>> = None;

    let mut broadcast_ticker = tokio::time::interval(BROADCAST_PERIOD);
    broadcast_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // A room starts Active-with-master only once its first master
    // joins; until then it behaves like Masterless, so the timer is
    // armed from the start.
    let masterless_timer = tokio::time::sleep(masterless_timeout);
    tokio::pin!(masterless_timer);
    let mut masterless_armed = true;

    let cooldown_timer = tokio::time::sleep(Duration::from_secs(0));
    tokio::pin!(cooldown_timer);
    let mut cooldown_armed = false;

    loop {
        tokio::select! {
            biased;

            update = update_rx.recv() => {
                let Some(update) = update else { break };
                handle_state_update(
                    &mut state,
                    &mut buffered_update,
                    update,
                    cooldown_timer.as_mut(),
                    &mut cooldown_armed,
                    &members,
                );
            }

            event = membership_rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    MembershipEvent::Enqueue(member) => {
                        let is_master = member.role == ClientRole::Master;
                        let client_id = member.client_id.clone();
                        send_current_state(&mut state, &member.send);
                        members.insert(client_id.clone(), member);
                        if is_master {
                            let was_empty = masters.is_empty();
                            masters.insert(client_id);
                            if was_empty {
                                masterless_armed = false;
                            }
                        }
                        info!(room_id = %room_id, n_clients = members.len(), n_masters = masters.len(), "client joined");
                    }
                    MembershipEvent::Dequeue(client_id) => {
                        if members.remove(&client_id).is_none() {
                            continue;
                        }
                        let was_master = masters.remove(&client_id);
                        if was_master && masters.is_empty() {
                            masterless_timer
                                .as_mut()
                                .reset(tokio::time::Instant::now() + masterless_timeout);
                            masterless_armed = true;
                        }
                        info!(room_id = %room_id, n_clients = members.len(), "client left");
                    }
                }
            }

            _ = broadcast_ticker.tick() => {
                broadcast_state(&mut state, &members);
            }

            _ = &mut cooldown_timer, if cooldown_armed => {
                cooldown_armed = false;
                if let Some(update) = buffered_update.take() {
                    debug!(room_id = %room_id, "applying buffered state update");
                    apply_update(&mut state, &update);
                    broadcast_state(&mut state, &members);
                }
            }

            _ = &mut masterless_timer, if masterless_armed => {
                info!(room_id = %room_id, "masterless timeout elapsed, shutting down");
                break;
            }
        }
    }

    members.clear();
    let _ = done_tx.send(());
}

/// Implements the cooldown-coalescing branch in §4.3: apply
/// immediately if the cooldown has elapsed since `last_updated` (the
/// spec's authoritative anchor — not the message's `received_at`),
/// otherwise buffer and arm the 0.9x timer if not already armed.
fn handle_state_update(
    state: &mut PlaybackState,
    buffered_update: &mut Option<Received<StateUpdatePayload>>,
    update: Received<StateUpdatePayload>,
    cooldown_timer: std::pin::Pin<&mut tokio::time::Sleep>,
    cooldown_armed: &mut bool,
    members: &HashMap<String, RoomMember>,
) {
    let now = Instant::now();
    if now.duration_since(state.last_updated) >= UPDATE_COOLDOWN {
        apply_update(state, &update);
        broadcast_state(state, members);
        return;
    }

    buffered_update.replace(update);
    if !*cooldown_armed {
        cooldown_timer.reset(tokio::time::Instant::now() + buffered_update_delay());
        *cooldown_armed = true;
    }
}

/// New position credits both the half-RTT the master measured and the
/// server-side queueing delay (`now - received_at`) to the clock, so a
/// guest rendering at `last_updated + delta` lands near the master's
/// true playhead at the moment the update was sent.
fn apply_update(state: &mut PlaybackState, update: &Received<StateUpdatePayload>) {
    let now = Instant::now();
    let payload = &update.message;
    state.source = payload.state.source.clone();
    state.status = payload.state.status;
    state.speed = payload.state.speed;
    state.duration = payload.state.duration;

    let queue_delay = now
        .saturating_duration_since(update.received_at)
        .as_secs_f64();
    let half_rtt = (payload.rtt / 2.0).max(0.0);
    state.position = if payload.state.status == PlaybackStatus::Playing {
        payload.state.position + (half_rtt + queue_delay) * payload.state.speed
    } else {
        payload.state.position
    };
    state.last_updated = now;
    state.project(now);
}

fn broadcast_state(state: &mut PlaybackState, members: &HashMap<String, RoomMember>) {
    state.project(Instant::now());
    let msg = ClientMessage::StateBroadcast(state.to_wire());
    for member in members.values() {
        if member.send.try_send(msg.clone()).is_err() {
            warn!(client_id = %member.client_id, "client send queue full or closed, dropping broadcast");
        }
    }
}

fn send_current_state(state: &mut PlaybackState, send: &mpsc::Sender<ClientMessage>) {
    state.project(Instant::now());
    let _ = send.try_send(ClientMessage::StateBroadcast(state.to_wire()));
}

pub fn hello_for(role: ClientRole) -> ClientMessage {
    ClientMessage::Hello(HelloPayload {
        authority: match role {
            ClientRole::Master => Authority::Master,
            ClientRole::Guest => Authority::Guest,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_protocol::message::PlaybackStateWire;

    fn update(position: f64, status: PlaybackStatus, rtt: f64) -> Received<StateUpdatePayload> {
        Received::new(
            "master1",
            StateUpdatePayload {
                state: PlaybackStateWire {
                    source: "u".into(),
                    status,
                    position,
                    speed: 1.0,
                    duration: 60.0,
                },
                rtt,
            },
        )
    }

    #[test]
    fn apply_update_credits_half_rtt_and_queue_delay() {
        let mut state = PlaybackState::new();
        state.last_updated = Instant::now() - Duration::from_secs(10);
        let u = update(10.0, PlaybackStatus::Playing, 0.2);
        apply_update(&mut state, &u);
        // half_rtt = 0.1s, queue delay ~0 (no sleep between construction and apply)
        assert!(state.position >= 10.0 && state.position < 10.3);
        assert_eq!(state.status, PlaybackStatus::Playing);
    }

    #[test]
    fn apply_update_does_not_extrapolate_when_not_playing() {
        let mut state = PlaybackState::new();
        let u = update(10.0, PlaybackStatus::Paused, 0.2);
        apply_update(&mut state, &u);
        assert_eq!(state.position, 10.0);
    }

    #[test]
    fn project_clamps_to_duration_and_stops() {
        let mut state = PlaybackState::new();
        state.status = PlaybackStatus::Playing;
        state.duration = 60.0;
        state.position = 59.0;
        state.speed = 1.0;
        state.last_updated = Instant::now() - Duration::from_secs(5);
        state.project(Instant::now());
        assert_eq!(state.position, 60.0);
        assert_eq!(state.status, PlaybackStatus::Stopped);
    }

    #[test]
    fn project_extrapolates_while_playing() {
        let mut state = PlaybackState::new();
        state.status = PlaybackStatus::Playing;
        state.duration = 600.0;
        state.position = 10.0;
        state.speed = 2.0;
        state.last_updated = Instant::now() - Duration::from_secs(1);
        state.project(Instant::now());
        assert!(state.position >= 11.9 && state.position < 12.2);
    }

    #[tokio::test]
    async fn masterless_timeout_shuts_room_down() {
        let (handle, shutdown) = spawn_room("r1".into(), Duration::from_millis(50));
        let (tx, _rx) = mpsc::channel(4);
        handle
            .enqueue_client(RoomMember {
                client_id: "m1".into(),
                role: ClientRole::Master,
                send: tx,
            })
            .await
            .unwrap();
        handle.dequeue_client("m1".into()).await.unwrap();
        tokio::time::timeout(Duration::from_millis(500), shutdown.0)
            .await
            .expect("room should shut down after masterless timeout")
            .unwrap();
    }

    #[tokio::test]
    async fn new_master_before_timeout_cancels_shutdown() {
        let (handle, shutdown) = spawn_room("r1".into(), Duration::from_millis(100));
        let (tx1, _rx1) = mpsc::channel(4);
        handle
            .enqueue_client(RoomMember {
                client_id: "m1".into(),
                role: ClientRole::Master,
                send: tx1,
            })
            .await
            .unwrap();
        handle.dequeue_client("m1".into()).await.unwrap();

        let (tx2, _rx2) = mpsc::channel(4);
        handle
            .enqueue_client(RoomMember {
                client_id: "m2".into(),
                role: ClientRole::Master,
                send: tx2,
            })
            .await
            .unwrap();

        let result = tokio::time::timeout(Duration::from_millis(200), shutdown.0).await;
        assert!(result.is_err(), "room must not shut down while a master is present");
    }
}
