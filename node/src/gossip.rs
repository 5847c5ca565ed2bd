//! UDP gossip engine (C4): periodic best-effort broadcast of local state,
//! plus a receive loop that merges inbound state from peers.

use crate::state::AppState;
use edgemesh_state::NodeState;
use edgemesh_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::watch;

/// Maximum UDP payload the broadcaster will send before downgrading to a
/// `merkle_only` digest.
const MAX_PACKET_BYTES: usize = 60_000;

/// Monotonic counters and last-seen markers describing gossip activity.
/// Cloned out to callers as a point-in-time snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GossipStats {
    pub sent: u64,
    pub received: u64,
    pub merged: u64,
    pub errors: u64,
    pub sent_bytes: u64,
    pub received_bytes: u64,
    pub broadcast_cycles: u64,
    pub state_sync_sent: u64,
    pub merkle_only_sent: u64,
    pub merkle_mismatches: u64,
    pub merge_time_ms_total: f64,
    pub last_merge_ms: f64,
    pub last_message_type: Option<String>,
    pub last_message_at: Option<String>,
    pub last_successful_merge_at: Option<String>,
}

impl GossipStats {
    /// Average merge latency over all successful merges so far.
    #[must_use]
    pub fn avg_merge_ms(&self) -> f64 {
        if self.merged == 0 {
            0.0
        } else {
            self.merge_time_ms_total / self.merged as f64
        }
    }
}

/// Minimal view of an inbound gossip envelope: enough to route on `type`
/// without committing to either message shape up front.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    sender: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    state: Option<serde_json::Value>,
    #[serde(default)]
    merkle_root: Option<String>,
    #[serde(default)]
    event_count: Option<u64>,
}

fn parse_peer(peer: &str) -> Option<(String, u16)> {
    let (host, port) = peer.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    Some((host.to_string(), port))
}

/// Handle used to stop a running gossip engine.
#[derive(Clone)]
pub struct GossipHandle {
    stop_tx: watch::Sender<bool>,
}

impl GossipHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Binds the gossip UDP socket and spawns the broadcaster and receiver
/// tasks. Returns a handle to stop both and a join handle that resolves
/// once they have drained.
pub async fn spawn(app: Arc<AppState>) -> anyhow::Result<(GossipHandle, tokio::task::JoinHandle<()>)> {
    let socket = UdpSocket::bind(("0.0.0.0", app.config.gossip_port)).await?;
    let socket = Arc::new(socket);
    let (stop_tx, stop_rx) = watch::channel(false);

    tracing::info!(
        port = app.config.gossip_port,
        peers = ?app.config.peers(),
        "gossip engine started"
    );

    let broadcaster = tokio::spawn(broadcast_loop(app.clone(), socket.clone(), stop_rx.clone()));
    let receiver = tokio::spawn(receive_loop(app.clone(), socket.clone(), stop_rx.clone()));

    let joined = tokio::spawn(async move {
        let _ = broadcaster.await;
        let _ = receiver.await;
    });

    Ok((GossipHandle { stop_tx }, joined))
}

async fn broadcast_loop(app: Arc<AppState>, socket: Arc<UdpSocket>, mut stop_rx: watch::Receiver<bool>) {
    let interval = Duration::from_secs_f64(app.config.gossip_interval.max(0.0));
    loop {
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = stop_rx.changed() => {}
        }
        if *stop_rx.borrow() {
            break;
        }
        run_broadcast_cycle(&app, &socket).await;
    }
}

async fn run_broadcast_cycle(app: &Arc<AppState>, socket: &UdpSocket) {
    let (message_type, payload) = {
        let state = app.state.lock().unwrap();
        build_broadcast_payload(&app.node_id, &state)
    };

    {
        let mut stats = app.gossip_stats.lock().unwrap();
        stats.broadcast_cycles += 1;
    }

    for peer in app.config.peers() {
        let Some((host, port)) = parse_peer(&peer) else {
            tracing::warn!(peer, "skipping malformed peer address");
            continue;
        };
        match socket.send_to(&payload, (host.as_str(), port)).await {
            Ok(_) => {
                let mut stats = app.gossip_stats.lock().unwrap();
                stats.sent += 1;
                stats.sent_bytes += payload.len() as u64;
                if message_type == "state_sync" {
                    stats.state_sync_sent += 1;
                } else {
                    stats.merkle_only_sent += 1;
                }
            }
            Err(e) => {
                tracing::debug!(peer, error = %e, "gossip send failed");
                let mut stats = app.gossip_stats.lock().unwrap();
                stats.errors += 1;
            }
        }
    }
}

fn build_broadcast_payload(node_id: &edgemesh_types::NodeId, state: &NodeState) -> (&'static str, Vec<u8>) {
    let state_summary = state.state_summary();
    let full = serde_json::json!({
        "type": "state_sync",
        "reason": "periodic_sync",
        "sender": node_id.as_str(),
        "state": state.serialize(),
        "state_summary": state_summary,
    });
    let bytes = serde_json::to_vec(&full).expect("gossip envelope always serializes");

    if bytes.len() <= MAX_PACKET_BYTES {
        return ("state_sync", bytes);
    }

    let digest = serde_json::json!({
        "type": "merkle_only",
        "reason": "state_too_large_for_udp",
        "sender": node_id.as_str(),
        "merkle_root": state.fingerprint(),
        "event_count": state.event_count(None),
        "state_summary": state_summary,
    });
    (
        "merkle_only",
        serde_json::to_vec(&digest).expect("digest envelope always serializes"),
    )
}

async fn receive_loop(app: Arc<AppState>, socket: Arc<UdpSocket>, mut stop_rx: watch::Receiver<bool>) {
    let mut buf = vec![0u8; MAX_PACKET_BYTES + 1024];
    loop {
        if *stop_rx.borrow() {
            break;
        }

        let received = tokio::select! {
            result = tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buf)) => result,
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() { break; }
                continue;
            }
        };

        let Ok(result) = received else {
            continue; // 1-second timeout elapsed; loop back and recheck stop flag
        };

        match result {
            Ok((len, addr)) => handle_datagram(&app, &buf[..len], addr),
            Err(e) => {
                tracing::debug!(error = %e, "gossip recv error");
                let mut stats = app.gossip_stats.lock().unwrap();
                stats.errors += 1;
            }
        }
    }
}

fn handle_datagram(app: &Arc<AppState>, data: &[u8], addr: SocketAddr) {
    {
        let mut stats = app.gossip_stats.lock().unwrap();
        stats.received += 1;
        stats.received_bytes += data.len() as u64;
    }

    let envelope: Envelope = match serde_json::from_slice(data) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(%addr, error = %e, "malformed gossip datagram");
            let mut stats = app.gossip_stats.lock().unwrap();
            stats.errors += 1;
            return;
        }
    };

    {
        let mut stats = app.gossip_stats.lock().unwrap();
        stats.last_message_type = Some(envelope.kind.clone());
        stats.last_message_at = Some(Timestamp::now().to_iso8601());
    }

    if envelope.sender == app.node_id.as_str() {
        return;
    }

    match envelope.kind.as_str() {
        "state_sync" => handle_state_sync(app, envelope),
        "merkle_only" => handle_merkle_only(app, envelope),
        other => {
            tracing::debug!(kind = other, "unrecognized gossip message type");
        }
    }
}

fn handle_state_sync(app: &Arc<AppState>, envelope: Envelope) {
    let Some(state_value) = envelope.state else {
        let mut stats = app.gossip_stats.lock().unwrap();
        stats.errors += 1;
        return;
    };

    let incoming = match NodeState::deserialize(state_value) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(sender = %envelope.sender, error = %e, "state_sync decode failed");
            let mut stats = app.gossip_stats.lock().unwrap();
            stats.errors += 1;
            return;
        }
    };

    let started = Instant::now();
    let (old_root, new_root) = {
        let mut state = app.state.lock().unwrap();
        let old_root = state.fingerprint();
        state.merge(&incoming);
        let new_root = state.fingerprint();
        (old_root, new_root)
    };
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let mut stats = app.gossip_stats.lock().unwrap();
    stats.last_merge_ms = elapsed_ms;
    stats.merge_time_ms_total += elapsed_ms;

    if old_root != new_root {
        stats.merged += 1;
        stats.last_successful_merge_at = Some(Timestamp::now().to_iso8601());
        tracing::info!(
            from_node = %envelope.sender,
            reason = envelope.reason.as_deref().unwrap_or("unknown"),
            old_root = &old_root[..12.min(old_root.len())],
            new_root = &new_root[..12.min(new_root.len())],
            "gossip merged"
        );
    }
}

fn handle_merkle_only(app: &Arc<AppState>, envelope: Envelope) {
    let Some(remote_root) = envelope.merkle_root else {
        let mut stats = app.gossip_stats.lock().unwrap();
        stats.errors += 1;
        return;
    };

    let local_root = app.state.lock().unwrap().fingerprint();
    if remote_root != local_root {
        let mut stats = app.gossip_stats.lock().unwrap();
        stats.merkle_mismatches += 1;
        tracing::info!(
            from_node = %envelope.sender,
            reason = envelope.reason.as_deref().unwrap_or("unknown"),
            ours = &local_root[..12.min(local_root.len())],
            theirs = &remote_root[..12.min(remote_root.len())],
            their_event_count = envelope.event_count,
            "merkle mismatch"
        );
    }
}
