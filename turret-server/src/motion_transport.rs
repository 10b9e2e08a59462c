//! Motion Transport (C1): a WebSocket JSON-RPC client to the motion
//! controller. Follows the pending-table/one-shot-waiter idiom of
//! `original_source/Motion/Moonraker_ws.py`'s `MoonrakerWSClient`, adapted to
//! tokio tasks instead of a reader thread, and the reconnect backoff shape of
//! `mayara_core::connection::ConnectionManager`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_graceful_shutdown::SubsystemHandle;
use tokio_tungstenite::tungstenite::Message;

use turret_core::TransportError;

const RECONNECT_BACKOFF_MS: u64 = 3000;

type PendingTable = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, TransportError>>>>>;

/// Single-writer/multi-reader latch for the controller's
/// `notify_pattern_cycle_complete` notification (§4.8, §6): the reader task
/// marks it the moment the notification arrives; the engine drains it once
/// per tick via [`PatternCycleSignal::take`] to feed
/// `TickInput::pattern_cycle_complete`.
#[derive(Clone, Default)]
pub struct PatternCycleSignal(Arc<AtomicBool>);

impl PatternCycleSignal {
    fn new() -> Self {
        PatternCycleSignal(Arc::new(AtomicBool::new(false)))
    }

    fn mark(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Test-and-clear: true if a cycle completed since the last call.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}

/// A fire-and-forget write or a correlated call, sent to the writer task
/// over a channel so the public API stays `Send`/cheap to clone.
enum Outbound {
    Notify(Value),
    Call {
        request: Value,
        id: i64,
        reply: oneshot::Sender<Result<Value, TransportError>>,
    },
}

/// Handle to the motion controller's WebSocket JSON-RPC connection. Cheap to
/// clone; all clones share the same outbound channel and pending table.
#[derive(Clone)]
pub struct MotionTransport {
    next_id: Arc<AtomicI64>,
    outbound: mpsc::Sender<Outbound>,
    pending: PendingTable,
    pattern_cycle: PatternCycleSignal,
}

impl MotionTransport {
    /// Connect to `url` and spawn the writer/reader subsystem tasks under
    /// `subsystem`. Reconnects are rate-limited the way `ConnectionManager`
    /// computes backoff, rather than busy-looping on a dead socket.
    pub async fn connect(subsystem: &SubsystemHandle, url: String) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let pattern_cycle = PatternCycleSignal::new();

        let transport = MotionTransport {
            next_id: Arc::new(AtomicI64::new(1)),
            outbound: outbound_tx,
            pending: pending.clone(),
            pattern_cycle: pattern_cycle.clone(),
        };

        subsystem.start(tokio_graceful_shutdown::SubsystemBuilder::new(
            "MotionTransport",
            move |subsys| run_connection(subsys, url, outbound_rx, pending, pattern_cycle),
        ));

        transport
    }

    /// A clone of the shared latch the transport's reader task marks when
    /// the controller reports a completed deterrence-pattern cycle. The
    /// engine polls this once per tick (§4.8).
    pub fn pattern_cycle_signal(&self) -> PatternCycleSignal {
        self.pattern_cycle.clone()
    }

    /// Send a G-code script as a fire-and-forget `printer.gcode.script`
    /// notification. Never blocks on a response.
    pub async fn send_fire_and_forget(&self, script: impl Into<String>) -> Result<(), TransportError> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": "printer.gcode.script",
            "params": { "script": script.into() },
        });
        self.outbound
            .send(Outbound::Notify(request))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Issue a correlated JSON-RPC request and wait up to `timeout` for its
    /// matching response.
    pub async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let (reply_tx, reply_rx) = oneshot::channel();
        self.outbound
            .send(Outbound::Call {
                request,
                id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TransportError::Closed)?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(TransportError::Timeout {
                    id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

async fn run_connection(
    subsys: SubsystemHandle,
    url: String,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    pending: PendingTable,
    pattern_cycle: PatternCycleSignal,
) -> anyhow::Result<()> {
    loop {
        log::info!("connecting to motion controller at {url}");
        let socket = match tokio_tungstenite::connect_async(&url).await {
            Ok((socket, _response)) => socket,
            Err(e) => {
                log::warn!("motion transport connect failed: {e}");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(RECONNECT_BACKOFF_MS)) => continue,
                    _ = subsys.on_shutdown_requested() => return Ok(()),
                }
            }
        };
        log::info!("motion transport connected");

        let (mut write, mut read) = socket.split();

        loop {
            tokio::select! {
                biased;

                _ = subsys.on_shutdown_requested() => {
                    let _ = write.close().await;
                    fail_all_pending(&pending).await;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            dispatch_incoming(&text, &pending, &pattern_cycle).await;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            log::warn!("motion transport read error: {e}");
                            break;
                        }
                        None => {
                            log::warn!("motion transport connection closed by peer");
                            break;
                        }
                    }
                }

                out = outbound_rx.recv() => {
                    match out {
                        Some(Outbound::Notify(request)) => {
                            if let Err(e) = write.send(Message::Text(request.to_string().into())).await {
                                log::warn!("motion transport send failed: {e}");
                                break;
                            }
                        }
                        Some(Outbound::Call { request, id, reply }) => {
                            pending.lock().await.insert(id, reply);
                            if let Err(e) = write.send(Message::Text(request.to_string().into())).await {
                                log::warn!("motion transport send failed: {e}");
                                if let Some(reply) = pending.lock().await.remove(&id) {
                                    let _ = reply.send(Err(TransportError::Closed));
                                }
                                break;
                            }
                        }
                        None => {
                            let _ = write.close().await;
                            return Ok(());
                        }
                    }
                }
            }
        }

        fail_all_pending(&pending).await;
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(RECONNECT_BACKOFF_MS)) => {}
            _ = subsys.on_shutdown_requested() => return Ok(()),
        }
    }
}

async fn dispatch_incoming(text: &str, pending: &PendingTable, pattern_cycle: &PatternCycleSignal) {
    let Ok(msg) = serde_json::from_str::<Value>(text) else {
        return;
    };

    if let Some(id) = msg.get("id").and_then(Value::as_i64) {
        if let Some(reply) = pending.lock().await.remove(&id) {
            let result = if let Some(err) = msg.get("error") {
                Err(TransportError::Io(err.to_string()))
            } else {
                Ok(msg.get("result").cloned().unwrap_or(Value::Null))
            };
            let _ = reply.send(result);
        }
        return;
    }

    // Notification: the only one this contract needs to observe is the
    // controller reporting a completed deterrence-pattern cycle (§4.8);
    // everything else is logged and dropped.
    if let Some(method) = msg.get("method").and_then(Value::as_str) {
        if method == "notify_pattern_cycle_complete" {
            pattern_cycle.mark();
        } else {
            log::debug!("motion transport notification ignored: {text}");
        }
    }
}

async fn fail_all_pending(pending: &PendingTable) {
    let mut table = pending.lock().await;
    for (_, reply) in table.drain() {
        let _ = reply.send(Err(TransportError::Closed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_and_forget_payload_shape() {
        let request = json!({
            "jsonrpc": "2.0",
            "method": "printer.gcode.script",
            "params": { "script": "G90\nG0 X1 Y2 Z3 F6000" },
        });
        assert_eq!(request["method"], "printer.gcode.script");
        assert_eq!(request["params"]["script"], "G90\nG0 X1 Y2 Z3 F6000");
    }

    #[tokio::test]
    async fn pattern_cycle_notification_marks_the_signal() {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let signal = PatternCycleSignal::new();
        dispatch_incoming(
            r#"{"jsonrpc":"2.0","method":"notify_pattern_cycle_complete","params":[]}"#,
            &pending,
            &signal,
        )
        .await;
        assert!(signal.take());
        assert!(!signal.take(), "take() must clear the latch");
    }

    #[tokio::test]
    async fn unrelated_notifications_do_not_mark_the_signal() {
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let signal = PatternCycleSignal::new();
        dispatch_incoming(
            r#"{"jsonrpc":"2.0","method":"notify_status_update","params":{}}"#,
            &pending,
            &signal,
        )
        .await;
        assert!(!signal.take());
    }
}
