//! The three-queue message pipeline: pending-send, awaiting-reply, and
//! incoming. Driven by the pipeline worker under the messages-mutex; never
//! locked while the session-mutex (state + mirror) is held.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::config::BandwidthThrottle;
use crate::message::Message;
use crate::transport::Transport;

/// A parsed frame pulled off the incoming queue, paired with the outbound
/// message it correlates to when it is a reply - the stored outbound
/// message's method, not anything carried on the reply itself, drives
/// dispatch.
pub enum Dispatched {
    Method { method: String, params: serde_json::Value },
    Reply {
        original_method: String,
        sent_timestamp_ms: i64,
        result: Option<serde_json::Value>,
        error: Option<protocol::RpcError>,
    },
    UnmatchedReply { id: u32 },
    Malformed(String),
}

#[derive(Default)]
struct Queues {
    pending_send: VecDeque<Message>,
    awaiting_reply: VecDeque<Message>,
    incoming: VecDeque<String>,
    /// Token bucket per throttled method: (last refill timestamp, tokens available).
    bandwidth_buckets: HashMap<String, (i64, f64)>,
}

pub struct MessagePipeline {
    queues: Mutex<Queues>,
}

impl MessagePipeline {
    pub fn new() -> Self {
        MessagePipeline { queues: Mutex::new(Queues::default()) }
    }

    pub fn enqueue_send(&self, message: Message) {
        self.queues.lock().unwrap().pending_send.push_back(message);
    }

    pub fn push_incoming_text(&self, text: String) {
        self.queues.lock().unwrap().incoming.push_back(text);
    }

    pub fn pending_send_len(&self) -> usize {
        self.queues.lock().unwrap().pending_send.len()
    }

    pub fn awaiting_reply_len(&self) -> usize {
        self.queues.lock().unwrap().awaiting_reply.len()
    }

    pub fn is_idle(&self) -> bool {
        let q = self.queues.lock().unwrap();
        q.pending_send.is_empty() && q.awaiting_reply.is_empty() && q.incoming.is_empty()
    }

    /// Inbound phase: drains up to `chunk` parsed frames, resolving replies
    /// against awaiting-reply.
    pub fn drain_inbound(&self, chunk: usize) -> Vec<Dispatched> {
        let mut q = self.queues.lock().unwrap();
        let mut out = Vec::new();
        for _ in 0..chunk {
            let Some(text) = q.incoming.pop_front() else { break };
            let frame: protocol::Frame = match serde_json::from_str(&text) {
                Ok(f) => f,
                Err(_) => {
                    out.push(Dispatched::Malformed(text));
                    continue;
                }
            };
            match frame {
                protocol::Frame::Method { method, params, .. } => out.push(Dispatched::Method { method, params }),
                protocol::Frame::Reply { id, result, error } => {
                    let position = q.awaiting_reply.iter().position(|m| m.id == id);
                    match position {
                        Some(idx) => {
                            let original = q.awaiting_reply.remove(idx).unwrap();
                            out.push(Dispatched::Reply {
                                original_method: original.method,
                                sent_timestamp_ms: original.timestamp_ms,
                                result,
                                error,
                            });
                        }
                        None => out.push(Dispatched::UnmatchedReply { id }),
                    }
                }
            }
        }
        out
    }

    /// Send phase: only runs while `transport` reports connected. Inserts
    /// non-discard messages into awaiting-reply *before* the wire write, so a
    /// reply can never race ahead of the insert.
    ///
    /// `throttles` is consulted best-effort, per method name, via a token
    /// bucket (capacity `max_bytes`, refill rate `bytes_per_sec`): a message
    /// whose category has insufficient tokens is left in pending-send for a
    /// later tick rather than blocking the whole phase. Untracked methods are
    /// never throttled.
    pub fn drain_send(&self, transport: &mut dyn Transport, chunk: usize, now_ms: i64, throttles: &HashMap<String, BandwidthThrottle>) {
        if !transport.state().is_connected() {
            return;
        }
        let mut q = self.queues.lock().unwrap();
        let mut held_back = Vec::new();
        for _ in 0..chunk {
            let Some(message) = q.pending_send.pop_front() else { break };
            let frame = message.to_frame();
            let text = match serde_json::to_string(&frame) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize outbound message");
                    continue;
                }
            };

            if let Some(throttle) = throttles.get(&message.method) {
                let bucket = q
                    .bandwidth_buckets
                    .entry(message.method.clone())
                    .or_insert((now_ms, throttle.max_bytes as f64));
                let elapsed_secs = (now_ms - bucket.0).max(0) as f64 / 1000.0;
                bucket.1 = (bucket.1 + elapsed_secs * throttle.bytes_per_sec as f64).min(throttle.max_bytes as f64);
                bucket.0 = now_ms;
                if text.len() as f64 > bucket.1 {
                    held_back.push(message);
                    continue;
                }
                bucket.1 -= text.len() as f64;
            }

            if !message.discard {
                q.awaiting_reply.push_back(message);
            }
            if let Err(e) = transport.send(&text) {
                tracing::warn!(error = %e, "send failed, will retry via awaiting-reply timeout");
            }
        }
        for message in held_back.into_iter().rev() {
            q.pending_send.push_front(message);
        }
    }

    /// Retry phase: scans up to `chunk` awaiting-reply entries; anything past
    /// `timeout_ms` either gets requeued with an incremented retry count or,
    /// past `max_retries`, is dropped with an error log.
    pub fn drain_retry(&self, now_ms: i64, timeout_ms: i64, max_retries: u32, chunk: usize) {
        let mut q = self.queues.lock().unwrap();
        let scan_len = q.awaiting_reply.len().min(chunk);
        let mut requeue = Vec::new();
        for _ in 0..scan_len {
            let Some(message) = q.awaiting_reply.pop_front() else { break };
            if now_ms - message.timestamp_ms <= timeout_ms {
                q.awaiting_reply.push_back(message);
                continue;
            }
            if message.retries < max_retries {
                let mut retried = message;
                retried.retries += 1;
                retried.timestamp_ms = now_ms;
                requeue.push(retried);
            } else {
                tracing::error!(id = message.id, method = %message.method, "message retries exhausted, dropping");
            }
        }
        for message in requeue {
            q.pending_send.push_back(message);
        }
    }
}

impl Default for MessagePipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FakeTransport, TransportState};

    fn no_throttles() -> HashMap<String, BandwidthThrottle> {
        HashMap::new()
    }

    #[test]
    fn send_then_reply_removes_from_awaiting_reply() {
        let pipeline = MessagePipeline::new();
        let mut transport = FakeTransport::new();
        transport.set_state(TransportState::Connected);

        pipeline.enqueue_send(Message::new(1, "getTime", serde_json::json!({}), false, 0));
        pipeline.drain_send(&mut transport, 10, 0, &no_throttles());
        assert_eq!(pipeline.awaiting_reply_len(), 1);

        pipeline.push_incoming_text(serde_json::to_string(&protocol::Frame::Reply {
            id: 1,
            result: Some(serde_json::json!({ "time": 5 })),
            error: None,
        }).unwrap());
        let dispatched = pipeline.drain_inbound(10);
        assert_eq!(pipeline.awaiting_reply_len(), 0);
        assert!(matches!(&dispatched[..], [Dispatched::Reply { original_method, .. }] if original_method == "getTime"));
    }

    #[test]
    fn discard_message_never_enters_awaiting_reply() {
        let pipeline = MessagePipeline::new();
        let mut transport = FakeTransport::new();
        transport.set_state(TransportState::Connected);
        pipeline.enqueue_send(Message::new(1, "ready", serde_json::json!({}), true, 0));
        pipeline.drain_send(&mut transport, 10, 0, &no_throttles());
        assert_eq!(pipeline.awaiting_reply_len(), 0);
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn send_phase_is_noop_when_disconnected() {
        let pipeline = MessagePipeline::new();
        let mut transport = FakeTransport::new();
        pipeline.enqueue_send(Message::new(1, "getTime", serde_json::json!({}), false, 0));
        pipeline.drain_send(&mut transport, 10, 0, &no_throttles());
        assert_eq!(pipeline.pending_send_len(), 1);
        assert_eq!(pipeline.awaiting_reply_len(), 0);
    }

    #[test]
    fn retry_requeues_until_max_then_drops() {
        let pipeline = MessagePipeline::new();
        let mut transport = FakeTransport::new();
        transport.set_state(TransportState::Connected);
        pipeline.enqueue_send(Message::new(1, "updateGroups", serde_json::json!({}), false, 0));
        pipeline.drain_send(&mut transport, 10, 0, &no_throttles());

        // Expire it 10 times (max_retries = 10): each round it moves back to
        // pending-send and must be resent before it can expire again.
        let mut now = 11_000;
        for _ in 0..10 {
            pipeline.drain_retry(now, 10_000, 10, 10);
            pipeline.drain_send(&mut transport, 10, now, &no_throttles());
            now += 11_000;
        }
        assert_eq!(pipeline.awaiting_reply_len(), 1);
        pipeline.drain_retry(now, 10_000, 10, 10);
        assert_eq!(pipeline.awaiting_reply_len(), 0);
        assert_eq!(pipeline.pending_send_len(), 0);
    }

    #[test]
    fn throttled_method_holds_back_once_bucket_is_spent() {
        let pipeline = MessagePipeline::new();
        let mut transport = FakeTransport::new();
        transport.set_state(TransportState::Connected);
        // Each updateControls frame below serializes to 78 bytes; a 100-byte
        // bucket lets the first one through but not a second in the same tick.
        let mut throttles = HashMap::new();
        throttles.insert("updateControls".to_string(), BandwidthThrottle { max_bytes: 100, bytes_per_sec: 100 });

        pipeline.enqueue_send(Message::new(1, "updateControls", serde_json::json!({}), false, 0));
        pipeline.enqueue_send(Message::new(2, "updateControls", serde_json::json!({}), false, 0));
        pipeline.drain_send(&mut transport, 10, 0, &throttles);

        assert_eq!(pipeline.pending_send_len(), 1);
        assert_eq!(transport.sent.len(), 1);

        // A second later the bucket has refilled enough to let the second one through.
        pipeline.drain_send(&mut transport, 10, 1_000, &throttles);
        assert_eq!(pipeline.pending_send_len(), 0);
        assert_eq!(transport.sent.len(), 2);
    }
}
