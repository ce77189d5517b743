//! Abstract publish/subscribe transport and the in-process loopback.
//!
//! A transport may deliver inbound messages from any thread. It never touches
//! the scene: it pushes [`InboundMessage`]s into a [`MessageQueue`] through a
//! cloneable [`InboundSender`], and the UI thread drains the queue once per
//! frame before routing each message to its widget.

use crate::constants::MESSAGE_LOG_CAPACITY;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

/// Connection state shown in the status bar.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransportStatus {
    /// Not connected; publishes are dropped
    #[default]
    Disconnected,
    /// Connected and delivering
    Connected,
    /// The last connection attempt or publish failed
    Failed(String),
}

impl TransportStatus {
    /// Short text for the status indicator.
    pub fn label(&self) -> String {
        match self {
            TransportStatus::Disconnected => "Disconnected".to_string(),
            TransportStatus::Connected => "Connected".to_string(),
            TransportStatus::Failed(reason) => format!("Error: {reason}"),
        }
    }
}

/// A message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message arrived on
    pub topic: String,
    /// Payload text
    pub payload: String,
}

/// Minimal transport contract the editor depends on.
///
/// Publishing is fire-and-forget; delivery problems only show up through
/// [`Transport::status`].
pub trait Transport {
    /// Sends `payload` to `topic`.
    fn publish(&mut self, topic: &str, payload: &str);
    /// Starts receiving messages matching `pattern` (`+` and `#` wildcards).
    fn subscribe(&mut self, pattern: &str);
    /// Drops every subscription.
    fn unsubscribe_all(&mut self);
    /// Current connection state.
    fn status(&self) -> TransportStatus;
}

/// Thread-safe handle used by transports to enqueue inbound messages.
#[derive(Debug, Clone)]
pub struct InboundSender(Sender<InboundMessage>);

impl InboundSender {
    /// Queues a message for the UI thread.
    ///
    /// # Returns
    ///
    /// `false` if the queue has been dropped.
    pub fn deliver(&self, topic: &str, payload: &str) -> bool {
        self.0
            .send(InboundMessage {
                topic: topic.to_string(),
                payload: payload.to_string(),
            })
            .is_ok()
    }
}

/// Single-consumer queue of inbound messages, drained on the UI thread.
#[derive(Debug)]
pub struct MessageQueue {
    sender: Sender<InboundMessage>,
    receiver: Receiver<InboundMessage>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// A producer handle that can be moved to another thread.
    pub fn sender(&self) -> InboundSender {
        InboundSender(self.sender.clone())
    }

    /// Takes every message queued so far, oldest first.
    pub fn drain(&self) -> Vec<InboundMessage> {
        self.receiver.try_iter().collect()
    }
}

/// Matches a topic against an MQTT-style filter.
///
/// `+` matches exactly one level and `#` (last level only) matches any number
/// of remaining levels, including none.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return pattern_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// In-process transport that echoes publishes back to matching subscriptions.
///
/// Lets run mode be exercised without a broker: a switch bound to the same
/// topic as an LED drives the LED.
#[derive(Debug)]
pub struct LoopbackTransport {
    inbound: InboundSender,
    subscriptions: Vec<String>,
    status: TransportStatus,
    published: u64,
}

impl LoopbackTransport {
    /// Creates a disconnected loopback feeding `inbound`.
    pub fn new(inbound: InboundSender) -> Self {
        Self {
            inbound,
            subscriptions: Vec::new(),
            status: TransportStatus::Disconnected,
            published: 0,
        }
    }

    /// Marks the transport connected.
    pub fn connect(&mut self) {
        log::info!("loopback transport connected");
        self.status = TransportStatus::Connected;
    }

    /// Marks the transport disconnected and forgets subscriptions.
    pub fn disconnect(&mut self) {
        log::info!("loopback transport disconnected");
        self.subscriptions.clear();
        self.status = TransportStatus::Disconnected;
    }

    /// Active subscription patterns.
    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Number of messages accepted for publishing.
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl Transport for LoopbackTransport {
    fn publish(&mut self, topic: &str, payload: &str) {
        if self.status != TransportStatus::Connected {
            log::debug!("dropping publish to {topic}: not connected");
            return;
        }
        self.published += 1;
        if self
            .subscriptions
            .iter()
            .any(|pattern| topic_matches(pattern, topic))
            && !self.inbound.deliver(topic, payload)
        {
            self.status = TransportStatus::Failed("inbound queue closed".to_string());
        }
    }

    fn subscribe(&mut self, pattern: &str) {
        if pattern.is_empty() || self.subscriptions.iter().any(|p| p == pattern) {
            return;
        }
        log::debug!("subscribed to {pattern}");
        self.subscriptions.push(pattern.to_string());
    }

    fn unsubscribe_all(&mut self) {
        self.subscriptions.clear();
    }

    fn status(&self) -> TransportStatus {
        self.status.clone()
    }
}

/// Direction of a console entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Published by the dashboard
    Outbound,
    /// Received from the transport
    Inbound,
}

/// One line in the message console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Monotonic sequence number
    pub seq: u64,
    /// In or out
    pub direction: Direction,
    /// Topic
    pub topic: String,
    /// Payload text
    pub payload: String,
}

/// Bounded console history; the oldest lines fall off first.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(MESSAGE_LOG_CAPACITY)
    }
}

impl MessageLog {
    /// Creates an empty log holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            next_seq: 0,
        }
    }

    /// Appends a line.
    pub fn push(&mut self, direction: Direction, topic: &str, payload: &str) {
        self.next_seq += 1;
        self.entries.push_back(LogEntry {
            seq: self.next_seq,
            direction,
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Lines, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Number of stored lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_filters() {
        assert!(topic_matches("home/led/1", "home/led/1"));
        assert!(!topic_matches("home/led/1", "home/led/10"));
        assert!(!topic_matches("home/led", "home/led/1"));
        assert!(topic_matches("home/+/1", "home/led/1"));
        assert!(!topic_matches("home/+", "home/led/1"));
        assert!(topic_matches("home/#", "home/led/1"));
        assert!(topic_matches("home/#", "home"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(!topic_matches("home/#/x", "home/a/x"));
    }

    #[test]
    fn test_loopback_echoes_to_subscribers() {
        let queue = MessageQueue::new();
        let mut transport = LoopbackTransport::new(queue.sender());

        transport.subscribe("home/led/1");
        transport.publish("home/led/1", "on");
        assert!(queue.drain().is_empty(), "disconnected transport delivers nothing");

        transport.connect();
        transport.subscribe("home/led/1");
        assert_eq!(transport.subscriptions().len(), 1);
        transport.publish("home/led/1", "on");
        transport.publish("home/other", "x");

        let received = queue.drain();
        assert_eq!(
            received,
            vec![InboundMessage {
                topic: "home/led/1".to_string(),
                payload: "on".to_string()
            }]
        );
        assert_eq!(transport.published(), 2);
        assert_eq!(transport.status(), TransportStatus::Connected);
    }

    #[test]
    fn test_queue_accepts_messages_from_other_threads() {
        let queue = MessageQueue::new();
        let sender = queue.sender();
        std::thread::spawn(move || {
            sender.deliver("a", "1");
            sender.deliver("b", "2");
        })
        .join()
        .unwrap();
        let topics: Vec<String> = queue.drain().into_iter().map(|m| m.topic).collect();
        assert_eq!(topics, ["a", "b"]);
    }

    #[test]
    fn test_message_log_is_bounded() {
        let mut log = MessageLog::new(3);
        for i in 0..5 {
            log.push(Direction::Inbound, "t", &i.to_string());
        }
        let payloads: Vec<&str> = log.entries().map(|e| e.payload.as_str()).collect();
        assert_eq!(payloads, ["2", "3", "4"]);
        assert_eq!(log.entries().last().map(|e| e.seq), Some(5));
        log.clear();
        assert!(log.is_empty());
    }
}
