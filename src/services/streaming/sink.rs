//! Ordered producer→consumer hand-off for one generation round
//!
//! The producer side is blocking (it lives on the engine thread), the
//! consumer side is async. At most one fragment is in flight: `put` returns
//! only once the previous fragment has been taken by the consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One-shot cooperative cancellation flag shared by both sides of a round.
#[derive(Debug, Clone, Default)]
pub struct AbortSwitch(Arc<AtomicBool>);

impl AbortSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the switch. Returns `true` only for the call that flipped it.
    pub fn trigger(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a producer-side `put`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The sink was ended or the consumer is gone
    EndOfStream,
    /// The abort switch is set; the fragment was dropped
    Aborted,
}

/// Outcome of a consumer-side read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Fragment(String),
    EndOfStream,
    Aborted,
}

pub fn token_sink(abort: AbortSwitch) -> (TokenWriter, TokenStream) {
    let (sender, receiver) = mpsc::channel(1);
    (
        TokenWriter {
            sender: Some(sender),
            abort: abort.clone(),
            delivered: 0,
        },
        TokenStream { receiver, abort },
    )
}

pub struct TokenWriter {
    sender: Option<mpsc::Sender<String>>,
    abort: AbortSwitch,
    delivered: usize,
}

impl TokenWriter {
    /// Hands one fragment to the consumer, blocking while the previous one
    /// is still pending. Must not be called from inside an async task.
    pub fn put(&mut self, fragment: impl Into<String>) -> Delivery {
        if self.abort.is_set() {
            self.end();
            return Delivery::Aborted;
        }
        let Some(sender) = self.sender.as_ref() else {
            return Delivery::EndOfStream;
        };

        let fragment = fragment.into();
        if fragment.is_empty() {
            return Delivery::Delivered;
        }

        match sender.blocking_send(fragment) {
            Ok(()) => {
                self.delivered += 1;
                Delivery::Delivered
            }
            Err(_) => {
                self.sender = None;
                if self.abort.is_set() {
                    Delivery::Aborted
                } else {
                    Delivery::EndOfStream
                }
            }
        }
    }

    /// Signals that no more fragments follow. Idempotent.
    pub fn end(&mut self) {
        self.sender.take();
    }

    pub fn is_open(&self) -> bool {
        self.sender.is_some()
    }

    /// Number of fragments accepted so far
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

pub struct TokenStream {
    receiver: mpsc::Receiver<String>,
    abort: AbortSwitch,
}

impl TokenStream {
    /// Next fragment, or how the stream finished.
    ///
    /// Once the abort switch is observed no further fragment is handed out,
    /// even if one is already buffered.
    pub async fn next_or_done(&mut self) -> StreamItem {
        if self.abort.is_set() {
            return StreamItem::Aborted;
        }
        match self.receiver.recv().await {
            Some(_) if self.abort.is_set() => StreamItem::Aborted,
            Some(fragment) => StreamItem::Fragment(fragment),
            None if self.abort.is_set() => StreamItem::Aborted,
            None => StreamItem::EndOfStream,
        }
    }

    /// Stops accepting fragments; a producer blocked in `put` is released.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_switch_is_one_shot() {
        let switch = AbortSwitch::new();
        assert!(!switch.is_set());
        assert!(switch.trigger());
        assert!(!switch.trigger());
        assert!(switch.is_set());
    }

    #[tokio::test]
    async fn test_fragments_arrive_in_order() {
        let (mut writer, mut stream) = token_sink(AbortSwitch::new());
        let producer = tokio::task::spawn_blocking(move || {
            for fragment in ["Hel", "lo", ", ", "world"] {
                assert_eq!(writer.put(fragment), Delivery::Delivered);
            }
            writer.end();
            writer.delivered()
        });

        let mut received = Vec::new();
        loop {
            match stream.next_or_done().await {
                StreamItem::Fragment(f) => received.push(f),
                StreamItem::EndOfStream => break,
                StreamItem::Aborted => panic!("stream was not aborted"),
            }
        }

        assert_eq!(received, vec!["Hel", "lo", ", ", "world"]);
        assert_eq!(producer.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_put_after_abort_is_refused() {
        let abort = AbortSwitch::new();
        let (mut writer, mut stream) = token_sink(abort.clone());
        abort.trigger();

        let delivery = tokio::task::spawn_blocking(move || {
            let first = writer.put("never seen");
            (first, writer.is_open())
        })
        .await
        .unwrap();

        assert_eq!(delivery, (Delivery::Aborted, false));
        assert_eq!(stream.next_or_done().await, StreamItem::Aborted);
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let (mut writer, mut stream) = token_sink(AbortSwitch::new());
        writer.end();
        writer.end();
        assert!(!writer.is_open());
        assert_eq!(stream.next_or_done().await, StreamItem::EndOfStream);
    }

    #[tokio::test]
    async fn test_closed_consumer_releases_producer() {
        let (mut writer, mut stream) = token_sink(AbortSwitch::new());
        stream.close();

        let delivery = tokio::task::spawn_blocking(move || writer.put("x"))
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::EndOfStream);
    }
}
