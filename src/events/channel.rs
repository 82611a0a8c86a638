//! Event channel implementation using crossbeam-channel.
//!
//! Lets the cache manager report what it did without knowing who, if
//! anyone, is listening.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Sending half handed to the cache manager.
///
/// Cheap to clone; every clone feeds the same receiver.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Send an event, discarding it if the receiver has gone away.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Receiving half held by a UI layer
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event arrives or every sender is dropped
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Next event if one is already queued
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Take every event queued so far without blocking
    pub fn drain(&self) -> Vec<Event> {
        self.inner.try_iter().collect()
    }
}

/// Constructor for connected sender/receiver pairs
pub struct EventChannel;

impl EventChannel {
    /// Create an unbounded channel; cache events are few and small.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender whose receiver is already gone.
///
/// Used as the default when nobody is interested in events.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::RecordId;
    use crate::events::CacheEvent;
    use std::thread;

    fn hit(id: i64) -> Event {
        Event::Cache(CacheEvent::Hit {
            id: RecordId(id),
            fingerprint: String::new(),
        })
    }

    #[test]
    fn events_can_be_sent_across_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(hit(5));
        });

        handle.join().unwrap();

        match receiver.recv().unwrap() {
            Event::Cache(CacheEvent::Hit { id, .. }) => assert_eq!(id, RecordId(5)),
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn null_sender_does_not_panic() {
        let sender = null_sender();
        sender.send(hit(1));
    }

    #[test]
    fn drain_returns_queued_events_in_order() {
        let (sender, receiver) = EventChannel::new();

        sender.send(hit(1));
        sender.clone().send(hit(2));

        let ids: Vec<RecordId> = receiver
            .drain()
            .into_iter()
            .map(|e| match e {
                Event::Cache(CacheEvent::Hit { id, .. }) => id,
                _ => panic!("Wrong event type"),
            })
            .collect();
        assert_eq!(ids, vec![RecordId(1), RecordId(2)]);
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn recv_ends_when_senders_drop() {
        let (sender, receiver) = EventChannel::new();
        drop(sender);
        assert!(receiver.recv().is_none());
    }
}
