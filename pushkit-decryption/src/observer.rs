//! Fire-and-forget lifecycle events of the pipeline.
//!
//! The host may forward these to analytics. Sending never blocks and a
//! dropped receiver is ignored, so an observer cannot delay a notification.

use pushkit_lib::Account;
use tokio::sync::mpsc;

use crate::tags::SubProtocol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptionEvent {
    Decrypted {
        topic: String,
        protocol: SubProtocol,
        /// Subscription account, when the topic is a known subscription.
        account: Option<Account>,
    },
    KeyMissing {
        topic: String,
    },
    Failed {
        topic: String,
        reason: String,
    },
    Enriched {
        topic: String,
    },
}

/// Sending half of the observer channel.
#[derive(Debug, Clone)]
pub struct DecryptionObserver {
    sender: mpsc::UnboundedSender<DecryptionEvent>,
}

impl DecryptionObserver {
    /// Create an observer and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DecryptionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn notify(&self, event: DecryptionEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (observer, receiver) = DecryptionObserver::channel();
        drop(receiver);
        observer.notify(DecryptionEvent::KeyMissing { topic: "t".into() });
    }

    #[test]
    fn test_events_arrive_in_order() {
        let (observer, mut receiver) = DecryptionObserver::channel();
        observer.notify(DecryptionEvent::KeyMissing { topic: "a".into() });
        observer.notify(DecryptionEvent::Enriched { topic: "b".into() });
        assert_eq!(
            receiver.try_recv().unwrap(),
            DecryptionEvent::KeyMissing { topic: "a".into() }
        );
        assert_eq!(
            receiver.try_recv().unwrap(),
            DecryptionEvent::Enriched { topic: "b".into() }
        );
    }
}
