//! Change notification for cache observers.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Fans a "something changed" signal out to every subscriber.
///
/// Observers only learn that the cache changed; they re-query
/// [`crate::FrameCache::frames`] or [`crate::FrameCache::ranges`] for details.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    subscribers: Vec<Sender<bool>>,
    sent: u64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn subscribe(&mut self) -> Receiver<bool> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Signal every live subscriber once. Dropped receivers are pruned.
    pub fn notify(&mut self) {
        self.subscribers.retain(|tx| tx.send(true).is_ok());
        self.sent += 1;
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total notifications emitted.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_reaches_all_subscribers() {
        let mut notifier = ChangeNotifier::new();
        let a = notifier.subscribe();
        let b = notifier.subscribe();
        notifier.notify();
        assert_eq!(a.try_recv(), Ok(true));
        assert_eq!(b.try_recv(), Ok(true));
        assert!(a.try_recv().is_err());
        assert_eq!(notifier.sent(), 1);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut notifier = ChangeNotifier::new();
        let keep = notifier.subscribe();
        drop(notifier.subscribe());
        notifier.notify();
        assert_eq!(notifier.subscriber_count(), 1);
        assert_eq!(keep.len(), 1);
    }
}
