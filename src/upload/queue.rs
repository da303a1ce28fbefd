use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::models::RawEventPayload;

/// In-memory buffer of closed blocks waiting for upload.
///
/// Shared by the segmenter (producer) and the flusher (consumer). The flusher
/// takes a snapshot, delivers it, then removes exactly the snapshotted events
/// by id. Anything enqueued while a delivery is in flight stays queued for the
/// next cycle.
#[derive(Clone, Default)]
pub struct UploadQueue {
    inner: Arc<Mutex<Vec<RawEventPayload>>>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event under a freshly generated id, replacing any id the
    /// payload carried. Returns the id.
    ///
    /// Ids must be unique within the queue: `remove_delivered` drops every
    /// entry whose id was in the delivered snapshot.
    pub fn enqueue(&self, mut payload: RawEventPayload) -> String {
        let id = Uuid::new_v4().to_string();
        payload.event_id = Some(id.clone());
        self.lock().push(payload);
        id
    }

    /// Copy of everything currently queued, in enqueue order.
    pub fn snapshot(&self) -> Vec<RawEventPayload> {
        self.lock().clone()
    }

    /// Removes the given events (matched by id). Returns how many were removed.
    pub fn remove_delivered(&self, delivered: &[RawEventPayload]) -> usize {
        let ids: HashSet<&str> = delivered
            .iter()
            .filter_map(|payload| payload.event_id.as_deref())
            .collect();

        let mut guard = self.lock();
        let before = guard.len();
        guard.retain(|payload| {
            payload
                .event_id
                .as_deref()
                .map_or(true, |id| !ids.contains(id))
        });
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RawEventPayload>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(title: &str) -> RawEventPayload {
        RawEventPayload {
            user_id: Some(1),
            window_title: Some(title.into()),
            ..Default::default()
        }
    }

    #[test]
    fn enqueue_always_assigns_a_fresh_id() {
        let queue = UploadQueue::new();
        let first = queue.enqueue(payload("a"));
        let second = queue.enqueue(RawEventPayload {
            event_id: Some("fixed".into()),
            ..payload("b")
        });

        assert_ne!(first, second);
        assert_ne!(second, "fixed");
        let ids: Vec<_> = queue
            .snapshot()
            .into_iter()
            .filter_map(|p| p.event_id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn requeued_copy_of_an_in_flight_event_survives_delivery() {
        let queue = UploadQueue::new();
        queue.enqueue(payload("a"));
        let snapshot = queue.snapshot();

        // same payload, id included, queued again while the snapshot is in flight
        queue.enqueue(snapshot[0].clone());

        assert_eq!(queue.remove_delivered(&snapshot), 1);
        let left = queue.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].window_title.as_deref(), Some("a"));
        assert_ne!(left[0].event_id, snapshot[0].event_id);
    }

    #[test]
    fn removing_a_snapshot_keeps_later_arrivals() {
        let queue = UploadQueue::new();
        queue.enqueue(payload("a"));
        queue.enqueue(payload("b"));

        let snapshot = queue.snapshot();
        // arrives while the snapshot is "in flight"
        queue.enqueue(payload("c"));

        assert_eq!(queue.remove_delivered(&snapshot), 2);
        let left = queue.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].window_title.as_deref(), Some("c"));
    }

    #[test]
    fn removing_twice_is_harmless() {
        let queue = UploadQueue::new();
        queue.enqueue(payload("a"));
        let snapshot = queue.snapshot();

        assert_eq!(queue.remove_delivered(&snapshot), 1);
        assert_eq!(queue.remove_delivered(&snapshot), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn clones_share_the_same_buffer() {
        let producer = UploadQueue::new();
        let consumer = producer.clone();
        producer.enqueue(payload("a"));
        assert_eq!(consumer.len(), 1);
    }
}
