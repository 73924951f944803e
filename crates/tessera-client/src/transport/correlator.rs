//! Pending request table.
//!
//! Each outstanding request owns one entry holding a oneshot slot and its
//! deadline. The slot is filled at most once: by the matching response, or
//! never (the caller's own timeout discards the entry). Disconnects do not
//! touch the table.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

struct Pending {
    deadline: Instant,
    slot: oneshot::Sender<Value>,
}

#[derive(Default)]
pub(crate) struct Correlator {
    pending: Mutex<HashMap<u64, Pending>>,
}

impl Correlator {
    fn table(&self) -> MutexGuard<'_, HashMap<u64, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, request_id: u64, deadline: Instant) -> oneshot::Receiver<Value> {
        let (slot, rx) = oneshot::channel();
        self.table().insert(request_id, Pending { deadline, slot });
        rx
    }

    /// Fill the slot for `request_id`. Hands the body back when nothing is
    /// waiting for it.
    pub(crate) fn resolve(&self, request_id: u64, body: Value) -> Result<(), Value> {
        let entry = self.table().remove(&request_id);
        match entry {
            Some(pending) => {
                // A dropped receiver means the caller gave up; the response is consumed either way.
                let _ = pending.slot.send(body);
                Ok(())
            }
            None => Err(body),
        }
    }

    pub(crate) fn discard(&self, request_id: u64) -> bool {
        self.table().remove(&request_id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.table().len()
    }

    /// Drop entries whose caller can no longer be waiting: past the
    /// deadline, or with the receiving side gone.
    pub(crate) fn sweep_expired(&self, now: Instant) -> usize {
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, pending| pending.deadline > now && !pending.slot.is_closed());
        before.saturating_sub(table.len())
    }

    /// Drop every entry. Waiting callers observe a closed slot.
    pub(crate) fn clear(&self) {
        self.table().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn resolve_fills_the_slot_once() {
        let correlator = Correlator::default();
        let rx = correlator.register(1, Instant::now());
        assert!(correlator.resolve(1, json!({"ok": true})).is_ok());
        assert_eq!(rx.await.ok(), Some(json!({"ok": true})));
        assert_eq!(correlator.resolve(1, json!(null)), Err(json!(null)));
        assert_eq!(correlator.len(), 0);
    }

    #[test]
    fn unknown_ids_hand_the_body_back() {
        let correlator = Correlator::default();
        assert_eq!(correlator.resolve(42, json!("x")), Err(json!("x")));
    }

    #[test]
    fn discard_removes_entry() {
        let correlator = Correlator::default();
        let _rx = correlator.register(5, Instant::now());
        assert!(correlator.discard(5));
        assert!(!correlator.discard(5));
        assert_eq!(correlator.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_expired_and_abandoned() {
        let correlator = Correlator::default();
        let now = Instant::now();
        let _live = correlator.register(1, now + Duration::from_secs(5));
        let _expired = correlator.register(2, now);
        let abandoned = correlator.register(3, now + Duration::from_secs(5));
        drop(abandoned);
        assert_eq!(correlator.sweep_expired(now), 2);
        assert_eq!(correlator.len(), 1);
    }

    #[tokio::test]
    async fn clear_closes_waiting_slots() {
        let correlator = Correlator::default();
        let rx = correlator.register(9, Instant::now());
        correlator.clear();
        assert!(rx.await.is_err());
    }
}
