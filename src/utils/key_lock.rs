use futures::lock::{Mutex, OwnedMutexGuard};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};

/// Registry of async mutexes keyed by string, e.g. `attendance:12:2024-06-10`
/// or `approval:7`.
///
/// Entries are weak: once the last guard for a key is dropped the mutex is
/// freed and the slot is swept on the next acquire.
#[derive(Default)]
pub struct KeyLocks {
    slots: StdMutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(existing) = slots.get(key).and_then(Weak::upgrade) {
            return existing;
        }

        slots.retain(|_, weak| weak.strong_count() > 0);
        let fresh = Arc::new(Mutex::new(()));
        slots.insert(key.to_string(), Arc::downgrade(&fresh));
        fresh
    }

    /// Waits until no one else holds `key`.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        self.slot(key).lock_owned().await
    }

    pub fn attendance_key(employee_id: u64, date: chrono::NaiveDate) -> String {
        format!("attendance:{employee_id}:{date}")
    }

    pub fn approval_key(approval_id: u64) -> String {
        format!("approval:{approval_id}")
    }

    #[cfg(test)]
    fn live_keys(&self) -> usize {
        self.slots
            .lock()
            .map(|s| s.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[actix_web::test]
    async fn same_key_waits_other_key_does_not() {
        let locks = KeyLocks::new();
        let held = locks.acquire("approval:1").await;

        assert!(locks.acquire("approval:1").now_or_never().is_none());
        assert!(locks.acquire("approval:2").now_or_never().is_some());

        drop(held);
        assert!(locks.acquire("approval:1").now_or_never().is_some());
    }

    #[actix_web::test]
    async fn released_keys_are_dropped() {
        let locks = KeyLocks::new();
        {
            let _a = locks.acquire("attendance:1:2024-06-10").await;
            assert_eq!(locks.live_keys(), 1);
        }
        assert_eq!(locks.live_keys(), 0);
    }

    #[test]
    fn key_formats() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert_eq!(KeyLocks::attendance_key(12, date), "attendance:12:2024-06-10");
        assert_eq!(KeyLocks::approval_key(7), "approval:7");
    }
}
