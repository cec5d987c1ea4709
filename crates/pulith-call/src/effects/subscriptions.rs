use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::effects::stream::Subscription;

/// Group of subscriptions torn down together.
///
/// Owners that start several calls (a screen, a job) add each subscription
/// here and cancel every in-flight call with one
/// [`unsubscribe_all`](Subscriptions::unsubscribe_all), or by dropping the group.
#[derive(Debug, Default)]
pub struct Subscriptions {
    entries: Mutex<Vec<Subscription>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscription: Subscription) {
        self.lock().push(subscription);
    }

    /// Unsubscribe `subscription` and stop tracking it.
    ///
    /// Returns `false` if it was not part of this group.
    pub fn remove(&self, subscription: &Subscription) -> bool {
        let removed = {
            let mut entries = self.lock();
            entries
                .iter()
                .position(|s| s.same_as(subscription))
                .map(|index| entries.swap_remove(index))
        };
        match removed {
            Some(s) => {
                s.unsubscribe();
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe_all(&self) {
        let entries = std::mem::take(&mut *self.lock());
        if !entries.is_empty() {
            tracing::debug!(count = entries.len(), "unsubscribing all");
        }
        for subscription in entries {
            subscription.unsubscribe();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}
