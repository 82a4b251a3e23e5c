//! Single-flight memoization of link discovery.
//!
//! The root resource and every resource group are fetched at most once per
//! connection. Concurrent callers asking for the same key wait on the one
//! in-flight attempt and all receive its outcome, success or failure. A
//! failed attempt, or one whose leader gives up, leaves the key empty so the
//! next caller starts afresh.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::errors::{Error, Result};
use crate::model::{ResourceGroup, RootEntity};
use crate::seq_log;

/// Link-name suffix the root uses for resource groups.
pub const GROUP_LINK_SUFFIX: &str = "Resources";

/// Outcome of one attempt as seen by its followers; `None` while in flight.
type Outcome<T> = Option<std::result::Result<Arc<T>, Arc<Error>>>;

enum Slot<T> {
    Ready(Arc<T>),
    Pending {
        attempt: u64,
        outcome: watch::Receiver<Outcome<T>>,
    },
}

enum Join<T> {
    Ready(Arc<T>),
    Lead {
        attempt: u64,
        outcome: watch::Sender<Outcome<T>>,
    },
    Follow(watch::Receiver<Outcome<T>>),
}

/// Keyed single-flight cell: one attempt per key at a time, successes kept.
pub(crate) struct SingleFlight<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
    next_attempt: AtomicU64,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_attempt: AtomicU64::new(0),
        }
    }
}

impl<T> fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("keys", &self.slots().len())
            .finish_non_exhaustive()
    }
}

impl<T> SingleFlight<T> {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The value for `key`: cached, shared with the attempt in flight, or
    /// fetched with `fetch` when this caller is the first to ask.
    pub(crate) async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (attempt, sender) = loop {
            match self.join(key) {
                Join::Ready(value) => return Ok(value),
                Join::Lead { attempt, outcome } => break (attempt, outcome),
                Join::Follow(mut outcome) => {
                    let shared = match outcome.wait_for(Option::is_some).await {
                        Ok(seen) => (*seen).clone(),
                        // The leader gave up before finishing; try again.
                        Err(_abandoned) => continue,
                    };
                    match shared {
                        Some(Ok(value)) => return Ok(value),
                        Some(Err(error)) => return Err(Error::Shared(error)),
                        None => continue,
                    }
                }
            }
        };

        let mut pending = PendingAttempt {
            flight: self,
            key,
            attempt,
            armed: true,
        };
        let fetched = fetch().await.map(Arc::new);
        pending.armed = false;

        // Settle the slot first; afterwards only waiting followers still
        // hold a receiver for this attempt.
        {
            let mut slots = self.slots();
            match &fetched {
                Ok(value) => {
                    slots.insert(key.to_string(), Slot::Ready(Arc::clone(value)));
                }
                Err(_) => remove_attempt(&mut slots, key, attempt),
            }
        }

        match fetched {
            Ok(value) => {
                sender.send_replace(Some(Ok(Arc::clone(&value))));
                Ok(value)
            }
            Err(error) if sender.receiver_count() == 0 => Err(error),
            Err(error) => {
                let error = Arc::new(error);
                sender.send_replace(Some(Err(Arc::clone(&error))));
                Err(Error::Shared(error))
            }
        }
    }

    /// Check-and-insert under the lock; the fetch itself runs outside it.
    fn join(&self, key: &str) -> Join<T> {
        let mut slots = self.slots();
        match slots.get(key) {
            Some(Slot::Ready(value)) => return Join::Ready(Arc::clone(value)),
            Some(Slot::Pending { outcome, .. }) => return Join::Follow(outcome.clone()),
            None => {}
        }

        let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(None);
        slots.insert(
            key.to_string(),
            Slot::Pending {
                attempt,
                outcome: receiver,
            },
        );
        Join::Lead {
            attempt,
            outcome: sender,
        }
    }

    /// Already-resolved value, without triggering a fetch.
    #[cfg(test)]
    pub(crate) fn cached(&self, key: &str) -> Option<Arc<T>> {
        match self.slots().get(key) {
            Some(Slot::Ready(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }
}

/// Drop the pending slot of `attempt`, leaving newer entries alone.
fn remove_attempt<T>(slots: &mut HashMap<String, Slot<T>>, key: &str, attempt: u64) {
    if matches!(slots.get(key), Some(Slot::Pending { attempt: current, .. }) if *current == attempt)
    {
        slots.remove(key);
    }
}

/// Clears the slot when the leader is dropped mid-fetch. Followers then see
/// the channel close and one of them leads the next attempt.
struct PendingAttempt<'a, T> {
    flight: &'a SingleFlight<T>,
    key: &'a str,
    attempt: u64,
    armed: bool,
}

impl<T> Drop for PendingAttempt<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            remove_attempt(&mut self.flight.slots(), self.key, self.attempt);
        }
    }
}

/// Per-connection cache of the root resource and resource groups.
#[derive(Debug, Default)]
pub(crate) struct GroupCache {
    root: SingleFlight<RootEntity>,
    groups: SingleFlight<ResourceGroup>,
}

impl GroupCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The root resource, fetching it with `fetch` unless resolved or in flight.
    pub(crate) async fn root<F, Fut>(&self, fetch: F) -> Result<Arc<RootEntity>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RootEntity>>,
    {
        self.root
            .get_or_fetch("", || async {
                seq_log!(debug, "Fetching the root resource");
                fetch().await
            })
            .await
    }

    /// The group `name`, fetching it with `fetch` unless resolved or in flight.
    ///
    /// Names are matched the way link names are: ignoring ASCII case.
    pub(crate) async fn group<F, Fut>(&self, name: &str, fetch: F) -> Result<Arc<ResourceGroup>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResourceGroup>>,
    {
        let key = name.to_ascii_lowercase();
        self.groups
            .get_or_fetch(&key, || async {
                seq_log!(debug, "Fetching resource group {}", name);
                fetch().await
            })
            .await
    }

    /// Already-resolved group, without triggering a fetch.
    #[cfg(test)]
    pub(crate) fn cached_group(&self, name: &str) -> Option<Arc<ResourceGroup>> {
        self.groups.cached(&name.to_ascii_lowercase())
    }
}

/// Name of the root link leading to group `name`.
pub fn group_link_name(name: &str) -> String {
    format!("{name}{GROUP_LINK_SUFFIX}")
}
