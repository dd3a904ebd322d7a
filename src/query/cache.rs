//! Keyed cache with staleness windows and request coalescing
//!
//! One slot per key. A slot is either a ready value with its fetch instant,
//! or a shared in-flight future that every concurrent caller of the same key
//! awaits, so identical requests collapse into a single network call.
//! Errors are never cached: a failed fetch leaves the slot empty and the
//! next caller retries.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::QueryKey;
use crate::api::ApiError;

/// Cached results are shared; so are the errors of a coalesced fetch.
pub type QueryResult<T> = Result<Arc<T>, Arc<ApiError>>;

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue, Arc<ApiError>>>>;

enum Slot {
    Ready { value: AnyValue, fetched_at: Instant },
    InFlight { id: u64, fetch: SharedFetch },
}

#[derive(Default)]
pub struct QueryCache {
    slots: DashMap<QueryKey, Slot>,
    next_fetch_id: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` if it is younger than `ttl`, join
    /// an in-flight fetch for the same key, or start `fetch` otherwise.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: QueryKey,
        ttl: Duration,
        fetch: F,
    ) -> QueryResult<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (fetch_id, shared) = match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => match occupied.get() {
                Slot::Ready { value, fetched_at } if fetched_at.elapsed() < ttl => {
                    return downcast::<T>(&key, value.clone());
                }
                Slot::InFlight { id, fetch } => (*id, fetch.clone()),
                Slot::Ready { .. } => {
                    let (id, shared) = self.start_fetch(fetch());
                    occupied.insert(Slot::InFlight {
                        id,
                        fetch: shared.clone(),
                    });
                    (id, shared)
                }
            },
            Entry::Vacant(vacant) => {
                let (id, shared) = self.start_fetch(fetch());
                vacant.insert(Slot::InFlight {
                    id,
                    fetch: shared.clone(),
                });
                (id, shared)
            }
        };

        match shared.await {
            Ok(value) => {
                self.settle_ok(&key, fetch_id, value.clone());
                downcast::<T>(&key, value)
            }
            Err(err) => {
                self.settle_err(&key, fetch_id);
                Err(err)
            }
        }
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many
    /// entries were removed (in-flight fetches included; their result is
    /// discarded when they complete).
    pub fn invalidate_prefix(&self, prefix: &[&str]) -> usize {
        let matching: Vec<QueryKey> = self
            .slots
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        let mut removed = 0;
        for key in matching {
            if self.slots.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn start_fetch<T, Fut>(&self, fut: Fut) -> (u64, SharedFetch)
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let shared = async move {
            fut.await
                .map(|value| Arc::new(value) as AnyValue)
                .map_err(Arc::new)
        }
        .boxed()
        .shared();
        (id, shared)
    }

    // Promote only our own in-flight fetch: if the slot was invalidated or
    // replaced while we awaited, the result must not resurrect stale data.
    fn settle_ok(&self, key: &QueryKey, fetch_id: u64, value: AnyValue) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            if matches!(&*slot, Slot::InFlight { id, .. } if *id == fetch_id) {
                *slot = Slot::Ready {
                    value,
                    fetched_at: Instant::now(),
                };
            }
        }
    }

    fn settle_err(&self, key: &QueryKey, fetch_id: u64) {
        self.slots
            .remove_if(key, |_, slot| matches!(slot, Slot::InFlight { id, .. } if *id == fetch_id));
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: AnyValue) -> QueryResult<T> {
    value.downcast::<T>().map_err(|_| {
        Arc::new(ApiError::Decode(format!(
            "query cache holds a different type for key {key}"
        )))
    })
}
