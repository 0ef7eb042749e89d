//! Coordination of backend requests.
//!
//! A [`RequestCoordinator`] collapses redundant calls to the backend in two ways:
//!
//! - [`dedupe_request`](RequestCoordinator::dedupe_request) shares one running computation
//!   between all concurrent callers of the same [`RequestKey`], and optionally serves successful
//!   results from a short-lived in-memory cache.
//! - [`dedupe_event`](RequestCoordinator::dedupe_event) fires a side-effecting action at most
//!   once per key within a time window, and drops all further attempts in that window.
//!
//! Computations are spawned onto the tokio runtime as soon as they are registered. They run to
//! completion even if every caller drops its handle, and only their settlement removes them from
//! the set of in-flight computations.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, Shared, TryFutureExt};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::utils::futures::CallOnDrop;

mod fetch_error;
mod key;


pub use fetch_error::{FetchError, FetchResult};
pub use key::RequestKey;

type ComputationChannel<T> = Shared<oneshot::Receiver<FetchResult<T>>>;

/// Controls whether [`RequestCoordinator::dedupe_request`] may serve and store cached values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// How long a successful result is served from the cache.
    pub ttl: Duration,
    /// Whether the cache is consulted and populated at all.
    pub cache: bool,
}

impl RequestOptions {
    /// Serves and stores results for `ttl`.
    pub fn cached(ttl: Duration) -> Self {
        Self { ttl, cache: true }
    }

    /// Only deduplicates concurrent calls.
    pub fn uncached() -> Self {
        Self::default()
    }

    /// The effective TTL, or `None` if caching is disabled.
    ///
    /// A zero TTL disables caching, since such an entry would never be fresh.
    fn cache_ttl(&self) -> Option<Duration> {
        if self.cache && !self.ttl.is_zero() {
            Some(self.ttl)
        } else {
            None
        }
    }
}

/// A successful result stored in the response cache.
#[derive(Clone, Debug)]
struct CacheEntry<T> {
    value: T,
    stored_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

struct CoordinatorState<T> {
    /// Successful results, overwritten on every fresh computation and never evicted.
    cache: HashMap<RequestKey, CacheEntry<T>>,
    /// Computations that have been started but have not settled yet.
    in_flight: HashMap<RequestKey, ComputationChannel<T>>,
    /// The last time an event was allowed to fire.
    last_fired: HashMap<RequestKey, Instant>,
}

impl<T> Default for CoordinatorState<T> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            in_flight: HashMap::new(),
            last_fired: HashMap::new(),
        }
    }
}

/// The sending half of a freshly registered computation.
struct Registration<T> {
    sender: oneshot::Sender<FetchResult<T>>,
    channel: ComputationChannel<T>,
    remove_computation_token: CallOnDrop,
}

/// Deduplicates and caches computations of `T` by [`RequestKey`].
///
/// Each coordinator owns its own maps, so separate instances never share state. Cloning a
/// coordinator yields a handle to the same state.
pub struct RequestCoordinator<T> {
    name: &'static str,
    computation_timeout: Option<Duration>,
    state: Arc<Mutex<CoordinatorState<T>>>,
}

impl<T> Clone for RequestCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            computation_timeout: self.computation_timeout,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for RequestCoordinator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("RequestCoordinator");
        debug
            .field("name", &self.name)
            .field("computation_timeout", &self.computation_timeout);
        if let Some(state) = self.state.try_lock() {
            debug
                .field("cached", &state.cache.len())
                .field("in_flight", &state.in_flight.len())
                .field("event_windows", &state.last_fired.len());
        }
        debug.finish()
    }
}

impl<T> RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty coordinator.
    ///
    /// `name` tags all metrics and logs of this instance. If `computation_timeout` is set, every
    /// computation that runs longer settles with [`FetchError::Timeout`].
    pub fn new(name: &'static str, computation_timeout: Option<Duration>) -> Self {
        Self {
            name,
            computation_timeout,
            state: Default::default(),
        }
    }

    /// Runs `producer` for `key`, unless its result can be shared.
    ///
    /// 1. If caching is enabled in `options` and a fresh cached value exists, it is returned
    ///    without invoking `producer`.
    /// 2. If a computation for `key` is in flight, the returned future joins it.
    /// 3. Otherwise `producer` is invoked and its future spawned. Once it settles, a successful
    ///    result is cached (if enabled) and the computation is removed from the in-flight set.
    ///
    /// Joined callers observe the very same result, including errors. No retries happen here.
    ///
    /// NOTE: This function itself is *not* `async`, because it eagerly spawns the computation,
    /// even if the returned future is never polled. It must be called within a tokio runtime.
    pub fn dedupe_request<F, Fut>(
        &self,
        key: RequestKey,
        producer: F,
        options: RequestOptions,
    ) -> BoxFuture<'static, FetchResult<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let cache_ttl = options.cache_ttl();

        let registration = {
            let mut state = self.state.lock();

            if let Some(ttl) = cache_ttl {
                let now = Instant::now();
                let cached = state
                    .cache
                    .get(&key)
                    .filter(|entry| entry.is_fresh(ttl, now))
                    .map(|entry| entry.value.clone());

                if let Some(value) = cached {
                    metric!(counter("coordinator.cache.hit") += 1, "coordinator" => self.name);
                    tracing::trace!(coordinator = self.name, %key, "Serving cached value");
                    return future::ready(Ok(value)).boxed();
                }
            }

            if let Some(channel) = state.in_flight.get(&key) {
                metric!(counter("coordinator.inflight.hit") += 1, "coordinator" => self.name);
                tracing::trace!(coordinator = self.name, %key, "Joining in-flight computation");
                return self.join(channel.clone());
            }

            metric!(counter("coordinator.inflight.miss") += 1, "coordinator" => self.name);
            self.register(&mut state, key.clone())
        };

        // The computation is registered, so the producer runs outside of the lock.
        let channel = registration.channel.clone();
        self.spawn_computation(key, producer(), registration, cache_ttl);
        self.join(channel)
    }

    /// Fires `producer` for `key` at most once per `window`.
    ///
    /// - If the event last fired less than `window` ago, this returns the still running
    ///   computation if there is one, and `None` otherwise. `None` means the event was dropped on
    ///   purpose and is not an error.
    /// - Otherwise the fire time is recorded *before* `producer` runs, and its future is spawned
    ///   and tracked as in flight until it settles. Its result is never cached.
    ///
    /// Because the fire time is recorded up front, a failing event still uses up its window.
    ///
    /// If the window has elapsed while an earlier computation for `key` is still running, that
    /// computation is joined instead of starting a second one, and the window is not renewed.
    pub fn dedupe_event<F, Fut>(
        &self,
        key: RequestKey,
        window: Duration,
        producer: F,
    ) -> Option<BoxFuture<'static, FetchResult<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let registration = {
            let mut state = self.state.lock();
            let now = Instant::now();

            let within_window = state
                .last_fired
                .get(&key)
                .is_some_and(|fired| now.saturating_duration_since(*fired) < window);
            let in_flight = state.in_flight.get(&key).cloned();

            match (within_window, in_flight) {
                (_, Some(channel)) => {
                    metric!(counter("coordinator.inflight.hit") += 1, "coordinator" => self.name);
                    tracing::trace!(coordinator = self.name, %key, "Joining in-flight event");
                    return Some(self.join(channel));
                }
                (true, None) => {
                    metric!(counter("coordinator.event.dropped") += 1, "coordinator" => self.name);
                    tracing::trace!(coordinator = self.name, %key, "Dropping duplicate event");
                    return None;
                }
                (false, None) => {}
            }

            state.last_fired.insert(key.clone(), now);
            self.register(&mut state, key.clone())
        };

        let channel = registration.channel.clone();
        self.spawn_computation(key, producer(), registration, None);
        Some(self.join(channel))
    }

    /// Returns `true` if a computation for `key` has been started and has not settled yet.
    pub fn is_in_flight(&self, key: &RequestKey) -> bool {
        self.state.lock().in_flight.contains_key(key)
    }

    /// Returns the cached value for `key` if it is younger than `ttl`.
    pub fn cached_value(&self, key: &RequestKey, ttl: Duration) -> Option<T> {
        let now = Instant::now();
        self.state
            .lock()
            .cache
            .get(key)
            .filter(|entry| entry.is_fresh(ttl, now))
            .map(|entry| entry.value.clone())
    }

    /// Creates a shareable channel for `key` and puts it into the in-flight map.
    ///
    /// The returned token removes the entry again once dropped, which happens when the
    /// computation settles, or when it is dropped without settling (e.g. due to a panic).
    fn register(&self, state: &mut CoordinatorState<T>, key: RequestKey) -> Registration<T> {
        let (sender, receiver) = oneshot::channel();
        let channel = receiver.shared();

        let remove_computation_token = {
            let state = Arc::clone(&self.state);
            let key = key.clone();
            CallOnDrop::new(move || {
                state.lock().in_flight.remove(&key);
            })
        };

        let evicted = state.in_flight.insert(key, channel.clone());
        debug_assert!(evicted.is_none());

        Registration {
            sender,
            channel,
            remove_computation_token,
        }
    }

    /// Spawns the computation for a registered key as a separate task.
    ///
    /// When the computation settles, a successful result is written to the cache *before* the
    /// in-flight entry is removed. Callers thus either find the cached value, or join a channel
    /// that is about to receive the result, but never start a redundant computation.
    fn spawn_computation<Fut>(
        &self,
        key: RequestKey,
        computation: Fut,
        registration: Registration<T>,
        cache_ttl: Option<Duration>,
    ) where
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let Registration {
            sender,
            remove_computation_token,
            ..
        } = registration;

        let name = self.name;
        let timeout = self.computation_timeout;
        let state = Arc::clone(&self.state);

        let task = async move {
            let result = match timeout {
                Some(timeout) => match tokio::time::timeout(timeout, computation).await {
                    Ok(result) => result,
                    Err(_) => {
                        metric!(counter("coordinator.timeout") += 1, "coordinator" => name);
                        tracing::warn!(coordinator = name, %key, "Computation timed out after {timeout:?}");
                        Err(FetchError::Timeout(timeout))
                    }
                },
                None => computation.await,
            };

            if let (Some(_), Ok(value)) = (cache_ttl, &result) {
                let entry = CacheEntry {
                    value: value.clone(),
                    stored_at: Instant::now(),
                };
                state.lock().cache.insert(key.clone(), entry);
            }

            if let Err(err) = &result {
                tracing::debug!(coordinator = name, %key, error = %err, "Computation failed");
            }

            // Drop the token first to evict from the map. This ensures that callers either
            // get a channel that will receive data, or they create a new channel.
            drop(remove_computation_token);
            sender.send(result).ok();
        };

        tokio::spawn(task);
    }

    fn join(&self, channel: ComputationChannel<T>) -> BoxFuture<'static, FetchResult<T>> {
        let name = self.name;
        channel
            .unwrap_or_else(move |_cancelled_error| {
                tracing::error!(coordinator = name, "Computation channel dropped");
                Err(FetchError::Canceled)
            })
            .boxed()
    }
}
