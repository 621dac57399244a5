use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;

use crate::events::{Event, ModelUnavailableStartEvent, OperationalEvent, UnavailableStartEvent};
use crate::{Credential, CredentialId, CredentialState, EventHub, UnavailableReason};

use super::model_unavailable_queue::ModelUnavailableQueue;
use super::unavailable_queue::UnavailableQueue;

type ModelStateKey = (CredentialId, String);
type ModelStateValue = (Instant, UnavailableReason);

#[derive(Debug, Clone)]
pub enum AcquireError {
    ProviderUnknown,
    NoActiveCredentials,
}

/// Per-credential exclusion entry backing the §4.3 FIFO lock. `tokio::sync::Mutex`
/// already queues waiters in arrival order, so this is a semaphore-of-one; `waiters`
/// tracks queue depth for the pool's selection tie-break (d).
struct CredentialLockEntry {
    mutex: Arc<Mutex<()>>,
    waiters: Arc<AtomicUsize>,
}

/// Held for the lifetime of one provider call (including streaming). Dropping it
/// hands the lock to the next FIFO waiter, if any.
pub struct CredentialLockGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Which of spec §4.2's three selection buckets a candidate falls into. The pool
/// prefers the first non-empty bucket, so the ordinal doubles as a sort key.
/// `Other` is never selected: in this pool's duration-based quarantine model it
/// means either "still within an active cooldown window" or "quarantined for a
/// reason that will not self-heal" (`AuthInvalid`/model-level `ModelDisallow`),
/// neither of which a retry can do anything useful with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SelectionBucket {
    Healthy = 0,
    RecoverableUnhealthy = 1,
    Other = 2,
}

fn bucket_for_state(state: Option<&CredentialState>) -> SelectionBucket {
    match state {
        None | Some(CredentialState::Active) => SelectionBucket::Healthy,
        Some(CredentialState::Unavailable { until, reason }) => {
            if *reason == UnavailableReason::AuthInvalid {
                SelectionBucket::Other
            } else if *until <= Instant::now() {
                // Cooldown has elapsed; the recovery sweep just hasn't flipped the
                // state back to `Active` yet. Treat it as usable, one rung below
                // credentials that never quarantined at all.
                SelectionBucket::RecoverableUnhealthy
            } else {
                SelectionBucket::Other
            }
        }
    }
}

fn bucket_for_model(model_block: Option<&(Instant, UnavailableReason)>) -> SelectionBucket {
    match model_block {
        None => SelectionBucket::Healthy,
        Some((until, reason)) => {
            if matches!(
                reason,
                UnavailableReason::AuthInvalid | UnavailableReason::ModelDisallow
            ) {
                SelectionBucket::Other
            } else if *until <= Instant::now() {
                SelectionBucket::RecoverableUnhealthy
            } else {
                SelectionBucket::Other
            }
        }
    }
}

fn bucket_for(
    state: Option<&CredentialState>,
    model_block: Option<&(Instant, UnavailableReason)>,
) -> SelectionBucket {
    bucket_for_state(state).max(bucket_for_model(model_block))
}

pub struct CredentialPool {
    creds: RwLock<HashMap<CredentialId, Credential>>,
    by_provider: RwLock<HashMap<String, Vec<CredentialId>>>,
    states: Arc<RwLock<HashMap<CredentialId, CredentialState>>>,
    model_states: Arc<RwLock<HashMap<ModelStateKey, ModelStateValue>>>,
    locks: RwLock<HashMap<CredentialId, CredentialLockEntry>>,
    last_used: RwLock<HashMap<CredentialId, Instant>>,
    use_count: RwLock<HashMap<CredentialId, u64>>,
    events: EventHub,
    queue: Arc<UnavailableQueue>,
    model_queue: Arc<ModelUnavailableQueue>,
}

impl CredentialPool {
    pub fn new(events: EventHub) -> Self {
        let states = Arc::new(RwLock::new(HashMap::new()));
        let model_states = Arc::new(RwLock::new(HashMap::new()));
        let queue = Arc::new(UnavailableQueue::new());
        let model_queue = Arc::new(ModelUnavailableQueue::new());
        queue
            .clone()
            .spawn_recover_task(states.clone(), events.clone());
        model_queue
            .clone()
            .spawn_recover_task(model_states.clone(), events.clone());
        Self {
            creds: RwLock::new(HashMap::new()),
            by_provider: RwLock::new(HashMap::new()),
            states,
            model_states,
            locks: RwLock::new(HashMap::new()),
            last_used: RwLock::new(HashMap::new()),
            use_count: RwLock::new(HashMap::new()),
            events,
            queue,
            model_queue,
        }
    }

    /// Acquires the per-credential FIFO lock (§4.3). Callers must hold the returned
    /// guard for the full lifetime of the provider call, including stream consumption,
    /// and release it on every path (success, error, or cancellation) by dropping it.
    pub async fn lock_credential(&self, id: CredentialId) -> CredentialLockGuard {
        let entry_mutex = {
            let guard = self.locks.read().await;
            guard.get(&id).map(|e| (e.mutex.clone(), e.waiters.clone()))
        };
        let (mutex, waiters) = match entry_mutex {
            Some(pair) => pair,
            None => {
                let mut guard = self.locks.write().await;
                let entry = guard.entry(id).or_insert_with(|| CredentialLockEntry {
                    mutex: Arc::new(Mutex::new(())),
                    waiters: Arc::new(AtomicUsize::new(0)),
                });
                (entry.mutex.clone(), entry.waiters.clone())
            }
        };

        waiters.fetch_add(1, Ordering::SeqCst);
        let guard = mutex.lock_owned().await;
        waiters.fetch_sub(1, Ordering::SeqCst);
        CredentialLockGuard { _guard: guard }
    }

    /// Current FIFO queue depth for a credential's lock (selection tie-break (d)).
    pub async fn waiters(&self, id: CredentialId) -> usize {
        let guard = self.locks.read().await;
        guard
            .get(&id)
            .map(|e| e.waiters.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub async fn insert(&self, provider: impl Into<String>, id: CredentialId, cred: Credential) {
        let provider = provider.into();
        self.creds.write().await.insert(id, cred);
        // Avoid duplicated IDs in the provider index; insert() can be called on enable toggles.
        let mut by_provider = self.by_provider.write().await;
        let ids = by_provider.entry(provider).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
        self.states
            .write()
            .await
            .entry(id)
            .or_insert(CredentialState::Active);
    }

    pub async fn update_credential(&self, id: CredentialId, cred: Credential) {
        self.creds.write().await.insert(id, cred);
    }

    pub async fn set_enabled(&self, provider: &str, id: CredentialId, enabled: bool) {
        if enabled {
            let mut by_provider = self.by_provider.write().await;
            let ids = by_provider.entry(provider.to_string()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
            drop(by_provider);

            // If the credential was never inserted before, keep state as Active.
            self.states
                .write()
                .await
                .entry(id)
                .or_insert(CredentialState::Active);
        } else {
            let mut by_provider = self.by_provider.write().await;
            if let Some(ids) = by_provider.get_mut(provider) {
                ids.retain(|x| *x != id);
            }
            let mut model_states = self.model_states.write().await;
            model_states.retain(|(cred_id, _), _| *cred_id != id);
        }
    }

    pub async fn acquire(
        &self,
        provider: &str,
    ) -> Result<(CredentialId, Credential), AcquireError> {
        let id = self.select_id(provider, None).await?;
        self.fetch_and_record(id).await
    }

    pub async fn acquire_for_model(
        &self,
        provider: &str,
        model: &str,
    ) -> Result<(CredentialId, Credential), AcquireError> {
        let id = self.select_id(provider, Some(model)).await?;
        self.fetch_and_record(id).await
    }

    /// Reports whether a subsequent `acquire`/`acquire_for_model` call would find a
    /// candidate right now, without mutating `lastUsedAt`/`useCount`. Used by the
    /// dispatch engine's fallback loop to decide whether to keep retrying after
    /// quarantining a failed credential.
    pub async fn has_candidate(&self, provider: &str, model: Option<&str>) -> bool {
        self.select_id(provider, model).await.is_ok()
    }

    async fn fetch_and_record(
        &self,
        id: CredentialId,
    ) -> Result<(CredentialId, Credential), AcquireError> {
        let cred = self
            .creds
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AcquireError::NoActiveCredentials)?;
        self.record_use(id).await;
        Ok((id, cred))
    }

    /// Implements the §4.2 `select` policy: partition into healthy /
    /// recoverable-unhealthy / other, prefer the first non-empty bucket, then within
    /// it sort lock-free-before-locked, ascending `lastUsedAt`, ascending `useCount`,
    /// ascending waiter-queue length, and return the head.
    async fn select_id(
        &self,
        provider: &str,
        model: Option<&str>,
    ) -> Result<CredentialId, AcquireError> {
        let ids = {
            let guard = self.by_provider.read().await;
            guard.get(provider).cloned()
        };
        let Some(ids) = ids else {
            return Err(AcquireError::ProviderUnknown);
        };
        if ids.is_empty() {
            return Err(AcquireError::NoActiveCredentials);
        }

        let states = self.states.read().await;
        let model_states = self.model_states.read().await;
        let last_used = self.last_used.read().await;
        let use_count = self.use_count.read().await;
        let locks = self.locks.read().await;

        let mut candidates: Vec<(SelectionBucket, bool, Option<Instant>, u64, usize, CredentialId)> =
            Vec::with_capacity(ids.len());
        for id in ids {
            let model_block = model.and_then(|m| model_states.get(&(id, m.to_string())));
            let bucket = bucket_for(states.get(&id), model_block);
            let lock_free = match locks.get(&id) {
                Some(entry) => entry.mutex.try_lock().is_ok(),
                None => true,
            };
            let waiters = locks
                .get(&id)
                .map(|e| e.waiters.load(Ordering::SeqCst))
                .unwrap_or(0);
            candidates.push((
                bucket,
                lock_free,
                last_used.get(&id).copied(),
                use_count.get(&id).copied().unwrap_or(0),
                waiters,
                id,
            ));
        }
        drop(locks);
        drop(use_count);
        drop(last_used);
        drop(model_states);
        drop(states);

        // `Other` candidates are either still inside an active quarantine window or
        // quarantined for a reason that will not self-heal; never select them.
        candidates.retain(|c| c.0 != SelectionBucket::Other);
        if candidates.is_empty() {
            return Err(AcquireError::NoActiveCredentials);
        }

        candidates.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(b.1.cmp(&a.1)) // lock_free (true) sorts before locked (false)
                .then(a.2.cmp(&b.2)) // ascending lastUsedAt; None (never used) first
                .then(a.3.cmp(&b.3)) // ascending useCount
                .then(a.4.cmp(&b.4)) // ascending waiter-queue length
        });

        match candidates.into_iter().next() {
            Some(c) => Ok(c.5),
            None => Err(AcquireError::NoActiveCredentials),
        }
    }

    /// Updates `lastUsedAt`/`useCount` for the selection tie-break (§4.2 b, c).
    async fn record_use(&self, id: CredentialId) {
        self.last_used.write().await.insert(id, Instant::now());
        *self.use_count.write().await.entry(id).or_insert(0) += 1;
    }

    pub async fn mark_unavailable(
        &self,
        credential_id: CredentialId,
        duration: Duration,
        reason: UnavailableReason,
    ) {
        let until_instant = Instant::now() + duration;
        {
            let mut guard = self.states.write().await;
            guard.insert(
                credential_id,
                CredentialState::Unavailable {
                    until: until_instant,
                    reason,
                },
            );
        }
        self.queue.push(until_instant, credential_id).await;

        let until_wall = SystemTime::now()
            .checked_add(duration)
            .unwrap_or_else(SystemTime::now);
        self.events
            .emit(Event::Operational(OperationalEvent::UnavailableStart(
                UnavailableStartEvent {
                    at: SystemTime::now(),
                    credential_id,
                    reason,
                    until: until_wall,
                },
            )))
            .await;
    }

    pub async fn mark_model_unavailable(
        &self,
        credential_id: CredentialId,
        model: impl Into<String>,
        duration: Duration,
        reason: UnavailableReason,
    ) {
        let model = model.into();
        let until_instant = Instant::now() + duration;
        {
            let mut guard = self.model_states.write().await;
            guard.insert((credential_id, model.clone()), (until_instant, reason));
        }
        self.model_queue
            .push(until_instant, credential_id, model.clone())
            .await;

        let until_wall = SystemTime::now()
            .checked_add(duration)
            .unwrap_or_else(SystemTime::now);
        self.events
            .emit(Event::Operational(OperationalEvent::ModelUnavailableStart(
                ModelUnavailableStartEvent {
                    at: SystemTime::now(),
                    credential_id,
                    model,
                    reason,
                    until: until_wall,
                },
            )))
            .await;
    }

    pub async fn state(&self, credential_id: CredentialId) -> Option<CredentialState> {
        self.states.read().await.get(&credential_id).cloned()
    }

    pub async fn model_states(
        &self,
        credential_id: CredentialId,
    ) -> Vec<(String, Instant, UnavailableReason)> {
        let now = Instant::now();
        let guard = self.model_states.read().await;
        let mut rows = Vec::new();
        for ((id, model), (until, reason)) in guard.iter() {
            if *id != credential_id {
                continue;
            }
            if *until <= now {
                continue;
            }
            rows.push((model.clone(), *until, *reason));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}
