//! Identities and the short-lived identity cache.
//!
//! The auth cookie only carries an identity id. The full profile fetched from
//! the provider lives here for at most the retention window (plus one sweep
//! interval); a cookie whose identity is gone is rejected and the user logs in
//! again.

use crate::clock::{Clock, SystemClock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tracing::debug;
use uuid::Uuid;

/// How long an identity stays cached.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Pause between sweeps of the cache.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// An authenticated user's profile as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque unique identifier.
    pub id: Uuid,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Role strings granted by the provider.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Identity {
    /// A new identity without roles.
    pub fn new(id: Uuid, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            roles: BTreeSet::new(),
        }
    }

    /// Replace the role set.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// The part of the email after the first `@`, if there is one.
    pub fn email_domain(&self) -> Option<&str> {
        self.email.split_once('@').map(|(_, domain)| domain)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    identity: Identity,
    added_at: SystemTime,
}

#[derive(Debug)]
struct Inner {
    entries: DashMap<Uuid, CacheEntry>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    sweep_interval: Duration,
    sweeper_started: AtomicBool,
}

/// Process-wide cache of identities keyed by id.
///
/// Cloning is cheap and every clone shares the same entries. All access goes
/// through the map's shard locks; no lock is held across an await.
#[derive(Debug, Clone)]
pub struct IdentityCache {
    inner: Arc<Inner>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl IdentityCache {
    /// Empty cache with the default retention and sweep interval.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_retention(clock, DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL)
    }

    /// Empty cache with custom timings.
    pub fn with_retention(
        clock: Arc<dyn Clock>,
        retention: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                clock,
                retention,
                sweep_interval,
                sweeper_started: AtomicBool::new(false),
            }),
        }
    }

    /// The clock this cache ages entries with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Insert `identity` unless its id is already cached. An existing entry
    /// keeps its original insertion time and profile.
    ///
    /// Starts the background sweeper on first use.
    pub fn ensure(&self, identity: Identity) -> bool {
        self.start_sweeper();

        let mut inserted = false;
        let now = self.inner.clock.now();
        self.inner.entries.entry(identity.id).or_insert_with(|| {
            inserted = true;
            CacheEntry {
                identity,
                added_at: now,
            }
        });
        inserted
    }

    /// The cached identity for `id`.
    pub fn lookup(&self, id: &Uuid) -> Option<Identity> {
        self.inner.entries.get(id).map(|e| e.identity.clone())
    }

    /// Evict entries older than the retention window. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.inner.clock.now();
        let retention = self.inner.retention;
        let mut evicted = 0;

        self.inner.entries.retain(|_, entry| {
            let age = now.duration_since(entry.added_at).unwrap_or_default();
            let keep = age <= retention;
            if !keep {
                evicted += 1;
            }
            keep
        });

        debug!(evicted, remaining = self.inner.entries.len(), "identity cache swept");
        evicted
    }

    /// Number of cached identities.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// True once a sweeper task has been spawned for this cache.
    pub fn sweeper_running(&self) -> bool {
        self.inner.sweeper_started.load(Ordering::Acquire)
    }

    /// Spawn the periodic sweep on the current tokio runtime. Idempotent.
    ///
    /// Returns true only for the call that actually spawned the task. Outside
    /// a runtime nothing is spawned and a later call may try again. The task
    /// holds a weak reference and stops once every clone of the cache is dropped.
    #[cfg(feature = "sweeper")]
    pub fn start_sweeper(&self) -> bool {
        if self.inner.sweeper_started.swap(true, Ordering::AcqRel) {
            return false;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.inner.sweeper_started.store(false, Ordering::Release);
            debug!("no tokio runtime, identity cache sweeper deferred");
            return false;
        };

        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.sweep_interval;
        handle.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                IdentityCache { inner }.sweep();
            }
            debug!("identity cache dropped, sweeper exiting");
        });

        debug!(interval_secs = interval.as_secs(), "identity cache sweeper started");
        true
    }

    /// Without the `sweeper` feature the caller is responsible for calling [`sweep`](Self::sweep).
    #[cfg(not(feature = "sweeper"))]
    pub fn start_sweeper(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const MINUTE: Duration = Duration::from_secs(60);

    fn alice() -> Identity {
        Identity::new(Uuid::new_v4(), "Alice", "alice@example.com").with_roles(["admin"])
    }

    fn cache_with_clock() -> (IdentityCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        (IdentityCache::new(clock.clone()), clock)
    }

    #[test]
    fn ensure_then_lookup() {
        let (cache, _) = cache_with_clock();
        let user = alice();
        assert!(cache.ensure(user.clone()));
        assert_eq!(cache.lookup(&user.id), Some(user));
        assert_eq!(cache.lookup(&Uuid::new_v4()), None);
    }

    #[test]
    fn ensure_keeps_first_entry() {
        let (cache, clock) = cache_with_clock();
        let user = alice();
        cache.ensure(user.clone());

        clock.advance(50 * MINUTE);
        let mut renamed = user.clone();
        renamed.name = "Mallory".to_string();
        assert!(!cache.ensure(renamed));
        assert_eq!(cache.lookup(&user.id).map(|u| u.name), Some("Alice".to_string()));

        // The insertion time was not refreshed either.
        clock.advance(11 * MINUTE);
        assert_eq!(cache.sweep(), 1);
    }

    #[test]
    fn entry_survives_until_retention_passes() {
        let (cache, clock) = cache_with_clock();
        let user = alice();
        cache.ensure(user.clone());

        clock.advance(59 * MINUTE);
        assert_eq!(cache.sweep(), 0);
        assert!(cache.lookup(&user.id).is_some());

        clock.advance(2 * MINUTE);
        assert_eq!(cache.sweep(), 1);
        assert!(cache.lookup(&user.id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_only_evicts_old_entries() {
        let (cache, clock) = cache_with_clock();
        let old = alice();
        cache.ensure(old.clone());
        clock.advance(40 * MINUTE);
        let young = alice();
        cache.ensure(young.clone());
        clock.advance(21 * MINUTE);

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&young.id).is_some());
    }

    #[test]
    fn clones_share_entries() {
        let (cache, _) = cache_with_clock();
        let other = cache.clone();
        let user = alice();
        other.ensure(user.clone());
        assert!(cache.lookup(&user.id).is_some());
    }

    #[test]
    fn concurrent_ensure_and_sweep() {
        let (cache, _) = cache_with_clock();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cache.ensure(alice());
                        cache.sweep();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 800);
    }

    #[test]
    fn email_domain_needs_at_sign() {
        let user = Identity::new(Uuid::nil(), "n", "a@x.com");
        assert_eq!(user.email_domain(), Some("x.com"));
        let user = Identity::new(Uuid::nil(), "n", "nobody");
        assert_eq!(user.email_domain(), None);
    }

    #[test]
    fn identity_from_provider_json() {
        let json = r#"{"id":"6f1c1b5e-8a49-4c5e-9d1e-0e8f2b3c4d5a","email":"a@x.com","roles":["dev"]}"#;
        let user: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(user.email, "a@x.com");
        assert!(user.name.is_empty());
        assert!(user.roles.contains("dev"));
    }

    #[cfg(feature = "sweeper")]
    #[test]
    fn sweeper_needs_a_runtime() {
        let (cache, _) = cache_with_clock();
        assert!(!cache.start_sweeper());
        assert!(!cache.sweeper_running());
    }

    #[cfg(feature = "sweeper")]
    #[tokio::test(start_paused = true)]
    async fn sweeper_starts_once_and_evicts() {
        let (cache, clock) = cache_with_clock();
        let user = alice();
        cache.ensure(user.clone());
        assert!(cache.sweeper_running());
        assert!(!cache.start_sweeper());

        clock.advance(61 * MINUTE);
        tokio::time::sleep(DEFAULT_SWEEP_INTERVAL + Duration::from_secs(1)).await;

        assert!(cache.lookup(&user.id).is_none());
    }
}
