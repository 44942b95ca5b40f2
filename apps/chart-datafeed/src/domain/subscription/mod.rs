//! Subscription Registry
//!
//! Tracks which symbol/resolution pairs the widget is currently viewing,
//! keyed by the widget-issued subscriber UID.
//!
//! # Design
//!
//! The registry holds:
//! - One record per subscriber UID; re-subscribing appends a listener
//! - A registry-issued [`SubscriptionId`] per record, increasing with
//!   insertion, used for iteration order and to tell a live record from a
//!   record that was removed and re-created under the same UID
//!
//! Poll cycles work on [`SubscriptionSnapshot`]s so the lock is never held
//! while a fetch is in flight.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::bars::{Bar, UnixSeconds};
use crate::domain::symbol::SymbolInfo;

// =============================================================================
// Types
// =============================================================================

/// Identifier the widget assigns to a subscription.
pub type SubscriberUid = String;

/// Registry-issued identity of a subscription record.
pub type SubscriptionId = u64;

/// Callback receiving real-time bars.
pub type RealtimeCallback = Arc<dyn Fn(&Bar) + Send + Sync>;

/// Callback asking the widget to drop its cached bars.
pub type ResetCacheCallback = Arc<dyn Fn() + Send + Sync>;

/// One active subscription.
pub struct Subscription {
    id: SubscriptionId,
    symbol_info: SymbolInfo,
    resolution: String,
    listeners: Vec<RealtimeCallback>,
    last_bar_time: Option<UnixSeconds>,
}

impl Subscription {
    /// Registry-issued identity.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Subscribed instrument.
    #[must_use]
    pub const fn symbol_info(&self) -> &SymbolInfo {
        &self.symbol_info
    }

    /// Subscribed resolution token.
    #[must_use]
    pub fn resolution(&self) -> &str {
        &self.resolution
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Time of the last bar pushed to listeners.
    #[must_use]
    pub const fn last_bar_time(&self) -> Option<UnixSeconds> {
        self.last_bar_time
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("ticker", &self.symbol_info.ticker)
            .field("resolution", &self.resolution)
            .field("listeners", &self.listeners.len())
            .field("last_bar_time", &self.last_bar_time)
            .finish()
    }
}

/// Point-in-time copy of what a poll needs from a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionSnapshot {
    /// Subscriber UID.
    pub uid: SubscriberUid,
    /// Record identity at snapshot time.
    pub id: SubscriptionId,
    /// Subscribed instrument.
    pub symbol_info: SymbolInfo,
    /// Subscribed resolution token.
    pub resolution: String,
}

// =============================================================================
// Registry State
// =============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    subscriptions: HashMap<SubscriberUid, Subscription>,
    next_id: SubscriptionId,
}

impl RegistryState {
    /// Insert a record or append to the existing one.
    ///
    /// Returns the record identity and whether it was newly created.
    fn add(
        &mut self,
        uid: SubscriberUid,
        symbol_info: SymbolInfo,
        resolution: String,
        listener: RealtimeCallback,
    ) -> (SubscriptionId, bool) {
        if let Some(existing) = self.subscriptions.get_mut(&uid) {
            existing.listeners.push(listener);
            return (existing.id, false);
        }

        let id = self.next_id;
        self.next_id += 1;

        self.subscriptions.insert(
            uid,
            Subscription {
                id,
                symbol_info,
                resolution,
                listeners: vec![listener],
                last_bar_time: None,
            },
        );

        (id, true)
    }

    fn is_current(&self, uid: &str, id: SubscriptionId) -> bool {
        self.subscriptions.get(uid).is_some_and(|s| s.id == id)
    }

    fn snapshot(&self) -> Vec<SubscriptionSnapshot> {
        let mut snapshots: Vec<_> = self
            .subscriptions
            .iter()
            .map(|(uid, sub)| SubscriptionSnapshot {
                uid: uid.clone(),
                id: sub.id,
                symbol_info: sub.symbol_info.clone(),
                resolution: sub.resolution.clone(),
            })
            .collect();

        snapshots.sort_by_key(|s| s.id);
        snapshots
    }
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe registry of active subscriptions.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use chart_datafeed::domain::subscription::SubscriptionRegistry;
/// use chart_datafeed::domain::symbol::SymbolInfo;
///
/// let registry = SubscriptionRegistry::new();
///
/// registry.subscribe("chart-1".to_string(), SymbolInfo::default(), "1".to_string(), Arc::new(|_| {}));
/// registry.subscribe("chart-1".to_string(), SymbolInfo::default(), "1".to_string(), Arc::new(|_| {}));
///
/// // Same UID: one record, two listeners
/// assert_eq!(registry.len(), 1);
/// assert_eq!(registry.listener_count("chart-1"), Some(2));
///
/// assert!(registry.unsubscribe("chart-1"));
/// assert!(!registry.unsubscribe("chart-1"));
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `uid`.
    ///
    /// An existing record keeps its symbol and resolution and gains the
    /// listener. Returns the identity of the record.
    pub fn subscribe(
        &self,
        uid: SubscriberUid,
        symbol_info: SymbolInfo,
        resolution: String,
        listener: RealtimeCallback,
    ) -> SubscriptionId {
        let (id, created) = self
            .state
            .write()
            .add(uid.clone(), symbol_info, resolution, listener);

        if created {
            tracing::debug!(uid = %uid, id, "Subscription created");
        } else {
            tracing::debug!(uid = %uid, id, "Listener appended to subscription");
        }

        id
    }

    /// Remove the record under `uid` with all of its listeners.
    ///
    /// Returns whether a record was removed.
    pub fn unsubscribe(&self, uid: &str) -> bool {
        let removed = self.state.write().subscriptions.remove(uid);
        if let Some(sub) = &removed {
            tracing::debug!(uid = %uid, id = sub.id, "Subscription removed");
        }
        removed.is_some()
    }

    /// Whether `id` is still the live record under `uid`.
    #[must_use]
    pub fn is_current(&self, uid: &str, id: SubscriptionId) -> bool {
        self.state.read().is_current(uid, id)
    }

    /// Snapshot every subscription in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SubscriptionSnapshot> {
        self.state.read().snapshot()
    }

    /// Push `bar` to every listener of the live record `id` under `uid`.
    ///
    /// Records the bar time on the subscription. Listeners run after the
    /// lock is released. Returns the number of listeners notified.
    pub fn dispatch(&self, uid: &str, id: SubscriptionId, bar: &Bar) -> usize {
        let listeners = {
            let mut state = self.state.write();
            match state.subscriptions.get_mut(uid) {
                Some(sub) if sub.id == id => {
                    sub.last_bar_time = Some(bar.time);
                    sub.listeners.clone()
                }
                _ => return 0,
            }
        };

        for listener in &listeners {
            listener(bar);
        }

        listeners.len()
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().subscriptions.len()
    }

    /// Whether no subscription is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a record exists under `uid`.
    #[must_use]
    pub fn contains(&self, uid: &str) -> bool {
        self.state.read().subscriptions.contains_key(uid)
    }

    /// Listener count of the record under `uid`.
    #[must_use]
    pub fn listener_count(&self, uid: &str) -> Option<usize> {
        self.state
            .read()
            .subscriptions
            .get(uid)
            .map(Subscription::listener_count)
    }

    /// Last dispatched bar time of the record under `uid`.
    #[must_use]
    pub fn last_bar_time(&self, uid: &str) -> Option<UnixSeconds> {
        self.state
            .read()
            .subscriptions
            .get(uid)
            .and_then(Subscription::last_bar_time)
    }
}

// =============================================================================
// Tests
// =============================================================================
