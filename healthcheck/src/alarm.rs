//! Alarm bookkeeping for flapping-resistant notifications
//!
//! Every host holds one [`AlarmCategory`] per [`AlarmKind`] it has reported.
//! Checkers only talk to the registry through `mark_failed`, `mark_ok` and
//! `drain_alerts`; the map and its lock never leave this module.
//!
//! # Suppression
//!
//! A failure notifies when the category was inactive, when it is already
//! pending notification this run, or when the suppression window has passed.
//! Imminent certificate expiry always notifies. The pending flag is not
//! persisted, so a restored registry starts every run with nothing pending.

use crate::constants::alerts;
use crate::errors::StateError;
use crate::storage::StateStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    Health,
    Security,
    P2p,
}

impl AlarmKind {
    pub fn label(&self) -> &'static str {
        match self {
            AlarmKind::Health => "Health",
            AlarmKind::Security => "Security",
            AlarmKind::P2p => "P2P health",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmCategory {
    pub active: bool,
    pub reason: String,
    pub suppress_until: DateTime<Utc>,
    #[serde(skip)]
    pub pending_notify: bool,
}

impl Default for AlarmCategory {
    fn default() -> Self {
        Self {
            active: false,
            reason: String::new(),
            suppress_until: DateTime::<Utc>::UNIX_EPOCH,
            pending_notify: false,
        }
    }
}

impl AlarmCategory {
    /// Must be evaluated before the failure is recorded.
    fn should_notify(&self, reason: &str, now: DateTime<Utc>) -> bool {
        !self.active
            || self.pending_notify
            || now > self.suppress_until
            || is_imminent_cert_expiry(reason)
    }

    fn merge_reason(&mut self, reason: &str) {
        if reason.is_empty() || self.reason.contains(reason) {
            return;
        }
        if !self.reason.is_empty() {
            self.reason.push_str("; ");
        }
        self.reason.push_str(reason);
    }
}

type HostAlarms = BTreeMap<AlarmKind, AlarmCategory>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredAlarms {
    state: BTreeMap<String, HostAlarms>,
}

#[derive(Debug, Default)]
pub struct AlarmRegistry {
    hosts: Mutex<BTreeMap<String, HostAlarms>>,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure and returns whether it warrants a notification.
    pub async fn mark_failed(
        &self,
        host: &str,
        kind: AlarmKind,
        reason: &str,
        suppression_hours: i64,
    ) -> bool {
        self.mark_failed_at(host, kind, reason, suppression_hours, Utc::now())
            .await
    }

    pub async fn mark_failed_at(
        &self,
        host: &str,
        kind: AlarmKind,
        reason: &str,
        suppression_hours: i64,
        now: DateTime<Utc>,
    ) -> bool {
        let mut hosts = self.hosts.lock().await;
        let category = hosts
            .entry(host.to_string())
            .or_default()
            .entry(kind)
            .or_default();

        let should_notify = category.should_notify(reason, now);

        category.active = true;
        category.pending_notify = should_notify;
        category.suppress_until = now + Duration::hours(suppression_hours);
        category.merge_reason(reason);

        debug!(
            "{} alarm for {}: '{}' (notify: {})",
            kind.label(),
            host,
            reason,
            should_notify
        );
        should_notify
    }

    /// Resets one category of a host to inactive. Other categories are untouched.
    pub async fn mark_ok(&self, host: &str, kind: AlarmKind) {
        let mut hosts = self.hosts.lock().await;
        let alarms = hosts.entry(host.to_string()).or_default();
        if alarms.get(&kind).is_some_and(|c| c.active) {
            info!("{} alarm cleared for {}", kind.label(), host);
        }
        alarms.insert(kind, AlarmCategory::default());
    }

    /// Alert lines for every active category pending notification. Read-only,
    /// so calling it twice yields the same lines.
    pub async fn drain_alerts(&self) -> Vec<String> {
        let hosts = self.hosts.lock().await;
        hosts
            .iter()
            .flat_map(|(host, alarms)| {
                alarms
                    .iter()
                    .filter(|(_, c)| c.active && c.pending_notify)
                    .map(move |(kind, c)| {
                        format!("{} warning: {} - {}", kind.label(), host, c.reason)
                    })
            })
            .collect()
    }

    pub async fn get(&self, host: &str, kind: AlarmKind) -> Option<AlarmCategory> {
        let hosts = self.hosts.lock().await;
        hosts.get(host).and_then(|alarms| alarms.get(&kind)).cloned()
    }

    pub async fn to_bytes(&self) -> Result<Vec<u8>, StateError> {
        let hosts = self.hosts.lock().await;
        let stored = StoredAlarms {
            state: hosts.clone(),
        };
        serde_json::to_vec_pretty(&stored).map_err(|e| StateError::SerializationError {
            reason: e.to_string(),
        })
    }

    /// Restores persisted state. Reason text is dropped so alert lines only
    /// carry what this run observed; activity and suppression survive.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        let mut stored: StoredAlarms =
            serde_json::from_slice(bytes).map_err(|e| StateError::Corrupt {
                reason: e.to_string(),
            })?;

        for category in stored.state.values_mut().flat_map(|a| a.values_mut()) {
            category.reason.clear();
        }

        Ok(Self {
            hosts: Mutex::new(stored.state),
        })
    }

    /// Loads a registry from the store, starting empty on any failure.
    pub async fn restore<S: StateStore>(store: &S, key: &str) -> Self {
        let bytes = match store.load(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("No alarm state at '{}', starting fresh", key);
                return Self::new();
            }
            Err(e) => {
                warn!("Error loading alarm state, creating new: {}", e);
                return Self::new();
            }
        };

        match Self::from_bytes(&bytes) {
            Ok(registry) => registry,
            Err(e) => {
                warn!("Error loading alarm state from '{}', creating new: {}", key, e);
                Self::new()
            }
        }
    }

    pub async fn persist<S: StateStore>(&self, store: &S, key: &str) -> Result<(), StateError> {
        let bytes = self.to_bytes().await?;
        store.save(key, &bytes).await
    }
}

/// True when the text carries a "cert expires in N days" note with N at or
/// below the imminent threshold.
pub fn is_imminent_cert_expiry(reason: &str) -> bool {
    const MARKER: &str = "cert expires in ";

    reason.match_indices(MARKER).any(|(idx, _)| {
        let rest = &reason[idx + MARKER.len()..];
        let end = rest
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        rest[..end]
            .parse::<i64>()
            .is_ok_and(|days| days <= alerts::IMMINENT_CERT_EXPIRY_DAYS)
    })
}
