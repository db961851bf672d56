//! Transient toast notifications.
//!
//! The engine only enqueues notifications. Expiry is a pure function of the
//! current time, applied by whatever presentation layer renders them on its
//! own refresh cadence.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default time a notification stays visible
pub const DEFAULT_NOTIFICATION_TTL_SECS: i64 = 2;
/// Longest display time a config may ask for
pub const MAX_NOTIFICATION_TTL_SECS: i64 = 3600;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Failure,
    Neutral,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub health_delta: Option<i32>,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

/// Return the notifications still visible at `now`
pub fn prune_expired(
    notifications: &[Notification],
    now: DateTime<Utc>,
    ttl: Duration,
) -> Vec<Notification> {
    notifications
        .iter()
        .filter(|n| now - n.created_at < ttl)
        .cloned()
        .collect()
}

/// Live notification set for one session
#[derive(Clone, Debug, Default)]
pub struct NotificationQueue {
    next_id: u64,
    items: Vec<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        message: impl Into<String>,
        health_delta: Option<i32>,
        kind: NotificationKind,
    ) -> &Notification {
        self.push_at(message, health_delta, kind, Utc::now())
    }

    pub fn push_at(
        &mut self,
        message: impl Into<String>,
        health_delta: Option<i32>,
        kind: NotificationKind,
        created_at: DateTime<Utc>,
    ) -> &Notification {
        self.next_id += 1;
        self.items.push(Notification {
            id: self.next_id,
            message: message.into(),
            health_delta,
            kind,
            created_at,
        });
        &self.items[self.items.len() - 1]
    }

    /// Drop notifications older than `ttl`, returning how many were removed
    pub fn prune(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let before = self.items.len();
        self.items = prune_expired(&self.items, now, ttl);
        before - self.items.len()
    }

    /// Take every live notification, leaving the queue empty
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.items)
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
