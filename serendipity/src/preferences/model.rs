//! Per-pin notification preference record.

use serde::{Deserialize, Serialize};

/// A user's notification policy for one pin.
///
/// Timestamps are epoch milliseconds. `muted` and `next_notify` move
/// together: a muted pin has no next-notify time, and a pin with a
/// next-notify time is not muted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinPreference {
    /// Last time the pin was seen inside the discovery radius.
    pub last_seen: i64,

    /// Earliest time the pin may notify again. `None` = never.
    pub next_notify: Option<i64>,

    /// Permanently silenced until unmuted.
    pub muted: bool,

    /// When the user last rated or unmuted the pin.
    pub marked_at: i64,
}

impl PinPreference {
    /// Rated "Good": eligible again after the cooldown.
    pub fn good(now_ms: i64, cooldown_ms: i64) -> Self {
        Self {
            last_seen: now_ms,
            next_notify: Some(now_ms.saturating_add(cooldown_ms)),
            muted: false,
            marked_at: now_ms,
        }
    }

    /// Rated "Bad": muted for good.
    pub fn bad(now_ms: i64) -> Self {
        Self {
            last_seen: now_ms,
            next_notify: None,
            muted: true,
            marked_at: now_ms,
        }
    }

    /// Unmuted: eligible immediately.
    pub fn unmuted(now_ms: i64) -> Self {
        Self {
            last_seen: now_ms,
            next_notify: Some(now_ms),
            muted: false,
            marked_at: now_ms,
        }
    }

    /// Whether this preference allows a notification at `now_ms`.
    pub fn allows_notification(&self, now_ms: i64) -> bool {
        if self.muted {
            return false;
        }
        match self.next_notify {
            Some(next) => now_ms >= next,
            None => false,
        }
    }

    /// Whether `muted` and `next_notify` agree.
    pub fn is_consistent(&self) -> bool {
        self.muted == self.next_notify.is_none()
    }
}
