//! Capacity reservation entity and lifecycle states.
//!
//! A reservation is a time-boxed hold on one slot of a capacity-limited
//! registration category. At most one non-terminal reservation may exist per
//! `(user, category)` pair; the partial uniqueness constraint in the store is
//! the only mutual exclusion against double-booking.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default hold duration before an unpaid reservation stops counting
/// against capacity.
pub const DEFAULT_RESERVATION_TTL_MINUTES: i64 = 5;

/// Lifecycle status of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Slot held, charge not yet confirmed.
    AwaitingPayment,
    /// A charge confirmation is in flight at the gateway.
    Processing,
    /// Payment settled; the slot is permanently consumed.
    Paid,
    /// Charge declined or cancelled; the row is reusable on retry.
    Failed,
    /// Payment refunded after settlement.
    Refunded,
}

impl ReservationStatus {
    /// Whether the status still holds capacity while unexpired.
    pub fn is_live_hold(self) -> bool {
        matches!(self, Self::AwaitingPayment | Self::Processing)
    }

    /// Whether no further gateway transition is expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Refunded)
    }

    /// Stable database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingPayment => "awaiting_payment",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// Parse the database representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "awaiting_payment" => Some(Self::AwaitingPayment),
            "processing" => Some(Self::Processing),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// A hold on one capacity-limited registration slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub status: ReservationStatus,
    /// Gateway charge linkage, set once a charge confirmation starts.
    pub charge_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Build a fresh `awaiting_payment` hold expiring `ttl` from `now`.
    pub fn new_hold(user_id: Uuid, category_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            category_id,
            status: ReservationStatus::AwaitingPayment,
            charge_id: None,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    /// Whether the hold has lapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether this row currently counts against category capacity.
    pub fn occupies_capacity(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            ReservationStatus::Paid => true,
            ReservationStatus::AwaitingPayment | ReservationStatus::Processing => {
                !self.is_expired(now)
            }
            ReservationStatus::Failed | ReservationStatus::Refunded => false,
        }
    }
}

/// A registration category with an optional concurrent-hold limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationCategory {
    pub id: Uuid,
    pub name: String,
    /// `None` means unlimited capacity.
    pub max_capacity: Option<i32>,
    pub price_minor: i64,
}
