use crate::error::{Result, SettlementError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle state of an obligation (and of service payments).
///
/// The numeric ids match the persisted status catalogue and are stable; the
/// enum serializes as its id, not its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Undefined,
    Pending,
    Paid,
    Verified,
    Cancelled,
}

impl PaymentStatus {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Undefined),
            1 => Some(Self::Pending),
            2 => Some(Self::Paid),
            3 => Some(Self::Verified),
            4 => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Pending => 1,
            Self::Paid => 2,
            Self::Verified => 3,
            Self::Cancelled => 4,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Verified => "verified",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable reason why a non-pending obligation cannot be settled.
    pub fn settlement_rejection(&self) -> &'static str {
        match self {
            Self::Paid => "the obligation is already paid",
            Self::Verified => "the obligation is verified by administration",
            Self::Cancelled => "the obligation is cancelled",
            Self::Undefined => "the obligation is in an undefined state",
            Self::Pending => "the obligation is pending",
        }
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.id())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let id = u8::deserialize(deserializer)?;
        PaymentStatus::from_id(id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown status id {id}")))
    }
}

/// Read-only catalogue of lifecycle states.
///
/// Callers resolve raw status ids through here before trusting them; unknown
/// ids surface as `NotFound`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusRegistry;

impl StatusRegistry {
    pub fn exists(&self, id: u8) -> bool {
        PaymentStatus::from_id(id).is_some()
    }

    pub fn describe(&self, id: u8) -> Result<&'static str> {
        PaymentStatus::from_id(id)
            .map(|s| s.describe())
            .ok_or(SettlementError::not_found("status", id as u32))
    }

    pub fn resolve(&self, id: u8) -> Result<PaymentStatus> {
        PaymentStatus::from_id(id).ok_or(SettlementError::not_found("status", id as u32))
    }
}
