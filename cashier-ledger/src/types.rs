//! Core types for the cashier ledger
//!
//! All types are designed for:
//! - JSON snapshots (serde)
//! - Exact arithmetic (Decimal for money, two-decimal minor unit)
//! - Closed enumerations instead of free-form strings

use crate::permissions::Role;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Money amount. Single currency, never floating point.
pub type Amount = Decimal;

/// Decimal places of the currency minor unit
pub const AMOUNT_SCALE: u32 = 2;

/// Client (patron) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket identifier, assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Back-office user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Fresh time-ordered identifier
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// National identity document number: exactly 8 ASCII digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

impl NationalId {
    /// Validate and wrap
    pub fn parse(raw: impl Into<String>) -> crate::Result<Self> {
        let raw = raw.into();
        if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw))
        } else {
            Err(crate::Error::InvalidNationalId(raw))
        }
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NationalId {
    type Error = crate::Error;

    fn try_from(raw: String) -> crate::Result<Self> {
        Self::parse(raw)
    }
}

impl From<NationalId> for String {
    fn from(id: NationalId) -> Self {
        id.0
    }
}

impl fmt::Display for NationalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Membership tier, ordered from lowest to highest. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MembershipTier {
    /// Default tier
    Regular,
    /// Silver
    Silver,
    /// Gold
    Gold,
    /// VIP
    #[serde(rename = "VIP")]
    Vip,
    /// Platinum
    Platinum,
}

impl Default for MembershipTier {
    fn default() -> Self {
        MembershipTier::Regular
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MembershipTier::Regular => "Regular",
            MembershipTier::Silver => "Silver",
            MembershipTier::Gold => "Gold",
            MembershipTier::Vip => "VIP",
            MembershipTier::Platinum => "Platinum",
        };
        f.write_str(label)
    }
}

/// Registered client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Client ID
    pub id: ClientId,
    /// Display name
    pub name: String,
    /// National ID, unique across clients
    pub national_id: NationalId,
    /// Membership tier
    pub membership: MembershipTier,
    /// Inactive clients cannot receive new tickets
    pub active: bool,
}

/// Client fields before the store assigns an ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClient {
    /// Display name
    pub name: String,
    /// National ID
    pub national_id: NationalId,
    /// Membership tier
    #[serde(default)]
    pub membership: MembershipTier,
    /// Active flag
    pub active: bool,
}

/// Ticket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketType {
    /// Money received from the client
    Deposit,
    /// Money paid out to the client
    Withdrawal,
}

impl TicketType {
    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            TicketType::Deposit => "Deposit",
            TicketType::Withdrawal => "Withdrawal",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the money changed hands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the cage
    Cash,
    /// Card payment
    Card,
    /// Bank transfer
    BankTransfer,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

impl PaymentMethod {
    /// Stored code
    pub fn code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::BankTransfer => "Bank transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single deposit or withdrawal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket ID
    pub id: TicketId,
    /// Owning client
    pub client_id: ClientId,
    /// Deposit or withdrawal
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    /// Positive amount
    pub amount: Amount,
    /// Instant of the operation
    pub timestamp: DateTime<Utc>,
    /// Human readable unique code
    pub code: String,
    /// Payment method
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Creator
    #[serde(default)]
    pub created_by: Option<UserId>,
    /// Last updater
    #[serde(default)]
    pub updated_by: Option<UserId>,
    /// Last update instant
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Contribution to the client balance
    pub fn signed_amount(&self) -> Amount {
        match self.ticket_type {
            TicketType::Deposit => self.amount,
            TicketType::Withdrawal => -self.amount,
        }
    }
}

/// Ticket fields before the store assigns an ID
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    /// Owning client
    pub client_id: ClientId,
    /// Deposit or withdrawal
    pub ticket_type: TicketType,
    /// Positive amount
    pub amount: Amount,
    /// Instant of the operation
    pub timestamp: DateTime<Utc>,
    /// Pre-generated code; the store generates one when absent
    pub code: Option<String>,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Creator
    pub created_by: Option<UserId>,
}

/// Partial ticket update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketPatch {
    /// New direction
    pub ticket_type: Option<TicketType>,
    /// New amount
    pub amount: Option<Amount>,
    /// New instant
    pub timestamp: Option<DateTime<Utc>>,
    /// New payment method
    pub payment_method: Option<PaymentMethod>,
    /// Updater, stamped by the ledger
    pub updated_by: Option<UserId>,
    /// Update instant, stamped by the ledger
    pub updated_at: Option<DateTime<Utc>>,
}

impl TicketPatch {
    /// True when no ticket field changes
    pub fn is_empty(&self) -> bool {
        self.ticket_type.is_none()
            && self.amount.is_none()
            && self.timestamp.is_none()
            && self.payment_method.is_none()
    }
}

/// Back-office user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUser {
    /// User ID
    pub id: UserId,
    /// Login name, unique
    pub username: String,
    /// Role
    pub role: Role,
    /// Inactive users keep their history but cannot operate
    pub active: bool,
    /// Creation instant
    pub created_at: DateTime<Utc>,
}

/// User fields before the store assigns an ID
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// Login name
    pub username: String,
    /// Role
    pub role: Role,
    /// Active flag
    pub active: bool,
}

/// Partial user update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    /// New login name
    pub username: Option<String>,
    /// New role
    pub role: Option<Role>,
    /// New active flag
    pub active: Option<bool>,
}
