//! Cashier Ledger
//!
//! Deposit and withdrawal tickets for a casino cage, with balances derived
//! from ticket history.
//!
//! # Architecture
//!
//! - **Derived balance**: A client's balance is the signed sum of their tickets, never stored
//! - **Store seam**: Tickets, clients and users live behind async store traits
//! - **Per-client serialization**: Withdrawals hold a client lock across check and insert
//! - **Report projection**: Tickets export to fully quoted CSV with resolved names
//!
//! # Invariants
//!
//! - balance = Σ(deposits) − Σ(withdrawals), independent of ticket order
//! - A withdrawal is authorized only when 0 < amount <= balance
//! - Ticket codes are unique across the store

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod balance;
pub mod calendar;
pub mod clients;
pub mod code;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod ledger;
pub mod locks;
pub mod memory;
pub mod metrics;
pub mod permissions;
pub mod query;
pub mod store;
pub mod types;
pub mod users;

// Re-exports
pub use clients::{ClientForm, ClientRegistry};
pub use config::{Config, WithdrawalPolicy};
pub use dashboard::{DailyActivity, Dashboard};
pub use error::{Error, Result};
pub use export::{Export, ExportScope, EMPTY_EXPORT};
pub use ledger::{Ledger, TicketRequest};
pub use memory::{MemoryStore, Snapshot};
pub use permissions::{has_permission, Operator, Permission, Role};
pub use query::{SortOrder, TicketQuery};
pub use store::{ClientStore, Deadline, Store, TicketStore, UserDirectory};
pub use types::{
    Amount, AppUser, Client, ClientId, MembershipTier, NationalId, PaymentMethod, Ticket,
    TicketId, TicketPatch, TicketType, UserId,
};
pub use users::UserAdmin;
