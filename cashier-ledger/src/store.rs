//! Store seam
//!
//! Tickets, clients and users live in an external row store. The ledger only
//! relies on the operations below; each call is atomic on its own, but no
//! transaction spans two calls.
//!
//! - `TicketStore` - ticket rows, lookup by client and by instant
//! - `ClientStore` - client rows, lookup by national ID
//! - `UserDirectory` - back-office users

use crate::metrics::Metrics;
use crate::types::{
    AppUser, Client, ClientId, NationalId, NewClient, NewTicket, NewUser, Ticket, TicketId,
    TicketPatch, UserId, UserPatch,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Ticket rows
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Every ticket, in no particular order
    async fn list_tickets(&self) -> Result<Vec<Ticket>>;

    /// Tickets of one client, in no particular order
    async fn list_tickets_by_client(&self, client_id: ClientId) -> Result<Vec<Ticket>>;

    /// Tickets with `timestamp >= since`
    async fn list_tickets_since(&self, since: DateTime<Utc>) -> Result<Vec<Ticket>>;

    /// Ticket by ID
    async fn get_ticket(&self, id: TicketId) -> Result<Ticket>;

    /// Persist a ticket. Fails with `ClientNotFound` or `DuplicateCode`.
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket>;

    /// Apply a partial update
    async fn update_ticket(&self, id: TicketId, patch: TicketPatch) -> Result<Ticket>;

    /// Remove a ticket
    async fn delete_ticket(&self, id: TicketId) -> Result<()>;
}

/// Client rows
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Persist a client
    async fn insert_client(&self, client: NewClient) -> Result<Client>;

    /// Replace a client row
    async fn update_client(&self, client: Client) -> Result<Client>;

    /// Client by ID
    async fn get_client(&self, id: ClientId) -> Result<Client>;

    /// Every client, ordered by ID
    async fn list_clients(&self) -> Result<Vec<Client>>;

    /// Client holding a national ID, if any
    async fn find_client_by_national_id(&self, national_id: &NationalId)
        -> Result<Option<Client>>;

    /// Display name of a client
    async fn get_client_name(&self, id: ClientId) -> Result<String> {
        Ok(self.get_client(id).await?.name)
    }
}

/// Back-office users
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Persist a user
    async fn insert_user(&self, user: NewUser) -> Result<AppUser>;

    /// Apply a partial update
    async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<AppUser>;

    /// Remove a user
    async fn delete_user(&self, id: UserId) -> Result<()>;

    /// User by ID
    async fn get_user(&self, id: UserId) -> Result<AppUser>;

    /// Every user, newest first
    async fn list_users(&self) -> Result<Vec<AppUser>>;

    /// User holding a username, if any
    async fn find_user_by_username(&self, username: &str) -> Result<Option<AppUser>>;

    /// Login name of a user
    async fn get_username(&self, id: UserId) -> Result<String> {
        Ok(self.get_user(id).await?.username)
    }
}

/// Full backend used by the services
pub trait Store: TicketStore + ClientStore + UserDirectory {}

impl<T: TicketStore + ClientStore + UserDirectory> Store for T {}

/// Run one store request under a deadline.
///
/// A request that misses the deadline is reported as `Error::Timeout` and is
/// not retried.
pub async fn with_timeout<T>(
    timeout: Duration,
    request: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(?timeout, "Store request timed out");
            Err(Error::Timeout(timeout))
        }
    }
}

/// Deadline shared by every store call of a service, counting expiries when
/// metrics are attached
#[derive(Clone)]
pub struct Deadline {
    timeout: Duration,
    metrics: Option<Metrics>,
}

impl Deadline {
    /// Deadline without metrics
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            metrics: None,
        }
    }

    /// Count expiries in `metrics`
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one store request under the deadline
    pub async fn run<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        let result = with_timeout(self.timeout, request).await;
        if let (Err(Error::Timeout(_)), Some(metrics)) = (&result, &self.metrics) {
            metrics.record_store_timeout();
        }
        result
    }
}
