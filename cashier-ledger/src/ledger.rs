//! Main ledger orchestration layer
//!
//! This module ties together the store, the balance fold, ticket codes and
//! per-client locks into the cashier workflow: read a balance, authorize a
//! withdrawal, persist a ticket.
//!
//! # Example
//!
//! ```no_run
//! use cashier_ledger::{ClientId, Config, Ledger, MemoryStore, Operator, PaymentMethod};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cashier_ledger::Result<()> {
//!     let ledger = Ledger::new(Arc::new(MemoryStore::new()), Config::default())?;
//!
//!     let balance = ledger.get_balance(ClientId(1)).await?;
//!     if ledger.can_withdraw(ClientId(1), Decimal::new(5000, 2)).await? {
//!         ledger
//!             .withdraw(&Operator::system(), ClientId(1), Decimal::new(5000, 2), PaymentMethod::Cash)
//!             .await?;
//!     }
//!     println!("balance before: {}", balance);
//!     Ok(())
//! }
//! ```

use crate::{
    balance::{balance, balances_by_client, check_withdrawal, validate_amount},
    calendar::today_start,
    code::new_code,
    config::WithdrawalPolicy,
    locks::{ClientGuard, ClientLocks},
    metrics::Metrics,
    permissions::{Operator, Permission},
    query::TicketQuery,
    store::{Deadline, Store},
    types::{
        Amount, Client, ClientId, NewTicket, PaymentMethod, Ticket, TicketId, TicketPatch,
        TicketType,
    },
    Config, Error, Result,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

// Lock entries kept before idle ones are dropped
const LOCK_TABLE_SOFT_LIMIT: usize = 1024;

/// Request to register a deposit or withdrawal
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRequest {
    /// Owning client
    pub client_id: ClientId,
    /// Deposit or withdrawal
    pub ticket_type: TicketType,
    /// Positive amount
    pub amount: Amount,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Instant of the operation; now when absent
    pub timestamp: Option<DateTime<Utc>>,
}

/// Main ledger interface
pub struct Ledger {
    /// Row store
    pub(crate) store: Arc<dyn Store>,

    /// Per-client write serialization
    locks: ClientLocks,

    /// Store call deadline
    deadline: Deadline,

    /// Metrics
    pub(crate) metrics: Metrics,

    /// Configuration
    pub(crate) config: Config,
}

impl Ledger {
    /// Create a ledger over a store
    pub fn new(store: Arc<dyn Store>, config: Config) -> Result<Self> {
        config.validate()?;

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        tracing::info!(
            policy = ?config.withdrawals.policy,
            timeout_ms = config.store.request_timeout_ms,
            "Ledger ready"
        );

        Ok(Self {
            store,
            locks: ClientLocks::new(),
            deadline: Deadline::new(config.store.request_timeout()).with_metrics(metrics.clone()),
            metrics,
            config,
        })
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Issue one store request under the configured deadline
    pub(crate) async fn call<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        self.deadline.run(request).await
    }

    /// UTC instant of the current local day's midnight
    pub fn today_start(&self) -> Result<DateTime<Utc>> {
        Ok(today_start(Utc::now(), self.config.report.offset()?))
    }

    // Balance

    /// Current balance of a client. Unknown clients have balance 0.
    pub async fn get_balance(&self, client_id: ClientId) -> Result<Amount> {
        let tickets = self.call(self.store.list_tickets_by_client(client_id)).await?;
        let balance = balance(&tickets);

        tracing::debug!(
            client_id = %client_id,
            tickets = tickets.len(),
            %balance,
            "Balance computed"
        );

        Ok(balance)
    }

    /// Balance of every registered client, ordered by client ID
    pub async fn client_balances(&self) -> Result<Vec<(Client, Amount)>> {
        let clients = self.call(self.store.list_clients()).await?;
        let tickets = self.call(self.store.list_tickets()).await?;
        let balances = balances_by_client(&tickets);

        Ok(clients
            .into_iter()
            .map(|client| {
                let balance = balances.get(&client.id).copied().unwrap_or(Amount::ZERO);
                (client, balance)
            })
            .collect())
    }

    // Withdrawal authorization

    /// `amount > 0 && amount <= balance`. Invalid amounts are refused
    /// without touching the store.
    pub async fn can_withdraw(&self, client_id: ClientId, amount: Amount) -> Result<bool> {
        if validate_amount(amount).is_err() {
            return Ok(false);
        }
        let available = self.get_balance(client_id).await?;
        Ok(check_withdrawal(amount, available).is_ok())
    }

    /// Check a withdrawal and return the balance it was checked against.
    ///
    /// Advisory only: nothing stops the balance from changing before the
    /// ticket is inserted unless the caller holds the client's lock.
    pub async fn authorize_withdrawal(&self, client_id: ClientId, amount: Amount) -> Result<Amount> {
        if let Err(e) = validate_amount(amount) {
            self.metrics.record_withdrawal_rejected("invalid_amount");
            return Err(e);
        }

        let available = self.get_balance(client_id).await?;
        if let Err(e) = check_withdrawal(amount, available) {
            tracing::warn!(
                client_id = %client_id,
                requested = %amount,
                %available,
                "Withdrawal refused"
            );
            self.metrics.record_withdrawal_rejected("insufficient_balance");
            return Err(e);
        }

        Ok(available)
    }

    // Ticket workflow

    /// Register a deposit
    pub async fn deposit(
        &self,
        operator: &Operator,
        client_id: ClientId,
        amount: Amount,
        payment_method: PaymentMethod,
    ) -> Result<Ticket> {
        self.create_ticket(
            operator,
            TicketRequest {
                client_id,
                ticket_type: TicketType::Deposit,
                amount,
                payment_method,
                timestamp: None,
            },
        )
        .await
    }

    /// Register a withdrawal, refused when it exceeds the balance
    pub async fn withdraw(
        &self,
        operator: &Operator,
        client_id: ClientId,
        amount: Amount,
        payment_method: PaymentMethod,
    ) -> Result<Ticket> {
        self.create_ticket(
            operator,
            TicketRequest {
                client_id,
                ticket_type: TicketType::Withdrawal,
                amount,
                payment_method,
                timestamp: None,
            },
        )
        .await
    }

    /// Validate, authorize and persist a ticket
    pub async fn create_ticket(&self, operator: &Operator, request: TicketRequest) -> Result<Ticket> {
        operator.require(Permission::CreateTickets)?;
        validate_amount(request.amount)?;

        let _guard = self.write_guard(request.client_id).await;

        if request.ticket_type == TicketType::Withdrawal {
            self.authorize_withdrawal(request.client_id, request.amount)
                .await?;
        }

        let client = self.call(self.store.get_client(request.client_id)).await?;
        if !client.active {
            return Err(Error::InactiveClient(client.id));
        }

        let ticket = self.insert_with_fresh_code(operator, &request).await?;

        self.metrics.record_ticket_created(ticket.ticket_type.label());
        tracing::info!(
            ticket_id = %ticket.id,
            code = %ticket.code,
            client_id = %ticket.client_id,
            ticket_type = %ticket.ticket_type,
            amount = %ticket.amount,
            "Ticket created"
        );

        Ok(ticket)
    }

    /// Insert, regenerating the code on a collision
    async fn insert_with_fresh_code(
        &self,
        operator: &Operator,
        request: &TicketRequest,
    ) -> Result<Ticket> {
        let max_attempts = self.config.codes.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let ticket = NewTicket {
                client_id: request.client_id,
                ticket_type: request.ticket_type,
                amount: request.amount,
                timestamp: request.timestamp.unwrap_or_else(Utc::now),
                code: Some(new_code(request.client_id)),
                payment_method: request.payment_method,
                created_by: operator.user_id,
            };

            match self.call(self.store.insert_ticket(ticket)).await {
                Err(Error::DuplicateCode(code)) if attempt < max_attempts => {
                    tracing::warn!(%code, attempt, "Ticket code collision, retrying");
                    self.metrics.record_code_collision();
                }
                result => return result,
            }
        }
    }

    /// Change an existing ticket. No reversal record is written; the
    /// operator and instant are stamped on the row.
    pub async fn update_ticket(
        &self,
        operator: &Operator,
        id: TicketId,
        mut patch: TicketPatch,
    ) -> Result<Ticket> {
        operator.require(Permission::EditTickets)?;
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
        }

        let current = self.call(self.store.get_ticket(id)).await?;
        if patch.is_empty() {
            return Ok(current);
        }

        // The owning client never changes, but the row may while we wait
        let _guard = self.write_guard(current.client_id).await;
        let current = self.call(self.store.get_ticket(id)).await?;

        patch.updated_by = operator.user_id;
        patch.updated_at = Some(Utc::now());
        let updated = self.call(self.store.update_ticket(id, patch)).await?;

        tracing::info!(
            ticket_id = %id,
            client_id = %updated.client_id,
            previous_type = %current.ticket_type,
            previous_amount = %current.amount,
            ticket_type = %updated.ticket_type,
            amount = %updated.amount,
            "Ticket updated"
        );

        Ok(updated)
    }

    /// Remove a ticket
    pub async fn delete_ticket(&self, operator: &Operator, id: TicketId) -> Result<()> {
        operator.require(Permission::EditTickets)?;

        let client_id = self.call(self.store.get_ticket(id)).await?.client_id;
        let _guard = self.write_guard(client_id).await;
        let current = self.call(self.store.get_ticket(id)).await?;
        self.call(self.store.delete_ticket(id)).await?;

        tracing::info!(
            ticket_id = %id,
            code = %current.code,
            client_id = %current.client_id,
            ticket_type = %current.ticket_type,
            amount = %current.amount,
            "Ticket deleted"
        );

        Ok(())
    }

    /// Client lock when the policy serializes writes
    async fn write_guard(&self, client_id: ClientId) -> Option<ClientGuard> {
        match self.config.withdrawals.policy {
            WithdrawalPolicy::Serialized => {
                if self.locks.len() > LOCK_TABLE_SOFT_LIMIT {
                    self.locks.prune();
                }
                Some(self.locks.lock(client_id).await)
            }
            WithdrawalPolicy::Advisory => None,
        }
    }

    // History

    /// Tickets of a client, newest first
    pub async fn client_history(&self, client_id: ClientId) -> Result<Vec<Ticket>> {
        let mut tickets = self.call(self.store.list_tickets_by_client(client_id)).await?;
        tickets.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(tickets)
    }

    /// Filter and sort every ticket
    pub async fn search_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>> {
        let tickets = self.call(self.store.list_tickets()).await?;
        let names: HashMap<ClientId, String> = self
            .call(self.store.list_clients())
            .await?
            .into_iter()
            .map(|client| (client.id, client.name))
            .collect();

        Ok(query.apply(tickets, &names))
    }
}
