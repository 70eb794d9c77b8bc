//! In-process store
//!
//! Keeps every table behind one `RwLock`, which makes each call atomic the
//! same way a single statement is atomic in the hosted database. Unique
//! constraints mirror the hosted schema:
//!
//! - `tickets.code` unique
//! - `tickets.client_id` references `clients.id`
//! - `clients.national_id` unique
//! - `users.username` unique
//! - `tickets.amount` positive, at most two decimals and at most `MAX_AMOUNT`
//!
//! Tables can be seeded from, and dumped to, a JSON [`Snapshot`].

use crate::balance::validate_amount;
use crate::code::new_code;
use crate::store::{ClientStore, TicketStore, UserDirectory};
use crate::types::{
    AppUser, Client, ClientId, NationalId, NewClient, NewTicket, NewUser, Ticket, TicketId,
    TicketPatch, UserId, UserPatch,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

/// Serialized content of a store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Client rows
    #[serde(default)]
    pub clients: Vec<Client>,
    /// User rows
    #[serde(default)]
    pub users: Vec<AppUser>,
    /// Ticket rows
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

#[derive(Default)]
struct Tables {
    clients: BTreeMap<ClientId, Client>,
    tickets: BTreeMap<TicketId, Ticket>,
    // code -> owning ticket
    codes: HashMap<String, TicketId>,
    users: HashMap<UserId, AppUser>,
    next_client_id: u32,
    next_ticket_id: u64,
}

impl Tables {
    fn national_id_holder(&self, national_id: &NationalId) -> Option<&Client> {
        self.clients
            .values()
            .find(|client| &client.national_id == national_id)
    }

    fn username_holder(&self, username: &str) -> Option<&AppUser> {
        self.users.values().find(|user| user.username == username)
    }

    fn put_client(&mut self, client: Client) -> Result<()> {
        if let Some(holder) = self.national_id_holder(&client.national_id) {
            if holder.id != client.id {
                return Err(Error::DuplicateNationalId(client.national_id.to_string()));
            }
        }
        self.next_client_id = self.next_client_id.max(client.id.0);
        self.clients.insert(client.id, client);
        Ok(())
    }

    fn put_ticket(&mut self, ticket: Ticket) -> Result<()> {
        validate_amount(ticket.amount)?;
        if !self.clients.contains_key(&ticket.client_id) {
            return Err(Error::ClientNotFound(ticket.client_id));
        }
        if self.codes.contains_key(&ticket.code) {
            return Err(Error::DuplicateCode(ticket.code));
        }
        self.next_ticket_id = self.next_ticket_id.max(ticket.id.0);
        self.codes.insert(ticket.code.clone(), ticket.id);
        self.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    fn put_user(&mut self, user: AppUser) -> Result<()> {
        if let Some(holder) = self.username_holder(&user.username) {
            if holder.id != user.id {
                return Err(Error::DuplicateUsername(user.username));
            }
        }
        self.users.insert(user.id, user);
        Ok(())
    }
}

/// Store backed by process memory
pub struct MemoryStore {
    tables: RwLock<Tables>,
    // Artificial delay before every call, used to widen race windows in tests
    latency: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Store holding the rows of a snapshot, constraints checked
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut tables = Tables::default();

        // put_* replace rows by ID, so repeated IDs are caught here
        for client in snapshot.clients {
            if tables.clients.contains_key(&client.id) {
                return Err(Error::Store(format!(
                    "duplicate client id {} in snapshot",
                    client.id
                )));
            }
            tables.put_client(client)?;
        }
        for user in snapshot.users {
            if tables.users.contains_key(&user.id) {
                return Err(Error::Store(format!(
                    "duplicate user id {} in snapshot",
                    user.id
                )));
            }
            tables.put_user(user)?;
        }
        for ticket in snapshot.tickets {
            if tables.tickets.contains_key(&ticket.id) {
                return Err(Error::Store(format!(
                    "duplicate ticket id {} in snapshot",
                    ticket.id
                )));
            }
            tables.put_ticket(ticket)?;
        }

        tracing::info!(
            clients = tables.clients.len(),
            users = tables.users.len(),
            tickets = tables.tickets.len(),
            "Loaded store snapshot"
        );

        Ok(Self {
            tables: RwLock::new(tables),
            latency: Duration::ZERO,
        })
    }

    /// Load a JSON snapshot file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        Self::from_snapshot(snapshot)
    }

    /// Copy of every row
    pub fn snapshot(&self) -> Snapshot {
        let tables = self.tables.read();
        Snapshot {
            clients: tables.clients.values().cloned().collect(),
            users: tables.users.values().cloned().collect(),
            tickets: tables.tickets.values().cloned().collect(),
        }
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        self.pause().await;
        Ok(self.tables.read().tickets.values().cloned().collect())
    }

    async fn list_tickets_by_client(&self, client_id: ClientId) -> Result<Vec<Ticket>> {
        self.pause().await;
        let tables = self.tables.read();
        Ok(tables
            .tickets
            .values()
            .filter(|ticket| ticket.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn list_tickets_since(&self, since: DateTime<Utc>) -> Result<Vec<Ticket>> {
        self.pause().await;
        let tables = self.tables.read();
        Ok(tables
            .tickets
            .values()
            .filter(|ticket| ticket.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Ticket> {
        self.pause().await;
        self.tables
            .read()
            .tickets
            .get(&id)
            .cloned()
            .ok_or(Error::TicketNotFound(id))
    }

    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        self.pause().await;
        let mut tables = self.tables.write();

        let ticket = Ticket {
            id: TicketId(tables.next_ticket_id + 1),
            client_id: ticket.client_id,
            ticket_type: ticket.ticket_type,
            amount: ticket.amount,
            timestamp: ticket.timestamp,
            code: ticket.code.unwrap_or_else(|| new_code(ticket.client_id)),
            payment_method: ticket.payment_method,
            created_by: ticket.created_by,
            updated_by: None,
            updated_at: None,
        };
        tables.put_ticket(ticket.clone())?;

        tracing::debug!(ticket_id = %ticket.id, code = %ticket.code, "Ticket row inserted");
        Ok(ticket)
    }

    async fn update_ticket(&self, id: TicketId, patch: TicketPatch) -> Result<Ticket> {
        self.pause().await;
        let mut tables = self.tables.write();
        let ticket = tables.tickets.get_mut(&id).ok_or(Error::TicketNotFound(id))?;
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
        }

        if let Some(ticket_type) = patch.ticket_type {
            ticket.ticket_type = ticket_type;
        }
        if let Some(amount) = patch.amount {
            ticket.amount = amount;
        }
        if let Some(timestamp) = patch.timestamp {
            ticket.timestamp = timestamp;
        }
        if let Some(payment_method) = patch.payment_method {
            ticket.payment_method = payment_method;
        }
        if patch.updated_by.is_some() {
            ticket.updated_by = patch.updated_by;
        }
        if patch.updated_at.is_some() {
            ticket.updated_at = patch.updated_at;
        }

        Ok(ticket.clone())
    }

    async fn delete_ticket(&self, id: TicketId) -> Result<()> {
        self.pause().await;
        let mut tables = self.tables.write();
        let ticket = tables.tickets.remove(&id).ok_or(Error::TicketNotFound(id))?;
        tables.codes.remove(&ticket.code);
        Ok(())
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn insert_client(&self, client: NewClient) -> Result<Client> {
        self.pause().await;
        let mut tables = self.tables.write();

        let client = Client {
            id: ClientId(tables.next_client_id + 1),
            name: client.name,
            national_id: client.national_id,
            membership: client.membership,
            active: client.active,
        };
        tables.put_client(client.clone())?;
        Ok(client)
    }

    async fn update_client(&self, client: Client) -> Result<Client> {
        self.pause().await;
        let mut tables = self.tables.write();
        if !tables.clients.contains_key(&client.id) {
            return Err(Error::ClientNotFound(client.id));
        }
        tables.put_client(client.clone())?;
        Ok(client)
    }

    async fn get_client(&self, id: ClientId) -> Result<Client> {
        self.pause().await;
        self.tables
            .read()
            .clients
            .get(&id)
            .cloned()
            .ok_or(Error::ClientNotFound(id))
    }

    async fn list_clients(&self) -> Result<Vec<Client>> {
        self.pause().await;
        Ok(self.tables.read().clients.values().cloned().collect())
    }

    async fn find_client_by_national_id(
        &self,
        national_id: &NationalId,
    ) -> Result<Option<Client>> {
        self.pause().await;
        Ok(self.tables.read().national_id_holder(national_id).cloned())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<AppUser> {
        self.pause().await;
        let user = AppUser {
            id: UserId::new(),
            username: user.username,
            role: user.role,
            active: user.active,
            created_at: Utc::now(),
        };
        self.tables.write().put_user(user.clone())?;
        Ok(user)
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<AppUser> {
        self.pause().await;
        let mut tables = self.tables.write();
        let mut user = tables.users.get(&id).cloned().ok_or(Error::UserNotFound(id))?;

        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(active) = patch.active {
            user.active = active;
        }

        tables.put_user(user.clone())?;
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.pause().await;
        self.tables
            .write()
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::UserNotFound(id))
    }

    async fn get_user(&self, id: UserId) -> Result<AppUser> {
        self.pause().await;
        self.tables
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or(Error::UserNotFound(id))
    }

    async fn list_users(&self) -> Result<Vec<AppUser>> {
        self.pause().await;
        let mut users: Vec<AppUser> = self.tables.read().users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<AppUser>> {
        self.pause().await;
        Ok(self.tables.read().username_holder(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::types::{MembershipTier, PaymentMethod, TicketType};
    use rust_decimal_macros::dec;

    fn new_client(national_id: &str) -> NewClient {
        NewClient {
            name: "Ada Lovelace".to_string(),
            national_id: NationalId::parse(national_id).unwrap(),
            membership: MembershipTier::Gold,
            active: true,
        }
    }

    fn new_ticket(client_id: ClientId, code: Option<&str>) -> NewTicket {
        NewTicket {
            client_id,
            ticket_type: TicketType::Deposit,
            amount: dec!(100),
            timestamp: Utc::now(),
            code: code.map(str::to_string),
            payment_method: PaymentMethod::Card,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn test_client_ids_are_sequential() {
        let store = MemoryStore::new();
        let a = store.insert_client(new_client("11111111")).await.unwrap();
        let b = store.insert_client(new_client("22222222")).await.unwrap();
        assert_eq!(a.id, ClientId(1));
        assert_eq!(b.id, ClientId(2));
        assert_eq!(store.list_clients().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_national_id_unique() {
        let store = MemoryStore::new();
        store.insert_client(new_client("11111111")).await.unwrap();

        let err = store.insert_client(new_client("11111111")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateNationalId(_)));
    }

    #[tokio::test]
    async fn test_insert_ticket_assigns_code() {
        let store = MemoryStore::new();
        let client = store.insert_client(new_client("11111111")).await.unwrap();

        let ticket = store.insert_ticket(new_ticket(client.id, None)).await.unwrap();
        assert_eq!(ticket.id, TicketId(1));
        assert!(ticket.code.starts_with("TICK-00001-"));
    }

    #[tokio::test]
    async fn test_insert_ticket_constraints() {
        let store = MemoryStore::new();
        let client = store.insert_client(new_client("11111111")).await.unwrap();

        let err = store
            .insert_ticket(new_ticket(ClientId(99), None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ClientNotFound(ClientId(99))));

        store
            .insert_ticket(new_ticket(client.id, Some("TICK-A")))
            .await
            .unwrap();
        let err = store
            .insert_ticket(new_ticket(client.id, Some("TICK-A")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateCode(code) if code == "TICK-A"));
        assert_eq!(store.list_tickets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_ticket() {
        let store = MemoryStore::new();
        let client = store.insert_client(new_client("11111111")).await.unwrap();
        let ticket = store
            .insert_ticket(new_ticket(client.id, Some("TICK-B")))
            .await
            .unwrap();

        let updated = store
            .update_ticket(
                ticket.id,
                TicketPatch {
                    amount: Some(dec!(75)),
                    ticket_type: Some(TicketType::Withdrawal),
                    ..TicketPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.amount, dec!(75));
        assert_eq!(updated.ticket_type, TicketType::Withdrawal);
        assert_eq!(updated.code, "TICK-B");

        store.delete_ticket(ticket.id).await.unwrap();
        assert!(matches!(
            store.get_ticket(ticket.id).await,
            Err(Error::TicketNotFound(_))
        ));

        // The code is free again once its ticket is gone
        store
            .insert_ticket(new_ticket(client.id, Some("TICK-B")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_tickets_since() {
        let store = MemoryStore::new();
        let client = store.insert_client(new_client("11111111")).await.unwrap();
        let now = Utc::now();

        let mut old = new_ticket(client.id, None);
        old.timestamp = now - chrono::Duration::days(2);
        store.insert_ticket(old).await.unwrap();
        store.insert_ticket(new_ticket(client.id, None)).await.unwrap();

        let recent = store
            .list_tickets_since(now - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn test_usernames_unique() {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser {
                username: "cage1".to_string(),
                role: Role::Cashier,
                active: true,
            })
            .await
            .unwrap();
        assert_eq!(store.get_username(user.id).await.unwrap(), "cage1");

        let err = store
            .insert_user(NewUser {
                username: "cage1".to_string(),
                role: Role::Admin,
                active: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateUsername(_)));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_keeps_id_sequence() {
        let store = MemoryStore::new();
        let client = store.insert_client(new_client("11111111")).await.unwrap();
        store.insert_ticket(new_ticket(client.id, None)).await.unwrap();

        let json = serde_json::to_string(&store.snapshot()).unwrap();
        let restored = MemoryStore::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        let next = restored
            .insert_client(new_client("22222222"))
            .await
            .unwrap();
        assert_eq!(next.id, ClientId(2));
        let ticket = restored.insert_ticket(new_ticket(next.id, None)).await.unwrap();
        assert_eq!(ticket.id, TicketId(2));
    }

    #[test]
    fn test_snapshot_rejects_orphan_ticket() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{
                "tickets": [{
                    "id": 1,
                    "client_id": 5,
                    "type": "Deposit",
                    "amount": "10.00",
                    "timestamp": "2024-06-01T10:00:00Z",
                    "code": "TICK-00005-1-001"
                }]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            MemoryStore::from_snapshot(snapshot),
            Err(Error::ClientNotFound(ClientId(5)))
        ));
    }

    fn seed_ticket(id: u64, client_id: u32, amount: &str, code: &str) -> String {
        format!(
            r#"{{"id":{id},"client_id":{client_id},"type":"Deposit","amount":"{amount}","timestamp":"2024-06-01T10:00:00Z","code":"{code}"}}"#
        )
    }

    fn seed_client(id: u32, national_id: &str) -> String {
        format!(
            r#"{{"id":{id},"name":"Seeded","national_id":"{national_id}","membership":"Regular","active":true}}"#
        )
    }

    #[test]
    fn test_snapshot_rejects_duplicate_ids() {
        let clients: Snapshot = serde_json::from_str(&format!(
            r#"{{"clients":[{},{}]}}"#,
            seed_client(1, "11111111"),
            seed_client(1, "22222222")
        ))
        .unwrap();
        assert!(matches!(
            MemoryStore::from_snapshot(clients),
            Err(Error::Store(message)) if message.contains("client id 1")
        ));

        let tickets: Snapshot = serde_json::from_str(&format!(
            r#"{{"clients":[{}],"tickets":[{},{}]}}"#,
            seed_client(1, "11111111"),
            seed_ticket(7, 1, "10.00", "TICK-00001-1-001"),
            seed_ticket(7, 1, "20.00", "TICK-00001-1-002")
        ))
        .unwrap();
        assert!(matches!(
            MemoryStore::from_snapshot(tickets),
            Err(Error::Store(message)) if message.contains("ticket id 7")
        ));

        let user = AppUser {
            id: UserId::new(),
            username: "cage1".to_string(),
            role: Role::Cashier,
            active: true,
            created_at: Utc::now(),
        };
        let users = Snapshot {
            users: vec![user.clone(), user],
            ..Snapshot::default()
        };
        assert!(matches!(
            MemoryStore::from_snapshot(users),
            Err(Error::Store(message)) if message.contains("duplicate user id")
        ));
    }

    #[test]
    fn test_snapshot_rejects_invalid_amounts() {
        for amount in ["0.00", "-5.00", "0.001", "79228162514264337593543950335"] {
            let snapshot: Snapshot = serde_json::from_str(&format!(
                r#"{{"clients":[{}],"tickets":[{}]}}"#,
                seed_client(1, "11111111"),
                seed_ticket(1, 1, amount, "TICK-00001-1-001")
            ))
            .unwrap();
            assert!(
                matches!(
                    MemoryStore::from_snapshot(snapshot),
                    Err(Error::InvalidAmount(_))
                ),
                "amount {} was accepted",
                amount
            );
        }
    }

    #[tokio::test]
    async fn test_store_rejects_invalid_amounts() {
        let store = MemoryStore::new();
        let client = store.insert_client(new_client("11111111")).await.unwrap();

        let mut huge = new_ticket(client.id, None);
        huge.amount = rust_decimal::Decimal::MAX;
        assert!(matches!(
            store.insert_ticket(huge).await,
            Err(Error::InvalidAmount(_))
        ));

        let ticket = store.insert_ticket(new_ticket(client.id, None)).await.unwrap();
        let err = store
            .update_ticket(
                ticket.id,
                TicketPatch {
                    amount: Some(rust_decimal::Decimal::MAX),
                    ticket_type: Some(TicketType::Withdrawal),
                    ..TicketPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));

        let unchanged = store.get_ticket(ticket.id).await.unwrap();
        assert_eq!(unchanged.amount, dec!(100));
        assert_eq!(unchanged.ticket_type, TicketType::Deposit);
    }
}
