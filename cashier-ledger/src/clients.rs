//! Client registry

use crate::{
    metrics::Metrics,
    permissions::{Operator, Permission},
    store::{Deadline, Store},
    types::{Client, ClientId, MembershipTier, NationalId, NewClient},
    Config, Error, Result,
};
use std::sync::Arc;

const MIN_NAME_LEN: usize = 3;

/// Client fields as typed by an operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientForm {
    /// Display name
    pub name: String,
    /// National ID, unparsed
    pub national_id: String,
    /// Membership tier
    pub membership: MembershipTier,
    /// Active flag
    pub active: bool,
}

impl ClientForm {
    fn validate(&self) -> Result<(String, NationalId)> {
        let name = self.name.trim();
        if name.chars().count() < MIN_NAME_LEN {
            return Err(Error::InvalidClient(format!(
                "name must have at least {} characters",
                MIN_NAME_LEN
            )));
        }
        let national_id = NationalId::parse(self.national_id.trim())?;
        Ok((name.to_string(), national_id))
    }
}

/// Create, edit and list clients
pub struct ClientRegistry {
    store: Arc<dyn Store>,
    deadline: Deadline,
}

impl ClientRegistry {
    /// Registry over a store
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            deadline: Deadline::new(config.store.request_timeout()),
        }
    }

    /// Count store timeouts in `metrics`
    pub fn with_metrics(mut self, metrics: &Metrics) -> Self {
        self.deadline = self.deadline.with_metrics(metrics.clone());
        self
    }

    /// Register a client
    pub async fn create(&self, operator: &Operator, form: ClientForm) -> Result<Client> {
        operator.require(Permission::ManageClients)?;
        let (name, national_id) = form.validate()?;
        self.ensure_national_id_free(&national_id, None).await?;

        let client = self
            .deadline
            .run(self.store.insert_client(NewClient {
                name,
                national_id,
                membership: form.membership,
                active: form.active,
            }))
            .await?;

        tracing::info!(client_id = %client.id, membership = %client.membership, "Client created");
        Ok(client)
    }

    /// Replace the editable fields of a client
    pub async fn update(&self, operator: &Operator, id: ClientId, form: ClientForm) -> Result<Client> {
        operator.require(Permission::ManageClients)?;
        let (name, national_id) = form.validate()?;

        let mut client = self.deadline.run(self.store.get_client(id)).await?;
        self.ensure_national_id_free(&national_id, Some(id)).await?;

        client.name = name;
        client.national_id = national_id;
        client.membership = form.membership;
        client.active = form.active;

        let client = self.deadline.run(self.store.update_client(client)).await?;
        tracing::info!(client_id = %client.id, "Client updated");
        Ok(client)
    }

    /// Flip the active flag
    pub async fn toggle_active(&self, operator: &Operator, id: ClientId) -> Result<Client> {
        operator.require(Permission::ManageClients)?;

        let mut client = self.deadline.run(self.store.get_client(id)).await?;
        client.active = !client.active;

        let client = self.deadline.run(self.store.update_client(client)).await?;
        tracing::info!(client_id = %client.id, active = client.active, "Client active flag changed");
        Ok(client)
    }

    /// Client by ID. Inactive clients are hidden from operators who may not
    /// see them.
    pub async fn get(&self, operator: &Operator, id: ClientId) -> Result<Client> {
        operator.require(Permission::ViewClients)?;

        let client = self.deadline.run(self.store.get_client(id)).await?;
        if !client.active && !operator.can(Permission::ViewInactiveClients) {
            return Err(Error::ClientNotFound(id));
        }
        Ok(client)
    }

    /// Clients visible to the operator, ordered by ID
    pub async fn list(&self, operator: &Operator) -> Result<Vec<Client>> {
        operator.require(Permission::ViewClients)?;

        let mut clients = self.deadline.run(self.store.list_clients()).await?;
        if !operator.can(Permission::ViewInactiveClients) {
            clients.retain(|client| client.active);
        }
        Ok(clients)
    }

    async fn ensure_national_id_free(
        &self,
        national_id: &NationalId,
        owner: Option<ClientId>,
    ) -> Result<()> {
        let holder = self
            .deadline
            .run(self.store.find_client_by_national_id(national_id))
            .await?;

        match holder {
            Some(holder) if Some(holder.id) != owner => {
                Err(Error::DuplicateNationalId(national_id.to_string()))
            }
            _ => Ok(()),
        }
    }
}
