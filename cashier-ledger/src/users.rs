//! Back-office user administration
//!
//! Every operation requires `ManageUsers`. Operators cannot deactivate or
//! delete their own account.

use crate::{
    metrics::Metrics,
    permissions::{Operator, Permission, Role},
    store::{Deadline, Store},
    types::{AppUser, NewUser, UserId, UserPatch},
    Config, Error, Result,
};
use std::sync::Arc;

const MIN_USERNAME_LEN: usize = 3;

fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(Error::InvalidUser(format!(
            "username must have at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    Ok(username.to_string())
}

/// User management service
pub struct UserAdmin {
    store: Arc<dyn Store>,
    deadline: Deadline,
}

impl UserAdmin {
    /// Service over a store
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

    /// Create a user
    pub async fn create(
        &self,
        operator: &Operator,
        username: &str,
        role: Role,
        active: bool,
    ) -> Result<AppUser> {
        operator.require(Permission::ManageUsers)?;
        let username = validate_username(username)?;
        self.ensure_username_free(&username, None).await?;

        let user = self
            .deadline
            .run(self.store.insert_user(NewUser {
                username,
                role,
                active,
            }))
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Change username, role or active flag
    pub async fn update(&self, operator: &Operator, id: UserId, mut patch: UserPatch) -> Result<AppUser> {
        operator.require(Permission::ManageUsers)?;
        if let Some(username) = patch.username.take() {
            let username = validate_username(&username)?;
            self.ensure_username_free(&username, Some(id)).await?;
            patch.username = Some(username);
        }
        if patch.active == Some(false) {
            Self::ensure_not_self(operator, id, "deactivate")?;
        }

        let user = self.deadline.run(self.store.update_user(id, patch)).await?;
        tracing::info!(user_id = %user.id, role = %user.role, active = user.active, "User updated");
        Ok(user)
    }

    /// Flip the active flag
    pub async fn toggle_active(&self, operator: &Operator, id: UserId) -> Result<AppUser> {
        operator.require(Permission::ManageUsers)?;
        let user = self.deadline.run(self.store.get_user(id)).await?;

        self.update(
            operator,
            id,
            UserPatch {
                active: Some(!user.active),
                ..UserPatch::default()
            },
        )
        .await
    }

    /// Remove a user. Tickets they created keep the dangling reference and
    /// export with the system label.
    pub async fn delete(&self, operator: &Operator, id: UserId) -> Result<()> {
        operator.require(Permission::ManageUsers)?;
        Self::ensure_not_self(operator, id, "delete")?;

        self.deadline.run(self.store.delete_user(id)).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Every user, newest first
    pub async fn list(&self, operator: &Operator) -> Result<Vec<AppUser>> {
        operator.require(Permission::ManageUsers)?;
        self.deadline.run(self.store.list_users()).await
    }

    fn ensure_not_self(operator: &Operator, id: UserId, action: &str) -> Result<()> {
        if operator.user_id == Some(id) {
            return Err(Error::InvalidUser(format!("cannot {} your own account", action)));
        }
        Ok(())
    }

    async fn ensure_username_free(&self, username: &str, owner: Option<UserId>) -> Result<()> {
        let holder = self.deadline.run(self.store.find_user_by_username(username)).await?;
        match holder {
            Some(holder) if Some(holder.id) != owner => {
                Err(Error::DuplicateUsername(username.to_string()))
            }
            _ => Ok(()),
        }
    }
}
