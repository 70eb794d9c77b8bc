//! Role based permissions
//!
//! Roles map to a fixed set of permissions. Checks are pure and never touch
//! the store.

use crate::types::UserId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Back-office role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access
    Admin,
    /// Cage cashier
    Cashier,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::Cashier => f.write_str("cashier"),
        }
    }
}

/// Something an operator may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// List and open active clients
    ViewClients,
    /// Also see inactive clients
    ViewInactiveClients,
    /// Create, edit and (de)activate clients
    ManageClients,
    /// Register deposits and withdrawals
    CreateTickets,
    /// Edit or delete existing tickets
    EditTickets,
    /// Export the tickets of the current day
    ExportDailyTickets,
    /// Export the full ticket history
    ExportAllTickets,
    /// Read dashboard figures
    ViewDashboard,
    /// Administer back-office users
    ManageUsers,
    /// Change application settings
    ManageSettings,
}

impl Permission {
    /// Every permission
    pub const ALL: [Permission; 10] = [
        Permission::ViewClients,
        Permission::ViewInactiveClients,
        Permission::ManageClients,
        Permission::CreateTickets,
        Permission::EditTickets,
        Permission::ExportDailyTickets,
        Permission::ExportAllTickets,
        Permission::ViewDashboard,
        Permission::ManageUsers,
        Permission::ManageSettings,
    ];
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            Permission::ViewClients => "view clients",
            Permission::ViewInactiveClients => "view inactive clients",
            Permission::ManageClients => "manage clients",
            Permission::CreateTickets => "create tickets",
            Permission::EditTickets => "edit tickets",
            Permission::ExportDailyTickets => "export daily tickets",
            Permission::ExportAllTickets => "export all tickets",
            Permission::ViewDashboard => "view dashboard",
            Permission::ManageUsers => "manage users",
            Permission::ManageSettings => "manage settings",
        };
        f.write_str(action)
    }
}

/// Whether `role` holds `permission`
pub fn has_permission(role: Role, permission: Permission) -> bool {
    match role {
        Role::Admin => true,
        Role::Cashier => matches!(
            permission,
            Permission::ViewClients
                | Permission::CreateTickets
                | Permission::ExportDailyTickets
                | Permission::ViewDashboard
        ),
    }
}

/// Identity performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    /// Acting user; `None` for the system itself
    pub user_id: Option<UserId>,
    /// Role of the acting user
    pub role: Role,
}

impl Operator {
    /// Operator backed by a user
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    /// Built-in administrator, used by batch tooling
    pub fn system() -> Self {
        Self {
            user_id: None,
            role: Role::Admin,
        }
    }

    /// Whether this operator holds `permission`
    pub fn can(&self, permission: Permission) -> bool {
        has_permission(self.role, permission)
    }

    /// Fail with `PermissionDenied` unless this operator holds `permission`
    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::warn!(role = %self.role, %permission, "Permission denied");
            Err(Error::PermissionDenied {
                role: self.role,
                permission,
            })
        }
    }
}
