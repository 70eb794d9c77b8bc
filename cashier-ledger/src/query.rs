//! Ticket search

use crate::types::{ClientId, Ticket, TicketType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Timestamp ordering of search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Most recent first
    #[default]
    NewestFirst,
    /// Oldest first
    OldestFirst,
}

/// Ticket filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    /// Only tickets of this type
    pub ticket_type: Option<TicketType>,
    /// Case-insensitive substring of the client name or the ticket code
    pub search: Option<String>,
    /// Result order
    pub order: SortOrder,
}

impl TicketQuery {
    /// Query matching every ticket, newest first
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one ticket type
    pub fn of_type(mut self, ticket_type: TicketType) -> Self {
        self.ticket_type = Some(ticket_type);
        self
    }

    /// Restrict to tickets whose client name or code contains `term`
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Set the result order
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Whether a ticket passes the filter. Unknown clients match on code only.
    pub fn matches(&self, ticket: &Ticket, names: &HashMap<ClientId, String>) -> bool {
        if let Some(ticket_type) = self.ticket_type {
            if ticket.ticket_type != ticket_type {
                return false;
            }
        }

        let term = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => term.to_lowercase(),
            _ => return true,
        };

        let name_hit = names
            .get(&ticket.client_id)
            .map(|name| name.to_lowercase().contains(&term))
            .unwrap_or(false);

        name_hit || ticket.code.to_lowercase().contains(&term)
    }

    /// Filter and sort
    pub fn apply(&self, tickets: Vec<Ticket>, names: &HashMap<ClientId, String>) -> Vec<Ticket> {
        let mut hits: Vec<Ticket> = tickets
            .into_iter()
            .filter(|ticket| self.matches(ticket, names))
            .collect();

        match self.order {
            SortOrder::NewestFirst => {
                hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)))
            }
            SortOrder::OldestFirst => {
                hits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)))
            }
        }

        hits
    }
}
