//! CSV export of tickets
//!
//! Rows are projected from tickets plus two best-effort lookups (client name,
//! creator username). A failed lookup never aborts the export; the row gets
//! the configured placeholder instead.
//!
//! Every field is quoted and embedded quotes are doubled, so names holding
//! commas or quotes survive a round trip through any CSV reader.

use crate::{
    calendar::local_date,
    ledger::Ledger,
    permissions::{Operator, Permission},
    types::{ClientId, Ticket, UserId},
    Result,
};
use chrono::FixedOffset;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Text of an export that selected no tickets
pub const EMPTY_EXPORT: &str = "No tickets to export";

/// Which tickets to export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// Full history
    All,
    /// Tickets since local midnight
    Today,
}

impl ExportScope {
    /// Permission needed for this scope
    pub fn permission(&self) -> Permission {
        match self {
            ExportScope::All => Permission::ExportAllTickets,
            ExportScope::Today => Permission::ExportDailyTickets,
        }
    }
}

impl FromStr for ExportScope {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ExportScope::All),
            "today" => Ok(ExportScope::Today),
            other => Err(crate::Error::Config(format!("Unknown export scope: {}", other))),
        }
    }
}

/// Result of an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Export {
    /// No ticket matched the scope
    Empty,
    /// CSV document with a header and `rows` data rows
    Csv {
        /// Data rows, header excluded
        rows: usize,
        /// Document text
        content: String,
    },
}

impl Export {
    /// True when no ticket matched
    pub fn is_empty(&self) -> bool {
        matches!(self, Export::Empty)
    }

    /// Number of data rows
    pub fn rows(&self) -> usize {
        match self {
            Export::Empty => 0,
            Export::Csv { rows, .. } => *rows,
        }
    }

    /// Document text, or the empty sentinel
    pub fn as_text(&self) -> &str {
        match self {
            Export::Empty => EMPTY_EXPORT,
            Export::Csv { content, .. } => content,
        }
    }
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

/// One CSV line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    /// Ticket code
    #[serde(rename = "Code")]
    pub code: String,
    /// Local date
    #[serde(rename = "Date")]
    pub date: String,
    /// Local time of day
    #[serde(rename = "Time")]
    pub time: String,
    /// Client name or placeholder
    #[serde(rename = "Client")]
    pub client: String,
    /// Type label
    #[serde(rename = "Type")]
    pub ticket_type: String,
    /// Payment method label
    #[serde(rename = "Payment method")]
    pub payment_method: String,
    /// Amount, two decimals
    #[serde(rename = "Amount")]
    pub amount: String,
    /// Creator username or placeholder
    #[serde(rename = "Created by")]
    pub created_by: String,
}

impl ExportRow {
    /// Project a ticket with resolved names, dates in local time
    pub fn new(ticket: &Ticket, client: &str, created_by: &str, offset: FixedOffset) -> Self {
        let local = ticket.timestamp.with_timezone(&offset);
        Self {
            code: ticket.code.clone(),
            date: local_date(ticket.timestamp, offset).format("%Y-%m-%d").to_string(),
            time: local.format("%H:%M:%S").to_string(),
            client: client.to_string(),
            ticket_type: ticket.ticket_type.label().to_string(),
            payment_method: ticket.payment_method.label().to_string(),
            amount: format!("{:.2}", ticket.amount),
            created_by: created_by.to_string(),
        }
    }
}

/// Write rows as a fully quoted CSV document
pub fn render(rows: &[ExportRow]) -> Result<Export> {
    if rows.is_empty() {
        return Ok(Export::Empty);
    }

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| crate::Error::Io(e.into_error()))?;

    Ok(Export::Csv {
        rows: rows.len(),
        content: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

impl Ledger {
    /// Export tickets of a scope as CSV, newest first
    pub async fn export_tickets(&self, operator: &Operator, scope: ExportScope) -> Result<Export> {
        operator.require(scope.permission())?;
        let started = Instant::now();
        let offset = self.config.report.offset()?;

        let mut tickets = match scope {
            ExportScope::All => self.call(self.store.list_tickets()).await?,
            ExportScope::Today => {
                let since = self.today_start()?;
                self.call(self.store.list_tickets_since(since)).await?
            }
        };
        tickets.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        let mut client_names: HashMap<ClientId, String> = HashMap::new();
        let mut usernames: HashMap<UserId, String> = HashMap::new();
        let mut rows = Vec::with_capacity(tickets.len());

        for ticket in &tickets {
            if !client_names.contains_key(&ticket.client_id) {
                let name = self.client_label(ticket.client_id).await;
                client_names.insert(ticket.client_id, name);
            }
            let created_by = match ticket.created_by {
                Some(user_id) => {
                    if !usernames.contains_key(&user_id) {
                        let name = self.user_label(user_id).await;
                        usernames.insert(user_id, name);
                    }
                    usernames[&user_id].clone()
                }
                None => self.config.report.system_user_label.clone(),
            };

            rows.push(ExportRow::new(
                ticket,
                &client_names[&ticket.client_id],
                &created_by,
                offset,
            ));
        }

        let export = render(&rows)?;
        self.metrics
            .record_export_duration(started.elapsed().as_secs_f64());

        tracing::info!(?scope, rows = export.rows(), "Tickets exported");
        Ok(export)
    }

    async fn client_label(&self, client_id: ClientId) -> String {
        match self.call(self.store.get_client_name(client_id)).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(client_id = %client_id, error = %e, "Client name lookup failed");
                self.config.report.unknown_client_label.clone()
            }
        }
    }

    async fn user_label(&self, user_id: UserId) -> String {
        match self.call(self.store.get_username(user_id)).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Username lookup failed");
                self.config.report.system_user_label.clone()
            }
        }
    }
}
