//! Back-office summary

use crate::{
    balance::balances_by_client,
    calendar::{day_start, local_date},
    ledger::Ledger,
    permissions::{Operator, Permission},
    types::{Amount, Client, Ticket, TicketType},
    Result,
};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Totals moved on one local day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyActivity {
    /// Local date
    pub date: NaiveDate,
    /// Sum of deposits
    pub deposits: Amount,
    /// Sum of withdrawals
    pub withdrawals: Amount,
}

/// Summary shown on the home screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    /// Registered clients
    pub client_count: usize,
    /// Active clients
    pub active_client_count: usize,
    /// Tickets on record
    pub ticket_count: usize,
    /// Sum of every client balance
    pub total_balance: Amount,
    /// Mean client balance, two decimals, 0 without clients
    pub average_balance: Amount,
    /// One entry per day of the window, oldest first
    pub activity: Vec<DailyActivity>,
    /// Newest tickets
    pub recent: Vec<Ticket>,
}

/// Build the summary from full tables
pub fn summarize(
    clients: &[Client],
    tickets: &[Ticket],
    now: DateTime<Utc>,
    offset: FixedOffset,
    activity_days: u32,
    recent_tickets: usize,
) -> Dashboard {
    let balances = balances_by_client(tickets);
    let total_balance: Amount = clients
        .iter()
        .filter_map(|client| balances.get(&client.id))
        .sum();
    let average_balance = if clients.is_empty() {
        Amount::ZERO
    } else {
        (total_balance / Amount::from(clients.len() as u64)).round_dp(2)
    };

    let today = local_date(now, offset);
    let mut days: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();
    for back in 0..activity_days {
        if let Some(date) = today.checked_sub_days(Days::new(back as u64)) {
            days.insert(
                date,
                DailyActivity {
                    date,
                    deposits: Amount::ZERO,
                    withdrawals: Amount::ZERO,
                },
            );
        }
    }
    for ticket in tickets {
        if let Some(day) = days.get_mut(&local_date(ticket.timestamp, offset)) {
            match ticket.ticket_type {
                TicketType::Deposit => day.deposits += ticket.amount,
                TicketType::Withdrawal => day.withdrawals += ticket.amount,
            }
        }
    }

    let mut recent = tickets.to_vec();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    recent.truncate(recent_tickets);

    Dashboard {
        client_count: clients.len(),
        active_client_count: clients.iter().filter(|client| client.active).count(),
        ticket_count: tickets.len(),
        total_balance,
        average_balance,
        activity: days.into_values().collect(),
        recent,
    }
}

impl Ledger {
    /// Current summary
    pub async fn dashboard(&self, operator: &Operator) -> Result<Dashboard> {
        operator.require(Permission::ViewDashboard)?;

        let offset = self.config.report.offset()?;
        let clients = self.call(self.store.list_clients()).await?;
        let tickets = self.call(self.store.list_tickets()).await?;
        let now = Utc::now();

        tracing::debug!(
            clients = clients.len(),
            tickets = tickets.len(),
            window_start = %day_start(local_date(now, offset), offset),
            "Building dashboard"
        );

        Ok(summarize(
            &clients,
            &tickets,
            now,
            offset,
            self.config.report.activity_days,
            self.config.report.recent_tickets,
        ))
    }
}
