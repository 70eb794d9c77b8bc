//! Balance fold and withdrawal rule
//!
//! A client balance is never stored. It is the signed sum of the client's
//! tickets: deposits add, withdrawals subtract. The fold is commutative, so
//! the order tickets come back from the store does not matter.
//!
//! # Invariants
//!
//! - `balance([]) == 0`
//! - `balance(H) == Σ deposits(H) − Σ withdrawals(H)` for every permutation of H
//! - A withdrawal of `A` against balance `B` is permitted iff `0 < A <= B`
//! - Every ticket amount lies in `(0, MAX_AMOUNT]`, so no realistic history can
//!   overflow the fold

use crate::types::{Amount, ClientId, Ticket, AMOUNT_SCALE};
use crate::{Error, Result};
use std::collections::HashMap;

/// Largest amount a single ticket may carry
pub const MAX_AMOUNT: Amount = Amount::from_parts(1_215_752_192, 23, 0, false, 2);

/// Fold tickets into a balance
pub fn balance<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Amount {
    tickets
        .into_iter()
        .fold(Amount::ZERO, |acc, ticket| acc + ticket.signed_amount())
}

/// Fold a mixed ticket list into one balance per client
pub fn balances_by_client<'a>(
    tickets: impl IntoIterator<Item = &'a Ticket>,
) -> HashMap<ClientId, Amount> {
    let mut balances = HashMap::new();
    for ticket in tickets {
        *balances.entry(ticket.client_id).or_insert(Amount::ZERO) += ticket.signed_amount();
    }
    balances
}

/// Reject amounts that are not strictly positive, exceed [`MAX_AMOUNT`] or
/// are finer than the minor unit.
pub fn validate_amount(amount: Amount) -> Result<Amount> {
    if amount <= Amount::ZERO
        || amount > MAX_AMOUNT
        || amount.normalize().scale() > AMOUNT_SCALE
    {
        return Err(Error::InvalidAmount(amount));
    }
    Ok(amount)
}

/// Check a withdrawal of `amount` against `available`
pub fn check_withdrawal(amount: Amount, available: Amount) -> Result<()> {
    validate_amount(amount)?;

    if amount > available {
        return Err(Error::InsufficientBalance {
            requested: amount,
            available,
        });
    }

    Ok(())
}

/// Boolean form of [`check_withdrawal`]
pub fn permits_withdrawal(amount: Amount, available: Amount) -> bool {
    check_withdrawal(amount, available).is_ok()
}
