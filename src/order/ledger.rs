//! Optimistic writes to the order ledger
//!
//! Every mutation after creation runs through [`apply`]: read the current
//! document, let a pure closure decide what changes, then swap it in only if
//! nobody else wrote in between. A lost race re-reads and re-decides, so the
//! closure always sees the latest state.

use uuid::Uuid;

use super::error::OrderError;
use super::model::Order;
use crate::store::{Effect, Store};

const MAX_ATTEMPTS: usize = 5;

/// What a decision closure did to the order it was handed
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Nothing to write; the stored document is returned as is
    Unchanged,
    /// Persist the mutated document together with these effects
    Changed(Vec<Effect>),
}

impl Outcome {
    pub fn changed() -> Self {
        Outcome::Changed(Vec::new())
    }
}

/// Read-decide-swap loop for one order.
///
/// `decide` receives a copy of the stored order, mutates it and reports the
/// outcome. Errors from `decide` abort without writing anything.
pub async fn apply<E, F>(store: &dyn Store, order_id: Uuid, mut decide: F) -> Result<Order, E>
where
    E: From<OrderError> + Send,
    F: FnMut(&mut Order) -> Result<Outcome, E> + Send,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let current = store
            .get_order(order_id)
            .await
            .map_err(OrderError::from)?
            .ok_or(OrderError::NotFound)?;

        let mut next = current.clone();
        let effects = match decide(&mut next)? {
            Outcome::Unchanged => return Ok(current),
            Outcome::Changed(effects) => effects,
        };

        next.version = current.version + 1;
        let swapped = store
            .compare_and_swap_order(&next, current.version, &effects)
            .await
            .map_err(OrderError::from)?;

        if swapped {
            return Ok(next);
        }

        tracing::debug!(
            order_id = %order_id,
            attempt = attempt,
            "Order changed underneath us, retrying"
        );
    }

    tracing::warn!(order_id = %order_id, "Giving up on contended order update");
    Err(OrderError::Contention.into())
}
