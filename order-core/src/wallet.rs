//! Wallet deposits and withdrawals
//!
//! Balance changes are applied as guarded deltas inside the store, never as
//! read-modify-write of the balance column. Wallet movements are relational
//! only and produce no ledger event.

use crate::context::CoreContext;
use crate::locks::LockKey;
use crate::store::{Mutation, StoreTx};
use crate::types::{Actor, Direction, User, UserId};
use crate::{Error, Result};
use rust_decimal::Decimal;

/// Wallet operations
#[derive(Debug, Clone)]
pub struct Wallet {
    ctx: CoreContext,
}

impl Wallet {
    /// Create wallet service
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Deposit into or withdraw from the actor's own wallet
    pub async fn adjust_balance(
        &self,
        actor: &Actor,
        user_id: &UserId,
        amount: Decimal,
        direction: Direction,
    ) -> Result<User> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "Amount must be positive, got {}",
                amount
            )));
        }
        if actor.user_id != *user_id {
            return Err(Error::Unauthorized(format!(
                "{} cannot move funds of {}",
                actor.user_id, user_id
            )));
        }

        // orders debit under the same lock; see OrderLifecycle::create_order
        let _locks = self.ctx.locks.acquire([LockKey::user(user_id)]).await;

        let user = self.ctx.store.user(user_id)?;
        let delta = match direction {
            Direction::Deposit => {
                if user.wallet_balance.checked_add(amount).is_none() {
                    return Err(Error::Validation(format!(
                        "Deposit of {} would overflow the balance of {}",
                        amount, user.id
                    )));
                }
                amount
            }
            Direction::Withdraw => {
                if user.wallet_balance < amount {
                    return Err(Error::InsufficientFunds {
                        user_id: user.id,
                        required: amount,
                        available: user.wallet_balance,
                    });
                }
                -amount
            }
        };

        let tx = StoreTx::new().with(Mutation::AdjustBalance {
            user_id: user_id.clone(),
            delta,
        });

        match self.ctx.store.commit(tx) {
            Ok(()) => {}
            Err(Error::Conflict(_)) if direction == Direction::Withdraw => {
                let current = self.ctx.store.user(user_id)?;
                return Err(Error::InsufficientFunds {
                    user_id: current.id,
                    required: amount,
                    available: current.wallet_balance,
                });
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            user_id = %user_id,
            direction = ?direction,
            amount = %amount,
            "Wallet balance adjusted"
        );

        self.ctx.store.user(user_id)
    }

    /// Current balance
    pub fn balance(&self, user_id: &UserId) -> Result<Decimal> {
        Ok(self.ctx.store.user(user_id)?.wallet_balance)
    }
}
