//! Per-account token credits and the tokens that back them.
//!
//! Crediting only books a claim; tokens move once, when they enter or leave
//! the engine's custody (`receive` / `release`). The ledger keeps both sides
//! so that `credited(token) <= held(token)` can be checked after every
//! commit.

use crate::error::{EngineError, EngineResult};
use compoundor_domain::{AccountId, DomainError, TokenAmount, TokenId};
use compoundor_protocols::TokenTransport;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct BalanceLedger {
    credits: HashMap<(AccountId, TokenId), TokenAmount>,
    credited: HashMap<TokenId, TokenAmount>,
    held: HashMap<TokenId, TokenAmount>,
}

fn add(a: TokenAmount, b: TokenAmount) -> EngineResult<TokenAmount> {
    a.checked_add(b)
        .ok_or(EngineError::Math(DomainError::MathOverflow))
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Books `amount` of `token` for `account`. Zero is a no-op.
    pub fn credit(&mut self, account: AccountId, token: TokenId, amount: TokenAmount) -> EngineResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self.credits.entry((account, token)).or_default();
        *balance = add(*balance, amount)?;
        let total = self.credited.entry(token).or_default();
        *total = add(*total, amount)?;
        Ok(())
    }

    /// Removes `amount` from `account`'s credit.
    pub fn debit(&mut self, account: AccountId, token: TokenId, amount: TokenAmount) -> EngineResult<()> {
        let available = self.balance_of(account, token);
        let remaining = available
            .checked_sub(amount)
            .ok_or(EngineError::InsufficientBalance {
                account,
                token,
                requested: amount,
                available,
            })?;

        if remaining.is_zero() {
            self.credits.remove(&(account, token));
        } else {
            self.credits.insert((account, token), remaining);
        }
        if let Some(total) = self.credited.get_mut(&token) {
            *total = total.saturating_sub(amount);
        }
        Ok(())
    }

    /// Debits `account` and transfers the tokens to `recipient`.
    ///
    /// Partial withdrawals are allowed; the remainder stays credited.
    pub fn withdraw<T: TokenTransport>(
        &mut self,
        transport: &mut T,
        account: AccountId,
        token: TokenId,
        amount: TokenAmount,
        recipient: AccountId,
    ) -> EngineResult<()> {
        self.debit(account, token, amount)?;
        self.release(token, amount)?;
        transport.transfer(token, recipient, amount)?;
        debug!(account = ?account, token = ?token, amount = %amount, "Balance withdrawn");
        Ok(())
    }

    /// Records tokens entering custody.
    pub fn receive(&mut self, token: TokenId, amount: TokenAmount) -> EngineResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let held = self.held.entry(token).or_default();
        *held = add(*held, amount)?;
        Ok(())
    }

    /// Records tokens leaving custody.
    pub fn release(&mut self, token: TokenId, amount: TokenAmount) -> EngineResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let held = self.held(token);
        let remaining = held
            .checked_sub(amount)
            .ok_or(EngineError::LedgerInvariantViolated {
                token,
                credited: self.credited(token),
                held,
            })?;
        self.held.insert(token, remaining);
        Ok(())
    }

    /// Fails if the credits issued for `token` exceed the tokens held.
    pub fn check_solvency(&self, token: TokenId) -> EngineResult<()> {
        let credited = self.credited(token);
        let held = self.held(token);
        if credited > held {
            return Err(EngineError::LedgerInvariantViolated {
                token,
                credited,
                held,
            });
        }
        Ok(())
    }

    pub fn balance_of(&self, account: AccountId, token: TokenId) -> TokenAmount {
        self.credits
            .get(&(account, token))
            .copied()
            .unwrap_or_default()
    }

    /// Non-zero credits of `account`, sorted by token.
    pub fn balances_of(&self, account: AccountId) -> Vec<(TokenId, TokenAmount)> {
        let mut balances: Vec<_> = self
            .credits
            .iter()
            .filter(|((owner, _), _)| *owner == account)
            .map(|((_, token), amount)| (*token, *amount))
            .collect();
        balances.sort();
        balances
    }

    /// Sum of all credits for `token`.
    pub fn credited(&self, token: TokenId) -> TokenAmount {
        self.credited.get(&token).copied().unwrap_or_default()
    }

    pub fn held(&self, token: TokenId) -> TokenAmount {
        self.held.get(&token).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compoundor_protocols::memory::MemoryTokens;

    fn token() -> TokenId {
        TokenId::from_low_u64_be(1)
    }

    #[test]
    fn test_credit_zero_is_noop() {
        let mut ledger = BalanceLedger::new();
        let alice = AccountId::repeat_byte(1);
        ledger.credit(alice, token(), TokenAmount::zero()).unwrap();
        assert!(ledger.balances_of(alice).is_empty());
    }

    #[test]
    fn test_incremental_withdrawals() {
        let mut ledger = BalanceLedger::new();
        let mut transport = MemoryTokens::new();
        let alice = AccountId::repeat_byte(1);
        let bob = AccountId::repeat_byte(2);

        ledger.receive(token(), TokenAmount::from(100u64)).unwrap();
        ledger.credit(alice, token(), TokenAmount::from(100u64)).unwrap();

        ledger
            .withdraw(&mut transport, alice, token(), TokenAmount::from(30u64), bob)
            .unwrap();
        ledger
            .withdraw(&mut transport, alice, token(), TokenAmount::from(70u64), bob)
            .unwrap();

        assert_eq!(ledger.balance_of(alice, token()), TokenAmount::zero());
        assert_eq!(transport.balance_of(token(), bob), TokenAmount::from(100u64));
        assert_eq!(ledger.held(token()), TokenAmount::zero());
        assert_eq!(ledger.credited(token()), TokenAmount::zero());
    }

    #[test]
    fn test_overdraw_rejected() {
        let mut ledger = BalanceLedger::new();
        let mut transport = MemoryTokens::new();
        let alice = AccountId::repeat_byte(1);
        ledger.receive(token(), TokenAmount::from(10u64)).unwrap();
        ledger.credit(alice, token(), TokenAmount::from(10u64)).unwrap();

        let err = ledger
            .withdraw(&mut transport, alice, token(), TokenAmount::from(11u64), alice)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientBalance {
                account: alice,
                token: token(),
                requested: TokenAmount::from(11u64),
                available: TokenAmount::from(10u64),
            }
        );
        assert_eq!(ledger.balance_of(alice, token()), TokenAmount::from(10u64));
    }

    #[test]
    fn test_solvency_check() {
        let mut ledger = BalanceLedger::new();
        let alice = AccountId::repeat_byte(1);
        ledger.receive(token(), TokenAmount::from(5u64)).unwrap();
        ledger.credit(alice, token(), TokenAmount::from(5u64)).unwrap();
        assert!(ledger.check_solvency(token()).is_ok());

        ledger.credit(alice, token(), TokenAmount::from(1u64)).unwrap();
        assert!(matches!(
            ledger.check_solvency(token()),
            Err(EngineError::LedgerInvariantViolated { .. })
        ));
    }
}
