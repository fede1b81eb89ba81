use crate::error::{ProtocolError, ProtocolResult};
use crate::token::TokenTransport;
use compoundor_domain::{AccountId, TokenAmount, TokenId};
use std::collections::{HashMap, HashSet};

/// Balances received by external accounts.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokens {
    balances: HashMap<(TokenId, AccountId), TokenAmount>,
    rejecting: HashSet<AccountId>,
}

impl MemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, token: TokenId, account: AccountId) -> TokenAmount {
        self.balances
            .get(&(token, account))
            .copied()
            .unwrap_or_default()
    }

    /// Makes every transfer to `account` fail, like a recipient that reverts.
    pub fn reject_transfers_to(&mut self, account: AccountId) {
        self.rejecting.insert(account);
    }

    pub fn accept_transfers_to(&mut self, account: AccountId) {
        self.rejecting.remove(&account);
    }
}

impl TokenTransport for MemoryTokens {
    fn transfer(&mut self, token: TokenId, to: AccountId, amount: TokenAmount) -> ProtocolResult<()> {
        if self.rejecting.contains(&to) {
            return Err(ProtocolError::TransferRejected { token, to });
        }
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self.balances.entry((token, to)).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(compoundor_domain::DomainError::MathOverflow)?;
        Ok(())
    }
}
