//! Which account owns which custodied position.

use crate::error::{EngineError, EngineResult};
use compoundor_domain::{AccountId, PositionId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Entry {
    owner: AccountId,
    // Index in the owner's position list.
    slot: usize,
}

/// Custody records with a per-owner index.
///
/// Removal swaps the last element of the owner's list into the freed slot,
/// so list order is not stable.
#[derive(Debug, Clone, Default)]
pub struct CustodyRegistry {
    entries: HashMap<PositionId, Entry>,
    accounts: HashMap<AccountId, Vec<PositionId>>,
}

impl CustodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, position: PositionId, owner: AccountId) -> EngineResult<()> {
        if self.entries.contains_key(&position) {
            return Err(EngineError::AlreadyCustodied(position));
        }
        let list = self.accounts.entry(owner).or_default();
        list.push(position);
        self.entries.insert(
            position,
            Entry {
                owner,
                slot: list.len() - 1,
            },
        );
        Ok(())
    }

    /// Removes `position` if `caller` owns it.
    ///
    /// A position that is not custodied has no owner, so this also fails with
    /// `NotOwner`.
    pub fn withdraw(&mut self, position: PositionId, caller: AccountId) -> EngineResult<()> {
        let entry = match self.entries.get(&position) {
            Some(entry) if entry.owner == caller => *entry,
            _ => return Err(EngineError::NotOwner { position, caller }),
        };
        self.entries.remove(&position);

        if let Some(list) = self.accounts.get_mut(&entry.owner) {
            list.swap_remove(entry.slot);
            if let Some(moved) = list.get(entry.slot).copied() {
                if let Some(moved_entry) = self.entries.get_mut(&moved) {
                    moved_entry.slot = entry.slot;
                }
            }
            if list.is_empty() {
                self.accounts.remove(&entry.owner);
            }
        }
        Ok(())
    }

    pub fn owner_of(&self, position: PositionId) -> Option<AccountId> {
        self.entries.get(&position).map(|entry| entry.owner)
    }

    pub fn positions_of(&self, owner: AccountId) -> &[PositionId] {
        self.accounts
            .get(&owner)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_twice_fails() {
        let mut registry = CustodyRegistry::new();
        let owner = AccountId::repeat_byte(1);
        registry.deposit(PositionId::from(1), owner).unwrap();
        assert_eq!(
            registry.deposit(PositionId::from(1), AccountId::repeat_byte(2)),
            Err(EngineError::AlreadyCustodied(PositionId::from(1)))
        );
    }

    #[test]
    fn test_withdraw_by_owner_only() {
        let mut registry = CustodyRegistry::new();
        let owner = AccountId::repeat_byte(1);
        let other = AccountId::repeat_byte(2);
        let id = PositionId::from(1);
        registry.deposit(id, owner).unwrap();

        assert!(matches!(
            registry.withdraw(id, other),
            Err(EngineError::NotOwner { .. })
        ));
        registry.withdraw(id, owner).unwrap();
        assert_eq!(registry.owner_of(id), None);
        assert!(registry.positions_of(owner).is_empty());
        assert!(matches!(
            registry.withdraw(id, owner),
            Err(EngineError::NotOwner { .. })
        ));
    }

    #[test]
    fn test_swap_remove_keeps_index_consistent() {
        let mut registry = CustodyRegistry::new();
        let owner = AccountId::repeat_byte(1);
        for id in 1..=4u64 {
            registry.deposit(PositionId::from(id), owner).unwrap();
        }

        registry.withdraw(PositionId::from(1), owner).unwrap();
        // 4 moved into the first slot.
        assert_eq!(
            registry.positions_of(owner),
            &[PositionId::from(4), PositionId::from(2), PositionId::from(3)]
        );

        // The moved entry must still be removable from its new slot.
        registry.withdraw(PositionId::from(4), owner).unwrap();
        registry.withdraw(PositionId::from(3), owner).unwrap();
        assert_eq!(registry.positions_of(owner), &[PositionId::from(2)]);
        assert_eq!(registry.len(), 1);
    }
}
