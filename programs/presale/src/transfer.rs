//! Token and currency movement.
//!
//! The ledger never moves value itself. Each state transition that pays or
//! delivers something calls a [`TransferAgent`] first and only commits if the
//! transfer succeeded.

use {
    log::*,
    parking_lot::Mutex,
    solana_pubkey::Pubkey,
    std::collections::HashMap,
};

/// What is being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    /// The currency contributors pay with.
    Currency,
    /// The token being sold.
    Token { mint: Pubkey },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("insufficient {asset:?} balance in {owner}: {available} < {requested}")]
    InsufficientFunds {
        asset: Asset,
        owner: Pubkey,
        available: u64,
        requested: u64,
    },
    #[error("balance overflow crediting {0}")]
    Overflow(Pubkey),
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Collaborator that moves `amount` of `asset` from `from` to `to`.
///
/// Implementations must be all-or-nothing: on `Err` no balance has changed.
pub trait TransferAgent: Send + Sync {
    fn transfer(
        &self,
        asset: Asset,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), TransferError>;
}

/// Balances kept in memory, for local simulation and tests.
#[derive(Debug, Default)]
pub struct InMemoryBank {
    balances: Mutex<HashMap<(Asset, Pubkey), u64>>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` out of thin air (funding wallets and vaults).
    pub fn mint_to(&self, asset: Asset, owner: &Pubkey, amount: u64) -> Result<(), TransferError> {
        let mut balances = self.balances.lock();
        let balance = balances.entry((asset, *owner)).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(TransferError::Overflow(*owner))?;
        Ok(())
    }

    pub fn balance(&self, asset: Asset, owner: &Pubkey) -> u64 {
        self.balances
            .lock()
            .get(&(asset, *owner))
            .copied()
            .unwrap_or_default()
    }
}

impl TransferAgent for InMemoryBank {
    fn transfer(
        &self,
        asset: Asset,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), TransferError> {
        let mut balances = self.balances.lock();
        let available = balances.get(&(asset, *from)).copied().unwrap_or_default();
        let remaining = available
            .checked_sub(amount)
            .ok_or(TransferError::InsufficientFunds {
                asset,
                owner: *from,
                available,
                requested: amount,
            })?;
        if from == to {
            return Ok(());
        }
        let credited = balances
            .get(&(asset, *to))
            .copied()
            .unwrap_or_default()
            .checked_add(amount)
            .ok_or(TransferError::Overflow(*to))?;
        balances.insert((asset, *from), remaining);
        balances.insert((asset, *to), credited);
        trace!("transfer {amount} {asset:?}: {from} -> {to}");
        Ok(())
    }
}
