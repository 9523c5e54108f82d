//! Signer checks shared by every presale operation.

use {
    crate::{error::PresaleError, state::PresaleRecord},
    log::*,
    solana_instruction::AccountMeta,
    solana_pubkey::Pubkey,
};

/// The account that invoked an operation and whether it signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub key: Pubkey,
    pub is_signer: bool,
}

impl Caller {
    /// A caller whose signature has been verified.
    pub fn signed(key: Pubkey) -> Self {
        Self {
            key,
            is_signer: true,
        }
    }

    /// A caller that is named but did not sign.
    pub fn unsigned(key: Pubkey) -> Self {
        Self {
            key,
            is_signer: false,
        }
    }
}

impl From<&AccountMeta> for Caller {
    fn from(meta: &AccountMeta) -> Self {
        Self {
            key: meta.pubkey,
            is_signer: meta.is_signer,
        }
    }
}

/// Capability an operation requires from its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role<'a> {
    /// Any signer. Used by `initialize`, where the signer becomes the admin.
    Signer,
    /// The admin recorded in the presale.
    Admin(&'a PresaleRecord),
    /// The owner of a specific allocation.
    Contributor(&'a Pubkey),
}

/// Verifies a caller against a [`Role`] before any state is touched.
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    pub fn require(caller: &Caller, role: Role) -> Result<(), PresaleError> {
        if !caller.is_signer {
            debug!("authorization: {} did not sign", caller.key);
            return Err(PresaleError::Unauthorized);
        }
        let authorized = match role {
            Role::Signer => true,
            Role::Admin(presale) => presale.admin == caller.key,
            Role::Contributor(contributor) => *contributor == caller.key,
        };
        if !authorized {
            debug!("authorization: {} does not hold {role:?}", caller.key);
            return Err(PresaleError::Unauthorized);
        }
        Ok(())
    }
}
