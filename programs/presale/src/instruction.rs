//! Instruction definitions for the Presale program.
//!
//! Every instruction is an 8-byte opcode followed by its Borsh-encoded
//! arguments. Opcodes are the first eight bytes of `sha256("global:<name>")`
//! (see [`crate::constants`]), so the encoding matches existing client tooling.

use {
    crate::{
        constants::*,
        pda::{
            find_allocation_address, find_currency_vault_address, find_presale_address,
            find_token_vault_address,
        },
        state::{ContributionLimits, VestingSchedule},
    },
    borsh::{BorshDeserialize, BorshSerialize},
    solana_clock::UnixTimestamp,
    solana_instruction::{AccountMeta, Instruction},
    solana_pubkey::Pubkey,
    std::io::{Error, ErrorKind, Read, Write},
};

/// Arguments of [`PresaleInstruction::InitializePresale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct InitializePresaleArgs {
    /// Mint of the token being sold. The presale address is derived from it.
    pub mint: Pubkey,
    /// Smallest currency units per smallest token unit.
    pub price: u64,
    pub max_tokens: u64,
    pub max_raise: u64,
    /// Unix time at which tokens start to vest.
    pub cliff_timestamp: UnixTimestamp,
    pub vesting: VestingSchedule,
    /// Per-contribution bounds and sale window. All zero places no bound.
    pub limits: ContributionLimits,
}

/// Instructions supported by the Presale program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresaleInstruction {
    /// Create the presale for a mint. The signer becomes its admin.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer, writable]` — Admin.
    /// 1. `[writable]`         — Presale account, `["presale", mint]`.
    InitializePresale(InitializePresaleArgs),

    /// Buy `amount / price` tokens for `amount` currency.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer, writable]` — Contributor (currency source).
    /// 1. `[writable]`         — Presale account.
    /// 2. `[writable]`         — Allocation account, `["allocation", presale, contributor]`.
    /// 3. `[writable]`         — Currency vault, `["currency_vault", presale]`.
    Contribute { amount: u64 },

    /// Withdraw `amount` vested tokens from the caller's allocation.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Contributor (token destination).
    /// 1. `[]`         — Presale account.
    /// 2. `[writable]` — Allocation account.
    /// 3. `[writable]` — Token vault, `["token_vault", presale]`.
    ClaimTokens { amount: u64 },

    /// Return the caller's currency and cancel their allocation. Only valid
    /// before anything has been claimed.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer, writable]` — Contributor (currency destination).
    /// 1. `[writable]`         — Presale account.
    /// 2. `[writable]`         — Allocation account.
    /// 3. `[writable]`         — Currency vault.
    RefundTokens,

    /// Deliver everything currently claimable to each listed allocation.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[]`         — Presale account.
    /// 2. `[writable]` — Token vault.
    /// 3.. `[writable]` — Allocation accounts, at most `max_airdrop_batch`.
    AirdropTokens,

    /// Change the price applied to future contributions.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[writable]` — Presale account.
    UpdatePresalePrice { new_price: u64 },

    /// Stop accepting contributions. One-way.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer]`   — Admin.
    /// 1. `[writable]` — Presale account.
    ClosePresale,
}

impl PresaleInstruction {
    pub fn opcode(&self) -> [u8; OPCODE_LEN] {
        match self {
            Self::InitializePresale(_) => INITIALIZE_PRESALE_OPCODE,
            Self::Contribute { .. } => CONTRIBUTE_OPCODE,
            Self::ClaimTokens { .. } => CLAIM_TOKENS_OPCODE,
            Self::RefundTokens => REFUND_TOKENS_OPCODE,
            Self::AirdropTokens => AIRDROP_TOKENS_OPCODE,
            Self::UpdatePresalePrice { .. } => UPDATE_PRESALE_PRICE_OPCODE,
            Self::ClosePresale => CLOSE_PRESALE_OPCODE,
        }
    }

    /// Opcode followed by the Borsh-encoded arguments.
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        borsh::to_vec(self)
    }

    /// Decodes instruction data. Unknown opcodes, short arguments and trailing
    /// bytes are all rejected.
    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        borsh::from_slice(data)
    }
}

impl BorshSerialize for PresaleInstruction {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        writer.write_all(&self.opcode())?;
        match self {
            Self::InitializePresale(args) => args.serialize(writer),
            Self::Contribute { amount } | Self::ClaimTokens { amount } => amount.serialize(writer),
            Self::UpdatePresalePrice { new_price } => new_price.serialize(writer),
            Self::RefundTokens | Self::AirdropTokens | Self::ClosePresale => Ok(()),
        }
    }
}

impl BorshDeserialize for PresaleInstruction {
    fn deserialize_reader<R: Read>(reader: &mut R) -> Result<Self, Error> {
        let opcode = <[u8; OPCODE_LEN]>::deserialize_reader(reader)?;
        let instruction = match opcode {
            INITIALIZE_PRESALE_OPCODE => {
                Self::InitializePresale(InitializePresaleArgs::deserialize_reader(reader)?)
            }
            CONTRIBUTE_OPCODE => Self::Contribute {
                amount: u64::deserialize_reader(reader)?,
            },
            CLAIM_TOKENS_OPCODE => Self::ClaimTokens {
                amount: u64::deserialize_reader(reader)?,
            },
            REFUND_TOKENS_OPCODE => Self::RefundTokens,
            AIRDROP_TOKENS_OPCODE => Self::AirdropTokens,
            UPDATE_PRESALE_PRICE_OPCODE => Self::UpdatePresalePrice {
                new_price: u64::deserialize_reader(reader)?,
            },
            CLOSE_PRESALE_OPCODE => Self::ClosePresale,
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("unknown presale opcode {opcode:?}"),
                ))
            }
        };
        Ok(instruction)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn initialize_presale(
    program_id: &Pubkey,
    admin: &Pubkey,
    args: InitializePresaleArgs,
) -> Instruction {
    let (presale, _) = find_presale_address(program_id, &args.mint);
    Instruction::new_with_borsh(
        *program_id,
        &PresaleInstruction::InitializePresale(args),
        vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new(presale, false),
        ],
    )
}

pub fn contribute(
    program_id: &Pubkey,
    contributor: &Pubkey,
    presale: &Pubkey,
    amount: u64,
) -> Instruction {
    let (allocation, _) = find_allocation_address(program_id, presale, contributor);
    let (currency_vault, _) = find_currency_vault_address(program_id, presale);
    Instruction::new_with_borsh(
        *program_id,
        &PresaleInstruction::Contribute { amount },
        vec![
            AccountMeta::new(*contributor, true),
            AccountMeta::new(*presale, false),
            AccountMeta::new(allocation, false),
            AccountMeta::new(currency_vault, false),
        ],
    )
}

pub fn claim_tokens(
    program_id: &Pubkey,
    contributor: &Pubkey,
    presale: &Pubkey,
    amount: u64,
) -> Instruction {
    let (allocation, _) = find_allocation_address(program_id, presale, contributor);
    let (token_vault, _) = find_token_vault_address(program_id, presale);
    Instruction::new_with_borsh(
        *program_id,
        &PresaleInstruction::ClaimTokens { amount },
        vec![
            AccountMeta::new_readonly(*contributor, true),
            AccountMeta::new_readonly(*presale, false),
            AccountMeta::new(allocation, false),
            AccountMeta::new(token_vault, false),
        ],
    )
}

pub fn refund_tokens(program_id: &Pubkey, contributor: &Pubkey, presale: &Pubkey) -> Instruction {
    let (allocation, _) = find_allocation_address(program_id, presale, contributor);
    let (currency_vault, _) = find_currency_vault_address(program_id, presale);
    Instruction::new_with_borsh(
        *program_id,
        &PresaleInstruction::RefundTokens,
        vec![
            AccountMeta::new(*contributor, true),
            AccountMeta::new(*presale, false),
            AccountMeta::new(allocation, false),
            AccountMeta::new(currency_vault, false),
        ],
    )
}

/// Airdrop to the allocations of `contributors`.
pub fn airdrop_tokens(
    program_id: &Pubkey,
    admin: &Pubkey,
    presale: &Pubkey,
    contributors: &[Pubkey],
) -> Instruction {
    let (token_vault, _) = find_token_vault_address(program_id, presale);
    let mut accounts = Vec::with_capacity(contributors.len().saturating_add(3));
    accounts.push(AccountMeta::new_readonly(*admin, true));
    accounts.push(AccountMeta::new_readonly(*presale, false));
    accounts.push(AccountMeta::new(token_vault, false));
    accounts.extend(contributors.iter().map(|contributor| {
        let (allocation, _) = find_allocation_address(program_id, presale, contributor);
        AccountMeta::new(allocation, false)
    }));
    Instruction::new_with_borsh(*program_id, &PresaleInstruction::AirdropTokens, accounts)
}

pub fn update_presale_price(
    program_id: &Pubkey,
    admin: &Pubkey,
    presale: &Pubkey,
    new_price: u64,
) -> Instruction {
    Instruction::new_with_borsh(
        *program_id,
        &PresaleInstruction::UpdatePresalePrice { new_price },
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(*presale, false),
        ],
    )
}

pub fn close_presale(program_id: &Pubkey, admin: &Pubkey, presale: &Pubkey) -> Instruction {
    Instruction::new_with_borsh(
        *program_id,
        &PresaleInstruction::ClosePresale,
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(*presale, false),
        ],
    )
}
