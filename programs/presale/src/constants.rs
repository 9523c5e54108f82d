//! Presale program constants: opcode tags, address seeds and vesting units.

/// Basis points denominator (10_000 bps = 100%).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Seconds in one vesting month (30 days).
pub const SECONDS_PER_MONTH: i64 = 30 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Instruction opcode tags
//
//   Each tag is the first 8 bytes of sha256("global:<name>"), which keeps the
//   wire format compatible with the existing client scripts.
// ---------------------------------------------------------------------------

/// Length of the opcode tag that prefixes all instruction data.
pub const OPCODE_LEN: usize = 8;

/// `sha256("global:initialize_presale")[..8]`
pub const INITIALIZE_PRESALE_OPCODE: [u8; OPCODE_LEN] = [9, 174, 12, 126, 150, 119, 68, 100];

/// `sha256("global:contribute")[..8]`
pub const CONTRIBUTE_OPCODE: [u8; OPCODE_LEN] = [82, 33, 68, 131, 32, 0, 205, 95];

/// `sha256("global:claim_tokens")[..8]`
pub const CLAIM_TOKENS_OPCODE: [u8; OPCODE_LEN] = [108, 216, 210, 231, 0, 212, 42, 64];

/// `sha256("global:refund_tokens")[..8]`
pub const REFUND_TOKENS_OPCODE: [u8; OPCODE_LEN] = [217, 182, 86, 30, 121, 20, 123, 239];

/// `sha256("global:airdrop_tokens")[..8]`
pub const AIRDROP_TOKENS_OPCODE: [u8; OPCODE_LEN] = [242, 252, 19, 227, 43, 233, 89, 122];

/// `sha256("global:update_presale_price")[..8]`
pub const UPDATE_PRESALE_PRICE_OPCODE: [u8; OPCODE_LEN] =
    [140, 169, 214, 239, 57, 34, 66, 153];

/// `sha256("global:close_presale")[..8]`
pub const CLOSE_PRESALE_OPCODE: [u8; OPCODE_LEN] = [106, 242, 214, 215, 22, 75, 109, 211];

// ---------------------------------------------------------------------------
// Program-derived address seeds
// ---------------------------------------------------------------------------

pub const PRESALE_SEED: &[u8] = b"presale";
pub const ALLOCATION_SEED: &[u8] = b"allocation";
pub const CURRENCY_VAULT_SEED: &[u8] = b"currency_vault";
pub const TOKEN_VAULT_SEED: &[u8] = b"token_vault";

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default upper bound on allocation accounts in one airdrop instruction.
pub const DEFAULT_MAX_AIRDROP_BATCH: usize = 64;

/// Default monthly schedule: 10% at the cliff,
/// then 9% per month for 10 months.
pub const DEFAULT_MONTHLY_UPFRONT_BPS: u16 = 1_000;
pub const DEFAULT_MONTHLY_RELEASE_BPS: u16 = 900;
pub const DEFAULT_MONTHLY_PERIODS: u16 = 10;
