// Raffle program - account helpers
use solana_program::{account_info::AccountInfo, pubkey::Pubkey, rent::Rent};

/// Seed prefix of claim record PDAs
pub const CLAIM_SEED: &[u8] = b"claim";

/// Find the claim record address for refund leaf `index` of `raffle`
pub fn find_claim_record_address(program_id: &Pubkey, raffle: &Pubkey, index: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[CLAIM_SEED, raffle.as_ref(), &index.to_le_bytes()],
        program_id,
    )
}

/// Lamports an account holds above its rent-exempt minimum
pub fn spendable_lamports(account: &AccountInfo, rent: &Rent) -> u64 {
    account
        .lamports()
        .saturating_sub(rent.minimum_balance(account.data_len()))
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}
