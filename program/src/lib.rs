// Goal raffle program
// Ticketed raffle that draws a winner with verifiable randomness once the
// funding goal is reached, or refunds participants against a merkle root.

pub mod access;
pub mod entrypoint;
pub mod error;
pub mod events;
pub mod instruction;
pub mod machine;
pub mod merkle;
pub mod processor;
pub mod state;
pub mod tickets;
pub mod utils;
pub mod vrf;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
