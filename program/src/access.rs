use solana_program::{msg, pubkey::Pubkey};

use crate::{error::RaffleError, state::RaffleConfig};

/// Role a caller holds for one raffle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Public,
}

impl Role {
    pub fn of(config: &RaffleConfig, caller: &Pubkey) -> Self {
        if *caller == config.admin {
            Role::Admin
        } else {
            Role::Public
        }
    }
}

pub fn require_admin(config: &RaffleConfig, caller: &Pubkey) -> Result<(), RaffleError> {
    match Role::of(config, caller) {
        Role::Admin => Ok(()),
        Role::Public => {
            msg!("Only the raffle admin can perform this action");
            Err(RaffleError::AccessDenied)
        }
    }
}
