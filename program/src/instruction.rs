use solana_program::{
    clock::UnixTimestamp,
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;

use crate::{
    merkle::{ClaimLeafData, MerkleHash},
    utils,
};

/// Longest refund proof accepted, enough for 2^32 leaves
pub const MAX_PROOF_LEN: usize = 32;

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Initialize a raffle in pre-created accounts
    ///
    /// Accounts expected:
    /// 0. `[signer]` The payer, becomes the admin if `admin` is the payer
    /// 1. `[writable]` The raffle account, program owned and uninitialized
    /// 2. `[writable]` The ticket ledger account, program owned and zeroed
    InitializeRaffle {
        admin: Pubkey,
        /// Price per ticket in lamports
        ticket_price: u64,
        end_date: UnixTimestamp,
        platform_fee: u64,
        prize_amount: u64,
        payout_wallet: Pubkey,
        randomness_service: Pubkey,
        key_hash: [u8; 32],
    },

    /// Open or close participation (admin only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The raffle account
    SetEnabled { enabled: bool },

    /// Buy `value / ticket_price` tickets
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The buyer
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The ticket ledger account
    /// 3. `[]` The system program
    Participate { value: u64 },

    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The raffle account
    SetSubscriptionId { subscription_id: u64 },

    /// Returns the subscription id as little-endian return data (admin only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[]` The raffle account
    GetSubscriptionId,

    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The raffle account
    UpdateEndDate { end_date: UnixTimestamp },

    /// Accounts expected:
    /// 0. `[signer]` The current admin
    /// 1. `[writable]` The raffle account
    UpdateAdmin { new_admin: Pubkey },

    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The raffle account
    CancelRaffle,

    /// Send held lamports to the payout wallet
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The payout wallet
    WithdrawProceeds,

    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The raffle account
    SetRefundsMerkleRoot { root: MerkleHash },

    /// Claim the refund committed to by one leaf of the refunds root
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The claimant, pays for the claim record
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The claim record PDA for `leaf.index`
    /// 3. `[]` The system program
    ClaimRefund {
        leaf: ClaimLeafData,
        proof: Vec<MerkleHash>,
    },

    /// Randomness service callback
    ///
    /// Accounts expected:
    /// 0. `[signer]` The randomness service
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The ticket ledger account
    FulfillRandomWords {
        request_id: [u8; 32],
        random_value: [u8; 32],
    },

    /// Accounts expected:
    /// 0. `[signer, writable]` The winner
    /// 1. `[writable]` The raffle account
    ClaimPrize,
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (admin, rest) = Self::unpack_pubkey(rest)?;
                let (ticket_price, rest) = Self::unpack_u64(rest)?;
                let (end_date, rest) = Self::unpack_i64(rest)?;
                let (platform_fee, rest) = Self::unpack_u64(rest)?;
                let (prize_amount, rest) = Self::unpack_u64(rest)?;
                let (payout_wallet, rest) = Self::unpack_pubkey(rest)?;
                let (randomness_service, rest) = Self::unpack_pubkey(rest)?;
                let (key_hash, _) = Self::unpack_bytes32(rest)?;
                Self::InitializeRaffle {
                    admin,
                    ticket_price,
                    end_date,
                    platform_fee,
                    prize_amount,
                    payout_wallet,
                    randomness_service,
                    key_hash,
                }
            }
            1 => {
                let (flag, _) = Self::unpack_u8(rest)?;
                let enabled = match flag {
                    0 => false,
                    1 => true,
                    _ => return Err(ProgramError::InvalidInstructionData),
                };
                Self::SetEnabled { enabled }
            }
            2 => {
                let (value, _) = Self::unpack_u64(rest)?;
                Self::Participate { value }
            }
            3 => {
                let (subscription_id, _) = Self::unpack_u64(rest)?;
                Self::SetSubscriptionId { subscription_id }
            }
            4 => Self::GetSubscriptionId,
            5 => {
                let (end_date, _) = Self::unpack_i64(rest)?;
                Self::UpdateEndDate { end_date }
            }
            6 => {
                let (new_admin, _) = Self::unpack_pubkey(rest)?;
                Self::UpdateAdmin { new_admin }
            }
            7 => Self::CancelRaffle,
            8 => Self::WithdrawProceeds,
            9 => {
                let (root, _) = Self::unpack_bytes32(rest)?;
                Self::SetRefundsMerkleRoot { root }
            }
            10 => {
                let leaf = rest
                    .get(..ClaimLeafData::LEN)
                    .and_then(ClaimLeafData::unpack)
                    .ok_or(ProgramError::InvalidInstructionData)?;
                let (len, mut rest) = Self::unpack_u8(&rest[ClaimLeafData::LEN..])?;
                if len as usize > MAX_PROOF_LEN {
                    return Err(ProgramError::InvalidInstructionData);
                }
                let mut proof = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    let (node, next) = Self::unpack_bytes32(rest)?;
                    proof.push(node);
                    rest = next;
                }
                Self::ClaimRefund { leaf, proof }
            }
            11 => {
                let (request_id, rest) = Self::unpack_bytes32(rest)?;
                let (random_value, _) = Self::unpack_bytes32(rest)?;
                Self::FulfillRandomWords {
                    request_id,
                    random_value,
                }
            }
            12 => Self::ClaimPrize,
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeRaffle {
                admin,
                ticket_price,
                end_date,
                platform_fee,
                prize_amount,
                payout_wallet,
                randomness_service,
                key_hash,
            } => {
                buf.push(0);
                buf.extend_from_slice(admin.as_ref());
                buf.extend_from_slice(&ticket_price.to_le_bytes());
                buf.extend_from_slice(&end_date.to_le_bytes());
                buf.extend_from_slice(&platform_fee.to_le_bytes());
                buf.extend_from_slice(&prize_amount.to_le_bytes());
                buf.extend_from_slice(payout_wallet.as_ref());
                buf.extend_from_slice(randomness_service.as_ref());
                buf.extend_from_slice(key_hash);
            }
            Self::SetEnabled { enabled } => {
                buf.push(1);
                buf.push(*enabled as u8);
            }
            Self::Participate { value } => {
                buf.push(2);
                buf.extend_from_slice(&value.to_le_bytes());
            }
            Self::SetSubscriptionId { subscription_id } => {
                buf.push(3);
                buf.extend_from_slice(&subscription_id.to_le_bytes());
            }
            Self::GetSubscriptionId => buf.push(4),
            Self::UpdateEndDate { end_date } => {
                buf.push(5);
                buf.extend_from_slice(&end_date.to_le_bytes());
            }
            Self::UpdateAdmin { new_admin } => {
                buf.push(6);
                buf.extend_from_slice(new_admin.as_ref());
            }
            Self::CancelRaffle => buf.push(7),
            Self::WithdrawProceeds => buf.push(8),
            Self::SetRefundsMerkleRoot { root } => {
                buf.push(9);
                buf.extend_from_slice(root);
            }
            Self::ClaimRefund { leaf, proof } => {
                buf.push(10);
                buf.extend_from_slice(&leaf.pack());
                buf.push(proof.len() as u8);
                for node in proof {
                    buf.extend_from_slice(node);
                }
            }
            Self::FulfillRandomWords {
                request_id,
                random_value,
            } => {
                buf.push(11);
                buf.extend_from_slice(request_id);
                buf.extend_from_slice(random_value);
            }
            Self::ClaimPrize => buf.push(12),
        }
        buf
    }

    fn unpack_u8(input: &[u8]) -> Result<(u8, &[u8]), ProgramError> {
        input
            .split_first()
            .map(|(value, rest)| (*value, rest))
            .ok_or(ProgramError::InvalidInstructionData)
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let value = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((value, &input[8..]))
    }

    fn unpack_i64(input: &[u8]) -> Result<(i64, &[u8]), ProgramError> {
        let value = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(i64::from_le_bytes)
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((value, &input[8..]))
    }

    fn unpack_bytes32(input: &[u8]) -> Result<([u8; 32], &[u8]), ProgramError> {
        let value = input
            .get(..32)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((value, &input[32..]))
    }

    fn unpack_pubkey(input: &[u8]) -> Result<(Pubkey, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_bytes32(input)?;
        Ok((Pubkey::new_from_array(bytes), rest))
    }
}

fn admin_instruction(
    program_id: &Pubkey,
    admin: &Pubkey,
    raffle: &Pubkey,
    instruction: RaffleInstruction,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(*raffle, false),
        ],
        data: instruction.pack(),
    }
}

/// Create initialize_raffle instruction
#[allow(clippy::too_many_arguments)]
pub fn initialize_raffle(
    program_id: &Pubkey,
    payer: &Pubkey,
    raffle: &Pubkey,
    ticket_ledger: &Pubkey,
    admin: &Pubkey,
    ticket_price: u64,
    end_date: UnixTimestamp,
    platform_fee: u64,
    prize_amount: u64,
    payout_wallet: &Pubkey,
    randomness_service: &Pubkey,
    key_hash: [u8; 32],
) -> Instruction {
    let data = RaffleInstruction::InitializeRaffle {
        admin: *admin,
        ticket_price,
        end_date,
        platform_fee,
        prize_amount,
        payout_wallet: *payout_wallet,
        randomness_service: *randomness_service,
        key_hash,
    }
    .pack();

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*payer, true),
            AccountMeta::new(*raffle, false),
            AccountMeta::new(*ticket_ledger, false),
        ],
        data,
    }
}

/// Create set_enabled instruction
pub fn set_enabled(program_id: &Pubkey, admin: &Pubkey, raffle: &Pubkey, enabled: bool) -> Instruction {
    admin_instruction(
        program_id,
        admin,
        raffle,
        RaffleInstruction::SetEnabled { enabled },
    )
}

/// Create participate instruction
pub fn participate(
    program_id: &Pubkey,
    buyer: &Pubkey,
    raffle: &Pubkey,
    ticket_ledger: &Pubkey,
    value: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*buyer, true),
            AccountMeta::new(*raffle, false),
            AccountMeta::new(*ticket_ledger, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: RaffleInstruction::Participate { value }.pack(),
    }
}

/// Create set_subscription_id instruction
pub fn set_subscription_id(
    program_id: &Pubkey,
    admin: &Pubkey,
    raffle: &Pubkey,
    subscription_id: u64,
) -> Instruction {
    admin_instruction(
        program_id,
        admin,
        raffle,
        RaffleInstruction::SetSubscriptionId { subscription_id },
    )
}

/// Create get_subscription_id instruction
pub fn get_subscription_id(program_id: &Pubkey, admin: &Pubkey, raffle: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new_readonly(*raffle, false),
        ],
        data: RaffleInstruction::GetSubscriptionId.pack(),
    }
}

/// Create update_end_date instruction
pub fn update_end_date(
    program_id: &Pubkey,
    admin: &Pubkey,
    raffle: &Pubkey,
    end_date: UnixTimestamp,
) -> Instruction {
    admin_instruction(
        program_id,
        admin,
        raffle,
        RaffleInstruction::UpdateEndDate { end_date },
    )
}

/// Create update_admin instruction
pub fn update_admin(program_id: &Pubkey, admin: &Pubkey, raffle: &Pubkey, new_admin: &Pubkey) -> Instruction {
    admin_instruction(
        program_id,
        admin,
        raffle,
        RaffleInstruction::UpdateAdmin {
            new_admin: *new_admin,
        },
    )
}

/// Create cancel_raffle instruction
pub fn cancel_raffle(program_id: &Pubkey, admin: &Pubkey, raffle: &Pubkey) -> Instruction {
    admin_instruction(program_id, admin, raffle, RaffleInstruction::CancelRaffle)
}

/// Create withdraw_proceeds instruction
pub fn withdraw_proceeds(
    program_id: &Pubkey,
    admin: &Pubkey,
    raffle: &Pubkey,
    payout_wallet: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(*raffle, false),
            AccountMeta::new(*payout_wallet, false),
        ],
        data: RaffleInstruction::WithdrawProceeds.pack(),
    }
}

/// Create set_refunds_merkle_root instruction
pub fn set_refunds_merkle_root(
    program_id: &Pubkey,
    admin: &Pubkey,
    raffle: &Pubkey,
    root: MerkleHash,
) -> Instruction {
    admin_instruction(
        program_id,
        admin,
        raffle,
        RaffleInstruction::SetRefundsMerkleRoot { root },
    )
}

/// Create claim_refund instruction, deriving the claim record address
pub fn claim_refund(
    program_id: &Pubkey,
    claimant: &Pubkey,
    raffle: &Pubkey,
    leaf: ClaimLeafData,
    proof: Vec<MerkleHash>,
) -> Instruction {
    let (claim_record, _) = utils::find_claim_record_address(program_id, raffle, leaf.index);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*claimant, true),
            AccountMeta::new(*raffle, false),
            AccountMeta::new(claim_record, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: RaffleInstruction::ClaimRefund { leaf, proof }.pack(),
    }
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    randomness_service: &Pubkey,
    raffle: &Pubkey,
    ticket_ledger: &Pubkey,
    request_id: [u8; 32],
    random_value: [u8; 32],
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*randomness_service, true),
            AccountMeta::new(*raffle, false),
            AccountMeta::new_readonly(*ticket_ledger, false),
        ],
        data: RaffleInstruction::FulfillRandomWords {
            request_id,
            random_value,
        }
        .pack(),
    }
}

/// Create claim_prize instruction
pub fn claim_prize(program_id: &Pubkey, winner: &Pubkey, raffle: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*winner, true),
            AccountMeta::new(*raffle, false),
        ],
        data: RaffleInstruction::ClaimPrize.pack(),
    }
}
