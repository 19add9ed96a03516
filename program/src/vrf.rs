// VRF request/fulfillment bridge for the raffle program
//
// The program never waits on the randomness service. Reaching the goal derives
// a request id and logs it; the service later calls back with
// `FulfillRandomWords`, signed by its configured key.
use solana_program::{keccak, pubkey::Pubkey};

use crate::error::RaffleError;

/// Domain separator for request id derivation
pub const REQUEST_SEED: &[u8] = b"randomness-request";

/// An outstanding request as seen by the off-chain randomness service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub request_id: [u8; 32],
    pub subscription_id: u64,
    pub key_hash: [u8; 32],
}

impl RandomnessRequest {
    /// Builds the `nonce`-th request of `raffle`. Ids never repeat because the
    /// nonce only grows.
    pub fn new(raffle: &Pubkey, key_hash: [u8; 32], subscription_id: u64, nonce: u64) -> Self {
        let request_id = keccak::hashv(&[
            REQUEST_SEED,
            raffle.as_ref(),
            &key_hash,
            &subscription_id.to_le_bytes(),
            &nonce.to_le_bytes(),
        ])
        .to_bytes();
        Self {
            request_id,
            subscription_id,
            key_hash,
        }
    }
}

/// Checks an incoming fulfillment against the configured service and the
/// single outstanding request.
pub fn verify_fulfillment(
    pending: Option<&[u8; 32]>,
    randomness_service: &Pubkey,
    caller: &Pubkey,
    request_id: &[u8; 32],
) -> Result<(), RaffleError> {
    if caller != randomness_service {
        return Err(RaffleError::UnauthorizedFulfillment);
    }
    match pending {
        Some(expected) if expected == request_id => Ok(()),
        _ => Err(RaffleError::UnknownRandomnessRequest),
    }
}

/// Reduces a 32-byte random value, read as a big-endian integer, modulo `modulus`.
pub fn reduce_random_value(random_value: &[u8; 32], modulus: u64) -> u64 {
    if modulus == 0 {
        return 0;
    }
    let modulus = modulus as u128;
    random_value
        .iter()
        .fold(0u128, |acc, byte| ((acc << 8) | *byte as u128) % modulus) as u64
}

/// Winning ticket id, `1 + (random_value mod tickets_minted)`.
pub fn winning_ticket_id(random_value: &[u8; 32], tickets_minted: u64) -> Option<u64> {
    if tickets_minted == 0 {
        return None;
    }
    Some(1 + reduce_random_value(random_value, tickets_minted))
}
