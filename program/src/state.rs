use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};
use std::convert::TryFrom;

use crate::error::RaffleError;

/// Layout version written into the first byte of an initialized raffle account.
pub const RAFFLE_LAYOUT_VERSION: u8 = 1;

/// Lifecycle of a raffle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameState {
    /// Created but not accepting tickets
    Disabled,
    /// Accepting tickets
    Open,
    /// Goal reached, waiting for the randomness fulfillment
    CalculatingWinner,
    /// Winner has been selected
    WinnerSelected,
    /// Prize has been paid to the winner
    PrizeClaimed,
    /// Cancelled by the admin
    AdminCancelled,
    /// Cancelled, refunds claimable against the merkle root
    RefundsActivated,
}

impl GameState {
    /// States in which no winner has been picked yet and the admin may still
    /// reconfigure or cancel the raffle.
    pub fn is_pre_winner(self) -> bool {
        matches!(
            self,
            GameState::Disabled | GameState::Open | GameState::CalculatingWinner
        )
    }
}

impl TryFrom<u8> for GameState {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(GameState::Disabled),
            1 => Ok(GameState::Open),
            2 => Ok(GameState::CalculatingWinner),
            3 => Ok(GameState::WinnerSelected),
            4 => Ok(GameState::PrizeClaimed),
            5 => Ok(GameState::AdminCancelled),
            6 => Ok(GameState::RefundsActivated),
            _ => Err("Invalid game state"),
        }
    }
}

impl From<GameState> for u8 {
    fn from(state: GameState) -> Self {
        match state {
            GameState::Disabled => 0,
            GameState::Open => 1,
            GameState::CalculatingWinner => 2,
            GameState::WinnerSelected => 3,
            GameState::PrizeClaimed => 4,
            GameState::AdminCancelled => 5,
            GameState::RefundsActivated => 6,
        }
    }
}

/// Parameters fixed when the raffle is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Holder of the admin role
    pub admin: Pubkey,
    /// Price of one ticket in lamports
    pub ticket_price: u64,
    /// Participation is rejected once the clock reaches this timestamp
    pub end_date: UnixTimestamp,
    /// Accumulated value that triggers the draw, `platform_fee + prize_amount`
    pub target_goal: u64,
    /// Platform share of the goal in lamports
    pub platform_fee: u64,
    /// Amount paid to the winner in lamports
    pub prize_amount: u64,
    /// Destination of withdrawn proceeds
    pub payout_wallet: Pubkey,
    /// The only key allowed to deliver randomness fulfillments
    pub randomness_service: Pubkey,
    /// Key hash identifying the VRF proving key to use
    pub key_hash: [u8; 32],
    /// Account recording minted tickets
    pub ticket_ledger: Pubkey,
}

impl RaffleConfig {
    /// Builds a config from construction parameters, deriving the goal.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        admin: Pubkey,
        ticket_price: u64,
        end_date: UnixTimestamp,
        platform_fee: u64,
        prize_amount: u64,
        payout_wallet: Pubkey,
        randomness_service: Pubkey,
        key_hash: [u8; 32],
        ticket_ledger: Pubkey,
    ) -> Result<Self, RaffleError> {
        let target_goal = platform_fee
            .checked_add(prize_amount)
            .ok_or(RaffleError::AmountOverflow)?;
        let config = Self {
            admin,
            ticket_price,
            end_date,
            target_goal,
            platform_fee,
            prize_amount,
            payout_wallet,
            randomness_service,
            key_hash,
            ticket_ledger,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.ticket_price == 0 || self.target_goal == 0 {
            return Err(RaffleError::InvalidRaffleConfig);
        }
        if self.platform_fee.checked_add(self.prize_amount) != Some(self.target_goal) {
            return Err(RaffleError::InvalidRaffleConfig);
        }
        Ok(())
    }
}

/// Winning ticket and the account that owned it at mint time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinningTicket {
    pub ticket_id: u64,
    pub owner: Pubkey,
}

/// Raffle account data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Raffle {
    /// Layout version, zero while uninitialized
    pub version: u8,
    pub config: RaffleConfig,
    pub state: GameState,
    /// Lamports paid in by participants
    pub accumulated: u64,
    /// Tickets minted so far, mirrors the ticket ledger
    pub tickets_minted: u64,
    /// Randomness subscription, zero until set by the admin
    pub subscription_id: u64,
    /// Number of randomness requests issued so far
    pub request_nonce: u64,
    /// Outstanding randomness request, only while calculating the winner
    pub pending_request: Option<[u8; 32]>,
    pub winner: Option<WinningTicket>,
    pub refunds_root: Option<[u8; 32]>,
}

impl Raffle {
    pub fn new(config: RaffleConfig) -> Self {
        Self {
            version: RAFFLE_LAYOUT_VERSION,
            config,
            state: GameState::Disabled,
            accumulated: 0,
            tickets_minted: 0,
            subscription_id: 0,
            request_nonce: 0,
            pending_request: None,
            winner: None,
            refunds_root: None,
        }
    }

    pub fn tickets_minted(&self) -> u64 {
        self.tickets_minted
    }

    /// Zero until a winner has been selected
    pub fn winning_ticket_id(&self) -> u64 {
        self.winner.map(|w| w.ticket_id).unwrap_or_default()
    }

    /// Default pubkey until a winner has been selected
    pub fn winning_ticket_owner(&self) -> Pubkey {
        self.winner.map(|w| w.owner).unwrap_or_default()
    }
}

impl Sealed for Raffle {}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.version != 0
    }
}

fn unpack_option_hash(flag: &[u8; 1], hash: &[u8; 32]) -> Result<Option<[u8; 32]>, ProgramError> {
    match flag[0] {
        0 => Ok(None),
        1 => Ok(Some(*hash)),
        _ => Err(ProgramError::InvalidAccountData),
    }
}

fn pack_option_hash(value: &Option<[u8; 32]>, flag: &mut [u8; 1], hash: &mut [u8; 32]) {
    match value {
        Some(h) => {
            flag[0] = 1;
            hash.copy_from_slice(h);
        }
        None => {
            flag[0] = 0;
            hash.copy_from_slice(&[0u8; 32]);
        }
    }
}

impl Pack for Raffle {
    const LEN: usize =
        1 + 32 + 8 + 8 + 8 + 8 + 8 + 32 + 32 + 32 + 32 + 1 + 8 + 8 + 8 + 8 + 33 + 1 + 8 + 32 + 33;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Raffle::LEN];
        let (
            version,
            admin,
            ticket_price,
            end_date,
            target_goal,
            platform_fee,
            prize_amount,
            payout_wallet,
            randomness_service,
            key_hash,
            ticket_ledger,
            state,
            accumulated,
            tickets_minted,
            subscription_id,
            request_nonce,
            pending_request,
            has_winner,
            winning_ticket_id,
            winning_owner,
            refunds_root,
        ) = array_refs![src, 1, 32, 8, 8, 8, 8, 8, 32, 32, 32, 32, 1, 8, 8, 8, 8, 33, 1, 8, 32, 33];

        let state = GameState::try_from(state[0]).map_err(|_| ProgramError::InvalidAccountData)?;
        let (pending_flag, pending_hash) = array_refs![pending_request, 1, 32];
        let (root_flag, root_hash) = array_refs![refunds_root, 1, 32];

        let winner = match has_winner[0] {
            0 => None,
            1 => Some(WinningTicket {
                ticket_id: u64::from_le_bytes(*winning_ticket_id),
                owner: Pubkey::new_from_array(*winning_owner),
            }),
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(Raffle {
            version: version[0],
            config: RaffleConfig {
                admin: Pubkey::new_from_array(*admin),
                ticket_price: u64::from_le_bytes(*ticket_price),
                end_date: UnixTimestamp::from_le_bytes(*end_date),
                target_goal: u64::from_le_bytes(*target_goal),
                platform_fee: u64::from_le_bytes(*platform_fee),
                prize_amount: u64::from_le_bytes(*prize_amount),
                payout_wallet: Pubkey::new_from_array(*payout_wallet),
                randomness_service: Pubkey::new_from_array(*randomness_service),
                key_hash: *key_hash,
                ticket_ledger: Pubkey::new_from_array(*ticket_ledger),
            },
            state,
            accumulated: u64::from_le_bytes(*accumulated),
            tickets_minted: u64::from_le_bytes(*tickets_minted),
            subscription_id: u64::from_le_bytes(*subscription_id),
            request_nonce: u64::from_le_bytes(*request_nonce),
            pending_request: unpack_option_hash(pending_flag, pending_hash)?,
            winner,
            refunds_root: unpack_option_hash(root_flag, root_hash)?,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Raffle::LEN];
        let (
            version_dst,
            admin_dst,
            ticket_price_dst,
            end_date_dst,
            target_goal_dst,
            platform_fee_dst,
            prize_amount_dst,
            payout_wallet_dst,
            randomness_service_dst,
            key_hash_dst,
            ticket_ledger_dst,
            state_dst,
            accumulated_dst,
            tickets_minted_dst,
            subscription_id_dst,
            request_nonce_dst,
            pending_request_dst,
            has_winner_dst,
            winning_ticket_id_dst,
            winning_owner_dst,
            refunds_root_dst,
        ) = mut_array_refs![dst, 1, 32, 8, 8, 8, 8, 8, 32, 32, 32, 32, 1, 8, 8, 8, 8, 33, 1, 8, 32, 33];

        let config = &self.config;
        version_dst[0] = self.version;
        admin_dst.copy_from_slice(config.admin.as_ref());
        *ticket_price_dst = config.ticket_price.to_le_bytes();
        *end_date_dst = config.end_date.to_le_bytes();
        *target_goal_dst = config.target_goal.to_le_bytes();
        *platform_fee_dst = config.platform_fee.to_le_bytes();
        *prize_amount_dst = config.prize_amount.to_le_bytes();
        payout_wallet_dst.copy_from_slice(config.payout_wallet.as_ref());
        randomness_service_dst.copy_from_slice(config.randomness_service.as_ref());
        key_hash_dst.copy_from_slice(&config.key_hash);
        ticket_ledger_dst.copy_from_slice(config.ticket_ledger.as_ref());
        state_dst[0] = self.state.into();
        *accumulated_dst = self.accumulated.to_le_bytes();
        *tickets_minted_dst = self.tickets_minted.to_le_bytes();
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        *request_nonce_dst = self.request_nonce.to_le_bytes();

        let (pending_flag_dst, pending_hash_dst) = mut_array_refs![pending_request_dst, 1, 32];
        pack_option_hash(&self.pending_request, pending_flag_dst, pending_hash_dst);

        match self.winner {
            Some(winner) => {
                has_winner_dst[0] = 1;
                *winning_ticket_id_dst = winner.ticket_id.to_le_bytes();
                winning_owner_dst.copy_from_slice(winner.owner.as_ref());
            }
            None => {
                has_winner_dst[0] = 0;
                *winning_ticket_id_dst = 0u64.to_le_bytes();
                winning_owner_dst.copy_from_slice(&[0u8; 32]);
            }
        }

        let (root_flag_dst, root_hash_dst) = mut_array_refs![refunds_root_dst, 1, 32];
        pack_option_hash(&self.refunds_root, root_flag_dst, root_hash_dst);
    }
}

/// Marker account proving a refund leaf has been paid.
///
/// Lives at the PDA `["claim", raffle, index]`; its existence alone is what
/// blocks a second claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRecord {
    pub is_initialized: bool,
    pub raffle: Pubkey,
    pub index: u64,
    pub account: Pubkey,
    pub ticket_count: u64,
}

impl Sealed for ClaimRecord {}

impl IsInitialized for ClaimRecord {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for ClaimRecord {
    const LEN: usize = 1 + 32 + 8 + 32 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, ClaimRecord::LEN];
        let (is_initialized, raffle, index, account, ticket_count) =
            array_refs![src, 1, 32, 8, 32, 8];

        Ok(ClaimRecord {
            is_initialized: is_initialized[0] != 0,
            raffle: Pubkey::new_from_array(*raffle),
            index: u64::from_le_bytes(*index),
            account: Pubkey::new_from_array(*account),
            ticket_count: u64::from_le_bytes(*ticket_count),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, ClaimRecord::LEN];
        let (is_initialized_dst, raffle_dst, index_dst, account_dst, ticket_count_dst) =
            mut_array_refs![dst, 1, 32, 8, 32, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        raffle_dst.copy_from_slice(self.raffle.as_ref());
        *index_dst = self.index.to_le_bytes();
        account_dst.copy_from_slice(self.account.as_ref());
        *ticket_count_dst = self.ticket_count.to_le_bytes();
    }
}
