use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError, program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the raffle program.
///
/// The discriminant is the `ProgramError::Custom` code, so variants are only
/// ever appended.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Wrong state for participation, or the end date has passed
    #[error("Raffle is disabled")]
    RaffleDisabled,

    /// Payment is zero or not a whole multiple of the ticket price
    #[error("Payment is less than the ticket price or not a whole number of tickets")]
    LessThanMinimumTicketPrice,

    /// Caller does not hold the admin role
    #[error("Access denied")]
    AccessDenied,

    /// Merkle proof does not resolve to the refunds root
    #[error("Invalid refund proof")]
    InvalidProof,

    /// This claim leaf has already been paid
    #[error("Refund already claimed")]
    RefundAlreadyClaimed,

    /// Fulfillment not signed by the configured randomness service
    #[error("Fulfillment caller is not the randomness service")]
    UnauthorizedFulfillment,

    /// Fulfillment does not match the outstanding request
    #[error("Unknown randomness request")]
    UnknownRandomnessRequest,

    /// Operation is not allowed in the current game state
    #[error("Operation not allowed in the current game state")]
    InvalidGameState,

    /// Raffle cannot be opened with an end date that is not in the future
    #[error("End date is in the past")]
    EndDateInPast,

    /// Randomness cannot be requested before a subscription is configured
    #[error("Randomness subscription is not set")]
    SubscriptionNotSet,

    /// Only the owner of the winning ticket can claim the prize
    #[error("Caller is not the winner")]
    NotWinner,

    /// The refunds root can only be set once
    #[error("Refunds merkle root already set")]
    RefundsRootAlreadySet,

    /// Construction parameters violate the config invariants
    #[error("Invalid raffle configuration")]
    InvalidRaffleConfig,

    /// The raffle does not hold enough lamports for this payout
    #[error("Insufficient funds for operation")]
    InsufficientFunds,

    /// The ticket ledger account has no room for another batch
    #[error("Ticket ledger account is full")]
    TicketLedgerFull,

    /// Winning ticket has no recorded owner
    #[error("Ticket not found")]
    TicketNotFound,

    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstruction,

    /// Arithmetic on lamport amounts or ticket counts overflowed
    #[error("Amount overflow")]
    AmountOverflow,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
