// Ticket ledger - append-only record of minted tickets
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey};
use std::ops::RangeInclusive;

use crate::error::RaffleError;

/// Consecutive tickets minted to one owner by a single participation
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketBatch {
    pub owner: Pubkey,
    /// Id of the first ticket in the batch
    pub first_ticket: u64,
    /// Number of tickets in the batch
    pub count: u64,
}

impl TicketBatch {
    pub const LEN: usize = 32 + 8 + 8;

    pub fn last_ticket(&self) -> u64 {
        self.first_ticket + self.count - 1
    }
}

/// Tickets of one raffle in mint order
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct TicketLedger {
    /// Raffle the tickets belong to
    pub raffle: Pubkey,
    /// Total tickets minted, ids run from 1 to this value
    pub tickets_minted: u64,
    pub batches: Vec<TicketBatch>,
}

impl TicketLedger {
    /// Raffle key, ticket count and the vec length prefix
    pub const HEADER_LEN: usize = 32 + 8 + 4;

    pub fn new(raffle: Pubkey) -> Self {
        Self {
            raffle,
            tickets_minted: 0,
            batches: Vec::new(),
        }
    }

    /// Account size needed to hold `batches` participations
    pub fn space_for(batches: usize) -> usize {
        Self::HEADER_LEN + batches * TicketBatch::LEN
    }

    /// Most batches a raffle can record: every participation below the goal
    /// buys at least one ticket, and the one reaching the goal closes it.
    pub fn max_batches(target_goal: u64, ticket_price: u64) -> Option<usize> {
        if ticket_price == 0 {
            return None;
        }
        let below_goal = target_goal.checked_add(ticket_price - 1)? / ticket_price;
        usize::try_from(below_goal).ok()?.checked_add(1)
    }

    /// Issues the next `count` ticket ids to `owner`.
    pub fn mint(&mut self, owner: Pubkey, count: u64) -> Result<RangeInclusive<u64>, RaffleError> {
        if count == 0 {
            return Err(RaffleError::LessThanMinimumTicketPrice);
        }
        let first_ticket = self
            .tickets_minted
            .checked_add(1)
            .ok_or(RaffleError::AmountOverflow)?;
        let last_ticket = self
            .tickets_minted
            .checked_add(count)
            .ok_or(RaffleError::AmountOverflow)?;

        self.batches.push(TicketBatch {
            owner,
            first_ticket,
            count,
        });
        self.tickets_minted = last_ticket;
        Ok(first_ticket..=last_ticket)
    }

    pub fn tickets_minted(&self) -> u64 {
        self.tickets_minted
    }

    /// Owner of ticket `id`, `None` for ids that were never minted
    pub fn owner_of(&self, id: u64) -> Option<Pubkey> {
        if id == 0 || id > self.tickets_minted {
            return None;
        }
        let after = self.batches.partition_point(|b| b.first_ticket <= id);
        let batch = self.batches.get(after.checked_sub(1)?)?;
        (id <= batch.last_ticket()).then(|| batch.owner)
    }

    /// Cumulative number of tickets minted to `owner`
    pub fn tickets_of(&self, owner: &Pubkey) -> u64 {
        self.batches
            .iter()
            .filter(|b| b.owner == *owner)
            .map(|b| b.count)
            .sum()
    }

    /// Every minted ticket id in mint order
    pub fn ticket_ids(&self) -> RangeInclusive<u64> {
        1..=self.tickets_minted
    }

    pub fn load(account: &AccountInfo) -> Result<Self, ProgramError> {
        let data = account.data.borrow();
        let ledger = Self::deserialize(&mut &data[..])?;
        Ok(ledger)
    }

    /// Writes the ledger back, failing if the account was allocated too small.
    pub fn store(&self, account: &AccountInfo) -> Result<(), ProgramError> {
        let bytes = self.try_to_vec()?;
        let mut data = account.data.borrow_mut();
        if bytes.len() > data.len() {
            return Err(RaffleError::TicketLedgerFull.into());
        }
        data[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }
}
