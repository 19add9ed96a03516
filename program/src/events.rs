// Raffle notifications
//
// Each event is logged twice: a readable `msg!` line and the borsh encoding via
// `sol_log_data`, which indexers pick up as `Program data:` entries.
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum RaffleEvent {
    TicketPurchased {
        buyer: Pubkey,
        count: u64,
        running_total: u64,
    },
    RandomnessRequested {
        request_id: [u8; 32],
        subscription_id: u64,
        key_hash: [u8; 32],
    },
    WinnerSelected {
        ticket_id: u64,
        owner: Pubkey,
        random_value: [u8; 32],
    },
    PrizeClaimed {
        winner: Pubkey,
        amount: u64,
    },
    ProceedsWithdrawn {
        admin: Pubkey,
        amount: u64,
    },
    RaffleCancelled {
        admin: Pubkey,
    },
    RefundsActivated {
        root: [u8; 32],
    },
    RefundClaimed {
        account: Pubkey,
        ticket_count: u64,
    },
}

impl RaffleEvent {
    pub fn emit(&self) {
        match self {
            RaffleEvent::TicketPurchased {
                buyer,
                count,
                running_total,
            } => msg!(
                "TicketPurchased: buyer={} count={} total={}",
                buyer,
                count,
                running_total
            ),
            RaffleEvent::RandomnessRequested {
                subscription_id, ..
            } => msg!("RandomnessRequested: subscription={}", subscription_id),
            RaffleEvent::WinnerSelected {
                ticket_id, owner, ..
            } => msg!("WinnerSelected: ticket={} owner={}", ticket_id, owner),
            RaffleEvent::PrizeClaimed { winner, amount } => {
                msg!("PrizeClaimed: winner={} amount={}", winner, amount)
            }
            RaffleEvent::ProceedsWithdrawn { admin, amount } => {
                msg!("ProceedsWithdrawn: admin={} amount={}", admin, amount)
            }
            RaffleEvent::RaffleCancelled { admin } => msg!("RaffleCancelled: admin={}", admin),
            RaffleEvent::RefundsActivated { .. } => msg!("RefundsActivated"),
            RaffleEvent::RefundClaimed {
                account,
                ticket_count,
            } => msg!("RefundClaimed: account={} tickets={}", account, ticket_count),
        }

        if let Ok(data) = self.try_to_vec() {
            sol_log_data(&[&data]);
        }
    }
}
