// Raffle program - state machine
//
// `transition` is a pure function of the current raffle, the calling context
// and the requested operation. It either rejects the operation, leaving the
// state untouched, or returns the next state together with the effects the
// processor must carry out against accounts.

use solana_program::{clock::UnixTimestamp, msg, pubkey::Pubkey};

use crate::{
    access::require_admin,
    error::RaffleError,
    events::RaffleEvent,
    merkle::{self, ClaimLeafData, MerkleHash},
    state::{GameState, Raffle, WinningTicket},
    tickets::TicketLedger,
    vrf::{self, RandomnessRequest},
};

/// Context of the instruction being executed
#[derive(Debug, Clone, Copy)]
pub struct Call {
    /// Address of the raffle account
    pub raffle: Pubkey,
    /// Signer the operation is executed for
    pub caller: Pubkey,
    pub now: UnixTimestamp,
    /// Lamports the raffle holds above its rent-exempt minimum
    pub available: u64,
}

#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    SetEnabled(bool),
    Participate {
        value: u64,
    },
    SetSubscriptionId(u64),
    GetSubscriptionId,
    UpdateEndDate(UnixTimestamp),
    UpdateAdmin(Pubkey),
    Cancel,
    WithdrawProceeds,
    SetRefundsMerkleRoot(MerkleHash),
    ClaimRefund {
        leaf: ClaimLeafData,
        proof: &'a [MerkleHash],
        /// Whether the claim record for `leaf.index` already exists
        already_claimed: bool,
    },
    FulfillRandomWords {
        request_id: [u8; 32],
        random_value: [u8; 32],
        tickets: &'a TicketLedger,
    },
    ClaimPrize,
}

/// Side effect of an accepted operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Move `amount` lamports from `from` into the raffle account
    Deposit { from: Pubkey, amount: u64 },
    /// Append `count` tickets for `owner` to the ticket ledger
    MintTickets { owner: Pubkey, count: u64 },
    /// Move `amount` lamports out of the raffle account to `to`
    Pay { to: Pubkey, amount: u64 },
    /// Create the claim record marking a refund leaf as paid
    RecordClaim {
        index: u64,
        account: Pubkey,
        ticket_count: u64,
    },
    ReturnSubscriptionId(u64),
    Emit(RaffleEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub raffle: Raffle,
    pub effects: Vec<Effect>,
}

pub fn transition(raffle: &Raffle, call: &Call, op: Operation) -> Result<Transition, RaffleError> {
    let mut next = *raffle;
    let mut effects = Vec::new();

    match op {
        Operation::SetEnabled(enabled) => {
            set_enabled(&mut next, call, enabled)?;
        }
        Operation::Participate { value } => {
            participate(&mut next, call, value, &mut effects)?;
        }
        Operation::SetSubscriptionId(subscription_id) => {
            require_admin(&next.config, &call.caller)?;
            next.subscription_id = subscription_id;
        }
        Operation::GetSubscriptionId => {
            require_admin(&next.config, &call.caller)?;
            effects.push(Effect::ReturnSubscriptionId(next.subscription_id));
        }
        Operation::UpdateEndDate(end_date) => {
            require_admin(&next.config, &call.caller)?;
            require_pre_winner(&next)?;
            next.config.end_date = end_date;
        }
        Operation::UpdateAdmin(new_admin) => {
            require_admin(&next.config, &call.caller)?;
            next.config.admin = new_admin;
        }
        Operation::Cancel => {
            require_admin(&next.config, &call.caller)?;
            require_pre_winner(&next)?;
            cancel(&mut next, call, &mut effects);
        }
        Operation::WithdrawProceeds => {
            withdraw_proceeds(&mut next, call, &mut effects)?;
        }
        Operation::SetRefundsMerkleRoot(root) => {
            set_refunds_root(&mut next, call, root, &mut effects)?;
        }
        Operation::ClaimRefund {
            leaf,
            proof,
            already_claimed,
        } => {
            claim_refund(&mut next, call, leaf, proof, already_claimed, &mut effects)?;
        }
        Operation::FulfillRandomWords {
            request_id,
            random_value,
            tickets,
        } => {
            fulfill_random_words(&mut next, call, &request_id, random_value, tickets, &mut effects)?;
        }
        Operation::ClaimPrize => {
            claim_prize(&mut next, call, &mut effects)?;
        }
    }

    Ok(Transition {
        raffle: next,
        effects,
    })
}

fn require_pre_winner(raffle: &Raffle) -> Result<(), RaffleError> {
    if raffle.state.is_pre_winner() {
        Ok(())
    } else {
        msg!("Raffle is past the point of no return: {:?}", raffle.state);
        Err(RaffleError::InvalidGameState)
    }
}

fn set_enabled(raffle: &mut Raffle, call: &Call, enabled: bool) -> Result<(), RaffleError> {
    require_admin(&raffle.config, &call.caller)?;
    if enabled {
        if !matches!(raffle.state, GameState::Disabled | GameState::Open) {
            return Err(RaffleError::InvalidGameState);
        }
        if raffle.config.end_date <= call.now {
            msg!(
                "End date {} is not after current time {}",
                raffle.config.end_date,
                call.now
            );
            return Err(RaffleError::EndDateInPast);
        }
        raffle.state = GameState::Open;
    } else {
        require_pre_winner(raffle)?;
        raffle.state = GameState::Disabled;
        raffle.pending_request = None;
    }
    Ok(())
}

fn participate(
    raffle: &mut Raffle,
    call: &Call,
    value: u64,
    effects: &mut Vec<Effect>,
) -> Result<(), RaffleError> {
    if raffle.state != GameState::Open || call.now >= raffle.config.end_date {
        return Err(RaffleError::RaffleDisabled);
    }

    let ticket_price = raffle.config.ticket_price;
    if value == 0 || value % ticket_price != 0 {
        msg!("Payment {} is not a multiple of the ticket price {}", value, ticket_price);
        return Err(RaffleError::LessThanMinimumTicketPrice);
    }
    let count = value / ticket_price;

    raffle.accumulated = raffle
        .accumulated
        .checked_add(value)
        .ok_or(RaffleError::AmountOverflow)?;
    raffle.tickets_minted = raffle
        .tickets_minted
        .checked_add(count)
        .ok_or(RaffleError::AmountOverflow)?;

    effects.push(Effect::Deposit {
        from: call.caller,
        amount: value,
    });
    effects.push(Effect::MintTickets {
        owner: call.caller,
        count,
    });
    effects.push(Effect::Emit(RaffleEvent::TicketPurchased {
        buyer: call.caller,
        count,
        running_total: raffle.accumulated,
    }));

    if raffle.accumulated >= raffle.config.target_goal {
        request_randomness(raffle, call, effects)?;
    }
    Ok(())
}

fn request_randomness(
    raffle: &mut Raffle,
    call: &Call,
    effects: &mut Vec<Effect>,
) -> Result<(), RaffleError> {
    if raffle.subscription_id == 0 {
        msg!("Goal reached but no randomness subscription is configured");
        return Err(RaffleError::SubscriptionNotSet);
    }

    let request = RandomnessRequest::new(
        &call.raffle,
        raffle.config.key_hash,
        raffle.subscription_id,
        raffle.request_nonce,
    );
    raffle.request_nonce = raffle
        .request_nonce
        .checked_add(1)
        .ok_or(RaffleError::AmountOverflow)?;
    raffle.pending_request = Some(request.request_id);
    raffle.state = GameState::CalculatingWinner;

    effects.push(Effect::Emit(RaffleEvent::RandomnessRequested {
        request_id: request.request_id,
        subscription_id: request.subscription_id,
        key_hash: request.key_hash,
    }));
    Ok(())
}

fn fulfill_random_words(
    raffle: &mut Raffle,
    call: &Call,
    request_id: &[u8; 32],
    random_value: [u8; 32],
    tickets: &TicketLedger,
    effects: &mut Vec<Effect>,
) -> Result<(), RaffleError> {
    vrf::verify_fulfillment(
        raffle.pending_request.as_ref(),
        &raffle.config.randomness_service,
        &call.caller,
        request_id,
    )?;
    if raffle.state != GameState::CalculatingWinner {
        return Err(RaffleError::UnknownRandomnessRequest);
    }
    if tickets.tickets_minted() != raffle.tickets_minted {
        msg!(
            "Ticket ledger holds {} tickets, raffle recorded {}",
            tickets.tickets_minted(),
            raffle.tickets_minted
        );
        return Err(RaffleError::TicketNotFound);
    }

    let ticket_id = vrf::winning_ticket_id(&random_value, raffle.tickets_minted)
        .ok_or(RaffleError::TicketNotFound)?;
    let owner = tickets
        .owner_of(ticket_id)
        .ok_or(RaffleError::TicketNotFound)?;

    raffle.pending_request = None;
    raffle.winner = Some(WinningTicket { ticket_id, owner });
    raffle.state = GameState::WinnerSelected;

    effects.push(Effect::Emit(RaffleEvent::WinnerSelected {
        ticket_id,
        owner,
        random_value,
    }));
    Ok(())
}

fn claim_prize(raffle: &mut Raffle, call: &Call, effects: &mut Vec<Effect>) -> Result<(), RaffleError> {
    let winner = match (raffle.state, raffle.winner) {
        (GameState::WinnerSelected, Some(winner)) => winner,
        _ => return Err(RaffleError::InvalidGameState),
    };
    if winner.owner != call.caller {
        return Err(RaffleError::NotWinner);
    }
    let amount = raffle.config.prize_amount;
    if call.available < amount {
        return Err(RaffleError::InsufficientFunds);
    }

    raffle.state = GameState::PrizeClaimed;
    effects.push(Effect::Pay {
        to: winner.owner,
        amount,
    });
    effects.push(Effect::Emit(RaffleEvent::PrizeClaimed {
        winner: winner.owner,
        amount,
    }));
    Ok(())
}

fn cancel(raffle: &mut Raffle, call: &Call, effects: &mut Vec<Effect>) {
    raffle.state = GameState::AdminCancelled;
    raffle.pending_request = None;
    effects.push(Effect::Emit(RaffleEvent::RaffleCancelled { admin: call.caller }));
}

fn withdraw_proceeds(
    raffle: &mut Raffle,
    call: &Call,
    effects: &mut Vec<Effect>,
) -> Result<(), RaffleError> {
    require_admin(&raffle.config, &call.caller)?;

    let amount = match raffle.state {
        GameState::Disabled | GameState::Open | GameState::CalculatingWinner => {
            cancel(raffle, call, effects);
            call.available
        }
        GameState::WinnerSelected => call.available.saturating_sub(raffle.config.prize_amount),
        GameState::PrizeClaimed | GameState::AdminCancelled => call.available,
        GameState::RefundsActivated => {
            raffle.state = GameState::AdminCancelled;
            call.available
        }
    };

    effects.push(Effect::Pay {
        to: raffle.config.payout_wallet,
        amount,
    });
    effects.push(Effect::Emit(RaffleEvent::ProceedsWithdrawn {
        admin: call.caller,
        amount,
    }));
    Ok(())
}

fn set_refunds_root(
    raffle: &mut Raffle,
    call: &Call,
    root: MerkleHash,
    effects: &mut Vec<Effect>,
) -> Result<(), RaffleError> {
    require_admin(&raffle.config, &call.caller)?;
    if raffle.refunds_root.is_some() {
        return Err(RaffleError::RefundsRootAlreadySet);
    }
    if root == [0u8; 32] {
        msg!("Refunds root must not be empty");
        return Err(RaffleError::InvalidInstruction);
    }
    match raffle.state {
        state if state.is_pre_winner() => cancel(raffle, call, effects),
        GameState::AdminCancelled => {}
        _ => return Err(RaffleError::InvalidGameState),
    }

    raffle.refunds_root = Some(root);
    raffle.state = GameState::RefundsActivated;
    effects.push(Effect::Emit(RaffleEvent::RefundsActivated { root }));
    Ok(())
}

fn claim_refund(
    raffle: &mut Raffle,
    call: &Call,
    leaf: ClaimLeafData,
    proof: &[MerkleHash],
    already_claimed: bool,
    effects: &mut Vec<Effect>,
) -> Result<(), RaffleError> {
    let root = match (raffle.state, raffle.refunds_root) {
        (GameState::RefundsActivated, Some(root)) => root,
        _ => return Err(RaffleError::InvalidGameState),
    };
    if !merkle::verify(proof, &root, leaf.leaf(&call.caller)) {
        return Err(RaffleError::InvalidProof);
    }
    if already_claimed {
        return Err(RaffleError::RefundAlreadyClaimed);
    }

    let amount = leaf
        .ticket_count
        .checked_mul(raffle.config.ticket_price)
        .ok_or(RaffleError::AmountOverflow)?;
    if call.available < amount {
        return Err(RaffleError::InsufficientFunds);
    }

    effects.push(Effect::RecordClaim {
        index: leaf.index,
        account: call.caller,
        ticket_count: leaf.ticket_count,
    });
    effects.push(Effect::Pay {
        to: call.caller,
        amount,
    });
    effects.push(Effect::Emit(RaffleEvent::RefundClaimed {
        account: call.caller,
        ticket_count: leaf.ticket_count,
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::{ClaimsTree, RefundAllocation};
    use crate::state::RaffleConfig;

    const PRICE: u64 = 10_000_000;
    const FEE: u64 = 200_000_000;
    const PRIZE: u64 = 1_000_000_000;
    const NOW: UnixTimestamp = 1_700_000_000;
    const END: UnixTimestamp = NOW + 30 * 24 * 60 * 60;

    struct Fixture {
        raffle: Raffle,
        key: Pubkey,
        admin: Pubkey,
        service: Pubkey,
        payout: Pubkey,
        tickets: TicketLedger,
        balance: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let admin = Pubkey::new_unique();
            let service = Pubkey::new_unique();
            let payout = Pubkey::new_unique();
            let key = Pubkey::new_unique();
            let config = RaffleConfig::new(
                admin,
                PRICE,
                END,
                FEE,
                PRIZE,
                payout,
                service,
                [3u8; 32],
                Pubkey::new_unique(),
            )
            .unwrap();
            Self {
                raffle: Raffle::new(config),
                key,
                admin,
                service,
                payout,
                tickets: TicketLedger::new(key),
                balance: 0,
            }
        }

        fn call(&self, caller: Pubkey) -> Call {
            Call {
                raffle: self.key,
                caller,
                now: NOW,
                available: self.balance,
            }
        }

        /// Runs an operation and applies its ledger and balance effects.
        fn apply(&mut self, caller: Pubkey, op: Operation) -> Result<Vec<Effect>, RaffleError> {
            let call = self.call(caller);
            self.apply_call(call, op)
        }

        fn apply_call(&mut self, call: Call, op: Operation) -> Result<Vec<Effect>, RaffleError> {
            let Transition { raffle, effects } = transition(&self.raffle, &call, op)?;
            for effect in &effects {
                match effect {
                    Effect::Deposit { amount, .. } => self.balance += amount,
                    Effect::Pay { amount, .. } => self.balance -= amount,
                    Effect::MintTickets { owner, count } => {
                        self.tickets.mint(*owner, *count).unwrap();
                    }
                    _ => {}
                }
            }
            self.raffle = raffle;
            Ok(effects)
        }

        fn open(&mut self) {
            self.apply(self.admin, Operation::SetEnabled(true)).unwrap();
            self.apply(self.admin, Operation::SetSubscriptionId(77)).unwrap();
        }

        fn fulfill(
            &mut self,
            caller: Pubkey,
            request_id: [u8; 32],
            random_value: [u8; 32],
        ) -> Result<Vec<Effect>, RaffleError> {
            let tickets = self.tickets.clone();
            self.apply(
                caller,
                Operation::FulfillRandomWords {
                    request_id,
                    random_value,
                    tickets: &tickets,
                },
            )
        }
    }

    fn claim(leaf: ClaimLeafData, proof: &[MerkleHash], already_claimed: bool) -> Operation<'_> {
        Operation::ClaimRefund {
            leaf,
            proof,
            already_claimed,
        }
    }

    #[test]
    fn starts_disabled_and_rejects_participation() {
        let mut f = Fixture::new();
        assert_eq!(f.raffle.state, GameState::Disabled);
        assert_eq!(
            f.apply(Pubkey::new_unique(), Operation::Participate { value: PRICE }),
            Err(RaffleError::RaffleDisabled)
        );
    }

    #[test]
    fn admin_operations_reject_public_callers() {
        let mut f = Fixture::new();
        let stranger = Pubkey::new_unique();
        let ops = [
            Operation::SetEnabled(true),
            Operation::SetSubscriptionId(1),
            Operation::GetSubscriptionId,
            Operation::UpdateEndDate(END + 1),
            Operation::UpdateAdmin(stranger),
            Operation::Cancel,
            Operation::WithdrawProceeds,
            Operation::SetRefundsMerkleRoot([1u8; 32]),
        ];
        for op in ops {
            assert_eq!(f.apply(stranger, op), Err(RaffleError::AccessDenied));
        }
        assert_eq!(f.raffle.state, GameState::Disabled);
    }

    #[test]
    fn enabling_requires_future_end_date() {
        let mut f = Fixture::new();
        f.apply(f.admin, Operation::UpdateEndDate(NOW)).unwrap();
        assert_eq!(
            f.apply(f.admin, Operation::SetEnabled(true)),
            Err(RaffleError::EndDateInPast)
        );
        f.apply(f.admin, Operation::UpdateEndDate(NOW + 1)).unwrap();
        f.apply(f.admin, Operation::SetEnabled(true)).unwrap();
        assert_eq!(f.raffle.state, GameState::Open);
        f.apply(f.admin, Operation::SetEnabled(false)).unwrap();
        assert_eq!(f.raffle.state, GameState::Disabled);
    }

    #[test]
    fn participation_mints_one_ticket_per_whole_unit() {
        let mut f = Fixture::new();
        f.open();
        let buyer = Pubkey::new_unique();

        let effects = f.apply(buyer, Operation::Participate { value: PRICE * 30 }).unwrap();
        assert!(effects.contains(&Effect::Emit(RaffleEvent::TicketPurchased {
            buyer,
            count: 30,
            running_total: PRICE * 30,
        })));
        f.apply(Pubkey::new_unique(), Operation::Participate { value: PRICE * 2 })
            .unwrap();

        assert_eq!(f.raffle.tickets_minted(), 32);
        assert_eq!(f.tickets.tickets_minted(), 32);
        assert_eq!(f.tickets.ticket_ids().collect::<Vec<_>>(), (1..=32).collect::<Vec<_>>());
        assert_eq!(f.raffle.accumulated, PRICE * 32);
        assert_eq!(f.raffle.state, GameState::Open);
    }

    #[test]
    fn partial_or_zero_payments_are_rejected() {
        let mut f = Fixture::new();
        f.open();
        let buyer = Pubkey::new_unique();
        for value in [0, PRICE / 10, PRICE + 1, PRICE * 3 - 1] {
            assert_eq!(
                f.apply(buyer, Operation::Participate { value }),
                Err(RaffleError::LessThanMinimumTicketPrice)
            );
        }
        assert_eq!(f.raffle.tickets_minted(), 0);
    }

    #[test]
    fn end_date_set_to_now_stops_participation() {
        let mut f = Fixture::new();
        f.open();
        f.apply(f.admin, Operation::UpdateEndDate(NOW)).unwrap();
        assert_eq!(
            f.apply(Pubkey::new_unique(), Operation::Participate { value: PRICE }),
            Err(RaffleError::RaffleDisabled)
        );
    }

    #[test]
    fn overfunding_participation_starts_the_draw_in_the_same_call() {
        let mut f = Fixture::new();
        f.open();
        let whale = Pubkey::new_unique();

        let effects = f
            .apply(whale, Operation::Participate { value: 3_600_000_000 })
            .unwrap();

        assert_eq!(f.raffle.tickets_minted(), 360);
        assert_eq!(f.raffle.state, GameState::CalculatingWinner);
        let request_id = f.raffle.pending_request.unwrap();
        assert!(effects.contains(&Effect::Emit(RaffleEvent::RandomnessRequested {
            request_id,
            subscription_id: 77,
            key_hash: [3u8; 32],
        })));

        assert_eq!(
            f.apply(Pubkey::new_unique(), Operation::Participate { value: PRICE }),
            Err(RaffleError::RaffleDisabled)
        );
    }

    #[test]
    fn reaching_goal_without_subscription_rejects_the_whole_participation() {
        let mut f = Fixture::new();
        f.apply(f.admin, Operation::SetEnabled(true)).unwrap();
        assert_eq!(
            f.apply(Pubkey::new_unique(), Operation::Participate { value: FEE + PRIZE }),
            Err(RaffleError::SubscriptionNotSet)
        );
        assert_eq!(f.raffle.tickets_minted(), 0);
        assert_eq!(f.raffle.accumulated, 0);
        assert_eq!(f.raffle.state, GameState::Open);
    }

    #[test]
    fn fulfillment_is_authenticated_and_accepted_once() {
        let mut f = Fixture::new();
        f.open();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        f.apply(alice, Operation::Participate { value: PRICE * 20 }).unwrap();
        f.apply(bob, Operation::Participate { value: FEE + PRIZE }).unwrap();
        let request_id = f.raffle.pending_request.unwrap();
        let random_value = [0xabu8; 32];

        assert_eq!(
            f.fulfill(Pubkey::new_unique(), request_id, random_value),
            Err(RaffleError::UnauthorizedFulfillment)
        );
        assert_eq!(
            f.fulfill(f.service, [1u8; 32], random_value),
            Err(RaffleError::UnknownRandomnessRequest)
        );
        assert_eq!(f.raffle.state, GameState::CalculatingWinner);

        f.fulfill(f.service, request_id, random_value).unwrap();
        let expected_ticket = vrf::winning_ticket_id(&random_value, 140).unwrap();
        let expected_owner = if expected_ticket <= 20 { alice } else { bob };
        assert_eq!(f.raffle.state, GameState::WinnerSelected);
        assert_eq!(f.raffle.winning_ticket_id(), expected_ticket);
        assert_eq!(f.raffle.winning_ticket_owner(), expected_owner);
        assert_eq!(f.raffle.pending_request, None);

        assert_eq!(
            f.fulfill(f.service, request_id, random_value),
            Err(RaffleError::UnknownRandomnessRequest)
        );
        assert_eq!(
            f.fulfill(f.service, request_id, [0x01u8; 32]),
            Err(RaffleError::UnknownRandomnessRequest)
        );
    }

    #[test]
    fn winner_claims_prize_once_and_admin_keeps_the_rest() {
        let mut f = Fixture::new();
        f.open();
        let winner = Pubkey::new_unique();
        f.apply(winner, Operation::Participate { value: 2 * (FEE + PRIZE) })
            .unwrap();
        let request_id = f.raffle.pending_request.unwrap();
        f.fulfill(f.service, request_id, [5u8; 32]).unwrap();

        // withdrawal before the prize is paid leaves the prize in place
        let effects = f.apply(f.admin, Operation::WithdrawProceeds).unwrap();
        assert!(effects.contains(&Effect::Pay {
            to: f.payout,
            amount: 2 * (FEE + PRIZE) - PRIZE,
        }));
        assert_eq!(f.balance, PRIZE);
        assert_eq!(f.raffle.state, GameState::WinnerSelected);

        assert_eq!(
            f.apply(Pubkey::new_unique(), Operation::ClaimPrize),
            Err(RaffleError::NotWinner)
        );
        let effects = f.apply(winner, Operation::ClaimPrize).unwrap();
        assert!(effects.contains(&Effect::Pay {
            to: winner,
            amount: PRIZE,
        }));
        assert_eq!(f.raffle.state, GameState::PrizeClaimed);
        assert_eq!(
            f.apply(winner, Operation::ClaimPrize),
            Err(RaffleError::InvalidGameState)
        );
        assert_eq!(
            f.apply(f.admin, Operation::Cancel),
            Err(RaffleError::InvalidGameState)
        );
    }

    #[test]
    fn withdraw_while_open_pays_held_balance_and_cancels() {
        let mut f = Fixture::new();
        f.open();
        f.apply(Pubkey::new_unique(), Operation::Participate { value: PRICE * 3 })
            .unwrap();

        assert_eq!(
            f.apply(Pubkey::new_unique(), Operation::WithdrawProceeds),
            Err(RaffleError::AccessDenied)
        );
        let effects = f.apply(f.admin, Operation::WithdrawProceeds).unwrap();
        assert!(effects.contains(&Effect::Pay {
            to: f.payout,
            amount: PRICE * 3,
        }));
        assert!(effects.contains(&Effect::Emit(RaffleEvent::ProceedsWithdrawn {
            admin: f.admin,
            amount: PRICE * 3,
        })));
        assert_eq!(f.balance, 0);
        assert_eq!(f.raffle.state, GameState::AdminCancelled);
    }

    #[test]
    fn disabling_during_the_draw_drops_outstanding_request() {
        let mut f = Fixture::new();
        f.open();
        f.apply(Pubkey::new_unique(), Operation::Participate { value: FEE + PRIZE })
            .unwrap();
        assert_eq!(f.raffle.state, GameState::CalculatingWinner);
        let request_id = f.raffle.pending_request.unwrap();

        f.apply(f.admin, Operation::SetEnabled(false)).unwrap();
        assert_eq!(f.raffle.state, GameState::Disabled);
        assert_eq!(f.raffle.pending_request, None);
        assert_eq!(
            f.fulfill(f.service, request_id, [1u8; 32]),
            Err(RaffleError::UnknownRandomnessRequest)
        );
    }

    #[test]
    fn disabling_after_the_draw_is_rejected() {
        let mut f = Fixture::new();
        f.open();
        f.apply(Pubkey::new_unique(), Operation::Participate { value: FEE + PRIZE })
            .unwrap();
        let request_id = f.raffle.pending_request.unwrap();
        f.fulfill(f.service, request_id, [1u8; 32]).unwrap();

        assert_eq!(
            f.apply(f.admin, Operation::SetEnabled(false)),
            Err(RaffleError::InvalidGameState)
        );
        assert_eq!(f.raffle.state, GameState::WinnerSelected);
    }

    #[test]
    fn cancel_drops_outstanding_request() {
        let mut f = Fixture::new();
        f.open();
        f.apply(Pubkey::new_unique(), Operation::Participate { value: FEE + PRIZE })
            .unwrap();
        let request_id = f.raffle.pending_request.unwrap();

        f.apply(f.admin, Operation::Cancel).unwrap();
        assert_eq!(f.raffle.state, GameState::AdminCancelled);
        assert_eq!(
            f.fulfill(f.service, request_id, [1u8; 32]),
            Err(RaffleError::UnknownRandomnessRequest)
        );
        assert_eq!(
            f.apply(Pubkey::new_unique(), Operation::Participate { value: PRICE }),
            Err(RaffleError::RaffleDisabled)
        );
        assert_eq!(
            f.apply(f.admin, Operation::SetEnabled(true)),
            Err(RaffleError::InvalidGameState)
        );
    }

    #[test]
    fn refunds_pay_each_leaf_once() {
        let mut f = Fixture::new();
        f.open();
        let funder = Pubkey::new_unique();
        f.apply(funder, Operation::Participate { value: PRICE * 100 }).unwrap();

        let bob = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();
        let tree = ClaimsTree::new(&[
            RefundAllocation {
                account: bob,
                ticket_count: 2,
            },
            RefundAllocation {
                account: alice,
                ticket_count: 10,
            },
        ]);

        f.apply(f.admin, Operation::Cancel).unwrap();
        f.apply(f.admin, Operation::SetRefundsMerkleRoot(tree.root()))
            .unwrap();
        assert_eq!(f.raffle.state, GameState::RefundsActivated);
        assert_eq!(
            f.apply(f.admin, Operation::SetRefundsMerkleRoot([9u8; 32])),
            Err(RaffleError::RefundsRootAlreadySet)
        );

        let bob_leaf = ClaimLeafData {
            index: 0,
            ticket_count: 2,
        };
        let bob_proof = tree.proof_for(0, &bob, 2).unwrap();

        assert_eq!(
            f.apply(stranger, claim(bob_leaf, &bob_proof, false)),
            Err(RaffleError::InvalidProof)
        );
        let effects = f.apply(bob, claim(bob_leaf, &bob_proof, false)).unwrap();
        assert!(effects.contains(&Effect::RecordClaim {
            index: 0,
            account: bob,
            ticket_count: 2,
        }));
        assert!(effects.contains(&Effect::Pay {
            to: bob,
            amount: 2 * PRICE,
        }));
        assert_eq!(
            f.apply(bob, claim(bob_leaf, &bob_proof, true)),
            Err(RaffleError::RefundAlreadyClaimed)
        );
        // the index is taken but the stranger's leaf is still not in the tree
        assert_eq!(
            f.apply(stranger, claim(bob_leaf, &bob_proof, true)),
            Err(RaffleError::InvalidProof)
        );

        let alice_proof = tree.proof_for(1, &alice, 10).unwrap();
        let inflated = ClaimLeafData {
            index: 1,
            ticket_count: 20,
        };
        assert_eq!(
            f.apply(alice, claim(inflated, &alice_proof, false)),
            Err(RaffleError::InvalidProof)
        );
        let alice_leaf = ClaimLeafData {
            index: 1,
            ticket_count: 10,
        };
        f.apply(alice, claim(alice_leaf, &alice_proof, false)).unwrap();
        assert_eq!(f.balance, PRICE * 88);

        let effects = f.apply(f.admin, Operation::WithdrawProceeds).unwrap();
        assert!(effects.contains(&Effect::Pay {
            to: f.payout,
            amount: PRICE * 88,
        }));
        assert_eq!(f.raffle.state, GameState::AdminCancelled);
        assert_eq!(
            f.apply(alice, claim(alice_leaf, &alice_proof, false)),
            Err(RaffleError::InvalidGameState)
        );
    }

    #[test]
    fn refunds_root_implicitly_cancels_open_raffle() {
        let mut f = Fixture::new();
        f.open();
        let effects = f
            .apply(f.admin, Operation::SetRefundsMerkleRoot([4u8; 32]))
            .unwrap();
        assert!(effects.contains(&Effect::Emit(RaffleEvent::RaffleCancelled { admin: f.admin })));
        assert!(effects.contains(&Effect::Emit(RaffleEvent::RefundsActivated { root: [4u8; 32] })));
        assert_eq!(f.raffle.state, GameState::RefundsActivated);
        assert_eq!(
            f.apply(Pubkey::new_unique(), Operation::Participate { value: PRICE }),
            Err(RaffleError::RaffleDisabled)
        );
    }

    #[test]
    fn refund_exceeding_held_balance_is_rejected() {
        let mut f = Fixture::new();
        f.open();
        let account = Pubkey::new_unique();
        let tree = ClaimsTree::new(&[RefundAllocation {
            account,
            ticket_count: 5,
        }]);
        f.apply(f.admin, Operation::SetRefundsMerkleRoot(tree.root()))
            .unwrap();
        let proof = tree.proof_for(0, &account, 5).unwrap();
        assert_eq!(
            f.apply(
                account,
                Operation::ClaimRefund {
                    leaf: ClaimLeafData {
                        index: 0,
                        ticket_count: 5,
                    },
                    proof: &proof,
                    already_claimed: false,
                }
            ),
            Err(RaffleError::InsufficientFunds)
        );
    }

    #[test]
    fn subscription_id_is_admin_readable() {
        let mut f = Fixture::new();
        f.apply(f.admin, Operation::SetSubscriptionId(991)).unwrap();
        let effects = f.apply(f.admin, Operation::GetSubscriptionId).unwrap();
        assert_eq!(effects, vec![Effect::ReturnSubscriptionId(991)]);
    }

    #[test]
    fn admin_rotation_moves_the_role() {
        let mut f = Fixture::new();
        let new_admin = Pubkey::new_unique();
        f.apply(f.admin, Operation::UpdateAdmin(new_admin)).unwrap();
        assert_eq!(
            f.apply(f.admin, Operation::SetEnabled(true)),
            Err(RaffleError::AccessDenied)
        );
        f.apply(new_admin, Operation::SetEnabled(true)).unwrap();
        assert_eq!(f.raffle.state, GameState::Open);
    }

    #[test]
    fn replaying_a_random_value_is_deterministic() {
        let run = |random_value: [u8; 32]| {
            let mut f = Fixture::new();
            f.open();
            for _ in 0..4 {
                f.apply(Pubkey::new_unique(), Operation::Participate { value: PRICE * 25 })
                    .unwrap();
            }
            f.apply(Pubkey::new_unique(), Operation::Participate { value: FEE + PRIZE })
                .unwrap();
            let request_id = f.raffle.pending_request.unwrap();
            f.fulfill(f.service, request_id, random_value).unwrap();
            (f.raffle.winning_ticket_id(), f.raffle.tickets_minted())
        };
        let (first, minted) = run([0x5au8; 32]);
        let (second, _) = run([0x5au8; 32]);
        assert_eq!(first, second);
        assert_eq!(minted, 4 * 25 + 120);
        assert_eq!(Some(first), vrf::winning_ticket_id(&[0x5au8; 32], minted));
    }
}
