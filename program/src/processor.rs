// Raffle program - instruction processor
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::{Clock, UnixTimestamp},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::Sysvar,
};

use crate::{
    error::RaffleError,
    instruction::RaffleInstruction,
    machine::{self, Call, Effect, Operation, Transition},
    merkle::{ClaimLeafData, MerkleHash},
    state::{ClaimRecord, Raffle, RaffleConfig},
    tickets::TicketLedger,
    utils::{self, CLAIM_SEED},
};

/// Accounts an operation may touch while its effects are applied
struct Context<'a, 'info> {
    program_id: &'a Pubkey,
    signer: &'a AccountInfo<'info>,
    raffle: &'a AccountInfo<'info>,
    ticket_ledger: Option<&'a AccountInfo<'info>>,
    /// Claim record PDA and its bump seed
    claim_record: Option<(&'a AccountInfo<'info>, u8)>,
    system_program: Option<&'a AccountInfo<'info>>,
    /// Non-signer destination of a payout
    recipient: Option<&'a AccountInfo<'info>>,
}

impl<'a, 'info> Context<'a, 'info> {
    fn new(program_id: &'a Pubkey, signer: &'a AccountInfo<'info>, raffle: &'a AccountInfo<'info>) -> Self {
        Self {
            program_id,
            signer,
            raffle,
            ticket_ledger: None,
            claim_record: None,
            system_program: None,
            recipient: None,
        }
    }

    fn system_program(&self) -> Result<&'a AccountInfo<'info>, ProgramError> {
        let info = self.system_program.ok_or(ProgramError::NotEnoughAccountKeys)?;
        if !system_program::check_id(info.key) {
            msg!("Expected the system program, got {}", info.key);
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(info)
    }

    /// The recipient account wins over the signer, which may be passed readonly.
    fn payee(&self, to: &Pubkey) -> Result<&'a AccountInfo<'info>, ProgramError> {
        match self.recipient {
            Some(info) if info.key == to => Ok(info),
            _ if self.signer.key == to => Ok(self.signer),
            _ => {
                msg!("Payout destination {} was not provided", to);
                Err(ProgramError::InvalidArgument)
            }
        }
    }
}

/// Program state handler.
pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle {
                admin,
                ticket_price,
                end_date,
                platform_fee,
                prize_amount,
                payout_wallet,
                randomness_service,
                key_hash,
            } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(
                    program_id,
                    accounts,
                    admin,
                    ticket_price,
                    end_date,
                    platform_fee,
                    prize_amount,
                    payout_wallet,
                    randomness_service,
                    key_hash,
                )
            }
            RaffleInstruction::SetEnabled { enabled } => {
                msg!("Instruction: Set Enabled");
                Self::process_admin(program_id, accounts, Operation::SetEnabled(enabled))
            }
            RaffleInstruction::Participate { value } => {
                msg!("Instruction: Participate");
                Self::process_participate(program_id, accounts, value)
            }
            RaffleInstruction::SetSubscriptionId { subscription_id } => {
                msg!("Instruction: Set Subscription Id");
                Self::process_admin(
                    program_id,
                    accounts,
                    Operation::SetSubscriptionId(subscription_id),
                )
            }
            RaffleInstruction::GetSubscriptionId => {
                msg!("Instruction: Get Subscription Id");
                Self::process_admin(program_id, accounts, Operation::GetSubscriptionId)
            }
            RaffleInstruction::UpdateEndDate { end_date } => {
                msg!("Instruction: Update End Date");
                Self::process_admin(program_id, accounts, Operation::UpdateEndDate(end_date))
            }
            RaffleInstruction::UpdateAdmin { new_admin } => {
                msg!("Instruction: Update Admin");
                Self::process_admin(program_id, accounts, Operation::UpdateAdmin(new_admin))
            }
            RaffleInstruction::CancelRaffle => {
                msg!("Instruction: Cancel Raffle");
                Self::process_admin(program_id, accounts, Operation::Cancel)
            }
            RaffleInstruction::WithdrawProceeds => {
                msg!("Instruction: Withdraw Proceeds");
                Self::process_withdraw_proceeds(program_id, accounts)
            }
            RaffleInstruction::SetRefundsMerkleRoot { root } => {
                msg!("Instruction: Set Refunds Merkle Root");
                Self::process_admin(program_id, accounts, Operation::SetRefundsMerkleRoot(root))
            }
            RaffleInstruction::ClaimRefund { leaf, proof } => {
                msg!("Instruction: Claim Refund");
                Self::process_claim_refund(program_id, accounts, leaf, &proof)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_value,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id, random_value)
            }
            RaffleInstruction::ClaimPrize => {
                msg!("Instruction: Claim Prize");
                Self::process_claim_prize(program_id, accounts)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_initialize_raffle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        admin: Pubkey,
        ticket_price: u64,
        end_date: UnixTimestamp,
        platform_fee: u64,
        prize_amount: u64,
        payout_wallet: Pubkey,
        randomness_service: Pubkey,
        key_hash: [u8; 32],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let ledger_info = next_account_info(account_info_iter)?;

        if !payer_info.is_signer {
            msg!("Payer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if raffle_info.owner != program_id || ledger_info.owner != program_id {
            msg!("Raffle and ticket ledger accounts must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        if raffle_info.key == ledger_info.key {
            msg!("Raffle and ticket ledger must be distinct accounts");
            return Err(ProgramError::InvalidArgument);
        }

        let rent = Rent::get()?;
        if !rent.is_exempt(raffle_info.lamports(), raffle_info.data_len())
            || !rent.is_exempt(ledger_info.lamports(), ledger_info.data_len())
        {
            msg!("Raffle and ticket ledger accounts must be rent exempt");
            return Err(ProgramError::AccountNotRentExempt);
        }

        let existing = Raffle::unpack_unchecked(&raffle_info.data.borrow())?;
        if existing.is_initialized() {
            msg!("Raffle account is already initialized");
            return Err(ProgramError::AccountAlreadyInitialized);
        }
        let ledger = TicketLedger::load(ledger_info)?;
        if ledger.raffle != Pubkey::default() || ledger.tickets_minted() != 0 {
            msg!("Ticket ledger account is already in use");
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        let config = RaffleConfig::new(
            admin,
            ticket_price,
            end_date,
            platform_fee,
            prize_amount,
            payout_wallet,
            randomness_service,
            key_hash,
            *ledger_info.key,
        )?;
        let required_space = TicketLedger::max_batches(config.target_goal, config.ticket_price)
            .map(TicketLedger::space_for)
            .ok_or(RaffleError::InvalidRaffleConfig)?;
        if ledger_info.data_len() < required_space {
            msg!(
                "Ticket ledger holds {} bytes, a full raffle needs {}",
                ledger_info.data_len(),
                required_space
            );
            return Err(RaffleError::InvalidRaffleConfig.into());
        }
        TicketLedger::new(*raffle_info.key).store(ledger_info)?;
        Raffle::pack(Raffle::new(config), &mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: ticket price {} lamports, goal {} SOL, ends at {}",
            ticket_price,
            utils::lamports_to_sol(config.target_goal),
            end_date
        );
        Ok(())
    }

    /// Admin operations touching only the raffle account
    fn process_admin(program_id: &Pubkey, accounts: &[AccountInfo], op: Operation) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        Self::execute(Context::new(program_id, admin_info, raffle_info), op)
    }

    fn process_participate(program_id: &Pubkey, accounts: &[AccountInfo], value: u64) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let buyer_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let ledger_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        let mut ctx = Context::new(program_id, buyer_info, raffle_info);
        ctx.ticket_ledger = Some(ledger_info);
        ctx.system_program = Some(system_program_info);
        Self::execute(ctx, Operation::Participate { value })
    }

    fn process_withdraw_proceeds(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let payout_info = next_account_info(account_info_iter)?;

        let mut ctx = Context::new(program_id, admin_info, raffle_info);
        ctx.recipient = Some(payout_info);
        Self::execute(ctx, Operation::WithdrawProceeds)
    }

    fn process_claim_refund(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        leaf: ClaimLeafData,
        proof: &[MerkleHash],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let claimant_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let claim_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        let (expected_claim, bump_seed) =
            utils::find_claim_record_address(program_id, raffle_info.key, leaf.index);
        if *claim_info.key != expected_claim {
            msg!("Invalid claim record address for index {}", leaf.index);
            return Err(ProgramError::InvalidSeeds);
        }
        let already_claimed = claim_info.owner == program_id && !claim_info.data_is_empty();

        let mut ctx = Context::new(program_id, claimant_info, raffle_info);
        ctx.claim_record = Some((claim_info, bump_seed));
        ctx.system_program = Some(system_program_info);
        Self::execute(
            ctx,
            Operation::ClaimRefund {
                leaf,
                proof,
                already_claimed,
            },
        )
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: [u8; 32],
        random_value: [u8; 32],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let service_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let ledger_info = next_account_info(account_info_iter)?;

        let tickets = Self::load_ticket_ledger(program_id, raffle_info, ledger_info)?;
        let mut ctx = Context::new(program_id, service_info, raffle_info);
        ctx.ticket_ledger = Some(ledger_info);
        Self::execute(
            ctx,
            Operation::FulfillRandomWords {
                request_id,
                random_value,
                tickets: &tickets,
            },
        )
    }

    fn process_claim_prize(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let winner_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        Self::execute(
            Context::new(program_id, winner_info, raffle_info),
            Operation::ClaimPrize,
        )
    }

    /// Runs `op` through the state machine, applies its effects and stores
    /// the new raffle state.
    fn execute(ctx: Context, op: Operation) -> ProgramResult {
        if !ctx.signer.is_signer {
            msg!("{} must sign the transaction", ctx.signer.key);
            return Err(ProgramError::MissingRequiredSignature);
        }
        let raffle = Self::load_raffle(ctx.program_id, ctx.raffle)?;
        if let Some(ledger_info) = ctx.ticket_ledger {
            if *ledger_info.key != raffle.config.ticket_ledger {
                msg!("Expected ticket ledger {}, got {}", raffle.config.ticket_ledger, ledger_info.key);
                return Err(ProgramError::InvalidArgument);
            }
        }

        let rent = Rent::get()?;
        let call = Call {
            raffle: *ctx.raffle.key,
            caller: *ctx.signer.key,
            now: Clock::get()?.unix_timestamp,
            available: utils::spendable_lamports(ctx.raffle, &rent),
        };

        let Transition {
            raffle: next,
            effects,
        } = machine::transition(&raffle, &call, op).map_err(|e| {
            msg!("Rejected: {}", e);
            e
        })?;

        for effect in effects {
            Self::apply_effect(&ctx, &rent, effect)?;
        }

        if next != raffle {
            if next.state != raffle.state {
                msg!("Raffle state: {:?} -> {:?}", raffle.state, next.state);
            }
            Raffle::pack(next, &mut ctx.raffle.data.borrow_mut())?;
        }
        Ok(())
    }

    fn apply_effect(ctx: &Context, rent: &Rent, effect: Effect) -> ProgramResult {
        match effect {
            Effect::Deposit { from, amount } => {
                let system_program_info = ctx.system_program()?;
                invoke(
                    &system_instruction::transfer(&from, ctx.raffle.key, amount),
                    &[
                        ctx.signer.clone(),
                        ctx.raffle.clone(),
                        system_program_info.clone(),
                    ],
                )?;
            }
            Effect::MintTickets { owner, count } => {
                let ledger_info = ctx.ticket_ledger.ok_or(ProgramError::NotEnoughAccountKeys)?;
                let mut ledger = Self::load_ticket_ledger(ctx.program_id, ctx.raffle, ledger_info)?;
                let ids = ledger.mint(owner, count)?;
                ledger.store(ledger_info)?;
                msg!("Minted tickets {} to {} for {}", ids.start(), ids.end(), owner);
            }
            Effect::Pay { to, amount } => {
                let payee_info = ctx.payee(&to)?;
                Self::transfer_lamports(ctx.raffle, payee_info, amount)?;
            }
            Effect::RecordClaim {
                index,
                account,
                ticket_count,
            } => {
                let (claim_info, bump_seed) =
                    ctx.claim_record.ok_or(ProgramError::NotEnoughAccountKeys)?;
                let system_program_info = ctx.system_program()?;
                let index_bytes = index.to_le_bytes();
                let bump = [bump_seed];
                let signer_seeds: &[&[u8]] = &[CLAIM_SEED, ctx.raffle.key.as_ref(), &index_bytes, &bump];
                Self::create_pda_account(
                    ctx.signer,
                    claim_info,
                    system_program_info,
                    ctx.program_id,
                    rent,
                    ClaimRecord::LEN,
                    signer_seeds,
                )?;
                ClaimRecord::pack(
                    ClaimRecord {
                        is_initialized: true,
                        raffle: *ctx.raffle.key,
                        index,
                        account,
                        ticket_count,
                    },
                    &mut claim_info.data.borrow_mut(),
                )?;
            }
            Effect::ReturnSubscriptionId(subscription_id) => {
                set_return_data(&subscription_id.to_le_bytes());
            }
            Effect::Emit(event) => event.emit(),
        }
        Ok(())
    }

    /// Creates a PDA owned by this program. An address that was already sent
    /// lamports is topped up to rent exemption, then allocated and assigned.
    fn create_pda_account<'info>(
        payer_info: &AccountInfo<'info>,
        new_account_info: &AccountInfo<'info>,
        system_program_info: &AccountInfo<'info>,
        program_id: &Pubkey,
        rent: &Rent,
        space: usize,
        signer_seeds: &[&[u8]],
    ) -> ProgramResult {
        let required_lamports = rent.minimum_balance(space);
        let current_lamports = new_account_info.lamports();

        if current_lamports == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    new_account_info.key,
                    required_lamports,
                    space as u64,
                    program_id,
                ),
                &[
                    payer_info.clone(),
                    new_account_info.clone(),
                    system_program_info.clone(),
                ],
                &[signer_seeds],
            );
        }

        msg!("{} is pre-funded with {} lamports", new_account_info.key, current_lamports);
        let shortfall = required_lamports.saturating_sub(current_lamports);
        if shortfall > 0 {
            invoke(
                &system_instruction::transfer(payer_info.key, new_account_info.key, shortfall),
                &[
                    payer_info.clone(),
                    new_account_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(new_account_info.key, space as u64),
            &[new_account_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(new_account_info.key, program_id),
            &[new_account_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )
    }

    fn load_raffle(program_id: &Pubkey, raffle_info: &AccountInfo) -> Result<Raffle, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        Raffle::unpack(&raffle_info.data.borrow())
    }

    fn load_ticket_ledger(
        program_id: &Pubkey,
        raffle_info: &AccountInfo,
        ledger_info: &AccountInfo,
    ) -> Result<TicketLedger, ProgramError> {
        if ledger_info.owner != program_id {
            msg!("Ticket ledger must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let ledger = TicketLedger::load(ledger_info)?;
        if ledger.raffle != *raffle_info.key {
            msg!("Ticket ledger {} does not belong to this raffle", ledger_info.key);
            return Err(ProgramError::InvalidArgument);
        }
        Ok(ledger)
    }

    /// Moves lamports out of the program-owned raffle account.
    fn transfer_lamports(from: &AccountInfo, to: &AccountInfo, amount: u64) -> ProgramResult {
        if amount == 0 {
            return Ok(());
        }
        let from_lamports = from
            .lamports()
            .checked_sub(amount)
            .ok_or(RaffleError::InsufficientFunds)?;
        let to_lamports = to
            .lamports()
            .checked_add(amount)
            .ok_or(RaffleError::AmountOverflow)?;
        **from.lamports.borrow_mut() = from_lamports;
        **to.lamports.borrow_mut() = to_lamports;
        msg!("Transferred {} lamports to {}", amount, to.key);
        Ok(())
    }
}
