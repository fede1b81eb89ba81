//! The compounding engine.
//!
//! `CompoundingEngine` owns the custody registry, the balance ledger and the
//! configuration, and talks to the position manager, the pools and the token
//! transport it was built with. Every public mutation runs as one
//! transaction: the engine is snapshotted before the call and restored if any
//! step fails, so a failed call leaves no trace. Events of a committed call
//! are appended to the log and then broadcast to subscribers.

use crate::config::{AdminCap, EngineConfig, next_engine_id};
use crate::custody::CustodyRegistry;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EngineEventKind, EventLog};
use crate::ledger::BalanceLedger;
use crate::swap::{self, SwapDirection, SwapPlan};
use crate::twap_guard::{self, GuardedPrice};
use compoundor_domain::compound::{AutoCompoundParams, AutoCompoundResult, BonusConversion};
use compoundor_domain::events::{CustodyEvent, EventCursor};
use compoundor_domain::fees::{FeeSplit, TokenSettlement, reinvest_budget};
use compoundor_domain::math::{Rounding, X64, mul_div};
use compoundor_domain::position::PositionInfo;
use compoundor_domain::{AccountId, PositionId, TokenAmount, TokenId};
use compoundor_protocols::{
    DecreaseLiquidityParams, IncreaseLiquidityParams, IncreaseLiquidityResult, PoolSource,
    PositionManager, TokenTransport,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Acknowledgement of an accepted deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositReceipt {
    pub position: PositionId,
    pub owner: AccountId,
    pub cursor: EventCursor,
}

/// Amounts of one token as they flow through a compound.
#[derive(Debug, Clone, Copy, Default)]
struct Leg {
    token: TokenId,
    available: TokenAmount,
    settlement: TokenSettlement,
    bonus: TokenAmount,
    protocol_fee: TokenAmount,
}

/// Custodial auto-compounder over a position manager `P`, a pool source `S`
/// and a token transport `T`.
#[derive(Debug, Clone)]
pub struct CompoundingEngine<P, S, T> {
    id: u64,
    address: AccountId,
    treasury: AccountId,
    config: EngineConfig,
    registry: CustodyRegistry,
    ledger: BalanceLedger,
    position_manager: P,
    pools: S,
    tokens: T,
    log: EventLog,
    sender: Option<broadcast::Sender<EngineEvent>>,
}

impl<P, S, T> CompoundingEngine<P, S, T>
where
    P: PositionManager + Clone,
    S: PoolSource + Clone,
    T: TokenTransport + Clone,
{
    /// Creates an engine and the capability that administers it.
    ///
    /// `address` is the account positions are transferred to on deposit;
    /// protocol fees are credited to `treasury`.
    pub fn new(
        address: AccountId,
        treasury: AccountId,
        config: EngineConfig,
        position_manager: P,
        pools: S,
        tokens: T,
    ) -> (Self, AdminCap) {
        let id = next_engine_id();
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let engine = Self {
            id,
            address,
            treasury,
            config,
            registry: CustodyRegistry::new(),
            ledger: BalanceLedger::new(),
            position_manager,
            pools,
            tokens,
            log: EventLog::default(),
            sender: Some(sender),
        };
        info!(engine_id = id, address = ?address, "Compounding engine created");
        (engine, AdminCap::new(id))
    }

    /// Runs `op` as one transaction.
    fn transact<R>(&mut self, op: impl FnOnce(&mut Self) -> EngineResult<R>) -> EngineResult<R> {
        let snapshot = self.snapshot();
        let checkpoint = self.log.checkpoint();
        self.log.begin_block();

        match op(self) {
            Ok(value) => {
                self.publish(checkpoint.len());
                Ok(value)
            }
            Err(err) => {
                let log = std::mem::take(&mut self.log);
                *self = snapshot;
                self.log = log;
                self.log.rollback(checkpoint);
                Err(err)
            }
        }
    }

    /// Copy of the engine state without the event history.
    fn snapshot(&self) -> Self {
        Self {
            id: self.id,
            address: self.address,
            treasury: self.treasury,
            config: self.config,
            registry: self.registry.clone(),
            ledger: self.ledger.clone(),
            position_manager: self.position_manager.clone(),
            pools: self.pools.clone(),
            tokens: self.tokens.clone(),
            log: self.log.detached(),
            sender: self.sender.clone(),
        }
    }

    fn publish(&self, first_event: usize) {
        if let Some(sender) = &self.sender {
            for event in self.log.since(first_event) {
                // No subscribers is not an error.
                let _ = sender.send(event.clone());
            }
        }
    }

    fn ensure_admin(&self, cap: &AdminCap) -> EngineResult<()> {
        if cap.engine_id() != self.id {
            return Err(EngineError::Unauthorized);
        }
        Ok(())
    }

    fn ensure_owner(&self, position: PositionId, caller: AccountId) -> EngineResult<()> {
        match self.registry.owner_of(position) {
            Some(owner) if owner == caller => Ok(()),
            _ => Err(EngineError::NotOwner { position, caller }),
        }
    }

    /// Registers a position that was transferred to the engine by `from`.
    ///
    /// This is the only way into custody. The transfer itself must already
    /// have happened.
    pub fn accept_deposit(&mut self, position: PositionId, from: AccountId) -> EngineResult<DepositReceipt> {
        self.transact(|engine| {
            if engine.position_manager.owner_of(position)? != engine.address {
                return Err(EngineError::PositionNotDelivered(position));
            }
            engine.registry.deposit(position, from)?;
            engine.log.push(EngineEventKind::TokenDeposited {
                account: from,
                position,
            });
            let cursor = EventCursor::new(engine.log.block_number(), 0);
            info!(position = %position, owner = ?from, "Position deposited");
            Ok(DepositReceipt {
                position,
                owner: from,
                cursor,
            })
        })
    }

    /// Returns a position to `recipient`.
    ///
    /// With `also_withdraw_balances`, the caller's credits in both of the
    /// position's tokens are withdrawn to `recipient` as well, except for
    /// `extra_buffer_amount` of each, which stays credited.
    pub fn withdraw_token(
        &mut self,
        caller: AccountId,
        position: PositionId,
        recipient: AccountId,
        also_withdraw_balances: bool,
        extra_buffer_amount: TokenAmount,
    ) -> EngineResult<()> {
        self.transact(|engine| {
            engine.registry.withdraw(position, caller)?;
            let info = engine.position_manager.position(position)?;
            engine
                .position_manager
                .transfer_position(position, engine.address, recipient)?;
            engine.log.push(EngineEventKind::TokenWithdrawn {
                account: caller,
                recipient,
                position,
            });
            info!(position = %position, owner = ?caller, recipient = ?recipient, "Position withdrawn");

            if also_withdraw_balances {
                for token in [info.token0, info.token1] {
                    let amount = engine
                        .ledger
                        .balance_of(caller, token)
                        .saturating_sub(extra_buffer_amount);
                    engine.withdraw_credit(caller, token, recipient, amount)?;
                }
            }
            Ok(())
        })
    }

    /// Removes liquidity from a custodied position and sends the proceeds,
    /// including uncollected fees, to `recipient`. Owner only.
    pub fn decrease_liquidity_and_collect(
        &mut self,
        caller: AccountId,
        params: DecreaseLiquidityParams,
        recipient: AccountId,
    ) -> EngineResult<(TokenAmount, TokenAmount)> {
        self.transact(|engine| {
            engine.ensure_owner(params.position, caller)?;
            let info = engine.position_manager.position(params.position)?;
            let (amount0, amount1) = engine.position_manager.decrease_liquidity_and_collect(params)?;

            for (token, amount) in [(info.token0, amount0), (info.token1, amount1)] {
                engine.ledger.receive(token, amount)?;
                engine.ledger.release(token, amount)?;
                engine.tokens.transfer(token, recipient, amount)?;
            }
            info!(
                position = %params.position,
                liquidity = params.liquidity,
                amount0 = %amount0,
                amount1 = %amount1,
                "Liquidity removed"
            );
            Ok((amount0, amount1))
        })
    }

    /// Withdraws `amount` of the caller's credit in `token`. Zero is a no-op.
    pub fn withdraw_balance(
        &mut self,
        caller: AccountId,
        token: TokenId,
        recipient: AccountId,
        amount: TokenAmount,
    ) -> EngineResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.transact(|engine| engine.withdraw_credit(caller, token, recipient, amount))
    }

    fn withdraw_credit(
        &mut self,
        account: AccountId,
        token: TokenId,
        recipient: AccountId,
        amount: TokenAmount,
    ) -> EngineResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.ledger
            .withdraw(&mut self.tokens, account, token, amount, recipient)?;
        self.log.push(EngineEventKind::BalanceWithdrawn {
            account,
            token,
            recipient,
            amount,
        });
        Ok(())
    }

    /// Replaces the bonus fractions. The total may only go down.
    pub fn set_bonus(
        &mut self,
        cap: &AdminCap,
        total_bonus_x64: X64,
        compounder_bonus_x64: X64,
    ) -> EngineResult<()> {
        self.ensure_admin(cap)?;
        self.transact(|engine| {
            engine.config = engine.config.with_bonus(total_bonus_x64, compounder_bonus_x64)?;
            engine.log.push(EngineEventKind::BonusUpdated {
                version: engine.config.version,
                total_bonus_x64,
                compounder_bonus_x64,
            });
            info!(
                version = engine.config.version,
                total = %total_bonus_x64,
                compounder = %compounder_bonus_x64,
                "Bonus updated"
            );
            Ok(())
        })
    }

    pub fn set_twap_config(
        &mut self,
        cap: &AdminCap,
        max_tick_difference: u32,
        window_seconds: u32,
    ) -> EngineResult<()> {
        self.ensure_admin(cap)?;
        self.transact(|engine| {
            engine.config = engine.config.with_twap(max_tick_difference, window_seconds)?;
            engine.log.push(EngineEventKind::TwapConfigUpdated {
                version: engine.config.version,
                max_tick_difference,
                window_seconds,
            });
            info!(
                version = engine.config.version,
                max_tick_difference, window_seconds, "TWAP config updated"
            );
            Ok(())
        })
    }

    /// Harvests, reinvests and splits the fees of a custodied position.
    ///
    /// Returns the caller's bonus and the reinvested amounts. On any error
    /// nothing is committed.
    pub fn auto_compound(
        &mut self,
        caller: AccountId,
        params: AutoCompoundParams,
    ) -> EngineResult<AutoCompoundResult> {
        self.transact(|engine| engine.compound(caller, params))
    }

    /// Dry run of [`auto_compound`](Self::auto_compound) against a copy of the
    /// engine. Nothing is committed or broadcast.
    pub fn preview_auto_compound(
        &self,
        caller: AccountId,
        params: AutoCompoundParams,
    ) -> EngineResult<AutoCompoundResult> {
        let mut sandbox = self.snapshot();
        sandbox.sender = None;
        sandbox.auto_compound(caller, params)
    }

    fn compound(
        &mut self,
        caller: AccountId,
        params: AutoCompoundParams,
    ) -> EngineResult<AutoCompoundResult> {
        let position = params.position;
        let owner = self
            .registry
            .owner_of(position)
            .ok_or(EngineError::PositionNotCustodied(position))?;
        let info = self.position_manager.position(position)?;

        // The guard runs before anything is collected.
        let guarded = if params.needs_price_guard() {
            let pool = self
                .pools
                .pool_for(info.token0, info.token1, info.fee)
                .ok_or(EngineError::PoolNotFound {
                    token0: info.token0,
                    token1: info.token1,
                    fee: info.fee,
                })?;
            Some(twap_guard::check_price(&self.pools, pool, &self.config.twap)?)
        } else {
            None
        };

        let (collected0, collected1) = self.position_manager.collect(position)?;
        self.ledger.receive(info.token0, collected0)?;
        self.ledger.receive(info.token1, collected1)?;
        debug!(position = %position, collected0 = %collected0, collected1 = %collected1, "Fees collected");

        let mut leg0 = Leg {
            token: info.token0,
            available: collected0,
            ..Leg::default()
        };
        let mut leg1 = Leg {
            token: info.token1,
            available: collected1,
            ..Leg::default()
        };

        if let (true, Some(price)) = (params.do_swap, guarded.as_ref()) {
            if let Some(plan) =
                swap::plan_rebalance(info.tick_range, price.spot_tick, leg0.available, leg1.available)?
            {
                let out = self.execute_swap(&info, price, plan)?;
                match plan.direction {
                    SwapDirection::ZeroForOne => {
                        leg0.available -= plan.amount_in;
                        leg1.available += out;
                    }
                    SwapDirection::OneForZero => {
                        leg1.available -= plan.amount_in;
                        leg0.available += out;
                    }
                }
            }
        }

        let bonus = self.config.bonus;
        let budget0 = reinvest_budget(leg0.available, &bonus)?;
        let budget1 = reinvest_budget(leg1.available, &bonus)?;
        let added = if budget0.is_zero() && budget1.is_zero() {
            IncreaseLiquidityResult::default()
        } else {
            self.position_manager
                .increase_liquidity(IncreaseLiquidityParams {
                    position,
                    amount0_desired: budget0,
                    amount1_desired: budget1,
                    amount0_min: TokenAmount::zero(),
                    amount1_min: TokenAmount::zero(),
                })?
        };
        self.ledger.release(info.token0, added.amount0)?;
        self.ledger.release(info.token1, added.amount1)?;

        for (leg, compounded) in [(&mut leg0, added.amount0), (&mut leg1, added.amount1)] {
            let split = FeeSplit::compute(compounded, &bonus)?;
            leg.settlement = TokenSettlement::settle(leg.available, compounded, split)?;
            leg.bonus = split.bonus;
            leg.protocol_fee = split.protocol_fee;
        }

        // A requested conversion always ran the guard.
        if let Some(price) = guarded.as_ref() {
            self.convert_fees(&info, price, params.bonus_conversion, &mut leg0, &mut leg1)?;
        }

        for leg in [&leg0, &leg1] {
            self.ledger.credit(owner, leg.token, leg.settlement.buffer)?;
            if params.withdraw_bonus {
                self.ledger.release(leg.token, leg.bonus)?;
                self.tokens.transfer(leg.token, caller, leg.bonus)?;
            } else {
                self.ledger.credit(caller, leg.token, leg.bonus)?;
            }
            self.ledger.credit(self.treasury, leg.token, leg.protocol_fee)?;
        }
        self.ledger.check_solvency(info.token0)?;
        self.ledger.check_solvency(info.token1)?;

        let result = AutoCompoundResult {
            bonus0: leg0.bonus,
            bonus1: leg1.bonus,
            compounded0: added.amount0,
            compounded1: added.amount1,
        };
        self.log.push(EngineEventKind::AutoCompounded {
            caller,
            position,
            token0: info.token0,
            token1: info.token1,
            compounded0: added.amount0,
            compounded1: added.amount1,
            bonus0: leg0.bonus,
            bonus1: leg1.bonus,
            protocol_fee0: leg0.protocol_fee,
            protocol_fee1: leg1.protocol_fee,
        });
        info!(
            position = %position,
            caller = ?caller,
            compounded0 = %result.compounded0,
            compounded1 = %result.compounded1,
            bonus0 = %result.bonus0,
            bonus1 = %result.bonus1,
            "Auto-compounded"
        );
        Ok(result)
    }

    /// Swaps through the guarded pool and books the token movement.
    fn execute_swap(
        &mut self,
        info: &PositionInfo,
        price: &GuardedPrice,
        plan: SwapPlan,
    ) -> EngineResult<TokenAmount> {
        let min_out = swap::min_amount_out(plan.direction, plan.amount_in, price, info.fee)?;
        let token_in = plan.token_in(info);
        let token_out = plan.token_out(info);

        let out = self
            .pools
            .swap(price.pool, token_in, plan.amount_in, min_out)?;
        self.ledger.release(token_in, plan.amount_in)?;
        self.ledger.receive(token_out, out)?;
        debug!(
            direction = ?plan.direction,
            amount_in = %plan.amount_in,
            amount_out = %out,
            min_out = %min_out,
            "Swap executed"
        );
        Ok(out)
    }

    /// Moves the caller bonus and protocol fee of the non-target token into
    /// the target token.
    ///
    /// The swap output is split between caller and protocol in the ratio of
    /// their shares, caller rounded up.
    fn convert_fees(
        &mut self,
        info: &PositionInfo,
        price: &GuardedPrice,
        conversion: BonusConversion,
        leg0: &mut Leg,
        leg1: &mut Leg,
    ) -> EngineResult<()> {
        let (direction, source, target) = match conversion {
            BonusConversion::Token0 => (SwapDirection::OneForZero, leg1, leg0),
            BonusConversion::Token1 => (SwapDirection::ZeroForOne, leg0, leg1),
            BonusConversion::None => return Ok(()),
        };

        let amount_in = source.bonus + source.protocol_fee;
        if amount_in.is_zero() {
            return Ok(());
        }

        let out = self.execute_swap(
            info,
            price,
            SwapPlan {
                direction,
                amount_in,
            },
        )?;
        let caller_share = TokenAmount(mul_div(out.0, source.bonus.0, amount_in.0, Rounding::Up)?);
        let protocol_share = out.saturating_sub(caller_share);

        target.bonus += caller_share;
        target.protocol_fee += protocol_share;
        source.bonus = TokenAmount::zero();
        source.protocol_fee = TokenAmount::zero();
        debug!(conversion = %conversion, converted = %amount_in, received = %out, "Fees converted");
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn treasury(&self) -> AccountId {
        self.treasury
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn owner_of(&self, position: PositionId) -> Option<AccountId> {
        self.registry.owner_of(position)
    }

    /// Number of positions `owner` has in custody.
    pub fn balance_of(&self, owner: AccountId) -> usize {
        self.registry.positions_of(owner).len()
    }

    pub fn account_positions(&self, owner: AccountId) -> &[PositionId] {
        self.registry.positions_of(owner)
    }

    pub fn account_balance(&self, account: AccountId, token: TokenId) -> TokenAmount {
        self.ledger.balance_of(account, token)
    }

    pub fn account_balances(&self, account: AccountId) -> Vec<(TokenId, TokenAmount)> {
        self.ledger.balances_of(account)
    }

    /// Tokens the engine holds on behalf of its creditors.
    pub fn held_balance(&self, token: TokenId) -> TokenAmount {
        self.ledger.held(token)
    }

    pub fn events(&self) -> &[EngineEvent] {
        self.log.all()
    }

    /// Deposits and withdrawals in log order.
    pub fn custody_history(&self) -> Vec<CustodyEvent> {
        self.log
            .all()
            .iter()
            .filter_map(EngineEvent::custody_event)
            .collect()
    }

    /// Live feed of committed events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        match &self.sender {
            Some(sender) => sender.subscribe(),
            None => {
                warn!("Subscribing to an engine without an event channel");
                broadcast::channel(1).1
            }
        }
    }

    pub fn position_manager(&self) -> &P {
        &self.position_manager
    }

    /// Mutable access for the market outside the engine, e.g. fee accrual.
    pub fn position_manager_mut(&mut self) -> &mut P {
        &mut self.position_manager
    }

    pub fn pool_source(&self) -> &S {
        &self.pools
    }

    pub fn pool_source_mut(&mut self) -> &mut S {
        &mut self.pools
    }

    pub fn token_transport(&self) -> &T {
        &self.tokens
    }
}
