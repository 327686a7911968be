//! Trade resolution
//!
//! `open_trades` walks a keeper batch in order. Each intent runs through the
//! full check sequence before anything is charged; the first failed check
//! becomes a `FailResolve` (or `CancelTrade` for capacity) event and the
//! batch moves on.
//!
//! In-flight permits and registrations are separate user authorizations and
//! stay applied even when a later check on the same intent fails.

use crate::state::{ProtocolState, QueuedTrade};
use crate::Result;
use binopt_crypto::MessageKind;
use binopt_ledger::LedgerError;
use binopt_market::{
    is_strike_valid, resolve_interest, settlement_fee_percentage, split_fee, MarketError,
    OiDecision,
};
use binopt_registrar::RegistrarError;
use binopt_types::{
    Address, Amount, CancelCode, FailureReason, OpenTradeRequest, OptionPosition, OptionState,
    ProtocolEvent, RevokeRequest, Timestamp, TradeIntent, TxOutcome,
};
use tracing::{debug, info, warn};

/// Why an intent did not open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Fail(FailureReason),
    Cancel(CancelCode),
}

impl From<FailureReason> for Rejection {
    fn from(reason: FailureReason) -> Self {
        Rejection::Fail(reason)
    }
}

fn ledger_reason(err: &LedgerError) -> FailureReason {
    let reason = match err {
        LedgerError::InsufficientBalance { .. } => FailureReason::InsufficientBalance,
        LedgerError::InsufficientAllowance { .. } => FailureReason::IncorrectAllowance,
        LedgerError::PermitExpired { .. } => FailureReason::PermitExpiredDeadline,
        LedgerError::PermitInvalidSignature => FailureReason::PermitInvalidSignature,
        LedgerError::AmountTooLarge { .. } => FailureReason::PoolAmountTooLarge,
        _ => FailureReason::TokenTransferFailed,
    };
    warn!(error = %err, %reason, "ledger call failed");
    reason
}

/// Reason for a failed pool unlock
pub(crate) fn unlock_reason(err: &LedgerError) -> FailureReason {
    let reason = match err {
        LedgerError::NotLocked(_) => FailureReason::OptionNotActive,
        _ => FailureReason::TokenTransferFailed,
    };
    warn!(error = %err, %reason, "pool unlock failed");
    reason
}

fn pricing_reason(err: &MarketError) -> FailureReason {
    match err {
        MarketError::Overflow => FailureReason::PoolAmountTooLarge,
        _ => FailureReason::WrongSettlementFee,
    }
}

pub(crate) fn registrar_reason(err: &RegistrarError) -> FailureReason {
    match err {
        RegistrarError::AlreadyRegistered { .. } => FailureReason::AccountAlreadyRegistered,
        _ => FailureReason::WrongRegisterSignature,
    }
}

/// Everything needed to open an intent once all checks passed
#[derive(Debug)]
struct ResolvedTrade {
    signer: Address,
    platform_fee: Amount,
    applied_fee: Amount,
    amount: Amount,
    premium: Amount,
    settlement_fee: Amount,
    referrer: Option<Address>,
    rebate: Amount,
    boosted: bool,
    strike: u128,
}

impl ProtocolState {
    /// Resolve a batch of signed trade intents
    pub fn open_trades(
        &mut self,
        keeper: &Address,
        now: Timestamp,
        requests: &[OpenTradeRequest],
    ) -> Result<TxOutcome> {
        self.ensure_keeper(keeper)?;
        let mut events = Vec::new();

        for request in requests {
            let intent = &request.intent;
            match self.open_trade(now, request, &mut events) {
                Ok(()) => {}
                Err(Rejection::Fail(reason)) => {
                    warn!(queue_id = %intent.queue_id, user = %intent.user, %reason, "trade rejected");
                    events.push(ProtocolEvent::FailResolve {
                        queue_id: intent.queue_id,
                        reason,
                    });
                }
                Err(Rejection::Cancel(code)) => {
                    warn!(queue_id = %intent.queue_id, user = %intent.user, %code, "trade cancelled");
                    events.push(ProtocolEvent::CancelTrade {
                        account: intent.user,
                        queue_id: intent.queue_id,
                        reason: code,
                    });
                }
            }
        }
        Ok(TxOutcome::new(events))
    }

    /// Revoke the router's allowance for each user with a zero-value permit
    ///
    /// A failed permit is logged and skipped.
    pub fn revoke_approvals(
        &mut self,
        keeper: &Address,
        now: Timestamp,
        requests: &[RevokeRequest],
    ) -> Result<TxOutcome> {
        self.ensure_keeper(keeper)?;
        let router = self.config.contracts.router;
        let mut events = Vec::new();

        for request in requests {
            if request.token != self.token.address() {
                warn!(token = %request.token, user = %request.user, "revoke for unknown token skipped");
                continue;
            }
            let mut permit_events = Vec::new();
            match self.token.permit(
                request.user,
                router,
                0,
                request.deadline,
                &request.signature,
                now,
                self.verifier.as_ref(),
                &mut permit_events,
            ) {
                Ok(()) => {
                    events.extend(permit_events);
                    events.push(ProtocolEvent::RevokeRouter {
                        token: request.token,
                        user: request.user,
                        revoked_at: now,
                    });
                }
                Err(e) => warn!(user = %request.user, error = %e, "revoke failed"),
            }
        }
        Ok(TxOutcome::new(events))
    }

    fn open_trade(
        &mut self,
        now: Timestamp,
        request: &OpenTradeRequest,
        events: &mut Vec<ProtocolEvent>,
    ) -> std::result::Result<(), Rejection> {
        let resolved = self.check_trade(now, request, events)?;
        Ok(self.apply_trade(now, &request.intent, resolved, events)?)
    }

    fn check_trade(
        &mut self,
        now: Timestamp,
        request: &OpenTradeRequest,
        events: &mut Vec<ProtocolEvent>,
    ) -> std::result::Result<ResolvedTrade, Rejection> {
        let intent = &request.intent;
        let user = intent.user;
        let router = self.config.contracts.router;

        let market = self
            .markets
            .get(&intent.target_contract)
            .ok_or(FailureReason::UnauthorizedContract)?;
        let config = market.config.clone();
        let market_oi = market.oi;

        let required = intent.total_fee.saturating_add(config.platform_fee);
        if self.token.balance_of(&user) < required {
            return Err(FailureReason::InsufficientBalance.into());
        }

        if let Some(permit) = &request.permit {
            self.token
                .permit(
                    user,
                    router,
                    permit.value,
                    permit.deadline,
                    &permit.signature,
                    now,
                    self.verifier.as_ref(),
                    events,
                )
                .map_err(|e| ledger_reason(&e))?;
        }

        if let Some(register) = &request.register {
            self.registrar
                .register(
                    user,
                    register.one_ct,
                    &register.signature,
                    self.verifier.as_ref(),
                    events,
                )
                .map_err(|e| registrar_reason(&e))?;
        }

        if self.token.allowance(&user, &router) < required {
            return Err(FailureReason::IncorrectAllowance.into());
        }

        if self.queued_trades.contains_key(&intent.queue_id) {
            return Err(FailureReason::TradeAlreadyOpened.into());
        }
        if self.used_signatures.contains(&intent.user_signature.signature) {
            return Err(FailureReason::SignatureAlreadyUsed.into());
        }

        let attestation = &intent.settlement_fee_attestation;
        let sf_digest = self.signing.settlement_fee(
            &config.asset_pair,
            attestation.settlement_fee,
            attestation.expiry_timestamp,
        );
        if !self.verifier.verify(
            MessageKind::SettlementFee,
            &sf_digest,
            &attestation.signature,
            &self.config.signers.sf_publisher,
        ) {
            return Err(FailureReason::WrongSettlementFee.into());
        }
        if now > attestation.expiry_timestamp {
            return Err(FailureReason::SettlementFeeExpired.into());
        }

        let signer = self.registrar.one_ct(&user);
        let (kind, digest) = self.signing.trade(intent);
        if signer.is_zero()
            || !self
                .verifier
                .verify(kind, &digest, &intent.user_signature.signature, &signer)
        {
            return Err(FailureReason::UserSignatureMismatch.into());
        }

        if intent.is_limit_order {
            if now > intent.limit_order_expiry {
                return Err(FailureReason::LimitOrderExpired.into());
            }
        } else {
            let signed_at = intent.user_signature.timestamp;
            if signed_at > now || now - signed_at > self.config.limits.max_signature_age {
                return Err(FailureReason::InvalidUserSignatureTimestamp.into());
            }
        }

        let price = &intent.publisher_price;
        let price_digest = self
            .signing
            .publisher_price(&config.asset_pair, price.timestamp, price.price);
        if !self.verifier.verify(
            MessageKind::PublisherPrice,
            &price_digest,
            &price.signature,
            &self.config.signers.publisher,
        ) {
            return Err(FailureReason::PublisherSignatureMismatch.into());
        }
        if price.timestamp > now || now - price.timestamp > self.config.limits.max_price_age {
            return Err(FailureReason::InvalidPriceTimestamp.into());
        }

        if !config.is_period_allowed(intent.period) {
            return Err(FailureReason::WrongPeriod.into());
        }
        if let Some(window) = &config.creation_window {
            if !window.is_in_creation_window(now, intent.period) {
                return Err(FailureReason::IncorrectMarketHours.into());
            }
        }
        if intent.total_fee < config.min_fee {
            return Err(FailureReason::FeeBelowMinimum.into());
        }
        if !is_strike_valid(intent.slippage, price.price, intent.strike) {
            return Err(FailureReason::SlippageExceeded.into());
        }

        let applied_fee = match resolve_interest(
            intent.total_fee,
            intent.allow_partial_fill,
            &self.pool_oi,
            &market_oi,
        ) {
            OiDecision::Full(fee) => fee,
            OiDecision::Partial(fee) => {
                debug!(queue_id = %intent.queue_id, requested = intent.total_fee, applied = fee, "partial fill");
                fee
            }
            OiDecision::Cancel(code) => return Err(Rejection::Cancel(code)),
        };

        let referrer = self
            .referral
            .referrer_for(&intent.referral_code)
            .filter(|r| *r != user);
        let referral_reduction = referrer
            .map(|r| self.referral.fee_reduction(&r, &user))
            .unwrap_or(0);
        let boost_reduction =
            self.booster
                .fee_reduction(&self.token.address(), &user, attestation.settlement_fee);
        let sf_percentage = settlement_fee_percentage(
            attestation.settlement_fee,
            referral_reduction,
            boost_reduction,
        );
        let (amount, premium, settlement_fee) =
            split_fee(applied_fee, sf_percentage).map_err(|e| pricing_reason(&e))?;

        if amount > self.pool.available_balance(&self.token) {
            return Err(FailureReason::PoolAmountTooLarge.into());
        }

        let rebate = referrer
            .map(|r| self.referral.rebate(&r, &user, settlement_fee))
            .unwrap_or(0);

        Ok(ResolvedTrade {
            signer,
            platform_fee: config.platform_fee,
            applied_fee,
            amount,
            premium,
            settlement_fee,
            referrer,
            rebate,
            boosted: boost_reduction > 0,
            strike: if intent.is_limit_order {
                intent.strike
            } else {
                price.price
            },
        })
    }

    fn apply_trade(
        &mut self,
        now: Timestamp,
        intent: &TradeIntent,
        trade: ResolvedTrade,
        events: &mut Vec<ProtocolEvent>,
    ) -> std::result::Result<(), FailureReason> {
        let user = intent.user;
        let market_address = intent.target_contract;

        self.collect_fees(intent, &trade, events)
            .map_err(|e| ledger_reason(&e))?;

        let token_address = self.token.address();
        if trade.boosted {
            self.booster.consume(&token_address, &user);
        }

        let market = self
            .markets
            .get_mut(&market_address)
            .ok_or(FailureReason::UnauthorizedContract)?;
        let option_id = market.next_option_id;
        self.pool
            .lock(&self.token, market_address, option_id, trade.amount, trade.premium)
            .map_err(|e| ledger_reason(&e))?;
        market.next_option_id = option_id.next();
        market.oi.increase(trade.applied_fee);
        self.pool_oi.increase(trade.applied_fee);

        market.options.insert(
            option_id,
            OptionPosition {
                id: option_id,
                market: market_address,
                owner: user,
                queue_id: intent.queue_id,
                state: OptionState::Active,
                strike: trade.strike,
                amount: trade.amount,
                locked_amount: trade.amount,
                premium: trade.premium,
                expiration: now + intent.period,
                is_above: None,
                total_fee: trade.applied_fee,
                settlement_fee: trade.settlement_fee,
                created_at: now,
            },
        );
        self.queued_trades.insert(
            intent.queue_id,
            QueuedTrade {
                intent: intent.clone(),
                signer: trade.signer,
                option_id,
                opened_at: now,
            },
        );
        self.used_signatures
            .insert(intent.user_signature.signature);

        events.push(ProtocolEvent::Create {
            account: user,
            id: option_id,
            settlement_fee: trade.settlement_fee,
            total_fee: trade.applied_fee,
        });
        events.push(ProtocolEvent::UpdatePoolOI {
            is_increased: true,
            interest: trade.applied_fee,
        });
        events.push(ProtocolEvent::OpenTrade {
            account: user,
            queue_id: intent.queue_id,
            option_id,
            target_contract: market_address,
        });

        info!(
            queue_id = %intent.queue_id,
            %option_id,
            %user,
            market = %market_address,
            applied_fee = trade.applied_fee,
            amount = trade.amount,
            "trade opened"
        );
        Ok(())
    }
}

impl ProtocolState {
    /// Pull the applied and platform fees from the user and route them
    fn collect_fees(
        &mut self,
        intent: &TradeIntent,
        trade: &ResolvedTrade,
        events: &mut Vec<ProtocolEvent>,
    ) -> std::result::Result<(), LedgerError> {
        let router = self.config.contracts.router;
        self.token.transfer_from(
            router,
            intent.user,
            router,
            trade.applied_fee + trade.platform_fee,
            events,
        )?;
        self.token.transfer(
            router,
            self.config.accounts.treasury,
            trade.platform_fee,
            events,
        )?;
        self.token.transfer(
            router,
            self.config.accounts.settlement_fee_disbursal,
            trade.settlement_fee - trade.rebate,
            events,
        )?;
        if let Some(referrer) = trade.referrer {
            self.token.transfer(router, referrer, trade.rebate, events)?;
        }
        self.token
            .transfer(router, self.pool.address(), trade.premium, events)
    }
}
