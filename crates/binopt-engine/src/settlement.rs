//! Option settlement
//!
//! `execute_options` settles at expiry against a publisher price stamped at
//! exactly the expiration time. `close_anytime` settles early at a fair value
//! that decays from one half towards the current outcome. Both need the
//! direction reveal signed by the key that signed the trade, and both report
//! per-option failures as `FailUnlock` events.

use crate::router::{registrar_reason, unlock_reason};
use crate::state::ProtocolState;
use crate::Result;
use binopt_crypto::MessageKind;
use binopt_market::{early_close_payout, early_close_probability, is_winning};
use binopt_types::{
    Address, CloseAnytimeRequest, CloseParams, FailureReason, OptionPosition, OptionState,
    ProtocolEvent, Timestamp, TxOutcome,
};
use tracing::{info, warn};

fn fail_unlock(close: &CloseParams, reason: FailureReason, events: &mut Vec<ProtocolEvent>) {
    warn!(option_id = %close.option_id, market = %close.target_contract, %reason, "settlement rejected");
    events.push(ProtocolEvent::FailUnlock {
        option_id: close.option_id,
        target_contract: close.target_contract,
        reason,
    });
}

impl ProtocolState {
    /// Settle expired options
    pub fn execute_options(
        &mut self,
        keeper: &Address,
        now: Timestamp,
        params: &[CloseParams],
    ) -> Result<TxOutcome> {
        self.ensure_keeper(keeper)?;
        let mut events = Vec::new();
        for close in params {
            if let Err(reason) = self.execute_option(now, close, &mut events) {
                fail_unlock(close, reason, &mut events);
            }
        }
        Ok(TxOutcome::new(events))
    }

    /// Settle options before expiry at the user's request
    pub fn close_anytime(
        &mut self,
        keeper: &Address,
        now: Timestamp,
        requests: &[CloseAnytimeRequest],
    ) -> Result<TxOutcome> {
        self.ensure_keeper(keeper)?;
        let mut events = Vec::new();
        for request in requests {
            if let Err(reason) = self.close_option_early(now, request, &mut events) {
                fail_unlock(&request.close, reason, &mut events);
            }
        }
        Ok(TxOutcome::new(events))
    }

    /// Active option addressed by `close`
    fn active_option(&self, close: &CloseParams) -> std::result::Result<OptionPosition, FailureReason> {
        let option = self
            .options(&close.target_contract, close.option_id)
            .ok_or(FailureReason::OptionDoesNotExist)?;
        if !option.is_active() {
            return Err(FailureReason::OptionNotActive);
        }
        Ok(option.clone())
    }

    fn asset_pair(&self, market: &Address) -> std::result::Result<String, FailureReason> {
        self.market(market)
            .map(|m| m.config().asset_pair.clone())
            .ok_or(FailureReason::OptionDoesNotExist)
    }

    fn check_publisher_price(&self, asset_pair: &str, close: &CloseParams) -> bool {
        let price = &close.publisher_price;
        let digest = self
            .signing
            .publisher_price(asset_pair, price.timestamp, price.price);
        self.verifier.verify(
            MessageKind::PublisherPrice,
            &digest,
            &price.signature,
            &self.config.signers.publisher,
        )
    }

    /// Direction reveal check against the key that signed the trade
    fn check_direction(&self, option: &OptionPosition, close: &CloseParams) -> bool {
        let Some(trade) = self.queued_trades.get(&option.queue_id) else {
            return false;
        };
        let (kind, digest) = self.signing.direction(&trade.intent, close.is_above);
        self.verifier
            .verify(kind, &digest, &close.direction_signature, &trade.signer)
    }

    fn execute_option(
        &mut self,
        now: Timestamp,
        close: &CloseParams,
        events: &mut Vec<ProtocolEvent>,
    ) -> std::result::Result<(), FailureReason> {
        let option = self.active_option(close)?;
        let asset_pair = self.asset_pair(&close.target_contract)?;

        if close.publisher_price.timestamp != option.expiration {
            return Err(FailureReason::WrongPrice);
        }
        if !self.check_publisher_price(&asset_pair, close) {
            return Err(FailureReason::PublisherSignatureMismatch);
        }
        if !self.check_direction(&option, close) {
            return Err(FailureReason::WrongMarketDirection);
        }
        if now < option.expiration {
            return Err(FailureReason::WrongClosingTime);
        }

        let price = close.publisher_price.price;
        let won = is_winning(close.is_above, option.strike, price);
        let payout = if won { option.amount } else { 0 };
        self.pool
            .unlock_and_pay(
                &mut self.token,
                close.target_contract,
                option.id,
                option.owner,
                payout,
                events,
            )
            .map_err(|e| unlock_reason(&e))?;

        let state = if won {
            events.push(ProtocolEvent::Exercise {
                account: option.owner,
                id: option.id,
                profit: option.amount.saturating_sub(option.total_fee),
                price_at_expiration: price,
                is_above: close.is_above,
            });
            OptionState::Exercised
        } else {
            events.push(ProtocolEvent::Expire {
                id: option.id,
                premium: option.premium,
                price_at_expiration: price,
                is_above: close.is_above,
            });
            OptionState::Expired
        };
        self.finish_option(&option, close.is_above, state, events);
        info!(option_id = %option.id, market = %option.market, won, payout, "option settled at expiry");
        Ok(())
    }

    fn close_option_early(
        &mut self,
        now: Timestamp,
        request: &CloseAnytimeRequest,
        events: &mut Vec<ProtocolEvent>,
    ) -> std::result::Result<(), FailureReason> {
        let close = &request.close;

        // applied before the option checks and kept even if the close fails
        if let Some(register) = &request.register {
            let owner = self
                .options(&close.target_contract, close.option_id)
                .map(|o| o.owner)
                .ok_or(FailureReason::OptionDoesNotExist)?;
            self.registrar
                .register(
                    owner,
                    register.one_ct,
                    &register.signature,
                    self.verifier.as_ref(),
                    events,
                )
                .map_err(|e| registrar_reason(&e))?;
        }

        let option = self.active_option(close)?;
        let market = self
            .market(&close.target_contract)
            .ok_or(FailureReason::OptionDoesNotExist)?;
        let config = market.config();
        let asset_pair = config.asset_pair.clone();
        if !config.early_close_enabled
            || now.saturating_sub(option.created_at) <= config.early_close_threshold
        {
            return Err(FailureReason::EarlyCloseNotAllowed);
        }

        let signer = self.registrar.one_ct(&option.owner);
        let digest = self.signing.close_anytime(
            &asset_pair,
            request.user_signature.timestamp,
            option.id,
        );
        if signer.is_zero()
            || !self.verifier.verify(
                MessageKind::CloseAnytime,
                &digest,
                &request.user_signature.signature,
                &signer,
            )
        {
            return Err(FailureReason::UserSignatureMismatch);
        }
        let signed_at = request.user_signature.timestamp;
        if signed_at > now || now - signed_at > self.config.limits.max_signature_age {
            return Err(FailureReason::InvalidUserSignatureTimestamp);
        }

        if !self.check_publisher_price(&asset_pair, close) {
            return Err(FailureReason::PublisherSignatureMismatch);
        }
        let price_ts = close.publisher_price.timestamp;
        if price_ts < option.created_at || price_ts > now {
            return Err(FailureReason::WrongPrice);
        }
        if !self.check_direction(&option, close) {
            return Err(FailureReason::WrongMarketDirection);
        }

        let price = close.publisher_price.price;
        let probability = early_close_probability(
            close.is_above,
            option.strike,
            price,
            option.created_at,
            option.expiration,
            now,
        );
        let payout = early_close_payout(option.amount, probability);
        self.pool
            .unlock_and_pay(
                &mut self.token,
                close.target_contract,
                option.id,
                option.owner,
                payout,
                events,
            )
            .map_err(|e| unlock_reason(&e))?;

        events.push(ProtocolEvent::Exercise {
            account: option.owner,
            id: option.id,
            profit: payout,
            price_at_expiration: price,
            is_above: close.is_above,
        });
        self.finish_option(&option, close.is_above, OptionState::Closed, events);
        info!(option_id = %option.id, market = %option.market, payout, probability, "option closed early");
        Ok(())
    }

    /// Record the terminal state and release open interest
    fn finish_option(
        &mut self,
        option: &OptionPosition,
        is_above: bool,
        state: OptionState,
        events: &mut Vec<ProtocolEvent>,
    ) {
        if let Some(market) = self.markets.get_mut(&option.market) {
            if let Some(stored) = market.options.get_mut(&option.id) {
                stored.state = state;
                stored.is_above = Some(is_above);
            }
            market.oi.decrease(option.total_fee);
        }
        self.pool_oi.decrease(option.total_fee);
        events.push(ProtocolEvent::UpdatePoolOI {
            is_increased: false,
            interest: option.total_fee,
        });
    }
}
