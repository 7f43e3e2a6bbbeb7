//! Peer-to-peer swap offers.
//!
//! An offer moves `have_amount` into an escrow output owned by a keyless
//! exchange address derived from the offer id. Nobody can sign for that
//! address, so only accept or cancel, executed here, can spend it.

use super::TxScope;
use crate::error::{LedgerError, LedgerResult};
use crate::state::{OfferState, StateView, SwapOffer};
use crate::transaction::{AcceptOfferParams, CancelOfferParams, OfferParams};

pub(super) fn offer<V: StateView + ?Sized>(scope: &mut TxScope<'_, '_, V>) -> LedgerResult<()> {
    let params: OfferParams = scope.tx.params()?;
    let creator = scope.signer()?;
    scope.token(&params.want_token)?;

    let offer_id = scope.tx_id;
    let escrow = scope.emit(
        params.have_amount,
        SwapOffer::escrow_address(&offer_id),
        params.have_token,
    )?;

    scope.stage.put_offer(SwapOffer {
        offer_id,
        creator,
        have_token: params.have_token,
        have_amount: params.have_amount,
        want_token: params.want_token,
        want_amount: params.want_amount,
        expires_at_block: params.expires_at_block,
        state: OfferState::Active,
        escrow,
        created_at: scope.height,
    });
    Ok(())
}

pub(super) fn accept<V: StateView + ?Sized>(scope: &mut TxScope<'_, '_, V>) -> LedgerResult<()> {
    let params: AcceptOfferParams = scope.tx.params()?;
    let accepter = scope.signer()?;
    let mut offer = scope
        .stage
        .offer(&params.offer_id)
        .ok_or(LedgerError::OfferNotFound(params.offer_id))?;
    if offer.effective_state(scope.height) != OfferState::Active {
        return Err(LedgerError::OfferNotActive(params.offer_id));
    }

    scope.spend_engine_input(&offer.escrow)?;
    scope.emit(offer.have_amount, accepter, offer.have_token)?;
    scope.emit(offer.want_amount, offer.creator, offer.want_token)?;

    offer.state = OfferState::Accepted;
    scope.stage.put_offer(offer);
    Ok(())
}

/// Return the escrow to the creator. Only an offer that is still active at
/// this height can be cancelled; an expired offer is terminal.
pub(super) fn cancel<V: StateView + ?Sized>(scope: &mut TxScope<'_, '_, V>) -> LedgerResult<()> {
    let params: CancelOfferParams = scope.tx.params()?;
    let caller = scope.signer()?;
    let mut offer = scope
        .stage
        .offer(&params.offer_id)
        .ok_or(LedgerError::OfferNotFound(params.offer_id))?;
    if caller != offer.creator {
        return Err(LedgerError::NotOfferOwner(params.offer_id));
    }
    if offer.effective_state(scope.height) != OfferState::Active {
        return Err(LedgerError::OfferNotActive(params.offer_id));
    }

    scope.spend_engine_input(&offer.escrow)?;
    scope.emit(offer.have_amount, offer.creator, offer.have_token)?;

    offer.state = OfferState::Cancelled;
    scope.stage.put_offer(offer);
    Ok(())
}
