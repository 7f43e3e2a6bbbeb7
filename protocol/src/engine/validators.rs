//! Validator registration: lock the configured stake and record the signer.

use tracing::debug;

use super::TxScope;
use crate::error::{LedgerError, LedgerResult};
use crate::state::{StateView, ValidatorRecord};
use crate::transaction::{TokenId, ValidationError};

pub(super) fn register<V: StateView + ?Sized>(scope: &mut TxScope<'_, '_, V>) -> LedgerResult<()> {
    let address = scope.signer()?;
    if scope.stage.validator(&address).is_some() {
        return Err(LedgerError::ValidatorAlreadyRegistered(address));
    }
    let public_key = scope
        .tx
        .signatures
        .first()
        .map(|s| s.public_key.clone())
        .ok_or(LedgerError::Validation(ValidationError::MissingSignature))?;

    let stake = scope.config.validator_stake;
    scope.take(TokenId::NATIVE, stake);
    scope.stage.put_validator(ValidatorRecord {
        address,
        public_key,
        stake,
        registered_at: scope.height,
    });
    debug!(validator = %address, stake, "validator registered");
    Ok(())
}
