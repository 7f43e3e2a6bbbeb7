//! Ledger state: records, read views, staged deltas, and the committed
//! snapshot.

pub mod ledger_state;
pub mod records;
pub mod view;

pub use ledger_state::LedgerState;
pub use records::{
    ordered_pair, OfferState, Pool, SwapOffer, TokenInfo, Utxo, ValidatorRecord,
};
pub use view::{Overlay, Stage, StateDelta, StateView};
