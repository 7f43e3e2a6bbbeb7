//! Transaction structure and construction via the builder pattern.
//!
//! The [`TransactionBuilder`] enforces a disciplined construction flow: set
//! the fields, call `.build()`, and get back an unsigned [`Transaction`]
//! whose id is already final. Signing appends to `signatures`, which the id
//! does not cover, so an id can be quoted before anyone signs.

use bincode::Options;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::params::{self, TxParams};
use super::types::{OutPoint, TokenId, TxId, TxInput, TxOutput, TxSignature, TxType};
use super::ValidationError;
use crate::address::{derive, Address};
use crate::config::{MAX_TX_BYTES, TX_VERSION};
use crate::crypto::hash::double_sha256;

/// Domain tag prepended to the signable encoding.
const SIGNABLE_TAG: &[u8] = b"SHADOW-TX";

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A ledger transaction.
///
/// # Canonical Byte Format
///
/// [`Transaction::signable_bytes`] serializes every field except
/// `signatures`: the tag, version, type code, timestamp, lock time, primary
/// token, then each input and output, then `data` and `memo` behind presence
/// flags. Integers are little-endian; variable-length fields carry a `u32`
/// length prefix. The id and every signature are computed over those bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_type: TxType,
    pub version: u16,
    /// Creation time, Unix milliseconds.
    pub timestamp: u64,
    /// Earliest block height at which the transaction may be applied.
    pub lock_time: u64,
    /// The token this transaction is primarily about (melted token, for
    /// instance). Native for plain sends.
    pub token_id: TokenId,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Type-specific parameters, see [`super::params`].
    pub data: Option<Vec<u8>>,
    /// Printable ASCII, at most 64 bytes.
    pub memo: Option<String>,
    pub signatures: Vec<TxSignature>,
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_TX_BYTES)
}

impl Transaction {
    /// The canonical bytes covered by the id and by every signature.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            64 + self.inputs.len() * 48 + self.outputs.len() * 88 + self.data.as_ref().map_or(0, Vec::len),
        );

        buf.extend_from_slice(SIGNABLE_TAG);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.push(self.tx_type.code());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf.extend_from_slice(self.token_id.as_bytes());

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(input.prev_tx_id.as_bytes());
            buf.extend_from_slice(&input.output_index.to_le_bytes());
            put_bytes(&mut buf, &input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.amount.to_le_bytes());
            buf.extend_from_slice(output.address.as_bytes());
            buf.extend_from_slice(output.token_id.as_bytes());
            buf.push(output.token_type.code());
            put_bytes(&mut buf, &output.script_pub_key);
        }

        match &self.data {
            Some(data) => {
                buf.push(1);
                put_bytes(&mut buf, data);
            }
            None => buf.push(0),
        }
        match &self.memo {
            Some(memo) => {
                buf.push(1);
                put_bytes(&mut buf, memo.as_bytes());
            }
            None => buf.push(0),
        }

        buf
    }

    /// `double_sha256(signable_bytes)`.
    pub fn id(&self) -> TxId {
        TxId(double_sha256(&self.signable_bytes()))
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Address of the first embedded public key. Engines treat it as the
    /// payer, creator, or caller, and as the recipient of engine outputs.
    pub fn signer(&self) -> Option<Address> {
        self.signatures.first().map(|s| derive(&s.public_key))
    }

    /// Addresses of every embedded public key, in order.
    pub fn signer_addresses(&self) -> Vec<Address> {
        self.signatures.iter().map(|s| derive(&s.public_key)).collect()
    }

    pub fn out_points(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.inputs.iter().map(TxInput::out_point)
    }

    /// Decode the type-specific parameters from `data`.
    pub fn params<P: TxParams>(&self) -> Result<P, ValidationError> {
        if P::TX_TYPE != self.tx_type {
            return Err(ValidationError::MalformedData(format!(
                "{} parameters on a {} transaction",
                P::TX_TYPE,
                self.tx_type
            )));
        }
        params::decode(self.data.as_deref())
    }

    /// Wire encoding (bincode, fixed-width integers).
    pub fn to_bytes(&self) -> Result<Vec<u8>, ValidationError> {
        wire_options()
            .serialize(self)
            .map_err(|e| ValidationError::Codec(e.to_string()))
    }

    /// Decode the wire encoding. Input beyond the size limit is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        wire_options()
            .deserialize(bytes)
            .map_err(|e| ValidationError::Codec(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned transactions.
///
/// ```
/// use shadow_protocol::address::derive;
/// use shadow_protocol::transaction::{OutPoint, TransactionBuilder, TxId, TxOutput, TxType};
///
/// let tx = TransactionBuilder::new(TxType::Send)
///     .input(OutPoint::new(TxId([1; 32]), 0))
///     .output(TxOutput::native(500, derive(b"bob")))
///     .memo("rent")
///     .build();
/// assert!(!tx.is_signed());
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    tx: Transaction,
}

impl TransactionBuilder {
    pub fn new(tx_type: TxType) -> Self {
        Self {
            tx: Transaction {
                tx_type,
                version: TX_VERSION,
                timestamp: u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0),
                lock_time: 0,
                token_id: TokenId::NATIVE,
                inputs: Vec::new(),
                outputs: Vec::new(),
                data: None,
                memo: None,
                signatures: Vec::new(),
            },
        }
    }

    pub fn version(mut self, version: u16) -> Self {
        self.tx.version = version;
        self
    }

    pub fn timestamp(mut self, timestamp_ms: u64) -> Self {
        self.tx.timestamp = timestamp_ms;
        self
    }

    pub fn lock_time(mut self, height: u64) -> Self {
        self.tx.lock_time = height;
        self
    }

    pub fn token_id(mut self, token_id: TokenId) -> Self {
        self.tx.token_id = token_id;
        self
    }

    pub fn input(mut self, out_point: OutPoint) -> Self {
        self.tx.inputs.push(TxInput::new(out_point));
        self
    }

    pub fn inputs<I: IntoIterator<Item = OutPoint>>(mut self, out_points: I) -> Self {
        self.tx.inputs.extend(out_points.into_iter().map(TxInput::new));
        self
    }

    pub fn raw_input(mut self, input: TxInput) -> Self {
        self.tx.inputs.push(input);
        self
    }

    pub fn output(mut self, output: TxOutput) -> Self {
        self.tx.outputs.push(output);
        self
    }

    pub fn outputs<I: IntoIterator<Item = TxOutput>>(mut self, outputs: I) -> Self {
        self.tx.outputs.extend(outputs);
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.tx.data = Some(data);
        self
    }

    /// Encode typed parameters into `data`.
    pub fn params<P: TxParams>(self, params: &P) -> Result<Self, ValidationError> {
        let data = params::encode(params)?;
        Ok(self.data(data))
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.tx.memo = Some(memo.into());
        self
    }

    pub fn build(self) -> Transaction {
        self.tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::params::MeltParams;
    use crate::transaction::types::TokenType;

    fn sample() -> Transaction {
        TransactionBuilder::new(TxType::Send)
            .timestamp(1_700_000_000_000)
            .input(OutPoint::new(TxId([9; 32]), 1))
            .output(TxOutput::native(42, derive(b"recipient")))
            .build()
    }

    #[test]
    fn builder_defaults() {
        let tx = TransactionBuilder::new(TxType::Send).build();
        assert_eq!(tx.version, TX_VERSION);
        assert_eq!(tx.token_id, TokenId::NATIVE);
        assert!(tx.timestamp > 0);
        assert!(tx.signatures.is_empty());
    }

    #[test]
    fn id_is_deterministic() {
        assert_eq!(sample().id(), sample().id());
    }

    #[test]
    fn id_ignores_signatures() {
        let mut tx = sample();
        let before = tx.id();
        tx.signatures.push(TxSignature {
            public_key: vec![1; 32],
            signature: vec![2; 64],
        });
        assert_eq!(tx.id(), before);
    }

    #[test]
    fn every_field_changes_the_id() {
        let base = sample().id();

        let mut t = sample();
        t.lock_time = 1;
        assert_ne!(t.id(), base);

        let mut t = sample();
        t.outputs[0].amount += 1;
        assert_ne!(t.id(), base);

        let mut t = sample();
        t.outputs[0].token_type = TokenType::Custom;
        assert_ne!(t.id(), base);

        let mut t = sample();
        t.inputs[0].script_sig = vec![1];
        assert_ne!(t.id(), base);

        let mut t = sample();
        t.memo = Some(String::new());
        assert_ne!(t.id(), base, "empty memo must differ from no memo");

        let mut t = sample();
        t.tx_type = TxType::Melt;
        assert_ne!(t.id(), base);
    }

    #[test]
    fn wire_roundtrip() {
        let tx = sample();
        let bytes = tx.to_bytes().unwrap();
        assert_eq!(Transaction::from_bytes(&bytes).unwrap(), tx);
        assert!(Transaction::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn params_are_bound_to_type() {
        let tx = TransactionBuilder::new(TxType::Melt)
            .params(&MeltParams { amount: 7 })
            .unwrap()
            .build();
        assert_eq!(tx.params::<MeltParams>().unwrap().amount, 7);

        let mut wrong = tx.clone();
        wrong.tx_type = TxType::Send;
        assert!(wrong.params::<MeltParams>().is_err());
    }
}
