//! # Addresses
//!
//! An [`Address`] is 32 bytes: the BLAKE3 hash of a public key. It carries no
//! type internally. The four [`AddressKind`]s exist only in the human-facing
//! string form, and all four encodings of one address denote the same bytes.
//!
//! ## String format
//!
//! ```text
//!  S 5aaeb6053f3E94c9b9a09f33669435e7ef1beaed5aaeb6053f3e94c9b9a09f33 7
//!  │ └──────────────────────── 64 hex, EIP-55 cased ───────────────┘ │
//!  prefix (S wallet, L liquidity, X exchange, N nft)        Luhn digit
//! ```
//!
//! Decoding checks, in order: length, prefix, hex alphabet, Luhn digit, and
//! finally casing (only when the body mixes upper and lower case). The order
//! matters to callers who surface the error, so it is part of the contract.

pub mod checksum;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{ADDRESS_BYTES, ENCODED_ADDRESS_LENGTH};
use crate::crypto::{blake3_hash, domain_separated_hash};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an address string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must be {expected} characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("unrecognized address prefix '{0}'")]
    Prefix(char),

    #[error("address body is not hexadecimal")]
    Hex,

    #[error("address checksum mismatch: expected '{expected}', found '{found}'")]
    Luhn { expected: char, found: char },

    #[error("address letter casing does not match its checksum pattern")]
    Case,

    #[error("unknown address kind '{0}'")]
    UnknownKind(String),
}

// ---------------------------------------------------------------------------
// AddressKind
// ---------------------------------------------------------------------------

/// The type tag applied at encoding time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    Wallet,
    Liquidity,
    Exchange,
    Nft,
}

impl AddressKind {
    pub const ALL: [AddressKind; 4] = [
        AddressKind::Wallet,
        AddressKind::Liquidity,
        AddressKind::Exchange,
        AddressKind::Nft,
    ];

    /// The one-letter prefix of this kind.
    pub fn prefix(self) -> char {
        match self {
            Self::Wallet => 'S',
            Self::Liquidity => 'L',
            Self::Exchange => 'X',
            Self::Nft => 'N',
        }
    }

    /// Inverse of [`AddressKind::prefix`]. Prefixes are uppercase only.
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            'S' => Some(Self::Wallet),
            'L' => Some(Self::Liquidity),
            'X' => Some(Self::Exchange),
            'N' => Some(Self::Nft),
            _ => None,
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wallet => "wallet",
            Self::Liquidity => "liquidity",
            Self::Exchange => "exchange",
            Self::Nft => "nft",
        };
        f.write_str(name)
    }
}

impl FromStr for AddressKind {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wallet" | "s" => Ok(Self::Wallet),
            "liquidity" | "l" => Ok(Self::Liquidity),
            "exchange" | "x" => Ok(Self::Exchange),
            "nft" | "n" => Ok(Self::Nft),
            _ => Err(AddressError::UnknownKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte ledger address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// A keyless address derived from `seed` under a domain context.
    ///
    /// Nobody holds a key hashing to it, so outputs sent here can only move
    /// through engine rules (offer escrow, pool reserves).
    pub fn keyless(context: &str, seed: &[u8]) -> Self {
        Self(domain_separated_hash(context, seed))
    }

    /// Encode under `kind`. See [`encode`].
    pub fn encode(&self, kind: AddressKind) -> String {
        encode(self, kind)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..16])
    }
}

/// Displays the wallet encoding.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self, AddressKind::Wallet))
    }
}

/// Parses any of the four encodings, discarding the kind.
impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s).map(|(address, _)| address)
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Derive the address owned by `public_key`.
pub fn derive(public_key: &[u8]) -> Address {
    Address(blake3_hash(public_key))
}

/// Encode `address` as `[prefix][64 EIP-55 hex][Luhn digit]`.
pub fn encode(address: &Address, kind: AddressKind) -> String {
    let prefix = kind.prefix();
    let lower_hex = address.to_hex();
    let digit = checksum::luhn_digit(&format!("{}{}", prefix.to_ascii_lowercase(), lower_hex));

    let mut out = String::with_capacity(ENCODED_ADDRESS_LENGTH);
    out.push(prefix);
    out.push_str(&checksum::checksum_case(&lower_hex));
    out.push(digit);
    out
}

/// Decode and fully validate an encoded address.
pub fn decode(s: &str) -> Result<(Address, AddressKind), AddressError> {
    let raw = s.as_bytes();
    if raw.len() != ENCODED_ADDRESS_LENGTH {
        return Err(AddressError::Length {
            expected: ENCODED_ADDRESS_LENGTH,
            actual: raw.len(),
        });
    }

    let prefix = char::from(raw[0]);
    let kind = AddressKind::from_prefix(prefix).ok_or(AddressError::Prefix(prefix))?;

    let body = &raw[1..ENCODED_ADDRESS_LENGTH - 1];
    if !body.iter().all(u8::is_ascii_hexdigit) {
        return Err(AddressError::Hex);
    }
    // All ASCII from here on.
    let hex_body = std::str::from_utf8(body).map_err(|_| AddressError::Hex)?;
    let lower_hex = hex_body.to_ascii_lowercase();

    let expected = checksum::luhn_digit(&format!("{}{}", prefix.to_ascii_lowercase(), lower_hex));
    let found = char::from(raw[ENCODED_ADDRESS_LENGTH - 1]);
    if expected != found {
        return Err(AddressError::Luhn { expected, found });
    }

    if checksum::is_mixed_case(hex_body) && checksum::checksum_case(&lower_hex) != hex_body {
        return Err(AddressError::Case);
    }

    let mut bytes = [0u8; ADDRESS_BYTES];
    hex::decode_to_slice(&lower_hex, &mut bytes).map_err(|_| AddressError::Hex)?;
    Ok((Address(bytes), kind))
}
