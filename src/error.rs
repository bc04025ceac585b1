//! Error types for packing, hashing and signing.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Optional fields that must travel together were only partially set.
    #[error("malformed userOp: {0}")]
    MalformedOperation(&'static str),

    /// A gas or fee value does not fit its 16-byte half of a packed word.
    #[error("{0} does not fit in 128 bits")]
    GasValueOverflow(&'static str),

    /// The framed paymaster signature claims more bytes than the field holds.
    #[error("InvalidPaymasterSignatureLength({len},{claimed})")]
    InvalidTrailerLength { len: usize, claimed: usize },

    #[error("cannot exclude {excluded} bytes from a {len}-byte blob")]
    LengthExceedsBlob { len: usize, excluded: usize },

    #[error("paymaster signature of {0} bytes does not fit a 2-byte length")]
    SignatureTooLong(usize),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// EIP-7702 userOp without a delegate to substitute for the factory.
    #[error("eip-7702 userOp without a resolvable delegate address")]
    UnresolvedDelegate,

    #[error("unexpected transaction type 0x{0:02x}")]
    UnexpectedTxType(u8),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("RLP: {0}")]
    Rlp(#[from] RlpError),
}

/// Decoding failures of the RLP codec.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RlpError {
    #[error("input ended before the item did")]
    UnexpectedEnd,

    #[error("{0} trailing bytes after the item")]
    TrailingBytes(usize),

    #[error("non-canonical encoding")]
    NonCanonical,

    #[error("expected a byte string, found a list")]
    ExpectedBytes,

    #[error("expected a list, found a byte string")]
    ExpectedList,

    #[error("expected {expected} items, found {found}")]
    ItemCount { expected: usize, found: usize },

    #[error("integer with leading zero bytes or wider than {0} bytes")]
    BadInteger(usize),

    #[error("expected {expected} bytes, found {found}")]
    BadLength { expected: usize, found: usize },

    #[error("lists nested deeper than {0} levels")]
    TooDeep(usize),
}
