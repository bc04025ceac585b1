//! Canonical packing and hashing of ERC-4337 userOps, paymaster signature
//! framing, and EIP-7702 authorizations / set-code transactions.
//!
//! Everything here is a pure function of its inputs: no provider calls, no
//! shared state. Nonces, gas prices and chain ids are looked up by the caller.

pub mod canonical;
pub mod digest;
pub mod eip7702;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod pack;
pub mod paymaster;
pub mod rlp;
pub mod tx;
pub mod types;

pub use canonical::CanonicalBytes;
pub use eip7702::{Authorization, SignedAuthorization};
pub use error::{Error, Result, RlpError};
pub use hash::{sign_user_op, user_op_hash};
pub use pack::{is_eip7702_init_code, pack_user_op};
pub use tx::{DelegationTransaction, SignedDelegationTransaction};
pub use types::{PackedUserOperation, UserOperation};
