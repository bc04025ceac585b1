use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// ERC-4337 UserOperation, loose (off-chain) form.
///
/// Optional fields follow the bundler JSON shape: `factory`/`factoryData` and
/// the `paymaster*` group may be absent. Must be packed before it can be
/// hashed or submitted.
///
/// With `isEip7702` set, `factoryData` is the call made on the sender right
/// after delegation, and the delegate contract takes the factory's place in the
/// hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_eip7702: bool,
    pub sender: Address,
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    #[serde(default)]
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    /// Sponsor signature, framed onto the end of `paymasterData` when packed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_signature: Option<Bytes>,
    #[serde(default)]
    pub signature: Bytes,
}

/// PackedUserOperation (EntryPoint v0.7+ layout).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedUserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    /// `verificationGasLimit(16) || callGasLimit(16)`
    pub account_gas_limits: H256,
    pub pre_verification_gas: U256,
    /// `maxPriorityFeePerGas(16) || maxFeePerGas(16)`
    pub gas_fees: H256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

/// Splits a packed 32-byte word into its two 128-bit halves.
pub fn unpack_uints(word: H256) -> (u128, u128) {
    let mut hi = [0u8; 16];
    let mut lo = [0u8; 16];
    hi.copy_from_slice(&word.0[..16]);
    lo.copy_from_slice(&word.0[16..]);
    (u128::from_be_bytes(hi), u128::from_be_bytes(lo))
}
