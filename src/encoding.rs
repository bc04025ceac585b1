use crate::canonical::CanonicalBytes;
use crate::error::Result;
use crate::types::PackedUserOperation;
use ethers::types::{Address, Bytes, H256, U256};

pub fn fmt_address(addr: Address) -> String {
    format!("0x{}", hex::encode(addr.as_bytes()))
}

pub fn fmt_h256(h: H256) -> String {
    format!("0x{}", hex::encode(h.as_bytes()))
}

/// JSON-RPC "quantity" encoding.
pub fn fmt_u256(v: U256) -> String {
    CanonicalBytes::from(v).to_quantity()
}

pub fn fmt_bytes(b: &[u8]) -> String {
    format!("0x{}", hex::encode(b))
}

pub fn packed_user_op_to_json(op: &PackedUserOperation) -> serde_json::Value {
    serde_json::json!({
        "sender": fmt_address(op.sender),
        "nonce": fmt_u256(op.nonce),
        "initCode": fmt_bytes(&op.init_code),
        "callData": fmt_bytes(&op.call_data),
        "accountGasLimits": fmt_h256(op.account_gas_limits),
        "preVerificationGas": fmt_u256(op.pre_verification_gas),
        "gasFees": fmt_h256(op.gas_fees),
        "paymasterAndData": fmt_bytes(&op.paymaster_and_data),
        "signature": fmt_bytes(&op.signature),
    })
}

/// Hex quantity (`0x...`) or plain decimal.
pub fn parse_u256(s: &str) -> anyhow::Result<U256> {
    match s.strip_prefix("0x") {
        Some(h) => CanonicalBytes::from_hex(h)?
            .to_u256()
            .ok_or_else(|| anyhow::anyhow!("{s} does not fit in 256 bits")),
        None => Ok(U256::from_dec_str(s)?),
    }
}

pub fn parse_bytes(s: &str) -> Result<Bytes> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(Bytes::from(hex::decode(s)?))
}

pub fn parse_h256(s: &str) -> anyhow::Result<H256> {
    let bytes = parse_bytes(s)?;
    if bytes.len() != 32 {
        anyhow::bail!("expected 32-byte hex, got {} bytes", bytes.len());
    }
    Ok(H256::from_slice(&bytes))
}
