use crate::error::{Error, Result};
use crate::paymaster::{encode_paymaster_signature, PAYMASTER_DATA_OFFSET};
use crate::types::{PackedUserOperation, UserOperation};
use ethers::types::{Bytes, H256, U256};

/// `initCode` prefix marking an EIP-7702 sender: `0x7702` padded to 20 bytes.
pub const INITCODE_EIP7702_MARKER: [u8; 20] = {
    let mut m = [0u8; 20];
    m[0] = 0x77;
    m[1] = 0x02;
    m
};

/// Whether `init_code` asks the EntryPoint to treat the sender as a 7702 account.
///
/// The first 20 bytes, zero-padded, must equal the marker; a bare `0x7702`
/// prefix is enough.
pub fn is_eip7702_init_code(init_code: &[u8]) -> bool {
    if init_code.len() < 2 {
        return false;
    }
    let mut start = [0u8; 20];
    let n = init_code.len().min(20);
    start[..n].copy_from_slice(&init_code[..n]);
    start == INITCODE_EIP7702_MARKER
}

pub fn pack_user_op(op: &UserOperation) -> Result<PackedUserOperation> {
    let init_code = pack_init_code(op)?;

    let account_gas_limits = pack_uints(
        op.verification_gas_limit,
        "verificationGasLimit",
        op.call_gas_limit,
        "callGasLimit",
    )?;
    let gas_fees = pack_uints(
        op.max_priority_fee_per_gas,
        "maxPriorityFeePerGas",
        op.max_fee_per_gas,
        "maxFeePerGas",
    )?;

    Ok(PackedUserOperation {
        sender: op.sender,
        nonce: op.nonce,
        init_code,
        call_data: op.call_data.clone(),
        account_gas_limits,
        pre_verification_gas: op.pre_verification_gas,
        gas_fees,
        paymaster_and_data: pack_paymaster_and_data(op)?,
        signature: op.signature.clone(),
    })
}

fn pack_init_code(op: &UserOperation) -> Result<Bytes> {
    if op.is_eip7702 {
        let mut v = INITCODE_EIP7702_MARKER.to_vec();
        if let Some(data) = &op.factory_data {
            v.extend_from_slice(data);
        }
        return Ok(Bytes::from(v));
    }

    match (op.factory, &op.factory_data) {
        (Some(factory), Some(data)) => {
            let mut v = Vec::with_capacity(20 + data.len());
            v.extend_from_slice(factory.as_bytes());
            v.extend_from_slice(data);
            Ok(Bytes::from(v))
        }
        (None, None) => Ok(Bytes::new()),
        (Some(_), None) => Err(Error::MalformedOperation("factory without factoryData")),
        (None, Some(_)) => Err(Error::MalformedOperation("factoryData without factory")),
    }
}

fn pack_paymaster_and_data(op: &UserOperation) -> Result<Bytes> {
    let Some(paymaster) = op.paymaster else {
        return Ok(Bytes::new());
    };

    let verification = op.paymaster_verification_gas_limit.unwrap_or_default();
    let post_op = op.paymaster_post_op_gas_limit.unwrap_or_default();
    let data = op.paymaster_data.clone().unwrap_or_default();
    let framed_sig = match &op.paymaster_signature {
        Some(sig) => encode_paymaster_signature(sig)?,
        None => Vec::new(),
    };

    let mut v = Vec::with_capacity(PAYMASTER_DATA_OFFSET + data.len() + framed_sig.len());
    v.extend_from_slice(paymaster.as_bytes());
    v.extend_from_slice(&to_u128(verification, "paymasterVerificationGasLimit")?.to_be_bytes());
    v.extend_from_slice(&to_u128(post_op, "paymasterPostOpGasLimit")?.to_be_bytes());
    v.extend_from_slice(&data);
    v.extend_from_slice(&framed_sig);
    Ok(Bytes::from(v))
}

/// `high(16) || low(16)`, both big-endian.
pub fn pack_uints(
    high: U256,
    high_name: &'static str,
    low: U256,
    low_name: &'static str,
) -> Result<H256> {
    let mut word = [0u8; 32];
    word[..16].copy_from_slice(&to_u128(high, high_name)?.to_be_bytes());
    word[16..].copy_from_slice(&to_u128(low, low_name)?.to_be_bytes());
    Ok(H256(word))
}

fn to_u128(v: U256, name: &'static str) -> Result<u128> {
    if v > U256::from(u128::MAX) {
        return Err(Error::GasValueOverflow(name));
    }
    Ok(v.as_u128())
}
