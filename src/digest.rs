//! Keccak over a field whose signed tail is swapped for a fixed suffix.
//!
//! A sponsor signs after the sender has already signed the userOp hash, so the
//! sender's digest cannot cover the sponsor's signature bytes. The tail is
//! excluded and replaced by a constant, which keeps the digest tied to the
//! unsigned prefix and to the fact that a signature was framed there.

use crate::error::{Error, Result};
use crate::paymaster::{
    paymaster_signature_length, PAYMASTER_DATA_OFFSET, PAYMASTER_SIG_MAGIC, PAYMASTER_SUFFIX_LEN,
};
use ethers::types::H256;
use ethers::utils::keccak256;

/// `keccak(data[..data.len() - excluded] || suffix)`
pub fn keccak_with_suffix(data: &[u8], excluded: usize, suffix: &[u8]) -> Result<H256> {
    let keep = data
        .len()
        .checked_sub(excluded)
        .ok_or(Error::LengthExceedsBlob {
            len: data.len(),
            excluded,
        })?;
    let mut buf = Vec::with_capacity(keep + suffix.len());
    buf.extend_from_slice(&data[..keep]);
    buf.extend_from_slice(suffix);
    Ok(H256(keccak256(buf)))
}

/// Hash of a `paymasterAndData` field as committed to by the userOp hash.
///
/// Without a framed signature the field is hashed as-is. With one, the whole
/// trailer (signature, length and magic) is dropped and the magic appended,
/// so the sponsor may sign, or re-sign, after the sender.
pub fn paymaster_data_keccak(data: &[u8]) -> Result<H256> {
    let sig_len = paymaster_signature_length(data, PAYMASTER_DATA_OFFSET)?;
    if sig_len == 0 {
        return Ok(H256(keccak256(data)));
    }
    keccak_with_suffix(data, sig_len + PAYMASTER_SUFFIX_LEN, &PAYMASTER_SIG_MAGIC)
}
