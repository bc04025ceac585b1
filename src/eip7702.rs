//! EIP-7702 authorizations.
//!
//! authority = ecrecover(keccak(MAGIC || rlp([chain_id, address, nonce])), y_parity, r, s)

use crate::error::{Error, Result};
use crate::rlp::RlpItem;
use ethers::signers::LocalWallet;
use ethers::types::{Address, Signature, H256, U256, U64};
use ethers::utils::{keccak256, to_checksum};
use serde::{Deserialize, Serialize};

/// Leading byte of the authorization signing payload.
pub const EIP7702_MAGIC: u8 = 0x05;

/// Unsigned authorization tuple.
///
/// `nonce` is the authority's account nonce at the time the delegation
/// transaction executes; callers look it up, this type never does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub chain_id: U256,
    pub address: Address,
    pub nonce: U256,
}

impl Authorization {
    pub fn rlp_fields(&self) -> Vec<RlpItem> {
        vec![self.chain_id.into(), self.address.into(), self.nonce.into()]
    }

    /// `MAGIC || rlp([chain_id, address, nonce])`
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut out = vec![EIP7702_MAGIC];
        out.extend(RlpItem::List(self.rlp_fields()).encode());
        out
    }

    pub fn signature_hash(&self) -> H256 {
        H256(keccak256(self.signing_payload()))
    }

    pub fn sign(self, wallet: &LocalWallet) -> Result<SignedAuthorization> {
        let sig = wallet
            .sign_hash(self.signature_hash())
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;
        let signed = SignedAuthorization {
            inner: self,
            y_parity: U64::from(y_parity(sig.v)),
            r: sig.r,
            s: sig.s,
        };
        tracing::debug!(
            delegate = ?signed.inner.address,
            chain_id = %signed.inner.chain_id,
            nonce = %signed.inner.nonce,
            "signed eip-7702 authorization"
        );
        Ok(signed)
    }
}

/// Signed authorization, as it appears in a transaction's authorization list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuthorization {
    #[serde(flatten)]
    pub inner: Authorization,
    pub y_parity: U64,
    pub r: U256,
    pub s: U256,
}

impl SignedAuthorization {
    /// Recovers the account that signed this authorization. The digest only
    /// covers `(chain_id, address, nonce)`.
    pub fn recover_authority(&self) -> Result<Address> {
        let v = match self.y_parity.as_u64() {
            p @ (0 | 1) => p + 27,
            p => return Err(Error::InvalidSignature(format!("yParity {p} out of range"))),
        };
        let sig = Signature {
            r: self.r,
            s: self.s,
            v,
        };
        let authority = sig
            .recover(self.inner.signature_hash())
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;
        tracing::debug!(?authority, "recovered eip-7702 authority");
        Ok(authority)
    }

    /// Checksummed (EIP-55) form of [`recover_authority`](Self::recover_authority).
    pub fn recover_authority_checksummed(&self) -> Result<String> {
        Ok(to_checksum(&self.recover_authority()?, None))
    }

    /// `[chain_id, address, nonce, y_parity, r, s]`
    pub fn rlp_item(&self) -> RlpItem {
        let mut fields = self.inner.rlp_fields();
        fields.push(self.y_parity.as_u64().into());
        fields.push(self.r.into());
        fields.push(self.s.into());
        RlpItem::List(fields)
    }

    pub fn from_rlp(item: &RlpItem) -> Result<Self> {
        let fields = item.as_list()?;
        if fields.len() != 6 {
            return Err(crate::error::RlpError::ItemCount {
                expected: 6,
                found: fields.len(),
            }
            .into());
        }
        Ok(Self {
            inner: Authorization {
                chain_id: fields[0].to_u256()?,
                address: fields[1].to_address()?,
                nonce: fields[2].to_u256()?,
            },
            y_parity: U64::from(fields[3].to_u64()?),
            r: fields[4].to_u256()?,
            s: fields[5].to_u256()?,
        })
    }
}

/// Recovery id from a `v` of either 0/1 or 27/28.
pub(crate) fn y_parity(v: u64) -> u64 {
    if v >= 27 {
        v - 27
    } else {
        v
    }
}
