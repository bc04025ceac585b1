//! Type-4 (EIP-7702) set-code transactions.
//!
//! 0x04 || rlp([chain_id, nonce, max_priority_fee_per_gas, max_fee_per_gas, gas_limit,
//!              destination, value, data, access_list, authorization_list,
//!              signature_y_parity, signature_r, signature_s])

use crate::eip7702::{y_parity, SignedAuthorization};
use crate::error::{Error, Result, RlpError};
use crate::rlp::RlpItem;
use ethers::signers::LocalWallet;
use ethers::types::{Address, Bytes, Signature, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

pub const EIP7702_TX_TYPE: u8 = 0x04;

const UNSIGNED_FIELDS: usize = 10;
const SIGNED_FIELDS: usize = 13;

/// Unsigned delegation transaction. Every field must already be filled in:
/// nonce, fees and chain id come from the caller, not from a provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationTransaction {
    pub chain_id: U256,
    pub nonce: U256,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: U256,
    pub to: Address,
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub authorization_list: Vec<SignedAuthorization>,
}

impl DelegationTransaction {
    fn rlp_fields(&self) -> Vec<RlpItem> {
        vec![
            self.chain_id.into(),
            self.nonce.into(),
            self.max_priority_fee_per_gas.into(),
            self.max_fee_per_gas.into(),
            self.gas_limit.into(),
            self.to.into(),
            self.value.into(),
            (&self.data).into(),
            // access list is always empty here
            RlpItem::empty_list(),
            RlpItem::List(
                self.authorization_list
                    .iter()
                    .map(SignedAuthorization::rlp_item)
                    .collect(),
            ),
        ]
    }

    /// `0x04 || rlp(unsigned fields)`
    pub fn signing_payload(&self) -> Vec<u8> {
        typed(&RlpItem::List(self.rlp_fields()))
    }

    pub fn signature_hash(&self) -> H256 {
        H256(keccak256(self.signing_payload()))
    }

    pub fn sign(self, wallet: &LocalWallet) -> Result<SignedDelegationTransaction> {
        let sig = wallet
            .sign_hash(self.signature_hash())
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;
        let signed = SignedDelegationTransaction {
            y_parity: y_parity(sig.v) as u8,
            r: sig.r,
            s: sig.s,
            tx: self,
        };
        tracing::debug!(
            chain_id = %signed.tx.chain_id,
            nonce = %signed.tx.nonce,
            authorizations = signed.tx.authorization_list.len(),
            hash = ?signed.hash(),
            "signed eip-7702 transaction"
        );
        Ok(signed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedDelegationTransaction {
    pub tx: DelegationTransaction,
    pub y_parity: u8,
    pub r: U256,
    pub s: U256,
}

impl SignedDelegationTransaction {
    /// Raw bytes for `eth_sendRawTransaction`.
    pub fn encode(&self) -> Bytes {
        let mut fields = self.tx.rlp_fields();
        fields.push(u64::from(self.y_parity).into());
        fields.push(self.r.into());
        fields.push(self.s.into());
        Bytes::from(typed(&RlpItem::List(fields)))
    }

    /// Transaction hash: keccak of the raw bytes.
    pub fn hash(&self) -> H256 {
        H256(keccak256(self.encode()))
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        let (&ty, body) = raw.split_first().ok_or(RlpError::UnexpectedEnd)?;
        if ty != EIP7702_TX_TYPE {
            return Err(Error::UnexpectedTxType(ty));
        }
        let item = RlpItem::decode(body)?;
        let f = item.as_list()?;
        if f.len() != SIGNED_FIELDS {
            return Err(RlpError::ItemCount {
                expected: SIGNED_FIELDS,
                found: f.len(),
            }
            .into());
        }
        if !f[8].as_list()?.is_empty() {
            return Err(RlpError::ItemCount {
                expected: 0,
                found: f[8].as_list()?.len(),
            }
            .into());
        }

        let authorization_list = f[9]
            .as_list()?
            .iter()
            .map(SignedAuthorization::from_rlp)
            .collect::<Result<Vec<_>>>()?;
        let y_parity = f[UNSIGNED_FIELDS].to_u64()?;
        if y_parity > 1 {
            return Err(Error::InvalidSignature(format!("yParity {y_parity} out of range")));
        }

        Ok(Self {
            tx: DelegationTransaction {
                chain_id: f[0].to_u256()?,
                nonce: f[1].to_u256()?,
                max_priority_fee_per_gas: f[2].to_u256()?,
                max_fee_per_gas: f[3].to_u256()?,
                gas_limit: f[4].to_u256()?,
                to: f[5].to_address()?,
                value: f[6].to_u256()?,
                data: Bytes::from(f[7].as_bytes()?.to_vec()),
                authorization_list,
            },
            y_parity: y_parity as u8,
            r: f[11].to_u256()?,
            s: f[12].to_u256()?,
        })
    }

    pub fn recover_sender(&self) -> Result<Address> {
        let sig = Signature {
            r: self.r,
            s: self.s,
            v: u64::from(self.y_parity) + 27,
        };
        sig.recover(self.tx.signature_hash())
            .map_err(|e| Error::InvalidSignature(e.to_string()))
    }
}

fn typed(item: &RlpItem) -> Vec<u8> {
    let mut out = vec![EIP7702_TX_TYPE];
    out.extend(item.encode());
    out
}
