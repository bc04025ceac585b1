use crate::digest::paymaster_data_keccak;
use crate::error::{Error, Result};
use crate::pack::{is_eip7702_init_code, pack_user_op, INITCODE_EIP7702_MARKER};
use crate::types::{PackedUserOperation, UserOperation};
use ethers::abi::{encode, Token};
use ethers::signers::LocalWallet;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{hash_message, keccak256};

/// Hash a sender signs over, bound to one EntryPoint on one chain.
///
/// For an EIP-7702 userOp the delegate stands in for the factory: pass it as
/// `eip7702_delegate`, or set `factory` on the op. Ignored for other userOps.
pub fn user_op_hash(
    op: &UserOperation,
    entry_point: Address,
    chain_id: u64,
    eip7702_delegate: Option<Address>,
) -> Result<H256> {
    let packed = pack_user_op(op)?;
    let delegate = if op.is_eip7702 {
        Some(
            eip7702_delegate
                .or(op.factory)
                .ok_or(Error::UnresolvedDelegate)?,
        )
    } else {
        None
    };
    packed.hash(entry_point, chain_id, delegate)
}

impl PackedUserOperation {
    /// Hash of an already-packed userOp. A 7702-marked `initCode` needs the
    /// sender's current delegate.
    pub fn hash(
        &self,
        entry_point: Address,
        chain_id: u64,
        eip7702_delegate: Option<Address>,
    ) -> Result<H256> {
        let init_code_hash = if is_eip7702_init_code(&self.init_code) {
            let delegate = eip7702_delegate.ok_or(Error::UnresolvedDelegate)?;
            eip7702_init_code_hash(&self.init_code, delegate)
        } else {
            H256(keccak256(&self.init_code))
        };
        let hash = hash_packed_user_operation(self, init_code_hash, entry_point, chain_id)?;
        tracing::debug!(
            sender = ?self.sender,
            nonce = %self.nonce,
            %chain_id,
            hash = ?hash,
            "computed userOp hash"
        );
        Ok(hash)
    }
}

/// `keccak(delegate || initCode[20..])`, as if the delegate were the factory.
fn eip7702_init_code_hash(init_code: &Bytes, delegate: Address) -> H256 {
    let tail = init_code.get(INITCODE_EIP7702_MARKER.len()..).unwrap_or_default();
    let mut v = Vec::with_capacity(20 + tail.len());
    v.extend_from_slice(delegate.as_bytes());
    v.extend_from_slice(tail);
    H256(keccak256(v))
}

fn hash_packed_user_operation(
    puo: &PackedUserOperation,
    init_code_hash: H256,
    entry_point: Address,
    chain_id: u64,
) -> Result<H256> {
    let hash_call_data = keccak256(&puo.call_data);
    let hash_paymaster_and_data = paymaster_data_keccak(&puo.paymaster_and_data)?;

    let encoded = encode(&[
        Token::Address(puo.sender),
        Token::Uint(puo.nonce),
        Token::FixedBytes(init_code_hash.as_bytes().to_vec()),
        Token::FixedBytes(hash_call_data.to_vec()),
        Token::FixedBytes(puo.account_gas_limits.as_bytes().to_vec()),
        Token::Uint(puo.pre_verification_gas),
        Token::FixedBytes(puo.gas_fees.as_bytes().to_vec()),
        Token::FixedBytes(hash_paymaster_and_data.as_bytes().to_vec()),
    ]);

    let hashed = keccak256(encoded);

    Ok(H256(keccak256(encode(&[
        Token::FixedBytes(hashed.to_vec()),
        Token::Address(entry_point),
        Token::Uint(U256::from(chain_id)),
    ]))))
}

/// Signs the userOp hash as an EIP-191 personal message, the form the sample
/// accounts check, and returns the 65-byte `r || s || v` signature.
pub fn sign_user_op(
    wallet: &LocalWallet,
    op: &UserOperation,
    entry_point: Address,
    chain_id: u64,
    eip7702_delegate: Option<Address>,
) -> Result<Bytes> {
    let hash = user_op_hash(op, entry_point, chain_id, eip7702_delegate)?;
    let sig = wallet
        .sign_hash(hash_message(hash))
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    Ok(Bytes::from(sig.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paymaster::{encode_paymaster_signature, PAYMASTER_DATA_OFFSET};
    use ethers::signers::Signer;
    use ethers::types::Signature;

    const CHAIN_ID: u64 = 1337;

    fn entry_point() -> Address {
        Address::repeat_byte(0xee)
    }

    fn default_op() -> UserOperation {
        UserOperation {
            sender: Address::repeat_byte(0x11),
            nonce: U256::from(123),
            call_data: Bytes::from(vec![0xca, 0x11]),
            call_gas_limit: U256::from(10),
            verification_gas_limit: U256::from(20),
            pre_verification_gas: U256::from(30),
            max_fee_per_gas: U256::from(40),
            max_priority_fee_per_gas: U256::from(50),
            signature: Bytes::from(vec![0xde, 0xad, 0xfa, 0xce]),
            paymaster: Some(Address::repeat_byte(0x22)),
            paymaster_verification_gas_limit: Some(U256::from(60)),
            paymaster_post_op_gas_limit: Some(U256::from(70)),
            paymaster_data: Some(Bytes::from(vec![0xca, 0xfe])),
            ..Default::default()
        }
    }

    fn hash(op: &UserOperation) -> H256 {
        user_op_hash(op, entry_point(), CHAIN_ID, None).unwrap()
    }

    #[test]
    fn matches_abi_encoded_preimage() {
        let mut op = default_op();
        op.paymaster = None;
        let packed = pack_user_op(&op).unwrap();

        let inner = keccak256(encode(&[
            Token::Address(op.sender),
            Token::Uint(op.nonce),
            Token::FixedBytes(keccak256([0u8; 0]).to_vec()),
            Token::FixedBytes(keccak256([0xcau8, 0x11]).to_vec()),
            Token::FixedBytes(packed.account_gas_limits.0.to_vec()),
            Token::Uint(op.pre_verification_gas),
            Token::FixedBytes(packed.gas_fees.0.to_vec()),
            Token::FixedBytes(keccak256([0u8; 0]).to_vec()),
        ]));
        let mut preimage = inner.to_vec();
        preimage.extend_from_slice(&[0u8; 12]);
        preimage.extend_from_slice(entry_point().as_bytes());
        let mut chain = [0u8; 32];
        U256::from(CHAIN_ID).to_big_endian(&mut chain);
        preimage.extend_from_slice(&chain);

        assert_eq!(hash(&op), H256(keccak256(preimage)));
    }

    #[test]
    fn signature_field_does_not_affect_hash() {
        let mut op = default_op();
        let a = hash(&op);
        op.signature = Bytes::from(vec![0x01; 65]);
        assert_eq!(a, hash(&op));
    }

    #[test]
    fn bound_to_entry_point_and_chain() {
        let op = default_op();
        let a = hash(&op);
        assert_ne!(a, user_op_hash(&op, Address::repeat_byte(0xef), CHAIN_ID, None).unwrap());
        assert_ne!(a, user_op_hash(&op, entry_point(), CHAIN_ID + 1, None).unwrap());
    }

    #[test]
    fn appending_paymaster_signature_changes_hash() {
        let unsigned = default_op();
        let mut signed = default_op();
        signed.paymaster_signature = Some(Bytes::from(vec![0x12, 0x34]));
        assert_ne!(hash(&unsigned), hash(&signed));
    }

    #[test]
    fn changing_paymaster_signature_keeps_hash() {
        let mut a = default_op();
        a.paymaster_signature = Some(Bytes::from(vec![0x12, 0x34]));
        let mut b = default_op();
        b.paymaster_signature = Some(Bytes::from(vec![0xab, 0xcd, 0xef]));
        let mut c = default_op();
        c.paymaster_signature = Some(Bytes::from(vec![0x56, 0x78]));
        assert_eq!(hash(&a), hash(&b));
        assert_eq!(hash(&a), hash(&c));
    }

    #[test]
    fn changing_paymaster_data_changes_hash() {
        let mut a = default_op();
        a.paymaster_signature = Some(Bytes::from(vec![0x12, 0x34]));
        let mut b = a.clone();
        b.paymaster_data = Some(Bytes::from(vec![0xaa, 0x11]));
        assert_ne!(hash(&a), hash(&b));
    }

    #[test]
    fn rejects_signature_length_reaching_into_lead_in() {
        // a trailer claiming a 200-byte signature, keeping only its last 30 bytes
        let trailer = encode_paymaster_signature(&[0u8; 200]).unwrap();
        let mut data = vec![0xca, 0xfe];
        data.extend_from_slice(&trailer[180..]);
        let mut op = default_op();
        op.paymaster_data = Some(Bytes::from(data));

        let len = pack_user_op(&op).unwrap().paymaster_and_data.len();
        assert_eq!(len, PAYMASTER_DATA_OFFSET + 32);
        assert_eq!(
            user_op_hash(&op, entry_point(), CHAIN_ID, None),
            Err(Error::InvalidTrailerLength { len, claimed: 200 })
        );
    }

    #[test]
    fn eip7702_hash_substitutes_delegate_for_factory() {
        let delegate = Address::repeat_byte(0xd1);
        let mut op = default_op();
        op.paymaster = None;

        let mut as_factory = op.clone();
        as_factory.factory = Some(delegate);
        as_factory.factory_data = Some(Bytes::new());
        let mut as_7702 = op.clone();
        as_7702.is_eip7702 = true;
        assert_eq!(
            user_op_hash(&as_7702, entry_point(), CHAIN_ID, Some(delegate)).unwrap(),
            hash(&as_factory)
        );

        as_factory.factory_data = Some(Bytes::from(vec![0xb1, 0xab, 0x1a]));
        as_7702.factory_data = Some(Bytes::from(vec![0xb1, 0xab, 0x1a]));
        assert_eq!(
            user_op_hash(&as_7702, entry_point(), CHAIN_ID, Some(delegate)).unwrap(),
            hash(&as_factory)
        );

        // the factory field doubles as the delegate
        as_7702.factory = Some(delegate);
        assert_eq!(hash(&as_7702), hash(&as_factory));
    }

    #[test]
    fn eip7702_without_delegate_fails() {
        let mut op = default_op();
        op.is_eip7702 = true;
        assert_eq!(
            user_op_hash(&op, entry_point(), CHAIN_ID, None),
            Err(Error::UnresolvedDelegate)
        );

        let mut packed = pack_user_op(&default_op()).unwrap();
        packed.init_code = Bytes::from(INITCODE_EIP7702_MARKER.to_vec());
        assert_eq!(
            packed.hash(entry_point(), CHAIN_ID, None),
            Err(Error::UnresolvedDelegate)
        );
    }

    #[test]
    fn delegate_ignored_for_regular_userops() {
        let op = default_op();
        assert_eq!(
            user_op_hash(&op, entry_point(), CHAIN_ID, Some(Address::repeat_byte(0xd1))).unwrap(),
            hash(&op)
        );
    }

    #[test]
    fn signs_as_personal_message() {
        let wallet: LocalWallet = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
            .parse()
            .unwrap();
        let op = default_op();
        let sig = sign_user_op(&wallet, &op, entry_point(), CHAIN_ID, None).unwrap();
        assert_eq!(sig.len(), 65);

        let sig = Signature::try_from(sig.as_ref()).unwrap();
        let recovered = sig.recover(hash_message(hash(&op))).unwrap();
        assert_eq!(recovered, wallet.address());
    }
}
