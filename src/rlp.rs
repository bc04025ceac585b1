//! Recursive-length-prefix codec.
//!
//! Items are either byte strings or lists of items. Integers enter through
//! [`CanonicalBytes`] so that a leading-zero integer can never reach the wire;
//! addresses and opaque data enter as raw byte strings.

use crate::canonical::CanonicalBytes;
use crate::error::RlpError;
use ethers::types::{Address, Bytes, U256};

const STRING_OFFSET: u8 = 0x80;
const LIST_OFFSET: u8 = 0xc0;
const SHORT_LIMIT: usize = 55;
/// Deepest list nesting `decode` accepts. A type-4 transaction needs 3.
pub const MAX_DEPTH: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    pub fn empty_list() -> Self {
        RlpItem::List(Vec::new())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to(&mut out);
        out
    }

    fn encode_to(&self, out: &mut Vec<u8>) {
        match self {
            RlpItem::Bytes(b) if b.len() == 1 && b[0] < STRING_OFFSET => out.push(b[0]),
            RlpItem::Bytes(b) => {
                encode_header(out, STRING_OFFSET, b.len());
                out.extend_from_slice(b);
            }
            RlpItem::List(items) => {
                let mut payload = Vec::new();
                for item in items {
                    item.encode_to(&mut payload);
                }
                encode_header(out, LIST_OFFSET, payload.len());
                out.extend_from_slice(&payload);
            }
        }
    }

    /// Decodes exactly one item; trailing input is an error.
    pub fn decode(input: &[u8]) -> Result<Self, RlpError> {
        let (item, rest) = decode_item(input, 0)?;
        if !rest.is_empty() {
            return Err(RlpError::TrailingBytes(rest.len()));
        }
        Ok(item)
    }

    pub fn as_bytes(&self) -> Result<&[u8], RlpError> {
        match self {
            RlpItem::Bytes(b) => Ok(b),
            RlpItem::List(_) => Err(RlpError::ExpectedBytes),
        }
    }

    pub fn as_list(&self) -> Result<&[RlpItem], RlpError> {
        match self {
            RlpItem::List(items) => Ok(items),
            RlpItem::Bytes(_) => Err(RlpError::ExpectedList),
        }
    }

    /// Reads a canonical integer of at most 32 bytes.
    pub fn to_u256(&self) -> Result<U256, RlpError> {
        let b = self.as_bytes()?;
        if b.len() > 32 || b.first() == Some(&0) {
            return Err(RlpError::BadInteger(32));
        }
        Ok(U256::from_big_endian(b))
    }

    pub fn to_u64(&self) -> Result<u64, RlpError> {
        let v = self.to_u256()?;
        if v > U256::from(u64::MAX) {
            return Err(RlpError::BadInteger(8));
        }
        Ok(v.as_u64())
    }

    pub fn to_address(&self) -> Result<Address, RlpError> {
        let b = self.as_bytes()?;
        if b.len() != 20 {
            return Err(RlpError::BadLength {
                expected: 20,
                found: b.len(),
            });
        }
        Ok(Address::from_slice(b))
    }
}

impl From<CanonicalBytes> for RlpItem {
    fn from(v: CanonicalBytes) -> Self {
        RlpItem::Bytes(v.into_vec())
    }
}

impl From<U256> for RlpItem {
    fn from(v: U256) -> Self {
        CanonicalBytes::from(v).into()
    }
}

impl From<u64> for RlpItem {
    fn from(v: u64) -> Self {
        CanonicalBytes::from(v).into()
    }
}

impl From<Address> for RlpItem {
    fn from(a: Address) -> Self {
        RlpItem::Bytes(a.as_bytes().to_vec())
    }
}

impl From<&Bytes> for RlpItem {
    fn from(b: &Bytes) -> Self {
        RlpItem::Bytes(b.to_vec())
    }
}

impl From<Vec<RlpItem>> for RlpItem {
    fn from(items: Vec<RlpItem>) -> Self {
        RlpItem::List(items)
    }
}

fn encode_header(out: &mut Vec<u8>, offset: u8, len: usize) {
    if len <= SHORT_LIMIT {
        out.push(offset + len as u8);
    } else {
        let len_bytes = CanonicalBytes::from(len as u64);
        out.push(offset + SHORT_LIMIT as u8 + len_bytes.len() as u8);
        out.extend_from_slice(len_bytes.as_bytes());
    }
}

fn decode_item(input: &[u8], depth: usize) -> Result<(RlpItem, &[u8]), RlpError> {
    let (&prefix, rest) = input.split_first().ok_or(RlpError::UnexpectedEnd)?;
    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(vec![prefix]), rest)),
        0x80..=0xbf => {
            let (len, rest) = payload_len(prefix - STRING_OFFSET, rest)?;
            let (payload, rest) = take(rest, len)?;
            if len == 1 && payload[0] < STRING_OFFSET {
                return Err(RlpError::NonCanonical);
            }
            Ok((RlpItem::Bytes(payload.to_vec()), rest))
        }
        _ => {
            if depth >= MAX_DEPTH {
                return Err(RlpError::TooDeep(MAX_DEPTH));
            }
            let (len, rest) = payload_len(prefix - LIST_OFFSET, rest)?;
            let (mut payload, rest) = take(rest, len)?;
            let mut items = Vec::new();
            while !payload.is_empty() {
                let (item, tail) = decode_item(payload, depth + 1)?;
                items.push(item);
                payload = tail;
            }
            Ok((RlpItem::List(items), rest))
        }
    }
}

/// Resolves the payload length from the prefix tag (already offset-adjusted).
fn payload_len(tag: u8, rest: &[u8]) -> Result<(usize, &[u8]), RlpError> {
    let tag = tag as usize;
    if tag <= SHORT_LIMIT {
        return Ok((tag, rest));
    }
    let len_of_len = tag - SHORT_LIMIT;
    let (len_bytes, rest) = take(rest, len_of_len)?;
    if len_bytes[0] == 0 || len_of_len > std::mem::size_of::<usize>() {
        return Err(RlpError::NonCanonical);
    }
    let len = len_bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize);
    if len <= SHORT_LIMIT {
        return Err(RlpError::NonCanonical);
    }
    Ok((len, rest))
}

fn take(input: &[u8], n: usize) -> Result<(&[u8], &[u8]), RlpError> {
    if input.len() < n {
        return Err(RlpError::UnexpectedEnd);
    }
    Ok(input.split_at(n))
}

#[cfg(test)]
mod tests {
    use super::{encode_header, RlpItem, MAX_DEPTH};
    use crate::canonical::CanonicalBytes;
    use crate::error::RlpError;
    use ethers::types::U256;
    use ethers::utils::rlp as reference;
    use rand::{Rng, RngCore};

    fn bytes(b: &[u8]) -> RlpItem {
        RlpItem::Bytes(b.to_vec())
    }

    #[test]
    fn encodes_well_known_vectors() {
        assert_eq!(bytes(b"dog").encode(), vec![0x83, b'd', b'o', b'g']);
        assert_eq!(
            RlpItem::List(vec![bytes(b"cat"), bytes(b"dog")]).encode(),
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
        assert_eq!(bytes(&[]).encode(), vec![0x80]);
        assert_eq!(RlpItem::empty_list().encode(), vec![0xc0]);
        assert_eq!(RlpItem::from(0u64).encode(), vec![0x80]);
        assert_eq!(bytes(&[0x0f]).encode(), vec![0x0f]);
        assert_eq!(bytes(&[0x04, 0x00]).encode(), vec![0x82, 0x04, 0x00]);
        assert_eq!(bytes(&[0x80]).encode(), vec![0x81, 0x80]);
        // set-theoretic representation of three
        let three = RlpItem::List(vec![
            RlpItem::empty_list(),
            RlpItem::List(vec![RlpItem::empty_list()]),
            RlpItem::List(vec![
                RlpItem::empty_list(),
                RlpItem::List(vec![RlpItem::empty_list()]),
            ]),
        ]);
        assert_eq!(
            three.encode(),
            vec![0xc7, 0xc0, 0xc1, 0xc0, 0xc3, 0xc0, 0xc1, 0xc0]
        );
    }

    #[test]
    fn long_string_cutoff_at_55_bytes() {
        let s55 = vec![0xaa; 55];
        let enc = bytes(&s55).encode();
        assert_eq!(enc[0], 0x80 + 55);
        assert_eq!(enc.len(), 56);

        let s56 = vec![0xaa; 56];
        let enc = bytes(&s56).encode();
        assert_eq!(&enc[..2], &[0xb8, 56]);
        assert_eq!(enc.len(), 58);

        let s1024 = vec![0xaa; 1024];
        let enc = bytes(&s1024).encode();
        assert_eq!(&enc[..3], &[0xb9, 0x04, 0x00]);
    }

    #[test]
    fn long_list_cutoff_at_55_bytes() {
        // 11 items of 5 bytes each (4-byte strings + prefix) = 55 payload bytes
        let short = RlpItem::List(vec![bytes(&[1, 2, 3, 4]); 11]);
        assert_eq!(short.encode()[0], 0xc0 + 55);
        let long = RlpItem::List(vec![bytes(&[1, 2, 3, 4]); 12]);
        assert_eq!(&long.encode()[..2], &[0xf8, 60]);
    }

    #[test]
    fn matches_reference_codec() {
        for v in [0u64, 1, 0x7f, 0x80, 0x539, u64::MAX] {
            let ours = RlpItem::from(v).encode();
            let theirs = reference::encode(&U256::from(v)).to_vec();
            assert_eq!(ours, theirs, "value {v}");
        }

        let data = vec![0x11u8; 300];
        assert_eq!(
            bytes(&data).encode(),
            reference::encode(&data).to_vec()
        );

        let mut stream = reference::RlpStream::new_list(3);
        stream.append(&U256::from(0x539u64));
        stream.append(&vec![0xabu8; 20]);
        stream.begin_list(0);
        let ours = RlpItem::List(vec![
            RlpItem::from(0x539u64),
            bytes(&[0xab; 20]),
            RlpItem::empty_list(),
        ])
        .encode();
        assert_eq!(ours, stream.out().to_vec());
    }

    fn random_item(rng: &mut impl RngCore, depth: u32) -> RlpItem {
        if depth == 0 || rng.gen_bool(0.6) {
            let len = match rng.gen_range(0..4) {
                0 => 0,
                1 => 1,
                2 => rng.gen_range(2..56),
                _ => rng.gen_range(56..400),
            };
            let mut b = vec![0u8; len];
            rng.fill_bytes(&mut b);
            RlpItem::Bytes(b)
        } else {
            let n = rng.gen_range(0..6);
            RlpItem::List((0..n).map(|_| random_item(rng, depth - 1)).collect())
        }
    }

    #[test]
    fn decode_inverts_encode() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let item = random_item(&mut rng, 4);
            let enc = item.encode();
            assert_eq!(RlpItem::decode(&enc).unwrap(), item);
        }
    }

    #[test]
    fn decode_rejects_malformed_input() {
        assert_eq!(RlpItem::decode(&[]), Err(RlpError::UnexpectedEnd));
        assert_eq!(RlpItem::decode(&[0x83, b'd', b'o']), Err(RlpError::UnexpectedEnd));
        assert_eq!(RlpItem::decode(&[0x01, 0x02]), Err(RlpError::TrailingBytes(1)));
        // single byte below 0x80 must encode as itself
        assert_eq!(RlpItem::decode(&[0x81, 0x05]), Err(RlpError::NonCanonical));
        // long form used for a short payload
        let mut bad = vec![0xb8, 0x02, 0xaa, 0xbb];
        assert_eq!(RlpItem::decode(&bad), Err(RlpError::NonCanonical));
        // leading zero in the length of length
        bad = vec![0xb9, 0x00, 0x38];
        bad.extend_from_slice(&[0u8; 0x38]);
        assert_eq!(RlpItem::decode(&bad), Err(RlpError::NonCanonical));
    }

    fn nested(levels: usize) -> RlpItem {
        (0..levels).fold(RlpItem::empty_list(), |inner, _| RlpItem::List(vec![inner]))
    }

    #[test]
    fn decode_limits_nesting() {
        // `nested(n)` has n + 1 list levels
        let deepest = nested(MAX_DEPTH - 1);
        assert_eq!(RlpItem::decode(&deepest.encode()).unwrap(), deepest);
        assert_eq!(
            RlpItem::decode(&nested(MAX_DEPTH).encode()),
            Err(RlpError::TooDeep(MAX_DEPTH))
        );

        // built without `RlpItem` so neither encoding nor dropping recurses
        let mut deep = vec![0xc0u8];
        for _ in 0..2_000 {
            let mut wrapped = Vec::with_capacity(deep.len() + 3);
            encode_header(&mut wrapped, 0xc0, deep.len());
            wrapped.extend_from_slice(&deep);
            deep = wrapped;
        }
        assert_eq!(RlpItem::decode(&deep), Err(RlpError::TooDeep(MAX_DEPTH)));
        let mut tx = vec![0x04u8];
        tx.extend_from_slice(&deep);
        assert!(crate::tx::SignedDelegationTransaction::decode(&tx).is_err());
    }

    #[test]
    fn typed_accessors() {
        let item = RlpItem::from(CanonicalBytes::from(0x539u64));
        assert_eq!(item.to_u64().unwrap(), 0x539);
        assert_eq!(bytes(&[0, 1]).to_u256(), Err(RlpError::BadInteger(32)));
        assert_eq!(
            bytes(&[1; 19]).to_address(),
            Err(RlpError::BadLength {
                expected: 20,
                found: 19
            })
        );
        assert_eq!(RlpItem::empty_list().as_bytes(), Err(RlpError::ExpectedBytes));
    }
}
