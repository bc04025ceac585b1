use crate::error::Result;
use ethers::types::U256;

/// Minimal-width big-endian integer bytes.
///
/// The only way to build one strips leading zero bytes, so zero is always the
/// empty string and every value has exactly one representation. Integer
/// fields are RLP-encoded through this type and nothing else.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn from_be_slice(bytes: &[u8]) -> Self {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        Self(bytes[start..].to_vec())
    }

    /// Parses a hex quantity (`0x`-prefix optional). Odd-length input gets one
    /// leading zero nibble before decoding.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = if s.len() % 2 == 1 {
            hex::decode(format!("0{s}"))?
        } else {
            hex::decode(s)?
        };
        Ok(Self::from_be_slice(&bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Byte-oriented hex: even length, `0x` for zero.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    /// JSON-RPC quantity: no leading zero nibble, `0x0` for zero.
    pub fn to_quantity(&self) -> String {
        let h = hex::encode(&self.0);
        let trimmed = h.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{trimmed}")
        }
    }

    /// `None` when wider than 256 bits.
    pub fn to_u256(&self) -> Option<U256> {
        (self.0.len() <= 32).then(|| U256::from_big_endian(&self.0))
    }
}

impl From<U256> for CanonicalBytes {
    fn from(v: U256) -> Self {
        let mut buf = [0u8; 32];
        v.to_big_endian(&mut buf);
        Self::from_be_slice(&buf)
    }
}

impl From<u128> for CanonicalBytes {
    fn from(v: u128) -> Self {
        Self::from_be_slice(&v.to_be_bytes())
    }
}

impl From<u64> for CanonicalBytes {
    fn from(v: u64) -> Self {
        Self::from_be_slice(&v.to_be_bytes())
    }
}

impl From<u8> for CanonicalBytes {
    fn from(v: u8) -> Self {
        Self::from_be_slice(&[v])
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
