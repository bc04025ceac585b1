use crate::error::{Error, Result};

/// Trails a framed paymaster signature: `signature || len(2) || MAGIC`.
pub const PAYMASTER_SIG_MAGIC: [u8; 8] = [0x22, 0xe3, 0x25, 0xa2, 0x97, 0x43, 0x96, 0x56];

/// Length field plus magic.
pub const PAYMASTER_SUFFIX_LEN: usize = 10;

pub const PAYMASTER_VALIDATION_GAS_OFFSET: usize = 20;
pub const PAYMASTER_POSTOP_GAS_OFFSET: usize = 36;
/// Fixed lead-in of `paymasterAndData` before the free-form `paymasterData`.
pub const PAYMASTER_DATA_OFFSET: usize = 52;

/// What the tail of a data field says about a framed signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymasterTrailer {
    /// Shorter than the lead-in plus the 10-byte suffix; can never carry one.
    TooShort,
    /// Long enough, but does not end with the magic.
    Unframed,
    Framed { len: usize },
}

impl PaymasterTrailer {
    pub fn signature_len(self) -> usize {
        match self {
            PaymasterTrailer::Framed { len } => len,
            _ => 0,
        }
    }
}

/// Frames a paymaster signature for appending to `paymasterData`.
///
/// An empty signature frames to nothing at all.
pub fn encode_paymaster_signature(signature: &[u8]) -> Result<Vec<u8>> {
    if signature.is_empty() {
        return Ok(Vec::new());
    }
    let len = u16::try_from(signature.len()).map_err(|_| Error::SignatureTooLong(signature.len()))?;
    let mut out = Vec::with_capacity(signature.len() + PAYMASTER_SUFFIX_LEN);
    out.extend_from_slice(signature);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&PAYMASTER_SIG_MAGIC);
    Ok(out)
}

pub fn inspect_trailer(data: &[u8], lead_in: usize) -> Result<PaymasterTrailer> {
    let room = data.len().saturating_sub(lead_in);
    if room < PAYMASTER_SUFFIX_LEN {
        return Ok(PaymasterTrailer::TooShort);
    }
    let (body, magic) = data.split_at(data.len() - PAYMASTER_SIG_MAGIC.len());
    if magic != PAYMASTER_SIG_MAGIC {
        return Ok(PaymasterTrailer::Unframed);
    }
    let len_bytes = [body[body.len() - 2], body[body.len() - 1]];
    let len = u16::from_be_bytes(len_bytes) as usize;
    // the signature may not reach back into the lead-in
    if len > room - PAYMASTER_SUFFIX_LEN {
        return Err(Error::InvalidTrailerLength {
            len: data.len(),
            claimed: len,
        });
    }
    Ok(PaymasterTrailer::Framed { len })
}

/// Length of the framed signature at the end of `data`, 0 when there is none.
pub fn paymaster_signature_length(data: &[u8], lead_in: usize) -> Result<usize> {
    Ok(inspect_trailer(data, lead_in)?.signature_len())
}

/// The framed signature at the end of `data`, empty when there is none.
pub fn paymaster_signature(data: &[u8], lead_in: usize) -> Result<&[u8]> {
    let len = paymaster_signature_length(data, lead_in)?;
    if len == 0 {
        return Ok(&[]);
    }
    signature_with_length(data, len)
}

/// Slices a signature of known length out of a framed field.
pub fn signature_with_length(data: &[u8], len: usize) -> Result<&[u8]> {
    let framed = len.saturating_add(PAYMASTER_SUFFIX_LEN);
    if framed > data.len() {
        return Err(Error::LengthExceedsBlob {
            len: data.len(),
            excluded: framed,
        });
    }
    let end = data.len() - PAYMASTER_SUFFIX_LEN;
    Ok(&data[end - len..end])
}
