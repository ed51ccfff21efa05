//! Wire codecs for the composite calldata shapes the oracle contracts
//! deserialize: variable-length byte strings packed into 31-byte words,
//! unsigned 256-bit integers split into 128-bit limbs, and signed 256-bit
//! integers carried as a sign flag plus an unsigned magnitude.
//!
//! A one-word misalignment here produces a different valid-looking entity
//! key downstream, so every decode validates range and length before
//! accepting a word.

use crate::primitives::{
    Bytes,
    Felt,
    Int256,
    U256,
};

use thiserror::Error;

/// Bytes packed into one full byte-string word.
pub const FULL_WORD_BYTES: usize = 31;

const LIMB_BITS: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("input ended mid-value")]
    Truncated,
    #[error("declared trailing-word length {0} exceeds {max}", max = FULL_WORD_BYTES - 1)]
    PendingLenTooLarge(usize),
    #[error("trailing word does not fit its declared length of {0} bytes")]
    PendingOverflow(usize),
    #[error("full byte-string word exceeds {FULL_WORD_BYTES} bytes")]
    FullWordOutOfRange,
    #[error("u256 limb exceeds 128 bits")]
    LimbOutOfRange,
    #[error("sign flag must be 0 or 1, got {0}")]
    InvalidSignFlag(Felt),
    #[error("word exceeds u64 range")]
    WordNotU64,
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Cursor over a word slice. Shared by the value codecs and the event
/// decoder so both walk keys/data with the same truncation handling.
#[derive(Debug)]
pub struct WordReader<'a> {
    words: &'a [Felt],
    pos: usize,
}

impl<'a> WordReader<'a> {
    pub fn new(words: &'a [Felt]) -> Self {
        Self { words, pos: 0 }
    }

    pub fn take(&mut self) -> CodecResult<Felt> {
        let word = *self.words.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        Ok(word)
    }

    pub fn take_u64(&mut self) -> CodecResult<u64> {
        let word = self.take()?;
        word.try_into().map_err(|_| CodecError::WordNotU64)
    }

    pub fn remaining(&self) -> usize {
        self.words.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

/// Append a byte string in wire order: full-word count, 31-byte big-endian
/// full words, the trailing partial word, then its exact byte length.
pub fn push_byte_string(out: &mut Vec<Felt>, bytes: &[u8]) {
    let mut chunks = bytes.chunks_exact(FULL_WORD_BYTES);
    let full_words: Vec<Felt> = chunks
        .by_ref()
        .map(|chunk| Felt::from_be_slice(chunk))
        .collect();
    let pending = chunks.remainder();

    out.push(Felt::from(full_words.len()));
    out.extend(full_words);
    out.push(Felt::from_be_slice(pending));
    out.push(Felt::from(pending.len()));
}

/// Read a byte string encoded by [`push_byte_string`].
pub fn read_byte_string(reader: &mut WordReader<'_>) -> CodecResult<Bytes> {
    let word_count = reader.take_u64()? as usize;
    if word_count > reader.remaining() {
        return Err(CodecError::Truncated);
    }

    let mut bytes = Vec::with_capacity(word_count * FULL_WORD_BYTES);
    for _ in 0..word_count {
        let word = reader.take()?;
        let be = word.to_be_bytes::<32>();
        if be[0] != 0 {
            return Err(CodecError::FullWordOutOfRange);
        }
        bytes.extend_from_slice(&be[32 - FULL_WORD_BYTES..]);
    }

    let pending = reader.take()?;
    let pending_len = reader.take_u64()? as usize;
    if pending_len >= FULL_WORD_BYTES {
        return Err(CodecError::PendingLenTooLarge(pending_len));
    }
    if (pending >> (8 * pending_len)) != U256::ZERO {
        return Err(CodecError::PendingOverflow(pending_len));
    }
    let be = pending.to_be_bytes::<32>();
    bytes.extend_from_slice(&be[32 - pending_len..]);

    Ok(bytes.into())
}

/// Append an unsigned 256-bit value as its low then high 128-bit limb.
pub fn push_u256(out: &mut Vec<Felt>, value: U256) {
    let low = value & limb_mask();
    let high = value >> LIMB_BITS;
    out.push(low);
    out.push(high);
}

/// Read a `(low, high)` limb pair back into a single unsigned value.
pub fn read_u256(reader: &mut WordReader<'_>) -> CodecResult<U256> {
    let low = reader.take()?;
    let high = reader.take()?;
    if low > limb_mask() || high > limb_mask() {
        return Err(CodecError::LimbOutOfRange);
    }
    Ok((high << LIMB_BITS) | low)
}

/// Append a signed value as sign flag then unsigned magnitude. Negative
/// values use flag 1 with a positive magnitude, never two's complement.
pub fn push_int256(out: &mut Vec<Felt>, value: Int256) {
    out.push(Felt::from(u8::from(value.is_negative())));
    push_u256(out, value.magnitude());
}

/// Read a sign flag plus magnitude. A zero magnitude always decodes
/// non-negative regardless of the flag.
pub fn read_int256(reader: &mut WordReader<'_>) -> CodecResult<Int256> {
    let flag = reader.take()?;
    let negative = if flag == U256::ZERO {
        false
    } else if flag == U256::from(1u8) {
        true
    } else {
        return Err(CodecError::InvalidSignFlag(flag));
    };
    let magnitude = read_u256(reader)?;
    Ok(Int256::new(negative, magnitude))
}

pub fn encode_byte_string(bytes: &[u8]) -> Vec<Felt> {
    let mut out = Vec::new();
    push_byte_string(&mut out, bytes);
    out
}

pub fn encode_u256(value: U256) -> Vec<Felt> {
    let mut out = Vec::new();
    push_u256(&mut out, value);
    out
}

pub fn encode_int256(value: Int256) -> Vec<Felt> {
    let mut out = Vec::new();
    push_int256(&mut out, value);
    out
}

/// Decode a short ASCII string packed big-endian into a single felt,
/// e.g. the `YES_OR_NO_QUERY` identifier. Display-only.
pub fn felt_to_string(value: Felt) -> String {
    let be = value.to_be_bytes::<32>();
    let start = be.iter().position(|b| *b != 0).unwrap_or(be.len());
    String::from_utf8_lossy(&be[start..]).into_owned()
}

fn limb_mask() -> U256 {
    (U256::from(1u8) << LIMB_BITS) - U256::from(1u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{
        Rng,
        RngCore,
    };

    fn roundtrip_bytes(input: &[u8]) -> Bytes {
        let words = encode_byte_string(input);
        let mut reader = WordReader::new(&words);
        let decoded = read_byte_string(&mut reader).unwrap();
        assert!(reader.is_exhausted());
        decoded
    }

    #[test]
    fn byte_string_roundtrip_short() {
        for input in [
            &b""[..],
            b"q",
            b"YES_OR_NO_QUERY",
            b"q: title: Will it settle? : description here",
        ] {
            assert_eq!(roundtrip_bytes(input).as_ref(), input);
        }
    }

    #[test]
    fn byte_string_roundtrip_random() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let len = rng.gen_range(0..200);
            let mut input = vec![0u8; len];
            rng.fill_bytes(&mut input);
            assert_eq!(roundtrip_bytes(&input).as_ref(), &input[..]);
        }
    }

    #[test]
    fn byte_string_word_boundaries() {
        // Exactly one full word: zero-length pending word.
        let input = [0x41u8; 31];
        let words = encode_byte_string(&input);
        assert_eq!(words[0], Felt::from(1u8));
        assert_eq!(words.len(), 4);
        assert_eq!(words[2], Felt::ZERO);
        assert_eq!(words[3], Felt::ZERO);
        assert_eq!(roundtrip_bytes(&input).as_ref(), &input[..]);

        // One byte over: one full word plus a 1-byte pending word.
        let input = [0x41u8; 32];
        let words = encode_byte_string(&input);
        assert_eq!(words[0], Felt::from(1u8));
        assert_eq!(words[2], Felt::from(0x41u8));
        assert_eq!(words[3], Felt::from(1u8));
        assert_eq!(roundtrip_bytes(&input).as_ref(), &input[..]);
    }

    #[test]
    fn byte_string_preserves_leading_zero_bytes() {
        let mut input = vec![0u8; 40];
        input[39] = 1;
        assert_eq!(roundtrip_bytes(&input).as_ref(), &input[..]);
    }

    #[test]
    fn byte_string_rejects_oversized_pending_len() {
        // [count=0, pending=0, pending_len=31]
        let words = vec![Felt::ZERO, Felt::ZERO, Felt::from(31u8)];
        let err = read_byte_string(&mut WordReader::new(&words)).unwrap_err();
        assert_eq!(err, CodecError::PendingLenTooLarge(31));
    }

    #[test]
    fn byte_string_rejects_pending_overflow() {
        // Two significant bytes but a declared length of one.
        let words = vec![Felt::ZERO, Felt::from(0x0102u16), Felt::from(1u8)];
        let err = read_byte_string(&mut WordReader::new(&words)).unwrap_err();
        assert_eq!(err, CodecError::PendingOverflow(1));
    }

    #[test]
    fn byte_string_rejects_oversized_full_word() {
        let words = vec![
            Felt::from(1u8),
            U256::from(1u8) << 250,
            Felt::ZERO,
            Felt::ZERO,
        ];
        let err = read_byte_string(&mut WordReader::new(&words)).unwrap_err();
        assert_eq!(err, CodecError::FullWordOutOfRange);
    }

    #[test]
    fn byte_string_truncated_input() {
        // Declares three full words but carries none.
        let words = vec![Felt::from(3u8)];
        let err = read_byte_string(&mut WordReader::new(&words)).unwrap_err();
        assert_eq!(err, CodecError::Truncated);
    }

    #[test]
    fn u256_roundtrip() {
        let mut rng = rand::thread_rng();
        let mut cases = vec![U256::ZERO, U256::from(1u8), U256::MAX];
        for _ in 0..100 {
            let mut limbs = [0u64; 4];
            for limb in &mut limbs {
                *limb = rng.gen();
            }
            cases.push(U256::from_limbs(limbs));
        }
        for value in cases {
            let words = encode_u256(value);
            assert_eq!(words.len(), 2);
            let decoded = read_u256(&mut WordReader::new(&words)).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn u256_limb_split() {
        let value = (U256::from(7u8) << 128) | U256::from(9u8);
        let words = encode_u256(value);
        assert_eq!(words[0], Felt::from(9u8));
        assert_eq!(words[1], Felt::from(7u8));
    }

    #[test]
    fn u256_rejects_oversized_limb() {
        let words = vec![U256::from(1u8) << 130, Felt::ZERO];
        let err = read_u256(&mut WordReader::new(&words)).unwrap_err();
        assert_eq!(err, CodecError::LimbOutOfRange);
    }

    #[test]
    fn int256_roundtrip() {
        let mut rng = rand::thread_rng();
        let mut cases = vec![
            Int256::ZERO,
            Int256::from(-1i128),
            Int256::positive(U256::MAX),
            Int256::negative(U256::MAX),
        ];
        for _ in 0..100 {
            let mut limbs = [0u64; 4];
            for limb in &mut limbs {
                *limb = rng.gen();
            }
            cases.push(Int256::new(rng.gen(), U256::from_limbs(limbs)));
        }
        for value in cases {
            let words = encode_int256(value);
            let decoded = read_int256(&mut WordReader::new(&words)).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn int256_negative_is_flag_plus_magnitude() {
        let words = encode_int256(Int256::from(-5i128));
        assert_eq!(words[0], Felt::from(1u8));
        assert_eq!(words[1], Felt::from(5u8));
        assert_eq!(words[2], Felt::ZERO);
    }

    #[test]
    fn int256_rejects_bad_sign_flag() {
        let words = vec![Felt::from(2u8), Felt::ZERO, Felt::ZERO];
        let err = read_int256(&mut WordReader::new(&words)).unwrap_err();
        assert_eq!(err, CodecError::InvalidSignFlag(Felt::from(2u8)));
    }

    #[test]
    fn felt_to_string_decodes_identifier() {
        let identifier = Felt::from_be_slice(b"YES_OR_NO_QUERY");
        assert_eq!(felt_to_string(identifier), "YES_OR_NO_QUERY");
        assert_eq!(felt_to_string(Felt::ZERO), "");
    }
}
