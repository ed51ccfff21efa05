pub use alloy_primitives::{
    hex,
    keccak256,
    Bytes,
    B256,
    U256,
};

use std::fmt;

use serde::Serialize;

/// One field element: a single calldata or event-log word.
///
/// Contract addresses, identifiers and event selectors are all felt-valued,
/// so they share this alias rather than a fixed-width address type.
pub type Felt = U256;

/// Transaction hash as reported by the log source.
pub type TxHash = B256;

/// The three oracle contract flavours tracked by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OracleKind {
    /// Plain request/propose/dispute/settle oracle.
    Optimistic,
    /// Managed variant of the request oracle (same event family).
    OptimisticManaged,
    /// Assertion-based oracle (made/disputed/settled family).
    Asserter,
}

impl OracleKind {
    pub fn is_request_family(&self) -> bool {
        matches!(self, Self::Optimistic | Self::OptimisticManaged)
    }
}

impl fmt::Display for OracleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Optimistic => "optimistic-oracle",
            Self::OptimisticManaged => "optimistic-oracle-managed",
            Self::Asserter => "optimistic-oracle-asserter",
        };
        f.write_str(s)
    }
}

/// One emitted event, exactly as the chain reported it.
///
/// `keys[0]` carries the event selector; remaining keys hold the indexed
/// fields, `data` the rest. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogRecord {
    pub contract: Felt,
    pub block_number: u64,
    pub tx_hash: TxHash,
    pub keys: Vec<Felt>,
    pub data: Vec<Felt>,
}

impl RawLogRecord {
    /// The event selector, if the record carries one.
    pub fn selector(&self) -> Option<Felt> {
        self.keys.first().copied()
    }
}

/// A signed 256-bit value in the contract's sign-and-magnitude shape.
///
/// The wire format is a sign flag (0 non-negative, 1 negative) followed by an
/// unsigned magnitude, so the representable range is (-2^256, 2^256) and a
/// two's-complement type cannot stand in for it. Zero is always stored
/// non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Int256 {
    negative: bool,
    magnitude: U256,
}

impl Int256 {
    pub const ZERO: Self = Self {
        negative: false,
        magnitude: U256::ZERO,
    };

    pub fn new(negative: bool, magnitude: U256) -> Self {
        Self {
            // No negative zero.
            negative: negative && !magnitude.is_zero(),
            magnitude,
        }
    }

    pub fn positive(magnitude: U256) -> Self {
        Self::new(false, magnitude)
    }

    pub fn negative(magnitude: U256) -> Self {
        Self::new(true, magnitude)
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn magnitude(&self) -> U256 {
        self.magnitude
    }
}

impl From<i128> for Int256 {
    fn from(value: i128) -> Self {
        Self::new(value < 0, U256::from(value.unsigned_abs()))
    }
}

impl fmt::Display for Int256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}

/// A fully-encoded state-changing call, ready for a wallet-owning submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
    pub contract: Felt,
    pub entrypoint: String,
    pub selector: Felt,
    pub calldata: Vec<Felt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int256_normalizes_negative_zero() {
        let v = Int256::negative(U256::ZERO);
        assert!(!v.is_negative());
        assert_eq!(v, Int256::ZERO);
    }

    #[test]
    fn int256_display() {
        assert_eq!(Int256::from(-42i128).to_string(), "-42");
        assert_eq!(Int256::positive(U256::from(7u8)).to_string(), "7");
        assert_eq!(Int256::ZERO.to_string(), "0");
    }

    #[test]
    fn raw_log_selector() {
        let record = RawLogRecord {
            contract: Felt::from(1u8),
            block_number: 10,
            tx_hash: TxHash::ZERO,
            keys: vec![Felt::from(0xabu8)],
            data: vec![],
        };
        assert_eq!(record.selector(), Some(Felt::from(0xabu8)));
        assert_eq!(
            RawLogRecord {
                keys: vec![],
                ..record
            }
            .selector(),
            None
        );
    }
}
