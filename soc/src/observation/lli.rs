//! Loss of Lock Indication (LLI) interpretation
//!
//! The codec passes the LLI byte through verbatim; this view is for
//! consumers that want to reason about what the digit means.
use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct LliFlags: u8 {
        /// Current epoch is marked Ok or Unknown status
        const OK_OR_UNKNOWN = 0x00;
        /// Lock lost between previous and current observation,
        /// cycle slip is possible
        const LOCK_LOSS = 0x01;
        /// Half cycle slip marker
        const HALF_CYCLE_SLIP = 0x02;
        /// Observing under anti spoofing,
        /// might suffer from decreased signal quality
        const UNDER_ANTI_SPOOFING = 0x04;
    }
}

impl LliFlags {
    /// Interprets a verbatim indicator byte. A space means Ok,
    /// anything that is not a valid flag digit is `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b' ' => Some(Self::OK_OR_UNKNOWN),
            b'0'..=b'9' => Self::from_bits(byte - b'0'),
            _ => None,
        }
    }
}
