//! Succinct Observation Container (SOC)
//!
//! The container is an ordered list of tagged chunks: a 4-byte ASCII
//! tag, a ULEB128 payload length, the payload, and an optional digest
//! of `tag || length || payload`. `SRNX` identifies the container and
//! must come first, `RHDR` carries the normalized RINEX header text
//! and must come second. `EPOC` packs the epoch axis as arithmetic
//! spans, `EVTF` chunks carry special events, and each satellite owns
//! one `SATE` chunk pointing at one `SOCD` chunk per observed code.
//!
//! [SocWriter] accumulates a whole file worth of signal streams and
//! lays the chunks out on finalize; [SocReader] walks them back and
//! hands out per-signal value iterators.
use crate::Error;

mod blocks;
mod numdiff;
mod reader;
mod writer;

pub use reader::{Event, PresenceRun, SatEntry, SignalReader, SocReader};
pub use writer::SocWriter;

pub(crate) use numdiff::NumDiff;

use crc::{Crc, CRC_32_ISCSI};
use sha2::{Digest as _, Sha256};

/// Container revision understood by this implementation
pub const MAJOR: u64 = 1;
pub const MINOR: u64 = 0;

pub(crate) const TAG_SRNX: &[u8; 4] = b"SRNX";
pub(crate) const TAG_RHDR: &[u8; 4] = b"RHDR";
pub(crate) const TAG_SDIR: &[u8; 4] = b"SDIR";
pub(crate) const TAG_EPOC: &[u8; 4] = b"EPOC";
pub(crate) const TAG_EVTF: &[u8; 4] = b"EVTF";
pub(crate) const TAG_SATE: &[u8; 4] = b"SATE";
pub(crate) const TAG_SOCD: &[u8; 4] = b"SOCD";

/// Reserved fixed-width slot for the `SDIR` offset in the `SRNX`
/// payload, encoded as a padded ULEB128 so the value can change
/// without moving a byte
pub(crate) const SDIR_SLOT: usize = 8;

static CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Digest algorithm used for chunk and file checksums
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DigestKind {
    /// No digest
    None,
    /// CRC32C (Castagnoli), 4 bytes big endian
    #[default]
    Crc32c,
    /// SHA-256, 32 bytes
    Sha256,
}

impl DigestKind {
    pub(crate) fn from_id(id: u64) -> Result<Self, Error> {
        match id {
            0 => Ok(Self::None),
            2 => Ok(Self::Crc32c),
            6 => Ok(Self::Sha256),
            _ => Err(Error::Corrupt), // reserved: cannot walk past it
        }
    }

    pub(crate) fn id(self) -> u64 {
        match self {
            Self::None => 0,
            Self::Crc32c => 2,
            Self::Sha256 => 6,
        }
    }

    /// Digest size in bytes
    pub fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Crc32c => 4,
            Self::Sha256 => 32,
        }
    }

    /// One-shot digest over concatenated parts
    pub(crate) fn compute(self, parts: &[&[u8]]) -> Vec<u8> {
        let mut state = DigestState::new(self);
        for part in parts {
            state.update(part);
        }
        state.finish()
    }
}

/// Incremental digest, used for the whole-file checksum
pub(crate) enum DigestState {
    None,
    Crc32c(crc::Digest<'static, u32>),
    Sha256(Sha256),
}

impl DigestState {
    pub(crate) fn new(kind: DigestKind) -> Self {
        match kind {
            DigestKind::None => Self::None,
            DigestKind::Crc32c => Self::Crc32c(CASTAGNOLI.digest()),
            DigestKind::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::None => {},
            Self::Crc32c(digest) => digest.update(bytes),
            Self::Sha256(digest) => digest.update(bytes),
        }
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        match self {
            Self::None => Vec::new(),
            Self::Crc32c(digest) => digest.finalize().to_be_bytes().to_vec(),
            Self::Sha256(digest) => digest.finalize().to_vec(),
        }
    }
}

/// Wall-clock fields of one epoch inside an `EPOC` span, advanced
/// tick by tick. A whole-second value of exactly 60 carries into the
/// minute and the minute into the hour; hours never wrap (day
/// rollovers start a new span), and a jump past 61 seconds never
/// resets (leap-second spans start with `sec == 60` in their time
/// field instead).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct SpanClock {
    pub hours: i16,
    pub minutes: i16,
    pub sec_e7: i64,
}

impl SpanClock {
    pub(crate) fn tick(&mut self, interval_e7: i64) {
        self.sec_e7 += interval_e7;
        if self.sec_e7 / 10_000_000 == 60 {
            self.sec_e7 -= 600_000_000;
            self.minutes += 1;
            if self.minutes == 60 {
                self.minutes = 0;
                self.hours += 1;
            }
        }
    }
}

/// Reinterprets an array of scaled integers in place as the IEEE
/// doubles `value * scale / 1000.0`. Exact only for `|value| < 2^51`.
pub fn convert_s64_to_double(buf: &mut [i64], scale: i64) {
    for slot in buf.iter_mut() {
        let value = *slot as f64 * scale as f64 / 1000.0;
        *slot = value.to_bits() as i64;
    }
}
