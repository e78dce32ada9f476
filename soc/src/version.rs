//! `RINEX` revision description
use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Version describes the RINEX standard revision of an observation file.
/// Only 2.x and 3.x revisions are understood.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Version {
    /// Version major number
    pub major: u8,
    /// Version minor number
    pub minor: u8,
}

impl Version {
    /// Builds a new `Version` object
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parses the F9.2 version field found at the start of the
    /// "RINEX VERSION / TYPE" header line, for example `"     2.11"`.
    /// Revisions other than 2.x / 3.x are rejected with [Error::UnknownVersion].
    pub fn from_field(field: &[u8]) -> Result<Self, Error> {
        let mut i = 0;
        while i < field.len() && field[i] == b' ' {
            i += 1;
        }
        let mut major: u8 = 0;
        let mut seen = false;
        while i < field.len() && field[i].is_ascii_digit() {
            major = major.wrapping_mul(10).wrapping_add(field[i] - b'0');
            seen = true;
            i += 1;
        }
        if !seen {
            return Err(Error::UnknownVersion);
        }
        let mut minor: u8 = 0;
        if i < field.len() && field[i] == b'.' {
            i += 1;
            while i < field.len() && field[i].is_ascii_digit() {
                minor = minor.wrapping_mul(10).wrapping_add(field[i] - b'0');
                i += 1;
            }
        }
        while i < field.len() {
            if field[i] != b' ' {
                return Err(Error::UnknownVersion);
            }
            i += 1;
        }
        match major {
            2 | 3 => Ok(Self { major, minor }),
            _ => Err(Error::UnknownVersion),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}
