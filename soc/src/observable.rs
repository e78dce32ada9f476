//! Observation codes
use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fixed slot width of a stored observation code
pub const CODE_WIDTH: usize = 3;

/// `ObsCode` names one signal measurement type: two characters in
/// RINEX 2.x files (`C1`, `L1`), three in 3.x (`C1C`, `L1C`).
/// Codes are kept in a fixed-width slot, NUL padded, so the container
/// can compare them bytewise.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObsCode([u8; CODE_WIDTH]);

impl ObsCode {
    /// Builds an `ObsCode` from a header table slot.
    /// Surrounding spaces are discarded, the stored copy is NUL padded.
    pub fn from_bytes(slot: &[u8]) -> Result<Self, Error> {
        let mut start = 0;
        while start < slot.len() && slot[start] == b' ' {
            start += 1;
        }
        let mut end = slot.len();
        while end > start && (slot[end - 1] == b' ' || slot[end - 1] == 0) {
            end -= 1;
        }
        let trimmed = &slot[start..end];
        if trimmed.is_empty() || trimmed.len() > CODE_WIDTH {
            return Err(Error::BadFormat);
        }
        let mut code = [0u8; CODE_WIDTH];
        for (i, &b) in trimmed.iter().enumerate() {
            if !b.is_ascii_graphic() {
                return Err(Error::BadFormat);
            }
            code[i] = b;
        }
        Ok(Self(code))
    }

    /// NUL padded fixed-width slot, as stored in `SOCD` names
    pub fn as_bytes(&self) -> &[u8; CODE_WIDTH] {
        &self.0
    }

    /// Code length: 2 for 2.x style codes, 3 for 3.x
    pub fn len(&self) -> usize {
        self.0.iter().position(|&b| b == 0).unwrap_or(CODE_WIDTH)
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    pub fn as_str(&self) -> &str {
        // constructor only admits ASCII graphic bytes
        std::str::from_utf8(&self.0[..self.len()]).unwrap_or("")
    }
}

impl std::str::FromStr for ObsCode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

impl std::fmt::Display for ObsCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;
    #[test]
    fn from_slot() {
        let code = ObsCode::from_bytes(b"    C1").unwrap();
        assert_eq!(code.as_str(), "C1");
        assert_eq!(code.len(), 2);
        assert_eq!(code.as_bytes(), b"C1\0");

        let code = ObsCode::from_bytes(b" L1C").unwrap();
        assert_eq!(code.as_str(), "L1C");
        assert_eq!(code.len(), 3);

        assert!(ObsCode::from_bytes(b"      ").is_err());
        assert!(ObsCode::from_bytes(b"C1CX").is_err());
    }
    #[test]
    fn ordering_is_bytewise() {
        let c1 = ObsCode::from_str("C1").unwrap();
        let c1c = ObsCode::from_str("C1C").unwrap();
        assert!(c1 < c1c);
        assert_eq!(c1, ObsCode::from_bytes(b"  C1  ").unwrap());
    }
}
