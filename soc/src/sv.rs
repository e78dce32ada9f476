//! Satellite vehicle
use crate::{constellation::System, Error};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `Sv` describes a satellite vehicle: a GNSS [System]
/// and a two-digit PRN identifier, matching the 3-byte
/// `XNN` descriptor used throughout observation files.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sv {
    /// `GNSS` system this vehicle is tied to
    pub system: System,
    /// PRN identification # for this vehicle
    pub prn: u8,
}

impl Sv {
    /// Creates a new `Sv`
    pub fn new(system: System, prn: u8) -> Self {
        Self { system, prn }
    }

    /// Parses an `Sv` from a 3-byte `XNN` descriptor.
    /// The system letter may be a space (GPS shorthand) and the
    /// PRN may be space padded (`"G 5"`).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 3 {
            return Err(Error::BadFormat);
        }
        let system = System::from_letter(bytes[0])?;
        let mut prn: u8 = 0;
        let mut seen = false;
        for &b in &bytes[1..3] {
            match b {
                b'0'..=b'9' => {
                    prn = prn.wrapping_mul(10).wrapping_add(b - b'0');
                    seen = true;
                },
                b' ' if !seen => {},
                _ => return Err(Error::BadFormat),
            }
        }
        if !seen {
            return Err(Error::BadFormat);
        }
        Ok(Self { system, prn })
    }

    /// Wire form: system letter plus zero-padded two-digit PRN
    pub fn to_bytes(self) -> [u8; 3] {
        [
            self.system.letter(),
            b'0' + (self.prn / 10) % 10,
            b'0' + self.prn % 10,
        ]
    }
}

impl std::str::FromStr for Sv {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

impl std::fmt::Display for Sv {
    /// Prints self as XNN standard format
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{:02}", self.system.letter() as char, self.prn)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;
    #[test]
    fn from_str() {
        for (descriptor, expected) in [
            ("G01", Sv::new(System::GPS, 1)),
            ("G 1", Sv::new(System::GPS, 1)),
            ("G33", Sv::new(System::GPS, 33)),
            (" 05", Sv::new(System::GPS, 5)),
            ("C01", Sv::new(System::BeiDou, 1)),
            ("R24", Sv::new(System::Glonass, 24)),
            ("E 4", Sv::new(System::Galileo, 4)),
            ("S23", Sv::new(System::SBAS, 23)),
            ("J 2", Sv::new(System::QZSS, 2)),
            ("I 3", Sv::new(System::IRNSS, 3)),
        ] {
            let sv = Sv::from_str(descriptor);
            assert!(
                sv.is_ok(),
                "failed to parse sv from \"{}\" - {:?}",
                descriptor,
                sv.err().unwrap()
            );
            let sv = sv.unwrap();
            assert_eq!(
                sv, expected,
                "badly identified {} from \"{}\"",
                sv, descriptor
            );
        }
        assert!(Sv::from_str("X01").is_err());
        assert!(Sv::from_str("G  ").is_err());
        assert!(Sv::from_str("G0x").is_err());
    }
    #[test]
    fn wire_form() {
        assert_eq!(&Sv::new(System::GPS, 5).to_bytes(), b"G05");
        assert_eq!(&Sv::new(System::Glonass, 17).to_bytes(), b"R17");
        assert_eq!(Sv::from_bytes(b"R17").unwrap().to_bytes(), *b"R17");
    }
}
