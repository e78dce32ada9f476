//! `RINEX` file header
use crate::{
    constellation::{System, NUM_SYSTEMS},
    observable::ObsCode,
    version::Version,
};

mod parsing;

/// Describes an observation file header: the revision, the
/// per-system observation code tables that drive every record
/// layout, and a normalized copy of the raw header text (LF
/// terminators, trailing spaces trimmed) which the container
/// carries verbatim in its `RHDR` chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    /// Revision for this `RINEX`
    pub version: Version,
    /// Observation codes declared per system slot,
    /// indexed by [System::index]
    pub codes: [Vec<ObsCode>; NUM_SYSTEMS],
    /// Normalized header text, "END OF HEADER" line included
    pub text: String,
}

impl Header {
    /// Number of declared observation codes for this system;
    /// drives the per-satellite record layout
    pub fn n_obs(&self, system: System) -> usize {
        self.codes[system.index()].len()
    }

    /// Declared observation codes for this system
    pub fn codes(&self, system: System) -> &[ObsCode] {
        &self.codes[system.index()]
    }

    /// Position of `code` in this system's declaration order
    pub fn code_index(&self, system: System, code: ObsCode) -> Option<usize> {
        self.codes[system.index()].iter().position(|&c| c == code)
    }

    /// Presence bitmap width for one satellite of this system
    pub fn bitmap_len(&self, system: System) -> usize {
        num_integer::div_ceil(self.n_obs(system), 8)
    }
}
