#![doc = include_str!("../README.md")]

pub mod constellation;
pub mod container;
pub mod epoch;
pub mod fields;
pub mod header;
pub mod leb128;
pub mod observable;
pub mod observation;
pub mod stream;
pub mod sv;
pub mod transpose;
pub mod version;

mod error;
pub use error::Error;

#[macro_use]
mod macros;

#[macro_use]
extern crate lazy_static;

/// Package to include all basic structures
pub mod prelude {
    pub use crate::constellation::System;
    pub use crate::container::{
        convert_s64_to_double, DigestKind, Event, PresenceRun, SignalReader, SocReader, SocWriter,
    };
    pub use crate::epoch::{Epoch, EpochFlag};
    pub use crate::header::Header;
    pub use crate::observable::ObsCode;
    pub use crate::observation::{ObsReader, ObsValue};
    pub use crate::stream::{BufferedStream, MappedStream, Stream};
    pub use crate::sv::Sv;
    pub use crate::version::Version;
    pub use crate::Error;
}
