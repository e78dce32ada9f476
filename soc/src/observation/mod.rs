//! Observation record reading
//!
//! [ObsReader] is a pull-style decoder: every [ObsReader::read] call
//! advances exactly one record — an observation epoch or a special
//! event — and exposes the decoded content by borrow until the next
//! call. Output buffers are owned by the reader and overwritten on
//! each call.
use crate::{
    epoch::{Epoch, EpochFlag},
    fields::{is_blank, parse_fixed, parse_uint},
    header::Header,
    stream::{read_line, Stream},
    sv::Sv,
    Error,
};

mod formatting;
pub mod lli;

pub use formatting::{format_event, format_observation, SatRow};

#[cfg(feature = "log")]
use log::debug;

/// Observation field slot: F14.3 value, LLI byte, SSI byte
const FIELD_WIDTH: usize = 16;
/// F14.3 width inside a field slot
const VALUE_WIDTH: usize = 14;
/// Fields per RINEX 2.x data line
const V2_FIELDS_PER_LINE: usize = 5;
/// Satellites per RINEX 2.x epoch-line row
const V2_SATS_PER_LINE: usize = 12;
/// Satellite list column on RINEX 2.x epoch lines
const V2_SAT_LIST: usize = 32;

/// One decoded observation: the F14.3 value times 1000 and its two
/// indicator bytes, passed through verbatim
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ObsValue {
    pub value: i64,
    pub lli: u8,
    pub ssi: u8,
}

#[derive(Default, Debug, Copy, Clone, PartialEq)]
enum State {
    /// Between records
    #[default]
    Idle,
    /// Decoding an epoch descriptor line
    ReadEpochHeader,
    /// Decoding satellite observation lines
    ReadObservations,
    /// Copying event text lines
    ReadEvent,
    /// A failure occurred: only destruction is legal
    Failed,
}

/// Records the failure site and poisons the reader.
macro_rules! fail {
    ($self:expr, $kind:expr) => {{
        $self.error_line = line!();
        $self.state = State::Failed;
        return Err($kind);
    }};
}

/// Propagates a field-level failure through [fail].
macro_rules! try_field {
    ($self:expr, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(kind) => fail!($self, kind),
        }
    };
}

/// Streaming observation record reader
pub struct ObsReader<S: Stream> {
    stream: S,
    header: Header,
    state: State,
    /// Epoch of the last delivered record
    epoch: Epoch,
    /// Satellites of the last observation record, in record order
    sats: Vec<Sv>,
    /// Per satellite: system letter, PRN, presence bitmap
    /// (LSB first within each byte)
    presence: Vec<u8>,
    values: Vec<i64>,
    lli: Vec<u8>,
    ssi: Vec<u8>,
    /// Verbatim event text, newline preserved
    event: Vec<u8>,
    line: Vec<u8>,
    error_line: u32,
}

impl<S: Stream> ObsReader<S> {
    /// Opens an observation stream: parses the header section and
    /// leaves the reader positioned on the first record.
    pub fn new(mut stream: S) -> Result<Self, Error> {
        let header = Header::parse(&mut stream)?;
        Ok(Self {
            stream,
            header,
            state: State::Idle,
            epoch: Epoch::default(),
            sats: Vec::with_capacity(64),
            presence: Vec::with_capacity(512),
            values: Vec::with_capacity(512),
            lli: Vec::with_capacity(512),
            ssi: Vec::with_capacity(512),
            event: Vec::new(),
            line: Vec::with_capacity(128),
            error_line: 0,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Epoch of the last record; dispatch on its flag to tell
    /// observation records from events
    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    /// Observed values of the last record, one per presence bit set
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// LLI bytes, parallel to [ObsReader::values]
    pub fn lli(&self) -> &[u8] {
        &self.lli
    }

    /// SSI bytes, parallel to [ObsReader::values]
    pub fn ssi(&self) -> &[u8] {
        &self.ssi
    }

    /// Satellites of the last observation record with their
    /// presence bitmaps
    pub fn satellites(&self) -> Satellites<'_> {
        Satellites {
            reader_sats: &self.sats,
            presence: &self.presence,
            header: &self.header,
            index: 0,
            offset: 0,
        }
    }

    /// Verbatim text body of the last event record
    pub fn event_lines(&self) -> &[u8] {
        &self.event
    }

    /// Source location of the last failure, for diagnostics
    pub fn error_line(&self) -> u32 {
        self.error_line
    }

    /// Advances one record. `Ok(true)` exposes a fresh record
    /// through the accessors, `Ok(false)` is the clean end of input.
    /// After an error only dropping the reader is meaningful.
    pub fn read(&mut self) -> Result<bool, Error> {
        if self.state != State::Idle {
            return Err(Error::BadState);
        }
        self.sats.clear();
        self.presence.clear();
        self.values.clear();
        self.lli.clear();
        self.ssi.clear();
        self.event.clear();

        // locate the next record line, tolerating stray empty lines
        let len = loop {
            match try_field!(self, read_line(&mut self.stream, &mut self.line)) {
                None => return Ok(false),
                Some(len) if is_blank(&self.line, len) => continue,
                Some(len) => break len,
            }
        };

        self.state = State::ReadEpochHeader;
        if self.header.version.major == 2 {
            self.read_epoch_v2(len)?;
        } else {
            self.read_epoch_v3(len)?;
        }

        #[cfg(feature = "log")]
        debug!("epoch: {} flag {}", self.epoch, self.epoch.flag);

        if self.epoch.flag.is_observation() {
            self.state = State::ReadObservations;
            if self.header.version.major == 2 {
                self.read_observations_v2(len)?;
            } else {
                self.read_observations_v3()?;
            }
        } else {
            self.state = State::ReadEvent;
            self.read_event()?;
        }
        self.state = State::Idle;
        Ok(true)
    }

    /// RINEX 2.x epoch descriptor:
    /// `" YY MM DD HH MM SS.SSSSSSS  F NNN"` + satellite list
    fn read_epoch_v2(&mut self, len: usize) -> Result<(), Error> {
        let flag = try_field!(self, EpochFlag::from_digit(self.line[28]));
        let mut epoch = Epoch {
            flag,
            ..Default::default()
        };
        if flag.is_event() && is_blank(&self.line, 26) {
            // events may omit the timestamp entirely
        } else {
            let year = Epoch::normalize_year(try_field!(self, parse_uint(&self.line[1..], 2)) as i32);
            let month = try_field!(self, parse_uint(&self.line[4..], 2)) as i32;
            let day = try_field!(self, parse_uint(&self.line[7..], 2)) as i32;
            let hour = try_field!(self, parse_uint(&self.line[10..], 2)) as i16;
            let minute = try_field!(self, parse_uint(&self.line[13..], 2)) as i16;
            let sec_e7 = try_field!(self, parse_fixed(&self.line[15..], 11, 7));
            epoch.yyyymmdd = year * 10000 + month * 100 + day;
            epoch.hhmm = hour * 100 + minute;
            epoch.sec_e7 = sec_e7 as i32;
        }
        epoch.n_sats = try_field!(self, parse_uint(&self.line[29..], 3)) as i32;
        if len > 68 && !is_blank(&self.line[68..], 12) {
            let offset = try_field!(self, parse_fixed(&self.line[68..], 12, 9));
            epoch.clock_offset_e12 = offset * 1000;
        }
        self.epoch = epoch;
        Ok(())
    }

    /// RINEX 3.x epoch descriptor:
    /// `"> YYYY MM DD HH MM SS.SSSSSSS  F NNN"`
    fn read_epoch_v3(&mut self, len: usize) -> Result<(), Error> {
        if self.line[0] != b'>' {
            fail!(self, Error::BadFormat);
        }
        let flag = try_field!(self, EpochFlag::from_digit(self.line[31]));
        let mut epoch = Epoch {
            flag,
            ..Default::default()
        };
        if flag.is_event() && is_blank(&self.line[2..], 27) {
            // events may omit the timestamp entirely
        } else {
            let year = try_field!(self, parse_uint(&self.line[2..], 4)) as i32;
            let month = try_field!(self, parse_uint(&self.line[7..], 2)) as i32;
            let day = try_field!(self, parse_uint(&self.line[10..], 2)) as i32;
            let hour = try_field!(self, parse_uint(&self.line[13..], 2)) as i16;
            let minute = try_field!(self, parse_uint(&self.line[16..], 2)) as i16;
            let sec_e7 = try_field!(self, parse_fixed(&self.line[18..], 11, 7));
            epoch.yyyymmdd = year * 10000 + month * 100 + day;
            epoch.hhmm = hour * 100 + minute;
            epoch.sec_e7 = sec_e7 as i32;
        }
        epoch.n_sats = try_field!(self, parse_uint(&self.line[32..], 3)) as i32;
        if len > 41 && !is_blank(&self.line[41..], 15) {
            epoch.clock_offset_e12 = try_field!(self, parse_fixed(&self.line[41..], 15, 12));
        }
        self.epoch = epoch;
        Ok(())
    }

    /// RINEX 2.x body: the satellite list wraps over continuation
    /// lines, then each satellite brings `ceil(n_obs / 5)` data lines
    fn read_observations_v2(&mut self, _len: usize) -> Result<(), Error> {
        let n_sats = self.epoch.n_sats as usize;
        for index in 0..n_sats {
            if index > 0 && index % V2_SATS_PER_LINE == 0 {
                // satellite list continuation line
                match try_field!(self, read_line(&mut self.stream, &mut self.line)) {
                    Some(_) => {},
                    None => fail!(self, Error::BadFormat),
                }
            }
            let start = V2_SAT_LIST + (index % V2_SATS_PER_LINE) * 3;
            let sv = try_field!(self, Sv::from_bytes(&self.line[start..start + 3]));
            self.sats.push(sv);
        }
        for index in 0..n_sats {
            let sv = self.sats[index];
            let n_obs = self.header.n_obs(sv.system);
            if n_obs == 0 {
                fail!(self, Error::BadFormat);
            }
            let base = self.push_presence_entry(sv);
            let n_lines = num_integer::div_ceil(n_obs, V2_FIELDS_PER_LINE);
            let mut code = 0;
            for _ in 0..n_lines {
                let len = match try_field!(self, read_line(&mut self.stream, &mut self.line)) {
                    Some(len) => len,
                    None => fail!(self, Error::BadFormat),
                };
                for field in 0..V2_FIELDS_PER_LINE {
                    if code == n_obs {
                        break;
                    }
                    self.read_field(field * FIELD_WIDTH, len, base, code)?;
                    code += 1;
                }
            }
        }
        Ok(())
    }

    /// RINEX 3.x body: one line per satellite, name then
    /// `n_obs` fields; a short line leaves the rest unobserved
    fn read_observations_v3(&mut self) -> Result<(), Error> {
        let n_sats = self.epoch.n_sats as usize;
        for _ in 0..n_sats {
            let len = match try_field!(self, read_line(&mut self.stream, &mut self.line)) {
                Some(len) => len,
                None => fail!(self, Error::BadFormat),
            };
            let sv = try_field!(self, Sv::from_bytes(&self.line[..3]));
            let n_obs = self.header.n_obs(sv.system);
            if n_obs == 0 {
                fail!(self, Error::BadFormat);
            }
            self.sats.push(sv);
            let base = self.push_presence_entry(sv);
            for code in 0..n_obs {
                let start = 3 + code * FIELD_WIDTH;
                if start >= len {
                    break; // short line: remaining fields unobserved
                }
                self.read_field(start, len, base, code)?;
            }
        }
        Ok(())
    }

    /// Decodes one 16-byte field slot; blank slots clear no bits
    fn read_field(&mut self, start: usize, len: usize, base: usize, code: usize) -> Result<(), Error> {
        if start >= len || is_blank(&self.line[start..], VALUE_WIDTH) {
            return Ok(());
        }
        let value = try_field!(self, parse_fixed(&self.line[start..], VALUE_WIDTH, 3));
        let lli = if start + VALUE_WIDTH < len {
            self.line[start + VALUE_WIDTH]
        } else {
            b' '
        };
        let ssi = if start + VALUE_WIDTH + 1 < len {
            self.line[start + VALUE_WIDTH + 1]
        } else {
            b' '
        };
        self.values.push(value);
        self.lli.push(lli);
        self.ssi.push(ssi);
        self.presence[base + code / 8] |= 1 << (code % 8);
        Ok(())
    }

    /// Appends a satellite header and cleared bitmap to the presence
    /// buffer, returning the bitmap position
    fn push_presence_entry(&mut self, sv: Sv) -> usize {
        self.presence.push(sv.system.letter());
        self.presence.push(sv.prn);
        let base = self.presence.len();
        self.presence
            .resize(base + self.header.bitmap_len(sv.system), 0);
        base
    }

    /// Events copy `n_sats` following lines verbatim
    fn read_event(&mut self) -> Result<(), Error> {
        for _ in 0..self.epoch.n_sats {
            let len = match try_field!(self, read_line(&mut self.stream, &mut self.line)) {
                Some(len) => len,
                None => fail!(self, Error::BadFormat),
            };
            self.event.extend_from_slice(&self.line[..len]);
            self.event.push(b'\n');
        }
        Ok(())
    }
}

/// Iterator over the satellites of an observation record
pub struct Satellites<'a> {
    reader_sats: &'a [Sv],
    presence: &'a [u8],
    header: &'a Header,
    index: usize,
    offset: usize,
}

impl<'a> Iterator for Satellites<'a> {
    /// Satellite and its presence bitmap, one bit per declared
    /// observation code, LSB first
    type Item = (Sv, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let sv = *self.reader_sats.get(self.index)?;
        self.index += 1;
        let width = self.header.bitmap_len(sv.system);
        let bitmap = &self.presence[self.offset + 2..self.offset + 2 + width];
        self.offset += 2 + width;
        Some((sv, bitmap))
    }
}
