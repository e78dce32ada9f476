//! Container reading
use crate::{
    container::{
        blocks::{LITERAL_RUN, ZERO_RUN},
        DigestKind, NumDiff, SpanClock, MAJOR, TAG_EPOC, TAG_EVTF, TAG_RHDR, TAG_SATE, TAG_SDIR,
        TAG_SOCD, TAG_SRNX,
    },
    epoch::{Epoch, EpochFlag},
    header::Header,
    leb128::{read_sleb128, read_uleb128},
    observable::ObsCode,
    observation::{format_event, format_observation, ObsValue, SatRow},
    sv::Sv,
    transpose,
    Error,
};

use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

/// Decoded value ring capacity of a [SignalReader]
const RING: usize = 256;

/// One located chunk
#[derive(Clone, Debug)]
struct ChunkRef {
    tag: [u8; 4],
    /// File offset of the tag
    offset: usize,
    payload: Range<usize>,
}

/// A maximal span of epochs during which a signal was observed:
/// `gap` absent epochs, then `count` present ones
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PresenceRun {
    pub gap: u64,
    pub count: u64,
}

/// One satellite's directory: where its per-code `SOCD` chunks live
/// and at which epochs each code was observed
#[derive(Clone, Debug)]
pub struct SatEntry {
    pub sv: Sv,
    /// File offset of the `SATE` tag; `SOCD` offsets are relative
    /// to it
    offset: usize,
    /// One relative offset per declared code, 0 when never observed
    offsets: Vec<i64>,
    /// Presence runs per observed code
    presence: Vec<Option<Vec<PresenceRun>>>,
}

impl SatEntry {
    /// True if this code was ever observed
    pub fn observed(&self, index: usize) -> bool {
        self.offsets.get(index).map(|&o| o != 0).unwrap_or(false)
    }

    /// Presence runs of one code
    pub fn presence(&self, index: usize) -> Option<&[PresenceRun]> {
        self.presence.get(index)?.as_deref()
    }
}

/// A special event recovered from an `EVTF` chunk
#[derive(Debug)]
pub struct Event<'a> {
    /// Number of observation epochs preceding the event
    pub epoch_index: u64,
    pub epoch: Epoch,
    /// Verbatim, newline terminated body lines
    pub lines: &'a [u8],
}

/// Container reader: validates the `SRNX`/`RHDR` prefix on open,
/// then decodes chunks on demand.
pub struct SocReader {
    data: Vec<u8>,
    chunk_digest: DigestKind,
    file_digest: DigestKind,
    major: u64,
    minor: u64,
    header: Header,
    header_payload: Range<usize>,
    /// Every chunk in file order, `SRNX` first
    chunks: Vec<ChunkRef>,
    /// (satellite, chunk index) for every `SATE`
    sats: Vec<(Sv, usize)>,
    /// Chunk indices of `EVTF` chunks, file order
    events: Vec<usize>,
    event_cursor: usize,
    epochs: Option<Vec<Epoch>>,
}

fn read_frame(data: &[u8], pos: &mut usize, digest: DigestKind) -> Result<ChunkRef, Error> {
    let offset = *pos;
    if data.len() < offset + 4 {
        return Err(Error::Corrupt);
    }
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&data[offset..offset + 4]);
    *pos += 4;
    let len = read_uleb128(data, pos)? as usize;
    let payload = *pos..pos.checked_add(len).ok_or(Error::Corrupt)?;
    let end = payload.end.checked_add(digest.size()).ok_or(Error::Corrupt)?;
    if end > data.len() {
        return Err(Error::Corrupt);
    }
    *pos = end;
    Ok(ChunkRef {
        tag,
        offset,
        payload,
    })
}

impl SocReader {
    /// Opens a container file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Opens an in-memory container
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, Error> {
        // SRNX bootstrap: digest sizes are defined by its payload,
        // so the frame is walked before it can be verified
        let mut pos = 0usize;
        if data.len() < 5 || &data[..4] != TAG_SRNX {
            return Err(Error::Corrupt);
        }
        pos += 4;
        let len = read_uleb128(&data, &mut pos)? as usize;
        let srnx_payload = pos..pos.checked_add(len).ok_or(Error::Corrupt)?;
        if srnx_payload.end > data.len() {
            return Err(Error::Corrupt);
        }
        let payload = &data[srnx_payload.clone()];
        let mut ppos = 0usize;
        let major = read_uleb128(payload, &mut ppos)?;
        let minor = read_uleb128(payload, &mut ppos)?;
        if major != MAJOR {
            return Err(Error::BadMajor);
        }
        let chunk_digest = DigestKind::from_id(read_uleb128(payload, &mut ppos)?)?;
        let file_digest = DigestKind::from_id(read_uleb128(payload, &mut ppos)?)?;
        let sdir_offset = if ppos < payload.len() {
            read_uleb128(payload, &mut ppos)? as usize
        } else {
            0
        };

        let srnx = ChunkRef {
            tag: *TAG_SRNX,
            offset: 0,
            payload: srnx_payload,
        };
        pos = srnx.payload.end + chunk_digest.size();
        if pos > data.len() {
            return Err(Error::Corrupt);
        }

        let rhdr = read_frame(&data, &mut pos, chunk_digest)?;
        if &rhdr.tag != TAG_RHDR {
            return Err(Error::Corrupt);
        }

        let mut reader = Self {
            data,
            chunk_digest,
            file_digest,
            major,
            minor,
            header: Header::default(),
            header_payload: rhdr.payload.clone(),
            chunks: vec![srnx, rhdr],
            sats: Vec::new(),
            events: Vec::new(),
            event_cursor: 0,
            epochs: None,
        };
        reader.verify_chunk(&reader.chunks[0])?;
        reader.verify_chunk(&reader.chunks[1])?;
        reader.header = Header::from_text(&reader.data[reader.header_payload.clone()])
            .map_err(|_| Error::Corrupt)?;

        if sdir_offset != 0 {
            reader.index_from_sdir(sdir_offset, pos)?;
        } else {
            reader.index_by_scan(pos)?;
        }

        // structural rule: nothing but the prefix without an epoch axis
        if reader.find(TAG_EPOC).is_none() {
            for chunk in &reader.chunks {
                if matches!(&chunk.tag, t if t == TAG_EVTF || t == TAG_SATE || t == TAG_SOCD) {
                    return Err(Error::Corrupt);
                }
            }
        }

        for index in 0..reader.chunks.len() {
            let chunk = &reader.chunks[index];
            if &chunk.tag == TAG_SATE {
                let payload = &reader.data[chunk.payload.clone()];
                if payload.len() < 4 {
                    return Err(Error::Corrupt);
                }
                let sv = Sv::from_bytes(&payload[..3]).map_err(|_| Error::Corrupt)?;
                // satellite names are unique within a container
                if reader.sats.iter().any(|(known, _)| *known == sv) {
                    return Err(Error::Corrupt);
                }
                reader.sats.push((sv, index));
            } else if &chunk.tag == TAG_EVTF {
                reader.events.push(index);
            }
        }
        Ok(reader)
    }

    /// Forward scan from the end of `RHDR`: every chunk up to the
    /// trailing file digest
    fn index_by_scan(&mut self, mut pos: usize) -> Result<(), Error> {
        let limit = self
            .data
            .len()
            .checked_sub(self.file_digest.size())
            .ok_or(Error::Corrupt)?;
        while pos < limit {
            let chunk = read_frame(&self.data, &mut pos, self.chunk_digest)?;
            self.chunks.push(chunk);
        }
        if pos != limit {
            return Err(Error::Corrupt);
        }
        Ok(())
    }

    /// Chunk offsets cached in the `SDIR` directory
    fn index_from_sdir(&mut self, sdir_offset: usize, rhdr_end: usize) -> Result<(), Error> {
        let mut pos = sdir_offset;
        let sdir = read_frame(&self.data, &mut pos, self.chunk_digest)?;
        if &sdir.tag != TAG_SDIR || sdir.offset < rhdr_end {
            return Err(Error::Corrupt);
        }
        self.verify_chunk(&sdir)?;
        let entries = self.data[sdir.payload.clone()].to_vec();
        let mut pos = 0usize;
        while pos < entries.len() {
            if entries.len() - pos < 4 {
                return Err(Error::Corrupt);
            }
            let mut tag = [0u8; 4];
            tag.copy_from_slice(&entries[pos..pos + 4]);
            pos += 4;
            let mut offset = read_uleb128(&entries, &mut pos)? as usize;
            let chunk = read_frame(&self.data, &mut offset, self.chunk_digest)?;
            if chunk.tag != tag {
                return Err(Error::Corrupt);
            }
            self.chunks.push(chunk);
        }
        self.chunks.push(sdir);
        Ok(())
    }

    fn find(&self, tag: &[u8; 4]) -> Option<&ChunkRef> {
        self.chunks.iter().find(|chunk| &chunk.tag == tag)
    }

    fn verify_chunk(&self, chunk: &ChunkRef) -> Result<(), Error> {
        if self.chunk_digest == DigestKind::None {
            return Ok(());
        }
        let framed = &self.data[chunk.offset..chunk.payload.end];
        let stored = &self.data[chunk.payload.end..chunk.payload.end + self.chunk_digest.size()];
        if self.chunk_digest.compute(&[framed]) != stored {
            return Err(Error::Corrupt);
        }
        Ok(())
    }

    /// Container revision
    pub fn version(&self) -> (u64, u64) {
        (self.major, self.minor)
    }

    /// Parsed RINEX header recovered from `RHDR`
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Normalized RINEX header text, byte for byte
    pub fn header_text(&self) -> &[u8] {
        &self.data[self.header_payload.clone()]
    }

    /// Satellites present in this container, file order
    pub fn satellites(&self) -> Vec<Sv> {
        self.sats.iter().map(|(sv, _)| *sv).collect()
    }

    /// Validates every chunk digest and the whole-file digest
    pub fn verify(&self) -> Result<(), Error> {
        for chunk in &self.chunks {
            self.verify_chunk(chunk)?;
        }
        if self.file_digest != DigestKind::None {
            let split = self
                .data
                .len()
                .checked_sub(self.file_digest.size())
                .ok_or(Error::Corrupt)?;
            let (body, stored) = self.data.split_at(split);
            if self.file_digest.compute(&[body]) != stored {
                return Err(Error::Corrupt);
            }
        }
        Ok(())
    }

    /// Decodes (and caches) the epoch axis from `EPOC`
    pub fn epochs(&mut self) -> Result<&[Epoch], Error> {
        if self.epochs.is_none() {
            self.epochs = Some(self.decode_epochs()?);
        }
        Ok(self.epochs.as_deref().unwrap_or(&[]))
    }

    fn decode_epochs(&self) -> Result<Vec<Epoch>, Error> {
        let chunk = self.find(TAG_EPOC).ok_or(Error::NoChunk)?;
        self.verify_chunk(chunk)?;
        let payload = &self.data[chunk.payload.clone()];
        let mut pos = 0usize;
        let n_epoch = read_uleb128(payload, &mut pos)? as usize;
        let mut epochs = Vec::with_capacity(n_epoch.min(1 << 20));
        while epochs.len() < n_epoch {
            let interval = read_sleb128(payload, &mut pos)?;
            let count = read_uleb128(payload, &mut pos)? as usize + 1;
            let date = read_uleb128(payload, &mut pos)?;
            let time = read_uleb128(payload, &mut pos)?;
            // negative intervals are whole seconds
            let interval_e7 = if interval < 0 {
                interval
                    .checked_neg()
                    .and_then(|s| s.checked_mul(10_000_000))
                    .ok_or(Error::Corrupt)?
            } else {
                interval
            };
            let first = Epoch::from_soc(date, time);
            let mut clock = SpanClock {
                hours: first.hours(),
                minutes: first.minutes(),
                sec_e7: first.sec_e7 as i64,
            };
            push_monotonic(&mut epochs, first)?;
            for _ in 1..count {
                if epochs.len() == n_epoch {
                    return Err(Error::Corrupt); // span overshoots the axis
                }
                clock.tick(interval_e7);
                if clock.sec_e7 < 0 || clock.sec_e7 > i32::MAX as i64 || clock.hours > 23 {
                    return Err(Error::Corrupt);
                }
                push_monotonic(
                    &mut epochs,
                    Epoch {
                        yyyymmdd: first.yyyymmdd,
                        hhmm: clock.hours * 100 + clock.minutes,
                        sec_e7: clock.sec_e7 as i32,
                        ..Default::default()
                    },
                )?;
            }
        }
        // receiver clock offsets, run length coded, zero tail implied
        let mut cursor = 0usize;
        while pos < payload.len() {
            let value = read_sleb128(payload, &mut pos)?;
            let count = read_uleb128(payload, &mut pos)? as usize + 1;
            if cursor + count > epochs.len() {
                return Err(Error::Corrupt);
            }
            for epoch in &mut epochs[cursor..cursor + count] {
                epoch.clock_offset_e12 = value;
            }
            cursor += count;
        }
        Ok(epochs)
    }

    /// Next `EVTF` event, file order; `None` once exhausted
    pub fn next_event(&mut self) -> Result<Option<Event<'_>>, Error> {
        let index = match self.events.get(self.event_cursor) {
            Some(&index) => index,
            None => return Ok(None),
        };
        self.event_cursor += 1;
        let chunk = self.chunks[index].clone();
        self.verify_chunk(&chunk)?;
        let payload = &self.data[chunk.payload.clone()];
        let mut pos = 0usize;
        let epoch_index = read_uleb128(payload, &mut pos)?;
        if pos >= payload.len() {
            return Err(Error::Corrupt);
        }
        let flag = EpochFlag::from_digit(payload[pos]).map_err(|_| Error::Corrupt)?;
        pos += 1;
        let date = read_uleb128(payload, &mut pos)?;
        let time = read_uleb128(payload, &mut pos)?;
        let n_lines = read_uleb128(payload, &mut pos)?;
        let mut epoch = if date == 0 && time == 0 {
            Epoch::default()
        } else {
            Epoch::from_soc(date, time)
        };
        epoch.flag = flag;
        epoch.n_sats = n_lines as i32;
        Ok(Some(Event {
            epoch_index,
            epoch,
            lines: &self.data[chunk.payload.start + pos..chunk.payload.end],
        }))
    }

    /// Rewinds the event iterator to the first `EVTF`
    pub fn rewind_events(&mut self) {
        self.event_cursor = 0;
    }

    /// Decodes a satellite's `SATE` directory
    pub fn satellite(&self, sv: Sv) -> Result<SatEntry, Error> {
        let &(_, index) = self
            .sats
            .iter()
            .find(|(known, _)| *known == sv)
            .ok_or(Error::UnknownSatellite)?;
        let chunk = &self.chunks[index];
        self.verify_chunk(chunk)?;
        let payload = &self.data[chunk.payload.clone()];
        if payload.len() < 4 || payload[3] != 0 {
            return Err(Error::Corrupt);
        }
        let n_obs = self.header.n_obs(sv.system);
        if n_obs == 0 {
            return Err(Error::Corrupt);
        }
        let mut pos = 4usize;
        let mut offsets = Vec::with_capacity(n_obs);
        for _ in 0..n_obs {
            offsets.push(read_sleb128(payload, &mut pos)?);
        }
        let mut presence = Vec::with_capacity(n_obs);
        for &offset in &offsets {
            if offset == 0 {
                presence.push(None);
                continue;
            }
            let runs = read_uleb128(payload, &mut pos)? as usize + 1;
            let mut list = Vec::with_capacity(runs);
            for _ in 0..runs {
                let gap = read_uleb128(payload, &mut pos)?;
                let count = read_uleb128(payload, &mut pos)? + 1;
                list.push(PresenceRun { gap, count });
            }
            presence.push(Some(list));
        }
        Ok(SatEntry {
            sv,
            offset: chunk.offset,
            offsets,
            presence,
        })
    }

    /// Opens a per-signal value iterator by observation code
    pub fn open_obs(&self, sv: Sv, code: ObsCode) -> Result<SignalReader<'_>, Error> {
        let index = self
            .header
            .code_index(sv.system, code)
            .ok_or(Error::UnknownCode)?;
        self.open_obs_by_index(sv, index)
    }

    /// Opens a per-signal value iterator by code name
    pub fn open_obs_by_name(&self, sv: &str, code: &str) -> Result<SignalReader<'_>, Error> {
        let sv = sv.parse::<Sv>()?;
        let code = code.parse::<ObsCode>().map_err(|_| Error::UnknownCode)?;
        self.open_obs(sv, code)
    }

    /// Opens a per-signal value iterator by declaration index
    pub fn open_obs_by_index(&self, sv: Sv, index: usize) -> Result<SignalReader<'_>, Error> {
        let entry = self.satellite(sv)?;
        if index >= entry.offsets.len() {
            return Err(Error::UnknownCode);
        }
        let rel = entry.offsets[index];
        if rel == 0 {
            return Err(Error::UnknownCode); // declared but never observed
        }
        let offset = entry.offset as i64 + rel;
        if offset < 0 || offset as usize >= self.data.len() {
            return Err(Error::Corrupt);
        }
        let mut pos = offset as usize;
        let chunk = read_frame(&self.data, &mut pos, self.chunk_digest)?;
        if &chunk.tag != TAG_SOCD {
            return Err(Error::Corrupt);
        }
        self.verify_chunk(&chunk)?;
        let code = self.header.codes(sv.system)[index];
        let runs = entry.presence[index].clone().unwrap_or_default();
        SignalReader::open(&self.data[chunk.payload.clone()], sv, code, runs)
    }
}

impl SocReader {
    /// Spreads every signal over the epoch axis: one row per
    /// (epoch, satellite) with a slot per declared code
    fn expand_rows(&self, rows: &mut [Vec<SatRow>]) -> Result<(), Error> {
        for sv in self.satellites() {
            let n_obs = self.header.n_obs(sv.system);
            let entry = self.satellite(sv)?;
            let mut row_at: HashMap<usize, usize> = HashMap::new();
            for index in 0..n_obs {
                if !entry.observed(index) {
                    continue;
                }
                let mut signal = self.open_obs_by_index(sv, index)?;
                let (lli, ssi) = signal.read_indicators()?;
                let runs = signal.runs().to_vec();
                let mut cursor = 0usize;
                let mut epoch = 0usize;
                for run in runs {
                    epoch += run.gap as usize;
                    for _ in 0..run.count {
                        let value = signal.next_value()?.ok_or(Error::Corrupt)?;
                        if epoch >= rows.len() {
                            return Err(Error::Corrupt);
                        }
                        let row = match row_at.get(&epoch) {
                            Some(&row) => row,
                            None => {
                                rows[epoch].push((sv, vec![None; n_obs]));
                                row_at.insert(epoch, rows[epoch].len() - 1);
                                rows[epoch].len() - 1
                            },
                        };
                        rows[epoch][row].1[index] = Some(ObsValue {
                            value,
                            lli: lli[cursor],
                            ssi: ssi[cursor],
                        });
                        cursor += 1;
                        epoch += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Expands the whole container back into RINEX observation
    /// text: the preserved header, then every record in epoch order
    /// with events interleaved where they occurred. Output is
    /// whitespace normalized but tuple exact.
    pub fn expand_to_text<W: Write>(&mut self, mut out: W) -> Result<(), Error> {
        out.write_all(&self.data[self.header_payload.clone()])?;
        let epochs: Vec<Epoch> = match self.epochs() {
            Ok(epochs) => epochs.to_vec(),
            Err(Error::NoChunk) => Vec::new(),
            Err(error) => return Err(error),
        };
        self.rewind_events();
        let mut events: Vec<(u64, Epoch, Vec<u8>)> = Vec::new();
        while let Some(event) = self.next_event()? {
            events.push((event.epoch_index, event.epoch, event.lines.to_vec()));
        }
        let mut rows: Vec<Vec<SatRow>> = vec![Vec::new(); epochs.len()];
        self.expand_rows(&mut rows)?;

        let mut pending = events.into_iter().peekable();
        for (index, epoch) in epochs.iter().enumerate() {
            while pending
                .peek()
                .map(|(at, _, _)| *at as usize <= index)
                .unwrap_or(false)
            {
                let (_, epoch, lines) = pending.next().ok_or(Error::BadState)?;
                format_event(&mut out, &self.header, &epoch, &lines)?;
            }
            let mut epoch = *epoch;
            epoch.n_sats = rows[index].len() as i32;
            format_observation(&mut out, &self.header, &epoch, &rows[index])?;
        }
        for (_, epoch, lines) in pending {
            format_event(&mut out, &self.header, &epoch, &lines)?;
        }
        Ok(())
    }
}

fn push_monotonic(epochs: &mut Vec<Epoch>, epoch: Epoch) -> Result<(), Error> {
    if let Some(last) = epochs.last() {
        if last.timestamp() >= epoch.timestamp() {
            return Err(Error::Corrupt);
        }
    }
    epochs.push(epoch);
    Ok(())
}

#[derive(Copy, Clone, Debug)]
enum Pending {
    None,
    Zeros(u64),
    Literals(u64),
}

/// Streaming decoder over one `SOCD` chunk. Values come back in
/// observation order, already rescaled to the ×1000 integers the
/// text format carries; a fixed ring of decoded values refills from
/// the next residual block on demand.
pub struct SignalReader<'a> {
    payload: &'a [u8],
    pos: usize,
    sv: Sv,
    code: ObsCode,
    n_values: usize,
    /// Values pushed through the kernel so far
    decoded: usize,
    /// Values handed to the caller so far
    produced: usize,
    scale_x1000: i64,
    kernel: NumDiff,
    pending: Pending,
    ring: Box<[i64; RING]>,
    head: usize,
    len: usize,
    lli: &'a [u8],
    ssi: &'a [u8],
    runs: Vec<PresenceRun>,
}

impl<'a> SignalReader<'a> {
    fn open(
        payload: &'a [u8],
        sv: Sv,
        code: ObsCode,
        runs: Vec<PresenceRun>,
    ) -> Result<Self, Error> {
        if payload.len() < 8
            || payload[..3] != sv.to_bytes()
            || payload[3] != 0
            || payload[4..7] != code.as_bytes()[..]
            || payload[7] != 0
        {
            return Err(Error::Corrupt);
        }
        let mut pos = 8usize;
        let n_values = read_uleb128(payload, &mut pos)? as usize + 1;
        let expected: u64 = runs.iter().map(|run| run.count).sum();
        if expected != n_values as u64 {
            return Err(Error::Corrupt);
        }
        let lli_len = read_uleb128(payload, &mut pos)? as usize;
        if pos + lli_len > payload.len() {
            return Err(Error::Corrupt);
        }
        let lli = &payload[pos..pos + lli_len];
        pos += lli_len;
        let ssi_len = read_uleb128(payload, &mut pos)? as usize;
        if pos + ssi_len > payload.len() {
            return Err(Error::Corrupt);
        }
        let ssi = &payload[pos..pos + ssi_len];
        pos += ssi_len;

        let schema = read_uleb128(payload, &mut pos)?;
        if schema > 15 {
            return Err(Error::Corrupt);
        }
        let order = (schema & 7) as usize;
        let scale_x1000 = if schema >= 8 {
            let scale = read_uleb128(payload, &mut pos)? as i64;
            if scale == 0 {
                return Err(Error::Corrupt);
            }
            scale
        } else {
            1000
        };
        let mut reader = Self {
            payload,
            pos,
            sv,
            code,
            n_values,
            decoded: 0,
            produced: 0,
            scale_x1000,
            kernel: NumDiff::new(order),
            pending: Pending::None,
            ring: Box::new([0; RING]),
            head: 0,
            len: 0,
            lli,
            ssi,
            runs,
        };
        // the initial state seeds the ramp and already yields values
        for _ in 0..order {
            let raw = read_sleb128(payload, &mut reader.pos)?;
            reader.push(raw);
        }
        Ok(reader)
    }

    pub fn sv(&self) -> Sv {
        self.sv
    }

    pub fn code(&self) -> ObsCode {
        self.code
    }

    /// Total values this signal carries
    pub fn n_values(&self) -> usize {
        self.n_values
    }

    /// Effective scale times 1000 (1000 when no scale was stored)
    pub fn scale_x1000(&self) -> i64 {
        self.scale_x1000
    }

    /// Epoch spans at which this signal was observed
    pub fn runs(&self) -> &[PresenceRun] {
        &self.runs
    }

    fn push(&mut self, raw: i64) {
        if self.decoded == self.n_values {
            return; // blocks may carry residuals past the axis
        }
        let value = self.kernel.decompress(raw);
        self.ring[self.len] = value.wrapping_mul(self.scale_x1000) / 1000;
        self.len += 1;
        self.decoded += 1;
    }

    fn refill(&mut self) -> Result<(), Error> {
        self.head = 0;
        self.len = 0;
        while self.len == 0 {
            match self.pending {
                Pending::Zeros(remaining) => {
                    let room = (RING - self.len).min(self.n_values - self.decoded);
                    let take = (remaining as usize).min(room);
                    for _ in 0..take {
                        self.push(0);
                    }
                    let left = remaining - take as u64;
                    // residuals past the axis are never materialized
                    self.pending = if left == 0 || self.decoded == self.n_values {
                        Pending::None
                    } else {
                        Pending::Zeros(left)
                    };
                },
                Pending::Literals(remaining) => {
                    let room = (RING - self.len).min(self.n_values - self.decoded);
                    let take = (remaining as usize).min(room);
                    for _ in 0..take {
                        let raw = read_sleb128(self.payload, &mut self.pos)?;
                        self.push(raw);
                    }
                    let left = remaining - take as u64;
                    self.pending = if left == 0 || self.decoded == self.n_values {
                        Pending::None
                    } else {
                        Pending::Literals(left)
                    };
                },
                Pending::None => {
                    if self.pos >= self.payload.len() {
                        return Err(Error::Corrupt); // axis not covered
                    }
                    let header = self.payload[self.pos];
                    self.pos += 1;
                    match header {
                        ZERO_RUN => {
                            let count = read_uleb128(self.payload, &mut self.pos)? + 1;
                            self.pending = Pending::Zeros(count);
                        },
                        LITERAL_RUN => {
                            let count = read_uleb128(self.payload, &mut self.pos)? + 1;
                            self.pending = Pending::Literals(count);
                        },
                        header if header >> 5 <= 2 => {
                            let count = 8usize << (header >> 5);
                            let bits = (header & 0x1f) as usize + 1;
                            let size = count * bits / 8;
                            if self.pos + size > self.payload.len() {
                                return Err(Error::Corrupt);
                            }
                            let mut columns = [0i64; 32];
                            transpose::transpose(
                                &self.payload[self.pos..self.pos + size],
                                count,
                                bits,
                                &mut columns,
                            );
                            self.pos += size;
                            for &column in columns.iter().take(count) {
                                self.push(column);
                            }
                        },
                        _ => return Err(Error::Corrupt), // reserved header
                    }
                },
            }
        }
        Ok(())
    }

    /// Next decoded value, `None` once the signal is exhausted
    pub fn next_value(&mut self) -> Result<Option<i64>, Error> {
        if self.produced == self.n_values {
            return Ok(None);
        }
        if self.head == self.len {
            self.refill()?;
        }
        let value = self.ring[self.head];
        self.head += 1;
        self.produced += 1;
        Ok(Some(value))
    }

    /// Decodes both indicator sequences, `n_values` bytes each;
    /// runs beyond the stored prefix are spaces
    pub fn read_indicators(&self) -> Result<(Vec<u8>, Vec<u8>), Error> {
        Ok((
            decode_indicator_rle(self.lli, self.n_values)?,
            decode_indicator_rle(self.ssi, self.n_values)?,
        ))
    }
}

fn decode_indicator_rle(block: &[u8], n_values: usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(n_values);
    let mut pos = 0usize;
    while pos < block.len() {
        let indicator = block[pos];
        pos += 1;
        let count = read_uleb128(block, &mut pos)? as usize + 1;
        if out.len() + count > n_values {
            return Err(Error::Corrupt);
        }
        out.extend(std::iter::repeat(indicator).take(count));
    }
    out.resize(n_values, b' ');
    Ok(out)
}
