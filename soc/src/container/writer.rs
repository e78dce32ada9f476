//! Container writing
use crate::{
    epoch::Epoch,
    header::Header,
    leb128::{sleb128_len, uleb128_len, write_sleb128, write_uleb128, write_uleb128_padded},
    observable::ObsCode,
    observation::ObsReader,
    container::{
        blocks, DigestKind, DigestState, NumDiff, SpanClock, MAJOR, MINOR, SDIR_SLOT, TAG_EPOC,
        TAG_EVTF, TAG_RHDR, TAG_SATE, TAG_SDIR, TAG_SOCD, TAG_SRNX,
    },
    stream::Stream,
    sv::Sv,
    Error,
};

use itertools::Itertools;
use num_integer::gcd;
use std::io::Write;

#[cfg(feature = "log")]
use log::debug;

/// Per-signal pre-reservation: one day of 30 second epochs
const PRE_RESERVE: usize = 2880;

/// Highest delta order the selector tries
const MAX_SELECTED_ORDER: usize = 5;

/// Satellite slots: 32 system slots times two PRN digits
const SAT_SLOTS: usize = 32 * 100;

#[derive(Debug)]
struct SignalAcc {
    /// (first epoch index, count) presence spans
    runs: Vec<(u64, u64)>,
    values: Vec<i64>,
    lli: Vec<u8>,
    ssi: Vec<u8>,
}

impl SignalAcc {
    fn new() -> Self {
        Self {
            runs: Vec::new(),
            values: Vec::with_capacity(PRE_RESERVE),
            lli: Vec::with_capacity(PRE_RESERVE),
            ssi: Vec::with_capacity(PRE_RESERVE),
        }
    }
}

#[derive(Debug)]
struct SatAcc {
    sv: Sv,
    signals: Vec<Option<SignalAcc>>,
}

#[derive(Debug)]
struct EventAcc {
    epoch: Epoch,
    epoch_index: u64,
    lines: Vec<u8>,
}

/// Accumulating container writer. Records are fed one epoch at a
/// time; [SocWriter::write_to] lays out and emits every chunk in a
/// single pass. The writer is deterministic: feeding it a decoded
/// container reproduces the original bytes.
pub struct SocWriter {
    header: Header,
    chunk_digest: DigestKind,
    file_digest: DigestKind,
    epochs: Vec<Epoch>,
    events: Vec<EventAcc>,
    /// Radix satellite index: system slot then PRN
    table: Vec<Option<Box<SatAcc>>>,
    /// Table slots in first-appearance order
    order: Vec<usize>,
}

impl SocWriter {
    /// Builds a writer for observation data described by `header`.
    /// Both digests default to CRC32C.
    pub fn new(header: Header) -> Self {
        let mut table = Vec::with_capacity(SAT_SLOTS);
        table.resize_with(SAT_SLOTS, || None);
        Self {
            header,
            chunk_digest: DigestKind::Crc32c,
            file_digest: DigestKind::Crc32c,
            epochs: Vec::new(),
            events: Vec::new(),
            table,
            order: Vec::new(),
        }
    }

    /// Customizes the chunk and file digest algorithms
    pub fn with_digests(mut self, chunk: DigestKind, file: DigestKind) -> Self {
        self.chunk_digest = chunk;
        self.file_digest = file;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Observation epochs accumulated so far
    pub fn n_epochs(&self) -> usize {
        self.epochs.len()
    }

    /// Starts a new observation epoch. Timestamps must be strictly
    /// increasing.
    pub fn add_epoch(&mut self, epoch: Epoch) -> Result<(), Error> {
        if epoch.flag.is_event() {
            return Err(Error::BadState);
        }
        if let Some(last) = self.epochs.last() {
            if last.timestamp() >= epoch.timestamp() {
                return Err(Error::BadFormat);
            }
        }
        self.epochs.push(epoch);
        Ok(())
    }

    /// Records one observed value at the current (last added) epoch
    pub fn add_signal(
        &mut self,
        sv: Sv,
        code_index: usize,
        value: i64,
        lli: u8,
        ssi: u8,
    ) -> Result<(), Error> {
        if self.epochs.is_empty() {
            return Err(Error::BadState);
        }
        if sv.prn > 99 {
            return Err(Error::UnknownSatellite);
        }
        let n_obs = self.header.n_obs(sv.system);
        if n_obs == 0 {
            return Err(Error::UnknownSystem);
        }
        if code_index >= n_obs {
            return Err(Error::UnknownCode);
        }
        let slot = sv.system.index() * 100 + sv.prn as usize;
        if self.table[slot].is_none() {
            let mut signals = Vec::with_capacity(n_obs);
            signals.resize_with(n_obs, || None);
            self.table[slot] = Some(Box::new(SatAcc { sv, signals }));
            self.order.push(slot);
        }
        let sat = self.table[slot].as_mut().ok_or(Error::BadState)?;
        let signal = sat.signals[code_index].get_or_insert_with(SignalAcc::new);
        let index = self.epochs.len() as u64 - 1;
        match signal.runs.last_mut() {
            Some((first, count)) if *first + *count == index => *count += 1,
            Some((first, count)) if *first + *count > index => return Err(Error::BadState),
            _ => signal.runs.push((index, 1)),
        }
        signal.values.push(value);
        signal.lli.push(lli);
        signal.ssi.push(ssi);
        Ok(())
    }

    /// Records a special event after the current epoch
    pub fn add_event(&mut self, epoch: Epoch, lines: &[u8]) {
        self.events.push(EventAcc {
            epoch,
            epoch_index: self.epochs.len() as u64,
            lines: lines.to_vec(),
        });
    }

    /// Feeds the last record delivered by an [ObsReader]
    pub fn add_record<S: Stream>(&mut self, reader: &ObsReader<S>) -> Result<(), Error> {
        let epoch = *reader.epoch();
        if epoch.flag.is_event() {
            self.add_event(epoch, reader.event_lines());
            return Ok(());
        }
        self.add_epoch(epoch)?;
        let mut cursor = 0usize;
        for (sv, bitmap) in reader.satellites() {
            let n_obs = self.header.n_obs(sv.system);
            for code in 0..n_obs {
                if bitmap[code / 8] >> (code % 8) & 1 != 0 {
                    self.add_signal(
                        sv,
                        code,
                        reader.values()[cursor],
                        reader.lli()[cursor],
                        reader.ssi()[cursor],
                    )?;
                    cursor += 1;
                }
            }
        }
        Ok(())
    }

    /// Frames a chunk: tag, length, payload, digest
    fn frame(&self, tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 10 + payload.len() + self.chunk_digest.size());
        out.extend_from_slice(tag);
        write_uleb128(&mut out, payload.len() as u64);
        out.extend_from_slice(payload);
        let digest = self.chunk_digest.compute(&[&out]);
        out.extend_from_slice(&digest);
        out
    }

    /// Lays out and writes the whole container, returning the byte
    /// count. The writer state is untouched: emission is repeatable.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<u64, Error> {
        let mut body: Vec<([u8; 4], Vec<u8>)> = Vec::new();

        let have_content = !self.epochs.is_empty()
            || !self.events.is_empty()
            || !self.order.is_empty();
        if have_content {
            body.push((*TAG_EPOC, self.frame(TAG_EPOC, &self.epoc_payload())));
            for event in &self.events {
                body.push((*TAG_EVTF, self.frame(TAG_EVTF, &event_payload(event))));
            }
        }
        for &slot in &self.order {
            let sat = match self.table[slot].as_deref() {
                Some(sat) => sat,
                None => continue,
            };
            self.sat_group(sat, &mut body);
        }

        let srnx_frame_len = 4 + 1 + 12 + self.chunk_digest.size();
        let rhdr = self.frame(TAG_RHDR, self.header.text.as_bytes());
        let body_len: usize = body.iter().map(|(_, frame)| frame.len()).sum();

        let sdir = if body.is_empty() {
            None
        } else {
            let mut payload = Vec::new();
            let mut offset = srnx_frame_len + rhdr.len();
            for (tag, frame) in &body {
                payload.extend_from_slice(tag);
                write_uleb128(&mut payload, offset as u64);
                offset += frame.len();
            }
            Some(self.frame(TAG_SDIR, &payload))
        };
        let sdir_offset = if sdir.is_some() {
            (srnx_frame_len + rhdr.len() + body_len) as u64
        } else {
            0
        };

        let mut srnx_payload = Vec::with_capacity(12);
        write_uleb128(&mut srnx_payload, MAJOR);
        write_uleb128(&mut srnx_payload, MINOR);
        write_uleb128(&mut srnx_payload, self.chunk_digest.id());
        write_uleb128(&mut srnx_payload, self.file_digest.id());
        write_uleb128_padded(&mut srnx_payload, sdir_offset, SDIR_SLOT);
        let srnx = self.frame(TAG_SRNX, &srnx_payload);
        debug_assert_eq!(srnx.len(), srnx_frame_len);

        let mut digest = DigestState::new(self.file_digest);
        let mut written = 0u64;
        for frame in std::iter::once(&srnx)
            .chain(std::iter::once(&rhdr))
            .chain(body.iter().map(|(_, frame)| frame))
            .chain(sdir.iter())
        {
            out.write_all(frame)?;
            digest.update(frame);
            written += frame.len() as u64;
        }
        let tail = digest.finish();
        out.write_all(&tail)?;
        written += tail.len() as u64;

        #[cfg(feature = "log")]
        debug!("container: {} bytes, {} epochs", written, self.epochs.len());

        Ok(written)
    }

    /// `EPOC`: epoch spans then clock-offset runs
    fn epoc_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let n = self.epochs.len();
        write_uleb128(&mut out, n as u64);
        let mut i = 0usize;
        while i < n {
            let first = self.epochs[i];
            let mut count = 1usize;
            let mut interval_e7 = 0i64;
            if i + 1 < n && self.epochs[i + 1].yyyymmdd == first.yyyymmdd {
                let delta = abs_e7(&self.epochs[i + 1]) - abs_e7(&first);
                if delta > 0 {
                    let mut clock = SpanClock {
                        hours: first.hours(),
                        minutes: first.minutes(),
                        sec_e7: first.sec_e7 as i64,
                    };
                    let mut j = i + 1;
                    // extend while replaying the tick rule lands
                    // exactly on the next stored epoch
                    while j < n && self.epochs[j].yyyymmdd == first.yyyymmdd {
                        let mut probe = clock;
                        probe.tick(delta);
                        let target = &self.epochs[j];
                        if probe.hours == target.hours()
                            && probe.minutes == target.minutes()
                            && probe.sec_e7 == target.sec_e7 as i64
                        {
                            clock = probe;
                            count += 1;
                            j += 1;
                        } else {
                            break;
                        }
                    }
                    if count > 1 {
                        interval_e7 = delta;
                    }
                }
            }
            let interval = if count == 1 {
                0
            } else if interval_e7 % 10_000_000 == 0 {
                // whole seconds go negative
                -(interval_e7 / 10_000_000)
            } else {
                interval_e7
            };
            write_sleb128(&mut out, interval);
            write_uleb128(&mut out, count as u64 - 1);
            write_uleb128(&mut out, first.soc_date());
            write_uleb128(&mut out, first.soc_time());
            i += count;
        }
        // clock offsets: run length coded, trailing zeros implied
        let mut i = 0usize;
        while i < n {
            let value = self.epochs[i].clock_offset_e12;
            let mut j = i;
            while j < n && self.epochs[j].clock_offset_e12 == value {
                j += 1;
            }
            if value == 0 && j == n {
                break;
            }
            write_sleb128(&mut out, value);
            write_uleb128(&mut out, (j - i) as u64 - 1);
            i = j;
        }
        out
    }

    /// Emits one satellite's `SOCD` chunks then its `SATE`
    /// directory; `SOCD` offsets are relative to the `SATE` tag,
    /// negative because the directory comes last
    fn sat_group(&self, sat: &SatAcc, body: &mut Vec<([u8; 4], Vec<u8>)>) {
        let codes = self.header.codes(sat.sv.system);
        let mut socd: Vec<(usize, Vec<u8>)> = Vec::new();
        for (index, signal) in sat.signals.iter().enumerate() {
            if let Some(acc) = signal {
                let payload = socd_payload(sat.sv, codes[index], acc);
                socd.push((index, self.frame(TAG_SOCD, &payload)));
            }
        }
        let total: usize = socd.iter().map(|(_, frame)| frame.len()).sum();
        let mut rel = vec![0i64; sat.signals.len()];
        let mut ahead = total as i64;
        for (index, frame) in &socd {
            rel[*index] = -ahead;
            ahead -= frame.len() as i64;
        }

        let mut payload = Vec::new();
        payload.extend_from_slice(&sat.sv.to_bytes());
        payload.push(0);
        for &offset in &rel {
            write_sleb128(&mut payload, offset);
        }
        for signal in sat.signals.iter().flatten() {
            write_uleb128(&mut payload, signal.runs.len() as u64 - 1);
            let mut prev_end = 0u64;
            for &(first, count) in &signal.runs {
                write_uleb128(&mut payload, first - prev_end);
                write_uleb128(&mut payload, count - 1);
                prev_end = first + count;
            }
        }

        for (_, frame) in socd {
            body.push((*TAG_SOCD, frame));
        }
        body.push((*TAG_SATE, self.frame(TAG_SATE, &payload)));
    }
}

/// Absolute intra-day timestamp, seconds times 10^7
fn abs_e7(epoch: &Epoch) -> i64 {
    ((epoch.hours() as i64 * 60 + epoch.minutes() as i64) * 60) * 10_000_000 + epoch.sec_e7 as i64
}

fn event_payload(event: &EventAcc) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + event.lines.len());
    write_uleb128(&mut out, event.epoch_index);
    out.push(event.epoch.flag.digit());
    if event.epoch.yyyymmdd == 0 {
        write_uleb128(&mut out, 0);
        write_uleb128(&mut out, 0);
    } else {
        write_uleb128(&mut out, event.epoch.soc_date());
        write_uleb128(&mut out, event.epoch.soc_time());
    }
    let n_lines = event.lines.iter().filter(|&&b| b == b'\n').count();
    write_uleb128(&mut out, n_lines as u64);
    out.extend_from_slice(&event.lines);
    out
}

fn socd_payload(sv: Sv, code: ObsCode, acc: &SignalAcc) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&sv.to_bytes());
    out.push(0);
    out.extend_from_slice(code.as_bytes());
    out.push(0);
    write_uleb128(&mut out, acc.values.len() as u64 - 1);
    indicator_block(&mut out, &acc.lli);
    indicator_block(&mut out, &acc.ssi);
    data_block(&mut out, &acc.values);
    out
}

/// Run length coded indicator bytes, trailing blank runs dropped
fn indicator_block(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut pairs: Vec<(u8, u64)> = Vec::new();
    for (indicator, group) in &bytes.iter().chunk_by(|&&b| b) {
        pairs.push((indicator, group.count() as u64));
    }
    if let Some(&(indicator, _)) = pairs.last() {
        if indicator == b' ' {
            pairs.pop();
        }
    }
    let mut encoded = Vec::new();
    for (indicator, count) in pairs {
        encoded.push(indicator);
        write_uleb128(&mut encoded, count - 1);
    }
    write_uleb128(out, encoded.len() as u64);
    out.extend_from_slice(&encoded);
}

/// Scale selection, delta order selection and residual blocks
fn data_block(out: &mut Vec<u8>, values: &[i64]) {
    let mut divisor = 0u64;
    for &value in values {
        divisor = gcd(divisor, value.unsigned_abs());
    }
    if divisor == 0 {
        divisor = 1;
    }
    let scaled: Vec<i64> = values.iter().map(|&v| v / divisor as i64).collect();
    let scale_cost = if divisor > 1 {
        uleb128_len(divisor * 1000)
    } else {
        0
    };

    let mut best: Option<(usize, usize, Vec<i64>, Vec<blocks::Block>)> = None;
    for order in 0..=MAX_SELECTED_ORDER.min(scaled.len()) {
        let mut kernel = NumDiff::new(order);
        let stream: Vec<i64> = scaled.iter().map(|&v| kernel.compress(v)).collect();
        let schema = order as u64 + if divisor > 1 { 8 } else { 0 };
        let plan = blocks::plan(&stream[order..]);
        let mut cost = uleb128_len(schema) + scale_cost;
        cost += stream[..order].iter().map(|&v| sleb128_len(v)).sum::<usize>();
        cost += blocks::encoded_len(&stream[order..], &plan);
        // ties keep the lowest order
        if best.as_ref().map(|(c, ..)| cost < *c).unwrap_or(true) {
            best = Some((cost, order, stream, plan));
        }
    }
    let (_, order, stream, plan) = match best {
        Some(best) => best,
        None => return,
    };

    let schema = order as u64 + if divisor > 1 { 8 } else { 0 };
    write_uleb128(out, schema);
    if divisor > 1 {
        write_uleb128(out, divisor * 1000);
    }
    for &value in &stream[..order] {
        write_sleb128(out, value);
    }
    blocks::emit(&stream[order..], &plan, out);
}
