//! Observation record formatting, the inverse of the reader.
//!
//! Output is whitespace normalized: trailing blanks are trimmed and
//! numbers print in their canonical form, but every
//! (epoch, satellite, code, value, LLI, SSI) tuple of the source
//! round-trips exactly.
use crate::{
    epoch::Epoch,
    header::Header,
    observation::{ObsValue, V2_FIELDS_PER_LINE, V2_SATS_PER_LINE},
    sv::Sv,
};

use std::io::{self, Write};

/// One satellite row of a record: the vehicle and one slot per
/// declared observation code, in declaration order
pub type SatRow = (Sv, Vec<Option<ObsValue>>);

/// F14.3 slot
fn push_value(line: &mut String, obs: &ObsValue) {
    let int = obs.value / 1000;
    let frac = (obs.value % 1000).abs();
    let body = if obs.value < 0 && int == 0 {
        format!("-0.{:03}", frac)
    } else {
        format!("{}.{:03}", int, frac)
    };
    line.push_str(&format!("{:>14}", body));
    line.push(obs.lli as char);
    line.push(obs.ssi as char);
}

/// F11.7 seconds-in-minute
fn seconds(sec_e7: i32) -> String {
    format!(
        "{:>11}",
        format!("{}.{:07}", sec_e7 / 10_000_000, sec_e7 % 10_000_000)
    )
}

/// Signed fixed-point with `frac` decimals, from a value scaled by
/// `10^frac`
fn fixed(value: i64, frac: usize) -> String {
    let base = 10_i64.pow(frac as u32);
    let int = value / base;
    let digits = (value % base).abs();
    if value < 0 && int == 0 {
        format!("-0.{:0frac$}", digits)
    } else {
        format!("{}.{:0frac$}", int, digits)
    }
}

fn epoch_descriptor_v2(epoch: &Epoch) -> String {
    if epoch.yyyymmdd == 0 {
        // timestamp-less event
        return format!("{:28}{}{:>3}", "", epoch.flag, epoch.n_sats);
    }
    format!(
        " {:02} {:>2} {:>2} {:>2} {:>2}{}  {}{:>3}",
        epoch.yyyymmdd / 10000 % 100,
        epoch.yyyymmdd / 100 % 100,
        epoch.yyyymmdd % 100,
        epoch.hours(),
        epoch.minutes(),
        seconds(epoch.sec_e7),
        epoch.flag,
        epoch.n_sats,
    )
}

fn epoch_descriptor_v3(epoch: &Epoch) -> String {
    if epoch.yyyymmdd == 0 {
        return format!(">{:30}{}{:>3}", "", epoch.flag, epoch.n_sats);
    }
    format!(
        "> {:04} {:02} {:02} {:02} {:02}{}{:>3}{:>3}",
        epoch.yyyymmdd / 10000,
        epoch.yyyymmdd / 100 % 100,
        epoch.yyyymmdd % 100,
        epoch.hours(),
        epoch.minutes(),
        seconds(epoch.sec_e7),
        epoch.flag,
        epoch.n_sats,
    )
}

/// Formats one observation record in the revision of `header`.
/// `sats` carries one slot per declared code of each satellite's
/// system; `epoch.n_sats` should equal `sats.len()`.
pub fn format_observation<W: Write>(
    w: &mut W,
    header: &Header,
    epoch: &Epoch,
    sats: &[SatRow],
) -> io::Result<()> {
    if header.version.major == 2 {
        format_observation_v2(w, epoch, sats)
    } else {
        format_observation_v3(w, epoch, sats)
    }
}

fn format_observation_v2<W: Write>(w: &mut W, epoch: &Epoch, sats: &[SatRow]) -> io::Result<()> {
    let mut line = epoch_descriptor_v2(epoch);
    for (index, (sv, _)) in sats.iter().enumerate() {
        if index > 0 && index % V2_SATS_PER_LINE == 0 {
            writeln!(w, "{}", line.trim_end())?;
            line = format!("{:32}", "");
        }
        line.push_str(std::str::from_utf8(&sv.to_bytes()).unwrap_or("???"));
    }
    if epoch.clock_offset_e12 != 0 && sats.len() <= V2_SATS_PER_LINE {
        while line.len() < 68 {
            line.push(' ');
        }
        line.push_str(&format!("{:>12}", fixed(epoch.clock_offset_e12 / 1000, 9)));
    }
    writeln!(w, "{}", line.trim_end())?;

    for (_, slots) in sats {
        for chunk in slots.chunks(V2_FIELDS_PER_LINE) {
            let mut line = String::with_capacity(80);
            for slot in chunk {
                match slot {
                    Some(obs) => push_value(&mut line, obs),
                    None => line.push_str(&format!("{:16}", "")),
                }
            }
            writeln!(w, "{}", line.trim_end())?;
        }
    }
    Ok(())
}

fn format_observation_v3<W: Write>(w: &mut W, epoch: &Epoch, sats: &[SatRow]) -> io::Result<()> {
    let mut line = epoch_descriptor_v3(epoch);
    if epoch.clock_offset_e12 != 0 {
        while line.len() < 41 {
            line.push(' ');
        }
        line.push_str(&format!("{:>15}", fixed(epoch.clock_offset_e12, 12)));
    }
    writeln!(w, "{}", line.trim_end())?;

    for (sv, slots) in sats {
        let mut line = String::with_capacity(80);
        line.push_str(std::str::from_utf8(&sv.to_bytes()).unwrap_or("???"));
        for slot in slots {
            match slot {
                Some(obs) => push_value(&mut line, obs),
                None => line.push_str(&format!("{:16}", "")),
            }
        }
        writeln!(w, "{}", line.trim_end())?;
    }
    Ok(())
}

/// Formats an event record: the descriptor line and the verbatim,
/// newline terminated body
pub fn format_event<W: Write>(
    w: &mut W,
    header: &Header,
    epoch: &Epoch,
    lines: &[u8],
) -> io::Result<()> {
    let descriptor = if header.version.major == 2 {
        epoch_descriptor_v2(epoch)
    } else {
        epoch_descriptor_v3(epoch)
    };
    writeln!(w, "{}", descriptor.trim_end())?;
    w.write_all(lines)
}
