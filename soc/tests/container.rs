//! Handcrafted container decoding
//!
//! These containers are assembled byte by byte (digests disabled,
//! so frames are just tag, length, payload) to pin the chunk wire
//! formats independently of the writer.
use soc::leb128::{write_sleb128, write_uleb128, write_uleb128_padded};
use soc::prelude::*;
use soc::{obscode, sv};

const MINIMAL_HEADER: &str = "\
     2.11           OBSERVATION DATA    G (GPS)             RINEX VERSION / TYPE
     1    C1                                                # / TYPES OF OBSERV
                                                            END OF HEADER
";

fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + payload.len());
    out.extend_from_slice(tag);
    write_uleb128(&mut out, payload.len() as u64);
    out.extend_from_slice(payload);
    out
}

/// `SRNX` + `RHDR` prefix without digests
fn prefix() -> Vec<u8> {
    let mut srnx = Vec::new();
    write_uleb128(&mut srnx, 1); // major
    write_uleb128(&mut srnx, 0); // minor
    write_uleb128(&mut srnx, 0); // no chunk digests
    write_uleb128(&mut srnx, 0); // no file digest
    write_uleb128_padded(&mut srnx, 0, 8); // no directory
    let mut out = chunk(b"SRNX", &srnx);
    out.extend_from_slice(&chunk(b"RHDR", MINIMAL_HEADER.as_bytes()));
    out
}

fn epoc_span(n: u64, interval: i64, count_minus_1: u64, date: u64, time: u64) -> Vec<u8> {
    let mut payload = Vec::new();
    write_uleb128(&mut payload, n);
    write_sleb128(&mut payload, interval);
    write_uleb128(&mut payload, count_minus_1);
    write_uleb128(&mut payload, date);
    write_uleb128(&mut payload, time);
    chunk(b"EPOC", &payload)
}

/// One satellite, one code: `SOCD` then its `SATE` directory with a
/// backward relative offset
fn signal_chunks(socd_payload: &[u8], runs: &[(u64, u64)]) -> Vec<u8> {
    let socd = chunk(b"SOCD", socd_payload);
    let mut sate = Vec::new();
    sate.extend_from_slice(b"G05\0");
    write_sleb128(&mut sate, -(socd.len() as i64));
    write_uleb128(&mut sate, runs.len() as u64 - 1);
    for &(gap, count) in runs {
        write_uleb128(&mut sate, gap);
        write_uleb128(&mut sate, count - 1);
    }
    let mut out = socd;
    out.extend_from_slice(&chunk(b"SATE", &sate));
    out
}

#[test]
fn epoch_span_expansion() {
    // 3 epochs, 30 s apart in 10^-7 s units: the last tick crosses
    // the minute and resets the second
    let mut bytes = prefix();
    bytes.extend_from_slice(&epoc_span(3, 300_000_000, 2, 20200101, 1_200_000_000_000));
    let mut container = SocReader::from_bytes(bytes).unwrap();
    let epochs = container.epochs().unwrap();
    assert_eq!(epochs.len(), 3);
    for epoch in epochs {
        assert_eq!(epoch.yyyymmdd, 20200101);
    }
    assert_eq!(
        epochs.iter().map(|e| (e.hhmm, e.sec_e7)).collect::<Vec<_>>(),
        vec![(1200, 0), (1200, 300_000_000), (1201, 0)]
    );
}

#[test]
fn whole_second_interval_is_negative() {
    let mut bytes = prefix();
    bytes.extend_from_slice(&epoc_span(3, -30, 2, 20200101, 1_200_000_000_000));
    let mut container = SocReader::from_bytes(bytes).unwrap();
    let epochs = container.epochs().unwrap();
    assert_eq!(
        epochs.iter().map(|e| (e.hhmm, e.sec_e7)).collect::<Vec<_>>(),
        vec![(1200, 0), (1200, 300_000_000), (1201, 0)]
    );
}

#[test]
fn zero_run_block_with_initial_state() {
    // schema 1: order-1 deltas, implicit scale; the initial state
    // seeds 1000 and five zero residuals hold it flat. The run is
    // allowed to overshoot the axis; excess residuals are ignored.
    let mut socd = Vec::new();
    socd.extend_from_slice(b"G05\0C1\0\0");
    write_uleb128(&mut socd, 4); // n_values - 1
    write_uleb128(&mut socd, 0); // empty LLI block
    write_uleb128(&mut socd, 0); // empty SSI block
    write_uleb128(&mut socd, 1); // schema: order 1
    write_sleb128(&mut socd, 1000); // initial state
    socd.push(0xfe);
    write_uleb128(&mut socd, 4); // five zero residuals

    let mut bytes = prefix();
    bytes.extend_from_slice(&epoc_span(5, -30, 4, 20200101, 1_200_000_000_000));
    bytes.extend_from_slice(&signal_chunks(&socd, &[(0, 5)]));

    let container = SocReader::from_bytes(bytes).unwrap();
    let mut signal = container.open_obs(sv!("G05"), obscode!("C1")).unwrap();
    assert_eq!(signal.scale_x1000(), 1000);
    let mut values = Vec::new();
    while let Some(value) = signal.next_value().unwrap() {
        values.push(value);
    }
    assert_eq!(values, vec![1000; 5]);
    let (lli, ssi) = signal.read_indicators().unwrap();
    assert_eq!(lli, vec![b' '; 5]);
    assert_eq!(ssi, vec![b' '; 5]);
}

#[test]
fn matrix_block_with_scale() {
    // schema 9: order 1 with explicit scale 2000/1000; one 8x1-bit
    // matrix of 0xff supplies eight -1 residuals, so the integrator
    // walks down from 0 in steps of one, scaled by two
    let mut socd = Vec::new();
    socd.extend_from_slice(b"G05\0C1\0\0");
    write_uleb128(&mut socd, 8); // n_values - 1
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 9); // schema: order 1 + scale
    write_uleb128(&mut socd, 2000); // scale x1000
    write_sleb128(&mut socd, 0); // initial state
    socd.push(0x00); // 8 columns, 1 bit
    socd.push(0xff);

    let mut bytes = prefix();
    bytes.extend_from_slice(&epoc_span(9, -30, 8, 20200101, 1_200_000_000_000));
    bytes.extend_from_slice(&signal_chunks(&socd, &[(0, 9)]));

    let container = SocReader::from_bytes(bytes).unwrap();
    let mut signal = container.open_obs(sv!("G05"), obscode!("C1")).unwrap();
    assert_eq!(signal.scale_x1000(), 2000);
    let mut values = Vec::new();
    while let Some(value) = signal.next_value().unwrap() {
        values.push(value);
    }
    assert_eq!(values, vec![0, -2, -4, -6, -8, -10, -12, -14, -16]);
}

#[test]
fn presence_mismatch_is_rejected() {
    let mut socd = Vec::new();
    socd.extend_from_slice(b"G05\0C1\0\0");
    write_uleb128(&mut socd, 4); // five values...
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 0); // order 0
    socd.push(0xfe);
    write_uleb128(&mut socd, 4);

    let mut bytes = prefix();
    bytes.extend_from_slice(&epoc_span(5, -30, 4, 20200101, 1_200_000_000_000));
    // ...but the directory claims four present epochs
    bytes.extend_from_slice(&signal_chunks(&socd, &[(0, 4)]));

    let container = SocReader::from_bytes(bytes).unwrap();
    assert!(matches!(
        container.open_obs(sv!("G05"), obscode!("C1")),
        Err(Error::Corrupt)
    ));
}

#[test]
fn reserved_block_header_is_rejected() {
    let mut socd = Vec::new();
    socd.extend_from_slice(b"G05\0C1\0\0");
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 0); // order 0
    socd.push(0b0110_0000); // reserved class

    let mut bytes = prefix();
    bytes.extend_from_slice(&epoc_span(1, 0, 0, 20200101, 1_200_000_000_000));
    bytes.extend_from_slice(&signal_chunks(&socd, &[(0, 1)]));

    let container = SocReader::from_bytes(bytes).unwrap();
    let mut signal = container.open_obs(sv!("G05"), obscode!("C1")).unwrap();
    assert!(matches!(signal.next_value(), Err(Error::Corrupt)));
}

#[test]
fn epoc_is_required_for_data_chunks() {
    // SATE/SOCD without an epoch axis is structurally invalid
    let mut socd = Vec::new();
    socd.extend_from_slice(b"G05\0C1\0\0");
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 0);
    write_uleb128(&mut socd, 0);
    socd.push(0xfe);
    write_uleb128(&mut socd, 0);

    let mut bytes = prefix();
    bytes.extend_from_slice(&signal_chunks(&socd, &[(0, 1)]));
    assert!(matches!(
        SocReader::from_bytes(bytes),
        Err(Error::Corrupt)
    ));
}

#[test]
fn bad_major_is_reported() {
    let mut srnx = Vec::new();
    write_uleb128(&mut srnx, 2); // future major
    write_uleb128(&mut srnx, 0);
    write_uleb128(&mut srnx, 0);
    write_uleb128(&mut srnx, 0);
    write_uleb128_padded(&mut srnx, 0, 8);
    let mut bytes = chunk(b"SRNX", &srnx);
    bytes.extend_from_slice(&chunk(b"RHDR", MINIMAL_HEADER.as_bytes()));
    assert!(matches!(
        SocReader::from_bytes(bytes),
        Err(Error::BadMajor)
    ));
}
