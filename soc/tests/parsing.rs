//! End-to-end observation text parsing
use soc::prelude::*;
use soc::{obscode, sv};

use std::io::Cursor;

fn open(content: &str) -> ObsReader<BufferedStream<Cursor<Vec<u8>>>> {
    let stream = BufferedStream::new(Cursor::new(content.as_bytes().to_vec()));
    ObsReader::new(stream).unwrap()
}

#[test]
fn mixed_v2_header() {
    let content = "\
     2.11           OBSERVATION DATA    M (MIXED)           RINEX VERSION / TYPE
     4    C1    L1    L2    P2                              # / TYPES OF OBSERV
                                                            END OF HEADER
";
    let reader = open(content);
    let header = reader.header();
    assert_eq!(header.version, Version::new(2, 11));
    // one table for every system a 2.x file can carry
    let declared = header.n_obs(System::GPS);
    assert_eq!(declared, 4);
    assert_eq!(header.n_obs(System::Glonass), declared);
    assert_eq!(header.n_obs(System::SBAS), declared);
    assert_eq!(header.n_obs(System::Galileo), declared);
    assert_eq!(header.codes(System::Glonass), header.codes(System::GPS));
}

#[test]
fn single_observation_epoch() {
    let content = "\
     2.11           OBSERVATION DATA    M (MIXED)           RINEX VERSION / TYPE
     1    C1                                                # / TYPES OF OBSERV
                                                            END OF HEADER
 05  1 15  3 16 12.0000000  0  1G05
 23619095.450
";
    let mut reader = open(content);
    assert!(reader.read().unwrap());
    assert_eq!(reader.epoch().yyyymmdd, 20050115);
    assert_eq!(reader.epoch().hhmm, 316);
    assert_eq!(reader.epoch().sec_e7, 120_000_000);
    assert_eq!(reader.epoch().n_sats, 1);
    assert_eq!(reader.values(), &[23_619_095_450]);
    assert_eq!(reader.lli(), b" ");
    assert_eq!(reader.ssi(), b" ");
    let (observed, bitmap) = reader.satellites().next().unwrap();
    assert_eq!(observed, sv!("G05"));
    assert_eq!(bitmap, &[0x01]);
    assert!(!reader.read().unwrap());
}

#[test]
fn event_record_body_is_verbatim() {
    let content = "\
     2.11           OBSERVATION DATA    M (MIXED)           RINEX VERSION / TYPE
     1    C1                                                # / TYPES OF OBSERV
                                                            END OF HEADER
 05  1 15  3 17  0.0000000  2  2
 LINE A
 LINE B
";
    let mut reader = open(content);
    assert!(reader.read().unwrap());
    let epoch = reader.epoch();
    assert_eq!(epoch.flag, EpochFlag::AntennaBeingMoved);
    assert!(epoch.flag.is_event());
    assert_eq!(epoch.n_sats, 2);
    assert_eq!(reader.event_lines(), b" LINE A\n LINE B\n");
    assert!(reader.values().is_empty());
    assert!(!reader.read().unwrap());
}

#[test]
fn foreign_files_are_rejected() {
    let nav = "\
     2.11           NAVIGATION DATA                         RINEX VERSION / TYPE
                                                            END OF HEADER
";
    let stream = BufferedStream::new(Cursor::new(nav.as_bytes().to_vec()));
    assert!(matches!(
        ObsReader::new(stream),
        Err(Error::NotObservation)
    ));

    let unknown = "\
     5.00           OBSERVATION DATA    M (MIXED)           RINEX VERSION / TYPE
                                                            END OF HEADER
";
    let stream = BufferedStream::new(Cursor::new(unknown.as_bytes().to_vec()));
    assert!(matches!(ObsReader::new(stream), Err(Error::UnknownVersion)));
}

#[test]
fn v3_observation_codes() {
    let content = "\
     3.04           OBSERVATION DATA    M                   RINEX VERSION / TYPE
G    4 C1C L1C D1C S1C                                      SYS / # / OBS TYPES
E    2 C1X L1X                                              SYS / # / OBS TYPES
                                                            END OF HEADER
> 2022 01 09 00 00 30.0000000  0  2
G01  22331467.880   117352685.28208
E11  25107898.123
";
    let mut reader = open(content);
    assert_eq!(
        reader.header().code_index(System::GPS, obscode!("L1C")),
        Some(1)
    );
    assert_eq!(reader.header().n_obs(System::Galileo), 2);
    assert!(reader.read().unwrap());
    assert_eq!(reader.epoch().n_sats, 2);
    assert_eq!(
        reader.values(),
        &[22_331_467_880, 117_352_685_282, 25_107_898_123]
    );
    let sats: Vec<_> = reader.satellites().collect();
    assert_eq!(sats[0].0, sv!("G01"));
    assert_eq!(sats[0].1, &[0b0000_0011]);
    assert_eq!(sats[1].0, sv!("E11"));
    assert_eq!(sats[1].1, &[0b0000_0001]);
}
