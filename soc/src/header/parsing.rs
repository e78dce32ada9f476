//! Header section parsing
use crate::{
    constellation::System,
    fields::parse_uint,
    header::Header,
    observable::ObsCode,
    stream::{read_line, Stream},
    version::Version,
    Error,
};

#[cfg(feature = "log")]
use log::debug;

/// Header label column
const LABEL: usize = 60;

/// Returns the header label of a line: columns 60.., trailing spaces
/// ignored. Lines shorter than the label column have no label.
fn label(line: &[u8], len: usize) -> &[u8] {
    if len <= LABEL {
        return b"";
    }
    let mut end = len;
    while end > LABEL && line[end - 1] == b' ' {
        end -= 1;
    }
    &line[LABEL..end]
}

/// The systems a RINEX 2.x observation table applies to, selected by
/// the file-system character of the version line: `'M'` covers every
/// system 2.x files can carry, a space is the GPS shorthand.
fn v2_systems(file_system: u8) -> Result<Vec<System>, Error> {
    match file_system {
        b'M' => Ok(vec![
            System::GPS,
            System::Glonass,
            System::SBAS,
            System::Galileo,
        ]),
        other => Ok(vec![System::from_letter(other)?]),
    }
}

impl Header {
    /// Parses the header section from the start of a stream. The
    /// stream is left positioned on the first record. Fails with
    /// [Error::UnknownVersion] / [Error::NotObservation] on foreign
    /// files, [Error::BadFormat] on structural violations.
    pub fn parse<S: Stream>(stream: &mut S) -> Result<Self, Error> {
        let mut header = Header::default();
        let mut line = Vec::with_capacity(128);

        let len = read_line(stream, &mut line)?.ok_or(Error::BadFormat)?;
        if label(&line, len) != b"RINEX VERSION / TYPE" {
            return Err(Error::BadFormat);
        }
        header.version = Version::from_field(&line[..9])?;
        if line[20] != b'O' {
            return Err(Error::NotObservation);
        }
        let file_system = line[40];
        push_normalized(&mut header.text, &line, len);

        // RINEX 2.x: one table, applied at end of header to the
        // systems named by the version line
        let mut v2_count = 0usize;
        let mut v2_codes = Vec::<ObsCode>::new();
        // RINEX 3.x: continuation lines extend the last system
        let mut v3_system: Option<(System, usize)> = None;

        loop {
            let len = match read_line(stream, &mut line)? {
                Some(len) => len,
                None => return Err(Error::BadFormat), // header never ends
            };
            push_normalized(&mut header.text, &line, len);
            match label(&line, len) {
                b"END OF HEADER" => break,
                b"# / TYPES OF OBSERV" => {
                    if header.version.major != 2 {
                        return Err(Error::BadFormat);
                    }
                    if v2_codes.is_empty() {
                        v2_count = parse_uint(&line, 6)? as usize;
                        if v2_count == 0 {
                            return Err(Error::BadFormat);
                        }
                    }
                    // 9 slots of 6, the 2-character code right
                    // justified so its text starts at column 10
                    for slot in 0..9 {
                        if v2_codes.len() == v2_count {
                            break;
                        }
                        let start = 6 + slot * 6;
                        v2_codes.push(ObsCode::from_bytes(&line[start..start + 6])?);
                    }
                },
                b"SYS / # / OBS TYPES" => {
                    if header.version.major != 3 {
                        return Err(Error::BadFormat);
                    }
                    if line[0] != b' ' {
                        // previous system must have filled its table
                        if let Some((prev, declared)) = v3_system {
                            if header.codes[prev.index()].len() != declared {
                                return Err(Error::BadFormat);
                            }
                        }
                        let system = System::from_letter(line[0])?;
                        let declared = parse_uint(&line[3..], 3)? as usize;
                        if declared == 0 {
                            return Err(Error::BadFormat);
                        }
                        v3_system = Some((system, declared));
                    }
                    // a leading space continues the previous system
                    let (system, declared) = v3_system.ok_or(Error::BadFormat)?;
                    let codes = &mut header.codes[system.index()];
                    for slot in 0..13 {
                        if codes.len() == declared {
                            break;
                        }
                        let start = 7 + slot * 4;
                        codes.push(ObsCode::from_bytes(&line[start..start + 4])?);
                    }
                },
                _ => {}, // carried in the text copy only
            }
        }

        match header.version.major {
            2 => {
                if v2_count == 0 || v2_codes.len() != v2_count {
                    return Err(Error::BadFormat);
                }
                for system in v2_systems(file_system)? {
                    header.codes[system.index()] = v2_codes.clone();
                }
            },
            _ => {
                if let Some((system, declared)) = v3_system {
                    if header.codes[system.index()].len() != declared {
                        return Err(Error::BadFormat);
                    }
                }
                if header.codes.iter().all(|codes| codes.is_empty()) {
                    return Err(Error::BadFormat);
                }
            },
        }

        #[cfg(feature = "log")]
        debug!("header: version {}", header.version);

        Ok(header)
    }

    /// Parses a header from an in-memory copy, the way the container
    /// reader recovers it from the `RHDR` payload.
    pub fn from_text(text: &[u8]) -> Result<Self, Error> {
        let mut stream = crate::stream::BufferedStream::new(text);
        Self::parse(&mut stream)
    }
}

fn push_normalized(text: &mut String, line: &[u8], len: usize) {
    let mut end = len;
    while end > 0 && line[end - 1] == b' ' {
        end -= 1;
    }
    text.push_str(&String::from_utf8_lossy(&line[..end]));
    text.push('\n');
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::BufferedStream;
    use std::str::FromStr;

    const V2_HEADER: &str = "     2.11           OBSERVATION DATA    M (MIXED)           RINEX VERSION / TYPE
teqc  2019Feb25     Unknown             20210102 00:01:40UTCPGM / RUN BY / DATE
DELF                                                        MARKER NAME
     4    C1    L1    L2    P2                              # / TYPES OF OBSERV
                                                            END OF HEADER
";

    #[test]
    fn v2_mixed() {
        let header = Header::from_text(V2_HEADER.as_bytes()).unwrap();
        assert_eq!(header.version, Version::new(2, 11));
        // the single table applies to every v2 system
        for system in [System::GPS, System::Glonass, System::SBAS, System::Galileo] {
            assert_eq!(header.n_obs(system), 4, "missing table for {}", system);
            assert_eq!(header.codes(system)[0], ObsCode::from_str("C1").unwrap());
            assert_eq!(header.codes(system)[3], ObsCode::from_str("P2").unwrap());
        }
        assert_eq!(header.n_obs(System::BeiDou), 0);
        assert!(header.text.ends_with("END OF HEADER\n"));
    }

    #[test]
    fn v2_continuation() {
        let text = "     2.11           OBSERVATION DATA    G (GPS)             RINEX VERSION / TYPE
    10    C1    L1    L2    P2    P1    S1    S2    D1    D2# / TYPES OF OBSERV
          L5                                                # / TYPES OF OBSERV
                                                            END OF HEADER
";
        let header = Header::from_text(text.as_bytes()).unwrap();
        assert_eq!(header.n_obs(System::GPS), 10);
        assert_eq!(header.codes(System::GPS)[9], ObsCode::from_str("L5").unwrap());
        assert_eq!(header.n_obs(System::Glonass), 0);
    }

    #[test]
    fn v3_tables() {
        let text = "     3.04           OBSERVATION DATA    M                   RINEX VERSION / TYPE
G    6 C1C L1C D1C S1C C2W L2W                              SYS / # / OBS TYPES
R    4 C1C L1C C2C L2C                                      SYS / # / OBS TYPES
                                                            END OF HEADER
";
        let header = Header::from_text(text.as_bytes()).unwrap();
        assert_eq!(header.version, Version::new(3, 4));
        assert_eq!(header.n_obs(System::GPS), 6);
        assert_eq!(header.n_obs(System::Glonass), 4);
        assert_eq!(
            header.code_index(System::GPS, ObsCode::from_str("C2W").unwrap()),
            Some(4)
        );
        assert_eq!(header.code_index(System::GPS, ObsCode::from_str("C5Q").unwrap()), None);
    }

    #[test]
    fn v3_continuation() {
        let text = "     3.04           OBSERVATION DATA    M                   RINEX VERSION / TYPE
G   15 C1C L1C D1C S1C C2W L2W D2W S2W C2L L2L D2L S2L C5Q  SYS / # / OBS TYPES
       L5Q D5Q                                              SYS / # / OBS TYPES
                                                            END OF HEADER
";
        let header = Header::from_text(text.as_bytes()).unwrap();
        assert_eq!(header.n_obs(System::GPS), 15);
        assert_eq!(
            header.codes(System::GPS)[14],
            ObsCode::from_str("D5Q").unwrap()
        );
    }

    #[test]
    fn foreign_files() {
        let nav = V2_HEADER.replace("OBSERVATION DATA    ", "NAV DATA            ");
        assert!(matches!(
            Header::from_text(nav.as_bytes()),
            Err(Error::NotObservation)
        ));

        let v4 = V2_HEADER.replace("     2.11", "     4.00");
        assert!(matches!(
            Header::from_text(v4.as_bytes()),
            Err(Error::UnknownVersion)
        ));

        assert!(Header::from_text(b"garbage\n").is_err());
        // header never terminated
        let truncated = V2_HEADER.replace(
            "                                                            END OF HEADER\n",
            "",
        );
        assert!(matches!(
            Header::from_text(truncated.as_bytes()),
            Err(Error::BadFormat)
        ));
    }

    #[test]
    fn crlf_normalization() {
        let crlf = V2_HEADER.replace('\n', "\r\n");
        let mut stream = BufferedStream::new(crlf.as_bytes());
        let header = Header::parse(&mut stream).unwrap();
        assert_eq!(header.text, Header::from_text(V2_HEADER.as_bytes()).unwrap().text);
    }
}
