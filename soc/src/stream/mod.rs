//! Sliding-window byte sources
//!
//! Both parsers pull their input through the same narrow contract:
//! a contiguous window of the source, advanced front-to-back, with
//! [PAD] guaranteed-readable zero bytes past the real data. The
//! padding lets fixed-width field parsers run past an end of line or
//! end of input without bounds checks of their own.
use crate::Error;

mod buffered;
mod mapped;

pub use buffered::BufferedStream;
pub use mapped::MappedStream;

/// Guaranteed readable zeros past the window: enough for one
/// maximal observation line slot.
pub const PAD: usize = 80;

/// Longest tolerated text line, terminator included
pub(crate) const MAX_LINE: usize = 16 * 1024;

/// Reads the next text line into `line`: terminator excluded, any of
/// LF / CRLF / CR accepted, the scratch padded with [PAD] zeros past
/// the content so fixed-width field windows never go out of bounds.
/// Returns the content length, or `None` on a clean end of input.
pub(crate) fn read_line<S: Stream>(
    stream: &mut S,
    line: &mut Vec<u8>,
) -> Result<Option<usize>, Error> {
    line.clear();
    let mut req = 256;
    loop {
        let size = stream.advance(req, 0)?;
        if size == 0 {
            return Ok(None);
        }
        let window = stream.window();
        if let Some(pos) = window[..size]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
        {
            let carriage = window[pos] == b'\r';
            if carriage && pos + 1 == size && size >= req {
                // cannot yet tell a lone CR from a split CRLF
                req = size + 2;
                continue;
            }
            let mut consume = pos + 1;
            if carriage && pos + 1 < size && window[pos + 1] == b'\n' {
                consume += 1;
            }
            line.extend_from_slice(&window[..pos]);
            let len = line.len();
            line.resize(len + PAD, 0);
            stream.advance(0, consume)?;
            return Ok(Some(len));
        }
        if size < req {
            // whole remainder visible without a terminator:
            // tolerate a final unterminated line
            line.extend_from_slice(&window[..size]);
            let len = line.len();
            line.resize(len + PAD, 0);
            stream.advance(0, size)?;
            return Ok(Some(len));
        }
        if req >= MAX_LINE {
            return Err(Error::BadFormat);
        }
        req *= 2;
    }
}

/// A sliding read window over a byte source.
///
/// Resources are released on drop.
pub trait Stream {
    /// Discards `step` bytes from the front of the window, then
    /// makes the window at least `req` bytes when that much input
    /// remains. Returns the new window size; 0 on a clean end of
    /// input, transport failures surface as [Error::System].
    fn advance(&mut self, req: usize, step: usize) -> Result<usize, Error>;

    /// Current window. The slice is `len() + PAD` bytes long:
    /// `len()` real bytes followed by at least [PAD] zeros.
    fn window(&self) -> &[u8];

    /// Real bytes in the window
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn advance(&mut self, req: usize, step: usize) -> Result<usize, Error> {
        (**self).advance(req, step)
    }
    fn window(&self) -> &[u8] {
        (**self).window()
    }
    fn len(&self) -> usize {
        (**self).len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn exercise<S: Stream>(mut stream: S, content: &[u8]) {
        let size = stream.advance(content.len(), 0).unwrap();
        assert_eq!(size, content.len());
        assert_eq!(&stream.window()[..size], content);
        // padding is readable and zero
        assert!(stream.window()[size..size + PAD].iter().all(|&b| b == 0));

        // discard half, window shifts
        let half = content.len() / 2;
        let size = stream.advance(1, half).unwrap();
        assert_eq!(size, content.len() - half);
        assert_eq!(&stream.window()[..size], &content[half..]);

        // consume the rest: EOF
        let size = stream.advance(1, size).unwrap();
        assert_eq!(size, 0);
        let size = stream.advance(1, 0).unwrap();
        assert_eq!(size, 0);
    }

    #[test]
    fn buffered_contract() {
        let content = b"the quick brown fox jumps over the lazy dog";
        exercise(BufferedStream::new(Cursor::new(content.to_vec())), content);
    }

    #[test]
    fn mapped_contract() {
        use std::io::Write as _;
        let content = b"pack my box with five dozen liquor jugs";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        let stream = MappedStream::open(file.path()).unwrap();
        exercise(stream, content);
    }

    #[test]
    fn buffered_small_reads() {
        // window grows across multiple refills
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut stream = BufferedStream::new(Cursor::new(content.clone()));
        let size = stream.advance(8_192, 0).unwrap();
        assert!(size >= 8_192);
        let size = stream.advance(10_000, 0).unwrap();
        assert_eq!(size, 10_000);
        assert_eq!(&stream.window()[..size], &content[..]);
        assert!(stream.window()[size..size + PAD].iter().all(|&b| b == 0));
    }
}
