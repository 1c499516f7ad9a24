//! Line-oriented byte transport.

use std::io::{self, Read, Write};

use heapless::Vec;
use log::{trace, warn};

use crate::config::MAX_LINE_LEN;
use crate::error::TransportError;

/// One received line, without its newline.
pub type LineBuffer = Vec<u8, MAX_LINE_LEN>;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// Blocking line I/O on the bus.
pub trait LineTransport {
    /// Next complete line, or `None` if the read timed out first.
    ///
    /// A partial line is kept and completed by later calls.
    fn read_line(&mut self) -> Result<Option<LineBuffer>, TransportError>;

    fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError>;
}

/// [`LineTransport`] over any byte stream: a serial port, a console, or a
/// buffer in tests.
pub struct StreamTransport<S> {
    stream: S,
    pending: LineBuffer,
    overflowed: bool,
}

impl<S: Read + Write> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending: LineBuffer::new(),
            overflowed: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Adds one byte to the pending line. Returns true at end of line.
    fn accept(&mut self, byte: u8) -> bool {
        match byte {
            b'\n' => return true,
            b'\r' => {}
            BACKSPACE | DELETE => {
                self.pending.pop();
            }
            _ => {
                if self.pending.push(byte).is_err() && !self.overflowed {
                    warn!("input line longer than {MAX_LINE_LEN} bytes, dropping the rest");
                    self.overflowed = true;
                }
            }
        }
        false
    }
}

impl<S: Read + Write> LineTransport for StreamTransport<S> {
    fn read_line(&mut self) -> Result<Option<LineBuffer>, TransportError> {
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(_) => {
                    if self.accept(byte[0]) {
                        self.overflowed = false;
                        let line = core::mem::take(&mut self.pending);
                        trace!("line in: {:?}", String::from_utf8_lossy(&line));
                        return Ok(Some(line));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => match TransportError::from(e) {
                    TransportError::Timeout => return Ok(None),
                    other => return Err(other),
                },
            }
        }
    }

    fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        trace!("line out: {:?}", String::from_utf8_lossy(line));
        self.stream.write_all(line)?;
        self.stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reads from a script of chunks and timeouts; collects writes.
    struct Scripted {
        input: std::vec::IntoIter<Option<&'static [u8]>>,
        current: Cursor<&'static [u8]>,
        output: std::vec::Vec<u8>,
    }

    impl Scripted {
        fn new(script: std::vec::Vec<Option<&'static [u8]>>) -> Self {
            Self {
                input: script.into_iter(),
                current: Cursor::new(&[][..]),
                output: std::vec::Vec::new(),
            }
        }
    }

    fn chunk(bytes: &'static [u8]) -> Option<&'static [u8]> {
        Some(bytes)
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                let n = self.current.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                match self.input.next() {
                    Some(Some(chunk)) => self.current = Cursor::new(chunk),
                    Some(None) => return Err(io::ErrorKind::TimedOut.into()),
                    None => return Ok(0),
                }
            }
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn splits_lines_and_drops_carriage_returns() {
        let mut t = StreamTransport::new(Scripted::new(vec![chunk(b"/Nv!\r\n/NL1!\n")]));
        assert_eq!(t.read_line().unwrap().unwrap().as_slice(), b"/Nv!");
        assert_eq!(t.read_line().unwrap().unwrap().as_slice(), b"/NL1!");
        assert!(matches!(t.read_line(), Err(TransportError::Closed)));
    }

    #[test]
    fn timeout_keeps_partial_line() {
        let mut t = StreamTransport::new(Scripted::new(vec![chunk(b"/Nw 1"), None, chunk(b"28!\n")]));
        assert_eq!(t.read_line().unwrap(), None);
        assert_eq!(t.read_line().unwrap().unwrap().as_slice(), b"/Nw 128!");
    }

    #[test]
    fn backspace_deletes() {
        let mut t = StreamTransport::new(Scripted::new(vec![chunk(b"/Nx\x08v!\x7f!\n")]));
        assert_eq!(t.read_line().unwrap().unwrap().as_slice(), b"/Nv!");
    }

    #[test]
    fn overlong_lines_are_truncated() {
        let mut long = std::vec::Vec::from(&b"/Nv!"[..]);
        long.resize(MAX_LINE_LEN + 20, b'x');
        long.push(b'\n');
        let long: &'static [u8] = Box::leak(long.into_boxed_slice());
        let mut t = StreamTransport::new(Scripted::new(vec![chunk(long), chunk(b"/Na!\n")]));
        let line = t.read_line().unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_LEN);
        assert!(line.starts_with(b"/Nv!"));
        assert_eq!(t.read_line().unwrap().unwrap().as_slice(), b"/Na!");
    }

    #[test]
    fn writes_whole_line() {
        let mut t = StreamTransport::new(Scripted::new(vec![]));
        t.write_line(b"/0v 1#\n").unwrap();
        assert_eq!(t.into_inner().output, b"/0v 1#\n");
    }
}
