//! Bounded reply line.

use core::fmt::{self, Write};

use heapless::String;

use crate::config::{MASTER_ID, MAX_RESPONSE_LEN, RESPONSE_END};

/// One reply line: `/0<opcode> <text>#\n`.
///
/// The buffer is fixed size. Text that does not fit is cut short, but the
/// `#\n` terminator is always present.
#[derive(Clone, PartialEq, Eq)]
pub struct Response {
    line: String<MAX_RESPONSE_LEN>,
}

// Room kept for "#\n".
const TERMINATOR_LEN: usize = 2;

impl Response {
    /// Starts a reply to `opcode`.
    pub fn begin(opcode: u8) -> ResponseBuilder {
        let mut builder = ResponseBuilder {
            line: String::new(),
        };
        builder.push('/');
        builder.push(MASTER_ID);
        builder.push(opcode as char);
        builder
    }

    pub fn as_str(&self) -> &str {
        self.line.as_str()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }

    /// Reply text between the opcode and the terminator.
    pub fn body(&self) -> &str {
        let line = self.line.as_str();
        let start = line.char_indices().nth(3).map_or(line.len(), |(i, _)| i);
        line[start..].trim_end_matches('\n').trim_end_matches('#').trim_start()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Response").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().trim_end())
    }
}

/// Collects the reply text. Finish with [`ResponseBuilder::finish`].
pub struct ResponseBuilder {
    line: String<MAX_RESPONSE_LEN>,
}

impl ResponseBuilder {
    fn push(&mut self, c: char) {
        if self.line.len() + c.len_utf8() + TERMINATOR_LEN <= MAX_RESPONSE_LEN {
            // Cannot fail, capacity checked above.
            let _ = self.line.push(c);
        }
    }

    pub fn finish(mut self) -> Response {
        // The builder never fills the last two bytes.
        let _ = self.line.push(RESPONSE_END as char);
        let _ = self.line.push('\n');
        Response { line: self.line }
    }
}

impl Write for ResponseBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            self.push(c);
        }
        Ok(())
    }
}
