//! Addressed frame extraction.
//!
//! A request on the bus looks like `/<addr><payload>!`, possibly surrounded
//! by noise. Only the first `/` and the first `!` after it are honoured.

use log::trace;

use crate::config::{NodeId, FRAME_END, FRAME_START};

/// Outcome of scanning one received line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResult<'a> {
    /// Addressed to this node. The payload may be empty.
    Addressed(&'a [u8]),
    /// Well-formed, but for another node.
    NotForMe,
    /// Start or end marker missing.
    Malformed,
}

impl<'a> FrameResult<'a> {
    /// Non-empty payload that should be dispatched, if any.
    pub fn payload(self) -> Option<&'a [u8]> {
        match self {
            FrameResult::Addressed(payload) if !payload.is_empty() => Some(payload),
            _ => None,
        }
    }
}

/// Finds the command addressed to `id` in `line`.
pub fn extract(line: &[u8], id: NodeId) -> FrameResult<'_> {
    // The line ends at the first NUL, as it would in a C string buffer.
    let line = match line.iter().position(|&b| b == 0) {
        Some(nul) => &line[..nul],
        None => line,
    };

    let Some(start) = line.iter().position(|&b| b == FRAME_START) else {
        trace!("no start marker in {:?}", String::from_utf8_lossy(line));
        return FrameResult::Malformed;
    };
    let Some(end) = line[start..].iter().position(|&b| b == FRAME_END).map(|i| start + i) else {
        trace!("no end marker in {:?}", String::from_utf8_lossy(line));
        return FrameResult::Malformed;
    };

    // `end > start`, so the address byte always exists; for "/!" it is the
    // end marker itself, which is never a valid identity.
    let addr = line[start + 1];
    if addr != id.as_byte() {
        trace!("frame for {:?}, not {}", addr as char, id);
        return FrameResult::NotForMe;
    }

    FrameResult::Addressed(&line[start + 2..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        NodeId::new('N').unwrap()
    }

    #[test]
    fn extracts_payload() {
        assert_eq!(extract(b"/Nv!", node()), FrameResult::Addressed(b"v"));
        assert_eq!(extract(b"/Nw 128 1!\n", node()), FrameResult::Addressed(b"w 128 1"));
    }

    #[test]
    fn ignores_leading_and_trailing_noise() {
        assert_eq!(extract(b"\x7fxx/Na!junk", node()), FrameResult::Addressed(b"a"));
    }

    #[test]
    fn only_first_frame_is_honoured() {
        assert_eq!(extract(b"/Nv!/NL1!", node()), FrameResult::Addressed(b"v"));
        assert_eq!(extract(b"/Xv!/Nv!", node()), FrameResult::NotForMe);
    }

    #[test]
    fn missing_markers_are_malformed() {
        assert_eq!(extract(b"Nv!", node()), FrameResult::Malformed);
        assert_eq!(extract(b"/Nv", node()), FrameResult::Malformed);
        assert_eq!(extract(b"!Nv/", node()), FrameResult::Malformed);
        assert_eq!(extract(b"", node()), FrameResult::Malformed);
    }

    #[test]
    fn nul_terminates_the_scan() {
        assert_eq!(extract(b"/Nv\0!", node()), FrameResult::Malformed);
    }

    #[test]
    fn other_addresses_are_not_for_me() {
        assert_eq!(extract(b"/Mv!", node()), FrameResult::NotForMe);
        assert_eq!(extract(b"/nv!", node()), FrameResult::NotForMe);
        assert_eq!(extract(b"/0v #", node()), FrameResult::Malformed);
        assert_eq!(extract(b"/!", node()), FrameResult::NotForMe);
    }

    #[test]
    fn empty_payload_is_addressed_but_not_dispatched() {
        let result = extract(b"/N!", node());
        assert_eq!(result, FrameResult::Addressed(b""));
        assert_eq!(result.payload(), None);
        assert_eq!(extract(b"/NL1!", node()).payload(), Some(&b"L1"[..]));
    }
}
