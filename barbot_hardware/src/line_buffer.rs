//! Reassembly of `\n`-terminated lines from arbitrary byte chunks.

use std::collections::VecDeque;

/// Upper bound for a partial line; longer garbage is dropped.
const MAX_PARTIAL: usize = 4096;

#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: Vec<u8>,
    complete: VecDeque<String>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes; every `\n` completes a line. `\r` is stripped.
    pub fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match b {
                b'\n' => {
                    let line = String::from_utf8_lossy(&self.partial).into_owned();
                    self.complete.push_back(line);
                    self.partial.clear();
                }
                b'\r' => {}
                _ => {
                    if self.partial.len() >= MAX_PARTIAL {
                        tracing::warn!(len = self.partial.len(), "dropping oversized partial line");
                        self.partial.clear();
                    }
                    self.partial.push(b);
                }
            }
        }
    }

    /// Oldest complete line, if any.
    pub fn next_line(&mut self) -> Option<String> {
        self.complete.pop_front()
    }

    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty()
    }

    pub fn clear(&mut self) {
        self.partial.clear();
        self.complete.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_chunks_reassemble_in_order() {
        let mut buf = LineBuffer::new();
        buf.push(b"STATUS Dr");
        assert_eq!(buf.next_line(), None);
        buf.push(b"aft\r\nDONE Draft\r\nACK Get");
        assert_eq!(buf.next_line().as_deref(), Some("STATUS Draft"));
        assert_eq!(buf.next_line().as_deref(), Some("DONE Draft"));
        assert_eq!(buf.next_line(), None);
        assert!(buf.has_partial());
        buf.push(b"Weight 12.5\n");
        assert_eq!(buf.next_line().as_deref(), Some("ACK GetWeight 12.5"));
    }

    #[test]
    fn clear_drops_everything() {
        let mut buf = LineBuffer::new();
        buf.push(b"STATUS IDLE\nSTAT");
        buf.clear();
        assert_eq!(buf.next_line(), None);
        assert!(!buf.has_partial());
    }

    #[test]
    fn empty_line_is_delivered() {
        let mut buf = LineBuffer::new();
        buf.push(b"\r\n");
        assert_eq!(buf.next_line().as_deref(), Some(""));
    }
}
