/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::io::{self, Write};

/// Line ending normalizer.
///
/// Rewrites every line ending found in the bytes written to it (`\r\n`, a bare
/// `\n` or a bare `\r`) as `\r\n` before passing them on to the inner writer.
/// When dot-stuffing reversal is enabled, a `.` at the very beginning of a
/// line is removed.
///
/// State is kept between calls to `write`, so a line ending split across two
/// chunks is recognised as a single one. Call [`Normalizer::finish`] once the
/// input is exhausted to flush a trailing `\r`.
pub struct Normalizer<W: Write> {
    inner: W,
    unstuff: bool,
    pending_cr: bool,
    line_start: bool,
    buf: Vec<u8>,
}

impl<W: Write> Normalizer<W> {
    pub fn new(inner: W) -> Self {
        Normalizer {
            inner,
            unstuff: false,
            pending_cr: false,
            line_start: true,
            buf: Vec::with_capacity(8192),
        }
    }

    /// Reverse SMTP dot-stuffing (RFC 5321, section 4.5.2).
    pub fn unstuff(mut self, unstuff: bool) -> Self {
        self.unstuff = unstuff;
        self
    }

    /// Flushes any pending line ending and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.pending_cr {
            self.pending_cr = false;
            self.inner.write_all(b"\r\n")?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn normalize(&mut self, chunk: &[u8]) {
        self.buf.clear();

        for &ch in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                self.buf.extend_from_slice(b"\r\n");
                self.line_start = true;
                if ch == b'\n' {
                    continue;
                }
            }

            match ch {
                b'\r' => {
                    self.pending_cr = true;
                }
                b'\n' => {
                    self.buf.extend_from_slice(b"\r\n");
                    self.line_start = true;
                }
                b'.' if self.line_start && self.unstuff => {
                    self.line_start = false;
                }
                _ => {
                    self.buf.push(ch);
                    self.line_start = false;
                }
            }
        }
    }
}

impl<W: Write> Write for Normalizer<W> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        self.normalize(chunk);
        self.inner.write_all(&self.buf)?;
        Ok(chunk.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Convenience wrapper normalizing an in-memory message.
pub fn normalize(message: &[u8], unstuff: bool) -> Vec<u8> {
    let mut normalizer = Normalizer::new(Vec::with_capacity(message.len() + 64)).unstuff(unstuff);
    normalizer.normalize(message);
    let mut output = std::mem::take(&mut normalizer.buf);
    if normalizer.pending_cr {
        output.extend_from_slice(b"\r\n");
    }
    output
}
