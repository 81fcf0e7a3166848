/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::{
    io::BufRead,
    iter::{Enumerate, Peekable},
    slice::Iter,
};

use crate::{Error, Result};

pub trait Writer {
    fn write(&mut self, buf: &[u8]);

    fn write_len(&mut self, buf: &[u8], len: &mut usize) {
        self.write(buf);
        *len += buf.len();
    }
}

pub trait Writable {
    fn write(self, writer: &mut impl Writer);
}

pub trait HeaderWriter: Sized {
    fn write_header(&self, writer: &mut impl Writer);

    fn to_header(&self) -> String {
        let mut buf = Vec::new();
        self.write_header(&mut buf);
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Writer for Vec<u8> {
    fn write(&mut self, buf: &[u8]) {
        self.extend_from_slice(buf);
    }
}

impl<W: Writer + ?Sized> Writer for &mut W {
    fn write(&mut self, buf: &[u8]) {
        (**self).write(buf);
    }
}

#[derive(Clone, Copy)]
enum State {
    Name { start: usize },
    Value { start: usize, colon: usize },
}

pub(crate) struct HeaderIterator<'x> {
    message: &'x [u8],
    iter: Peekable<Enumerate<Iter<'x, u8>>>,
    state: State,
}

impl<'x> HeaderIterator<'x> {
    pub fn new(message: &'x [u8]) -> Self {
        HeaderIterator {
            message,
            iter: message.iter().enumerate().peekable(),
            state: State::Name { start: 0 },
        }
    }
}

impl<'x> Iterator for HeaderIterator<'x> {
    type Item = (&'x [u8], &'x [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let mut last_ch = 0;
        while let Some((pos, &ch)) = self.iter.next() {
            if ch == b':' {
                if let State::Name { start } = &self.state {
                    self.state = State::Value {
                        start: *start,
                        colon: pos,
                    };
                }
            } else if ch == b'\n' {
                match self.state {
                    State::Value { start, colon } => {
                        if self
                            .iter
                            .peek()
                            .map_or(true, |(_, next_byte)| ![b' ', b'\t'].contains(next_byte))
                        {
                            let header_name = self.message.get(start..colon).unwrap_or_default();
                            let header_value =
                                self.message.get(colon + 1..pos + 1).unwrap_or_default();
                            self.state = State::Name { start: pos + 1 };
                            return Some((header_name, header_value));
                        }
                    }
                    State::Name { start } => {
                        if last_ch == b'\r' && start + 1 == pos || start == pos {
                            // End of headers
                            return None;
                        } else if self
                            .iter
                            .peek()
                            .map_or(true, |(_, next_byte)| ![b' ', b'\t'].contains(next_byte))
                        {
                            // Line without a colon
                            let header_name = self.message.get(start..pos + 1).unwrap_or_default();
                            self.state = State::Name { start: pos + 1 };
                            return Some((header_name, b""));
                        }
                    }
                }
            }

            last_ch = ch;
        }

        None
    }
}

/// Reads the header block of a message, up to and including the empty line
/// that separates it from the body. The separator is consumed but not
/// returned, leaving `reader` positioned at the first byte of the body.
///
/// A final header line lacking a line break is terminated with CRLF in the
/// returned copy.
pub(crate) fn read_header_block(reader: &mut impl BufRead) -> Result<Vec<u8>> {
    let mut block = Vec::with_capacity(1024);
    let mut line = Vec::with_capacity(256);

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if line == b"\r\n" || line == b"\n" {
            break;
        }
        block.extend_from_slice(&line);
    }

    if !block.is_empty() && !block.ends_with(b"\n") {
        block.extend_from_slice(b"\r\n");
    }

    Ok(block)
}

/// Splits a header block into `(name, value)` pairs in wire order.
///
/// Lines that are neither a field nor a continuation, and fields with an
/// empty name, cannot be canonicalized and are rejected.
pub(crate) fn parse_headers(block: &[u8]) -> Result<Vec<(&[u8], &[u8])>> {
    let mut headers = Vec::new();

    for (name, value) in HeaderIterator::new(block) {
        if name.ends_with(b"\n") || name.iter().all(|ch| ch.is_ascii_whitespace()) {
            tracing::debug!(
                line = %String::from_utf8_lossy(name).trim_end(),
                "rejecting malformed header line"
            );
            return Err(Error::ParseError);
        }
        headers.push((name, value));
    }

    Ok(headers)
}

/// Returns `true` when a raw header name (which may carry whitespace before
/// the colon) matches `name`, ignoring case.
pub(crate) fn header_name_matches(raw: &[u8], name: &str) -> bool {
    raw.trim_ascii().eq_ignore_ascii_case(name.as_bytes())
}
