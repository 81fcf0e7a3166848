/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use super::Canonicalization;
use crate::common::headers::{Writable, Writer};

/// Incremental body canonicalizer.
///
/// Body content can be fed in chunks of any size; the canonical form is
/// written to the wrapped [`Writer`] (usually a hash context) as it becomes
/// known. Line breaks are held back until non-empty content follows them, so
/// trailing empty lines never reach the writer.
pub struct BodyHasher<H> {
    hasher: H,
    canonicalization: Canonicalization,
    crlf_seq: usize,
    last_ch: u8,
    is_empty: bool,
}

impl<H: Writer> BodyHasher<H> {
    pub fn new(hasher: H, canonicalization: Canonicalization) -> Self {
        Self {
            hasher,
            canonicalization,
            crlf_seq: 0,
            last_ch: 0,
            is_empty: true,
        }
    }

    /// Feed a chunk of body data to the hasher.
    pub fn write(&mut self, chunk: &[u8]) {
        match self.canonicalization {
            Canonicalization::Relaxed => {
                for &ch in chunk {
                    match ch {
                        b' ' | b'\t' | b'\r' => {}
                        b'\n' => {
                            self.crlf_seq += 1;
                        }
                        _ => {
                            self.flush_crlf();

                            if self.last_ch == b' ' || self.last_ch == b'\t' {
                                self.hasher.write(b" ");
                            }

                            self.hasher.write(&[ch]);
                            self.is_empty = false;
                        }
                    }
                    self.last_ch = ch;
                }
            }
            Canonicalization::Simple => {
                for &ch in chunk {
                    match ch {
                        b'\n' => {
                            self.crlf_seq += 1;
                        }
                        b'\r' => {}
                        _ => {
                            self.flush_crlf();
                            self.hasher.write(&[ch]);
                            self.is_empty = false;
                        }
                    }
                }
            }
        }
    }

    /// Terminates a non-empty body with a single CRLF and returns the writer.
    /// An empty body produces no output at all.
    pub fn finish(mut self) -> H {
        if !self.is_empty {
            self.hasher.write(b"\r\n");
        }
        self.hasher
    }

    fn flush_crlf(&mut self) {
        while self.crlf_seq > 0 {
            self.hasher.write(b"\r\n");
            self.crlf_seq -= 1;
        }
    }
}

pub struct CanonicalBody<'a> {
    canonicalization: Canonicalization,
    body: &'a [u8],
}

impl Writable for CanonicalBody<'_> {
    fn write(self, writer: &mut impl Writer) {
        let mut hasher = BodyHasher::new(writer, self.canonicalization);
        hasher.write(self.body);
        hasher.finish();
    }
}

impl Canonicalization {
    pub fn canonicalize_header(&self, name: &[u8], value: &[u8], writer: &mut impl Writer) {
        match self {
            Canonicalization::Relaxed => {
                for ch in name.iter().filter(|ch| !ch.is_ascii_whitespace()) {
                    writer.write(&[ch.to_ascii_lowercase()]);
                }
                writer.write(b":");

                let mut started = false;
                let mut space = false;
                for &ch in value {
                    match ch {
                        b' ' | b'\t' => space = started,
                        b'\r' | b'\n' => {}
                        _ => {
                            if std::mem::take(&mut space) {
                                writer.write(b" ");
                            }
                            writer.write(&[ch]);
                            started = true;
                        }
                    }
                }

                if value.ends_with(b"\n") {
                    writer.write(b"\r\n");
                }
            }
            Canonicalization::Simple => {
                writer.write(name);
                writer.write(b":");
                writer.write(value);
            }
        }
    }

    pub fn canonicalize_headers<'a>(
        &self,
        headers: impl Iterator<Item = (&'a [u8], &'a [u8])>,
        writer: &mut impl Writer,
    ) {
        for (name, value) in headers {
            self.canonicalize_header(name, value, writer);
        }
    }

    pub fn canonical_body<'a>(&self, body: &'a [u8]) -> CanonicalBody<'a> {
        CanonicalBody {
            canonicalization: *self,
            body,
        }
    }

    pub fn canonical_header_bytes(&self, name: &[u8], value: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(name.len() + value.len() + 3);
        self.canonicalize_header(name, value, &mut buf);
        buf
    }

    pub fn canonical_body_bytes(&self, body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(body.len() + 2);
        self.canonical_body(body).write(&mut buf);
        buf
    }
}
