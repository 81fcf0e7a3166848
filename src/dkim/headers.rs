/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::fmt::{Display, Formatter};

use crate::common::headers::{HeaderWriter, Writer};

use super::Signature;

pub(crate) const HEADER_NAME: &[u8] = b"DKIM-Signature";

const MAX_LINE_LEN: usize = 76;

impl Signature {
    /// Writes the header value, that is everything following the colon,
    /// without the final CRLF.
    ///
    /// Tags are written in the order `v a c d s t h bh b`. Lines are folded
    /// between tags, between `h=` names and inside the `b=` value, and the fold
    /// in front of `b=` does not depend on its value, so the unsigned header
    /// is always a byte prefix of the signed one.
    pub fn write_value(&self, writer: &mut impl Writer) {
        let mut bw = HEADER_NAME.len() + 1;
        let v = self.v.to_string();
        let c = format!("{}/{}", self.ch.as_str(), self.cb.as_str());
        let t = self.t.to_string();

        for (num, (tag, value)) in [
            (&b"v="[..], v.as_bytes()),
            (&b"a="[..], self.a.as_str().as_bytes()),
            (&b"c="[..], c.as_bytes()),
            (&b"d="[..], self.d.as_bytes()),
            (&b"s="[..], self.s.as_bytes()),
            (&b"t="[..], t.as_bytes()),
        ]
        .into_iter()
        .enumerate()
        {
            if num > 0 {
                writer.write_len(b";", &mut bw);
            }
            fold_or_space(writer, &mut bw, tag.len() + value.len());
            writer.write_len(tag, &mut bw);
            writer.write_len(value, &mut bw);
        }

        writer.write_len(b";", &mut bw);
        fold_or_space(
            writer,
            &mut bw,
            2 + self.h.first().map_or(0, |h| h.len()),
        );
        writer.write_len(b"h=", &mut bw);
        for (num, h) in self.h.iter().enumerate() {
            if num > 0 {
                if bw + h.len() + 1 > MAX_LINE_LEN {
                    fold(writer, &mut bw);
                }
                writer.write_len(b":", &mut bw);
            }
            writer.write_len(h.as_bytes(), &mut bw);
        }

        writer.write_len(b";", &mut bw);
        fold_or_space(writer, &mut bw, 3 + self.bh.len());
        writer.write_len(b"bh=", &mut bw);
        writer.write_len(&self.bh, &mut bw);

        writer.write_len(b";", &mut bw);
        fold_or_space(writer, &mut bw, 2);
        writer.write_len(b"b=", &mut bw);
        for &byte in &self.b {
            if bw >= MAX_LINE_LEN {
                fold(writer, &mut bw);
            }
            writer.write_len(&[byte], &mut bw);
        }
    }

    pub(crate) fn value(&self) -> Vec<u8> {
        let mut value = Vec::with_capacity(256 + self.b.len());
        self.write_value(&mut value);
        value
    }
}

fn fold(writer: &mut impl Writer, bw: &mut usize) {
    writer.write(b"\r\n\t");
    *bw = 1;
}

fn fold_or_space(writer: &mut impl Writer, bw: &mut usize, len: usize) {
    if *bw + len + 1 > MAX_LINE_LEN {
        fold(writer, bw);
    } else {
        writer.write_len(b" ", bw);
    }
}

impl HeaderWriter for Signature {
    fn write_header(&self, writer: &mut impl Writer) {
        writer.write(HEADER_NAME);
        writer.write(b":");
        self.write_value(writer);
        writer.write(b"\r\n");
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(std::str::from_utf8(HEADER_NAME).unwrap_or_default())?;
        f.write_str(":")?;
        f.write_str(&String::from_utf8_lossy(&self.value()))
    }
}
