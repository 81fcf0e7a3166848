/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::io::{self, BufRead, BufWriter, Write};

use super::Signature;
use crate::{
    common::{headers::HeaderWriter, spool::Spool},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

/// Writes a signed message: the `DKIM-Signature` header followed by the
/// spooled message, unchanged.
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    line_ending: LineEnding,
    header_only: bool,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output line terminator. The spool always holds CRLF, so with
    /// [`LineEnding::Lf`] every CR is dropped on the way out.
    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Writes only the signature header, omitting the message.
    pub fn header_only(mut self, header_only: bool) -> Self {
        self.header_only = header_only;
        self
    }

    pub fn emit(&self, signature: &Signature, spool: &Spool, output: impl Write) -> Result<()> {
        let mut output = BufWriter::new(output);

        self.write(&mut output, signature.to_header().as_bytes())?;

        if !self.header_only {
            let mut reader = spool.reader()?;
            loop {
                let chunk = match reader.fill_buf() {
                    Ok(chunk) => chunk,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err.into()),
                };
                if chunk.is_empty() {
                    break;
                }
                self.write(&mut output, chunk)?;
                let len = chunk.len();
                reader.consume(len);
            }
        }

        output.flush()?;
        tracing::debug!(
            header_only = self.header_only,
            line_ending = ?self.line_ending,
            "signed message written"
        );

        Ok(())
    }

    fn write(&self, output: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
        match self.line_ending {
            LineEnding::Crlf => output.write_all(bytes),
            LineEnding::Lf => {
                for part in bytes.split(|&ch| ch == b'\r') {
                    output.write_all(part)?;
                }
                Ok(())
            }
        }
    }
}
