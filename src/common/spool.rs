/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read},
};

use tempfile::NamedTempFile;

use super::normalize::Normalizer;
use crate::Result;

/// Normalized copy of a message held in a temporary file.
///
/// The body hash has to be known before the first byte of the message can be
/// written out, so the input is consumed once into the spool and then read
/// back as many times as needed. Every reader has its own file handle and
/// offset. The backing file is removed by
/// [`Spool::release`], or on drop if the spool is abandoned on an error path.
#[derive(Debug)]
pub struct Spool {
    file: NamedTempFile,
}

impl Spool {
    /// Consumes `input` through a [`Normalizer`] into a new temporary file.
    pub fn acquire(mut input: impl Read, unstuff: bool) -> Result<Self> {
        let file = tempfile::Builder::new().prefix("dkimsign").tempfile()?;
        tracing::debug!(path = %file.path().display(), "spooling message");

        let mut normalizer = Normalizer::new(BufWriter::new(file.as_file())).unstuff(unstuff);
        io::copy(&mut input, &mut normalizer)?;
        normalizer
            .finish()?
            .into_inner()
            .map_err(|err| err.into_error())?;

        let len = file.as_file().metadata()?.len();
        tracing::debug!(bytes = len, "message spooled");

        Ok(Spool { file })
    }

    /// Returns a buffered reader positioned at the start of the message.
    pub fn reader(&self) -> Result<BufReader<File>> {
        Ok(BufReader::new(self.file.reopen()?))
    }

    /// Removes the backing file.
    pub fn release(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        tracing::debug!(path = %path.display(), "spool released");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufRead, Read};

    use super::Spool;
    use crate::{Error, ErrorKind};

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.served {
                self.served = true;
                buf[..6].copy_from_slice(b"From: ");
                Ok(6)
            } else {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "input closed"))
            }
        }
    }

    fn contents(spool: &Spool) -> String {
        let mut contents = String::new();
        spool.reader().unwrap().read_to_string(&mut contents).unwrap();
        contents
    }

    #[test]
    fn spool_reads_twice() {
        let spool = Spool::acquire(&b"Subject: hi\n\n..body\n"[..], true).unwrap();
        for _ in 0..2 {
            assert_eq!(contents(&spool), "Subject: hi\r\n\r\n.body\r\n");
        }

        let path = spool.file.path().to_path_buf();
        assert!(path.exists());
        spool.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn spool_independent_readers() {
        let spool = Spool::acquire(&b"From: a\r\n\r\nline one\r\nline two\r\n"[..], false).unwrap();
        let mut first = spool.reader().unwrap();
        let mut header = String::new();
        first.read_line(&mut header).unwrap();
        assert_eq!(header, "From: a\r\n");

        // A second reader starts at offset 0 and does not move the first one
        assert_eq!(contents(&spool), "From: a\r\n\r\nline one\r\nline two\r\n");
        let mut second = spool.reader().unwrap();
        let mut line = String::new();
        second.read_line(&mut line).unwrap();
        assert_eq!(line, "From: a\r\n");

        let mut rest = String::new();
        first.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "\r\nline one\r\nline two\r\n");
        spool.release().unwrap();
    }

    #[test]
    fn spool_removed_on_drop() {
        let spool = Spool::acquire(&b""[..], false).unwrap();
        assert_eq!(contents(&spool), "");
        let path = spool.file.path().to_path_buf();
        assert!(path.exists());
        drop(spool);
        assert!(!path.exists());
    }

    #[test]
    fn spool_acquire_failure() {
        let err = Spool::acquire(FailingReader { served: false }, false).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
