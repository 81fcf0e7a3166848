/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! DKIM (RFC 6376) signing of outgoing messages.
//!
//! A message is normalized and spooled to a temporary file, its body and the
//! selected headers are canonicalized and hashed, the hash is signed with an
//! RSA key and the message is written back prefixed with a `DKIM-Signature`
//! header.

use std::fmt::Display;

pub mod common;
pub mod dkim;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    MissingParameters,
    InvalidHeaderName(String),
    InvalidTag(&'static str),
    UnsupportedCanonicalization,

    InvalidKey(String),
    UnsupportedKeyType(String),

    Io(String),

    ParseError,
    NoHeadersFound,

    CryptoError(String),
    Base64,
}

/// Broad class of an [`Error`], used to pick the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Key,
    Io,
    Canonicalization,
    Signing,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingParameters
            | Error::InvalidHeaderName(_)
            | Error::InvalidTag(_)
            | Error::UnsupportedCanonicalization => ErrorKind::Configuration,
            Error::InvalidKey(_) | Error::UnsupportedKeyType(_) => ErrorKind::Key,
            Error::Io(_) => ErrorKind::Io,
            Error::ParseError | Error::NoHeadersFound => ErrorKind::Canonicalization,
            Error::CryptoError(_) | Error::Base64 => ErrorKind::Signing,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl ErrorKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Configuration | ErrorKind::Key => 1,
            ErrorKind::Io | ErrorKind::Canonicalization | ErrorKind::Signing => 2,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingParameters => write!(f, "Selector, domain and headers are required"),
            Error::InvalidHeaderName(name) => write!(f, "Invalid header name {:?}", name),
            Error::InvalidTag(tag) => write!(f, "Invalid value for '{}=' tag", tag),
            Error::UnsupportedCanonicalization => {
                write!(f, "Unsupported canonicalization method.")
            }
            Error::InvalidKey(err) => write!(f, "Could not read private key: {}", err),
            Error::UnsupportedKeyType(label) => {
                write!(f, "Unsupported private key format: {}", label)
            }
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::ParseError => write!(f, "Malformed message header"),
            Error::NoHeadersFound => write!(f, "No headers found"),
            Error::CryptoError(err) => write!(f, "Cryptography layer error: {}", err),
            Error::Base64 => write!(f, "Base64 encode or decode error."),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<rsa::errors::Error> for Error {
    fn from(err: rsa::errors::Error) -> Self {
        Error::CryptoError(err.to_string())
    }
}
