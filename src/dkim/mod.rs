/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::{marker::PhantomData, str::FromStr};

use crate::{
    common::crypto::{Algorithm, SigningKey},
    Error,
};

pub mod builder;
pub mod canonicalize;
pub mod emit;
pub mod headers;
pub mod sign;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Canonicalization {
    #[default]
    Relaxed,
    Simple,
}

#[derive(Debug, Default)]
pub struct NeedDomain;
#[derive(Debug, Default)]
pub struct NeedSelector;
#[derive(Debug, Default)]
pub struct NeedHeaders;
#[derive(Debug, Default)]
pub struct Done;

/// Signs messages with a fixed key and signature template.
///
/// Built with [`DkimSigner::from_key`] followed by `domain`, `selector` and
/// `headers`, in that order; signing is only available once all three are set.
#[derive(Debug)]
pub struct DkimSigner<T: SigningKey, State = NeedDomain> {
    _state: PhantomData<State>,
    pub(crate) key: T,
    pub(crate) template: Signature,
}

/// A `DKIM-Signature` header, either as a template (no `bh=` and `b=` yet) or
/// as the outcome of signing a message.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Signature {
    pub(crate) v: u32,
    pub(crate) a: Algorithm,
    pub(crate) d: String,
    pub(crate) s: String,
    pub(crate) b: Vec<u8>,
    pub(crate) bh: Vec<u8>,
    pub(crate) h: Vec<String>,
    pub(crate) t: u64,
    pub(crate) ch: Canonicalization,
    pub(crate) cb: Canonicalization,
}

impl Signature {
    pub fn domain(&self) -> &str {
        &self.d
    }

    pub fn selector(&self) -> &str {
        &self.s
    }

    pub fn algorithm(&self) -> Algorithm {
        self.a
    }

    pub fn timestamp(&self) -> u64 {
        self.t
    }

    /// Header names listed in the `h=` tag, exactly as requested.
    pub fn signed_headers(&self) -> impl Iterator<Item = &str> {
        self.h.iter().map(|h| h.as_str())
    }

    /// Base64 encoded body hash (`bh=`).
    pub fn body_hash(&self) -> &[u8] {
        &self.bh
    }

    /// Base64 encoded signature (`b=`), empty until the message is signed.
    pub fn signature(&self) -> &[u8] {
        &self.b
    }

    pub fn header_canonicalization(&self) -> Canonicalization {
        self.ch
    }

    pub fn body_canonicalization(&self) -> Canonicalization {
        self.cb
    }
}

impl Canonicalization {
    /// Parses a `c=` style value such as `relaxed/simple`. A lone algorithm
    /// applies to the headers, the body then defaults to `simple`.
    pub fn parse_pair(value: &str) -> crate::Result<(Canonicalization, Canonicalization)> {
        match value.split_once('/') {
            Some((ch, cb)) => Ok((ch.parse()?, cb.parse()?)),
            None => Ok((value.parse()?, Canonicalization::Simple)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Canonicalization::Relaxed => "relaxed",
            Canonicalization::Simple => "simple",
        }
    }
}

impl FromStr for Canonicalization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("relaxed") {
            Ok(Canonicalization::Relaxed)
        } else if s.eq_ignore_ascii_case("simple") {
            Ok(Canonicalization::Simple)
        } else {
            Err(Error::UnsupportedCanonicalization)
        }
    }
}
