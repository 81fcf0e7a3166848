/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::io::{self, BufRead};

use mail_builder::encoders::base64::base64_encode;

use super::{canonicalize::BodyHasher, headers::HEADER_NAME, DkimSigner, Done, Signature};
use crate::{
    common::{
        crypto::{HashContext, SigningKey},
        headers::{header_name_matches, parse_headers, read_header_block},
        spool::Spool,
    },
    Error,
};

impl<T: SigningKey> DkimSigner<T, Done> {
    /// Signs a message held in memory. Lines must end with CRLF.
    pub fn sign(&self, message: &[u8]) -> crate::Result<Signature> {
        self.sign_stream(message)
    }

    /// Signs the normalized message held in a spool.
    pub fn sign_spool(&self, spool: &Spool) -> crate::Result<Signature> {
        self.sign_stream(spool.reader()?)
    }

    /// Signs a message read from `message`, which is consumed once: the
    /// header block is buffered and the body is hashed as it streams by.
    pub fn sign_stream(&self, mut message: impl BufRead) -> crate::Result<Signature> {
        let _span = tracing::debug_span!(
            "dkim_sign",
            d = %self.template.d,
            s = %self.template.s
        )
        .entered();

        // Validate template and message headers
        self.validate()?;
        let header_block = read_header_block(&mut message)?;
        let headers = parse_headers(&header_block)?;
        if headers.is_empty() {
            return Err(Error::NoHeadersFound);
        }
        let signed_headers = self.template.select_headers(&headers);

        // Hash body
        let mut body_hasher = BodyHasher::new(self.key.hasher(), self.template.cb);
        let mut body_len = 0;
        loop {
            let chunk = match message.fill_buf() {
                Ok(chunk) => chunk,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if chunk.is_empty() {
                break;
            }
            body_hasher.write(chunk);
            let len = chunk.len();
            body_len += len;
            message.consume(len);
        }
        let body_hash = body_hasher.finish().complete();
        tracing::debug!(bytes = body_len, canonicalization = ?self.template.cb, "body hashed");

        // Build draft signature
        let mut signature = self.template.clone();
        signature.bh = base64_encode(body_hash.as_ref()).map_err(|_| Error::Base64)?;

        // Hash headers, followed by the draft signature header itself
        let mut header_hasher = self.key.hasher();
        signature
            .ch
            .canonicalize_headers(signed_headers.into_iter(), &mut header_hasher);
        signature
            .ch
            .canonicalize_header(HEADER_NAME, &signature.value(), &mut header_hasher);
        let header_hash = header_hasher.complete();

        // Sign
        let b = self.key.sign(header_hash.as_ref())?;
        signature.b = base64_encode(&b).map_err(|_| Error::Base64)?;
        tracing::debug!(algorithm = signature.a.as_str(), "message signed");

        Ok(signature)
    }
}

impl Signature {
    /// Picks the header fields covered by `h=`, in signing order.
    ///
    /// Every occurrence of a name in `h=` takes the next unused field of that
    /// name counting from the bottom of the header block. Names that run out
    /// of fields are kept in `h=` but contribute nothing.
    pub(crate) fn select_headers<'x>(
        &self,
        headers: &[(&'x [u8], &'x [u8])],
    ) -> Vec<(&'x [u8], &'x [u8])> {
        let mut used = vec![false; headers.len()];
        let mut selected = Vec::with_capacity(self.h.len());

        for name in &self.h {
            match (0..headers.len())
                .rev()
                .find(|&pos| !used[pos] && header_name_matches(headers[pos].0, name))
            {
                Some(pos) => {
                    used[pos] = true;
                    selected.push(headers[pos]);
                }
                None => {
                    tracing::warn!(header = %name, "signed header not present in message");
                }
            }
        }

        selected
    }
}
