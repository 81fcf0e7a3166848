/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::time::SystemTime;

use crate::{common::crypto::SigningKey, Error};

use super::{Canonicalization, DkimSigner, Done, NeedDomain, NeedHeaders, NeedSelector, Signature};

impl<T: SigningKey> DkimSigner<T> {
    pub fn from_key(key: T) -> DkimSigner<T, NeedDomain> {
        DkimSigner {
            _state: Default::default(),
            template: Signature {
                v: 1,
                a: key.algorithm(),
                t: SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0),
                ..Default::default()
            },
            key,
        }
    }
}

impl<T: SigningKey> DkimSigner<T, NeedDomain> {
    /// Sets the domain to use for signing.
    pub fn domain(mut self, domain: impl Into<String>) -> DkimSigner<T, NeedSelector> {
        self.template.d = domain.into();
        DkimSigner {
            _state: Default::default(),
            key: self.key,
            template: self.template,
        }
    }
}

impl<T: SigningKey> DkimSigner<T, NeedSelector> {
    /// Sets the selector to use for signing.
    pub fn selector(mut self, selector: impl Into<String>) -> DkimSigner<T, NeedHeaders> {
        self.template.s = selector.into();
        DkimSigner {
            _state: Default::default(),
            key: self.key,
            template: self.template,
        }
    }
}

impl<T: SigningKey> DkimSigner<T, NeedHeaders> {
    /// Sets the headers to sign. Order, case and repetitions are kept.
    pub fn headers(
        mut self,
        headers: impl IntoIterator<Item = impl Into<String>>,
    ) -> DkimSigner<T, Done> {
        self.template.h = headers.into_iter().map(|h| h.into()).collect();
        DkimSigner {
            _state: Default::default(),
            key: self.key,
            template: self.template,
        }
    }
}

impl<T: SigningKey> DkimSigner<T, Done> {
    /// Sets header canonicalization algorithm.
    pub fn header_canonicalization(mut self, ch: Canonicalization) -> Self {
        self.template.ch = ch;
        self
    }

    /// Sets body canonicalization algorithm.
    pub fn body_canonicalization(mut self, cb: Canonicalization) -> Self {
        self.template.cb = cb;
        self
    }

    /// Sets both canonicalization algorithms from a `header/body` pair.
    pub fn canonicalization(self, (ch, cb): (Canonicalization, Canonicalization)) -> Self {
        self.header_canonicalization(ch).body_canonicalization(cb)
    }

    /// Overrides the signature timestamp (`t=`), which otherwise is the time
    /// the signer was created.
    pub fn timestamp(mut self, t: u64) -> Self {
        self.template.t = t;
        self
    }

    pub fn template(&self) -> &Signature {
        &self.template
    }

    /// Checks that the template can produce a well-formed signature.
    pub fn validate(&self) -> crate::Result<()> {
        validate_parameters(&self.template.d, &self.template.s, &self.template.h)
    }
}

/// Checks signing domain, selector and signed header names without a key,
/// so that configuration mistakes can be reported before any key is loaded.
pub fn validate_parameters(
    domain: &str,
    selector: &str,
    headers: &[impl AsRef<str>],
) -> crate::Result<()> {
    if domain.is_empty() || selector.is_empty() || headers.is_empty() {
        return Err(Error::MissingParameters);
    }

    for (tag, value) in [("d", domain), ("s", selector)] {
        if !value
            .bytes()
            .all(|ch| ch.is_ascii_graphic() && ch != b';' && ch != b'=')
        {
            return Err(Error::InvalidTag(tag));
        }
    }

    for name in headers {
        let name = name.as_ref();
        if name.is_empty() || !name.bytes().all(|ch| ch.is_ascii_graphic() && ch != b':') {
            return Err(Error::InvalidHeaderName(name.to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::validate_parameters;
    use crate::{
        common::crypto::{test::RSA_PRIVATE_KEY, RsaKey, Sha256},
        dkim::{Canonicalization, DkimSigner},
        Error, ErrorKind,
    };

    #[test]
    fn dkim_signer_validate() {
        let signer = |domain: &str, selector: &str, headers: &str| {
            DkimSigner::from_key(RsaKey::<Sha256>::from_pkcs1_pem(RSA_PRIVATE_KEY).unwrap())
                .domain(domain)
                .selector(selector)
                .headers(headers.split(':').filter(|h| !headers.is_empty() || !h.is_empty()))
        };

        for (domain, selector, headers, expected) in [
            ("example.com", "sel", "From:Subject:To:Date", Ok(())),
            ("example.com", "sel", "From:from:Received:Received", Ok(())),
            ("", "sel", "From", Err(Error::MissingParameters)),
            ("example.com", "", "From", Err(Error::MissingParameters)),
            ("example.com", "sel", "", Err(Error::MissingParameters)),
            ("exa mple.com", "sel", "From", Err(Error::InvalidTag("d"))),
            ("example.com", "s;x", "From", Err(Error::InvalidTag("s"))),
            (
                "example.com",
                "sel",
                "From::To",
                Err(Error::InvalidHeaderName("".to_string())),
            ),
            (
                "example.com",
                "sel",
                "From:Reply To",
                Err(Error::InvalidHeaderName("Reply To".to_string())),
            ),
        ] {
            let result = signer(domain, selector, headers).validate();
            assert_eq!(result, expected, "{domain} {selector} {headers}");
            if let Err(err) = result {
                assert_eq!(err.kind(), ErrorKind::Configuration);
            }
        }
    }

    #[test]
    fn dkim_parameters_without_key() {
        for (domain, selector, headers, expected) in [
            ("example.com", "sel", &["From", "To"][..], Ok(())),
            ("example.com", "sel", &[][..], Err(Error::MissingParameters)),
            ("", "sel", &["From"][..], Err(Error::MissingParameters)),
            ("example.com", "a=b", &["From"][..], Err(Error::InvalidTag("s"))),
            (
                "example.com",
                "sel",
                &["From", "To:"][..],
                Err(Error::InvalidHeaderName("To:".to_string())),
            ),
        ] {
            assert_eq!(
                validate_parameters(domain, selector, headers),
                expected,
                "{domain} {selector} {headers:?}"
            );
        }
    }

    #[test]
    fn dkim_signer_template() {
        let signer =
            DkimSigner::from_key(RsaKey::<Sha256>::from_pkcs1_pem(RSA_PRIVATE_KEY).unwrap())
                .domain("example.com")
                .selector("sel")
                .headers(["From", "from", "To"])
                .canonicalization((Canonicalization::Simple, Canonicalization::Relaxed))
                .timestamp(1704067200);
        let template = signer.template();

        assert_eq!(template.domain(), "example.com");
        assert_eq!(template.selector(), "sel");
        assert_eq!(
            template.signed_headers().collect::<Vec<_>>(),
            ["From", "from", "To"]
        );
        assert_eq!(template.header_canonicalization(), Canonicalization::Simple);
        assert_eq!(template.body_canonicalization(), Canonicalization::Relaxed);
        assert_eq!(template.timestamp(), 1704067200);
        assert!(template.body_hash().is_empty());
        assert!(template.signature().is_empty());
    }
}
