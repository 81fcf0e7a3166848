/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::{
    io::{self, IsTerminal},
    path::PathBuf,
    process,
};

use clap::{error::ErrorKind as ClapErrorKind, ArgAction, Parser};
use mail_dkim_sign::{
    common::{
        crypto::{RsaKey, Sha256},
        spool::Spool,
    },
    dkim::{
        builder::validate_parameters,
        emit::{Emitter, LineEnding},
        Canonicalization, DkimSigner, Done,
    },
};
use tracing_subscriber::{fmt::MakeWriter, util::SubscriberInitExt, EnvFilter};

/// Reads a message on standard input and writes it to standard output
/// prefixed with a DKIM-Signature header.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_flag = true)]
struct Args {
    /// Canonicalization as header/body, each `simple` or `relaxed`.
    #[arg(short = 'c', env = "DKIM_CANONICALIZATION", default_value = "relaxed/relaxed")]
    canonicalization: String,

    /// Selector (s=).
    #[arg(short = 's', env = "DKIM_SELECTOR")]
    selector: String,

    /// Signing domain (d=).
    #[arg(short = 'd', env = "DKIM_DOMAIN")]
    domain: String,

    /// Colon separated list of headers to sign.
    #[arg(
        short = 'h',
        long = "headers",
        env = "DKIM_HEADERS",
        default_value = "From:Subject:To:Date"
    )]
    headers: String,

    /// Reverse SMTP dot-stuffing on input.
    #[arg(short = 'u', long = "unstuff")]
    unstuff: bool,

    /// Write bare LF line endings.
    #[arg(short = 'n', long = "unix")]
    unix: bool,

    /// Only write the DKIM-Signature header.
    #[arg(long = "hd", visible_alias = "header-only")]
    header_only: bool,

    /// PEM encoded PKCS#1 RSA private key.
    #[arg(long = "key", env = "DKIM_KEY")]
    key: PathBuf,

    /// Fixed signature timestamp (t=), in seconds since the epoch.
    #[arg(short = 't', long = "timestamp")]
    timestamp: Option<u64>,

    /// Print help.
    #[arg(long = "help", action = ArgAction::Help)]
    help: Option<bool>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            process::exit(match err.kind() {
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => 0,
                _ => 1,
            });
        }
    };

    logger(io::stderr, io::stderr().is_terminal()).init();

    if let Err(err) = run(args) {
        tracing::debug!(kind = ?err.kind(), "signing failed");
        eprintln!("dkimsign: {err}");
        process::exit(err.exit_code());
    }
}

/// Log subscriber writing to `writer`, filtered by `RUST_LOG` (default `warn`).
fn logger<W>(writer: W, ansi: bool) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .finish()
}

/// Checks the signing parameters, then loads the key.
fn signer(args: &Args) -> mail_dkim_sign::Result<DkimSigner<RsaKey<Sha256>, Done>> {
    let canonicalization = Canonicalization::parse_pair(&args.canonicalization)?;
    let headers = args
        .headers
        .split(':')
        .filter(|_| !args.headers.is_empty())
        .map(String::from)
        .collect::<Vec<_>>();
    validate_parameters(&args.domain, &args.selector, &headers)?;

    let key = RsaKey::<Sha256>::from_pem_file(&args.key)?;
    let signer = DkimSigner::from_key(key)
        .domain(&args.domain)
        .selector(&args.selector)
        .headers(headers)
        .canonicalization(canonicalization);

    Ok(match args.timestamp {
        Some(timestamp) => signer.timestamp(timestamp),
        None => signer,
    })
}

fn run(args: Args) -> mail_dkim_sign::Result<()> {
    let signer = signer(&args)?;

    let spool = Spool::acquire(io::stdin().lock(), args.unstuff)?;
    let signature = signer.sign_spool(&spool)?;

    Emitter::new()
        .line_ending(if args.unix {
            LineEnding::Lf
        } else {
            LineEnding::Crlf
        })
        .header_only(args.header_only)
        .emit(&signature, &spool, io::stdout().lock())?;

    spool.release()
}

#[cfg(test)]
mod test {
    use std::{
        io::{self, Write},
        sync::{Arc, Mutex},
    };

    use clap::Parser;
    use mail_dkim_sign::{Error, ErrorKind};

    use super::{logger, signer, Args};

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(["dkimsign"].iter().chain(args)).unwrap()
    }

    #[test]
    fn configuration_checked_before_key() {
        for (args, expected) in [
            (
                &["-s", "", "-d", "example.com", "--key", "/nonexistent/dkim.pem"][..],
                Error::MissingParameters,
            ),
            (
                &["-s", "sel", "-d", "example.com", "-c", "bogus", "--key", "/nonexistent/dkim.pem"][..],
                Error::UnsupportedCanonicalization,
            ),
            (
                &["-s", "sel", "-d", "exa mple.com", "--key", "/nonexistent/dkim.pem"][..],
                Error::InvalidTag("d"),
            ),
            (
                &["-s", "sel", "-d", "example.com", "-h", "From:Reply To", "--key", "/nonexistent/dkim.pem"][..],
                Error::InvalidHeaderName("Reply To".to_string()),
            ),
        ] {
            let err = signer(&parse(args)).unwrap_err();
            assert_eq!(err, expected, "{args:?}");
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }

        let err = signer(&parse(&["-s", "sel", "-d", "example.com", "--key", "/nonexistent/dkim.pem"]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Key);
        assert_eq!(err.exit_code(), 1);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn logger_colours_only_on_request() {
        for ansi in [false, true] {
            let captured = Captured::default();
            let writer = captured.clone();
            tracing::subscriber::with_default(logger(move || writer.clone(), ansi), || {
                tracing::warn!(header = "Cc", "signed header not present in message");
            });

            let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
            assert!(output.contains("signed header not present in message"));
            assert_eq!(output.contains('\x1b'), ansi, "{output:?}");
        }
    }
}
