/*!
 * Command Dispatch Table
 *
 * Ordered command name -> handler entries with an explicit default used
 * when nothing matches. Handlers receive the server context and the
 * request, and answer exclusively through the request's reply methods.
 */

use crate::error::Error;
use crate::protocol::{write_array_len, write_bulk, write_error, write_integer, write_simple};
use crate::pubsub::{Publication, Slot};
use crate::server::Server;
use bytes::{Bytes, BytesMut};
use smol_str::SmolStr;

/// A command (or hardware key) handler
pub type Handler = fn(&mut Server, &mut Request<'_>);

/// One request being dispatched, plus its reply sink
///
/// Exactly one reply is expected per request.
pub struct Request<'a> {
    /// `argv[0]` is the command token; every entry carries its own length
    pub argv: &'a [Bytes],
    /// Subscriber slot of the connection, if it holds one
    pub slot: Option<Slot>,
    out: &'a mut BytesMut,
    published: Option<Publication>,
}

impl<'a> Request<'a> {
    pub fn new(argv: &'a [Bytes], slot: Option<Slot>, out: &'a mut BytesMut) -> Self {
        Self {
            argv,
            slot,
            out,
            published: None,
        }
    }

    /// Command token as text, for messages
    pub fn command(&self) -> String {
        self.argv
            .first()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .unwrap_or_default()
    }

    /// Reply with `WrongArity` unless `min <= argc <= max`
    pub fn expect_args(&mut self, min: usize, max: usize) -> bool {
        let argc = self.argv.len();
        if argc < min || argc > max {
            let err = Error::WrongArity(self.command());
            self.respond_error(&err);
            return false;
        }
        true
    }

    pub fn respond_ok(&mut self) {
        write_simple("OK", self.out);
    }

    pub fn respond_simple(&mut self, text: &str) {
        write_simple(text, self.out);
    }

    pub fn respond_error(&mut self, err: &Error) {
        write_error(err, self.out);
    }

    pub fn respond_bulk(&mut self, data: &[u8]) {
        write_bulk(data, self.out);
    }

    pub fn respond_integer(&mut self, n: i64) {
        write_integer(n, self.out);
    }

    pub fn respond_array<I, T>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
        T: AsRef<[u8]>,
    {
        let items = items.into_iter();
        write_array_len(items.len(), self.out);
        for it in items {
            write_bulk(it.as_ref(), self.out);
        }
    }

    /// Reply `+OK` or the error
    pub fn respond(&mut self, result: crate::Result<()>) {
        match result {
            Ok(()) => self.respond_ok(),
            Err(e) => self.respond_error(&e),
        }
    }

    /// Hand a message to the transport for delivery after the reply
    pub fn publish(&mut self, publication: Publication) {
        self.published = Some(publication);
    }

    pub fn into_publication(self) -> Option<Publication> {
        self.published
    }
}

/// Ordered command table; scanned front to back, case-sensitive
pub struct CommandTable {
    entries: Vec<(SmolStr, Handler)>,
    default: Handler,
}

impl CommandTable {
    /// Empty table answering every command with `default`
    pub fn new(default: Handler) -> Self {
        Self {
            entries: Vec::new(),
            default,
        }
    }

    pub fn with(mut self, name: impl Into<SmolStr>, handler: Handler) -> Self {
        self.entries.push((name.into(), handler));
        self
    }

    /// Handler for the command token, or the default
    pub fn lookup(&self, name: &[u8]) -> Handler {
        self.entries
            .iter()
            .find(|(n, _)| n.as_bytes() == name)
            .map_or(self.default, |(_, h)| *h)
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

/// Default handler: the command is unknown, nothing else happens
pub fn unknown_command(_: &mut Server, req: &mut Request<'_>) {
    let err = Error::UnknownCommand(req.command());
    req.respond_error(&err);
}
