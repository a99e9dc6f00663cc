use std::{
    collections::HashMap,
    io::{self, ErrorKind, Read},
    iter::{self, Chain, Repeat},
};

use crate::{
    app::App, context::Context, request::Request, response_writer::ResponseWriter,
    server::ServeHttp,
};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Runs one request through `app` without a socket.
pub fn dispatch(app: &App, http_method: &str, target: &str) -> ResponseWriter {
    dispatch_with(app, Request::new(http_method, target, HashMap::new(), None))
}

pub fn dispatch_with(app: &App, mut r: Request) -> ResponseWriter {
    let mut w = ResponseWriter::new_empty();
    app.serve(&mut w, &mut r);
    w
}

/// Passes straight through to the rest of the chain.
pub fn noop(c: &mut Context) -> anyhow::Result<()> {
    c.next()
}

pub fn body_str(w: &ResponseWriter) -> &str {
    std::str::from_utf8(w.get_body()).unwrap()
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
// ErrReader
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

/// Yields `prefix` one byte at a time, then fails.
pub struct ErrReader<I> {
    it: I,
}

impl<I> ErrReader<I> {
    pub fn new(prefix: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            it: prefix.into_iter(),
        }
    }
}

impl<'a, I: Iterator<Item = &'a u8>> Read for ErrReader<I> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.it.next() {
            Some(byte) => {
                buf[0] = *byte;
                Ok(1)
            }
            None => Err(io::Error::new(ErrorKind::Other, "error")),
        }
    }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
// InfReader
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

/// Yields `prefix`, then `repeat` forever.
pub struct InfReader {
    it: Chain<std::vec::IntoIter<u8>, Repeat<u8>>,
}

impl InfReader {
    pub fn new<'a>(prefix: impl IntoIterator<Item = &'a u8>, repeat: u8) -> Self {
        let prefix: Vec<u8> = prefix.into_iter().copied().collect();
        Self {
            it: prefix.into_iter().chain(iter::repeat(repeat)),
        }
    }
}

impl Read for InfReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        for (slot, byte) in buf.iter_mut().zip(self.it.by_ref()) {
            *slot = byte;
            n += 1;
        }
        Ok(n)
    }
}
