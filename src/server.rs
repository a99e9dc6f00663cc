use std::{
    io::Write,
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    thread,
    time::Duration,
};

use tracing::{error, info, span, Level, Span};

use crate::{
    request::{EndOfFile, Request, RequestReader},
    response_writer::ResponseWriter,
    status_code_registry::ReasonPhrase,
};

/// The transport's native handler shape. `App` implements it, so does any
/// `Fn(&mut ResponseWriter, &mut Request)`.
pub trait ServeHttp {
    fn serve(&self, w: &mut ResponseWriter, r: &mut Request);
}

impl<T> ServeHttp for T
where
    T: Fn(&mut ResponseWriter, &mut Request),
{
    fn serve(&self, w: &mut ResponseWriter, r: &mut Request) {
        self(w, r)
    }
}

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    read_timeout: Option<Duration>,
}

impl Server {
    pub fn new(addr: impl ToSocketAddrs) -> anyhow::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr)?,
            read_timeout: Some(Duration::from_secs(10)),
        })
    }

    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the listener fails for good. Each connection
    /// gets its own scoped thread, requests on one connection are served in
    /// order.
    pub fn run(&self, handler: &(impl ServeHttp + Sync)) {
        let read_timeout = self.read_timeout;
        thread::scope(|s| {
            for stream in self.listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(err) => {
                        error!(?err);
                        continue;
                    }
                };

                s.spawn(move || {
                    let span = create_conn_span(&stream);
                    let _guard = span.enter();
                    info!("new conn");

                    if let Err(err) = handle_connection(stream, read_timeout, handler) {
                        error!(?err);
                    }

                    info!("conn end");
                });
            }
        });
    }
}

#[derive(Debug)]
enum ConnCtrl {
    KeepAlive,
    Close,
}

fn handle_connection(
    stream: TcpStream,
    read_timeout: Option<Duration>,
    handler: &impl ServeHttp,
) -> anyhow::Result<()> {
    let (reader, writer) = (&stream, &stream);
    reader.set_read_timeout(read_timeout)?;
    let mut request_reader = RequestReader::new(reader);

    loop {
        match handle_request(&mut request_reader, writer, handler)? {
            ConnCtrl::KeepAlive => continue,
            ConnCtrl::Close => return Ok(()),
        }
    }
}

fn handle_request(
    request_reader: &mut RequestReader<&TcpStream>,
    mut writer: &TcpStream,
    handler: &impl ServeHttp,
) -> anyhow::Result<ConnCtrl> {
    let mut r = match request_reader.read() {
        Ok(r) => r,
        Err(err) => {
            if err.downcast_ref::<EndOfFile>().is_some() {
                return Ok(ConnCtrl::Close);
            }

            error!(?err);
            let mut w = ResponseWriter::new_empty();
            w.set_reason_phrase(ReasonPhrase::BadRequest);
            w.set_header("Connection", "close");
            writer.write_all(&w.write(true))?;
            return Ok(ConnCtrl::Close);
        }
    };

    let span = create_req_span(&r);
    let _guard = span.enter();

    let conn_ctrl = if r.wants_close() {
        ConnCtrl::Close
    } else {
        ConnCtrl::KeepAlive
    };
    let include_body = !r.get_http_method().eq_ignore_ascii_case("HEAD");

    let mut w = ResponseWriter::new_empty();
    handler.serve(&mut w, &mut r);
    writer.write_all(&w.write(include_body))?;
    Ok(conn_ctrl)
}

fn create_conn_span(stream: &TcpStream) -> Span {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => addr.to_string(),
        Err(err) => {
            error!(?err);
            "unknown".to_owned()
        }
    };

    span!(Level::INFO, "conn", peer_addr)
}

fn create_req_span(r: &Request) -> Span {
    span!(
        Level::INFO,
        "req",
        method = r.get_http_method(),
        target = r.get_request_target()
    )
}

#[cfg(test)]
pub mod tests {
    use std::{
        io::{BufReader, Read, Write},
        net::{TcpListener, TcpStream},
        thread,
        time::Duration,
    };

    use crate::{
        request::Request, response_writer::ResponseWriter, status_code_registry::ReasonPhrase,
    };

    use super::{handle_connection, Server};

    fn noop(_: &mut ResponseWriter, _: &mut Request) {}

    #[test]
    fn test_request_reader_timeout() {
        let timeout = Some(Duration::from_millis(100));

        let listener = TcpListener::bind("localhost:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            handle_connection(stream, timeout, &noop)
        });

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n").unwrap();

        // The request never completes. The read times out, the server answers
        // 400 and closes instead of hanging.
        server_handle.join().unwrap().unwrap();

        let mut resp = String::new();
        client.read_to_string(&mut resp).unwrap();
        assert!(resp.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_persistent_connection() {
        let timeout = Some(Duration::from_millis(100));

        let server = Server::new("localhost:0").unwrap();
        let addr = server.local_addr().unwrap();

        thread::spawn(move || {
            server.run(&|w: &mut ResponseWriter, _: &mut Request| {
                w.set_reason_phrase(ReasonPhrase::OK);
            });
        });

        let stream = TcpStream::connect(addr).unwrap();
        let (r, mut writer) = (&stream, &stream);
        r.set_read_timeout(timeout).unwrap();
        let mut reader = BufReader::new(r);

        writer.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        // Read to end tries to read until EOF but cannot do so
        // because the connection is not closed.
        // Instead, the timeout expires and an error is returned.
        let mut buf = vec![];
        let res = reader.read_to_end(&mut buf);
        res.unwrap_err();
    }

    #[test]
    fn test_head_response_has_no_body() {
        let server = Server::new("localhost:0").unwrap();
        let addr = server.local_addr().unwrap();

        thread::spawn(move || {
            server.run(&|w: &mut ResponseWriter, _: &mut Request| {
                w.set_body_str("hello");
            });
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .write_all(b"HEAD / HTTP/1.1\r\nConnection: close\r\n\r\n")
            .unwrap();
        let mut resp = String::new();
        stream.read_to_string(&mut resp).unwrap();
        assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(resp.ends_with("Content-Length: 5\r\n\r\n"));
    }
}
