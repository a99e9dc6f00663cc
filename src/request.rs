use std::{
    collections::HashMap,
    io::{BufRead, BufReader, ErrorKind, Read, Take},
};

use thiserror::Error;
use tracing::debug;

const REQUEST_LINE_LIMIT: u64 = 1024;
const HEADERS_LIMIT: u64 = 8 * 1024;
const BODY_LIMIT: usize = 8 * 1024 * 1024;

/// A parsed HTTP/1.1 request as handed to the dispatcher by the transport.
#[derive(Debug, Default, Clone)]
pub struct Request {
    http_method: String,
    request_target: String,
    http_version: String,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(
        http_method: impl Into<String>,
        request_target: impl Into<String>,
        headers: HashMap<String, String>,
        body: Option<Vec<u8>>,
    ) -> Self {
        Self {
            http_method: http_method.into(),
            request_target: request_target.into(),
            http_version: "HTTP/1.1".to_owned(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            body,
        }
    }

    pub fn get_http_method(&self) -> &str {
        &self.http_method
    }

    /// The raw request target, query string included.
    pub fn get_request_target(&self) -> &str {
        &self.request_target
    }

    /// The request target without its query string. This is what routing sees.
    pub fn get_path(&self) -> &str {
        match self.request_target.split_once('?') {
            Some((path, _)) => path,
            None => &self.request_target,
        }
    }

    pub fn get_query_string(&self) -> Option<&str> {
        self.request_target.split_once('?').map(|(_, q)| q)
    }

    /// First value of `key` in the query string. Values are not percent-decoded.
    pub fn get_query(&self, key: &str) -> Option<&str> {
        self.get_query_string()?
            .split('&')
            .filter_map(|pair| match pair.split_once('=') {
                Some((k, v)) => Some((k, v)),
                None if !pair.is_empty() => Some((pair, "")),
                None => None,
            })
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn get_http_version(&self) -> &str {
        &self.http_version
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(|v| v.as_str())
    }

    /// Comma separated header values, trimmed.
    pub fn get_header_values(&self, key: &str) -> impl Iterator<Item = &str> + '_ {
        self.get_header(key)
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// HTTP/1.1 connections persist unless the client sends `close`,
    /// HTTP/1.0 ones only when it asks for `keep-alive`.
    pub fn wants_close(&self) -> bool {
        let mut values = self.get_header_values("connection");
        if self.get_http_version() == "HTTP/1.0" {
            !values.any(|v| v.eq_ignore_ascii_case("keep-alive"))
        } else {
            values.any(|v| v.eq_ignore_ascii_case("close"))
        }
    }
}

#[derive(Error, Debug)]
#[error("end of file")]
pub struct EndOfFile;

#[derive(Error, Debug)]
#[error("invalid request")]
pub struct InvalidRequest;

pub struct RequestReader<R> {
    buf_reader: Take<BufReader<R>>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(r: R) -> Self {
        Self {
            buf_reader: BufReader::new(r).take(u64::MAX),
        }
    }

    fn read_crlf_line(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        self.buf_reader.read_line(&mut line)?;
        let line = line.strip_suffix("\r\n").ok_or(InvalidRequest)?;
        Ok(line.to_owned())
    }

    pub fn read(&mut self) -> anyhow::Result<Request> {
        let mut request_line = String::new();
        self.buf_reader.set_limit(REQUEST_LINE_LIMIT);
        let n = self.buf_reader.read_line(&mut request_line)?;
        if n == 0 {
            Err(EndOfFile)?
        }
        let request_line = request_line.strip_suffix("\r\n").ok_or(InvalidRequest)?;

        let mut parts = request_line.split(' ');
        let (Some(http_method), Some(request_target), Some(http_version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(InvalidRequest.into());
        };
        if !request_target.starts_with('/') && request_target != "*" {
            Err(InvalidRequest)?
        }
        debug!(request_line);

        let mut request = Request {
            http_method: http_method.to_owned(),
            request_target: request_target.to_owned(),
            http_version: http_version.to_owned(),
            ..Default::default()
        };

        self.buf_reader.set_limit(HEADERS_LIMIT);
        loop {
            let line = self.read_crlf_line()?;
            if line.is_empty() {
                break;
            }
            let (k, v) = line.split_once(':').ok_or(InvalidRequest)?;
            request.headers.insert(k.trim().to_lowercase(), v.trim().to_owned());
        }

        if let Some(content_length) = request.get_header("content-length") {
            let content_length: usize = content_length.parse().map_err(|_| InvalidRequest)?;
            if content_length > BODY_LIMIT {
                Err(InvalidRequest)?
            }
            self.buf_reader.set_limit(content_length as u64);
            let mut buf = vec![0; content_length];
            if let Err(err) = self.buf_reader.read_exact(&mut buf) {
                if err.kind() == ErrorKind::UnexpectedEof {
                    Err(InvalidRequest)?
                } else {
                    Err(err)?
                }
            }
            request.body = Some(buf);
        }

        Ok(request)
    }
}
