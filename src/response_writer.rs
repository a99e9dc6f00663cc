use bytes::{BufMut, BytesMut};

use crate::status_code_registry::{self, ReasonPhrase};

#[derive(Debug, Default)]
pub struct ResponseWriter {
    status_code: Option<u16>,
    reason_phrase: Option<String>,
    headers: Vec<(String, String)>,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// `None` until a handler picks a status. The transport sends 200 then.
    pub fn get_status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn set_status_code(&mut self, status_code: u16) {
        self.status_code = Some(status_code);
        self.reason_phrase =
            status_code_registry::get_reason_phrase(status_code).map(|r| r.to_string());
    }

    pub fn set_reason_phrase(&mut self, reason_phrase: ReasonPhrase) {
        self.status_code = Some(reason_phrase.status_code());
        self.reason_phrase = Some(reason_phrase.to_string());
    }

    pub fn set_header(&mut self, k: impl Into<String>, v: impl Into<String>) {
        let (k, v) = (k.into(), v.into());
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|entry| entry.0.eq_ignore_ascii_case(&k))
        {
            entry.1 = v;
        } else {
            self.headers.push((k, v));
        }
    }

    pub fn get_header(&self, k: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|entry| entry.0.eq_ignore_ascii_case(k))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_content_type_header(&self) -> Option<&str> {
        self.get_header("Content-Type")
    }

    pub fn get_body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: impl AsRef<[u8]>, content_type: &str) {
        self.body.clear();
        self.body.put_slice(body.as_ref());
        self.set_header("Content-Type", content_type);
    }

    pub fn set_body_str(&mut self, body: &str) {
        self.set_body(body, "text/plain; charset=utf-8");
    }

    /// Serializes the response. `Content-Length` always reflects the body,
    /// even when `include_body` is false (HEAD).
    pub fn write(&self, include_body: bool) -> Vec<u8> {
        let status_code = self.status_code.unwrap_or(200);
        let mut resp = Vec::with_capacity(128 + self.body.len());
        resp.extend_from_slice(format!("HTTP/1.1 {}", status_code).as_bytes());
        let reason_phrase = self
            .reason_phrase
            .as_deref()
            .or_else(|| self.status_code.is_none().then_some(ReasonPhrase::OK.as_str()));
        if let Some(reason_phrase) = reason_phrase {
            resp.push(b' ');
            resp.extend_from_slice(reason_phrase.as_bytes());
        }
        resp.extend_from_slice(b"\r\n");

        for (k, v) in &self.headers {
            if k.eq_ignore_ascii_case("content-length") {
                continue;
            }
            resp.extend_from_slice(format!("{}: {}\r\n", k, v).as_bytes());
        }
        resp.extend_from_slice(format!("Content-Length: {}\r\n\r\n", self.body.len()).as_bytes());

        if include_body {
            resp.extend_from_slice(&self.body);
        }
        resp
    }
}
