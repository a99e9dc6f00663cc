use std::io::Read;

use flate2::{bufread::GzEncoder, Compression};
use tracing::error;

use crate::handler::{handler_fn, Handler};

/// Gzips the response body once the rest of the chain has run, if the client
/// accepts gzip. Empty or already encoded bodies are left alone.
pub fn new() -> impl Handler {
    handler_fn(|c| {
        c.next()?;

        let body = c.resp().get_body();
        if body.is_empty() || c.resp().get_header("Content-Encoding").is_some() {
            return Ok(());
        }

        let accepts_gzip = c
            .req()
            .get_header_values("accept-encoding")
            .any(|encoding| encoding.split(';').next() == Some("gzip"));
        if !accepts_gzip {
            return Ok(());
        }

        let Some(content_type) = c.resp().get_content_type_header() else {
            error!("Content-Type is supposed to be present");
            return Ok(());
        };
        let content_type = String::from(content_type);

        let mut buffer = vec![];
        GzEncoder::new(body, Compression::fast()).read_to_end(&mut buffer)?;

        c.resp_mut().set_body(buffer, &content_type);
        c.set_header("Content-Encoding", "gzip");
        Ok(())
    })
}
