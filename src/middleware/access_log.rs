use std::time::Instant;

use tracing::info;

use crate::handler::{handler_fn, Handler};

/// Logs every request once its chain has run, errors included.
pub fn new() -> impl Handler {
    handler_fn(|c| {
        let start = Instant::now();
        let result = c.next();
        info!(
            method = c.method(),
            path = c.path(),
            status = c.resp().get_status_code().unwrap_or(200),
            failed = result.is_err(),
            elapsed = ?start.elapsed(),
            "request"
        );
        result
    })
}
