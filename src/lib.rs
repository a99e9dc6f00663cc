#[macro_use]
pub mod handler;

pub mod app;
pub mod config;
pub mod context;
pub mod di;
pub mod error;
pub mod file_server;
pub mod http_method;
pub mod middleware;
pub mod pool;
pub mod render;
pub mod request;
pub mod response_writer;
pub mod router;
pub mod server;
pub mod status_code_registry;

#[cfg(test)]
mod test_utils;

use std::{fs, path::PathBuf};

use clap::Parser;
use tracing::{info, Level};

pub use app::{App, RouteHandle};
pub use config::{Config, Mode};
pub use context::Context;
pub use error::{DiError, RouteError, UrlError};
pub use handler::{boxed, handler_fn, native, BoxedHandler, Handler};
pub use http_method::HttpMethod;
pub use request::Request;
pub use response_writer::ResponseWriter;
pub use server::{ServeHttp, Server};
pub use status_code_registry::ReasonPhrase;

fn home(c: &mut Context) -> anyhow::Result<()> {
    c.status(ReasonPhrase::OK.status_code());
    Ok(())
}

fn echo(c: &mut Context) -> anyhow::Result<()> {
    let value = c.param("str").unwrap_or_default().to_owned();
    c.text(ReasonPhrase::OK.status_code(), value);
    Ok(())
}

fn user_agent(c: &mut Context) -> anyhow::Result<()> {
    let agent = c.header("user-agent").unwrap_or_default().to_owned();
    c.text(ReasonPhrase::OK.status_code(), agent);
    Ok(())
}

fn upload(dir: PathBuf) -> impl Handler {
    handler_fn(move |c| {
        let name = c.param("name").unwrap_or_default();
        let Ok(path) = file_server::build_path(&dir, name) else {
            c.text(ReasonPhrase::BadRequest.status_code(), ReasonPhrase::BadRequest);
            return Ok(());
        };
        fs::write(&path, c.body().unwrap_or_default())?;
        c.status(ReasonPhrase::Created.status_code());
        Ok(())
    })
}

/// Parses the command line, builds the demo app and serves it until the
/// listener fails.
pub fn run() -> anyhow::Result<()> {
    let config = Config::parse();
    let level = if config.debug() { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut app = App::new();
    config.apply(&mut app);
    app.use_middleware(middleware::access_log::new());
    app.use_middleware(middleware::gzip::new());

    app.get("/", handlers![home])?;
    app.get("/echo/:str", handlers![echo])?.name("echo")?;
    app.get("/user-agent", handlers![user_agent])?;
    if let Some(dir) = &config.directory {
        app.serve_static("/files/", dir, false)?;
        app.post("/files/:name", handlers![upload(dir.clone())])?;
    }

    let server = Server::new(&config.addr)?.with_read_timeout(config.read_timeout());
    info!(mode = %config.mode(), "listening on {}", server.local_addr()?);
    server.run(&app);
    Ok(())
}
