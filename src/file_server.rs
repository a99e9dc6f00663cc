use std::{
    fmt::Write as _,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{context::Context, handler::Handler, status_code_registry::ReasonPhrase};

/// Name of the wildcard the static route binds the file path under.
pub const FILE_PARAM: &str = "file";

/// Serves files below `dir` for a `<prefix>/*file` route.
///
/// Directories are answered with their `index.html`, or a listing when
/// `listing` is set, or 403 otherwise. The optional `hook` runs after a file
/// is served, e.g. to add caching headers.
pub struct StaticFiles {
    dir: PathBuf,
    listing: bool,
    hook: Option<Box<dyn Fn(&mut Context) + Send + Sync>>,
}

impl StaticFiles {
    pub fn new(dir: impl Into<PathBuf>, listing: bool) -> Self {
        Self {
            dir: dir.into(),
            listing,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: impl Fn(&mut Context) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn serve_file(&self, c: &mut Context, path: &Path) {
        match fs::read(path) {
            Ok(contents) => {
                c.bytes(ReasonPhrase::OK.status_code(), &contents, content_type(path));
                if let Some(hook) = &self.hook {
                    hook(c);
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                c.text(ReasonPhrase::NotFound.status_code(), ReasonPhrase::NotFound);
            }
            Err(err) => {
                error!("{:?}", err);
                c.text(
                    ReasonPhrase::InternalServerError.status_code(),
                    ReasonPhrase::InternalServerError,
                );
            }
        }
    }

    fn serve_dir(&self, c: &mut Context, path: &Path, suffix: &str) -> anyhow::Result<()> {
        let index = path.join("index.html");
        if index.is_file() {
            self.serve_file(c, &index);
            return Ok(());
        }
        if !self.listing {
            c.text(ReasonPhrase::Forbidden.status_code(), ReasonPhrase::Forbidden);
            return Ok(());
        }

        let mut names: Vec<String> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() {
                    name.push('/');
                }
                name
            })
            .collect();
        names.sort();

        let base = c.path().trim_end_matches('/').to_owned();
        let mut body = String::from("<pre>\n");
        for name in names {
            writeln!(body, "<a href=\"{}/{}\">{}</a>", base, name, name)?;
        }
        body.push_str("</pre>\n");
        debug!(dir = suffix, "listing");
        c.html(ReasonPhrase::OK.status_code(), &body);
        Ok(())
    }
}

impl Handler for StaticFiles {
    fn handle(&self, c: &mut Context) -> anyhow::Result<()> {
        let suffix = c.param(FILE_PARAM).unwrap_or_default().to_owned();
        let Ok(path) = build_path(&self.dir, &suffix) else {
            c.text(ReasonPhrase::BadRequest.status_code(), ReasonPhrase::BadRequest);
            return Ok(());
        };
        debug!("file path: {:?}", path);

        if path.is_dir() {
            self.serve_dir(c, &path, &suffix)?;
        } else {
            self.serve_file(c, &path);
        }
        c.next()
    }
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[derive(Error, Debug)]
#[error("invalid path")]
pub struct InvalidPath;

/// Joins `suffix` onto `base_path`, refusing anything that escapes it.
pub fn build_path(
    base_path: impl AsRef<Path>,
    suffix: impl AsRef<Path>,
) -> Result<PathBuf, InvalidPath> {
    let path = path_clean::clean(base_path.as_ref().join(&suffix));
    let base = path_clean::clean(base_path.as_ref());

    let escapes = if base == Path::new(".") {
        path.is_absolute() || path.starts_with("..")
    } else {
        !path.starts_with(&base)
    };
    if escapes {
        warn!("file path: {:?}", path);
        return Err(InvalidPath);
    }
    Ok(path)
}
