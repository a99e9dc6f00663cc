use std::{fs, path::PathBuf};

use anyhow::Context as _;

use crate::file_server::build_path;

/// Template variables, substituted for `{{name}}`.
pub type Data<'a> = [(&'a str, &'a str)];

/// Renderer looked up under `"render"`.
pub trait Renderer: Send + Sync {
    fn render(&self, out: &mut Vec<u8>, template: &str, data: &Data<'_>) -> anyhow::Result<()>;
}

/// Reads `<dir>/<template>` and replaces `{{name}}` placeholders with
/// HTML-escaped values. Unknown placeholders render empty.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    dir: PathBuf,
}

impl TemplateRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new("templates")
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, out: &mut Vec<u8>, template: &str, data: &Data<'_>) -> anyhow::Result<()> {
        let path = build_path(&self.dir, template)?;
        let source = fs::read_to_string(&path)
            .with_context(|| format!("template {}", path.display()))?;
        expand(out, &source, data);
        Ok(())
    }
}

fn expand(out: &mut Vec<u8>, mut source: &str, data: &Data<'_>) {
    while let Some(start) = source.find("{{") {
        let Some(len) = source[start + 2..].find("}}") else {
            break;
        };
        out.extend_from_slice(source[..start].as_bytes());
        let key = source[start + 2..start + 2 + len].trim();
        if let Some((_, value)) = data.iter().find(|(k, _)| *k == key) {
            escape_into(out, value);
        }
        source = &source[start + 2 + len + 2..];
    }
    out.extend_from_slice(source.as_bytes());
}

fn escape_into(out: &mut Vec<u8>, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            '"' => out.extend_from_slice(b"&quot;"),
            '\'' => out.extend_from_slice(b"&#39;"),
            _ => {
                let mut buf = [0; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}
