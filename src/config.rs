use std::{env, path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use lazy_static::lazy_static;
use strum_macros::{Display, EnumString};

use crate::{app::App, render::TemplateRenderer};

pub const ENV_VAR: &str = "SWITCHYARD_ENV";

/// Deployment mode. Anything but production turns debug output on.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, EnumString, ValueEnum)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mode {
    Development,
    Production,
    Test,
}

lazy_static! {
    /// Mode taken from `SWITCHYARD_ENV` when first used. Unset or
    /// unrecognized values mean development.
    pub static ref ENV: Mode = env::var(ENV_VAR)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(Mode::Development);
}

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:4221")]
    pub addr: String,

    /// Deployment mode, defaults to $SWITCHYARD_ENV or development
    #[arg(long, value_enum, env = ENV_VAR)]
    pub mode: Option<Mode>,

    /// Show error details in responses and log at debug level
    #[arg(long)]
    pub debug: bool,

    /// Register HEAD alongside every GET route
    #[arg(long)]
    pub auto_head: bool,

    /// Match paths regardless of a trailing slash
    #[arg(long)]
    pub auto_trailing_slash: bool,

    /// Directory served under /files/
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Template directory
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Seconds an idle connection may wait for its next request, 0 waits forever
    #[arg(long, default_value_t = 10)]
    pub read_timeout: u64,
}

impl Config {
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or(*ENV)
    }

    pub fn debug(&self) -> bool {
        self.debug || self.mode() != Mode::Production
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout > 0).then(|| Duration::from_secs(self.read_timeout))
    }

    /// Applies the dispatcher settings. Routes registered afterwards see them.
    pub fn apply(&self, app: &mut App) {
        app.set_debug(self.debug());
        app.set_auto_head(self.auto_head);
        app.set_auto_trailing_slash(self.auto_trailing_slash);
        if let Some(templates) = &self.templates {
            app.set_renderer(TemplateRenderer::new(templates));
        }
    }
}
