use std::{
    any::{type_name, Any},
    collections::HashMap,
    sync::{atomic::AtomicBool, Arc, PoisonError, RwLock},
};

use tracing::Level;

use crate::{error::DiError, render::Renderer};

pub const LOGGER: &str = "logger";
pub const RENDER: &str = "render";

/// Logger looked up under `"logger"`.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }
}

/// Default logger, forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "switchyard::app", "{}", message),
            Level::WARN => tracing::warn!(target: "switchyard::app", "{}", message),
            Level::INFO => tracing::info!(target: "switchyard::app", "{}", message),
            Level::DEBUG => tracing::debug!(target: "switchyard::app", "{}", message),
            _ => tracing::trace!(target: "switchyard::app", "{}", message),
        }
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Named service registry. Values are stored type-erased and checked on
/// lookup.
#[derive(Default)]
pub struct Di {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Di {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(name.into(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, DiError> {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| DiError::Missing(name.to_owned()))?;
        entry.downcast::<T>().map_err(|_| DiError::WrongType {
            name: name.to_owned(),
            expected: type_name::<T>(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn set_logger(&self, logger: impl Logger + 'static) {
        self.set::<Arc<dyn Logger>>(LOGGER, Arc::new(logger));
    }

    pub fn logger(&self) -> Result<Arc<dyn Logger>, DiError> {
        self.get::<Arc<dyn Logger>>(LOGGER).map(|l| Arc::clone(&*l))
    }

    pub fn set_renderer(&self, renderer: impl Renderer + 'static) {
        self.set::<Arc<dyn Renderer>>(RENDER, Arc::new(renderer));
    }

    pub fn renderer(&self) -> Result<Arc<dyn Renderer>, DiError> {
        self.get::<Arc<dyn Renderer>>(RENDER).map(|r| Arc::clone(&*r))
    }
}

/// What a context reaches back into the app for.
pub struct Services {
    pub(crate) di: Di,
    pub(crate) debug: AtomicBool,
}

impl Services {
    pub fn new(debug: bool) -> Self {
        let di = Di::new();
        di.set_logger(TracingLogger);
        di.set_renderer(crate::render::TemplateRenderer::default());
        Self {
            di,
            debug: AtomicBool::new(debug),
        }
    }
}
