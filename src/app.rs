use std::{
    any::Any,
    mem,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::{atomic::Ordering, Arc},
};

use anyhow::anyhow;
use tracing::{debug, error};

use crate::{
    config::{Mode, ENV},
    context::Context,
    di::{Logger, Services},
    error::{DiError, RouteError, UrlError},
    file_server::{StaticFiles, FILE_PARAM},
    handler::{self, BoxedHandler, ErrorHandler, Handler},
    http_method::HttpMethod,
    pool::{Pool, DEFAULT_MAX_IDLE},
    render::Renderer,
    request::Request,
    response_writer::ResponseWriter,
    router::{Route, Router},
    server::ServeHttp,
    status_code_registry::ReasonPhrase,
};

/// The dispatcher: routes, global middleware, hooks and services, plus the
/// pool of contexts requests run in.
///
/// Registration needs `&mut App`, dispatching only `&App`, so a configured
/// app can be shared by every connection thread without locking.
pub struct App {
    router: Router,
    services: Arc<Services>,
    middleware: Vec<BoxedHandler>,
    not_found: BoxedHandler,
    error_handler: ErrorHandler,
    pool: Pool<Context>,
}

/// A freshly registered route, to be named or inspected.
pub struct RouteHandle<'a> {
    router: &'a mut Router,
    route: Arc<Route>,
}

impl RouteHandle<'_> {
    /// Names the route for `App::url_for`. Names are unique per app.
    pub fn name(self, name: &str) -> Result<Arc<Route>, RouteError> {
        self.router.name(&self.route, name)?;
        Ok(self.route)
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn into_route(self) -> Arc<Route> {
        self.route
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE)
    }

    /// An app whose context pool keeps at most `max_idle` idle contexts.
    pub fn with_max_idle(max_idle: usize) -> Self {
        let services = Arc::new(Services::new(*ENV != Mode::Production));
        let shared = Arc::clone(&services);
        Self {
            router: Router::new(),
            services,
            middleware: vec![],
            not_found: handler::boxed(not_found),
            error_handler: Arc::new(internal_error),
            pool: Pool::with_max_idle(move || Context::new(Arc::clone(&shared)), max_idle)
                .with_reset(Context::clear),
        }
    }

    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
    // registration
    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

    pub fn add(
        &mut self,
        method: HttpMethod,
        pattern: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<RouteHandle<'_>, RouteError> {
        let route = self.router.handle(method, pattern, handlers)?;
        Ok(self.handle_for(route))
    }

    fn handle_for(&mut self, route: Arc<Route>) -> RouteHandle<'_> {
        RouteHandle {
            router: &mut self.router,
            route,
        }
    }

    /// Registers a GET route. With auto-HEAD on, the same chain is also
    /// registered for HEAD unless that pattern already has a HEAD route.
    pub fn get(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<RouteHandle<'_>, RouteError> {
        let route = if self.router.auto_head && !self.router.contains(HttpMethod::Head, pattern) {
            self.router.handle_also(HttpMethod::Get, HttpMethod::Head, pattern, handlers)?
        } else {
            self.router.handle(HttpMethod::Get, pattern, handlers)?
        };
        Ok(self.handle_for(route))
    }

    pub fn post(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(HttpMethod::Post, pattern, handlers)
    }

    pub fn put(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(HttpMethod::Put, pattern, handlers)
    }

    pub fn patch(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(HttpMethod::Patch, pattern, handlers)
    }

    pub fn delete(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(HttpMethod::Delete, pattern, handlers)
    }

    pub fn head(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(HttpMethod::Head, pattern, handlers)
    }

    pub fn options(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<RouteHandle<'_>, RouteError> {
        self.add(HttpMethod::Options, pattern, handlers)
    }

    /// Registers the chain under every method. The handle refers to the last
    /// route created.
    pub fn any(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<RouteHandle<'_>, RouteError> {
        let methods: Vec<HttpMethod> = Router::methods().collect();
        self.add_all(&methods, pattern, handlers)
    }

    /// Registers the chain under a comma separated list of methods, or every
    /// method for `"*"`. Names are matched ignoring case. Unknown methods fail
    /// before anything is registered.
    pub fn route(
        &mut self,
        pattern: &str,
        methods: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<RouteHandle<'_>, RouteError> {
        let methods: Vec<HttpMethod> = if methods.trim() == "*" {
            Router::methods().collect()
        } else {
            methods
                .split(',')
                .map(|m| {
                    let m = m.trim();
                    m.to_ascii_uppercase()
                        .parse::<HttpMethod>()
                        .map_err(|_| RouteError::UnknownMethod(m.to_owned()))
                })
                .collect::<Result<_, _>>()?
        };
        self.add_all(&methods, pattern, handlers)
    }

    fn add_all(
        &mut self,
        methods: &[HttpMethod],
        pattern: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<RouteHandle<'_>, RouteError> {
        let mut last = None;
        for &method in methods {
            last = Some(self.router.handle(method, pattern, handlers.clone())?);
        }
        let route = last.ok_or(RouteError::EmptyArgument("methods"))?;
        Ok(self.handle_for(route))
    }

    /// Runs `register` with `prefix` prepended to every pattern and `shared`
    /// prepended to every chain. Groups nest; the outer prefix and middleware
    /// are restored afterwards, also when `register` fails.
    pub fn group<F>(&mut self, prefix: &str, shared: Vec<BoxedHandler>, register: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut App) -> Result<(), RouteError>,
    {
        let outer = self.router.enter_group(prefix, shared);
        let result = register(self);
        self.router.leave_group(outer);
        result
    }

    pub fn name_route(&mut self, route: &Arc<Route>, name: &str) -> Result<(), RouteError> {
        self.router.name(route, name)
    }

    pub fn url_for(&self, name: &str, args: &[&str]) -> Result<String, UrlError> {
        self.router.url_for(name, args)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serves files below `dir` under `prefix`. See `StaticFiles`.
    pub fn serve_static(
        &mut self,
        prefix: &str,
        dir: impl Into<PathBuf>,
        listing: bool,
    ) -> Result<RouteHandle<'_>, RouteError> {
        self.static_files(prefix, StaticFiles::new(dir, listing))
    }

    pub fn static_files(&mut self, prefix: &str, files: StaticFiles) -> Result<RouteHandle<'_>, RouteError> {
        if prefix.is_empty() {
            return Err(RouteError::EmptyArgument("static prefix"));
        }
        if files.dir().as_os_str().is_empty() {
            return Err(RouteError::EmptyArgument("static dir"));
        }

        let mut pattern = prefix.to_owned();
        if !pattern.ends_with('/') {
            pattern.push('/');
        }
        pattern.push('*');
        pattern.push_str(FILE_PARAM);
        self.get(&pattern, vec![handler::boxed(files)])
    }

    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
    // middleware & hooks
    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

    /// Appends to the global middleware, which runs before every chain,
    /// not-found included. Affects requests dispatched from now on.
    pub fn use_middleware(&mut self, handler: impl Handler + 'static) {
        self.middleware.push(handler::boxed(handler));
    }

    pub fn set_not_found(&mut self, handler: impl Handler + 'static) {
        self.not_found = handler::boxed(handler);
    }

    pub fn set_error(&mut self, handler: impl Fn(&anyhow::Error, &mut Context) + Send + Sync + 'static) {
        self.error_handler = Arc::new(handler);
    }

    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
    // settings & services
    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

    pub fn set_debug(&mut self, debug: bool) {
        self.services.debug.store(debug, Ordering::Relaxed);
    }

    pub fn debug(&self) -> bool {
        self.services.debug.load(Ordering::Relaxed)
    }

    /// Only GET routes registered after this call get a HEAD twin.
    pub fn set_auto_head(&mut self, auto_head: bool) {
        self.router.auto_head = auto_head;
    }

    pub fn set_auto_trailing_slash(&mut self, auto_trailing_slash: bool) {
        self.router.auto_trailing_slash = auto_trailing_slash;
    }

    pub fn set_di<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: T) {
        self.services.di.set(name, value);
    }

    pub fn get_di<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, DiError> {
        self.services.di.get(name)
    }

    pub fn set_logger(&mut self, logger: impl Logger + 'static) {
        self.services.di.set_logger(logger);
    }

    pub fn set_renderer(&mut self, renderer: impl Renderer + 'static) {
        self.services.di.set_renderer(renderer);
    }

    pub fn logger(&self) -> Result<Arc<dyn Logger>, DiError> {
        self.services.di.logger()
    }

    pub fn renderer(&self) -> Result<Arc<dyn Renderer>, DiError> {
        self.services.di.renderer()
    }

    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
    // dispatch
    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

    /// Runs one request through its chain in a pooled context and hands the
    /// response and request back. Faults never escape: an `Err` or a panic
    /// from a handler abandons the chain and goes to the error handler.
    pub fn dispatch(&self, w: ResponseWriter, r: Request) -> (ResponseWriter, Request) {
        let mut c = self.pool.acquire();
        c.reset(w, r);

        if !c.prepare(&self.router, &self.middleware, &self.not_found) {
            debug!(method = c.method(), path = c.path(), "no route");
        }

        let fault = match panic::catch_unwind(AssertUnwindSafe(|| c.next())) {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => Some(anyhow!("handler panicked: {}", panic_message(&*payload))),
        };

        if let Some(err) = fault {
            error!(method = c.method(), path = c.path(), "{:#}", err);
            c.abort();
            let handled = panic::catch_unwind(AssertUnwindSafe(|| (self.error_handler)(&err, &mut *c)));
            if handled.is_err() {
                error!("error handler panicked");
                internal_error(&err, &mut *c);
            }
        }

        c.finish()
    }
}

impl ServeHttp for App {
    fn serve(&self, w: &mut ResponseWriter, r: &mut Request) {
        let (resp, req) = self.dispatch(mem::take(w), mem::take(r));
        *w = resp;
        *r = req;
    }
}

fn not_found(c: &mut Context) -> anyhow::Result<()> {
    c.text(ReasonPhrase::NotFound.status_code(), ReasonPhrase::NotFound);
    Ok(())
}

/// Replaces whatever the chain built with a 500. The error chain is only
/// shown in debug mode.
fn internal_error(err: &anyhow::Error, c: &mut Context) {
    let code = ReasonPhrase::InternalServerError.status_code();
    *c.resp_mut() = ResponseWriter::new_empty();
    if c.debug() {
        c.text(code, format_args!("{:#}", err));
    } else {
        c.text(code, ReasonPhrase::InternalServerError);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
