use std::{
    fmt::{self, Display},
    mem,
    str::FromStr,
    sync::{atomic::Ordering, Arc},
};

use anyhow::Context as _;

use crate::{
    di::{Logger, Services},
    error::DiError,
    handler::BoxedHandler,
    render::{Data, Renderer},
    request::Request,
    response_writer::ResponseWriter,
    router::{Params, Route, Router},
};

/// Per-request state: the request, the response being built, the handler
/// chain with its cursor, and the bound path parameters.
///
/// Contexts are pooled by the app. Everything request-specific is replaced
/// in `reset`, so nothing carries over between requests.
pub struct Context {
    req: Request,
    resp: ResponseWriter,
    handlers: Vec<BoxedHandler>,
    cursor: usize,
    params: Params,
    route: Option<Arc<Route>>,
    services: Arc<Services>,
}

impl Context {
    pub(crate) fn new(services: Arc<Services>) -> Self {
        Self {
            req: Request::default(),
            resp: ResponseWriter::new_empty(),
            handlers: vec![],
            cursor: 0,
            params: Params::new(),
            route: None,
            services,
        }
    }

    pub fn reset(&mut self, resp: ResponseWriter, req: Request) {
        self.clear();
        self.resp = resp;
        self.req = req;
    }

    /// Drops everything the last request left behind. Buffers are kept.
    pub(crate) fn clear(&mut self) {
        self.handlers.clear();
        self.cursor = 0;
        self.params.clear();
        self.route = None;
    }

    /// Resolves the request against `router` and lays out the chain: global
    /// middleware, then the route's handlers or `not_found`. Returns whether a
    /// route matched.
    pub(crate) fn prepare(
        &mut self,
        router: &Router,
        middleware: &[BoxedHandler],
        not_found: &BoxedHandler,
    ) -> bool {
        self.handlers.extend(middleware.iter().cloned());
        let route = router.resolve(self.req.get_http_method(), self.req.get_path(), &mut self.params);
        match route {
            Some(route) => {
                self.handlers.extend(route.handlers().iter().cloned());
                self.route = Some(route);
                true
            }
            None => {
                self.handlers.push(Arc::clone(not_found));
                false
            }
        }
    }

    /// Runs the next handler in the chain. Past the end of the chain this
    /// does nothing.
    pub fn next(&mut self) -> anyhow::Result<()> {
        let Some(handler) = self.handlers.get(self.cursor).cloned() else {
            return Ok(());
        };
        self.cursor += 1;
        handler.handle(self)
    }

    /// Skips whatever is left of the chain.
    pub fn abort(&mut self) {
        self.cursor = self.handlers.len();
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.handlers.len()
    }

    pub(crate) fn finish(&mut self) -> (ResponseWriter, Request) {
        (mem::take(&mut self.resp), mem::take(&mut self.req))
    }

    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
    // request
    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

    pub fn req(&self) -> &Request {
        &self.req
    }

    pub fn req_mut(&mut self) -> &mut Request {
        &mut self.req
    }

    pub fn resp(&self) -> &ResponseWriter {
        &self.resp
    }

    pub fn resp_mut(&mut self) -> &mut ResponseWriter {
        &mut self.resp
    }

    pub fn split_mut(&mut self) -> (&mut ResponseWriter, &mut Request) {
        (&mut self.resp, &mut self.req)
    }

    pub fn method(&self) -> &str {
        self.req.get_http_method()
    }

    pub fn path(&self) -> &str {
        self.req.get_path()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Parses a path parameter, failing the request if it is missing or
    /// malformed.
    pub fn param_as<T>(&self, name: &str) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let raw = self
            .param(name)
            .with_context(|| format!("no path parameter :{}", name))?;
        raw.parse()
            .with_context(|| format!("path parameter :{} = {:?}", name, raw))
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.req.get_query(name)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.req.get_header(name)
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.req.get_body()
    }

    /// The route that matched, `None` while the not-found handler runs.
    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
    // response
    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

    pub fn status(&mut self, code: u16) {
        self.resp.set_status_code(code);
    }

    pub fn set_header(&mut self, k: impl Into<String>, v: impl Into<String>) {
        self.resp.set_header(k, v);
    }

    pub fn text(&mut self, code: u16, body: impl Display) {
        self.resp.set_status_code(code);
        self.resp.set_body_str(&body.to_string());
    }

    pub fn html(&mut self, code: u16, body: &str) {
        self.resp.set_status_code(code);
        self.resp.set_body(body, "text/html; charset=utf-8");
    }

    pub fn bytes(&mut self, code: u16, body: &[u8], content_type: &str) {
        self.resp.set_status_code(code);
        self.resp.set_body(body, content_type);
    }

    pub fn redirect(&mut self, code: u16, location: &str) {
        self.resp.set_status_code(code);
        self.resp.set_header("Location", location);
    }

    /// Renders `template` with the app's renderer into an HTML response.
    pub fn render(&mut self, code: u16, template: &str, data: &Data<'_>) -> anyhow::Result<()> {
        let renderer = self.renderer()?;
        let mut out = vec![];
        renderer.render(&mut out, template, data)?;
        self.resp.set_status_code(code);
        self.resp.set_body(out, "text/html; charset=utf-8");
        Ok(())
    }

    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
    // services
    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

    pub fn debug(&self) -> bool {
        self.services.debug.load(Ordering::Relaxed)
    }

    pub fn di<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, DiError> {
        self.services.di.get(name)
    }

    pub fn logger(&self) -> Result<Arc<dyn Logger>, DiError> {
        self.services.di.logger()
    }

    pub fn renderer(&self) -> Result<Arc<dyn Renderer>, DiError> {
        self.services.di.renderer()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method())
            .field("path", &self.path())
            .field("handlers", &self.handlers.len())
            .field("cursor", &self.cursor)
            .field("params", &self.params)
            .finish()
    }
}
