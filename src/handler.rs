use std::sync::Arc;

use crate::{context::Context, server::ServeHttp};

/// A step in a handler chain.
///
/// A handler continues the chain by calling `c.next()`. Returning without
/// calling it ends the request after the current handler. An `Err` abandons
/// the rest of the chain and goes to the app's error handler.
pub trait Handler: Send + Sync {
    fn handle(&self, c: &mut Context) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, c: &mut Context) -> anyhow::Result<()> {
        self(c)
    }
}

pub type BoxedHandler = Arc<dyn Handler>;

/// Error hook: receives the fault and the context of the failed request.
pub type ErrorHandler = Arc<dyn Fn(&anyhow::Error, &mut Context) + Send + Sync>;

pub fn boxed(handler: impl Handler + 'static) -> BoxedHandler {
    Arc::new(handler)
}

/// Pins a closure to the handler signature so its argument types are inferred.
pub fn handler_fn<F>(f: F) -> F
where
    F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
{
    f
}

/// Adapts a transport-level `(ResponseWriter, Request)` handler. It runs and
/// then always continues the chain.
pub fn native<H>(handler: H) -> Native<H>
where
    H: ServeHttp + Send + Sync,
{
    Native(handler)
}

pub struct Native<H>(H);

impl<H> Handler for Native<H>
where
    H: ServeHttp + Send + Sync,
{
    fn handle(&self, c: &mut Context) -> anyhow::Result<()> {
        let (w, r) = c.split_mut();
        self.0.serve(w, r);
        c.next()
    }
}

/// Builds a `Vec<BoxedHandler>` from handlers of different types.
///
/// ```ignore
/// app.get("/", handlers![access_log(), index])?;
/// ```
#[macro_export]
macro_rules! handlers {
    ($($handler:expr),+ $(,)?) => {
        vec![$($crate::handler::boxed($handler)),+]
    };
}

#[cfg(test)]
mod tests {
    use crate::{
        app::App,
        request::Request,
        response_writer::ResponseWriter,
        test_utils::{body_str, dispatch},
    };

    use super::{handler_fn, native};

    #[test]
    fn test_native_handler_continues() {
        let mut app = App::new();
        app.use_middleware(native(|w: &mut ResponseWriter, _: &mut Request| {
            w.set_header("X-Native", "yes");
        }));
        app.get(
            "/",
            handlers![handler_fn(|c| {
                c.text(200, "after native");
                Ok(())
            })],
        )
        .unwrap();

        let w = dispatch(&app, "GET", "/");
        assert_eq!(w.get_header("X-Native"), Some("yes"));
        assert_eq!(body_str(&w), "after native");
    }
}
