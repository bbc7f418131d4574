//! Instrumentation of remote calls.

use crate::{store::Request, Context};

/// Callback invoked with every [`Request`] right before it is sent to the
/// [`Store`](crate::Store).
///
/// The returned [`Context`] is the one the request is executed with, which
/// allows hooks to attach spans or tighten deadlines.
pub trait StoreHooks: Send + Sync + 'static {
    fn request_built(&self, ctx: Context, _request: Request<'_>) -> Context {
        ctx
    }
}

/// [`StoreHooks`] doing nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl StoreHooks for NoopHooks {}

/// [`StoreHooks`] logging every request and instrumenting it with a span
/// carrying the name of the operation being executed.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingHooks;

impl StoreHooks for TracingHooks {
    fn request_built(&self, ctx: Context, request: Request<'_>) -> Context {
        let expr = request.expression();

        let span = tracing::debug_span!(
            parent: ctx.span(),
            "dynastore",
            operation = ?ctx.operation(),
            request = request.name(),
            table = request.table(),
        );

        tracing::debug!(
            parent: &span,
            condition = ?expr.condition,
            update = ?expr.update,
            key_condition = ?expr.key_condition,
            "sending request"
        );

        ctx.with_span(span)
    }
}

impl<F> StoreHooks for F
where
    F: Fn(Context, Request<'_>) -> Context + Send + Sync + 'static,
{
    fn request_built(&self, ctx: Context, request: Request<'_>) -> Context {
        self(ctx, request)
    }
}
