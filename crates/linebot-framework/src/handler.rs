//! Handler system for the linebot framework.
//!
//! Handlers are plain async closures. The [`Handler`] trait is implemented for
//! functions taking either nothing or an [`EventContext`], in the style of
//! axum's handler system, and [`into_handler`] erases them for storage.
//!
//! ```rust,ignore
//! dispatcher.on(EventKind::Text, |ctx: EventContext| async move {
//!     ctx.reply("pong").await?;
//!     Ok(())
//! })?;
//!
//! dispatcher.on(EventKind::Follow, || async { Ok(()) })?;
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::EventContext;

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every handler returns.
pub type HandlerResult = anyhow::Result<()>;

// ============================================================================
// Handler Trait
// ============================================================================

/// An event handler.
///
/// `T` only disambiguates the blanket implementations.
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// The type of future calling this handler returns.
    type Future: Future<Output = HandlerResult> + Send + 'static;

    /// Call the handler with the given context.
    fn call(self, ctx: EventContext) -> Self::Future;
}

impl<F, Fut> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    type Future = Fut;

    fn call(self, _ctx: EventContext) -> Self::Future {
        (self)()
    }
}

impl<F, Fut> Handler<(EventContext,)> for F
where
    F: FnOnce(EventContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    type Future = Fut;

    fn call(self, ctx: EventContext) -> Self::Future {
        (self)(ctx)
    }
}

// ============================================================================
// Type erasure
// ============================================================================

/// Wraps a [`Handler`] so it can be stored as a trait object.
pub struct HandlerFn<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> HandlerFn<F, T> {
    /// Creates a new handler function wrapper.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

/// Type-erased handler trait for dynamic dispatch.
pub trait ErasedHandler: Send + Sync {
    /// Execute the handler with the given context.
    fn call(&self, ctx: EventContext) -> BoxFuture<'static, HandlerResult>;
}

impl<F, T> ErasedHandler for HandlerFn<F, T>
where
    F: Handler<T>,
    T: 'static,
{
    fn call(&self, ctx: EventContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self.f.clone().call(ctx))
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedHandler = Arc<dyn ErasedHandler>;

/// Convert a handler function into a boxed handler.
pub fn into_handler<F, T>(f: F) -> BoxedHandler
where
    F: Handler<T>,
    T: 'static,
{
    Arc::new(HandlerFn::new(f))
}

// ============================================================================
// Ready handlers
// ============================================================================

/// A handler for the `ready` kind, which has no event object.
pub type BoxedReadyHandler = Arc<dyn Fn() -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Convert an async closure into a ready handler.
pub fn into_ready_handler<F, Fut>(f: F) -> BoxedReadyHandler
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as BoxFuture<'static, HandlerResult>)
}
