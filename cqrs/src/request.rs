use crate::error::BoxError;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Response of requests that produce no meaningful value.
pub type Unit = ();

/// Result returned by handlers and pipeline steps.
pub type HandlerResult<T> = std::result::Result<T, BoxError>;

/// Represents a request to the mediator.
///
/// The request declares its response type through the `Res` parameter, a
/// side-effect only request implements `Request<()>`.
///
/// Requests are immutable values, the mediator clones a request when
/// pipeline steps need to observe it after the handler took ownership.
pub trait Request<Res>: Clone + Send + Sync + 'static {}

/// Handles a request to the mediator.
#[async_trait::async_trait]
pub trait RequestHandler<Req, Res>: Send
where
    Req: Request<Res>,
{
    /// Handle a request and returns the response.
    async fn handle(&mut self, req: Req, cancellation: CancellationToken) -> HandlerResult<Res>;
}

/// A request handler backed by a function or closure.
#[derive(Clone)]
pub struct FnHandler<F>(pub F);

#[async_trait::async_trait]
impl<Req, Res, F, Fut> RequestHandler<Req, Res> for FnHandler<F>
where
    Req: Request<Res>,
    Res: Send + 'static,
    F: FnMut(Req, CancellationToken) -> Fut + Send,
    Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
{
    async fn handle(&mut self, req: Req, cancellation: CancellationToken) -> HandlerResult<Res> {
        (self.0)(req, cancellation).await
    }
}
