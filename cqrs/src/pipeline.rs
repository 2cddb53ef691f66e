use crate::request::{HandlerResult, Request};
use std::any::{type_name, Any};
use tokio_util::sync::CancellationToken;

/// A cross-cutting step that runs around the handler of a request.
///
/// For the steps `[0..N-1]` bound to a request, `pre` runs in registration
/// order before the handler and `post` runs in reverse registration order
/// after it. A fresh step is created for every dispatch, so state written in
/// `pre` can be read back in `post`.
#[async_trait::async_trait]
pub trait Pipeline<Req, Res>: Send
where
    Req: Request<Res>,
    Res: Send + Sync + 'static,
{
    /// Runs before the handler. A failure stops the dispatch.
    async fn pre(&mut self, _req: &Req, _cancellation: &CancellationToken) -> HandlerResult<()> {
        Ok(())
    }

    /// Runs after the handler succeeded.
    async fn post(
        &mut self,
        _req: &Req,
        _res: &Res,
        _cancellation: &CancellationToken,
    ) -> HandlerResult<()> {
        Ok(())
    }
}

/// A type-erased view of the request being dispatched.
pub struct Dispatch<'a> {
    request_type: &'static str,
    response_type: &'static str,
    request: &'a (dyn Any + Send + Sync),
}

impl<'a> Dispatch<'a> {
    pub(crate) fn of<Req, Res>(request: &'a Req) -> Self
    where
        Req: Request<Res>,
        Res: 'static,
    {
        Dispatch {
            request_type: type_name::<Req>(),
            response_type: type_name::<Res>(),
            request,
        }
    }

    /// Name of the request type.
    pub fn request_type(&self) -> &'static str {
        self.request_type
    }

    /// Name of the response type.
    pub fn response_type(&self) -> &'static str {
        self.response_type
    }

    /// The request being dispatched.
    pub fn request(&self) -> &(dyn Any + Send + Sync) {
        self.request
    }

    /// Returns the request if it is of type `T`.
    pub fn request_as<T: Any>(&self) -> Option<&T> {
        self.request.downcast_ref::<T>()
    }
}

/// A pipeline step that applies to every request, whatever its type.
#[async_trait::async_trait]
pub trait OpenPipeline: Send {
    /// Runs before the handler. A failure stops the dispatch.
    async fn pre(
        &mut self,
        _dispatch: &Dispatch<'_>,
        _cancellation: &CancellationToken,
    ) -> HandlerResult<()> {
        Ok(())
    }

    /// Runs after the handler succeeded.
    async fn post(
        &mut self,
        _dispatch: &Dispatch<'_>,
        _response: &(dyn Any + Send + Sync),
        _cancellation: &CancellationToken,
    ) -> HandlerResult<()> {
        Ok(())
    }
}

// Binds an open step to a concrete request/response pair.
pub(crate) struct OpenStep(pub(crate) Box<dyn OpenPipeline>);

#[async_trait::async_trait]
impl<Req, Res> Pipeline<Req, Res> for OpenStep
where
    Req: Request<Res>,
    Res: Send + Sync + 'static,
{
    async fn pre(&mut self, req: &Req, cancellation: &CancellationToken) -> HandlerResult<()> {
        let dispatch = Dispatch::of::<Req, Res>(req);
        self.0.pre(&dispatch, cancellation).await
    }

    async fn post(
        &mut self,
        req: &Req,
        res: &Res,
        cancellation: &CancellationToken,
    ) -> HandlerResult<()> {
        let dispatch = Dispatch::of::<Req, Res>(req);
        self.0.post(&dispatch, res, cancellation).await
    }
}
