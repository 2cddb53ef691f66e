use crate::request::Request;
use tokio_util::sync::CancellationToken;

/// A mediator is a central hub routing each request to its handler.
#[async_trait::async_trait]
pub trait Mediator: Send + Sync {
    /// Sends a request to the mediator.
    async fn send<Req, Res>(&self, req: Req) -> crate::Result<Res>
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        self.send_with(req, CancellationToken::new()).await
    }

    /// Sends a request to the mediator, the handler and the pipeline steps
    /// observe `cancellation`.
    async fn send_with<Req, Res>(
        &self,
        req: Req,
        cancellation: CancellationToken,
    ) -> crate::Result<Res>
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static;
}
