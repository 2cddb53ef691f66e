use crate::errors::ScopeError;
use crate::services::scope_store::SharedScopeStore;
use cqrs::{CancellationToken, HandlerResult, Request, RequestHandler, Unit};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DeleteScopeCommand(pub Uuid);

impl Request<Unit> for DeleteScopeCommand {}

pub struct DeleteScopeHandler(pub SharedScopeStore);

#[async_trait::async_trait]
impl RequestHandler<DeleteScopeCommand, Unit> for DeleteScopeHandler {
    async fn handle(
        &mut self,
        command: DeleteScopeCommand,
        _: CancellationToken,
    ) -> HandlerResult<Unit> {
        match self.0.remove(command.0).await {
            Some(scope) => {
                log::debug!("removed scope `{}`", scope.name);
                Ok(())
            }
            None => Err(ScopeError::NotFound(command.0).into()),
        }
    }
}
