use crate::models::scope::Scope;
use crate::services::scope_store::SharedScopeStore;
use cqrs::{CancellationToken, HandlerResult, Request, RequestHandler};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GetAllScopesQuery;

impl Request<Vec<Scope>> for GetAllScopesQuery {}

pub struct GetAllScopesHandler(pub SharedScopeStore);

#[async_trait::async_trait]
impl RequestHandler<GetAllScopesQuery, Vec<Scope>> for GetAllScopesHandler {
    async fn handle(
        &mut self,
        _: GetAllScopesQuery,
        cancellation: CancellationToken,
    ) -> HandlerResult<Vec<Scope>> {
        if cancellation.is_cancelled() {
            return Err("scope listing cancelled".into());
        }

        Ok(self.0.get_all().await)
    }
}
