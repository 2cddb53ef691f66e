use crate::models::scope::Scope;
use crate::services::scope_store::SharedScopeStore;
use cqrs::{CancellationToken, HandlerResult, Request, RequestHandler};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct GetScopeByIdQuery(pub Uuid);

impl Request<Option<Scope>> for GetScopeByIdQuery {}

pub struct GetScopeByIdHandler(pub SharedScopeStore);

#[async_trait::async_trait]
impl RequestHandler<GetScopeByIdQuery, Option<Scope>> for GetScopeByIdHandler {
    async fn handle(
        &mut self,
        query: GetScopeByIdQuery,
        _: CancellationToken,
    ) -> HandlerResult<Option<Scope>> {
        Ok(self.0.get(query.0).await)
    }
}
