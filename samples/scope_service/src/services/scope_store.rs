use crate::models::scope::Scope;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type SharedScopeStore = Arc<dyn ScopeStore>;

/// Persistence of the scopes, used by the handlers.
#[async_trait::async_trait]
pub trait ScopeStore: Send + Sync {
    async fn insert(&self, scope: Scope);

    async fn get(&self, id: Uuid) -> Option<Scope>;

    async fn find_by_name(&self, name: &str) -> Option<Scope>;

    async fn get_all(&self) -> Vec<Scope>;

    async fn remove(&self, id: Uuid) -> Option<Scope>;
}

#[derive(Debug, Default)]
pub struct InMemoryScopeStore {
    scopes: RwLock<HashMap<Uuid, Scope>>,
}

impl InMemoryScopeStore {
    pub fn shared() -> SharedScopeStore {
        Arc::new(Self::default())
    }
}

#[async_trait::async_trait]
impl ScopeStore for InMemoryScopeStore {
    async fn insert(&self, scope: Scope) {
        self.scopes.write().await.insert(scope.id, scope);
    }

    async fn get(&self, id: Uuid) -> Option<Scope> {
        self.scopes.read().await.get(&id).cloned()
    }

    async fn find_by_name(&self, name: &str) -> Option<Scope> {
        self.scopes
            .read()
            .await
            .values()
            .find(|scope| scope.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    async fn get_all(&self) -> Vec<Scope> {
        let mut scopes = self.scopes.read().await.values().cloned().collect::<Vec<_>>();
        scopes.sort_by_key(|scope| scope.created_at);
        scopes
    }

    async fn remove(&self, id: Uuid) -> Option<Scope> {
        self.scopes.write().await.remove(&id)
    }
}
