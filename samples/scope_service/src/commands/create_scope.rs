use crate::errors::ScopeError;
use crate::models::scope::Scope;
use crate::services::scope_store::SharedScopeStore;
use cqrs::{CancellationToken, HandlerResult, Request, RequestHandler, RuleSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScopeCommand {
    pub name: String,
    pub description: Option<String>,
}

impl Request<String> for CreateScopeCommand {}

pub struct CreateScopeHandler(pub SharedScopeStore);

#[async_trait::async_trait]
impl RequestHandler<CreateScopeCommand, String> for CreateScopeHandler {
    async fn handle(
        &mut self,
        command: CreateScopeCommand,
        _: CancellationToken,
    ) -> HandlerResult<String> {
        if self.0.find_by_name(&command.name).await.is_some() {
            return Err(ScopeError::AlreadyExists(command.name).into());
        }

        let scope = Scope {
            id: Uuid::new_v4(),
            name: command.name,
            description: command.description,
            created_at: chrono::Utc::now(),
        };

        let id = scope.id.to_string();
        self.0.insert(scope).await;
        Ok(id)
    }
}

pub fn create_scope_rules() -> RuleSet<CreateScopeCommand> {
    let mut rules = RuleSet::new();
    rules
        .rule_for("name", |c: &CreateScopeCommand| c.name.as_str())
        .with(|name| !name.trim().is_empty(), "Name is required")
        .with(|name| name.len() <= 32, "Name must be at most 32 characters")
        .with(
            |name| name.chars().all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_'),
            "Name may only contain letters, digits, ':' and '_'",
        );
    rules
        .rule_for("description", |c: &CreateScopeCommand| &c.description)
        .with(
            |description| description.as_ref().map_or(true, |d| d.len() <= 256),
            "Description must be at most 256 characters",
        );
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqrs::Validator;

    #[test]
    fn create_scope_rules_test() {
        let rules = create_scope_rules();

        let valid = CreateScopeCommand {
            name: "diary:read".to_owned(),
            description: None,
        };
        assert!(rules.validate(&valid).is_ok());

        let invalid = CreateScopeCommand {
            name: "diary read".to_owned(),
            description: Some("x".repeat(300)),
        };
        let err = rules.validate(&invalid).unwrap_err();
        assert_eq!(err.errors().len(), 2);
    }
}
