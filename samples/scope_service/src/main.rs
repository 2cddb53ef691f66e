mod commands;
mod errors;
mod jobs;
mod models;
mod queries;
mod services;

use crate::errors::ErrorResponse;
use crate::jobs::SyncScopesJob;
use crate::services::scope_store::{InMemoryScopeStore, SharedScopeStore};
use cqrs::{
    Builder, CancellationToken, DefaultMediator, Lifetime, Mediator, MediatorConfig, Unit,
};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let store = InMemoryScopeStore::shared();
    let mediator = create_mediator(&store, MediatorConfig::from_env()?)?;

    let cancellation = CancellationToken::new();
    let job = SyncScopesJob::new(mediator.clone(), Duration::from_millis(200));
    let job = tokio::spawn(job.run(cancellation.clone()));

    use commands::*;
    use queries::*;

    // Each call below stands for one inbound request, with its own scope.
    let created = respond(
        mediator.scope().send(CreateScopeCommand {
            name: "diary:read".to_owned(),
            description: Some("Read the diary entries".to_owned()),
        }),
    )
    .await;

    respond(mediator.scope().send(CreateScopeCommand {
        name: "diary:read".to_owned(),
        description: None,
    }))
    .await;

    respond(mediator.scope().send(CreateScopeCommand {
        name: " ".to_owned(),
        description: None,
    }))
    .await;

    if let Some(id) = created.and_then(|id| id.parse::<Uuid>().ok()) {
        respond(mediator.scope().send(GetScopeByIdQuery(id))).await;
        respond(mediator.scope().send(DeleteScopeCommand(id))).await;
        respond(mediator.scope().send(DeleteScopeCommand(id))).await;
    }

    respond(mediator.scope().send(GetAllScopesQuery)).await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    cancellation.cancel();
    let ticks = job.await?;
    log::info!("background job ran {} times", ticks);

    Ok(())
}

fn create_mediator(
    store: &SharedScopeStore,
    config: MediatorConfig,
) -> cqrs::Result<DefaultMediator> {
    use commands::*;
    use models::scope::Scope;
    use queries::*;

    let (create, delete) = (store.clone(), store.clone());
    let (get, get_all) = (store.clone(), store.clone());

    Builder::with_config(config)
        // Commands
        .add_handler_factory(Lifetime::Scoped, move || CreateScopeHandler(create.clone()))
        .add_handler_factory(Lifetime::Scoped, move || DeleteScopeHandler(delete.clone()))
        // Queries
        .add_handler_factory(Lifetime::Transient, move || GetScopeByIdHandler(get.clone()))
        .add_handler_factory(Lifetime::Transient, move || GetAllScopesHandler(get_all.clone()))
        // Pipelines
        .add_logging::<CreateScopeCommand, String>()
        .add_logging::<DeleteScopeCommand, Unit>()
        .add_logging::<GetScopeByIdQuery, Option<Scope>>()
        .add_logging::<GetAllScopesQuery, Vec<Scope>>()
        .add_validator(create_scope_rules())
        .build()
}

// Prints the response as the edge of the service would return it.
async fn respond<T, F>(response: F) -> Option<T>
where
    T: Serialize,
    F: std::future::Future<Output = cqrs::Result<T>>,
{
    match response.await {
        Ok(value) => {
            print_json(&value);
            Some(value)
        }
        Err(err) => {
            print_json(&ErrorResponse::from(&err));
            None
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => log::error!("unable to serialize the response: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CreateScopeCommand, DeleteScopeCommand};
    use crate::errors::ScopeError;
    use crate::queries::{GetAllScopesQuery, GetScopeByIdQuery};
    use cqrs::ValidationError;

    fn mediator() -> DefaultMediator {
        create_mediator(&InMemoryScopeStore::shared(), MediatorConfig::default()).unwrap()
    }

    fn command(name: &str) -> CreateScopeCommand {
        CreateScopeCommand {
            name: name.to_owned(),
            description: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_and_get_scope_test() {
        let mediator = mediator();

        let id = mediator.send(command("diary:write")).await.unwrap();
        let id = id.parse::<Uuid>().unwrap();

        let scope = mediator.send(GetScopeByIdQuery(id)).await.unwrap().unwrap();
        assert_eq!(scope.name, "diary:write");
        assert_eq!(mediator.send(GetAllScopesQuery).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_scope_test() {
        let mediator = mediator();
        mediator.send(command("diary:write")).await.unwrap();

        let err = mediator.send(command("diary:write")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScopeError>(),
            Some(ScopeError::AlreadyExists(_))
        ));
        assert_eq!(ErrorResponse::from(&err).status_code, 409);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_scope_test() {
        let mediator = mediator();

        let err = mediator.send(command("")).await.unwrap_err();
        let validation = err.downcast_ref::<ValidationError>().unwrap();
        assert!(validation.errors().contains_key("name"));
        assert!(mediator.send(GetAllScopesQuery).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_scope_test() {
        let mediator = mediator();
        let id = mediator.send(command("diary:read")).await.unwrap();
        let id = id.parse::<Uuid>().unwrap();

        mediator.send(DeleteScopeCommand(id)).await.unwrap();
        let err = mediator.send(DeleteScopeCommand(id)).await.unwrap_err();
        assert_eq!(ErrorResponse::from(&err).status_code, 404);
        assert_eq!(mediator.send(GetScopeByIdQuery(id)).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_job_test() {
        let mediator = mediator();
        mediator.send(command("diary:read")).await.unwrap();

        let cancellation = CancellationToken::new();
        let job = SyncScopesJob::new(mediator, Duration::from_millis(10));
        assert_eq!(job.tick(&cancellation).await.unwrap(), 1);

        let handle = tokio::spawn(job.run(cancellation.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancellation.cancel();

        assert!(handle.await.unwrap() >= 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_sync_test() {
        let mediator = mediator();
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let job = SyncScopesJob::new(mediator, Duration::from_millis(10));
        assert!(job.tick(&cancellation).await.is_err());
    }
}
