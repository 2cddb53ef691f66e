use crate::queries::GetAllScopesQuery;
use cqrs::{CancellationToken, DefaultMediator, Mediator};
use std::time::Duration;

/// Periodically reads every scope through the mediator.
pub struct SyncScopesJob {
    mediator: DefaultMediator,
    period: Duration,
}

impl SyncScopesJob {
    pub fn new(mediator: DefaultMediator, period: Duration) -> Self {
        SyncScopesJob { mediator, period }
    }

    /// Runs one tick, returns the number of scopes seen.
    pub async fn tick(&self, cancellation: &CancellationToken) -> cqrs::Result<usize> {
        let scopes = self
            .mediator
            .scope()
            .send_with(GetAllScopesQuery, cancellation.clone())
            .await?;

        log::info!("synced {} scopes", scopes.len());
        Ok(scopes.len())
    }

    /// Ticks every period until `cancellation` is triggered.
    ///
    /// Returns the number of completed ticks.
    pub async fn run(self, cancellation: CancellationToken) -> usize {
        let mut interval = tokio::time::interval(self.period);
        let mut ticks = 0;

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = interval.tick() => {
                    match self.tick(&cancellation).await {
                        Ok(_) => ticks += 1,
                        Err(err) => log::warn!("scope sync failed: {}", err),
                    }
                }
            }
        }

        log::info!("scope sync stopped after {} ticks", ticks);
        ticks
    }
}
