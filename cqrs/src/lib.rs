//! # cqrs
//! An in-process request/response mediator.
//!
//! Every request type is routed to exactly one handler, and each dispatch is
//! wrapped by the ordered pipeline steps bound to the request. `pre` hooks
//! run in registration order before the handler, `post` hooks run in reverse
//! order after it.
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use cqrs::{
//!     CancellationToken, DefaultMediator, HandlerResult, Mediator, Pipeline, Request,
//!     RequestHandler,
//! };
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Pong(String);
//!
//! #[derive(Clone)]
//! struct Ping(String);
//! impl Request<Pong> for Ping {}
//!
//! struct PingHandler;
//!
//! #[cqrs::async_trait]
//! impl RequestHandler<Ping, Pong> for PingHandler {
//!     async fn handle(&mut self, req: Ping, _: CancellationToken) -> HandlerResult<Pong> {
//!         Ok(Pong(format!("pong: {}", req.0)))
//!     }
//! }
//!
//! // Appends its name to the log around every `Ping`.
//! struct Trace(&'static str, Arc<Mutex<Vec<String>>>);
//!
//! #[cqrs::async_trait]
//! impl Pipeline<Ping, Pong> for Trace {
//!     async fn pre(&mut self, _: &Ping, _: &CancellationToken) -> HandlerResult<()> {
//!         self.1.lock().unwrap().push(format!("{}.Pre", self.0));
//!         Ok(())
//!     }
//!
//!     async fn post(&mut self, _: &Ping, _: &Pong, _: &CancellationToken) -> HandlerResult<()> {
//!         self.1.lock().unwrap().push(format!("{}.Post", self.0));
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let (a, b) = (log.clone(), log.clone());
//!
//! let mediator = DefaultMediator::builder()
//!     .add_handler(PingHandler)
//!     .add_pipeline(move || Trace("A", a.clone()))
//!     .add_pipeline(move || Trace("B", b.clone()))
//!     .build()
//!     .unwrap();
//!
//! let pong = mediator.send(Ping("hello".to_owned())).await.unwrap();
//! assert_eq!(pong, Pong("pong: hello".to_owned()));
//! assert_eq!(*log.lock().unwrap(), vec!["A.Pre", "B.Pre", "B.Post", "A.Post"]);
//! # }
//! ```

/// A convenient result type.
pub type Result<T> = std::result::Result<T, error::Error>;

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Module for the mediator request-response.
mod request;
pub use request::*;

/// Module for the pipeline steps.
mod pipeline;
pub use pipeline::*;

/// Module for the errors.
mod error;
pub use error::*;

/// Module for the mediator configuration.
mod config;
pub use config::*;

/// Module for the handler and pipeline registries.
mod registry;
pub use registry::*;

/// Module for the mediator.
mod mediator;
pub use crate::mediator::*;

/// Provides the default implementation.
mod impls;
pub use impls::*;

/// Provides the bundled pipeline steps.
mod pipelines;
pub use pipelines::*;
