use crate::config::{Lifetime, MediatorConfig};
use crate::error::Error;
use crate::pipeline::{OpenPipeline, Pipeline};
use crate::registry::{
    Candidate, HandlerFactory, HandlerKey, Module, OpenPipelineFactory, PipelineFactory, Registry,
    ScopeCache,
};
use crate::request::{FnHandler, HandlerResult, Request, RequestHandler};
use crate::Mediator;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "logging")]
use crate::pipelines::{LoggingPipeline, OpenLoggingPipeline};
#[cfg(feature = "logging")]
use serde::Serialize;

#[cfg(feature = "validation")]
use crate::pipelines::{ValidationPipeline, Validator};

/// A default implementation for the [Mediator] trait.
///
/// Cloning is cheap, every clone shares the same registry.
///
/// # Examples
///
/// ## Request handler
/// ```
/// use cqrs::{
///     CancellationToken, DefaultMediator, HandlerResult, Mediator, Request, RequestHandler,
/// };
///
/// #[derive(Clone)]
/// struct MulRequest(f32, f32);
/// impl Request<f32> for MulRequest {}
///
/// struct MulRequestHandler;
///
/// #[cqrs::async_trait]
/// impl RequestHandler<MulRequest, f32> for MulRequestHandler {
///     async fn handle(&mut self, req: MulRequest, _: CancellationToken) -> HandlerResult<f32> {
///         Ok(req.0 * req.1)
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mediator = DefaultMediator::builder()
///     .add_handler(MulRequestHandler)
///     .build()
///     .unwrap();
///
/// let result = mediator.send(MulRequest(2.0, 3.0)).await;
/// assert_eq!(result.unwrap(), 6.0);
/// # }
/// ```
#[derive(Clone)]
pub struct DefaultMediator {
    registry: Arc<Registry>,
    scope: Option<Arc<ScopeCache>>,
}

impl DefaultMediator {
    /// Gets a [DefaultMediator] builder.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Opens a new scope.
    ///
    /// The returned mediator shares the registry with `self`, `Scoped`
    /// handlers are created once per scope and reused by every request sent
    /// through it or its clones.
    pub fn scope(&self) -> DefaultMediator {
        DefaultMediator {
            registry: self.registry.clone(),
            scope: Some(Arc::new(ScopeCache::default())),
        }
    }

    /// Returns a mediator sharing the registry of `self` outside of any scope.
    pub fn unscoped(&self) -> DefaultMediator {
        DefaultMediator {
            registry: self.registry.clone(),
            scope: None,
        }
    }

    /// Returns `true` if this mediator belongs to a scope.
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// The handlers and pipeline steps of this mediator.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn scope_cache(&self) -> Option<&ScopeCache> {
        self.scope.as_deref()
    }
}

#[async_trait::async_trait]
impl Mediator for DefaultMediator {
    async fn send_with<Req, Res>(
        &self,
        req: Req,
        cancellation: CancellationToken,
    ) -> crate::Result<Res>
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        let handler = self.registry.handlers().resolve::<Req, Res>(self)?;
        let mut chain = self.registry.pipelines().resolve_chain::<Req, Res>();

        log::trace!(
            "dispatching `{}` through {} pipeline steps",
            HandlerKey::of::<Req, Res>(),
            chain.len()
        );

        if chain.is_empty() {
            return handler.handle(req, cancellation).await.map_err(Error::failed);
        }

        for step in chain.iter_mut() {
            step.pre(&req, &cancellation).await.map_err(Error::failed)?;
        }

        let res = handler
            .handle(req.clone(), cancellation.clone())
            .await
            .map_err(Error::failed)?;

        for step in chain.iter_mut().rev() {
            step.post(&req, &res, &cancellation)
                .await
                .map_err(Error::failed)?;
        }

        Ok(res)
    }
}

/// A builder for the [DefaultMediator].
///
/// Registration errors are kept until [Builder::build], which returns the
/// first one.
pub struct Builder {
    registry: Registry,
    config: MediatorConfig,
    errors: Vec<Error>,
}

impl Builder {
    /// Constructs a new `Builder` with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MediatorConfig::default())
    }

    /// Constructs a new `Builder` with the given configuration.
    pub fn with_config(config: MediatorConfig) -> Self {
        Builder {
            registry: Registry::new(config.duplicate_policy),
            config,
            errors: Vec::new(),
        }
    }

    fn collect(mut self, result: crate::Result<()>) -> Self {
        if let Err(err) = result {
            self.errors.push(err);
        }
        self
    }

    /// Registers a request handler instance, shared by every request.
    pub fn add_handler<Req, Res, H>(mut self, handler: H) -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        H: RequestHandler<Req, Res> + 'static,
    {
        let result = self.registry.handlers_mut().register_instance(handler);
        self.collect(result)
    }

    /// Registers a request handler from a function, with the default lifetime.
    pub fn add_handler_fn<Req, Res, F, Fut>(self, handler: F) -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        F: Fn(Req, CancellationToken) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    {
        let lifetime = self.config.default_lifetime;
        self.add_factory(HandlerFactory::new(move || FnHandler(handler.clone())), lifetime)
    }

    /// Registers a request handler from a function using a copy of the mediator.
    pub fn add_handler_fn_deferred<Req, Res, H, F, Fut>(self, f: F) -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        H: FnMut(Req, CancellationToken) -> Fut + Send + 'static,
        F: Fn(DefaultMediator) -> H + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Res>> + Send + 'static,
    {
        let lifetime = self.config.default_lifetime;
        self.add_factory(
            HandlerFactory::deferred(move |mediator| FnHandler(f(mediator))),
            lifetime,
        )
    }

    /// Registers a function creating the handler instances.
    pub fn add_handler_factory<Req, Res, H, F>(self, lifetime: Lifetime, f: F) -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        H: RequestHandler<Req, Res> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.add_factory(HandlerFactory::new(f), lifetime)
    }

    /// Registers a function creating the handler instances from a copy of the
    /// mediator, so handlers can send requests of their own.
    ///
    /// A [Lifetime::Singleton] handler is locked while it handles a request,
    /// so it must not send its own request type through that mediator: the
    /// nested dispatch waits on the lock and never completes.
    pub fn add_handler_deferred<Req, Res, H, F>(self, lifetime: Lifetime, f: F) -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        H: RequestHandler<Req, Res> + 'static,
        F: Fn(DefaultMediator) -> H + Send + Sync + 'static,
    {
        self.add_factory(HandlerFactory::deferred(f), lifetime)
    }

    /// Registers the handler factory unless the request already has a handler.
    pub fn try_add_handler_factory<Req, Res, H, F>(mut self, lifetime: Lifetime, f: F) -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        H: RequestHandler<Req, Res> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.registry
            .handlers_mut()
            .try_register(HandlerFactory::new(f), lifetime);
        self
    }

    /// Registers a handler factory with the given `lifetime`.
    ///
    /// The error of a duplicated request is returned by [Builder::build].
    pub fn add_factory<Req, Res>(
        mut self,
        factory: HandlerFactory<Req, Res>,
        lifetime: Lifetime,
    ) -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        let result = self.registry.handlers_mut().register(factory, lifetime);
        self.collect(result)
    }

    /// Appends a pipeline step, created with `f` for every request.
    pub fn add_pipeline<Req, Res, P, F>(mut self, f: F) -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        P: Pipeline<Req, Res> + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.registry
            .pipelines_mut()
            .register(PipelineFactory::new(f));
        self
    }

    /// Appends a pipeline step that runs for every request.
    pub fn add_open_pipeline<P, F>(mut self, f: F) -> Self
    where
        P: OpenPipeline + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.registry
            .pipelines_mut()
            .register_open(OpenPipelineFactory::new(f));
        self
    }

    /// Appends a step validating the request with `validator`.
    #[cfg(feature = "validation")]
    pub fn add_validator<Req, Res, V>(self, validator: V) -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        V: Validator<Req> + 'static,
    {
        let validator = Arc::new(validator);
        self.add_pipeline(move || ValidationPipeline::<Req, Res>::new(validator.clone()))
    }

    /// Appends a step logging each `Req` and its response as JSON, under a
    /// correlation id.
    #[cfg(feature = "logging")]
    pub fn add_logging<Req, Res>(self) -> Self
    where
        Req: Request<Res> + Serialize,
        Res: Serialize + Send + Sync + 'static,
    {
        self.add_pipeline(LoggingPipeline::<Req, Res>::new)
    }

    /// Appends a step logging the types of every request with a correlation id.
    #[cfg(feature = "logging")]
    pub fn add_open_logging(self) -> Self {
        self.add_open_pipeline(OpenLoggingPipeline::new)
    }

    /// Registers every candidate, handlers with the default lifetime.
    pub fn scan(mut self, candidates: &[Candidate]) -> Self {
        let result = self
            .registry
            .scan(candidates, self.config.default_lifetime);
        self.collect(result)
    }

    /// Registers the handlers and pipeline steps of the module `M`.
    pub fn add_module<M: Module>(self) -> Self {
        self.scan(&M::candidates())
    }

    /// Applies `f` to the builder only if `condition` is `true`.
    pub fn also_if<F>(self, condition: bool, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            f(self)
        } else {
            self
        }
    }

    /// Builds the [DefaultMediator].
    ///
    /// # Errors
    /// Returns the first registration error, if any.
    pub fn build(self) -> crate::Result<DefaultMediator> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        log::debug!(
            "mediator built with {} handlers",
            self.registry.handlers().len()
        );

        Ok(DefaultMediator {
            registry: Arc::new(self.registry),
            scope: None,
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
