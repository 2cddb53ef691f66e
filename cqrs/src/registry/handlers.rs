use super::HandlerKey;
use crate::config::{DuplicatePolicy, Lifetime};
use crate::error::{Error, ErrorKind};
use crate::request::{HandlerResult, Request, RequestHandler};
use crate::DefaultMediator;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

/// A boxed request handler.
pub type BoxHandler<Req, Res> = Box<dyn RequestHandler<Req, Res>>;

type SharedHandler<Req, Res> = Arc<AsyncMutex<BoxHandler<Req, Res>>>;

type CreateFn<Req, Res> = dyn Fn(&DefaultMediator) -> BoxHandler<Req, Res> + Send + Sync;

/// Creates the handler instances of a request/response pair.
pub struct HandlerFactory<Req, Res> {
    name: &'static str,
    create: Arc<CreateFn<Req, Res>>,
}

impl<Req, Res> HandlerFactory<Req, Res>
where
    Req: Request<Res>,
    Res: Send + Sync + 'static,
{
    /// A factory calling `f` for every new instance.
    pub fn new<H, F>(f: F) -> Self
    where
        H: RequestHandler<Req, Res> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        HandlerFactory {
            name: type_name::<H>(),
            create: Arc::new(move |_: &DefaultMediator| -> BoxHandler<Req, Res> { Box::new(f()) }),
        }
    }

    /// A factory whose handlers receive the mediator, to send nested requests.
    pub fn deferred<H, F>(f: F) -> Self
    where
        H: RequestHandler<Req, Res> + 'static,
        F: Fn(DefaultMediator) -> H + Send + Sync + 'static,
    {
        HandlerFactory {
            name: type_name::<H>(),
            create: Arc::new(move |mediator: &DefaultMediator| -> BoxHandler<Req, Res> {
                Box::new(f(mediator.clone()))
            }),
        }
    }

    /// Name of the handler type this factory creates.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn create(&self, mediator: &DefaultMediator) -> BoxHandler<Req, Res> {
        (self.create)(mediator)
    }
}

impl<Req, Res> Clone for HandlerFactory<Req, Res> {
    fn clone(&self) -> Self {
        HandlerFactory {
            name: self.name,
            create: self.create.clone(),
        }
    }
}

enum HandlerEntry<Req, Res> {
    Transient(HandlerFactory<Req, Res>),
    Scoped(HandlerFactory<Req, Res>),
    Singleton {
        factory: HandlerFactory<Req, Res>,
        instance: OnceLock<SharedHandler<Req, Res>>,
    },
    Instance(SharedHandler<Req, Res>),
}

struct Registration {
    handler_name: &'static str,
    lifetime: Lifetime,
    // Always a `HandlerEntry<Req, Res>` for the key it is stored under.
    entry: Box<dyn Any + Send + Sync>,
}

/// A handler resolved for a single dispatch.
pub enum ResolvedHandler<Req, Res> {
    /// An instance owned by this dispatch.
    Owned(BoxHandler<Req, Res>),
    /// An instance shared with other dispatches.
    Shared(SharedHandler<Req, Res>),
}

impl<Req, Res> ResolvedHandler<Req, Res>
where
    Req: Request<Res>,
    Res: Send + Sync + 'static,
{
    /// Invokes the handler.
    pub async fn handle(self, req: Req, cancellation: CancellationToken) -> HandlerResult<Res> {
        match self {
            ResolvedHandler::Owned(mut handler) => handler.handle(req, cancellation).await,
            ResolvedHandler::Shared(handler) => {
                let mut handler = handler.lock().await;
                handler.handle(req, cancellation).await
            }
        }
    }
}

/// Instances of `Scoped` handlers, kept for the lifetime of a mediator scope.
#[derive(Default)]
pub(crate) struct ScopeCache {
    instances: Mutex<HashMap<HandlerKey, Arc<dyn Any + Send + Sync>>>,
}

impl ScopeCache {
    fn get_or_create<Req, Res>(
        &self,
        key: HandlerKey,
        create: impl FnOnce() -> BoxHandler<Req, Res>,
    ) -> SharedHandler<Req, Res>
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        let mut instances = self
            .instances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(handler) = instances
            .get(&key)
            .and_then(|instance| {
                instance
                    .clone()
                    .downcast::<AsyncMutex<BoxHandler<Req, Res>>>()
                    .ok()
            })
        {
            return handler;
        }

        let handler: SharedHandler<Req, Res> = Arc::new(AsyncMutex::new(create()));
        instances.insert(key, handler.clone());
        handler
    }
}

/// Maps each request/response pair to exactly one handler.
pub struct HandlerRegistry {
    policy: DuplicatePolicy,
    handlers: HashMap<HandlerKey, Registration>,
}

impl HandlerRegistry {
    /// Constructs an empty registry.
    pub fn new(policy: DuplicatePolicy) -> Self {
        HandlerRegistry {
            policy,
            handlers: HashMap::new(),
        }
    }

    /// Policy applied to duplicate registrations.
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Registers the handler factory of a request/response pair.
    ///
    /// # Errors
    /// Fails with [ErrorKind::DuplicateHandler] if the pair already has a
    /// handler and the policy is [DuplicatePolicy::Reject].
    pub fn register<Req, Res>(
        &mut self,
        factory: HandlerFactory<Req, Res>,
        lifetime: Lifetime,
    ) -> crate::Result<()>
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        let handler_name = factory.name();
        let entry = match lifetime {
            Lifetime::Transient => HandlerEntry::Transient(factory),
            Lifetime::Scoped => HandlerEntry::Scoped(factory),
            Lifetime::Singleton => HandlerEntry::Singleton {
                factory,
                instance: OnceLock::new(),
            },
        };

        self.insert(HandlerKey::of::<Req, Res>(), handler_name, lifetime, entry)
    }

    /// Registers a handler instance shared by every dispatch.
    pub fn register_instance<Req, Res, H>(&mut self, handler: H) -> crate::Result<()>
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        H: RequestHandler<Req, Res> + 'static,
    {
        let handler: BoxHandler<Req, Res> = Box::new(handler);
        let entry = HandlerEntry::Instance(Arc::new(AsyncMutex::new(handler)));

        self.insert(
            HandlerKey::of::<Req, Res>(),
            type_name::<H>(),
            Lifetime::Singleton,
            entry,
        )
    }

    /// Registers the factory only if the pair has no handler yet.
    ///
    /// Returns `true` if the factory was registered.
    pub fn try_register<Req, Res>(
        &mut self,
        factory: HandlerFactory<Req, Res>,
        lifetime: Lifetime,
    ) -> bool
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        if self.contains::<Req, Res>() {
            log::debug!(
                "`{}` already has a handler, skipping `{}`",
                HandlerKey::of::<Req, Res>(),
                factory.name()
            );
            return false;
        }

        self.register(factory, lifetime).is_ok()
    }

    fn insert<Req, Res>(
        &mut self,
        key: HandlerKey,
        handler_name: &'static str,
        lifetime: Lifetime,
        entry: HandlerEntry<Req, Res>,
    ) -> crate::Result<()>
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        if let Some(existing) = self.handlers.get(&key) {
            match self.policy {
                DuplicatePolicy::Reject => {
                    return Err(Error::new(
                        ErrorKind::DuplicateHandler,
                        format!("{}: [{}, {}]", key, existing.handler_name, handler_name),
                    ));
                }
                DuplicatePolicy::Replace => {
                    log::debug!(
                        "replacing handler `{}` of `{}` with `{}`",
                        existing.handler_name,
                        key,
                        handler_name
                    );
                }
            }
        }

        log::debug!(
            "registered {} handler `{}` for `{}`",
            lifetime.as_str(),
            handler_name,
            key
        );

        self.handlers.insert(
            key,
            Registration {
                handler_name,
                lifetime,
                entry: Box::new(entry),
            },
        );

        Ok(())
    }

    /// Returns `true` if the pair has a handler.
    pub fn contains<Req: 'static, Res: 'static>(&self) -> bool {
        self.contains_key(&HandlerKey::of::<Req, Res>())
    }

    pub(crate) fn contains_key(&self, key: &HandlerKey) -> bool {
        self.handlers.contains_key(key)
    }

    /// Name of the handler type registered under `key`.
    pub fn handler_name(&self, key: &HandlerKey) -> Option<&'static str> {
        self.handlers.get(key).map(|r| r.handler_name)
    }

    /// Lifetime of the handler registered under `key`.
    pub fn lifetime(&self, key: &HandlerKey) -> Option<Lifetime> {
        self.handlers.get(key).map(|r| r.lifetime)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Resolves the handler of a request/response pair for one dispatch.
    ///
    /// # Errors
    /// Fails with [ErrorKind::NotFound] if the pair has no handler.
    pub fn resolve<Req, Res>(
        &self,
        mediator: &DefaultMediator,
    ) -> crate::Result<ResolvedHandler<Req, Res>>
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        let key = HandlerKey::of::<Req, Res>();
        let entry = self
            .handlers
            .get(&key)
            .and_then(|r| r.entry.downcast_ref::<HandlerEntry<Req, Res>>())
            .ok_or_else(|| Error::not_found(key.request_name(), key.response_name()))?;

        let handler = match entry {
            HandlerEntry::Transient(factory) => ResolvedHandler::Owned(factory.create(mediator)),
            HandlerEntry::Scoped(factory) => match mediator.scope_cache() {
                // Cached instances never hold the scope that caches them.
                Some(scope) => ResolvedHandler::Shared(
                    scope.get_or_create(key, || factory.create(&mediator.unscoped())),
                ),
                // Outside a scope every dispatch is its own scope.
                None => ResolvedHandler::Owned(factory.create(mediator)),
            },
            HandlerEntry::Singleton { factory, instance } => {
                let handler = instance.get_or_init(|| {
                    // Singletons must not capture the scope they were first resolved in.
                    Arc::new(AsyncMutex::new(factory.create(&mediator.unscoped())))
                });
                ResolvedHandler::Shared(handler.clone())
            }
            HandlerEntry::Instance(handler) => ResolvedHandler::Shared(handler.clone()),
        };

        Ok(handler)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}
