use super::{HandlerKey, Registry};
use crate::config::Lifetime;
use crate::pipeline::Pipeline;
use crate::registry::{HandlerFactory, PipelineFactory};
use crate::request::{Request, RequestHandler};
use std::any::type_name;

/// What a [Candidate] registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// A request handler of the pair.
    Handler(HandlerKey),
    /// A pipeline step of the pair.
    Pipeline(HandlerKey),
}

/// A type that registers itself when a module is scanned.
///
/// Candidates are built at compile time, usually with the [candidates!]
/// macro, and registered together with [Registry::scan].
///
/// [candidates!]: crate::candidates
#[derive(Clone, Copy)]
pub struct Candidate {
    name: &'static str,
    kind: CandidateKind,
    register: fn(&mut Registry, Lifetime) -> crate::Result<()>,
}

impl Candidate {
    /// A handler created with `H::default()` for every new instance.
    pub fn handler<Req, Res, H>() -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        H: RequestHandler<Req, Res> + Default + 'static,
    {
        Candidate {
            name: type_name::<H>(),
            kind: CandidateKind::Handler(HandlerKey::of::<Req, Res>()),
            register: register_handler::<Req, Res, H>,
        }
    }

    /// A pipeline step created with `P::default()` for every dispatch.
    pub fn pipeline<Req, Res, P>() -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        P: Pipeline<Req, Res> + Default + 'static,
    {
        Candidate {
            name: type_name::<P>(),
            kind: CandidateKind::Pipeline(HandlerKey::of::<Req, Res>()),
            register: register_pipeline::<Req, Res, P>,
        }
    }

    /// A [ValidationPipeline] running `V::default()` before every request.
    ///
    /// One validator is shared by every dispatch of the pair.
    ///
    /// [ValidationPipeline]: crate::ValidationPipeline
    #[cfg(feature = "validation")]
    pub fn validator<Req, Res, V>() -> Self
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
        V: crate::Validator<Req> + Default + 'static,
    {
        Candidate {
            name: type_name::<V>(),
            kind: CandidateKind::Pipeline(HandlerKey::of::<Req, Res>()),
            register: register_validator::<Req, Res, V>,
        }
    }

    /// Name of the candidate type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> CandidateKind {
        self.kind
    }

    pub(crate) fn register(
        &self,
        registry: &mut Registry,
        lifetime: Lifetime,
    ) -> crate::Result<()> {
        (self.register)(registry, lifetime)
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

fn register_handler<Req, Res, H>(registry: &mut Registry, lifetime: Lifetime) -> crate::Result<()>
where
    Req: Request<Res>,
    Res: Send + Sync + 'static,
    H: RequestHandler<Req, Res> + Default + 'static,
{
    registry
        .handlers_mut()
        .register(HandlerFactory::new(H::default), lifetime)
}

fn register_pipeline<Req, Res, P>(registry: &mut Registry, _: Lifetime) -> crate::Result<()>
where
    Req: Request<Res>,
    Res: Send + Sync + 'static,
    P: Pipeline<Req, Res> + Default + 'static,
{
    registry
        .pipelines_mut()
        .register(PipelineFactory::new(P::default));
    Ok(())
}

#[cfg(feature = "validation")]
fn register_validator<Req, Res, V>(registry: &mut Registry, _: Lifetime) -> crate::Result<()>
where
    Req: Request<Res>,
    Res: Send + Sync + 'static,
    V: crate::Validator<Req> + Default + 'static,
{
    use crate::ValidationPipeline;
    use std::sync::Arc;

    let validator: Arc<dyn crate::Validator<Req>> = Arc::new(V::default());
    registry
        .pipelines_mut()
        .register(PipelineFactory::new(move || {
            ValidationPipeline::<Req, Res>::new(validator.clone())
        }));
    Ok(())
}

/// A group of handlers and pipeline steps registered together.
///
/// ```rust
/// use cqrs::{candidates, Candidate, HandlerResult, Module, Request, RequestHandler};
/// use cqrs::CancellationToken;
///
/// #[derive(Clone)]
/// struct Ping;
/// impl Request<&'static str> for Ping {}
///
/// #[derive(Default)]
/// struct PingHandler;
///
/// #[cqrs::async_trait]
/// impl RequestHandler<Ping, &'static str> for PingHandler {
///     async fn handle(&mut self, _: Ping, _: CancellationToken) -> HandlerResult<&'static str> {
///         Ok("pong")
///     }
/// }
///
/// struct PingModule;
/// impl Module for PingModule {
///     fn candidates() -> Vec<Candidate> {
///         candidates![handler PingHandler: Ping => &'static str]
///     }
/// }
///
/// assert_eq!(PingModule::candidates().len(), 1);
/// ```
pub trait Module {
    /// The handlers and pipeline steps of this module.
    fn candidates() -> Vec<Candidate>;
}

/// Builds a list of [Candidate]s.
///
/// Each entry is `handler Type: Request => Response`,
/// `pipeline Type: Request => Response` or
/// `validator Type: Request => Response`.
#[macro_export]
macro_rules! candidates {
    ($($kind:ident $ty:ty : $req:ty => $res:ty),* $(,)?) => {
        vec![$($crate::Candidate::$kind::<$req, $res, $ty>()),*]
    };
}
