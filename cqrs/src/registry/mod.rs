//! Lookup tables populated once at startup and read by every dispatch.

use crate::config::{DuplicatePolicy, Lifetime};
use crate::error::{Error, ErrorKind};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

mod handlers;
pub use handlers::*;

mod pipelines;
pub use pipelines::*;

mod scan;
pub use scan::*;

/// Identifies a request/response pair.
#[derive(Debug, Clone, Copy)]
pub struct HandlerKey {
    req_ty: TypeId,
    res_ty: TypeId,
    req_name: &'static str,
    res_name: &'static str,
}

impl HandlerKey {
    pub fn of<Req: 'static, Res: 'static>() -> Self {
        HandlerKey {
            req_ty: TypeId::of::<Req>(),
            res_ty: TypeId::of::<Res>(),
            req_name: type_name::<Req>(),
            res_name: type_name::<Res>(),
        }
    }

    /// Name of the request type.
    pub fn request_name(&self) -> &'static str {
        self.req_name
    }

    /// Name of the response type.
    pub fn response_name(&self) -> &'static str {
        self.res_name
    }
}

impl PartialEq for HandlerKey {
    fn eq(&self, other: &Self) -> bool {
        self.req_ty == other.req_ty && self.res_ty == other.res_ty
    }
}

impl Eq for HandlerKey {}

impl Hash for HandlerKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.req_ty.hash(state);
        self.res_ty.hash(state);
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.req_name, self.res_name)
    }
}

/// The handler and pipeline tables of a mediator.
#[derive(Default)]
pub struct Registry {
    handlers: HandlerRegistry,
    pipelines: PipelineRegistry,
}

impl Registry {
    /// Constructs an empty registry.
    pub fn new(policy: DuplicatePolicy) -> Self {
        Registry {
            handlers: HandlerRegistry::new(policy),
            pipelines: PipelineRegistry::new(),
        }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    pub fn pipelines_mut(&mut self) -> &mut PipelineRegistry {
        &mut self.pipelines
    }

    /// Registers every candidate, handlers with the given `lifetime`.
    ///
    /// With [DuplicatePolicy::Reject] the whole set is checked first and every
    /// request with more than one handler is reported, nothing is registered
    /// in that case.
    pub fn scan(&mut self, candidates: &[Candidate], lifetime: Lifetime) -> crate::Result<()> {
        if self.handlers.policy() == DuplicatePolicy::Reject {
            self.check_duplicates(candidates)?;
        }

        for candidate in candidates {
            candidate.register(self, lifetime)?;
        }

        log::debug!("scanned {} candidates", candidates.len());
        Ok(())
    }

    fn check_duplicates(&self, candidates: &[Candidate]) -> crate::Result<()> {
        let mut by_key: HashMap<HandlerKey, Vec<&'static str>> = HashMap::new();

        for candidate in candidates {
            if let CandidateKind::Handler(key) = candidate.kind() {
                by_key.entry(key).or_default().push(candidate.name());
            }
        }

        let mut duplicates = by_key
            .into_iter()
            .filter_map(|(key, mut handlers)| {
                if let Some(existing) = self.handlers.handler_name(&key) {
                    handlers.insert(0, existing);
                }

                (handlers.len() > 1).then(|| format!("{}: [{}]", key, handlers.join(", ")))
            })
            .collect::<Vec<_>>();

        if duplicates.is_empty() {
            return Ok(());
        }

        duplicates.sort();
        Err(Error::new(ErrorKind::DuplicateHandler, duplicates.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{candidates, HandlerResult, Pipeline, Request, RequestHandler};
    use tokio_util::sync::CancellationToken;

    #[derive(Clone)]
    struct Ping;
    impl Request<u32> for Ping {}
    impl Request<u64> for Ping {}

    #[derive(Clone)]
    struct Echo(String);
    impl Request<String> for Echo {}

    #[derive(Default)]
    struct PingHandler;

    #[async_trait::async_trait]
    impl RequestHandler<Ping, u32> for PingHandler {
        async fn handle(&mut self, _: Ping, _: CancellationToken) -> HandlerResult<u32> {
            Ok(1)
        }
    }

    #[derive(Default)]
    struct OtherPingHandler;

    #[async_trait::async_trait]
    impl RequestHandler<Ping, u32> for OtherPingHandler {
        async fn handle(&mut self, _: Ping, _: CancellationToken) -> HandlerResult<u32> {
            Ok(2)
        }
    }

    #[derive(Default)]
    struct EchoHandler;

    #[async_trait::async_trait]
    impl RequestHandler<Echo, String> for EchoHandler {
        async fn handle(&mut self, req: Echo, _: CancellationToken) -> HandlerResult<String> {
            Ok(req.0)
        }
    }

    #[derive(Default)]
    struct NoopStep;
    impl Pipeline<Ping, u32> for NoopStep {}

    #[test]
    fn handler_key_test() {
        assert_eq!(HandlerKey::of::<Ping, u32>(), HandlerKey::of::<Ping, u32>());
        assert_ne!(HandlerKey::of::<Ping, u32>(), HandlerKey::of::<Ping, u64>());
        assert!(HandlerKey::of::<Echo, String>()
            .to_string()
            .ends_with("Echo -> alloc::string::String"));
    }

    #[test]
    fn register_strict_duplicate_test() {
        let mut registry = HandlerRegistry::new(DuplicatePolicy::Reject);
        registry
            .register(HandlerFactory::new(PingHandler::default), Lifetime::Transient)
            .unwrap();

        let err = registry
            .register(HandlerFactory::new(OtherPingHandler::default), Lifetime::Transient)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateHandler);
        assert!(err.to_string().contains("PingHandler"));
        assert!(err.to_string().contains("OtherPingHandler"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.handler_name(&HandlerKey::of::<Ping, u32>()),
            Some(type_name::<PingHandler>())
        );
    }

    #[test]
    fn register_relaxed_duplicate_test() {
        let mut registry = HandlerRegistry::new(DuplicatePolicy::Replace);
        registry
            .register(HandlerFactory::new(PingHandler::default), Lifetime::Transient)
            .unwrap();
        registry
            .register(HandlerFactory::new(OtherPingHandler::default), Lifetime::Scoped)
            .unwrap();

        let key = HandlerKey::of::<Ping, u32>();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.handler_name(&key), Some(type_name::<OtherPingHandler>()));
        assert_eq!(registry.lifetime(&key), Some(Lifetime::Scoped));
    }

    #[test]
    fn try_register_keeps_first_test() {
        let mut registry = HandlerRegistry::default();
        let first = HandlerFactory::new(PingHandler::default);
        let second = HandlerFactory::new(OtherPingHandler::default);

        assert!(registry.try_register(first, Lifetime::Transient));
        assert!(!registry.try_register(second, Lifetime::Transient));
        assert_eq!(
            registry.handler_name(&HandlerKey::of::<Ping, u32>()),
            Some(type_name::<PingHandler>())
        );
    }

    #[test]
    fn scan_test() {
        let mut registry = Registry::default();
        registry
            .scan(
                &candidates![
                    handler PingHandler: Ping => u32,
                    handler EchoHandler: Echo => String,
                    pipeline NoopStep: Ping => u32,
                    pipeline NoopStep: Ping => u32,
                ],
                Lifetime::Scoped,
            )
            .unwrap();

        assert!(registry.handlers().contains::<Ping, u32>());
        assert!(registry.handlers().contains::<Echo, String>());
        assert!(!registry.handlers().contains::<Echo, u32>());
        assert_eq!(
            registry.handlers().lifetime(&HandlerKey::of::<Echo, String>()),
            Some(Lifetime::Scoped)
        );
        assert_eq!(registry.pipelines().chain_len::<Ping, u32>(), 2);
        assert_eq!(registry.pipelines().chain_len::<Echo, String>(), 0);
    }

    #[test]
    fn scan_reports_every_duplicate_test() {
        let mut registry = Registry::default();
        registry
            .handlers_mut()
            .register(HandlerFactory::new(EchoHandler::default), Lifetime::Transient)
            .unwrap();

        let err = registry
            .scan(
                &candidates![
                    handler PingHandler: Ping => u32,
                    handler OtherPingHandler: Ping => u32,
                    handler EchoHandler: Echo => String,
                ],
                Lifetime::Transient,
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateHandler);
        let message = err.to_string();
        assert!(message.contains("OtherPingHandler"));
        assert!(message.contains("Echo -> alloc::string::String"));

        // Nothing from the failed scan was registered.
        assert!(!registry.handlers().contains::<Ping, u32>());
    }

    #[test]
    fn scan_relaxed_test() {
        let mut registry = Registry::new(DuplicatePolicy::Replace);
        registry
            .scan(
                &candidates![
                    handler PingHandler: Ping => u32,
                    handler OtherPingHandler: Ping => u32,
                ],
                Lifetime::Transient,
            )
            .unwrap();

        assert_eq!(
            registry.handlers().handler_name(&HandlerKey::of::<Ping, u32>()),
            Some(type_name::<OtherPingHandler>())
        );
    }

    #[test]
    fn scan_groups_by_pair_test() {
        #[derive(Default)]
        struct WidePingHandler;

        #[async_trait::async_trait]
        impl RequestHandler<Ping, u64> for WidePingHandler {
            async fn handle(&mut self, _: Ping, _: CancellationToken) -> HandlerResult<u64> {
                Ok(3)
            }
        }

        let mut registry = Registry::default();
        registry
            .scan(
                &candidates![
                    handler PingHandler: Ping => u32,
                    handler WidePingHandler: Ping => u64,
                ],
                Lifetime::Transient,
            )
            .unwrap();

        assert!(registry.handlers().contains::<Ping, u32>());
        assert!(registry.handlers().contains::<Ping, u64>());

        let err = registry
            .scan(
                &candidates![
                    handler OtherPingHandler: Ping => u32,
                    handler WidePingHandler: Ping => u64,
                ],
                Lifetime::Transient,
            )
            .unwrap_err();

        // One entry per duplicated pair, ordered by name.
        let message = err.to_string();
        let narrow = message.find("Ping -> u32").unwrap();
        let wide = message.find("Ping -> u64").unwrap();
        assert!(narrow < wide);
        assert_eq!(message.matches("Ping -> u").count(), 2);
    }

    #[test]
    fn resolve_chain_order_test() {
        struct Named(&'static str);
        impl Pipeline<Ping, u32> for Named {}
        struct Open;
        impl crate::OpenPipeline for Open {}

        let mut pipelines = PipelineRegistry::new();
        assert_eq!(pipelines.register(PipelineFactory::new(|| Named("a"))), 0);
        assert_eq!(pipelines.register_open(OpenPipelineFactory::new(|| Open)), 1);
        assert_eq!(pipelines.register(PipelineFactory::new(|| Named("b"))), 2);

        assert_eq!(pipelines.resolve_chain::<Ping, u32>().len(), 3);
        assert_eq!(pipelines.resolve_chain::<Echo, String>().len(), 1);
    }
}
