use super::HandlerKey;
use crate::pipeline::{OpenPipeline, OpenStep, Pipeline};
use crate::request::Request;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;

/// A boxed pipeline step.
pub type BoxPipeline<Req, Res> = Box<dyn Pipeline<Req, Res>>;

type CreateFn<Req, Res> = dyn Fn() -> BoxPipeline<Req, Res> + Send + Sync;

type CreateOpenFn = dyn Fn() -> Box<dyn OpenPipeline> + Send + Sync;

/// Creates the steps of a request/response pair, one per dispatch.
pub struct PipelineFactory<Req, Res> {
    name: &'static str,
    create: Arc<CreateFn<Req, Res>>,
}

impl<Req, Res> PipelineFactory<Req, Res>
where
    Req: Request<Res>,
    Res: Send + Sync + 'static,
{
    pub fn new<P, F>(f: F) -> Self
    where
        P: Pipeline<Req, Res> + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        PipelineFactory {
            name: type_name::<P>(),
            create: Arc::new(move || -> BoxPipeline<Req, Res> { Box::new(f()) }),
        }
    }

    /// Name of the step type this factory creates.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<Req, Res> Clone for PipelineFactory<Req, Res> {
    fn clone(&self) -> Self {
        PipelineFactory {
            name: self.name,
            create: self.create.clone(),
        }
    }
}

/// Creates steps that apply to every request.
#[derive(Clone)]
pub struct OpenPipelineFactory {
    name: &'static str,
    create: Arc<CreateOpenFn>,
}

impl OpenPipelineFactory {
    pub fn new<P, F>(f: F) -> Self
    where
        P: OpenPipeline + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        OpenPipelineFactory {
            name: type_name::<P>(),
            create: Arc::new(move || -> Box<dyn OpenPipeline> { Box::new(f()) }),
        }
    }

    /// Name of the step type this factory creates.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

struct TypedEntry {
    order: u64,
    // Always a `PipelineFactory<Req, Res>` for the key it is stored under.
    factory: Box<dyn Any + Send + Sync>,
}

/// Maps each request/response pair to its ordered pipeline steps.
#[derive(Default)]
pub struct PipelineRegistry {
    typed: HashMap<HandlerKey, Vec<TypedEntry>>,
    open: Vec<(u64, OpenPipelineFactory)>,
    next_order: u64,
}

impl PipelineRegistry {
    /// Constructs an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step to the chain of a request/response pair.
    ///
    /// Returns the registration order of the step.
    pub fn register<Req, Res>(&mut self, factory: PipelineFactory<Req, Res>) -> u64
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        let key = HandlerKey::of::<Req, Res>();
        let order = self.next_order();

        log::debug!(
            "registered pipeline `{}` for `{}` at {}",
            factory.name(),
            key,
            order
        );

        self.typed.entry(key).or_default().push(TypedEntry {
            order,
            factory: Box::new(factory),
        });

        order
    }

    /// Appends a step to the chain of every request/response pair.
    ///
    /// Returns the registration order of the step.
    pub fn register_open(&mut self, factory: OpenPipelineFactory) -> u64 {
        let order = self.next_order();
        log::debug!("registered open pipeline `{}` at {}", factory.name(), order);
        self.open.push((order, factory));
        order
    }

    fn next_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    /// Number of steps bound to a request/response pair, open steps included.
    pub fn chain_len<Req: 'static, Res: 'static>(&self) -> usize {
        let typed = self
            .typed
            .get(&HandlerKey::of::<Req, Res>())
            .map_or(0, Vec::len);

        typed + self.open.len()
    }

    /// Creates the steps of a request/response pair in registration order.
    ///
    /// Every call returns fresh instances. An empty chain is valid.
    pub fn resolve_chain<Req, Res>(&self) -> Vec<BoxPipeline<Req, Res>>
    where
        Req: Request<Res>,
        Res: Send + Sync + 'static,
    {
        let typed = self
            .typed
            .get(&HandlerKey::of::<Req, Res>())
            .map(Vec::as_slice)
            .unwrap_or_default();

        let capacity = typed.len() + self.open.len();
        let mut chain: Vec<BoxPipeline<Req, Res>> = Vec::with_capacity(capacity);
        let mut typed = typed.iter().peekable();
        let mut open = self.open.iter().peekable();

        // Both lists are sorted by order, merge them.
        loop {
            let take_typed = match (typed.peek(), open.peek()) {
                (Some(t), Some((o, _))) => t.order < *o,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };

            if take_typed {
                if let Some(factory) = typed
                    .next()
                    .and_then(|t| t.factory.downcast_ref::<PipelineFactory<Req, Res>>())
                {
                    chain.push((factory.create)());
                }
            } else if let Some((_, factory)) = open.next() {
                chain.push(Box::new(OpenStep((factory.create)())));
            }
        }

        chain
    }
}
