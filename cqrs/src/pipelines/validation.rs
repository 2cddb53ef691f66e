use crate::pipeline::Pipeline;
use crate::request::{HandlerResult, Request};
use serde::Serialize;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A request rejected by a [Validator].
///
/// Holds every failing message, grouped by property name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("One or more validation errors occurred.")]
pub struct ValidationError {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub const TYPE: &'static str = "https://tools.ietf.org/html/rfc7231#section-6.5.1";

    pub fn new(errors: BTreeMap<String, Vec<String>>) -> Self {
        ValidationError { errors }
    }

    /// Messages of each failing property.
    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn into_errors(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }

    pub fn title(&self) -> &'static str {
        "One or more validation errors occurred."
    }

    /// The HTTP status of a validation failure.
    pub fn status(&self) -> u16 {
        400
    }
}

/// Validates values of type `T`.
pub trait Validator<T>: Send + Sync {
    fn validate(&self, value: &T) -> Result<(), ValidationError>;
}

type Rule<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// A [Validator] built from per-property rules.
///
/// ```rust
/// use cqrs::{RuleSet, Validator};
///
/// struct SignUp {
///     name: String,
///     age: u32,
/// }
///
/// let mut rules = RuleSet::new();
/// rules
///     .rule_for("name", |s: &SignUp| &s.name)
///     .with(|name| !name.is_empty(), "Name is required")
///     .with(|name| name.len() <= 8, "Name is too long");
/// rules
///     .rule_for("age", |s: &SignUp| &s.age)
///     .with(|age| *age >= 18, "Must be an adult");
///
/// let err = rules
///     .validate(&SignUp { name: String::new(), age: 12 })
///     .unwrap_err();
///
/// assert_eq!(err.errors()["name"], vec!["Name is required"]);
/// assert_eq!(err.errors()["age"], vec!["Must be an adult"]);
/// ```
pub struct RuleSet<T> {
    rules: Vec<(&'static str, Rule<T>)>,
}

impl<T: 'static> RuleSet<T> {
    pub fn new() -> Self {
        RuleSet { rules: Vec::new() }
    }

    /// Starts the rules of the property returned by `selector`.
    ///
    /// Rules added for the same `name` accumulate.
    pub fn rule_for<P, S>(&mut self, name: &'static str, selector: S) -> PropertyRules<'_, T, P, S>
    where
        P: ?Sized + 'static,
        S: Fn(&T) -> &P + Clone + Send + Sync + 'static,
    {
        PropertyRules {
            name,
            rules: &mut self.rules,
            selector,
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> Default for RuleSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Validator<T> for RuleSet<T> {
    fn validate(&self, value: &T) -> Result<(), ValidationError> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (name, rule) in &self.rules {
            if let Some(message) = rule(value) {
                errors.entry((*name).to_owned()).or_default().push(message);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(errors))
        }
    }
}

/// Adds rules to one property of a [RuleSet].
pub struct PropertyRules<'a, T, P: ?Sized, S> {
    name: &'static str,
    rules: &'a mut Vec<(&'static str, Rule<T>)>,
    selector: S,
    _marker: PhantomData<fn(&P)>,
}

impl<'a, T, P, S> PropertyRules<'a, T, P, S>
where
    T: 'static,
    P: ?Sized + 'static,
    S: Fn(&T) -> &P + Clone + Send + Sync + 'static,
{
    /// Fails with `message` when `predicate` does not hold for the property.
    pub fn with<F>(mut self, predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        let selector = self.selector.clone();
        let message = message.into();
        let rule: Rule<T> = Box::new(move |value: &T| {
            if predicate(selector(value)) {
                None
            } else {
                Some(message.clone())
            }
        });

        self.rules.push((self.name, rule));
        self
    }
}

/// Runs a [Validator] before the handler, a rejected request never reaches it.
pub struct ValidationPipeline<Req, Res> {
    validator: Arc<dyn Validator<Req>>,
    _marker: PhantomData<fn() -> Res>,
}

impl<Req, Res> ValidationPipeline<Req, Res> {
    pub fn new(validator: Arc<dyn Validator<Req>>) -> Self {
        ValidationPipeline {
            validator,
            _marker: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<Req, Res> Pipeline<Req, Res> for ValidationPipeline<Req, Res>
where
    Req: Request<Res>,
    Res: Send + Sync + 'static,
{
    async fn pre(&mut self, req: &Req, _: &CancellationToken) -> HandlerResult<()> {
        self.validator.validate(req)?;
        Ok(())
    }
}
