use std::fmt;

/// A boxed error raised by a handler or a pipeline step.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for the mediator.
pub struct Error {
    repr: ErrorRepr,
}

/// Error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No handler is registered for the request/response pair.
    NotFound,
    /// A handler is already registered for the request/response pair.
    DuplicateHandler,
    /// The mediator configuration is invalid.
    Config,
    /// A handler or a pipeline step failed.
    Failed,
}

impl ErrorKind {
    /// Returns the description of the error kind.
    pub fn as_str(&self) -> &str {
        match *self {
            ErrorKind::NotFound => "handler not found",
            ErrorKind::DuplicateHandler => "duplicate handler",
            ErrorKind::Config => "invalid configuration",
            ErrorKind::Failed => "request failed",
        }
    }
}

enum ErrorRepr {
    /// An error with a kind.
    Kind(ErrorKind),
    /// An error with a description.
    WithDescription(ErrorKind, String),
    /// An error raised by a handler or a pipeline step, kept as-is.
    Failed(BoxError),
}

impl Error {
    pub fn new<S: Into<String>>(kind: ErrorKind, description: S) -> Error {
        Error {
            repr: ErrorRepr::WithDescription(kind, description.into()),
        }
    }

    /// Wraps a handler or pipeline failure.
    ///
    /// A mediator error that travelled through a handler (a nested `send`
    /// propagated with `?`) is returned unchanged instead of being nested.
    pub fn failed<E: Into<BoxError>>(error: E) -> Error {
        let error: BoxError = error.into();
        match error.downcast::<Error>() {
            Ok(inner) => *inner,
            Err(error) => Error {
                repr: ErrorRepr::Failed(error),
            },
        }
    }

    pub(crate) fn not_found(request: &str, response: &str) -> Error {
        Error::new(
            ErrorKind::NotFound,
            format!("no handler for `{}` -> `{}`", request, response),
        )
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Kind(kind) => kind,
            ErrorRepr::WithDescription(kind, _) => kind,
            ErrorRepr::Failed(_) => ErrorKind::Failed,
        }
    }

    /// Returns `true` if no handler was registered for the request.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Returns the error raised by the handler or pipeline step, if any.
    pub fn get_ref(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self.repr {
            ErrorRepr::Failed(ref error) => Some(error.as_ref()),
            _ => None,
        }
    }

    /// Attempts to downcast the handler or pipeline failure to a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.get_ref()?.downcast_ref::<E>()
    }

    /// Consumes the error, returning the handler or pipeline failure, if any.
    pub fn into_inner(self) -> Option<BoxError> {
        match self.repr {
            ErrorRepr::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            repr: ErrorRepr::Kind(kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.repr {
            ErrorRepr::Kind(ref kind) => {
                write!(f, "{}", kind.as_str())
            }
            ErrorRepr::WithDescription(ref kind, ref description) => {
                write!(f, "{}: {}", kind.as_str(), description)
            }
            ErrorRepr::Failed(ref error) => fmt::Display::fmt(error, f),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.repr {
            ErrorRepr::Failed(ref error) => fmt::Debug::fmt(error, f),
            _ => fmt::Display::fmt(self, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.repr {
            ErrorRepr::Failed(ref error) => error.source(),
            _ => None,
        }
    }
}
