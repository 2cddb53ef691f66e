use crate::pipeline::{Dispatch, OpenPipeline, Pipeline};
use crate::request::{HandlerResult, Request};
use chrono::Utc;
use log::Level;
use serde::Serialize;
use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%d-%B-%Y %H:%M:%S";

fn timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Last path segment of a type name, without its generic arguments.
fn short_name(type_name: &str) -> &str {
    let path = type_name.split('<').next().unwrap_or(type_name);
    path.rsplit("::").next().unwrap_or(path)
}

/// JSON of a logged value, `{}` when it serializes to `null`.
fn payload<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) if json == "null" => "{}".to_owned(),
        Ok(json) => json,
        Err(err) => format!("<{}>", err),
    }
}

// The id of one dispatch and when it started.
#[derive(Debug)]
struct Correlation {
    level: Level,
    id: Option<Uuid>,
    started: Option<Instant>,
}

impl Correlation {
    fn new(level: Level) -> Self {
        Correlation {
            level,
            id: None,
            started: None,
        }
    }

    fn start(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.id = Some(id);
        self.started = Some(Instant::now());
        id
    }

    fn id(&self) -> Uuid {
        self.id.unwrap_or_else(Uuid::nil)
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|started| started.elapsed()).unwrap_or_default()
    }
}

/// Logs each request and its response as JSON under a correlation id.
///
/// `pre` assigns a fresh id and logs `"{id} - {Request} at {timestamp} : {json}"`,
/// `post` logs the response the same way with the time spent since `pre`.
pub struct LoggingPipeline<Req, Res> {
    correlation: Correlation,
    _marker: PhantomData<fn() -> (Req, Res)>,
}

impl<Req, Res> LoggingPipeline<Req, Res> {
    /// Constructs a step logging at [Level::Info].
    pub fn new() -> Self {
        Self::with_level(Level::Info)
    }

    pub fn with_level(level: Level) -> Self {
        LoggingPipeline {
            correlation: Correlation::new(level),
            _marker: PhantomData,
        }
    }

    /// The id of the request being dispatched, set by `pre`.
    pub fn correlation_id(&self) -> Option<Uuid> {
        self.correlation.id
    }
}

impl<Req, Res> Default for LoggingPipeline<Req, Res> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<Req, Res> Pipeline<Req, Res> for LoggingPipeline<Req, Res>
where
    Req: Request<Res> + Serialize,
    Res: Serialize + Send + Sync + 'static,
{
    async fn pre(&mut self, req: &Req, _: &CancellationToken) -> HandlerResult<()> {
        let id = self.correlation.start();

        log::log!(
            self.correlation.level,
            "{} - {} at {} : {}",
            id,
            short_name(type_name::<Req>()),
            timestamp(),
            payload(req)
        );
        Ok(())
    }

    async fn post(&mut self, _: &Req, res: &Res, _: &CancellationToken) -> HandlerResult<()> {
        log::log!(
            self.correlation.level,
            "{} - {} at {} : {} ({:?})",
            self.correlation.id(),
            short_name(type_name::<Res>()),
            timestamp(),
            payload(res),
            self.correlation.elapsed()
        );
        Ok(())
    }
}

/// Logs the types of every request and response under a correlation id.
///
/// Runs for any request, payloads are not logged since the step only sees
/// the type-erased [Dispatch].
#[derive(Debug)]
pub struct OpenLoggingPipeline {
    correlation: Correlation,
}

impl OpenLoggingPipeline {
    /// Constructs a step logging at [Level::Info].
    pub fn new() -> Self {
        Self::with_level(Level::Info)
    }

    pub fn with_level(level: Level) -> Self {
        OpenLoggingPipeline {
            correlation: Correlation::new(level),
        }
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.correlation.id
    }
}

impl Default for OpenLoggingPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl OpenPipeline for OpenLoggingPipeline {
    async fn pre(&mut self, dispatch: &Dispatch<'_>, _: &CancellationToken) -> HandlerResult<()> {
        let id = self.correlation.start();

        log::log!(
            self.correlation.level,
            "{} - {} at {}",
            id,
            short_name(dispatch.request_type()),
            timestamp()
        );
        Ok(())
    }

    async fn post(
        &mut self,
        dispatch: &Dispatch<'_>,
        _: &(dyn Any + Send + Sync),
        _: &CancellationToken,
    ) -> HandlerResult<()> {
        log::log!(
            self.correlation.level,
            "{} - {} at {} ({:?})",
            self.correlation.id(),
            short_name(dispatch.response_type()),
            timestamp(),
            self.correlation.elapsed()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DefaultMediator, Mediator, Request, Unit};
    use log::{LevelFilter, Log, Metadata, Record};
    use std::sync::{Mutex, Once};

    #[derive(Clone, Serialize)]
    struct Ping;
    impl Request<u8> for Ping {}

    #[derive(Clone, Serialize)]
    struct Rename {
        name: &'static str,
    }
    impl Request<String> for Rename {}

    #[derive(Clone, Serialize)]
    struct Forget(u32);
    impl Request<Unit> for Forget {}

    // Keeps the messages of the crate's records.
    struct Capture;

    static CAPTURE: Capture = Capture;
    static LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());

    impl Log for Capture {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            if record.target().starts_with("cqrs::") {
                LINES.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    fn capture_logs() {
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            let _ = log::set_logger(&CAPTURE);
            log::set_max_level(LevelFilter::Trace);
        });
    }

    fn lines_with(id: Uuid) -> Vec<String> {
        let id = id.to_string();
        LINES
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.starts_with(&id))
            .cloned()
            .collect()
    }

    #[test]
    fn short_name_test() {
        assert_eq!(short_name(type_name::<Rename>()), "Rename");
        assert_eq!(short_name(type_name::<String>()), "String");
        assert_eq!(short_name(type_name::<Vec<Option<String>>>()), "Vec");
        assert_eq!(short_name(type_name::<u8>()), "u8");
        assert_eq!(short_name(type_name::<()>()), "()");
    }

    #[test]
    fn payload_test() {
        assert_eq!(payload(&Rename { name: "a" }), r#"{"name":"a"}"#);
        assert_eq!(payload(&Forget(3)), "3");
        assert_eq!(payload(&()), "{}");
        assert_eq!(payload(&None::<u8>), "{}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn payload_logged_test() {
        capture_logs();
        let mut step = LoggingPipeline::<Rename, String>::new();
        let (rename, token) = (Rename { name: "PAYLOAD42" }, CancellationToken::new());

        step.pre(&rename, &token).await.unwrap();
        step.post(&rename, &"renamed".to_owned(), &token).await.unwrap();

        let id = step.correlation_id().unwrap();
        let lines = lines_with(id);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(&format!("{} - Rename at ", id)));
        assert!(lines[0].ends_with(r#" : {"name":"PAYLOAD42"}"#));
        assert!(lines[1].starts_with(&format!("{} - String at ", id)));
        assert!(lines[1].contains(r#" : "renamed" ("#));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unit_response_logged_test() {
        capture_logs();
        let mut step = LoggingPipeline::<Forget, Unit>::with_level(Level::Debug);
        let (forget, token) = (Forget(7), CancellationToken::new());

        step.pre(&forget, &token).await.unwrap();
        step.post(&forget, &(), &token).await.unwrap();

        let lines = lines_with(step.correlation_id().unwrap());
        assert!(lines[0].ends_with(" : 7"));
        assert!(lines[1].contains(" - () at "));
        assert!(lines[1].contains(" : {} ("));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_step_logs_short_names_test() {
        capture_logs();
        let mut step = OpenLoggingPipeline::new();
        assert_eq!(step.correlation_id(), None);

        let (ping, token) = (Ping, CancellationToken::new());
        let dispatch = Dispatch::of::<Ping, u8>(&ping);

        step.pre(&dispatch, &token).await.unwrap();
        step.post(&dispatch, &1u8, &token).await.unwrap();

        let id = step.correlation_id().unwrap();
        let lines = lines_with(id);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(&format!("{} - Ping at ", id)));
        assert!(lines[1].starts_with(&format!("{} - u8 at ", id)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fresh_id_per_step_test() {
        let (ping, token) = (Ping, CancellationToken::new());
        let dispatch = Dispatch::of::<Ping, u8>(&ping);

        let mut first = OpenLoggingPipeline::with_level(Level::Debug);
        let mut second = OpenLoggingPipeline::with_level(Level::Debug);
        first.pre(&dispatch, &token).await.unwrap();
        second.pre(&dispatch, &token).await.unwrap();

        assert_ne!(first.correlation_id(), second.correlation_id());
    }

    #[test]
    fn timestamp_format_test() {
        let formatted = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(7, 5, 1))
            .map(|time| time.format(TIMESTAMP_FORMAT).to_string());

        assert_eq!(formatted.as_deref(), Some("09-March-2024 07:05:01"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_logging_test() {
        capture_logs();
        let mediator = DefaultMediator::builder()
            .add_handler_fn(|req: Rename, _| async move { Ok(req.name.to_lowercase()) })
            .add_logging::<Rename, String>()
            .add_handler_fn(|_: Ping, _| async { Ok(7) })
            .add_open_logging()
            .build()
            .unwrap();

        let renamed = mediator.send(Rename { name: "MEDIATED42" }).await.unwrap();
        assert_eq!(renamed, "mediated42");
        assert_eq!(mediator.send(Ping).await.unwrap(), 7);

        assert_eq!(mediator.registry().pipelines().chain_len::<Rename, String>(), 2);
        assert_eq!(mediator.registry().pipelines().chain_len::<Ping, u8>(), 1);

        let lines = LINES.lock().unwrap().clone();
        assert!(lines.iter().any(|line| line.ends_with(r#" : {"name":"MEDIATED42"}"#)));
        assert!(lines.iter().any(|line| line.contains(r#" : "mediated42" ("#)));
    }
}
