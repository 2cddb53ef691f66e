use cqrs::{
    CancellationToken, DefaultMediator, HandlerResult, Mediator, Pipeline, Request, RequestHandler,
};
use serde::Serialize;

#[derive(Clone, Serialize)]
struct Ping(Option<&'static str>);

#[derive(Debug, Clone, Serialize)]
struct Pong(String);

impl Request<Pong> for Ping {}

struct PingHandler;

#[async_trait::async_trait]
impl RequestHandler<Ping, Pong> for PingHandler {
    async fn handle(&mut self, req: Ping, _: CancellationToken) -> HandlerResult<Pong> {
        match req.0 {
            Some(name) => Ok(Pong(format!("Pong, {}!", name))),
            None => Ok(Pong("Pong!".to_owned())),
        }
    }
}

struct Announce(&'static str);

#[async_trait::async_trait]
impl Pipeline<Ping, Pong> for Announce {
    async fn pre(&mut self, _: &Ping, _: &CancellationToken) -> HandlerResult<()> {
        println!("{}.Pre", self.0);
        Ok(())
    }

    async fn post(&mut self, _: &Ping, _: &Pong, _: &CancellationToken) -> HandlerResult<()> {
        println!("{}.Post", self.0);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> cqrs::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let mediator = DefaultMediator::builder()
        .add_handler(PingHandler)
        .add_logging::<Ping, Pong>()
        .add_pipeline(|| Announce("A"))
        .add_pipeline(|| Announce("B"))
        .build()?;

    let response = mediator.send(Ping(Some("Rust"))).await?;
    println!("{}", response.0);

    let response = mediator.send(Ping(None)).await?;
    println!("{}", response.0);

    Ok(())
}
