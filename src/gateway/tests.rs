use super::*;
use crate::testing::{alice, bot_account, status, MockClient};
use async_trait::async_trait;
use mastodiff_core::{
    config::Config, error::BotError, params::GenerationRequest,
};
use std::sync::Mutex;

/// Accepts `#diffuse_me` statuses and records what it was asked.
#[derive(Default)]
struct RecordingHandler {
    seen: Arc<Mutex<Vec<(String, u32)>>>,
    fail: bool,
}

#[async_trait]
impl RequestHandler for RecordingHandler {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_eligible(&self, ctx: &RequestContext) -> bool {
        ctx.contains_tag("diffuse_me")
    }

    async fn respond(
        &self,
        ctx: &mut RequestContext,
        request: &GenerationRequest,
    ) -> Result<bool, BotError> {
        self.seen
            .lock()
            .unwrap()
            .push((ctx.status().id.clone(), request.target_count));
        if self.fail {
            return Err(BotError::Pipeline("boom".into()));
        }
        Ok(true)
    }
}

fn gateway_with(
    client: Arc<MockClient>,
    handler: RecordingHandler,
    messages: MessagesConfig,
) -> Gateway<RecordingHandler> {
    let cfg = Config::default();
    let compiler = ParamCompiler::new(cfg.image_gen, cfg.prompt, cfg.prompt_args, cfg.proc_kwargs);
    Gateway::new(
        client,
        bot_account(),
        HandlerRegistry::new(vec![handler]),
        compiler,
        messages,
    )
}

#[tokio::test]
async fn test_untagged_status_is_dropped_silently() {
    let client = Arc::new(MockClient::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = RecordingHandler {
        seen: seen.clone(),
        ..Default::default()
    };
    let gw = gateway_with(client.clone(), handler, MessagesConfig::default());

    gw.handle_event(status("100", alice(), &["cats"], true, "hello")).await;
    assert!(seen.lock().unwrap().is_empty());
    assert!(client.posted().is_empty());
}

#[tokio::test]
async fn test_compiled_request_reaches_handler() {
    let client = Arc::new(MockClient::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = RecordingHandler {
        seen: seen.clone(),
        ..Default::default()
    };
    let gw = gateway_with(client, handler, MessagesConfig::default());

    gw.handle_event(status(
        "100",
        alice(),
        &["diffuse_me"],
        true,
        "@bot a cat args.image_count 3 #diffuse_me",
    ))
    .await;
    assert_eq!(*seen.lock().unwrap(), vec![("100".to_string(), 3)]);
}

#[tokio::test]
async fn test_invalid_request_gets_a_reply() {
    let client = Arc::new(MockClient::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = RecordingHandler {
        seen: seen.clone(),
        ..Default::default()
    };
    let gw = gateway_with(client.clone(), handler, MessagesConfig::default());

    gw.handle_event(status(
        "100",
        alice(),
        &["diffuse_me"],
        true,
        "a cat args.num_inference_steps many",
    ))
    .await;

    assert!(seen.lock().unwrap().is_empty());
    let posted = client.posted();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].status.starts_with("@alice@other.social Could not read that request:"));
    assert!(posted[0].status.contains("args.num_inference_steps"));
    assert_eq!(posted[0].in_reply_to_id.as_deref(), Some("100"));
}

#[tokio::test]
async fn test_handler_failure_does_not_stop_the_loop() {
    let (client, tx) = MockClient::with_inbound();
    let client = Arc::new(client);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = RecordingHandler {
        seen: seen.clone(),
        fail: true,
    };
    let gw = gateway_with(client, handler, MessagesConfig::default());

    tx.send(status("1", alice(), &["diffuse_me"], true, "a")).await.unwrap();
    tx.send(status("2", alice(), &["diffuse_me"], true, "b")).await.unwrap();
    drop(tx);

    gw.run().await.unwrap();
    let ids: Vec<String> = seen.lock().unwrap().iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[tokio::test]
async fn test_run_announces_start_and_end_in_order() {
    let (client, tx) = MockClient::with_inbound();
    let client = Arc::new(client);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = RecordingHandler {
        seen: seen.clone(),
        ..Default::default()
    };
    let messages = MessagesConfig {
        listen_start: Some("listening".into()),
        listen_start_cw: Some("bot status".into()),
        listen_end: Some("bye".into()),
        ..Default::default()
    };
    let gw = gateway_with(client.clone(), handler, messages);

    tx.send(status("10", alice(), &["diffuse_me"], true, "first")).await.unwrap();
    tx.send(status("11", bot_account(), &["diffuse_me"], false, "second")).await.unwrap();
    drop(tx);

    gw.run().await.unwrap();

    let posted = client.posted();
    assert_eq!(posted.first().map(|p| p.status.as_str()), Some("listening"));
    assert_eq!(posted[0].spoiler_text.as_deref(), Some("bot status"));
    assert_eq!(posted.last().map(|p| p.status.as_str()), Some("bye"));
    assert!(posted.last().unwrap().spoiler_text.is_none());

    let ids: Vec<String> = seen.lock().unwrap().iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids, vec!["10", "11"]);
}

#[tokio::test]
async fn test_run_without_announcements_posts_nothing() {
    let (client, tx) = MockClient::with_inbound();
    let client = Arc::new(client);
    let gw = gateway_with(client.clone(), RecordingHandler::default(), MessagesConfig::default());
    drop(tx);

    gw.run().await.unwrap();
    assert!(client.posted().is_empty());
}
