// ABOUTME: Integration tests for the beebrain-core event pipeline.
// ABOUTME: Drives the router against in-memory fakes of the platform, LLM, and vector store.

use async_trait::async_trait;
use beebrain_core::composer::{REPLY_INSTRUCTION, SUMMARY_HEADING, SUMMARY_INSTRUCTION};
use beebrain_core::{
    BrainError, ChatMessage, ChatPlatform, ChatRole, ContextBuilder, DedupStore, EventRouter,
    HistoryMessage, InboundEvent, LlmBackend, MessageEvent, ReactionEvent, ReactionOutcome,
    ResponseMode, Result, Role, RouteOutcome, RouterConfig, SkipReason, StoredMessage,
    VectorStore, APOLOGY,
};
use std::sync::{Arc, Mutex};

const BOT: &str = "UBOT";

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Post {
    channel_id: String,
    text: String,
    thread_ts: Option<String>,
}

#[derive(Default)]
struct FakePlatform {
    history: Vec<HistoryMessage>,
    replies: Vec<HistoryMessage>,
    fetched: Option<HistoryMessage>,
    fail_reads: bool,
    fail_fetch: bool,
    fail_posts: bool,
    posts: Mutex<Vec<Post>>,
    reactions: Mutex<Vec<String>>,
    history_calls: Mutex<Vec<(String, String, u16)>>,
    replies_calls: Mutex<Vec<String>>,
    user_name_calls: Mutex<Vec<String>>,
}

impl FakePlatform {
    fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }

    fn reactions(&self) -> Vec<String> {
        self.reactions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    fn bot_user_id(&self) -> &str {
        BOT
    }

    async fn channel_history(
        &self,
        channel_id: &str,
        oldest: &str,
        limit: u16,
    ) -> Result<Vec<HistoryMessage>> {
        self.history_calls
            .lock()
            .unwrap()
            .push((channel_id.to_string(), oldest.to_string(), limit));
        if self.fail_reads {
            return Err(BrainError::Platform("history unavailable".to_string()));
        }
        Ok(self.history.clone())
    }

    async fn thread_replies(&self, _channel_id: &str, thread_ts: &str) -> Result<Vec<HistoryMessage>> {
        self.replies_calls.lock().unwrap().push(thread_ts.to_string());
        if self.fail_reads {
            return Err(BrainError::Platform("replies unavailable".to_string()));
        }
        Ok(self.replies.clone())
    }

    async fn fetch_message(&self, _channel_id: &str, ts: &str) -> Result<Option<HistoryMessage>> {
        if self.fail_fetch {
            return Err(BrainError::Platform("replies unavailable".to_string()));
        }
        Ok(self.fetched.clone().filter(|msg| msg.ts == ts))
    }

    async fn user_name(&self, user_id: &str) -> Result<String> {
        self.user_name_calls.lock().unwrap().push(user_id.to_string());
        if user_id == "UGONE" {
            return Err(BrainError::Platform("user_not_found".to_string()));
        }
        Ok(format!("name-{}", user_id))
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String> {
        if self.fail_posts {
            return Err(BrainError::Platform("post rejected".to_string()));
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push(Post {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.map(str::to_string),
        });
        Ok(format!("9{}.0", posts.len()))
    }

    async fn add_reaction(&self, _channel_id: &str, ts: &str, name: &str) -> Result<()> {
        self.reactions.lock().unwrap().push(format!("+{}@{}", name, ts));
        Ok(())
    }

    async fn remove_reaction(&self, _channel_id: &str, ts: &str, name: &str) -> Result<()> {
        self.reactions.lock().unwrap().push(format!("-{}@{}", name, ts));
        Ok(())
    }
}

enum LlmBehavior {
    Reply(&'static str),
    Incomplete,
    TransportError,
}

struct FakeLlm {
    behavior: LlmBehavior,
    chat_requests: Mutex<Vec<Vec<ChatMessage>>>,
    generate_requests: Mutex<Vec<String>>,
    embeds: Mutex<usize>,
}

impl FakeLlm {
    fn new(behavior: LlmBehavior) -> Self {
        Self {
            behavior,
            chat_requests: Mutex::new(Vec::new()),
            generate_requests: Mutex::new(Vec::new()),
            embeds: Mutex::new(0),
        }
    }

    fn completion_calls(&self) -> usize {
        self.chat_requests.lock().unwrap().len() + self.generate_requests.lock().unwrap().len()
    }

    fn respond(&self) -> Result<String> {
        match self.behavior {
            LlmBehavior::Reply(text) => Ok(text.to_string()),
            LlmBehavior::Incomplete => Err(BrainError::IncompleteCompletion),
            LlmBehavior::TransportError => Err(BrainError::Llm("connection refused".to_string())),
        }
    }
}

#[async_trait]
impl LlmBackend for FakeLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat_requests.lock().unwrap().push(messages.to_vec());
        self.respond()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_requests.lock().unwrap().push(prompt.to_string());
        self.respond()
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        *self.embeds.lock().unwrap() += 1;
        Ok(vec![0.1, 0.2, 0.3])
    }
}

#[derive(Default)]
struct FakeStore {
    stored: Mutex<Vec<StoredMessage>>,
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn store_message(&self, message: StoredMessage) -> Result<()> {
        self.stored.lock().unwrap().push(message);
        Ok(())
    }

    async fn search_similar(&self, _embedding: &[f32], limit: u64) -> Result<Vec<StoredMessage>> {
        let stored = self.stored.lock().unwrap();
        Ok(stored.iter().take(limit as usize).cloned().collect())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn router_with(
    platform: Arc<FakePlatform>,
    llm: Arc<FakeLlm>,
    config: RouterConfig,
) -> EventRouter {
    EventRouter::new(platform, llm, Arc::new(DedupStore::new()), config)
}

fn chat_config() -> RouterConfig {
    RouterConfig {
        mode: ResponseMode::Chat,
        ..RouterConfig::default()
    }
}

fn history(ts: &str, user: &str, text: &str) -> HistoryMessage {
    HistoryMessage {
        ts: ts.to_string(),
        user_id: Some(user.to_string()),
        username: Some(format!("name-{}", user)),
        text: text.to_string(),
        ..Default::default()
    }
}

fn bot_history(ts: &str, text: &str) -> HistoryMessage {
    HistoryMessage {
        bot_id: Some("B1".to_string()),
        ..history(ts, BOT, text)
    }
}

fn mention(event_ts: &str, text: &str) -> MessageEvent {
    MessageEvent {
        event_ts: event_ts.to_string(),
        channel_id: "C1".to_string(),
        user_id: "U1".to_string(),
        text: text.to_string(),
        ts: event_ts.to_string(),
        thread_ts: None,
        bot_id: None,
    }
}

fn reaction(reaction: &str, item_user: &str) -> ReactionEvent {
    ReactionEvent {
        event_ts: "50.0".to_string(),
        user_id: "U2".to_string(),
        reaction: reaction.to_string(),
        item_channel: "C1".to_string(),
        item_ts: "40.0".to_string(),
        item_user: Some(item_user.to_string()),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_duplicate_concurrent_mention_posts_once() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("hello!")));
    let router = Arc::new(router_with(platform.clone(), llm.clone(), chat_config()));

    let event = InboundEvent::AppMention(mention("1.0001", "<@UBOT> hi"));
    let (a, b) = tokio::join!(
        router.route(event.clone(), None),
        router.route(event.clone(), None)
    );

    let outcomes = [a, b];
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, RouteOutcome::Skipped(SkipReason::Duplicate)))
            .count(),
        1
    );
    assert_eq!(platform.posts().len(), 1);
    assert_eq!(llm.completion_calls(), 1);
}

#[tokio::test]
async fn test_mention_and_mentioning_message_share_dedup_key() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("hello!")));
    let router = router_with(platform.clone(), llm, chat_config());

    let ev = mention("2.0", "<@UBOT> hi");
    router.route(InboundEvent::AppMention(ev.clone()), None).await;
    let second = router.route(InboundEvent::PlainMessage(ev), None).await;

    assert_eq!(second, RouteOutcome::Skipped(SkipReason::Duplicate));
    assert_eq!(platform.posts().len(), 1);
}

#[tokio::test]
async fn test_plain_message_without_mention_makes_no_completion_call() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("unused")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    let outcome = router
        .route(InboundEvent::PlainMessage(mention("3.0", "just chatting")), None)
        .await;

    assert_eq!(outcome, RouteOutcome::Skipped(SkipReason::NoMention));
    assert_eq!(llm.completion_calls(), 0);
    assert!(platform.posts().is_empty());
    assert!(platform.reactions().is_empty());
}

#[tokio::test]
async fn test_summary_reaction_on_agent_message_posts_into_new_thread() {
    let platform = Arc::new(FakePlatform {
        fetched: Some(bot_history("40.0", "here is my answer")),
        replies: vec![bot_history("40.0", "here is my answer")],
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("• point one")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    let outcome = router
        .route(InboundEvent::ReactionAdded(reaction("robot_face", BOT)), None)
        .await;

    assert_eq!(
        outcome,
        RouteOutcome::Reaction(ReactionOutcome::Summarized {
            thread_ts: "40.0".to_string(),
            posted: true,
        })
    );
    let posts = platform.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].thread_ts.as_deref(), Some("40.0"));
    assert!(posts[0].text.starts_with(SUMMARY_HEADING));
    assert!(posts[0].text.ends_with("• point one"));

    // Summary instruction replaces the reply instruction; the reacted-to
    // message appears exactly once, last.
    let requests = llm.chat_requests.lock().unwrap();
    let sent = &requests[0];
    assert_eq!(sent[0].content, SUMMARY_INSTRUCTION);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].role, ChatRole::Assistant);
    assert_eq!(sent[1].content, "here is my answer");
}

#[tokio::test]
async fn test_summary_reaction_on_threaded_agent_message_uses_existing_thread() {
    let reacted = HistoryMessage {
        thread_ts: Some("10.0".to_string()),
        ..bot_history("40.0", "threaded answer")
    };
    let platform = Arc::new(FakePlatform {
        fetched: Some(reacted.clone()),
        replies: vec![
            HistoryMessage {
                thread_ts: Some("10.0".to_string()),
                ..history("10.0", "U1", "question")
            },
            reacted,
            HistoryMessage {
                thread_ts: Some("10.0".to_string()),
                ..history("45.0", "U2", "thanks")
            },
        ],
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("summary")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    let outcome = router
        .route(InboundEvent::ReactionAdded(reaction("robot_face", BOT)), None)
        .await;

    assert_eq!(
        outcome,
        RouteOutcome::Reaction(ReactionOutcome::Summarized {
            thread_ts: "10.0".to_string(),
            posted: true,
        })
    );
    assert_eq!(*platform.replies_calls.lock().unwrap(), vec!["10.0".to_string()]);
    assert_eq!(platform.posts()[0].thread_ts.as_deref(), Some("10.0"));

    // Parent first, later replies kept, reacted-to reply moved to the end.
    let requests = llm.chat_requests.lock().unwrap();
    let contents: Vec<&str> = requests[0].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![SUMMARY_INSTRUCTION, "question", "thanks", "threaded answer"]
    );
    assert_eq!(requests[0][3].role, ChatRole::Assistant);
}

#[tokio::test]
async fn test_summary_reaction_falls_back_to_item_ts_when_fetch_fails() {
    let platform = Arc::new(FakePlatform {
        fail_fetch: true,
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("summary")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    let outcome = router
        .route(InboundEvent::ReactionAdded(reaction("robot_face", BOT)), None)
        .await;

    assert_eq!(
        outcome,
        RouteOutcome::Reaction(ReactionOutcome::Summarized {
            thread_ts: "40.0".to_string(),
            posted: true,
        })
    );
    assert_eq!(*platform.replies_calls.lock().unwrap(), vec!["40.0".to_string()]);
    assert_eq!(platform.posts()[0].thread_ts.as_deref(), Some("40.0"));

    let requests = llm.chat_requests.lock().unwrap();
    assert_eq!(requests[0].len(), 1);
    assert_eq!(requests[0][0].content, SUMMARY_INSTRUCTION);
}

#[tokio::test]
async fn test_summary_reaction_on_missing_message_falls_back_to_item_ts() {
    let platform = Arc::new(FakePlatform {
        // A different message; the reacted ts is no longer in history.
        fetched: Some(bot_history("39.0", "older answer")),
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("summary")));
    let router = router_with(platform.clone(), llm, chat_config());

    let outcome = router
        .route(InboundEvent::ReactionAdded(reaction("robot_face", BOT)), None)
        .await;

    assert_eq!(
        outcome,
        RouteOutcome::Reaction(ReactionOutcome::Summarized {
            thread_ts: "40.0".to_string(),
            posted: true,
        })
    );
}

#[tokio::test]
async fn test_generate_mode_summary_appends_instruction_after_transcript() {
    let platform = Arc::new(FakePlatform {
        fetched: Some(bot_history("40.0", "here is my answer")),
        replies: vec![bot_history("40.0", "here is my answer")],
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("short version")));
    let router = router_with(platform.clone(), llm.clone(), RouterConfig::default());

    router
        .route(InboundEvent::ReactionAdded(reaction("robot_face", BOT)), None)
        .await;

    let prompts = llm.generate_requests.lock().unwrap();
    assert_eq!(
        prompts[0],
        format!("UBOT|name-UBOT: here is my answer\n{}", SUMMARY_INSTRUCTION)
    );
    assert!(llm.chat_requests.lock().unwrap().is_empty());
    assert_eq!(
        platform.posts()[0].text,
        format!("{}\n\nshort version", SUMMARY_HEADING)
    );
}

#[tokio::test]
async fn test_summary_reaction_on_other_authors_message_is_ignored() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("unused")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    let outcome = router
        .route(InboundEvent::ReactionAdded(reaction("robot_face", "U9")), None)
        .await;

    assert_eq!(outcome, RouteOutcome::Reaction(ReactionOutcome::Ignored));
    assert!(platform.posts().is_empty());
    assert_eq!(llm.completion_calls(), 0);
}

#[tokio::test]
async fn test_other_reaction_on_agent_message_is_ignored() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("unused")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    let outcome = router
        .route(InboundEvent::ReactionAdded(reaction("thumbsup", BOT)), None)
        .await;

    assert_eq!(outcome, RouteOutcome::Reaction(ReactionOutcome::Ignored));
    assert!(platform.posts().is_empty());
}

#[tokio::test]
async fn test_incomplete_completion_posts_apology() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Incomplete));
    let router = router_with(platform.clone(), llm, chat_config());

    router
        .route(InboundEvent::AppMention(mention("5.0", "<@UBOT> hi")), None)
        .await;

    let posts = platform.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, APOLOGY);
}

#[tokio::test]
async fn test_generate_mode_transport_error_posts_apology() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::TransportError));
    let router = router_with(platform.clone(), llm.clone(), RouterConfig::default());

    router
        .route(InboundEvent::AppMention(mention("5.5", "<@UBOT> hi")), None)
        .await;

    assert_eq!(platform.posts()[0].text, APOLOGY);
    assert_eq!(llm.generate_requests.lock().unwrap().len(), 1);
    assert!(llm.chat_requests.lock().unwrap().is_empty());
}

// ============================================================================
// Router behaviour
// ============================================================================

#[tokio::test]
async fn test_url_challenge_is_echoed() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("unused")));
    let router = router_with(platform, llm, chat_config());

    let outcome = router
        .route(
            InboundEvent::UrlChallenge {
                challenge: "xyz".to_string(),
            },
            Some("1"),
        )
        .await;
    assert_eq!(outcome, RouteOutcome::Challenge("xyz".to_string()));
}

#[tokio::test]
async fn test_retry_delivery_is_acknowledged_without_work() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("unused")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    let outcome = router
        .route(InboundEvent::AppMention(mention("6.0", "<@UBOT> hi")), Some("1"))
        .await;

    assert_eq!(outcome, RouteOutcome::Skipped(SkipReason::Retry));
    assert_eq!(llm.completion_calls(), 0);
    assert!(platform.posts().is_empty());

    // An empty retry header is not a retry.
    let outcome = router
        .route(InboundEvent::AppMention(mention("6.0", "<@UBOT> hi")), Some(""))
        .await;
    assert!(matches!(outcome, RouteOutcome::Replied { .. }));
}

#[tokio::test]
async fn test_processing_reaction_added_and_removed_even_when_post_fails() {
    let platform = Arc::new(FakePlatform {
        fail_posts: true,
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("hello")));
    let router = router_with(platform.clone(), llm, chat_config());

    let outcome = router
        .route(InboundEvent::AppMention(mention("7.0", "<@UBOT> hi")), None)
        .await;

    assert_eq!(
        outcome,
        RouteOutcome::Replied {
            channel_id: "C1".to_string(),
            thread_ts: None,
            posted: false,
        }
    );
    assert_eq!(platform.reactions(), vec!["+eyes@7.0", "-eyes@7.0"]);
}

#[tokio::test]
async fn test_edited_message_is_processed_as_new_input() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("updated answer")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    router
        .route(InboundEvent::AppMention(mention("8.0", "<@UBOT> first")), None)
        .await;

    let edit = MessageEvent {
        event_ts: "8.5".to_string(),
        ts: "8.0".to_string(),
        text: "<@UBOT> second".to_string(),
        ..mention("8.0", "")
    };
    let outcome = router.route(InboundEvent::MessageEdited(edit), None).await;

    assert!(matches!(outcome, RouteOutcome::Replied { posted: true, .. }));
    assert_eq!(platform.posts().len(), 2);
    let requests = llm.chat_requests.lock().unwrap();
    assert_eq!(requests[1].last().unwrap().content, "second");
}

#[tokio::test]
async fn test_bot_authored_message_is_skipped() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("unused")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    let ev = MessageEvent {
        bot_id: Some("B1".to_string()),
        ..mention("9.0", "<@UBOT> loop?")
    };
    let outcome = router.route(InboundEvent::PlainMessage(ev), None).await;

    assert_eq!(outcome, RouteOutcome::Skipped(SkipReason::BotAuthored));
    assert_eq!(llm.completion_calls(), 0);
}

#[tokio::test]
async fn test_unsupported_event_is_acknowledged() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("unused")));
    let router = router_with(platform, llm, chat_config());

    let outcome = router
        .route(
            InboundEvent::Unsupported {
                kind: "pin_added".to_string(),
            },
            None,
        )
        .await;
    assert_eq!(outcome, RouteOutcome::Skipped(SkipReason::Unsupported));
}

#[tokio::test]
async fn test_reply_goes_into_source_thread() {
    let platform = Arc::new(FakePlatform {
        replies: vec![
            history("1.0", "U1", "root question"),
            bot_history("1.5", "first answer"),
            history("2.0", "U1", "<@UBOT> follow up"),
        ],
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("second answer")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    let ev = MessageEvent {
        thread_ts: Some("1.0".to_string()),
        ..mention("2.0", "<@UBOT> follow up")
    };
    router.route(InboundEvent::AppMention(ev), None).await;

    assert_eq!(platform.posts()[0].thread_ts.as_deref(), Some("1.0"));

    let requests = llm.chat_requests.lock().unwrap();
    let sent = &requests[0];
    let roles: Vec<ChatRole> = sent.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
    );
    assert_eq!(sent[0].content, REPLY_INSTRUCTION);
    assert_eq!(sent[1].content, "root question");
    assert_eq!(sent[3].content, "follow up");
}

#[tokio::test]
async fn test_thread_replies_config_starts_thread_under_source() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("ok")));
    let config = RouterConfig {
        thread_replies: true,
        ..chat_config()
    };
    let router = router_with(platform.clone(), llm, config);

    router
        .route(InboundEvent::AppMention(mention("11.0", "<@UBOT> hi")), None)
        .await;
    assert_eq!(platform.posts()[0].thread_ts.as_deref(), Some("11.0"));
}

#[tokio::test]
async fn test_context_read_failure_still_replies() {
    let platform = Arc::new(FakePlatform {
        fail_reads: true,
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("still here")));
    let router = router_with(platform.clone(), llm.clone(), chat_config());

    router
        .route(InboundEvent::AppMention(mention("12.0", "<@UBOT> hi")), None)
        .await;

    assert_eq!(platform.posts()[0].text, "still here");
    let requests = llm.chat_requests.lock().unwrap();
    assert_eq!(requests[0].len(), 2);
}

#[tokio::test]
async fn test_generate_mode_flattens_authored_transcript() {
    let platform = Arc::new(FakePlatform {
        history: vec![bot_history("2.0", "hi alice"), history("1.0", "U1", "hello bot")],
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("sure")));
    let router = router_with(platform, llm.clone(), RouterConfig::default());

    router
        .route(InboundEvent::AppMention(mention("13.0", "<@UBOT> and now?")), None)
        .await;

    let prompts = llm.generate_requests.lock().unwrap();
    let expected = format!(
        "U1|name-U1: hello bot\nUBOT|name-UBOT: hi alice\nU1|name-U1: and now?\n{}",
        REPLY_INSTRUCTION
    );
    assert_eq!(prompts[0], expected);
}

#[tokio::test]
async fn test_generate_mode_resolves_missing_author_names_once() {
    let platform = Arc::new(FakePlatform {
        // Newest first; human posts carry no username in history.
        history: vec![
            HistoryMessage {
                username: None,
                ..history("3.0", "UGONE", "bye")
            },
            HistoryMessage {
                username: None,
                ..history("2.0", "U7", "again")
            },
            HistoryMessage {
                username: None,
                ..history("1.0", "U7", "hey")
            },
        ],
        ..Default::default()
    });
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("sure")));
    let router = router_with(platform.clone(), llm.clone(), RouterConfig::default());

    router
        .route(InboundEvent::AppMention(mention("13.5", "<@UBOT> hi")), None)
        .await;

    let prompts = llm.generate_requests.lock().unwrap();
    let expected = format!(
        "U7|name-U7: hey\nU7|name-U7: again\nUGONE|: bye\nU1|name-U1: hi\n{}",
        REPLY_INSTRUCTION
    );
    assert_eq!(prompts[0], expected);

    let calls = platform.user_name_calls.lock().unwrap();
    assert_eq!(calls.iter().filter(|id| id.as_str() == "U7").count(), 1);
    assert_eq!(calls.iter().filter(|id| id.as_str() == "UGONE").count(), 1);
}

#[tokio::test]
async fn test_plain_messages_are_captured_when_store_configured() {
    let platform = Arc::new(FakePlatform::default());
    let llm = Arc::new(FakeLlm::new(LlmBehavior::Reply("unused")));
    let store = Arc::new(FakeStore::default());
    let router = router_with(platform, llm.clone(), chat_config())
        .with_vector_store(llm.clone(), store.clone());

    let ev = MessageEvent {
        thread_ts: Some("14.0".to_string()),
        ..mention("14.5", "remember this")
    };
    router.route(InboundEvent::PlainMessage(ev.clone()), None).await;
    router.route(InboundEvent::PlainMessage(ev), None).await;

    let stored = store.stored.lock().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text, "remember this");
    assert_eq!(stored[0].channel_id, "C1");
    assert_eq!(stored[0].thread_id.as_deref(), Some("14.0"));
    assert_eq!(stored[0].embedding, vec![0.1, 0.2, 0.3]);
    assert_eq!(llm.completion_calls(), 0);
}

// ============================================================================
// Context builder
// ============================================================================

#[tokio::test]
async fn test_channel_context_is_chronological_and_skips_threads() {
    let platform = Arc::new(FakePlatform {
        // Newest first, as delivered.
        history: vec![
            history("3.0", "U2", "third"),
            HistoryMessage {
                thread_ts: Some("2.0".to_string()),
                ..history("2.0", "U1", "thread parent")
            },
            bot_history("1.5", "bot said"),
            history("1.0", "U1", "first"),
        ],
        ..Default::default()
    });
    let builder = ContextBuilder::new(platform.clone());

    let window = builder.build("C1", None).await.unwrap();
    let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "bot said", "third"]);
    assert_eq!(window.messages()[1].role, Role::Assistant);

    let calls = platform.history_calls.lock().unwrap();
    assert_eq!(calls[0].0, "C1");
    assert_eq!(calls[0].2, 100);
    assert!(calls[0].1.ends_with(".000000"));
}

#[tokio::test]
async fn test_thread_context_keeps_order_and_anchor() {
    let platform = Arc::new(FakePlatform {
        replies: vec![
            history("1.0", "U1", "anchor"),
            bot_history("1.1", "reply"),
            history("1.2", "U2", "another"),
        ],
        ..Default::default()
    });
    let builder = ContextBuilder::new(platform.clone());

    let window = builder.build("C1", Some("1.0")).await.unwrap();
    let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["anchor", "reply", "another"]);
    assert!(platform.history_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_context_fetch_failure_surfaces_error() {
    let platform = Arc::new(FakePlatform {
        fail_reads: true,
        ..Default::default()
    });
    let builder = ContextBuilder::new(platform);

    assert!(builder.build("C1", Some("1.0")).await.is_err());
    assert!(builder.build_or_empty("C1", None).await.is_empty());
}
