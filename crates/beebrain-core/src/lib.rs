// ABOUTME: Library root for beebrain-core.
// ABOUTME: Exports the event pipeline: dedup, context, composition, routing, reactions.

pub mod capture;
pub mod composer;
pub mod context;
pub mod dedup;
pub mod error;
pub mod event;
pub mod llm;
pub mod message;
pub mod platform;
pub mod reaction;
pub mod router;
pub mod vector;

pub use composer::{LlmRequest, Prompt, ResponseComposer, ResponseMode, APOLOGY};
pub use context::ContextBuilder;
pub use dedup::DedupStore;
pub use error::{BrainError, Result};
pub use event::{decode, Delivery, InboundEvent, MessageEvent, ReactionEvent};
pub use llm::{ChatMessage, ChatRole, LlmBackend};
pub use message::{infer_role, Author, ConversationMessage, ConversationWindow, HistoryMessage, Role};
pub use platform::ChatPlatform;
pub use reaction::{ReactionHandler, ReactionOutcome};
pub use router::{EventRouter, RouteOutcome, RouterConfig, SkipReason};
pub use vector::{StoredMessage, VectorStore};
