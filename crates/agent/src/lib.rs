//! Agent runtime - LLM-driven tool orchestration for the desk assistant
//!
//! This crate is the "brain" of shelfdesk: it turns a clerk's chat message
//! into catalog and order operations by letting an LLM pick among a fixed
//! set of tools.
//!
//! # Architecture
//!
//! One chat turn runs a constrained loop:
//! 1. **History replay** (`conversation`) - rebuild the session transcript
//!    from the durable log, system prompt first
//! 2. **Completion** (`llm`) - call a `/v1/chat/completions` endpoint with
//!    the six tool definitions
//! 3. **Tool execution** (`tools`) - run each requested tool against the
//!    repositories, persist the call, feed the result back
//! 4. **Answer** - persist and return the model's final response
//!
//! # Safety principle
//!
//! The LLM only chooses which tool to call. Stock checks, price capture,
//! and transactional rollback are deterministic decisions made by the
//! repositories; a model mistake can surface a polite error, never a
//! half-written order.

pub mod conversation;
pub mod llm;
pub mod runtime;
pub mod tools;

pub use llm::{CompletionTurn, LlmClient, OpenAiCompatClient, ToolDefinition, WireMessage};
pub use runtime::{AgentRuntime, ChatOutcome, ToolInvocation};
pub use tools::{Tool, ToolRegistry};
