use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use shelfdesk_core::domain::conversation::{MessageRole, SessionId};
use shelfdesk_db::repositories::ConversationRepository;

use crate::conversation;
use crate::llm::{LlmClient, ToolDefinition, WireMessage};
use crate::tools::ToolRegistry;

const EXHAUSTED_FALLBACK: &str =
    "I couldn't finish that request within the allowed number of tool calls. \
     Please try a simpler request.";

/// One tool invocation made during a chat turn, reported back to the caller.
#[derive(Clone, Debug, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub args: Value,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatOutcome {
    pub response: String,
    pub tool_calls: Vec<ToolInvocation>,
}

/// The turn loop: built once at startup and handed to request handlers.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    log: Arc<dyn ConversationRepository>,
    system_prompt: String,
    max_tool_rounds: u32,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: ToolRegistry,
        log: Arc<dyn ConversationRepository>,
        system_prompt: String,
        max_tool_rounds: u32,
    ) -> Self {
        Self { llm, registry, log, system_prompt, max_tool_rounds }
    }

    /// Run one chat turn: persist the user message, replay the session
    /// history to the model, execute any tool calls it makes (sequentially,
    /// each persisted to the log), and persist the final answer.
    pub async fn handle_turn(&self, session: &SessionId, user_message: &str) -> Result<ChatOutcome> {
        self.log
            .append_message(session, MessageRole::User, user_message)
            .await
            .context("failed to persist user message")?;

        let transcript =
            self.log.history(session).await.context("failed to load session history")?;
        let mut messages = conversation::build_wire_history(&self.system_prompt, &transcript);
        let definitions: Vec<ToolDefinition> = self.registry.definitions();

        let mut invocations = Vec::new();
        let mut response: Option<String> = None;

        for round in 0..self.max_tool_rounds {
            let turn = self.llm.chat(&messages, &definitions).await?;

            if turn.tool_calls.is_empty() {
                response = turn.content;
                break;
            }

            debug!(session = %session, round, tool_calls = turn.tool_calls.len(), "executing tool round");
            messages.push(WireMessage::assistant_tool_calls(turn.tool_calls.clone()));

            for call in &turn.tool_calls {
                let args: Value = match serde_json::from_str(&call.function.arguments) {
                    Ok(args) => args,
                    Err(error) => {
                        warn!(tool = %call.function.name, %error, "unparseable tool arguments");
                        Value::Null
                    }
                };

                let result = self.registry.execute(&call.function.name, args.clone()).await;
                let result_json = result.to_string();

                self.log
                    .append_tool_call(session, &call.function.name, &call.function.arguments, &result_json)
                    .await
                    .context("failed to persist tool call")?;

                invocations.push(ToolInvocation { name: call.function.name.clone(), args });
                messages.push(WireMessage::tool_result(call.id.clone(), result_json));
            }
        }

        let response = response.unwrap_or_else(|| {
            warn!(session = %session, "tool round budget exhausted without a final answer");
            EXHAUSTED_FALLBACK.to_string()
        });

        if !response.is_empty() {
            self.log
                .append_message(session, MessageRole::Assistant, &response)
                .await
                .context("failed to persist assistant response")?;
        }

        info!(session = %session, tool_calls = invocations.len(), "chat turn complete");
        Ok(ChatOutcome { response, tool_calls: invocations })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;

    use shelfdesk_core::domain::conversation::SessionId;
    use shelfdesk_db::repositories::{
        ConversationRepository, SqlCatalogRepository, SqlConversationRepository,
        SqlOrderRepository,
    };
    use shelfdesk_db::{connect_with_settings, migrations};

    use super::AgentRuntime;
    use crate::llm::{CompletionTurn, LlmClient, ToolDefinition, WireFunctionCall, WireMessage, WireToolCall};
    use crate::tools::ToolRegistry;

    /// Replays a fixed script of completion turns.
    struct ScriptedLlm {
        turns: Mutex<Vec<CompletionTurn>>,
    }

    impl ScriptedLlm {
        fn new(mut turns: Vec<CompletionTurn>) -> Self {
            turns.reverse();
            Self { turns: Mutex::new(turns) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(
            &self,
            _messages: &[WireMessage],
            _tools: &[ToolDefinition],
        ) -> Result<CompletionTurn> {
            let mut turns = self.turns.lock().expect("script lock");
            Ok(turns.pop().unwrap_or(CompletionTurn {
                content: Some("done".to_string()),
                tool_calls: Vec::new(),
            }))
        }
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> WireToolCall {
        WireToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: WireFunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    async fn runtime_with_script(turns: Vec<CompletionTurn>) -> (AgentRuntime, sqlx::SqlitePool) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query(
            "INSERT INTO books (isbn, title, author, genre, price, stock)
             VALUES ('B1', 'Dune', 'Frank Herbert', 'Science Fiction', '9.99', 10)",
        )
        .execute(&pool)
        .await
        .expect("seed book");
        sqlx::query("INSERT INTO customers (id, name) VALUES (1, 'Alice')")
            .execute(&pool)
            .await
            .expect("seed customer");

        let catalog = Arc::new(SqlCatalogRepository::new(pool.clone()));
        let orders = Arc::new(SqlOrderRepository::new(pool.clone()));
        let registry = ToolRegistry::standard(catalog, orders);
        let log = Arc::new(SqlConversationRepository::new(pool.clone()));

        let runtime = AgentRuntime::new(
            Arc::new(ScriptedLlm::new(turns)),
            registry,
            log,
            "be helpful".to_string(),
            4,
        );
        (runtime, pool)
    }

    #[tokio::test]
    async fn plain_answer_persists_both_sides_of_the_turn() {
        let (runtime, pool) = runtime_with_script(vec![CompletionTurn {
            content: Some("We have 10 copies of Dune.".to_string()),
            tool_calls: Vec::new(),
        }])
        .await;

        let session = SessionId("s-1".to_string());
        let outcome = runtime.handle_turn(&session, "Do you have Dune?").await.expect("turn");

        assert_eq!(outcome.response, "We have 10 copies of Dune.");
        assert!(outcome.tool_calls.is_empty());

        let log = SqlConversationRepository::new(pool);
        let history = log.history(&session).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "Do you have Dune?");
        assert_eq!(history[1].content, "We have 10 copies of Dune.");
    }

    #[tokio::test]
    async fn tool_round_executes_and_persists_the_call() {
        let (runtime, pool) = runtime_with_script(vec![
            CompletionTurn {
                content: None,
                tool_calls: vec![tool_call("call_1", "find_books", r#"{"q":"Dune"}"#)],
            },
            CompletionTurn {
                content: Some("Found Dune, 10 in stock.".to_string()),
                tool_calls: Vec::new(),
            },
        ])
        .await;

        let session = SessionId("s-1".to_string());
        let outcome = runtime.handle_turn(&session, "Search for Dune").await.expect("turn");

        assert_eq!(outcome.response, "Found Dune, 10 in stock.");
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].name, "find_books");
        assert_eq!(outcome.tool_calls[0].args, json!({"q": "Dune"}));

        let log = SqlConversationRepository::new(pool);
        let calls = log.tool_calls(&session).await.expect("tool calls");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "find_books");
        assert!(calls[0].result_json.contains("Found 1 book(s)."));
    }

    #[tokio::test]
    async fn order_placed_through_the_loop_mutates_stock() {
        let (runtime, pool) = runtime_with_script(vec![
            CompletionTurn {
                content: None,
                tool_calls: vec![tool_call(
                    "call_1",
                    "create_order",
                    r#"{"customer_id":1,"items":[{"isbn":"B1","qty":3}]}"#,
                )],
            },
            CompletionTurn {
                content: Some("Order 1 placed.".to_string()),
                tool_calls: Vec::new(),
            },
        ])
        .await;

        let session = SessionId("s-1".to_string());
        runtime.handle_turn(&session, "Order 3 copies of Dune for Alice").await.expect("turn");

        let stock: i64 = sqlx::query_scalar("SELECT stock FROM books WHERE isbn = 'B1'")
            .fetch_one(&pool)
            .await
            .expect("stock");
        assert_eq!(stock, 7);
    }

    #[tokio::test]
    async fn exhausted_tool_budget_falls_back_gracefully() {
        let endless = CompletionTurn {
            content: None,
            tool_calls: vec![tool_call("call_n", "inventory_summary", "{}")],
        };
        let (runtime, _pool) =
            runtime_with_script(vec![endless.clone(), endless.clone(), endless.clone(), endless])
                .await;

        let session = SessionId("s-1".to_string());
        let outcome = runtime.handle_turn(&session, "loop forever").await.expect("turn");

        assert!(outcome.response.contains("couldn't finish"));
        assert_eq!(outcome.tool_calls.len(), 4);
    }
}
