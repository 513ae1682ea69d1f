//! Tool router: lets a language model pick between scoped searches.
//!
//! The router owns a closed set of [`SearchTool`]s, a [`ChatModel`] and a
//! [`Retriever`]. [`ToolRouter::answer`] runs the tool-calling loop:
//!
//! ```text
//!  question ─▶ model ─┬─ final text ───────────────────────────▶ answer
//!                     └─ tool calls ─▶ scoped retrieval ─▶ tool results ─┐
//!                          ▲                                             │
//!                          └─────────────────────────────────────────────┘
//! ```
//!
//! Store failures inside a tool call are handed back to the model as
//! textual tool output. Model failures, unknown tool names, and running
//! past the iteration cap end the request with an error.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::assemble::{assemble, AssembleMode};
use crate::error::{HarnessError, Result};
use crate::models::{RetrievalFilter, ScoredFragment, SourceType};

pub const DEFAULT_AGENT_K: usize = 6;
pub const DEFAULT_MAX_ITERATIONS: usize = 8;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You answer questions about a GitHub project. \
Use `search_repo` for code questions and `search_docs` for usage or conceptual questions. \
Be concise and helpful.";

/// Tool output when the collection has never been ingested.
pub const MISSING_STORE_MESSAGE: &str = "Error: Vector store not found. Run ingestion first.";

// ═══════════════════════════════════════════════════════════════════════
// Tools
// ═══════════════════════════════════════════════════════════════════════

/// The closed set of retrieval tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchTool {
    Repo,
    Docs,
}

impl SearchTool {
    pub const ALL: [SearchTool; 2] = [SearchTool::Repo, SearchTool::Docs];

    pub fn name(&self) -> &'static str {
        match self {
            SearchTool::Repo => "search_repo",
            SearchTool::Docs => "search_docs",
        }
    }

    /// Description shown to the language model.
    pub fn description(&self) -> &'static str {
        match self {
            SearchTool::Repo => "Searches code chunks only.",
            SearchTool::Docs => "Searches documentation chunks only.",
        }
    }

    /// Description advertised to MCP clients.
    pub fn mcp_description(&self) -> &'static str {
        match self {
            SearchTool::Repo => "Search through repository code and files",
            SearchTool::Docs => "Search through documentation content",
        }
    }

    /// Human noun used in error text ("Error searching repository: ...").
    pub fn scope(&self) -> &'static str {
        match self {
            SearchTool::Repo => "repository",
            SearchTool::Docs => "documentation",
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            SearchTool::Repo => SourceType::Repo,
            SearchTool::Docs => SourceType::Docs,
        }
    }

    pub fn filter(&self) -> RetrievalFilter {
        RetrievalFilter::source_type(self.source_type())
    }

    pub fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": format!("Search query for {} content", self.scope()),
                }
            },
            "required": ["query"],
        })
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

impl fmt::Display for SearchTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SearchTool {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        SearchTool::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| HarnessError::configuration(format!("unknown tool: {}", s)))
    }
}

/// Tool descriptor sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

// ═══════════════════════════════════════════════════════════════════════
// Conversation
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        call_id: String,
        content: String,
        is_error: bool,
    },
}

/// One model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    Answer(String),
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(
        &self,
        conversation: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> anyhow::Result<ModelTurn>;
}

/// Read access to a collection. `Ok(None)` means the collection does not
/// exist yet, which is not an error.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&RetrievalFilter>,
    ) -> Result<Option<Vec<ScoredFragment>>>;
}

// ═══════════════════════════════════════════════════════════════════════
// Scoped search
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    #[default]
    Never,
    /// Retry an empty docs-scoped search once without a filter.
    UnfilteredOnEmpty,
}

/// Run `tool`'s filtered search, applying `fallback` to empty docs results.
pub async fn search_scoped(
    retriever: &dyn Retriever,
    tool: SearchTool,
    query: &str,
    k: usize,
    fallback: FallbackPolicy,
) -> Result<Option<Vec<ScoredFragment>>> {
    let filter = tool.filter();
    let results = match retriever.retrieve(query, k, Some(&filter)).await? {
        Some(results) => results,
        None => return Ok(None),
    };

    if results.is_empty()
        && tool == SearchTool::Docs
        && fallback == FallbackPolicy::UnfilteredOnEmpty
    {
        debug!(tool = %tool, "no docs hits, retrying unfiltered");
        return retriever.retrieve(query, k, None).await;
    }
    Ok(Some(results))
}

// ═══════════════════════════════════════════════════════════════════════
// Router
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub k: usize,
    pub max_iterations: usize,
    pub system_prompt: String,
    /// Return the first tool result verbatim instead of asking the model
    /// for a final answer.
    pub return_direct: bool,
    pub docs_fallback: FallbackPolicy,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            k: DEFAULT_AGENT_K,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            return_direct: false,
            docs_fallback: FallbackPolicy::Never,
        }
    }
}

pub struct ToolRouter {
    model: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
    tools: Vec<SearchTool>,
    options: RouterOptions,
}

impl ToolRouter {
    /// Router with both search tools registered.
    pub fn new(
        model: Arc<dyn ChatModel>,
        retriever: Arc<dyn Retriever>,
        options: RouterOptions,
    ) -> Self {
        Self::with_tools(model, retriever, SearchTool::ALL.to_vec(), options)
    }

    pub fn with_tools(
        model: Arc<dyn ChatModel>,
        retriever: Arc<dyn Retriever>,
        tools: Vec<SearchTool>,
        options: RouterOptions,
    ) -> Self {
        Self {
            model,
            retriever,
            tools,
            options,
        }
    }

    pub fn tools(&self) -> &[SearchTool] {
        &self.tools
    }

    /// Answer `question` by letting the model call the registered tools.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Configuration`]: no tools registered (checked before
    ///   any model or store access), or the model named an unknown tool.
    /// - [`HarnessError::InvalidRequest`]: blank question.
    /// - [`HarnessError::Upstream`]: the model call failed.
    /// - [`HarnessError::Timeout`]: no final answer within `max_iterations`.
    pub async fn answer(&self, question: &str) -> Result<String> {
        if self.tools.is_empty() {
            return Err(HarnessError::configuration(
                "tool router has no registered tools",
            ));
        }
        if question.trim().is_empty() {
            return Err(HarnessError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }

        let specs: Vec<ToolSpec> = self.tools.iter().map(SearchTool::spec).collect();
        let mut conversation = vec![
            ChatMessage::System(self.options.system_prompt.clone()),
            ChatMessage::User(question.to_string()),
        ];

        for iteration in 0..self.options.max_iterations {
            let turn = self
                .model
                .complete(&conversation, &specs)
                .await
                .map_err(HarnessError::upstream)?;

            let (text, calls) = match turn {
                ModelTurn::Answer(answer) => return final_answer(Some(answer)),
                ModelTurn::ToolCalls { text, calls } if calls.is_empty() => {
                    return final_answer(text)
                }
                ModelTurn::ToolCalls { text, calls } => (text, calls),
            };

            let resolved = calls
                .iter()
                .map(|call| self.resolve(&call.name))
                .collect::<Result<Vec<_>>>()?;

            conversation.push(ChatMessage::Assistant {
                text,
                tool_calls: calls.clone(),
            });

            for (tool, call) in resolved.into_iter().zip(calls) {
                debug!(iteration, tool = %tool, call_id = %call.id, "tool call");
                let (content, is_error) = self.execute(tool, &call.input).await;
                if self.options.return_direct {
                    return Ok(content);
                }
                conversation.push(ChatMessage::ToolResult {
                    call_id: call.id,
                    content,
                    is_error,
                });
            }
        }

        Err(HarnessError::Timeout(format!(
            "no final answer after {} iterations",
            self.options.max_iterations
        )))
    }

    /// Run one registered tool directly, returning the concatenated result.
    pub async fn invoke(&self, tool_name: &str, query: &str) -> Result<String> {
        let tool = self.resolve(tool_name)?;
        if query.trim().is_empty() {
            return Err(HarnessError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        match self.search(tool, query).await? {
            Some(results) => Ok(assemble(&results, AssembleMode::Concatenated)),
            None => Err(HarnessError::StoreUnavailable(
                "vector store not found; run ingestion first".to_string(),
            )),
        }
    }

    fn resolve(&self, name: &str) -> Result<SearchTool> {
        let tool: SearchTool = name.parse()?;
        if !self.tools.contains(&tool) {
            return Err(HarnessError::configuration(format!(
                "tool not registered: {}",
                name
            )));
        }
        Ok(tool)
    }

    async fn search(&self, tool: SearchTool, query: &str) -> Result<Option<Vec<ScoredFragment>>> {
        search_scoped(
            self.retriever.as_ref(),
            tool,
            query,
            self.options.k,
            self.options.docs_fallback,
        )
        .await
    }

    /// Tool output text and whether it reports an error.
    async fn execute(&self, tool: SearchTool, input: &Value) -> (String, bool) {
        let query = match input.get("query").and_then(Value::as_str) {
            Some(q) => q,
            None => {
                return (
                    format!("Error: {} requires a string 'query' argument", tool),
                    true,
                )
            }
        };

        match self.search(tool, query).await {
            Ok(Some(results)) => (assemble(&results, AssembleMode::Concatenated), false),
            Ok(None) => (MISSING_STORE_MESSAGE.to_string(), true),
            Err(e) => {
                warn!(tool = %tool, error = %e, "tool search failed");
                (format!("Error searching {}: {}", tool.scope(), e), true)
            }
        }
    }
}

/// A final turn must carry text.
fn final_answer(text: Option<String>) -> Result<String> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(HarnessError::Upstream(
            "model returned an empty response".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::NO_RESULTS;
    use crate::models::{keys, Fragment, Metadata};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn scored(text: &str, source_type: SourceType) -> ScoredFragment {
        let mut metadata = Metadata::new();
        metadata.insert(keys::SOURCE_TYPE.into(), source_type.as_str().into());
        ScoredFragment {
            fragment: Fragment {
                id: text.into(),
                text: text.into(),
                metadata,
                hash: String::new(),
            },
            score: 1.0,
        }
    }

    /// Serves fixed hits per filter and records every call.
    #[derive(Default)]
    struct FakeRetriever {
        repo: Vec<ScoredFragment>,
        docs: Vec<ScoredFragment>,
        missing: bool,
        fail: bool,
        calls: Mutex<Vec<Option<SourceType>>>,
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            k: usize,
            filter: Option<&RetrievalFilter>,
        ) -> Result<Option<Vec<ScoredFragment>>> {
            self.calls.lock().unwrap().push(filter.map(|f| f.source_type));
            if self.fail {
                return Err(HarnessError::store("disk I/O error"));
            }
            if self.missing {
                return Ok(None);
            }
            let mut hits = match filter.map(|f| f.source_type) {
                Some(SourceType::Repo) => self.repo.clone(),
                Some(SourceType::Docs) => self.docs.clone(),
                None => self.repo.iter().chain(&self.docs).cloned().collect(),
            };
            hits.truncate(k);
            Ok(Some(hits))
        }
    }

    impl FakeRetriever {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    /// Replays scripted turns and records what it was shown.
    struct ScriptedModel {
        turns: Mutex<Vec<anyhow::Result<ModelTurn>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(turns: Vec<anyhow::Result<ModelTurn>>) -> Self {
            Self {
                turns: Mutex::new(turns.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            conversation: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> anyhow::Result<ModelTurn> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(conversation.to_vec());
            self.turns
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(ModelTurn::Answer("done".into())))
        }
    }

    fn call(name: &str, query: &str) -> ModelTurn {
        ModelTurn::ToolCalls {
            text: None,
            calls: vec![ToolCall {
                id: "call_1".into(),
                name: name.into(),
                input: json!({ "query": query }),
            }],
        }
    }

    fn last_tool_result(model: &ScriptedModel) -> (String, bool) {
        let seen = model.seen.lock().unwrap();
        seen.last()
            .and_then(|conv| {
                conv.iter().rev().find_map(|m| match m {
                    ChatMessage::ToolResult {
                        content, is_error, ..
                    } => Some((content.clone(), *is_error)),
                    _ => None,
                })
            })
            .expect("a tool result was sent back to the model")
    }

    #[tokio::test]
    async fn no_tools_is_configuration_error_before_any_access() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let retriever = Arc::new(FakeRetriever::default());
        let router = ToolRouter::with_tools(model.clone(), retriever.clone(), vec![], RouterOptions::default());

        let err = router.answer("what does main do?").await.unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(retriever.call_count(), 0);
    }

    #[tokio::test]
    async fn repo_tool_result_fed_back_to_model() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(call("search_repo", "main")),
            Ok(ModelTurn::Answer("main parses args".into())),
        ]));
        let retriever = Arc::new(FakeRetriever {
            repo: vec![scored("fn main() {}", SourceType::Repo), scored("fn run() {}", SourceType::Repo)],
            ..Default::default()
        });
        let router = ToolRouter::new(model.clone(), retriever.clone(), RouterOptions::default());

        let answer = router.answer("what does main do?").await.unwrap();
        assert_eq!(answer, "main parses args");
        assert_eq!(*retriever.calls.lock().unwrap(), vec![Some(SourceType::Repo)]);
        let (content, is_error) = last_tool_result(&model);
        assert_eq!(content, "fn main() {}\n---\nfn run() {}");
        assert!(!is_error);
    }

    #[tokio::test]
    async fn return_direct_skips_final_model_turn() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(call("search_docs", "install"))]));
        let retriever = Arc::new(FakeRetriever {
            docs: vec![scored("cargo install rh", SourceType::Docs)],
            ..Default::default()
        });
        let options = RouterOptions {
            return_direct: true,
            ..RouterOptions::default()
        };
        let router = ToolRouter::new(model.clone(), retriever, options);

        assert_eq!(router.answer("how to install?").await.unwrap(), "cargo install rh");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_tool_name_fails_immediately() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(call("search_wiki", "x"))]));
        let retriever = Arc::new(FakeRetriever::default());
        let router = ToolRouter::new(model.clone(), retriever.clone(), RouterOptions::default());

        let err = router.answer("q").await.unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(retriever.call_count(), 0);
    }

    #[tokio::test]
    async fn unregistered_tool_is_rejected() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(call("search_docs", "x"))]));
        let retriever = Arc::new(FakeRetriever::default());
        let router = ToolRouter::with_tools(
            model,
            retriever.clone(),
            vec![SearchTool::Repo],
            RouterOptions::default(),
        );
        assert!(matches!(
            router.answer("q").await,
            Err(HarnessError::Configuration(_))
        ));
        assert_eq!(retriever.call_count(), 0);
    }

    #[tokio::test]
    async fn store_failure_becomes_tool_output() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(call("search_repo", "x")),
            Ok(ModelTurn::Answer("sorry".into())),
        ]));
        let retriever = Arc::new(FakeRetriever {
            fail: true,
            ..Default::default()
        });
        let router = ToolRouter::new(model.clone(), retriever, RouterOptions::default());

        assert_eq!(router.answer("q").await.unwrap(), "sorry");
        let (content, is_error) = last_tool_result(&model);
        assert!(content.starts_with("Error searching repository:"));
        assert!(is_error);
    }

    #[tokio::test]
    async fn missing_store_becomes_tool_output() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(call("search_repo", "x")),
            Ok(ModelTurn::Answer("ingest first".into())),
        ]));
        let retriever = Arc::new(FakeRetriever {
            missing: true,
            ..Default::default()
        });
        let router = ToolRouter::new(model.clone(), retriever, RouterOptions::default());

        router.answer("q").await.unwrap();
        assert_eq!(last_tool_result(&model).0, MISSING_STORE_MESSAGE);
    }

    #[tokio::test]
    async fn missing_query_argument_is_error_result() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelTurn::ToolCalls {
                text: Some("looking".into()),
                calls: vec![ToolCall {
                    id: "c".into(),
                    name: "search_repo".into(),
                    input: json!({}),
                }],
            }),
            Ok(ModelTurn::Answer("ok".into())),
        ]));
        let retriever = Arc::new(FakeRetriever::default());
        let router = ToolRouter::new(model.clone(), retriever.clone(), RouterOptions::default());

        router.answer("q").await.unwrap();
        assert!(last_tool_result(&model).1);
        assert_eq!(retriever.call_count(), 0);
    }

    #[tokio::test]
    async fn model_failure_is_upstream() {
        let model = Arc::new(ScriptedModel::new(vec![Err(anyhow::anyhow!("HTTP 529 overloaded"))]));
        let router = ToolRouter::new(model, Arc::new(FakeRetriever::default()), RouterOptions::default());
        assert!(matches!(
            router.answer("q").await,
            Err(HarnessError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn empty_final_turn_is_upstream() {
        let retriever = Arc::new(FakeRetriever::default());
        let no_calls = Arc::new(ScriptedModel::new(vec![Ok(ModelTurn::ToolCalls {
            text: None,
            calls: vec![],
        })]));
        let router = ToolRouter::new(no_calls, retriever.clone(), RouterOptions::default());
        let err = router.answer("what does main do?").await.unwrap_err();
        assert!(matches!(err, HarnessError::Upstream(_)), "{:?}", err);

        let blank = Arc::new(ScriptedModel::new(vec![Ok(ModelTurn::Answer("  ".into()))]));
        let router = ToolRouter::new(blank, retriever.clone(), RouterOptions::default());
        assert!(matches!(
            router.answer("what does main do?").await,
            Err(HarnessError::Upstream(_))
        ));

        let text_only = Arc::new(ScriptedModel::new(vec![Ok(ModelTurn::ToolCalls {
            text: Some("main parses args".into()),
            calls: vec![],
        })]));
        let router = ToolRouter::new(text_only, retriever, RouterOptions::default());
        assert_eq!(router.answer("what does main do?").await.unwrap(), "main parses args");
    }

    #[tokio::test]
    async fn iteration_cap_is_timeout() {
        let turns = (0..5).map(|_| Ok(call("search_repo", "again"))).collect();
        let model = Arc::new(ScriptedModel::new(turns));
        let options = RouterOptions {
            max_iterations: 3,
            ..RouterOptions::default()
        };
        let router = ToolRouter::new(model.clone(), Arc::new(FakeRetriever::default()), options);

        assert!(matches!(
            router.answer("q").await,
            Err(HarnessError::Timeout(_))
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn docs_fallback_runs_unfiltered_once() {
        let retriever = FakeRetriever {
            repo: vec![scored("fn main() {}", SourceType::Repo)],
            ..Default::default()
        };
        let hits = search_scoped(&retriever, SearchTool::Docs, "q", 5, FallbackPolicy::UnfilteredOnEmpty)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            *retriever.calls.lock().unwrap(),
            vec![Some(SourceType::Docs), None]
        );
    }

    #[tokio::test]
    async fn docs_fallback_never_overrides_hits() {
        let retriever = FakeRetriever {
            repo: vec![scored("fn main() {}", SourceType::Repo)],
            docs: vec![scored("guide", SourceType::Docs)],
            ..Default::default()
        };
        let hits = search_scoped(&retriever, SearchTool::Docs, "q", 5, FallbackPolicy::UnfilteredOnEmpty)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fragment.text, "guide");
        assert_eq!(retriever.call_count(), 1);
    }

    #[tokio::test]
    async fn repo_search_has_no_fallback() {
        let retriever = FakeRetriever {
            docs: vec![scored("guide", SourceType::Docs)],
            ..Default::default()
        };
        let hits = search_scoped(&retriever, SearchTool::Repo, "q", 5, FallbackPolicy::UnfilteredOnEmpty)
            .await
            .unwrap()
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(retriever.call_count(), 1);
    }

    #[tokio::test]
    async fn invoke_returns_concatenated_or_no_results() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let retriever = Arc::new(FakeRetriever::default());
        let router = ToolRouter::new(model.clone(), retriever, RouterOptions::default());

        assert_eq!(router.invoke("search_repo", "anything").await.unwrap(), NO_RESULTS);
        assert!(matches!(
            router.invoke("search_web", "anything").await,
            Err(HarnessError::Configuration(_))
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tool_names_round_trip_through_parse() {
        for tool in SearchTool::ALL {
            assert_eq!(tool.name().parse::<SearchTool>().unwrap(), tool);
        }
        let schema = SearchTool::Repo.input_schema();
        assert_eq!(schema["required"], json!(["query"]));
    }
}
