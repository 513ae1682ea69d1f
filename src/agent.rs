//! Tool router wiring from configuration.

use std::sync::Arc;
use std::time::Duration;

use repo_harness_core::agent::{ChatModel, FallbackPolicy, RouterOptions, ToolRouter};
use repo_harness_core::HarnessError;

use crate::collections::{CollectionRegistry, RegistryRetriever};
use crate::config::AgentConfig;

pub fn router_options(config: &AgentConfig) -> RouterOptions {
    RouterOptions {
        k: config.k,
        max_iterations: config.max_iterations,
        system_prompt: config.system_prompt.clone(),
        return_direct: config.return_direct,
        docs_fallback: if config.docs_fallback {
            FallbackPolicy::UnfilteredOnEmpty
        } else {
            FallbackPolicy::Never
        },
    }
}

/// Router over `collection` with both search tools registered. The
/// collection may not exist yet; tools then report a missing store.
pub fn build_tool_router(
    config: &AgentConfig,
    registry: Arc<CollectionRegistry>,
    collection: &str,
    model: Arc<dyn ChatModel>,
) -> ToolRouter {
    let retriever = Arc::new(RegistryRetriever::new(registry, collection));
    ToolRouter::new(model, retriever, router_options(config))
}

/// [`ToolRouter::answer`] under a deadline; expiry is [`HarnessError::Timeout`].
pub async fn answer_within(
    router: &ToolRouter,
    question: &str,
    deadline: Duration,
) -> repo_harness_core::Result<String> {
    tokio::time::timeout(deadline, router.answer(question))
        .await
        .map_err(|_| HarnessError::Timeout(format!("no answer within {}s", deadline.as_secs())))?
}
