use std::sync::Arc;
use std::time::{Duration, Instant};

use ragflow_core::RagError;
use ragflow_embedding::EmbeddingService;
use ragflow_storage::SearchFilters;
use ragflow_tenancy::TenantService;
use uuid::Uuid;

use crate::conversation::{ConversationLock, ConversationStore};
use crate::entity::{Citation, Conversation, QueryMetrics, QueryOptions, QueryResponse, StreamEvent, Turn};
use crate::error::OrchestratorError;
use crate::llm::{LlmProvider, TokenStream};
use crate::prompt::{self, NO_RELEVANT_INFORMATION};
use crate::rerank;
use crate::response_cache::ResponseCache;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_query_len: usize,
    pub context_token_budget: usize,
    pub relevance_floor: f32,
    pub summary_rollover_threshold: usize,
    pub summary_keep_recent: usize,
    pub citation_fallback_count: usize,
    /// Extra models a tenant may opt into beyond its own configured
    /// `embedding_model`/`llm_model`, e.g. for a one-off higher-quality run.
    pub allowed_model_overrides: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_query_len: 2000,
            context_token_budget: 3000,
            relevance_floor: 0.2,
            summary_rollover_threshold: 20,
            summary_keep_recent: 6,
            citation_fallback_count: 3,
            allowed_model_overrides: Vec::new(),
        }
    }
}

pub struct RagOrchestrator {
    tenants: Arc<TenantService>,
    embeddings: Arc<EmbeddingService>,
    llm: Arc<dyn LlmProvider>,
    conversations: ConversationStore,
    conversation_lock: ConversationLock,
    response_cache: ResponseCache,
    config: OrchestratorConfig,
}

impl RagOrchestrator {
    pub fn new(
        tenants: Arc<TenantService>,
        embeddings: Arc<EmbeddingService>,
        llm: Arc<dyn LlmProvider>,
        conversations: ConversationStore,
        conversation_lock: ConversationLock,
        response_cache: ResponseCache,
        config: OrchestratorConfig,
    ) -> Self {
        Self { tenants, embeddings, llm, conversations, conversation_lock, response_cache, config }
    }

    async fn validate(&self, tenant_id: Uuid, query_text: &str, options: &QueryOptions) -> Result<ragflow_tenancy::Tenant, RagError> {
        let tenant = self.tenants.get(tenant_id).await?;
        if !tenant.is_active() {
            return Err(OrchestratorError::TenantInactive.into());
        }
        if query_text.len() > self.config.max_query_len {
            return Err(OrchestratorError::QueryTooLong { len: query_text.len(), max: self.config.max_query_len }.into());
        }
        if let Some(model) = &options.model {
            let allowed = model == &tenant.llm_model || self.config.allowed_model_overrides.iter().any(|m| m == model);
            if !allowed {
                return Err(OrchestratorError::ModelNotAllowed(model.clone()).into());
            }
        }
        Ok(tenant)
    }

    async fn load_conversation(&self, tenant_id: Uuid, user_id: Uuid, conversation_id: Option<Uuid>) -> Conversation {
        match conversation_id {
            Some(id) => match self.conversations.get(tenant_id, id).await {
                Some(conversation) => conversation,
                None => Conversation::new(tenant_id, user_id),
            },
            None => Conversation::new(tenant_id, user_id),
        }
    }

    /// Collapses older turns into a rolling summary once the transcript
    /// passes `summary_rollover_threshold`, producing the summary with a
    /// cheap call to the same LLM provider.
    async fn maybe_roll_over_summary(&self, conversation: &mut Conversation, model: &str) {
        if conversation.turns.len() <= self.config.summary_rollover_threshold {
            return;
        }
        let split_at = conversation.turns.len() - self.config.summary_keep_recent;
        let to_summarize: Vec<Turn> = conversation.turns.drain(..split_at).collect();
        let transcript: String = to_summarize
            .iter()
            .map(|t| format!("{:?}: {}", t.role, t.text))
            .collect::<Vec<_>>()
            .join("\n");

        let prior_summary = conversation.summary.clone().unwrap_or_default();
        let prompt = format!(
            "Summarize this conversation so far in a few sentences, preserving facts the \
             user may refer back to. Existing summary: {prior_summary}\n\nNew turns:\n{transcript}"
        );

        match self.llm.generate(model, &prompt, 256).await {
            Ok(summary) => conversation.summary = Some(summary),
            Err(_) => {
                // Summarization is best-effort; keep the prior summary and drop the
                // older turns anyway rather than let the transcript grow unbounded.
            }
        }
    }

    fn recent_turns<'a>(&self, conversation: &'a Conversation) -> &'a [Turn] {
        let keep = self.config.summary_keep_recent.min(conversation.turns.len());
        &conversation.turns[conversation.turns.len() - keep..]
    }

    /// Runs steps 3-7 of the pipeline, shared between the sync and streaming
    /// entry points. Returns `None` when no chunk clears `relevance_floor`.
    #[allow(clippy::too_many_arguments)]
    async fn prepare(
        &self,
        tenant: &ragflow_tenancy::Tenant,
        conversation: &mut Conversation,
        query_text: &str,
        model: &str,
        top_k: usize,
        metrics: &mut QueryMetrics,
    ) -> Result<Option<(String, Vec<rerank::RankedChunk>)>, RagError> {
        self.maybe_roll_over_summary(conversation, model).await;

        let rewritten = prompt::rewrite_query(query_text, &conversation.turns);

        let embed_start = Instant::now();
        let embedding = self.embeddings.embed_query(tenant.id, &rewritten.rewritten, &tenant.embedding_model).await?;
        metrics.embed_ms = embed_start.elapsed().as_millis() as u64;

        let retrieve_start = Instant::now();
        let scored = self.embeddings.search(tenant.id, &embedding, top_k, &SearchFilters::default()).await?;
        let ranked = rerank::rerank(&rewritten.rewritten, scored);
        metrics.retrieve_ms = retrieve_start.elapsed().as_millis() as u64;

        let Some(assembled) = prompt::assemble_context(&ranked, self.config.relevance_floor, self.config.context_token_budget)
        else {
            return Ok(None);
        };

        let composed = prompt::compose_prompt(
            &assembled.text,
            conversation.summary.as_deref(),
            self.recent_turns(conversation),
            &rewritten.rewritten,
        );
        Ok(Some((composed, assembled.contributing)))
    }

    fn no_relevant_information_response(metrics: QueryMetrics) -> QueryResponse {
        QueryResponse { answer: NO_RELEVANT_INFORMATION.to_string(), citations: Vec::new(), metrics }
    }

    /// The synchronous path of §4.5's ten-step pipeline. Streaming requests
    /// must call [`Self::query_stream`] instead — streams never serve from
    /// or populate the response cache.
    pub async fn query(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        conversation_id: Option<Uuid>,
        query_text: &str,
        options: QueryOptions,
    ) -> Result<QueryResponse, RagError> {
        let total_start = Instant::now();
        let tenant = self.validate(tenant_id, query_text, &options).await?;
        let model = options.model.clone().unwrap_or_else(|| tenant.llm_model.clone());

        if let Some(cached) = self.response_cache.get(tenant_id, query_text, &model, options.top_k).await {
            return Ok(cached);
        }

        let _guard = match conversation_id {
            Some(id) => Some(self.conversation_lock.acquire(id).await),
            None => None,
        };
        let mut conversation = self.load_conversation(tenant_id, user_id, conversation_id).await;

        let mut metrics = QueryMetrics::default();
        let prepared = self.prepare(&tenant, &mut conversation, query_text, &model, options.top_k, &mut metrics).await?;

        let Some((prompt_text, contributing)) = prepared else {
            metrics.total_ms = total_start.elapsed().as_millis() as u64;
            return Ok(Self::no_relevant_information_response(metrics));
        };

        let llm_start = Instant::now();
        let answer = self
            .llm
            .generate(&model, &prompt_text, options.max_tokens)
            .await
            .map_err(|e| OrchestratorError::LlmUnavailable(e.to_string()))?;
        metrics.llm_ms = llm_start.elapsed().as_millis() as u64;
        metrics.tokens_in = (prompt_text.len() / 4) as u32;
        metrics.tokens_out = (answer.len() / 4) as u32;

        let citations = prompt::select_citations(&answer, &contributing, self.config.citation_fallback_count);

        conversation.turns.push(Turn::user(query_text));
        conversation.turns.push(Turn::assistant(answer.clone(), citations.clone()));
        conversation.last_activity = chrono::Utc::now();
        let _ = self.conversations.put(&conversation).await;

        metrics.total_ms = total_start.elapsed().as_millis() as u64;
        let response = QueryResponse { answer, citations, metrics };
        let _ = self.response_cache.put(tenant_id, query_text, &model, options.top_k, &response).await;
        Ok(response)
    }

    /// The streaming path. Emits [`StreamEvent::Token`] as they arrive,
    /// followed by one [`StreamEvent::Done`] with final citations and
    /// metrics, or a single [`StreamEvent::Error`] if generation fails —
    /// never touches the response cache.
    pub async fn query_stream(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        conversation_id: Option<Uuid>,
        query_text: &str,
        mut options: QueryOptions,
    ) -> Result<impl futures_core::Stream<Item = StreamEvent> + Send, RagError> {
        options.stream = true;
        let total_start = Instant::now();
        let tenant = self.validate(tenant_id, query_text, &options).await?;
        let model = options.model.clone().unwrap_or_else(|| tenant.llm_model.clone());

        let _guard = match conversation_id {
            Some(id) => Some(self.conversation_lock.acquire(id).await),
            None => None,
        };
        let mut conversation = self.load_conversation(tenant_id, user_id, conversation_id).await;

        let mut metrics = QueryMetrics::default();
        let prepared = self.prepare(&tenant, &mut conversation, query_text, &model, options.top_k, &mut metrics).await?;

        let Some((prompt_text, contributing)) = prepared else {
            metrics.total_ms = total_start.elapsed().as_millis() as u64;
            return Ok(Box::pin(tokio_stream::once(StreamEvent::Done { citations: Vec::new(), metrics }))
                as std::pin::Pin<Box<dyn futures_core::Stream<Item = StreamEvent> + Send>>);
        };

        let token_stream: TokenStream = self
            .llm
            .generate_stream(&model, &prompt_text, options.max_tokens)
            .await
            .map_err(|e| OrchestratorError::LlmUnavailable(e.to_string()))?;

        conversation.turns.push(Turn::user(query_text));

        let citation_count = self.config.citation_fallback_count;
        let stream = build_stream_events(
            token_stream,
            contributing,
            citation_count,
            metrics,
            total_start,
            conversation,
            self.conversations.clone(),
        );
        Ok(Box::pin(stream) as std::pin::Pin<Box<dyn futures_core::Stream<Item = StreamEvent> + Send>>)
    }
}

/// Wraps the raw token stream, accumulating the full answer so citation
/// selection and conversation persistence can happen once the stream ends.
fn build_stream_events(
    mut token_stream: TokenStream,
    contributing: Vec<rerank::RankedChunk>,
    citation_fallback_count: usize,
    mut metrics: QueryMetrics,
    total_start: Instant,
    mut conversation: Conversation,
    conversations: ConversationStore,
) -> impl futures_core::Stream<Item = StreamEvent> {
    async_stream::stream! {
        use futures_util::StreamExt;
        let llm_start = Instant::now();
        let mut answer = String::new();
        loop {
            match token_stream.next().await {
                Some(Ok(token)) => {
                    answer.push_str(&token);
                    yield StreamEvent::Token(token);
                }
                Some(Err(e)) => {
                    yield StreamEvent::Error { code: "llm_unavailable", message: e.to_string() };
                    return;
                }
                None => break,
            }
        }
        metrics.llm_ms = llm_start.elapsed().as_millis() as u64;
        metrics.tokens_out = (answer.len() / 4) as u32;

        let citations = prompt::select_citations(&answer, &contributing, citation_fallback_count);
        conversation.turns.push(Turn::assistant(answer, citations.clone()));
        conversation.last_activity = chrono::Utc::now();
        let _ = conversations.put(&conversation).await;

        metrics.total_ms = total_start.elapsed().as_millis() as u64;
        yield StreamEvent::Done { citations, metrics };
    }
}
