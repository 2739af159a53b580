//! Knowledge-base chat orchestration.
//!
//! Runs one request through retrieval, citation building, prompt assembly
//! and model invocation, then turns the model's fragments into response
//! events.

use crate::rag::citations::{build_citations, LinkMode, ReferenceMap};
use crate::rag::search::{retrieve, SearchParams};
use crate::service::KnowledgeBaseRegistry;
use futures::Stream;
use kbchat_core::{AppConfig, AppError, AppResult};
use kbchat_llm::{ClientFactory, Fragments, InvocationMode, ModelInvoker};
use kbchat_prompt::{assemble_prompt, join_context, resolve_prompt, ConversationTurn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tracing::instrument;

/// Body of a knowledge-base chat request.
///
/// Optional fields fall back to [`ChatSettings`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChatRequest {
    pub query: String,
    pub knowledge_base_name: String,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub score_threshold: Option<f64>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub local_doc_url: bool,
}

impl KnowledgeChatRequest {
    pub fn new(query: impl Into<String>, knowledge_base_name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            knowledge_base_name: knowledge_base_name.into(),
            top_k: None,
            score_threshold: None,
            history: Vec::new(),
            stream: false,
            model_name: None,
            local_doc_url: false,
        }
    }
}

/// One event of a chat response.
///
/// Every event of a request shares `uuid`, `docs`, `reference` and `prompt`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponseEvent {
    pub uuid: Arc<str>,
    pub answer: String,
    pub docs: Arc<Vec<String>>,
    pub reference: Arc<ReferenceMap>,
    pub prompt: Arc<str>,
}

/// Stream of response events; an `Err` item ends the stream.
pub type ChatEventStream = Pin<Box<dyn Stream<Item = AppResult<ChatResponseEvent>> + Send>>;

/// Per-service chat defaults.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub default_model: String,
    pub top_k: i64,
    pub score_threshold: f64,
    pub channel_capacity: usize,
    pub prompts_dir: Option<PathBuf>,
}

impl ChatSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_model: config.chat.default_model.clone(),
            top_k: config.chat.top_k as i64,
            score_threshold: config.chat.score_threshold,
            channel_capacity: config.chat.channel_capacity,
            prompts_dir: config.prompts_dir(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// The chat pipeline with its collaborators.
#[derive(Clone)]
pub struct KnowledgeChat {
    registry: Arc<dyn KnowledgeBaseRegistry>,
    clients: Arc<dyn ClientFactory>,
    settings: ChatSettings,
}

impl KnowledgeChat {
    pub fn new(
        registry: Arc<dyn KnowledgeBaseRegistry>,
        clients: Arc<dyn ClientFactory>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            registry,
            clients,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Run everything up to model invocation and start the model.
    ///
    /// Every failure here happens before any event is produced:
    /// - `InvalidRequest` for out-of-range `top_k` / `score_threshold`
    /// - `NotFound` for an unknown knowledge base, before retrieval or model setup
    /// - `UnsupportedModel` / `Config` from the client factory, before retrieval
    /// - `Retrieval` when the search backend fails
    ///
    /// # Arguments
    /// * `request` - The chat request
    /// * `base_url` - Service base URL used for download links
    #[instrument(skip_all, fields(kb = %request.knowledge_base_name, stream = request.stream))]
    pub async fn prepare(&self, request: KnowledgeChatRequest, base_url: &str) -> AppResult<ChatSession> {
        let params = SearchParams::new(
            request.top_k.unwrap_or(self.settings.top_k),
            request.score_threshold.unwrap_or(self.settings.score_threshold),
        )?;

        let kb_name = request.knowledge_base_name.as_str();
        let service = self
            .registry
            .get_service_by_name(kb_name)
            .ok_or_else(|| AppError::NotFound(format!("未找到知识库 {}", kb_name)))?;

        let model_name = request
            .model_name
            .clone()
            .unwrap_or_else(|| self.settings.default_model.clone());
        let client = self.clients.create_client(&model_name)?;

        let passages = retrieve(service.as_ref(), &request.query, params).await?;

        let link_mode = LinkMode::new(request.local_doc_url, base_url);
        let citations = build_citations(&passages, kb_name, &link_mode);

        let definition = resolve_prompt(self.settings.prompts_dir.as_deref(), kb_name)?;
        let context = join_context(passages.iter().map(|p| p.content.as_str()));
        let prompt = assemble_prompt(&definition, &request.history, &context, &request.query)?;

        let mode = InvocationMode::from_stream_flag(request.stream);
        let invoker = ModelInvoker::new(client, model_name)
            .with_channel_capacity(self.settings.channel_capacity);
        let fragments = invoker.invoke(prompt.to_chat_messages(), mode);

        let uuid = uuid::Uuid::new_v4().to_string();

        tracing::info!(
            "Chat {} started on '{}' with {} passages ({:?})",
            uuid,
            invoker.model(),
            passages.len(),
            mode
        );

        Ok(ChatSession {
            template: ChatResponseEvent {
                uuid: uuid.into(),
                answer: String::new(),
                docs: Arc::new(citations.docs),
                reference: Arc::new(citations.reference),
                prompt: prompt.render().into(),
            },
            mode,
            fragments,
        })
    }
}

/// A started chat, ready to be turned into events.
///
/// Dropping the session (or its event stream) cancels the model call.
pub struct ChatSession {
    template: ChatResponseEvent,
    mode: InvocationMode,
    fragments: Fragments,
}

impl ChatSession {
    pub fn docs(&self) -> &[String] {
        &self.template.docs
    }

    pub fn prompt(&self) -> &str {
        &self.template.prompt
    }

    /// Convert into response events.
    ///
    /// Incremental mode yields one event per non-empty fragment; batch mode
    /// yields exactly one event with the whole answer. A provider failure
    /// ends the stream with an `Err` after any events already produced.
    pub fn into_events(self) -> ChatEventStream {
        let ChatSession {
            template,
            mode,
            mut fragments,
        } = self;

        into_event_stream(async_stream::try_stream! {
            match mode {
                InvocationMode::Incremental => {
                    while let Some(fragment) = fragments.next().await {
                        let fragment = fragment?;
                        if fragment.is_empty() {
                            continue;
                        }
                        yield with_answer(&template, fragment);
                    }
                }
                InvocationMode::Batch => {
                    let mut answer = String::new();
                    while let Some(fragment) = fragments.next().await {
                        answer.push_str(&fragment?);
                    }
                    yield with_answer(&template, answer);
                }
            }

            fragments.finish().await?;
            tracing::debug!("Chat {} completed", template.uuid);
        })
    }
}

fn with_answer(template: &ChatResponseEvent, answer: String) -> ChatResponseEvent {
    ChatResponseEvent {
        answer,
        ..template.clone()
    }
}

fn into_event_stream<S>(stream: S) -> ChatEventStream
where
    S: Stream<Item = AppResult<ChatResponseEvent>> + Send + 'static,
{
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryKnowledgeBase, InMemoryRegistry};
    use futures::StreamExt;
    use kbchat_llm::providers::MockClient;
    use kbchat_llm::LlmClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Factory handing out one scripted client and counting calls.
    struct ScriptedFactory {
        client: Arc<MockClient>,
        calls: AtomicUsize,
        models: Mutex<Vec<String>>,
    }

    impl ScriptedFactory {
        fn new(client: MockClient) -> Self {
            Self {
                client: Arc::new(client),
                calls: AtomicUsize::new(0),
                models: Mutex::new(Vec::new()),
            }
        }
    }

    impl ClientFactory for ScriptedFactory {
        fn create_client(&self, model_name: &str) -> AppResult<Arc<dyn LlmClient>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.models.lock().unwrap().push(model_name.to_string());
            kbchat_llm::ProviderFamily::from_model_name(model_name)?;
            Ok(self.client.clone())
        }
    }

    struct Fixture {
        chat: KnowledgeChat,
        base: Arc<InMemoryKnowledgeBase>,
        factory: Arc<ScriptedFactory>,
    }

    fn fixture(client: MockClient) -> Fixture {
        let mut registry = InMemoryRegistry::new();
        let base = registry.insert(
            InMemoryKnowledgeBase::new("samples")
                .with_passage("A", "/kb/x/a.md", 0.3)
                .with_passage("B", "/kb/x/b.md", 0.7),
        );
        let factory = Arc::new(ScriptedFactory::new(client));
        let settings = ChatSettings {
            prompts_dir: None,
            ..ChatSettings::default()
        };

        Fixture {
            chat: KnowledgeChat::new(Arc::new(registry), factory.clone(), settings),
            base,
            factory,
        }
    }

    async fn collect(session: ChatSession) -> Vec<AppResult<ChatResponseEvent>> {
        session.into_events().collect().await
    }

    #[tokio::test]
    async fn test_unknown_knowledge_base_touches_nothing() {
        let fx = fixture(MockClient::new(["x"]));
        let request = KnowledgeChatRequest::new("q", "missing");

        match fx.chat.prepare(request, "http://h/").await {
            Err(AppError::NotFound(msg)) => assert!(msg.contains("missing")),
            _ => panic!("Expected NotFound"),
        }
        assert_eq!(fx.base.search_count(), 0);
        assert_eq!(fx.factory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_model_before_retrieval() {
        let fx = fixture(MockClient::new(["x"]));
        let mut request = KnowledgeChatRequest::new("q", "samples");
        request.model_name = Some("llama3".to_string());

        assert!(matches!(
            fx.chat.prepare(request, "http://h/").await,
            Err(AppError::UnsupportedModel(_))
        ));
        assert_eq!(fx.base.search_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let fx = fixture(MockClient::new(["x"]));
        let mut request = KnowledgeChatRequest::new("q", "samples");
        request.score_threshold = Some(2000.0);

        assert!(matches!(
            fx.chat.prepare(request, "http://h/").await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_yields_single_event() {
        let fx = fixture(MockClient::new(["Rust ", "is ", "fast."]));
        let request = KnowledgeChatRequest::new("Is Rust fast?", "samples");

        let session = fx.chat.prepare(request, "http://h/").await.unwrap();
        let events = collect(session).await;

        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.answer, "Rust is fast.");
        assert_eq!(event.docs.len(), 2);
        assert_eq!(fx.factory.models.lock().unwrap()[0], "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_incremental_events_share_metadata() {
        let fx = fixture(MockClient::new(["Rust ", "", "is ", "fast."]));
        let mut request = KnowledgeChatRequest::new("Is Rust fast?", "samples");
        request.stream = true;
        request.local_doc_url = true;

        let session = fx.chat.prepare(request, "http://h/").await.unwrap();
        let events: Vec<ChatResponseEvent> = collect(session)
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        let answers: Vec<_> = events.iter().map(|e| e.answer.as_str()).collect();
        assert_eq!(answers, vec!["Rust ", "is ", "fast."]);

        for event in &events {
            assert_eq!(event.uuid, events[0].uuid);
            assert_eq!(event.docs, events[0].docs);
            assert_eq!(event.prompt, events[0].prompt);
            assert_eq!(event.reference.len(), 2);
        }
        assert!(events[0].docs[0].contains("(file:///kb/x/a.md)"));
    }

    #[tokio::test]
    async fn test_citations_and_prompt_for_two_passages() {
        let fx = fixture(MockClient::new(["ok"]));
        let request = KnowledgeChatRequest::new("what?", "samples");

        let session = fx.chat.prepare(request, "http://h:7861/").await.unwrap();
        assert_eq!(
            session.docs()[0],
            "出处 [1] [a.md](http://h:7861/knowledge_base/download_doc?knowledge_base_name=samples&file_name=a.md) \n\nA\n\n 相似度：1099.7\n\n"
        );
        assert!(session.docs()[1].ends_with(" 相似度：1099.3\n\n"));
        assert!(session.prompt().starts_with("Human: "));
        assert!(session.prompt().contains("A\nB"));
        assert!(session.prompt().contains("what?"));

        let events = collect(session).await;
        let json = serde_json::to_value(events[0].as_ref().unwrap()).unwrap();
        assert_eq!(
            json["reference"],
            serde_json::json!({"a.md": [["A", "1099"]], "b.md": [["B", "1099"]]})
        );
    }

    #[tokio::test]
    async fn test_provider_failure_ends_stream_after_events() {
        let fx = fixture(MockClient::new(["partial"]).with_failure("quota exceeded"));
        let mut request = KnowledgeChatRequest::new("q", "samples");
        request.stream = true;

        let session = fx.chat.prepare(request, "http://h/").await.unwrap();
        let events = collect(session).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().answer, "partial");
        assert!(matches!(events[1], Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn test_history_precedes_templates() {
        let fx = fixture(MockClient::new(["虎头虎脑"]));
        let mut request = KnowledgeChatRequest::new("接龙", "samples");
        request.history = vec![
            ConversationTurn::user("生龙活虎"),
            ConversationTurn::assistant("虎头虎脑"),
        ];

        let session = fx.chat.prepare(request, "http://h/").await.unwrap();
        assert!(session
            .prompt()
            .starts_with("Human: 生龙活虎\nAI: 虎头虎脑\nHuman: "));

        let _ = collect(session).await;
        let sent = fx.factory.client.requests();
        assert_eq!(sent[0].messages.len(), 4);
        assert_eq!(sent[0].temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_config_cannot_change_temperature() {
        let config = AppConfig::default()
            .merge_yaml_str("chat:\n  temperature: 1.7\n  topK: 2\n")
            .unwrap();
        assert!(config.validate().is_ok());

        let factory = Arc::new(ScriptedFactory::new(MockClient::new(["ok"])));
        let mut registry = InMemoryRegistry::new();
        registry.insert(InMemoryKnowledgeBase::new("samples").with_passage("A", "/kb/a.md", 0.3));
        let settings = ChatSettings {
            prompts_dir: None,
            ..ChatSettings::from_config(&config)
        };
        let chat = KnowledgeChat::new(
            Arc::new(registry),
            factory.clone(),
            settings,
        );

        let session = chat
            .prepare(KnowledgeChatRequest::new("q", "samples"), "http://h/")
            .await
            .unwrap();
        let _ = collect(session).await;

        let sent = factory.client.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].temperature, Some(kbchat_llm::invoker::DEFAULT_TEMPERATURE));
    }
}
