// Answer chain module
// Conversation-aware retrieval-augmented generation: query expansion,
// retrieval, context formatting with citations, prompt assembly, streamed
// generation, and the trailing source listing


pub mod prompts;

use std::path::Path;

use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::generation::{ChatClient, ChatMessage, ChatRole, TokenStream};
use crate::index::{ScoredChunk, SearchIndex};

/// Number of trailing history turns folded into the retrieval query
const QUERY_EXPANSION_TURNS: usize = 3;
/// Per-turn character cap during query expansion
const QUERY_EXPANSION_TURN_CHARS: usize = 100;
/// Character cap for source record excerpts
const EXCERPT_CHARS: usize = 200;
/// Character cap for excerpts shown in the source trailer
const TRAILER_EXCERPT_CHARS: usize = 100;

/// One prior turn of conversation supplied as generation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Citation record for one retrieved chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Display name of the source document (basename)
    pub document: String,
    /// Full origin path
    pub file_path: String,
    pub page: Option<u32>,
    /// Position of the chunk within its document
    pub chunk: u32,
    /// First part of the chunk content
    pub excerpt: String,
}

/// A configuration-bound retrieval view over the search index
pub struct Retriever {
    index: SearchIndex,
    top_k: usize,
    document_filter: Option<i64>,
}

impl Retriever {
    #[inline]
    pub fn new(index: SearchIndex) -> Self {
        let top_k = index.default_top_k();
        Self {
            index,
            top_k,
            document_filter: None,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Restrict retrieval to chunks of a single document
    #[inline]
    pub fn with_document_filter(mut self, document_id: i64) -> Self {
        self.document_filter = Some(document_id);
        self
    }

    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let filter = self
            .document_filter
            .map(|id| format!("document_id = {}", id));
        self.index
            .search_filtered(query, self.top_k, filter.as_deref())
            .await
    }
}

/// The retrieval-augmented generation pipeline. Stateless per call; every
/// invocation runs retrieval and generation afresh.
pub struct AnswerChain {
    retriever: Retriever,
    chat: ChatClient,
}

impl AnswerChain {
    #[inline]
    pub fn new(retriever: Retriever, chat: ChatClient) -> Self {
        Self { retriever, chat }
    }

    /// Answer a standalone question: retrieve with the raw question, stream
    /// the generated answer, then append the source listing
    #[inline]
    pub async fn stream_answer(&self, question: &str) -> Result<TokenStream> {
        let results = self.retriever.retrieve(question).await?;
        let (context, sources) = format_context_with_sources(&results);

        let prompt = prompts::SIMPLE_PROMPT
            .replace("{context}", &context)
            .replace("{question}", question);

        let tokens = self.chat.stream_chat(vec![ChatMessage::user(prompt)]).await?;
        Ok(with_source_trailer(tokens, &sources))
    }

    /// Answer a follow-up question with conversation history. The history
    /// steers retrieval (expanded query) and is replayed to the model as
    /// role-tagged turns, but the model is asked the original question.
    #[inline]
    pub async fn stream_answer_with_history(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<TokenStream> {
        let expanded = expand_query(question, history);
        debug!("Retrieving with expanded query ({} chars)", expanded.len());

        let results = self.retriever.retrieve(&expanded).await?;
        let (context, sources) = format_context_with_sources(&results);

        let messages = build_messages(question, &context, history);
        let tokens = self.chat.stream_chat(messages).await?;
        Ok(with_source_trailer(tokens, &sources))
    }

    /// Citation records for a question, without generation
    #[inline]
    pub async fn sources(&self, question: &str) -> Result<Vec<SourceRecord>> {
        let results = self.retriever.retrieve(question).await?;
        let (_, sources) = format_context_with_sources(&results);
        Ok(sources)
    }
}

/// Prepend the content of up to the last three history turns (each capped
/// at 100 characters) to the question. A crude recall aid for follow-up
/// questions that omit their subject; steers retrieval only.
fn expand_query(question: &str, history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return question.to_string();
    }

    let start = history.len().saturating_sub(QUERY_EXPANSION_TURNS);
    let recent: Vec<String> = history
        .get(start..)
        .unwrap_or_default()
        .iter()
        .map(|turn| take_chars(&turn.content, QUERY_EXPANSION_TURN_CHARS))
        .collect();

    format!("{} {}", recent.join(" "), question)
}

/// Format retrieved chunks into the numbered, source-labeled context block
/// and the parallel citation list. Empty retrieval yields the explicit
/// no-documents marker and no citations.
fn format_context_with_sources(results: &[ScoredChunk]) -> (String, Vec<SourceRecord>) {
    if results.is_empty() {
        return (prompts::NO_DOCUMENTS_MARKER.to_string(), Vec::new());
    }

    let mut sources = Vec::with_capacity(results.len());
    let mut blocks = Vec::with_capacity(results.len());

    for (i, scored) in results.iter().enumerate() {
        let meta = &scored.chunk.metadata;
        let full_path = meta.source.clone();
        let document = Path::new(&full_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| full_path.clone());

        sources.push(SourceRecord {
            document: document.clone(),
            file_path: full_path,
            page: meta.page,
            chunk: meta.chunk_index,
            excerpt: excerpt(&scored.chunk.content, EXCERPT_CHARS),
        });

        let mut label = format!("[Document {}] {}", i + 1, document);
        if let Some(page) = meta.page {
            label.push_str(&format!(" (page {})", page));
        }

        blocks.push(format!("{}\n{}", label, scored.chunk.content));
    }

    (blocks.join("\n\n---\n\n"), sources)
}

/// Assemble the chat messages: system instructions with few-shot examples,
/// the replayed history, and the final context/question turn
fn build_messages(
    question: &str,
    context: &str,
    history: &[ConversationTurn],
) -> Vec<ChatMessage> {
    let system = prompts::COT_SYSTEM_PROMPT.replace("{few_shot_examples}", prompts::FEW_SHOT_EXAMPLES);

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));

    for turn in history {
        match turn.role {
            ChatRole::User => messages.push(ChatMessage::user(turn.content.clone())),
            ChatRole::Assistant => messages.push(ChatMessage::assistant(turn.content.clone())),
            // History carries only user/assistant turns; anything else is dropped
            ChatRole::System => {}
        }
    }

    messages.push(ChatMessage::user(
        prompts::QUESTION_TEMPLATE
            .replace("{context}", context)
            .replace("{question}", question),
    ));

    messages
}

/// Append the source trailer after the generated tokens. The combined
/// stream ends right after the first error item, so a failed generation is
/// never followed by a source listing.
fn with_source_trailer(tokens: TokenStream, sources: &[SourceRecord]) -> TokenStream {
    let trailer: Vec<Result<String>> = render_source_trailer(sources).into_iter().map(Ok).collect();

    let combined = tokens
        .chain(stream::iter(trailer))
        .scan(false, |failed, item| {
            if *failed {
                return futures::future::ready(None);
            }
            *failed = item.is_err();
            futures::future::ready(Some(item))
        });

    Box::pin(combined)
}

/// Render the fixed-format source listing; empty when there are no sources
fn render_source_trailer(sources: &[SourceRecord]) -> Vec<String> {
    if sources.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(sources.len() + 1);
    out.push(prompts::SOURCES_HEADER.to_string());

    for source in sources {
        let mut text = format!("- **{}**", source.document);
        if let Some(page) = source.page {
            text.push_str(&format!(" (p.{})", page));
        }
        text.push_str(&format!("\n  path: `{}`", source.file_path));
        text.push_str(&format!(
            "\n  excerpt: \"{}\"\n",
            excerpt(&source.excerpt, TRAILER_EXCERPT_CHARS)
        ));
        out.push(text);
    }

    out
}

/// First `limit` characters of `text`
fn take_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// First `limit` characters, with an ellipsis when the text was cut
fn excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let mut cut = take_chars(text, limit);
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}
