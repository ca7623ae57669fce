//! Query rewriting and prompt assembly (§4.5 steps 4, 6, 7). Deliberately
//! template-based rather than a second LLM round-trip, so query
//! preparation never adds its own latency or failure mode to the pipeline.

use crate::entity::{Citation, Turn};
use crate::rerank::RankedChunk;

const SYSTEM_PROMPT: &str = "You are a retrieval-grounded assistant. Answer only from the \
provided context. Cite every fact you use by its chunk id in square brackets, like [chunk: \
<id>]. If the context does not contain the answer, say so plainly instead of guessing.";

pub const NO_RELEVANT_INFORMATION: &str =
    "I don't have any relevant information in the knowledge base to answer that.";

/// A roughly-4-characters-per-token estimate, consistent with the budgeting
/// approximation `ragflow_core::chunking` uses when no tokenizer is wired in.
fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

#[derive(Debug, Clone)]
pub struct RewrittenQuery {
    pub original: String,
    pub rewritten: String,
}

/// Expands a handful of pronouns against the previous user turn and strips
/// redundant whitespace; always keeps `original` untouched for logging.
pub fn rewrite_query(original: &str, prior_turns: &[Turn]) -> RewrittenQuery {
    let normalized = original.split_whitespace().collect::<Vec<_>>().join(" ");
    let needs_expansion = ["it", "that", "this", "them", "those"]
        .iter()
        .any(|pronoun| normalized.to_lowercase().split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *pronoun));

    let rewritten = if needs_expansion {
        if let Some(last_user_turn) = prior_turns.iter().rev().find(|t| matches!(t.role, crate::entity::TurnRole::User)) {
            format!("{normalized} (in the context of: \"{}\")", last_user_turn.text)
        } else {
            normalized.clone()
        }
    } else {
        normalized.clone()
    };

    RewrittenQuery { original: original.to_string(), rewritten }
}

pub struct AssembledContext {
    pub text: String,
    pub contributing: Vec<RankedChunk>,
}

/// Appends whole ranked chunks, grouped by document and kept in document
/// order, until `context_token_budget` would be exceeded. Chunks are never
/// split mid-way — a chunk that alone would blow the budget is simply
/// skipped rather than truncated.
pub fn assemble_context(ranked: &[RankedChunk], relevance_floor: f32, context_token_budget: usize) -> Option<AssembledContext> {
    let eligible: Vec<&RankedChunk> = ranked.iter().filter(|c| c.score >= relevance_floor).collect();
    if eligible.is_empty() {
        return None;
    }

    // Rank order decides which chunks fit the budget (most relevant first);
    // `contributing` keeps that order for citation fallback.
    let mut budget_used = 0usize;
    let mut contributing = Vec::new();
    let mut included: std::collections::HashSet<uuid::Uuid> = std::collections::HashSet::new();
    for chunk in &eligible {
        let block = format!("[chunk: {}]\n{}\n\n", chunk.chunk_id, chunk.content);
        let block_tokens = estimate_tokens(&block);
        if budget_used + block_tokens > context_token_budget {
            continue;
        }
        budget_used += block_tokens;
        included.insert(chunk.chunk_id);
        contributing.push((*chunk).clone());
    }

    if contributing.is_empty() {
        return None;
    }

    // The assembled text itself groups by document, first-seen-in-rank order,
    // with each document's chunks in sequence order — a reader should never
    // see chunk 3 of a document before chunk 1.
    let mut document_order: Vec<uuid::Uuid> = Vec::new();
    let mut by_document: std::collections::HashMap<uuid::Uuid, Vec<&RankedChunk>> = std::collections::HashMap::new();
    for chunk in &eligible {
        if !included.contains(&chunk.chunk_id) {
            continue;
        }
        by_document.entry(chunk.document_id).or_insert_with(|| {
            document_order.push(chunk.document_id);
            Vec::new()
        })
        .push(chunk);
    }
    for chunks in by_document.values_mut() {
        chunks.sort_by_key(|c| c.sequence_number);
    }

    let mut text = String::new();
    for document_id in &document_order {
        for chunk in &by_document[document_id] {
            text.push_str(&format!("[chunk: {}]\n{}\n\n", chunk.chunk_id, chunk.content));
        }
    }

    Some(AssembledContext { text, contributing })
}

/// Builds the final prompt sent to the LLM: system instructions, assembled
/// context (or conversation summary), recent turns, then the query.
pub fn compose_prompt(context: &str, summary: Option<&str>, recent_turns: &[Turn], query: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(SYSTEM_PROMPT);
    prompt.push_str("\n\n");

    if let Some(summary) = summary {
        prompt.push_str("Conversation summary so far:\n");
        prompt.push_str(summary);
        prompt.push_str("\n\n");
    }

    if !recent_turns.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for turn in recent_turns {
            let speaker = match turn.role {
                crate::entity::TurnRole::User => "User",
                crate::entity::TurnRole::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{speaker}: {}\n", turn.text));
        }
        prompt.push('\n');
    }

    if !context.is_empty() {
        prompt.push_str("Context:\n");
        prompt.push_str(context);
    }

    prompt.push_str("Question: ");
    prompt.push_str(query);
    prompt
}

/// A chunk contributes a citation if the model referenced its id explicitly
/// ("[chunk: <id>]"); if the model never cites, fall back to the top
/// contributors by combined score (§4.5 step 9).
pub fn select_citations(answer: &str, contributing: &[RankedChunk], fallback_count: usize) -> Vec<Citation> {
    let explicit: Vec<Citation> = contributing
        .iter()
        .filter(|c| answer.contains(&c.chunk_id.to_string()))
        .map(|c| Citation { chunk_id: c.chunk_id, document_id: c.document_id, score: c.score })
        .collect();

    if !explicit.is_empty() {
        return explicit;
    }

    contributing
        .iter()
        .take(fallback_count)
        .map(|c| Citation { chunk_id: c.chunk_id, document_id: c.document_id, score: c.score })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunk(score: f32, sequence_number: i64) -> RankedChunk {
        RankedChunk { chunk_id: Uuid::new_v4(), document_id: Uuid::new_v4(), content: "some content".into(), sequence_number, score }
    }

    #[test]
    fn rewrite_expands_pronoun_from_prior_turn() {
        let prior = vec![Turn::user("tell me about rust ownership")];
        let rewritten = rewrite_query("explain it more", &prior);
        assert_eq!(rewritten.original, "explain it more");
        assert!(rewritten.rewritten.contains("rust ownership"));
    }

    #[test]
    fn rewrite_is_noop_without_pronouns() {
        let rewritten = rewrite_query("what is rust", &[]);
        assert_eq!(rewritten.rewritten, "what is rust");
    }

    #[test]
    fn context_assembly_stops_at_budget() {
        let ranked = vec![chunk(0.9, 0), chunk(0.8, 1), chunk(0.7, 2)];
        let huge_chunk_tokens = estimate_tokens(&format!("[chunk: {}]\n{}\n\n", ranked[0].chunk_id, ranked[0].content));
        let assembled = assemble_context(&ranked, 0.0, huge_chunk_tokens * 2).unwrap();
        assert!(assembled.contributing.len() < ranked.len());
    }

    #[test]
    fn below_relevance_floor_returns_none() {
        let ranked = vec![chunk(0.1, 0)];
        assert!(assemble_context(&ranked, 0.5, 10_000).is_none());
    }

    #[test]
    fn assembled_text_preserves_sequence_order_within_a_document() {
        let document_id = Uuid::new_v4();
        let mut later = chunk(0.9, 5);
        later.document_id = document_id;
        let mut earlier = chunk(0.8, 1);
        earlier.document_id = document_id;
        // Rank order puts `later` first (higher score); the assembled text
        // must still read `earlier` (sequence 1) before `later` (sequence 5).
        let ranked = vec![later.clone(), earlier.clone()];
        let assembled = assemble_context(&ranked, 0.0, 10_000).unwrap();
        let earlier_pos = assembled.text.find(&earlier.chunk_id.to_string()).unwrap();
        let later_pos = assembled.text.find(&later.chunk_id.to_string()).unwrap();
        assert!(earlier_pos < later_pos);
    }

    #[test]
    fn citations_fall_back_to_top_contributors_when_model_does_not_cite() {
        let contributing = vec![chunk(0.9, 0), chunk(0.8, 1)];
        let citations = select_citations("a generic answer with no ids", &contributing, 1);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].chunk_id, contributing[0].chunk_id);
    }

    #[test]
    fn citations_prefer_explicit_model_references() {
        let contributing = vec![chunk(0.9, 0), chunk(0.8, 1)];
        let answer = format!("see [chunk: {}]", contributing[1].chunk_id);
        let citations = select_citations(&answer, &contributing, 1);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].chunk_id, contributing[1].chunk_id);
    }
}
