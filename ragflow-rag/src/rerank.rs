//! Combines the vector index's cosine-distance score with a cheap lexical
//! overlap signal so an exact keyword match outranks a merely nearby
//! embedding. No separate reranker model — just a linear blend, since that's
//! what the corpus's own search code (vector distance plus a term filter)
//! already does one layer down.

use ragflow_storage::ScoredChunk;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub sequence_number: i64,
    pub score: f32,
}

/// Weight given to the vector score in the final blend; the remainder goes
/// to lexical overlap.
const VECTOR_WEIGHT: f32 = 0.7;

fn lexical_overlap(query_terms: &[String], content: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_lower = content.to_lowercase();
    let matched = query_terms.iter().filter(|t| content_lower.contains(t.as_str())).count();
    matched as f32 / query_terms.len() as f32
}

/// `ragflow_storage::ScoredChunk.score` is a cosine *distance* (smaller is
/// closer), so it's inverted to a similarity in `[0, 1]` before blending.
pub fn rerank(query: &str, chunks: Vec<ScoredChunk>) -> Vec<RankedChunk> {
    let query_terms: Vec<String> = query.to_lowercase().split_whitespace().map(|s| s.to_string()).collect();

    let mut ranked: Vec<RankedChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let document_id = chunk
                .metadata
                .get("document_id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(Uuid::nil());
            let content = chunk.metadata.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();
            let sequence_number = chunk.metadata.get("sequence_number").and_then(|v| v.as_i64()).unwrap_or(0);

            let similarity = (1.0 - chunk.score).clamp(0.0, 1.0);
            let lexical = lexical_overlap(&query_terms, &content);
            let score = VECTOR_WEIGHT * similarity + (1.0 - VECTOR_WEIGHT) * lexical;

            RankedChunk { chunk_id: chunk.chunk_id, document_id, content, sequence_number, score }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.sequence_number.cmp(&b.sequence_number))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    ranked
}
