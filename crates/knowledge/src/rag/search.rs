//! Retrieval adapter over a knowledge base service.

use crate::service::KnowledgeBaseService;
use crate::types::RetrievedPassage;
use kbchat_core::config::SCORE_THRESHOLD_MAX;
use kbchat_core::{AppError, AppResult};

/// Validated search parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    top_k: usize,
    score_threshold: f64,
}

impl SearchParams {
    /// Validate `top_k >= 1` and `0 <= score_threshold <= 1100`.
    pub fn new(top_k: i64, score_threshold: f64) -> AppResult<Self> {
        if top_k < 1 {
            return Err(AppError::InvalidRequest(format!(
                "top_k must be at least 1, got {}",
                top_k
            )));
        }

        if !(0.0..=SCORE_THRESHOLD_MAX).contains(&score_threshold) {
            return Err(AppError::InvalidRequest(format!(
                "score_threshold must be between 0 and {}, got {}",
                SCORE_THRESHOLD_MAX, score_threshold
            )));
        }

        let top_k = usize::try_from(top_k)
            .map_err(|_| AppError::InvalidRequest(format!("top_k out of range: {}", top_k)))?;

        Ok(Self {
            top_k,
            score_threshold,
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn score_threshold(&self) -> f64 {
        self.score_threshold
    }
}

/// Retrieve passages for `query`, most relevant (lowest distance) first.
///
/// The backend's answer is normalized: passages above the threshold are
/// dropped, the rest are stably sorted by distance and cut to `top_k`.
/// Any backend failure is reported as `Retrieval`.
pub async fn retrieve(
    service: &dyn KnowledgeBaseService,
    query: &str,
    params: SearchParams,
) -> AppResult<Vec<RetrievedPassage>> {
    tracing::debug!(
        "Retrieving from '{}' (top_k: {}, score_threshold: {})",
        service.name(),
        params.top_k,
        params.score_threshold
    );

    let mut passages = service
        .search_docs(query, params.top_k, params.score_threshold)
        .await
        .map_err(|e| match e {
            AppError::Retrieval(_) => e,
            other => AppError::Retrieval(other.to_string()),
        })?;

    let returned = passages.len();
    passages.retain(|p| p.relevance_score <= params.score_threshold);
    passages.sort_by(|a, b| a.relevance_score.total_cmp(&b.relevance_score));
    passages.truncate(params.top_k);

    if passages.len() != returned {
        tracing::debug!(
            "Dropped {} passages outside top_k/threshold",
            returned - passages.len()
        );
    }

    if let (Some(best), Some(worst)) = (passages.first(), passages.last()) {
        tracing::info!(
            "Retrieved {} passages from '{}' (best: {:.3}, worst: {:.3})",
            passages.len(),
            service.name(),
            best.relevance_score,
            worst.relevance_score
        );
    } else {
        tracing::info!("No passages retrieved from '{}'", service.name());
    }

    Ok(passages)
}
