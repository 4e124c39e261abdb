use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::fallback::FallbackCategorizer;
use crate::model::{CategorizationResult, VocabularyItem};
use crate::pipeline::VocabularyCategorizer;
use crate::reference::ReferenceVocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub chunk_size: usize,
    /// Pause between consecutive chunks.
    pub delay: Duration,
    /// Budget for a single chunk.
    pub deadline: Duration,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            delay: Duration::from_millis(1000),
            deadline: Duration::from_secs(60),
        }
    }
}

/// Categorize a large upload chunk by chunk
///
/// Always returns one result per item, in order. Items in a chunk that
/// misses its deadline, and items not reached before `cancel` fires, get
/// [`CategorizationResult::failed`]. `on_progress` receives the number of
/// items done and the total after every chunk.
pub async fn categorize_in_chunks<R, F>(
    categorizer: &VocabularyCategorizer<R, F>,
    items: &[VocabularyItem],
    policy: &ChunkPolicy,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(usize, usize),
) -> Vec<CategorizationResult>
where
    R: ReferenceVocabulary,
    F: FallbackCategorizer,
{
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let chunk_count = total.div_ceil(policy.chunk_size.max(1));

    for (index, chunk) in items.chunks(policy.chunk_size.max(1)).enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            outcome = tokio::time::timeout(
                policy.deadline,
                categorizer.categorize_vocabulary(chunk),
            ) => Some(outcome),
        };
        match outcome {
            Some(Ok(chunk_results)) => results.extend(chunk_results),
            Some(Err(_)) => {
                log::warn!(
                    "Chunk {} of {chunk_count} exceeded {:?}; substituting defaults for {} items",
                    index + 1,
                    policy.deadline,
                    chunk.len()
                );
                results.extend(chunk.iter().map(|item| CategorizationResult::failed(&item.term)));
            }
            None => break,
        }
        on_progress(results.len(), total);

        let is_last = index + 1 == chunk_count;
        if !is_last && !policy.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }
    }

    if results.len() < total {
        log::warn!(
            "Categorization cancelled after {} of {total} items",
            results.len()
        );
        results.extend(
            items[results.len()..]
                .iter()
                .map(|item| CategorizationResult::failed(&item.term)),
        );
        on_progress(results.len(), total);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::RuleBasedCategorizer;
    use crate::memory::MemoryVocabulary;
    use crate::model::FAILED_CONFIDENCE;
    use language_utils::Language;

    fn categorizer() -> VocabularyCategorizer<MemoryVocabulary, RuleBasedCategorizer> {
        VocabularyCategorizer::new(
            MemoryVocabulary::default(),
            RuleBasedCategorizer,
            Language::Spanish,
        )
    }

    fn items(n: usize) -> Vec<VocabularyItem> {
        (0..n)
            .map(|i| VocabularyItem::new(format!("rojo {i}"), "red"))
            .collect()
    }

    #[tokio::test]
    async fn test_all_chunks_processed_in_order() {
        let policy = ChunkPolicy {
            chunk_size: 3,
            delay: Duration::ZERO,
            deadline: Duration::from_secs(5),
        };
        let mut progress = Vec::new();
        let items = items(7);
        let results = categorize_in_chunks(
            &categorizer(),
            &items,
            &policy,
            &CancellationToken::new(),
            |done, total| progress.push((done, total)),
        )
        .await;

        assert_eq!(results.len(), 7);
        for (item, result) in items.iter().zip(&results) {
            assert_eq!(result.raw_input, item.term);
            assert_eq!(result.category_confidence, 0.9);
        }
        assert_eq!(progress, vec![(3, 7), (6, 7), (7, 7)]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let results = categorize_in_chunks(
            &categorizer(),
            &items(4),
            &ChunkPolicy::default(),
            &cancel,
            |_, _| {},
        )
        .await;

        assert_eq!(results.len(), 4);
        assert!(
            results
                .iter()
                .all(|result| result.category_confidence == FAILED_CONFIDENCE)
        );
    }

    #[tokio::test]
    async fn test_cancel_during_delay() {
        let cancel = CancellationToken::new();
        let policy = ChunkPolicy {
            chunk_size: 2,
            delay: Duration::from_secs(30),
            deadline: Duration::from_secs(5),
        };
        let trigger = cancel.clone();
        let categorizer = categorizer();
        let items = items(5);
        let run = categorize_in_chunks(&categorizer, &items, &policy, &cancel, move |done, _| {
            if done == 2 {
                trigger.cancel();
            }
        });
        let results = run.await;

        assert_eq!(results.len(), 5);
        assert_eq!(results[1].category_confidence, 0.9);
        assert_eq!(results[2].category_confidence, FAILED_CONFIDENCE);
        assert_eq!(results[4].raw_input, "rojo 4");
    }
}
