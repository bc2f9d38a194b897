//! Cache-then-generate-then-fallback question sourcing.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::cache::{CachedSet, Lookup, QuestionCache};
use super::fallback::{FallbackError, FallbackQuestionPool};
use super::generator::QuestionGenerator;
use super::model::{GenerationCriteria, Question};

/// Where a served question set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    /// Served from the fingerprint cache. Coalesced waiters report this too:
    /// they issued no upstream call of their own.
    Cache,
    /// Freshly generated upstream for these criteria.
    AiPersonalized,
    /// Drawn from the curated fallback pool.
    FallbackDatabase,
}

/// Failure to assemble a full question set.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Neither generation nor the fallback pool could cover the request.
    #[error("could not assemble {requested} questions, fallback offered {available}")]
    Insufficient {
        /// How many questions were promised to the room.
        requested: usize,
        /// How many the fallback pool could supply.
        available: usize,
    },
}

/// Orchestrates the cache, the generator, and the fallback pool.
///
/// The contract callers rely on: `obtain` either returns exactly `count`
/// questions or fails, never a short set.
pub struct QuestionSource {
    cache: QuestionCache,
    generator: Arc<dyn QuestionGenerator>,
    fallback: Arc<dyn FallbackQuestionPool>,
    generation_timeout: Duration,
}

impl QuestionSource {
    /// Wire a source from its collaborators.
    pub fn new(
        cache: QuestionCache,
        generator: Arc<dyn QuestionGenerator>,
        fallback: Arc<dyn FallbackQuestionPool>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            generator,
            fallback,
            generation_timeout,
        }
    }

    /// Produce exactly `count` questions for `criteria`.
    ///
    /// Cache hit first; on a miss one bounded generation call runs while
    /// concurrent requests for the same fingerprint wait on its outcome; any
    /// generation failure degrades to the fallback pool.
    pub async fn obtain(
        &self,
        criteria: &GenerationCriteria,
        count: usize,
    ) -> Result<(CachedSet, SourceTag), SourceError> {
        let fingerprint = criteria.fingerprint();

        match self.cache.lookup(&fingerprint) {
            Lookup::Hit(set) => {
                debug!(fingerprint = %fingerprint, "question cache hit");
                Ok((set, SourceTag::Cache))
            }
            Lookup::Wait(waiter) => match waiter.outcome().await {
                Some(set) => {
                    debug!(fingerprint = %fingerprint, "joined in-flight generation");
                    Ok((set, SourceTag::Cache))
                }
                None => self.draw_fallback(criteria, count).await,
            },
            Lookup::Vacant(guard) => {
                let generated = timeout(
                    self.generation_timeout,
                    self.generator.generate(criteria.clone(), count),
                )
                .await;

                match generated {
                    Ok(Ok(raw)) => {
                        let received = raw.len();
                        let mut usable: Vec<Question> =
                            raw.into_iter().filter_map(Question::normalized).collect();
                        if usable.len() >= count {
                            usable.truncate(count);
                            let set = guard.fulfill(usable);
                            info!(
                                fingerprint = %fingerprint,
                                count,
                                "generated and cached question set"
                            );
                            return Ok((set, SourceTag::AiPersonalized));
                        }
                        warn!(
                            fingerprint = %fingerprint,
                            received,
                            usable = usable.len(),
                            requested = count,
                            "generator returned too few usable questions"
                        );
                        guard.fail();
                    }
                    Ok(Err(err)) => {
                        warn!(fingerprint = %fingerprint, error = %err, "question generation failed");
                        guard.fail();
                    }
                    Err(_) => {
                        warn!(
                            fingerprint = %fingerprint,
                            timeout_secs = self.generation_timeout.as_secs(),
                            "question generation timed out"
                        );
                        guard.fail();
                    }
                }

                self.draw_fallback(criteria, count).await
            }
        }
    }

    /// Drop every cached entry; used on process teardown.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn draw_fallback(
        &self,
        criteria: &GenerationCriteria,
        count: usize,
    ) -> Result<(CachedSet, SourceTag), SourceError> {
        match self.fallback.draw(criteria.clone(), count).await {
            Ok(questions) => {
                info!(count, "served question set from fallback pool");
                Ok((Arc::new(questions), SourceTag::FallbackDatabase))
            }
            Err(FallbackError::Insufficient {
                requested,
                available,
            }) => {
                warn!(requested, available, "fallback pool exhausted");
                Err(SourceError::Insufficient {
                    requested,
                    available,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;
    use uuid::Uuid;

    use super::*;
    use crate::questions::fallback::StaticQuestionPool;
    use crate::questions::generator::GenerationError;
    use crate::questions::model::Difficulty;

    fn valid_question(prompt: &str) -> Question {
        Question {
            id: Uuid::new_v4(),
            category: "science".into(),
            prompt: prompt.into(),
            choices: vec!["a".into(), "b".into(), "c".into()],
            correct_choice: 1,
            difficulty: Difficulty::Medium,
            time_limit_secs: 20,
            point_value: 0,
            fun_fact: None,
        }
    }

    fn malformed_question() -> Question {
        Question {
            choices: vec!["only one".into()],
            ..valid_question("broken")
        }
    }

    /// Counts calls, sleeps, then returns `supply` valid questions.
    struct ScriptedGenerator {
        calls: AtomicUsize,
        delay: Duration,
        supply: usize,
        malformed: usize,
    }

    impl ScriptedGenerator {
        fn instant(supply: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                supply,
                malformed: 0,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl QuestionGenerator for ScriptedGenerator {
        fn generate(
            &self,
            _criteria: GenerationCriteria,
            _count: usize,
        ) -> BoxFuture<'static, Result<Vec<Question>, GenerationError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay;
            let supply = self.supply;
            let malformed = self.malformed;
            Box::pin(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let mut questions: Vec<Question> =
                    (0..supply).map(|i| valid_question(&format!("q{i}"))).collect();
                questions.extend((0..malformed).map(|_| malformed_question()));
                Ok(questions)
            })
        }
    }

    struct FailingGenerator;

    impl QuestionGenerator for FailingGenerator {
        fn generate(
            &self,
            _criteria: GenerationCriteria,
            _count: usize,
        ) -> BoxFuture<'static, Result<Vec<Question>, GenerationError>> {
            Box::pin(async { Err(GenerationError::Unavailable) })
        }
    }

    struct StalledGenerator;

    impl QuestionGenerator for StalledGenerator {
        fn generate(
            &self,
            _criteria: GenerationCriteria,
            _count: usize,
        ) -> BoxFuture<'static, Result<Vec<Question>, GenerationError>> {
            Box::pin(futures::future::pending())
        }
    }

    fn source_with(
        generator: Arc<dyn QuestionGenerator>,
        fallback: Arc<dyn FallbackQuestionPool>,
    ) -> QuestionSource {
        QuestionSource::new(
            QuestionCache::new(Duration::from_secs(1800)),
            generator,
            fallback,
            Duration::from_secs(8),
        )
    }

    #[tokio::test]
    async fn generation_populates_cache_and_second_call_hits() {
        let generator = Arc::new(ScriptedGenerator::instant(5));
        let source = source_with(generator.clone(), Arc::new(StaticQuestionPool::starter()));
        let criteria = GenerationCriteria::default();

        let (first, tag) = source.obtain(&criteria, 5).await.unwrap();
        assert_eq!(tag, SourceTag::AiPersonalized);
        assert_eq!(first.len(), 5);

        let (second, tag) = source.obtain(&criteria, 5).await.unwrap();
        assert_eq!(tag, SourceTag::Cache);
        assert_eq!(generator.call_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_trigger_exactly_one_generation() {
        let generator = Arc::new(ScriptedGenerator {
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(1),
            supply: 4,
            malformed: 0,
        });
        let source = Arc::new(source_with(
            generator.clone(),
            Arc::new(StaticQuestionPool::starter()),
        ));
        let criteria = GenerationCriteria::default();

        let first = tokio::spawn({
            let source = source.clone();
            let criteria = criteria.clone();
            async move { source.obtain(&criteria, 4).await }
        });
        // Let the first request install its pending slot before the second
        // looks up.
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let source = source.clone();
            let criteria = criteria.clone();
            async move { source.obtain(&criteria, 4).await }
        });

        let (_, first_tag) = first.await.unwrap().unwrap();
        let (_, second_tag) = second.await.unwrap().unwrap();

        assert_eq!(generator.call_count(), 1);
        assert_eq!(first_tag, SourceTag::AiPersonalized);
        assert_eq!(second_tag, SourceTag::Cache);
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_fallback() {
        let source = source_with(
            Arc::new(FailingGenerator),
            Arc::new(StaticQuestionPool::starter()),
        );
        let (questions, tag) = source
            .obtain(&GenerationCriteria::default(), 6)
            .await
            .unwrap();
        assert_eq!(tag, SourceTag::FallbackDatabase);
        assert_eq!(questions.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn generation_timeout_degrades_to_fallback() {
        let source = source_with(
            Arc::new(StalledGenerator),
            Arc::new(StaticQuestionPool::starter()),
        );
        let (questions, tag) = source
            .obtain(&GenerationCriteria::default(), 6)
            .await
            .unwrap();
        assert_eq!(tag, SourceTag::FallbackDatabase);
        assert_eq!(questions.len(), 6);
    }

    #[tokio::test]
    async fn short_generator_output_degrades_to_fallback() {
        // Three valid plus two malformed entries cannot cover a count of five.
        let generator = Arc::new(ScriptedGenerator {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            supply: 3,
            malformed: 2,
        });
        let source = source_with(generator, Arc::new(StaticQuestionPool::starter()));
        let (questions, tag) = source
            .obtain(&GenerationCriteria::default(), 5)
            .await
            .unwrap();
        assert_eq!(tag, SourceTag::FallbackDatabase);
        assert_eq!(questions.len(), 5);
    }

    #[tokio::test]
    async fn exhausted_fallback_is_a_hard_failure() {
        let source = source_with(
            Arc::new(FailingGenerator),
            Arc::new(StaticQuestionPool::new(Vec::new())),
        );
        let result = source.obtain(&GenerationCriteria::default(), 5).await;
        assert!(matches!(
            result,
            Err(SourceError::Insufficient {
                requested: 5,
                available: 0
            })
        ));
    }
}
