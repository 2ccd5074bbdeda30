//! Batch collection of generated stories.
//!
//! A single generation call rarely returns as many stories as requested, so a
//! run issues a bounded sequence of calls, keeps the stories whose titles it
//! has not seen yet, and stops as soon as the target is met, the upstream runs
//! dry or reports a failure, the caller cancels, or [`MAX_ATTEMPTS`] calls have
//! been made. A transport failure on any call ends the run; the call is not
//! retried on its own.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on upstream calls per run, whatever the target count.
pub const MAX_ATTEMPTS: u32 = 10;

pub const MAX_TARGET_COUNT: u32 = 100;
pub const MAX_BATCH_SIZE: u32 = 50;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectError {
    #[error("target count must be between 1 and {MAX_TARGET_COUNT}, got {0}")]
    InvalidTargetCount(u32),
    #[error("batch size must be between 1 and {MAX_BATCH_SIZE}, got {0}")]
    InvalidBatchSize(u32),
    #[error("category must not be empty")]
    MissingCategory,
    #[error("prompt must not be empty")]
    MissingPrompt,
}

/// What the caller wants collected in one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionRequest {
    pub category: String,
    pub prompt: String,
    pub target_count: u32,
    pub batch_size: u32,
}

impl CollectionRequest {
    pub fn validate(&self) -> Result<(), CollectError> {
        if self.category.trim().is_empty() {
            return Err(CollectError::MissingCategory);
        }
        if self.prompt.trim().is_empty() {
            return Err(CollectError::MissingPrompt);
        }
        if !(1..=MAX_TARGET_COUNT).contains(&self.target_count) {
            return Err(CollectError::InvalidTargetCount(self.target_count));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(CollectError::InvalidBatchSize(self.batch_size));
        }
        Ok(())
    }

    /// `ceil(target_count / batch_size)`: the "of Y" in "batch X of Y".
    pub fn planned_attempts(&self) -> u32 {
        self.target_count.div_ceil(self.batch_size.max(1))
    }
}

/// A generated story. Two items with the same title are the same item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectedItem {
    pub title: String,
    #[serde(default, alias = "content", alias = "summary")]
    pub body: String,
    #[serde(default)]
    pub category: String,
}

/// One upstream response, decoded once at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    Success {
        stories: Vec<CollectedItem>,
        /// Titles the upstream reports it rejected as already known.
        duplicates: Vec<String>,
    },
    /// Upstream could not produce enough valid stories for the prompt.
    InsufficientCount { message: String },
    /// The story already existed; nothing new was produced.
    AlreadyExists,
    Failure { message: String },
}

/// The upstream call could not be completed at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct GenerationError(pub String);

/// Source of generated stories; one call per attempt.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Ask for up to `need` stories matching `request`.
    async fn generate(
        &self,
        request: &CollectionRequest,
        need: u32,
    ) -> Result<GenerateOutcome, GenerationError>;
}

#[async_trait]
impl<T: StoryGenerator + ?Sized> StoryGenerator for &T {
    async fn generate(
        &self,
        request: &CollectionRequest,
        need: u32,
    ) -> Result<GenerateOutcome, GenerationError> {
        (**self).generate(request, need).await
    }
}

#[async_trait]
impl<T: StoryGenerator + ?Sized> StoryGenerator for std::sync::Arc<T> {
    async fn generate(
        &self,
        request: &CollectionRequest,
        need: u32,
    ) -> Result<GenerateOutcome, GenerationError> {
        (**self).generate(request, need).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Info,
    Warning,
    Error,
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    AttemptsExhausted,
    /// A batch came back empty.
    UpstreamExhausted,
    InsufficientCount { message: String },
    AlreadyExists,
    /// Upstream rejected the request; `message` is passed through unmodified.
    UpstreamError { message: String },
    Transport { message: String },
    Cancelled,
}

impl StopReason {
    pub fn severity(&self) -> Severity {
        match self {
            Self::TargetReached | Self::UpstreamExhausted | Self::AttemptsExhausted => Severity::Ok,
            Self::AlreadyExists | Self::Cancelled => Severity::Info,
            Self::InsufficientCount { .. } => Severity::Warning,
            Self::UpstreamError { .. } | Self::Transport { .. } => Severity::Error,
        }
    }

    /// Text to show the user alongside the summary.
    pub fn message(&self) -> String {
        match self {
            Self::TargetReached => "target reached".to_string(),
            Self::AttemptsExhausted => format!("stopped after {MAX_ATTEMPTS} attempts"),
            Self::UpstreamExhausted => "no more stories available".to_string(),
            Self::InsufficientCount { message } => message.clone(),
            Self::AlreadyExists => "story already exists, nothing saved".to_string(),
            Self::UpstreamError { message } | Self::Transport { message } => message.clone(),
            Self::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Per-attempt numbers, reported as soon as each attempt finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptReport {
    /// 1-based.
    pub attempt: u32,
    pub attempts_planned: u32,
    pub requested: u32,
    pub new_items: usize,
    /// Items dropped because their title was already accumulated.
    pub locally_deduplicated: usize,
    pub upstream_duplicates: usize,
    pub accumulated: usize,
}

/// State of one run. Only the collector mutates it.
#[derive(Debug, Clone, Default)]
pub struct CollectionProgress {
    attempts_made: u32,
    attempts_planned: u32,
    accumulated: Vec<CollectedItem>,
    duplicates: Vec<String>,
    stop_reason: Option<StopReason>,
}

impl CollectionProgress {
    fn new(attempts_planned: u32) -> Self {
        Self {
            attempts_planned,
            ..Default::default()
        }
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn attempts_planned(&self) -> u32 {
        self.attempts_planned
    }

    pub fn accumulated(&self) -> &[CollectedItem] {
        &self.accumulated
    }

    pub fn into_accumulated(self) -> Vec<CollectedItem> {
        self.accumulated
    }

    /// Titles the upstream reported as duplicates.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// `None` only while the run is still going.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    pub fn summary(&self) -> String {
        format!(
            "collected {}, duplicate {}",
            self.accumulated.len(),
            self.duplicates.len()
        )
    }
}

pub struct BatchCollector<G> {
    generator: G,
}

impl<G: StoryGenerator> BatchCollector<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Run one collection. `on_attempt` is called after every upstream call
    /// that returned a response.
    pub async fn collect<F>(
        &self,
        request: &CollectionRequest,
        cancel: &CancellationToken,
        mut on_attempt: F,
    ) -> Result<CollectionProgress, CollectError>
    where
        F: FnMut(&AttemptReport) + Send,
    {
        request.validate()?;

        let target = request.target_count as usize;
        let mut progress = CollectionProgress::new(request.planned_attempts());
        let mut seen: HashSet<String> = HashSet::new();

        info!(
            category = %request.category,
            target_count = request.target_count,
            batch_size = request.batch_size,
            attempts_planned = progress.attempts_planned,
            "Starting story collection"
        );

        let stop = loop {
            if progress.accumulated.len() >= target {
                break StopReason::TargetReached;
            }
            if progress.attempts_made >= MAX_ATTEMPTS {
                break StopReason::AttemptsExhausted;
            }
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let remaining = (target - progress.accumulated.len()) as u32;
            let need = request.batch_size.min(remaining);

            debug!(
                attempt = progress.attempts_made + 1,
                attempts_planned = progress.attempts_planned,
                need,
                "Requesting batch"
            );

            let outcome = self.generator.generate(request, need).await;
            progress.attempts_made += 1;

            let (stories, upstream_duplicates) = match outcome {
                Err(GenerationError(message)) => {
                    warn!(attempt = progress.attempts_made, error = %message, "Generation call failed");
                    break StopReason::Transport { message };
                }
                Ok(GenerateOutcome::Success { stories, .. }) if stories.is_empty() => {
                    self.report(&mut on_attempt, &progress, need, 0, 0, 0);
                    break StopReason::UpstreamExhausted;
                }
                Ok(GenerateOutcome::Success {
                    stories,
                    duplicates,
                }) => (stories, duplicates),
                Ok(GenerateOutcome::InsufficientCount { message }) => {
                    warn!(attempt = progress.attempts_made, %message, "Upstream reported insufficient count");
                    self.report(&mut on_attempt, &progress, need, 0, 0, 0);
                    break StopReason::InsufficientCount { message };
                }
                Ok(GenerateOutcome::AlreadyExists) => {
                    self.report(&mut on_attempt, &progress, need, 0, 0, 0);
                    break StopReason::AlreadyExists;
                }
                Ok(GenerateOutcome::Failure { message }) => {
                    warn!(attempt = progress.attempts_made, error = %message, "Upstream returned an error");
                    self.report(&mut on_attempt, &progress, need, 0, 0, 0);
                    break StopReason::UpstreamError { message };
                }
            };

            let received = stories.len();
            let mut new_items = 0;
            for item in stories {
                if seen.insert(item.title.clone()) {
                    progress.accumulated.push(item);
                    new_items += 1;
                }
            }
            let upstream_duplicate_count = upstream_duplicates.len();
            progress.duplicates.extend(upstream_duplicates);

            self.report(
                &mut on_attempt,
                &progress,
                need,
                new_items,
                received - new_items,
                upstream_duplicate_count,
            );
        };

        info!(
            attempts_made = progress.attempts_made,
            collected = progress.accumulated.len(),
            duplicates = progress.duplicates.len(),
            stop_reason = ?stop,
            "Story collection finished"
        );

        progress.stop_reason = Some(stop);
        Ok(progress)
    }

    fn report<F: FnMut(&AttemptReport)>(
        &self,
        on_attempt: &mut F,
        progress: &CollectionProgress,
        requested: u32,
        new_items: usize,
        locally_deduplicated: usize,
        upstream_duplicates: usize,
    ) {
        on_attempt(&AttemptReport {
            attempt: progress.attempts_made,
            attempts_planned: progress.attempts_planned,
            requested,
            new_items,
            locally_deduplicated,
            upstream_duplicates,
            accumulated: progress.accumulated.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use super::*;

    /// Replays canned outcomes and records the `need` of every call.
    struct ScriptedGenerator {
        script: Mutex<VecDeque<Result<GenerateOutcome, GenerationError>>>,
        needs: Mutex<Vec<u32>>,
    }

    impl ScriptedGenerator {
        fn new(script: Vec<Result<GenerateOutcome, GenerationError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                needs: Mutex::new(Vec::new()),
            }
        }

        fn needs(&self) -> Vec<u32> {
            self.needs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StoryGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _request: &CollectionRequest,
            need: u32,
        ) -> Result<GenerateOutcome, GenerationError> {
            self.needs.lock().unwrap().push(need);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(GenerateOutcome::Success {
                    stories: vec![],
                    duplicates: vec![],
                }))
        }
    }

    /// Always returns `need` stories with fresh titles.
    struct EndlessGenerator {
        counter: Mutex<usize>,
    }

    #[async_trait]
    impl StoryGenerator for EndlessGenerator {
        async fn generate(
            &self,
            request: &CollectionRequest,
            need: u32,
        ) -> Result<GenerateOutcome, GenerationError> {
            let mut counter = self.counter.lock().unwrap();
            let stories = (0..need)
                .map(|_| {
                    *counter += 1;
                    item_in(&format!("story {}", *counter), &request.category)
                })
                .collect();
            Ok(GenerateOutcome::Success {
                stories,
                duplicates: vec![],
            })
        }
    }

    fn item(title: &str) -> CollectedItem {
        item_in(title, "童话故事")
    }

    fn item_in(title: &str, category: &str) -> CollectedItem {
        CollectedItem {
            title: title.to_string(),
            body: format!("{title} body"),
            category: category.to_string(),
        }
    }

    fn success(titles: &[&str]) -> Result<GenerateOutcome, GenerationError> {
        Ok(GenerateOutcome::Success {
            stories: titles.iter().map(|t| item(t)).collect(),
            duplicates: vec![],
        })
    }

    fn request(target_count: u32, batch_size: u32) -> CollectionRequest {
        CollectionRequest {
            category: "童话故事".to_string(),
            prompt: "关于友谊的故事".to_string(),
            target_count,
            batch_size,
        }
    }

    fn titles(progress: &CollectionProgress) -> Vec<&str> {
        progress
            .accumulated()
            .iter()
            .map(|i| i.title.as_str())
            .collect()
    }

    async fn run(
        generator: &ScriptedGenerator,
        request: &CollectionRequest,
    ) -> (CollectionProgress, Vec<AttemptReport>) {
        let mut reports = Vec::new();
        let progress = BatchCollector::new(generator)
            .collect(request, &CancellationToken::new(), |r| reports.push(*r))
            .await
            .unwrap();
        (progress, reports)
    }

    #[test]
    fn test_planned_attempts() {
        assert_eq!(request(25, 10).planned_attempts(), 3);
        assert_eq!(request(20, 10).planned_attempts(), 2);
        assert_eq!(request(1, 50).planned_attempts(), 1);
        assert_eq!(request(100, 1).planned_attempts(), 100);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert_eq!(
            request(0, 10).validate(),
            Err(CollectError::InvalidTargetCount(0))
        );
        assert_eq!(
            request(101, 10).validate(),
            Err(CollectError::InvalidTargetCount(101))
        );
        assert_eq!(
            request(10, 0).validate(),
            Err(CollectError::InvalidBatchSize(0))
        );
        assert_eq!(
            request(10, 51).validate(),
            Err(CollectError::InvalidBatchSize(51))
        );
        let mut blank = request(1, 1);
        blank.prompt = "  ".to_string();
        assert_eq!(blank.validate(), Err(CollectError::MissingPrompt));
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_calls() {
        let generator = ScriptedGenerator::new(vec![]);
        let result = BatchCollector::new(&generator)
            .collect(&request(0, 10), &CancellationToken::new(), |_| {})
            .await;
        assert!(result.is_err());
        assert!(generator.needs().is_empty());
    }

    #[tokio::test]
    async fn test_needs_shrink_to_remaining_count() {
        let generator = ScriptedGenerator::new(vec![
            success(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]),
            success(&["11", "12", "13", "14", "15", "16", "17", "18", "19", "20"]),
            success(&["21", "22", "23", "24", "25"]),
        ]);
        let (progress, reports) = run(&generator, &request(25, 10)).await;

        assert_eq!(generator.needs(), vec![10, 10, 5]);
        assert_eq!(progress.attempts_planned(), 3);
        assert_eq!(progress.attempts_made(), 3);
        assert_eq!(progress.accumulated().len(), 25);
        assert_eq!(progress.stop_reason(), Some(&StopReason::TargetReached));

        let batches: Vec<_> = reports
            .iter()
            .map(|r| (r.attempt, r.attempts_planned, r.accumulated))
            .collect();
        assert_eq!(batches, vec![(1, 3, 10), (2, 3, 20), (3, 3, 25)]);
    }

    #[tokio::test]
    async fn test_overlapping_titles_are_deduplicated() {
        let generator = ScriptedGenerator::new(vec![success(&["A", "B"]), success(&["B", "C"])]);
        let (progress, reports) = run(&generator, &request(3, 2)).await;

        assert_eq!(titles(&progress), vec!["A", "B", "C"]);
        // Local dedup is not an upstream duplicate report.
        assert!(progress.duplicates().is_empty());
        assert_eq!(reports[1].new_items, 1);
        assert_eq!(reports[1].locally_deduplicated, 1);
        assert_eq!(progress.summary(), "collected 3, duplicate 0");
    }

    #[tokio::test]
    async fn test_duplicate_titles_within_one_batch() {
        let generator = ScriptedGenerator::new(vec![success(&["A", "A", "B"])]);
        let (progress, _) = run(&generator, &request(2, 5)).await;
        assert_eq!(titles(&progress), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_titles_match_case_sensitively() {
        let generator = ScriptedGenerator::new(vec![success(&["Fox", "fox"])]);
        let (progress, _) = run(&generator, &request(2, 2)).await;
        assert_eq!(titles(&progress), vec!["Fox", "fox"]);
    }

    #[tokio::test]
    async fn test_upstream_duplicates_are_recorded() {
        let generator = ScriptedGenerator::new(vec![Ok(GenerateOutcome::Success {
            stories: vec![item("A")],
            duplicates: vec!["守株待兔".to_string(), "画蛇添足".to_string()],
        })]);
        let (progress, reports) = run(&generator, &request(1, 5)).await;

        assert_eq!(progress.duplicates(), ["守株待兔", "画蛇添足"]);
        assert_eq!(reports[0].upstream_duplicates, 2);
        assert_eq!(progress.summary(), "collected 1, duplicate 2");
    }

    #[tokio::test]
    async fn test_empty_first_batch_ends_run() {
        let generator = ScriptedGenerator::new(vec![success(&[]), success(&["never"])]);
        let (progress, reports) = run(&generator, &request(20, 10)).await;

        assert_eq!(progress.attempts_made(), 1);
        assert!(progress.accumulated().is_empty());
        assert_eq!(progress.stop_reason(), Some(&StopReason::UpstreamExhausted));
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_keeps_partial_results() {
        let generator = ScriptedGenerator::new(vec![success(&["A", "B"]), success(&[])]);
        let (progress, _) = run(&generator, &request(10, 2)).await;

        assert_eq!(generator.needs().len(), 2);
        assert_eq!(titles(&progress), vec!["A", "B"]);
        assert_eq!(progress.stop_reason(), Some(&StopReason::UpstreamExhausted));
    }

    #[tokio::test]
    async fn test_single_call_when_target_fits_in_batch() {
        let generator = ScriptedGenerator::new(vec![success(&["A", "B", "C"])]);
        let (progress, _) = run(&generator, &request(3, 10)).await;

        assert_eq!(generator.needs(), vec![3]);
        assert_eq!(progress.stop_reason(), Some(&StopReason::TargetReached));
    }

    #[tokio::test]
    async fn test_attempt_ceiling_is_a_hard_limit() {
        // One new story per call while the target asks for fifty.
        let script = (0..20).map(|i| success(&[&format!("t{i}")])).collect();
        let generator = ScriptedGenerator::new(script);
        let (progress, reports) = run(&generator, &request(50, 50)).await;

        assert_eq!(generator.needs().len(), MAX_ATTEMPTS as usize);
        assert_eq!(progress.attempts_made(), MAX_ATTEMPTS);
        assert_eq!(progress.accumulated().len(), 10);
        assert_eq!(progress.stop_reason(), Some(&StopReason::AttemptsExhausted));
        assert_eq!(reports.len(), MAX_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn test_repeated_duplicates_never_exceed_ceiling() {
        let script = (0..20).map(|_| success(&["same"])).collect();
        let generator = ScriptedGenerator::new(script);
        let (progress, _) = run(&generator, &request(5, 5)).await;

        assert_eq!(progress.attempts_made(), MAX_ATTEMPTS);
        assert_eq!(titles(&progress), vec!["same"]);
    }

    #[tokio::test]
    async fn test_upstream_error_message_passes_through() {
        let generator = ScriptedGenerator::new(vec![
            success(&["A"]),
            Ok(GenerateOutcome::Failure {
                message: "rate limited".to_string(),
            }),
        ]);
        let (progress, _) = run(&generator, &request(5, 1)).await;

        let stop = progress.stop_reason().unwrap();
        assert_eq!(stop.message(), "rate limited");
        assert_eq!(stop.severity(), Severity::Error);
        assert_eq!(titles(&progress), vec!["A"]);
        assert_eq!(progress.attempts_made(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_count_is_a_warning() {
        let generator = ScriptedGenerator::new(vec![Ok(GenerateOutcome::InsufficientCount {
            message: "有效收集数量不足，仅收集到0个故事".to_string(),
        })]);
        let (progress, _) = run(&generator, &request(5, 5)).await;

        let stop = progress.stop_reason().unwrap();
        assert_eq!(stop.severity(), Severity::Warning);
        assert!(matches!(stop, StopReason::InsufficientCount { .. }));
        assert_eq!(generator.needs().len(), 1);
    }

    #[tokio::test]
    async fn test_already_exists_is_informational() {
        let generator = ScriptedGenerator::new(vec![Ok(GenerateOutcome::AlreadyExists)]);
        let (progress, _) = run(&generator, &request(5, 5)).await;

        assert_eq!(progress.stop_reason(), Some(&StopReason::AlreadyExists));
        assert_eq!(StopReason::AlreadyExists.severity(), Severity::Info);
        assert!(progress.accumulated().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_without_retry() {
        let generator = ScriptedGenerator::new(vec![
            success(&["A"]),
            Err(GenerationError("connection reset".to_string())),
            success(&["B"]),
        ]);
        let (progress, reports) = run(&generator, &request(3, 1)).await;

        assert_eq!(generator.needs().len(), 2);
        assert_eq!(
            progress.stop_reason(),
            Some(&StopReason::Transport {
                message: "connection reset".to_string()
            })
        );
        assert_eq!(titles(&progress), vec!["A"]);
        // No report for the call that produced no response.
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_calls() {
        let generator = ScriptedGenerator::new(vec![success(&["A"])]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let progress = BatchCollector::new(&generator)
            .collect(&request(5, 1), &cancel, |_| {})
            .await
            .unwrap();

        assert!(generator.needs().is_empty());
        assert_eq!(progress.stop_reason(), Some(&StopReason::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_between_attempts_keeps_progress() {
        let generator = ScriptedGenerator::new(vec![success(&["A"]), success(&["B"])]);
        let cancel = CancellationToken::new();

        let progress = BatchCollector::new(&generator)
            .collect(&request(5, 1), &cancel, |report| {
                if report.attempt == 1 {
                    cancel.cancel();
                }
            })
            .await
            .unwrap();

        assert_eq!(generator.needs(), vec![1]);
        assert_eq!(titles(&progress), vec!["A"]);
        assert_eq!(progress.stop_reason(), Some(&StopReason::Cancelled));
    }

    #[tokio::test]
    async fn test_endless_generator_reaches_target_in_planned_attempts() {
        let generator = EndlessGenerator {
            counter: Mutex::new(0),
        };
        let progress = BatchCollector::new(generator)
            .collect(&request(100, 15), &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(progress.attempts_made(), 7);
        assert_eq!(progress.attempts_made(), progress.attempts_planned());
        assert_eq!(progress.accumulated().len(), 100);
        let unique: HashSet<_> = progress.accumulated().iter().map(|i| &i.title).collect();
        assert_eq!(unique.len(), 100);
    }
}
