//! Request orchestrator for Spør.
//!
//! Coordinates video lookup, index probing, context resolution, answer
//! synthesis and progress tracking for each question, plus registering and
//! removing videos.

use crate::catalog::{SqliteCatalog, Video, VideoCatalog};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SporError};
use crate::qa::{
    AnswerResult, AnswerSynthesizer, CompletionOptions, CompletionService, ContextResolver,
    OpenAICompletion, Query, SearchMode,
};
use crate::semantic_index::{self, SemanticIndex};
use crate::tracking::{QuestionTracker, SqliteProgressTracker};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// The main orchestrator: one instance is shared by all requests.
pub struct Orchestrator {
    settings: Settings,
    catalog: Arc<dyn VideoCatalog>,
    index: Arc<dyn SemanticIndex>,
    tracker: Arc<dyn QuestionTracker>,
    resolver: ContextResolver,
    synthesizer: AnswerSynthesizer,
    probe_timeout: Duration,
}

impl Orchestrator {
    /// Create an orchestrator with the configured backends.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);
        let index = semantic_index::from_settings(&settings, embedder)?;

        let database_path = settings.database_path();
        let catalog = Arc::new(SqliteCatalog::new(&database_path)?);
        let tracker = Arc::new(SqliteProgressTracker::new(&database_path)?);

        let completion = Arc::new(OpenAICompletion::from_settings(&settings.completion)?);
        info!(
            "Answering with {} (timeout {}s)",
            settings.completion.model, settings.completion.timeout_seconds
        );

        Ok(Self::with_components(
            settings, prompts, catalog, index, tracker, completion,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        catalog: Arc<dyn VideoCatalog>,
        index: Arc<dyn SemanticIndex>,
        tracker: Arc<dyn QuestionTracker>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        let resolver = ContextResolver::new(index.clone(), settings.retrieval.clone())
            .with_query_timeout(settings.semantic_index.query_timeout());
        let synthesizer = AnswerSynthesizer::new(completion, prompts)
            .with_options(CompletionOptions::from(&settings.completion))
            .with_timeout(settings.completion.timeout());
        let probe_timeout = settings.semantic_index.probe_timeout();

        Self {
            settings,
            catalog,
            index,
            tracker,
            resolver,
            synthesizer,
            probe_timeout,
        }
    }

    pub fn catalog(&self) -> Arc<dyn VideoCatalog> {
        self.catalog.clone()
    }

    pub fn index(&self) -> Arc<dyn SemanticIndex> {
        self.index.clone()
    }

    pub fn tracker(&self) -> Arc<dyn QuestionTracker> {
        self.tracker.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Answer a student's question about a video.
    ///
    /// Only an unknown video, an empty question, or a failed completion call
    /// are errors; every semantic index problem falls back to the transcript.
    #[instrument(skip(self, query), fields(video_id = %query.video_id, mode = %query.mode))]
    pub async fn answer_question(
        &self,
        query: &Query,
        student_id: Option<&str>,
    ) -> Result<AnswerResult> {
        if query.question.trim().is_empty() {
            return Err(SporError::InvalidInput("Question must not be empty".to_string()));
        }

        let video = self
            .catalog
            .get_video(&query.video_id)
            .await?
            .ok_or_else(|| SporError::VideoNotFound(query.video_id.clone()))?;

        let index_available = match query.mode {
            SearchMode::Semantic => self.probe_index().await,
            SearchMode::Proximity => false,
        };

        let context = self.resolver.resolve(query, &video, index_available).await;
        let answer = self.synthesizer.synthesize(&context.text, &query.question).await?;

        if let Some(student_id) = student_id {
            if let Err(e) = self.tracker.record_question_asked(student_id, &video.id).await {
                warn!("Failed to record question for student {}: {}", student_id, e);
            }
        }

        Ok(AnswerResult {
            answer,
            question: query.question.clone(),
            search_type: query.search_type_label(),
            using_semantic_index: query.mode == SearchMode::Semantic && index_available,
            context_source: context.source,
        })
    }

    /// Whether the semantic index answers a heartbeat within the probe timeout.
    pub async fn probe_index(&self) -> bool {
        match tokio::time::timeout(self.probe_timeout, self.index.heartbeat()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Semantic index unavailable, using full transcripts: {}", e);
                false
            }
            Err(_) => {
                warn!(
                    "Semantic index probe timed out after {:?}, using full transcripts",
                    self.probe_timeout
                );
                false
            }
        }
    }

    /// Store a video and, optionally, index its transcript under its teacher.
    ///
    /// Indexing failures are logged and reported in the result; the video is
    /// stored either way.
    #[instrument(skip(self, video), fields(video_id = %video.id))]
    pub async fn add_video(&self, video: &Video, index: bool) -> Result<AddVideoResult> {
        self.catalog.upsert_video(video).await?;

        let indexed = if !index {
            false
        } else if video.transcript.trim().is_empty() {
            info!("Video {} has no transcript, skipping indexing", video.id);
            false
        } else {
            match self.index_transcript(video).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to index transcript for {}: {}", video.id, e);
                    false
                }
            }
        };

        Ok(AddVideoResult {
            video_id: video.id.clone(),
            word_count: video.word_count(),
            indexed,
        })
    }

    async fn index_transcript(&self, video: &Video) -> Result<()> {
        let collection = self.index.get_or_create_collection(&video.teacher_id).await?;
        self.index
            .upsert_document(&collection, &video.id, &video.transcript)
            .await?;
        info!("Indexed transcript for {} in {}", video.id, collection.name);
        Ok(())
    }

    /// Delete a video and its indexed transcript.
    #[instrument(skip(self))]
    pub async fn remove_video(&self, video_id: &str) -> Result<()> {
        let video = self
            .catalog
            .get_video(video_id)
            .await?
            .ok_or_else(|| SporError::VideoNotFound(video_id.to_string()))?;

        if let Err(e) = self.remove_indexed_transcript(&video).await {
            warn!("Failed to remove indexed transcript for {}: {}", video_id, e);
        }

        self.catalog.delete_video(video_id).await?;
        Ok(())
    }

    async fn remove_indexed_transcript(&self, video: &Video) -> Result<()> {
        if !self.index.collection_exists(&video.teacher_id).await? {
            return Ok(());
        }
        let collection = self.index.get_or_create_collection(&video.teacher_id).await?;
        self.index.delete_document(&collection, &video.id).await?;
        Ok(())
    }
}

/// Result of registering a video.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVideoResult {
    pub video_id: String,
    pub word_count: usize,
    /// Whether the transcript is now in the semantic index.
    pub indexed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qa::{ContextSource, NO_TRANSCRIPT_SENTINEL};
    use crate::semantic_index::{CollectionHandle, MemorySemanticIndex, NearestMatches};
    use crate::semantic_index::test_support::FixedEmbedder;
    use crate::tracking::StudentProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Completion service that records prompts and echoes a fixed answer.
    #[derive(Default)]
    struct ScriptedCompletion {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<Option<String>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                return Err(SporError::OpenAI("connection reset".to_string()));
            }
            Ok(Some("scripted answer".to_string()))
        }
    }

    /// Index that counts calls and can be unreachable.
    struct CountingIndex {
        reachable: bool,
        distance: f32,
        calls: AtomicUsize,
    }

    impl CountingIndex {
        fn new(reachable: bool, distance: f32) -> Self {
            Self {
                reachable,
                distance,
                calls: AtomicUsize::new(0),
            }
        }

        fn hit(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reachable {
                Ok(())
            } else {
                Err(SporError::SemanticIndex("connection refused".to_string()))
            }
        }
    }

    #[async_trait]
    impl SemanticIndex for CountingIndex {
        async fn heartbeat(&self) -> Result<()> {
            self.hit()
        }

        async fn collection_exists(&self, _owner_id: &str) -> Result<bool> {
            self.hit().map(|_| true)
        }

        async fn get_or_create_collection(&self, owner_id: &str) -> Result<CollectionHandle> {
            self.hit().map(|_| CollectionHandle::local(owner_id))
        }

        async fn has_document(&self, _c: &CollectionHandle, _video_id: &str) -> Result<bool> {
            self.hit().map(|_| true)
        }

        async fn query_nearest(
            &self,
            _c: &CollectionHandle,
            _text: &str,
            _limit: usize,
        ) -> Result<NearestMatches> {
            self.hit()?;
            Ok(NearestMatches {
                documents: vec!["the indexed lecture segment".to_string()],
                distances: vec![self.distance],
            })
        }

        async fn upsert_document(&self, _c: &CollectionHandle, _v: &str, _t: &str) -> Result<()> {
            self.hit()
        }

        async fn delete_document(&self, _c: &CollectionHandle, _v: &str) -> Result<bool> {
            self.hit().map(|_| true)
        }
    }

    struct FailingTracker;

    #[async_trait]
    impl QuestionTracker for FailingTracker {
        async fn record_question_asked(&self, _s: &str, _v: &str) -> Result<()> {
            Err(SporError::Tracking("database is locked".to_string()))
        }

        async fn progress_for_student(&self, _s: &str) -> Result<Vec<StudentProgress>> {
            Ok(Vec::new())
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        completion: Arc<ScriptedCompletion>,
        tracker: Arc<SqliteProgressTracker>,
    }

    fn harness_with(index: Arc<dyn SemanticIndex>, completion: ScriptedCompletion) -> Harness {
        let completion = Arc::new(completion);
        let tracker = Arc::new(SqliteProgressTracker::in_memory().unwrap());
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(SqliteCatalog::in_memory().unwrap()),
            index,
            tracker.clone(),
            completion.clone(),
        );
        Harness {
            orchestrator,
            completion,
            tracker,
        }
    }

    fn numbered_transcript(words: usize) -> String {
        (0..words).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn last_prompt(harness: &Harness) -> String {
        harness.completion.prompts.lock().unwrap().last().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_proximity_question_uses_word_window() {
        let h = harness_with(Arc::new(CountingIndex::new(true, 0.3)), ScriptedCompletion::default());
        let transcript = numbered_transcript(1000);
        h.orchestrator
            .add_video(&Video::new("v1", "t1", "Lecture", transcript, 400.0), false)
            .await
            .unwrap();

        let result = h
            .orchestrator
            .answer_question(&Query::proximity("v1", "What came first?", Some(40.0)), None)
            .await
            .unwrap();

        let expected = numbered_transcript(200);
        assert!(last_prompt(&h).contains(&format!("Context: {}\nQuestion:", expected)));
        assert_eq!(result.search_type, "near");
        assert!(!result.using_semantic_index);
        assert_eq!(result.context_source, ContextSource::Proximity);
    }

    #[tokio::test]
    async fn test_empty_transcript_with_unreachable_index_uses_sentinel() {
        let index = Arc::new(CountingIndex::new(false, 0.3));
        let h = harness_with(index, ScriptedCompletion::default());
        h.orchestrator
            .add_video(&Video::new("v1", "t1", "Silent", "", 60.0), true)
            .await
            .unwrap();

        let result = h
            .orchestrator
            .answer_question(&Query::semantic("v1", "What is this about?"), None)
            .await
            .unwrap();

        assert!(last_prompt(&h).contains(&format!("Context: {}\n", NO_TRANSCRIPT_SENTINEL)));
        assert_eq!(result.answer, "scripted answer");
        assert!(!result.using_semantic_index);
        assert_eq!(result.context_source, ContextSource::SemanticFallbackFull);
    }

    #[tokio::test]
    async fn test_relevant_semantic_match_is_used() {
        let h = harness_with(Arc::new(CountingIndex::new(true, 0.3)), ScriptedCompletion::default());
        h.orchestrator
            .add_video(&Video::new("v1", "t1", "Lecture", "the whole transcript", 60.0), false)
            .await
            .unwrap();

        let result = h
            .orchestrator
            .answer_question(&Query::semantic("v1", "Explain the segment"), None)
            .await
            .unwrap();

        assert!(last_prompt(&h).contains("Context: the indexed lecture segment\n"));
        assert!(result.using_semantic_index);
        assert_eq!(result.search_type, "general");
        assert_eq!(result.context_source, ContextSource::SemanticIndex);
    }

    #[tokio::test]
    async fn test_search_type_is_echoed_as_sent() {
        let h = harness_with(Arc::new(CountingIndex::new(true, 0.3)), ScriptedCompletion::default());
        h.orchestrator
            .add_video(&Video::new("v1", "t1", "Lecture", "some lecture words", 60.0), false)
            .await
            .unwrap();

        let mut query = Query::proximity("v1", "What was that?", Some(1.0));
        query.requested_search_type = Some("proximity".to_string());
        let result = h.orchestrator.answer_question(&query, None).await.unwrap();
        assert_eq!(result.search_type, "proximity");
        assert_eq!(result.context_source, ContextSource::Proximity);

        let mut query = Query::semantic("v1", "What was that?");
        query.requested_search_type = Some("everywhere".to_string());
        let result = h.orchestrator.answer_question(&query, None).await.unwrap();
        assert_eq!(result.search_type, "everywhere");
    }

    #[tokio::test]
    async fn test_irrelevant_match_falls_back_but_index_was_used() {
        let h = harness_with(Arc::new(CountingIndex::new(true, 1.7)), ScriptedCompletion::default());
        h.orchestrator
            .add_video(&Video::new("v1", "t1", "Lecture", "the whole transcript", 60.0), false)
            .await
            .unwrap();

        let result = h
            .orchestrator
            .answer_question(&Query::semantic("v1", "Unrelated?"), None)
            .await
            .unwrap();

        assert!(last_prompt(&h).contains("Context: the whole transcript\n"));
        assert!(result.using_semantic_index);
        assert_eq!(result.context_source, ContextSource::SemanticFallbackFull);
    }

    #[tokio::test]
    async fn test_unknown_video_touches_nothing() {
        let index = Arc::new(CountingIndex::new(true, 0.3));
        let h = harness_with(index.clone(), ScriptedCompletion::default());

        let err = h
            .orchestrator
            .answer_question(&Query::semantic("missing", "Anyone there?"), Some("s1"))
            .await
            .unwrap_err();

        assert!(matches!(err, SporError::VideoNotFound(id) if id == "missing"));
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
        assert!(h.completion.prompts.lock().unwrap().is_empty());
        assert!(h.tracker.progress_for_student("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_terminal() {
        let completion = ScriptedCompletion {
            fail: true,
            ..Default::default()
        };
        let h = harness_with(Arc::new(CountingIndex::new(true, 0.3)), completion);
        h.orchestrator
            .add_video(&Video::new("v1", "t1", "Lecture", "text", 60.0), false)
            .await
            .unwrap();

        let err = h
            .orchestrator
            .answer_question(&Query::semantic("v1", "Why?"), Some("s1"))
            .await
            .unwrap_err();

        assert!(matches!(err, SporError::SynthesisFailed(_)));
        assert!(h.tracker.progress_for_student("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_questions_are_tracked_per_student() {
        let h = harness_with(Arc::new(CountingIndex::new(true, 0.3)), ScriptedCompletion::default());
        h.orchestrator
            .add_video(&Video::new("v1", "t1", "Lecture", "text", 60.0), false)
            .await
            .unwrap();

        let query = Query::proximity("v1", "What now?", Some(1.0));
        h.orchestrator.answer_question(&query, Some("s1")).await.unwrap();
        h.orchestrator.answer_question(&query, Some("s1")).await.unwrap();
        h.orchestrator.answer_question(&query, None).await.unwrap();

        let progress = h.tracker.progress_for_student("s1").await.unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].questions_asked, 2);
    }

    #[tokio::test]
    async fn test_tracking_failure_does_not_affect_answer() {
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(SqliteCatalog::in_memory().unwrap()),
            Arc::new(CountingIndex::new(true, 0.3)),
            Arc::new(FailingTracker),
            Arc::new(ScriptedCompletion::default()),
        );
        orchestrator
            .add_video(&Video::new("v1", "t1", "Lecture", "text", 60.0), false)
            .await
            .unwrap();

        let result = orchestrator
            .answer_question(&Query::semantic("v1", "Still works?"), Some("s1"))
            .await
            .unwrap();
        assert_eq!(result.answer, "scripted answer");
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let h = harness_with(Arc::new(CountingIndex::new(true, 0.3)), ScriptedCompletion::default());
        let err = h
            .orchestrator
            .answer_question(&Query::semantic("v1", "   "), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SporError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_add_index_and_remove_video() {
        let embedder = Arc::new(FixedEmbedder::new(&[
            ("momentum is conserved in collisions", vec![1.0, 0.0, 0.0]),
            ("what is conserved?", vec![0.9, 0.0, 0.1]),
        ]));
        let index = Arc::new(MemorySemanticIndex::new(embedder));
        let h = harness_with(index.clone(), ScriptedCompletion::default());

        let video = Video::new("v1", "t1", "Collisions", "momentum is conserved in collisions", 90.0);
        let added = h.orchestrator.add_video(&video, true).await.unwrap();
        assert!(added.indexed);
        assert_eq!(added.word_count, 5);

        let result = h
            .orchestrator
            .answer_question(&Query::semantic("v1", "what is conserved?"), None)
            .await
            .unwrap();
        assert_eq!(result.context_source, ContextSource::SemanticIndex);

        h.orchestrator.remove_video("v1").await.unwrap();
        let collection = index.get_or_create_collection("t1").await.unwrap();
        assert!(!index.has_document(&collection, "v1").await.unwrap());
        assert!(h.orchestrator.catalog().get_video("v1").await.unwrap().is_none());

        let err = h.orchestrator.remove_video("v1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_add_video_survives_index_failure() {
        let h = harness_with(Arc::new(CountingIndex::new(false, 0.3)), ScriptedCompletion::default());
        let added = h
            .orchestrator
            .add_video(&Video::new("v1", "t1", "Lecture", "some words", 60.0), true)
            .await
            .unwrap();

        assert!(!added.indexed);
        assert!(h.orchestrator.catalog().get_video("v1").await.unwrap().is_some());
    }
}
