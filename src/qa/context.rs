//! Context resolution for question answering.
//!
//! Resolution walks an ordered list of [`Strategy`] values chosen from the
//! query mode and index availability. Each strategy either yields a
//! [`ContextResult`] or passes to the next one; the last strategy in every
//! list always yields. The result then goes through an empty-text guard.
//! Nothing in this module returns an error to its caller.

use super::{Query, SearchMode};
use crate::catalog::Video;
use crate::config::RetrievalSettings;
use crate::error::Result;
use crate::semantic_index::SemanticIndex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Context handed to the model when no transcript text is available.
pub const NO_TRANSCRIPT_SENTINEL: &str = "No transcript available for this video.";

/// Nearest-neighbour results requested per semantic lookup.
const SEMANTIC_TOP_K: usize = 1;

/// Where resolved context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSource {
    Proximity,
    SemanticIndex,
    SemanticFallbackFull,
    Empty,
}

/// Resolved context text and its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextResult {
    pub text: String,
    pub source: ContextSource,
}

impl ContextResult {
    fn new(text: impl Into<String>, source: ContextSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }

    /// Replace empty or whitespace-only text with [`NO_TRANSCRIPT_SENTINEL`].
    pub fn guard_empty(mut self) -> Self {
        if self.text.trim().is_empty() {
            self.text = NO_TRANSCRIPT_SENTINEL.to_string();
        }
        self
    }
}

/// One step in the context fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Window of words around the playback position. Always yields.
    Proximity,
    /// Best semantic match below the relevance threshold. May pass.
    SemanticIndex,
    /// The whole transcript. Always yields.
    FullTranscript,
}

impl Strategy {
    /// Ordered strategies for a query mode.
    pub fn chain(mode: SearchMode, index_available: bool) -> &'static [Strategy] {
        match (mode, index_available) {
            (SearchMode::Proximity, _) => &[Strategy::Proximity],
            (SearchMode::Semantic, true) => &[Strategy::SemanticIndex, Strategy::FullTranscript],
            (SearchMode::Semantic, false) => &[Strategy::FullTranscript],
        }
    }
}

/// Words of `transcript` around the position reached after `playback_time_seconds`.
///
/// The centre word is `floor(t * words_per_second)`; the window starts
/// `words_before` words earlier (clamped at 0) and holds at most
/// `window_words` words joined by single spaces.
pub fn proximity_window(
    transcript: &str,
    playback_time_seconds: f64,
    settings: &RetrievalSettings,
) -> String {
    let center = (playback_time_seconds * settings.words_per_second).floor();
    // NaN and negative positions clamp to the first word
    let center = if center > 0.0 { center as usize } else { 0 };
    let start = center.saturating_sub(settings.words_before);

    transcript
        .split_whitespace()
        .skip(start)
        .take(settings.window_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Chooses the transcript context for a question.
pub struct ContextResolver {
    index: Arc<dyn SemanticIndex>,
    settings: RetrievalSettings,
    query_timeout: Duration,
}

impl ContextResolver {
    /// Create a resolver over a long-lived index handle.
    pub fn new(index: Arc<dyn SemanticIndex>, settings: RetrievalSettings) -> Self {
        Self {
            index,
            settings,
            query_timeout: Duration::from_secs(10),
        }
    }

    /// Bound the total time spent on one semantic lookup.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Proximity window for a transcript and playback time.
    pub fn resolve_proximity_context(&self, transcript: &str, playback_time_seconds: f64) -> String {
        proximity_window(transcript, playback_time_seconds, &self.settings)
    }

    /// Best semantic match for the question, or `fallback` unchanged.
    pub async fn resolve_semantic_context(
        &self,
        owner_id: &str,
        video_id: &str,
        question: &str,
        fallback: &str,
    ) -> String {
        self.semantic_match(owner_id, video_id, question)
            .await
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Resolve context for a query against a loaded video.
    #[instrument(skip(self, query, video), fields(video_id = %video.id, mode = %query.mode))]
    pub async fn resolve(&self, query: &Query, video: &Video, index_available: bool) -> ContextResult {
        let mut resolved = None;
        for strategy in Strategy::chain(query.mode, index_available) {
            if let Some(result) = self.apply(*strategy, query, video).await {
                resolved = Some(result);
                break;
            }
            debug!("{:?} strategy yielded nothing, trying next", strategy);
        }

        let result = resolved.unwrap_or_else(|| ContextResult::new("", ContextSource::Empty));
        if result.text.trim().is_empty() {
            warn!("No transcript available for video {}", video.id);
        }
        info!(
            source = ?result.source,
            context_len = result.text.len(),
            "Resolved question context"
        );
        result.guard_empty()
    }

    async fn apply(&self, strategy: Strategy, query: &Query, video: &Video) -> Option<ContextResult> {
        match strategy {
            Strategy::Proximity => {
                // Absent playback time is treated as the start of the video
                let time = query.playback_time_seconds.unwrap_or(0.0);
                let window = self.resolve_proximity_context(&video.transcript, time);
                let source = if window.is_empty() {
                    ContextSource::Empty
                } else {
                    ContextSource::Proximity
                };
                Some(ContextResult::new(window, source))
            }
            Strategy::SemanticIndex => self
                .semantic_match(&video.teacher_id, &video.id, &query.question)
                .await
                .map(|text| ContextResult::new(text, ContextSource::SemanticIndex)),
            Strategy::FullTranscript => Some(ContextResult::new(
                video.transcript.clone(),
                ContextSource::SemanticFallbackFull,
            )),
        }
    }

    /// Relevant indexed text, or `None` for any miss, failure or timeout.
    async fn semantic_match(&self, owner_id: &str, video_id: &str, question: &str) -> Option<String> {
        match tokio::time::timeout(self.query_timeout, self.lookup(owner_id, video_id, question)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!("Semantic index query failed, using full transcript: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Semantic index query timed out after {:?}, using full transcript",
                    self.query_timeout
                );
                None
            }
        }
    }

    async fn lookup(&self, owner_id: &str, video_id: &str, question: &str) -> Result<Option<String>> {
        let collection = self.index.get_or_create_collection(owner_id).await?;

        if !self.index.has_document(&collection, video_id).await? {
            info!("Video {} not in collection {}, using full transcript", video_id, collection.name);
            return Ok(None);
        }

        let matches = self
            .index
            .query_nearest(&collection, question, SEMANTIC_TOP_K)
            .await?;

        let Some(distance) = matches.closest_distance().filter(|_| !matches.is_empty()) else {
            info!("Semantic index returned no results for video {}", video_id);
            return Ok(None);
        };

        if distance < self.settings.relevance_threshold {
            debug!(distance, "Using relevant semantic match");
            Ok(Some(matches.joined_documents()))
        } else {
            info!(
                distance,
                threshold = self.settings.relevance_threshold,
                "Semantic match not relevant enough, using full transcript"
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SporError;
    use crate::semantic_index::{CollectionHandle, NearestMatches};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Index stub with a fixed answer for every query.
    struct StubIndex {
        has_document: bool,
        matches: NearestMatches,
        fail_query: bool,
        delay: Option<Duration>,
        queries: AtomicUsize,
    }

    impl StubIndex {
        fn with_match(document: &str, distance: f32) -> Self {
            Self {
                has_document: true,
                matches: NearestMatches {
                    documents: vec![document.to_string()],
                    distances: vec![distance],
                },
                fail_query: false,
                delay: None,
                queries: AtomicUsize::new(0),
            }
        }

        fn missing_document() -> Self {
            Self {
                has_document: false,
                ..Self::with_match("unused", 0.0)
            }
        }
    }

    #[async_trait]
    impl SemanticIndex for StubIndex {
        async fn heartbeat(&self) -> Result<()> {
            Ok(())
        }

        async fn collection_exists(&self, _owner_id: &str) -> Result<bool> {
            Ok(true)
        }

        async fn get_or_create_collection(&self, owner_id: &str) -> Result<CollectionHandle> {
            Ok(CollectionHandle::local(owner_id))
        }

        async fn has_document(&self, _c: &CollectionHandle, _video_id: &str) -> Result<bool> {
            Ok(self.has_document)
        }

        async fn query_nearest(
            &self,
            _c: &CollectionHandle,
            _text: &str,
            limit: usize,
        ) -> Result<NearestMatches> {
            assert_eq!(limit, 1);
            self.queries.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_query {
                return Err(SporError::SemanticIndex("connection refused".to_string()));
            }
            Ok(self.matches.clone())
        }

        async fn upsert_document(&self, _c: &CollectionHandle, _v: &str, _t: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_document(&self, _c: &CollectionHandle, _v: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn resolver(index: StubIndex) -> ContextResolver {
        ContextResolver::new(Arc::new(index), RetrievalSettings::default())
    }

    fn numbered_transcript(words: usize) -> String {
        (0..words).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_proximity_window_at_start() {
        let transcript = numbered_transcript(1000);
        let window = proximity_window(&transcript, 0.0, &RetrievalSettings::default());
        let words: Vec<&str> = window.split(' ').collect();
        assert_eq!(words.len(), 200);
        assert_eq!(words[0], "w0");
        assert_eq!(words[199], "w199");
    }

    #[test]
    fn test_proximity_window_centered() {
        let transcript = numbered_transcript(1000);
        // 100s * 2.5 = word 250, window starts at 150
        let window = proximity_window(&transcript, 100.0, &RetrievalSettings::default());
        let words: Vec<&str> = window.split(' ').collect();
        assert_eq!(words.len(), 200);
        assert_eq!(words[0], "w150");
        assert_eq!(words[199], "w349");
    }

    #[test]
    fn test_proximity_window_counts() {
        let settings = RetrievalSettings::default();
        let transcript = numbered_transcript(300);
        for t in [0.0, 10.0, 40.0, 75.5, 100.0, 119.9, 160.0, 500.0] {
            let center = (t * settings.words_per_second).floor() as usize;
            let start = center.saturating_sub(100);
            let expected = 200usize.min(300usize.saturating_sub(start));

            let window = proximity_window(&transcript, t, &settings);
            let count = window.split_whitespace().count();
            assert_eq!(count, expected, "t = {}", t);
            assert!(transcript.contains(&window), "window must be contiguous");
        }
    }

    #[test]
    fn test_proximity_window_edge_inputs() {
        let settings = RetrievalSettings::default();
        assert_eq!(proximity_window("", 0.0, &settings), "");
        assert_eq!(proximity_window("", 500.0, &settings), "");
        assert_eq!(proximity_window("   \n\t ", 3.0, &settings), "");
        assert_eq!(proximity_window("a  b\n\nc", -20.0, &settings), "a b c");
        assert_eq!(proximity_window("a b c", f64::NAN, &settings), "a b c");
    }

    #[test]
    fn test_proximity_window_tunable() {
        let settings = RetrievalSettings {
            words_per_second: 1.0,
            words_before: 2,
            window_words: 3,
            relevance_threshold: 1.5,
        };
        assert_eq!(proximity_window("a b c d e f g", 4.0, &settings), "c d e");
    }

    #[test]
    fn test_strategy_chains() {
        assert_eq!(Strategy::chain(SearchMode::Proximity, true), &[Strategy::Proximity]);
        assert_eq!(Strategy::chain(SearchMode::Proximity, false), &[Strategy::Proximity]);
        assert_eq!(
            Strategy::chain(SearchMode::Semantic, true),
            &[Strategy::SemanticIndex, Strategy::FullTranscript]
        );
        assert_eq!(Strategy::chain(SearchMode::Semantic, false), &[Strategy::FullTranscript]);
    }

    #[tokio::test]
    async fn test_semantic_missing_document_returns_fallback() {
        let resolver = resolver(StubIndex::missing_document());
        let context = resolver
            .resolve_semantic_context("t1", "v1", "why?", "  the full transcript ")
            .await;
        assert_eq!(context, "  the full transcript ");
    }

    #[tokio::test]
    async fn test_semantic_relevance_gate() {
        let close = resolver(StubIndex::with_match("matched chunk", 1.49));
        assert_eq!(
            close.resolve_semantic_context("t1", "v1", "q", "full").await,
            "matched chunk"
        );

        let at_threshold = resolver(StubIndex::with_match("matched chunk", 1.5));
        assert_eq!(at_threshold.resolve_semantic_context("t1", "v1", "q", "full").await, "full");

        let far = resolver(StubIndex::with_match("matched chunk", 2.7));
        assert_eq!(far.resolve_semantic_context("t1", "v1", "q", "full").await, "full");
    }

    #[tokio::test]
    async fn test_semantic_empty_results_and_errors_fall_back() {
        let mut empty = StubIndex::with_match("x", 0.1);
        empty.matches = NearestMatches::default();
        assert_eq!(resolver(empty).resolve_semantic_context("t", "v", "q", "full").await, "full");

        let mut failing = StubIndex::with_match("x", 0.1);
        failing.fail_query = true;
        assert_eq!(resolver(failing).resolve_semantic_context("t", "v", "q", "full").await, "full");
    }

    #[tokio::test]
    async fn test_semantic_timeout_falls_back() {
        let mut slow = StubIndex::with_match("late chunk", 0.1);
        slow.delay = Some(Duration::from_secs(5));
        let resolver = resolver(slow).with_query_timeout(Duration::from_millis(20));
        assert_eq!(resolver.resolve_semantic_context("t", "v", "q", "full").await, "full");
    }

    #[tokio::test]
    async fn test_multiple_documents_are_joined() {
        let mut stub = StubIndex::with_match("a", 0.2);
        stub.matches = NearestMatches {
            documents: vec!["part one".to_string(), "part two".to_string()],
            distances: vec![0.2, 0.2],
        };
        assert_eq!(
            resolver(stub).resolve_semantic_context("t", "v", "q", "full").await,
            "part one\n\npart two"
        );
    }

    #[tokio::test]
    async fn test_resolve_proximity_empty_transcript() {
        let resolver = resolver(StubIndex::with_match("x", 0.1));
        let video = Video::new("v1", "t1", "Empty", "", 60.0);
        let result = resolver
            .resolve(&Query::proximity("v1", "q", Some(30.0)), &video, true)
            .await;
        assert_eq!(result.source, ContextSource::Empty);
        assert_eq!(result.text, NO_TRANSCRIPT_SENTINEL);
    }

    #[tokio::test]
    async fn test_resolve_proximity_without_time_starts_at_zero() {
        let resolver = resolver(StubIndex::with_match("x", 0.1));
        let video = Video::new("v1", "t1", "Long", numbered_transcript(500), 200.0);
        let result = resolver
            .resolve(&Query::proximity("v1", "q", None), &video, false)
            .await;
        assert_eq!(result.source, ContextSource::Proximity);
        assert!(result.text.starts_with("w0 w1 "));
        assert!(result.text.ends_with(" w199"));
    }

    #[tokio::test]
    async fn test_resolve_semantic_uses_index_match() {
        let stub = StubIndex::with_match("indexed text", 0.3);
        let resolver = resolver(stub);
        let video = Video::new("v1", "t1", "Video", "full transcript", 60.0);
        let result = resolver.resolve(&Query::semantic("v1", "q"), &video, true).await;
        assert_eq!(result, ContextResult::new("indexed text", ContextSource::SemanticIndex));
    }

    #[tokio::test]
    async fn test_resolve_semantic_falls_back_to_full_transcript() {
        let video = Video::new("v1", "t1", "Video", "full transcript", 60.0);

        let irrelevant = resolver(StubIndex::with_match("indexed text", 1.9));
        let result = irrelevant.resolve(&Query::semantic("v1", "q"), &video, true).await;
        assert_eq!(result, ContextResult::new("full transcript", ContextSource::SemanticFallbackFull));

        let index = Arc::new(StubIndex::with_match("indexed text", 0.3));
        let unavailable = ContextResolver::new(index.clone(), RetrievalSettings::default());
        let result = unavailable.resolve(&Query::semantic("v1", "q"), &video, false).await;
        assert_eq!(result.source, ContextSource::SemanticFallbackFull);
        assert_eq!(index.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_semantic_whitespace_transcript_gets_sentinel() {
        let resolver = resolver(StubIndex::missing_document());
        let video = Video::new("v1", "t1", "Video", " \n ", 60.0);
        let result = resolver.resolve(&Query::semantic("v1", "q"), &video, true).await;
        assert_eq!(result.text, NO_TRANSCRIPT_SENTINEL);
        assert_eq!(result.source, ContextSource::SemanticFallbackFull);
    }
}
