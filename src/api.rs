//! LLM classification with exponential backoff retry logic.
//!
//! This module turns an [`Article`] into an [`AnalysisResult`] by asking an
//! OpenAI-compatible LLM (through `awful_aj`) for a JSON verdict.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`AwfulAsk`]: adapts `awful_aj::api::ask` to [`AskAsync`]
//! - [`RetryAsk`]: decorator that adds retry logic to any [`AskAsync`]
//! - [`Classifier`]: the seam the report pipeline depends on
//! - [`LlmClassifier`]: prompt building, timeout and strict reply parsing
//!
//! # Retry Strategy
//!
//! - Bounded retry attempts (3 in production)
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//!
//! The whole classification, retries included, is bounded by one timeout.

use crate::error::ClassificationError;
use crate::models::{AnalysisResult, Article};
use crate::regions::RegionConfig;
use crate::utils::{looks_truncated, truncate_for_log};
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like retry logic).
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = AwfulAsk::new(config, template);
    /// let retry_client = RetryAsk::new(client, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Adapts `awful_aj::api::ask` to [`AskAsync`].
///
/// Owns the LLM configuration (endpoint, key, model) and the chat template
/// that carries the system prompt and response format.
#[derive(Debug)]
pub struct AwfulAsk {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl AwfulAsk {
    pub fn new(config: AwfulJadeConfig, template: ChatTemplate) -> Self {
        Self { config, template }
    }
}

impl AskAsync for AwfulAsk {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;
        let dt = t0.elapsed();

        if let Err(e) = &res {
            warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed");
        }
        res
    }
}

/// Classifies article content. Fallible and possibly slow; has no effect on
/// watermark state.
pub trait Classifier {
    async fn classify(
        &self,
        region: &RegionConfig,
        article: &Article,
    ) -> Result<AnalysisResult, ClassificationError>;
}

/// [`Classifier`] backed by an LLM reachable through [`AskAsync`].
#[derive(Debug)]
pub struct LlmClassifier<A> {
    asker: A,
    timeout: StdDuration,
}

impl<A> LlmClassifier<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(asker: A, timeout: StdDuration) -> Self {
        Self { asker, timeout }
    }

    async fn ask_bounded(&self, prompt: &str) -> Result<String, ClassificationError> {
        match timeout(self.timeout, self.asker.ask(prompt)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(ClassificationError::Request(e.to_string())),
            Err(_) => Err(ClassificationError::Timeout(self.timeout)),
        }
    }
}

impl<A> Classifier for LlmClassifier<A>
where
    A: AskAsync<Response = String>,
{
    #[instrument(level = "info", skip_all, fields(region = %region.name(), url = %article.url))]
    async fn classify(
        &self,
        region: &RegionConfig,
        article: &Article,
    ) -> Result<AnalysisResult, ClassificationError> {
        let t0 = Instant::now();
        let prompt = build_prompt(region, article);
        let reply = self.ask_bounded(&prompt).await?;

        // Re-ask once when the reply was cut off mid-JSON
        let parsed = match decode_analysis(&reply) {
            Err(e) if looks_truncated(&e) => {
                warn!(error = %e, "EOF while parsing; re-asking once");
                let retry = self.ask_bounded(&prompt).await?;
                decode_analysis(&retry).map_err(|e| (e, retry))
            }
            other => other.map_err(|e| (e, reply)),
        };

        let analysis = match parsed {
            Ok(analysis) => analysis,
            Err((e, raw)) => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(&raw, 300),
                    "Model returned non-conforming JSON"
                );
                return Err(ClassificationError::Malformed(e.to_string()));
            }
        };
        let analysis = validate(analysis)?;

        info!(
            rank = %analysis.rank,
            is_banner = analysis.is_banner,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Article classified"
        );
        Ok(analysis)
    }
}

/// User message sent to the LLM. The chat template supplies the system prompt.
pub fn build_prompt(region: &RegionConfig, article: &Article) -> String {
    let title = article.title.as_deref().unwrap_or("(без заголовка)");
    format!(
        "Ты — главный аналитик Tracen Intelligence.\n\
         РЕГИОН: {region}\n\
         Заголовок: {title}\n\
         Текст: {text}\n\n\
         ЗАДАЧА:\n\
         1. Определи Ранг (S/A/B/C).\n\
         2. Это баннер или важный слив? (true/false).\n\
         3. Если это Глобал, вспомни, как это было в Японии (если можешь).\n\
         4. Сделай подробный разбор на русском.\n\n\
         ВЕРНИ только JSON:\n\
         {{\"rank\": \"...\", \"title\": \"...\", \"is_banner\": false, \
         \"summary\": \"...\", \"details\": \"...\", \"future\": \"...\", \"verdict\": \"...\"}}",
        region = region.name(),
        title = title,
        text = article.text,
    )
}

/// Deserialize an LLM reply, ignoring code fences and chatter around the
/// JSON object.
pub fn decode_analysis(raw: &str) -> Result<AnalysisResult, serde_json::Error> {
    serde_json::from_str(json_object_slice(raw))
}

fn json_object_slice(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        (Some(start), _) => &trimmed[start..],
        _ => trimmed,
    }
}

fn validate(mut analysis: AnalysisResult) -> Result<AnalysisResult, ClassificationError> {
    for field in [
        &mut analysis.title,
        &mut analysis.summary,
        &mut analysis.details,
        &mut analysis.future,
        &mut analysis.verdict,
    ] {
        *field = field.trim().to_string();
    }
    if analysis.title.is_empty() && analysis.summary.is_empty() {
        return Err(ClassificationError::Malformed(
            "reply has neither title nor summary".to_string(),
        ));
    }
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rank;
    use crate::regions::Region;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Replays canned replies; `Err` entries simulate API failures.
    #[derive(Debug, Default)]
    struct ScriptedAsk {
        replies: RefCell<VecDeque<Result<String, String>>>,
        calls: Cell<usize>,
    }

    impl ScriptedAsk {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: RefCell::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: Cell::new(0),
            }
        }
    }

    impl AskAsync for ScriptedAsk {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, Box<dyn Error>> {
            self.calls.set(self.calls.get() + 1);
            match self.replies.borrow_mut().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(e)) => Err(e.into()),
                None => Err("no scripted reply left".into()),
            }
        }
    }

    #[derive(Debug)]
    struct SlowAsk;

    impl AskAsync for SlowAsk {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, Box<dyn Error>> {
            sleep(StdDuration::from_secs(5)).await;
            Ok("{}".to_string())
        }
    }

    const GOOD_REPLY: &str = r#"{"rank": "S", "title": "Новый сценарий", "is_banner": true,
        "summary": "Кратко", "details": "Подробно", "future": "Прогноз", "verdict": "Крутить"}"#;

    fn region() -> RegionConfig {
        RegionConfig::default_for(Region::Japan)
    }

    fn article() -> Article {
        Article {
            url: "https://umamusume.jp/news/detail.php?id=1".to_string(),
            title: Some("新シナリオ".to_string()),
            text: "本文".to_string(),
        }
    }

    #[test]
    fn test_decode_plain_json() {
        let analysis = decode_analysis(GOOD_REPLY).unwrap();
        assert_eq!(analysis.rank, Rank::S);
        assert!(analysis.is_banner);
        assert_eq!(analysis.verdict, "Крутить");
    }

    #[test]
    fn test_decode_strips_code_fence() {
        let fenced = format!("Вот ответ:\n```json\n{GOOD_REPLY}\n```");
        let analysis = decode_analysis(&fenced).unwrap();
        assert_eq!(analysis.title, "Новый сценарий");
    }

    #[test]
    fn test_decode_truncated_is_eof() {
        let err = decode_analysis(r#"{"rank": "A", "title": "Cut"#).unwrap_err();
        assert!(looks_truncated(&err));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let analysis = decode_analysis(r#"{"rank": "B", "title": "  ", "summary": ""}"#).unwrap();
        assert!(matches!(validate(analysis), Err(ClassificationError::Malformed(_))));
    }

    #[test]
    fn test_prompt_mentions_region_and_text() {
        let prompt = build_prompt(&region(), &article());
        assert!(prompt.contains("РЕГИОН: Japan"));
        assert!(prompt.contains("新シナリオ"));
        assert!(prompt.contains("本文"));
    }

    #[tokio::test]
    async fn test_classify_success() {
        let classifier = LlmClassifier::new(
            ScriptedAsk::new(vec![Ok(GOOD_REPLY)]),
            StdDuration::from_secs(5),
        );
        let analysis = classifier.classify(&region(), &article()).await.unwrap();
        assert_eq!(analysis.rank, Rank::S);
        assert_eq!(analysis.summary, "Кратко");
    }

    #[tokio::test]
    async fn test_classify_reasks_once_on_truncation() {
        let asker = ScriptedAsk::new(vec![Ok(r#"{"rank": "A", "tit"#), Ok(GOOD_REPLY)]);
        let classifier = LlmClassifier::new(asker, StdDuration::from_secs(5));
        let analysis = classifier.classify(&region(), &article()).await.unwrap();
        assert_eq!(analysis.rank, Rank::S);
        assert_eq!(classifier.asker.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_classify_malformed_reply() {
        let classifier = LlmClassifier::new(
            ScriptedAsk::new(vec![Ok("I cannot help with that.")]),
            StdDuration::from_secs(5),
        );
        let err = classifier.classify(&region(), &article()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Malformed(_)));
        assert_eq!(classifier.asker.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_classify_request_error() {
        let classifier = LlmClassifier::new(
            ScriptedAsk::new(vec![Err("401 unauthorized")]),
            StdDuration::from_secs(5),
        );
        let err = classifier.classify(&region(), &article()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Request(ref m) if m.contains("401")));
    }

    #[tokio::test]
    async fn test_classify_times_out() {
        let classifier = LlmClassifier::new(SlowAsk, StdDuration::from_millis(20));
        let err = classifier.classify(&region(), &article()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let asker = ScriptedAsk::new(vec![Err("503"), Err("503"), Ok("done")]);
        let retry = RetryAsk::new(asker, 3, StdDuration::from_millis(1));
        assert_eq!(retry.ask("x").await.unwrap(), "done");
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let asker = ScriptedAsk::new(vec![Err("503"), Err("503"), Ok("late")]);
        let retry = RetryAsk::new(asker, 1, StdDuration::from_millis(1));
        assert!(retry.ask("x").await.is_err());
        assert_eq!(retry.inner.calls.get(), 2);
    }
}
