// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::BackendError;
use crate::model::{Embedding, InferenceRequest};
use crate::traits::ScoringBackend;

/// Dimension of the fallback letter-histogram embedding.
pub const HISTOGRAM_DIMENSIONS: usize = 26;

#[derive(Debug, Clone)]
enum Reply {
    Respond(Value),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
}

/// Deterministic in-process backend.
///
/// Replies come from the first rule whose needle occurs in the prompt,
/// falling back to the default reply. Without a default every unmatched
/// prompt fails. Embeddings are either a fixed batch or, by default, a
/// letter histogram per text so that similar texts get similar vectors.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use the_jury::backends::ScriptedBackend;
///
/// let judge = ScriptedBackend::new("judge-a")
///     .respond_when("refund", json!({"verdict": 0}))
///     .respond(json!({"verdict": 1}));
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    name: String,
    rules: Vec<Rule>,
    default: Option<Reply>,
    embeddings: Option<Vec<Embedding>>,
    latency: Duration,
    panics: bool,
    fail_on_calls: Vec<usize>,
    calls: Arc<AtomicUsize>,
    probe: Option<InFlightProbe>,
}

impl ScriptedBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            default: None,
            embeddings: None,
            latency: Duration::ZERO,
            panics: false,
            fail_on_calls: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            probe: None,
        }
    }

    /// Reply with `value` to every prompt no rule matches.
    pub fn respond(mut self, value: Value) -> Self {
        self.default = Some(Reply::Respond(value));
        self
    }

    /// Fail every prompt no rule matches.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.default = Some(Reply::Fail(message.into()));
        self
    }

    pub fn respond_when(mut self, needle: impl Into<String>, value: Value) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Respond(value),
        });
        self
    }

    /// Fail prompts (or embedding batches) containing `needle`.
    pub fn fail_when(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Fail(message.into()),
        });
        self
    }

    /// Fail the n-th call (1-based, counting both completions and embeddings).
    pub fn fail_on_call(mut self, call: usize) -> Self {
        self.fail_on_calls.push(call);
        self
    }

    pub fn embeddings(mut self, vectors: Vec<Embedding>) -> Self {
        self.embeddings = Some(vectors);
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Panic inside every call.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Report in-flight calls to a probe shared with other backends.
    pub fn probe(mut self, probe: InFlightProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Number of calls started so far, shared between clones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Common prologue of every call: count, probe, latency, injected failures.
    async fn begin(&self) -> Result<Option<ProbeGuard>, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = self.probe.as_ref().map(InFlightProbe::enter);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.panics {
            panic!("scripted backend '{}' panicked", self.name);
        }
        if self.fail_on_calls.contains(&call) {
            return Err(BackendError::call(format!("scripted failure on call {call}")));
        }
        Ok(guard)
    }

    fn reply_for(&self, text: &str) -> Option<&Reply> {
        self.rules
            .iter()
            .find(|rule| text.contains(rule.needle.as_str()))
            .map(|rule| &rule.reply)
            .or(self.default.as_ref())
    }
}

#[async_trait]
impl ScoringBackend for ScriptedBackend {
    async fn complete(&self, request: &InferenceRequest) -> Result<Value, BackendError> {
        let _guard = self.begin().await?;

        match self.reply_for(&request.prompt) {
            Some(Reply::Respond(value)) => Ok(value.clone()),
            Some(Reply::Fail(message)) => Err(BackendError::call(message.clone())),
            None => Err(BackendError::call(format!(
                "no scripted response for shape '{}'",
                request.expected.name
            ))),
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, BackendError> {
        let _guard = self.begin().await?;

        let injected = texts.iter().find_map(|text| {
            self.rules.iter().find_map(|rule| match &rule.reply {
                Reply::Fail(message) if text.contains(rule.needle.as_str()) => Some(message.clone()),
                _ => None,
            })
        });
        if let Some(message) = injected {
            return Err(BackendError::call(message));
        }

        match &self.embeddings {
            Some(vectors) => Ok(vectors.clone()),
            None => Ok(texts.iter().map(|text| letter_histogram(text)).collect()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Normalised a-z frequency vector of `text`; all zeros when it has no letters.
pub fn letter_histogram(text: &str) -> Embedding {
    let mut counts = vec![0.0_f32; HISTOGRAM_DIMENSIONS];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        let index = (c.to_ascii_lowercase() as u8 - b'a') as usize;
        counts[index] += 1.0;
    }

    let norm = counts.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        counts.iter_mut().for_each(|v| *v /= norm);
    }
    counts
}

/// Tracks how many calls are in flight across the backends sharing it.
#[derive(Debug, Clone, Default)]
pub struct InFlightProbe {
    inner: Arc<ProbeCounters>,
}

#[derive(Debug, Default)]
struct ProbeCounters {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightProbe {
    fn enter(&self) -> ProbeGuard {
        let now = self.inner.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Highest number of simultaneous calls observed.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.inner.current.load(Ordering::SeqCst)
    }
}

struct ProbeGuard {
    inner: Arc<ProbeCounters>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.inner.current.fetch_sub(1, Ordering::SeqCst);
    }
}
