//! In-process collaborators for tests and offline runs.

use crate::{CompressionAdapter, CompressionOutcome, OracleError, OracleRequest, TextOracle};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

type Responder = Box<dyn Fn(&str) -> Result<String, OracleError> + Send + Sync>;

/// Oracle that replays queued replies in order.
///
/// Once the queue is empty the fallback responder (if any) answers; without one
/// the call fails with [`OracleError::EmptyReply`]. Every prompt is recorded.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    fallback: Option<Responder>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// Answer every prompt with the same text.
    pub fn always(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::responder(move |_| Ok(reply.clone()))
    }

    /// Answer every prompt with `f(prompt)`.
    pub fn responder<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, OracleError> + Send + Sync + 'static,
    {
        Self {
            fallback: Some(Box::new(f)),
            ..Self::default()
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
        self.replies.lock().push_back(Ok(reply.into()));
        self
    }

    pub fn push_error(&self, error: OracleError) -> &Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl TextOracle for ScriptedOracle {
    async fn generate(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.prompts.lock().push(request.prompt.clone());
        if let Some(next) = self.replies.lock().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(f) => f(&request.prompt),
            None => Err(OracleError::EmptyReply),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Compressor with a fixed behaviour.
pub struct StaticCompressor {
    mode: CompressorMode,
    calls: AtomicUsize,
}

enum CompressorMode {
    Replace { text: String, ratio: f64 },
    Fail(String),
}

impl StaticCompressor {
    /// Always succeeds, replacing the input with `text`.
    pub fn replacing(text: &str, ratio: f64) -> Self {
        Self {
            mode: CompressorMode::Replace {
                text: text.to_string(),
                ratio,
            },
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails, handing the input back.
    pub fn failing(error: &str) -> Self {
        Self {
            mode: CompressorMode::Fail(error.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompressionAdapter for StaticCompressor {
    async fn compress(&self, text: &str, _aggressiveness: f64) -> CompressionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            CompressorMode::Replace { text: out, ratio } => {
                let original_tokens = crate::estimate_tokens(text);
                CompressionOutcome {
                    success: true,
                    compressed_text: out.clone(),
                    ratio: *ratio,
                    original_tokens,
                    compressed_tokens: crate::estimate_tokens(out),
                    error: None,
                }
            }
            CompressorMode::Fail(error) => CompressionOutcome::failed(text, error.clone()),
        }
    }
}
