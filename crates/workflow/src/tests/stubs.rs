//! Deterministic capability stubs and a service fixture.

use crate::executor::QueryExecutor;
use crate::prompts::PromptSet;
use crate::service::{Components, QaService};
use askroute_core::config::RagSettings;
use askroute_core::AppResult;
use askroute_knowledge::{SqliteDocumentStore, SqliteIndexStore, TrigramEmbedder};
use askroute_llm::{Classifier, Generator};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Classifier that always answers with the same raw label.
pub struct FixedLabel(pub &'static str);

#[async_trait]
impl Classifier for FixedLabel {
    async fn classify(&self, _instruction: &str, _input: &str) -> AppResult<String> {
        Ok(self.0.to_string())
    }
}

type Reply = dyn Fn(&str) -> AppResult<String> + Send + Sync;

/// Generator answering from a closure over the rendered user prompt.
pub struct ScriptedGenerator {
    reply: Box<Reply>,
    pub calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(reply: impl Fn(&str) -> AppResult<String> + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers rag prompts with the first context line mentioning `needle`,
    /// query prompts with `query`, and result prompts by restating the result.
    pub fn grounded(needle: &'static str, query: &'static str) -> Self {
        Self::new(move |prompt| {
            if prompt.contains("Generate SQL query:") {
                return Ok(query.to_string());
            }
            if let Some(result) = prompt
                .lines()
                .find_map(|line| line.strip_prefix("Query Result: "))
            {
                return Ok(format!("The query returned {}.", result));
            }
            Ok(prompt
                .lines()
                .find(|line| line.contains(needle))
                .map(|line| line.trim().to_string())
                .unwrap_or_else(|| "I don't know.".to_string()))
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _system: Option<&str>, prompt: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)(prompt)
    }
}

/// Executor returning a canned result, recording every executed query.
pub struct StubExecutor {
    result: String,
    delay: Duration,
    pub executed: Mutex<Vec<String>>,
}

impl StubExecutor {
    pub fn returning(result: &str) -> Self {
        Self {
            result: result.to_string(),
            delay: Duration::ZERO,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::returning("[]")
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for StubExecutor {
    async fn get_schema_description(&self) -> AppResult<String> {
        Ok("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)".to_string())
    }

    async fn execute_read_query(&self, query: &str) -> AppResult<String> {
        self.executed.lock().unwrap().push(query.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.result.clone())
    }
}

pub struct Harness {
    pub _temp: TempDir,
    pub service: QaService,
    pub generator: Arc<ScriptedGenerator>,
}

impl Harness {
    pub fn new(
        label: &'static str,
        generator: ScriptedGenerator,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self::with_timeout(label, generator, executor, Duration::from_secs(5))
    }

    pub fn with_timeout(
        label: &'static str,
        generator: ScriptedGenerator,
        executor: Arc<dyn QueryExecutor>,
        query_timeout: Duration,
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let generator = Arc::new(generator);
        let service = QaService::new(Components {
            documents: Arc::new(SqliteDocumentStore::in_memory().unwrap()),
            indexes: Arc::new(SqliteIndexStore::new(temp.path().join("indexes"))),
            embedder: Arc::new(TrigramEmbedder::new(256)),
            classifier: Arc::new(FixedLabel(label)),
            generator: generator.clone(),
            executor,
            prompts: PromptSet::builtin().unwrap(),
            rag: RagSettings::default(),
            query_timeout,
        });

        Self {
            _temp: temp,
            service,
            generator,
        }
    }
}
