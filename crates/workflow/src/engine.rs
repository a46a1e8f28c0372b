//! The question-answering state machine.

use crate::rag::RagPath;
use crate::router::Router;
use crate::sql::SqlPath;
use crate::state::{Answer, Decision, PipelineState, Step};
use askroute_core::{AppError, AppResult};
use askroute_knowledge::{KnowledgeBaseManager, Retriever};
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

/// Runs one question from `Start` to `End`. Any failing step aborts the run.
pub struct WorkflowEngine {
    router: Router,
    rag: RagPath,
    sql: SqlPath,
    knowledge: Arc<KnowledgeBaseManager>,
}

impl WorkflowEngine {
    pub fn new(
        router: Router,
        rag: RagPath,
        sql: SqlPath,
        knowledge: Arc<KnowledgeBaseManager>,
    ) -> Self {
        Self {
            router,
            rag,
            sql,
            knowledge,
        }
    }

    pub async fn ask(&self, question: &str) -> AppResult<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be empty".to_string()));
        }

        let span = info_span!("ask", question_len = question.len());
        self.run(PipelineState::new(question)).instrument(span).await
    }

    async fn run(&self, mut state: PipelineState) -> AppResult<Answer> {
        let mut step = Step::Start;

        loop {
            debug!(step = step.name(), "Entering step");
            step = match step {
                Step::Start => Step::Decide,
                Step::Decide => {
                    let decision = self.router.decide(&state.question).await?;
                    debug!(step = step.name(), decision = %decision, "Routed question");
                    state.decision = Some(decision);
                    match decision {
                        Decision::Rag => Step::RagPath,
                        Decision::Sql => Step::WriteQuery,
                    }
                }
                Step::RagPath => {
                    let retriever = self.ready_retriever().await?;
                    let outcome = self.rag.answer_rag(&state.question, &retriever).await?;
                    state.context = outcome.context;
                    state.answer = Some(outcome.answer);
                    Step::End
                }
                Step::WriteQuery => {
                    let schema = self.sql.schema_description().await?;
                    state.query = Some(self.sql.write_query(&state.question, &schema).await?);
                    Step::ExecuteQuery
                }
                Step::ExecuteQuery => {
                    let query = state.query.as_deref().ok_or_else(missing("query"))?;
                    state.result = Some(self.sql.execute_query(query).await?);
                    Step::SynthesizeAnswer
                }
                Step::SynthesizeAnswer => {
                    let query = state.query.as_deref().ok_or_else(missing("query"))?;
                    let result = state.result.as_deref().ok_or_else(missing("result"))?;
                    state.answer = Some(self.sql.synthesize(&state.question, query, result).await?);
                    Step::End
                }
                Step::End => break,
            };
        }

        let answer = state.into_answer()?;
        info!("Answered via {}", answer.decision);
        Ok(answer)
    }

    /// Current snapshot, rebuilding once if it holds nothing.
    async fn ready_retriever(&self) -> AppResult<Arc<Retriever>> {
        let retriever = self.knowledge.retriever();
        if retriever.is_ready() {
            return Ok(retriever);
        }

        info!("Knowledge base not ready; rebuilding");
        let knowledge = Arc::clone(&self.knowledge);
        let retriever = tokio::task::spawn_blocking(move || knowledge.rebuild())
            .await
            .map_err(|e| AppError::Storage(format!("Rebuild task failed: {}", e)))??;

        if retriever.is_ready() {
            Ok(retriever)
        } else {
            Err(AppError::NotReady(
                "Knowledge base is empty. Ingest and process documents first.".to_string(),
            ))
        }
    }
}

fn missing(field: &'static str) -> impl FnOnce() -> AppError {
    move || AppError::Execution(format!("Workflow state is missing the {}", field))
}
