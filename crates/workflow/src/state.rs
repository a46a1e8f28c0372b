//! Workflow state carried through a single `ask` invocation.

use askroute_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which path answers a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Rag,
    Sql,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Rag => "rag",
            Decision::Sql => "sql",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps of the question-answering state machine.
///
/// ```text
/// Start -> Decide -rag-> RagPath -> End
///                 -sql-> WriteQuery -> ExecuteQuery -> SynthesizeAnswer -> End
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Start,
    Decide,
    RagPath,
    WriteQuery,
    ExecuteQuery,
    SynthesizeAnswer,
    End,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::Decide => "decide",
            Step::RagPath => "rag_path",
            Step::WriteQuery => "write_query",
            Step::ExecuteQuery => "execute_query",
            Step::SynthesizeAnswer => "synthesize_answer",
            Step::End => "end",
        }
    }
}

/// Per-request state. Owned by one invocation and never shared.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub question: String,
    pub decision: Option<Decision>,
    /// Grounding context retrieved on the rag path.
    pub context: Vec<String>,
    /// Cleaned query written on the sql path.
    pub query: Option<String>,
    /// Raw execution result on the sql path.
    pub result: Option<String>,
    pub answer: Option<String>,
}

impl PipelineState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    /// Terminal output. Fails if the machine stopped before producing one.
    pub fn into_answer(self) -> AppResult<Answer> {
        match (self.answer, self.decision) {
            (Some(answer), Some(decision)) => Ok(Answer { answer, decision }),
            _ => Err(AppError::Execution(
                "Workflow ended without an answer".to_string(),
            )),
        }
    }
}

/// Result of `ask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub decision: Decision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_serializes_lowercase() {
        let answer = Answer {
            answer: "42".to_string(),
            decision: Decision::Sql,
        };
        let json = serde_json::to_string(&answer).unwrap();
        assert_eq!(json, r#"{"answer":"42","decision":"sql"}"#);
    }

    #[test]
    fn test_into_answer_requires_both_fields() {
        let mut state = PipelineState::new("q");
        state.answer = Some("a".to_string());
        assert!(state.clone().into_answer().is_err());

        state.decision = Some(Decision::Rag);
        assert_eq!(state.into_answer().unwrap().decision, Decision::Rag);
    }
}
