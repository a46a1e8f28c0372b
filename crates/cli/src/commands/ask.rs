//! Ask command handler.
//!
//! Routes the question to the documents or the database and prints the answer.

use super::print_json;
use askroute_core::{config::AppConfig, AppError, AppResult};
use askroute_workflow::QaService;
use clap::Args;
use std::path::PathBuf;

/// Ask a question about your documents or database
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.get_question()?;
        tracing::debug!("Question: {}", question);

        let service = QaService::from_config(config)?;
        let answer = service.ask(&question).await?;

        if self.json {
            print_json(&serde_json::json!({
                "answer": answer.answer,
                "decision": answer.decision,
                "provider": config.provider,
                "model": config.model,
            }))?;
        } else {
            println!("{}", answer.answer);
            tracing::info!("Answered via {}", answer.decision);
        }

        Ok(())
    }

    fn get_question(&self) -> AppResult<String> {
        if let Some(question) = &self.question {
            return Ok(question.clone());
        }

        if let Some(path) = &self.file {
            return std::fs::read_to_string(path).map_err(|e| {
                AppError::Validation(format!("Failed to read question file {:?}: {}", path, e))
            });
        }

        Err(AppError::Validation("No question provided".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_question_from_argument() {
        let cmd = AskCommand {
            question: Some("How many users?".to_string()),
            file: None,
            json: false,
        };
        assert_eq!(cmd.get_question().unwrap(), "How many users?");
    }

    #[test]
    fn test_question_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("q.txt");
        std::fs::write(&path, "When was Glutt.ai founded?").unwrap();

        let cmd = AskCommand {
            question: None,
            file: Some(path),
            json: false,
        };
        assert_eq!(cmd.get_question().unwrap(), "When was Glutt.ai founded?");
    }

    #[test]
    fn test_missing_question() {
        let cmd = AskCommand {
            question: None,
            file: None,
            json: true,
        };
        assert!(cmd.get_question().is_err());
    }
}
