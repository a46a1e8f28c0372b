//! Structured-query answering: write a query, run it, summarize the rows.

use crate::executor::QueryExecutor;
use crate::prompts::render;
use askroute_core::{AppError, AppResult};
use askroute_llm::Generator;
use askroute_prompt::PromptDefinition;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Keywords a generated query may start with.
const ALLOWED_LEADING: &[&str] = &["SELECT", "WITH", "EXPLAIN"];

/// Keywords that must not appear anywhere outside literals and comments.
const FORBIDDEN: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "ATTACH", "DETACH", "PRAGMA",
    "VACUUM", "REINDEX",
];

pub struct SqlPath {
    generator: Arc<dyn Generator>,
    executor: Arc<dyn QueryExecutor>,
    write_prompt: PromptDefinition,
    answer_prompt: PromptDefinition,
    execution_timeout: Duration,
}

impl SqlPath {
    pub fn new(
        generator: Arc<dyn Generator>,
        executor: Arc<dyn QueryExecutor>,
        write_prompt: PromptDefinition,
        answer_prompt: PromptDefinition,
        execution_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            executor,
            write_prompt,
            answer_prompt,
            execution_timeout,
        }
    }

    /// Schema of the relational store.
    pub async fn schema_description(&self) -> AppResult<String> {
        self.bounded("Schema lookup", self.executor.get_schema_description())
            .await
    }

    /// Generate a read-only query for `question`.
    pub async fn write_query(&self, question: &str, schema: &str) -> AppResult<String> {
        let built = render(
            &self.write_prompt,
            &[("question", question), ("schema", schema)],
        )?;
        let raw = self
            .generator
            .generate(built.system.as_deref(), &built.user)
            .await?;

        let query = clean_query(&raw);
        if query.is_empty() {
            return Err(AppError::Validation(
                "Generated query is empty".to_string(),
            ));
        }
        ensure_read_only(&query)?;

        debug!("Generated query: {}", query);
        Ok(query)
    }

    /// Run `query` against the store, bounded by the execution timeout.
    #[instrument(skip(self), fields(timeout_secs = self.execution_timeout.as_secs_f64()))]
    pub async fn execute_query(&self, query: &str) -> AppResult<String> {
        ensure_read_only(query)?;
        self.bounded("Query execution", self.executor.execute_read_query(query))
            .await
    }

    /// Turn the raw result into a natural-language answer.
    pub async fn synthesize(&self, question: &str, query: &str, result: &str) -> AppResult<String> {
        let built = render(
            &self.answer_prompt,
            &[("question", question), ("query", query), ("result", result)],
        )?;
        self.generator
            .generate(built.system.as_deref(), &built.user)
            .await
    }

    /// All three steps in sequence.
    pub async fn answer_sql(&self, question: &str, schema: &str) -> AppResult<String> {
        let query = self.write_query(question, schema).await?;
        let result = self.execute_query(&query).await?;
        self.synthesize(question, &query, &result).await
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.execution_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Execution(format!(
                "{} timed out after {:.1}s",
                operation,
                self.execution_timeout.as_secs_f64()
            ))),
        }
    }
}

/// Strip Markdown code fences (with their language tag) and surrounding
/// whitespace from generated query text.
pub fn clean_query(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut opening = true;

    while let Some(pos) = rest.find("```") {
        cleaned.push_str(rest[..pos].trim_end());
        rest = &rest[pos + 3..];
        if opening {
            rest = strip_fence_tag(rest);
        }
        opening = !opening;
    }
    cleaned.push_str(rest);

    cleaned.trim().to_string()
}

/// Drop the info string after an opening fence.
///
/// A lone word on the fence line is a language tag (`sqlite`, `postgresql`)
/// unless it is itself a query keyword. On a one-line fence only `sql` is
/// treated as a tag.
fn strip_fence_tag(after_fence: &str) -> &str {
    if let Some((line, body)) = after_fence.split_once('\n') {
        let tag = line.trim();
        let is_keyword = ALLOWED_LEADING.contains(&tag.to_ascii_uppercase().as_str());
        if !tag.contains(char::is_whitespace) && !is_keyword {
            return body;
        }
    }

    match after_fence.split_once(char::is_whitespace) {
        Some((word, body)) if word.eq_ignore_ascii_case("sql") => body.trim_start(),
        _ => after_fence,
    }
}

/// Reject anything but a single read-only statement.
///
/// String literals, quoted identifiers and comments are skipped; one
/// trailing `;` is allowed.
pub fn ensure_read_only(query: &str) -> AppResult<()> {
    let words = keywords(query)?;

    let first = words
        .first()
        .ok_or_else(|| AppError::Validation("Query is empty".to_string()))?;
    if !ALLOWED_LEADING.contains(&first.as_str()) {
        return Err(AppError::Validation(format!(
            "Only read-only queries are allowed, got a statement starting with {}",
            first
        )));
    }

    if let Some(word) = words.iter().find(|w| FORBIDDEN.contains(&w.as_str())) {
        return Err(AppError::Validation(format!(
            "Query contains forbidden keyword {}",
            word
        )));
    }

    Ok(())
}

/// Upper-cased bare words of a single statement.
fn keywords(query: &str) -> AppResult<Vec<String>> {
    let mut words = Vec::new();
    let mut chars = query.chars().peekable();
    let mut terminated = false;

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        match c {
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
                continue;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                continue;
            }
            _ => {}
        }

        if terminated {
            return Err(AppError::Validation(
                "Only a single statement is allowed".to_string(),
            ));
        }

        match c {
            ';' => terminated = true,
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                if !chars.by_ref().any(|next| next == close) {
                    return Err(AppError::Validation(
                        "Query has an unterminated quote".to_string(),
                    ));
                }
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '$' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                words.push(word.to_uppercase());
            }
            _ => {}
        }
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use askroute_core::ErrorKind;

    #[test]
    fn test_clean_query_strips_fences() {
        assert_eq!(
            clean_query("```sql\nSELECT count(*) FROM users;\n```"),
            "SELECT count(*) FROM users;"
        );
        assert_eq!(clean_query("```\nSELECT 1\n```\n"), "SELECT 1");
        assert_eq!(clean_query("  SELECT 1  "), "SELECT 1");
        assert_eq!(clean_query("```SQL SELECT 1```"), "SELECT 1");
        assert_eq!(
            clean_query("```sqlite\nSELECT count(*) FROM users;\n```"),
            "SELECT count(*) FROM users;"
        );
        assert_eq!(clean_query("```postgresql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(clean_query("```select\n* FROM users\n```"), "select\n* FROM users");
    }

    #[test]
    fn test_tagged_fences_pass_read_only_check() {
        for raw in [
            "```sqlite\nSELECT count(*) FROM users;\n```",
            "```mysql\nSELECT name FROM users\n```",
            "```PostgreSQL\nWITH t AS (SELECT 1) SELECT * FROM t\n```",
        ] {
            let query = clean_query(raw);
            assert!(ensure_read_only(&query).is_ok(), "{:?}", query);
        }
    }

    #[test]
    fn test_read_only_queries_pass() {
        for query in [
            "SELECT count(*) FROM users;",
            "select name from users where name = 'drop table users'",
            "WITH recent AS (SELECT * FROM orders) SELECT count(*) FROM recent",
            "EXPLAIN QUERY PLAN SELECT * FROM users",
            "SELECT created_at, \"update\" FROM events -- DELETE later\n",
            "SELECT 1; /* trailing comment */",
            "SELECT 'it''s' AS quote",
        ] {
            ensure_read_only(query).unwrap_or_else(|e| panic!("{:?}: {}", query, e));
        }
    }

    #[test]
    fn test_writes_are_rejected() {
        for query in [
            "",
            "-- only a comment",
            "DELETE FROM users",
            "DROP TABLE users;",
            "UPDATE users SET name = 'x'",
            "INSERT INTO users VALUES (1)",
            "PRAGMA writable_schema = 1",
            "ATTACH DATABASE 'x.db' AS x",
            "REPLACE INTO users VALUES (1)",
            "WITH x AS (SELECT 1) DELETE FROM users",
            "SELECT 1; DROP TABLE users",
            "SELECT 1; SELECT 2",
            "SELECT 'unterminated",
        ] {
            let err = ensure_read_only(query).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{:?}", query);
        }
    }
}
