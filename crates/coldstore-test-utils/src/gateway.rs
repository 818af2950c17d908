//! Scripted warehouse gateway with operation recording.
//!
//! Replies are registered up front; every call is recorded so tests can
//! assert on exactly which statements were issued.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use coldstore_archive::error::GatewayError;
use coldstore_archive::gateway::{WarehouseGateway, parse_row_count};
use coldstore_archive::query;

/// Record of a gateway call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOp {
    /// `execute_statement` call.
    Statement {
        /// Statement text.
        text: String,
    },
    /// `fetch_rows` or `fetch_row_count` call.
    Query {
        /// Query text.
        text: String,
    },
}

impl GatewayOp {
    /// The statement or query text.
    pub fn text(&self) -> &str {
        match self {
            Self::Statement { text } | Self::Query { text } => text,
        }
    }
}

/// A scripted reply to a row count query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountReply {
    /// A well-formed count.
    Rows(u64),
    /// Raw engine output, parsed like a real reply.
    Raw(String),
    /// The count query itself fails.
    Fail,
}

impl From<u64> for CountReply {
    fn from(rows: u64) -> Self {
        Self::Rows(rows)
    }
}

#[derive(Debug)]
struct CountScript {
    table: String,
    fragment: Option<String>,
    replies: VecDeque<CountReply>,
    last: Option<CountReply>,
}

impl CountScript {
    fn matches(&self, table: &str, condition: &str) -> bool {
        self.table == table
            && self
                .fragment
                .as_deref()
                .is_none_or(|fragment| condition.contains(fragment))
    }

    fn next(&mut self) -> Option<CountReply> {
        if let Some(reply) = self.replies.pop_front() {
            self.last = Some(reply.clone());
            return Some(reply);
        }
        self.last.clone()
    }
}

/// In-memory gateway answering from scripts.
///
/// - Statements succeed unless they contain an injected failure or timeout
///   fragment.
/// - `fetch_rows` answers from the first registered reply whose prefix the
///   query starts with.
/// - Row counts are consumed in order per table (optionally narrowed to
///   conditions containing a fragment); the last reply repeats once a
///   script is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    operations: Arc<Mutex<Vec<GatewayOp>>>,
    failures: Arc<Mutex<Vec<String>>>,
    timeouts: Arc<Mutex<Vec<String>>>,
    rows: Arc<Mutex<Vec<(String, String)>>>,
    counts: Arc<Mutex<Vec<CountScript>>>,
}

impl ScriptedGateway {
    /// Creates a gateway with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers queries starting with `prefix` with `output`.
    pub fn respond(&self, prefix: impl Into<String>, output: impl Into<String>) {
        self.rows
            .lock()
            .expect("lock")
            .push((prefix.into(), output.into()));
    }

    /// Scripts the row counts reported for `table`.
    pub fn script_counts<R: Into<CountReply>>(
        &self,
        table: impl Into<String>,
        replies: impl IntoIterator<Item = R>,
    ) {
        self.push_script(table.into(), None, replies);
    }

    /// Scripts the row counts reported for `table` where the condition
    /// contains `fragment`. Takes precedence over table-wide scripts.
    pub fn script_counts_where<R: Into<CountReply>>(
        &self,
        table: impl Into<String>,
        fragment: impl Into<String>,
        replies: impl IntoIterator<Item = R>,
    ) {
        self.push_script(table.into(), Some(fragment.into()), replies);
    }

    fn push_script<R: Into<CountReply>>(
        &self,
        table: String,
        fragment: Option<String>,
        replies: impl IntoIterator<Item = R>,
    ) {
        let script = CountScript {
            table,
            fragment,
            replies: replies.into_iter().map(Into::into).collect(),
            last: None,
        };
        let mut counts = self.counts.lock().expect("lock");
        if script.fragment.is_some() {
            counts.insert(0, script);
        } else {
            counts.push(script);
        }
    }

    /// Fails every statement or query containing `fragment`.
    pub fn inject_failure(&self, fragment: impl Into<String>) {
        self.failures.lock().expect("lock").push(fragment.into());
    }

    /// Times out every statement or query containing `fragment`, as the
    /// beeline gateway does when its statement timeout elapses.
    pub fn inject_timeout(&self, fragment: impl Into<String>) {
        self.timeouts.lock().expect("lock").push(fragment.into());
    }

    /// Clears all injected failures and timeouts.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
        self.timeouts.lock().expect("lock").clear();
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<GatewayOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Returns the text of every executed statement, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                GatewayOp::Statement { text } => Some(text),
                GatewayOp::Query { .. } => None,
            })
            .collect()
    }

    /// Returns executed statements containing `fragment`.
    #[must_use]
    pub fn statements_containing(&self, fragment: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| s.contains(fragment))
            .collect()
    }

    fn record(&self, op: GatewayOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, text: &str) -> Result<(), GatewayError> {
        let timeouts = self.timeouts.lock().expect("lock");
        if timeouts.iter().any(|f| text.contains(f.as_str())) {
            return Err(GatewayError::Timeout {
                statement: text.to_string(),
                after: Duration::from_secs(1),
            });
        }
        drop(timeouts);
        let failures = self.failures.lock().expect("lock");
        if let Some(fragment) = failures.iter().find(|f| text.contains(f.as_str())) {
            return Err(GatewayError::execution(
                text,
                format!("injected failure for {fragment:?}"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl WarehouseGateway for ScriptedGateway {
    async fn execute_statement(&self, statement: &str) -> Result<(), GatewayError> {
        self.record(GatewayOp::Statement {
            text: statement.to_string(),
        });
        self.check_failure(statement)
    }

    async fn fetch_rows(&self, query: &str) -> Result<String, GatewayError> {
        self.record(GatewayOp::Query {
            text: query.to_string(),
        });
        self.check_failure(query)?;
        self.rows
            .lock()
            .expect("lock")
            .iter()
            .find(|(prefix, _)| query.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .ok_or_else(|| GatewayError::execution(query, "no scripted reply"))
    }

    async fn fetch_row_count(
        &self,
        table: &str,
        condition: Option<&str>,
    ) -> Result<u64, GatewayError> {
        let text = query::count_query(table, condition);
        self.record(GatewayOp::Query { text: text.clone() });
        let unavailable = |reply: &str| GatewayError::RowCountUnavailable {
            table: table.to_string(),
            reply: reply.to_string(),
        };
        if self.check_failure(&text).is_err() {
            return Err(unavailable(""));
        }

        let condition = condition.unwrap_or_default();
        let reply = self
            .counts
            .lock()
            .expect("lock")
            .iter_mut()
            .find(|script| script.matches(table, condition))
            .and_then(CountScript::next);
        match reply {
            Some(CountReply::Rows(rows)) => Ok(rows),
            Some(CountReply::Raw(raw)) => parse_row_count(table, &raw),
            Some(CountReply::Fail) | None => Err(unavailable("")),
        }
    }
}
