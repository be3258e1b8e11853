//! Query over a fixed, in-memory postings list.

use std::sync::Arc;

use crate::error::{Result, SemsearchError};
use crate::index::IndexReader;
use crate::query::{Binding, NO_MORE_DOCUMENTS, QueryExecutor, QueryNode};

/// One document of a postings list together with its hit spans.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    /// The matching document.
    pub document_id: i64,
    /// `(term_position, length)` of every hit, in position order.
    pub spans: Vec<(usize, usize)>,
}

impl Posting {
    /// Create a new posting.
    pub fn new(document_id: i64, spans: Vec<(usize, usize)>) -> Self {
        Posting { document_id, spans }
    }
}

/// A query whose matches are given up front as a postings list.
///
/// Executors share the postings, so rewinding a runner only allocates a new
/// cursor.
#[derive(Debug, Clone)]
pub struct PostingsQuery {
    name: String,
    postings: Arc<Vec<Posting>>,
}

impl PostingsQuery {
    /// Create a postings query. Document IDs must be non-negative and unique.
    pub fn new<S: Into<String>>(name: S, mut postings: Vec<Posting>) -> Result<Self> {
        postings.sort_by_key(|posting| posting.document_id);
        for pair in postings.windows(2) {
            if pair[0].document_id == pair[1].document_id {
                return Err(SemsearchError::query(format!(
                    "duplicate document {} in postings",
                    pair[0].document_id
                )));
            }
        }
        if postings.first().is_some_and(|p| p.document_id < 0) {
            return Err(SemsearchError::query("document IDs must be non-negative"));
        }

        Ok(PostingsQuery {
            name: name.into(),
            postings: Arc::new(postings),
        })
    }

    /// Number of documents in the postings list.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Check if the postings list is empty.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

impl QueryNode for PostingsQuery {
    fn executor(&self, _index: &dyn IndexReader) -> Result<Box<dyn QueryExecutor>> {
        Ok(Box::new(PostingsExecutor::new(Arc::clone(&self.postings))))
    }

    fn description(&self) -> String {
        format!("postings({}, {} docs)", self.name, self.postings.len())
    }
}

/// Matches every occurrence of a token in the index it is executed against.
///
/// Unlike [`PostingsQuery`] the postings are looked up per execution, so one
/// node can be run by several engines over different indexes.
#[derive(Debug, Clone)]
pub struct TokenQuery {
    token: String,
}

impl TokenQuery {
    /// Create a query matching every occurrence of `token`.
    pub fn new<S: Into<String>>(token: S) -> Self {
        TokenQuery { token: token.into() }
    }

    /// The token this query matches.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl QueryNode for TokenQuery {
    fn executor(&self, index: &dyn IndexReader) -> Result<Box<dyn QueryExecutor>> {
        let query = PostingsQuery::new(self.token.as_str(), index.token_postings(&self.token)?)?;
        Ok(Box::new(PostingsExecutor::new(query.postings)))
    }

    fn description(&self) -> String {
        format!("token({})", self.token)
    }
}

/// Cursor over a shared postings list.
#[derive(Debug)]
pub struct PostingsExecutor {
    postings: Arc<Vec<Posting>>,
    /// Index of the current posting, `None` before the first document.
    current: Option<usize>,
    next_span: usize,
    exhausted: bool,
}

impl PostingsExecutor {
    /// Create an executor positioned before the first posting.
    pub fn new(postings: Arc<Vec<Posting>>) -> Self {
        PostingsExecutor {
            postings,
            current: None,
            next_span: 0,
            exhausted: false,
        }
    }
}

impl QueryExecutor for PostingsExecutor {
    fn next_document(&mut self, greater_than: i64) -> Result<i64> {
        if self.exhausted {
            return Ok(NO_MORE_DOCUMENTS);
        }

        let from = self.current.map_or(0, |i| i + 1);
        let skip = self.postings[from..].partition_point(|p| p.document_id <= greater_than);
        let next = from + skip;
        self.next_span = 0;

        if next < self.postings.len() {
            self.current = Some(next);
            Ok(self.postings[next].document_id)
        } else {
            self.current = None;
            self.exhausted = true;
            Ok(NO_MORE_DOCUMENTS)
        }
    }

    fn next_hit(&mut self) -> Result<Option<Binding>> {
        let Some(current) = self.current else {
            return Ok(None);
        };
        let posting = &self.postings[current];
        match posting.spans.get(self.next_span) {
            Some(&(position, length)) => {
                self.next_span += 1;
                Ok(Some(Binding::new(posting.document_id, position, length)))
            }
            None => Ok(None),
        }
    }

    fn latest_document(&self) -> i64 {
        self.current
            .map_or(NO_MORE_DOCUMENTS, |i| self.postings[i].document_id)
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        self.exhausted = true;
        Ok(())
    }
}
