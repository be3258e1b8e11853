//! In-memory index implementation.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};

use crate::error::{Result, SemsearchError};
use crate::index::{DocumentData, IndexReader, TermEntry};
use crate::query::postings::{Posting, PostingsQuery};

/// Name of the dictionary built from the documents' token streams.
pub const TOKEN_FIELD: &str = "token";

/// A small index held entirely in memory.
///
/// Documents receive consecutive IDs starting at zero. Deleting a document
/// only marks it; queries keep matching it and runners skip it.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: AHashMap<i64, DocumentData>,
    next_document_id: i64,
    deleted: AHashSet<i64>,
    dictionaries: AHashMap<String, Vec<TermEntry>>,
    total_tokens: usize,
}

impl MemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document built from whitespace-separated text.
    pub fn add_document(&mut self, uri: &str, title: &str, text: &str) -> i64 {
        self.add(DocumentData::new(uri, title, text))
    }

    /// Add a document and return its ID.
    pub fn add(&mut self, document: DocumentData) -> i64 {
        let document_id = self.next_document_id;
        self.next_document_id += 1;
        self.total_tokens += document.tokens.len();
        self.documents.insert(document_id, document);
        document_id
    }

    /// Mark a document as deleted.
    pub fn delete_document(&mut self, document_id: i64) -> Result<()> {
        if !self.documents.contains_key(&document_id) {
            return Err(SemsearchError::index(format!(
                "document {document_id} not found"
            )));
        }
        self.deleted.insert(document_id);
        Ok(())
    }

    /// Add entries to a field's term dictionary.
    pub fn add_term_entries<I>(&mut self, field: &str, entries: I)
    where
        I: IntoIterator<Item = TermEntry>,
    {
        let dictionary = self.dictionaries.entry(field.to_string()).or_default();
        dictionary.extend(entries);
        dictionary.sort_by(|a, b| a.term.cmp(&b.term));
    }

    /// Number of documents, deleted ones included.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if the index has no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// A query matching every occurrence of `token` in the stored texts.
    pub fn token_query(&self, token: &str) -> Result<PostingsQuery> {
        PostingsQuery::new(token, self.token_postings(token)?)
    }

    fn token_dictionary(&self) -> Vec<TermEntry> {
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for document in self.documents.values() {
            let unique: AHashSet<&str> = document.tokens.iter().map(String::as_str).collect();
            for token in unique {
                *counts.entry(token).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .map(|(term, count)| TermEntry::new(term, count).with_length(1))
            .collect()
    }
}

impl IndexReader for MemoryIndex {
    fn is_deleted(&self, document_id: i64) -> bool {
        self.deleted.contains(&document_id)
    }

    fn document(&self, document_id: i64) -> Result<DocumentData> {
        self.documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| SemsearchError::index(format!("document {document_id} not found")))
    }

    fn document_length(&self, document_id: i64) -> Result<usize> {
        self.documents
            .get(&document_id)
            .map(|d| d.tokens.len())
            .ok_or_else(|| SemsearchError::index(format!("document {document_id} not found")))
    }

    fn average_document_length(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_tokens as f64 / self.documents.len() as f64
        }
    }

    fn dictionary(&self, field: &str) -> Result<Vec<TermEntry>> {
        if let Some(entries) = self.dictionaries.get(field) {
            return Ok(entries.clone());
        }
        if field == TOKEN_FIELD {
            return Ok(self.token_dictionary());
        }
        Err(SemsearchError::index(format!("unknown field: {field}")))
    }

    fn token_postings(&self, token: &str) -> Result<Vec<Posting>> {
        let mut postings: Vec<Posting> = self
            .documents
            .iter()
            .filter_map(|(&document_id, document)| {
                let spans: Vec<(usize, usize)> = document
                    .tokens
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.as_str() == token)
                    .map(|(position, _)| (position, 1))
                    .collect();
                (!spans.is_empty()).then(|| Posting::new(document_id, spans))
            })
            .collect();
        postings.sort_by_key(|p| p.document_id);
        Ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{NO_MORE_DOCUMENTS, QueryNode, collect_hits};

    fn index() -> MemoryIndex {
        let mut index = MemoryIndex::new();
        index.add_document("urn:0", "zero", "the quick fox");
        index.add_document("urn:1", "one", "a fox and a fox");
        index.add_document("urn:2", "two", "no match here");
        index
    }

    #[test]
    fn test_documents_and_deletion() {
        let mut index = index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.document(1).unwrap().title, "one");
        assert!((index.average_document_length() - 11.0 / 3.0).abs() < 1e-9);

        assert!(!index.is_deleted(2));
        index.delete_document(2).unwrap();
        assert!(index.is_deleted(2));
        assert!(index.delete_document(42).is_err());
    }

    #[test]
    fn test_token_query() {
        let index = index();
        let query = index.token_query("fox").unwrap();
        assert_eq!(query.len(), 2);

        let mut executor = query.executor(&index).unwrap();
        assert_eq!(executor.next_document(-1).unwrap(), 0);
        assert_eq!(collect_hits(executor.as_mut()).unwrap().len(), 1);
        assert_eq!(executor.next_document(-1).unwrap(), 1);
        let hits = collect_hits(executor.as_mut()).unwrap();
        assert_eq!(hits.iter().map(|h| h.term_position).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(executor.next_document(-1).unwrap(), NO_MORE_DOCUMENTS);
    }

    #[test]
    fn test_dictionaries() {
        let mut index = index();
        let tokens = index.dictionary(TOKEN_FIELD).unwrap();
        let fox = tokens.iter().find(|e| e.term == "fox").unwrap();
        assert_eq!(fox.count, 2);
        assert!(tokens.windows(2).all(|w| w[0].term < w[1].term));

        index.add_term_entries("type", [TermEntry::new("b", 1), TermEntry::new("a", 2)]);
        let types = index.dictionary("type").unwrap();
        assert_eq!(types[0].term, "a");
        assert!(index.dictionary("missing").is_err());
    }
}
