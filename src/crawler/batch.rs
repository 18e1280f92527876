//! Buffer of fetched documents waiting to be written to the index

use crate::index::Document;

/// Documents collected during a pass, flushed to the index in one transaction
#[derive(Debug)]
pub struct BatchBuffer {
    docs: Vec<Document>,
    threshold: usize,
}

impl BatchBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            docs: Vec::with_capacity(threshold),
            threshold: threshold.max(1),
        }
    }

    pub fn push(&mut self, doc: Document) {
        self.docs.push(doc);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.docs.iter().any(|doc| doc.url == url)
    }

    /// True once the buffer has reached its flush threshold
    pub fn is_full(&self) -> bool {
        self.docs.len() >= self.threshold
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Removes every buffered document for flushing
    pub fn take(&mut self) -> Vec<Document> {
        std::mem::take(&mut self.docs)
    }

    /// Puts documents back after a failed flush, ahead of anything added since
    pub fn restore(&mut self, mut docs: Vec<Document>) {
        docs.append(&mut self.docs);
        self.docs = docs;
    }
}
