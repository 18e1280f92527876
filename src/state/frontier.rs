use crate::state::CrawlTask;
use std::collections::HashSet;

/// Depth-first collection of pending tasks for one pass
///
/// The most recently pushed task is popped first. Membership is tracked by
/// URL so a link already waiting is never queued twice.
#[derive(Debug, Default)]
pub struct Frontier {
    stack: Vec<CrawlTask>,
    members: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a task unless its URL is already waiting
    ///
    /// # Returns
    ///
    /// `true` if the task was added
    pub fn push(&mut self, task: CrawlTask) -> bool {
        if !self.members.insert(task.url.as_str().to_string()) {
            return false;
        }
        self.stack.push(task);
        true
    }

    /// Pops the most recently pushed task
    pub fn pop(&mut self) -> Option<CrawlTask> {
        let task = self.stack.pop()?;
        self.members.remove(task.url.as_str());
        Some(task)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.members.contains(url)
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Moves every task of `other` into this frontier, leaving `other` empty
    pub fn absorb(&mut self, other: &mut Frontier) {
        other.members.clear();
        for task in other.stack.drain(..) {
            self.push(task);
        }
    }

    /// Removes and returns all tasks in push order
    pub fn drain(&mut self) -> Vec<CrawlTask> {
        self.members.clear();
        std::mem::take(&mut self.stack)
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.members.clear();
    }
}
