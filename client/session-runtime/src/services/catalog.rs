use crate::models::task::{SessionRecord, Task, TaskKind, TaskRecord};

/// Coding tasks followed by theory tasks, in backend order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCatalog {
    tasks: Vec<Task>,
    coding_count: usize,
}

impl TaskCatalog {
    pub fn from_record(record: SessionRecord) -> Self {
        let coding_count = record.coding_tasks.len();
        let tasks = record
            .coding_tasks
            .into_iter()
            .map(|record| tag(TaskKind::Coding, record))
            .chain(
                record
                    .theory_tasks
                    .into_iter()
                    .map(|record| tag(TaskKind::Theory, record)),
            )
            .collect();

        Self {
            tasks,
            coding_count,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn coding_count(&self) -> usize {
        self.coding_count
    }

    pub fn theory_count(&self) -> usize {
        self.tasks.len() - self.coding_count
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// Task shown for `index`; out-of-range indices fall back to the last
    /// task. `None` only for an empty catalog.
    pub fn current(&self, index: usize) -> Option<&Task> {
        self.tasks.get(self.clamp_index(index))
    }

    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.tasks.len().saturating_sub(1))
    }

    pub fn is_text_task(&self, index: usize) -> bool {
        !self.is_empty() && index >= self.coding_count
    }

    pub fn is_first(&self, index: usize) -> bool {
        index == 0
    }

    pub fn is_last(&self, index: usize) -> bool {
        !self.is_empty() && index == self.tasks.len() - 1
    }

    /// Coding entries with their absolute catalog index.
    pub fn coding_tasks(&self) -> impl Iterator<Item = (usize, &Task)> {
        self.tasks.iter().enumerate().take(self.coding_count)
    }

    /// Theory entries with their absolute catalog index.
    pub fn theory_tasks(&self) -> impl Iterator<Item = (usize, &Task)> {
        self.tasks.iter().enumerate().skip(self.coding_count)
    }
}

fn tag(kind: TaskKind, record: TaskRecord) -> Task {
    Task { kind, record }
}
