//! FIFO backlog of pickup/delivery tasks with label allocation.

use std::collections::{HashSet, VecDeque};

use crate::error::{CapacityKind, Result, SimError};
use crate::types::{Label, MAX_LABELS, Task};

/// Ordered backlog of pending tasks.
///
/// Labels are issued A..Z exactly once each. A label stays in use from
/// enqueue until the owning task is delivered or abandoned.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<Task>,
    in_use: HashSet<Label>,
    issued: usize,
}

impl TaskQueue {
    /// Create an empty task queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The label the next enqueued task should carry.
    pub fn next_label(&self) -> Result<Label> {
        Label::nth(self.issued).ok_or(SimError::Capacity(CapacityKind::LabelsExhausted))
    }

    /// Append a task to the back of the backlog.
    pub fn enqueue(&mut self, task: Task) -> Result<()> {
        if self.issued >= MAX_LABELS {
            return Err(SimError::Capacity(CapacityKind::LabelsExhausted));
        }
        if self.in_use.contains(&task.label) {
            return Err(SimError::Capacity(CapacityKind::DuplicateLabel(task.label)));
        }
        self.in_use.insert(task.label);
        self.issued += 1;
        self.queue.push_back(task);
        Ok(())
    }

    /// Remove and return the oldest pending task.
    pub fn dequeue_next(&mut self) -> Result<Task> {
        self.queue.pop_front().ok_or(SimError::EmptyQueue)
    }

    /// Mark a task's label as finished. Finished labels are never re-issued.
    pub fn release(&mut self, label: Label) -> bool {
        self.in_use.remove(&label)
    }

    /// Pending tasks in dispatch order.
    pub fn peek_all(&self) -> impl Iterator<Item = &Task> {
        self.queue.iter()
    }

    /// Current number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// How many labels have been handed out so far.
    pub fn issued(&self) -> usize {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    fn task_for(queue: &TaskQueue, n: i32) -> Task {
        let label = queue.next_label().expect("labels left");
        Task::new(label, Position::new(n, 0), Position::new(n, 1))
    }

    #[test]
    fn dequeues_in_enqueue_order() {
        let mut queue = TaskQueue::new();
        for n in 0..3 {
            let task = task_for(&queue, n);
            queue.enqueue(task).expect("capacity");
        }
        assert_eq!(queue.dequeue_next().map(|t| t.label.as_char()), Ok('A'));

        // Interleaved enqueues go behind what is already pending.
        let task = task_for(&queue, 3);
        queue.enqueue(task).expect("capacity");
        let order: Vec<char> = std::iter::from_fn(|| queue.dequeue_next().ok())
            .map(|t| t.label.as_char())
            .collect();
        assert_eq!(order, vec!['B', 'C', 'D']);
    }

    #[test]
    fn dequeue_on_empty_reports_empty_queue() {
        let mut queue = TaskQueue::new();
        assert_eq!(queue.dequeue_next(), Err(SimError::EmptyQueue));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn rejects_label_already_in_use() {
        let mut queue = TaskQueue::new();
        let task = task_for(&queue, 0);
        queue.enqueue(task.clone()).expect("capacity");
        let label = task.label;
        assert_eq!(
            queue.enqueue(task),
            Err(SimError::Capacity(CapacityKind::DuplicateLabel(label)))
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn release_does_not_recycle_labels() {
        let mut queue = TaskQueue::new();
        let task = task_for(&queue, 0);
        queue.enqueue(task).expect("capacity");
        let active = queue.dequeue_next().expect("pending task");
        assert!(queue.release(active.label));
        assert!(!queue.release(active.label));
        assert_eq!(queue.next_label().map(Label::as_char), Ok('B'));
    }

    #[test]
    fn stops_after_twenty_six_labels() {
        let mut queue = TaskQueue::new();
        for n in 0..MAX_LABELS as i32 {
            let task = task_for(&queue, n);
            queue.enqueue(task).expect("capacity");
        }
        assert_eq!(queue.issued(), MAX_LABELS);
        assert_eq!(
            queue.next_label(),
            Err(SimError::Capacity(CapacityKind::LabelsExhausted))
        );
        let late = Task::new(
            Label::nth(0).expect("valid index"),
            Position::new(0, 0),
            Position::new(1, 1),
        );
        assert_eq!(
            queue.enqueue(late),
            Err(SimError::Capacity(CapacityKind::LabelsExhausted))
        );
        let labels: Vec<char> = queue.peek_all().map(|t| t.label.as_char()).collect();
        assert_eq!(labels.len(), MAX_LABELS);
        assert_eq!(labels.first(), Some(&'A'));
        assert_eq!(labels.last(), Some(&'Z'));
    }
}
