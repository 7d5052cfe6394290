//! Pending task queue
//!
//! FIFO of tasks waiting for the connection. Command tasks coalesce: a newer
//! request replaces an older one of the same kind that has not started yet.

use std::collections::VecDeque;
use std::fmt;

use url::Url;

/// Kind tag of a [`Task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Connect,
    Disconnect,
    SendCommand,
    ClearAll,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Connect => "connect",
            TaskKind::Disconnect => "disconnect",
            TaskKind::SendCommand => "send-command",
            TaskKind::ClearAll => "clear-all",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work against the connection
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Open a connection to the server at this address
    Connect(Url),
    /// Stop devices, stop scanning, close the connection
    Disconnect,
    /// Vibrate every known device at this intensity
    SendCommand(f64),
    /// Stop every device
    ClearAll,
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Connect(_) => TaskKind::Connect,
            Task::Disconnect => TaskKind::Disconnect,
            Task::SendCommand(_) => TaskKind::SendCommand,
            Task::ClearAll => TaskKind::ClearAll,
        }
    }
}

/// Ordered pending tasks
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop every pending task
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Append a task
    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Take the head task
    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Kinds of the pending tasks, head first
    pub fn kinds(&self) -> Vec<TaskKind> {
        self.tasks.iter().map(Task::kind).collect()
    }

    /// Pending tasks, head first
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Replace any pending `SendCommand` with a fresh one at the tail
    pub fn replace_send_command(&mut self, intensity: f64) {
        self.tasks.retain(|t| t.kind() != TaskKind::SendCommand);
        self.tasks.push_back(Task::SendCommand(intensity));
    }

    /// Replace any pending `SendCommand` or `ClearAll` with a `ClearAll` at the tail
    pub fn replace_clear_all(&mut self) {
        self.tasks
            .retain(|t| !matches!(t.kind(), TaskKind::SendCommand | TaskKind::ClearAll));
        self.tasks.push_back(Task::ClearAll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Url {
        Url::parse("ws://host:1").unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new();
        queue.push(Task::Disconnect);
        queue.push(Task::Connect(address()));

        assert_eq!(queue.pop(), Some(Task::Disconnect));
        assert_eq!(queue.pop(), Some(Task::Connect(address())));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_send_command_coalesces() {
        let mut queue = TaskQueue::new();
        queue.replace_send_command(0.2);
        queue.replace_send_command(0.9);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(Task::SendCommand(0.9)));
    }

    #[test]
    fn test_send_command_moves_behind_other_tasks() {
        let mut queue = TaskQueue::new();
        queue.replace_send_command(0.2);
        queue.push(Task::ClearAll);
        queue.replace_send_command(0.4);

        assert_eq!(queue.kinds(), vec![TaskKind::ClearAll, TaskKind::SendCommand]);
    }

    #[test]
    fn test_clear_all_supersedes_commands() {
        let mut queue = TaskQueue::new();
        queue.push(Task::Connect(address()));
        queue.replace_send_command(0.5);
        queue.replace_clear_all();
        queue.replace_clear_all();

        assert_eq!(queue.kinds(), vec![TaskKind::Connect, TaskKind::ClearAll]);
    }

    #[test]
    fn test_clear() {
        let mut queue = TaskQueue::new();
        queue.push(Task::Disconnect);
        queue.replace_send_command(0.1);
        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.kinds().is_empty());
    }
}
