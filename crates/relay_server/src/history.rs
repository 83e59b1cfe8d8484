//! Append-only log of inbound commands.
//!
//! The history is the relay's sequencer: numbering a command and appending
//! it happen in one critical section, so ids are gap-free, never shared and
//! always appear in the log in id order.

use command_bus::{now, Command, Envelope, MessageId};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct HistoryLog {
    last_id: MessageId,
    commands: Vec<Command>,
}

/// In-memory command history with a monotonic message counter.
#[derive(Debug, Default)]
pub struct CommandHistory {
    log: Mutex<HistoryLog>,
}

impl CommandHistory {
    /// Creates an empty history whose first command will be numbered 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps `envelope` with the next id and the current time and appends it.
    pub fn record(&self, envelope: Envelope) -> Command {
        let mut log = self.lock();
        log.last_id += 1;
        let command = Command::stamp(envelope, log.last_id, now());
        log.commands.push(command.clone());
        command
    }

    /// Returns a snapshot of every recorded command in id order.
    pub fn commands(&self) -> Vec<Command> {
        self.lock().commands.clone()
    }

    /// Returns the commands recorded after `message_id`.
    pub fn since(&self, message_id: MessageId) -> Vec<Command> {
        let log = self.lock();
        let start = log.commands.partition_point(|c| c.message_id <= message_id);
        log.commands[start..].to_vec()
    }

    /// Number of commands currently held.
    pub fn len(&self) -> usize {
        self.lock().commands.len()
    }

    /// Whether the history holds no commands.
    pub fn is_empty(&self) -> bool {
        self.lock().commands.is_empty()
    }

    /// The id handed out most recently, or 0 before the first command.
    pub fn last_message_id(&self) -> MessageId {
        self.lock().last_id
    }

    /// Drops every held command. The counter keeps running.
    pub fn clear(&self) {
        self.lock().commands.clear();
    }

    fn lock(&self) -> MutexGuard<'_, HistoryLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
