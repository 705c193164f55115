//! The pending-command queue (spec §4.5 "Command queueing").
//!
//! Any command the weaver issues while `loom_arms != Down` is queued instead
//! of executed immediately. The queue is a double-ended queue: new commands
//! are pushed to the front so the most recent command is always `front()`,
//! which is what lets consecutive [`Command::AdvancePick`] entries merge
//! without scanning the whole queue. Flushing pops from the back, which
//! replays the commands in the order they were issued.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Enter tabby mode, remembering the pattern cursor to restore later.
    Tabby,
    /// Leave tabby mode, restoring the remembered pattern cursor.
    Liftplan,
    /// Flip `weave_forward`, then advance forward once.
    Reverse,
    /// Step the cursor by `n` (negative steps backward).
    AdvancePick(i32),
    /// Enter single-pick text-entry mode.
    SetPick,
    /// Enter pick-list text-entry mode.
    SetPickList,
    /// Commit a typed pick number.
    DoSetPick(i32),
    /// Recompile the pick-list from typed text.
    DoSetPickList(String),
    Quit,
}

#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    queue: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Enqueues `cmd`, merging it into an already-queued `AdvancePick` at the
    /// front by summing the arguments.
    pub fn push(&mut self, cmd: Command) {
        if let Command::AdvancePick(n) = cmd {
            if let Some(Command::AdvancePick(front)) = self.queue.front_mut() {
                *front += n;
                return;
            }
        }
        self.queue.push_front(cmd);
    }

    /// Drains the queue in issue order (oldest first).
    pub fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        std::iter::from_fn(move || self.queue.pop_back())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let mut q = CommandQueue::new();
        q.push(Command::Tabby);
        q.push(Command::Liftplan);
        let drained: Vec<_> = q.drain().collect();
        assert_eq!(drained, vec![Command::Tabby, Command::Liftplan]);
    }

    #[test]
    fn consecutive_advance_picks_merge() {
        let mut q = CommandQueue::new();
        q.push(Command::AdvancePick(1));
        q.push(Command::AdvancePick(2));
        assert_eq!(q.len(), 1);
        let drained: Vec<_> = q.drain().collect();
        assert_eq!(drained, vec![Command::AdvancePick(3)]);
    }

    #[test]
    fn advance_pick_does_not_merge_across_other_commands() {
        let mut q = CommandQueue::new();
        q.push(Command::AdvancePick(1));
        q.push(Command::Reverse);
        q.push(Command::AdvancePick(2));
        assert_eq!(q.len(), 3);
    }
}
