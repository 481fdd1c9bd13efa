//! Copy-on-write command queue

use arc_swap::ArcSwap;
use obd_protocol::Command;
use std::sync::Arc;

/// Ordered, duplicate-free list of commands behind one swappable reference.
///
/// Writers never mutate a published list: every change builds a new one and
/// swaps it in, so a reader holding [`CommandQueue::snapshot`] iterates a
/// consistent list while other threads keep editing.
pub struct CommandQueue {
    commands: ArcSwap<Vec<Command>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            commands: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append unless a command with the same identity is queued.
    ///
    /// Returns whether the queue changed.
    pub fn add(&self, command: Command) -> bool {
        let mut added = false;
        self.commands.rcu(|current| {
            if current.contains(&command) {
                added = false;
                Arc::clone(current)
            } else {
                added = true;
                let mut next = Vec::with_capacity(current.len() + 1);
                next.extend(current.iter().copied());
                next.push(command);
                Arc::new(next)
            }
        });
        added
    }

    /// Remove the command with the same identity, if queued
    pub fn remove(&self, command: &Command) -> bool {
        let mut removed = false;
        self.commands.rcu(|current| {
            removed = current.contains(command);
            if removed {
                Arc::new(current.iter().filter(|c| *c != command).copied().collect())
            } else {
                Arc::clone(current)
            }
        });
        removed
    }

    pub fn clear(&self) {
        self.commands.store(Arc::new(Vec::new()));
    }

    /// The list as currently published
    pub fn snapshot(&self) -> Arc<Vec<Command>> {
        self.commands.load_full()
    }

    pub fn len(&self) -> usize {
        self.commands.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::pid;
    use std::thread;

    #[test]
    fn test_add_is_idempotent() {
        let queue = CommandQueue::new();
        assert!(queue.add(pid::RPM));
        assert!(!queue.add(pid::RPM));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_by_identity() {
        let queue = CommandQueue::new();
        queue.add(pid::RPM);
        queue.add(pid::SPEED);

        assert!(queue.remove(&pid::RPM));
        assert!(!queue.remove(&pid::RPM));
        assert_eq!(*queue.snapshot(), vec![pid::SPEED]);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_changes() {
        let queue = CommandQueue::new();
        queue.add(pid::RPM);
        queue.add(pid::SPEED);

        let pass = queue.snapshot();
        queue.clear();
        queue.add(pid::MAF);

        assert_eq!(*pass, vec![pid::RPM, pid::SPEED]);
        assert_eq!(*queue.snapshot(), vec![pid::MAF]);
    }

    #[test]
    fn test_add_after_clear_from_another_thread() {
        let queue = Arc::new(CommandQueue::new());
        queue.add(pid::RPM);
        queue.add(pid::SPEED);

        let clearer = Arc::clone(&queue);
        thread::spawn(move || clearer.clear()).join().unwrap();
        let adder = Arc::clone(&queue);
        thread::spawn(move || adder.add(pid::COOLANT_TEMP))
            .join()
            .unwrap();

        assert_eq!(*queue.snapshot(), vec![pid::COOLANT_TEMP]);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let queue = Arc::new(CommandQueue::new());
        let handles: Vec<_> = pid::ALL
            .iter()
            .copied()
            .map(|command| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for _ in 0..50 {
                        queue.add(command);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), pid::ALL.len());
    }
}
