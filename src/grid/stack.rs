//! Stack memory tile.
//!
//! A LIFO of signed integers reachable from any direction. Unlike a
//! compute tile:
//!
//! - It keeps read interest on every neighbor and, while non-empty, a
//!   standing offer of its top value on every neighbor, so its channel
//!   endpoints may legitimately carry both pending flags at once.
//! - A completed push retracts every outstanding interest (the
//!   offered top value is stale once the stack grows).
//! - A completed pop retracts the remaining offers.

use super::node::{ChannelId, Direction, NodeId};
use super::Grid;

#[derive(Debug)]
pub struct StackNode {
    pub(crate) data: Vec<i32>,
    /// No push is in flight; the read sweep may arm.
    pub(crate) read_ready: bool,
    /// No pop is in flight; the write sweep may offer.
    pub(crate) write_ready: bool,
    pub(crate) ports: [Option<ChannelId>; 4],
}

impl StackNode {
    pub fn new() -> Self {
        Self { data: Vec::new(), read_ready: true, write_ready: true, ports: [None; 4] }
    }

    pub(crate) fn initialize(&mut self) {
        self.data.clear();
        self.read_ready = true;
        self.write_ready = true;
    }

    pub fn depth(&self) -> usize {
        self.data.len()
    }
}

impl Default for StackNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    /// Read phase: arm a read on each neighbor, stopping as soon as
    /// one resolves.
    pub(crate) fn stack_read(&mut self, id: NodeId) {
        {
            let s = self.stack_mut(id);
            if !s.read_ready {
                return;
            }
            s.read_ready = false;
        }
        for d in Direction::ALL {
            let (resolved, port) = {
                let s = self.stack_ref(id);
                (s.read_ready, s.ports[d.index()])
            };
            if resolved {
                break;
            }
            if let Some(ch) = port {
                self.channel_read(ch, id);
            }
        }
    }

    /// A value arrived: push it and retract everything pending.
    pub(crate) fn stack_read_complete(&mut self, id: NodeId, value: i32) {
        let ports = {
            let s = self.stack_mut(id);
            debug_assert!(!s.read_ready, "unexpected ReadComplete on stack node");
            s.data.push(value);
            s.ports
        };
        log::trace!("stack{}: pushed {} (depth {})", id.0, value, self.stack_ref(id).depth());
        for ch in ports.into_iter().flatten() {
            self.cancel_read(ch, id);
            self.cancel_write(ch, id);
        }
        let s = self.stack_mut(id);
        s.read_ready = true;
        s.write_ready = true;
    }

    /// Write phase: offer the top value on every neighbor, stopping
    /// if an offer is taken synchronously.
    pub(crate) fn stack_write(&mut self, id: NodeId) {
        let top = {
            let s = self.stack_mut(id);
            if !s.write_ready || s.data.is_empty() {
                return;
            }
            s.write_ready = false;
            *s.data.last().unwrap()
        };
        for d in Direction::ALL {
            let (taken, port) = {
                let s = self.stack_ref(id);
                (s.write_ready, s.ports[d.index()])
            };
            if taken {
                break;
            }
            if let Some(ch) = port {
                self.channel_write(ch, id, top);
            }
        }
    }

    /// An offer was taken: pop and retract the remaining offers.
    pub(crate) fn stack_write_complete(&mut self, id: NodeId) {
        let ports = {
            let s = self.stack_mut(id);
            debug_assert!(!s.write_ready, "unexpected WriteComplete on stack node");
            s.data.pop();
            s.ports
        };
        log::trace!("stack{}: popped (depth {})", id.0, self.stack_ref(id).depth());
        for ch in ports.into_iter().flatten() {
            self.cancel_write(ch, id);
        }
        self.stack_mut(id).write_ready = true;
    }
}
