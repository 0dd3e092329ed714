//! Input tile: a read-only producer of a predefined sequence.

use super::node::{ChannelId, NodeId};
use super::Grid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputState {
    Ready,
    Write,
    WriteComplete,
}

#[derive(Debug)]
pub struct InputNode {
    pub(crate) data: Vec<i32>,
    pub(crate) position: usize,
    pub(crate) state: InputState,
    pub(crate) port: Option<ChannelId>,
}

impl InputNode {
    pub fn new(data: Vec<i32>) -> Self {
        Self { data, position: 0, state: InputState::Ready, port: None }
    }

    pub(crate) fn initialize(&mut self) {
        self.position = 0;
        self.state = InputState::Ready;
    }
}

impl Grid {
    /// Write phase: offer the next value while any remain.
    pub(crate) fn input_write(&mut self, id: NodeId) {
        let (value, port) = {
            let n = self.input_mut(id);
            if n.state != InputState::Ready || n.position >= n.data.len() {
                return;
            }
            n.state = InputState::Write;
            (n.data[n.position], n.port)
        };
        log::trace!("input{}: offering {}", id.0, value);
        if let Some(ch) = port {
            self.channel_write(ch, id, value);
        }
    }

    pub(crate) fn input_write_complete(&mut self, id: NodeId) {
        let n = self.input_mut(id);
        debug_assert!(n.state == InputState::Write, "unexpected WriteComplete on input node");
        n.state = InputState::WriteComplete;
    }

    /// Step phase: a delivered value is consumed; advance.
    pub(crate) fn input_step(&mut self, id: NodeId) {
        let n = self.input_mut(id);
        if n.state == InputState::WriteComplete {
            n.state = InputState::Ready;
            n.position += 1;
        }
    }
}
