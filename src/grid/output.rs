//! Output tile: a sink that records every value it receives.

use super::node::{ChannelId, NodeId};
use super::Grid;

#[derive(Debug)]
pub struct OutputNode {
    /// Values received so far this run. Append-only.
    pub(crate) data: Vec<i32>,
    pub(crate) reading: bool,
    pub(crate) port: Option<ChannelId>,
}

impl OutputNode {
    pub fn new() -> Self {
        Self { data: Vec::new(), reading: false, port: None }
    }

    pub(crate) fn initialize(&mut self) {
        self.data.clear();
        self.reading = false;
    }

    pub fn values(&self) -> &[i32] {
        &self.data
    }
}

impl Default for OutputNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    /// Read phase: keep a read armed whenever idle.
    pub(crate) fn output_read(&mut self, id: NodeId) {
        let port = {
            let n = self.output_mut(id);
            if n.reading {
                return;
            }
            n.reading = true;
            n.port
        };
        if let Some(ch) = port {
            self.channel_read(ch, id);
        }
    }

    pub(crate) fn output_read_complete(&mut self, id: NodeId, value: i32) {
        let n = self.output_mut(id);
        debug_assert!(n.reading, "unexpected ReadComplete on output node");
        n.reading = false;
        n.data.push(value);
        log::trace!("output{}: received {} ({} total)", id.0, value, n.data.len());
    }
}
