//! The tile grid: construction, port channels, and the cycle loop.
//!
//! The grid owns every tile and every channel in flat arenas and
//! links them by index, so completion callbacks can run synchronously
//! inside a channel operation without reference cycles.
//!
//! # Cycle Model
//!
//! A cycle is one atomic sweep of four phases (Read, Compute, Write,
//! Step) over the active tiles, always in the same order:
//!
//! - Programmed compute tiles, in grid scan order
//! - Input tiles
//! - Output tiles
//! - Visualization tiles
//! - Stack tiles
//!
//! That fixed order is what makes `ANY` and stack arbitration
//! deterministic; nothing here may be parallelized.

pub mod channel;
pub mod compute;
pub mod input;
pub mod node;
pub mod output;
pub mod stack;
pub mod visualization;

use thiserror::Error;

use crate::asm::{assemble, ParseError};
use crate::puzzle::Puzzle;

pub use channel::{Channel, Endpoint, Side};
pub use compute::ComputeNode;
pub use input::InputNode;
pub use node::{ChannelId, Direction, Node, NodeId, NodeKind};
pub use output::OutputNode;
pub use stack::StackNode;
pub use visualization::{Bitmap, VisualizationNode};

/// Fatal error raised while executing a cycle. Aborts the test run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// A non-`JRO` jump whose operand is a port.
    #[error("node {node}, pc {pc}: target jumps are only supported by JRO")]
    IllegalInstruction { node: usize, pc: usize },

    /// A taken jump to a label that was never defined.
    #[error("node {node}, pc {pc}: jump to undefined label \"{label}\"")]
    UndefinedLabel { node: usize, pc: usize, label: String },

    /// Execution reached `HCF`.
    #[error("node {node}, pc {pc}: halt and catch fire")]
    Hcf { node: usize, pc: usize },
}

/// Error raised while building a grid from a puzzle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("node {node}: {source}")]
    Assemble { node: usize, source: ParseError },

    #[error("puzzle supplies {got} programs for {want} grid cells")]
    ProgramCount { got: usize, want: usize },

    #[error("io attachment references grid cell {node}, but the grid ends at {cells}")]
    Attachment { node: usize, cells: usize },
}

/// Static counts reported alongside a test verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridStats {
    /// Compute tiles carrying at least one instruction.
    pub programmed_nodes: usize,
    /// Total instructions across all compute tiles.
    pub instructions: usize,
}

/// The grid: every tile, every channel, and the phase scheduler.
pub struct Grid {
    width: usize,
    height: usize,
    pub(crate) nodes: Vec<Node>,
    pub(crate) channels: Vec<Channel>,
    /// Tiles that participate in cycles, in deterministic order.
    active: Vec<NodeId>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    viz: Vec<NodeId>,
}

impl Grid {
    /// Number of interior grid cells.
    pub fn cells(&self) -> usize {
        self.width * self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Build the tile graph a puzzle describes and assemble every
    /// programmed cell. The grid still needs [`Grid::initialize`]
    /// before cycles run.
    pub fn from_puzzle(puzzle: &Puzzle) -> Result<Grid, BuildError> {
        let cells = puzzle.width * puzzle.height;
        if puzzle.programs.len() != cells {
            return Err(BuildError::ProgramCount { got: puzzle.programs.len(), want: cells });
        }

        let mut grid = Grid {
            width: puzzle.width,
            height: puzzle.height,
            nodes: Vec::with_capacity(cells),
            channels: Vec::new(),
            active: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            viz: Vec::new(),
        };

        for row in 0..puzzle.height {
            for col in 0..puzzle.width {
                let index = row * puzzle.width + col;
                let node = if puzzle.stack_nodes.contains(&index) {
                    Node::Stack(StackNode::new())
                } else {
                    // Bad nodes arrive with empty programs and stay
                    // unprogrammed, which keeps them off the active
                    // list.
                    let program = assemble(&puzzle.programs[index])
                        .map_err(|source| BuildError::Assemble { node: index, source })?;
                    Node::Compute(ComputeNode::new(program))
                };
                grid.nodes.push(node);

                if col > 0 {
                    grid.join(NodeId(index - 1), Direction::Right, NodeId(index));
                }
                if row > 0 {
                    grid.join(NodeId(index - puzzle.width), Direction::Down, NodeId(index));
                }
            }
        }

        for io in &puzzle.inputs {
            let id = grid.attach(io.to_node, io.direction, Node::Input(InputNode::new(io.data.clone())))?;
            grid.inputs.push(id);
        }
        for io in &puzzle.outputs {
            let id = grid.attach(io.to_node, io.direction, Node::Output(OutputNode::new()))?;
            grid.outputs.push(id);
        }
        for io in &puzzle.visualization {
            let node = Node::Visualization(VisualizationNode::new(
                puzzle.viz_width,
                puzzle.viz_height,
            ));
            let id = grid.attach(io.to_node, io.direction, node)?;
            grid.viz.push(id);
        }

        Ok(grid)
    }

    /// Join two nodes with a fresh channel. `direction` is where `b`
    /// sits relative to `a`; the channel lands in opposite slots on
    /// the two sides.
    fn join(&mut self, a: NodeId, direction: Direction, b: NodeId) {
        let ch = ChannelId(self.channels.len());
        self.channels.push(Channel::new(a, b));
        self.nodes[a.0].set_port(direction, ch);
        self.nodes[b.0].set_port(direction.opposite(), ch);
    }

    /// Attach a boundary tile to an interior cell.
    fn attach(
        &mut self,
        to_node: usize,
        direction: Direction,
        node: Node,
    ) -> Result<NodeId, BuildError> {
        if to_node >= self.cells() {
            return Err(BuildError::Attachment { node: to_node, cells: self.cells() });
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.join(NodeId(to_node), direction, id);
        Ok(id)
    }

    /// Reset every tile and channel for a fresh run and rebuild the
    /// active list.
    pub fn initialize(&mut self) {
        for ch in &mut self.channels {
            ch.clear_pending();
        }
        for node in &mut self.nodes {
            node.initialize();
        }

        self.active.clear();
        for i in 0..self.cells() {
            if let Node::Compute(c) = &self.nodes[i] {
                if c.instruction_count() > 0 {
                    self.active.push(NodeId(i));
                }
            }
        }
        self.active.extend(self.inputs.iter().copied());
        self.active.extend(self.outputs.iter().copied());
        self.active.extend(self.viz.iter().copied());
        for i in 0..self.cells() {
            if matches!(self.nodes[i], Node::Stack(_)) {
                self.active.push(NodeId(i));
            }
        }
    }

    /// Run one cycle: four phase sweeps over the active tiles.
    pub fn step(&mut self) -> Result<(), ExecError> {
        for i in 0..self.active.len() {
            let id = self.active[i];
            self.phase_read(id)?;
        }
        for i in 0..self.active.len() {
            let id = self.active[i];
            self.phase_compute(id)?;
        }
        for i in 0..self.active.len() {
            let id = self.active[i];
            self.phase_write(id);
        }
        for i in 0..self.active.len() {
            let id = self.active[i];
            self.phase_step(id)?;
        }
        Ok(())
    }

    fn phase_read(&mut self, id: NodeId) -> Result<(), ExecError> {
        match self.kind(id) {
            NodeKind::Compute => self.compute_read(id),
            NodeKind::Stack => {
                self.stack_read(id);
                Ok(())
            }
            NodeKind::Output => {
                self.output_read(id);
                Ok(())
            }
            NodeKind::Visualization => {
                self.viz_read(id);
                Ok(())
            }
            NodeKind::Input => Ok(()),
        }
    }

    fn phase_compute(&mut self, id: NodeId) -> Result<(), ExecError> {
        match self.kind(id) {
            NodeKind::Compute => self.compute_compute(id),
            _ => Ok(()),
        }
    }

    fn phase_write(&mut self, id: NodeId) {
        match self.kind(id) {
            NodeKind::Compute => self.compute_write(id),
            NodeKind::Stack => self.stack_write(id),
            NodeKind::Input => self.input_write(id),
            NodeKind::Output | NodeKind::Visualization => {}
        }
    }

    fn phase_step(&mut self, id: NodeId) -> Result<(), ExecError> {
        match self.kind(id) {
            NodeKind::Compute => self.compute_step(id),
            NodeKind::Input => {
                self.input_step(id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // === Channel operations (the rendezvous seam) ===

    /// Offer `value` on a channel. If the other side has a read
    /// pending, deliver synchronously: the receiver's completion runs
    /// first, then the sender's.
    pub(crate) fn channel_write(&mut self, ch: ChannelId, sender: NodeId, value: i32) {
        let side = self.channels[ch.0].side_of(sender);
        let opp = side.opposite();
        let (receiver, deliver) = {
            let e = self.channels[ch.0].endpoint(opp);
            (e.node, e.read_pending)
        };

        if deliver {
            self.channels[ch.0].endpoint_mut(opp).read_pending = false;
            log::trace!("channel{}: write {} delivered to node {}", ch.0, value, receiver.0);
            self.node_read_complete(receiver, value, ch);
            self.node_write_complete(sender, ch);
        } else {
            let relaxed = self.kind(sender) == NodeKind::Stack;
            let e = self.channels[ch.0].endpoint_mut(side);
            debug_assert!(!e.write_pending, "write conflict on channel endpoint");
            debug_assert!(
                relaxed || !e.read_pending,
                "read and write pending on a non-stack endpoint"
            );
            e.write_pending = true;
            e.sent_value = value;
        }
    }

    /// Ask for a value on a channel. If the other side has a write
    /// pending, deliver synchronously: the receiver's completion runs
    /// first, then the sender's, then the offer is cleared.
    pub(crate) fn channel_read(&mut self, ch: ChannelId, receiver: NodeId) {
        let side = self.channels[ch.0].side_of(receiver);
        let opp = side.opposite();
        let (sender, deliver, value) = {
            let e = self.channels[ch.0].endpoint(opp);
            (e.node, e.write_pending, e.sent_value)
        };

        if deliver {
            log::trace!("channel{}: read collected {} from node {}", ch.0, value, sender.0);
            self.node_read_complete(receiver, value, ch);
            self.node_write_complete(sender, ch);
            self.channels[ch.0].endpoint_mut(opp).write_pending = false;
        } else {
            let relaxed = self.kind(receiver) == NodeKind::Stack;
            let e = self.channels[ch.0].endpoint_mut(side);
            debug_assert!(!e.read_pending, "read conflict on channel endpoint");
            debug_assert!(
                relaxed || !e.write_pending,
                "read and write pending on a non-stack endpoint"
            );
            e.read_pending = true;
        }
    }

    /// Retract a pending read. Idempotent; touches only `node`'s side.
    pub(crate) fn cancel_read(&mut self, ch: ChannelId, node: NodeId) {
        let side = self.channels[ch.0].side_of(node);
        self.channels[ch.0].endpoint_mut(side).read_pending = false;
    }

    /// Retract a pending write. Idempotent; touches only `node`'s side.
    pub(crate) fn cancel_write(&mut self, ch: ChannelId, node: NodeId) {
        let side = self.channels[ch.0].side_of(node);
        self.channels[ch.0].endpoint_mut(side).write_pending = false;
    }

    fn node_read_complete(&mut self, id: NodeId, value: i32, via: ChannelId) {
        match self.kind(id) {
            NodeKind::Compute => self.compute_read_complete(id, value, via),
            NodeKind::Stack => self.stack_read_complete(id, value),
            NodeKind::Output => self.output_read_complete(id, value),
            NodeKind::Visualization => self.viz_read_complete(id, value),
            NodeKind::Input => debug_assert!(false, "unexpected ReadComplete on input node"),
        }
    }

    fn node_write_complete(&mut self, id: NodeId, via: ChannelId) {
        match self.kind(id) {
            NodeKind::Compute => self.compute_write_complete(id, via),
            NodeKind::Stack => self.stack_write_complete(id),
            NodeKind::Input => self.input_write_complete(id),
            NodeKind::Output | NodeKind::Visualization => {
                debug_assert!(false, "unexpected WriteComplete on sink node")
            }
        }
    }

    // === Verification ===

    /// Check the grid against the puzzle's expectations.
    ///
    /// - `Some(false)`: an output value mismatched (or overran)
    /// - `Some(true)`: every output sequence is complete and every
    ///   visualization matches
    /// - `None`: keep running
    pub fn verdict(&self, puzzle: &Puzzle) -> Option<bool> {
        let mut finished = true;

        for (id, io) in self.outputs.iter().zip(&puzzle.outputs) {
            let actual = self.output_ref(*id).values();
            let expected = &io.data;
            if !actual.is_empty() {
                if actual.len() > expected.len() {
                    return Some(false);
                }
                if actual.last() != expected.get(actual.len() - 1) {
                    return Some(false);
                }
            }
            if actual.len() != expected.len() {
                finished = false;
            }
        }

        for (id, io) in self.viz.iter().zip(&puzzle.visualization) {
            let bitmap = self.viz_ref(*id).bitmap();
            for j in 0..bitmap.len() {
                // The expected vector may be under-sized; missing
                // entries read as 0.
                let expected = io.data.get(j).copied().unwrap_or(0);
                if bitmap.at(j) != expected {
                    finished = false;
                    break;
                }
            }
        }

        if finished {
            Some(true)
        } else {
            None
        }
    }

    pub fn stats(&self) -> GridStats {
        let mut stats = GridStats { programmed_nodes: 0, instructions: 0 };
        for i in 0..self.cells() {
            if let Node::Compute(c) = &self.nodes[i] {
                let count = c.instruction_count();
                if count > 0 {
                    stats.programmed_nodes += 1;
                    stats.instructions += count;
                }
            }
        }
        stats
    }

    /// Values an output tile has recorded, by attachment order.
    pub fn output_values(&self, index: usize) -> &[i32] {
        self.output_ref(self.outputs[index]).values()
    }

    /// A visualization tile's bitmap, by attachment order.
    pub fn viz_bitmap(&self, index: usize) -> &Bitmap {
        self.viz_ref(self.viz[index]).bitmap()
    }

    // === Typed node access ===

    pub(crate) fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind()
    }

    pub(crate) fn compute_ref(&self, id: NodeId) -> &ComputeNode {
        match &self.nodes[id.0] {
            Node::Compute(n) => n,
            _ => panic!("node {} is not a compute node", id.0),
        }
    }

    pub(crate) fn compute_mut(&mut self, id: NodeId) -> &mut ComputeNode {
        match &mut self.nodes[id.0] {
            Node::Compute(n) => n,
            _ => panic!("node {} is not a compute node", id.0),
        }
    }

    pub(crate) fn stack_ref(&self, id: NodeId) -> &StackNode {
        match &self.nodes[id.0] {
            Node::Stack(n) => n,
            _ => panic!("node {} is not a stack node", id.0),
        }
    }

    pub(crate) fn stack_mut(&mut self, id: NodeId) -> &mut StackNode {
        match &mut self.nodes[id.0] {
            Node::Stack(n) => n,
            _ => panic!("node {} is not a stack node", id.0),
        }
    }

    pub(crate) fn input_mut(&mut self, id: NodeId) -> &mut InputNode {
        match &mut self.nodes[id.0] {
            Node::Input(n) => n,
            _ => panic!("node {} is not an input node", id.0),
        }
    }

    pub(crate) fn output_ref(&self, id: NodeId) -> &OutputNode {
        match &self.nodes[id.0] {
            Node::Output(n) => n,
            _ => panic!("node {} is not an output node", id.0),
        }
    }

    pub(crate) fn output_mut(&mut self, id: NodeId) -> &mut OutputNode {
        match &mut self.nodes[id.0] {
            Node::Output(n) => n,
            _ => panic!("node {} is not an output node", id.0),
        }
    }

    pub(crate) fn viz_ref(&self, id: NodeId) -> &VisualizationNode {
        match &self.nodes[id.0] {
            Node::Visualization(n) => n,
            _ => panic!("node {} is not a visualization node", id.0),
        }
    }

    pub(crate) fn viz_mut(&mut self, id: NodeId) -> &mut VisualizationNode {
        match &mut self.nodes[id.0] {
            Node::Visualization(n) => n,
            _ => panic!("node {} is not a visualization node", id.0),
        }
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("nodes", &self.nodes.len())
            .field("channels", &self.channels.len())
            .field("active", &self.active.len())
            .finish()
    }
}
