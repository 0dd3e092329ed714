//! Port channel state.
//!
//! A channel is the rendezvous object joining two tiles:
//!
//! - Each side owns an [`Endpoint`] carrying its pending-read and
//!   pending-write flags and the value offered by a blocked writer.
//! - The matching logic lives on [`super::Grid`], which owns both the
//!   channel and the two tiles and can therefore run completion
//!   callbacks synchronously; this module only holds the state.
//! - Keeping one endpoint per side (instead of a single
//!   sender/receiver slot) means a tile that has both interests
//!   outstanding (a stack node) can never match against itself:
//!   operations only ever consult the opposite endpoint.

use super::node::NodeId;

/// One side of a channel.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    /// The tile that owns this side.
    pub node: NodeId,
    /// The owner has a read outstanding.
    pub read_pending: bool,
    /// The owner has a write outstanding; `sent_value` holds it.
    pub write_pending: bool,
    pub sent_value: i32,
}

impl Endpoint {
    fn new(node: NodeId) -> Self {
        Self { node, read_pending: false, write_pending: false, sent_value: 0 }
    }
}

/// Which side of a channel a tile is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// A two-endpoint rendezvous for a single signed integer.
///
/// Joined to exactly two tiles for its entire life.
#[derive(Debug, Clone)]
pub struct Channel {
    a: Endpoint,
    b: Endpoint,
}

impl Channel {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        Self { a: Endpoint::new(a), b: Endpoint::new(b) }
    }

    /// Which side `node` owns. The node must be one of the two ends.
    pub fn side_of(&self, node: NodeId) -> Side {
        if node == self.a.node {
            Side::A
        } else if node == self.b.node {
            Side::B
        } else {
            panic!("node {} is not joined to this channel", node.0);
        }
    }

    pub fn endpoint(&self, side: Side) -> &Endpoint {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    pub fn endpoint_mut(&mut self, side: Side) -> &mut Endpoint {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    /// Drop all pending interest on both sides (run reset).
    pub fn clear_pending(&mut self) {
        for e in [&mut self.a, &mut self.b] {
            e.read_pending = false;
            e.write_pending = false;
        }
    }
}
