//! Compute tile execution.
//!
//! Each grid cycle runs four phases across every tile: Read, Compute,
//! Write, Step. A compute tile decodes its current instruction once
//! per phase and either acts immediately (immediates, `NIL`, `ACC`)
//! or parks itself in a blocking state until a channel completion
//! moves it forward:
//!
//! ```text
//! Unprogrammed --(has instructions, Initialize)--> Run
//! Run --(Read phase, needs a port)--> Read --(match)--> ReadComplete
//! ReadComplete --(next Read phase)--> Run
//! Run --(Write phase, needs a port)--> Write --(match)--> WriteComplete
//! WriteComplete --(Step phase)--> Run
//! ```
//!
//! Completion callbacks run synchronously inside the channel
//! operation, so an `ANY` resolution cancels the sibling port
//! interests before any later tile executes in the same phase.

use crate::asm::{Args, Instruction, JumpTarget, Opcode, Program, Src, Target};

use super::node::{ChannelId, Direction, NodeId};
use super::{ExecError, Grid};

/// Execution state of a compute tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ComputeState {
    /// No instructions; the tile never joins the active list.
    Unprogrammed,
    /// Ready to make progress on the current instruction.
    Run,
    /// Blocked on a port read.
    Read,
    /// A port read landed in `TEMP`; resumes at the next Read phase.
    ReadComplete,
    /// Blocked on a port write.
    Write,
    /// The write was taken; resumes at the next Step phase.
    WriteComplete,
}

/// A programmable tile: program counter, `ACC`, `BAK`, the `TEMP`
/// staging register, and the `LAST` port record.
#[derive(Debug)]
pub struct ComputeNode {
    pub(crate) program: Program,
    pub(crate) state: ComputeState,
    pub(crate) pc: usize,
    pub(crate) acc: i32,
    pub(crate) bak: i32,
    pub(crate) temp: i32,
    pub(crate) last: Option<Direction>,
    pub(crate) ports: [Option<ChannelId>; 4],
}

/// What the Read phase decided to do.
enum ReadSel {
    /// Nothing to read this instruction.
    None,
    /// The value is available without a port.
    Value(i32),
    /// Block on one port.
    Single(Direction),
    /// Block on every connected port.
    Any,
    /// A non-`JRO` jump with a port operand.
    IllegalPortJump,
}

/// What the Write phase decided to do.
enum WriteSel {
    None,
    Acc,
    Single(Direction),
    Any,
}

impl ComputeNode {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            state: ComputeState::Unprogrammed,
            pc: 0,
            acc: 0,
            bak: 0,
            temp: 0,
            last: None,
            ports: [None; 4],
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.program.len()
    }

    pub(crate) fn initialize(&mut self) {
        self.state = if self.program.is_empty() {
            ComputeState::Unprogrammed
        } else {
            ComputeState::Run
        };
        self.pc = 0;
        self.acc = 0;
        self.bak = 0;
        self.temp = 0;
        self.last = None;
    }

    pub(crate) fn current(&self) -> &Instruction {
        &self.program.instructions[self.pc]
    }

    /// The neighbor slot a channel is installed in, if any.
    pub(crate) fn direction_of(&self, channel: ChannelId) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|d| self.ports[d.index()] == Some(channel))
    }

    fn read_selection(&self) -> ReadSel {
        let instr = self.current();
        let target = match &instr.args {
            Args::Source(src) | Args::Move(src, _) => match *src {
                Src::Imm(value) => return ReadSel::Value(value),
                Src::Target(t) => Some(t),
            },
            Args::Jump(JumpTarget::Port(t)) => {
                if instr.op == Opcode::Jro {
                    Some(*t)
                } else {
                    return ReadSel::IllegalPortJump;
                }
            }
            _ => None,
        };

        match target {
            None => ReadSel::None,
            Some(Target::Nil) => ReadSel::Value(0),
            Some(Target::Acc) => ReadSel::Value(self.acc),
            Some(Target::Any) => ReadSel::Any,
            Some(Target::Last) => match self.last {
                // Reading an unset LAST behaves as reading NIL.
                None => ReadSel::Value(0),
                Some(d) => ReadSel::Single(d),
            },
            Some(t) => ReadSel::Single(Direction::from_target(t).unwrap()),
        }
    }

    fn write_selection(&self) -> WriteSel {
        let Args::Move(_, dst) = &self.current().args else {
            return WriteSel::None;
        };
        match dst {
            Target::Nil => WriteSel::None,
            Target::Acc => WriteSel::Acc,
            Target::Any => WriteSel::Any,
            Target::Last => match self.last {
                // Writing an unset LAST behaves as writing NIL.
                None => WriteSel::None,
                Some(d) => WriteSel::Single(d),
            },
            t => WriteSel::Single(Direction::from_target(*t).unwrap()),
        }
    }
}

impl Grid {
    /// Read phase of one compute tile.
    pub(crate) fn compute_read(&mut self, id: NodeId) -> Result<(), ExecError> {
        let sel = {
            let n = self.compute_mut(id);
            match n.state {
                ComputeState::ReadComplete => {
                    // The value already landed in TEMP.
                    n.state = ComputeState::Run;
                    return Ok(());
                }
                ComputeState::Run => {}
                _ => return Ok(()),
            }
            n.read_selection()
        };

        match sel {
            ReadSel::None => {}
            ReadSel::Value(v) => self.compute_mut(id).temp = v,
            ReadSel::Single(d) => {
                let n = self.compute_mut(id);
                n.state = ComputeState::Read;
                let port = n.ports[d.index()];
                log::trace!("compute{}: reading from {}", id.0, d);
                if let Some(ch) = port {
                    self.channel_read(ch, id);
                }
            }
            ReadSel::Any => {
                self.compute_mut(id).state = ComputeState::Read;
                log::trace!("compute{}: reading from ANY", id.0);
                for d in Direction::ANY_READ {
                    if self.compute_ref(id).state != ComputeState::Read {
                        // Already resolved; leave the rest unarmed.
                        break;
                    }
                    if let Some(ch) = self.compute_ref(id).ports[d.index()] {
                        self.channel_read(ch, id);
                    }
                }
            }
            ReadSel::IllegalPortJump => {
                return Err(ExecError::IllegalInstruction {
                    node: id.0,
                    pc: self.compute_ref(id).pc,
                });
            }
        }
        Ok(())
    }

    /// A port read resolved for this tile.
    pub(crate) fn compute_read_complete(&mut self, id: NodeId, value: i32, via: ChannelId) {
        let (was_any, ports) = {
            let n = self.compute_mut(id);
            debug_assert!(
                n.state == ComputeState::Read,
                "unexpected ReadComplete on compute node"
            );
            n.temp = value;
            n.state = ComputeState::ReadComplete;
            let was_any = n.current().reads_any();
            if was_any {
                n.last = n.direction_of(via);
            }
            (was_any, n.ports)
        };
        log::trace!("compute{}: read complete ({})", id.0, value);
        if was_any {
            for ch in ports.into_iter().flatten() {
                self.cancel_read(ch, id);
            }
        }
    }

    /// Compute phase: the purely internal effect of the instruction.
    pub(crate) fn compute_compute(&mut self, id: NodeId) -> Result<(), ExecError> {
        let n = self.compute_mut(id);
        if n.state != ComputeState::Run {
            return Ok(());
        }
        match n.current().op {
            Opcode::Add => n.acc += n.temp,
            Opcode::Sub => n.acc -= n.temp,
            Opcode::Sav => n.bak = n.acc,
            Opcode::Swp => std::mem::swap(&mut n.acc, &mut n.bak),
            Opcode::Hcf => return Err(ExecError::Hcf { node: id.0, pc: n.pc }),
            _ => {}
        }
        Ok(())
    }

    /// Write phase of one compute tile.
    pub(crate) fn compute_write(&mut self, id: NodeId) {
        let sel = {
            let n = self.compute_ref(id);
            if n.state != ComputeState::Run {
                return;
            }
            n.write_selection()
        };

        match sel {
            WriteSel::None => {}
            WriteSel::Acc => {
                let n = self.compute_mut(id);
                n.acc = n.temp;
            }
            WriteSel::Single(d) => {
                let n = self.compute_mut(id);
                n.state = ComputeState::Write;
                let value = n.temp;
                let port = n.ports[d.index()];
                log::trace!("compute{}: writing {} to {}", id.0, value, d);
                if let Some(ch) = port {
                    self.channel_write(ch, id, value);
                }
            }
            WriteSel::Any => {
                let value = {
                    let n = self.compute_mut(id);
                    n.state = ComputeState::Write;
                    n.temp
                };
                log::trace!("compute{}: writing {} to ANY", id.0, value);
                for d in Direction::ANY_WRITE {
                    if self.compute_ref(id).state != ComputeState::Write {
                        break;
                    }
                    if let Some(ch) = self.compute_ref(id).ports[d.index()] {
                        self.channel_write(ch, id, value);
                    }
                }
            }
        }
    }

    /// A port write was taken from this tile.
    pub(crate) fn compute_write_complete(&mut self, id: NodeId, via: ChannelId) {
        let (was_any, ports) = {
            let n = self.compute_mut(id);
            debug_assert!(
                n.state == ComputeState::Write,
                "unexpected WriteComplete on compute node"
            );
            n.state = ComputeState::WriteComplete;
            let was_any = n.current().writes_any();
            if was_any {
                n.last = n.direction_of(via);
            }
            (was_any, n.ports)
        };
        log::trace!("compute{}: write complete", id.0);
        if was_any {
            for ch in ports.into_iter().flatten() {
                self.cancel_write(ch, id);
            }
        }
    }

    /// Step phase: advance the program counter.
    pub(crate) fn compute_step(&mut self, id: NodeId) -> Result<(), ExecError> {
        let n = self.compute_mut(id);
        match n.state {
            ComputeState::WriteComplete => n.state = ComputeState::Run,
            ComputeState::Run => {}
            _ => return Ok(()),
        }

        let instr = n.current();
        let taken = match instr.op {
            Opcode::Jmp | Opcode::Jro => true,
            Opcode::Jez => n.acc == 0,
            Opcode::Jnz => n.acc != 0,
            Opcode::Jgz => n.acc > 0,
            Opcode::Jlz => n.acc < 0,
            _ => false,
        };
        let clamp_on_overflow = taken && instr.op == Opcode::Jro;

        let mut next = if taken {
            match &instr.args {
                Args::Jump(JumpTarget::Label(name)) => match n.program.labels.get(name) {
                    Some(&index) => index as i64,
                    None => {
                        return Err(ExecError::UndefinedLabel {
                            node: id.0,
                            pc: n.pc,
                            label: name.clone(),
                        });
                    }
                },
                Args::Jump(JumpTarget::Offset(offset)) => n.pc as i64 + *offset as i64,
                // The offset was read into TEMP during the Read phase.
                Args::Jump(JumpTarget::Port(_)) => n.pc as i64 + n.temp as i64,
                _ => unreachable!("jump opcode without jump operand"),
            }
        } else {
            n.pc as i64 + 1
        };

        let count = n.program.len() as i64;
        if next >= count {
            // A JRO past the end lands on the last instruction;
            // everything else wraps around.
            next = if clamp_on_overflow { count - 1 } else { 0 };
        } else if next < 0 {
            next = 0;
        }
        n.pc = next as usize;
        log::trace!("compute{}: pc -> {}", id.0, n.pc);
        Ok(())
    }
}
