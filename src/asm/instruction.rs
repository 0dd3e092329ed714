//! Instruction model for the tile assembly language.
//!
//! Instructions are a closed opcode set with one of four operand
//! shapes: no operand, a single source, a source plus a destination,
//! or a jump target. Sources are either a [`Target`] or an immediate
//! integer; jump targets are a label, a numeric offset, or (for `JRO`
//! only) a port read at runtime.

use std::collections::HashMap;
use std::fmt;

/// Operation codes, matched case-sensitively by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Mov,
    Add,
    Sub,
    Sav,
    Swp,
    Jmp,
    Jez,
    Jnz,
    Jgz,
    Jlz,
    Jro,
    Hcf,
}

/// Operand shape an opcode expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// No operands (`NOP`, `SAV`, `SWP`, `HCF`).
    Nullary,
    /// One source operand (`ADD`, `SUB`).
    Source,
    /// Source then destination (`MOV`).
    SourceDest,
    /// One jump target (`JMP`, `JEZ`, `JNZ`, `JGZ`, `JLZ`, `JRO`).
    Jump,
}

impl Opcode {
    /// Parse an opcode mnemonic. Case-sensitive.
    pub fn parse(word: &str) -> Option<Opcode> {
        Some(match word {
            "NOP" => Opcode::Nop,
            "MOV" => Opcode::Mov,
            "ADD" => Opcode::Add,
            "SUB" => Opcode::Sub,
            "SAV" => Opcode::Sav,
            "SWP" => Opcode::Swp,
            "JMP" => Opcode::Jmp,
            "JEZ" => Opcode::Jez,
            "JNZ" => Opcode::Jnz,
            "JGZ" => Opcode::Jgz,
            "JLZ" => Opcode::Jlz,
            "JRO" => Opcode::Jro,
            "HCF" => Opcode::Hcf,
            _ => return None,
        })
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Mov => "MOV",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Sav => "SAV",
            Opcode::Swp => "SWP",
            Opcode::Jmp => "JMP",
            Opcode::Jez => "JEZ",
            Opcode::Jnz => "JNZ",
            Opcode::Jgz => "JGZ",
            Opcode::Jlz => "JLZ",
            Opcode::Jro => "JRO",
            Opcode::Hcf => "HCF",
        }
    }

    /// Operand shape this opcode requires.
    pub fn shape(self) -> ArgShape {
        match self {
            Opcode::Nop | Opcode::Sav | Opcode::Swp | Opcode::Hcf => ArgShape::Nullary,
            Opcode::Add | Opcode::Sub => ArgShape::Source,
            Opcode::Mov => ArgShape::SourceDest,
            Opcode::Jmp | Opcode::Jez | Opcode::Jnz | Opcode::Jgz | Opcode::Jlz | Opcode::Jro => {
                ArgShape::Jump
            }
        }
    }

    pub fn is_jump(self) -> bool {
        self.shape() == ArgShape::Jump
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A source or sink visible to a compute tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Reads as zero, writes are discarded.
    Nil,
    /// The accumulator register.
    Acc,
    Up,
    Down,
    Left,
    Right,
    /// Any neighbor port; first to rendezvous wins.
    Any,
    /// The port that satisfied the most recent `ANY`.
    Last,
}

impl Target {
    /// Parse a target name. Case-sensitive.
    pub fn parse(word: &str) -> Option<Target> {
        Some(match word {
            "NIL" => Target::Nil,
            "ACC" => Target::Acc,
            "UP" => Target::Up,
            "DOWN" => Target::Down,
            "LEFT" => Target::Left,
            "RIGHT" => Target::Right,
            "ANY" => Target::Any,
            "LAST" => Target::Last,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Target::Nil => "NIL",
            Target::Acc => "ACC",
            Target::Up => "UP",
            Target::Down => "DOWN",
            Target::Left => "LEFT",
            Target::Right => "RIGHT",
            Target::Any => "ANY",
            Target::Last => "LAST",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A source operand: a target or an immediate integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Src {
    Target(Target),
    Imm(i32),
}

impl fmt::Display for Src {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Src::Target(t) => write!(f, "{t}"),
            Src::Imm(v) => write!(f, "{v}"),
        }
    }
}

/// Operand of a jump opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    /// A label looked up when the jump is taken.
    Label(String),
    /// A relative offset added to the program counter.
    Offset(i32),
    /// A port supplying the offset at runtime. Only legal for `JRO`.
    Port(Target),
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpTarget::Label(name) => f.write_str(name),
            JumpTarget::Offset(o) => write!(f, "{o}"),
            JumpTarget::Port(t) => write!(f, "{t}"),
        }
    }
}

/// Operand payload, one variant per [`ArgShape`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Args {
    None,
    Source(Src),
    Move(Src, Target),
    Jump(JumpTarget),
}

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub args: Args,
}

impl Instruction {
    pub fn new(op: Opcode, args: Args) -> Self {
        Self { op, args }
    }

    /// The source operand read during the Read phase, if any.
    pub fn source(&self) -> Option<&Src> {
        match &self.args {
            Args::Source(src) | Args::Move(src, _) => Some(src),
            _ => None,
        }
    }

    /// True if the Read phase of this instruction polls every port.
    pub fn reads_any(&self) -> bool {
        match &self.args {
            Args::Source(Src::Target(Target::Any)) | Args::Move(Src::Target(Target::Any), _) => {
                true
            }
            Args::Jump(JumpTarget::Port(Target::Any)) => true,
            _ => false,
        }
    }

    /// True if the Write phase of this instruction offers to every port.
    pub fn writes_any(&self) -> bool {
        matches!(&self.args, Args::Move(_, Target::Any))
    }
}

impl fmt::Display for Instruction {
    /// Canonical text form; re-assembling it yields an equal instruction.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.args {
            Args::None => write!(f, "{}", self.op),
            Args::Source(src) => write!(f, "{} {src}", self.op),
            Args::Move(src, dst) => write!(f, "{} {src},{dst}", self.op),
            Args::Jump(target) => write!(f, "{} {target}", self.op),
        }
    }
}

/// An assembled tile program: instructions plus the label table.
///
/// Labels map a name to the index of the instruction they precede; a
/// label at the very end of the source maps to `instructions.len()`
/// and wraps to 0 when jumped to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub labels: HashMap<String, usize>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Program {
    /// Canonical listing: label definitions on their own lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut by_index: Vec<(&str, usize)> =
            self.labels.iter().map(|(name, &i)| (name.as_str(), i)).collect();
        by_index.sort();
        for (i, instr) in self.instructions.iter().enumerate() {
            for (name, index) in &by_index {
                if *index == i {
                    writeln!(f, "{name}:")?;
                }
            }
            writeln!(f, "{instr}")?;
        }
        for (name, index) in &by_index {
            if *index == self.instructions.len() {
                writeln!(f, "{name}:")?;
            }
        }
        Ok(())
    }
}
