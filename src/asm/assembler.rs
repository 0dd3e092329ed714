//! Single-pass assembler for tile source text.
//!
//! The scanner walks the source one character at a time, accumulating
//! words and committing an instruction at each newline. Operand slots
//! fill left to right as words complete; `:` turns the pending word
//! into a label as long as no opcode has been seen on the line, and
//! `,` is only accepted between the two operands of a `MOV`.
//!
//! Label references are not resolved here (see the module docs of
//! [`crate::asm`]); label *definitions* are validated and must be
//! unique.

use std::fmt;

use thiserror::Error;

use super::instruction::{ArgShape, Args, Instruction, JumpTarget, Opcode, Program, Src, Target};

/// What went wrong, without the location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unrecognized instruction opcode")]
    UnknownOpcode,
    #[error("expected a port, register or integer literal")]
    SourceExpected,
    #[error("destination must be a port or register, not an integer")]
    TargetExpected,
    #[error("unrecognized target")]
    UnknownTarget,
    #[error("JRO needs either a port, a register, or a number")]
    BadJumpTarget,
    #[error("instruction does not take arguments")]
    UnexpectedOperand,
    #[error("instruction already has its operands")]
    ExtraOperand,
    #[error("missing source operand")]
    MissingSource,
    #[error("missing destination operand")]
    MissingDestination,
    #[error("missing jump target")]
    MissingJumpTarget,
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("invalid label")]
    InvalidLabel,
    #[error("duplicate label")]
    DuplicateLabel,
}

/// A syntax error, qualified with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based source line.
    pub line: usize,
    /// 1-based column of the offending lexeme (or of the line end for
    /// missing-operand errors).
    pub column: usize,
    /// The offending word, empty when the error is positional.
    pub lexeme: String,
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)?;
        if !self.lexeme.is_empty() {
            write!(f, " \"{}\"", self.lexeme)?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Characters that may appear inside a word. Covers mnemonics,
/// targets, signed decimal literals, and label names.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// A syntactically valid label name: `[A-Za-z_][A-Za-z0-9_]*`.
fn is_valid_label(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Default)]
struct Assembler {
    program: Program,
    op: Option<Opcode>,
    src: Option<Src>,
    dst: Option<Target>,
    jump: Option<JumpTarget>,
    word: String,
    word_col: usize,
    line: usize,
    col: usize,
    in_comment: bool,
}

impl Assembler {
    fn new() -> Self {
        Self { line: 1, ..Self::default() }
    }

    fn err_here(&self, kind: ParseErrorKind) -> ParseError {
        ParseError { line: self.line, column: self.col, lexeme: String::new(), kind }
    }

    fn err_word(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            line: self.line,
            column: self.word_col,
            lexeme: self.word.clone(),
            kind,
        }
    }

    fn step(&mut self, c: char) -> Result<(), ParseError> {
        if c == '\n' {
            if !self.in_comment {
                self.flush_word()?;
                self.end_instruction()?;
            }
            self.in_comment = false;
            self.line += 1;
            self.col = 0;
            return Ok(());
        }

        self.col += 1;
        if self.in_comment {
            return Ok(());
        }

        match c {
            ' ' | '\r' => self.flush_word(),
            '#' => {
                self.flush_word()?;
                self.end_instruction()?;
                self.in_comment = true;
                Ok(())
            }
            ':' if self.op.is_none() => self.define_label(),
            ',' if self.op.map(Opcode::shape) == Some(ArgShape::SourceDest)
                && self.dst.is_none()
                && (self.src.is_some() || !self.word.is_empty()) =>
            {
                // Separator between the MOV operands; the first one may
                // still be sitting in `word`.
                self.flush_word()
            }
            _ if is_word_char(c) => {
                if self.word.is_empty() {
                    self.word_col = self.col;
                }
                self.word.push(c);
                Ok(())
            }
            _ => Err(self.err_here(ParseErrorKind::InvalidCharacter(c))),
        }
    }

    /// Commit the pending word into the next open operand slot.
    fn flush_word(&mut self) -> Result<(), ParseError> {
        if self.word.is_empty() {
            return Ok(());
        }

        let op = match self.op {
            None => {
                let op = Opcode::parse(&self.word)
                    .ok_or_else(|| self.err_word(ParseErrorKind::UnknownOpcode))?;
                self.op = Some(op);
                self.word.clear();
                return Ok(());
            }
            Some(op) => op,
        };

        match op.shape() {
            ArgShape::Nullary => return Err(self.err_word(ParseErrorKind::UnexpectedOperand)),
            ArgShape::Source => {
                if self.src.is_some() {
                    return Err(self.err_word(ParseErrorKind::ExtraOperand));
                }
                self.src = Some(self.parse_src()?);
            }
            ArgShape::SourceDest => {
                if self.src.is_none() {
                    self.src = Some(self.parse_src()?);
                } else if self.dst.is_none() {
                    self.dst = Some(self.parse_dst()?);
                } else {
                    return Err(self.err_word(ParseErrorKind::ExtraOperand));
                }
            }
            ArgShape::Jump => {
                if self.jump.is_some() {
                    return Err(self.err_word(ParseErrorKind::ExtraOperand));
                }
                self.jump = Some(self.parse_jump(op)?);
            }
        }
        self.word.clear();
        Ok(())
    }

    fn parse_src(&self) -> Result<Src, ParseError> {
        if let Some(t) = Target::parse(&self.word) {
            return Ok(Src::Target(t));
        }
        self.word
            .parse::<i32>()
            .map(Src::Imm)
            .map_err(|_| self.err_word(ParseErrorKind::SourceExpected))
    }

    fn parse_dst(&self) -> Result<Target, ParseError> {
        if let Some(t) = Target::parse(&self.word) {
            return Ok(t);
        }
        if self.word.parse::<i32>().is_ok() {
            Err(self.err_word(ParseErrorKind::TargetExpected))
        } else {
            Err(self.err_word(ParseErrorKind::UnknownTarget))
        }
    }

    fn parse_jump(&self, op: Opcode) -> Result<JumpTarget, ParseError> {
        if op == Opcode::Jro {
            if let Some(t) = Target::parse(&self.word) {
                return Ok(JumpTarget::Port(t));
            }
            return self
                .word
                .parse::<i32>()
                .map(JumpTarget::Offset)
                .map_err(|_| self.err_word(ParseErrorKind::BadJumpTarget));
        }
        if let Ok(offset) = self.word.parse::<i32>() {
            return Ok(JumpTarget::Offset(offset));
        }
        Ok(JumpTarget::Label(self.word.clone()))
    }

    fn define_label(&mut self) -> Result<(), ParseError> {
        if !is_valid_label(&self.word) {
            return Err(self.err_word(ParseErrorKind::InvalidLabel));
        }
        let index = self.program.instructions.len();
        let name = std::mem::take(&mut self.word);
        if self.program.labels.contains_key(&name) {
            self.word = name;
            return Err(self.err_word(ParseErrorKind::DuplicateLabel));
        }
        self.program.labels.insert(name, index);
        Ok(())
    }

    /// The line ended; validate arity and emit the instruction.
    fn end_instruction(&mut self) -> Result<(), ParseError> {
        let Some(op) = self.op else { return Ok(()) };

        let args = match op.shape() {
            ArgShape::Nullary => Args::None,
            ArgShape::Source => Args::Source(
                self.src
                    .ok_or_else(|| self.err_here(ParseErrorKind::MissingSource))?,
            ),
            ArgShape::SourceDest => {
                let src = self
                    .src
                    .ok_or_else(|| self.err_here(ParseErrorKind::MissingSource))?;
                let dst = self
                    .dst
                    .ok_or_else(|| self.err_here(ParseErrorKind::MissingDestination))?;
                Args::Move(src, dst)
            }
            ArgShape::Jump => Args::Jump(
                self.jump
                    .take()
                    .ok_or_else(|| self.err_here(ParseErrorKind::MissingJumpTarget))?,
            ),
        };

        self.program.instructions.push(Instruction::new(op, args));
        self.op = None;
        self.src = None;
        self.dst = None;
        self.jump = None;
        Ok(())
    }
}

/// Assemble tile source text into a [`Program`].
///
/// Fails fast at the first syntax error.
pub fn assemble(source: &str) -> Result<Program, ParseError> {
    let mut asm = Assembler::new();
    for c in source.chars().chain(std::iter::once('\n')) {
        asm.step(c)?;
    }
    log::debug!(
        "assembled {} instructions, {} labels",
        asm.program.instructions.len(),
        asm.program.labels.len()
    );
    Ok(asm.program)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_target() -> impl Strategy<Value = Target> {
        prop_oneof![
            Just(Target::Nil),
            Just(Target::Acc),
            Just(Target::Up),
            Just(Target::Down),
            Just(Target::Left),
            Just(Target::Right),
            Just(Target::Any),
            Just(Target::Last),
        ]
    }

    fn arb_src() -> impl Strategy<Value = Src> {
        prop_oneof![
            arb_target().prop_map(Src::Target),
            (-999i32..=999).prop_map(Src::Imm),
        ]
    }

    fn arb_jump_op() -> impl Strategy<Value = Opcode> {
        prop_oneof![
            Just(Opcode::Jmp),
            Just(Opcode::Jez),
            Just(Opcode::Jnz),
            Just(Opcode::Jgz),
            Just(Opcode::Jlz),
        ]
    }

    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        prop_oneof![
            prop_oneof![
                Just(Opcode::Nop),
                Just(Opcode::Sav),
                Just(Opcode::Swp),
                Just(Opcode::Hcf)
            ]
            .prop_map(|op| Instruction::new(op, Args::None)),
            (prop_oneof![Just(Opcode::Add), Just(Opcode::Sub)], arb_src())
                .prop_map(|(op, src)| Instruction::new(op, Args::Source(src))),
            (arb_src(), arb_target())
                .prop_map(|(src, dst)| Instruction::new(Opcode::Mov, Args::Move(src, dst))),
            (arb_jump_op(), "[a-z_][a-z0-9_]{0,7}")
                .prop_map(|(op, label)| Instruction::new(op, Args::Jump(JumpTarget::Label(label)))),
            (arb_jump_op(), -99i32..=99)
                .prop_map(|(op, o)| Instruction::new(op, Args::Jump(JumpTarget::Offset(o)))),
            (-99i32..=99).prop_map(|o| Instruction::new(Opcode::Jro, Args::Jump(JumpTarget::Offset(o)))),
            arb_target()
                .prop_map(|t| Instruction::new(Opcode::Jro, Args::Jump(JumpTarget::Port(t)))),
        ]
    }

    proptest! {
        /// The canonical text of any instruction list re-assembles to
        /// an equivalent program.
        #[test]
        fn round_trip_through_canonical_text(
            instructions in prop::collection::vec(arb_instruction(), 0..24)
        ) {
            let source: String = instructions
                .iter()
                .map(|i| format!("{i}\n"))
                .collect();
            let program = assemble(&source).unwrap();
            prop_assert_eq!(&program.instructions, &instructions);
            prop_assert!(program.labels.is_empty());
        }
    }
}
