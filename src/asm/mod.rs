//! Tile assembly language: instruction model and assembler.
//!
//! The language is line-oriented and whitespace-sensitive. Each line
//! holds at most one instruction, optionally preceded by `label:`
//! definitions; `#` starts a comment that runs to end of line. The
//! assembler is a single-pass character scanner: label references
//! are *not* resolved here, they are looked up when a jump is taken
//! (an undefined label is a runtime error, not a parse error).

pub mod assembler;
pub mod instruction;

pub use assembler::{assemble, ParseError, ParseErrorKind};
pub use instruction::{Args, Instruction, JumpTarget, Opcode, Program, Src, Target};
