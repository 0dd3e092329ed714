//! Save-file reader.
//!
//! A save is plain text. Sections are introduced by lines starting
//! with `@`; the index after the `@` is ignored: sections are
//! assigned to grid cells in increasing order, skipping over the
//! puzzle's bad and stack cells (the format never writes those).
//! Anything before the first `@` is discarded.

use std::path::Path;

use thiserror::Error;

use super::Puzzle;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("save file holds a program for a node past the end of the grid")]
    TooManyPrograms,
}

/// Read a save file and install its programs into `puzzle`.
pub fn read_save_file(path: &Path, puzzle: &mut Puzzle) -> Result<(), SaveError> {
    let text = std::fs::read_to_string(path)?;
    apply_save(&text, puzzle)
}

/// Install save-file text into `puzzle`.
pub fn apply_save(text: &str, puzzle: &mut Puzzle) -> Result<(), SaveError> {
    let mut node: Option<usize> = None;
    let mut program = String::new();

    for line in text.lines() {
        if line.starts_with('@') {
            commit(node, &mut program, puzzle)?;
            node = Some(next_assignable(puzzle, node));
        } else if node.is_some() {
            program.push_str(line);
            program.push('\n');
        }
    }
    commit(node, &mut program, puzzle)?;

    log::debug!(
        "save installed programs into {} of {} cells",
        puzzle.programs.iter().filter(|p| !p.is_empty()).count(),
        puzzle.cells()
    );
    Ok(())
}

/// The next grid cell a section may program: one past the previous,
/// skipping bad and stack cells. May run past the grid; `commit`
/// rejects that only if the section actually holds code.
fn next_assignable(puzzle: &Puzzle, current: Option<usize>) -> usize {
    let mut n = current.map_or(0, |c| c + 1);
    while puzzle.bad_nodes.contains(&n) || puzzle.stack_nodes.contains(&n) {
        n += 1;
    }
    n
}

fn commit(node: Option<usize>, program: &mut String, puzzle: &mut Puzzle) -> Result<(), SaveError> {
    if program.is_empty() {
        return Ok(());
    }
    let text = std::mem::take(program);
    match node {
        Some(n) if n < puzzle.programs.len() => {
            puzzle.programs[n] = text;
            Ok(())
        }
        Some(_) => Err(SaveError::TooManyPrograms),
        // Content before the first '@' is discarded.
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_fill_in_order() {
        let mut p = Puzzle::new("t");
        apply_save("@0\nNOP\n@1\nSWP\nSAV\n@2\n", &mut p).unwrap();
        assert_eq!(p.programs[0], "NOP\n");
        assert_eq!(p.programs[1], "SWP\nSAV\n");
        assert_eq!(p.programs[2], "");
    }

    #[test]
    fn test_section_indices_are_ignored() {
        // Positions come from the order of sections, not the numbers.
        let mut p = Puzzle::new("t");
        apply_save("@7\nNOP\n@3\nSWP\n", &mut p).unwrap();
        assert_eq!(p.programs[0], "NOP\n");
        assert_eq!(p.programs[1], "SWP\n");
    }

    #[test]
    fn test_bad_and_stack_nodes_are_skipped() {
        let mut p = Puzzle::new("t");
        p.bad_nodes.insert(0);
        p.bad_nodes.insert(2);
        p.stack_nodes.insert(3);
        apply_save("@0\nNOP\n@1\nSWP\n", &mut p).unwrap();
        assert_eq!(p.programs[0], "");
        assert_eq!(p.programs[1], "NOP\n");
        assert_eq!(p.programs[2], "");
        assert_eq!(p.programs[3], "");
        assert_eq!(p.programs[4], "SWP\n");
    }

    #[test]
    fn test_preamble_is_discarded() {
        let mut p = Puzzle::new("t");
        apply_save("junk header\nmore junk\n@0\nNOP\n", &mut p).unwrap();
        assert_eq!(p.programs[0], "NOP\n");
        assert!(p.programs[1..].iter().all(|s| s.is_empty()));
    }

    #[test]
    fn test_empty_trailing_sections_are_tolerated() {
        let mut p = Puzzle::with_size("t", 2, 1);
        apply_save("@0\nNOP\n@1\n@2\n@3\n", &mut p).unwrap();
        assert_eq!(p.programs[0], "NOP\n");
    }

    #[test]
    fn test_overflowing_program_is_an_error() {
        let mut p = Puzzle::with_size("t", 2, 1);
        let err = apply_save("@0\nNOP\n@1\nNOP\n@2\nNOP\n", &mut p).unwrap_err();
        assert!(matches!(err, SaveError::TooManyPrograms));
    }

    #[test]
    fn test_crlf_saves() {
        let mut p = Puzzle::new("t");
        apply_save("@0\r\nMOV UP,DOWN\r\n", &mut p).unwrap();
        assert_eq!(p.programs[0], "MOV UP,DOWN\n");
    }
}
