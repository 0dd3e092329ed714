//! tis-emu: cycle-accurate simulator for a TIS-100-style tile grid.
//!
//! Runs a saved program against a catalog puzzle three times with
//! refreshed random inputs, or sweeps a directory of saves whose
//! names begin with a puzzle number.

use std::env;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::LazyLock;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;

use tis_emu::puzzle::{catalog, save};
use tis_emu::runner;

/// Save files are named `<puzzle number>.<anything>`.
static SAVE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.").unwrap());

/// Test runs per puzzle, each with freshly generated inputs.
const TEST_RUNS: usize = 3;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        usage(&args);
        exit(-1);
    }

    let result = if args[1] == "all" {
        run_directory(Path::new(&args[2]))
    } else {
        match args[1].parse::<i32>() {
            Ok(number) => run_save(number, Path::new(&args[2])),
            Err(_) => {
                println!("invalid puzzle number");
                usage(&args);
                exit(-1);
            }
        }
    };

    if let Err(e) = result {
        println!("{e:#}");
        exit(1);
    }
}

fn usage(args: &[String]) {
    let program = args.first().map(String::as_str).unwrap_or("tis-emu");
    println!(
        "usage: {program} <puzzle number> <save file>\n\
         \x20      {program} all <save directory>\n\
         \n\
         In the second form every file named <number>.<anything> in the\n\
         directory is tested against the puzzle its name designates."
    );
}

/// Run one save file against its puzzle.
fn run_save(number: i32, path: &Path) -> anyhow::Result<()> {
    // Fixed seed so every invocation sees the same input streams.
    let mut rng = StdRng::seed_from_u64(0);
    test_puzzle(number, path, &mut rng)
}

/// Run every save in a directory, in name order.
fn run_directory(dir: &Path) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(0);

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading save directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    paths.sort();

    let mut failures = 0;
    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        let Some(caps) = SAVE_NAME.captures(name) else { continue };
        let Ok(number) = caps[1].parse::<i32>() else {
            println!("{}: puzzle number out of range", path.display());
            failures += 1;
            continue;
        };
        if let Err(e) = test_puzzle(number, &path, &mut rng) {
            println!("{}: {e:#}", path.display());
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} save(s) failed to run");
    }
    Ok(())
}

/// Three consecutive test runs with refreshed random inputs.
fn test_puzzle(number: i32, path: &Path, rng: &mut StdRng) -> anyhow::Result<()> {
    for _ in 0..TEST_RUNS {
        let mut puzzle = catalog::build(number, rng)?;
        save::read_save_file(path, &mut puzzle)
            .with_context(|| format!("reading save file {}", path.display()))?;
        let report = runner::run_puzzle(&puzzle)?;
        println!(
            "{}: {} - {} in {} cycles, {} nodes, {} instructions.",
            number,
            puzzle.name,
            if report.success { "success" } else { "failure" },
            report.cycles,
            report.programmed_nodes,
            report.instructions
        );
    }
    Ok(())
}
