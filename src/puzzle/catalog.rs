//! Built-in puzzle catalog.
//!
//! Each entry builds a [`Puzzle`] with freshly generated random input
//! streams and the expected outputs derived from them, so consecutive
//! builds from the same RNG produce different data while a fixed seed
//! keeps whole runs reproducible.
//!
//! Negative numbers are simulator debug scenarios with hardcoded
//! programs; positive numbers take their programs from a save file.

use rand::Rng;
use thiserror::Error;

use crate::grid::Direction;

use super::{IoSpec, Puzzle, INPUT_LEN, VIZ_HEIGHT, VIZ_WIDTH};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("puzzle {0} has not been implemented yet")]
    Unsupported(i32),

    #[error("unknown puzzle number {0}")]
    Unknown(i32),
}

fn io(to_node: usize, direction: Direction, data: Vec<i32>) -> IoSpec {
    IoSpec { to_node, direction, data }
}

fn random_stream<R: Rng>(rng: &mut R, count: usize, min: i32, max: i32) -> Vec<i32> {
    (0..count).map(|_| rng.gen_range(min..=max)).collect()
}

/// Build the puzzle for a catalog number, drawing its input streams
/// from `rng`.
pub fn build<R: Rng>(number: i32, rng: &mut R) -> Result<Puzzle, CatalogError> {
    use Direction::{Down, Up};

    let puzzle = match number {
        // Debug: feeds a fixed pixel run into a visualization tile.
        -3 => {
            let mut p = Puzzle::new("[simulator debug] Visualization Node Test");
            p.visualization.push(io(0, Up, vec![3, 3, 3, 3, 3]));
            p.programs[0] = "MOV 0,UP\nMOV 0,UP\nMOV 3,UP\nJRO -1".into();
            p.programs[1] = "ADD 1".into();
            p
        }

        // Debug: pushes a stream through a stack tile and back out.
        -2 => {
            let mut p = Puzzle::new("[simulator debug] Stack Memory Test");
            p.stack_nodes = [1].into();
            p.inputs.push(io(0, Up, vec![1, 2, 3, 4]));
            p.outputs.push(io(2, Up, vec![1, 2, 3, 4]));
            p.programs[0] = "MOV UP,RIGHT".into();
            p.programs[2] = "NOP\nMOV LEFT,UP".into();
            p
        }

        // Debug: routes one stream through every cell of the grid.
        -1 => {
            let mut p = Puzzle::new("[simulator debug] Connectivity Check");
            p.programs[0] = "MOV RIGHT,DOWN".into();
            p.programs[1] = "MOV UP,ACC\nMOV ACC,LEFT\nMOV ACC,RIGHT\nMOV ACC,DOWN".into();
            p.programs[2] = "MOV LEFT,ACC\nMOV ACC,RIGHT\nMOV ACC,DOWN".into();
            p.programs[3] = "MOV LEFT,DOWN".into();
            p.programs[4] = "MOV UP,ACC\nMOV ACC,RIGHT\nMOV ACC,DOWN".into();
            p.programs[5] = "MOV UP,ACC\nADD LEFT\nMOV ACC,RIGHT\nMOV ACC,DOWN".into();
            p.programs[6] = "MOV UP,ACC\nADD LEFT\nMOV ACC,RIGHT\nMOV ACC,DOWN".into();
            p.programs[7] = "MOV UP,ACC\nADD LEFT\nMOV ACC,DOWN".into();
            p.programs[8] = "MOV UP,RIGHT".into();
            p.programs[9] = "MOV UP,ACC\nADD LEFT\nMOV ACC,RIGHT\n".into();
            p.programs[10] = "MOV UP,ACC\nADD RIGHT\nADD LEFT\nMOV ACC,DOWN".into();
            p.programs[11] = "MOV UP,LEFT".into();
            p.inputs.push(io(1, Up, vec![1, 2, 3, 4]));
            p.outputs.push(io(10, Down, vec![10, 20, 30, 40]));
            p
        }

        150 => {
            let mut p = Puzzle::new("Self-Test Diagnostic");
            p.bad_nodes = [1, 5, 7, 9].into();
            p.inputs.push(io(0, Up, random_stream(rng, INPUT_LEN, 10, 100)));
            p.inputs.push(io(3, Up, random_stream(rng, INPUT_LEN, 10, 100)));
            p.outputs.push(io(8, Down, p.inputs[0].data.clone()));
            p.outputs.push(io(11, Down, p.inputs[1].data.clone()));
            p
        }

        10981 => {
            let mut p = Puzzle::new("Signal Amplifier");
            p.bad_nodes = [3, 8].into();
            let input = random_stream(rng, INPUT_LEN, 10, 100);
            let doubled = input.iter().map(|v| v * 2).collect();
            p.inputs.push(io(1, Up, input));
            p.outputs.push(io(10, Down, doubled));
            p
        }

        20176 => {
            let mut p = Puzzle::new("Differential Converter");
            p.bad_nodes = [7].into();
            let a = random_stream(rng, INPUT_LEN, 10, 100);
            let b = random_stream(rng, INPUT_LEN, 10, 100);
            let diff_ab: Vec<i32> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
            let diff_ba: Vec<i32> = a.iter().zip(&b).map(|(x, y)| y - x).collect();
            p.inputs.push(io(1, Up, a));
            p.inputs.push(io(2, Up, b));
            p.outputs.push(io(9, Down, diff_ab));
            p.outputs.push(io(10, Down, diff_ba));
            p
        }

        21340 => {
            let mut p = Puzzle::new("Signal Comparator");
            p.bad_nodes = [5, 6, 7].into();
            let input = random_stream(rng, INPUT_LEN, -2, 2);
            let gt = input.iter().map(|&v| i32::from(v > 0)).collect();
            let eq = input.iter().map(|&v| i32::from(v == 0)).collect();
            let lt = input.iter().map(|&v| i32::from(v < 0)).collect();
            p.inputs.push(io(0, Up, input));
            p.outputs.push(io(9, Down, gt));
            p.outputs.push(io(10, Down, eq));
            p.outputs.push(io(11, Down, lt));
            p
        }

        22280 => {
            let mut p = Puzzle::new("Signal Multiplexer");
            p.bad_nodes = [8].into();
            let a = random_stream(rng, INPUT_LEN, -30, 0);
            let select = random_stream(rng, INPUT_LEN, -1, 1);
            let b = random_stream(rng, INPUT_LEN, 0, 30);
            let out = (0..INPUT_LEN)
                .map(|i| match select[i] {
                    -1 => a[i],
                    0 => a[i] + b[i],
                    _ => b[i],
                })
                .collect();
            p.inputs.push(io(1, Up, a));
            p.inputs.push(io(2, Up, select));
            p.inputs.push(io(3, Up, b));
            p.outputs.push(io(10, Down, out));
            p
        }

        30647 => {
            let mut p = Puzzle::new("Sequence Generator");
            p.bad_nodes = [9].into();
            let a = random_stream(rng, INPUT_LEN / 3, 10, 100);
            let b = random_stream(rng, INPUT_LEN / 3, 10, 100);
            let mut out = Vec::with_capacity(a.len() * 3);
            for i in 0..a.len() {
                out.push(a[i].min(b[i]));
                out.push(a[i].max(b[i]));
                out.push(0);
            }
            p.inputs.push(io(1, Up, a));
            p.inputs.push(io(2, Up, b));
            p.outputs.push(io(10, Down, out));
            p
        }

        31904 => {
            let mut p = Puzzle::new("Sequence Counter");
            p.bad_nodes = [3].into();
            let mut input = Vec::with_capacity(INPUT_LEN);
            let mut sums = vec![0];
            let mut counts = vec![0];
            for _ in 0..INPUT_LEN {
                if rng.gen_range(0..=5) == 0 {
                    // Sequence terminator; open the next accumulators.
                    input.push(0);
                    sums.push(0);
                    counts.push(0);
                } else {
                    let value = rng.gen_range(10..=100);
                    input.push(value);
                    *sums.last_mut().unwrap() += value;
                    *counts.last_mut().unwrap() += 1;
                }
            }
            // The final sequence is unterminated; nothing is owed for it.
            sums.pop();
            counts.pop();
            p.inputs.push(io(1, Up, input));
            p.outputs.push(io(9, Down, sums));
            p.outputs.push(io(10, Down, counts));
            p
        }

        32050 => {
            let mut p = Puzzle::new("Signal Edge Detector");
            p.bad_nodes = [8].into();
            let mut input = random_stream(rng, INPUT_LEN, -20, 40);
            input[0] = 0;
            let mut out = vec![0];
            for i in 1..INPUT_LEN {
                out.push(i32::from((input[i - 1] - input[i]).abs() >= 10));
            }
            p.inputs.push(io(1, Up, input));
            p.outputs.push(io(10, Down, out));
            p
        }

        33762 => {
            let mut p = Puzzle::new("Interrupt Handler");
            p.bad_nodes = [8].into();
            let mut streams: [Vec<i32>; 4] = Default::default();
            let mut out = Vec::with_capacity(INPUT_LEN);
            let mut which: usize = 0;
            for i in 0..INPUT_LEN {
                for (j, stream) in streams.iter_mut().enumerate() {
                    let mut value = 0;
                    if i > 0 {
                        let prev = *stream.last().unwrap();
                        if j + 1 == which {
                            if prev == 1 {
                                // Falling edge: no interrupt reported.
                                value = 0;
                                which = 0;
                            } else {
                                value = 1;
                            }
                        } else {
                            value = prev;
                        }
                    }
                    stream.push(value);
                }
                out.push(which as i32);
                which = rng.gen_range(0..=4);
            }

            // At most one signal may change per step, and the output
            // reports only rising edges.
            for i in 1..INPUT_LEN {
                let mut pos_edge = false;
                let mut change = 0i32;
                for (j, stream) in streams.iter().enumerate() {
                    if stream[i - 1] != stream[i] {
                        debug_assert!(change == 0, "two signals changed on one step");
                        change = (j + 1) as i32;
                        if stream[i] == 1 {
                            pos_edge = true;
                        }
                    }
                }
                debug_assert_eq!(out[i], if pos_edge { change } else { 0 });
            }

            let [a, b, c, d] = streams;
            p.inputs.push(io(0, Up, a));
            p.inputs.push(io(1, Up, b));
            p.inputs.push(io(2, Up, c));
            p.inputs.push(io(3, Up, d));
            p.outputs.push(io(10, Down, out));
            p
        }

        40196 => {
            let mut p = Puzzle::new("Signal Pattern Detector");
            p.bad_nodes = [3].into();
            let mut input = vec![1];
            let mut out = vec![0];
            let mut zeroes = 0;
            for _ in 1..INPUT_LEN {
                if rng.gen_range(0..=3) == 0 {
                    input.push(rng.gen_range(1..=30));
                    out.push(0);
                    zeroes = 0;
                } else {
                    input.push(0);
                    zeroes += 1;
                    out.push(if zeroes == 3 {
                        // A run of three fires once per extra zero.
                        zeroes -= 1;
                        1
                    } else {
                        0
                    });
                }
            }
            p.inputs.push(io(1, Up, input));
            p.outputs.push(io(10, Down, out));
            p
        }

        41427 => {
            let mut p = Puzzle::new("Sequence Peak Detector");
            p.bad_nodes = [7].into();
            let mut input: Vec<i32> = Vec::with_capacity(INPUT_LEN);
            let mut mins = vec![999];
            let mut maxes = vec![0];
            for i in 0..INPUT_LEN {
                let in_sequence = input.last().is_some_and(|&v| v != 0);
                if i > 0 && in_sequence && (i == INPUT_LEN - 1 || rng.gen_range(0..=5) == 0) {
                    input.push(0);
                    if i != INPUT_LEN - 1 {
                        mins.push(999);
                        maxes.push(0);
                    }
                } else {
                    let value = rng.gen_range(10..=100);
                    input.push(value);
                    if value < *mins.last().unwrap() {
                        *mins.last_mut().unwrap() = value;
                    }
                    if value > *maxes.last().unwrap() {
                        *maxes.last_mut().unwrap() = value;
                    }
                }
            }
            p.inputs.push(io(1, Up, input));
            p.outputs.push(io(9, Down, mins));
            p.outputs.push(io(10, Down, maxes));
            p
        }

        42656 => {
            let mut p = Puzzle::new("Sequence Reverser");
            p.bad_nodes = [8].into();
            p.stack_nodes = [2, 9].into();
            let mut input: Vec<i32> = Vec::with_capacity(INPUT_LEN);
            let mut out: Vec<i32> = Vec::with_capacity(INPUT_LEN);
            let mut sequence_start = 0;
            for i in 0..INPUT_LEN {
                if i == INPUT_LEN - 1 || (i > 0 && rng.gen_range(0..=5) == 0) {
                    let n = input.len();
                    for j in 1..=(n - sequence_start) {
                        out.push(input[n - j]);
                    }
                    input.push(0);
                    out.push(0);
                    sequence_start = i + 1;
                } else {
                    input.push(rng.gen_range(10..=100));
                }
            }
            p.inputs.push(io(1, Up, input));
            p.outputs.push(io(10, Down, out));
            p
        }

        43786 => {
            let mut p = Puzzle::new("Signal Multiplier");
            p.bad_nodes = [8].into();
            p.stack_nodes = [4, 7].into();
            let a = random_stream(rng, INPUT_LEN, 0, 9);
            let b = random_stream(rng, INPUT_LEN, 0, 9);
            let out = a.iter().zip(&b).map(|(x, y)| x * y).collect();
            p.inputs.push(io(1, Up, a));
            p.inputs.push(io(2, Up, b));
            p.outputs.push(io(10, Down, out));
            p
        }

        50370 => {
            let mut p = Puzzle::new("Image Test Pattern 1");
            p.bad_nodes = [4].into();
            p.visualization.push(io(10, Down, vec![3; VIZ_WIDTH * VIZ_HEIGHT]));
            p
        }

        51781 => {
            let mut p = Puzzle::new("Image Test Pattern 2");
            p.bad_nodes = [0].into();
            let mut pixels = Vec::with_capacity(VIZ_WIDTH * VIZ_HEIGHT);
            for i in 0..VIZ_WIDTH * VIZ_HEIGHT {
                let row = i / VIZ_WIDTH;
                let col = i % VIZ_WIDTH;
                pixels.push(if row % 2 == col % 2 { 3 } else { 0 });
            }
            p.visualization.push(io(10, Down, pixels));
            p
        }

        52544 | 53897 | 60099 | 61212 | 62711 | 63534 => {
            return Err(CatalogError::Unsupported(number));
        }

        _ => return Err(CatalogError::Unknown(number)),
    };

    Ok(puzzle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = build(10981, &mut rng()).unwrap();
        let b = build(10981, &mut rng()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_consecutive_builds_refresh_inputs() {
        let mut r = rng();
        let a = build(10981, &mut r).unwrap();
        let b = build(10981, &mut r).unwrap();
        assert_ne!(a.inputs[0].data, b.inputs[0].data);
    }

    #[test]
    fn test_signal_amplifier_expectations() {
        let p = build(10981, &mut rng()).unwrap();
        assert_eq!(p.name, "Signal Amplifier");
        assert_eq!(p.inputs[0].data.len(), INPUT_LEN);
        for (i, o) in p.inputs[0].data.iter().zip(&p.outputs[0].data) {
            assert_eq!(*o, i * 2);
        }
        assert!(p.bad_nodes.contains(&3) && p.bad_nodes.contains(&8));
    }

    #[test]
    fn test_comparator_outputs_partition() {
        let p = build(21340, &mut rng()).unwrap();
        for i in 0..INPUT_LEN {
            let sum =
                p.outputs[0].data[i] + p.outputs[1].data[i] + p.outputs[2].data[i];
            assert_eq!(sum, 1, "exactly one comparator fires per value");
        }
    }

    #[test]
    fn test_sequence_counter_accounts_for_everything() {
        let p = build(31904, &mut rng()).unwrap();
        let input = &p.inputs[0].data;
        let sums = &p.outputs[0].data;
        // Every terminated sequence sums to its reported total.
        let mut expected_sums = Vec::new();
        let mut acc = 0;
        for &v in input {
            if v == 0 {
                expected_sums.push(acc);
                acc = 0;
            } else {
                acc += v;
            }
        }
        assert_eq!(expected_sums.as_slice(), sums.as_slice());
    }

    #[test]
    fn test_sequence_reverser_is_a_permutation() {
        let p = build(42656, &mut rng()).unwrap();
        let mut input = p.inputs[0].data.clone();
        let mut out = p.outputs[0].data.clone();
        assert_eq!(input.len(), out.len());
        assert_eq!(*input.last().unwrap(), 0);
        input.sort_unstable();
        out.sort_unstable();
        assert_eq!(input, out);
    }

    #[test]
    fn test_image_patterns() {
        let p = build(50370, &mut rng()).unwrap();
        assert!(p.visualization[0].data.iter().all(|&v| v == 3));

        let p = build(51781, &mut rng()).unwrap();
        let pixels = &p.visualization[0].data;
        assert_eq!(pixels[0], 3);
        assert_eq!(pixels[1], 0);
        assert_eq!(pixels[VIZ_WIDTH], 0);
        assert_eq!(pixels[VIZ_WIDTH + 1], 3);
    }

    #[test]
    fn test_unsupported_and_unknown() {
        assert_eq!(build(52544, &mut rng()), Err(CatalogError::Unsupported(52544)));
        assert_eq!(build(99999, &mut rng()), Err(CatalogError::Unknown(99999)));
    }
}
