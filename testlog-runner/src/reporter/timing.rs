// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display helpers for run timing and allocation statistics.

use crate::{helpers::plural, test_model::RunStats};
use std::fmt;

const COUNT_UNITS: [&str; 6] = ["", " k", " M", " G", " T", " P"];
const COUNT_FACTOR: u64 = 1000;
const BYTE_UNITS: [&str; 6] = ["byte", "KiB", "MiB", "GiB", "TiB", "PiB"];
const BYTE_FACTOR: u64 = 1024;

/// Formats run statistics as a human-readable timing string.
///
/// For example: `2.000000 seconds (1.50 k allocations: 2.000 KiB, 3.25% gc time)`.
pub fn format_timing(stats: &RunStats) -> String {
    DisplayTiming(*stats).to_string()
}

/// Displays run statistics as a human-readable timing string.
///
/// The elapsed time is always shown, in seconds with six decimal places. A parenthesized
/// breakdown follows if anything was allocated, or if any time was spent in garbage collection
/// or compilation.
#[derive(Clone, Copy, Debug)]
pub struct DisplayTiming(pub RunStats);

impl fmt::Display for DisplayTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.0;
        let elapsed = stats.elapsed_ns as f64;
        write!(f, "{:.6} seconds", elapsed / 1e9)?;

        let has_allocs = stats.bytes != 0 || stats.allocs != 0;
        let has_parens = has_allocs || stats.gc_ns > 0 || stats.compile_ns > 0;
        if has_parens {
            f.write_str(" (")?;
        }

        if has_allocs {
            write!(
                f,
                "{}: {}",
                DisplayAllocs(stats.allocs),
                DisplayBytes(stats.bytes)
            )?;
        }

        if stats.gc_ns > 0 {
            if has_allocs {
                f.write_str(", ")?;
            }
            write!(f, "{:.2}% gc time", percentage(stats.gc_ns, stats.elapsed_ns))?;
        }

        if stats.compile_ns > 0 {
            if has_allocs || stats.gc_ns > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{:.2}% compilation time",
                percentage(stats.compile_ns, stats.elapsed_ns)
            )?;

            if stats.recompile_ns > 0 {
                let recompile = percentage(stats.recompile_ns, stats.compile_ns);
                let rounded = format!("{recompile:.0}");
                // A small but nonzero amount of recompilation shouldn't look like none at all.
                let shown = if rounded == "0" && recompile > 0.0 {
                    "<1"
                } else {
                    &rounded
                };
                write!(f, ": {shown}% of which was recompilation")?;
            }
        }

        if has_parens {
            f.write_str(")")?;
        }

        Ok(())
    }
}

/// An allocation count, scaled by powers of 1000.
struct DisplayAllocs(u64);

impl fmt::Display for DisplayAllocs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (scaled, unit) = reduce_units(self.0, COUNT_UNITS.len(), COUNT_FACTOR);
        if unit == 0 {
            write!(f, "{} {}", self.0, plural::allocations_str(self.0))
        } else {
            write!(f, "{scaled:.2}{} allocations", COUNT_UNITS[unit])
        }
    }
}

/// A byte count, scaled by powers of 1024.
///
/// Uses the same unit reduction as allocation counts: exact integers below the first unit, then
/// three decimals (`2.000 KiB`).
struct DisplayBytes(u64);

impl fmt::Display for DisplayBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        let (scaled, unit) = reduce_units(bytes, BYTE_UNITS.len(), BYTE_FACTOR);
        if unit == 0 {
            write!(f, "{bytes} {}", plural::bytes_str(bytes))
        } else {
            write!(f, "{scaled:.3} {}", BYTE_UNITS[unit])
        }
    }
}

/// Scales `value` down by the smallest power of `factor` that brings it to at most `factor`.
///
/// Returns the scaled value and the power used (the unit index), which is capped at
/// `num_units - 1`. Values up to and including `factor` are not scaled.
fn reduce_units(value: u64, num_units: usize, factor: u64) -> (f64, usize) {
    let mut unit = 0;
    let mut bound = u128::from(factor);
    while u128::from(value) > bound && unit + 1 < num_units {
        unit += 1;
        bound *= u128::from(factor);
    }
    let divisor = (factor as f64).powi(unit as i32);
    (value as f64 / divisor, unit)
}

fn percentage(part: u64, whole: u64) -> f64 {
    100.0 * part as f64 / whole as f64
}
