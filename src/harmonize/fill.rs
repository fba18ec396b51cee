//! Per-country chronological gap filling.
//!
//! Filling is only meaningful along a country's own timeline, so every entry
//! point sorts by `(country, year)` first and then fills each country's rows
//! in isolation. Callers never need to pre-sort.

use crate::domain::HarmonizedRow;

/// Fill direction for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPass {
    /// Propagate the latest earlier value into later gaps.
    Forward,
    /// Propagate the earliest later value into earlier gaps.
    Backward,
}

/// Forward-fill a chronological series in place.
pub fn forward_fill(series: &mut [Option<f64>]) {
    let mut last = None;
    for cell in series.iter_mut() {
        match cell {
            Some(v) => last = Some(*v),
            None => *cell = last,
        }
    }
}

/// Backward-fill a chronological series in place.
pub fn backward_fill(series: &mut [Option<f64>]) {
    let mut next = None;
    for cell in series.iter_mut().rev() {
        match cell {
            Some(v) => next = Some(*v),
            None => *cell = next,
        }
    }
}

/// Sort rows by `(country, year)` and apply `passes` column by column within
/// each country.
pub fn fill_by_country(mut rows: Vec<HarmonizedRow>, passes: &[FillPass]) -> Vec<HarmonizedRow> {
    rows.sort_by(|a, b| a.country.cmp(&b.country).then(a.year.cmp(&b.year)));

    for group in rows.chunk_by_mut(|a, b| a.country == b.country) {
        let width = group.first().map(|r| r.values.len()).unwrap_or(0);
        for col in 0..width {
            let mut series: Vec<Option<f64>> = group.iter().map(|r| r.values[col]).collect();
            for pass in passes {
                match pass {
                    FillPass::Forward => forward_fill(&mut series),
                    FillPass::Backward => backward_fill(&mut series),
                }
            }
            for (row, value) in group.iter_mut().zip(series) {
                row.values[col] = value;
            }
        }
    }

    rows
}
