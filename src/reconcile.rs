//! Multi-source reconciliation
//!
//! Two satellites sampling the same solar wind are averaged column by column.
//! The first series anchors the output: its timestamps are the output rows,
//! and the second series only contributes where it has a matching timestamp.
//!
//! Both inputs are assumed to share a sampling grid. Aligning mismatched grids
//! belongs to the adapters.

use crate::types::{CanonicalSeries, Column};

/// Column-wise mean of `a` and `b`, anchored on `a`'s timestamps.
///
/// For each requested column the mean is taken over the values that are
/// present: one present value is its own mean, two missing values stay
/// missing. A timestamp absent from `b` counts as all-missing in `b`.
/// Columns not listed keep `a`'s values.
pub fn merge_by_mean(a: &CanonicalSeries, b: &CanonicalSeries, columns: &[Column]) -> CanonicalSeries {
    let samples = a
        .samples()
        .iter()
        .map(|anchor| {
            let mut merged = anchor.clone();
            let other = b.at(anchor.timestamp);
            for &column in columns {
                let value = mean_present(column.get(anchor), other.and_then(|o| column.get(o)));
                column.set(&mut merged, value);
            }
            merged
        })
        .collect();

    CanonicalSeries::from_samples(samples)
}

/// [`merge_by_mean`] over every canonical column.
pub fn merge_all_by_mean(a: &CanonicalSeries, b: &CanonicalSeries) -> CanonicalSeries {
    merge_by_mean(a, b, &Column::ALL)
}

fn mean_present(x: Option<f64>, y: Option<f64>) -> Option<f64> {
    match (x, y) {
        (Some(x), Some(y)) => Some((x + y) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}
