//! Tolerant vertex deduplication.

use std::collections::HashMap;

/// Decimal places kept when comparing rows.
pub const DEDUP_DECIMALS: i32 = 6;

/// Result of a unique-row pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dedup {
    /// Source row of each unique row, in first-occurrence order.
    pub unique: Vec<usize>,
    /// Unique row of each source row.
    pub inverse: Vec<u32>,
}

fn row_key(row: &[f64], scale: f64) -> Vec<i64> {
    // -0.0 and 0.0 round to the same key.
    row.iter().map(|v| (v * scale).round() as i64).collect()
}

/// Stable unique pass over fixed-width rows stored back to back in `values`.
///
/// Rows are compared after rounding to [`DEDUP_DECIMALS`] places, so normals
/// that differ only by round-off collapse into one vertex.
#[must_use]
pub fn dedup_rows(values: &[f64], width: usize) -> Dedup {
    if width == 0 {
        return Dedup::default();
    }
    let scale = 10f64.powi(DEDUP_DECIMALS);
    let rows = values.len() / width;
    let mut seen: HashMap<Vec<i64>, u32> = HashMap::with_capacity(rows);
    let mut dedup = Dedup {
        unique: Vec::new(),
        inverse: Vec::with_capacity(rows),
    };
    for (index, row) in values.chunks_exact(width).enumerate() {
        let next = dedup.unique.len() as u32;
        let slot = *seen.entry(row_key(row, scale)).or_insert_with(|| {
            dedup.unique.push(index);
            next
        });
        dedup.inverse.push(slot);
    }
    dedup
}
