use crate::model::{MappingRow, MappingSummary};

/// Summary from raw counts. Match rate is a percentage, 0.0 for an empty table.
pub fn summary_from_counts(total: usize, matched: usize) -> MappingSummary {
    let match_rate = if total > 0 {
        matched as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    MappingSummary {
        total,
        matched,
        unmatched: total.saturating_sub(matched),
        match_rate,
    }
}

/// Compute summary statistics from mapping rows.
pub fn compute_summary<'a, I>(rows: I) -> MappingSummary
where
    I: IntoIterator<Item = &'a MappingRow>,
{
    let (total, matched) = rows.into_iter().fold((0, 0), |(total, matched), row| {
        (total + 1, matched + usize::from(row.external_id.is_some()))
    });
    summary_from_counts(total, matched)
}

/// Human-readable summary block, one line per figure.
pub fn format_summary(summary: &MappingSummary) -> String {
    format!(
        "Total firms: {}\nMatched firms: {} ({:.1}%)\nUnmatched firms: {}",
        summary.total, summary.matched, summary.match_rate, summary.unmatched
    )
}
