//! Sensitive attribute and target column inference.

use std::collections::HashSet;

use auditor_common::error::{AuditorError, Result};

use crate::table::{ColumnKind, Table};

/// Pick the sensitive attribute column.
///
/// The first header (left to right) whose lowercased name is one of the
/// candidates wins; if none matches, the first text column is used.
pub fn detect_sensitive_column(table: &Table, candidates: &[String]) -> Result<usize> {
    let wanted: HashSet<String> = candidates.iter().map(|c| c.to_lowercase()).collect();
    if let Some(idx) = table.headers().iter().position(|h| wanted.contains(&h.to_lowercase())) {
        return Ok(idx);
    }

    let fallback = (0..table.n_cols()).find(|&i| table.column_kind(i) == ColumnKind::Text);
    if let Some(idx) = fallback {
        tracing::debug!(column = %table.headers()[idx], "no named sensitive column, using first text column");
        return Ok(idx);
    }

    Err(AuditorError::NoSensitiveColumn)
}

/// The target is always the last column.
pub fn target_column(table: &Table) -> Result<usize> {
    table
        .n_cols()
        .checked_sub(1)
        .ok_or_else(|| AuditorError::invalid_data("table has no columns"))
}
