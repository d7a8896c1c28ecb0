//! Notification evaluation.
//!
//! Inspects a completed query result against the per-query rules stored on
//! the definition: three independent row-count thresholds and a
//! column/value check. Both rule families fire independently for the same
//! query; neither replaces the other.

use crate::db::QueryResult;
use crate::persistence::QueryDefinition;
use tracing::{debug, warn};

/// Evaluates the notification rules of one definition against its result.
///
/// Returns zero or more human-readable alert strings. Only called for
/// definitions with the notify flag set whose execution succeeded; a
/// definition without the flag always yields nothing.
pub fn evaluate(def: &QueryDefinition, result: &QueryResult) -> Vec<String> {
    if !def.notify {
        return Vec::new();
    }

    let mut messages = Vec::new();
    evaluate_row_counts(def, result, &mut messages);
    evaluate_column_values(def, result, &mut messages);
    messages
}

/// Row-count rule: each threshold is optional and fires on its own.
fn evaluate_row_counts(def: &QueryDefinition, result: &QueryResult, messages: &mut Vec<String>) {
    let rows = result.row_count;

    if let Some(threshold) = parse_threshold(def, "count_at_least", def.count_at_least.as_deref())
    {
        if rows >= threshold {
            messages.push(format!(
                "Query '{}': row count {} is at least {}",
                def.name, rows, threshold
            ));
        }
    }

    if let Some(threshold) = parse_threshold(def, "count_equals", def.count_equals.as_deref()) {
        if rows == threshold {
            messages.push(format!(
                "Query '{}': row count {} equals {}",
                def.name, rows, threshold
            ));
        }
    }

    if let Some(threshold) = parse_threshold(def, "count_at_most", def.count_at_most.as_deref()) {
        if rows <= threshold {
            messages.push(format!(
                "Query '{}': row count {} is at most {}",
                def.name, rows, threshold
            ));
        }
    }
}

/// Parses a threshold field. Blank or non-numeric values are skipped, not
/// errors: the fields are free-text in the store.
fn parse_threshold(def: &QueryDefinition, field: &str, raw: Option<&str>) -> Option<usize> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(
                "Query '{}': skipping non-numeric {} threshold '{}'",
                def.name, field, raw
            );
            None
        }
    }
}

/// Column-value rule: a row mismatches when ANY checked column's trimmed
/// value differs from its expected value. At most one aggregate message is
/// emitted per query, never one per row.
fn evaluate_column_values(def: &QueryDefinition, result: &QueryResult, messages: &mut Vec<String>) {
    let (Some(columns_raw), Some(values_raw)) =
        (def.check_columns.as_deref(), def.check_values.as_deref())
    else {
        return;
    };

    let names: Vec<&str> = columns_raw.split(',').map(str::trim).collect();
    let expected: Vec<&str> = values_raw.split(',').map(str::trim).collect();

    if names.len() != expected.len() {
        warn!(
            "Query '{}': column list has {} names but {} values; skipping column check",
            def.name,
            names.len(),
            expected.len()
        );
        return;
    }

    // Resolve column positions once; absent columns count as mismatches.
    let positions: Vec<Option<usize>> = names
        .iter()
        .map(|name| {
            let idx = result.column_index(name);
            if idx.is_none() {
                warn!(
                    "Query '{}': checked column '{}' is not in the result set",
                    def.name, name
                );
            }
            idx
        })
        .collect();

    let mut mismatch_rows = 0usize;
    for row in 0..result.row_count {
        let mismatched = positions.iter().zip(&expected).any(|(idx, want)| {
            match idx.and_then(|i| result.cell(row, i)) {
                Some(value) => value.to_display_string().trim() != *want,
                None => true,
            }
        });
        if mismatched {
            mismatch_rows += 1;
        }
    }

    if mismatch_rows > 0 {
        let pairs: Vec<String> = names
            .iter()
            .zip(&expected)
            .map(|(n, v)| format!("{n}={v}"))
            .collect();
        messages.push(format!(
            "Query '{}': {} row(s) do not match expected {}",
            def.name,
            mismatch_rows,
            pairs.join(", ")
        ));
    }
}
