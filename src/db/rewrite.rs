//! SQL text shaping helpers.
//!
//! Small, single-purpose string transforms applied before execution or when
//! materializing results: statement-kind detection, ROWNUM row-limit
//! injection, duplicate column-name de-duplication, and literal named
//! parameter substitution for the ad-hoc path.

use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Strips leading whitespace, `--` line comments and `/* */` block comments.
pub fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(idx) => &after[idx + 1..],
                None => "",
            };
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(idx) => &after[idx + 2..],
                None => "",
            };
        } else {
            return trimmed;
        }
    }
}

/// Returns the first SQL keyword, upper-cased.
pub fn leading_keyword(sql: &str) -> Option<String> {
    strip_leading_comments(sql)
        .split_whitespace()
        .next()
        .map(|word| {
            word.trim_start_matches('(')
                .trim_end_matches(';')
                .to_uppercase()
        })
        .filter(|w| !w.is_empty())
}

/// Returns true for statements that produce a row set (SELECT or WITH).
pub fn is_query(sql: &str) -> bool {
    matches!(
        leading_keyword(sql).as_deref(),
        Some("SELECT") | Some("WITH")
    )
}

/// Caps a SELECT's row count by wrapping it in a ROWNUM envelope.
///
/// Statements that already filter on ROWNUM are left alone, as are
/// non-query statements.
pub fn apply_row_limit(sql: &str, max_rows: usize) -> String {
    if !is_query(sql) {
        return sql.to_string();
    }

    let rownum_re = Regex::new(r"(?i)\brownum\b").expect("static regex");
    if rownum_re.is_match(sql) {
        return sql.to_string();
    }

    let body = sql.trim().trim_end_matches(';').trim();
    format!("SELECT * FROM ({body}) WHERE ROWNUM <= {max_rows}")
}

/// Makes column names unique, case-insensitively.
///
/// The first occurrence keeps its name; later duplicates get `_1`, `_2`, …
/// suffixes, skipping any suffix that would collide with a real column.
pub fn dedup_column_names(names: &[String]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut used: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        let key = name.to_lowercase();
        let count = counts.entry(key).or_insert(0);
        if *count == 0 {
            *count += 1;
            out.push(name.clone());
            continue;
        }

        let mut suffix = *count;
        let unique = loop {
            let candidate = format!("{name}_{suffix}");
            if used.insert(candidate.to_lowercase()) {
                break candidate;
            }
            suffix += 1;
        };
        *count = suffix + 1;
        out.push(unique);
    }

    out
}

/// Substitutes `${name}` placeholders with literal values.
///
/// This is plain text replacement, not bind variables: the stored queries
/// are operator-authored templates where a handful of named tokens stand in
/// for lot ids, date windows and the like. Unknown placeholders are left
/// untouched.
pub fn substitute_params(sql: &str, params: &[(String, String)]) -> String {
    let mut out = sql.to_string();
    for (name, value) in params {
        let token = format!("${{{name}}}");
        out = out.replace(&token, value);
    }
    out
}
