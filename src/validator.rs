//! Column name validation
//!
//! Column names are lowercased before they reach the warehouse, and every
//! normalized name is checked against the warehouse's reserved words. The
//! reserved-word list ships with the crate (`reserved_words.txt`) and is
//! parsed once, on first use.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{StageError, StageResult};
use crate::table::Table;

static RESERVED_WORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    include_str!("reserved_words.txt")
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s").expect("whitespace pattern"));

/// Whether `word` is a warehouse reserved word, ignoring case
pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.contains(&word.trim().to_lowercase())
}

fn is_quoted(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('"') && name.ends_with('"')
}

/// Normalize a single column name
///
/// The name is lowercased; a name containing whitespace is wrapped in double
/// quotes unless it is quoted already, so normalizing twice changes nothing.
/// Double quotes inside a newly quoted name are doubled.
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_lowercase();
    if !is_quoted(&lower) && WHITESPACE.is_match(&lower) {
        format!("\"{}\"", lower.replace('"', "\"\""))
    } else {
        lower
    }
}

fn unquoted(name: &str) -> &str {
    if is_quoted(name) {
        &name[1..name.len() - 1]
    } else {
        name
    }
}

/// Normalize and check a list of column names
///
/// # Returns
/// * `Ok(Vec<String>)` with the normalized names, in the original order
/// * `Err(NameConflict)` if a normalized name is a reserved word
/// * `Err(DuplicateColumn)` if two names normalize to the same string
pub fn normalize_columns<S: AsRef<str>>(names: &[S]) -> StageResult<Vec<String>> {
    let mut seen = HashSet::with_capacity(names.len());
    let mut normalized = Vec::with_capacity(names.len());

    for name in names {
        let column = normalize_name(name.as_ref());
        if RESERVED_WORDS.contains(unquoted(&column)) {
            return Err(StageError::NameConflict { column });
        }
        if !seen.insert(column.clone()) {
            return Err(StageError::DuplicateColumn { column });
        }
        normalized.push(column);
    }

    Ok(normalized)
}

/// Validate a dataset's column names and return it with normalized names
pub fn validate_column_names(mut table: Table) -> StageResult<Table> {
    let names = normalize_columns(&table.column_names())?;
    table.rename_columns(names);
    Ok(table)
}
