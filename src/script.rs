//! SQL script splitting
//!
//! Splits a script into individual statements on top-level semicolons.
//! The script is tokenized with the Redshift dialect, so semicolons inside
//! string literals, quoted identifiers and comments do not split. Statement
//! text is sliced from the original script rather than re-rendered from
//! tokens, which keeps literals exactly as written.
//!
//! [`run_script`] executes the split statements as one transaction.

use sqlparser::dialect::RedshiftSqlDialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer};
use tracing::{debug, error};

use crate::error::StageResult;
use crate::warehouse::Warehouse;

/// Byte offsets of the start of every line in `text`
fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Convert a 1-based line/column location to a byte offset
fn byte_offset(text: &str, starts: &[usize], location: &Location) -> usize {
    let line = (location.line as usize).saturating_sub(1);
    let column = (location.column as usize).saturating_sub(1);
    let Some(&start) = starts.get(line) else {
        return text.len();
    };
    text[start..]
        .char_indices()
        .nth(column)
        .map(|(i, _)| start + i)
        .unwrap_or(text.len())
}

/// Split a script into statements, dropping empty ones
///
/// Comments between statements stay attached to the statement that follows
/// them; a segment holding nothing but whitespace and comments is dropped.
///
/// # Returns
/// * `Ok(Vec<String>)` with each statement trimmed and without its semicolon
/// * `Err(Tokenize)` for an unterminated string literal or similar
pub fn split_statements(script: &str) -> StageResult<Vec<String>> {
    let dialect = RedshiftSqlDialect {};
    let tokens = Tokenizer::new(&dialect, script).tokenize_with_location()?;
    let starts = line_starts(script);

    let mut statements = Vec::new();
    let mut segment_start = 0;
    let mut has_content = false;

    for token in &tokens {
        match token.token {
            Token::SemiColon => {
                let end = byte_offset(script, &starts, &token.location);
                if has_content {
                    statements.push(script[segment_start..end].trim().to_string());
                }
                segment_start = end + 1;
                has_content = false;
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => has_content = true,
        }
    }

    if has_content {
        statements.push(script[segment_start..].trim().to_string());
    }

    Ok(statements)
}

/// Execute `statements` in order inside one transaction, then commit
///
/// The first failing statement rolls the transaction back and its error is
/// returned, even when the rollback fails as well.
///
/// # Returns
/// * `Ok(usize)` with the number of statements executed
pub fn run_script<W: Warehouse + ?Sized>(warehouse: &mut W, statements: &[String]) -> StageResult<usize> {
    for (index, statement) in statements.iter().enumerate() {
        if let Err(err) = warehouse.execute(statement) {
            error!(statement = index + 1, error = %err, "script failed, rolling back");
            if let Err(rollback_err) = warehouse.rollback() {
                error!(error = %rollback_err, "rollback failed");
            }
            return Err(err);
        }
        debug!(statement = index + 1, "executed");
    }
    warehouse.commit()?;
    Ok(statements.len())
}
