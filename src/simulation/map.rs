//! Text map loading
//!
//! One line per row, one digit per cell: `0` road, `1` wall, `2` agent
//! spawn, `3` transport spawn, `4` finish. Lines are trimmed and blank lines
//! skipped.

use std::fs;
use std::path::Path;

use super::error::{SimError, SimResult};

/// Parse map text into rows of cell codes
pub fn parse_map(text: &str) -> SimResult<Vec<Vec<u8>>> {
    let mut rows: Vec<Vec<u8>> = Vec::new();

    for (line_index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut row = Vec::with_capacity(line.len());
        for (column_index, ch) in line.chars().enumerate() {
            if !('0'..='4').contains(&ch) {
                return Err(SimError::InvalidMapChar {
                    line: line_index + 1,
                    column: column_index + 1,
                    ch,
                });
            }
            row.push(ch as u8 - b'0');
        }

        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(SimError::RaggedRow {
                    row: rows.len(),
                    expected: first.len(),
                    found: row.len(),
                });
            }
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(SimError::EmptyGrid);
    }
    Ok(rows)
}

/// Read and parse a map file
pub fn load_map(path: impl AsRef<Path>) -> SimResult<Vec<Vec<u8>>> {
    let text = fs::read_to_string(path)?;
    parse_map(&text)
}
