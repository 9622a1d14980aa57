//! Tabular (CSV) codec for roster files
//!
//! Uploaded rosters and exported snapshots share the same column identifiers,
//! so an exported file can be fed back through [`parse_members`].
//!
//! Parsing is all-or-nothing: the first bad row rejects the whole payload and
//! no member is returned.

use serde::Deserialize;

use crate::error::{Result, RosterError};
use crate::types::Member;

/// Columns an uploaded roster must carry.
pub const REQUIRED_COLUMNS: [&str; 2] = ["email", "name"];

/// Columns written by [`write_members`], in order.
pub const EXPORT_COLUMNS: [&str; 4] = ["email", "name", "weight", "height"];

#[derive(Debug, Deserialize)]
struct RosterRow {
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
}

/// Parse an uploaded roster into members.
///
/// Unknown columns are ignored. `weight`/`height` are read when present,
/// empty cells become `None`, and every member starts with `notified = false`.
pub fn parse_members(data: &[u8]) -> Result<Vec<Member>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            return Err(RosterError::MissingColumn(column.to_string()));
        }
    }

    let mut members = Vec::new();
    for (index, row) in reader.deserialize::<RosterRow>().enumerate() {
        // header occupies line 1
        let line = index as u64 + 2;
        let row = row.map_err(|e| RosterError::invalid_row(line, e.to_string()))?;

        let email = row.email.trim();
        if email.is_empty() {
            return Err(RosterError::invalid_row(line, "email is empty"));
        }

        let name = row.name.filter(|name| !name.is_empty());
        members.push(Member::new(email, name).with_metrics(row.weight, row.height));
    }

    Ok(members)
}

/// Serialize members as a CSV snapshot.
///
/// The header row is always written, so an empty slice still produces a
/// valid, header-only file.
pub fn write_members(members: &[Member]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(EXPORT_COLUMNS)?;
    for member in members {
        writer.serialize((&member.email, &member.name, member.weight, member.height))?;
    }

    writer.into_inner().map_err(|e| RosterError::Io(e.into_error()))
}
