use crate::error::{Service, SyncError};

const SYMBOL_COLUMN: &str = "symbol";

/// Extracts ticker symbols, in row order, from a comma-separated listing.
///
/// The `symbol` column is found by name. Blank lines are ignored, and rows with fewer fields
/// than the header are truncated records and are skipped.
pub fn parse_listing(body: &str) -> Result<Vec<String>, SyncError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| SyncError::malformed(Service::Listing, format!("listing header: {err}")))?
        .clone();
    let symbol_idx = headers
        .iter()
        .position(|c| c.eq_ignore_ascii_case(SYMBOL_COLUMN))
        .ok_or_else(|| {
            SyncError::malformed(
                Service::Listing,
                format!("listing header has no {SYMBOL_COLUMN} column: {headers:?}"),
            )
        })?;

    let mut symbols = Vec::new();
    let mut skipped: usize = 0;
    for row in reader.records() {
        let row = row.map_err(|err| {
            SyncError::malformed(Service::Listing, format!("listing row: {err}"))
        })?;
        if row.len() < headers.len() {
            skipped += 1;
            continue;
        }
        match row.get(symbol_idx) {
            Some(symbol) if !symbol.is_empty() => symbols.push(symbol.to_string()),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, parsed = symbols.len(), "skipped incomplete listing rows");
    }
    Ok(symbols)
}
