use serde_json::{Map, Value};

/// One data line keyed by header, in header order
pub type CsvRow = Map<String, Value>;

/// Parse simple comma-separated text into header-keyed rows.
///
/// Blank lines are skipped and the first remaining line is the header.
/// Missing trailing values become empty strings, extra values are dropped.
/// Input with fewer than two non-blank lines yields no rows. Quoting is not
/// interpreted.
pub fn parse_csv(content: &str) -> Vec<CsvRow> {
    let lines: Vec<&str> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .collect();

    let Some((header_line, data)) = lines.split_first() else {
        return Vec::new();
    };
    if data.is_empty() {
        return Vec::new();
    }

    let headers: Vec<&str> = header_line.split(',').map(str::trim).collect();

    data.iter()
        .map(|line| {
            let values: Vec<&str> = line.split(',').map(str::trim).collect();
            let mut row = Map::new();
            for (idx, header) in headers.iter().enumerate() {
                let value = values.get(idx).copied().unwrap_or_default();
                row.insert(header.to_string(), Value::String(value.to_string()));
            }
            row
        })
        .collect()
}

/// Pretty-printed JSON array of rows, two-space indented
pub fn rows_to_json(rows: &[CsvRow]) -> String {
    serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
}
