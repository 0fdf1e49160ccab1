//! Text row formats.
//!
//! Output side: rows are appended to a `String` buffer that the call's chunk
//! assembler flushes. Input side: `INSERT ... FORMAT` bodies are split into
//! unescaped string fields that the engine converts per column type.

use std::fmt::Write as _;

use crate::engine::{Column, Value};

/// A supported row format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    TabSeparated,
    TabSeparatedWithNames,
    Csv,
    CsvWithNames,
}

impl Format {
    /// Resolve a format name. An empty name means `TabSeparated`.
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "" | "TabSeparated" | "TSV" => Ok(Self::TabSeparated),
            "TabSeparatedWithNames" | "TSVWithNames" => Ok(Self::TabSeparatedWithNames),
            "CSV" => Ok(Self::Csv),
            "CSVWithNames" => Ok(Self::CsvWithNames),
            other => Err(format!("unknown format '{other}'")),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TabSeparated => "TabSeparated",
            Self::TabSeparatedWithNames => "TabSeparatedWithNames",
            Self::Csv => "CSV",
            Self::CsvWithNames => "CSVWithNames",
        }
    }

    const fn has_header(self) -> bool {
        matches!(self, Self::TabSeparatedWithNames | Self::CsvWithNames)
    }

    const fn is_csv(self) -> bool {
        matches!(self, Self::Csv | Self::CsvWithNames)
    }

    /// Append the header line, if this format has one.
    pub fn write_header(self, columns: &[Column], out: &mut String) {
        if !self.has_header() {
            return;
        }
        for (index, column) in columns.iter().enumerate() {
            if index > 0 {
                out.push(self.delimiter());
            }
            if self.is_csv() {
                write_csv_string(&column.name, out);
            } else {
                write_tsv_escaped(&column.name, out);
            }
        }
        out.push('\n');
    }

    /// Append one row, newline-terminated.
    pub fn write_row(self, row: &[Value], out: &mut String) {
        for (index, value) in row.iter().enumerate() {
            if index > 0 {
                out.push(self.delimiter());
            }
            match value {
                Value::String(s) if self.is_csv() => write_csv_string(s, out),
                Value::String(s) => write_tsv_escaped(s, out),
                other => {
                    // Writing into a String cannot fail.
                    let _ = write!(out, "{other}");
                }
            }
        }
        out.push('\n');
    }

    const fn delimiter(self) -> char {
        if self.is_csv() { ',' } else { '\t' }
    }

    /// Split an insert body into rows of unescaped fields.
    ///
    /// Blank lines are skipped; a header line is skipped for `*WithNames`.
    pub fn read_rows(self, data: &str) -> Result<Vec<Vec<String>>, String> {
        let mut rows = if self.is_csv() {
            read_csv(data)?
        } else {
            data.lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| line.split('\t').map(unescape_tsv).collect())
                .collect::<Result<Vec<Vec<String>>, String>>()?
        };
        if self.has_header() && !rows.is_empty() {
            rows.remove(0);
        }
        Ok(rows)
    }
}

fn write_tsv_escaped(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
}

fn unescape_tsv(field: &str) -> Result<String, String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err(format!("dangling escape in field '{field}'")),
        }
    }
    Ok(out)
}

fn write_csv_string(value: &str, out: &mut String) {
    out.push('"');
    for ch in value.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}

fn read_csv(data: &str) -> Result<Vec<Vec<String>>, String> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut row_has_content = false;
    let mut chars = data.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }
        match ch {
            '"' => {
                in_quotes = true;
                row_has_content = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                row_has_content = true;
            }
            '\r' => {}
            '\n' => {
                if row_has_content || !field.is_empty() {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                row_has_content = false;
            }
            other => {
                field.push(other);
                row_has_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted CSV field".to_owned());
    }
    if row_has_content || !field.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}
