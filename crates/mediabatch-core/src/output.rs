//! Writers for rename previews: a plain table, JSON or JSON Lines.

use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

use crate::types::{PlanStatus, PlannedRename};

/// Preview output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One aligned line per file
    #[default]
    Table,
    /// Single JSON array
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Some(Self::Table),
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Writes preview rows, showing paths relative to an optional root.
pub struct PlanWriter<'a, W: Write> {
    writer: W,
    format: OutputFormat,
    root: Option<&'a Path>,
}

impl<'a, W: Write> PlanWriter<'a, W> {
    pub fn new(writer: W, format: OutputFormat, root: Option<&'a Path>) -> Self {
        Self {
            writer,
            format,
            root,
        }
    }

    /// Write all rows. Returns the number of rows that rename a file.
    pub fn write_plan(&mut self, rows: &[PlannedRename]) -> io::Result<usize> {
        match self.format {
            OutputFormat::Table => {
                for row in rows {
                    self.write_table_row(row)?;
                }
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut self.writer, rows).map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
            OutputFormat::JsonLines => {
                for row in rows {
                    write_json_line(&mut self.writer, row)?;
                }
            }
        }
        self.writer.flush()?;
        Ok(rows
            .iter()
            .filter(|row| row.status == PlanStatus::Rename)
            .count())
    }

    fn write_table_row(&mut self, row: &PlannedRename) -> io::Result<()> {
        let source = self.show(&row.source);
        match (row.status, &row.destination) {
            (PlanStatus::Delete, _) => writeln!(self.writer, "delete     {source}"),
            (PlanStatus::Unchanged, _) => writeln!(self.writer, "unchanged  {source}"),
            (PlanStatus::Rename, Some(destination)) => {
                let destination = self.show(destination);
                writeln!(self.writer, "rename     {source} -> {destination}")
            }
            (PlanStatus::Error, destination) => {
                let reason = row.reason.as_deref().unwrap_or("unknown problem");
                match destination {
                    Some(destination) => {
                        let destination = self.show(destination);
                        writeln!(self.writer, "error      {source} -> {destination}: {reason}")
                    }
                    None => writeln!(self.writer, "error      {source}: {reason}"),
                }
            }
            (PlanStatus::Rename, None) => writeln!(self.writer, "rename     {source}"),
        }
    }

    fn show(&self, path: &Path) -> String {
        crate::pipeline::discovery::relative_to(path, self.root)
            .display()
            .to_string()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Serialize one item as a single JSON line.
pub fn write_json_line<W: Write, T: Serialize>(writer: &mut W, item: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, item).map_err(io::Error::other)?;
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn rows() -> Vec<PlannedRename> {
        vec![
            PlannedRename {
                source: PathBuf::from("/photos/a.jpg"),
                destination: Some(PathBuf::from("/photos/Trip 001.jpg")),
                status: PlanStatus::Rename,
                reason: None,
                date: None,
            },
            PlannedRename {
                source: PathBuf::from("/photos/a.cr2"),
                destination: None,
                status: PlanStatus::Delete,
                reason: None,
                date: None,
            },
            PlannedRename {
                source: PathBuf::from("/photos/b.jpg"),
                destination: Some(PathBuf::from("/photos/x.jpg")),
                status: PlanStatus::Error,
                reason: Some("Destination not unique".to_string()),
                date: None,
            },
        ]
    }

    #[test]
    fn test_table_uses_relative_paths() {
        let root = PathBuf::from("/photos");
        let mut buffer = Vec::new();
        let renames = PlanWriter::new(&mut buffer, OutputFormat::Table, Some(&root))
            .write_plan(&rows())
            .unwrap();
        assert_eq!(renames, 1);

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "rename     a.jpg -> Trip 001.jpg");
        assert_eq!(lines[1], "delete     a.cr2");
        assert_eq!(lines[2], "error      b.jpg -> x.jpg: Destination not unique");
    }

    #[test]
    fn test_jsonl_one_row_per_line() {
        let mut buffer = Vec::new();
        PlanWriter::new(&mut buffer, OutputFormat::JsonLines, None)
            .write_plan(&rows())
            .unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("\"status\":\"delete\""));
        assert!(!lines[1].contains("destination"));
    }

    #[test]
    fn test_json_array() {
        let mut buffer = Vec::new();
        PlanWriter::new(&mut buffer, OutputFormat::Json, None)
            .write_plan(&rows())
            .unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.starts_with('['));
        assert!(output.trim().ends_with(']'));
        assert!(output.contains("\"reason\": \"Destination not unique\""));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("JSONL"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("table"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::parse("xml"), None);
    }
}
