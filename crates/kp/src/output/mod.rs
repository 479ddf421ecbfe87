//! Rendering resources for the terminal: aligned tables, key/value details and YAML.

use std::{io::Write as _, string::FromUtf8Error};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde::Serialize;
use snafu::{ResultExt as _, Snafu};
use tabwriter::{IntoInnerError, TabWriter};

/// Spaces between two columns.
const COLUMN_PADDING: usize = 3;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to align table"))]
    AlignTable { source: std::io::Error },

    #[snafu(display("aligned table is not valid UTF-8"))]
    TableEncoding { source: FromUtf8Error },

    #[snafu(display("failed to serialize {kind} as YAML"))]
    SerializeYaml {
        source: serde_yaml::Error,
        kind: String,
    },
}

/// A table with a fixed header, printed with left-aligned columns.
#[derive(Debug)]
pub struct Table {
    header: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            header: header.into_iter().collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> Result<String, Error> {
        let header = self.header.iter().map(|cell| (*cell).to_owned()).collect();
        align(std::iter::once(header).chain(self.rows.iter().cloned()))
    }
}

/// Renders labelled values, one per line, with the values aligned.
pub fn details<'a>(fields: impl IntoIterator<Item = (&'a str, String)>) -> Result<String, Error> {
    align(
        fields
            .into_iter()
            .map(|(label, value)| vec![format!("{label}:"), value]),
    )
}

fn align(rows: impl IntoIterator<Item = Vec<String>>) -> Result<String, Error> {
    let mut writer = TabWriter::new(Vec::new()).padding(COLUMN_PADDING);
    for row in rows {
        writeln!(writer, "{}", row.join("\t")).context(AlignTableSnafu)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err: IntoInnerError<_>| std::io::Error::new(err.error().kind(), err))
        .context(AlignTableSnafu)?;
    let aligned = String::from_utf8(bytes).context(TableEncodingSnafu)?;

    // Empty trailing cells are still padded.
    Ok(aligned
        .lines()
        .map(|line| format!("{}\n", line.trim_end()))
        .collect())
}

pub fn to_yaml<T: Serialize>(kind: &str, resource: &T) -> Result<String, Error> {
    serde_yaml::to_string(resource).context(SerializeYamlSnafu { kind })
}

/// The message printed instead of an empty table, e.g. `no images found`.
pub fn nothing_found(kind: &str) -> String {
    format!("no {kind}s found")
}

/// Formats a timestamp as RFC 3339, or an empty string.
pub fn format_time(time: Option<&Time>) -> String {
    time.map(|time| time.0.to_string()).unwrap_or_default()
}
