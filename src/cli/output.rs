//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{OutputFormat, PilumArgs};
use crate::error::Result;
use crate::vector::codec::format::{FieldMetaRow, IndexRepresentation};

/// Result structure for a segment build.
#[derive(Debug, Serialize)]
pub struct BuildResult {
    pub segment: String,
    pub meta_file: String,
    pub index_file: String,
    pub index_size_bytes: u64,
    pub index_types: String,
    pub duration_ms: u64,
    pub fields: Vec<FieldMetaRow>,
}

/// Result structure for segment inspection.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    pub segment: String,
    pub segment_id: String,
    pub version: u32,
    pub index_size_bytes: u64,
    pub fields: Vec<FieldMetaRow>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &PilumArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &PilumArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    let serde_json::Value::Object(obj) = value else {
        println!("{}", format_value(&value));
        return Ok(());
    };

    for (key, val) in &obj {
        match (key.as_str(), val) {
            ("fields", serde_json::Value::Array(_)) => {}
            (key, val) if key.ends_with("_bytes") => {
                println!("{key}: {}", format_bytes(val.as_u64().unwrap_or(0)));
            }
            (key, val) => println!("{key}: {}", format_value(val)),
        }
    }

    if let Some(serde_json::Value::Array(rows)) = obj.get("fields") {
        println!();
        println!(
            "{:>6} {:>8} {:>5} {:>8}  {:<22} {:<22} {:<22}",
            "field", "vectors", "dim", "sim", "fast-graph", "brute-force", "cpu-graph"
        );
        for row in rows {
            if let Ok(row) = serde_json::from_value::<RowView>(row.clone()) {
                println!("{}", row.format_line());
            }
        }
    }
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
struct RowView {
    field_number: i32,
    similarity: String,
    dimension: usize,
    count: usize,
    fast_graph: RepresentationView,
    brute_force: RepresentationView,
    cpu_graph: RepresentationView,
}

#[derive(Debug, serde::Deserialize)]
struct RepresentationView {
    offset: u64,
    length: u64,
}

impl RowView {
    fn format_line(&self) -> String {
        format!(
            "{:>6} {:>8} {:>5} {:>8}  {:<22} {:<22} {:<22}",
            self.field_number,
            self.count,
            self.dimension,
            self.similarity,
            format_representation(&IndexRepresentation::new(
                self.fast_graph.offset,
                self.fast_graph.length
            )),
            format_representation(&IndexRepresentation::new(
                self.brute_force.offset,
                self.brute_force.length
            )),
            format_representation(&IndexRepresentation::new(
                self.cpu_graph.offset,
                self.cpu_graph.length
            )),
        )
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &PilumArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

fn format_representation(representation: &IndexRepresentation) -> String {
    if representation.is_present() {
        format!("@{} ({})", representation.offset, format_bytes(representation.length))
    } else {
        "-".to_string()
    }
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => format!("[{} items]", arr.len()),
        serde_json::Value::Object(_) => "[object]".to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

/// Format bytes into human-readable format.
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}
