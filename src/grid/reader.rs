//! Parameter grid CSV reader.
//!
//! Turns the grid file into ordered `ParameterGridRow`s.
//!
//! - header row required, column names matched case-insensitively
//! - stray carriage returns are stripped from every field before use
//! - numeric or output-mode parse failures are grid errors (exit code 3)
//! - geometry / calculation tags are kept raw and resolved per job
//!
//! The grid is machine-generated, so one bad row means a bad file: we fail
//! fast with the line number rather than silently dropping rows.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{
    is_valid_turbulence_tag, row_mode_suffix, Abundances, ModelKey, OutputMode, ParameterGridRow, Wavelengths,
};
use crate::error::AppError;

const REQUIRED_COLUMNS: [&str; 17] = [
    "teff",
    "logg",
    "feh",
    "lam_min",
    "lam_max",
    "lam_step",
    "turbvel",
    "t_value",
    "a",
    "c",
    "n",
    "o",
    "r",
    "s",
    "output_mode",
    "mode",
    "calculation_mode",
];

/// A loaded grid in file order.
#[derive(Debug, Clone)]
pub struct GridFile {
    pub rows: Vec<ParameterGridRow>,
    pub rows_read: usize,
    /// `(dropped_line, kept_line)` for exact duplicate rows.
    pub duplicates: Vec<(usize, usize)>,
}

/// Read and validate a grid file.
pub fn read_grid(path: &Path) -> Result<GridFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::grid(format!("Failed to open grid '{}': {e}", path.display())))?;
    read_grid_from(file)
}

pub fn read_grid_from<R: Read>(input: R) -> Result<GridFile, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::grid(format!("Failed to read grid header: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for column in REQUIRED_COLUMNS {
        if !header_map.contains_key(column) {
            return Err(AppError::grid(format!("Grid is missing required column: `{column}`")));
        }
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Header is line 1; blank lines are skipped by the reader, so prefer
        // the record's own position.
        let fallback = idx + 2;
        let record =
            result.map_err(|e| AppError::grid(format!("Grid line {fallback}: CSV parse error: {e}")))?;
        let line = record.position().map_or(fallback, |p| p.line() as usize);
        if record.iter().all(|f| clean(f).is_empty()) {
            continue;
        }
        let row = parse_row(&record, &header_map, line)
            .map_err(|e| AppError::grid(format!("Grid line {line}: {e}")))?;
        rows.push(row);
    }
    let rows_read = rows.len();

    let (rows, duplicates) = check_collisions(rows)?;

    Ok(GridFile {
        rows,
        rows_read,
        duplicates,
    })
}

/// Enforce that distinct rows never share an artifact.
///
/// Two rows collide on output when they map to the same model name and the
/// same output/mode tags. If every parameter also matches, the later row is a
/// harmless duplicate and is dropped; otherwise two different computations
/// would write one file, which is rejected. Rows with different output tags
/// may share a model only when they request the same atmosphere.
pub fn check_collisions(
    rows: Vec<ParameterGridRow>,
) -> Result<(Vec<ParameterGridRow>, Vec<(usize, usize)>), AppError> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut models: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<ParameterGridRow> = Vec::with_capacity(rows.len());
    let mut duplicates = Vec::new();

    for row in rows {
        let identity = output_identity(&row);
        if let Some(&idx) = seen.get(&identity) {
            let first = &kept[idx];
            if first.same_parameters(&row) {
                duplicates.push((row.line, first.line));
                continue;
            }
            return Err(AppError::grid(format!(
                "Grid lines {} and {} differ but map to the same artifact '{identity}'.",
                first.line, row.line
            )));
        }

        let model = ModelKey::from_row(&row).file_name();
        if let Some(&idx) = models.get(&model) {
            let first = &kept[idx];
            if !first.same_model(&row) {
                return Err(AppError::grid(format!(
                    "Grid lines {} and {} request different atmospheres but share the model '{model}'.",
                    first.line, row.line
                )));
            }
        } else {
            models.insert(model, kept.len());
        }

        seen.insert(identity, kept.len());
        kept.push(row);
    }

    Ok((kept, duplicates))
}

fn output_identity(row: &ParameterGridRow) -> String {
    format!("{}.{}", ModelKey::from_row(row).base_name(), row_mode_suffix(row))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    clean(name).trim_start_matches('\u{feff}').to_ascii_lowercase()
}

/// Strip stray carriage returns and surrounding whitespace.
fn clean(field: &str) -> String {
    field.replace('\r', "").trim().to_string()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>, line: usize) -> Result<ParameterGridRow, String> {
    let teff = get_f64(record, header_map, "teff")?;
    if teff <= 0.0 {
        return Err(format!("`teff` must be > 0, got {teff}"));
    }

    let wavelengths = Wavelengths {
        min: get_f64(record, header_map, "lam_min")?,
        max: get_f64(record, header_map, "lam_max")?,
        step: get_f64(record, header_map, "lam_step")?,
    };
    if !(wavelengths.max > wavelengths.min && wavelengths.step > 0.0) {
        return Err(format!(
            "invalid wavelength range {}..{} step {}",
            wavelengths.min, wavelengths.max, wavelengths.step
        ));
    }

    let turbulence_tag = get_required(record, header_map, "t_value")?;
    if !is_valid_turbulence_tag(&turbulence_tag) {
        return Err(format!("`t_value` must be alphanumeric, got '{turbulence_tag}'"));
    }

    let output_raw = get_required(record, header_map, "output_mode")?;
    let output_mode = OutputMode::parse(&output_raw)
        .ok_or_else(|| format!("`output_mode` must be Flux or Intensity, got '{output_raw}'"))?;

    Ok(ParameterGridRow {
        line,
        grid_version: get_optional(record, header_map, "grid_version"),
        teff,
        logg: get_f64(record, header_map, "logg")?,
        feh: get_f64(record, header_map, "feh")?,
        wavelengths,
        microturbulence: get_f64(record, header_map, "turbvel")?,
        turbulence_tag,
        abundances: Abundances {
            alpha: get_f64(record, header_map, "a")?,
            carbon: get_f64(record, header_map, "c")?,
            nitrogen: get_f64(record, header_map, "n")?,
            oxygen: get_f64(record, header_map, "o")?,
            r_process: get_f64(record, header_map, "r")?,
            s_process: get_f64(record, header_map, "s")?,
        },
        output_mode,
        geometry: get_required(record, header_map, "mode")?,
        calculation: get_required(record, header_map, "calculation_mode")?,
    })
}

fn get_required(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<String, String> {
    get_optional(record, header_map, name).ok_or_else(|| format!("missing value for `{name}`"))
}

fn get_optional(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<String> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(clean).filter(|s| !s.is_empty())
}

fn get_f64(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<f64, String> {
    let raw = get_required(record, header_map, name)?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid number '{raw}' for `{name}`"))
}
