use std::path::Path;

use crate::app::pipeline::{Job, PlannedAction, PlannedRow, PipelineOptions};
use crate::config::RunEnv;
use crate::domain::{ModelKey, ParameterGridRow};
use crate::grid::{GridFile, ReferenceGrid};
use crate::scheduler::{RowStatus, RunReport};

/// Printed before dispatch.
pub fn format_run_header(options: &PipelineOptions, grid_path: &Path, grid: &GridFile, env: &RunEnv) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== tsgrid - {} ===\n", options.pipeline.tag()));
    out.push_str(&format!("Grid: {}\n", grid_path.display()));
    out.push_str(&format!(
        "Rows: {} read | {} scheduled | {} duplicate(s) dropped\n",
        grid.rows_read,
        grid.rows.len(),
        grid.duplicates.len()
    ));
    out.push_str(&format!(
        "Workers: {} | on failure: {:?}{}\n",
        options.workers,
        options.policy,
        if options.force { " | force" } else { "" }
    ));
    out.push_str(&format!(
        "Reference grid: teff={} logg={} feh={}\n",
        fmt_axis(&env.reference.teff),
        fmt_axis(&env.reference.logg),
        fmt_axis(&env.reference.feh)
    ));
    out.push_str(&format!("Models: {}\n", env.dirs.models.display()));
    out.push_str(&format!("Spectra: {}\n", env.dirs.spectra.display()));
    out.push_str(&format!("Logs: {}\n", env.dirs.logs.display()));

    out
}

/// Printed after the run.
pub fn format_summary(jobs: &[Job<'_>], report: &RunReport, env: &RunEnv) -> String {
    let mut out = String::new();
    let counts = report.counts();

    out.push_str("\nSummary:\n");
    out.push_str(&format!(
        "- succeeded={} failed={} skipped={} not_started={}\n",
        counts.succeeded, counts.failed, counts.skipped, counts.not_started
    ));
    out.push_str(&format!(
        "- elapsed={:.1}s peak_in_flight={}/{}\n",
        report.elapsed_secs, report.peak_in_flight, report.workers
    ));
    if report.aborted {
        out.push_str("- run ABORTED after a failed job (abort-on-failure)\n");
    }

    let problems: Vec<(&Job<'_>, &RowStatus)> = jobs
        .iter()
        .zip(&report.outcomes)
        .filter(|(_, status)| matches!(status, RowStatus::Failed { .. }))
        .collect();
    if !problems.is_empty() {
        out.push_str("\nFailed rows:\n");
        out.push_str(&table_header());
        for (job, status) in problems {
            let detail = match status {
                RowStatus::Failed { message, .. } => message.as_str(),
                _ => "",
            };
            out.push_str(&table_row(job.row.line, status.label(), &job.paths.log, detail));
        }
    }

    out.push_str(&format!("\nPer-job logs: {}\n", env.dirs.logs.display()));
    out
}

pub fn format_plan(planned: &[PlannedRow]) -> String {
    let mut out = String::new();
    out.push_str("Dry run (nothing executed):\n");
    out.push_str(&format!("{:>6} {:<12} {}\n", "line", "action", "target"));
    out.push_str(format!("{:-<6} {:-<12} {:-<40}\n", "", "", "").as_str());

    for row in planned {
        let name = file_name(&row.target);
        let (action, note) = match &row.action {
            PlannedAction::Skip => ("skip", String::new()),
            PlannedAction::Run => ("run", String::new()),
            PlannedAction::Interpolate { missing_corners } if missing_corners.is_empty() => {
                ("interpolate", String::new())
            }
            PlannedAction::Interpolate { missing_corners } => (
                "interpolate",
                format!(" (would fail: {} corner(s) missing)", missing_corners.len()),
            ),
            PlannedAction::Invalid { reason } => ("invalid", format!(" ({reason})")),
        };
        out.push_str(format!("{:>6} {:<12} {name}{note}\n", row.line, action).as_str());
    }
    out
}

/// Brackets and corner model names for every row.
pub fn format_brackets(rows: &[ParameterGridRow], reference: &ReferenceGrid) -> String {
    let mut out = String::new();
    for row in rows {
        let key = ModelKey::from_row(row);
        out.push_str(&format!("line {}: {}\n", row.line, key.file_name()));
        match reference.corners(row.teff, row.logg, row.feh) {
            Ok(corners) => {
                out.push_str(&format!(
                    "  teff [{}, {}]  logg [{}, {}]  feh [{}, {}]\n",
                    corners.teff.low,
                    corners.teff.high,
                    corners.logg.low,
                    corners.logg.high,
                    corners.feh.low,
                    corners.feh.high
                ));
                for corner in corners.keys(&key) {
                    out.push_str(&format!("  {}\n", corner.file_name()));
                }
            }
            Err(err) => out.push_str(&format!("  cannot bracket: {err}\n")),
        }
    }
    out
}

fn table_header() -> String {
    let mut out = String::new();
    out.push_str(format!("{:>6} {:<12} {:<48} {}", "line", "status", "log", "reason").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<12} {:-<48} {:-<24}", "", "", "", "").trim_end());
    out.push('\n');
    out
}

fn table_row(line: usize, status: &str, log: &Path, detail: &str) -> String {
    let mut out = format!("{:>6} {:<12} {:<48} {}", line, status, truncate(&file_name(log), 48), detail)
        .trim_end()
        .to_string();
    out.push('\n');
    out
}

fn fmt_axis(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Abundances, OutputMode, Wavelengths};
    use std::path::PathBuf;

    fn row() -> ParameterGridRow {
        ParameterGridRow {
            line: 2,
            grid_version: None,
            teff: 5625.0,
            logg: 4.2,
            feh: -0.3,
            wavelengths: Wavelengths {
                min: 6000.0,
                max: 6100.0,
                step: 0.01,
            },
            microturbulence: 1.0,
            turbulence_tag: "01".to_string(),
            abundances: Abundances::default(),
            output_mode: OutputMode::Flux,
            geometry: "1D".to_string(),
            calculation: "LTE".to_string(),
        }
    }

    #[test]
    fn bracket_listing_shows_eight_corners() {
        let reference = ReferenceGrid::new(
            vec![5000.0, 5250.0, 5500.0, 5750.0, 6000.0, 6250.0],
            vec![3.5, 4.0, 4.5, 5.0],
            vec![-1.0, -0.5, 0.0, 0.5],
        )
        .unwrap();
        let text = format_brackets(&[row()], &reference);
        assert!(text.contains("teff [5500, 5750]  logg [4, 4.5]  feh [-0.5, 0]"));
        assert_eq!(text.lines().filter(|l| l.starts_with("  p")).count(), 8);
    }

    #[test]
    fn plan_marks_missing_corners() {
        let planned = vec![
            PlannedRow {
                line: 2,
                target: PathBuf::from("/s/a.spec"),
                action: PlannedAction::Skip,
            },
            PlannedRow {
                line: 3,
                target: PathBuf::from("/s/b.spec"),
                action: PlannedAction::Interpolate {
                    missing_corners: vec![PathBuf::from("/m/c.mod")],
                },
            },
        ];
        let text = format_plan(&planned);
        assert!(text.contains("skip"));
        assert!(text.contains("b.spec (would fail: 1 corner(s) missing)"));
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
