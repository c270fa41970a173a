//! Canonical artifact names.
//!
//! Model files are keyed by their parameters:
//!
//! `p5625_g+4.2_m0.0_t01_st_z-0.30_a+0.00_c+0.00_n+0.00_o+0.00_r+0.00_s+0.00.mod`
//!
//! Other tools read and write these names, so the formatting is fixed: integer
//! temperature, gravity with one decimal, metallicity and abundance offsets
//! with two decimals, all sign-forced.
//!
//! A `ModelKey` stores the quantised integers rather than floats. Formatting
//! is then a pure function of integers with fixed delimiters, which makes the
//! name injective over keys (no two keys share a name) and removes the usual
//! float artefacts (`-0.00`, `0.30000000000000004`).

use std::fmt;

use crate::domain::{Abundances, Modes, OutputMode, ParameterGridRow, Pipeline};

const GRAVITY_SCALE: f64 = 10.0;
const HUNDREDTHS: f64 = 100.0;

/// Parameters that select one model atmosphere file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub teff: i64,
    /// Gravity in tenths of dex.
    pub logg_tenths: i64,
    /// Metallicity in hundredths of dex.
    pub feh_hundredths: i64,
    pub turbulence_tag: String,
    /// `a, c, n, o, r, s` in hundredths of dex.
    pub abundances_hundredths: [i64; 6],
}

impl ModelKey {
    pub fn new(teff: f64, logg: f64, feh: f64, turbulence_tag: &str, abundances: &Abundances) -> Self {
        let mut abundances_hundredths = [0i64; 6];
        for (slot, value) in abundances_hundredths.iter_mut().zip(abundances.as_array()) {
            *slot = quantize(value, HUNDREDTHS);
        }
        Self {
            teff: teff.round() as i64,
            logg_tenths: quantize(logg, GRAVITY_SCALE),
            feh_hundredths: quantize(feh, HUNDREDTHS),
            turbulence_tag: turbulence_tag.to_string(),
            abundances_hundredths,
        }
    }

    pub fn from_row(row: &ParameterGridRow) -> Self {
        Self::new(row.teff, row.logg, row.feh, &row.turbulence_tag, &row.abundances)
    }

    /// Same key with the three bracketed axes substituted.
    ///
    /// Used to enumerate interpolation corners: everything that is not
    /// bracketed stays fixed to the target row's values.
    pub fn with_axes(&self, teff: f64, logg: f64, feh: f64) -> Self {
        Self {
            teff: teff.round() as i64,
            logg_tenths: quantize(logg, GRAVITY_SCALE),
            feh_hundredths: quantize(feh, HUNDREDTHS),
            ..self.clone()
        }
    }

    pub fn teff_value(&self) -> f64 {
        self.teff as f64
    }

    pub fn logg_value(&self) -> f64 {
        self.logg_tenths as f64 / GRAVITY_SCALE
    }

    pub fn feh_value(&self) -> f64 {
        self.feh_hundredths as f64 / HUNDREDTHS
    }

    /// Name without extension; the stem of every artifact derived from this model.
    pub fn base_name(&self) -> String {
        let [a, c, n, o, r, s] = self.abundances_hundredths;
        format!(
            "p{}_g{}_m0.0_t{}_st_z{}_a{}_c{}_n{}_o{}_r{}_s{}",
            self.teff,
            signed_fixed(self.logg_tenths, 1),
            self.turbulence_tag,
            signed_fixed(self.feh_hundredths, 2),
            signed_fixed(a, 2),
            signed_fixed(c, 2),
            signed_fixed(n, 2),
            signed_fixed(o, 2),
            signed_fixed(r, 2),
            signed_fixed(s, 2),
        )
    }

    pub fn file_name(&self) -> String {
        format!("{}.mod", self.base_name())
    }

    /// Parse a canonical model file name back into its key.
    ///
    /// Returns `None` for anything that is not exactly in canonical form.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".mod")?;
        let parts: Vec<&str> = stem.split('_').collect();
        let [p, g, m, t, st, z, a, c, n, o, r, s] = parts.as_slice() else {
            return None;
        };
        if *m != "m0.0" || *st != "st" {
            return None;
        }

        let teff = p.strip_prefix('p')?;
        if teff.is_empty() || !teff.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let turbulence_tag = t.strip_prefix('t')?;
        if !is_valid_turbulence_tag(turbulence_tag) {
            return None;
        }

        let key = ModelKey {
            teff: teff.parse().ok()?,
            logg_tenths: parse_signed_fixed(g.strip_prefix('g')?, 1)?,
            feh_hundredths: parse_signed_fixed(z.strip_prefix('z')?, 2)?,
            turbulence_tag: turbulence_tag.to_string(),
            abundances_hundredths: [
                parse_signed_fixed(a.strip_prefix('a')?, 2)?,
                parse_signed_fixed(c.strip_prefix('c')?, 2)?,
                parse_signed_fixed(n.strip_prefix('n')?, 2)?,
                parse_signed_fixed(o.strip_prefix('o')?, 2)?,
                parse_signed_fixed(r.strip_prefix('r')?, 2)?,
                parse_signed_fixed(s.strip_prefix('s')?, 2)?,
            ],
        };

        // Reject non-canonical spellings such as `p05000` so that
        // parse(name).file_name() == name.
        (key.file_name() == file_name).then_some(key)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_name())
    }
}

/// Turbulence tags are embedded between `_` delimiters.
pub fn is_valid_turbulence_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// `{flux|intensity}.{1D|3D}.{LTE|NLTE}`: the part of a synthesis artifact
/// name that keeps different output and mode choices for one model apart.
pub fn mode_suffix(output: OutputMode, modes: Modes) -> String {
    format!(
        "{}.{}.{}",
        output.tag(),
        modes.geometry.tag(),
        modes.calculation.tag()
    )
}

/// Mode suffix for a row. Rows whose modes do not resolve fall back to their
/// sanitised raw tags, so their logs still get distinct names.
pub fn row_mode_suffix(row: &ParameterGridRow) -> String {
    match row.modes() {
        Ok(modes) => mode_suffix(row.output_mode, modes),
        Err(_) => format!(
            "{}.{}.{}",
            row.output_mode.tag(),
            sanitize_tag(&row.geometry.to_ascii_uppercase()),
            sanitize_tag(&row.calculation.to_ascii_uppercase())
        ),
    }
}

pub fn spectrum_file_name(key: &ModelKey, suffix: &str) -> String {
    format!("{}.{suffix}.spec", key.base_name())
}

pub fn opacity_file_name(key: &ModelKey, suffix: &str) -> String {
    format!("{}.{suffix}.opac", key.base_name())
}

pub fn interpolation_scratch_name(key: &ModelKey) -> String {
    format!("{}.alt", key.base_name())
}

pub fn job_log_name(key: &ModelKey, suffix: &str, pipeline: Pipeline) -> String {
    format!("{}.{suffix}.{}.log", key.base_name(), pipeline.tag())
}

/// Reduce a free-form tag to characters that are safe in a file name.
pub fn sanitize_tag(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "none".to_string()
    } else {
        cleaned
    }
}

fn quantize(value: f64, scale: f64) -> i64 {
    // `as` saturates; the reader rejects non-finite values before we get here.
    (value * scale).round() as i64
}

fn signed_fixed(value: i64, decimals: u32) -> String {
    let scale = 10i64.pow(decimals);
    let sign = if value < 0 { '-' } else { '+' };
    let abs = value.unsigned_abs();
    let scale = scale as u64;
    format!(
        "{sign}{}.{:0width$}",
        abs / scale,
        abs % scale,
        width = decimals as usize
    )
}

fn parse_signed_fixed(raw: &str, decimals: u32) -> Option<i64> {
    let (negative, rest) = match raw.as_bytes().first()? {
        b'+' => (false, &raw[1..]),
        b'-' => (true, &raw[1..]),
        _ => return None,
    };
    let (int_part, frac_part) = rest.split_once('.')?;
    if int_part.is_empty()
        || frac_part.len() != decimals as usize
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let scale = 10i64.pow(decimals);
    let magnitude = int_part.parse::<i64>().ok()? * scale + frac_part.parse::<i64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
