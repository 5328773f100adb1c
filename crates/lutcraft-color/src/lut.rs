//! `.cube` text LUT parsing and serialization.

use std::fmt::Write as _;

use lutcraft_core::{LutCube, MAX_CUBE_SIZE, MIN_CUBE_SIZE};
use tracing::debug;

use crate::error::{malformed, ParseError};

/// Parse a `.cube` file containing a 3D LUT.
///
/// Accepts `LUT_3D_SIZE`, `DOMAIN_MIN`, `DOMAIN_MAX`, `LUT_3D_INPUT_RANGE`
/// and `TITLE` headers; other keyword lines and `#` comments are skipped.
/// When the size header is absent it is inferred from the row count.
pub fn parse_cube_text(content: &str) -> Result<LutCube, ParseError> {
    let mut size = 0usize;
    let mut data: Vec<f32> = Vec::new();
    let mut domain_min = [0.0f32; 3];
    let mut domain_max = [1.0f32; 3];

    for (line_no, raw) in content.lines().enumerate() {
        let line = match raw.find('#') {
            Some(pos) => raw[..pos].trim(),
            None => raw.trim(),
        };
        if line.is_empty() || line.starts_with("TITLE") {
            continue;
        }
        if let Some(rest) = line.strip_prefix("LUT_3D_SIZE") {
            size = rest.trim().parse().map_err(|e| {
                ParseError::Malformed(format!("bad LUT_3D_SIZE on line {}: {}", line_no + 1, e))
            })?;
            if !(MIN_CUBE_SIZE..=MAX_CUBE_SIZE).contains(&size) {
                return Err(ParseError::Malformed(format!(
                    "LUT_3D_SIZE {} on line {} outside {}..={}",
                    size,
                    line_no + 1,
                    MIN_CUBE_SIZE,
                    MAX_CUBE_SIZE
                )));
            }
            continue;
        }
        if line.starts_with("LUT_1D_SIZE") {
            return Err(ParseError::UnsupportedVariant(
                "expected 3D LUT, got 1D".into(),
            ));
        }
        if let Some(rest) = line.strip_prefix("DOMAIN_MIN") {
            domain_min = parse_triple(rest, line_no)?;
            continue;
        }
        if let Some(rest) = line.strip_prefix("DOMAIN_MAX") {
            domain_max = parse_triple(rest, line_no)?;
            continue;
        }
        if let Some(rest) = line.strip_prefix("LUT_3D_INPUT_RANGE") {
            let [lo, hi] = parse_pair(rest, line_no)?;
            domain_min = [lo; 3];
            domain_max = [hi; 3];
            continue;
        }
        if is_keyword_line(line) {
            debug!("skipping .cube keyword line {}: {}", line_no + 1, line);
            continue;
        }

        data.extend_from_slice(&parse_triple(line, line_no)?);
    }

    let rows = data.len() / 3;
    if size == 0 {
        size = cube_root_exact(rows).ok_or_else(|| {
            ParseError::Malformed(format!(
                "missing LUT_3D_SIZE and {} rows is not a perfect cube",
                rows
            ))
        })?;
        debug!("inferred LUT_3D_SIZE {} from row count", size);
    }
    let expected = size * size * size;
    if rows != expected {
        return Err(ParseError::Malformed(format!(
            "expected {} rows for size {}, got {}",
            expected, size, rows
        )));
    }

    let cube = LutCube::new(size, data).map_err(malformed)?;
    if domain_min == [0.0; 3] && domain_max == [1.0; 3] {
        Ok(cube)
    } else {
        cube.with_domain(domain_min, domain_max).map_err(malformed)
    }
}

/// Serialize a cube to `.cube` text.
pub fn to_cube_text(cube: &LutCube, title: Option<&str>) -> String {
    let mut out = String::with_capacity(cube.cell_count() * 27 + 64);
    if let Some(title) = title {
        let _ = writeln!(out, "TITLE \"{}\"", title);
    }
    let _ = writeln!(out, "LUT_3D_SIZE {}", cube.size());
    if !cube.has_default_domain() {
        let [a, b, c] = cube.domain_min();
        let _ = writeln!(out, "DOMAIN_MIN {} {} {}", a, b, c);
        let [a, b, c] = cube.domain_max();
        let _ = writeln!(out, "DOMAIN_MAX {} {} {}", a, b, c);
    }
    for rgb in cube.samples().chunks_exact(3) {
        let _ = writeln!(out, "{:.6} {:.6} {:.6}", rgb[0], rgb[1], rgb[2]);
    }
    out
}

/// Integer cube root, if `n` is a perfect cube.
pub(crate) fn cube_root_exact(n: usize) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let root = (n as f64).cbrt().round() as usize;
    (root.saturating_sub(1)..=root + 1).find(|r| r * r * r == n)
}

fn parse_triple(text: &str, line_no: usize) -> Result<[f32; 3], ParseError> {
    let vals = parse_floats(text, line_no)?;
    match vals.as_slice() {
        [r, g, b] => Ok([*r, *g, *b]),
        _ => Err(ParseError::Malformed(format!(
            "line {}: expected 3 values, got {}",
            line_no + 1,
            vals.len()
        ))),
    }
}

fn parse_pair(text: &str, line_no: usize) -> Result<[f32; 2], ParseError> {
    let vals = parse_floats(text, line_no)?;
    match vals.as_slice() {
        [lo, hi] => Ok([*lo, *hi]),
        _ => Err(ParseError::Malformed(format!(
            "line {}: expected 2 values, got {}",
            line_no + 1,
            vals.len()
        ))),
    }
}

/// Unknown keyword lines start with a word that is not itself a number
/// (`nan` and `inf` rows are data).
fn is_keyword_line(line: &str) -> bool {
    line.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && line
            .split_whitespace()
            .next()
            .is_some_and(|tok| tok.parse::<f32>().is_err())
}

fn parse_floats(text: &str, line_no: usize) -> Result<Vec<f32>, ParseError> {
    text.split_whitespace()
        .map(|tok| {
            let v = tok.parse::<f32>().map_err(|_| {
                ParseError::Malformed(format!("line {}: non-numeric token {:?}", line_no + 1, tok))
            })?;
            if v.is_finite() {
                Ok(v)
            } else {
                Err(ParseError::Malformed(format!(
                    "line {}: non-finite value {:?}",
                    line_no + 1,
                    tok
                )))
            }
        })
        .collect()
}
