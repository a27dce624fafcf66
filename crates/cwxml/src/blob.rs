//! Numeric blobs stored in text nodes.
//!
//! Two shapes are used by the resource formats:
//!
//! - **Rows**: one record per line, components separated by `,` (vertex
//!   positions, vertex colours, poses).
//! - **Flat lists**: whitespace or comma separated values with no row
//!   structure (indices, bone ids, per-vertex weights).

use glam::{Vec2, Vec3, Vec4};

use crate::error::{XmlError, XmlResult};
use crate::value::{XmlValue, format_f32};
use crate::ElementPath;

/// A fixed-width row of a numeric blob.
pub trait BlobRow: Sized + Copy {
    /// Number of components per row.
    const WIDTH: usize;

    /// Parse a row from exactly `WIDTH` tokens.
    fn from_tokens(tokens: &[&str]) -> Option<Self>;

    /// Append the row's formatted components.
    fn write_tokens(&self, out: &mut Vec<String>);
}

fn floats<const N: usize>(tokens: &[&str]) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for (slot, token) in out.iter_mut().zip(tokens) {
        *slot = token.parse().ok()?;
    }
    Some(out)
}

impl BlobRow for Vec2 {
    const WIDTH: usize = 2;

    fn from_tokens(tokens: &[&str]) -> Option<Self> {
        floats::<2>(tokens).map(Vec2::from_array)
    }

    fn write_tokens(&self, out: &mut Vec<String>) {
        out.extend(self.to_array().iter().map(|v| format_f32(*v)));
    }
}

impl BlobRow for Vec3 {
    const WIDTH: usize = 3;

    fn from_tokens(tokens: &[&str]) -> Option<Self> {
        floats::<3>(tokens).map(Vec3::from_array)
    }

    fn write_tokens(&self, out: &mut Vec<String>) {
        out.extend(self.to_array().iter().map(|v| format_f32(*v)));
    }
}

impl BlobRow for Vec4 {
    const WIDTH: usize = 4;

    fn from_tokens(tokens: &[&str]) -> Option<Self> {
        floats::<4>(tokens).map(Vec4::from_array)
    }

    fn write_tokens(&self, out: &mut Vec<String>) {
        out.extend(self.to_array().iter().map(|v| format_f32(*v)));
    }
}

impl BlobRow for [u8; 4] {
    const WIDTH: usize = 4;

    fn from_tokens(tokens: &[&str]) -> Option<Self> {
        let mut out = [0u8; 4];
        for (slot, token) in out.iter_mut().zip(tokens) {
            *slot = token.parse().ok()?;
        }
        Some(out)
    }

    fn write_tokens(&self, out: &mut Vec<String>) {
        out.extend(self.iter().map(u8::to_string));
    }
}

fn split_tokens(line: &str) -> Vec<&str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parse a row blob, one row per non-blank line.
///
/// # Errors
///
/// Returns [`XmlError::MalformedBlob`] if a line does not hold exactly
/// `R::WIDTH` numeric components.
pub fn parse_rows<R: BlobRow>(text: &str, path: &ElementPath) -> XmlResult<Vec<R>> {
    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let tokens = split_tokens(line);
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() != R::WIDTH {
            return Err(XmlError::blob(
                path,
                format!(
                    "line {}: expected {} components, got {}",
                    line_no + 1,
                    R::WIDTH,
                    tokens.len()
                ),
            ));
        }
        let row = R::from_tokens(&tokens).ok_or_else(|| {
            XmlError::blob(path, format!("line {}: non-numeric token", line_no + 1))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Format a row blob: a leading newline, then one `a, b, c` line per row.
#[must_use]
pub fn format_rows<R: BlobRow>(rows: &[R]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut text = String::from("\n");
    let mut tokens = Vec::with_capacity(R::WIDTH);
    for row in rows {
        tokens.clear();
        row.write_tokens(&mut tokens);
        text.push_str(&tokens.join(", "));
        text.push('\n');
    }
    text
}

/// Parse a flat list of values separated by whitespace or commas.
///
/// # Errors
///
/// Returns [`XmlError::MalformedBlob`] on the first token that does not parse.
pub fn parse_flat<T: XmlValue>(text: &str, path: &ElementPath) -> XmlResult<Vec<T>> {
    split_tokens(text)
        .into_iter()
        .enumerate()
        .map(|(index, token)| {
            T::parse_xml(token).ok_or_else(|| {
                XmlError::blob(path, format!("token {index}: cannot parse '{token}'"))
            })
        })
        .collect()
}

/// Format a flat list, `per_line` values per line separated by single spaces.
#[must_use]
pub fn format_flat<T: XmlValue>(values: &[T], per_line: usize) -> String {
    if values.is_empty() {
        return String::new();
    }
    let mut text = String::from("\n");
    for chunk in values.chunks(per_line.max(1)) {
        let line: Vec<String> = chunk.iter().map(XmlValue::to_xml).collect();
        text.push_str(&line.join(" "));
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> ElementPath {
        ElementPath::root("Vertices")
    }

    #[test]
    fn test_parse_rows_vec3() {
        let rows: Vec<Vec3> = parse_rows("\n 1, 2, 3\n\n-1,0.5, 4 \n", &path()).unwrap();
        assert_eq!(rows, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, 4.0)]);
    }

    #[test]
    fn test_parse_rows_wrong_width() {
        let result: XmlResult<Vec<Vec3>> = parse_rows("1, 2, 3\n4, 5\n", &path());
        match result {
            Err(XmlError::MalformedBlob { element, reason }) => {
                assert_eq!(element.as_str(), "Vertices");
                assert!(reason.contains("line 2"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rows_non_numeric() {
        let result: XmlResult<Vec<[u8; 4]>> = parse_rows("255, 0, 0, abc", &path());
        assert!(matches!(result, Err(XmlError::MalformedBlob { .. })));
    }

    #[test]
    fn test_format_rows() {
        let text = format_rows(&[Vec3::new(1.0, 2.5, -3.0)]);
        assert_eq!(text, "\n1, 2.5, -3\n");
        assert_eq!(format_rows::<Vec3>(&[]), "");
    }

    #[test]
    fn test_flat_list_wraps() {
        let values: Vec<u32> = (0..5).collect();
        assert_eq!(format_flat(&values, 2), "\n0 1\n2 3\n4\n");
        let parsed: Vec<u32> = parse_flat("0 1\n2, 3 4", &path()).unwrap();
        assert_eq!(parsed, values);
    }

    #[test]
    fn test_flat_list_bad_token() {
        let result: XmlResult<Vec<u16>> = parse_flat("1 2 x", &path());
        assert!(matches!(result, Err(XmlError::MalformedBlob { .. })));
    }
}
