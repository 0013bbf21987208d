/// Marker every NULL-ish value normalizes to
pub const NULL: &str = "NULL";

/// Result column type, from the one-character tags of a query header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    /// `T` and any tag we don't know
    Text,
}

impl ColumnType {
    pub fn from_tag(tag: char) -> Self {
        match tag {
            'I' => ColumnType::Integer,
            'R' => ColumnType::Real,
            _ => ColumnType::Text,
        }
    }
}

/// Normalize a single value for comparison under the given type tag.
///
/// Never fails: anything that doesn't parse as the tagged type is returned
/// trimmed but otherwise untouched.
pub fn normalize(value: &str, type_tag: char) -> String {
    let value = value.trim();

    if value.is_empty() || value.eq_ignore_ascii_case(NULL) {
        return NULL.to_string();
    }

    match ColumnType::from_tag(type_tag) {
        ColumnType::Integer => normalize_integer(value),
        ColumnType::Real => normalize_real(value),
        ColumnType::Text => value.to_string(),
    }
}

/// Normalize a flattened row list, cycling through `type_tags` per column
pub fn normalize_all(values: &[String], type_tags: &[char]) -> Vec<String> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let tag = if type_tags.is_empty() {
                'T'
            } else {
                type_tags[i % type_tags.len()]
            };
            normalize(value, tag)
        })
        .collect()
}

fn normalize_integer(value: &str) -> String {
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() => {
            // Truncating -0.5 gives -0, which must print as "0"
            let truncated = f.trunc() + 0.0;
            format!("{:.0}", truncated)
        }
        _ => value.to_string(),
    }
}

fn normalize_real(value: &str) -> String {
    let f = match value.parse::<f64>() {
        Ok(f) if f.is_finite() => f,
        _ => return value.to_string(),
    };

    if f == f.trunc() {
        // Avoid rendering negative zero as "-0.0"
        let f = if f == 0.0 { 0.0 } else { f };
        return format!("{:.1}", f);
    }

    let formatted = format!("{:.3}", f);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
