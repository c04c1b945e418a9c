use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterpolationError {
    #[error("Required environment variable not found: {0}")]
    RequiredVarNotFound(String),

    #[error("Recursive interpolation limit exceeded")]
    RecursionLimit,
}

pub type InterpolationResult<T> = Result<T, InterpolationError>;

/// Nesting depth: every pass expands all references present in the value
const MAX_DEPTH: usize = 10;

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex pattern")
});

/// Expands `${VAR}` and `${VAR:-default}` references from the process
/// environment. A default may itself reference variables.
pub fn interpolate(input: &str) -> InterpolationResult<String> {
    let mut current = input.to_string();

    for _ in 0..MAX_DEPTH {
        let references: Vec<_> = VAR_PATTERN
            .captures_iter(&current)
            .filter_map(|cap| {
                Some((
                    cap.get(0)?.range(),
                    cap.get(1)?.as_str().to_string(),
                    cap.get(2).map(|m| m.as_str().to_string()),
                ))
            })
            .collect();
        if references.is_empty() {
            return Ok(current);
        }

        // Right to left so earlier ranges stay valid
        for (range, name, default) in references.into_iter().rev() {
            let replacement = match (std::env::var(&name), default) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default,
                (Err(_), None) => return Err(InterpolationError::RequiredVarNotFound(name)),
            };
            current.replace_range(range, &replacement);
        }
    }

    if VAR_PATTERN.is_match(&current) {
        Err(InterpolationError::RecursionLimit)
    } else {
        Ok(current)
    }
}

/// Interpolates every string inside a parsed TOML tree in place
pub fn interpolate_toml(value: &mut toml::Value) -> InterpolationResult<()> {
    match value {
        toml::Value::String(s) => {
            *s = interpolate(s)?;
        }
        toml::Value::Array(items) => {
            for item in items {
                interpolate_toml(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, v) in table.iter_mut() {
                interpolate_toml(v)?;
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn has_variables(input: &str) -> bool {
    VAR_PATTERN.is_match(input)
}
