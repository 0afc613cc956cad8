//! Env-file codec.
//!
//! Reads and writes the dotenv-style `KEY=VALUE` format that
//! application environments are stored in. Writes are deterministic:
//! one line per entry in key order, values quoted only when they need
//! to be.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::Environment;

/// Errors from reading or writing an env file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// Key is empty or contains a character that cannot be round-tripped.
    #[error("invalid environment key: {0:?}")]
    InvalidKey(String),

    /// A line has no `=` separator.
    #[error("malformed line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    /// A quoted value is missing its closing quote.
    #[error("unterminated quote on line {line}")]
    UnterminatedQuote { line: usize },
}

/// Result type for env-file operations.
pub type EnvResult<T> = Result<T, EnvError>;

/// Serializes an environment to env-file text.
///
/// # Errors
///
/// Returns an error if a key is empty or contains `=`, `#`, a quote, or
/// whitespace; such keys cannot be read back.
pub fn write(env: &Environment) -> EnvResult<String> {
    let mut out = String::new();
    for (key, value) in env {
        if key.is_empty() || key.chars().any(|c| c.is_whitespace() || "=#\"".contains(c)) {
            return Err(EnvError::InvalidKey(key.clone()));
        }
        if needs_quoting(value) {
            out.push_str(key);
            out.push_str("=\"");
            for c in value.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    _ => out.push(c),
                }
            }
            out.push_str("\"\n");
        } else {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
    }
    Ok(out)
}

/// Parses env-file text into an environment.
///
/// Blank lines and `#` comments are skipped. Later entries for the same
/// key win.
///
/// # Errors
///
/// Returns an error for a non-comment line without `=`, or a quoted
/// value without a closing quote.
pub fn read(input: &str) -> EnvResult<Environment> {
    let mut env = BTreeMap::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(EnvError::MalformedLine {
                line: idx + 1,
                content: raw.to_string(),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(EnvError::MalformedLine {
                line: idx + 1,
                content: raw.to_string(),
            });
        }
        let value = parse_value(value.trim(), idx + 1)?;
        env.insert(key.to_string(), value);
    }
    Ok(env)
}

/// Whether a value must be quoted to survive a round trip.
fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value != value.trim()
        || value.chars().any(|c| "\"#\n\\".contains(c))
}

fn parse_value(raw: &str, line: usize) -> EnvResult<String> {
    let Some(rest) = raw.strip_prefix('"') else {
        // Bare value; a trailing comment is not part of it.
        let value = match raw.split_once(" #") {
            Some((v, _)) => v.trim_end(),
            None => raw,
        };
        return Ok(value.to_string());
    };

    let mut out = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(out),
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => return Err(EnvError::UnterminatedQuote { line }),
            },
            _ => out.push(c),
        }
    }
    Err(EnvError::UnterminatedQuote { line })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_write_simple() {
        let out = write(&env(&[("FOO", "bar")])).unwrap();
        assert_eq!(out, "FOO=bar\n");
    }

    #[test]
    fn test_write_is_key_ordered() {
        let out = write(&env(&[("B", "2"), ("A", "1")])).unwrap();
        assert_eq!(out, "A=1\nB=2\n");
    }

    #[test]
    fn test_write_quotes_when_needed() {
        let out = write(&env(&[("MSG", "hello \"world\"")])).unwrap();
        assert_eq!(out, "MSG=\"hello \\\"world\\\"\"\n");

        let out = write(&env(&[("EMPTY", "")])).unwrap();
        assert_eq!(out, "EMPTY=\"\"\n");

        let out = write(&env(&[("NL", "a\nb")])).unwrap();
        assert_eq!(out, "NL=\"a\\nb\"\n");
    }

    #[test]
    fn test_write_rejects_bad_keys() {
        for key in ["", "A B", "A=B", "A#B"] {
            let result = write(&env(&[(key, "x")]));
            assert!(matches!(result, Err(EnvError::InvalidKey(_))), "{key:?}");
        }
    }

    #[test]
    fn test_read_simple() {
        let parsed = read("FOO=bar\nBAZ=qux\n").unwrap();
        assert_eq!(parsed, env(&[("FOO", "bar"), ("BAZ", "qux")]));
    }

    #[test]
    fn test_read_skips_comments_and_blanks() {
        let parsed = read("# comment\n\nFOO=bar\n").unwrap();
        assert_eq!(parsed, env(&[("FOO", "bar")]));
    }

    #[test]
    fn test_read_quoted_value() {
        let parsed = read("MSG=\"hello \\\"world\\\"\"\n").unwrap();
        assert_eq!(parsed, env(&[("MSG", "hello \"world\"")]));
    }

    #[test]
    fn test_read_value_with_equals() {
        let parsed = read("DATABASE_URL=postgres://host/db?sslmode=disable\n").unwrap();
        assert_eq!(
            parsed["DATABASE_URL"],
            "postgres://host/db?sslmode=disable"
        );
    }

    #[test]
    fn test_read_malformed_line() {
        let result = read("FOO=bar\nnot a pair\n");
        assert_eq!(
            result,
            Err(EnvError::MalformedLine {
                line: 2,
                content: "not a pair".to_string(),
            })
        );
    }

    #[test]
    fn test_read_unterminated_quote() {
        let result = read("FOO=\"no end\n");
        assert_eq!(result, Err(EnvError::UnterminatedQuote { line: 1 }));
    }

    #[test]
    fn test_round_trip() {
        let original = env(&[
            ("DATABASE_URL", "postgres://host/db"),
            ("EMPTY", ""),
            ("MESSAGE", "line one\nline two"),
            ("QUOTED", "say \"hi\""),
        ]);
        let text = write(&original).unwrap();
        assert_eq!(read(&text).unwrap(), original);
    }
}
