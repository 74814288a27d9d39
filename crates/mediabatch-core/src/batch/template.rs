//! Destination name templates.
//!
//! Templates use brace placeholders with an optional format spec, e.g.
//! `{directory:s}/{base:s} {counter:03d}{extension:s}`. `{{` and `}}` are
//! literal braces. A spec is an optional `0` fill flag, an optional width
//! and an optional `s` or `d` type; `d` and zero fill apply to `counter`
//! only.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::NAME_TIME_FORMAT;

/// Placeholders a template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Directory of the source file
    Directory,
    /// Base name assigned to the group
    Base,
    /// Group number
    Counter,
    /// Group number as letters (`a`, `b`, ..., `aa`)
    AlphaCounter,
    /// File index within the group, lowercased (`.jpg`, `(hdr).tif`)
    Extension,
    /// Group creation time
    DateTime,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "directory" => Field::Directory,
            "base" => Field::Base,
            "counter" => Field::Counter,
            "alphacounter" => Field::AlphaCounter,
            "extension" => Field::Extension,
            "datetime" => Field::DateTime,
            _ => return None,
        })
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Field::Counter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Spec {
    zero: bool,
    width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field, Spec),
}

/// Values substituted into a template for one file.
#[derive(Debug, Clone, Default)]
pub struct NameValues<'a> {
    pub directory: &'a str,
    pub base: &'a str,
    pub counter: u64,
    pub extension: &'a str,
    pub datetime: Option<NaiveDateTime>,
}

/// A parsed name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    segments: Vec<Segment>,
}

impl NameTemplate {
    /// Parse a template, rejecting unknown placeholders and specs.
    pub fn parse(format: &str) -> Result<Self, ConfigError> {
        let invalid = |msg: String| ConfigError::ValidationError(format!("format: {msg}"));
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("single '}' encountered".into())),
                '{' => {
                    let mut body = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(invalid("unterminated placeholder".into()))
                            }
                            Some(ch) => body.push(ch),
                        }
                    }
                    let (name, spec) = body.split_once(':').unwrap_or((&body, ""));
                    let field = Field::parse(name)
                        .ok_or_else(|| invalid(format!("unknown placeholder '{name}'")))?;
                    let spec = parse_spec(field, spec)
                        .ok_or_else(|| invalid(format!("unsupported spec '{spec}' for '{name}'")))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field, spec));
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Whether the template references `field`.
    pub fn uses(&self, field: Field) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Field(f, _) if *f == field))
    }

    pub fn render(&self, values: &NameValues<'_>) -> String {
        render_segments(&self.segments, values)
    }

    /// Render to a path. A leading `{directory}/` joins the rest onto
    /// `directory` so its components are kept byte for byte; other relative
    /// results are resolved against `directory`.
    pub fn render_path(&self, directory: &Path, values: &NameValues<'_>) -> PathBuf {
        if let [Segment::Field(Field::Directory, spec), rest @ ..] = self.segments.as_slice() {
            let separated = matches!(rest.first(), Some(Segment::Literal(text)) if text.starts_with('/'));
            if spec.width == 0 && separated {
                let rendered = render_segments(rest, values);
                return directory.join(rendered.trim_start_matches('/'));
            }
        }
        let rendered = PathBuf::from(self.render(values));
        if rendered.is_relative() {
            directory.join(rendered)
        } else {
            rendered
        }
    }
}

fn render_segments(segments: &[Segment], values: &NameValues<'_>) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Field(Field::Counter, spec) => {
                if spec.zero {
                    out.push_str(&format!("{:0width$}", values.counter, width = spec.width));
                } else {
                    out.push_str(&format!("{:>width$}", values.counter, width = spec.width));
                }
            }
            Segment::Field(field, spec) => {
                let text = match field {
                    Field::Directory => values.directory.to_string(),
                    Field::Base => values.base.to_string(),
                    Field::AlphaCounter => number_to_alpha(values.counter),
                    Field::Extension => values.extension.to_lowercase(),
                    Field::DateTime => values
                        .datetime
                        .map(|t| t.format(NAME_TIME_FORMAT).to_string())
                        .unwrap_or_default(),
                    Field::Counter => values.counter.to_string(),
                };
                out.push_str(&format!("{:<width$}", text, width = spec.width));
            }
        }
    }
    out
}

fn parse_spec(field: Field, spec: &str) -> Option<Spec> {
    let (body, kind) = match spec.chars().last() {
        Some(c @ ('s' | 'd')) => (&spec[..spec.len() - 1], Some(c)),
        _ => (spec, None),
    };
    if kind == Some('d') && !field.is_numeric() {
        return None;
    }
    let zero = body.starts_with('0') && body.len() > 1;
    if zero && !field.is_numeric() {
        return None;
    }
    let digits = if zero { &body[1..] } else { body };
    let width = if digits.is_empty() {
        0
    } else if digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()?
    } else {
        return None;
    };
    Some(Spec { zero, width })
}

/// Letter counter: `0 → a`, `25 → z`, `26 → aa`, `27 → ab`.
pub fn number_to_alpha(number: u64) -> String {
    let mut n = number + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> NameValues<'static> {
        NameValues {
            directory: "/photos",
            base: "Trip",
            counter: 7,
            extension: ".JPG",
            datetime: NaiveDateTime::parse_from_str("2019-05-04 13:21:07", "%Y-%m-%d %H:%M:%S")
                .ok(),
        }
    }

    #[test]
    fn test_number_to_alpha() {
        assert_eq!(number_to_alpha(0), "a");
        assert_eq!(number_to_alpha(25), "z");
        assert_eq!(number_to_alpha(26), "aa");
        assert_eq!(number_to_alpha(27), "ab");
        assert_eq!(number_to_alpha(26 + 26 * 26), "aaa");
    }

    #[test]
    fn test_render_group_preset() {
        let t = NameTemplate::parse("{directory:s}/{base:s} {counter:03d}{extension:s}").unwrap();
        assert_eq!(t.render(&values()), "/photos/Trip 007.jpg");
    }

    #[test]
    fn test_render_alpha_and_date() {
        let t = NameTemplate::parse("{directory}/{base}{alphacounter}{extension}").unwrap();
        assert_eq!(t.render(&values()), "/photos/Triph.jpg");

        let t = NameTemplate::parse("{datetime:s} {base:s}{extension:s}").unwrap();
        assert_eq!(t.render(&values()), "2019.05.04 13h21m07s Trip.jpg");
    }

    #[test]
    fn test_missing_datetime_renders_empty() {
        let t = NameTemplate::parse("{datetime}{base}").unwrap();
        let v = NameValues {
            datetime: None,
            ..values()
        };
        assert_eq!(t.render(&v), "Trip");
    }

    #[test]
    fn test_widths_and_escapes() {
        let t = NameTemplate::parse("{{{counter:4}}}-{base:6}|").unwrap();
        assert_eq!(t.render(&values()), "{   7}-Trip  |");
    }

    #[test]
    fn test_parse_errors() {
        assert!(NameTemplate::parse("{name}").is_err());
        assert!(NameTemplate::parse("{base:03d}").is_err());
        assert!(NameTemplate::parse("{base").is_err());
        assert!(NameTemplate::parse("base}").is_err());
        assert!(NameTemplate::parse("{counter:x}").is_err());
    }

    #[test]
    fn test_render_path() {
        let dir = Path::new("/photos/trip");
        let t = NameTemplate::parse("{directory:s}/{base:s} {counter:03d}{extension:s}").unwrap();
        assert_eq!(t.render_path(dir, &values()), Path::new("/photos/trip/Trip 007.jpg"));

        let t = NameTemplate::parse("{base}{extension}").unwrap();
        assert_eq!(t.render_path(dir, &values()), Path::new("/photos/trip/Trip.jpg"));

        let t = NameTemplate::parse("/sorted/{base}{extension}").unwrap();
        assert_eq!(t.render_path(dir, &values()), Path::new("/sorted/Trip.jpg"));

        // Without a separator the directory is part of the name
        let t = NameTemplate::parse("{directory}{base}{extension}").unwrap();
        let v = NameValues {
            directory: "/photos/trip",
            ..values()
        };
        assert_eq!(t.render_path(dir, &v), Path::new("/photos/tripTrip.jpg"));
    }

    #[cfg(unix)]
    #[test]
    fn test_render_path_keeps_non_utf8_directory() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = Path::new(OsStr::from_bytes(b"/photos/caf\xe9"));
        let t = NameTemplate::parse("{directory:s}/{base:s} {counter:03d}{extension:s}").unwrap();
        let v = NameValues {
            directory: "/photos/caf\u{fffd}",
            ..values()
        };
        let rendered = t.render_path(dir, &v);
        assert_eq!(rendered, dir.join("Trip 007.jpg"));
        assert_eq!(rendered.parent(), Some(dir));
    }

    #[test]
    fn test_uses() {
        let t = NameTemplate::parse("{directory}/{datetime} {base}{extension}").unwrap();
        assert!(t.uses(Field::DateTime));
        assert!(!t.uses(Field::Counter));
    }
}
