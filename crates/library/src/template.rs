//! Date-based subdirectories for uploads organized by date.
//!
//! Renders a user-configured [upon] template against a date, producing a
//! relative directory such as `2024/05`. The template syntax follows upon's
//! Mustache-like conventions (`{{ variable }}`, `{{ value|formatter }}`),
//! extended with one formatter:
//!
//! - **`pad`**: zero-pads integers to two digits (`5` → `05`).
//!
//! # Template Variables
//!
//! | Variable | Type  | Description            |
//! |----------|-------|------------------------|
//! | `year`   | `i64` | Calendar year          |
//! | `month`  | `u64` | Month of year, `1..=12`|
//! | `day`    | `u64` | Day of month, `1..=31` |
//!
//! # Example
//!
//! ```
//! use hoard_library::PathGenerator;
//! use time::{Date, Month, Time, UtcDateTime};
//!
//! let date = UtcDateTime::new(Date::from_calendar_date(2024, Month::May, 3).unwrap(), Time::MIDNIGHT);
//! let generator: PathGenerator = "{{ year }}/{{ month|pad }}".parse().unwrap();
//! assert_eq!(generator.generate(date).unwrap(), "2024/05");
//! ```

use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use hoard_storage::validate_path;
use std::str::FromStr;
use time::UtcDateTime;
use upon::{Engine, Template};

/// Generates relative directory paths from a date and a user-defined
/// template string.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at creation time rather than at upload time.
///
/// Generated paths are normalized (trimmed, deduplicated separators) and
/// validated by [`hoard_storage::validate_path`] so that a template can never
/// point outside the destination folder.
pub struct PathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for PathGenerator {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}
impl std::fmt::Debug for PathGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathGenerator").finish_non_exhaustive()
    }
}
impl PathGenerator {
    /// Renders the template for `date`, returning a normalized relative path.
    pub fn generate(&self, date: UtcDateTime) -> Result<String> {
        let parameters = upon::value! {
            year: i64::from(date.year()),
            month: u64::from(u8::from(date.month())),
            day: u64::from(date.day()),
        };
        let path = self.template.render(&self.engine, parameters).to_string().or_raise(|| ErrorKind::Template)?;
        Self::normalize(path)
    }

    /// Trims each path segment, drops empty ones, joins them with `/`, then
    /// validates via [`hoard_storage::validate_path`].
    fn normalize(s: impl Into<String>) -> Result<String> {
        let path = s.into().split('/').map(str::trim).filter(|segment| !segment.is_empty()).collect::<Vec<_>>().join("/");
        validate_path(&path).or_raise(|| ErrorKind::Template).and_then(|p| {
            p.to_str().map(|p| p.to_string())
            // Infallible: input was String, so won't fail. Here for completeness.
            .ok_or_raise(|| ErrorKind::Template)
        })
    }
}

/// Custom [`upon`] extensions for date paths.
mod addons {
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    fn pad_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::Integer(n) => write!(f, "{n:02}")?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("pad", pad_formatter);
    }
}
