//! Rotation path patterns.
//!
//! A pattern is a path containing zero or more placeholders:
//!
//! | placeholder | value            | rendered   |
//! |-------------|------------------|------------|
//! | `%Y`        | year             | `2024`     |
//! | `%M`        | month            | `03`       |
//! | `%D`        | day of month     | `07`       |
//! | `%H`        | hour (24h)       | `09`       |
//! | `%m`        | minute           | `05`       |
//!
//! Compiling a pattern yields the literal/slot segments to render plus one
//! slot per placeholder holding the extractor and its last observed value.
//! A change in any slot value is a rotation boundary.

use std::fmt::{self, Write as _};

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::error::{LogError, Result};

/// A calendar component a placeholder extracts from the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeField {
    /// `%Y`
    Year,
    /// `%M`
    Month,
    /// `%D`
    Day,
    /// `%H`
    Hour,
    /// `%m`
    Minute,
}

impl TimeField {
    /// Maps a placeholder character (the one after `%`) to its field.
    #[must_use]
    pub const fn from_placeholder(c: char) -> Option<Self> {
        match c {
            'Y' => Some(Self::Year),
            'M' => Some(Self::Month),
            'D' => Some(Self::Day),
            'H' => Some(Self::Hour),
            'm' => Some(Self::Minute),
            _ => None,
        }
    }

    /// Reads this field from `now`.
    #[must_use]
    pub fn extract(self, now: &DateTime<Local>) -> i32 {
        match self {
            Self::Year => now.year(),
            Self::Month => now.month() as i32,
            Self::Day => now.day() as i32,
            Self::Hour => now.hour() as i32,
            Self::Minute => now.minute() as i32,
        }
    }

    /// Zero-padded width of the rendered value; the year is not padded.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Year => 0,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    field: TimeField,
    last: i32,
}

/// A compiled rotation path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
    slots: Vec<Slot>,
}

impl PathPattern {
    /// Compiles `pattern`, seeding every slot from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidPattern`] on an unknown placeholder or a
    /// trailing `%`.
    pub fn compile(pattern: &str, now: DateTime<Local>) -> Result<Self> {
        let invalid = |reason: String| LogError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut slots = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            let Some(placeholder) = chars.next() else {
                return Err(invalid("dangling % at end of pattern".to_string()));
            };
            let field = TimeField::from_placeholder(placeholder)
                .ok_or_else(|| invalid(format!("unknown placeholder %{placeholder}")))?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Slot(slots.len()));
            slots.push(Slot {
                field,
                last: field.extract(&now),
            });
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
            slots,
        })
    }

    /// The pattern as configured.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True if the pattern has no placeholders and can never rotate.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.slots.is_empty()
    }

    /// The extracted fields in pattern order.
    pub fn fields(&self) -> impl Iterator<Item = TimeField> + '_ {
        self.slots.iter().map(|slot| slot.field)
    }

    /// The numeric format derived from the pattern, `%d` for the year and
    /// `%02d` for every other placeholder.
    #[must_use]
    pub fn numeric_format(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(index) => match self.slots[*index].field.width() {
                    0 => out.push_str("%d"),
                    width => {
                        let _ = write!(out, "%0{width}d");
                    }
                },
            }
        }
        out
    }

    /// Re-reads every slot from `now` without changing the pattern.
    ///
    /// Returns the pending [`Boundary`] if any slot value differs from the
    /// cached one. Apply it with [`commit`](Self::commit) once the archive
    /// has been written; until then every call reports the same archive.
    #[must_use]
    pub fn boundary(&self, now: DateTime<Local>) -> Option<Boundary> {
        let values: Vec<i32> = self.slots.iter().map(|s| s.field.extract(&now)).collect();
        if self.slots.iter().zip(&values).all(|(slot, v)| slot.last == *v) {
            return None;
        }
        Some(Boundary {
            archive: self.to_string(),
            values,
        })
    }

    /// Stores the values observed by `boundary` as the current bucket.
    pub fn commit(&mut self, boundary: Boundary) {
        for (slot, value) in self.slots.iter_mut().zip(boundary.values) {
            slot.last = value;
        }
    }

    /// [`boundary`](Self::boundary) followed by [`commit`](Self::commit).
    ///
    /// Returns the path rendered with the previous values if any slot changed.
    pub fn advance(&mut self, now: DateTime<Local>) -> Option<String> {
        let boundary = self.boundary(now)?;
        let archive = boundary.archive.clone();
        self.commit(boundary);
        Some(archive)
    }
}

/// A crossed rotation boundary that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    archive: String,
    values: Vec<i32>,
}

impl Boundary {
    /// The path rendered with the values of the bucket being closed.
    #[must_use]
    pub fn archive(&self) -> &str {
        &self.archive
    }
}

impl fmt::Display for PathPattern {
    /// Renders the path with the current slot values.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Slot(index) => {
                    let slot = self.slots[*index];
                    write!(f, "{:0width$}", slot.last, width = slot.field.width())?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_case::test_case;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn renders_zero_padded_components() {
        let pattern = PathPattern::compile("app-%Y-%M-%D.log", local(2024, 3, 7, 10, 0))
            .expect("compile");
        assert_eq!(pattern.to_string(), "app-2024-03-07.log");
        assert_eq!(
            pattern.fields().collect::<Vec<_>>(),
            [TimeField::Year, TimeField::Month, TimeField::Day]
        );
    }

    #[test]
    fn numeric_format_replaces_placeholders() {
        let pattern =
            PathPattern::compile("logs/%Y%M%D%H%m.log", local(2024, 3, 7, 10, 0)).expect("compile");
        assert_eq!(pattern.numeric_format(), "logs/%d%02d%02d%02d%02d.log");
    }

    #[test]
    fn static_pattern_never_advances() {
        let mut pattern = PathPattern::compile("app.log.bak", local(2024, 3, 7, 10, 0))
            .expect("compile");
        assert!(pattern.is_static());
        assert_eq!(pattern.advance(local(2030, 1, 1, 0, 0)), None);
        assert_eq!(pattern.to_string(), "app.log.bak");
    }

    #[test]
    fn advance_returns_previous_name_once() {
        let mut pattern = PathPattern::compile("app-%Y%M%D.log", local(2024, 3, 7, 23, 59))
            .expect("compile");

        assert_eq!(pattern.advance(local(2024, 3, 7, 23, 59)), None);
        assert_eq!(
            pattern.advance(local(2024, 3, 8, 0, 0)).as_deref(),
            Some("app-20240307.log")
        );
        assert_eq!(pattern.advance(local(2024, 3, 8, 0, 0)), None);
        assert_eq!(pattern.to_string(), "app-20240308.log");
    }

    #[test]
    fn uncommitted_boundary_is_reported_again() {
        let mut pattern =
            PathPattern::compile("app-%Y%M%D.log", local(2024, 3, 7, 12, 0)).expect("compile");

        let first = pattern.boundary(local(2024, 3, 8, 0, 0)).expect("boundary");
        let again = pattern.boundary(local(2024, 3, 8, 0, 5)).expect("boundary");
        assert_eq!(first.archive(), "app-20240307.log");
        assert_eq!(again.archive(), first.archive());
        assert_eq!(pattern.to_string(), "app-20240307.log");

        pattern.commit(again);
        assert_eq!(pattern.to_string(), "app-20240308.log");
        assert!(pattern.boundary(local(2024, 3, 8, 0, 5)).is_none());
    }

    #[test]
    fn day_pattern_ignores_hour_changes() {
        let mut pattern = PathPattern::compile("%D.log", local(2024, 3, 7, 10, 0)).expect("compile");
        assert_eq!(pattern.advance(local(2024, 3, 7, 18, 30)), None);
    }

    #[test]
    fn any_changed_component_triggers() {
        // Same day number in a different month still rotates.
        let mut pattern =
            PathPattern::compile("%M-%D.log", local(2024, 3, 7, 10, 0)).expect("compile");
        assert_eq!(
            pattern.advance(local(2024, 4, 7, 10, 0)).as_deref(),
            Some("03-07.log")
        );
    }

    #[test_case("app.%Q"; "unknown placeholder")]
    #[test_case("app.%"; "trailing percent")]
    #[test_case("app.%%"; "escaped percent")]
    #[test_case("app.%y"; "lowercase year")]
    fn rejects_invalid_patterns(input: &str) {
        let result = PathPattern::compile(input, Local::now());
        assert!(matches!(result, Err(LogError::InvalidPattern { ref pattern, .. }) if pattern == input));
    }

    #[test]
    fn empty_pattern_is_static() {
        let pattern = PathPattern::compile("", Local::now()).expect("compile");
        assert!(pattern.is_static());
        assert_eq!(pattern.to_string(), "");
    }

    proptest! {
        #[test]
        fn slots_match_placeholder_count(parts in proptest::collection::vec(
            prop_oneof![
                Just("%Y".to_string()),
                Just("%M".to_string()),
                Just("%D".to_string()),
                Just("%H".to_string()),
                Just("%m".to_string()),
                "[a-z._/-]{0,6}",
            ],
            0..8,
        )) {
            let source: String = parts.concat();
            let expected = parts.iter().filter(|p| p.starts_with('%')).count();
            let pattern = PathPattern::compile(&source, Local::now()).expect("compile");
            prop_assert_eq!(pattern.fields().count(), expected);
            prop_assert_eq!(pattern.numeric_format().matches('%').count(), expected);
        }

        #[test]
        fn render_without_placeholders_is_identity(source in "[a-zA-Z0-9._/-]{0,24}") {
            let pattern = PathPattern::compile(&source, Local::now()).expect("compile");
            prop_assert_eq!(pattern.to_string(), source);
        }
    }
}
