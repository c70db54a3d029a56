//! The `view-range-start` grammar.
//!
//! Two forms are accepted:
//!
//! - `entry <int>%`: the image qualifies once `<int>` percent of it is
//!   visible. `<int>` must lie in `[0, 100]`.
//! - `entry -<int>px`: the image qualifies `<int>` pixels before it scrolls
//!   into view (a preload margin).
//!
//! Anything else falls back to [`ViewRange::default`] with a warning.

use cssparser::{Parser, ParserInput, Token};
use horizon_query_image_core::IntersectionOptions;

use crate::error::ConfigWarning;

/// Parsed view-mode trigger range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewRange {
    /// Preload margin in pixels.
    pub margin_px: u32,
    /// Visible fraction in `[0, 1]`.
    pub threshold: f64,
}

impl ViewRange {
    /// Parse a `view-range-start` value.
    pub fn parse(value: &str) -> Result<Self, ConfigWarning> {
        let invalid = || ConfigWarning::InvalidViewRangeFormat(value.to_string());

        let mut input = ParserInput::new(value);
        let mut parser = Parser::new(&mut input);

        parser.expect_ident_matching("entry").map_err(|_| invalid())?;
        let token = parser.next().map_err(|_| invalid())?.clone();
        parser.expect_exhausted().map_err(|_| invalid())?;

        match token {
            Token::Percentage {
                int_value: Some(percent),
                ..
            } => {
                if !(0..=100).contains(&percent) {
                    return Err(ConfigWarning::OutOfRangePercentage(percent));
                }
                Ok(Self {
                    margin_px: 0,
                    threshold: f64::from(percent) / 100.0,
                })
            }
            Token::Dimension {
                has_sign: true,
                int_value: Some(px),
                ref unit,
                ..
            } if px <= 0 && unit.eq_ignore_ascii_case("px") => Ok(Self {
                margin_px: px.unsigned_abs(),
                threshold: 0.0,
            }),
            _ => Err(invalid()),
        }
    }

    /// Parse an optional attribute value, substituting the default on error.
    ///
    /// An absent attribute yields the default without a warning.
    pub fn from_attribute(value: Option<&str>) -> (Self, Option<ConfigWarning>) {
        match value {
            None => (Self::default(), None),
            Some(value) => match Self::parse(value) {
                Ok(range) => (range, None),
                Err(warning) => (Self::default(), Some(warning)),
            },
        }
    }

    /// The intersection observer options (and pool key) for this range.
    pub fn options(&self) -> IntersectionOptions {
        IntersectionOptions::new(self.margin_px, self.threshold)
    }
}
