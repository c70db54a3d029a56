//! Attribute names and the per-instance attribute store.

/// Image source URL.
pub const SRC: &str = "src";
/// Alternative text.
pub const ALT: &str = "alt";
/// Responsive source set.
pub const SRCSET: &str = "srcset";
/// Responsive sizes.
pub const SIZES: &str = "sizes";
/// Intrinsic width hint.
pub const WIDTH: &str = "width";
/// Intrinsic height hint.
pub const HEIGHT: &str = "height";
/// Native loading hint.
pub const LOADING: &str = "loading";
/// Decoding hint.
pub const DECODING: &str = "decoding";
/// Fetch priority hint.
pub const FETCHPRIORITY: &str = "fetchpriority";
/// CORS mode.
pub const CROSSORIGIN: &str = "crossorigin";
/// Referrer policy.
pub const REFERRERPOLICY: &str = "referrerpolicy";

/// Minimum container or viewport inline size, in pixels.
pub const MIN_INLINE_SIZE: &str = "min-inline-size";
/// Comma-separated breakpoint names.
pub const NAMED_BREAKPOINTS: &str = "named-breakpoints";
/// Query mode: `container`, `media`, or `view`.
pub const QUERY: &str = "query";
/// View-mode range: `entry <int>%` or `entry -<int>px`.
pub const VIEW_RANGE_START: &str = "view-range-start";

/// Reflected load state.
pub const LOADED: &str = "loaded";
/// Reflected qualification state.
pub const QUALIFIES: &str = "qualifies";

/// Attributes forwarded to the rendered image, in render order.
pub const PASS_THROUGH: [&str; 11] = [
    SRC,
    ALT,
    SRCSET,
    SIZES,
    WIDTH,
    HEIGHT,
    LOADING,
    DECODING,
    FETCHPRIORITY,
    CROSSORIGIN,
    REFERRERPOLICY,
];

/// Attributes that identify the fetched resource. Frozen once loaded.
pub const IMAGE_IDENTITY: [&str; 3] = [SRC, SRCSET, SIZES];

/// Attributes that configure when the image qualifies.
pub const CONDITION: [&str; 4] = [QUERY, MIN_INLINE_SIZE, NAMED_BREAKPOINTS, VIEW_RANGE_START];

/// Whether `name` identifies the fetched resource.
pub fn is_image_identity(name: &str) -> bool {
    IMAGE_IDENTITY.contains(&name)
}

/// Whether `name` is forwarded to the rendered image.
pub fn is_pass_through(name: &str) -> bool {
    PASS_THROUGH.contains(&name)
}

/// Whether `name` configures qualification.
pub fn is_condition(name: &str) -> bool {
    CONDITION.contains(&name)
}

/// Whether `name` is reflected state owned by the element.
pub fn is_reflected(name: &str) -> bool {
    name == LOADED || name == QUALIFIES
}

/// An ordered attribute map.
///
/// Names are ASCII-lowercased on the way in, matching HTML attribute
/// semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute value.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute. Returns the previous value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Remove an attribute. Returns the previous value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let index = self.entries.iter().position(|(key, _)| *key == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Whether the attribute is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut attributes = Self::new();
        for (name, value) in iter {
            attributes.set(name.as_ref(), value);
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut attrs = Attributes::new();
        assert_eq!(attrs.set("SRC", "a.jpg"), None);
        assert_eq!(attrs.get("src"), Some("a.jpg"));
        assert_eq!(attrs.set("src", "b.jpg"), Some("a.jpg".to_string()));
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.remove("src"), Some("b.jpg".to_string()));
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_classification() {
        assert!(is_image_identity("srcset"));
        assert!(!is_image_identity("loading"));
        assert!(is_pass_through("loading"));
        assert!(!is_pass_through("query"));
        assert!(is_condition("view-range-start"));
        assert!(is_reflected("loaded"));
    }

    #[test]
    fn test_from_iter_keeps_order() {
        let attrs: Attributes = [("alt", "x"), ("src", "y")].into_iter().collect();
        let names: Vec<_> = attrs.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alt", "src"]);
    }
}
