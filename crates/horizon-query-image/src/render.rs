//! Projection of instance state into markup.
//!
//! The lifecycle controller never builds markup itself. It computes a
//! [`RenderView`] and hands it to a [`Renderer`]; the renderer decides how
//! to present it. [`MarkupRenderer`] produces HTML strings, which is enough
//! for server-side rendering and for asserting on output in tests.

use std::collections::HashMap;

use horizon_query_image_core::NodeId;
use parking_lot::Mutex;

/// What an instance should currently display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderView {
    /// Attributes for the rendered image, in render order. `None` until the
    /// instance has loaded with a source.
    pub image: Option<Vec<(String, String)>>,
    /// Reflected `loaded` state.
    pub loaded: bool,
    /// Reflected `qualifies` state. `None` in view mode.
    pub qualifies: Option<bool>,
}

impl RenderView {
    /// The value of an image attribute, if rendered.
    pub fn image_attribute(&self, name: &str) -> Option<&str> {
        self.image
            .as_ref()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// HTML for the image, or an empty string when nothing is rendered.
    pub fn to_markup(&self) -> String {
        let Some(attributes) = &self.image else {
            return String::new();
        };

        let mut html = String::from("<img");
        for (name, value) in attributes {
            html.push(' ');
            html.push_str(name);
            html.push_str("=\"");
            html.push_str(&escape_attribute(value));
            html.push('"');
        }
        html.push('>');
        html
    }
}

/// A presentation backend.
pub trait Renderer: Send + Sync {
    /// Present `view` for the instance hosted at `node`.
    fn render(&self, node: NodeId, view: &RenderView);
}

/// Renders to HTML strings and remembers the latest markup per node.
#[derive(Debug, Default)]
pub struct MarkupRenderer {
    output: Mutex<HashMap<NodeId, String>>,
    renders: Mutex<HashMap<NodeId, usize>>,
}

impl MarkupRenderer {
    /// Create a renderer with no output.
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest markup rendered for `node`.
    pub fn markup(&self, node: NodeId) -> Option<String> {
        self.output.lock().get(&node).cloned()
    }

    /// How many times `node` has been rendered.
    pub fn render_count(&self, node: NodeId) -> usize {
        self.renders.lock().get(&node).copied().unwrap_or(0)
    }

    /// Forget the output for `node`.
    pub fn clear(&self, node: NodeId) {
        self.output.lock().remove(&node);
        self.renders.lock().remove(&node);
    }
}

impl Renderer for MarkupRenderer {
    fn render(&self, node: NodeId, view: &RenderView) {
        self.output.lock().insert(node, view.to_markup());
        *self.renders.lock().entry(node).or_insert(0) += 1;
    }
}

static_assertions::assert_impl_all!(MarkupRenderer: Send, Sync);

/// Escape a value for use inside a double-quoted HTML attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    fn view(pairs: &[(&str, &str)]) -> RenderView {
        RenderView {
            image: Some(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            loaded: true,
            qualifies: Some(true),
        }
    }

    #[test]
    fn test_escape_attribute() {
        assert_eq!(escape_attribute("a.jpg"), "a.jpg");
        assert_eq!(
            escape_attribute("\"><script>&'"),
            "&quot;&gt;&lt;script&gt;&amp;&#39;"
        );
    }

    #[test]
    fn test_markup() {
        assert_eq!(RenderView::default().to_markup(), "");
        assert_eq!(
            view(&[("src", "a.jpg"), ("alt", "A & B")]).to_markup(),
            "<img src=\"a.jpg\" alt=\"A &amp; B\">"
        );
    }

    #[test]
    fn test_image_attribute() {
        let view = view(&[("src", "a.jpg"), ("loading", "lazy")]);
        assert_eq!(view.image_attribute("loading"), Some("lazy"));
        assert_eq!(view.image_attribute("alt"), None);
        assert_eq!(RenderView::default().image_attribute("src"), None);
    }

    #[test]
    fn test_renderer_keeps_latest_per_node() {
        let mut nodes: SlotMap<NodeId, ()> = SlotMap::with_key();
        let (a, b) = (nodes.insert(()), nodes.insert(()));
        let renderer = MarkupRenderer::new();

        renderer.render(a, &RenderView::default());
        renderer.render(a, &view(&[("src", "a.jpg")]));
        renderer.render(b, &view(&[("src", "b.jpg")]));

        assert_eq!(renderer.markup(a).as_deref(), Some("<img src=\"a.jpg\">"));
        assert_eq!(renderer.render_count(a), 2);
        assert_eq!(renderer.render_count(b), 1);

        renderer.clear(a);
        assert_eq!(renderer.markup(a), None);
        assert_eq!(renderer.render_count(a), 0);
    }
}
