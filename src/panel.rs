use serde::Deserialize;

/// One retrieved source snippet with its similarity score
/// (higher = more relevant). Order is whatever the backend sent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContextChunk {
    pub source: String,
    pub score: f64,
    pub text: String,
}

/// Side panel holding the retrieved snippets of the most recently resolved
/// turn. Content and visibility are independent: rendering never shows or
/// hides the panel, and toggling never touches the chunks.
#[derive(Debug, Default)]
pub struct ContextPanel {
    chunks: Vec<ContextChunk>,
    visible: bool,
}

impl ContextPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire displayed set. A missing list counts as empty.
    pub fn render(&mut self, chunks: Option<Vec<ContextChunk>>) {
        self.chunks = chunks.unwrap_or_default();
    }

    pub fn chunks(&self) -> &[ContextChunk] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn toggle_visible(&mut self) {
        self.visible = !self.visible;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

/// Similarity scores are displayed to three decimal places.
pub fn format_score(score: f64) -> String {
    format!("{score:.3}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, score: f64) -> ContextChunk {
        ContextChunk {
            source: source.to_string(),
            score,
            text: format!("text from {source}"),
        }
    }

    #[test]
    fn test_render_replaces_prior_set() {
        let mut panel = ContextPanel::new();
        panel.render(Some(vec![chunk("a.md", 0.9), chunk("b.md", 0.8)]));
        assert_eq!(panel.chunks().len(), 2);

        panel.render(Some(vec![chunk("c.md", 0.7)]));
        assert_eq!(panel.chunks().len(), 1);
        assert_eq!(panel.chunks()[0].source, "c.md");
    }

    #[test]
    fn test_render_empty_and_none_clear_content() {
        let mut panel = ContextPanel::new();
        panel.render(Some(vec![chunk("a.md", 0.9)]));

        panel.render(Some(Vec::new()));
        assert!(panel.is_empty());

        panel.render(Some(vec![chunk("a.md", 0.9)]));
        panel.render(None);
        assert!(panel.is_empty());
    }

    #[test]
    fn test_render_preserves_backend_order() {
        let mut panel = ContextPanel::new();
        // Deliberately not sorted by score; display order is the wire order.
        panel.render(Some(vec![
            chunk("low.md", 0.1),
            chunk("high.md", 0.9),
            chunk("mid.md", 0.5),
        ]));
        let sources: Vec<&str> = panel.chunks().iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["low.md", "high.md", "mid.md"]);
    }

    #[test]
    fn test_visibility_independent_of_content() {
        let mut panel = ContextPanel::new();
        assert!(!panel.is_visible());

        panel.render(Some(vec![chunk("a.md", 0.9)]));
        assert!(!panel.is_visible());

        panel.toggle_visible();
        assert!(panel.is_visible());
        assert_eq!(panel.chunks().len(), 1);

        panel.render(Some(Vec::new()));
        assert!(panel.is_visible());

        panel.hide();
        assert!(!panel.is_visible());
        panel.hide();
        assert!(!panel.is_visible());
    }

    #[test]
    fn test_score_formatting() {
        assert_eq!(format_score(0.912), "0.912");
        assert_eq!(format_score(0.9), "0.900");
        assert_eq!(format_score(1.0), "1.000");
        assert_eq!(format_score(0.12345), "0.123");
    }
}
