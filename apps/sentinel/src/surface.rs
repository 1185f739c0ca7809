//! Text drawing target and input events for the headless host.

/// A fixed-width character canvas. Screens append rows; the host frames
/// them under the header and logs the result.
#[derive(Debug, Clone)]
pub struct TextSurface {
    width: usize,
    rows: Vec<String>,
}

impl TextSurface {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(16),
            rows: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Append a row, truncated to the surface width.
    pub fn line(&mut self, text: impl AsRef<str>) {
        self.rows.push(text.as_ref().chars().take(self.width).collect());
    }

    /// `LABEL: ....... value`, dotted out to the full width.
    pub fn field(&mut self, label: &str, value: impl AsRef<str>) {
        let value = value.as_ref();
        let used = label.chars().count() + value.chars().count() + 2;
        let fill = self.width.saturating_sub(used);
        self.line(format!("{} {} {}", label, ".".repeat(fill), value));
    }

    pub fn rule(&mut self) {
        self.rows.push("-".repeat(self.width));
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Input delivered to the active screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(char),
    Tap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_pads_to_width() {
        let mut surface = TextSurface::new(24);
        surface.field("CAMERA:", "PORCH");
        assert_eq!(surface.rows()[0].chars().count(), 24);
        assert!(surface.rows()[0].starts_with("CAMERA: ."));
        assert!(surface.rows()[0].ends_with(" PORCH"));
    }

    #[test]
    fn test_line_truncates() {
        let mut surface = TextSurface::new(16);
        surface.line("x".repeat(40));
        assert_eq!(surface.rows()[0].len(), 16);
    }
}
