//! Terminal editor surface
//!
//! Lets the CLI run the editor applier and print highlighted source with
//! 24-bit ANSI colors.

use kedit_editor::{Color, EditorSurface, FeatureFlags, HighlightEngine, ResolvedPalette};

const RESET: &str = "\x1b[0m";

/// Editor surface that renders to a string
#[derive(Default)]
pub struct TerminalSurface {
    engine: Option<HighlightEngine>,
    palette: ResolvedPalette,
    features: FeatureFlags,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highlight `text`, expanding tabs and numbering lines as configured
    pub fn render(&mut self, text: &str) -> String {
        let ranges = match self.engine.as_mut() {
            Some(engine) => engine.highlight(text),
            None => Vec::new(),
        };

        let mut painted = String::with_capacity(text.len() * 2);
        let mut pos = 0;
        for range in ranges {
            if range.start < pos || range.end > text.len() {
                continue;
            }
            painted.push_str(&text[pos..range.start]);
            painted.push_str(&foreground(self.palette.color_for(range.highlight_type)));
            painted.push_str(&text[range.start..range.end]);
            painted.push_str(RESET);
            pos = range.end;
        }
        painted.push_str(&text[pos..]);

        let tab = " ".repeat(self.features.tab_size as usize);
        let width = text.lines().count().max(1).to_string().len();
        let gutter = foreground(self.palette.line_number);

        let mut out = String::with_capacity(painted.len());
        for (index, line) in painted.lines().enumerate() {
            if self.features.line_numbers {
                out.push_str(&format!("{}{:>width$}{} ", gutter, index + 1, RESET, width = width));
            }
            if self.features.use_spaces {
                out.push_str(&line.replace('\t', &tab));
            } else {
                out.push_str(line);
            }
            out.push('\n');
        }
        out
    }
}

impl EditorSurface for TerminalSurface {
    fn set_engine(&mut self, engine: HighlightEngine) -> Result<(), String> {
        self.engine = Some(engine);
        Ok(())
    }

    fn set_palette(&mut self, palette: &ResolvedPalette) -> Result<(), String> {
        self.palette = palette.clone();
        Ok(())
    }

    fn set_features(&mut self, features: &FeatureFlags) -> Result<(), String> {
        self.features = features.clone();
        Ok(())
    }
}

fn foreground(color: Color) -> String {
    format!("\x1b[38;2;{};{};{}m", color.r, color.g, color.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_render_numbers_lines() {
        let mut surface = TerminalSurface::new();
        surface.set_engine(HighlightEngine::Plain).unwrap();

        let out = surface.render("a\n\tb\n");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" a"));
        assert!(lines[1].ends_with(&format!(" {}b", " ".repeat(4))));
    }

    #[test]
    fn test_features_respected() {
        let mut surface = TerminalSurface::new();
        let features = FeatureFlags {
            line_numbers: false,
            use_spaces: false,
            ..FeatureFlags::default()
        };
        surface.set_features(&features).unwrap();
        assert_eq!(surface.render("\tx"), "\tx\n");
    }
}
