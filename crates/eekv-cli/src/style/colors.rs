//! Semantic color palette for terminal output.

use std::fmt::Display;

use owo_colors::{OwoColorize, Style};

/// What a piece of output means, independent of how it is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Healthy devices, completed writes.
    Success,
    /// Failed operations, corrupt trailers.
    Error,
    /// Repairs, blank devices, skipped work.
    Warning,
    /// Hints and secondary detail.
    Muted,
    /// Section titles.
    Header,
    /// Keys and device paths.
    Code,
}

impl Tone {
    /// Terminal style for this tone.
    pub fn style(self) -> Style {
        match self {
            Self::Success => Style::new().green().bold(),
            Self::Error => Style::new().red().bold(),
            Self::Warning => Style::new().yellow(),
            Self::Muted => Style::new().dimmed(),
            Self::Header => Style::new().bold(),
            Self::Code => Style::new().blue(),
        }
    }
}

/// Renders `value` in `tone`, or plain when colors are disabled.
pub fn paint(value: &impl Display, tone: Tone) -> String {
    if super::no_color() {
        value.to_string()
    } else {
        value.style(tone.style()).to_string()
    }
}

/// Shorthand for [`paint`] on anything displayable.
pub trait SemanticStyle: Display + Sized {
    fn success(&self) -> String {
        paint(self, Tone::Success)
    }

    fn error(&self) -> String {
        paint(self, Tone::Error)
    }

    fn warning(&self) -> String {
        paint(self, Tone::Warning)
    }

    fn muted(&self) -> String {
        paint(self, Tone::Muted)
    }

    fn header(&self) -> String {
        paint(self, Tone::Header)
    }

    fn code(&self) -> String {
        paint(self, Tone::Code)
    }
}

impl<T: Display> SemanticStyle for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tones_are_distinct() {
        let tones = [
            Tone::Success,
            Tone::Error,
            Tone::Warning,
            Tone::Muted,
            Tone::Header,
            Tone::Code,
        ];
        for (i, a) in tones.iter().enumerate() {
            for b in &tones[i + 1..] {
                assert_ne!(
                    format!("{}", "x".style((*a).style())),
                    format!("{}", "x".style((*b).style()))
                );
            }
        }
    }
}
