//! Utilities for building caption text.
//!
//! Captions and titles are copied into the document verbatim.  The [`Span`] type offers a
//! way to produce them from plain text instead: the text is escaped so that characters such
//! as `%` or `_` survive typesetting, and inline styles map to the matching LaTeX commands.

use std::fmt;

/// A slice of text together with inline style attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    bold: bool,
    italic: bool,
    monospace: bool,
}

impl Span {
    /// Creates a new span with the provided text and no styles applied.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns the raw, unescaped text contained in this span.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }

    pub fn is_italic(&self) -> bool {
        self.italic
    }

    pub fn is_monospace(&self) -> bool {
        self.monospace
    }

    /// Convenience shorthand that marks the span as bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Convenience shorthand that marks the span as italic.
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Convenience shorthand that renders the span in a typewriter font.
    pub fn monospace(mut self) -> Self {
        self.monospace = true;
        self
    }

    /// Renders the span as escaped LaTeX.
    pub fn to_latex(&self) -> String {
        let mut out = escape(&self.text);
        if self.monospace {
            out = format!("\\texttt{{{}}}", out);
        }
        if self.italic {
            out = format!("\\textit{{{}}}", out);
        }
        if self.bold {
            out = format!("\\textbf{{{}}}", out);
        }
        out
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_latex())
    }
}

/// Concatenates the LaTeX rendering of every span.
pub fn spans_to_latex<'a, I>(spans: I) -> String
where
    I: IntoIterator<Item = &'a Span>,
{
    spans.into_iter().map(Span::to_latex).collect()
}

/// Escapes characters that carry special meaning in LaTeX text mode.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\textbackslash{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Marker {
    Bold,
    Italic,
    Monospace,
}

impl Marker {
    fn token(self) -> &'static str {
        match self {
            Marker::Bold => "**",
            Marker::Italic => "*",
            Marker::Monospace => "`",
        }
    }

    fn at_start_of(input: &str) -> Option<Self> {
        [Marker::Bold, Marker::Italic, Marker::Monospace]
            .into_iter()
            .find(|marker| input.starts_with(marker.token()))
    }

    fn flag(self, span: &mut Span) -> &mut bool {
        match self {
            Marker::Bold => &mut span.bold,
            Marker::Italic => &mut span.italic,
            Marker::Monospace => &mut span.monospace,
        }
    }
}

/// Splits a small markdown-inspired syntax into [`Span`]s.
///
/// `**bold**`, `*italic*` and `` `code` `` are recognised and may nest.  An opening marker
/// without a matching closing marker is kept as literal text, so arbitrary titles can be
/// passed through without failing.
pub fn parse_markup(input: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut buffer = String::new();
    let mut state = Span::default();
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        let Some(marker) = Marker::at_start_of(rest) else {
            buffer.push(ch);
            rest = &rest[ch.len_utf8()..];
            continue;
        };

        let token = marker.token();
        let after = &rest[token.len()..];
        let active = *marker.flag(&mut state);

        if active || after.contains(token) {
            flush(&mut buffer, &mut spans, &state);
            *marker.flag(&mut state) = !active;
        } else {
            buffer.push_str(token);
        }
        rest = after;
    }

    flush(&mut buffer, &mut spans, &state);
    spans
}

fn flush(buffer: &mut String, spans: &mut Vec<Span>, state: &Span) {
    if buffer.is_empty() {
        return;
    }
    spans.push(Span {
        text: std::mem::take(buffer),
        ..state.clone()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape("50% of a_b & c"), "50\\% of a\\_b \\& c");
        assert_eq!(escape("x^2~y"), "x\\textasciicircum{}2\\textasciitilde{}y");
    }

    #[test]
    fn span_wraps_styles() {
        let span = Span::new("PM2.5").bold().italic();
        assert_eq!(span.to_latex(), "\\textbf{\\textit{PM2.5}}");
        assert_eq!(Span::new("a_b").monospace().to_string(), "\\texttt{a\\_b}");
    }

    #[test]
    fn parse_plain_text() {
        let spans = parse_markup("Hello world");
        assert_eq!(spans, vec![Span::new("Hello world")]);
    }

    #[test]
    fn parse_nested_styles() {
        let spans = parse_markup("This is **very *cool***!");
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0].text(), "This is ");
        assert!(spans[1].is_bold());
        assert_eq!(spans[1].text(), "very ");
        assert!(spans[2].is_bold() && spans[2].is_italic());
        assert_eq!(spans[2].text(), "cool");
        assert_eq!(spans[3].text(), "!");
        assert!(!spans[3].is_bold());
    }

    #[test]
    fn unterminated_marker_is_literal() {
        let spans = parse_markup("2*3 = 6");
        assert_eq!(spans, vec![Span::new("2*3 = 6")]);
    }

    #[test]
    fn markup_renders_to_latex() {
        let latex = spans_to_latex(&parse_markup("**(a)** `wrf_out` 100%"));
        assert_eq!(latex, "\\textbf{(a)} \\texttt{wrf\\_out} 100\\%");
    }
}
