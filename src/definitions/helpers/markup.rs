//! Inline markup carried by paragraph, description and checkbox texts.
//!
//! ```text
//! Read the [terms|bold].[br]See [our policy|dialog::https://example.com/p] or
//! [skip this step|autosubmit::skip=1&reason=later].
//! ```
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static GROUPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]|([^\[\]]+)").unwrap());

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.+?)\|(.+?)\]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    LineBreak,
    Bold { text: String },
    Italic { text: String },
    /// Opens `url` outside the wizard.
    Link { text: String, url: String },
    /// Opens `url` in a notice dialog.
    Dialog { text: String, url: String },
    /// Submits the form with the given extra parameters.
    Autosubmit {
        text: String,
        params: Vec<(String, String)>,
    },
}

impl Segment {
    /// The visible text of the segment.
    pub fn text(&self) -> &str {
        match self {
            Segment::LineBreak => "\n",
            Segment::Text { text }
            | Segment::Bold { text }
            | Segment::Italic { text }
            | Segment::Link { text, .. }
            | Segment::Dialog { text, .. }
            | Segment::Autosubmit { text, .. } => text,
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            Segment::Link { .. } | Segment::Dialog { .. } | Segment::Autosubmit { .. }
        )
    }
}

/// Splits a label into segments. Markup that cannot be understood is dropped,
/// links with an unparsable URL included.
pub fn parse(input: &str) -> Vec<Segment> {
    GROUPS
        .find_iter(input)
        .filter_map(|group| parse_group(group.as_str().trim()))
        .collect()
}

/// Renders segments as plain text, one space between groups.
pub fn plain_text(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::LineBreak => {
                let trimmed = out.trim_end_matches(' ').len();
                out.truncate(trimmed);
                out.push('\n');
            }
            other => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push(' ');
                }
                out.push_str(other.text());
            }
        }
    }
    out
}

fn parse_group(group: &str) -> Option<Segment> {
    if group.is_empty() {
        return None;
    }
    if group == "[br]" {
        return Some(Segment::LineBreak);
    }

    let Some(captures) = MARKUP.captures(group) else {
        return Some(Segment::Text {
            text: group.to_string(),
        });
    };
    let text = captures.get(1)?.as_str().to_string();
    let kind = captures.get(2)?.as_str();

    match kind.split_once("::") {
        None if kind == "italic" => Some(Segment::Italic { text }),
        None => Some(Segment::Bold { text }),
        Some(("autosubmit", query)) => Some(Segment::Autosubmit {
            text,
            params: url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }),
        Some((kind, target)) => {
            if let Err(e) = url::Url::parse(target) {
                tracing::warn!("dropping {kind} markup with invalid url: {e}");
                return None;
            }
            let url = target.to_string();
            match kind {
                "dialog" => Some(Segment::Dialog { text, url }),
                _ => Some(Segment::Link { text, url }),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mixed_markup() {
        let segments = parse(
            "hello [bold text|bold] and [italic text|italic][br] see \
             [Some Link|link::http://example.com] or \
             [Some Dialog|dialog::http://localhost:8000/privacy/1/html]",
        );
        assert_eq!(
            segments,
            vec![
                Segment::Text { text: "hello".into() },
                Segment::Bold { text: "bold text".into() },
                Segment::Text { text: "and".into() },
                Segment::Italic { text: "italic text".into() },
                Segment::LineBreak,
                Segment::Text { text: "see".into() },
                Segment::Link {
                    text: "Some Link".into(),
                    url: "http://example.com".into()
                },
                Segment::Text { text: "or".into() },
                Segment::Dialog {
                    text: "Some Dialog".into(),
                    url: "http://localhost:8000/privacy/1/html".into()
                },
            ]
        );
    }

    #[test]
    fn autosubmit_params() {
        let segments = parse("[Skip|autosubmit::skip=1&reason=not+now]");
        assert_eq!(
            segments,
            vec![Segment::Autosubmit {
                text: "Skip".into(),
                params: vec![
                    ("skip".into(), "1".into()),
                    ("reason".into(), "not now".into())
                ],
            }]
        );
        assert!(segments[0].is_interactive());
    }

    #[test]
    fn invalid_link_is_dropped() {
        let segments = parse("before [broken|link::not a url] after");
        assert_eq!(plain_text(&segments), "before after");
    }

    #[test]
    fn plain_text_rendering() {
        let segments = parse("Line one [br] line [two|bold]");
        assert_eq!(plain_text(&segments), "Line one\nline two");
    }
}
