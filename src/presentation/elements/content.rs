use serde::Serialize;

use super::ExposableFields;
use crate::definitions::form_line::{FormLine, HiddenLine};
use crate::definitions::helpers::markup::{self, Segment};
use crate::definitions::Payload;

/// Read-only lines. Hidden lines render nothing but still submit their value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub line: FormLine,
    /// Parsed markup of paragraph and description texts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
}

impl Content {
    pub fn new(line: FormLine) -> Self {
        let segments = match &line {
            FormLine::Paragraph(paragraph) => markup::parse(&paragraph.text),
            FormLine::Description(description) => markup::parse(&description.text),
            _ => Vec::new(),
        };
        Self { line, segments }
    }

    pub fn is_hidden_field(&self) -> bool {
        matches!(self.line, FormLine::Hidden(_))
    }
}

impl ExposableFields for Content {
    fn exposed_fields(&self) -> Payload {
        match &self.line {
            FormLine::Hidden(HiddenLine { name, value }) => Payload::new().with(name, value.as_str()),
            _ => Payload::new(),
        }
    }
}
