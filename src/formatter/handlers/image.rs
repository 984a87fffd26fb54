use std::io::Write;

use base64::Engine;

use crate::error::Result;
use crate::formatter::html::escape;
use crate::formatter::{FormatContext, Formatter, FormatterHandler};
use crate::model::part::Part;
use crate::registry::Extension;

/// Images, embedded as `data:` URIs.
pub struct ImageRenderer;

impl Extension for ImageRenderer {
    fn mime_types(&self) -> &[&str] {
        &["image/*"]
    }

    fn name(&self) -> &str {
        "image"
    }
}

impl FormatterHandler for ImageRenderer {
    fn format(
        &self,
        _formatter: &Formatter,
        _ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        let Some(node) = part.body.as_ref() else {
            return Ok(false);
        };
        let Some(content) = node.content().filter(|c| !c.is_empty()) else {
            return Ok(false);
        };

        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let alt = node.filename.as_deref().unwrap_or("");
        write!(
            sink,
            "<div class=\"part-container image\" id=\"{}\"><img src=\"data:{};base64,{encoded}\" alt=\"{}\"></div>\n",
            escape(&part.id),
            escape(&part.content_type),
            escape(alt)
        )?;
        Ok(true)
    }
}
