//! Rendering of a [`PartList`] into an HTML (or raw source) byte stream.
//!
//! The [`Formatter`] walks the list once, front to back. Every visible part
//! is offered to the renderers registered for its type; nested messages
//! are rendered by their own renderer and then skipped as a whole.

pub mod address;
pub mod handlers;
pub mod html;

use std::io::Write;

use humansize::{format_size, DECIMAL};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::model::part::{Part, MESSAGE_PART_ID, SOURCE_TYPE, SUFFIX_HEADERS};
use crate::model::part_list::PartList;
use crate::registry::{Extension, HandlerRegistry};

/// What a formatting pass produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// On-screen rendering.
    #[default]
    Normal,
    /// The raw bytes of the message instead of a rendering.
    Source,
    /// Rendering for paper: non-printable parts left out, attachment
    /// summary appended.
    Print,
    /// A nested message re-expanded on its own.
    Raw,
}

/// A rendering handler.
pub trait FormatterHandler: Extension {
    /// Render `part` into `sink`.
    ///
    /// Returns `Ok(false)` when the part is not something this handler can
    /// render; the next handler is tried. Output of a handler that did not
    /// succeed is discarded.
    fn format(
        &self,
        formatter: &Formatter,
        ctx: &FormatContext<'_>,
        part: &Part,
        sink: &mut dyn Write,
    ) -> Result<bool>;
}

/// Rendering preferences, usually built from [`Config`](crate::config::Config).
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Decode all text with this charset, ignoring what parts declare.
    pub charset: Option<String>,
    /// Charset for text that declares none.
    pub default_charset: String,
    /// Headers shown in header blocks, in display order.
    pub headers: Vec<String>,
    /// Wrap quoted lines (`> `) in citation markup.
    pub mark_citations: bool,
    /// Show the sender's original date string next to the local rendering.
    pub show_real_date: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            charset: None,
            default_charset: "utf-8".to_string(),
            headers: ["from", "reply-to", "to", "cc", "bcc", "subject", "date", "newsgroups"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            mark_citations: true,
            show_real_date: false,
        }
    }
}

/// Per-call state of one formatting pass.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    part_list: &'a PartList,
    mode: Mode,
    cancel: &'a CancellationToken,
}

impl<'a> FormatContext<'a> {
    pub fn new(part_list: &'a PartList, mode: Mode, cancel: &'a CancellationToken) -> Self {
        Self {
            part_list,
            mode,
            cancel,
        }
    }

    pub fn part_list(&self) -> &'a PartList {
        self.part_list
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cancel(&self) -> &'a CancellationToken {
        self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Renders part lists. Immutable once built, shareable between threads.
pub struct Formatter {
    registry: HandlerRegistry<dyn FormatterHandler>,
    options: FormatOptions,
}

impl Formatter {
    /// A formatter with every built-in renderer.
    pub fn new() -> Self {
        let mut formatter = Self::empty();
        handlers::register_builtins(&mut formatter.registry);
        formatter
    }

    /// A formatter with no renderers.
    pub fn empty() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            options: FormatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a renderer. Registration order breaks priority ties.
    pub fn register(&mut self, handler: std::sync::Arc<dyn FormatterHandler>) {
        debug!(handler = handler.name(), "Registering formatter handler");
        self.registry.register(handler);
    }

    pub fn registry(&self) -> &HandlerRegistry<dyn FormatterHandler> {
        &self.registry
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Render `part_list` into `sink`.
    ///
    /// Only sink I/O fails a pass. When cancelled, the output stops after
    /// the last completed part and is still closed with the footer.
    pub fn format(
        &self,
        part_list: &PartList,
        mode: Mode,
        sink: &mut dyn Write,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let ctx = FormatContext::new(part_list, mode, cancel);

        match mode {
            Mode::Source => {}
            Mode::Raw => sink.write_all(html::SUB_HEADER.as_bytes())?,
            Mode::Normal | Mode::Print => sink.write_all(html::HTML_HEADER.as_bytes())?,
        }

        self.walk(&ctx, 0, part_list.len(), sink)?;

        if mode == Mode::Print && !cancel.is_cancelled() {
            self.write_attachment_summary(&ctx, sink)?;
        }
        if mode != Mode::Source {
            sink.write_all(html::FOOTER.as_bytes())?;
        }
        sink.flush()?;

        info!(
            parts = part_list.len(),
            ?mode,
            cancelled = cancel.is_cancelled(),
            "Formatted message"
        );
        Ok(())
    }

    /// Render the parts in `start..end`.
    ///
    /// Nested-message renderers call this for their own interior.
    pub fn walk(
        &self,
        ctx: &FormatContext<'_>,
        start: usize,
        end: usize,
        sink: &mut dyn Write,
    ) -> Result<()> {
        let list = ctx.part_list();
        let end = end.min(list.len());
        let mut idx = start;

        while idx < end {
            if ctx.is_cancelled() {
                debug!(idx, "Format cancelled");
                break;
            }
            let Some(part) = list.get(idx) else {
                break;
            };

            if part.is_hidden && !part.is_error {
                if part.is_rfc822() {
                    match list.rfc822_end_index(idx) {
                        Some(end_idx) => idx = end_idx,
                        None => break,
                    }
                }
                idx += 1;
                continue;
            }

            if ctx.mode() == Mode::Print && !part.is_printable {
                idx += 1;
                continue;
            }

            let mut ok = false;
            if ctx.mode() != Mode::Source {
                ok = self.format_as(ctx, part, None, sink)?;

                // The nested-message renderer already wrote the whole subtree.
                if ok && part.is_rfc822() {
                    match list.rfc822_end_index(idx) {
                        Some(end_idx) => idx = end_idx + 1,
                        None => break,
                    }
                    continue;
                }
            }

            if !ok {
                if part.has_suffix(SUFFIX_HEADERS) {
                    idx += 1;
                    continue;
                }

                let sourced = self.format_as(ctx, part, Some(SOURCE_TYPE), sink)?;

                // The source of `.message` is the entire message.
                if part.id == MESSAGE_PART_ID {
                    if !sourced {
                        warn!("No renderer for the message source");
                        self.write_error_block(sink, "The message could not be displayed")?;
                    }
                    break;
                }

                if part.is_rfc822() {
                    match list.rfc822_end_index(idx) {
                        Some(end_idx) => idx = end_idx,
                        None => break,
                    }
                }
            }
            idx += 1;
        }
        Ok(())
    }

    /// Render one part with the first renderer that succeeds.
    ///
    /// `as_type` overrides the part's own type. Each renderer writes into a
    /// scratch buffer that reaches the sink only on success.
    pub fn format_as(
        &self,
        ctx: &FormatContext<'_>,
        part: &Part,
        as_type: Option<&str>,
        sink: &mut dyn Write,
    ) -> Result<bool> {
        let mime_type = as_type.unwrap_or(part.content_type.as_str());
        let handlers = self.registry.handlers_for(mime_type);

        for handler in handlers {
            let mut scratch: Vec<u8> = Vec::new();
            match handler.format(self, ctx, part, &mut scratch) {
                Ok(true) => {
                    debug!(part_id = %part.id, mime_type, handler = handler.name(), "Rendered");
                    sink.write_all(&scratch)?;
                    return Ok(true);
                }
                Ok(false) => {
                    debug!(part_id = %part.id, mime_type, handler = handler.name(), "Declined");
                }
                Err(e) => {
                    warn!(part_id = %part.id, handler = handler.name(), error = %e, "Renderer failed");
                }
            }
        }
        Ok(false)
    }

    /// Write a standalone error block.
    pub fn write_error_block(&self, sink: &mut dyn Write, message: &str) -> Result<()> {
        write!(
            sink,
            "<div class=\"error\"><pre>{}</pre></div>\n",
            html::escape(message)
        )?;
        Ok(())
    }

    /// Attachment wrappers listed in the print summary: not referenced by
    /// Content-ID and not inside a nested message.
    pub fn summary_attachments<'a>(&self, list: &'a PartList) -> Vec<&'a Part> {
        let mut depth = 0usize;
        let mut rows = Vec::new();
        for part in list.iter() {
            if part.is_rfc822() {
                depth += 1;
            } else if part.id.ends_with(".rfc822.end") {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && part.is_wrapper() && part.content_id.is_none() {
                rows.push(part);
            }
        }
        rows
    }

    fn write_attachment_summary(&self, ctx: &FormatContext<'_>, sink: &mut dyn Write) -> Result<()> {
        let rows = self.summary_attachments(ctx.part_list());
        if rows.is_empty() {
            return Ok(());
        }

        sink.write_all(
            b"<table class=\"attachments\">\n<tr><th>Name</th><th>Type</th><th>Size</th></tr>\n",
        )?;
        for part in rows {
            let Some(info) = part.attachment.as_ref() else {
                continue;
            };
            let name = info.filename.as_deref().unwrap_or("attachment");
            writeln!(
                sink,
                "<tr class=\"attachment-row\"><td>{}</td><td>{}</td><td>{}</td></tr>",
                html::escape(name),
                html::escape(&info.guessed_type),
                format_size(info.size, DECIMAL)
            )?;
        }
        sink.write_all(b"</table>\n")?;
        Ok(())
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}
