//! Decomposition of a [`Document`] into a flat [`PartList`].
//!
//! The [`Parser`] walks the MIME tree recursively. At every node it asks its
//! registry for the handlers declared for the node's type and tries them in
//! priority order; content nobody handles is wrapped as an attachment, so a
//! parse never fails outright.

pub mod crypto;
pub mod handlers;
pub mod header;
pub mod inline;
pub mod mime;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::model::document::{type_matches, ContentHandle, Document, Disposition};
use crate::model::part::{
    AttachmentInfo, Part, ATTACHMENT_TYPE, ERROR_TYPE, HEADERS_TYPE, MESSAGE_PART_ID,
    MESSAGE_TYPE, SUFFIX_ATTACHMENT, SUFFIX_END, SUFFIX_RFC822,
};
use crate::model::part_list::PartList;
use crate::registry::{Extension, HandlerRegistry};

use self::crypto::CipherContext;
use self::inline::{InlineFilter, SignatureInlineFilter};

/// Default limit for recursive decomposition.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A decomposition handler.
pub trait ParserHandler: Extension {
    /// Decompose `node` into parts appended to `out`.
    ///
    /// Returns `Ok(false)` to let the next handler try. Parts pushed before
    /// returning `Ok(false)` or an error are discarded.
    fn parse(
        &self,
        parser: &Parser,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> Result<bool>;

    /// Whether content of this type is shown expanded when it is wrapped
    /// as an attachment without an explicit disposition.
    fn inline_by_default(&self) -> bool {
        false
    }
}

/// Decomposition tuning, usually built from [`Config`](crate::config::Config).
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Type patterns (`image/*` allowed) whose parts are always expanded.
    pub force_inline_types: Vec<String>,
    /// Type patterns whose parts are always collapsed.
    pub force_collapse_types: Vec<String>,
    /// Nodes nested deeper than this are wrapped without decomposition.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            force_inline_types: Vec::new(),
            force_collapse_types: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Per-call state threaded through the recursion.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    cancel: &'a CancellationToken,
    depth: usize,
}

impl<'a> ParseContext<'a> {
    pub fn new(cancel: &'a CancellationToken) -> Self {
        Self { cancel, depth: 0 }
    }

    pub fn cancel(&self) -> &'a CancellationToken {
        self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Recursion depth of the node being decomposed.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn nested(&self) -> Self {
        Self {
            cancel: self.cancel,
            depth: self.depth + 1,
        }
    }
}

/// Decomposes documents into part lists.
///
/// A parser is immutable once built and may be shared between threads;
/// its error counter is the only state, and it is atomic.
pub struct Parser {
    registry: HandlerRegistry<dyn ParserHandler>,
    inline_filter: Option<Arc<dyn InlineFilter>>,
    cipher: Option<Arc<dyn CipherContext>>,
    options: ParseOptions,
    last_error: AtomicU32,
}

impl Parser {
    /// A parser with every built-in handler and the default inline filter.
    pub fn new() -> Self {
        let mut parser = Self::empty();
        handlers::register_builtins(&mut parser.registry);
        parser.inline_filter = Some(Arc::new(SignatureInlineFilter));
        parser
    }

    /// A parser with no handlers at all; everything gets wrapped.
    pub fn empty() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            inline_filter: None,
            cipher: None,
            options: ParseOptions::default(),
            last_error: AtomicU32::new(0),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn CipherContext>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn with_inline_filter(mut self, filter: Option<Arc<dyn InlineFilter>>) -> Self {
        self.inline_filter = filter;
        self
    }

    /// Add a handler. Registration order breaks priority ties.
    pub fn register(&mut self, handler: Arc<dyn ParserHandler>) {
        debug!(handler = handler.name(), "Registering parser handler");
        self.registry.register(handler);
    }

    pub fn registry(&self) -> &HandlerRegistry<dyn ParserHandler> {
        &self.registry
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn inline_filter(&self) -> Option<&dyn InlineFilter> {
        self.inline_filter.as_deref()
    }

    pub fn cipher(&self) -> Option<&dyn CipherContext> {
        self.cipher.as_deref()
    }

    /// Decompose a whole message.
    pub fn parse(&self, document: Arc<Document>, cancel: &CancellationToken) -> PartList {
        self.parse_with_container(document, None, None, cancel)
    }

    /// Decompose a whole message, recording where it came from.
    ///
    /// When cancelled, the list holds exactly the parts of the nodes
    /// visited so far.
    pub fn parse_with_container(
        &self,
        document: Arc<Document>,
        container_ref: Option<String>,
        container_item_id: Option<String>,
        cancel: &CancellationToken,
    ) -> PartList {
        let root = document.root.clone();
        let mut list = PartList::new(document, container_ref, container_item_id);
        list.add_part(self.new_part(&root, MESSAGE_PART_ID).with_type(MESSAGE_TYPE));

        let ctx = ParseContext::new(cancel);
        let mut parts = Vec::new();
        if self.registry.has_handlers(MESSAGE_TYPE) {
            self.parse_part_as(&ctx, &root, MESSAGE_PART_ID, MESSAGE_TYPE, &mut parts);
        } else if self.registry.has_exact("message/*") {
            self.parse_part_as(&ctx, &root, MESSAGE_PART_ID, "message/*", &mut parts);
        } else {
            warn!("No message handler registered, decomposing body only");
            self.parse_part(&ctx, &root, MESSAGE_PART_ID, &mut parts);
        }

        move_secure_buttons_before_headers(&mut parts);
        for part in parts {
            list.add_part(part);
        }

        info!(
            parts = list.len(),
            cancelled = cancel.is_cancelled(),
            "Parsed message"
        );
        list
    }

    /// Decompose `node` under its declared type.
    pub fn parse_part(
        &self,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) -> bool {
        self.parse_part_as(ctx, node, part_id, &node.content_type, out)
    }

    /// Decompose a container child, wrapping it when it is an attachment
    /// that its handler left unwrapped.
    ///
    /// A child skipped because the walk was cancelled produces nothing.
    pub fn parse_child(
        &self,
        ctx: &ParseContext<'_>,
        child: &ContentHandle,
        child_id: &str,
        out: &mut Vec<Part>,
    ) {
        let mut work = Vec::new();
        let handled = self.parse_part(ctx, child, child_id, &mut work);
        if work.is_empty() && ctx.is_cancelled() {
            return;
        }

        let already_wrapped = work.first().is_some_and(Part::is_wrapper);
        if handled && child.is_attachment() && !already_wrapped {
            self.wrap_as_attachment(child, child_id, &mut work);
        }
        out.append(&mut work);
    }

    /// Decompose `node` as if it had type `mime_type`.
    ///
    /// Returns `false` when no handler took the node and it was wrapped as
    /// an attachment instead. A cancelled walk reports `true` and produces
    /// nothing.
    pub fn parse_part_as(
        &self,
        ctx: &ParseContext<'_>,
        node: &ContentHandle,
        part_id: &str,
        mime_type: &str,
        out: &mut Vec<Part>,
    ) -> bool {
        if ctx.is_cancelled() {
            debug!(part_id, "Parse cancelled");
            return true;
        }

        if ctx.depth() >= self.options.max_depth {
            warn!(part_id, depth = ctx.depth(), "Nesting limit reached");
            self.wrap_as_non_expandable_attachment(node, part_id, out);
            return false;
        }

        let handlers = self.registry.handlers_for(mime_type);
        if handlers.is_empty() {
            debug!(part_id, mime_type, "No parser handler, wrapping as attachment");
        }

        let nested = ctx.nested();
        let mut errors = Vec::new();
        for handler in handlers {
            let mut scratch = Vec::new();
            match handler.parse(self, &nested, node, part_id, &mut scratch) {
                Ok(true) => {
                    debug!(part_id, mime_type, handler = handler.name(), "Handled");
                    out.append(&mut errors);
                    out.append(&mut scratch);
                    return true;
                }
                Ok(false) => {
                    debug!(part_id, mime_type, handler = handler.name(), "Declined");
                }
                Err(e) => {
                    warn!(part_id, handler = handler.name(), error = %e, "Parser handler failed");
                    self.error(&mut errors, &format!("Could not parse {mime_type}: {e}"));
                }
            }
        }

        // The wrapper leads so that containers see this node as wrapped.
        let mut wrapped = Vec::new();
        self.wrap_as_attachment(node, part_id, &mut wrapped);
        out.append(&mut wrapped);
        out.append(&mut errors);
        false
    }

    /// A part describing `node`, with the configured display overrides.
    pub fn new_part(&self, node: &ContentHandle, part_id: impl Into<String>) -> Part {
        let mut part = Part::new(node, part_id);
        part.force_inline = self
            .options
            .force_inline_types
            .iter()
            .any(|t| type_matches(&node.content_type, t));
        part.force_collapse = self
            .options
            .force_collapse_types
            .iter()
            .any(|t| type_matches(&node.content_type, t));
        part
    }

    /// A header-block part for `node`, or `None` when it has no headers.
    pub fn headers_part(&self, node: &ContentHandle, part_id: &str) -> Option<Part> {
        if node.headers.is_empty() {
            return None;
        }
        let id = format!("{part_id}{}", crate::model::part::SUFFIX_HEADERS);
        Some(self.new_part(node, id).with_type(HEADERS_TYPE))
    }

    /// Append a synthetic `.error.N` part carrying `message`.
    ///
    /// `N` comes from a counter owned by this parser, so error ids never
    /// collide within one list.
    pub fn error(&self, out: &mut Vec<Part>, message: &str) {
        let n = self.last_error.fetch_add(1, Ordering::Relaxed) + 1;
        let mut part = Part::synthetic(format!(".error.{n}"), ERROR_TYPE);
        part.message = Some(message.to_string());
        part.is_error = true;
        part.is_printable = false;
        out.push(part);
    }

    /// Put an attachment wrapper for `node` at the head of `out`.
    ///
    /// If `out` already starts with a content part, the wrapper views it
    /// and the part itself is hidden.
    pub fn wrap_as_attachment(&self, node: &ContentHandle, part_id: &str, out: &mut Vec<Part>) {
        let declared_handlers = self.registry.handlers_for(&node.content_type);
        let guessed_type = if node.is_type("text/*") || node.is_type("message/*") {
            node.content_type.clone()
        } else {
            guess_mime_type(node)
        };
        let handlers = if declared_handlers.is_empty() {
            self.registry.handlers_for(&guessed_type)
        } else {
            declared_handlers
        };

        let mut wrapper = self
            .new_part(node, format!("{part_id}{SUFFIX_ATTACHMENT}"))
            .with_type(ATTACHMENT_TYPE);
        wrapper.is_attachment = true;

        let can_show = !handlers.is_empty();
        let inline = if wrapper.force_inline {
            true
        } else if wrapper.force_collapse {
            false
        } else {
            match node.disposition {
                Some(Disposition::Inline) => true,
                Some(Disposition::Attachment) => false,
                None => handlers.first().is_some_and(|h| h.inline_by_default()),
            }
        };

        let mut info = AttachmentInfo {
            view_part_id: None,
            filename: node.filename.clone(),
            guessed_type,
            size: node.content_size() as u64,
            shown: can_show && inline,
            can_show,
            expandable: true,
        };

        if let Some(first) = out.first_mut() {
            if !first.is_wrapper() {
                info.view_part_id = Some(first.id.clone());
                first.is_hidden = true;
            }
        }

        debug!(
            id = %wrapper.id,
            guessed_type = %info.guessed_type,
            shown = info.shown,
            "Wrapped as attachment"
        );
        wrapper.attachment = Some(info);
        out.insert(0, wrapper);
    }

    /// Wrap `node` as an attachment that can never be expanded inline.
    pub fn wrap_as_non_expandable_attachment(
        &self,
        node: &ContentHandle,
        part_id: &str,
        out: &mut Vec<Part>,
    ) {
        let mut work = Vec::new();
        self.wrap_as_attachment(node, part_id, &mut work);
        for info in work.iter_mut().filter_map(|p| p.attachment.as_mut()) {
            info.shown = false;
            info.can_show = false;
            info.expandable = false;
        }
        out.append(&mut work);
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Better type for generic binary content, from the filename extension.
pub fn guess_mime_type(node: &ContentHandle) -> String {
    if node.content_type != "application/octet-stream" {
        return node.content_type.clone();
    }
    let extension = node
        .filename
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    let guessed = match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("txt" | "log") => "text/plain",
        Some("csv") => "text/csv",
        Some("htm" | "html") => "text/html",
        Some("ics") => "text/calendar",
        Some("eml") => "message/rfc822",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        _ => "application/octet-stream",
    };
    guessed.to_string()
}

/// Move every secure-button part in front of the header block of the
/// message scope it belongs to.
fn move_secure_buttons_before_headers(parts: &mut Vec<Part>) {
    use crate::model::part::SECURE_BUTTON_TYPE;

    let mut last_headers: Option<usize> = None;
    let mut stack: Vec<Option<usize>> = Vec::new();
    let mut idx = 0;

    while idx < parts.len() {
        let id = parts[idx].id.as_str();
        if id.ends_with(SUFFIX_RFC822) {
            stack.push(last_headers.take());
        } else if id.ends_with(&format!("{SUFFIX_RFC822}{SUFFIX_END}")) {
            last_headers = stack.pop().flatten();
        }

        if parts[idx].content_type == HEADERS_TYPE {
            last_headers = Some(idx);
        } else if parts[idx].content_type == SECURE_BUTTON_TYPE {
            if let Some(target) = last_headers {
                let button = parts.remove(idx);
                parts.insert(target, button);
                // The header block moved one slot down.
                last_headers = Some(target + 1);
            }
        }
        idx += 1;
    }

    if !stack.is_empty() {
        warn!(open = stack.len(), "Unbalanced nested message scopes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::ContentNode;
    use crate::model::part::SECURE_BUTTON_TYPE;

    struct Failing;

    impl Extension for Failing {
        fn mime_types(&self) -> &[&str] {
            &["application/x-broken"]
        }
    }

    impl ParserHandler for Failing {
        fn parse(
            &self,
            _parser: &Parser,
            _ctx: &ParseContext<'_>,
            _node: &ContentHandle,
            _part_id: &str,
            out: &mut Vec<Part>,
        ) -> Result<bool> {
            out.push(Part::synthetic(".torn", "text/plain"));
            Err(crate::error::FormatError::MimeError("truncated".into()))
        }
    }

    fn ids(list: &PartList) -> Vec<&str> {
        list.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_cancelled_child_is_not_wrapped() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = ParseContext::new(&cancel);
        let child = ContentNode::leaf("application/pdf", b"%PDF".to_vec())
            .with_filename("a.pdf")
            .into_handle();

        let mut out = Vec::new();
        Parser::new().parse_child(&ctx, &child, ".message.mixed.1", &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_plain_leaf() {
        let doc = Document::new(
            ContentNode::leaf("text/plain", "hello")
                .with_header("subject", "Hi")
                .into_handle(),
        );
        let list = Parser::new().parse(Arc::new(doc), &CancellationToken::new());
        assert_eq!(
            ids(&list),
            vec![".message", ".message.headers", ".message.plain_text.0"]
        );
        assert!(list.is_well_formed());
    }

    #[test]
    fn test_empty_registry_wraps_everything() {
        let doc = Document::new(ContentNode::leaf("text/plain", "hello").into_handle());
        let list = Parser::empty().parse(Arc::new(doc), &CancellationToken::new());
        assert_eq!(ids(&list), vec![".message", ".message.attachment"]);
        let wrapper = list.get(1).unwrap();
        assert!(wrapper.is_attachment);
        assert!(!wrapper.attachment.as_ref().unwrap().can_show);
    }

    #[test]
    fn test_handler_error_becomes_error_part() {
        let mut parser = Parser::new();
        parser.register(Arc::new(Failing));
        let doc = Document::new(
            ContentNode::multipart(
                "multipart/mixed",
                vec![
                    ContentNode::leaf("application/x-broken", "??").into_handle(),
                    ContentNode::leaf("text/plain", "after").into_handle(),
                ],
            )
            .into_handle(),
        );
        let list = parser.parse(Arc::new(doc), &CancellationToken::new());
        let error = list.iter().find(|p| p.is_error).unwrap();
        assert_eq!(error.id, ".error.1");
        assert!(!error.is_hidden);
        assert!(!error.is_printable);
        assert!(error.message.as_deref().unwrap().contains("truncated"));
        assert!(list.find_by_id(".torn").is_none());
        assert!(list.find_by_id(".message.mixed.1.plain_text.0").is_some());
        let wrapper = list.find_by_id(".message.mixed.0.attachment").unwrap();
        assert_eq!(wrapper.attachment_view_part_id(), None);
        assert_eq!(list.attachments().count(), 1);
    }

    #[test]
    fn test_error_counter_spans_sessions() {
        let parser = Parser::new();
        let mut out = Vec::new();
        parser.error(&mut out, "first");
        parser.error(&mut out, "second");
        assert_eq!(out[0].id, ".error.1");
        assert_eq!(out[1].id, ".error.2");
    }

    #[test]
    fn test_wrap_hides_wrapped_part() {
        let parser = Parser::new();
        let node = ContentNode::leaf("image/png", vec![0x89, b'P', b'N', b'G'])
            .with_filename("logo.png")
            .with_disposition(Disposition::Attachment)
            .into_handle();
        let mut out = vec![parser.new_part(&node, ".message.mixed.1")];
        parser.wrap_as_attachment(&node, ".message.mixed.1", &mut out);

        assert_eq!(out[0].id, ".message.mixed.1.attachment");
        assert_eq!(out[0].attachment_view_part_id(), Some(".message.mixed.1"));
        assert!(out[1].is_hidden);
        let info = out[0].attachment.as_ref().unwrap();
        assert!(info.can_show);
        assert!(!info.shown);
    }

    #[test]
    fn test_guess_from_extension() {
        let node = ContentNode::leaf("application/octet-stream", "")
            .with_filename("Report.PDF")
            .into_handle();
        assert_eq!(guess_mime_type(&node), "application/pdf");
        let node = ContentNode::leaf("application/zip", "").into_handle();
        assert_eq!(guess_mime_type(&node), "application/zip");
    }

    #[test]
    fn test_force_inline_overrides_disposition() {
        let parser = Parser::new().with_options(ParseOptions {
            force_inline_types: vec!["image/*".into()],
            ..ParseOptions::default()
        });
        let node = ContentNode::leaf("image/gif", "GIF89a")
            .with_disposition(Disposition::Attachment)
            .into_handle();
        let mut out = Vec::new();
        parser.wrap_as_attachment(&node, ".message", &mut out);
        assert!(out[0].attachment.as_ref().unwrap().shown);
    }

    #[test]
    fn test_non_expandable_attachment() {
        let parser = Parser::new();
        let node = ContentNode::leaf("image/gif", "GIF89a").into_handle();
        let mut out = vec![Part::synthetic(".other", "text/plain")];
        parser.wrap_as_non_expandable_attachment(&node, ".message.mixed.0", &mut out);
        assert_eq!(out.len(), 2);
        assert!(!out[0].is_hidden);
        let info = out[1].attachment.as_ref().unwrap();
        assert!(!info.shown && !info.can_show && !info.expandable);
    }

    #[test]
    fn test_secure_button_moves_before_scope_headers() {
        let mut parts = vec![
            Part::synthetic(".message.headers", HEADERS_TYPE),
            Part::synthetic(".message.mixed.0.rfc822", "message/rfc822"),
            Part::synthetic(".message.mixed.0.rfc822.headers", HEADERS_TYPE),
            Part::synthetic(".message.mixed.0.rfc822.signed.0", "text/plain"),
            Part::synthetic(".message.mixed.0.rfc822.secure_button", SECURE_BUTTON_TYPE),
            Part::synthetic(".message.mixed.0.rfc822.end", "message/rfc822"),
            Part::synthetic(".message.signed.0", "text/plain"),
            Part::synthetic(".message.secure_button", SECURE_BUTTON_TYPE),
        ];
        move_secure_buttons_before_headers(&mut parts);
        let ids: Vec<&str> = parts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                ".message.secure_button",
                ".message.headers",
                ".message.mixed.0.rfc822",
                ".message.mixed.0.rfc822.secure_button",
                ".message.mixed.0.rfc822.headers",
                ".message.mixed.0.rfc822.signed.0",
                ".message.mixed.0.rfc822.end",
                ".message.signed.0",
            ]
        );
    }
}
