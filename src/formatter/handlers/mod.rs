//! Built-in renderers.

mod attachment;
mod frame;
mod headers;
mod image;
mod rfc822;
mod secure;
mod text;

use std::sync::Arc;

use super::FormatterHandler;
use crate::registry::HandlerRegistry;

pub use attachment::AttachmentRenderer;
pub use frame::{ErrorRenderer, MessageFrameRenderer, SourceRenderer};
pub use headers::HeadersRenderer;
pub use image::ImageRenderer;
pub use rfc822::Rfc822Renderer;
pub use secure::SecureButtonRenderer;
pub use text::{decode_text, TextHtmlRenderer, TextPlainRenderer};

/// Register every built-in renderer.
pub fn register_builtins(registry: &mut HandlerRegistry<dyn FormatterHandler>) {
    let handlers: Vec<Arc<dyn FormatterHandler>> = vec![
        Arc::new(MessageFrameRenderer),
        Arc::new(HeadersRenderer),
        Arc::new(TextPlainRenderer),
        Arc::new(TextHtmlRenderer),
        Arc::new(ImageRenderer),
        Arc::new(AttachmentRenderer),
        Arc::new(Rfc822Renderer),
        Arc::new(ErrorRenderer),
        Arc::new(SecureButtonRenderer),
        Arc::new(SourceRenderer),
    ];
    for handler in handlers {
        registry.register(handler);
    }
}
