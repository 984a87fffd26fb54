//! Built-in decomposition handlers.

mod image;
mod message;
mod multipart;
mod rfc822;
mod secure;
mod text;

use std::sync::Arc;

use super::ParserHandler;
use crate::registry::HandlerRegistry;

pub use image::ImageHandler;
pub use message::MessageHandler;
pub use multipart::{AlternativeHandler, MixedHandler, RelatedHandler};
pub use rfc822::Rfc822Handler;
pub use secure::{
    EncryptedHandler, InlinePgpEncryptedHandler, InlinePgpSignedHandler, Pkcs7Handler,
    SignedHandler,
};
pub use text::{TextHtmlHandler, TextPlainHandler};

/// Register every built-in handler.
pub fn register_builtins(registry: &mut HandlerRegistry<dyn ParserHandler>) {
    let handlers: Vec<Arc<dyn ParserHandler>> = vec![
        Arc::new(MessageHandler),
        Arc::new(MixedHandler),
        Arc::new(AlternativeHandler),
        Arc::new(RelatedHandler),
        Arc::new(SignedHandler),
        Arc::new(EncryptedHandler),
        Arc::new(Pkcs7Handler),
        Arc::new(InlinePgpSignedHandler),
        Arc::new(InlinePgpEncryptedHandler),
        Arc::new(Rfc822Handler),
        Arc::new(TextPlainHandler),
        Arc::new(TextHtmlHandler),
        Arc::new(ImageHandler),
    ];
    for handler in handlers {
        registry.register(handler);
    }
}
