//! Running one pipeline pass on a dedicated thread.
//!
//! The caller keeps a clone of the [`CancellationToken`] to stop the pass
//! early and collects the result through the returned [`JoinHandle`].

use std::io::Write;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::{FormatError, Result};
use crate::formatter::{Formatter, Mode};
use crate::model::document::Document;
use crate::model::part_list::PartList;
use crate::parser::Parser;

/// Decompose `document` on a new thread.
pub fn spawn_parse(
    parser: Arc<Parser>,
    document: Arc<Document>,
    cancel: CancellationToken,
) -> Result<JoinHandle<PartList>> {
    std::thread::Builder::new()
        .name("mailformat-parse".to_string())
        .spawn(move || {
            debug!("Parse worker started");
            parser.parse(document, &cancel)
        })
        .map_err(|e| FormatError::io("<worker>", e))
}

/// Render `part_list` into `sink` on a new thread. The sink is handed back
/// with the result.
pub fn spawn_format<W>(
    formatter: Arc<Formatter>,
    part_list: Arc<PartList>,
    mode: Mode,
    mut sink: W,
    cancel: CancellationToken,
) -> Result<JoinHandle<Result<W>>>
where
    W: Write + Send + 'static,
{
    std::thread::Builder::new()
        .name("mailformat-format".to_string())
        .spawn(move || {
            debug!(?mode, "Format worker started");
            formatter.format(&part_list, mode, &mut sink, &cancel)?;
            Ok(sink)
        })
        .map_err(|e| FormatError::io("<worker>", e))
}
