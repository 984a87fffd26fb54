//! `mailformat`: a two-phase MIME message pipeline.
//!
//! A [`Parser`](parser::Parser) decomposes a parsed message into a flat,
//! ordered [`PartList`](model::part_list::PartList) of addressable parts;
//! a [`Formatter`](formatter::Formatter) then renders that list, any number
//! of times and in any mode, through handlers registered per content type.

pub mod cancel;
pub mod config;
pub mod error;
pub mod formatter;
pub mod model;
pub mod parser;
pub mod registry;
pub mod worker;
