//! Core model and pipeline for converting scanned PDFs to Word documents.

pub mod cancel;
pub mod document;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod plugin;
pub mod progress;
pub mod temp;
