//! Report assembly, persistence and rendering.

pub mod assembler;
pub mod generator;
pub mod store;

pub use assembler::{AssembledReport, ReportAssembler, ReportContext};
pub use generator::{generate_json_report, generate_markdown_report};
pub use store::{FileReportStore, SqliteMetadataStore};
