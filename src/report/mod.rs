//! Report normalization.
//!
//! Turns the deeply nested `<get_reports_response>` returned by the manager
//! into a flat [`Report`]: summary counts, ports, findings and errors.
//! Both current (GMP 20+) and legacy count blocks are understood.

pub mod model;
pub mod normalize;
mod raw;

pub use model::{ErrorEntry, Nvt, PortEntry, Report, ReportMetadata, Summary, Vulnerability};
pub use normalize::{parse, parse_envelope, parse_tags, ReportEnvelope};
