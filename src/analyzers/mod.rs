//! Analysis engines for the static layer.

pub mod ast;
pub mod static_analysis;

pub use static_analysis::StaticAnalyzer;
