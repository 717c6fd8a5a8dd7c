//! Pattern Discovery
//!
//! Two complementary views of recurring behaviour:
//!
//! ```text
//! stored sequences ──► PatternExtractor ──► Pattern      (statistical)
//! recent task batch ─► detect_patterns  ──► TaskPattern  (structural)
//! ```
//!
//! Both outputs are ephemeral and recomputed on every learning pass.

pub mod detector;
pub mod extractor;

pub use detector::{
    detect_patterns, ParameterKind, ParameterPattern, PatternError, PatternType, PatternVariable,
    TaskPattern, TaskPatternBuilder, TaskStep, VariableKind,
};
pub use extractor::{ExtractorConfig, Pattern, PatternExtractor};
