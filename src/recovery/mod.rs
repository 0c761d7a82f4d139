//! Structured-output recovery.
//!
//! Model output that should be JSON often is not quite JSON.  [`recover`]
//! runs an ordered chain of pure strategies over the raw text and always
//! returns a usable document:
//!
//! ```text
//! raw text
//!   ├─ 1. direct            parse the trimmed text
//!   ├─ 2. fenced            first ``` block (optionally tagged json)
//!   ├─ 3. brace_span        first '{' .. last '}'
//!   ├─ 4. repaired          balanced object, quotes, bare keys, commas, truncation
//!   ├─ 5. field_extraction  regex pull of known analysis fields
//!   └─ 6. exhausted         empty document marked "_recovery": "exhausted"
//! ```

pub mod chain;
pub mod fields;
pub mod repair;
pub mod strategies;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use chain::{recover, Recovery, RecoveryTier, RecoveryTrace, EXHAUSTED_MARKER};
pub use fields::empty_document;
