//! Tool routing for Warden. Decides whether a free-text request may be
//! dispatched to a registered tool.
//!
//! Three layers, composed by [`Router`]:
//! - **Safety rules**: keyword/pattern overrides that deny or require a
//!   human irrespective of match quality
//! - **Semantic matching**: a weighted lexical-overlap scorer over the
//!   tool registry
//! - **Orchestration**: threshold, fallback, and per-tool dangerous
//!   operation override
//!
//! ```text
//! input ──▶ safety ──hit──▶ deny / require_human
//!             │
//!             ▼
//!          scoring ──none──▶ fallback (require_clarify)
//!             │
//!             ▼
//!     dangerous op? ──yes──▶ require_human
//!             │
//!             ▼
//!           allow
//! ```

pub mod orchestrator;
pub mod safety;
pub mod semantic;

pub use orchestrator::{DecisionLogEntry, Router};
pub use safety::{
    SafetyAction, SafetyEvaluator, SafetyMatch, SafetyRule, dangerous_term,
    is_dangerous_operation,
};
pub use semantic::{calculate_similarity, find_matching_tools};
