//! Form-filling conversations on top of the constrained patch engine.
//!
//! [`FormFlow`] owns a [`FormSpec`](formflow_contract::FormSpec) and three
//! collaborators (intent classifier, patch generator, dialogue generator) and
//! advances a [`Session`] one user turn at a time:
//!
//! ```text
//! Collecting ──(nothing missing, no errors)──▶ Confirming ──confirm──▶ Submitted
//!     ▲                                            │
//!     └──────────────────back──────────────────────┘
//! any non-terminal ──cancel──▶ Cancelled
//! ```
//!
//! [`FormFlow::run_turn`] returns the whole reply; [`FormFlow::run_turn_stream`]
//! commits the turn first and streams the reply text.
//!
//! The [`local`] module provides collaborators that need no model, and
//! [`fallback`] chains several implementations of the same collaborator.

pub mod cancel;
pub mod config;
pub mod fallback;
pub mod local;

mod error;
mod flow;
mod session;

pub use cancel::{cancellable, cancellable_stream, is_cancelled, RunCancellationToken};
pub use config::{ConfigError, FormFlowConfig};
pub use error::FlowError;
pub use fallback::{FallbackDialogueGenerator, FallbackIntentClassifier, FallbackPatchGenerator};
pub use flow::{FormFlow, PatchHook};
pub use local::{KeyValuePatchGenerator, KeywordIntentClassifier, RuleDialogueGenerator};
pub use session::Session;
