//! Collaborators that run in-process without any model behind them.

mod dialogue;
mod intent;
mod patch;

pub use dialogue::RuleDialogueGenerator;
pub use intent::KeywordIntentClassifier;
pub use patch::KeyValuePatchGenerator;
