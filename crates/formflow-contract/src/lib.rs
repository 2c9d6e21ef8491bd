//! Shared form-flow contracts: form spec plug-in, collaborator SPI, storage
//! and checkpoints.
#![allow(missing_docs)]

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub mod checkpoint;
pub mod collab;
pub mod error;
pub mod form;
pub mod message;
pub mod response;
pub mod storage;

pub use checkpoint::{Checkpoint, CheckpointError, CHECKPOINT_VERSION};
pub use collab::{
    DialogueGenerator, DialogueRequest, Intent, IntentClassifier, IntentRequest, MessageStream,
    PatchGenerator, PatchRequest,
};
pub use error::CollaboratorError;
pub use form::{resolve_allowed_paths, FieldInfo, FormSpec, FormValue, Phase, ValidationError};
pub use message::{append_history, Message, Role};
pub use response::{TurnResponse, TurnStream, META_ERROR, META_OPS, META_PATCH_APPLIED};
pub use storage::{ConversationState, HistoryStore, StateStore, StoreError};
