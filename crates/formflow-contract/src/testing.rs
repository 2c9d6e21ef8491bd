//! Shared test fixtures for crates that depend on `formflow-contract`.
//!
//! Gated behind the `test-support` cargo feature so production builds are
//! unaffected.  Enable via `[dev-dependencies] formflow-contract = { ..., features = ["test-support"] }`.

use crate::{
    CollaboratorError, DialogueGenerator, DialogueRequest, FieldInfo, FormSpec, Intent,
    IntentClassifier, IntentRequest, PatchGenerator, PatchRequest, ValidationError,
};
use async_trait::async_trait;
use formflow_state::{Patch, Schema};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Two-field form used across the test suites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Spec for [`Contact`]: both fields required, email must contain `@`.
#[derive(Default)]
pub struct ContactSpec {
    pub submitted: AtomicUsize,
    pub fail_submit: AtomicBool,
}

impl ContactSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FormSpec for ContactSpec {
    type Form = Contact;

    fn schema(&self) -> Option<Schema> {
        Some(Schema::object([
            ("name", Schema::Scalar),
            ("email", Schema::Scalar),
        ]))
    }

    fn field_guide(&self, json_pointer: &str) -> Option<String> {
        (json_pointer == "/email").then(|| "a valid e-mail address".to_string())
    }

    fn missing_facts(&self, form: &Contact) -> Vec<FieldInfo> {
        let mut missing = Vec::new();
        if form.name.trim().is_empty() {
            missing.push(FieldInfo::required("/name", "Name"));
        }
        if form.email.trim().is_empty() {
            missing.push(FieldInfo::required("/email", "Email"));
        }
        missing
    }

    fn validate_facts(&self, form: &Contact) -> Vec<ValidationError> {
        if !form.email.is_empty() && !form.email.contains('@') {
            vec![ValidationError::new("/email", "must contain '@'")]
        } else {
            Vec::new()
        }
    }

    fn summary(&self, form: &Contact) -> String {
        format!("name={}, email={}", form.name, form.email)
    }

    async fn submit(&self, _form: &Contact) -> Result<(), CollaboratorError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(CollaboratorError::msg("form_spec", "backend unavailable"));
        }
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Classifier that replays a script, then keeps answering `fallback`.
pub struct ScriptedIntentClassifier {
    script: Mutex<VecDeque<Intent>>,
    fallback: Intent,
}

impl ScriptedIntentClassifier {
    pub fn new(script: impl IntoIterator<Item = Intent>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Intent::Edit,
        }
    }

    /// Always answer `intent`.
    pub fn always(intent: Intent) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: intent,
        }
    }
}

#[async_trait]
impl<T: Send + Sync> IntentClassifier<T> for ScriptedIntentClassifier {
    async fn classify(&self, _request: &IntentRequest<T>) -> Result<Intent, CollaboratorError> {
        Ok(self.script.lock().unwrap().pop_front().unwrap_or(self.fallback))
    }
}

/// Patch generator that replays queued patches, then returns empty ones.
#[derive(Default)]
pub struct ScriptedPatchGenerator {
    script: Mutex<VecDeque<Patch>>,
    calls: AtomicUsize,
    last_allowed: Mutex<Vec<String>>,
}

impl ScriptedPatchGenerator {
    pub fn new(script: impl IntoIterator<Item = Patch>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Allow-list handed over with the most recent request.
    pub fn last_allowed_paths(&self) -> Vec<String> {
        self.last_allowed.lock().unwrap().clone()
    }
}

#[async_trait]
impl<T: Send + Sync> PatchGenerator<T> for ScriptedPatchGenerator {
    async fn generate_patch(&self, request: &PatchRequest<T>) -> Result<Patch, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_allowed.lock().unwrap() = request.allowed_paths.clone();
        Ok(self.script.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Dialogue generator that describes the request deterministically.
#[derive(Default)]
pub struct EchoDialogueGenerator;

#[async_trait]
impl<T: Send + Sync> DialogueGenerator<T> for EchoDialogueGenerator {
    async fn generate_message(
        &self,
        request: &DialogueRequest<T>,
    ) -> Result<String, CollaboratorError> {
        Ok(format!(
            "phase={} missing={} errors={} patched={}",
            request.phase,
            request.missing_fields.len(),
            request.validation_errors.len(),
            request.patch_applied
        ))
    }
}

/// Collaborator that fails every call.
pub struct Failing(pub &'static str);

#[async_trait]
impl<T: Send + Sync> IntentClassifier<T> for Failing {
    async fn classify(&self, _request: &IntentRequest<T>) -> Result<Intent, CollaboratorError> {
        Err(CollaboratorError::msg(self.0, "unavailable"))
    }
}

#[async_trait]
impl<T: Send + Sync> PatchGenerator<T> for Failing {
    async fn generate_patch(&self, _request: &PatchRequest<T>) -> Result<Patch, CollaboratorError> {
        Err(CollaboratorError::msg(self.0, "unavailable"))
    }
}

#[async_trait]
impl<T: Send + Sync> DialogueGenerator<T> for Failing {
    async fn generate_message(
        &self,
        _request: &DialogueRequest<T>,
    ) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::msg(self.0, "unavailable"))
    }
}
