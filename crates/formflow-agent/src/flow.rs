//! The form-filling state machine.
//!
//! One turn runs classify → (command | generate patch → validate → apply) →
//! derive phase → generate message. Collaborator, validation and apply
//! failures are recovered into a response with an `error` metadata entry and
//! leave the session untouched. Only a failed submit, a store failure or
//! cancellation abort a turn.
//!
//! The message step runs either to completion ([`FormFlow::run_turn`]) or as
//! a stream ([`FormFlow::run_turn_stream`]); everything before it is shared.

use crate::cancel::{cancellable, cancellable_stream, is_cancelled, RunCancellationToken};
use crate::local::{KeyValuePatchGenerator, KeywordIntentClassifier, RuleDialogueGenerator};
use crate::{FlowError, FormFlowConfig, Session};
use formflow_contract::{
    resolve_allowed_paths, Checkpoint, CollaboratorError, ConversationState, DialogueGenerator,
    DialogueRequest, FormSpec, HistoryStore, Intent, IntentClassifier, IntentRequest, Message,
    MessageStream, PatchGenerator, PatchRequest, Phase, StateStore, TurnResponse, TurnStream,
    META_ERROR, META_OPS, META_PATCH_APPLIED,
};
use formflow_state::{
    apply, diff, validate_paths, validate_with_mode, AllowedPaths, Operation, PatchError,
};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;

/// Rewrites a generated batch before validation, given the current form.
pub type PatchHook<T> =
    Arc<dyn Fn(&T, Vec<Operation>) -> Result<Vec<Operation>, CollaboratorError> + Send + Sync>;

/// Why a turn fell back to recovery messaging.
#[derive(Debug)]
enum TurnFailure {
    Collaborator(CollaboratorError),
    Rejected(PatchError),
}

impl TurnFailure {
    fn describe(&self) -> String {
        match self {
            Self::Collaborator(e) => e.to_string(),
            Self::Rejected(e) => e.to_string(),
        }
    }
}

/// A turn whose user-facing message is still to be generated.
struct Pending<T> {
    request: DialogueRequest<T>,
    /// Leads the message when the patch step failed.
    notice: Option<String>,
    /// Whether the request's form and phase replace the session's.
    commit: bool,
    metadata: BTreeMap<String, String>,
}

enum Step<T> {
    Done(TurnResponse<T>),
    Dialogue(Pending<T>),
}

fn meta_entries<const N: usize>(entries: [(&str, String); N]) -> BTreeMap<String, String> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn single_chunk(text: String) -> MessageStream {
    Box::pin(futures::stream::iter([Ok::<_, CollaboratorError>(text)]))
}

/// Drives conversations for one [`FormSpec`].
pub struct FormFlow<S: FormSpec> {
    spec: Arc<S>,
    classifier: Arc<dyn IntentClassifier<S::Form>>,
    patch_generator: Arc<dyn PatchGenerator<S::Form>>,
    dialogue: Arc<dyn DialogueGenerator<S::Form>>,
    rules: RuleDialogueGenerator,
    patch_hook: Option<PatchHook<S::Form>>,
    config: FormFlowConfig,
    allowed_paths: AllowedPaths,
}

impl<S: FormSpec> FormFlow<S> {
    pub fn new(
        spec: Arc<S>,
        classifier: Arc<dyn IntentClassifier<S::Form>>,
        patch_generator: Arc<dyn PatchGenerator<S::Form>>,
        dialogue: Arc<dyn DialogueGenerator<S::Form>>,
    ) -> Self {
        let config = FormFlowConfig::default();
        let allowed_paths = resolve_allowed_paths(spec.as_ref());
        Self {
            spec,
            classifier,
            patch_generator,
            dialogue,
            rules: RuleDialogueGenerator::from_config(&config),
            patch_hook: None,
            config,
            allowed_paths,
        }
    }

    /// A flow wired to the in-process keyword, key/value and rule collaborators.
    pub fn local(spec: Arc<S>) -> Self {
        Self::local_with_config(spec, FormFlowConfig::default())
    }

    pub fn local_with_config(spec: Arc<S>, config: FormFlowConfig) -> Self {
        let dialogue = Arc::new(RuleDialogueGenerator::from_config(&config));
        Self::new(
            spec,
            Arc::new(KeywordIntentClassifier::new()),
            Arc::new(KeyValuePatchGenerator::new()),
            dialogue,
        )
        .with_config(config)
    }

    #[must_use]
    pub fn with_config(mut self, config: FormFlowConfig) -> Self {
        self.rules = RuleDialogueGenerator::from_config(&config);
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_patch_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&S::Form, Vec<Operation>) -> Result<Vec<Operation>, CollaboratorError>
            + Send
            + Sync
            + 'static,
    {
        self.patch_hook = Some(Arc::new(hook));
        self
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }

    pub fn config(&self) -> &FormFlowConfig {
        &self.config
    }

    /// Allow-list derived from the form spec at construction time.
    pub fn allowed_paths(&self) -> &AllowedPaths {
        &self.allowed_paths
    }

    /// A fresh `Collecting` session with an empty form.
    pub fn new_session(&self) -> Session<S::Form> {
        Session::new(Phase::Collecting, S::Form::default(), self.allowed_paths.clone())
    }

    /// Prefill `session` from externally supplied values.
    ///
    /// Zero values in `initial` never overwrite the session. Returns the
    /// number of operations applied. A closed session is never seeded.
    pub fn seed(
        &self,
        session: &mut Session<S::Form>,
        initial: &S::Form,
    ) -> Result<usize, FlowError> {
        if session.phase.is_terminal() {
            return Err(FlowError::ConversationClosed(session.phase));
        }
        let ops = diff(&session.form_state, initial)?;
        if ops.is_empty() {
            return Ok(0);
        }
        validate_paths(&ops, &session.allowed_paths)?;
        session.form_state = apply(&session.form_state, &ops)?;
        tracing::debug!(ops = ops.len(), "seeded form state");
        Ok(ops.len())
    }

    /// Snapshot including the form spec's missing fields, issues and summary.
    pub fn checkpoint(
        &self,
        session: &Session<S::Form>,
        last_user_text: Option<&str>,
    ) -> Checkpoint<S::Form> {
        let mut checkpoint = session.checkpoint();
        checkpoint.missing = self.spec.missing_facts(&session.form_state);
        checkpoint.issues = self.spec.validate_facts(&session.form_state);
        checkpoint.summary = Some(self.spec.summary(&session.form_state));
        checkpoint.last_user_text = last_user_text.map(str::to_string);
        checkpoint
    }

    /// Resume from encoded checkpoint bytes and run one turn.
    ///
    /// The checkpoint's allow-list is kept; a checkpoint stored without one
    /// falls back to this flow's list.
    pub async fn run_turn_with_checkpoint(
        &self,
        checkpoint: &[u8],
        input: &str,
        history: &[Message],
        cancel: Option<&RunCancellationToken>,
    ) -> Result<(Session<S::Form>, TurnResponse<S::Form>), FlowError> {
        let checkpoint = Checkpoint::<S::Form>::from_json_bytes(checkpoint)?;
        let mut session = Session::restore(checkpoint)?;
        if session.allowed_paths.is_empty() {
            session.allowed_paths = self.allowed_paths.clone();
        }
        let response = self.run_turn(&mut session, input, history, cancel).await?;
        Ok((session, response))
    }

    /// Run one turn for a conversation persisted under `key`.
    ///
    /// A missing key starts a new conversation. The user input and the reply
    /// are appended to history; with `clear_on_completion` a terminal turn
    /// removes both state and history instead.
    pub async fn invoke(
        &self,
        states: &dyn StateStore<S::Form>,
        histories: &dyn HistoryStore,
        key: &str,
        input: &str,
        cancel: Option<&RunCancellationToken>,
    ) -> Result<TurnResponse<S::Form>, FlowError> {
        let span = tracing::info_span!("form_invoke", key);
        async move {
            let stored = states.read_or_default(key).await?;
            let history = histories.load(key).await?;
            let mut session =
                Session::new(stored.phase, stored.form_state, self.allowed_paths.clone());

            let response = self.run_turn(&mut session, input, &history, cancel).await?;

            if session.is_completed() && self.config.clear_on_completion {
                states.remove(key).await?;
                histories.clear(key).await?;
                tracing::info!(phase = %session.phase, "conversation finished, stored state cleared");
            } else {
                states
                    .write(key, &ConversationState::new(session.phase, session.form_state))
                    .await?;
                histories
                    .append(
                        key,
                        vec![Message::user(input), Message::assistant(response.message.clone())],
                    )
                    .await?;
            }
            Ok(response)
        }
        .instrument(span)
        .await
    }

    /// Run one turn against an in-memory session.
    pub async fn run_turn(
        &self,
        session: &mut Session<S::Form>,
        input: &str,
        history: &[Message],
        cancel: Option<&RunCancellationToken>,
    ) -> Result<TurnResponse<S::Form>, FlowError> {
        let span = tracing::info_span!("form_turn", phase = %session.phase);
        async move {
            match self.prepare(session, input, history, cancel).await? {
                Step::Done(response) => Ok(response),
                Step::Dialogue(pending) => self.finish(session, pending, cancel).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Run one turn and stream the reply.
    ///
    /// Phase and form are committed before the stream is returned. Command
    /// turns stream their fixed message as one chunk; other turns stream the
    /// dialogue generator's output, led by the fallback notice when the
    /// patch step failed. Streamed text is not checked for emptiness.
    /// Cancelling after the stream is returned ends it with an error chunk
    /// but does not roll the session back.
    pub async fn run_turn_stream(
        &self,
        session: &mut Session<S::Form>,
        input: &str,
        history: &[Message],
        cancel: Option<&RunCancellationToken>,
    ) -> Result<TurnStream<S::Form>, FlowError> {
        let span = tracing::info_span!("form_turn", phase = %session.phase, streaming = true);
        async move {
            match self.prepare(session, input, history, cancel).await? {
                Step::Done(response) => Ok(TurnStream::from_response(response)),
                Step::Dialogue(pending) => self.finish_stream(session, pending, cancel).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Everything up to message generation. Commands are applied to the
    /// session here; edits are only staged.
    async fn prepare(
        &self,
        session: &mut Session<S::Form>,
        input: &str,
        history: &[Message],
        cancel: Option<&RunCancellationToken>,
    ) -> Result<Step<S::Form>, FlowError> {
        if session.phase.is_terminal() {
            return Err(FlowError::ConversationClosed(session.phase));
        }
        if is_cancelled(cancel) {
            return Err(FlowError::Cancelled);
        }
        let history = self.recent(history);

        let request = IntentRequest {
            user_input: input.to_string(),
            phase: session.phase,
            form_state: session.form_state.clone(),
            state_summary: self.spec.summary(&session.form_state),
            history: history.clone(),
        };
        let intent = match cancellable(cancel, self.classifier.classify(&request)).await? {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(error = %e, "intent classification failed");
                let pending = self.recovery(session, input, history, TurnFailure::Collaborator(e));
                return Ok(Step::Dialogue(pending));
            }
        };
        tracing::debug!(%intent, "classified turn");

        match intent {
            Intent::Cancel => Ok(Step::Done(self.cancel(session))),
            Intent::Confirm => self.confirm(session, cancel).await.map(Step::Done),
            Intent::Back => Ok(Step::Done(self.back(session))),
            Intent::Edit | Intent::DoNothing => self
                .edit(session, input, history, cancel)
                .await
                .map(Step::Dialogue),
        }
    }

    fn cancel(&self, session: &mut Session<S::Form>) -> TurnResponse<S::Form> {
        self.transition(session, Phase::Cancelled);
        self.reply(session, &self.config.cancelled_message)
    }

    fn back(&self, session: &mut Session<S::Form>) -> TurnResponse<S::Form> {
        if session.phase != Phase::Confirming {
            return self.reply(session, &self.config.back_ignored_message);
        }
        self.transition(session, Phase::Collecting);
        self.reply(session, &self.config.back_message)
    }

    async fn confirm(
        &self,
        session: &mut Session<S::Form>,
        cancel: Option<&RunCancellationToken>,
    ) -> Result<TurnResponse<S::Form>, FlowError> {
        if session.phase != Phase::Confirming
            || !self.spec.missing_facts(&session.form_state).is_empty()
        {
            return Ok(self.reply(session, &self.config.confirm_blocked_message));
        }

        let issues = self.spec.validate_facts(&session.form_state);
        if !issues.is_empty() {
            tracing::debug!(issues = issues.len(), "confirm blocked by validation errors");
            let mut message = self.config.validation_failed_message.clone();
            for issue in &issues {
                message.push('\n');
                message.push_str(&issue.to_string());
            }
            return Ok(self.reply(session, &message));
        }

        match cancellable(cancel, self.spec.submit(&session.form_state)).await? {
            Err(e) => {
                tracing::warn!(error = %e, "form submission failed");
                Err(FlowError::Submit(e))
            }
            Ok(()) => {
                self.transition(session, Phase::Submitted);
                Ok(self.reply(session, &self.config.submitted_message))
            }
        }
    }

    /// Generate, validate and apply a patch to a copy of the form.
    async fn edit(
        &self,
        session: &Session<S::Form>,
        input: &str,
        history: Vec<Message>,
        cancel: Option<&RunCancellationToken>,
    ) -> Result<Pending<S::Form>, FlowError> {
        let missing = self.spec.missing_facts(&session.form_state);
        let field_guidance: BTreeMap<String, String> = missing
            .iter()
            .filter_map(|f| {
                self.spec
                    .field_guide(&f.json_pointer)
                    .map(|guide| (f.json_pointer.clone(), guide))
            })
            .collect();
        let request = PatchRequest {
            user_input: input.to_string(),
            form_state: session.form_state.clone(),
            allowed_paths: session.allowed_paths.to_vec(),
            missing_fields: missing,
            field_guidance,
            history: history.clone(),
        };

        let patch = match cancellable(cancel, self.patch_generator.generate_patch(&request)).await? {
            Ok(patch) => patch,
            Err(e) => {
                tracing::warn!(error = %e, "patch generation failed");
                return Ok(self.recovery(session, input, history, TurnFailure::Collaborator(e)));
            }
        };

        let ops = match &self.patch_hook {
            Some(hook) => match hook(&session.form_state, patch.into_ops()) {
                Ok(ops) => ops,
                Err(e) => {
                    tracing::warn!(error = %e, "patch hook failed");
                    return Ok(self.recovery(session, input, history, TurnFailure::Collaborator(e)));
                }
            },
            None => patch.into_ops(),
        };

        let form = if ops.is_empty() {
            session.form_state.clone()
        } else {
            tracing::debug!(ops = ops.len(), "applying generated patch");
            match validate_with_mode(&ops, &session.allowed_paths, self.config.validation_mode)
                .and_then(|()| apply(&session.form_state, &ops))
            {
                Ok(form) => form,
                Err(e) => {
                    tracing::warn!(error = %e, "generated patch rejected");
                    return Ok(self.recovery(session, input, history, TurnFailure::Rejected(e)));
                }
            }
        };

        let missing = self.spec.missing_facts(&form);
        let issues = self.spec.validate_facts(&form);
        let phase = if session.phase == Phase::Collecting && missing.is_empty() && issues.is_empty()
        {
            Phase::Confirming
        } else {
            session.phase
        };
        let patch_applied = !ops.is_empty();

        Ok(Pending {
            request: DialogueRequest {
                phase,
                state_summary: self.spec.summary(&form),
                form_state: form,
                missing_fields: missing,
                validation_errors: issues,
                last_user_input: input.to_string(),
                patch_applied,
                history,
            },
            notice: None,
            commit: true,
            metadata: meta_entries([
                (META_PATCH_APPLIED, patch_applied.to_string()),
                (META_OPS, ops.len().to_string()),
            ]),
        })
    }

    /// Best-effort reply for a turn whose patch step failed. The session is
    /// left as it was.
    fn recovery(
        &self,
        session: &Session<S::Form>,
        input: &str,
        history: Vec<Message>,
        failure: TurnFailure,
    ) -> Pending<S::Form> {
        let form = &session.form_state;
        let mut notice = self.config.fallback_message.clone();
        if let TurnFailure::Rejected(e) = &failure {
            notice.push(' ');
            notice.push_str(&e.to_string());
        }
        Pending {
            request: DialogueRequest {
                phase: session.phase,
                form_state: form.clone(),
                state_summary: self.spec.summary(form),
                missing_fields: self.spec.missing_facts(form),
                validation_errors: self.spec.validate_facts(form),
                last_user_input: input.to_string(),
                patch_applied: false,
                history,
            },
            notice: Some(notice),
            commit: false,
            metadata: meta_entries([
                (META_PATCH_APPLIED, "false".to_string()),
                (META_ERROR, failure.describe()),
            ]),
        }
    }

    async fn finish(
        &self,
        session: &mut Session<S::Form>,
        mut pending: Pending<S::Form>,
        cancel: Option<&RunCancellationToken>,
    ) -> Result<TurnResponse<S::Form>, FlowError> {
        let generated = cancellable(cancel, self.dialogue.generate_message(&pending.request)).await?;
        let text = generated.and_then(|text| {
            if text.trim().is_empty() {
                Err(CollaboratorError::msg("dialogue_generator", "empty message"))
            } else {
                Ok(text)
            }
        });
        let body = match text {
            Ok(text) => text,
            Err(e) => self.rule_based(&mut pending, e),
        };
        let message = match pending.notice.take() {
            Some(notice) => format!("{notice}\n{body}"),
            None => body,
        };

        let metadata = self.settle(session, pending);
        let mut response = self.reply(session, &message);
        response.metadata = metadata;
        Ok(response)
    }

    async fn finish_stream(
        &self,
        session: &mut Session<S::Form>,
        mut pending: Pending<S::Form>,
        cancel: Option<&RunCancellationToken>,
    ) -> Result<TurnStream<S::Form>, FlowError> {
        let opened =
            cancellable(cancel, self.dialogue.generate_message_stream(&pending.request)).await?;
        let body = match opened {
            Ok(stream) => stream,
            Err(e) => single_chunk(self.rule_based(&mut pending, e)),
        };
        let messages: MessageStream = match pending.notice.take() {
            Some(notice) => Box::pin(single_chunk(format!("{notice}\n")).chain(body)),
            None => body,
        };

        let metadata = self.settle(session, pending);
        Ok(TurnStream {
            phase: session.phase,
            form_state: session.form_state.clone(),
            completed: session.is_completed(),
            metadata,
            messages: cancellable_stream(cancel, messages),
        })
    }

    /// Message body when the dialogue generator failed. Outside recovery the
    /// fallback notice leads and the failure is recorded.
    fn rule_based(&self, pending: &mut Pending<S::Form>, error: CollaboratorError) -> String {
        tracing::warn!(error = %error, "dialogue generation failed, using rule-based message");
        let rendered = self.rules.render(&pending.request);
        if pending.notice.is_some() {
            return rendered;
        }
        pending
            .metadata
            .insert(META_ERROR.to_string(), error.to_string());
        format!("{}\n{}", self.config.fallback_message, rendered)
    }

    /// Commit a staged edit and hand back the turn's metadata.
    fn settle(
        &self,
        session: &mut Session<S::Form>,
        pending: Pending<S::Form>,
    ) -> BTreeMap<String, String> {
        if pending.commit {
            session.form_state = pending.request.form_state;
            self.transition(session, pending.request.phase);
        }
        pending.metadata
    }

    fn transition(&self, session: &mut Session<S::Form>, to: Phase) {
        if session.phase != to {
            tracing::info!(from = %session.phase, to = %to, "phase transition");
            session.phase = to;
        }
    }

    fn reply(&self, session: &Session<S::Form>, message: &str) -> TurnResponse<S::Form> {
        TurnResponse::new(message, session.phase, session.form_state.clone())
    }

    fn recent(&self, history: &[Message]) -> Vec<Message> {
        let start = history.len().saturating_sub(self.config.history_window);
        history[start..].to_vec()
    }
}
