//! Turn-level behaviour of the form state machine.

use async_trait::async_trait;
use formflow_agent::{FlowError, FormFlow, FormFlowConfig, RunCancellationToken, Session};
use formflow_contract::testing::{
    Contact, ContactSpec, EchoDialogueGenerator, Failing, ScriptedIntentClassifier,
    ScriptedPatchGenerator,
};
use formflow_contract::{
    CollaboratorError, DialogueGenerator, DialogueRequest, Intent, IntentClassifier,
    MessageStream, PatchGenerator, PatchRequest, Phase, META_OPS, META_PATCH_APPLIED,
};
use formflow_state::{AllowedPaths, Operation, Patch, ValidationMode};
use futures::StreamExt;
use std::sync::Arc;

fn fill_both() -> Patch {
    Patch::new()
        .with_op(Operation::replace("/name", "Ann"))
        .with_op(Operation::replace("/email", "ann@example.com"))
}

fn flow_with(
    spec: Arc<ContactSpec>,
    intents: impl IntoIterator<Item = Intent>,
    patches: Arc<ScriptedPatchGenerator>,
) -> FormFlow<ContactSpec> {
    FormFlow::new(
        spec,
        Arc::new(ScriptedIntentClassifier::new(intents)),
        patches,
        Arc::new(EchoDialogueGenerator),
    )
}

fn contact(name: &str, email: &str) -> Contact {
    Contact {
        name: name.into(),
        email: email.into(),
    }
}

fn confirming(flow: &FormFlow<ContactSpec>, form: Contact) -> Session<Contact> {
    Session::new(Phase::Confirming, form, flow.allowed_paths().clone())
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_collect_confirm_submit() {
    let spec = Arc::new(ContactSpec::new());
    let patches = Arc::new(ScriptedPatchGenerator::new([Patch::new(), fill_both()]));
    let flow = flow_with(
        spec.clone(),
        [Intent::Edit, Intent::Edit, Intent::Confirm],
        patches.clone(),
    );
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "hello", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Collecting);
    assert!(!r.completed);
    assert_eq!(r.message, "phase=collecting missing=2 errors=0 patched=false");
    assert_eq!(r.metadata.get(META_PATCH_APPLIED).map(String::as_str), Some("false"));

    let r = flow
        .run_turn(&mut session, "Ann, ann@example.com", &[], None)
        .await
        .unwrap();
    assert_eq!(r.phase, Phase::Confirming);
    assert_eq!(r.form_state, contact("Ann", "ann@example.com"));
    assert_eq!(r.metadata.get(META_PATCH_APPLIED).map(String::as_str), Some("true"));
    assert_eq!(r.metadata.get(META_OPS).map(String::as_str), Some("2"));
    assert_eq!(session.phase, Phase::Confirming);

    let r = flow.run_turn(&mut session, "yes", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Submitted);
    assert!(r.completed);
    assert_eq!(r.message, flow.config().submitted_message);
    assert_eq!(spec.submit_count(), 1);
    assert_eq!(patches.calls(), 2);
}

#[tokio::test]
async fn test_patch_request_carries_allow_list() {
    let patches = Arc::new(ScriptedPatchGenerator::default());
    let flow = flow_with(Arc::new(ContactSpec::new()), [], patches.clone());
    let mut session = flow.new_session();

    flow.run_turn(&mut session, "hi", &[], None).await.unwrap();

    assert_eq!(patches.last_allowed_paths(), vec!["/email", "/name"]);
}

#[tokio::test]
async fn test_terminal_session_is_closed() {
    let flow = flow_with(
        Arc::new(ContactSpec::new()),
        [],
        Arc::new(ScriptedPatchGenerator::default()),
    );
    let mut session = Session::new(Phase::Submitted, Contact::default(), Default::default());

    let err = flow.run_turn(&mut session, "hi", &[], None).await.unwrap_err();
    assert!(matches!(err, FlowError::ConversationClosed(Phase::Submitted)));
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_cancel_from_any_open_phase() {
    for phase in [Phase::Collecting, Phase::Confirming] {
        let flow = flow_with(
            Arc::new(ContactSpec::new()),
            [Intent::Cancel],
            Arc::new(ScriptedPatchGenerator::default()),
        );
        let mut session = Session::new(phase, contact("Ann", ""), flow.allowed_paths().clone());

        let r = flow.run_turn(&mut session, "stop", &[], None).await.unwrap();
        assert_eq!(r.phase, Phase::Cancelled);
        assert!(r.completed);
        assert_eq!(r.message, flow.config().cancelled_message);
        assert_eq!(r.form_state, contact("Ann", ""));
    }
}

#[tokio::test]
async fn test_confirm_while_collecting_is_blocked() {
    let spec = Arc::new(ContactSpec::new());
    let flow = flow_with(
        spec.clone(),
        [Intent::Confirm],
        Arc::new(ScriptedPatchGenerator::default()),
    );
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "confirm", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Collecting);
    assert_eq!(r.message, flow.config().confirm_blocked_message);
    assert_eq!(spec.submit_count(), 0);
}

#[tokio::test]
async fn test_confirm_revalidates() {
    let spec = Arc::new(ContactSpec::new());
    let flow = flow_with(
        spec.clone(),
        [Intent::Confirm],
        Arc::new(ScriptedPatchGenerator::default()),
    );
    let mut session = confirming(&flow, contact("Ann", "not-an-email"));

    let r = flow.run_turn(&mut session, "confirm", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Confirming);
    assert!(r.message.starts_with(&flow.config().validation_failed_message));
    assert!(r.message.contains("/email: must contain '@'"));
    assert_eq!(spec.submit_count(), 0);
}

#[tokio::test]
async fn test_submit_failure_keeps_confirming() {
    let spec = Arc::new(ContactSpec::new());
    spec.set_fail_submit(true);
    let flow = flow_with(
        spec.clone(),
        [Intent::Confirm, Intent::Confirm],
        Arc::new(ScriptedPatchGenerator::default()),
    );
    let mut session = confirming(&flow, contact("Ann", "ann@example.com"));

    let err = flow.run_turn(&mut session, "confirm", &[], None).await.unwrap_err();
    assert!(matches!(err, FlowError::Submit(_)));
    assert_eq!(session.phase, Phase::Confirming);

    spec.set_fail_submit(false);
    let r = flow.run_turn(&mut session, "confirm", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Submitted);
    assert_eq!(spec.submit_count(), 1);
}

#[tokio::test]
async fn test_back_returns_to_collecting() {
    let flow = flow_with(
        Arc::new(ContactSpec::new()),
        [Intent::Back, Intent::Back],
        Arc::new(ScriptedPatchGenerator::default()),
    );
    let mut session = confirming(&flow, contact("Ann", "ann@example.com"));

    let r = flow.run_turn(&mut session, "back", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Collecting);
    assert_eq!(r.message, flow.config().back_message);

    let r = flow.run_turn(&mut session, "back", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Collecting);
    assert_eq!(r.message, flow.config().back_ignored_message);
}

#[tokio::test]
async fn test_edit_while_confirming_stays_confirming() {
    let patches = Arc::new(ScriptedPatchGenerator::new([
        Patch::new().with_op(Operation::replace("/name", "Bea"))
    ]));
    let flow = flow_with(Arc::new(ContactSpec::new()), [], patches);
    let mut session = confirming(&flow, contact("Ann", "ann@example.com"));

    let r = flow.run_turn(&mut session, "name is Bea", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Confirming);
    assert_eq!(session.form_state.name, "Bea");
}

// ============================================================================
// Recoverable failures
// ============================================================================

#[tokio::test]
async fn test_classifier_failure_is_recovered() {
    let flow = FormFlow::new(
        Arc::new(ContactSpec::new()),
        Arc::new(Failing("intent_classifier")),
        Arc::new(ScriptedPatchGenerator::new([fill_both()])),
        Arc::new(EchoDialogueGenerator),
    );
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "hi", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Collecting);
    assert!(r.error().unwrap().contains("intent_classifier"));
    assert!(r.message.starts_with(&flow.config().fallback_message));
    assert_eq!(session.form_state, Contact::default());
}

#[tokio::test]
async fn test_generator_failure_is_recovered() {
    let flow = FormFlow::new(
        Arc::new(ContactSpec::new()),
        Arc::new(ScriptedIntentClassifier::always(Intent::Edit)),
        Arc::new(Failing("patch_generator")),
        Arc::new(EchoDialogueGenerator),
    );
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "Ann", &[], None).await.unwrap();
    assert!(r.error().unwrap().contains("patch_generator"));
    assert!(r.message.ends_with("phase=collecting missing=2 errors=0 patched=false"));
}

#[tokio::test]
async fn test_disallowed_path_leaves_state_untouched() {
    let patches = Arc::new(ScriptedPatchGenerator::new([Patch::new()
        .with_op(Operation::replace("/name", "Ann"))
        .with_op(Operation::add("/is_admin", true))]));
    let flow = flow_with(Arc::new(ContactSpec::new()), [], patches);
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "Ann", &[], None).await.unwrap();
    assert!(r.error().unwrap().contains("/is_admin"));
    assert_eq!(r.metadata.get(META_PATCH_APPLIED).map(String::as_str), Some("false"));
    assert_eq!(session.form_state, Contact::default());
    assert_eq!(session.phase, Phase::Collecting);
}

#[tokio::test]
async fn test_type_mismatch_leaves_state_untouched() {
    let patches = Arc::new(ScriptedPatchGenerator::new([
        Patch::new().with_op(Operation::replace("/name", 42))
    ]));
    let flow = flow_with(Arc::new(ContactSpec::new()), [], patches);
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "42", &[], None).await.unwrap();
    assert!(r.error().is_some());
    assert_eq!(session.form_state, Contact::default());
}

#[tokio::test]
async fn test_dialogue_failure_still_commits_patch() {
    let flow = FormFlow::new(
        Arc::new(ContactSpec::new()),
        Arc::new(ScriptedIntentClassifier::always(Intent::Edit)),
        Arc::new(ScriptedPatchGenerator::new([fill_both()])),
        Arc::new(Failing("dialogue_generator")),
    );
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "Ann", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Confirming);
    assert!(r.error().unwrap().contains("dialogue_generator"));
    assert!(r.message.contains("name=Ann, email=ann@example.com"));
    assert_eq!(session.form_state, contact("Ann", "ann@example.com"));
}

struct Silent;

#[async_trait]
impl DialogueGenerator<Contact> for Silent {
    async fn generate_message(
        &self,
        _request: &formflow_contract::DialogueRequest<Contact>,
    ) -> Result<String, CollaboratorError> {
        Ok("   ".into())
    }
}

#[tokio::test]
async fn test_empty_dialogue_counts_as_failure() {
    let flow = FormFlow::new(
        Arc::new(ContactSpec::new()),
        Arc::new(ScriptedIntentClassifier::always(Intent::Edit)),
        Arc::new(ScriptedPatchGenerator::default()),
        Arc::new(Silent),
    );
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "hi", &[], None).await.unwrap();
    assert!(r.error().is_some());
    assert!(r.message.contains("Please provide Name."));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_token_aborts_before_any_call() {
    let patches = Arc::new(ScriptedPatchGenerator::new([fill_both()]));
    let flow = flow_with(Arc::new(ContactSpec::new()), [], patches.clone());
    let mut session = flow.new_session();
    let token = RunCancellationToken::new();
    token.cancel();

    let err = flow
        .run_turn(&mut session, "Ann", &[], Some(&token))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Cancelled));
    assert_eq!(patches.calls(), 0);
}

/// Cancels the run from inside the call and never answers.
struct CancelsMidCall(RunCancellationToken);

#[async_trait]
impl PatchGenerator<Contact> for CancelsMidCall {
    async fn generate_patch(
        &self,
        _request: &PatchRequest<Contact>,
    ) -> Result<Patch, CollaboratorError> {
        self.0.cancel();
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_cancellation_during_generation_keeps_session() {
    let token = RunCancellationToken::new();
    let flow = FormFlow::new(
        Arc::new(ContactSpec::new()),
        Arc::new(ScriptedIntentClassifier::always(Intent::Edit)),
        Arc::new(CancelsMidCall(token.clone())),
        Arc::new(EchoDialogueGenerator),
    );
    let mut session = flow.new_session();
    let before = session.clone();

    let err = flow
        .run_turn(&mut session, "Ann", &[], Some(&token))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Cancelled));
    assert_eq!(session, before);
}

// ============================================================================
// Seed, checkpoint, hook, history window
// ============================================================================

#[tokio::test]
async fn test_seed_skips_zero_values() {
    let flow = FormFlow::local(Arc::new(ContactSpec::new()));
    let mut session = flow.new_session();

    let applied = flow.seed(&mut session, &contact("Ann", "")).unwrap();
    assert_eq!(applied, 1);
    assert_eq!(session.form_state, contact("Ann", ""));
    assert_eq!(session.phase, Phase::Collecting);

    assert_eq!(flow.seed(&mut session, &contact("Ann", "")).unwrap(), 0);
}

#[tokio::test]
async fn test_checkpoint_resume() {
    let patches = Arc::new(ScriptedPatchGenerator::new([
        Patch::new().with_op(Operation::replace("/email", "ann@example.com"))
    ]));
    let flow = flow_with(Arc::new(ContactSpec::new()), [], patches);
    let mut session = flow.new_session();
    flow.seed(&mut session, &contact("Ann", "")).unwrap();

    let checkpoint = flow.checkpoint(&session, Some("my name is Ann"));
    assert_eq!(checkpoint.missing.len(), 1);
    assert_eq!(checkpoint.missing[0].json_pointer, "/email");
    assert_eq!(checkpoint.last_user_text.as_deref(), Some("my name is Ann"));
    let bytes = checkpoint.to_json_bytes().unwrap();

    let (resumed, r) = flow
        .run_turn_with_checkpoint(&bytes, "ann@example.com", &[], None)
        .await
        .unwrap();
    assert_eq!(r.phase, Phase::Confirming);
    assert_eq!(resumed.form_state, contact("Ann", "ann@example.com"));
}

#[tokio::test]
async fn test_seed_outside_allow_list_changes_nothing() {
    let flow = FormFlow::local(Arc::new(ContactSpec::new()));
    let mut session = Session::new(
        Phase::Collecting,
        Contact::default(),
        ["/name"].into_iter().collect(),
    );

    let err = flow
        .seed(&mut session, &contact("Ann", "ann@example.com"))
        .unwrap_err();
    assert!(matches!(err, FlowError::Seed(_)));
    assert_eq!(session.form_state, Contact::default());
}

#[tokio::test]
async fn test_seed_refuses_closed_session() {
    let flow = FormFlow::local(Arc::new(ContactSpec::new()));
    let mut session = Session::new(
        Phase::Submitted,
        contact("Ann", ""),
        flow.allowed_paths().clone(),
    );

    let err = flow
        .seed(&mut session, &contact("Bea", "bea@example.com"))
        .unwrap_err();
    assert!(matches!(err, FlowError::ConversationClosed(Phase::Submitted)));
    assert_eq!(session.form_state, contact("Ann", ""));
}

#[tokio::test]
async fn test_paths_only_mode_defers_escape_errors_to_apply() {
    for (mode, expected) in [
        (ValidationMode::Strict, "operation 0:"),
        (ValidationMode::PathsOnly, "cannot be applied"),
    ] {
        let patches = Arc::new(ScriptedPatchGenerator::new([
            Patch::new().with_op(Operation::replace("/name~2", "Ann"))
        ]));
        let flow = flow_with(Arc::new(ContactSpec::new()), [], patches)
            .with_config(FormFlowConfig::default().with_validation_mode(mode));
        let mut session =
            Session::new(Phase::Collecting, Contact::default(), AllowedPaths::unrestricted());

        let r = flow.run_turn(&mut session, "Ann", &[], None).await.unwrap();
        let error = r.error().unwrap();
        assert!(error.contains(expected), "{mode:?}: {error}");
        assert_eq!(session.form_state, Contact::default());
    }
}

#[tokio::test]
async fn test_checkpoint_keeps_its_own_allow_list() {
    let patches = Arc::new(ScriptedPatchGenerator::new([
        Patch::new().with_op(Operation::replace("/email", "ann@example.com"))
    ]));
    let flow = flow_with(Arc::new(ContactSpec::new()), [], patches.clone());
    let narrowed = Session::new(
        Phase::Collecting,
        contact("Ann", ""),
        ["/name"].into_iter().collect(),
    );
    let bytes = flow.checkpoint(&narrowed, None).to_json_bytes().unwrap();

    let (resumed, r) = flow
        .run_turn_with_checkpoint(&bytes, "ann@example.com", &[], None)
        .await
        .unwrap();
    assert_eq!(patches.last_allowed_paths(), vec!["/name"]);
    assert!(r.error().unwrap().contains("/email"));
    assert_eq!(resumed.form_state, contact("Ann", ""));
}

#[tokio::test]
async fn test_checkpoint_without_allow_list_uses_flow_list() {
    let flow = flow_with(
        Arc::new(ContactSpec::new()),
        [],
        Arc::new(ScriptedPatchGenerator::default()),
    );
    let bare = Session::new(Phase::Collecting, Contact::default(), AllowedPaths::unrestricted());
    let bytes = bare.checkpoint().to_json_bytes().unwrap();

    let (resumed, _) = flow
        .run_turn_with_checkpoint(&bytes, "hi", &[], None)
        .await
        .unwrap();
    assert_eq!(&resumed.allowed_paths, flow.allowed_paths());
}

#[tokio::test]
async fn test_checkpoint_with_unknown_version_is_rejected() {
    let flow = FormFlow::local(Arc::new(ContactSpec::new()));
    let mut checkpoint = flow.checkpoint(&flow.new_session(), None);
    checkpoint.version = "9.9".into();
    let bytes = checkpoint.to_json_bytes().unwrap();

    let err = flow
        .run_turn_with_checkpoint(&bytes, "hi", &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Checkpoint(_)));
}

#[tokio::test]
async fn test_patch_hook_filters_operations() {
    let flow = flow_with(
        Arc::new(ContactSpec::new()),
        [],
        Arc::new(ScriptedPatchGenerator::new([fill_both()])),
    )
    .with_patch_hook(|_form: &Contact, ops: Vec<Operation>| {
        Ok(ops.into_iter().filter(|op| op.path != "/email").collect())
    });
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "Ann", &[], None).await.unwrap();
    assert_eq!(r.phase, Phase::Collecting);
    assert_eq!(session.form_state, contact("Ann", ""));
    assert_eq!(r.metadata.get(META_OPS).map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_patch_hook_failure_is_recovered() {
    let flow = flow_with(
        Arc::new(ContactSpec::new()),
        [],
        Arc::new(ScriptedPatchGenerator::new([fill_both()])),
    )
    .with_patch_hook(|_form: &Contact, _ops: Vec<Operation>| {
        Err(CollaboratorError::msg("patch_hook", "rejected"))
    });
    let mut session = flow.new_session();

    let r = flow.run_turn(&mut session, "Ann", &[], None).await.unwrap();
    assert!(r.error().unwrap().contains("patch_hook"));
    assert_eq!(session.form_state, Contact::default());
}

/// Records the history length it was handed.
struct HistoryProbe(std::sync::Mutex<Vec<usize>>);

#[async_trait]
impl IntentClassifier<Contact> for HistoryProbe {
    async fn classify(
        &self,
        request: &formflow_contract::IntentRequest<Contact>,
    ) -> Result<Intent, CollaboratorError> {
        self.0.lock().unwrap().push(request.history.len());
        Ok(Intent::DoNothing)
    }
}

#[tokio::test]
async fn test_history_window_bounds_context() {
    let probe = Arc::new(HistoryProbe(Default::default()));
    let flow = FormFlow::new(
        Arc::new(ContactSpec::new()),
        probe.clone(),
        Arc::new(ScriptedPatchGenerator::default()),
        Arc::new(EchoDialogueGenerator),
    )
    .with_config(FormFlowConfig::default().with_history_window(3));
    let history: Vec<_> = (0..8)
        .map(|i| formflow_contract::Message::user(format!("turn {i}")))
        .collect();
    let mut session = flow.new_session();

    flow.run_turn(&mut session, "hi", &history, None).await.unwrap();
    flow.run_turn(&mut session, "hi", &history[..1], None)
        .await
        .unwrap();

    assert_eq!(*probe.0.lock().unwrap(), vec![3, 1]);
}

// ============================================================================
// Streaming
// ============================================================================

/// Streams the phase and a prompt as separate chunks; optionally never ends.
struct Chunked {
    endless: bool,
}

#[async_trait]
impl DialogueGenerator<Contact> for Chunked {
    async fn generate_message(
        &self,
        _request: &DialogueRequest<Contact>,
    ) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::msg("chunked", "stream only"))
    }

    async fn generate_message_stream(
        &self,
        request: &DialogueRequest<Contact>,
    ) -> Result<MessageStream, CollaboratorError> {
        let chunks: Vec<Result<String, CollaboratorError>> =
            vec![Ok(format!("{} ", request.phase)), Ok("next?".to_string())];
        let stream: MessageStream = if self.endless {
            Box::pin(futures::stream::iter(chunks).chain(futures::stream::pending()))
        } else {
            Box::pin(futures::stream::iter(chunks))
        };
        Ok(stream)
    }
}

fn streaming_flow(
    patches: Arc<ScriptedPatchGenerator>,
    dialogue: Arc<dyn DialogueGenerator<Contact>>,
) -> FormFlow<ContactSpec> {
    FormFlow::new(
        Arc::new(ContactSpec::new()),
        Arc::new(ScriptedIntentClassifier::new([])),
        patches,
        dialogue,
    )
}

#[tokio::test]
async fn test_streamed_edit_commits_before_message() {
    let flow = streaming_flow(
        Arc::new(ScriptedPatchGenerator::new([fill_both()])),
        Arc::new(Chunked { endless: false }),
    );
    let mut session = flow.new_session();

    let turn = flow
        .run_turn_stream(&mut session, "Ann, ann@example.com", &[], None)
        .await
        .unwrap();
    assert_eq!(turn.phase, Phase::Confirming);
    assert_eq!(session.phase, Phase::Confirming);
    assert_eq!(turn.metadata.get(META_OPS).map(String::as_str), Some("2"));

    let chunks: Vec<String> = turn.messages.map(|chunk| chunk.unwrap()).collect().await;
    assert_eq!(chunks, ["confirming ", "next?"]);
}

#[tokio::test]
async fn test_streamed_command_is_one_chunk() {
    let flow = flow_with(
        Arc::new(ContactSpec::new()),
        [Intent::Cancel],
        Arc::new(ScriptedPatchGenerator::default()),
    );
    let mut session = flow.new_session();

    let turn = flow
        .run_turn_stream(&mut session, "stop", &[], None)
        .await
        .unwrap();
    assert!(turn.completed);
    let chunks: Vec<String> = turn.messages.map(|chunk| chunk.unwrap()).collect().await;
    assert_eq!(chunks, [flow.config().cancelled_message.clone()]);
    assert_eq!(session.phase, Phase::Cancelled);
}

#[tokio::test]
async fn test_streamed_recovery_leads_with_notice() {
    let patches = Arc::new(ScriptedPatchGenerator::new([
        Patch::new().with_op(Operation::add("/is_admin", true))
    ]));
    let flow = streaming_flow(patches, Arc::new(Chunked { endless: false }));
    let mut session = flow.new_session();

    let r = flow
        .run_turn_stream(&mut session, "make me admin", &[], None)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert!(r.error().unwrap().contains("/is_admin"));
    assert!(r.message.starts_with(&flow.config().fallback_message));
    assert!(r.message.ends_with("\ncollecting next?"));
    assert_eq!(session.form_state, Contact::default());
}

#[tokio::test]
async fn test_streamed_dialogue_failure_uses_rules() {
    let flow = streaming_flow(
        Arc::new(ScriptedPatchGenerator::new([fill_both()])),
        Arc::new(Failing("dialogue_generator")),
    );
    let mut session = flow.new_session();

    let r = flow
        .run_turn_stream(&mut session, "Ann, ann@example.com", &[], None)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(r.phase, Phase::Confirming);
    assert!(r.error().unwrap().contains("dialogue_generator"));
    assert!(r.message.contains("name=Ann, email=ann@example.com"));
    assert_eq!(session.form_state, contact("Ann", "ann@example.com"));
}

#[tokio::test]
async fn test_cancelling_stream_ends_it_with_error() {
    let flow = streaming_flow(
        Arc::new(ScriptedPatchGenerator::new([fill_both()])),
        Arc::new(Chunked { endless: true }),
    );
    let mut session = flow.new_session();
    let token = RunCancellationToken::new();

    let mut turn = flow
        .run_turn_stream(&mut session, "Ann, ann@example.com", &[], Some(&token))
        .await
        .unwrap();
    assert_eq!(turn.messages.next().await.unwrap().unwrap(), "confirming ");
    token.cancel();
    assert!(turn.messages.next().await.unwrap().is_err());
    assert!(turn.messages.next().await.is_none());
    assert_eq!(session.phase, Phase::Confirming);
}
