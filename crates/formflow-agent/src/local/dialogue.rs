use crate::FormFlowConfig;
use async_trait::async_trait;
use formflow_contract::{CollaboratorError, DialogueGenerator, DialogueRequest, Phase};

/// Deterministic, phase-keyed messages.
///
/// While collecting, validation errors come first, then missing fields. By
/// default only the first open item is mentioned.
#[derive(Debug, Clone)]
pub struct RuleDialogueGenerator {
    pub merge_all_fields: bool,
    pub continue_message: String,
    pub confirm_prompt: String,
    pub submitted_message: String,
    pub cancelled_message: String,
}

impl Default for RuleDialogueGenerator {
    fn default() -> Self {
        Self::from_config(&FormFlowConfig::default())
    }
}

impl RuleDialogueGenerator {
    pub fn from_config(config: &FormFlowConfig) -> Self {
        Self {
            merge_all_fields: config.merge_all_fields,
            continue_message: "Please continue filling in the form.".to_string(),
            confirm_prompt:
                "All required information is complete. Reply \"confirm\" to submit or \"back\" to keep editing."
                    .to_string(),
            submitted_message: config.submitted_message.clone(),
            cancelled_message: config.cancelled_message.clone(),
        }
    }

    /// Render the message for a request.
    pub fn render<T>(&self, request: &DialogueRequest<T>) -> String {
        match request.phase {
            Phase::Collecting => self.render_collecting(request),
            Phase::Confirming => {
                if request.state_summary.is_empty() {
                    self.confirm_prompt.clone()
                } else {
                    format!("{}\n{}", request.state_summary, self.confirm_prompt)
                }
            }
            Phase::Submitted => self.submitted_message.clone(),
            Phase::Cancelled => self.cancelled_message.clone(),
        }
    }

    fn render_collecting<T>(&self, request: &DialogueRequest<T>) -> String {
        let issues = request
            .validation_errors
            .iter()
            .map(|e| format!("{}: {}", e.json_pointer, e.message));
        let missing = request.missing_fields.iter().map(|f| {
            if f.description.is_empty() {
                format!("Please provide {}.", f.display_name)
            } else {
                f.description.clone()
            }
        });

        let mut lines = issues.chain(missing);
        let text = if self.merge_all_fields {
            lines.collect::<Vec<_>>().join("\n")
        } else {
            lines.next().unwrap_or_default()
        };

        if text.is_empty() {
            self.continue_message.clone()
        } else {
            text
        }
    }
}

#[async_trait]
impl<T: Send + Sync> DialogueGenerator<T> for RuleDialogueGenerator {
    async fn generate_message(
        &self,
        request: &DialogueRequest<T>,
    ) -> Result<String, CollaboratorError> {
        Ok(self.render(request))
    }
}
