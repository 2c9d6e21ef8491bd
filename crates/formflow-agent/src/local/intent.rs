use async_trait::async_trait;
use formflow_contract::{CollaboratorError, Intent, IntentClassifier, IntentRequest};

/// Exact keyword matcher for the three commands.
///
/// Input is trimmed and lower-cased before comparison; anything that is not
/// a keyword is [`Intent::DoNothing`].
#[derive(Debug, Clone)]
pub struct KeywordIntentClassifier {
    pub cancel_keywords: Vec<String>,
    pub confirm_keywords: Vec<String>,
    pub back_keywords: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for KeywordIntentClassifier {
    fn default() -> Self {
        Self {
            cancel_keywords: words(&["取消", "cancel", "退出", "quit", "exit", "停止", "stop"]),
            confirm_keywords: words(&[
                "确认", "confirm", "提交", "submit", "完成", "done", "好的", "ok", "好", "yes",
            ]),
            back_keywords: words(&["返回", "back", "修改", "上一步", "go back"]),
        }
    }
}

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a single utterance.
    pub fn classify_text(&self, input: &str) -> Intent {
        let normalized = input.trim().to_lowercase();
        if contains(&self.cancel_keywords, &normalized) {
            Intent::Cancel
        } else if contains(&self.confirm_keywords, &normalized) {
            Intent::Confirm
        } else if contains(&self.back_keywords, &normalized) {
            Intent::Back
        } else {
            Intent::DoNothing
        }
    }
}

fn contains(keywords: &[String], normalized: &str) -> bool {
    keywords.iter().any(|k| k == normalized)
}

#[async_trait]
impl<T: Send + Sync> IntentClassifier<T> for KeywordIntentClassifier {
    async fn classify(&self, request: &IntentRequest<T>) -> Result<Intent, CollaboratorError> {
        Ok(self.classify_text(&request.user_input))
    }
}
