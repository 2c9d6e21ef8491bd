use async_trait::async_trait;
use formflow_contract::{CollaboratorError, FieldInfo, FormSpec, ValidationError};
use formflow_state::Schema;
use serde::{Deserialize, Serialize};

/// Expense claim collected by the demo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub amount: f64,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub payee: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default)]
pub struct InvoiceSpec;

fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

#[async_trait]
impl FormSpec for InvoiceSpec {
    type Form = Invoice;

    fn schema(&self) -> Option<Schema> {
        Some(Schema::object([
            ("title", Schema::Scalar),
            ("amount", Schema::Scalar),
            ("date", Schema::Scalar),
            ("category", Schema::Scalar),
            ("payee", Schema::Scalar),
            ("description", Schema::Scalar),
        ]))
    }

    fn field_guide(&self, json_pointer: &str) -> Option<String> {
        let guide = match json_pointer {
            "/title" => "claim title, e.g. the company or person being billed",
            "/amount" => "amount as a positive number",
            "/date" => "date formatted as YYYY-MM-DD",
            "/category" => "category such as travel or office supplies",
            "/payee" => "name of the person receiving the payment",
            "/description" => "free-form note, optional",
            _ => return None,
        };
        Some(guide.to_string())
    }

    fn missing_facts(&self, form: &Invoice) -> Vec<FieldInfo> {
        let mut missing = Vec::new();
        if form.title.is_empty() {
            missing.push(FieldInfo::required("/title", "title"));
        }
        if form.amount <= 0.0 {
            missing.push(FieldInfo::required("/amount", "amount"));
        }
        if form.date.is_empty() {
            missing.push(
                FieldInfo::required("/date", "date")
                    .with_description("Please provide the date (YYYY-MM-DD)."),
            );
        }
        if form.category.is_empty() {
            missing.push(FieldInfo::required("/category", "category"));
        }
        if form.payee.is_empty() {
            missing.push(FieldInfo::required("/payee", "payee"));
        }
        missing
    }

    fn validate_facts(&self, form: &Invoice) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if form.amount < 0.0 {
            errors.push(ValidationError::new("/amount", "amount must not be negative"));
        }
        if !form.date.is_empty() && !is_iso_date(&form.date) {
            errors.push(ValidationError::new("/date", "date must be formatted as YYYY-MM-DD"));
        }
        errors
    }

    fn summary(&self, form: &Invoice) -> String {
        format!(
            "Invoice summary:\ntitle: {}\namount: {:.2}\ndate: {}\ncategory: {}\npayee: {}\nnote: {}",
            form.title, form.amount, form.date, form.category, form.payee, form.description
        )
    }

    async fn submit(&self, form: &Invoice) -> Result<(), CollaboratorError> {
        tracing::info!(
            title = %form.title,
            amount = form.amount,
            payee = %form.payee,
            "invoice submitted"
        );
        Ok(())
    }
}
