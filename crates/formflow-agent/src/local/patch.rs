use async_trait::async_trait;
use formflow_contract::{CollaboratorError, PatchGenerator, PatchRequest};
use formflow_state::{
    escape_segment, Operation, Patch, Pointer, Value, ARRAY_WILDCARD, MAP_WILDCARD,
};

const SEPARATORS: [char; 5] = ['\n', ',', ';', '，', '；'];

/// Extracts `field: value` / `field = value` pairs from free text.
///
/// Pairs are separated by `,`, `;`, newlines or their full-width forms. A
/// separator only ends a value when the next fragment is itself a pair, so
/// `note: bolts, nuts` keeps both words. A field name matches a concrete
/// allowed pointer by its last segment, or a missing field by pointer
/// segment or display name (case-insensitive, spaces and `-` treated as
/// `_`). Values are parsed as JSON when possible, then as a number with `,`
/// digit grouping, and kept as strings otherwise. Unmatched pairs are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct KeyValuePatchGenerator;

impl KeyValuePatchGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Build the operations for one request.
    pub fn extract<T>(&self, request: &PatchRequest<T>) -> Vec<Operation> {
        let candidates = candidates(request);
        pairs(&request.user_input)
            .into_iter()
            .filter_map(|(key, raw)| {
                let raw = raw.trim();
                if raw.is_empty() {
                    return None;
                }
                let path = resolve_field(&candidates, request.allowed_paths.is_empty(), key)?;
                Some(
                    Operation::replace(path, parse_value(raw))
                        .with_description(format!("from \"{key}\"")),
                )
            })
            .collect()
    }
}

#[async_trait]
impl<T: Send + Sync> PatchGenerator<T> for KeyValuePatchGenerator {
    async fn generate_patch(&self, request: &PatchRequest<T>) -> Result<Patch, CollaboratorError> {
        Ok(Patch::with_ops(self.extract(request)))
    }
}

/// `(normalized name, pointer)` pairs a field name may resolve to.
fn candidates<T>(request: &PatchRequest<T>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for field in &request.missing_fields {
        out.push((normalize(&field.display_name), field.json_pointer.clone()));
        if let Some(last) = last_segment(&field.json_pointer) {
            out.push((normalize(&last), field.json_pointer.clone()));
        }
    }
    for path in &request.allowed_paths {
        let concrete = path
            .split('/')
            .all(|seg| seg != ARRAY_WILDCARD && seg != MAP_WILDCARD);
        if !concrete {
            continue;
        }
        if let Some(last) = last_segment(path) {
            out.push((normalize(&last), path.clone()));
        }
    }
    out
}

fn resolve_field(candidates: &[(String, String)], unrestricted: bool, key: &str) -> Option<String> {
    let wanted = normalize(key);
    if wanted.is_empty() {
        return None;
    }
    candidates
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, path)| path.clone())
        .or_else(|| unrestricted.then(|| format!("/{}", escape_segment(&wanted))))
}

/// Split input into `(key, raw value)` pairs. Fragments that are not pairs
/// are glued back onto the preceding value together with their separator.
fn pairs(input: &str) -> Vec<(&str, String)> {
    let mut out: Vec<(&str, String)> = Vec::new();
    let mut separator = "";
    for piece in input.split_inclusive(SEPARATORS) {
        let fragment = piece.trim_end_matches(SEPARATORS);
        match split_pair(fragment) {
            Some((key, value)) => out.push((key, value.to_string())),
            None => {
                if let Some((_, value)) = out.last_mut() {
                    value.push_str(separator);
                    value.push_str(fragment);
                }
            }
        }
        separator = &piece[fragment.len()..];
    }
    out
}

fn split_pair(fragment: &str) -> Option<(&str, &str)> {
    let (key, value) = fragment.split_once([':', '=', '：'])?;
    let key = key.trim();
    (!key.is_empty()).then_some((key, value))
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw)
        .ok()
        .or_else(|| parse_grouped_number(raw))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// `1,200` or `-12,345.5`.
fn parse_grouped_number(raw: &str) -> Option<Value> {
    let (int_part, _) = raw.split_once('.').unwrap_or((raw, ""));
    let digits = int_part.strip_prefix('-').unwrap_or(int_part);
    let groups: Vec<&str> = digits.split(',').collect();
    let well_formed = groups.len() > 1
        && (1..=3).contains(&groups[0].len())
        && groups[1..].iter().all(|g| g.len() == 3)
        && groups.iter().all(|g| g.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return None;
    }
    serde_json::from_str(&raw.replace(',', "")).ok()
}

fn last_segment(pointer: &str) -> Option<String> {
    Pointer::parse(pointer).ok()?.last().map(str::to_string)
}

fn normalize(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}
