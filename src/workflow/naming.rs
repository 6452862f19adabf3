use super::Workflow;
use crate::block::{BlockKind, VariableKind};
use crate::slot::SlotKind;
use ahash::AHashSet;

const PYTHON_KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Members of the generated class and its workflow base class. Block attributes must
/// not shadow them.
const RESERVED_MEMBERS: [&str; 14] = [
    "metadata",
    "set",
    "get",
    "solve",
    "solveStep",
    "terminate",
    "getCriticalTimeStep",
    "initialize",
    "getMetadata",
    "setMetadata",
    "updateMetadata",
    "printMetadata",
    "getApplicationSignature",
    "getAPIVersion",
];

/// Turns a user-chosen name into a valid identifier, or `None` if nothing usable is left
/// or the result is a keyword.
pub fn sanitize_identifier(name: &str) -> Option<String> {
    let mut ident: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.chars().all(|c| c == '_') {
        return None;
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if PYTHON_KEYWORDS.contains(&ident.as_str()) {
        return None;
    }
    Some(ident)
}

fn next_free(prefix: &str, taken: &AHashSet<String>) -> String {
    (1..)
        .map(|k| format!("{}{}", prefix, k))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| prefix.to_string())
}

impl Workflow {
    /// Identifiers currently held by blocks and slots.
    pub fn code_names(&self) -> AHashSet<String> {
        self.blocks
            .values()
            .filter_map(|b| b.code_name.clone())
            .chain(self.slots.values().filter_map(|s| s.code_name.clone()))
            .collect()
    }

    /// Gives every block and every external slot a unique identifier.
    ///
    /// Identifiers already assigned are kept. A custom-name variable takes its user
    /// name whenever that name is free.
    pub fn assign_code_names(&mut self) {
        let mut taken = self.code_names();
        taken.extend(RESERVED_MEMBERS.iter().map(|m| m.to_string()));

        for id in self.blocks_in_tree_order() {
            let Some(block) = self.blocks.get(&id) else {
                continue;
            };
            let preferred = match &block.kind {
                BlockKind::Variable(VariableKind::CustomName { name, .. }) => {
                    sanitize_identifier(name)
                }
                _ => None,
            };
            let current = block.code_name.clone();
            let prefix = block.kind.code_prefix();

            let assigned = match (preferred, current) {
                (Some(preferred), current) if current.as_deref() == Some(preferred.as_str()) => {
                    preferred
                }
                (Some(preferred), current) if !taken.contains(&preferred) => {
                    if let Some(old) = current {
                        taken.remove(&old);
                    }
                    preferred
                }
                (_, Some(current)) => current,
                (_, None) => next_free(prefix, &taken),
            };
            if block.code_name.as_deref() != Some(assigned.as_str()) {
                tracing::debug!("block '{}' is now known as '{}'", block.name, assigned);
            }
            taken.insert(assigned.clone());
            if let Some(block) = self.blocks.get_mut(&id) {
                block.code_name = Some(assigned);
            }
        }

        for id in self.slots_in_tree_order() {
            let Some(slot) = self.slots.get(&id) else {
                continue;
            };
            if slot.code_name.is_some() {
                continue;
            }
            let prefix = match slot.kind {
                SlotKind::ExternalOutput => "external_input_",
                SlotKind::ExternalInput => "external_output_",
                _ => continue,
            };
            let assigned = next_free(prefix, &taken);
            tracing::debug!("slot '{}' is now known as '{}'", slot.name, assigned);
            taken.insert(assigned.clone());
            if let Some(slot) = self.slots.get_mut(&id) {
                slot.code_name = Some(assigned);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_user_names() {
        assert_eq!(sanitize_identifier("heat flux"), Some("heat_flux".to_string()));
        assert_eq!(sanitize_identifier("2nd"), Some("_2nd".to_string()));
        assert_eq!(sanitize_identifier(" - "), None);
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(sanitize_identifier("class"), None);
        assert_eq!(sanitize_identifier("None"), None);
        assert_eq!(sanitize_identifier("classes"), Some("classes".to_string()));
    }

    #[test]
    fn picks_smallest_free_counter() {
        let taken: AHashSet<String> = ["model_1", "model_3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(next_free("model_", &taken), "model_2");
    }
}
