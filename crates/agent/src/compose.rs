//! Folds matched parameters into the utterance the tool loop sees.

use actionwire_core::alias::Alias;

const PARAMETERS_HEADER: &str = "--- Relevant Parameters ---";

/// Append a `name = value` block for `relevant`, in the order given.
/// With nothing relevant the utterance is returned unchanged.
pub fn compose(utterance: &str, relevant: &[Alias]) -> String {
    if relevant.is_empty() {
        return utterance.to_string();
    }
    let block = relevant
        .iter()
        .map(|a| format!("{} = {}", a.name, a.value))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{utterance}\n\n{PARAMETERS_HEADER}\n{block}")
}
