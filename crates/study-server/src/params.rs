use std::collections::HashMap;

use study_core::ANONYMOUS_PARTICIPANT;
use study_session::ParticipantContext;

/// Survey platforms pass the participant id under different names.
const PARTICIPANT_KEYS: [&str; 4] = ["pid", "response_id", "ResponseID", "id"];
const ANTHROPOMORPHIC_KEYS: [&str; 2] = ["ant", "Anthropomorphic"];

/// Read the participant and condition from the query string a survey embeds
/// in the chat link. Flags are on only for the literal `"1"`.
pub fn participant_from_query(query: &HashMap<String, String>) -> ParticipantContext {
    let first_non_empty = |keys: &[&str]| {
        keys.iter()
            .filter_map(|key| query.get(*key))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(str::to_string)
    };

    ParticipantContext {
        participant_id: first_non_empty(&PARTICIPANT_KEYS)
            .unwrap_or_else(|| ANONYMOUS_PARTICIPANT.to_string()),
        question_id: first_non_empty(&["q"]).unwrap_or_default(),
        anthropomorphic: first_non_empty(&ANTHROPOMORPHIC_KEYS).as_deref() == Some("1"),
        correct: first_non_empty(&["cor"]).as_deref() == Some("1"),
    }
}
