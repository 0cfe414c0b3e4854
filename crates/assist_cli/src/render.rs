use assist_session::{
    ConnectionState, ExecutionResult, SessionState, StateChange, Suggestion, SuggestionKind,
};

/// Text to print for a state notification. Code changes are not echoed.
pub fn describe_change(change: StateChange, state: &SessionState) -> Option<String> {
    match change {
        StateChange::Code => None,
        StateChange::Connection => {
            let status = &state.connection;
            Some(match (&status.last_error, status.state) {
                (Some(error), ConnectionState::Reconnecting | ConnectionState::Disconnected) => {
                    format!("[stream] {} ({error})", status.state)
                }
                _ => format!("[stream] {}", status.state),
            })
        }
        StateChange::SuggestionAppended => state
            .suggestions
            .last()
            .map(|suggestion| describe_suggestion(state.suggestions.len(), suggestion)),
        StateChange::ExecutionResult => state.last_execution.as_ref().map(describe_execution),
    }
}

pub fn describe_suggestion(number: usize, suggestion: &Suggestion) -> String {
    let label = match suggestion.kind {
        SuggestionKind::Explanation => "explanation",
        SuggestionKind::Recommendation => "suggestion",
        SuggestionKind::Error => "error",
    };
    format!("[{number}] {label}: {}", suggestion.content)
}

pub fn describe_execution(result: &ExecutionResult) -> String {
    let mut out = format!("[run] {}", result.status.as_str());
    if let Some(seconds) = result.execution_time_seconds {
        out.push_str(&format!(" in {seconds:.2}s"));
    }
    if let Some(output) = result.output.as_deref().filter(|output| !output.is_empty()) {
        out.push('\n');
        out.push_str(output.trim_end_matches('\n'));
    }
    if let Some(error) = &result.error {
        out.push('\n');
        out.push_str(error);
    }
    out
}
