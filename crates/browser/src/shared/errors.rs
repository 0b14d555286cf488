use autoprompt_core::DomError;

/// Classify a CDP failure: a torn-down or navigating frame is a transient
/// context error, everything else is a script failure.
pub fn to_dom_error(e: impl std::fmt::Display, action: &str) -> DomError {
    let s = e.to_string();
    if s.contains("Cannot find context")
        || s.contains("Execution context was destroyed")
        || s.contains("Cannot find default execution context")
    {
        DomError::ContextUnavailable(format!("{} lost its context: {}", action, s))
    } else if s.contains("timeout") || s.contains("Timeout") {
        DomError::ContextUnavailable(format!("{} timed out: {}", action, s))
    } else {
        DomError::Script(format!("{} failed: {}", action, s))
    }
}
