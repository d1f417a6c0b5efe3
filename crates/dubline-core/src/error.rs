//! The pipeline-wide error taxonomy.
//!
//! Every component-level error (storage, bus, provider) classifies itself
//! once, at the point it's raised, into one of the variants below via
//! `From`. The dispatcher never re-classifies a foreign error — it only
//! asks `is_retryable()` / `is_terminal()`.

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The message or task state is malformed in a way no retry can fix.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced task, segment, or object does not exist. Terminal for
    /// this attempt, but the dispatcher requeues it rather than failing the
    /// task outright: the missing row or key may simply be an upstream
    /// write that hasn't landed yet.
    #[error("not found: {0}")]
    NotFound(String),

    /// A transient failure (network blip, 5xx, connection reset). Safe to
    /// retry with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// A vendor returned a well-formed, final error for this input. Retrying
    /// the same input will not help.
    #[error("vendor terminal error: {0}")]
    VendorTerminal(String),

    /// A stage exceeded its allotted processing deadline.
    #[error("deadline exceeded after {0:?}")]
    Deadline(std::time::Duration),

    /// Processing was cancelled cooperatively (shutdown, task abort).
    #[error("canceled")]
    Canceled,

    /// A bug: an illegal state transition or an invariant violation that
    /// should never happen given correct callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Transient(_) | PipelineError::Deadline(_) | PipelineError::NotFound(_)
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_retryable() && !matches!(self, PipelineError::Canceled)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Validation(format!("malformed json: {e}"))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Transient(format!("io error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_deadline_and_not_found_are_retryable() {
        assert!(PipelineError::Transient("x".into()).is_retryable());
        assert!(PipelineError::Deadline(std::time::Duration::from_secs(1)).is_retryable());
        assert!(PipelineError::NotFound("x".into()).is_retryable());
        assert!(!PipelineError::Validation("x".into()).is_retryable());
    }

    #[test]
    fn validation_and_vendor_terminal_are_terminal() {
        assert!(PipelineError::Validation("x".into()).is_terminal());
        assert!(PipelineError::VendorTerminal("x".into()).is_terminal());
        assert!(!PipelineError::NotFound("x".into()).is_terminal());
        assert!(!PipelineError::Transient("x".into()).is_terminal());
    }

    #[test]
    fn canceled_is_neither_retryable_nor_terminal() {
        let e = PipelineError::Canceled;
        assert!(!e.is_retryable());
        assert!(!e.is_terminal());
    }
}
