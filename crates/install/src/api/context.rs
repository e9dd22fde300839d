use mia_events::{EventEmitter, EventSender};
use tokio_util::sync::CancellationToken;

/// Session context shared by the orchestrator and both dispatchers
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// Only process items flagged for unattended install or removal
    pub only_unattended: bool,
    /// Checked at item boundaries
    pub cancel: CancellationToken,
    /// Correlation id for every event of the session; generated when empty
    pub session_id: String,

    /// Event sender for progress reporting
    pub event_sender: Option<EventSender>,
}

with_setters! {
    SessionContext {
        only_unattended: bool,
        cancel: CancellationToken,
        session_id: String,
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Managed-mode context with a fresh token and no event sink
    #[must_use]
    pub fn new() -> Self {
        Self {
            only_unattended: false,
            cancel: CancellationToken::new(),
            session_id: String::new(),
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl EventEmitter for SessionContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }

    fn correlation_id(&self) -> Option<&str> {
        (!self.session_id.is_empty()).then_some(self.session_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let cancel = CancellationToken::new();
        let ctx = SessionContext::new()
            .with_only_unattended(true)
            .with_cancel(cancel.clone())
            .with_session_id("abc".to_string());
        assert!(ctx.only_unattended);
        assert_eq!(ctx.correlation_id(), Some("abc"));
        assert!(!ctx.stop_requested());
        cancel.cancel();
        assert!(ctx.stop_requested());
    }

    #[test]
    fn empty_session_id_is_not_a_correlation_id() {
        assert_eq!(SessionContext::default().correlation_id(), None);
    }
}
