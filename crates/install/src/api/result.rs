use mia_types::{OperationResult, PostAction};

/// What a session did
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub post_action: PostAction,
    pub install_results: Vec<OperationResult>,
    pub removal_results: Vec<OperationResult>,
    /// Names left in the residual plan
    pub skipped_installs: Vec<String>,
    pub skipped_removals: Vec<String>,
    /// Cancellation stopped the session early
    pub cancelled: bool,
}

impl SessionOutcome {
    /// Outcome of a session that found no plan
    #[must_use]
    pub fn empty(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            post_action: PostAction::None,
            install_results: Vec::new(),
            removal_results: Vec::new(),
            skipped_installs: Vec::new(),
            skipped_removals: Vec::new(),
            cancelled: false,
        }
    }

    #[must_use]
    pub fn restart_needed(&self) -> bool {
        self.post_action == PostAction::Restart
    }

    /// Process exit code for the session
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.post_action.exit_code()
    }

    /// Results with a non-zero status
    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.install_results
            .iter()
            .chain(self.removal_results.iter())
            .filter(|result| !result.succeeded())
    }
}
