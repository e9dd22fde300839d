//! Embedded script gating shared by both dispatchers

use mia_events::EventEmitter;
use mia_platform::ScriptRunner;
use mia_types::EmbeddedScript;
use std::path::Path;

use crate::SessionContext;

/// Exit code recorded when a script could not be started at all
pub(crate) const SCRIPT_NOT_RUN: i32 = -1;

/// Run an embedded script and return its exit code
pub(crate) async fn run_embedded(
    scripts: &dyn ScriptRunner,
    ctx: &SessionContext,
    item_name: &str,
    script: &EmbeddedScript,
) -> i32 {
    match scripts.run_embedded(item_name, script).await {
        Ok(code) => code,
        Err(e) => {
            ctx.emit_error_with_details(
                format!("could not run {} for {item_name}", script.kind.label()),
                e.to_string(),
            );
            SCRIPT_NOT_RUN
        }
    }
}

/// Run an executable on disk and return its exit code
pub(crate) async fn run_executable(
    scripts: &dyn ScriptRunner,
    ctx: &SessionContext,
    item_name: &str,
    path: &Path,
) -> i32 {
    match scripts.run_executable(item_name, path).await {
        Ok(code) => code,
        Err(e) => {
            ctx.emit_error_with_details(
                format!("could not run {} for {item_name}", path.display()),
                e.to_string(),
            );
            SCRIPT_NOT_RUN
        }
    }
}
