//! Event handling and console feedback

use mia_events::{AppEvent, EventMessage, InstallEvent, SessionEvent, UninstallEvent};

use crate::logging::log_event_with_tracing;

/// Turns session events into tracing records and, outside JSON mode, short
/// status lines on stderr
pub struct EventHandler {
    json_mode: bool,
}

impl EventHandler {
    pub fn new(json_mode: bool) -> Self {
        Self { json_mode }
    }

    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if self.json_mode {
            return;
        }
        if let Some(line) = status_line(&message.event) {
            eprintln!("{line}");
        }
    }
}

fn status_line(event: &AppEvent) -> Option<String> {
    match event {
        AppEvent::Install(InstallEvent::Started { item, version, .. }) => {
            Some(format!("Installing {item} {version}"))
        }
        AppEvent::Install(InstallEvent::Failed { item, status, failure, .. }) => Some(format!(
            "Install of {item} failed ({status}): {}",
            failure.message
        )),
        AppEvent::Uninstall(UninstallEvent::Started { item, .. }) => {
            Some(format!("Removing {item}"))
        }
        AppEvent::Uninstall(UninstallEvent::Failed { item, status, failure, .. }) => Some(
            format!("Removal of {item} failed ({status}): {}", failure.message),
        ),
        AppEvent::Session(SessionEvent::ItemSkipped { item, reason, .. }) => {
            Some(format!("Skipping {item}: {reason:?}"))
        }
        AppEvent::Session(SessionEvent::RestartRequired { item }) => {
            Some(format!("{item} requires a restart"))
        }
        AppEvent::Session(SessionEvent::Cancelled { unprocessed, .. }) => {
            Some(format!("Cancelled; {unprocessed} items left for the next session"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mia_events::SkipReason;
    use mia_types::ItemKind;

    #[test]
    fn only_item_milestones_are_printed() {
        let started = AppEvent::Install(InstallEvent::Started {
            item: "Firefox".into(),
            version: "120.0".into(),
            installer_type: "pkg".into(),
        });
        assert_eq!(status_line(&started).as_deref(), Some("Installing Firefox 120.0"));

        let skipped = AppEvent::Session(SessionEvent::ItemSkipped {
            kind: ItemKind::Install,
            item: "Plugin".into(),
            reason: SkipReason::NotUnattended,
        });
        assert!(status_line(&skipped).is_some_and(|line| line.starts_with("Skipping Plugin")));

        let evicted = AppEvent::Install(InstallEvent::PayloadEvicted {
            path: "/tmp/Firefox.dmg".into(),
        });
        assert_eq!(status_line(&evicted), None);
    }
}
