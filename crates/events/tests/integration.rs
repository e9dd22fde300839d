//! Integration tests for events

#[cfg(test)]
mod tests {
    use mia_events::*;
    use mia_types::ItemKind;

    #[tokio::test]
    async fn test_event_sender_emit() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.event,
            AppEvent::General(GeneralEvent::Error { .. })
        ));
        assert_eq!(first.meta.level, EventLevel::Error);
        assert_eq!(first.meta.source, EventSource::GENERAL);

        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second.event,
            AppEvent::General(GeneralEvent::DebugLog { .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        tx.emit_warning("ignored");
    }

    struct Session {
        tx: EventSender,
    }

    impl EventEmitter for Session {
        fn event_sender(&self) -> Option<&EventSender> {
            Some(&self.tx)
        }

        fn correlation_id(&self) -> Option<&str> {
            Some("session-1")
        }
    }

    #[tokio::test]
    async fn test_correlation_id_is_stamped() {
        let (tx, mut rx) = channel();
        let session = Session { tx };

        session.emit_item_skipped(
            ItemKind::Install,
            "Plugin",
            SkipReason::Prerequisites {
                items: vec!["Host".into()],
            },
        );

        let message = rx.recv().await.unwrap();
        assert_eq!(message.meta.correlation_id.as_deref(), Some("session-1"));
        assert_eq!(message.meta.source, EventSource::SESSION);
    }

    #[test]
    fn test_failed_items_log_at_error() {
        let event = AppEvent::Install(InstallEvent::Failed {
            item: "Foo".into(),
            version: "1.0".into(),
            status: -99,
            failure: FailureContext::new(None::<String>, "boom", None::<String>, false),
        });
        assert_eq!(event.log_level(), tracing::Level::ERROR);

        let warning = AppEvent::Uninstall(UninstallEvent::PostScriptFailed {
            item: "Foo".into(),
            code: 2,
        });
        assert_eq!(warning.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_skip_reason_serialization() {
        let json = serde_json::to_value(SkipReason::NotUnattended).unwrap();
        assert_eq!(json["reason"], "not_unattended");
    }
}
