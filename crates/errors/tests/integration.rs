//! Integration tests for error types

#[cfg(test)]
mod tests {
    use mia_errors::*;

    #[test]
    fn test_error_conversion() {
        let err: Error = InstallError::Cancelled.into();
        assert!(matches!(err, Error::Install(_)));

        let err: Error = ReceiptError::RebuildCancelled.into();
        assert!(matches!(err, Error::Receipt(_)));
    }

    #[test]
    fn test_install_status_codes() {
        let missing = InstallError::MissingPayload {
            item: "Firefox-120.dmg".into(),
            path: "/cache/Firefox-120.dmg".into(),
        };
        assert_eq!(missing.status_code(), codes::GENERIC_FAILURE);

        let backend = InstallError::BackendExitNonZero {
            backend: "installer".into(),
            code: 1,
        };
        assert_eq!(backend.status_code(), 1);

        let gate = InstallError::PreScriptFailed {
            item: "Foo".into(),
            code: 7,
        };
        assert_eq!(gate.status_code(), 7);
    }

    #[test]
    fn test_uninstall_status_codes() {
        assert_eq!(UninstallError::NoPackagesDeclared.status_code(), -2);
        assert_eq!(
            UninstallError::ReceiptDatabaseUnavailable {
                message: "locked".into()
            }
            .status_code(),
            -3
        );
        assert_eq!(
            UninstallError::PackageNotInDatabase {
                package: "com.example.foo".into()
            }
            .status_code(),
            -4
        );
        assert_eq!(UninstallError::Cancelled.status_code(), codes::CANCELLED);
        assert!(UninstallError::Cancelled.is_cancellation());
    }

    #[test]
    fn test_retired_and_unsupported_messages_differ() {
        let retired = InstallError::RetiredInstallerType {
            installer_type: "appdmg".into(),
        };
        let unknown = InstallError::UnsupportedInstallerType {
            installer_type: "flatpak".into(),
        };
        assert!(retired.to_string().contains("no longer supported"));
        assert!(unknown.to_string().starts_with("unsupported installer type"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(err.is_not_found());
        assert_eq!(err.user_code(), Some("error.io"));
    }
}
