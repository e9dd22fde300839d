//! Running-process inspection for blocking application checks

use async_trait::async_trait;
use mia_errors::PlatformError;

/// Lists the executable paths of running processes
#[async_trait]
pub trait ProcessInspector: Send + Sync {
    async fn running_processes(&self) -> Result<Vec<String>, PlatformError>;

    /// The subset of `apps` that are currently running
    async fn running_blocking_apps(&self, apps: &[String]) -> Result<Vec<String>, PlatformError> {
        if apps.is_empty() {
            return Ok(Vec::new());
        }
        let processes = self.running_processes().await?;
        Ok(apps
            .iter()
            .filter(|app| app_is_running(app, &processes))
            .cloned()
            .collect())
    }
}

/// Match an application name against a process list
///
/// Absolute names match a process path exactly. `Foo.app` matches any process
/// inside `Foo.app/Contents/MacOS/`. A bare name matches a process whose last
/// component is that name, or one inside `name.app`.
#[must_use]
pub fn app_is_running(app: &str, processes: &[String]) -> bool {
    if app.is_empty() {
        return false;
    }
    if app.starts_with('/') {
        return processes.iter().any(|process| process == app);
    }
    if app.ends_with(".app") {
        let marker = format!("/{app}/Contents/MacOS/");
        return processes.iter().any(|process| process.contains(&marker));
    }

    let suffix = format!("/{app}");
    if processes.iter().any(|process| process.ends_with(&suffix)) {
        return true;
    }
    let marker = format!("/{app}.app/Contents/MacOS/");
    processes.iter().any(|process| process.contains(&marker))
}
