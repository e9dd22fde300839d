//! The managed installer session: removals, then installs, then the
//! residual plan and the report

use chrono::Utc;
use mia_errors::Error;
use mia_events::{AppEvent, EventEmitter, InstallEvent, SessionEvent, SkipReason};
use mia_platform::{Platform, SelfServeSection, SleepAssertion};
use mia_types::{
    InstallInfo, InstallItem, Installer, ItemKind, ItemMeta, OperationResult, PlanEntry,
    PostAction, RemovalItem, SessionReport,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Instant;
use uuid::Uuid;

use crate::cache::{evict_payload, payload_still_needed};
use crate::installer::{InstallDispatcher, ItemOutcome};
use crate::log::OperationsLog;
use crate::prereqs::{matched_dependents, matched_skipped_prerequisites, SkippedItem};
use crate::report::{self, ITEMS_TO_INSTALL, ITEMS_TO_REMOVE};
use crate::uninstaller::UninstallDispatcher;
use crate::{plan, InstallConfig, SessionContext, SessionOutcome};

const SLEEP_REASON: &str = "managed software installation";

/// Per-list session state
#[derive(Debug, Default)]
struct ListState {
    restart_needed: bool,
    skipped: Vec<SkippedItem>,
    /// Plan row indices carried into the residual plan
    residual: BTreeSet<usize>,
    results: Vec<OperationResult>,
    cancelled: bool,
}

impl ListState {
    /// State whose skipped set starts with the list's unparsable rows
    fn seeded(skipped: Vec<SkippedItem>) -> Self {
        Self {
            skipped,
            ..Self::default()
        }
    }

    fn skip(&mut self, index: usize, item: SkippedItem) {
        self.skipped.push(item);
        self.residual.insert(index);
    }

    fn skipped_names(&self) -> Vec<String> {
        self.skipped.iter().map(|item| item.name.clone()).collect()
    }
}

/// Runs one managed installer session over the plan on disk
pub struct ManagedInstaller {
    platform: Platform,
    config: InstallConfig,
    log: OperationsLog,
}

impl ManagedInstaller {
    #[must_use]
    pub fn new(platform: Platform, config: InstallConfig) -> Self {
        let log = OperationsLog::new(&config.log_dir);
        Self {
            platform,
            config,
            log,
        }
    }

    #[must_use]
    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Process the plan's removals, then its installs
    ///
    /// Per-item failures are recorded in the results; the session keeps
    /// going. Cancellation is honoured between items.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Unreadable` when the plan exists but cannot be
    /// read.
    pub async fn run(&self, ctx: SessionContext) -> Result<SessionOutcome, Error> {
        let ctx = if ctx.session_id.is_empty() {
            ctx.with_session_id(Uuid::new_v4().to_string())
        } else {
            ctx
        };
        let _sleep = self.prevent_sleep(&ctx).await;

        let mode = if ctx.only_unattended {
            "unattended"
        } else {
            "managed"
        };
        self.log_session(&ctx, &format!("### Beginning {mode} installer session ###"))
            .await;

        let Some(mut info) = plan::load_plan(&self.config.install_info_path).await? else {
            if !ctx.only_unattended {
                self.log_session(
                    &ctx,
                    &format!("No {} found.", self.config.install_info_path.display()),
                )
                .await;
            }
            self.finish(&ctx, mode, &SessionReport::default()).await;
            return Ok(SessionOutcome::empty(ctx.session_id.clone()));
        };

        let mut report = match report::load_report(&self.config.report_path).await {
            Ok(report) => report,
            Err(e) => {
                ctx.emit_warning_with_context("could not read the session report", e.to_string());
                SessionReport::default()
            }
        };

        let outcome = self.process_plan(&ctx, &mut info, &mut report).await;

        match plan::save_plan(&self.config.install_info_path, &info).await {
            Ok(()) => ctx.emit(AppEvent::Session(SessionEvent::PlanSaved {
                path: self.config.install_info_path.clone(),
                installs_remaining: info.managed_installs.len(),
                removals_remaining: info.removals.len(),
            })),
            Err(e) => ctx.emit(AppEvent::Session(SessionEvent::PlanSaveFailed {
                path: self.config.install_info_path.clone(),
                error: e.to_string(),
            })),
        }

        self.finish(&ctx, mode, &report).await;
        ctx.emit(AppEvent::Session(SessionEvent::Completed {
            session_id: ctx.session_id.clone(),
            restart_needed: outcome.restart_needed(),
            installs_attempted: outcome.install_results.len(),
            removals_attempted: outcome.removal_results.len(),
        }));
        Ok(outcome)
    }

    async fn process_plan(
        &self,
        ctx: &SessionContext,
        info: &mut InstallInfo,
        report: &mut SessionReport,
    ) -> SessionOutcome {
        let removal_entries = info.removal_entries();
        let install_entries = info.install_entries();
        let removals = eligible(ctx, ItemKind::Removal, &removal_entries, |item: &RemovalItem| {
            item.installed
        });
        let installs = eligible(ctx, ItemKind::Install, &install_entries, |item: &InstallItem| {
            !item.installed
        });

        ctx.emit(AppEvent::Session(SessionEvent::Started {
            session_id: ctx.session_id.clone(),
            unattended: ctx.only_unattended,
            installs: installs.items.len(),
            removals: removals.items.len(),
        }));

        report::record_pending(report, ITEMS_TO_REMOVE, removals.raw_rows(&removal_entries));
        let mut removal_state = ListState::default();
        if !removals.items.is_empty() {
            self.log_session(ctx, "Processing removals").await;
            removal_state = self
                .process_removals(ctx, &removals.items, removals.invalid_skipped.clone())
                .await;
            info.removals = residual_rows(&info.removals, &removals.invalid, &removal_state);
        }

        let mut install_state = ListState::default();
        if ctx.stop_requested() {
            if !installs.items.is_empty() {
                ctx.emit(AppEvent::Session(SessionEvent::Cancelled {
                    kind: ItemKind::Install,
                    unprocessed: installs.items.len(),
                }));
            }
            install_state.cancelled = true;
        } else {
            report::record_pending(report, ITEMS_TO_INSTALL, installs.raw_rows(&install_entries));
            if !installs.items.is_empty() {
                self.log_session(ctx, "Processing installs").await;
                install_state = self
                    .process_installs(ctx, &installs.items, installs.invalid_skipped.clone())
                    .await;
                info.managed_installs =
                    residual_rows(&info.managed_installs, &installs.invalid, &install_state);
            }
        }

        plan::update_optional_installs(info, &install_state.results, &removal_state.results);
        for result in &removal_state.results {
            report.record(ItemKind::Removal, result.clone());
        }
        for result in &install_state.results {
            report.record(ItemKind::Install, result.clone());
        }

        let restart_needed = removal_state.restart_needed || install_state.restart_needed;
        SessionOutcome {
            session_id: ctx.session_id.clone(),
            post_action: if restart_needed {
                PostAction::Restart
            } else {
                PostAction::None
            },
            skipped_installs: install_state.skipped_names(),
            skipped_removals: removal_state.skipped_names(),
            cancelled: removal_state.cancelled || install_state.cancelled,
            install_results: install_state.results,
            removal_results: removal_state.results,
        }
    }

    async fn process_removals(
        &self,
        ctx: &SessionContext,
        items: &[(usize, RemovalItem)],
        invalid: Vec<SkippedItem>,
    ) -> ListState {
        let dispatcher = UninstallDispatcher::new(&self.platform, &self.config, ctx);
        let mut state = ListState::seeded(invalid);

        for (position, (index, item)) in items.iter().enumerate() {
            if let Some(reason) = self.unattended_gate(ctx, item.unattended, &item.meta).await {
                ctx.emit_item_skipped(ItemKind::Removal, &item.meta.name, reason);
                state.skip(*index, item.into());
                continue;
            }

            let dependents = matched_dependents(&item.meta, &state.skipped);
            if !dependents.is_empty() {
                ctx.emit_item_skipped(
                    ItemKind::Removal,
                    &item.meta.name,
                    SkipReason::Dependents { items: dependents },
                );
                state.skip(*index, item.into());
                continue;
            }

            if ctx.stop_requested() {
                cancel_rest(ctx, ItemKind::Removal, &items[position..], &mut state);
                break;
            }

            let started = Utc::now();
            let clock = Instant::now();
            let outcome = dispatcher.uninstall(item).await;

            if outcome.succeeded() {
                self.remove_from_self_serve(ctx, &item.meta, SelfServeSection::ManagedUninstalls)
                    .await;
            } else {
                state.skip(*index, item.into());
            }
            self.record(ctx, ItemKind::Removal, &item.meta, outcome, started, clock, &mut state)
                .await;
        }
        state
    }

    async fn process_installs(
        &self,
        ctx: &SessionContext,
        items: &[(usize, InstallItem)],
        invalid: Vec<SkippedItem>,
    ) -> ListState {
        let dispatcher = InstallDispatcher::new(&self.platform, &self.config, ctx);
        let mut state = ListState::seeded(invalid);

        for (position, (index, item)) in items.iter().enumerate() {
            if item.installer == Installer::StartOsInstall {
                ctx.emit_item_skipped(ItemKind::Install, &item.meta.name, SkipReason::Deferred);
                state.skip(*index, item.into());
                continue;
            }

            if let Some(reason) = self.unattended_gate(ctx, item.unattended, &item.meta).await {
                ctx.emit_item_skipped(ItemKind::Install, &item.meta.name, reason);
                state.skip(*index, item.into());
                continue;
            }

            let prerequisites = matched_skipped_prerequisites(&item.meta, &state.skipped);
            if !prerequisites.is_empty() {
                ctx.emit_item_skipped(
                    ItemKind::Install,
                    &item.meta.name,
                    SkipReason::Prerequisites {
                        items: prerequisites,
                    },
                );
                state.skip(*index, item.into());
                continue;
            }

            if ctx.stop_requested() {
                cancel_rest(ctx, ItemKind::Install, &items[position..], &mut state);
                break;
            }

            let started = Utc::now();
            let clock = Instant::now();
            let outcome = dispatcher.install(item).await;

            if outcome.succeeded() {
                if item.meta.on_demand {
                    self.remove_from_self_serve(
                        ctx,
                        &item.meta,
                        SelfServeSection::ManagedInstalls,
                    )
                    .await;
                }
            } else {
                state.skip(*index, item.into());
            }
            self.record(ctx, ItemKind::Install, &item.meta, outcome, started, clock, &mut state)
                .await;

            if outcome.succeeded() {
                let later = items[position + 1..]
                    .iter()
                    .map(|(_, later)| later.installer_item.as_deref());
                if !payload_still_needed(item, later, &state.skipped) {
                    self.evict(ctx, item).await;
                }
            }
        }
        state
    }

    /// Why an unattended session must leave the item for later
    async fn unattended_gate(
        &self,
        ctx: &SessionContext,
        unattended: bool,
        meta: &ItemMeta,
    ) -> Option<SkipReason> {
        if !ctx.only_unattended {
            return None;
        }
        if !unattended {
            return Some(SkipReason::NotUnattended);
        }
        if meta.blocking_applications.is_empty() {
            return None;
        }
        match self
            .platform
            .processes
            .running_blocking_apps(&meta.blocking_applications)
            .await
        {
            Ok(running) if running.is_empty() => None,
            Ok(running) => Some(SkipReason::BlockingApplications {
                applications: running,
            }),
            Err(e) => {
                ctx.emit_warning_with_context(
                    format!("could not check blocking applications for {}", meta.name),
                    e.to_string(),
                );
                Some(SkipReason::BlockingApplications {
                    applications: meta.blocking_applications.clone(),
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        ctx: &SessionContext,
        kind: ItemKind,
        meta: &ItemMeta,
        outcome: ItemOutcome,
        started: chrono::DateTime<Utc>,
        clock: Instant,
        state: &mut ListState,
    ) {
        let result = OperationResult {
            name: meta.name.clone(),
            display_name: meta.display().to_string(),
            version: meta.version().to_string(),
            status: outcome.status,
            time: started,
            duration_seconds: clock.elapsed().as_secs(),
            unattended: ctx.only_unattended,
        };
        if let Err(e) = self.log.record(&result.log_line(kind)).await {
            ctx.emit_warning_with_context("could not write the install log", e.to_string());
        }

        if outcome.restart_needed && !state.restart_needed {
            ctx.emit(AppEvent::Session(SessionEvent::RestartRequired {
                item: meta.name.clone(),
            }));
        }
        state.restart_needed |= outcome.restart_needed;
        state.results.push(result);
    }

    async fn evict(&self, ctx: &SessionContext, item: &InstallItem) {
        let Some(installer_item) = item.installer_item.as_deref() else {
            return;
        };
        match evict_payload(&self.config.cache_dir, installer_item).await {
            Ok(Some(path)) => ctx.emit(AppEvent::Install(InstallEvent::PayloadEvicted { path })),
            Ok(None) => {}
            Err(e) => ctx.emit_warning_with_context(
                format!("could not remove {installer_item} from the cache"),
                e.to_string(),
            ),
        }
    }

    async fn remove_from_self_serve(
        &self,
        ctx: &SessionContext,
        meta: &ItemMeta,
        section: SelfServeSection,
    ) {
        if let Err(e) = self
            .platform
            .self_serve
            .remove_from_section(&meta.name, section)
            .await
        {
            ctx.emit_warning_with_context(
                format!(
                    "could not remove {} from the self-serve {}",
                    meta.name,
                    section.key()
                ),
                e.to_string(),
            );
        }
    }

    async fn prevent_sleep(&self, ctx: &SessionContext) -> Option<SleepAssertion> {
        match self.platform.power.prevent_sleep(SLEEP_REASON).await {
            Ok(assertion) => Some(assertion),
            Err(e) => {
                ctx.emit_warning_with_context("could not prevent idle sleep", e.to_string());
                None
            }
        }
    }

    async fn log_session(&self, ctx: &SessionContext, line: &str) {
        ctx.emit_debug(line);
        if let Err(e) = self.log.session(line).await {
            ctx.emit_warning_with_context("could not write the session log", e.to_string());
        }
    }

    async fn finish(&self, ctx: &SessionContext, mode: &str, report: &SessionReport) {
        self.log_session(ctx, &format!("###    End {mode} installer session    ###"))
            .await;
        if let Err(e) = report::save_report(&self.config.report_path, report).await {
            ctx.emit_warning_with_context("could not save the session report", e.to_string());
        }
    }
}

/// Plan rows split into typed items to process and rows to carry over
struct Eligible<T> {
    /// `(row index, item)` in plan order
    items: Vec<(usize, T)>,
    /// Rows that could not be converted
    invalid: BTreeSet<usize>,
    /// Unparsable rows as the prerequisite gate sees them
    invalid_skipped: Vec<SkippedItem>,
}

impl<T> Eligible<T> {
    fn raw_rows(&self, entries: &[PlanEntry<T>]) -> Vec<Value> {
        self.items
            .iter()
            .map(|(index, _)| entries[*index].raw.clone())
            .collect()
    }
}

fn eligible<T: Clone>(
    ctx: &SessionContext,
    kind: ItemKind,
    entries: &[PlanEntry<T>],
    wanted: impl Fn(&T) -> bool,
) -> Eligible<T> {
    let mut items = Vec::new();
    let mut invalid = BTreeSet::new();
    let mut invalid_skipped = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match &entry.item {
            Ok(item) if wanted(item) => items.push((index, item.clone())),
            Ok(_) => {}
            Err(err) => {
                let name = entry
                    .raw
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("<unnamed>");
                ctx.emit_item_skipped(
                    kind,
                    name,
                    SkipReason::InvalidItem {
                        message: err.to_string(),
                    },
                );
                invalid.insert(index);
                invalid_skipped.extend(SkippedItem::from_row(&entry.raw));
            }
        }
    }
    Eligible {
        items,
        invalid,
        invalid_skipped,
    }
}

/// Leave every remaining item in the residual plan
fn cancel_rest<T>(
    ctx: &SessionContext,
    kind: ItemKind,
    rest: &[(usize, T)],
    state: &mut ListState,
) {
    ctx.emit(AppEvent::Session(SessionEvent::Cancelled {
        kind,
        unprocessed: rest.len(),
    }));
    state.residual.extend(rest.iter().map(|(index, _)| *index));
    state.cancelled = true;
}

/// Rows kept for the next session, in plan order
fn residual_rows(rows: &[Value], invalid: &BTreeSet<usize>, state: &ListState) -> Vec<Value> {
    rows.iter()
        .enumerate()
        .filter(|(index, _)| invalid.contains(index) || state.residual.contains(index))
        .map(|(_, row)| row.clone())
        .collect()
}
