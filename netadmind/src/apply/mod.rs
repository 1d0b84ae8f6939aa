//! Replays the change log against live files and commits the result.
//!
//! A unit is the DHCP file or one zone file. Each unit is read once, folded,
//! guarded against concurrent rewrites, staged in a temp file and installed
//! with a privileged copy. Only the changes of committed units leave the log.
//!
//! Applies, zone creation and service control are serialized by one lock, so
//! two requests never replay the same pending change.

pub mod commit;
pub mod dhcp;
pub mod dns;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::Local;
use serde::Serialize;
use shared::types::DnsChange;
use crate::changelog::{ChangeLog, Staged};
use crate::config::Config;
use crate::error::ApplyError;
use crate::privileged::{Credential, PrivilegedRunner};
use crate::reader::read_text;
use crate::services::ServiceAction;
use self::commit::{chown_argv, content_digest, ensure_unchanged, install, run_checked};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpApplyOutcome {
    pub success: bool,
    pub message: String,
    /// Text as read before folding
    #[serde(skip_serializing)]
    pub original: String,
    /// Text as written, or as it would have been
    #[serde(skip_serializing)]
    pub updated: String,
    /// Changes removed from the log
    pub applied: usize,
    /// Edits and deletes among them that named no host
    pub unmatched: usize,
    pub reloaded: bool,
}

impl DhcpApplyOutcome {
    fn failed(message: String, original: String, updated: String) -> Self {
        Self {
            success: false,
            message,
            original,
            updated,
            applied: 0,
            unmatched: 0,
            reloaded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneApplyResult {
    pub zone: String,
    pub status: UnitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of applying both families. A family with nothing pending is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub dhcp: Option<DhcpApplyOutcome>,
    pub dns: Option<Vec<ZoneApplyResult>>,
}

impl ApplySummary {
    /// Units attempted: the DHCP file plus each zone
    pub fn units(&self) -> usize {
        usize::from(self.dhcp.is_some()) + self.dns.as_ref().map_or(0, Vec::len)
    }

    /// Units that did not commit
    pub fn failed_units(&self) -> usize {
        let dhcp = self.dhcp.iter().filter(|d| !d.success).count();
        let dns = self
            .dns
            .iter()
            .flatten()
            .filter(|z| z.status == UnitStatus::Failed)
            .count();
        dhcp + dns
    }

    /// Why the apply counts as failed, or `None` when every unit committed
    pub fn failure_message(&self) -> Option<String> {
        match self.failed_units() {
            0 => None,
            n if n == self.units() => Some("No changes could be applied".to_string()),
            n => Some(format!("{} of {} unit(s) failed to apply", n, self.units())),
        }
    }
}

pub struct ApplyEngine<R> {
    config: Arc<Config>,
    log: Arc<ChangeLog>,
    runner: R,
    apply_lock: tokio::sync::Mutex<()>,
}

impl<R: PrivilegedRunner> ApplyEngine<R> {
    pub fn new(config: Arc<Config>, log: Arc<ChangeLog>, runner: R) -> Self {
        Self {
            config,
            log,
            runner,
            apply_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Apply whichever families have pending changes
    pub async fn apply_all(&self, credential: &Credential) -> ApplySummary {
        let _guard = self.apply_lock.lock().await;
        let mut summary = ApplySummary::default();
        if self.log.dhcp_len() > 0 {
            summary.dhcp = Some(self.apply_dhcp_inner(credential).await);
        }
        if self.log.dns_len() > 0 {
            summary.dns = Some(self.apply_dns_inner(credential).await);
        }
        summary
    }

    /// Fold every pending DHCP change into the config file and install it.
    ///
    /// With nothing pending this only reads the file and makes no privileged
    /// call. The DHCP changes leave the log once the copy succeeds; a failed
    /// reload after that is reported but not rolled back.
    pub async fn apply_dhcp(&self, credential: &Credential) -> DhcpApplyOutcome {
        let _guard = self.apply_lock.lock().await;
        self.apply_dhcp_inner(credential).await
    }

    async fn apply_dhcp_inner(&self, credential: &Credential) -> DhcpApplyOutcome {
        let path = &self.config.paths.dhcp_conf;
        let pending = self.log.drain_dhcp();

        if pending.is_empty() {
            let original = read_text(path).unwrap_or_default();
            return DhcpApplyOutcome {
                success: true,
                message: "No pending DHCP changes".to_string(),
                updated: original.clone(),
                original,
                applied: 0,
                unmatched: 0,
                reloaded: false,
            };
        }

        tracing::info!("Applying {} DHCP change(s) to {}", pending.len(), path.display());

        let original = match read_text(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("DHCP apply aborted: {}", e);
                return DhcpApplyOutcome::failed(e.to_string(), String::new(), String::new());
            }
        };
        let dhcp::Folded { text: updated, unmatched } =
            dhcp::fold_changes(&original, pending.iter().map(|s| &s.change));

        if let Err(e) = self.commit(path, &original, &updated, credential).await {
            tracing::error!("DHCP apply failed: {}", e);
            return DhcpApplyOutcome::failed(e.to_string(), original, updated);
        }

        let seqs: Vec<u64> = pending.iter().map(|s| s.seq).collect();
        let applied = self.log.clear_applied_dhcp(&seqs);

        let services = &self.config.services;
        let reload = run_checked(
            &self.runner,
            services.reload_argv(&services.dhcp_service),
            credential,
        )
        .await;

        let mut message = format!("Applied {} DHCP change(s)", applied);
        if unmatched > 0 {
            message.push_str(&format!(" ({} matched no host)", unmatched));
        }
        let reloaded = match reload {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("DHCP config written but reload failed: {}", e);
                message.push_str(&format!(", but reload failed: {}", e));
                false
            }
        };
        tracing::info!("{}", message);

        DhcpApplyOutcome {
            success: true,
            message,
            original,
            updated,
            applied,
            unmatched,
            reloaded,
        }
    }

    /// Apply pending DNS changes zone by zone, in the order zones first
    /// appear in the log.
    ///
    /// A failing zone keeps its changes and does not stop the others. The DNS
    /// service is reloaded once if any zone was written.
    pub async fn apply_dns(&self, credential: &Credential) -> Vec<ZoneApplyResult> {
        let _guard = self.apply_lock.lock().await;
        self.apply_dns_inner(credential).await
    }

    async fn apply_dns_inner(&self, credential: &Credential) -> Vec<ZoneApplyResult> {
        let pending = self.log.drain_dns();
        if pending.is_empty() {
            return Vec::new();
        }

        let groups = group_by_zone(pending);
        tracing::info!("Applying DNS changes to {} zone(s)", groups.len());

        let mut results = Vec::with_capacity(groups.len());
        let mut committed = Vec::new();
        for (zone, changes) in groups {
            match self.apply_zone(&zone, &changes, credential).await {
                Ok(()) => {
                    committed.extend(changes.iter().map(|s| s.seq));
                    results.push(ZoneApplyResult {
                        zone,
                        status: UnitStatus::Ok,
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::error!("Zone {} failed: {}", zone, e);
                    results.push(ZoneApplyResult {
                        zone,
                        status: UnitStatus::Failed,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if committed.is_empty() {
            return results;
        }

        self.log.clear_applied_dns(&committed);

        let services = &self.config.services;
        if let Err(e) = run_checked(
            &self.runner,
            services.reload_argv(&services.dns_service),
            credential,
        )
        .await
        {
            tracing::warn!("Zones written but DNS reload failed: {}", e);
            for result in results.iter_mut().filter(|r| r.status == UnitStatus::Ok) {
                result.error = Some(format!("Written, but reload failed: {}", e));
            }
        }

        results
    }

    async fn apply_zone(
        &self,
        zone: &str,
        changes: &[Staged<DnsChange>],
        credential: &Credential,
    ) -> Result<(), ApplyError> {
        let path = self.config.paths.zone_file(zone);
        let original = read_text(&path)?;
        let folded = dns::fold_changes(&original, changes.iter().map(|s| &s.change));
        let updated = dns::bump_serial(&folded, &Local::now());

        self.commit(&path, &original, &updated, credential).await?;
        self.chown_zone(&path, credential).await;
        tracing::info!("Zone {} updated with {} change(s)", zone, changes.len());
        Ok(())
    }

    /// Write a fresh zone file. Refuses to replace one that already exists.
    pub async fn create_zone(
        &self,
        name: &str,
        soa_ns: &str,
        soa_email: &str,
        ttl: u32,
        credential: &Credential,
    ) -> Result<PathBuf, ApplyError> {
        let _guard = self.apply_lock.lock().await;
        let path = self.config.paths.zone_file(name);
        if path.exists() {
            return Err(ApplyError::ZoneExists { path });
        }

        let text = dns::render_zone(soa_ns, soa_email, ttl, &Local::now());
        install(&self.runner, &self.config.paths.temp_dir, &path, &text, credential).await?;
        self.chown_zone(&path, credential).await;
        tracing::info!("Created zone {} at {}", name, path.display());
        Ok(path)
    }

    /// Run `action` on one managed service and return its output
    pub async fn control_service(
        &self,
        service: &str,
        action: ServiceAction,
        credential: &Credential,
    ) -> Result<String, ApplyError> {
        let _guard = self.apply_lock.lock().await;
        let argv = self.config.services.control_argv(action.as_str(), service);
        let output = run_checked(&self.runner, argv, credential).await?;
        tracing::info!("Service {} {} done", service, action);
        Ok(output)
    }

    async fn commit(
        &self,
        path: &Path,
        original: &str,
        updated: &str,
        credential: &Credential,
    ) -> Result<(), ApplyError> {
        ensure_unchanged(path, &content_digest(original))?;
        install(&self.runner, &self.config.paths.temp_dir, path, updated, credential).await
    }

    /// The copy already landed, so a failed chown is only logged
    async fn chown_zone(&self, path: &Path, credential: &Credential) {
        let argv = chown_argv(&self.config.services.zone_owner, path);
        if let Err(e) = run_checked(&self.runner, argv, credential).await {
            tracing::warn!("Failed to set owner of {}: {}", path.display(), e);
        }
    }
}

fn group_by_zone(pending: Vec<Staged<DnsChange>>) -> Vec<(String, Vec<Staged<DnsChange>>)> {
    let mut groups: Vec<(String, Vec<Staged<DnsChange>>)> = Vec::new();
    for staged in pending {
        match groups.iter_mut().find(|(zone, _)| *zone == staged.change.zone) {
            Some((_, changes)) => changes.push(staged),
            None => groups.push((staged.change.zone.clone(), vec![staged])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use shared::types::{DhcpChange, RecordType};
    use crate::config::PathsConfig;
    use crate::privileged::CommandOutcome;
    use crate::reader::dhcp::parse_dhcp_config;
    use crate::reader::dns::parse_zone_records;
    use crate::reader::matchers;

    type Hook = Box<dyn FnOnce() + Send>;

    /// Records every argv and performs `cp` locally. Commands whose argv
    /// mentions `fail_on` report failure. With `yield_after_copy` set, a copy
    /// hands control back to the executor before it reports.
    #[derive(Default)]
    struct FakeRunner {
        calls: Mutex<Vec<Vec<String>>>,
        fail_on: Mutex<Vec<String>>,
        on_copy: Mutex<Option<Hook>>,
        yield_after_copy: bool,
    }

    impl FakeRunner {
        fn failing(pattern: &str) -> Self {
            let runner = Self::default();
            runner.fail_on.lock().unwrap().push(pattern.to_string());
            runner
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        fn programs(&self) -> Vec<String> {
            self.calls().into_iter().map(|argv| argv[0].clone()).collect()
        }
    }

    impl PrivilegedRunner for FakeRunner {
        async fn run(&self, argv: &[String], _credential: &Credential) -> CommandOutcome {
            self.calls.lock().unwrap().push(argv.to_vec());

            let fails = self
                .fail_on
                .lock()
                .unwrap()
                .iter()
                .any(|p| argv.iter().any(|a| a.contains(p.as_str())));
            if fails {
                return CommandOutcome::failed("permission denied");
            }

            if argv[0] == "cp" {
                if let Some(hook) = self.on_copy.lock().unwrap().take() {
                    hook();
                }
                if let Err(e) = std::fs::copy(&argv[1], &argv[2]) {
                    return CommandOutcome::failed(e.to_string());
                }
                if self.yield_after_copy {
                    for _ in 0..8 {
                        tokio::task::yield_now().await;
                    }
                }
            }
            CommandOutcome::succeeded("")
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    const DHCPD: &str = "option domain-name \"lan.example\";

host nas {
    hardware ethernet aa:bb:cc:dd:ee:ff;
    fixed-address 10.0.0.5;
}

host tv {
    hardware ethernet 11:22:33:44:55:66;
    fixed-address 10.0.0.6;
}
";

    const ZONE: &str = "$TTL 86400
@   IN  SOA ns1.example.com. admin.example.com. (
            2024010101  ; Serial
            3600        ; Refresh
        )
@       IN  NS  ns1.example.com.
ns1     IN  A   10.0.0.1
";

    struct Fixture {
        dir: tempfile::TempDir,
        log: Arc<ChangeLog>,
        engine: ApplyEngine<FakeRunner>,
    }

    impl Fixture {
        fn new(runner: FakeRunner) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let temp_dir = dir.path().join("tmp");
            std::fs::create_dir(&temp_dir).unwrap();
            std::fs::write(dir.path().join("dhcpd.conf"), DHCPD).unwrap();
            std::fs::write(dir.path().join("db.example.com"), ZONE).unwrap();

            let config = Config {
                paths: PathsConfig {
                    dhcp_conf: dir.path().join("dhcpd.conf"),
                    bind_dir: dir.path().to_path_buf(),
                    leases_file: dir.path().join("dhcpd.leases"),
                    temp_dir,
                },
                ..Config::default()
            };
            let log = Arc::new(ChangeLog::new());
            let engine = ApplyEngine::new(Arc::new(config), log.clone(), runner);
            Self { dir, log, engine }
        }

        fn read(&self, file: &str) -> String {
            std::fs::read_to_string(self.dir.path().join(file)).unwrap()
        }

        fn temp_files(&self) -> usize {
            std::fs::read_dir(self.dir.path().join("tmp")).unwrap().count()
        }
    }

    fn credential() -> Credential {
        Credential::new("s3cret")
    }

    #[tokio::test]
    async fn test_empty_log_is_noop() {
        let fx = Fixture::new(FakeRunner::default());

        let outcome = fx.engine.apply_dhcp(&credential()).await;
        assert!(outcome.success);
        assert_eq!(outcome.original, DHCPD);
        assert_eq!(outcome.updated, DHCPD);
        assert!(fx.engine.apply_dns(&credential()).await.is_empty());

        assert!(fx.engine.runner.calls().is_empty());
        assert_eq!(fx.read("dhcpd.conf"), DHCPD);
    }

    #[tokio::test]
    async fn test_delete_host_round_trip() {
        let fx = Fixture::new(FakeRunner::default());
        let before = crate::reader::dhcp::read_dhcp_config(&fx.dir.path().join("dhcpd.conf"));
        assert!(before.hosts.iter().any(|h| h.name == "nas"));

        fx.log.stage(DhcpChange::delete("nas"));
        let outcome = fx.engine.apply_dhcp(&credential()).await;

        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.reloaded);
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.original, DHCPD);

        let written = fx.read("dhcpd.conf");
        assert_eq!(written, outcome.updated);
        let names: Vec<_> = parse_dhcp_config(&written).hosts.into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["tv"]);
        assert!(written.contains("option domain-name \"lan.example\";"));

        assert_eq!(fx.log.dhcp_len(), 0);
        assert_eq!(fx.engine.runner.programs(), vec!["cp", "systemctl"]);
        assert_eq!(
            fx.engine.runner.calls()[1],
            vec!["systemctl", "reload", "isc-dhcp-server"]
        );
        assert_eq!(fx.temp_files(), 0, "temp file removed");
    }

    #[tokio::test]
    async fn test_failed_copy_keeps_dhcp_log() {
        let fx = Fixture::new(FakeRunner::failing("dhcpd.conf"));
        fx.log.stage(DhcpChange::add("printer", "de:ad:be:ef:00:01", "10.0.0.8"));

        let outcome = fx.engine.apply_dhcp(&credential()).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("permission denied"));
        assert!(outcome.updated.contains("host printer"));
        assert_eq!(fx.log.dhcp_len(), 1);
        assert_eq!(fx.read("dhcpd.conf"), DHCPD);
        assert_eq!(fx.engine.runner.programs(), vec!["cp"], "no reload after failed copy");
        assert_eq!(fx.temp_files(), 0, "temp file removed on failure too");
    }

    #[tokio::test]
    async fn test_reload_failure_reported_not_rolled_back() {
        let fx = Fixture::new(FakeRunner::failing("isc-dhcp-server"));
        fx.log.stage(DhcpChange::delete("tv"));

        let outcome = fx.engine.apply_dhcp(&credential()).await;
        assert!(outcome.success);
        assert!(!outcome.reloaded);
        assert!(outcome.message.contains("reload failed"));
        assert!(!fx.read("dhcpd.conf").contains("host tv"));
        assert_eq!(fx.log.dhcp_len(), 0);
    }

    #[tokio::test]
    async fn test_changes_staged_during_apply_survive() {
        let fx = Fixture::new(FakeRunner::default());
        fx.log.stage(DhcpChange::delete("tv"));

        let log = fx.log.clone();
        *fx.engine.runner.on_copy.lock().unwrap() = Some(Box::new(move || {
            log.stage(DhcpChange::add("late", "de:ad:be:ef:00:02", "10.0.0.9"));
        }));

        let outcome = fx.engine.apply_dhcp(&credential()).await;
        assert!(outcome.success);
        assert_eq!(outcome.applied, 1);
        let left = fx.log.drain_dhcp();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].change.hostname, "late");
    }

    #[tokio::test]
    async fn test_overlapping_applies_replay_once() {
        let fx = Fixture::new(FakeRunner {
            yield_after_copy: true,
            ..FakeRunner::default()
        });
        fx.log.stage(DhcpChange::add("printer", "de:ad:be:ef:00:01", "10.0.0.8"));

        let credential = credential();
        let (first, second) = tokio::join!(
            fx.engine.apply_dhcp(&credential),
            fx.engine.apply_dhcp(&credential),
        );

        assert!(first.success && second.success);
        assert_eq!(first.applied + second.applied, 1);
        let written = fx.read("dhcpd.conf");
        assert_eq!(written.matches("host printer").count(), 1);
        let copies = fx.engine.runner.programs().iter().filter(|p| *p == "cp").count();
        assert_eq!(copies, 1);
        assert_eq!(fx.log.dhcp_len(), 0);
    }

    #[tokio::test]
    async fn test_apply_all_and_create_zone_do_not_interleave() {
        let fx = Fixture::new(FakeRunner {
            yield_after_copy: true,
            ..FakeRunner::default()
        });
        fx.log.stage(DnsChange::add("example.com", "web", RecordType::A, "10.0.0.9"));

        let credential = credential();
        let (summary, created) = tokio::join!(
            fx.engine.apply_all(&credential),
            fx.engine.create_zone("lab.example", "ns1.lab.example", "admin@lab.example", 3600, &credential),
        );
        assert_eq!(summary.failed_units(), 0);
        assert!(created.is_ok());
        let programs = fx.engine.runner.programs();
        let apply_first = ["cp", "chown", "systemctl", "cp", "chown"];
        let create_first = ["cp", "chown", "cp", "chown", "systemctl"];
        assert!(programs == apply_first || programs == create_first, "{:?}", programs);
    }

    #[tokio::test]
    async fn test_unmatched_changes_counted_in_message() {
        let fx = Fixture::new(FakeRunner::default());
        fx.log.stage(DhcpChange::delete("ghost"));
        fx.log.stage(DhcpChange::edit("phantom", None, Some("10.0.0.9".to_string())));
        fx.log.stage(DhcpChange::delete("tv"));

        let outcome = fx.engine.apply_dhcp(&credential()).await;
        assert!(outcome.success);
        assert_eq!(outcome.applied, 3);
        assert_eq!(outcome.unmatched, 2);
        assert_eq!(outcome.message, "Applied 3 DHCP change(s) (2 matched no host)");
        assert!(!fx.read("dhcpd.conf").contains("host tv"));
    }

    #[tokio::test]
    async fn test_summary_counts_failed_units() {
        let fx = Fixture::new(FakeRunner::failing("dhcpd.conf"));
        fx.log.stage(DhcpChange::delete("tv"));
        fx.log.stage(DnsChange::add("example.com", "web", RecordType::A, "10.0.0.9"));
        fx.log.stage(DnsChange::add("missing.com", "c", RecordType::A, "10.2.0.1"));

        let summary = fx.engine.apply_all(&credential()).await;
        assert_eq!(summary.units(), 3);
        assert_eq!(summary.failed_units(), 2);
        assert_eq!(summary.failure_message().as_deref(), Some("2 of 3 unit(s) failed to apply"));
        assert_eq!(fx.log.dhcp_len(), 1);
        assert_eq!(ApplySummary::default().failure_message(), None);
    }

    #[tokio::test]
    async fn test_control_service_runs_action() {
        let fx = Fixture::new(FakeRunner::default());
        fx.engine
            .control_service("bind9", ServiceAction::Restart, &credential())
            .await
            .unwrap();
        assert_eq!(fx.engine.runner.calls(), vec![vec!["systemctl", "restart", "bind9"]]);

        let fx = Fixture::new(FakeRunner::failing("isc-dhcp-server"));
        let err = fx
            .engine
            .control_service("isc-dhcp-server", ServiceAction::Stop, &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_dns_add_writes_line_and_new_serial() {
        let fx = Fixture::new(FakeRunner::default());
        fx.log.stage(DnsChange::add("example.com", "web", RecordType::A, "10.0.0.9"));

        let results = fx.engine.apply_dns(&credential()).await;
        assert_eq!(
            results,
            vec![ZoneApplyResult {
                zone: "example.com".to_string(),
                status: UnitStatus::Ok,
                error: None,
            }]
        );

        let written = fx.read("db.example.com");
        assert_eq!(written.lines().count(), ZONE.lines().count() + 1);
        let serial = matchers::serial(&written).unwrap().value;
        assert!(serial > 2024010101);
        assert_eq!(serial.to_string().len(), 10);
        let web: Vec<_> = parse_zone_records(&written)
            .into_iter()
            .filter(|r| r.name == "web")
            .collect();
        assert_eq!(web.len(), 1);
        assert_eq!(web[0].value, "10.0.0.9");

        assert_eq!(fx.log.dns_len(), 0);
        assert_eq!(fx.engine.runner.programs(), vec!["cp", "chown", "systemctl"]);
        assert_eq!(fx.engine.runner.calls()[1][1], "bind:bind");
    }

    #[tokio::test]
    async fn test_dns_add_then_edit_in_one_pass() {
        let fx = Fixture::new(FakeRunner::default());
        fx.log.stage(DnsChange::add("example.com", "web", RecordType::A, "10.0.0.9"));
        fx.log.stage(DnsChange::edit("example.com", "web", RecordType::A, "10.0.0.10"));

        fx.engine.apply_dns(&credential()).await;

        let web: Vec<_> = parse_zone_records(&fx.read("db.example.com"))
            .into_iter()
            .filter(|r| r.name == "web" && r.record_type == RecordType::A)
            .map(|r| r.value)
            .collect();
        assert_eq!(web, vec!["10.0.0.10"]);
    }

    #[tokio::test]
    async fn test_failed_zone_keeps_only_its_changes() {
        let fx = Fixture::new(FakeRunner::failing("db.broken.com"));
        std::fs::write(fx.dir.path().join("db.broken.com"), ZONE).unwrap();

        fx.log.stage(DnsChange::add("broken.com", "a", RecordType::A, "10.1.0.1"));
        fx.log.stage(DnsChange::add("example.com", "b", RecordType::A, "10.0.0.2"));
        fx.log.stage(DnsChange::add("missing.com", "c", RecordType::A, "10.2.0.1"));

        let results = fx.engine.apply_dns(&credential()).await;
        let statuses: Vec<_> = results.iter().map(|r| (r.zone.as_str(), r.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("broken.com", UnitStatus::Failed),
                ("example.com", UnitStatus::Ok),
                ("missing.com", UnitStatus::Failed),
            ]
        );
        assert!(results[2].error.as_deref().unwrap().contains("db.missing.com"));

        let left: Vec<_> = fx.log.drain_dns().into_iter().map(|s| s.change.zone).collect();
        assert_eq!(left, vec!["broken.com", "missing.com"]);
        assert_eq!(fx.read("db.broken.com"), ZONE);
        assert!(fx.read("db.example.com").contains("b\tIN\tA\t10.0.0.2"));

        let reloads = fx.engine.runner.programs().iter().filter(|p| *p == "systemctl").count();
        assert_eq!(reloads, 1);
    }

    #[tokio::test]
    async fn test_no_reload_when_every_zone_fails() {
        let fx = Fixture::new(FakeRunner::failing("db.example.com"));
        fx.log.stage(DnsChange::delete("example.com", "ns1", RecordType::A));

        let results = fx.engine.apply_dns(&credential()).await;
        assert_eq!(results[0].status, UnitStatus::Failed);
        assert!(!fx.engine.runner.programs().contains(&"systemctl".to_string()));
        assert_eq!(fx.log.dns_len(), 1);
    }

    #[tokio::test]
    async fn test_chown_failure_does_not_fail_zone() {
        let fx = Fixture::new(FakeRunner::failing("bind:bind"));
        fx.log.stage(DnsChange::delete("example.com", "ns1", RecordType::A));

        let results = fx.engine.apply_dns(&credential()).await;
        assert_eq!(results[0].status, UnitStatus::Ok);
        assert!(!fx.read("db.example.com").contains("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_apply_all_skips_empty_families() {
        let fx = Fixture::new(FakeRunner::default());
        fx.log.stage(DnsChange::delete("example.com", "ns1", RecordType::A));

        let summary = fx.engine.apply_all(&credential()).await;
        assert!(summary.dhcp.is_none());
        assert_eq!(summary.dns.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_zone() {
        let fx = Fixture::new(FakeRunner::default());
        let path = fx
            .engine
            .create_zone("lab.example", "ns1.lab.example", "admin@lab.example", 3600, &credential())
            .await
            .unwrap();

        assert_eq!(path, fx.dir.path().join("db.lab.example"));
        let text = fx.read("db.lab.example");
        assert!(text.starts_with("$TTL 3600\n"));
        assert!(text.contains("admin.lab.example."));
        assert!(matchers::serial(&text).is_some());
        assert_eq!(fx.engine.runner.programs(), vec!["cp", "chown"]);
    }

    #[tokio::test]
    async fn test_create_zone_refuses_overwrite() {
        let fx = Fixture::new(FakeRunner::default());
        let err = fx
            .engine
            .create_zone("example.com", "ns1.example.com", "admin@example.com", 3600, &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::ZoneExists { .. }));
        assert_eq!(fx.read("db.example.com"), ZONE);
        assert!(fx.engine.runner.calls().is_empty());
    }

    #[test]
    fn test_group_by_zone_keeps_first_appearance_order() {
        let log = ChangeLog::new();
        log.stage(DnsChange::delete("b.com", "x", RecordType::A));
        log.stage(DnsChange::delete("a.com", "y", RecordType::A));
        log.stage(DnsChange::delete("b.com", "z", RecordType::A));

        let groups = group_by_zone(log.drain_dns());
        let shape: Vec<_> = groups.iter().map(|(z, c)| (z.as_str(), c.len())).collect();
        assert_eq!(shape, vec![("b.com", 2), ("a.com", 1)]);
    }
}
