//! Integration tests for the report service
//!
//! These tests drive resolution and persistence through the public API
//! against an in-memory store.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use rpt::core::{
    ActionContext, AuditKind, ContainerId, ContainerTree, FileModuleSource, MemoryAuditSink,
    RecordStore, Report, ReportError, ReportId, ReportKind, ReportListener, ReportRecord,
    ReportService, Role, RoleAssignment, RoleGrants, SaveOptions, SecurityPolicyStore,
    StandardReport, StoreTransaction, UserId,
};
use tempfile::TempDir;

const KEY: &str = "study/demog";

fn c(path: &str) -> ContainerId {
    ContainerId::parse(path).unwrap()
}

fn alice() -> UserId {
    UserId::new("alice")
}

fn grants() -> RoleGrants {
    let mut g = RoleGrants::new();
    for container in ["/", "/P1", "/P1/C1", "/P1/C1/F1", "/P2", "/Shared"] {
        g.grant(alice(), c(container), Role::Editor);
    }
    g.grant(UserId::new("bob"), c("/P1/C1"), Role::Reader);
    g.grant(UserId::new("bob"), c("/P1"), Role::Reader);
    g
}

fn service() -> ReportService {
    let g = Arc::new(grants());
    ReportService::builder(RecordStore::open_in_memory().unwrap())
        .security(g)
        .build()
}

fn ctx(container: &str) -> ActionContext {
    ActionContext::new(alice(), c(container))
}

fn chart(name: &str, key: &str, inheritable: bool) -> StandardReport {
    let mut r = StandardReport::new(ReportKind::Chart);
    let d = r.descriptor_mut();
    d.name = name.to_string();
    d.key = key.to_string();
    d.set_inheritable(inheritable);
    r
}

fn save(svc: &ReportService, container: &str, report: &dyn Report) -> i64 {
    svc.save_report(&ctx(container), report, &SaveOptions::default())
        .unwrap()
        .id()
        .row_id()
        .unwrap()
}

fn names(reports: &[Arc<dyn Report>]) -> Vec<String> {
    reports.iter().map(|r| r.descriptor().name.clone()).collect()
}

// ============================================================================
// Round trip and inheritance
// ============================================================================

#[test]
fn test_round_trip_preserves_descriptor() {
    let svc = service();
    let mut link = StandardReport::new(ReportKind::Link);
    {
        let d = link.descriptor_mut();
        d.name = "Study home".to_string();
        d.key = KEY.to_string();
        d.set_inheritable(true);
        d.set_property("url", "/study/home");
        d.set_property("target", "_blank");
    }

    let row_id = save(&svc, "/P1", &link);
    let found = svc.get_report(&c("/P1"), row_id).unwrap().unwrap();
    let (a, b) = (link.descriptor(), found.descriptor());

    assert_eq!(found.type_tag(), "ReportService.linkReport");
    assert_eq!(a.key, b.key);
    assert_eq!(a.report_type, b.report_type);
    assert_eq!(a.name, b.name);
    assert_eq!(a.flags, b.flags);
    assert_eq!(a.properties, b.properties);
    assert_eq!(b.id, ReportId::Database(row_id));
}

#[test]
fn test_inheritable_report_visible_from_child() {
    let svc = service();
    let row_id = save(&svc, "/P1", &chart("Enrollment", KEY, true));

    let found = svc.get_report(&c("/P1/C1"), row_id).unwrap();
    assert_eq!(found.unwrap().descriptor().name, "Enrollment");
    let deeper = svc.get_report(&c("/P1/C1/F1"), row_id).unwrap();
    assert!(deeper.is_some());
}

#[test]
fn test_non_inheritable_report_not_visible_from_child() {
    let svc = service();
    let row_id = save(&svc, "/P1", &chart("Enrollment", KEY, false));

    assert!(svc.get_report(&c("/P1"), row_id).unwrap().is_some());
    assert!(svc.get_report(&c("/P1/C1"), row_id).unwrap().is_none());
}

#[test]
fn test_inheritance_skips_siblings_and_root() {
    let svc = service();
    let in_p1 = save(&svc, "/P1", &chart("P1 report", KEY, true));
    let in_root = save(&svc, "/", &chart("Root report", KEY, true));

    assert!(svc.get_report(&c("/P2"), in_p1).unwrap().is_none());
    assert!(svc.get_report(&c("/P1/C1"), in_root).unwrap().is_none());
    assert!(svc.get_report(&c("/"), in_root).unwrap().is_some());
}

#[test]
fn test_shared_container_fallback_requires_inheritable() {
    let svc = service();
    let inheritable = save(&svc, "/Shared", &chart("Shared chart", KEY, true));
    let plain = save(&svc, "/Shared", &chart("Private-ish chart", KEY, false));

    assert!(svc.get_report(&c("/P2"), inheritable).unwrap().is_some());
    assert!(svc.get_report(&c("/P2"), plain).unwrap().is_none());
    assert!(svc.get_report(&c("/Shared"), plain).unwrap().is_some());
}

#[test]
fn test_lookup_by_entity_id_walks_ancestors() {
    let svc = service();
    let saved = svc
        .save_report(&ctx("/P1"), &chart("Enrollment", KEY, true), &SaveOptions::default())
        .unwrap();
    let entity_id = saved.descriptor().entity_id.unwrap();

    let found = svc
        .get_report_by_entity_id(&c("/P1/C1"), &entity_id)
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), saved.id());
}

#[test]
fn test_own_hit_shadows_ancestors() {
    let svc = service();
    save(&svc, "/P1", &chart("Parent", KEY, true));
    let own = save(&svc, "/P1/C1", &chart("Child", KEY, false));
    svc.clear_cache();
    let before = svc.cache_stats().builds;

    let found = svc.get_report(&c("/P1/C1"), own).unwrap().unwrap();
    assert_eq!(found.descriptor().name, "Child");
    // The ancestor snapshot was never needed
    assert_eq!(svc.cache_stats().builds, before + 1);
}

// ============================================================================
// getReports: merge, filter, order
// ============================================================================

#[test]
fn test_key_scoped_reports_are_per_container() {
    let svc = service();
    save(&svc, "/P1", &chart("R1", KEY, true));

    let user = alice();
    let direct = svc.get_reports(Some(&user), &c("/P1/C1"), Some(KEY)).unwrap();
    assert!(direct.is_empty());
    let inherited = svc
        .get_inheritable_reports(Some(&user), &c("/P1/C1"), Some(KEY))
        .unwrap();
    assert_eq!(names(&inherited), vec!["R1"]);

    save(&svc, "/P1/C1", &chart("R2", KEY, false));

    let direct = svc.get_reports(Some(&user), &c("/P1/C1"), Some(KEY)).unwrap();
    assert_eq!(names(&direct), vec!["R2"]);
    let inherited = svc
        .get_inheritable_reports(Some(&user), &c("/P1/C1"), Some(KEY))
        .unwrap();
    assert_eq!(names(&inherited), vec!["R1"]);
}

#[test]
fn test_inheritable_reports_include_shared_container() {
    let svc = service();
    save(&svc, "/P1", &chart("Project", KEY, true));
    save(&svc, "/P1", &chart("Project only", KEY, false));
    save(&svc, "/Shared", &chart("Site wide", KEY, true));
    save(&svc, "/Shared", &chart("Other key", "other", true));

    let inherited = svc
        .get_inheritable_reports(None, &c("/P1/C1"), Some(KEY))
        .unwrap();
    assert_eq!(names(&inherited), vec!["Project", "Site wide"]);

    let all_keys = svc.get_inheritable_reports(None, &c("/P1/C1"), None).unwrap();
    assert_eq!(all_keys.len(), 3);
}

#[test]
fn test_private_reports_filtered_by_reader() {
    let svc = service();
    let mut private = chart("Alice only", KEY, false);
    private.descriptor_mut().owner = Some(alice());
    save(&svc, "/P1/C1", &private);
    save(&svc, "/P1/C1", &chart("Everyone", KEY, false));

    let bob = UserId::new("bob");
    let stranger = UserId::new("mallory");
    assert_eq!(
        names(&svc.get_reports(Some(&bob), &c("/P1/C1"), None).unwrap()),
        vec!["Everyone"]
    );
    assert!(svc
        .get_reports(Some(&stranger), &c("/P1/C1"), None)
        .unwrap()
        .is_empty());
    assert_eq!(
        svc.get_reports(Some(&alice()), &c("/P1/C1"), None).unwrap().len(),
        2
    );
    // No user: system callers see everything
    assert_eq!(svc.get_reports(None, &c("/P1/C1"), None).unwrap().len(), 2);
}

#[test]
fn test_reports_sorted_by_display_order_then_insertion() {
    let svc = service();
    for (name, order) in [("c", 2), ("a", 0), ("b", 1), ("a2", 0)] {
        let mut r = chart(name, KEY, false);
        r.descriptor_mut().display_order = order;
        save(&svc, "/P1", &r);
    }

    let reports = svc.get_reports(None, &c("/P1"), Some(KEY)).unwrap();
    assert_eq!(names(&reports), vec!["a", "a2", "b", "c"]);
}

#[test]
fn test_report_name_exists() {
    let svc = service();
    save(&svc, "/P1", &chart("Enrollment", KEY, false));

    assert!(svc.report_name_exists(&alice(), &c("/P1"), "Enrollment", KEY).unwrap());
    assert!(!svc.report_name_exists(&alice(), &c("/P1"), "Enrollment", "other").unwrap());
    assert!(!svc
        .report_name_exists(&UserId::new("mallory"), &c("/P1"), "Enrollment", KEY)
        .unwrap());
}

#[test]
fn test_module_reports_first_and_unfiltered() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("study/reports/study/demog");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("enrollment.report.yaml"),
        "reportType: ReportService.queryReport\n\
         properties:\n  schemaName: study\n  queryName: Enrollment\n",
    )
    .unwrap();
    fs::write(dir.join("broken.report.yaml"), "reportType: [").unwrap();
    fs::write(
        dir.join("unknown.report.yaml"),
        "reportType: Plugin.unknownReport\n",
    )
    .unwrap();

    let mut tree = ContainerTree::default();
    tree.set_active_modules(c("/P1"), ["study"]);
    let g = Arc::new(grants());
    let svc = ReportService::builder(RecordStore::open_in_memory().unwrap())
        .security(g)
        .containers(tree)
        .modules(Arc::new(FileModuleSource::new(tmp.path())))
        .build();
    save(&svc, "/P1", &chart("Database chart", KEY, false));

    let reports = svc.get_reports(Some(&alice()), &c("/P1"), Some(KEY)).unwrap();
    assert_eq!(names(&reports), vec!["enrollment", "Database chart"]);
    assert!(reports[0].descriptor().is_module_based());

    let stranger = UserId::new("mallory");
    let visible = svc.get_reports(Some(&stranger), &c("/P1"), Some(KEY)).unwrap();
    assert_eq!(names(&visible), vec!["enrollment"]);

    // Inactive in /P2
    assert!(svc.get_reports(None, &c("/P2"), Some(KEY)).unwrap().is_empty());

    let module_id = reports[0].id().clone();
    let found = svc.find_report(Some(&stranger), &c("/P1"), &module_id).unwrap();
    assert!(found.is_some());
    let err = svc.delete_report(&ctx("/P1"), reports[0].as_ref()).unwrap_err();
    assert!(matches!(err, ReportError::Validation(_)));
}

#[test]
fn test_unbuildable_record_fails_lookup() {
    let svc = service();
    save(&svc, "/P1", &chart("Fine", KEY, false));

    let mut bad = chart("Orphan", KEY, false).descriptor().clone();
    bad.report_type = "Plugin.removedReport".to_string();
    bad.container = c("/P1");
    let tx = svc.store().begin().unwrap();
    tx.insert_or_update(ReportRecord::from_descriptor(&bad).unwrap())
        .unwrap();
    tx.commit().unwrap();
    svc.clear_cache();

    let err = svc.get_reports(None, &c("/P1"), None).unwrap_err();
    assert!(matches!(err, ReportError::CacheBuild { .. }));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_cold_lookups_build_once() {
    let svc = Arc::new(service());
    for i in 0..5 {
        save(&svc, "/P1", &chart(&format!("Report {}", i), KEY, false));
    }
    svc.clear_cache();
    let builds_before = svc.cache_stats().builds;

    const THREADS: usize = 16;
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let reports = svc.get_reports(Some(&alice()), &c("/P1"), None).unwrap();
                reports
                    .iter()
                    .map(|r| r.id().clone())
                    .collect::<Vec<ReportId>>()
            })
        })
        .collect();

    let results: Vec<Vec<ReportId>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(svc.cache_stats().builds, builds_before + 1);
    assert_eq!(results[0].len(), 5);
    assert!(results.iter().all(|r| r == &results[0]));
}

#[test]
fn test_sequential_saves_observed_in_commit_order() {
    let svc = service();
    let row_id = save(&svc, "/P1", &chart("v1", KEY, false));
    for version in ["v2", "v3"] {
        let current = svc.get_report(&c("/P1"), row_id).unwrap().unwrap();
        let mut next = current.clone_report();
        next.descriptor_mut().name = version.to_string();
        svc.save_report(&ctx("/P1"), next.as_ref(), &SaveOptions::default())
            .unwrap();
        let seen = svc.get_report(&c("/P1"), row_id).unwrap().unwrap();
        assert_eq!(seen.descriptor().name, version);
    }
}

// ============================================================================
// Persistence
// ============================================================================

struct FailingPolicyStore;

impl SecurityPolicyStore for FailingPolicyStore {
    fn assign(
        &self,
        _tx: &StoreTransaction<'_>,
        _report: &ReportId,
        _assignments: &[RoleAssignment],
    ) -> rpt::Result<()> {
        Err(ReportError::Policy("policy backend offline".to_string()))
    }

    fn delete(&self, _tx: &StoreTransaction<'_>, _report: &ReportId) -> rpt::Result<()> {
        Err(ReportError::Policy("policy backend offline".to_string()))
    }
}

/// Writes the assignments, then fails before the transaction commits
struct WriteThenFailPolicyStore;

impl SecurityPolicyStore for WriteThenFailPolicyStore {
    fn assign(
        &self,
        tx: &StoreTransaction<'_>,
        report: &ReportId,
        assignments: &[RoleAssignment],
    ) -> rpt::Result<()> {
        tx.replace_policy(report.row_id().unwrap(), assignments)?;
        Err(ReportError::Policy("audit of policy change failed".to_string()))
    }

    fn delete(&self, tx: &StoreTransaction<'_>, report: &ReportId) -> rpt::Result<()> {
        tx.delete_policy(report.row_id().unwrap())?;
        Err(ReportError::Policy("audit of policy change failed".to_string()))
    }
}

fn bob_reads() -> RoleAssignment {
    RoleAssignment {
        user: UserId::new("bob"),
        role: Role::Reader,
    }
}

#[test]
fn test_rolled_back_save_leaves_cache_untouched() {
    let svc = ReportService::builder(RecordStore::open_in_memory().unwrap())
        .security(Arc::new(grants()))
        .policy_store(Arc::new(FailingPolicyStore))
        .build();
    save(&svc, "/P1", &chart("Existing", KEY, false));

    let before = names(&svc.get_reports(None, &c("/P1"), None).unwrap());
    let stats_before = svc.cache_stats();

    let options = SaveOptions::with_policy(vec![RoleAssignment {
        user: UserId::new("bob"),
        role: Role::Reader,
    }]);
    let err = svc
        .save_report(&ctx("/P1"), &chart("Imported", KEY, false), &options)
        .unwrap_err();
    assert!(matches!(err, ReportError::Policy(_)));

    let stats_after = svc.cache_stats();
    assert_eq!(stats_after.invalidations, stats_before.invalidations);
    assert_eq!(stats_after.builds, stats_before.builds);
    assert_eq!(names(&svc.get_reports(None, &c("/P1"), None).unwrap()), before);
    assert_eq!(svc.store().count().unwrap(), 1);
}

#[test]
fn test_rolled_back_delete_keeps_report() {
    let svc = ReportService::builder(RecordStore::open_in_memory().unwrap())
        .security(Arc::new(grants()))
        .policy_store(Arc::new(FailingPolicyStore))
        .build();
    let row_id = save(&svc, "/P1", &chart("Keep me", KEY, false));
    let report = svc.get_report(&c("/P1"), row_id).unwrap().unwrap();

    assert!(svc.delete_report(&ctx("/P1"), report.as_ref()).is_err());
    assert!(svc.store().exists(row_id).unwrap());
    assert!(svc.get_report(&c("/P1"), row_id).unwrap().is_some());
}

#[test]
fn test_import_writes_policy_in_transaction() {
    let svc = service();
    let saved = svc
        .save_report(
            &ctx("/P1"),
            &chart("Imported", KEY, false),
            &SaveOptions::with_policy(vec![bob_reads()]),
        )
        .unwrap();
    let row_id = saved.id().row_id().unwrap();
    assert_eq!(svc.store().report_policy(row_id).unwrap(), vec![bob_reads()]);

    assert!(svc.delete_report(&ctx("/P1"), saved.as_ref()).unwrap());
    assert!(svc.store().report_policy(row_id).unwrap().is_empty());
    assert!(svc.get_report(&c("/P1"), row_id).unwrap().is_none());
}

#[test]
fn test_policy_written_before_failure_is_rolled_back() {
    let svc = ReportService::builder(RecordStore::open_in_memory().unwrap())
        .security(Arc::new(grants()))
        .policy_store(Arc::new(WriteThenFailPolicyStore))
        .build();

    let err = svc
        .save_report(
            &ctx("/P1"),
            &chart("Imported", KEY, false),
            &SaveOptions::with_policy(vec![bob_reads()]),
        )
        .unwrap_err();
    assert!(matches!(err, ReportError::Policy(_)));
    assert_eq!(svc.store().count().unwrap(), 0);
    // Row ids start at 1 in a fresh store
    assert!(svc.store().report_policy(1).unwrap().is_empty());
}

#[test]
fn test_policy_delete_rolls_back_with_row() {
    let svc = ReportService::builder(RecordStore::open_in_memory().unwrap())
        .security(Arc::new(grants()))
        .policy_store(Arc::new(WriteThenFailPolicyStore))
        .build();
    let row_id = save(&svc, "/P1", &chart("Kept", KEY, false));
    let tx = svc.store().begin().unwrap();
    tx.replace_policy(row_id, &[bob_reads()]).unwrap();
    tx.commit().unwrap();

    let report = svc.get_report(&c("/P1"), row_id).unwrap().unwrap();
    assert!(svc.delete_report(&ctx("/P1"), report.as_ref()).is_err());
    assert!(svc.store().exists(row_id).unwrap());
    assert_eq!(svc.store().report_policy(row_id).unwrap(), vec![bob_reads()]);
}

#[test]
fn test_delete_of_stale_id_keeps_policy() {
    let svc = service();
    let saved = svc
        .save_report(
            &ctx("/P1"),
            &chart("Guarded", KEY, false),
            &SaveOptions::with_policy(vec![bob_reads()]),
        )
        .unwrap();
    let row_id = saved.id().row_id().unwrap();

    // Same row id, wrong container: nothing to delete
    let mut stale = saved.clone_report();
    stale.descriptor_mut().container = c("/P2");
    let system = ActionContext::system(c("/P2"));
    assert!(!svc.delete_report(&system, stale.as_ref()).unwrap());

    assert!(svc.store().exists(row_id).unwrap());
    assert_eq!(svc.store().report_policy(row_id).unwrap(), vec![bob_reads()]);
}

#[test]
fn test_save_cannot_move_report_to_another_container() {
    let mut g = grants();
    let carol = UserId::new("carol");
    g.grant(carol.clone(), c("/P2"), Role::Editor);
    let svc = ReportService::builder(RecordStore::open_in_memory().unwrap())
        .security(Arc::new(g))
        .build();
    let row_id = save(&svc, "/P1", &chart("Secret", KEY, false));
    let stored = svc.get_report(&c("/P1"), row_id).unwrap().unwrap();

    let mut moved = stored.clone_report();
    moved.descriptor_mut().container = c("/P2");
    moved.descriptor_mut().name = "Hijacked".to_string();
    let err = svc
        .save_report(
            &ActionContext::new(carol, c("/P2")),
            moved.as_ref(),
            &SaveOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, ReportError::Validation(_)));

    // Rejected for users with rights on both containers too
    let err = svc
        .save_report(&ctx("/P2"), moved.as_ref(), &SaveOptions::default())
        .unwrap_err();
    assert!(matches!(err, ReportError::Validation(_)));

    let kept = svc.get_report(&c("/P1"), row_id).unwrap().unwrap();
    assert_eq!(kept.descriptor().name, "Secret");
    assert!(svc.get_reports(None, &c("/P2"), None).unwrap().is_empty());
}

#[test]
fn test_duplicate_name_rechecked_against_committed_rows() {
    let svc = service();
    save(&svc, "/P1", &chart("Other", KEY, false));
    // Warm snapshot that will not see the row written below
    assert_eq!(svc.get_reports(None, &c("/P1"), Some(KEY)).unwrap().len(), 1);

    let mut racing = chart("Weight", KEY, false).descriptor().clone();
    racing.container = c("/P1");
    let tx = svc.store().begin().unwrap();
    tx.insert_or_update(ReportRecord::from_descriptor(&racing).unwrap())
        .unwrap();
    tx.commit().unwrap();

    let err = svc
        .save_report(&ctx("/P1"), &chart("Weight", KEY, false), &SaveOptions::default())
        .unwrap_err();
    assert!(matches!(err, ReportError::Validation(_)));
    assert_eq!(svc.store().count().unwrap(), 2);
}

#[test]
fn test_update_with_missing_row_id_inserts() {
    let svc = service();
    let mut r = chart("Ghost", KEY, false);
    r.descriptor_mut().id = ReportId::Database(4242);
    r.descriptor_mut().container = c("/P1");

    let saved = svc
        .save_report(&ctx("/P1"), &r, &SaveOptions::default())
        .unwrap();
    assert_ne!(saved.id(), &ReportId::Database(4242));
    assert_eq!(svc.store().count().unwrap(), 1);
}

#[test]
fn test_unauthorized_update_is_rejected() {
    let svc = service();
    let row_id = save(&svc, "/P1", &chart("Locked", KEY, false));
    let report = svc.get_report(&c("/P1"), row_id).unwrap().unwrap();
    let mut edit = report.clone_report();
    edit.descriptor_mut().name = "Changed".to_string();

    let bob = ActionContext::new(UserId::new("bob"), c("/P1"));
    let err = svc
        .save_report(&bob, edit.as_ref(), &SaveOptions::default())
        .unwrap_err();
    assert!(matches!(err, ReportError::Unauthorized { .. }));
    assert!(svc.delete_report(&bob, report.as_ref()).is_err());
    assert_eq!(
        svc.get_report(&c("/P1"), row_id).unwrap().unwrap().descriptor().name,
        "Locked"
    );
}

#[derive(Default)]
struct CountingListener {
    before_save: AtomicUsize,
    after_save: AtomicUsize,
}

impl ReportListener for CountingListener {
    fn before_save(&self, _ctx: &ActionContext, _report: &dyn Report) -> rpt::Result<()> {
        self.before_save.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn after_save(&self, _ctx: &ActionContext, _report: &dyn Report) {
        self.after_save.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_category_deletion_resaves_each_report() {
    let listener = Arc::new(CountingListener::default());
    let audit = Arc::new(MemoryAuditSink::new());
    let g = Arc::new(grants());
    let svc = ReportService::builder(RecordStore::open_in_memory().unwrap())
        .security(g)
        .listener(listener.clone())
        .audit(audit.clone())
        .build();

    let mut ids = Vec::new();
    for (name, category) in [("a", 7), ("b", 7), ("c", 7), ("d", 8)] {
        let mut r = chart(name, KEY, false);
        r.descriptor_mut().category_id = Some(category);
        ids.push(save(&svc, "/P1", &r));
    }
    let before_hooks = listener.before_save.load(Ordering::SeqCst);
    let invalidations_before = svc.cache_stats().invalidations;

    let updated = svc.on_category_deleted(&ctx("/P1"), 7).unwrap();
    assert_eq!(updated, 3);
    assert_eq!(listener.before_save.load(Ordering::SeqCst), before_hooks + 3);
    assert_eq!(listener.after_save.load(Ordering::SeqCst), 7);
    assert_eq!(audit.count(AuditKind::Updated), 3);
    assert_eq!(svc.cache_stats().invalidations, invalidations_before + 3);

    for row_id in &ids[..3] {
        let r = svc.get_report(&c("/P1"), *row_id).unwrap().unwrap();
        assert_eq!(r.descriptor().category_id, None);
    }
    let d = svc.get_report(&c("/P1"), ids[3]).unwrap().unwrap();
    assert_eq!(d.descriptor().category_id, Some(8));
}

#[test]
fn test_display_order_and_share_events() {
    let audit = Arc::new(MemoryAuditSink::new());
    let g = Arc::new(grants());
    let svc = ReportService::builder(RecordStore::open_in_memory().unwrap())
        .security(g)
        .audit(audit.clone())
        .build();

    let mut private = chart("Draft", KEY, false);
    private.descriptor_mut().owner = Some(alice());
    let row_id = save(&svc, "/P1", &private);
    let stored = svc.get_report(&c("/P1"), row_id).unwrap().unwrap();

    let reordered = svc
        .set_report_display_order(&ctx("/P1"), stored.as_ref(), 3)
        .unwrap();
    assert_eq!(reordered.descriptor().display_order, 3);
    assert_eq!(
        svc.get_report(&c("/P1"), row_id).unwrap().unwrap().descriptor().display_order,
        3
    );

    let mut shared = reordered.clone_report();
    shared.descriptor_mut().owner = None;
    svc.save_report(&ctx("/P1"), shared.as_ref(), &SaveOptions::default())
        .unwrap();

    assert_eq!(audit.count(AuditKind::Created), 1);
    assert_eq!(audit.count(AuditKind::Updated), 2);
    assert_eq!(audit.count(AuditKind::Shared), 1);
}
