//! End-to-end pipeline tests over an in-memory database, a temp-dir content
//! store, and a scripted renderer.

use async_trait::async_trait;
use handlescope_checker::{
    pipeline, ArchiveBuilder, CheckPipeline, CheckRequest, EventBus, JobHooks,
    SiteValidationPipeline,
};
use handlescope_core::{CheckStatus, TrackerId};
use handlescope_db::sites::{self, NewSite, Site};
use handlescope_db::{files, Database};
use handlescope_render::{RenderOutcome, Renderer};
use handlescope_store::ContentStore;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};

/// Renderer that replays canned outcomes keyed by target URL.
struct ScriptedRenderer {
    responses: Mutex<HashMap<String, RenderOutcome>>,
}

impl ScriptedRenderer {
    fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
        }
    }

    fn script(&self, url: &str, outcome: RenderOutcome) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), outcome);
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(
        &self,
        target_url: &str,
        _headers: &HashMap<String, String>,
        _timeout_override: Option<u64>,
    ) -> handlescope_render::Result<RenderOutcome> {
        let scripted = self.responses.lock().unwrap().get(target_url).cloned();
        Ok(scripted
            .unwrap_or_else(|| RenderOutcome::failed(target_url, "connection refused".to_string())))
    }
}

/// Hooks that record every archive scheduling request.
#[derive(Default)]
struct RecordingHooks {
    scheduled: Mutex<Vec<(String, Option<String>, String)>>,
}

#[async_trait]
impl JobHooks for RecordingHooks {
    async fn schedule_archive(&self, username: &str, category: Option<&str>, tracker_id: &str) {
        self.scheduled.lock().unwrap().push((
            username.to_string(),
            category.map(str::to_string),
            tracker_id.to_string(),
        ));
    }
}

struct Harness {
    db: Database,
    store: ContentStore,
    renderer: Arc<ScriptedRenderer>,
    hooks: Arc<RecordingHooks>,
    pipeline: CheckPipeline,
    _data_dir: tempfile::TempDir,
}

async fn setup() -> Harness {
    let db = Database::new(":memory:").await.expect("create database");
    db.run_migrations().await.expect("run migrations");

    let data_dir = tempfile::tempdir().expect("create temp dir");
    let store = ContentStore::new(data_dir.path()).expect("create store");

    pipeline::seed_error_image(db.pool(), &store, b"\x89PNG-generic-error")
        .await
        .expect("seed error image");

    let renderer = Arc::new(ScriptedRenderer::new());
    let hooks = Arc::new(RecordingHooks::default());
    let pipeline = CheckPipeline::new(
        db.pool().clone(),
        store.clone(),
        renderer.clone(),
        EventBus::default(),
        hooks.clone(),
    );

    Harness {
        db,
        store,
        renderer,
        hooks,
        pipeline,
        _data_dir: data_dir,
    }
}

async fn make_site(db: &Database, name: &str, host: &str) -> Site {
    sites::create_site(
        db.pool(),
        NewSite {
            name: name.to_string(),
            url_template: format!("https://{host}/users/{{username}}"),
            headers: None,
            status_code: Some(200),
            match_type: Some("text".to_string()),
            match_expr: Some("{username}".to_string()),
            test_username_pos: "admin".to_string(),
            test_username_neg: "zzz-no-such-user".to_string(),
        },
    )
    .await
    .expect("create site")
}

fn profile_page(username: &str) -> RenderOutcome {
    RenderOutcome {
        url: String::new(),
        error: None,
        html: Some(format!("<html><body><h1>{username}</h1></body></html>")),
        image: Some(format!("jpeg-bytes-for-{username}").into_bytes()),
        history: vec![200],
    }
}

fn request(site: &Site, tracker: &TrackerId, total: i64) -> CheckRequest {
    CheckRequest {
        username: "alice".to_string(),
        site_id: site.id.clone(),
        category: Some("social".to_string()),
        tracker_id: tracker.clone(),
        total,
        test: false,
    }
}

#[tokio::test]
async fn test_batch_to_archive_flow() {
    let harness = setup().await;
    let tracker = TrackerId::new("t1").expect("tracker id");

    // Site A looks for the literal "alice" in the rendered page text.
    let site_a = sites::create_site(
        harness.db.pool(),
        NewSite {
            name: "Example Forum".to_string(),
            url_template: "https://forum.example.com/users/{username}".to_string(),
            headers: None,
            status_code: Some(200),
            match_type: Some("text".to_string()),
            match_expr: Some("alice".to_string()),
            test_username_pos: "admin".to_string(),
            test_username_neg: "zzz-no-such-user".to_string(),
        },
    )
    .await
    .expect("create site");
    let site_b = make_site(&harness.db, "Dead Site", "dead.example.com").await;

    harness.renderer.script(
        "https://forum.example.com/users/alice",
        profile_page("alice"),
    );
    // Site B stays unscripted: the renderer reports a connection error.

    let mut results_rx = harness.pipeline.events().subscribe_results();

    let first = harness
        .pipeline
        .check_username(request(&site_a, &tracker, 2))
        .await
        .expect("check site A");
    assert_eq!(first.status, CheckStatus::Found);
    assert!(first.html.is_some());

    let second = harness
        .pipeline
        .check_username(request(&site_b, &tracker, 2))
        .await
        .expect("check site B");
    assert_eq!(second.status, CheckStatus::Error);
    assert_eq!(second.error.as_deref(), Some("connection refused"));
    assert!(second.html.is_none());

    // The errored check fell back to the seeded generic image.
    let fallback = files::get_file(
        harness.db.pool(),
        second.image_file_id.as_deref().expect("evidence file"),
    )
    .await
    .expect("load evidence");
    assert_eq!(fallback.name, handlescope_checker::ERROR_IMAGE_NAME);

    // Progress events carried the running counter.
    let event = results_rx.recv().await.expect("first event");
    assert_eq!((event.current, event.total), (1, 2));
    let event = results_rx.recv().await.expect("second event");
    assert_eq!((event.current, event.total), (2, 2));

    // Exactly one check scheduled the archive, with the batch metadata.
    let scheduled = harness.hooks.scheduled.lock().unwrap().clone();
    assert_eq!(
        scheduled,
        vec![(
            "alice".to_string(),
            Some("social".to_string()),
            "t1".to_string()
        )]
    );

    // Package the batch the way an embedder's scheduled job would.
    let builder = ArchiveBuilder::new(
        harness.db.pool().clone(),
        harness.store.clone(),
        harness.pipeline.events().clone(),
    );
    let archive = builder
        .create_archive("alice", Some("social".to_string()), "t1")
        .await
        .expect("create archive");
    assert_eq!(archive.site_count, 2);
    assert_eq!(archive.found_count, 1);
    assert_eq!(archive.not_found_count, 0);
    assert_eq!(archive.error_count, 1);

    // The zip holds the found site's evidence plus the summary.
    let zip_file = files::get_file(harness.db.pool(), &archive.zip_file_id)
        .await
        .expect("load zip record");
    assert_eq!(zip_file.name, "alice.zip");
    let zip_bytes = harness.store.read(zip_file.relpath()).expect("read zip");
    let mut reader =
        zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).expect("open archive");
    let names: Vec<String> = (0..reader.len())
        .map(|i| reader.by_index(i).expect("entry").name().to_string())
        .collect();
    assert!(names.contains(&"ExampleForum.jpg".to_string()));
    assert!(names.contains(&"ExampleForum.html".to_string()));
    assert!(names.contains(&"alice.csv".to_string()));
    assert_eq!(names.len(), 3);

    let mut csv_text = String::new();
    reader
        .by_name("alice.csv")
        .expect("summary entry")
        .read_to_string(&mut csv_text)
        .expect("read summary");
    assert!(csv_text.starts_with("Site Name,Profile URL,Status,Screenshot,HTML"));
    assert!(csv_text.contains("Dead Site"));
}

#[tokio::test]
async fn test_archive_claimed_exactly_once_with_late_check() {
    let harness = setup().await;
    let tracker = TrackerId::new("t-late").expect("tracker id");

    let site_a = make_site(&harness.db, "Site A", "a.example.com").await;
    let site_b = make_site(&harness.db, "Site B", "b.example.com").await;
    let site_c = make_site(&harness.db, "Site C", "c.example.com").await;

    // Three checks arrive for a batch declared as two: a duplicate delivery
    // from an external queue. The counter overshoots, the claim fires once.
    for site in [&site_a, &site_b, &site_c] {
        harness
            .pipeline
            .check_username(request(site, &tracker, 2))
            .await
            .expect("check");
    }

    assert_eq!(harness.hooks.scheduled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_error_image_aborts_the_check() {
    let db = Database::new(":memory:").await.expect("create database");
    db.run_migrations().await.expect("run migrations");
    let data_dir = tempfile::tempdir().expect("create temp dir");
    let store = ContentStore::new(data_dir.path()).expect("create store");

    // No seeded error image in this database.
    let renderer = Arc::new(ScriptedRenderer::new());
    let pipeline = CheckPipeline::new(
        db.pool().clone(),
        store,
        renderer,
        EventBus::default(),
        Arc::new(handlescope_checker::NoopHooks),
    );

    let site = make_site(&db, "Site A", "a.example.com").await;
    let tracker = TrackerId::new("t-noimg").expect("tracker id");
    let result = pipeline
        .check_username(CheckRequest {
            username: "alice".to_string(),
            site_id: site.id,
            category: None,
            tracker_id: tracker,
            total: 1,
            test: false,
        })
        .await;
    assert!(matches!(
        result,
        Err(handlescope_checker::CheckError::MissingErrorImage(_))
    ));
}

#[tokio::test]
async fn test_site_validation_certifies_and_rejects() {
    let harness = setup().await;
    let site = make_site(&harness.db, "Example Forum", "forum.example.com").await;

    // Positive control resolves, negative control renders a page without the
    // expression. The stored rule is the literal "{username}", so script pages
    // that do and do not contain that literal.
    harness.renderer.script(
        "https://forum.example.com/users/admin",
        RenderOutcome {
            url: String::new(),
            error: None,
            html: Some("<html><body>profile of {username}</body></html>".to_string()),
            image: Some(b"jpeg-pos".to_vec()),
            history: vec![200],
        },
    );
    harness.renderer.script(
        "https://forum.example.com/users/zzz-no-such-user",
        RenderOutcome {
            url: String::new(),
            error: None,
            html: Some("<html><body>user not found</body></html>".to_string()),
            image: Some(b"jpeg-neg".to_vec()),
            history: vec![200],
        },
    );

    let validation = SiteValidationPipeline::new(CheckPipeline::new(
        harness.db.pool().clone(),
        harness.store.clone(),
        harness.renderer.clone(),
        harness.pipeline.events().clone(),
        Arc::new(handlescope_checker::NoopHooks),
    ));

    let tracker = TrackerId::new("vt1").expect("tracker id");
    let mut site_rx = harness.pipeline.events().subscribe_sites();
    let validated = validation
        .test_site(&site.id, &tracker)
        .await
        .expect("validate site");
    assert!(validated.valid);
    assert!(validated.tested_at.is_some());
    assert!(validated.test_result_pos_id.is_some());
    assert!(validated.test_result_neg_id.is_some());

    let event = site_rx.recv().await.expect("site event");
    assert_eq!(event.tracker_id, "vt1");
    assert!(event.site.valid);

    // Validation ran in test mode: no batch counter was touched for the
    // sub-trackers or the parent tracker.
    assert_eq!(
        handlescope_db::trackers::get_progress(harness.db.pool(), "vt1")
            .await
            .expect("progress"),
        None
    );
    assert_eq!(
        handlescope_db::trackers::get_progress(harness.db.pool(), "vt1-1")
            .await
            .expect("progress"),
        None
    );

    // Re-point the negative control at a page that does contain the literal;
    // the site must come back invalid.
    harness.renderer.script(
        "https://forum.example.com/users/zzz-no-such-user",
        RenderOutcome {
            url: String::new(),
            error: None,
            html: Some("<html><body>everyone is {username} here</body></html>".to_string()),
            image: Some(b"jpeg-neg-2".to_vec()),
            history: vec![200],
        },
    );
    let tracker = TrackerId::new("vt2").expect("tracker id");
    let revalidated = validation
        .test_site(&site.id, &tracker)
        .await
        .expect("validate site");
    assert!(!revalidated.valid);

    // A control run that errors outright must also leave the site invalid.
    harness.renderer.script(
        "https://forum.example.com/users/admin",
        RenderOutcome::failed(
            "https://forum.example.com/users/admin",
            "tls handshake failed".to_string(),
        ),
    );
    let tracker = TrackerId::new("vt3").expect("tracker id");
    let errored = validation
        .test_site(&site.id, &tracker)
        .await
        .expect("validate site");
    assert!(!errored.valid);
    let positive = handlescope_db::results::get_result(
        harness.db.pool(),
        errored.test_result_pos_id.as_deref().expect("positive result"),
    )
    .await
    .expect("load positive result");
    assert_eq!(positive.status, CheckStatus::Error);
}
