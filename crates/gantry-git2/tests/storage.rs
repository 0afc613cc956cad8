//! End-to-end tests driving the store through a local repository.

use gantry_core::{App, Environment, Formation, Process};
use gantry_git2::LocalRepo;
use gantry_store::{
    CommitInfo, DirEntry, GitApi, GitApiError, GitApiResult, Storage, StoreError, TreeEntry,
};
use git2::{Repository as Git2Repository, Signature};
use tempfile::TempDir;

const REF: &str = "heads/main";
const BASE: &str = "apps";

fn create_test_repo() -> (TempDir, LocalRepo) {
    let temp_dir = TempDir::new().unwrap();
    let git2_repo = Git2Repository::init(temp_dir.path()).unwrap();

    let mut config = git2_repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();

    let sig = Signature::now("Test User", "test@example.com").unwrap();
    let tree_id = {
        let mut index = git2_repo.index().unwrap();
        index.write_tree().unwrap()
    };
    {
        let tree = git2_repo.find_tree(tree_id).unwrap();
        git2_repo
            .commit(Some("refs/heads/main"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }

    let repo = LocalRepo::open(temp_dir.path()).unwrap();
    (temp_dir, repo)
}

fn storage(repo: LocalRepo) -> Storage<LocalRepo> {
    Storage::new(repo, BASE, REF).unwrap()
}

fn web_app() -> App {
    let mut app = App::new("web");
    let mut env = Environment::new();
    env.insert("FOO".to_string(), "bar".to_string());
    app.environment = Some(env);
    app
}

#[test]
fn test_first_release_writes_exactly_two_files() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);

    let release = storage.releases_create(&web_app(), "initial release").unwrap();
    assert_eq!(release.app.version, 1);
    assert_eq!(release.description, "initial release");

    // Inspect the repository through a second handle.
    let repo = LocalRepo::open(_temp_dir.path()).unwrap();
    assert_eq!(repo.read_file(REF, "apps/web/VERSION").unwrap(), b"v1");
    assert_eq!(repo.read_file(REF, "apps/web/app.env").unwrap(), b"FOO=bar\n");
    assert!(matches!(
        repo.read_file(REF, "apps/web/image.txt"),
        Err(GitApiError::PathNotFound(_))
    ));
    assert!(matches!(
        repo.read_file(REF, "apps/web/services.json"),
        Err(GitApiError::PathNotFound(_))
    ));
}

#[test]
fn test_round_trip_full_app() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);

    let mut app = web_app();
    app.image = Some("quay.io/acme/web:v1".parse().unwrap());
    let mut formation = Formation::new();
    formation.insert(
        "web".to_string(),
        Process {
            command: Some("./bin/web".to_string()),
            quantity: 2,
            memory: 1024,
            cpu_share: 512,
        },
    );
    app.formation = Some(formation);

    let release = storage.releases_create(&app, "deploy").unwrap();

    let found = storage.apps_find("web").unwrap();
    assert_eq!(found, release.app);
    assert_eq!(found.version, 1);
    assert_eq!(found.environment, app.environment);
    assert_eq!(found.image, app.image);
    assert_eq!(found.formation, app.formation);
}

#[test]
fn test_version_monotonicity() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);

    let mut app = web_app();
    for n in 1..=5 {
        let release = storage
            .releases_create(&app, &format!("release {n}"))
            .unwrap();
        assert_eq!(release.app.version, n);
        app = release.app;
    }

    assert_eq!(storage.apps_find("web").unwrap().version, 5);
}

#[test]
fn test_release_history_newest_first() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);

    let mut app = web_app();
    for n in 1..=3 {
        app = storage
            .releases_create(&app, &format!("release {n}"))
            .unwrap()
            .app;
    }

    let releases = storage.releases("web").unwrap();
    assert_eq!(releases.len(), 3);
    assert_eq!(releases[0].description, "release 3");
    assert_eq!(releases[0].app.version, 3);
    assert_eq!(releases[1].app.version, 2);
    assert_eq!(releases[2].description, "release 1");
    assert_eq!(releases[2].app.version, 1);
}

#[test]
fn test_history_reconstructs_past_state() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);

    let mut app = web_app();
    app = storage.releases_create(&app, "v1").unwrap().app;

    // Change the environment for the second release.
    let mut env = Environment::new();
    env.insert("FOO".to_string(), "changed".to_string());
    app.environment = Some(env);
    storage.releases_create(&app, "v2").unwrap();

    let releases = storage.releases("web").unwrap();
    assert_eq!(
        releases[0].app.environment.as_ref().unwrap()["FOO"],
        "changed"
    );
    assert_eq!(releases[1].app.environment.as_ref().unwrap()["FOO"], "bar");
}

#[test]
fn test_apps_listing_and_filter() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);

    storage.releases_create(&App::new("api"), "api v1").unwrap();
    storage.releases_create(&App::new("web"), "web v1").unwrap();

    let all = storage.apps(None).unwrap();
    let names: Vec<_> = all.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["api", "web"]);
    // Listing populates names only.
    assert!(all.iter().all(|a| a.version == 0));

    let filtered = storage.apps(Some("web")).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].name, "web");

    assert!(storage.apps(Some("nope")).unwrap().is_empty());
}

#[test]
fn test_apps_find_not_found() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);
    storage.releases_create(&App::new("web"), "web v1").unwrap();

    match storage.apps_find("missing") {
        Err(StoreError::NotFound(name)) => assert_eq!(name, "missing"),
        other => panic!("expected not-found, got {other:?}"),
    }
}

#[test]
fn test_apps_empty_base_dir() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);

    // Nothing released yet: the base directory does not exist.
    let result = storage.apps(None);
    assert!(matches!(result, Err(StoreError::Api(GitApiError::PathNotFound(_)))));
}

#[test]
fn test_hostile_app_name_stays_under_base() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);

    storage
        .releases_create(&App::new("../escape"), "traversal attempt")
        .unwrap();

    let repo = LocalRepo::open(_temp_dir.path()).unwrap();
    // The name was escaped into a single component under the base.
    assert_eq!(
        repo.read_file(REF, "apps/..%2Fescape/VERSION").unwrap(),
        b"v1"
    );
    assert!(matches!(
        repo.read_file(REF, "escape/VERSION"),
        Err(GitApiError::PathNotFound(_))
    ));
}

#[test]
fn test_malformed_services_json_fails_decode() {
    let (_temp_dir, repo) = create_test_repo();

    // Hand-commit a release with broken JSON through the raw API.
    let tip = repo.resolve_ref(REF).unwrap();
    let base = repo.commit(&tip).unwrap();
    let entries = vec![
        TreeEntry::blob("apps/web/VERSION".to_string(), "v1".to_string()),
        TreeEntry::blob("apps/web/services.json".to_string(), "{broken".to_string()),
    ];
    let tree = repo.create_tree(&base.tree, &entries).unwrap();
    let commit = repo.create_commit("bad json", &tree, &[tip]).unwrap();
    repo.merge(REF, &commit).unwrap();

    let storage = storage(repo);
    match storage.apps_find("web") {
        Err(StoreError::Decode { path, .. }) => assert_eq!(path, "web/services.json"),
        other => panic!("expected decode error, got {other:?}"),
    }
}

/// Delegating backend whose merge step fails a fixed number of times.
struct FlakyMerge {
    inner: LocalRepo,
    failures: std::cell::Cell<u32>,
}

impl GitApi for FlakyMerge {
    fn resolve_ref(&self, reference: &str) -> GitApiResult<String> {
        self.inner.resolve_ref(reference)
    }
    fn commit(&self, sha: &str) -> GitApiResult<CommitInfo> {
        self.inner.commit(sha)
    }
    fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> GitApiResult<String> {
        self.inner.create_tree(base_tree, entries)
    }
    fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> GitApiResult<String> {
        self.inner.create_commit(message, tree, parents)
    }
    fn merge(&self, base_ref: &str, head_sha: &str) -> GitApiResult<()> {
        let remaining = self.failures.get();
        if remaining > 0 {
            self.failures.set(remaining - 1);
            return Err(GitApiError::Remote {
                op: "merge",
                message: "simulated outage".to_string(),
            });
        }
        self.inner.merge(base_ref, head_sha)
    }
    fn commits_touching(&self, reference: &str, path: &str) -> GitApiResult<Vec<CommitInfo>> {
        self.inner.commits_touching(reference, path)
    }
    fn read_file(&self, reference: &str, path: &str) -> GitApiResult<Vec<u8>> {
        self.inner.read_file(reference, path)
    }
    fn read_dir(&self, reference: &str, path: &str) -> GitApiResult<Vec<DirEntry>> {
        self.inner.read_dir(reference, path)
    }
}

#[test]
fn test_failed_merge_is_retryable_without_double_increment() {
    let (_temp_dir, repo) = create_test_repo();
    let flaky = FlakyMerge {
        inner: repo,
        failures: std::cell::Cell::new(1),
    };
    let storage = Storage::new(flaky, BASE, REF).unwrap();

    let app = web_app();
    let result = storage.releases_create(&app, "initial release");
    assert!(matches!(result, Err(StoreError::Merge { .. })));
    // The caller's state is untouched by the failed attempt.
    assert_eq!(app.version, 0);

    // Retrying from scratch succeeds; the orphaned commit from the
    // failed attempt is harmless.
    let release = storage.releases_create(&app, "initial release").unwrap();
    assert_eq!(release.app.version, 1);

    let history = storage.releases("web").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].app.version, 1);
}

#[test]
fn test_history_pins_each_decode_to_its_commit() {
    let (_temp_dir, repo) = create_test_repo();
    let storage = storage(repo);

    let mut app = App::new("web");
    app.image = Some("acme/web:v1".parse().unwrap());
    app = storage.releases_create(&app, "v1").unwrap().app;
    app.image = Some("acme/web:v2".parse().unwrap());
    storage.releases_create(&app, "v2").unwrap();

    let releases = storage.releases("web").unwrap();
    assert_eq!(releases[0].app.image.as_ref().unwrap().to_string(), "acme/web:v2");
    assert_eq!(releases[1].app.image.as_ref().unwrap().to_string(), "acme/web:v1");
}
