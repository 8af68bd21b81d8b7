use trellis_core::ModuleCoordinate;
use trellis_project::{
    ArtifactResolver, LocalRepository, MavenProjectEngine, ModuleModel, ProjectModelEngine,
    ResolvedArtifact, Scope,
};
use trellis_test_utils::maven::{Dep, MavenWorkspace, PomBuilder};

fn read(ws: &MavenWorkspace, dir: &str) -> ModuleModel {
    let path = ws.root().join(dir).join("pom.xml");
    MavenProjectEngine::with_repository(ws.repository())
        .parse(&trellis_core::ManifestLocation::new(path), &[])
        .expect("read module")
}

fn find<'a>(artifacts: &'a [ResolvedArtifact], artifact_id: &str) -> Option<&'a ResolvedArtifact> {
    artifacts
        .iter()
        .find(|a| a.coordinate.artifact_id == artifact_id)
}

#[test]
fn nearest_declaration_wins() {
    let ws = MavenWorkspace::new();
    ws.install(
        "org.example:lib:1.0",
        Some(&PomBuilder::new("org.example:lib:1.0").dependency(Dep::new("org.example:util:1.0"))),
    );
    ws.install("org.example:util:1.0", None);
    ws.install("org.example:util:2.0", None);
    ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1")
            .dependency(Dep::new("org.example:lib:1.0"))
            .dependency(Dep::new("org.example:util:2.0")),
    );

    let model = read(&ws, "app");
    let artifacts = LocalRepository::new(ws.repository()).resolved_artifacts(&model);

    let util: Vec<_> = artifacts
        .iter()
        .filter(|a| a.coordinate.artifact_id == "util")
        .collect();
    assert_eq!(util.len(), 1);
    assert_eq!(util[0].coordinate.version, "2.0");
    assert_eq!(util[0].depth, 1);
    assert!(util[0].archive_path.as_ref().is_some_and(|p| p.is_file()));
}

#[test]
fn transitive_scopes_are_mediated_and_test_deps_not_followed() {
    let ws = MavenWorkspace::new();
    ws.install(
        "org.example:lib:1.0",
        Some(
            &PomBuilder::new("org.example:lib:1.0")
                .dependency(Dep::new("org.example:rt:1.0").scope("runtime"))
                .dependency(Dep::new("org.example:junit:4").scope("test"))
                .dependency(Dep::new("org.example:opt:1").optional()),
        ),
    );
    ws.install("org.example:rt:1.0", None);
    ws.install("org.example:junit:4", None);
    ws.install("org.example:opt:1", None);
    ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1")
            .dependency(Dep::new("org.example:lib:1.0").scope("provided")),
    );

    let artifacts = LocalRepository::new(ws.repository()).resolved_artifacts(&read(&ws, "app"));

    assert_eq!(find(&artifacts, "lib").map(|a| a.scope), Some(Scope::Provided));
    let rt = find(&artifacts, "rt").expect("runtime dep is transitive");
    assert_eq!(rt.scope, Scope::Provided);
    assert_eq!(rt.depth, 2);
    assert!(find(&artifacts, "junit").is_none());
    assert!(find(&artifacts, "opt").is_none());
}

#[test]
fn exclusions_prune_the_subtree() {
    let ws = MavenWorkspace::new();
    ws.install(
        "org.example:lib:1.0",
        Some(&PomBuilder::new("org.example:lib:1.0").dependency(Dep::new("org.example:mid:1"))),
    );
    ws.install(
        "org.example:mid:1",
        Some(&PomBuilder::new("org.example:mid:1").dependency(Dep::new("org.other:leaf:1"))),
    );
    ws.install("org.other:leaf:1", None);
    ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1")
            .dependency(Dep::new("org.example:lib:1.0").exclude("org.other", "*")),
    );

    let artifacts = LocalRepository::new(ws.repository()).resolved_artifacts(&read(&ws, "app"));
    assert!(find(&artifacts, "mid").is_some());
    assert!(find(&artifacts, "leaf").is_none());
}

#[test]
fn root_management_pins_transitive_versions() {
    let ws = MavenWorkspace::new();
    ws.install(
        "org.example:lib:1.0",
        Some(&PomBuilder::new("org.example:lib:1.0").dependency(Dep::new("org.example:util:1.0"))),
    );
    ws.install("org.example:util:1.0", None);
    ws.install("org.example:util:1.5", None);
    ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1")
            .managed_dependency(Dep::new("org.example:util:1.5"))
            .dependency(Dep::new("org.example:lib:1.0")),
    );

    let artifacts = LocalRepository::new(ws.repository()).resolved_artifacts(&read(&ws, "app"));
    assert_eq!(
        find(&artifacts, "util").map(|a| a.coordinate.version.as_str()),
        Some("1.5")
    );
}

#[test]
fn missing_archives_are_reported_without_a_path() {
    let ws = MavenWorkspace::new();
    ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1").dependency(Dep::new("org.example:absent:9")),
    );

    let artifacts = LocalRepository::new(ws.repository()).resolved_artifacts(&read(&ws, "app"));
    let absent = find(&artifacts, "absent").expect("still listed");
    assert!(absent.archive_path.is_none());
}

#[test]
fn homepage_comes_from_the_dependency_pom() {
    let ws = MavenWorkspace::new();
    ws.install(
        "org.example:lib:1.0",
        Some(&PomBuilder::new("org.example:lib:1.0").url("https://lib.example.org")),
    );
    ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1").dependency(Dep::new("org.example:lib:1.0")),
    );

    let artifacts = LocalRepository::new(ws.repository()).resolved_artifacts(&read(&ws, "app"));
    assert_eq!(
        find(&artifacts, "lib").and_then(|a| a.homepage.as_deref()),
        Some("https://lib.example.org")
    );
}

#[test]
fn classified_artifacts_are_fetched_from_the_repository() {
    let ws = MavenWorkspace::new();
    ws.install("org.example:lib:1.0", None);
    let sources = ws.install_classified("org.example:lib:1.0", "sources", "jar");
    let repo = LocalRepository::new(ws.repository());
    let token = trellis_scheduler::CancellationToken::new();
    let lib = ModuleCoordinate::new("org.example", "lib", "1.0");

    assert_eq!(
        repo.fetch_classified(&lib, "sources", "jar", &token).unwrap(),
        sources
    );
    assert!(repo
        .fetch_classified(&lib, "javadoc", "jar", &token)
        .unwrap_err()
        .is_not_found());
}
