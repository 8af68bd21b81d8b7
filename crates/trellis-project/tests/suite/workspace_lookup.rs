use std::sync::Arc;

use trellis_core::{ManifestLocation, ModuleCoordinate};
use trellis_project::{ArtifactResolver, LocalRepository, MavenProjectEngine, ModelCache};
use trellis_test_utils::maven::{Dep, MavenWorkspace, PomBuilder};

#[test]
fn workspace_modules_contribute_their_own_dependencies() {
    let ws = MavenWorkspace::new();
    ws.install("org.example:util:3", None);
    let core = ws.write_module(
        "core",
        &PomBuilder::new("org.example:core:1").dependency(Dep::new("org.example:util:3")),
    );
    let app = ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1").dependency(Dep::new("org.example:core:1")),
    );

    let cache = Arc::new(ModelCache::new(Arc::new(MavenProjectEngine::with_repository(
        ws.repository(),
    ))));
    let core_location = ManifestLocation::new(core);
    let lookup_cache = cache.clone();
    let lookup = Arc::new(move |c: &ModuleCoordinate| {
        (c.group_id == "org.example" && c.artifact_id == "core")
            .then(|| lookup_cache.get(&core_location).ok())
            .flatten()
    });
    let repo = LocalRepository::new(ws.repository()).with_workspace_lookup(lookup);
    let model = cache.get(&ManifestLocation::new(app)).unwrap();

    let artifacts = repo.resolved_artifacts(&model);
    let core = artifacts
        .iter()
        .find(|a| a.coordinate.artifact_id == "core")
        .unwrap();
    assert!(core.archive_path.is_none(), "core is not installed");
    assert!(artifacts
        .iter()
        .any(|a| a.coordinate.artifact_id == "util" && a.depth == 2));
}

#[test]
fn cached_workspace_models_are_used_until_invalidated() {
    let ws = MavenWorkspace::new();
    ws.install("org.example:util:3", None);
    let core = ManifestLocation::new(ws.write_module(
        "core",
        &PomBuilder::new("org.example:core:1").dependency(Dep::new("org.example:util:3")),
    ));
    let app = ManifestLocation::new(ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1").dependency(Dep::new("org.example:core:1")),
    ));

    let cache = Arc::new(ModelCache::new(Arc::new(MavenProjectEngine::with_repository(
        ws.repository(),
    ))));
    let lookup_cache = cache.clone();
    let core_location = core.clone();
    let repo = LocalRepository::new(ws.repository()).with_workspace_lookup(Arc::new(
        move |c: &ModuleCoordinate| {
            (c.artifact_id == "core")
                .then(|| lookup_cache.get(&core_location).ok())
                .flatten()
        },
    ));
    let model = cache.get(&app).unwrap();
    cache.get(&core).unwrap();

    // Edited on disk but not yet re-read.
    ws.write_module("core", &PomBuilder::new("org.example:core:1"));
    let ids = |repo: &LocalRepository| -> Vec<String> {
        repo.resolved_artifacts(&model)
            .into_iter()
            .map(|a| a.coordinate.artifact_id)
            .collect()
    };
    assert_eq!(ids(&repo), vec!["core", "util"]);

    cache.invalidate(&core);
    assert_eq!(ids(&repo), vec!["core"]);
}
