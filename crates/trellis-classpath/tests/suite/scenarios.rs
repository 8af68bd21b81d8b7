use trellis_classpath::{ClasspathEntry, ResolveConfig};
use trellis_core::ManifestLocation;
use trellis_scheduler::CancellationToken;
use trellis_test_utils::maven::{Dep, PomBuilder};

use super::{library_ids, projects, Fixture};

#[test]
fn workspace_dependency_becomes_project_entry_when_enabled() {
    let fx = Fixture::new();
    fx.ws.install("org.example:q:1.0", None);
    let q = fx.index(&fx.ws.write_module("q", &PomBuilder::new("org.example:q:1.0")));
    let p = fx.index(&fx.ws.write_module(
        "p",
        &PomBuilder::new("org.example:p:1.0").dependency(Dep::new("org.example:q:1.0")),
    ));
    let resolver = fx.resolver();
    let token = CancellationToken::new();

    let on = resolver.resolve(&p, &ResolveConfig::default(), &token).unwrap();
    assert_eq!(on.entries, vec![ClasspathEntry::Project { location: q }]);
    assert!(on.diagnostics.is_empty());

    let off = resolver
        .resolve(
            &p,
            &ResolveConfig {
                resolve_workspace_projects: false,
                ..ResolveConfig::default()
            },
            &token,
        )
        .unwrap();
    assert_eq!(off.entries.len(), 1);
    assert_eq!(library_ids(&off), vec!["q"]);
    assert!(off.entries[0]
        .archive_path()
        .is_some_and(|p| p.ends_with("org/example/q/1.0/q-1.0.jar")));
}

#[test]
fn library_shared_by_sub_modules_appears_once() {
    let fx = Fixture::new();
    fx.ws.install("org.ext:shared:2", None);
    let a = fx.ws.write_module(
        "a",
        &PomBuilder::new("org.example:a:1").dependency(Dep::new("org.ext:shared:2")),
    );
    let b = fx.ws.write_module(
        "b",
        &PomBuilder::new("org.example:b:1").dependency(Dep::new("org.ext:shared:2")),
    );
    let root = fx.ws.write_module(
        "",
        &PomBuilder::new("org.example:root:1")
            .packaging("pom")
            .module("a")
            .module("b"),
    );
    fx.index(&a);
    fx.index(&b);
    let root = fx.index(&root);

    let result = fx
        .resolver()
        .resolve(&root, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(library_ids(&result), vec!["shared"]);
    assert!(projects(&result).is_empty());
    assert!(result.diagnostics.is_empty());
}

#[test]
fn sibling_modules_in_the_tree_are_not_substituted() {
    let fx = Fixture::new();
    let a = fx.ws.write_module("a", &PomBuilder::new("org.example:a:1"));
    let b = fx.ws.write_module(
        "b",
        &PomBuilder::new("org.example:b:1").dependency(Dep::new("org.example:a:1")),
    );
    let root = fx.ws.write_module(
        "",
        &PomBuilder::new("org.example:root:1")
            .packaging("pom")
            .module("a")
            .module("b"),
    );
    fx.index(&a);
    fx.index(&b);
    let root = fx.index(&root);

    let result = fx
        .resolver()
        .resolve(&root, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert!(result.entries.is_empty());
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    // Without sub-modules the root has nothing of its own.
    let flat = fx
        .resolver()
        .resolve(
            &root,
            &ResolveConfig {
                include_modules: false,
                ..ResolveConfig::default()
            },
            &CancellationToken::new(),
        )
        .unwrap();
    assert!(flat.entries.is_empty());

    // Resolved on its own, b sees a as a workspace project.
    let b = ManifestLocation::new(fx.ws.root().join("b/pom.xml"));
    let alone = fx
        .resolver()
        .resolve(&b, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(
        projects(&alone),
        vec![ManifestLocation::new(fx.ws.root().join("a/pom.xml"))]
    );
}
