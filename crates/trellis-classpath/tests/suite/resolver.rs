use trellis_classpath::{
    ClasspathEntry, MaterializeOptions, ResolveConfig, ResolveOverrides,
};
use trellis_core::{DiagnosticKind, ManifestLocation, Severity};
use trellis_project::Scope;
use trellis_scheduler::{CancellationToken, Cancelled};
use trellis_test_utils::maven::{Dep, PomBuilder};

use super::{library_ids, projects, Fixture};

#[test]
fn own_coordinate_is_never_emitted() {
    let fx = Fixture::new();
    fx.ws.install("org.example:self:1", None);
    let module = fx.index(&fx.ws.write_module(
        "self",
        &PomBuilder::new("org.example:self:1")
            .dependency(Dep::new("org.example:self:1").classifier("tests").scope("test")),
    ));

    let result = fx
        .resolver()
        .resolve(&module, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert!(result.entries.is_empty());
    assert!(result.diagnostics.is_empty());
}

#[test]
fn missing_archive_is_an_error_on_the_declaring_module() {
    let fx = Fixture::new();
    fx.ws.install("org.ext:present:1", None);
    let module = fx.index(&fx.ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1")
            .dependency(Dep::new("org.ext:absent:1"))
            .dependency(Dep::new("org.ext:present:1")),
    ));

    let result = fx
        .resolver()
        .resolve(&module, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(library_ids(&result), vec!["present"]);
    assert_eq!(result.diagnostics.len(), 1);
    let diag = &result.diagnostics[0];
    assert_eq!(diag.kind, DiagnosticKind::ArtifactResolution);
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!(diag.location, module);
    assert!(diag.message.contains("org.ext:absent:1"));
    assert!(diag.line.is_some());
    assert!(result.has_errors());
}

#[test]
fn non_exported_scopes_are_marked() {
    let fx = Fixture::new();
    fx.ws.install("org.ext:api:1", None);
    fx.ws.install("org.ext:junit:4", None);
    fx.ws.install("org.ext:servlet:3", None);
    let module = fx.index(&fx.ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1")
            .dependency(Dep::new("org.ext:api:1"))
            .dependency(Dep::new("org.ext:junit:4").scope("test"))
            .dependency(Dep::new("org.ext:servlet:3").scope("provided")),
    ));

    let result = fx
        .resolver()
        .resolve(&module, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    let flags: Vec<(String, Scope, bool)> = result
        .entries
        .iter()
        .filter_map(ClasspathEntry::attributes)
        .map(|a| (a.coordinate.artifact_id.clone(), a.scope, a.non_exported))
        .collect();
    assert_eq!(
        flags,
        vec![
            ("api".to_string(), Scope::Compile, false),
            ("junit".to_string(), Scope::Test, true),
            ("servlet".to_string(), Scope::Provided, true),
        ]
    );
}

#[test]
fn unreadable_root_yields_only_a_model_read_diagnostic() {
    let fx = Fixture::new();
    let path = fx
        .ws
        .write_raw_manifest("broken", "<project>\n  <artifactId>x\n</project>\n");
    let location = ManifestLocation::new(path);

    let result = fx
        .resolver()
        .resolve(&location, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert!(result.entries.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].kind, DiagnosticKind::ModelRead);
    assert!(result.diagnostics[0].line.is_some());
}

#[test]
fn unreadable_sub_module_is_reported_and_the_walk_continues() {
    let fx = Fixture::new();
    fx.ws.install("org.ext:lib:1", None);
    fx.ws.write_raw_manifest("bad", "<project><artifactId>bad</project>");
    fx.ws.write_module(
        "good",
        &PomBuilder::new("org.example:good:1").dependency(Dep::new("org.ext:lib:1")),
    );
    let root = fx.index(&fx.ws.write_module(
        "",
        &PomBuilder::new("org.example:root:1")
            .packaging("pom")
            .module("bad")
            .module("good"),
    ));

    let result = fx
        .resolver()
        .resolve(&root, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(library_ids(&result), vec!["lib"]);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(
        result.diagnostics[0].location,
        ManifestLocation::new(fx.ws.root().join("bad/pom.xml"))
    );
    assert_eq!(result.diagnostics[0].kind, DiagnosticKind::ModelRead);
}

#[test]
fn dynamic_web_wars_get_libraries_instead_of_projects() {
    let fx = Fixture::new();
    fx.ws.install("org.example:q:1", None);
    fx.index(&fx.ws.write_module("q", &PomBuilder::new("org.example:q:1")));
    let web = fx.index(&fx.ws.write_module(
        "web",
        &PomBuilder::new("org.example:web:1")
            .packaging("war")
            .dependency(Dep::new("org.example:q:1")),
    ));
    let resolver = fx.resolver();
    let token = CancellationToken::new();

    let before = resolver.resolve(&web, &ResolveConfig::default(), &token).unwrap();
    assert_eq!(projects(&before).len(), 1);

    fx.registry.set_dynamic_web(&web, true);
    let after = resolver.resolve(&web, &ResolveConfig::default(), &token).unwrap();
    assert!(projects(&after).is_empty());
    assert_eq!(library_ids(&after), vec!["q"]);
}

#[test]
fn closed_modules_fall_back_to_libraries() {
    let fx = Fixture::new();
    fx.ws.install("org.example:q:1", None);
    let q = fx.index(&fx.ws.write_module("q", &PomBuilder::new("org.example:q:1")));
    let p = fx.index(&fx.ws.write_module(
        "p",
        &PomBuilder::new("org.example:p:1").dependency(Dep::new("org.example:q:1")),
    ));
    fx.registry.set_open(&q, false);

    let result = fx
        .resolver()
        .resolve(&p, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert!(projects(&result).is_empty());
    assert_eq!(library_ids(&result), vec!["q"]);
}

#[test]
fn published_workspace_module_wins_even_when_broken() {
    let fx = Fixture::new();
    fx.ws.install("org.example:q:1", None);
    let q_path = fx.ws.write_module("q", &PomBuilder::new("org.example:q:1"));
    let q = fx.index(&q_path);
    let p = fx.index(&fx.ws.write_module(
        "p",
        &PomBuilder::new("org.example:p:1").dependency(Dep::new("org.example:q:1")),
    ));

    // q breaks after it was indexed; the index still names it as the publisher.
    fx.ws.write_raw_manifest("q", "<project>");
    fx.cache.invalidate(&q);

    let result = fx
        .resolver()
        .resolve(&p, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(projects(&result), vec![q]);
}

#[test]
fn workspace_cycles_are_warnings() {
    let fx = Fixture::new();
    let p = fx.index(&fx.ws.write_module(
        "p",
        &PomBuilder::new("org.example:p:1").dependency(Dep::new("org.example:q:1")),
    ));
    let q = fx.index(&fx.ws.write_module(
        "q",
        &PomBuilder::new("org.example:q:1").dependency(Dep::new("org.example:p:1")),
    ));

    let result = fx
        .resolver()
        .resolve(&p, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(projects(&result), vec![q]);
    let cycles: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Cycle)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].severity, Severity::Warning);
    assert_eq!(cycles[0].location, p);
}

#[test]
fn cancelled_resolution_returns_nothing() {
    let fx = Fixture::new();
    fx.ws.install("org.ext:lib:1", None);
    let module = fx.index(&fx.ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1").dependency(Dep::new("org.ext:lib:1")),
    ));
    let token = CancellationToken::new();
    token.cancel();

    let result = fx.resolver().resolve(&module, &ResolveConfig::default(), &token);
    assert_eq!(result, Err(Cancelled));
}

#[test]
fn sibling_sources_are_attached_and_docs_fall_back_to_homepage() {
    let fx = Fixture::new();
    fx.ws.install("org.ext:with-src:1", None);
    let sources = fx.ws.install_classified("org.ext:with-src:1", "sources", "jar");
    fx.ws.install(
        "org.ext:docs:1",
        Some(&PomBuilder::new("org.ext:docs:1").url("https://docs.example.org")),
    );
    let module = fx.index(&fx.ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1")
            .dependency(Dep::new("org.ext:with-src:1"))
            .dependency(Dep::new("org.ext:docs:1")),
    ));

    let result = fx
        .resolver_with(MaterializeOptions::default())
        .resolve(&module, &ResolveConfig::default(), &CancellationToken::new())
        .unwrap();
    match &result.entries[0] {
        ClasspathEntry::Library {
            source_path,
            doc_url,
            ..
        } => {
            assert_eq!(source_path.as_deref(), Some(sources.as_path()));
            assert_eq!(doc_url, &None);
        }
        other => panic!("expected a library, got {other:?}"),
    }
    match &result.entries[1] {
        ClasspathEntry::Library {
            source_path,
            doc_url,
            ..
        } => {
            assert_eq!(source_path, &None);
            assert_eq!(doc_url.as_deref(), Some("https://docs.example.org/apidocs/"));
        }
        other => panic!("expected a library, got {other:?}"),
    }
}

#[test]
fn per_module_overrides_adjust_the_config() {
    let overrides = ResolveOverrides {
        include_modules: Some(false),
        resolve_workspace_projects: None,
        active_profiles: Some(vec!["ci".into()]),
    };
    let config = ResolveConfig::default().with_overrides(Some(&overrides));
    assert!(!config.include_modules);
    assert!(config.resolve_workspace_projects);
    assert_eq!(config.active_profiles, vec!["ci"]);
    assert_eq!(
        ResolveConfig::default().with_overrides(None),
        ResolveConfig::default()
    );
}

#[test]
fn resolving_an_unchanged_module_twice_gives_the_same_result() {
    let fx = Fixture::new();
    fx.ws.install("org.ext:lib:1", None);
    fx.ws.install("org.ext:junit:4", None);
    let core = fx.index(&fx.ws.write_module(
        "core",
        &PomBuilder::new("org.example:core:1").dependency(Dep::new("org.ext:lib:1")),
    ));
    let app = fx.index(&fx.ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1")
            .dependency(Dep::new("org.example:core:1"))
            .dependency(Dep::new("org.ext:junit:4").scope("test"))
            .dependency(Dep::new("org.ext:absent:1")),
    ));

    let resolver = fx.resolver();
    let token = CancellationToken::new();
    let first = resolver.resolve(&app, &ResolveConfig::default(), &token).unwrap();
    let second = resolver.resolve(&app, &ResolveConfig::default(), &token).unwrap();
    assert_eq!(first.entries, second.entries);
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(projects(&first), vec![core]);
    assert_eq!(library_ids(&first), vec!["junit", "lib"]);
}

#[test]
fn transitive_workspace_lookups_use_the_module_profiles() {
    let fx = Fixture::new();
    fx.ws.install("org.ext:extra:1", None);
    let core = fx.index(&fx.ws.write_module(
        "core",
        &PomBuilder::new("org.example:core:1")
            .profile("extra", false)
            .profile_dependency(Dep::new("org.ext:extra:1")),
    ));
    let app = fx.index(&fx.ws.write_module(
        "app",
        &PomBuilder::new("org.example:app:1").dependency(Dep::new("org.example:core:1")),
    ));

    let resolver = fx.resolver();
    let token = CancellationToken::new();
    let before = resolver.resolve(&app, &ResolveConfig::default(), &token).unwrap();
    assert!(library_ids(&before).is_empty());

    fx.registry.set_overrides(
        &core,
        ResolveOverrides {
            include_modules: None,
            resolve_workspace_projects: None,
            active_profiles: Some(vec!["extra".into()]),
        },
    );
    let after = resolver.resolve(&app, &ResolveConfig::default(), &token).unwrap();
    assert_eq!(projects(&after), vec![core]);
    assert_eq!(library_ids(&after), vec!["extra"]);
}
