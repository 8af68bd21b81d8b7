//! Raw `pom.xml` reading. No inheritance or interpolation happens here; see `engine`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::ModelReadError;

#[derive(Debug, Default, Clone)]
pub(crate) struct RawPom {
    pub(crate) group_id: Option<String>,
    pub(crate) artifact_id: Option<String>,
    pub(crate) version: Option<String>,
    pub(crate) packaging: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) parent: Option<PomParent>,
    pub(crate) properties: BTreeMap<String, String>,
    pub(crate) dependencies: Vec<RawDependency>,
    pub(crate) dependency_management: Vec<RawDependency>,
    pub(crate) modules: Vec<String>,
    pub(crate) profiles: Vec<RawProfile>,
    /// Line of the `<project>` element.
    pub(crate) line: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct PomParent {
    pub(crate) group_id: Option<String>,
    pub(crate) artifact_id: Option<String>,
    pub(crate) version: Option<String>,
    /// `None` when the element is absent (defaults to `../pom.xml`), `Some("")` when it is
    /// explicitly empty (repository lookup only).
    pub(crate) relative_path: Option<String>,
    pub(crate) line: u32,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct RawDependency {
    pub(crate) group_id: String,
    pub(crate) artifact_id: String,
    pub(crate) version: Option<String>,
    pub(crate) type_: Option<String>,
    pub(crate) classifier: Option<String>,
    pub(crate) scope: Option<String>,
    pub(crate) optional: Option<String>,
    pub(crate) system_path: Option<String>,
    pub(crate) exclusions: Vec<(String, String)>,
    pub(crate) line: u32,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct RawProfile {
    pub(crate) id: String,
    pub(crate) active_by_default: bool,
    pub(crate) properties: BTreeMap<String, String>,
    pub(crate) dependencies: Vec<RawDependency>,
    pub(crate) dependency_management: Vec<RawDependency>,
    pub(crate) modules: Vec<String>,
}

pub(crate) fn parse_pom(path: &Path) -> Result<RawPom, ModelReadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ModelReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_pom_str(path, &contents)
}

pub(crate) fn parse_pom_str(path: &Path, contents: &str) -> Result<RawPom, ModelReadError> {
    let doc = roxmltree::Document::parse(contents).map_err(|source| ModelReadError::Xml {
        path: path.to_path_buf(),
        source,
    })?;
    let project = doc.root_element();
    if project.tag_name().name() != "project" {
        return Err(ModelReadError::invalid(
            path,
            Some(line_of(&project)),
            format!("expected <project>, found <{}>", project.tag_name().name()),
        ));
    }

    let mut pom = RawPom {
        group_id: child_text(&project, "groupId"),
        artifact_id: child_text(&project, "artifactId"),
        version: child_text(&project, "version"),
        packaging: child_text(&project, "packaging"),
        url: child_text(&project, "url"),
        line: line_of(&project),
        ..RawPom::default()
    };

    if let Some(parent_node) = child_element(&project, "parent") {
        pom.parent = Some(PomParent {
            group_id: child_text(&parent_node, "groupId"),
            artifact_id: child_text(&parent_node, "artifactId"),
            version: child_text(&parent_node, "version"),
            relative_path: child_element(&parent_node, "relativePath").map(|n| {
                n.text()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string()
            }),
            line: line_of(&parent_node),
        });
    }

    pom.properties = parse_properties(&project);
    pom.dependencies = child_element(&project, "dependencies")
        .map(|deps| parse_dependencies(&deps))
        .unwrap_or_default();
    pom.dependency_management = parse_dependency_management(&project);
    pom.modules = parse_modules(&project);

    if let Some(profiles) = child_element(&project, "profiles") {
        for profile in profiles
            .children()
            .filter(|n| n.is_element() && n.has_tag_name("profile"))
        {
            let Some(id) = child_text(&profile, "id") else {
                tracing::debug!(
                    target = "trellis.project",
                    path = %path.display(),
                    "ignoring profile without id"
                );
                continue;
            };
            let active_by_default = child_element(&profile, "activation")
                .and_then(|activation| child_text(&activation, "activeByDefault"))
                .is_some_and(|value| value.eq_ignore_ascii_case("true"));
            pom.profiles.push(RawProfile {
                id,
                active_by_default,
                properties: parse_properties(&profile),
                dependencies: child_element(&profile, "dependencies")
                    .map(|deps| parse_dependencies(&deps))
                    .unwrap_or_default(),
                dependency_management: parse_dependency_management(&profile),
                modules: parse_modules(&profile),
            });
        }
    }

    Ok(pom)
}

fn parse_properties(node: &roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(props_node) = child_element(node, "properties") {
        for child in props_node.children().filter(|n| n.is_element()) {
            let key = child.tag_name().name().to_string();
            let value = child.text().map(str::trim).unwrap_or_default();
            out.insert(key, value.to_string());
        }
    }
    out
}

fn parse_modules(node: &roxmltree::Node<'_, '_>) -> Vec<String> {
    child_element(node, "modules")
        .map(|modules_node| {
            modules_node
                .children()
                .filter(|n| n.is_element() && n.has_tag_name("module"))
                .filter_map(|n| n.text())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_dependency_management(node: &roxmltree::Node<'_, '_>) -> Vec<RawDependency> {
    child_element(node, "dependencyManagement")
        .and_then(|dm| child_element(&dm, "dependencies"))
        .map(|deps| parse_dependencies(&deps))
        .unwrap_or_default()
}

fn parse_dependencies(deps_node: &roxmltree::Node<'_, '_>) -> Vec<RawDependency> {
    deps_node
        .children()
        .filter(|n| n.is_element() && n.has_tag_name("dependency"))
        .filter_map(|dep_node| {
            let group_id = child_text(&dep_node, "groupId")?;
            let artifact_id = child_text(&dep_node, "artifactId")?;
            let exclusions = child_element(&dep_node, "exclusions")
                .map(|node| {
                    node.children()
                        .filter(|n| n.is_element() && n.has_tag_name("exclusion"))
                        .filter_map(|n| {
                            Some((child_text(&n, "groupId")?, child_text(&n, "artifactId")?))
                        })
                        .collect()
                })
                .unwrap_or_default();

            Some(RawDependency {
                group_id,
                artifact_id,
                version: child_text(&dep_node, "version"),
                type_: child_text(&dep_node, "type"),
                classifier: child_text(&dep_node, "classifier"),
                scope: child_text(&dep_node, "scope"),
                optional: child_text(&dep_node, "optional"),
                system_path: child_text(&dep_node, "systemPath"),
                exclusions,
                line: line_of(&dep_node),
            })
        })
        .collect()
}

fn line_of(node: &roxmltree::Node<'_, '_>) -> u32 {
    node.document().text_pos_at(node.range().start).row
}

fn child_element<'a, 'input>(
    node: &roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: &roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Substitute `${key}` references. Values may themselves contain references; substitution repeats
/// until nothing changes (bounded, so self-referencing properties terminate).
pub(crate) fn resolve_placeholders(text: &str, props: &BTreeMap<String, String>) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

    let mut current = text.to_string();
    for _ in 0..8 {
        if !current.contains("${") {
            break;
        }
        let next = re
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                let key = &caps[1];
                props
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}
