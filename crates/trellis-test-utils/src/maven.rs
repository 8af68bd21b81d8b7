use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::write_file;

/// A `<dependency>` element.
#[derive(Debug, Clone, Default)]
pub struct Dep {
    group_id: String,
    artifact_id: String,
    version: Option<String>,
    scope: Option<String>,
    classifier: Option<String>,
    type_: Option<String>,
    optional: bool,
    exclusions: Vec<(String, String)>,
}

impl Dep {
    /// `g:a` or `g:a:v`.
    pub fn new(coordinate: &str) -> Self {
        let mut parts = coordinate.split(':');
        let group_id = parts.next().unwrap_or_default().to_string();
        let artifact_id = parts.next().unwrap_or_default().to_string();
        let version = parts.next().map(str::to_string);
        Self {
            group_id,
            artifact_id,
            version,
            ..Self::default()
        }
    }

    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn classifier(mut self, classifier: &str) -> Self {
        self.classifier = Some(classifier.to_string());
        self
    }

    pub fn type_(mut self, type_: &str) -> Self {
        self.type_ = Some(type_.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn exclude(mut self, group_id: &str, artifact_id: &str) -> Self {
        self.exclusions
            .push((group_id.to_string(), artifact_id.to_string()));
        self
    }

    fn render(&self, out: &mut String, indent: &str) {
        let _ = writeln!(out, "{indent}<dependency>");
        let _ = writeln!(out, "{indent}  <groupId>{}</groupId>", self.group_id);
        let _ = writeln!(out, "{indent}  <artifactId>{}</artifactId>", self.artifact_id);
        if let Some(version) = &self.version {
            let _ = writeln!(out, "{indent}  <version>{version}</version>");
        }
        if let Some(type_) = &self.type_ {
            let _ = writeln!(out, "{indent}  <type>{type_}</type>");
        }
        if let Some(classifier) = &self.classifier {
            let _ = writeln!(out, "{indent}  <classifier>{classifier}</classifier>");
        }
        if let Some(scope) = &self.scope {
            let _ = writeln!(out, "{indent}  <scope>{scope}</scope>");
        }
        if self.optional {
            let _ = writeln!(out, "{indent}  <optional>true</optional>");
        }
        if !self.exclusions.is_empty() {
            let _ = writeln!(out, "{indent}  <exclusions>");
            for (g, a) in &self.exclusions {
                let _ = writeln!(
                    out,
                    "{indent}    <exclusion><groupId>{g}</groupId><artifactId>{a}</artifactId></exclusion>"
                );
            }
            let _ = writeln!(out, "{indent}  </exclusions>");
        }
        let _ = writeln!(out, "{indent}</dependency>");
    }
}

#[derive(Debug, Clone, Default)]
struct Profile {
    id: String,
    active_by_default: bool,
    dependencies: Vec<Dep>,
    modules: Vec<String>,
}

/// Builds `pom.xml` text.
#[derive(Debug, Clone, Default)]
pub struct PomBuilder {
    group_id: Option<String>,
    artifact_id: String,
    version: Option<String>,
    packaging: Option<String>,
    url: Option<String>,
    parent: Option<(String, String, String, Option<String>)>,
    properties: Vec<(String, String)>,
    modules: Vec<String>,
    dependencies: Vec<Dep>,
    managed: Vec<Dep>,
    profiles: Vec<Profile>,
}

impl PomBuilder {
    /// `g:a:v`; group and version may be left empty (`:a:`) to inherit from a parent.
    pub fn new(coordinate: &str) -> Self {
        let mut parts = coordinate.split(':');
        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        let group_id = non_empty(parts.next());
        let artifact_id = parts.next().unwrap_or_default().to_string();
        let version = non_empty(parts.next());
        Self {
            group_id,
            artifact_id,
            version,
            ..Self::default()
        }
    }

    pub fn packaging(mut self, packaging: &str) -> Self {
        self.packaging = Some(packaging.to_string());
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// `<parent>` resolved through `relativePath` (default `../pom.xml`) or the repository.
    pub fn parent(mut self, coordinate: &str) -> Self {
        let mut parts = coordinate.split(':').map(str::to_string);
        self.parent = Some((
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
            None,
        ));
        self
    }

    pub fn parent_relative_path(mut self, relative_path: &str) -> Self {
        if let Some(parent) = self.parent.as_mut() {
            parent.3 = Some(relative_path.to_string());
        }
        self
    }

    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.properties.push((key.to_string(), value.to_string()));
        self
    }

    pub fn module(mut self, relative_path: &str) -> Self {
        self.modules.push(relative_path.to_string());
        self
    }

    pub fn dependency(mut self, dep: Dep) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn managed_dependency(mut self, dep: Dep) -> Self {
        self.managed.push(dep);
        self
    }

    /// Adds a profile. Dependencies and modules are attached with [`PomBuilder::profile_dependency`]
    /// and [`PomBuilder::profile_module`], which target the most recently added profile.
    pub fn profile(mut self, id: &str, active_by_default: bool) -> Self {
        self.profiles.push(Profile {
            id: id.to_string(),
            active_by_default,
            ..Profile::default()
        });
        self
    }

    pub fn profile_dependency(mut self, dep: Dep) -> Self {
        if let Some(profile) = self.profiles.last_mut() {
            profile.dependencies.push(dep);
        }
        self
    }

    pub fn profile_module(mut self, relative_path: &str) -> Self {
        if let Some(profile) = self.profiles.last_mut() {
            profile.modules.push(relative_path.to_string());
        }
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<project xmlns=\"http://maven.apache.org/POM/4.0.0\">\n");
        out.push_str("  <modelVersion>4.0.0</modelVersion>\n");
        if let Some((g, a, v, relative_path)) = &self.parent {
            out.push_str("  <parent>\n");
            let _ = writeln!(out, "    <groupId>{g}</groupId>");
            let _ = writeln!(out, "    <artifactId>{a}</artifactId>");
            let _ = writeln!(out, "    <version>{v}</version>");
            if let Some(relative_path) = relative_path {
                let _ = writeln!(out, "    <relativePath>{relative_path}</relativePath>");
            }
            out.push_str("  </parent>\n");
        }
        if let Some(group_id) = &self.group_id {
            let _ = writeln!(out, "  <groupId>{group_id}</groupId>");
        }
        let _ = writeln!(out, "  <artifactId>{}</artifactId>", self.artifact_id);
        if let Some(version) = &self.version {
            let _ = writeln!(out, "  <version>{version}</version>");
        }
        if let Some(packaging) = &self.packaging {
            let _ = writeln!(out, "  <packaging>{packaging}</packaging>");
        }
        if let Some(url) = &self.url {
            let _ = writeln!(out, "  <url>{url}</url>");
        }
        if !self.properties.is_empty() {
            out.push_str("  <properties>\n");
            for (k, v) in &self.properties {
                let _ = writeln!(out, "    <{k}>{v}</{k}>");
            }
            out.push_str("  </properties>\n");
        }
        render_modules(&mut out, &self.modules, "  ");
        if !self.managed.is_empty() {
            out.push_str("  <dependencyManagement>\n    <dependencies>\n");
            for dep in &self.managed {
                dep.render(&mut out, "      ");
            }
            out.push_str("    </dependencies>\n  </dependencyManagement>\n");
        }
        render_dependencies(&mut out, &self.dependencies, "  ");
        if !self.profiles.is_empty() {
            out.push_str("  <profiles>\n");
            for profile in &self.profiles {
                out.push_str("    <profile>\n");
                let _ = writeln!(out, "      <id>{}</id>", profile.id);
                if profile.active_by_default {
                    out.push_str(
                        "      <activation><activeByDefault>true</activeByDefault></activation>\n",
                    );
                }
                render_modules(&mut out, &profile.modules, "      ");
                render_dependencies(&mut out, &profile.dependencies, "      ");
                out.push_str("    </profile>\n");
            }
            out.push_str("  </profiles>\n");
        }
        out.push_str("</project>\n");
        out
    }
}

fn render_modules(out: &mut String, modules: &[String], indent: &str) {
    if modules.is_empty() {
        return;
    }
    let _ = writeln!(out, "{indent}<modules>");
    for module in modules {
        let _ = writeln!(out, "{indent}  <module>{module}</module>");
    }
    let _ = writeln!(out, "{indent}</modules>");
}

fn render_dependencies(out: &mut String, deps: &[Dep], indent: &str) {
    if deps.is_empty() {
        return;
    }
    let _ = writeln!(out, "{indent}<dependencies>");
    let inner = format!("{indent}  ");
    for dep in deps {
        dep.render(out, &inner);
    }
    let _ = writeln!(out, "{indent}</dependencies>");
}

/// A temporary workspace directory next to a temporary local Maven repository.
pub struct MavenWorkspace {
    dir: TempDir,
}

impl MavenWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp workspace");
        std::fs::create_dir_all(dir.path().join("workspace")).expect("create workspace dir");
        std::fs::create_dir_all(dir.path().join("repository")).expect("create repository dir");
        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("workspace")
    }

    pub fn repository(&self) -> PathBuf {
        self.dir.path().join("repository")
    }

    /// Write `<root>/<relative_dir>/pom.xml` and return its path.
    pub fn write_module(&self, relative_dir: &str, pom: &PomBuilder) -> PathBuf {
        let path = self.root().join(relative_dir).join("pom.xml");
        write_file(&path, &pom.build());
        path
    }

    pub fn write_raw_manifest(&self, relative_dir: &str, text: &str) -> PathBuf {
        let path = self.root().join(relative_dir).join("pom.xml");
        write_file(&path, text);
        path
    }

    /// Install `g:a:v` into the local repository: a POM (a bare one when `pom` is `None`) and a
    /// placeholder jar. Returns the jar path.
    pub fn install(&self, coordinate: &str, pom: Option<&PomBuilder>) -> PathBuf {
        let (g, a, v) = split_gav(coordinate);
        let dir = artifact_dir(&self.repository(), &g, &a, &v);
        let pom_text = match pom {
            Some(pom) => pom.build(),
            None => PomBuilder::new(coordinate).build(),
        };
        write_file(&dir.join(format!("{a}-{v}.pom")), &pom_text);
        let jar = dir.join(format!("{a}-{v}.jar"));
        write_file(&jar, "jar");
        jar
    }

    /// Install only the POM (for `pom`-packaged parents and BOMs).
    pub fn install_pom(&self, coordinate: &str, pom: &PomBuilder) -> PathBuf {
        let (g, a, v) = split_gav(coordinate);
        let path = artifact_dir(&self.repository(), &g, &a, &v).join(format!("{a}-{v}.pom"));
        write_file(&path, &pom.build());
        path
    }

    /// Install `<a>-<v>-<classifier>.<extension>` next to the main artifact.
    pub fn install_classified(&self, coordinate: &str, classifier: &str, extension: &str) -> PathBuf {
        let (g, a, v) = split_gav(coordinate);
        let path = artifact_dir(&self.repository(), &g, &a, &v)
            .join(format!("{a}-{v}-{classifier}.{extension}"));
        write_file(&path, classifier);
        path
    }
}

impl Default for MavenWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

fn split_gav(coordinate: &str) -> (String, String, String) {
    let mut parts = coordinate.split(':').map(str::to_string);
    (
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
    )
}

fn artifact_dir(repo: &Path, group_id: &str, artifact_id: &str, version: &str) -> PathBuf {
    repo.join(group_id.replace('.', "/"))
        .join(artifact_id)
        .join(version)
}
