//! Project file rewriting
//!
//! [`ProjectFileRewriter`] performs imperative edits on a `.csproj` document.
//! Every edit that targets an existing node fails with
//! [`ConfigurationError::MissingNode`] when that node is absent: a template
//! that drifted from the rewriter's expectations must not silently produce a
//! different scenario.
//!
//! [`ProjectEdits`] is the declarative form used by callers. It applies its
//! edits in one fixed order regardless of how it was built.

use crate::error::ConfigurationError;
use crate::package::PackageIdAndVersion;
use crate::xml::{self, Splice};
use roxmltree::Document;
use std::path::{Component, Path, PathBuf};

const PROPERTY_GROUP: &str = "PropertyGroup";
const ITEM_GROUP: &str = "ItemGroup";

/// In-memory `.csproj` text with structured edits
#[derive(Debug, Clone)]
pub struct ProjectFileRewriter {
    text: String,
}

impl ProjectFileRewriter {
    /// Parse project text, rejecting malformed XML up front
    pub fn parse(text: impl Into<String>) -> Result<Self, ConfigurationError> {
        let text = text.into();
        Document::parse(&text)?;
        Ok(Self { text })
    }

    /// Current document text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume the rewriter, returning the document text
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }

    /// Set `/Project/PropertyGroup/TargetFramework`
    pub fn set_target_framework(&mut self, tfm: &str) -> Result<(), ConfigurationError> {
        self.replace_property("TargetFramework", tfm)
    }

    /// Set `/Project/PropertyGroup/TargetFrameworks` to a `;`-separated list
    pub fn set_target_frameworks(&mut self, tfms: &str) -> Result<(), ConfigurationError> {
        self.replace_property("TargetFrameworks", tfms)
    }

    /// Replace the text of the first `/Project/PropertyGroup/{name}`
    pub fn replace_property(&mut self, name: &str, value: &str) -> Result<(), ConfigurationError> {
        let path = ["Project", PROPERTY_GROUP, name];
        self.edit(|source, doc| {
            let node = xml::select_all(doc, &path)
                .into_iter()
                .next()
                .ok_or_else(|| ConfigurationError::missing_node(xml::display_path(&path)))?;
            Ok(vec![xml::set_text(source, node, value)])
        })
    }

    /// Replace the `PackageReference` whose `Include` is `package_id`.
    ///
    /// A single replacement rewrites the node's attributes. Several
    /// replacements remove the node and append one reference per package to
    /// the same item group.
    pub fn replace_package_reference(
        &mut self,
        package_id: &str,
        replacements: &[PackageIdAndVersion],
    ) -> Result<(), ConfigurationError> {
        let path = ["Project", ITEM_GROUP, "PackageReference"];
        let description = format!(
            "{}[@Include='{package_id}']",
            xml::display_path(&path)
        );
        self.edit(|source, doc| {
            let node = xml::select_all(doc, &path)
                .into_iter()
                .find(|n| n.attribute("Include") == Some(package_id))
                .ok_or_else(|| ConfigurationError::missing_node(description.clone()))?;

            if let [single] = replacements {
                return Ok(vec![
                    xml::set_attribute(source, node, "Include", &single.id),
                    xml::set_attribute(source, node, "Version", &single.version),
                ]);
            }
            Ok(replace_with_package_references(source, node, replacements))
        })
    }

    /// Replace the `ProjectReference` whose `Include` mentions `project_file_name`
    /// with package references
    pub fn replace_project_reference_with_package_reference(
        &mut self,
        project_file_name: &str,
        replacements: &[PackageIdAndVersion],
    ) -> Result<(), ConfigurationError> {
        let path = ["Project", ITEM_GROUP, "ProjectReference"];
        let description = format!(
            "{}[contains(@Include, '{project_file_name}')]",
            xml::display_path(&path)
        );
        self.edit(|source, doc| {
            let node = xml::select_all(doc, &path)
                .into_iter()
                .find(|n| {
                    n.attribute("Include")
                        .is_some_and(|include| include.contains(project_file_name))
                })
                .ok_or_else(|| ConfigurationError::missing_node(description.clone()))?;
            Ok(replace_with_package_references(source, node, replacements))
        })
    }

    /// Append a new `PropertyGroup` to `/Project`
    pub fn add_property_group(
        &mut self,
        properties: &[(String, String)],
    ) -> Result<(), ConfigurationError> {
        self.edit(|source, doc| {
            let root = doc.root_element();
            if root.tag_name().name() != "Project" {
                return Err(ConfigurationError::missing_node("/Project"));
            }
            let group = xml::element_with_properties(PROPERTY_GROUP, properties);
            Ok(vec![xml::append_children(source, root, &[group])])
        })
    }

    /// Append an `AssemblyName` property group
    pub fn add_assembly_name_property(&mut self, assembly_name: &str) -> Result<(), ConfigurationError> {
        self.add_property_group(&[("AssemblyName".to_string(), assembly_name.to_string())])
    }

    /// Append `UseWPF`/`UseWindowsForms` for whichever flags are set
    pub fn add_use_ui_frameworks_if_required(
        &mut self,
        use_wpf: Option<bool>,
        use_windows_forms: Option<bool>,
    ) -> Result<(), ConfigurationError> {
        let properties: Vec<(String, String)> = [("UseWPF", use_wpf), ("UseWindowsForms", use_windows_forms)]
            .into_iter()
            .filter_map(|(name, flag)| flag.map(|f| (name.to_string(), msbuild_bool(f).to_string())))
            .collect();
        if properties.is_empty() {
            return Ok(());
        }
        self.add_property_group(&properties)
    }

    /// Append `DisableTransitiveFrameworkReferences=True`
    pub fn add_disable_transitive_framework_references(&mut self) -> Result<(), ConfigurationError> {
        self.add_property_group(&[(
            "DisableTransitiveFrameworkReferences".to_string(),
            msbuild_bool(true).to_string(),
        )])
    }

    /// Make every relative `ProjectReference` path absolute against `template_folder`
    pub fn fix_up_project_references(&mut self, template_folder: &Path) -> Result<(), ConfigurationError> {
        let base = absolute(template_folder);
        self.edit(|source, doc| {
            Ok(xml::select_all(doc, &["Project", ITEM_GROUP, "ProjectReference"])
                .into_iter()
                .filter_map(|node| {
                    let include = node.attribute("Include")?;
                    let resolved = normalize(&base.join(include.replace('\\', "/")));
                    Some(xml::set_attribute(
                        source,
                        node,
                        "Include",
                        &resolved.to_string_lossy(),
                    ))
                })
                .collect())
        })
    }

    fn edit<F>(&mut self, f: F) -> Result<(), ConfigurationError>
    where
        F: FnOnce(&str, &Document<'_>) -> Result<Vec<Splice>, ConfigurationError>,
    {
        let splices = {
            let doc = Document::parse(&self.text)?;
            f(&self.text, &doc)?
        };
        xml::apply_splices(&mut self.text, splices);
        Ok(())
    }
}

fn replace_with_package_references(
    source: &str,
    node: roxmltree::Node<'_, '_>,
    replacements: &[PackageIdAndVersion],
) -> Vec<Splice> {
    let mut splices = vec![xml::remove(source, node)];
    if let Some(group) = node.parent_element() {
        let references: Vec<String> = replacements
            .iter()
            .map(|p| xml::package_reference(&p.id, &p.version))
            .collect();
        if !references.is_empty() {
            splices.push(xml::append_children(source, group, &references));
        }
    }
    splices
}

fn msbuild_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Resolve `.` and `..` lexically
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// One package or project reference to swap for package references
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageReplacement {
    /// `PackageReference` matched by exact `Include`
    PackageReference {
        package_id: String,
        packages: Vec<PackageIdAndVersion>,
    },
    /// `ProjectReference` matched by file name inside `Include`
    ProjectReference {
        project_file_name: String,
        packages: Vec<PackageIdAndVersion>,
    },
}

/// Declarative set of project edits
///
/// Application order: target framework(s), replaced properties, reference
/// replacements, assembly name, extra property groups, UI frameworks,
/// transitive framework reference workaround, project reference fix-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectEdits {
    target_framework: Option<String>,
    target_frameworks: Option<String>,
    properties: Vec<(String, String)>,
    replacements: Vec<PackageReplacement>,
    assembly_name: Option<String>,
    property_groups: Vec<Vec<(String, String)>>,
    use_wpf: Option<bool>,
    use_windows_forms: Option<bool>,
    disable_transitive_framework_references: bool,
    fix_up_project_references: Option<PathBuf>,
}

impl ProjectEdits {
    /// Empty edit set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `TargetFramework`
    #[inline]
    #[must_use]
    pub fn with_target_framework(mut self, tfm: impl Into<String>) -> Self {
        self.target_framework = Some(tfm.into());
        self
    }

    /// Set `TargetFrameworks`
    #[inline]
    #[must_use]
    pub fn with_target_frameworks(mut self, tfms: impl Into<String>) -> Self {
        self.target_frameworks = Some(tfms.into());
        self
    }

    /// Replace an existing property's value
    #[inline]
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    /// Swap a package reference for `packages`
    #[inline]
    #[must_use]
    pub fn replace_package(mut self, package_id: impl Into<String>, packages: Vec<PackageIdAndVersion>) -> Self {
        self.replacements.push(PackageReplacement::PackageReference {
            package_id: package_id.into(),
            packages,
        });
        self
    }

    /// Swap a project reference for `packages`
    #[inline]
    #[must_use]
    pub fn replace_project_reference(
        mut self,
        project_file_name: impl Into<String>,
        packages: Vec<PackageIdAndVersion>,
    ) -> Self {
        self.replacements.push(PackageReplacement::ProjectReference {
            project_file_name: project_file_name.into(),
            packages,
        });
        self
    }

    /// Append an `AssemblyName` property
    #[inline]
    #[must_use]
    pub fn with_assembly_name(mut self, name: impl Into<String>) -> Self {
        self.assembly_name = Some(name.into());
        self
    }

    /// Append a property group
    #[inline]
    #[must_use]
    pub fn with_property_group(mut self, properties: Vec<(String, String)>) -> Self {
        self.property_groups.push(properties);
        self
    }

    /// Append UI framework flags for whichever values are set
    #[inline]
    #[must_use]
    pub fn with_ui_frameworks(mut self, use_wpf: Option<bool>, use_windows_forms: Option<bool>) -> Self {
        self.use_wpf = use_wpf;
        self.use_windows_forms = use_windows_forms;
        self
    }

    /// Append the transitive framework reference workaround when `enabled`
    #[inline]
    #[must_use]
    pub fn with_disable_transitive_framework_references(mut self, enabled: bool) -> Self {
        self.disable_transitive_framework_references = enabled;
        self
    }

    /// Rebase relative project references onto the template folder
    #[inline]
    #[must_use]
    pub fn with_project_references_from(mut self, template_folder: impl Into<PathBuf>) -> Self {
        self.fix_up_project_references = Some(template_folder.into());
        self
    }

    /// Apply every edit in the fixed order
    pub fn apply(&self, project: &mut ProjectFileRewriter) -> Result<(), ConfigurationError> {
        if let Some(tfm) = &self.target_framework {
            project.set_target_framework(tfm)?;
        }
        if let Some(tfms) = &self.target_frameworks {
            project.set_target_frameworks(tfms)?;
        }
        for (name, value) in &self.properties {
            project.replace_property(name, value)?;
        }
        for replacement in &self.replacements {
            match replacement {
                PackageReplacement::PackageReference { package_id, packages } => {
                    project.replace_package_reference(package_id, packages)?;
                }
                PackageReplacement::ProjectReference {
                    project_file_name,
                    packages,
                } => {
                    project.replace_project_reference_with_package_reference(project_file_name, packages)?;
                }
            }
        }
        if let Some(name) = &self.assembly_name {
            project.add_assembly_name_property(name)?;
        }
        for group in &self.property_groups {
            project.add_property_group(group)?;
        }
        project.add_use_ui_frameworks_if_required(self.use_wpf, self.use_windows_forms)?;
        if self.disable_transitive_framework_references {
            project.add_disable_transitive_framework_references()?;
        }
        if let Some(folder) = &self.fix_up_project_references {
            project.fix_up_project_references(folder)?;
        }
        Ok(())
    }

    /// Parse `text`, apply the edits, and return the rewritten document
    pub fn rewrite(&self, text: &str) -> Result<String, ConfigurationError> {
        let mut project = ProjectFileRewriter::parse(text)?;
        self.apply(&mut project)?;
        Ok(project.into_string())
    }
}
