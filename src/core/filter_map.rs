//! Extension to filter-configuration map.
//!
//! Persisted as `config/extensions-mapping.txt`, one tab-delimited
//! `extension<TAB>filter-id` pair per line. An empty extension field maps
//! files without an extension.

use std::collections::BTreeMap;
use std::path::Path;

use tokio::fs;
use tracing::warn;

use super::error::{WorkspaceError, WorkspaceResult};
use super::layout::file_extension;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilterMap {
    /// Lower-cased extension (with leading dot, or `""`) to filter id
    entries: BTreeMap<String, String>,
}

impl ExtensionFilterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (extension, filter) in entries {
            map.insert(extension.as_ref(), filter);
        }
        map
    }

    /// Map `extension` to `filter`, returning the filter it replaces.
    ///
    /// Keys are case-insensitive, so `.HTML` and `.html` share one entry.
    pub fn insert(&mut self, extension: &str, filter: impl Into<String>) -> Option<String> {
        let key = normalize_extension(extension);
        let filter = filter.into();
        let previous = self.entries.insert(key.clone(), filter.clone());
        if let Some(previous) = previous.as_ref().filter(|p| **p != filter) {
            warn!(
                extension = %key,
                replaced = %previous,
                filter = %filter,
                "Extension mapped twice; keeping the later filter"
            );
        }
        previous
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Filter configuration for a file, by the extension of its last segment.
    ///
    /// Extensionless names look up the `""` entry.
    pub fn filter_for(&self, relative_path: &str) -> Option<&str> {
        let name = relative_path.rsplit(['/', '\\']).next().unwrap_or(relative_path);
        let extension = file_extension(name);
        self.entries
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parse the tab-delimited mapping format.
    ///
    /// Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> WorkspaceResult<Self> {
        let mut map = Self::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }

            let malformed = || WorkspaceError::MalformedMapping {
                line: index + 1,
                content: line.to_string(),
            };

            let (extension, filter) = line.split_once('\t').ok_or_else(malformed)?;
            let (extension, filter) = (extension.trim(), filter.trim());
            if filter.is_empty() {
                return Err(malformed());
            }

            map.insert(extension, filter);
        }

        Ok(map)
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(extension, filter)| format!("{}\t{}\n", extension, filter))
            .collect()
    }

    /// Load from disk; a missing file surfaces as `Io(NotFound)`
    pub async fn load(path: &Path) -> WorkspaceResult<Self> {
        let content = fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    pub async fn save(&self, path: &Path) -> WorkspaceResult<()> {
        fs::write(path, self.render()).await?;
        Ok(())
    }
}

fn normalize_extension(extension: &str) -> String {
    let extension = extension.trim().to_ascii_lowercase();
    if extension.is_empty() || extension.starts_with('.') {
        extension
    } else {
        format!(".{}", extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_and_lookup() {
        let map = ExtensionFilterMap::parse(
            "# generated\n.html\tokf_html\r\n\n.XLF\tokf_xliff\nproperties\tokf_properties\n",
        )
        .unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.filter_for("docs/index.html"), Some("okf_html"));
        assert_eq!(map.filter_for("strings.xlf"), Some("okf_xliff"));
        assert_eq!(map.filter_for("app.properties"), Some("okf_properties"));
        assert_eq!(map.filter_for("INDEX.HTML"), Some("okf_html"));
        assert_eq!(map.filter_for("notes.txt"), None);
        assert_eq!(map.filter_for("Makefile"), None);
        assert_eq!(map.filter_for("site.html/README"), None);
    }

    #[test]
    fn test_parse_rejects_lines_without_tab() {
        let result = ExtensionFilterMap::parse(".html\tokf_html\n.txt okf_plaintext\n");
        assert!(matches!(
            result,
            Err(WorkspaceError::MalformedMapping { line: 2, .. })
        ));
    }

    #[test]
    fn test_empty_extension_maps_extensionless_files() {
        let map = ExtensionFilterMap::parse("\tokf_plaintext\n.html\tokf_html\n").unwrap();

        assert_eq!(map.filter_for("README"), Some("okf_plaintext"));
        assert_eq!(map.filter_for("docs/Makefile"), Some("okf_plaintext"));
        assert_eq!(map.filter_for("index.html"), Some("okf_html"));
        assert_eq!(map.filter_for("notes.txt"), None);
        assert_eq!(map.render(), "\tokf_plaintext\n.html\tokf_html\n");

        let built = ExtensionFilterMap::from_entries([("", "okf_plaintext")]);
        assert_eq!(built.render(), "\tokf_plaintext\n");
        assert_eq!(built.filter_for("LICENSE"), Some("okf_plaintext"));
    }

    #[test]
    fn test_insert_reports_case_collisions() {
        let mut map = ExtensionFilterMap::new();
        assert_eq!(map.insert(".html", "okf_html"), None);
        assert_eq!(
            map.insert(".HTML", "okf_html_custom"),
            Some("okf_html".to_string())
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.filter_for("a.html"), Some("okf_html_custom"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("extensions-mapping.txt");

        let map = ExtensionFilterMap::from_entries([(".docx", "okf_openxml"), (".html", "okf_html")]);
        map.save(&path).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            ".docx\tokf_openxml\n.html\tokf_html\n"
        );
        assert_eq!(ExtensionFilterMap::load(&path).await.unwrap(), map);
    }
}
