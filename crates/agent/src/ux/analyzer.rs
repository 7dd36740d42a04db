use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use erpbot_core::records::Suggestion;

use super::rules::{default_ux_rules, UxRule};
use super::{ApplyOutcome, UxAnalyzer, UxError};

const SOURCE_EXTENSIONS: [&str; 2] = ["jsx", "tsx"];
pub const DEFAULT_MAX_FILES: usize = 20;

/// Runs [`UxRule`]s over the frontend sources under `root`.
///
/// Only the first `max_files` source files (in path order) are read. Fixes
/// are written back in place and never touch files outside `root`.
pub struct RuleUxAnalyzer {
    root: PathBuf,
    rules: Arc<[UxRule]>,
    max_files: usize,
}

impl RuleUxAnalyzer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_rules(root, default_ux_rules())
    }

    pub fn with_rules(root: impl Into<PathBuf>, rules: Vec<UxRule>) -> Self {
        Self {
            root: root.into(),
            rules: rules.into(),
            max_files: DEFAULT_MAX_FILES,
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rules(&self) -> &[UxRule] {
        &self.rules
    }

    fn rule(&self, name: &str) -> Option<&UxRule> {
        self.rules.iter().find(|r| r.name == name)
    }
}

fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || name == "node_modules"
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
}

/// Source files under `root`, sorted by path.
fn source_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "directory unreadable");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            if path.is_dir() {
                if !is_skipped_dir(&name.to_string_lossy()) {
                    pending.push(path);
                }
            } else if is_source(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn scan(root: &Path, rules: &[UxRule], max_files: usize) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    for path in source_files(root).into_iter().take(max_files) {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let relative = path.strip_prefix(root).unwrap_or(path.as_path());
        let component = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = path.to_string_lossy();
        suggestions.extend(
            rules
                .iter()
                .filter(|rule| rule.matches(relative, &content))
                .map(|rule| rule.suggest(&component, &file)),
        );
    }
    suggestions
}

#[async_trait]
impl UxAnalyzer for RuleUxAnalyzer {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn analyze(&self) -> Result<Vec<Suggestion>, UxError> {
        if !self.root.is_dir() {
            debug!("frontend directory not found; nothing to analyze");
            return Ok(Vec::new());
        }
        let root = self.root.clone();
        let rules = Arc::clone(&self.rules);
        let max_files = self.max_files;
        let suggestions = tokio::task::spawn_blocking(move || scan(&root, &rules, max_files))
            .await
            .map_err(|e| UxError::Analysis(e.to_string()))?;
        if !suggestions.is_empty() {
            info!(count = suggestions.len(), "ux suggestions generated");
        }
        Ok(suggestions)
    }

    async fn apply_suggestion(&self, suggestion: &Suggestion) -> Result<ApplyOutcome, UxError> {
        let fix = suggestion
            .issue
            .as_deref()
            .and_then(|issue| self.rule(issue))
            .and_then(|rule| rule.fix)
            .filter(|_| suggestion.auto_fix);
        let (Some(fix), Some(file)) = (fix, suggestion.file.as_deref()) else {
            return Ok(ApplyOutcome::declined("No auto-fix available"));
        };
        let file = Path::new(file);
        if !file.starts_with(&self.root) {
            return Ok(ApplyOutcome::declined("File is outside the frontend directory"));
        }

        let Ok(content) = tokio::fs::read_to_string(file).await else {
            return Ok(ApplyOutcome::declined("Could not read file"));
        };
        let updated = fix.apply(&content);
        if updated == content {
            return Ok(ApplyOutcome::declined("No changes needed"));
        }
        if let Err(e) = tokio::fs::write(file, updated).await {
            return Ok(ApplyOutcome::declined(e.to_string()));
        }
        info!(suggestion = %suggestion.id, file = %file.display(), "suggestion fix written");
        Ok(ApplyOutcome::applied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erpbot_core::records::Priority;

    /// A fresh directory under the system temp dir.
    fn frontend(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("erpbot-ux-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn issues(suggestions: &[Suggestion], component: &str) -> Vec<String> {
        let mut names: Vec<String> = suggestions
            .iter()
            .filter(|s| s.component == component)
            .filter_map(|s| s.issue.clone())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn forms_and_images_are_checked() {
        let root = frontend("forms");
        write(
            &root,
            "components/LoginForm.jsx",
            "export default function LoginForm() {\n  return (\n    <form>\n      <img src=\"logo.png\" />\n      <input type=\"email\" placeholder=\"Email\" />\n    </form>\n  );\n}\n",
        );

        let suggestions = RuleUxAnalyzer::new(&root).analyze().await.unwrap();
        assert_eq!(
            issues(&suggestions, "LoginForm.jsx"),
            vec!["form_without_onsubmit", "missing_alt_text", "missing_autocomplete"]
        );
        let form = suggestions.iter().find(|s| s.kind == "form" && s.priority == Priority::High).unwrap();
        assert!(form.file.as_deref().unwrap().ends_with("LoginForm.jsx"));
        assert!(!form.auto_fix);
    }

    #[tokio::test]
    async fn vendored_hidden_and_foreign_files_are_ignored() {
        let root = frontend("skips");
        write(&root, "node_modules/lib/Button.jsx", "<img src=\"a.png\" />");
        write(&root, ".cache/Button.jsx", "<img src=\"a.png\" />");
        write(&root, "styles/app.css", "outline: none");
        write(&root, "pages/Home.jsx", "<Breadcrumb />");

        let suggestions = RuleUxAnalyzer::new(&root).analyze().await.unwrap();
        assert!(suggestions.is_empty(), "{suggestions:?}");
    }

    #[tokio::test]
    async fn only_the_first_files_are_read() {
        let root = frontend("cap");
        for name in ["pages/A.jsx", "pages/B.jsx", "pages/C.jsx"] {
            write(&root, name, "<div />");
        }
        let suggestions = RuleUxAnalyzer::new(&root).with_max_files(2).analyze().await.unwrap();
        let components: Vec<&str> = suggestions.iter().map(|s| s.component.as_str()).collect();
        assert_eq!(components, vec!["A.jsx", "B.jsx"]);
    }

    #[tokio::test]
    async fn missing_directory_yields_nothing() {
        let analyzer = RuleUxAnalyzer::new(std::env::temp_dir().join("erpbot-ux-does-not-exist"));
        assert!(analyzer.analyze().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn label_fix_is_written_once() {
        let root = frontend("labels");
        let path = write(&root, "components/Toolbar.jsx", "<button onClick={save}>Save</button>\n");
        let analyzer = RuleUxAnalyzer::new(&root);
        let suggestions = analyzer.analyze().await.unwrap();
        let label = suggestions
            .iter()
            .find(|s| s.issue.as_deref() == Some("hardcoded_text"))
            .unwrap();

        assert!(analyzer.apply_suggestion(label).await.unwrap().success);
        assert_eq!(fs::read_to_string(&path).unwrap(), "<button onClick={save}>حفظ</button>\n");

        let again = analyzer.apply_suggestion(label).await.unwrap();
        assert_eq!(again.reason.as_deref(), Some("No changes needed"));
    }

    #[tokio::test]
    async fn auto_apply_rewrites_only_low_priority_fixes() {
        let root = frontend("auto");
        let path = write(
            &root,
            "components/Products.jsx",
            "const [rows, setRows] = useState([]);\n<button>Delete</button>\n",
        );
        let analyzer = RuleUxAnalyzer::new(&root);
        let suggestions = analyzer.analyze().await.unwrap();
        let loading = suggestions
            .iter()
            .find(|s| s.issue.as_deref() == Some("missing_loading_state"))
            .unwrap();
        assert!(loading.auto_fix);

        let applied = analyzer.apply_auto_suggestions(&suggestions).await;
        assert_eq!(applied.len(), 1);
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("<button>حذف</button>"));
        assert!(!content.contains("isLoading"));
    }

    #[tokio::test]
    async fn suggestions_without_a_fix_are_declined() {
        let root = frontend("declined");
        write(&root, "components/List.jsx", "items.map((item) => <li>{item}</li>)");
        let analyzer = RuleUxAnalyzer::new(&root);
        let suggestions = analyzer.analyze().await.unwrap();
        let empty = suggestions
            .iter()
            .find(|s| s.issue.as_deref() == Some("missing_empty_state"))
            .unwrap();
        let outcome = analyzer.apply_suggestion(empty).await.unwrap();
        assert_eq!(outcome.reason.as_deref(), Some("No auto-fix available"));

        let outside = Suggestion::new("component", "x.jsx", "t", Priority::Low)
            .with_auto_fix(true)
            .with_origin("hardcoded_text", "/etc/x.jsx");
        let outcome = analyzer.apply_suggestion(&outside).await.unwrap();
        assert!(!outcome.success);
    }
}
