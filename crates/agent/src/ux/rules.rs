//! Source patterns the UX analysis looks for.

use std::path::Path;

use regex::{NoExpand, Regex};
use tracing::warn;

use erpbot_core::records::{Priority, Suggestion};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UxCategory {
    Component,
    Form,
    Navigation,
    Accessibility,
    Performance,
    ErrorHandling,
}

impl UxCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            UxCategory::Component => "component",
            UxCategory::Form => "form",
            UxCategory::Navigation => "navigation",
            UxCategory::Accessibility => "accessibility",
            UxCategory::Performance => "performance",
            UxCategory::ErrorHandling => "error_handling",
        }
    }
}

/// A mechanical rewrite that resolves a suggestion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UxFix {
    /// Declare an `isLoading` state next to the first list state.
    AddLoadingState,
    /// Replace English button labels with their Arabic counterparts.
    TranslateLabels,
}

const LABELS: [(&str, &str); 10] = [
    ("Submit", "إرسال"),
    ("Cancel", "إلغاء"),
    ("Delete", "حذف"),
    ("Save", "حفظ"),
    ("Edit", "تعديل"),
    ("Add", "إضافة"),
    ("Remove", "إزالة"),
    ("Close", "إغلاق"),
    ("Loading", "جاري التحميل"),
    ("Search", "بحث"),
];

impl UxFix {
    /// The rewritten source; equal to `content` when there is nothing to do.
    pub fn apply(self, content: &str) -> String {
        match self {
            UxFix::AddLoadingState => {
                if content.contains("isLoading") || !content.contains("useState([])") {
                    return content.to_string();
                }
                match Regex::new(r"(const \[\w+, set\w+\] = useState\(\[\]\);)") {
                    Ok(re) => re
                        .replace(content, "${1}\n  const [isLoading, setIsLoading] = useState(true);")
                        .into_owned(),
                    Err(_) => content.to_string(),
                }
            }
            UxFix::TranslateLabels => {
                let mut out = content.to_string();
                for (en, ar) in LABELS {
                    let Ok(re) = Regex::new(&format!(r"(?i)>\s*{en}\s*<")) else {
                        continue;
                    };
                    let replacement = format!(">{ar}<");
                    out = re.replace_all(&out, NoExpand(&replacement)).into_owned();
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Detect {
    Always,
    Pattern(Regex),
    /// Some opening `<tag` lacks `attr`.
    TagWithout { tag: Regex, attr: &'static str },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Scope {
    Any,
    /// Only files under `pages/`.
    Pages,
}

/// One check over a source file.
#[derive(Debug, Clone)]
pub struct UxRule {
    pub name: &'static str,
    pub category: UxCategory,
    pub priority: Priority,
    pub text: &'static str,
    pub fix: Option<UxFix>,
    scope: Scope,
    detect: Detect,
    unless: Option<Regex>,
}

impl UxRule {
    fn new(name: &'static str, category: UxCategory, priority: Priority, text: &'static str, detect: Detect) -> Self {
        Self {
            name,
            category,
            priority,
            text,
            fix: None,
            scope: Scope::Any,
            detect,
            unless: None,
        }
    }

    /// Fires when `pattern` matches.
    pub fn pattern(
        name: &'static str,
        category: UxCategory,
        priority: Priority,
        text: &'static str,
        pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self::new(name, category, priority, text, Detect::Pattern(Regex::new(pattern)?)))
    }

    /// Fires when any `<tag ...>` opening lacks `attr`.
    pub fn tag_without(
        name: &'static str,
        category: UxCategory,
        priority: Priority,
        text: &'static str,
        tag: &str,
        attr: &'static str,
    ) -> Result<Self, regex::Error> {
        let tag = Regex::new(&format!(r"<{tag}\b[^>]*"))?;
        Ok(Self::new(name, category, priority, text, Detect::TagWithout { tag, attr }))
    }

    /// Fires for every page unless suppressed.
    pub fn every_page(name: &'static str, category: UxCategory, priority: Priority, text: &'static str) -> Self {
        Self {
            scope: Scope::Pages,
            ..Self::new(name, category, priority, text, Detect::Always)
        }
    }

    /// Suppressed when `pattern` matches anywhere in the file.
    pub fn unless(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.unless = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_fix(mut self, fix: UxFix) -> Self {
        self.fix = Some(fix);
        self
    }

    /// `relative` is the file's path below the scanned root.
    pub fn matches(&self, relative: &Path, content: &str) -> bool {
        if self.scope == Scope::Pages && !relative.starts_with("pages") {
            return false;
        }
        let hit = match &self.detect {
            Detect::Always => true,
            Detect::Pattern(re) => re.is_match(content),
            Detect::TagWithout { tag, attr } => tag.find_iter(content).any(|m| !m.as_str().contains(attr)),
        };
        hit && !self.unless.as_ref().is_some_and(|re| re.is_match(content))
    }

    pub fn suggest(&self, component: &str, file: &str) -> Suggestion {
        Suggestion::new(self.category.as_str(), component, self.text, self.priority)
            .with_auto_fix(self.fix.is_some())
            .with_origin(self.name, file)
    }
}

/// The built-in rule set. A rule whose pattern fails to compile is logged and
/// left out.
pub fn default_ux_rules() -> Vec<UxRule> {
    use Priority::{High, Low, Medium};
    use UxCategory::*;

    let rules = [
        UxRule::pattern(
            "missing_loading_state",
            Component,
            High,
            "add a loading state while the list is fetched",
            r"const \[\w+, set\w+\] = useState\(\[\]\)",
        )
        .and_then(|r| r.unless("loading|isLoading|setLoading"))
        .map(|r| r.with_fix(UxFix::AddLoadingState)),
        UxRule::pattern(
            "missing_error_boundary",
            Component,
            Medium,
            "show caught errors to the user",
            r"catch\s*\(\s*error\s*\)",
        )
        .and_then(|r| r.unless("ErrorBoundary|error.*state|setError")),
        UxRule::pattern(
            "hardcoded_text",
            Component,
            Low,
            "use translated labels instead of hardcoded English text",
            r"(?i)>\s*(Submit|Cancel|Delete|Save|Edit|Add|Remove)\s*<",
        )
        .map(|r| r.with_fix(UxFix::TranslateLabels)),
        UxRule::pattern(
            "missing_empty_state",
            Component,
            Medium,
            "show a message when there is no data",
            r"\.map\s*\(\s*\(",
        )
        .and_then(|r| r.unless(r"(?i)length\s*===\s*0|isEmpty|no.*found|empty")),
        UxRule::pattern(
            "missing_confirmation",
            Component,
            High,
            "ask for confirmation before deleting",
            r"(?i)onClick.*delete|remove|حذف",
        )
        .and_then(|r| r.unless("(?i)confirm|modal|dialog")),
        UxRule::pattern(
            "missing_validation_message",
            Form,
            High,
            "explain validation errors on required fields",
            r"<input[^>]*required",
        )
        .and_then(|r| r.unless(r"(?i)error.*message|validation.*error|helperText")),
        UxRule::tag_without(
            "missing_input_type",
            Form,
            Medium,
            "declare the input type (text, email, number, ...)",
            "input",
            "type=",
        ),
        UxRule::pattern(
            "missing_autocomplete",
            Form,
            Low,
            "enable autocomplete on email, password and phone fields",
            r#"<input[^>]*type=["'](email|password|tel)"#,
        )
        .and_then(|r| r.unless("autoComplete")),
        UxRule::tag_without(
            "form_without_onsubmit",
            Form,
            High,
            "handle form submission with onSubmit",
            "form",
            "onSubmit",
        ),
        Ok(UxRule::every_page(
            "missing_breadcrumb",
            Navigation,
            Low,
            "add breadcrumbs to the page",
        ))
        .and_then(|r| r.unless("(?i)breadcrumb")),
        UxRule::tag_without(
            "missing_alt_text",
            Accessibility,
            High,
            "give images alternative text",
            "img",
            "alt=",
        ),
        UxRule::tag_without(
            "missing_label",
            Accessibility,
            Medium,
            "label the input fields",
            "input",
            "aria-label",
        )
        .and_then(|r| r.unless("label|aria-label|placeholder")),
        UxRule::pattern(
            "low_color_contrast",
            Accessibility,
            Medium,
            "check the contrast of text and background colors",
            r#"color:\s*['"]?#[a-fA-F0-9]{3,6}['"]?.*background.*#[a-fA-F0-9]{3,6}"#,
        ),
        UxRule::pattern(
            "missing_focus_indicator",
            Accessibility,
            High,
            "keep a visible focus indicator for keyboard users",
            r"outline:\s*none|outline:\s*0",
        ),
        UxRule::pattern(
            "missing_usememo",
            Performance,
            Medium,
            "memoize filtered lists with useMemo",
            r"\.filter\(.*\)\.map\(",
        )
        .and_then(|r| r.unless("useMemo")),
        UxRule::pattern(
            "inline_function_in_render",
            Performance,
            Low,
            "wrap repeated handlers in useCallback",
            r"onClick=\{\s*\(\)\s*=>",
        )
        .and_then(|r| r.unless("useCallback")),
        UxRule::pattern(
            "large_list_without_virtualization",
            Performance,
            Medium,
            "virtualize long lists",
            r"\.map\([^}]*\{[^}]*\}[^}]*\)",
        )
        .and_then(|r| r.unless("VirtualList|react-window|react-virtualized")),
        UxRule::pattern(
            "missing_error_handling",
            ErrorHandling,
            High,
            "handle failed API requests",
            "axios|fetch",
        )
        .and_then(|r| r.unless("catch|try")),
        UxRule::pattern(
            "no_user_error_feedback",
            ErrorHandling,
            Medium,
            "tell the user about errors instead of only logging them",
            r"console\.error",
        )
        .and_then(|r| r.unless("toast|alert|setError")),
    ];

    rules
        .into_iter()
        .filter_map(|rule| match rule {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!(error = %e, "ux rule skipped");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn rule(name: &str) -> UxRule {
        default_ux_rules().into_iter().find(|r| r.name == name).unwrap()
    }

    fn fires(name: &str, content: &str) -> bool {
        rule(name).matches(Path::new("components/View.jsx"), content)
    }

    #[test]
    fn every_built_in_rule_compiles() {
        let rules = default_ux_rules();
        assert_eq!(rules.len(), 19);
        let names: HashSet<&str> = rules.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), rules.len());
    }

    #[test]
    fn tags_missing_an_attribute_are_found() {
        assert!(fires("missing_alt_text", r#"<img src="logo.png" />"#));
        assert!(!fires("missing_alt_text", r#"<img src="logo.png" alt="logo" />"#));
        assert!(fires("form_without_onsubmit", "<form className=\"f\">"));
        assert!(!fires("form_without_onsubmit", "<form onSubmit={save}>"));
    }

    #[test]
    fn suppressing_patterns_win() {
        let lists = "const [items, setItems] = useState([]);";
        assert!(fires("missing_loading_state", lists));
        assert!(!fires("missing_loading_state", &format!("{lists}\nconst [loading, setLoading] = useState(true);")));
        assert!(fires("missing_error_handling", "fetch('/api/items')"));
        assert!(!fires("missing_error_handling", "try { await fetch('/api/items') } catch (e) {}"));
    }

    #[test]
    fn breadcrumbs_are_expected_on_pages_only() {
        let page = rule("missing_breadcrumb");
        assert!(page.matches(Path::new("pages/Invoices.jsx"), "<div />"));
        assert!(!page.matches(Path::new("pages/Invoices.jsx"), "<Breadcrumb />"));
        assert!(!page.matches(Path::new("components/Card.jsx"), "<div />"));
    }

    #[test]
    fn labels_are_translated() {
        let fixed = UxFix::TranslateLabels.apply("<button> Save </button><button>cancel</button>");
        assert_eq!(fixed, "<button>حفظ</button><button>إلغاء</button>");
        assert_eq!(UxFix::TranslateLabels.apply("<p>Saved</p>"), "<p>Saved</p>");
    }

    #[test]
    fn loading_state_is_declared_once() {
        let source = "  const [rows, setRows] = useState([]);\n";
        let fixed = UxFix::AddLoadingState.apply(source);
        assert!(fixed.contains("const [isLoading, setIsLoading] = useState(true);"));
        assert_eq!(UxFix::AddLoadingState.apply(&fixed), fixed);
    }

    #[test]
    fn suggestions_carry_their_origin() {
        let s = rule("hardcoded_text").suggest("Toolbar.jsx", "src/components/Toolbar.jsx");
        assert_eq!(s.kind, "component");
        assert_eq!(s.priority, Priority::Low);
        assert!(s.auto_fix);
        assert_eq!(s.issue.as_deref(), Some("hardcoded_text"));
        assert_eq!(s.file.as_deref(), Some("src/components/Toolbar.jsx"));
    }
}
