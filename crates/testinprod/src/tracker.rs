//! Identifier allocation and mock bookkeeping for one rendered test case.

use ahash::{AHashMap, AHashSet};
use indexmap::{IndexMap, IndexSet};

use crate::trace::ConstructorRegistry;

/// Names a generated identifier must never shadow inside a test method.
const RESERVED: [&str; 6] = ["self", "call", "Mock", "MagicMock", "iter", "float"];

const PYTHON_KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
    "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Returns true for a Python keyword.
#[must_use]
pub fn is_keyword(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(&name)
}

/// Returns true if `name` can be used as a keyword argument in Python source.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && !is_keyword(name)
}

/// Turns an arbitrary hint into a valid, non-reserved Python identifier.
#[must_use]
pub fn sanitize(hint: &str) -> String {
    let mut name: String = hint
        .chars()
        .map(|c| if c == '_' || c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() {
        name.push_str("value");
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if is_keyword(&name) || RESERVED.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

/// Allocates identifiers and collects setup statements and assertions for one test case.
///
/// Lives for exactly one serialization pass: everything rendered for one call trace shares
/// a tracker, so identifiers never collide within the generated test function.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    occurrences: AHashMap<String, usize>,
    issued: AHashSet<String>,
    /// Setup expression per identifier, in allocation order.
    setup: IndexMap<String, String>,
    /// Rendered `call(...)` entries per identifier.
    call_args: IndexMap<String, Vec<String>>,
    call_counts: IndexMap<String, usize>,
    attribute_asserts: Vec<String>,
    imports: IndexSet<String>,
    constructors: Option<ConstructorRegistry>,
    /// Identifiers of proxies already rendered, keyed by proxy identity.
    rendered: AHashMap<usize, String>,
    in_progress: AHashSet<usize>,
}

impl DependencyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker that can resolve instances built by instrumented constructors.
    #[must_use]
    pub fn with_constructors(registry: ConstructorRegistry) -> Self {
        Self {
            constructors: Some(registry),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn constructors(&self) -> Option<&ConstructorRegistry> {
        self.constructors.as_ref()
    }

    /// Marks a name as taken without registering anything under it (e.g. the class
    /// under test).
    pub fn reserve(&mut self, name: &str) {
        self.issued.insert(name.to_owned());
    }

    /// Returns a fresh identifier for `hint`: the bare hint the first time, then
    /// `hint_2`, `hint_3`, and so on.
    pub fn allocate(&mut self, hint: &str) -> String {
        let base = sanitize(hint);
        let count = self.occurrences.entry(base.clone()).or_insert(0);
        loop {
            *count += 1;
            let candidate = if *count == 1 {
                base.clone()
            } else {
                format!("{base}_{count}")
            };
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Allocates an identifier for `hint` and records `ident = expression` as setup.
    pub fn register(&mut self, hint: &str, expression: String) -> String {
        let ident = self.allocate(hint);
        self.setup.insert(ident.clone(), expression);
        ident
    }

    /// Records one invocation of the mock `ident`.
    ///
    /// With `arguments` the call also lands in a `assert_has_calls` assertion; without,
    /// only the call count is asserted.
    pub fn assert_called(&mut self, ident: &str, arguments: Option<(Vec<String>, Vec<(String, String)>)>) {
        if let Some((args, kwargs)) = arguments {
            let rendered: Vec<String> = args
                .into_iter()
                .chain(kwargs.into_iter().map(|(name, value)| format!("{name}={value}")))
                .collect();
            self.call_args
                .entry(ident.to_owned())
                .or_default()
                .push(format!("call({})", rendered.join(", ")));
        }
        *self.call_counts.entry(ident.to_owned()).or_insert(0) += 1;
    }

    /// Records a post-call check of an attribute the code under test assigned.
    pub fn assert_attribute(&mut self, ident: &str, name: &str, rendered: &str) {
        self.attribute_asserts.push(format!("assert {ident}.{name} == {rendered}"));
    }

    pub fn add_import(&mut self, line: String) {
        self.imports.insert(line);
    }

    #[must_use]
    pub fn imports(&self) -> &IndexSet<String> {
        &self.imports
    }

    /// `ident = expression` lines, in allocation order.
    #[must_use]
    pub fn setup_lines(&self) -> Vec<String> {
        self.setup
            .iter()
            .map(|(ident, expression)| format!("{ident} = {expression}"))
            .collect()
    }

    /// Call-argument and call-count assertions, followed by attribute assertions.
    #[must_use]
    pub fn assertion_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.call_args.len() + self.call_counts.len());
        for (ident, count) in &self.call_counts {
            if let Some(calls) = self.call_args.get(ident) {
                lines.push(format!("{ident}.assert_has_calls([{}])", calls.join(", ")));
            }
            lines.push(format!("assert {ident}.call_count == {count}"));
        }
        lines.extend(self.attribute_asserts.iter().cloned());
        lines
    }

    pub(crate) fn rendered(&self, key: usize) -> Option<&str> {
        self.rendered.get(&key).map(String::as_str)
    }

    pub(crate) fn remember(&mut self, key: usize, ident: String) {
        self.rendered.insert(key, ident);
    }

    /// Marks a proxy as being rendered; false if it already is (a reference cycle).
    pub(crate) fn enter(&mut self, key: usize) -> bool {
        self.in_progress.insert(key)
    }

    pub(crate) fn leave(&mut self, key: usize) {
        self.in_progress.remove(&key);
    }
}
