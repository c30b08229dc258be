/// Configuration for an instrumented class.
///
/// Use `InstrumentOptions::default()` for the quiet setup (baseline cases only, no
/// confirmation), or build custom options with the builder pattern:
///
/// ```
/// use testinprod::InstrumentOptions;
///
/// let options = InstrumentOptions::default().thorough(true).module_path("shop.cart");
/// assert!(options.trusted);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InstrumentOptions {
    /// Emit fuzz and metamorphic variants next to every baseline case.
    pub thorough: bool,
    /// Emit baseline cases without asking; `false` asks for confirmation first.
    pub trusted: bool,
    /// Module the class is imported from in generated tests. Defaults to the class name
    /// in snake case.
    pub module_path: Option<String>,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            thorough: false,
            trusted: true,
            module_path: None,
        }
    }
}

impl InstrumentOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables fuzz and metamorphic variants.
    #[must_use]
    pub fn thorough(mut self, thorough: bool) -> Self {
        self.thorough = thorough;
        self
    }

    /// Enables or disables interactive confirmation of baseline cases.
    #[must_use]
    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    /// Sets the import path of the instrumented class.
    #[must_use]
    pub fn module_path(mut self, path: impl Into<String>) -> Self {
        self.module_path = Some(path.into());
        self
    }

    /// The import path generated tests use for `class_name`.
    #[must_use]
    pub fn resolve_module_path(&self, class_name: &str) -> String {
        self.module_path.clone().unwrap_or_else(|| snake_case(class_name))
    }
}

/// `HelperClass` -> `helper_class`
#[must_use]
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if previous_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            previous_lower = false;
        } else {
            out.push(c);
            previous_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_splits_words() {
        assert_eq!(snake_case("HelperClass"), "helper_class");
        assert_eq!(snake_case("Calculator"), "calculator");
        assert_eq!(snake_case("HTTPClient"), "httpclient");
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: InstrumentOptions = serde_json::from_str(r#"{"thorough": true}"#).unwrap();
        assert_eq!(options, InstrumentOptions::default().thorough(true));
    }
}
