use crate::config::{ConfigError, validate_scope};

/// Module-path scope predicate.
///
/// A module is in scope when it equals one of the prefixes or is nested
/// below one (`a::b` covers `a::b` and `a::b::c`, not `a::bc`). A filter
/// without prefixes covers every module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    prefixes: Vec<String>,
}

impl ScopeFilter {
    /// Every module is in scope.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn prefixes<I, S>(prefixes: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(Into::into)
            .map(|p| validate_scope(&p).map(|()| p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { prefixes })
    }

    pub fn is_unrestricted(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn contains(&self, module_path: &str) -> bool {
        if self.prefixes.is_empty() {
            return true;
        }
        self.prefixes.iter().any(|prefix| {
            module_path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
    }
}
