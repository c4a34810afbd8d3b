//! Scope (datacenter) resolution
//!
//! Every store call is addressed to a scope. Callers may pin one explicitly;
//! otherwise the local agent is asked for its own, with a permission-denied
//! answer downgraded to the provider default.

use crate::error::{Error, Result};
use thiserror::Error as ThisError;

/// Provider-level defaults shared by every resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderDefaults {
    /// Scope used when discovery is not permitted
    pub scope: String,
    /// Access token used when a resource does not carry its own
    pub token: String,
}

impl ProviderDefaults {
    pub fn new(scope: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            token: token.into(),
        }
    }

    /// Pick the token for a resource, preferring its own when set
    pub fn token_for<'a>(&'a self, resource_token: Option<&'a str>) -> &'a str {
        match resource_token {
            Some(t) if !t.is_empty() => t,
            _ => &self.token,
        }
    }
}

/// Failure modes of a scope lookup
#[derive(ThisError, Debug)]
pub enum ScopeLookupError {
    /// The agent refused to answer
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Source of the local default scope
pub trait ScopeSource {
    /// Ask the backing agent for its local scope
    fn local_scope(&self) -> std::result::Result<String, ScopeLookupError>;
}

/// Determines the scope for all operations of a reconciliation
pub struct ScopeResolver<'a> {
    defaults: &'a ProviderDefaults,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(defaults: &'a ProviderDefaults) -> Self {
        Self { defaults }
    }

    /// Resolve the scope for a resource.
    ///
    /// An explicit non-empty scope is returned without querying `source`.
    pub fn resolve<S: ScopeSource + ?Sized>(
        &self,
        explicit: Option<&str>,
        source: &S,
    ) -> Result<String> {
        if let Some(scope) = explicit.filter(|s| !s.is_empty()) {
            log::debug!("Using explicit scope {scope}");
            return Ok(scope.to_string());
        }

        match source.local_scope() {
            Ok(scope) => {
                log::debug!("Discovered local scope {scope}");
                Ok(scope)
            }
            Err(ScopeLookupError::PermissionDenied(msg)) => {
                log::warn!(
                    "Scope discovery denied ({msg}), using provider default '{}'",
                    self.defaults.scope
                );
                Ok(self.defaults.scope.clone())
            }
            Err(ScopeLookupError::Other(source)) => Err(Error::ScopeDiscoveryFailed { source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FixedSource {
        answer: fn() -> std::result::Result<String, ScopeLookupError>,
        calls: Cell<usize>,
    }

    impl FixedSource {
        fn new(answer: fn() -> std::result::Result<String, ScopeLookupError>) -> Self {
            Self {
                answer,
                calls: Cell::new(0),
            }
        }
    }

    impl ScopeSource for FixedSource {
        fn local_scope(&self) -> std::result::Result<String, ScopeLookupError> {
            self.calls.set(self.calls.get() + 1);
            (self.answer)()
        }
    }

    #[test]
    fn test_explicit_scope_skips_lookup() {
        let defaults = ProviderDefaults::default();
        let source = FixedSource::new(|| Ok("dc-agent".into()));
        let scope = ScopeResolver::new(&defaults)
            .resolve(Some("dc-explicit"), &source)
            .unwrap();
        assert_eq!(scope, "dc-explicit");
        assert_eq!(source.calls.get(), 0);
    }

    #[test]
    fn test_empty_explicit_scope_queries_agent() {
        let defaults = ProviderDefaults::default();
        let source = FixedSource::new(|| Ok("dc-agent".into()));
        let scope = ScopeResolver::new(&defaults)
            .resolve(Some(""), &source)
            .unwrap();
        assert_eq!(scope, "dc-agent");
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_permission_denied_falls_back_to_default() {
        let defaults = ProviderDefaults::new("dc-default", "");
        let source = FixedSource::new(|| {
            Err(ScopeLookupError::PermissionDenied(
                "403 (Permission denied)".into(),
            ))
        });
        let scope = ScopeResolver::new(&defaults).resolve(None, &source).unwrap();
        assert_eq!(scope, "dc-default");
    }

    #[test]
    fn test_permission_denied_without_default_is_empty() {
        let defaults = ProviderDefaults::default();
        let source = FixedSource::new(|| {
            Err(ScopeLookupError::PermissionDenied(
                "403 (Permission denied)".into(),
            ))
        });
        let scope = ScopeResolver::new(&defaults).resolve(None, &source).unwrap();
        assert_eq!(scope, "");
    }

    #[test]
    fn test_other_failure_is_fatal() {
        let defaults = ProviderDefaults::new("dc-default", "");
        let source =
            FixedSource::new(|| Err(ScopeLookupError::Other(anyhow::anyhow!("connection refused"))));
        let err = ScopeResolver::new(&defaults)
            .resolve(None, &source)
            .unwrap_err();
        assert!(matches!(err, Error::ScopeDiscoveryFailed { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_token_for_prefers_resource_token() {
        let defaults = ProviderDefaults::new("", "provider-token");
        assert_eq!(defaults.token_for(Some("own")), "own");
        assert_eq!(defaults.token_for(Some("")), "provider-token");
        assert_eq!(defaults.token_for(None), "provider-token");
    }
}
