use thiserror::Error;

/// Failure of a registry lookup or store.
///
/// These are ordinary outcomes: a missing object or a type mismatch never
/// panics and never leaves a pool half-written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The object is absent, and either no type was requested or the type
    /// could not be constructed.
    #[error("object `{name}` not found in registry")]
    NotFound { name: String },

    /// The object exists but was stored as a different type.
    #[error("object `{name}` is stored as `{found}`, not `{expected}`")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A single-thread access found the shared pool already in use.
    #[error("single-thread pool is already in use by another caller")]
    PoolContended,

    /// The calling thread's pool is being torn down or is already borrowed.
    #[error("thread-local pool is not available on this thread")]
    ThreadPoolUnavailable,
}

impl RegistryError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, RegistryError::TypeMismatch { .. })
    }

    pub(crate) fn not_found(name: &str) -> Self {
        RegistryError::NotFound {
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = RegistryError::not_found("Mailer");
        assert_eq!(err.to_string(), "object `Mailer` not found in registry");
        assert!(err.is_not_found());
        assert!(!err.is_type_mismatch());
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = RegistryError::TypeMismatch {
            name: "port".to_string(),
            expected: "u16",
            found: "alloc::string::String",
        };
        assert_eq!(
            err.to_string(),
            "object `port` is stored as `alloc::string::String`, not `u16`"
        );
        assert!(err.is_type_mismatch());
    }

    #[test]
    fn test_pool_errors_display() {
        assert_eq!(
            RegistryError::PoolContended.to_string(),
            "single-thread pool is already in use by another caller"
        );
        assert_eq!(
            RegistryError::ThreadPoolUnavailable.to_string(),
            "thread-local pool is not available on this thread"
        );
    }

    #[test]
    fn test_equality() {
        assert_eq!(RegistryError::not_found("a"), RegistryError::not_found("a"));
        assert_ne!(RegistryError::not_found("a"), RegistryError::not_found("b"));
        assert_ne!(RegistryError::PoolContended, RegistryError::ThreadPoolUnavailable);
    }

    #[test]
    fn test_error_trait() {
        let err: &dyn std::error::Error = &RegistryError::not_found("x");
        assert_eq!(err.to_string(), "object `x` not found in registry");
    }
}
