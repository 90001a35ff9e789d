use std::fmt;

use crate::PoolScope;

/// Events emitted by a registry during operations.
///
/// These are passed to the callback set via
/// [`DependencyRegistry::set_trace_callback`](crate::DependencyRegistry::set_trace_callback).
/// The `Clone` derive allows callbacks to store or forward events.
///
/// # Examples
///
/// ```rust
/// use dependency_registry::{PoolScope, RegistryEvent};
///
/// let event = RegistryEvent::Get {
///     name: "Mailer".to_string(),
///     scope: PoolScope::GlobalLocked,
///     found: true,
/// };
/// assert_eq!(event.to_string(), "get { name: Mailer, scope: global_locked, found: true }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A value was stored, replacing any previous one.
    Store {
        name: String,
        /// The declared type, e.g. `alloc::string::String`.
        type_name: &'static str,
        scope: PoolScope,
    },

    /// A value was requested.
    Get {
        name: String,
        scope: PoolScope,
        /// Whether a value was returned, including a freshly constructed one.
        found: bool,
    },

    /// A missing value was built by its registered constructor and stored.
    Construct {
        name: String,
        type_name: &'static str,
        scope: PoolScope,
    },

    /// A `has`/`type_of` check was performed.
    Contains {
        name: String,
        scope: PoolScope,
        found: bool,
    },

    /// A pool was torn down.
    Teardown {
        scope: PoolScope,
        /// Number of entries the pool held.
        released: usize,
    },
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryEvent::Store {
                name,
                type_name,
                scope,
            } => write!(
                f,
                "store {{ name: {name}, type_name: {type_name}, scope: {scope} }}"
            ),
            RegistryEvent::Get { name, scope, found } => {
                write!(f, "get {{ name: {name}, scope: {scope}, found: {found} }}")
            }
            RegistryEvent::Construct {
                name,
                type_name,
                scope,
            } => write!(
                f,
                "construct {{ name: {name}, type_name: {type_name}, scope: {scope} }}"
            ),
            RegistryEvent::Contains { name, scope, found } => {
                write!(f, "contains {{ name: {name}, scope: {scope}, found: {found} }}")
            }
            RegistryEvent::Teardown { scope, released } => {
                write!(f, "teardown {{ scope: {scope}, released: {released} }}")
            }
        }
    }
}
