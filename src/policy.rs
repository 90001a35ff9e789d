//! Threading policies and the pool scopes they resolve to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Behaviour of a registry access in a multi-threaded application.
///
/// Every registry operation takes a policy. [`ThreadingPolicy::Default`] is a
/// placeholder that is replaced by the registry's configured default before
/// the access happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingPolicy {
    /// Maps to the registry's current default policy.
    #[default]
    Default,

    /// One pool for all objects, guarded by a mutex.
    ApplicationGlobal,

    /// One pool for all objects, accessed without waiting on any lock.
    ///
    /// Meant for single-threaded applications. Using it from two threads at
    /// once is a caller error.
    SingleThread,

    /// One pool per thread. Objects are released when the thread exits.
    ThreadLocal,
}

impl ThreadingPolicy {
    /// All concrete policies, i.e. everything except [`ThreadingPolicy::Default`].
    pub const CONCRETE: [ThreadingPolicy; 3] = [
        ThreadingPolicy::ApplicationGlobal,
        ThreadingPolicy::SingleThread,
        ThreadingPolicy::ThreadLocal,
    ];

    /// Replaces [`ThreadingPolicy::Default`] with `default`.
    ///
    /// Concrete policies are returned unchanged. If `default` is itself
    /// `Default`, the result falls back to [`ThreadingPolicy::ThreadLocal`], so
    /// the outcome is always concrete.
    #[must_use]
    pub fn or(self, default: ThreadingPolicy) -> ThreadingPolicy {
        match (self, default) {
            (ThreadingPolicy::Default, ThreadingPolicy::Default) => ThreadingPolicy::ThreadLocal,
            (ThreadingPolicy::Default, default) => default,
            (policy, _) => policy,
        }
    }

    /// The pool scope a concrete policy selects, or `None` for `Default`.
    #[must_use]
    pub fn scope(self) -> Option<PoolScope> {
        match self {
            ThreadingPolicy::Default => None,
            ThreadingPolicy::ApplicationGlobal => Some(PoolScope::GlobalLocked),
            ThreadingPolicy::SingleThread => Some(PoolScope::Unlocked),
            ThreadingPolicy::ThreadLocal => Some(PoolScope::ThreadLocal),
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            ThreadingPolicy::Default => 0,
            ThreadingPolicy::ApplicationGlobal => 1,
            ThreadingPolicy::SingleThread => 2,
            ThreadingPolicy::ThreadLocal => 3,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> ThreadingPolicy {
        match raw {
            1 => ThreadingPolicy::ApplicationGlobal,
            2 => ThreadingPolicy::SingleThread,
            3 => ThreadingPolicy::ThreadLocal,
            _ => ThreadingPolicy::Default,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ThreadingPolicy::Default => "default",
            ThreadingPolicy::ApplicationGlobal => "application_global",
            ThreadingPolicy::SingleThread => "single_thread",
            ThreadingPolicy::ThreadLocal => "thread_local",
        }
    }
}

impl fmt::Display for ThreadingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a threading policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown threading policy `{input}`")]
pub struct ParsePolicyError {
    input: String,
}

impl FromStr for ThreadingPolicy {
    type Err = ParsePolicyError;

    /// Accepts the snake_case names used by `Display`, case-insensitively,
    /// with `-` allowed in place of `_` and `global` as a short form of
    /// `application_global`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");

        match normalized.as_str() {
            "default" => Ok(ThreadingPolicy::Default),
            "application_global" | "global" => Ok(ThreadingPolicy::ApplicationGlobal),
            "single_thread" => Ok(ThreadingPolicy::SingleThread),
            "thread_local" => Ok(ThreadingPolicy::ThreadLocal),
            _ => Err(ParsePolicyError {
                input: s.to_string(),
            }),
        }
    }
}

/// Which pool an access lands in, and how that pool is guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolScope {
    /// The registry-wide pool, behind its mutex.
    GlobalLocked,
    /// The registry-wide pool, without waiting for the mutex.
    Unlocked,
    /// The calling thread's own pool.
    ThreadLocal,
}

impl fmt::Display for PoolScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoolScope::GlobalLocked => "global_locked",
            PoolScope::Unlocked => "unlocked",
            PoolScope::ThreadLocal => "thread_local",
        })
    }
}
