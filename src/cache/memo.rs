//! Memo Cache Module
//!
//! Memoizes a pure function behind an unbounded, caller-owned map.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

type KeyGenerator<A> = Box<dyn Fn(&A) -> String + Send + Sync>;

// == Memo Cache ==
/// Wraps `f` so that each distinct argument is computed once.
///
/// By default the key is the JSON serialization of the argument, so a tuple
/// `(1, "a")` becomes `[1,"a"]`. That is only collision-free when the
/// serialization is injective for the argument type. For anything
/// non-trivial supply a key generator with `with_key`.
///
/// There is no eviction or expiry; the map lives as long as the wrapper.
/// If `f` is impure the cache silently hides it.
pub struct MemoCache<A, R, F> {
    func: F,
    key_generator: Option<KeyGenerator<A>>,
    results: HashMap<String, R>,
}

impl<A, R, F> MemoCache<A, R, F>
where
    A: Serialize,
    R: Clone,
    F: Fn(&A) -> R,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            key_generator: None,
            results: HashMap::new(),
        }
    }

    /// Derives cache keys with `key_generator` instead of serializing arguments.
    pub fn with_key(mut self, key_generator: impl Fn(&A) -> String + Send + Sync + 'static) -> Self {
        self.key_generator = Some(Box::new(key_generator));
        self
    }

    // == Call ==
    /// Returns the cached result for `args`, computing it on first use.
    ///
    /// Arguments that cannot be serialized are computed every time.
    pub fn call(&mut self, args: A) -> R {
        let key = match self.key_for(&args) {
            Ok(key) => key,
            Err(e) => {
                warn!("Memo key for argument could not be derived, bypassing cache: {}", e);
                return (self.func)(&args);
            }
        };

        if let Some(result) = self.results.get(&key) {
            return result.clone();
        }

        let result = (self.func)(&args);
        self.results.insert(key, result.clone());
        result
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    fn key_for(&self, args: &A) -> serde_json::Result<String> {
        match &self.key_generator {
            Some(generate) => Ok(generate(args)),
            None => serde_json::to_string(args),
        }
    }
}

impl<A, R, F> fmt::Debug for MemoCache<A, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("entries", &self.results.len())
            .field("custom_key", &self.key_generator.is_some())
            .finish()
    }
}
