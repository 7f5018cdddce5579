//! Composite indexers: positional compounds and predicate-gated
//! delegation.

use super::{Arg, Indexer, Keys};
use crate::error::{Error, Result};

/// Concatenates the keys of its components in declaration order. Query
/// arguments are positional, one per component. If any component
/// reports missing, the whole compound is missing.
pub struct Compound<R> {
    components: Vec<Box<dyn Indexer<R>>>,
}

impl<R> Compound<R> {
    pub fn new(components: Vec<Box<dyn Indexer<R>>>) -> Self {
        assert!(
            !components.is_empty(),
            "a compound index needs at least one component"
        );
        Self { components }
    }
}

impl<R> Indexer<R> for Compound<R> {
    fn from_record(&self, record: &R) -> Result<Keys> {
        let mut out = Vec::new();
        for component in &self.components {
            match component.from_record(record)? {
                Keys::One(key) => out.extend_from_slice(&key),
                Keys::Missing => return Ok(Keys::Missing),
                Keys::Many(_) => {
                    return Err(Error::ArgMismatch(
                        "compound components must be single-valued".into(),
                    ))
                }
            }
        }
        Ok(Keys::One(out))
    }

    fn from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        if args.len() != self.components.len() {
            return Err(Error::ArgMismatch(format!(
                "expected {} arguments, got {}",
                self.components.len(),
                args.len()
            )));
        }
        let mut out = Vec::new();
        for (component, arg) in self.components.iter().zip(args) {
            out.extend_from_slice(&component.from_args(std::slice::from_ref(arg))?);
        }
        Ok(out)
    }

    /// A compound prefix fixes the leading components exactly and leaves
    /// the last supplied one open. Fewer arguments than components is
    /// allowed; more is not.
    fn prefix_from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        if args.len() > self.components.len() {
            return Err(Error::ArgMismatch(format!(
                "expected at most {} arguments, got {}",
                self.components.len(),
                args.len()
            )));
        }
        let mut out = Vec::new();
        for (i, (component, arg)) in self.components.iter().zip(args).enumerate() {
            let arg = std::slice::from_ref(arg);
            let last = i + 1 == args.len();
            let key = if last && component.supports_prefix() {
                component.prefix_from_args(arg)?
            } else {
                component.from_args(arg)?
            };
            out.extend_from_slice(&key);
        }
        Ok(out)
    }

    fn supports_prefix(&self) -> bool {
        true
    }
}

/// Indexes a record only when the predicate holds; otherwise the record
/// is treated as missing for this index. Lookups delegate unchanged.
pub struct Conditional<R> {
    predicate: Box<dyn Fn(&R) -> bool + Send + Sync>,
    inner: Box<dyn Indexer<R>>,
}

impl<R> Conditional<R> {
    pub fn new(
        predicate: impl Fn(&R) -> bool + Send + Sync + 'static,
        inner: impl Indexer<R> + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner: Box::new(inner),
        }
    }
}

impl<R> Indexer<R> for Conditional<R> {
    fn from_record(&self, record: &R) -> Result<Keys> {
        if (self.predicate)(record) {
            self.inner.from_record(record)
        } else {
            Ok(Keys::Missing)
        }
    }

    fn from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        self.inner.from_args(args)
    }

    fn prefix_from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        self.inner.prefix_from_args(args)
    }

    fn supports_prefix(&self) -> bool {
        self.inner.supports_prefix()
    }
}
