//! Named source fragments and their composition into one compilable unit.
//!
//! Each fragment is split once into include directives and body lines. The
//! composite source puts the deduplicated include set of every fragment
//! first, followed by each body in registration order.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use snafu::{OptionExt, ResultExt};

use crate::error::{FragmentNotFoundSnafu, FragmentReadSnafu, Result};

/// Where a fragment's source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentSource {
    Text(String),
    File(PathBuf),
}

impl FragmentSource {
    pub fn load(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::File(path) => std::fs::read_to_string(&path).context(FragmentReadSnafu { path }),
        }
    }
}

impl From<&str> for FragmentSource {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for FragmentSource {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&Path> for FragmentSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<PathBuf> for FragmentSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

/// Whether `line` matches `^[ \t]*#include\s`.
pub fn is_include_directive(line: &str) -> bool {
    line.trim_start_matches([' ', '\t'])
        .strip_prefix("#include")
        .and_then(|rest| rest.chars().next())
        .is_some_and(char::is_whitespace)
}

/// A parsed source fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFragment {
    includes: Vec<String>,
    body: String,
}

impl CodeFragment {
    pub fn parse(source: &str) -> Self {
        let (includes, body): (Vec<&str>, Vec<&str>) = source.lines().partition(|line| is_include_directive(line));
        Self { includes: includes.into_iter().map(str::to_string).collect(), body: body.join("\n") }
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Non-include lines joined with `\n`.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Includes followed by the body.
    pub fn source(&self) -> String {
        self.includes.iter().map(String::as_str).chain([self.body.as_str()]).collect::<Vec<_>>().join("\n")
    }
}

/// Fragments keyed by name, kept in registration order.
///
/// Re-adding a name replaces its fragment but keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct FragmentStore {
    order: Vec<String>,
    fragments: HashMap<String, CodeFragment>,
}

impl FragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, source: impl Into<FragmentSource>) -> Result<()> {
        let name = name.into();
        let fragment = CodeFragment::parse(&source.into().load()?);
        tracing::debug!(
            fragment.name = %name,
            fragment.includes = fragment.includes.len(),
            "fragment registered"
        );
        if self.fragments.insert(name.clone(), fragment).is_none() {
            self.order.push(name);
        }
        Ok(())
    }

    /// Remove a fragment and return its reconstructed source.
    pub fn pop(&mut self, name: &str) -> Result<String> {
        let fragment = self.fragments.remove(name).context(FragmentNotFoundSnafu { name })?;
        self.order.retain(|registered| registered != name);
        Ok(fragment.source())
    }

    pub fn get(&self, name: &str) -> Option<&CodeFragment> {
        self.fragments.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &CodeFragment> {
        self.order.iter().filter_map(|name| self.fragments.get(name))
    }

    /// Deduplicated includes in first-seen order, then every body in registration order.
    pub fn compose(&self) -> String {
        let mut seen = HashSet::new();
        let includes = self.iter().flat_map(|fragment| fragment.includes()).filter(|line| seen.insert(line.as_str()));
        let bodies = self.iter().map(CodeFragment::body);
        includes.map(String::as_str).chain(bodies).collect::<Vec<_>>().join("\n")
    }
}
