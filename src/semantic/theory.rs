//! Theory sources: where declarative theory text comes from.
//!
//! A session is constructed with one [`TheorySource`]. The semantic index is
//! built from every theory it lists, in order; `Load "name"` executes a single
//! theory's statements as facts.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TheoryError {
    #[error("theory directory {path} does not exist")]
    #[diagnostic(
        code(hdkb::theory::missing_dir),
        help("Point `theory_dir` at an existing directory of theory files.")
    )]
    MissingDirectory { path: String },

    #[error("failed to read theory file {path}")]
    #[diagnostic(
        code(hdkb::theory::read),
        help("Ensure the theory file exists and is readable UTF-8 text.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("theory \"{name}\" not found")]
    #[diagnostic(
        code(hdkb::theory::not_found),
        help("List the available theories with `TheorySource::theory_names`.")
    )]
    NotFound { name: String },
}

pub type TheoryResult<T> = std::result::Result<T, TheoryError>;

/// One named theory text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TheoryText {
    pub name: String,
    /// File label recorded as fact provenance.
    pub file: String,
    pub text: String,
}

/// Supplier of theory text.
pub trait TheorySource: std::fmt::Debug {
    /// Theory names in load order.
    fn theory_names(&self) -> TheoryResult<Vec<String>>;

    /// Fetch a theory by name.
    fn load(&self, name: &str) -> TheoryResult<TheoryText>;

    /// Every theory in load order.
    fn load_all(&self) -> TheoryResult<Vec<TheoryText>> {
        self.theory_names()?
            .iter()
            .map(|name| self.load(name))
            .collect()
    }
}

/// Theories held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTheory {
    theories: Vec<TheoryText>,
}

impl InMemoryTheory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. The file label is `<name>.sys2`.
    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: &str, text: &str) {
        let theory = TheoryText {
            name: name.to_string(),
            file: format!("{name}.sys2"),
            text: text.to_string(),
        };
        match self.theories.iter_mut().find(|t| t.name == name) {
            Some(existing) => *existing = theory,
            None => self.theories.push(theory),
        }
    }
}

impl TheorySource for InMemoryTheory {
    fn theory_names(&self) -> TheoryResult<Vec<String>> {
        Ok(self.theories.iter().map(|t| t.name.clone()).collect())
    }

    fn load(&self, name: &str) -> TheoryResult<TheoryText> {
        self.theories
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| TheoryError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Theories stored as `<dir>/<name>.<extension>`, loaded in file-name order.
#[derive(Debug, Clone)]
pub struct DirectoryTheory {
    dir: PathBuf,
    extension: String,
}

impl DirectoryTheory {
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> TheoryResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(TheoryError::MissingDirectory {
                path: dir.display().to_string(),
            });
        }
        Ok(Self {
            dir,
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{}", self.extension))
    }
}

impl TheorySource for DirectoryTheory {
    fn theory_names(&self) -> TheoryResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| TheoryError::Read {
            path: self.dir.display().to_string(),
            source: e,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TheoryError::Read {
                path: self.dir.display().to_string(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str()) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn load(&self, name: &str) -> TheoryResult<TheoryText> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(TheoryError::NotFound {
                name: name.to_string(),
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|e| TheoryError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(TheoryText {
            name: name.to_string(),
            file: path.display().to_string(),
            text,
        })
    }
}
