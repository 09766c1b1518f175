//! Lexical binding environment.
//!
//! Frames live in an arena and point at their parent by index. Child frames
//! shadow their ancestors; `set` writes through to the frame that owns a name.

use std::collections::HashMap;

use crate::error::ExecutionError;
use crate::vsa::HyperVec;

#[derive(Debug, Clone, Default)]
struct Frame {
    parent: Option<usize>,
    bindings: HashMap<String, HyperVec>,
}

/// Arena of scope frames with a cursor on the active frame.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    frames: Vec<Frame>,
    current: usize,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// A tree holding only the root frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
            current: 0,
        }
    }

    /// Bind `name` in the active frame. Fails if the frame already owns it.
    pub fn define(&mut self, name: &str, value: HyperVec, line: usize) -> Result<(), ExecutionError> {
        let frame = &mut self.frames[self.current];
        if frame.bindings.contains_key(name) {
            return Err(ExecutionError::DuplicateDefinition {
                name: name.to_string(),
                line,
            });
        }
        frame.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Update the nearest frame owning `name`, or bind it locally.
    pub fn set(&mut self, name: &str, value: HyperVec) {
        let owner = self.owner_of(name).unwrap_or(self.current);
        self.frames[owner].bindings.insert(name.to_string(), value);
    }

    /// Resolve `name`, walking from the active frame to the root.
    pub fn lookup(&self, name: &str) -> Option<&HyperVec> {
        self.owner_of(name)
            .and_then(|idx| self.frames[idx].bindings.get(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.owner_of(name).is_some()
    }

    /// True if the active frame itself binds `name`.
    pub fn has_local(&self, name: &str) -> bool {
        self.frames[self.current].bindings.contains_key(name)
    }

    /// Open a child frame of the active one and make it active.
    pub fn push_child(&mut self) {
        self.frames.push(Frame {
            parent: Some(self.current),
            bindings: HashMap::new(),
        });
        self.current = self.frames.len() - 1;
    }

    /// Close the active frame, returning to its parent. The root is never popped.
    pub fn pop(&mut self) {
        if let Some(parent) = self.frames[self.current].parent {
            if self.current == self.frames.len() - 1 {
                self.frames.pop();
            }
            self.current = parent;
        }
    }

    /// Depth of the active frame (root is 0).
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.frames[self.current].parent;
        while let Some(idx) = cursor {
            depth += 1;
            cursor = self.frames[idx].parent;
        }
        depth
    }

    /// Names bound in the root frame, sorted.
    pub fn root_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.frames[0].bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn owner_of(&self, name: &str) -> Option<usize> {
        let mut cursor = Some(self.current);
        while let Some(idx) = cursor {
            let frame = &self.frames[idx];
            if frame.bindings.contains_key(name) {
                return Some(idx);
            }
            cursor = frame.parent;
        }
        None
    }
}
