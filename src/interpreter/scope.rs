//! Variable scopes.
//!
//! A scope is a stack of frames. The template body owns the root frame,
//! shared by every top-level code block; only loop bodies push a frame.
//! `assign` writes through to the nearest frame that already holds the
//! name, so an accumulator updated inside a loop survives the loop;
//! `bind` always writes the innermost frame, which is how loop iterators
//! shadow without clobbering an outer variable of the same name.

use rustc_hash::FxHashMap;

use crate::interpreter::value::Value;

#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<FxHashMap<String, Value>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![FxHashMap::default()],
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn pop_frame(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the root frame");
        self.frames.pop();
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Update the nearest existing binding, or define the name in the
    /// innermost frame.
    pub fn assign(&mut self, name: &str, value: Value) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return;
            }
        }
        self.bind(name, value);
    }

    /// Define or overwrite the name in the innermost frame.
    pub fn bind(&mut self, name: &str, value: Value) {
        self.frames
            .last_mut()
            .expect("scope always has a root frame")
            .insert(name.to_string(), value);
    }

    /// Define or overwrite the name in the root frame. Used for bindings
    /// that must outlive any loop, like `__response__`.
    pub fn bind_root(&mut self, name: &str, value: Value) {
        self.frames[0].insert(name.to_string(), value);
    }

    /// The root frame's bindings, for reading results back out after a
    /// run.
    pub fn root(&self) -> &FxHashMap<String, Value> {
        &self.frames[0]
    }
}
