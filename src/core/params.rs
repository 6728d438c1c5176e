//! Keyed shader parameter collections
//!
//! Light-group renderers publish their per-view shader parameters into a
//! `ParameterSet`. Keys are plain strings; per-group keys are composed with
//! the group's composition name. Absence of a key is meaningful: optional
//! parameters are omitted, never written as zeros.

use std::collections::HashMap;
use wgpu::TextureView;

/// A single published parameter value
#[derive(Debug)]
pub enum ParameterValue<'a> {
    Float(f32),
    UInt(u32),
    /// Raw POD payload, e.g. a packed light array
    Data(Vec<u8>),
    Texture(&'a TextureView),
}

/// Per-view shader parameter collection, transient to one draw
#[derive(Debug, Default)]
pub struct ParameterSet<'a> {
    values: HashMap<String, ParameterValue<'a>>,
}

impl<'a> ParameterSet<'a> {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set_float(&mut self, key: impl Into<String>, value: f32) {
        self.values.insert(key.into(), ParameterValue::Float(value));
    }

    pub fn set_uint(&mut self, key: impl Into<String>, value: u32) {
        self.values.insert(key.into(), ParameterValue::UInt(value));
    }

    pub fn set_data<T: bytemuck::Pod>(&mut self, key: impl Into<String>, data: &[T]) {
        self.values.insert(
            key.into(),
            ParameterValue::Data(bytemuck::cast_slice(data).to_vec()),
        );
    }

    pub fn set_texture(&mut self, key: impl Into<String>, view: &'a TextureView) {
        self.values.insert(key.into(), ParameterValue::Texture(view));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.values.get(key) {
            Some(ParameterValue::Float(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_uint(&self, key: &str) -> Option<u32> {
        match self.values.get(key) {
            Some(ParameterValue::UInt(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_data(&self, key: &str) -> Option<&[u8]> {
        match self.values.get(key) {
            Some(ParameterValue::Data(data)) => Some(data),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Compose a parameter key with a light-group composition name
pub fn composed(key: &str, composition: &str) -> String {
    format!("{key}.{composition}")
}
