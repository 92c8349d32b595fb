use std::collections::BTreeMap;

use nalgebra::{Matrix3, Vector3};

use super::store::{ResultStore, StoreValue};

/// Per-property buffer of collected step observables, keyed by property name.
///
/// `collect` appends one entry per property per step; `close` drains the
/// whole cache into the result store under the given namespace.
#[derive(Debug, Default)]
pub struct StepCache {
    scalars: BTreeMap<String, Vec<f64>>,
    vector_frames: BTreeMap<String, Vec<Vec<Vector3<f64>>>>,
    tensors: BTreeMap<String, Vec<Matrix3<f64>>>,
    tensor_frames: BTreeMap<String, Vec<Vec<Matrix3<f64>>>>,
}

impl StepCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
            && self.vector_frames.is_empty()
            && self.tensors.is_empty()
            && self.tensor_frames.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.scalars.contains_key(key)
            || self.vector_frames.contains_key(key)
            || self.tensors.contains_key(key)
            || self.tensor_frames.contains_key(key)
    }

    pub fn push_scalar(&mut self, key: &str, value: f64) {
        self.scalars.entry(key.to_string()).or_default().push(value);
    }

    pub fn push_vector_frame(&mut self, key: &str, frame: Vec<Vector3<f64>>) {
        self.vector_frames
            .entry(key.to_string())
            .or_default()
            .push(frame);
    }

    pub fn push_tensor(&mut self, key: &str, tensor: Matrix3<f64>) {
        self.tensors
            .entry(key.to_string())
            .or_default()
            .push(tensor);
    }

    pub fn push_tensor_frame(&mut self, key: &str, frame: Vec<Matrix3<f64>>) {
        self.tensor_frames
            .entry(key.to_string())
            .or_default()
            .push(frame);
    }

    /// Moves every buffered series into `store` under `namespace/…`.
    pub fn flush_into(&mut self, store: &mut ResultStore, namespace: &str) {
        for (key, series) in std::mem::take(&mut self.scalars) {
            store.insert(&format!("{namespace}/{key}"), StoreValue::ScalarSeries(series));
        }
        for (key, series) in std::mem::take(&mut self.vector_frames) {
            store.insert(&format!("{namespace}/{key}"), StoreValue::VectorFrames(series));
        }
        for (key, series) in std::mem::take(&mut self.tensors) {
            store.insert(&format!("{namespace}/{key}"), StoreValue::TensorSeries(series));
        }
        for (key, series) in std::mem::take(&mut self.tensor_frames) {
            store.insert(&format!("{namespace}/{key}"), StoreValue::TensorFrames(series));
        }
    }
}
