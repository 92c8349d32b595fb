use std::collections::BTreeMap;

use nalgebra::{Matrix3, Vector3};

/// A value stored under one node of the result tree.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    /// One scalar per collected step.
    ScalarSeries(Vec<f64>),
    /// One `(n_atoms, 3)` frame per collected step.
    VectorFrames(Vec<Vec<Vector3<f64>>>),
    /// One 3x3 tensor per collected step (cells, pressure tensors).
    TensorSeries(Vec<Matrix3<f64>>),
    /// One per-atom tensor frame per collected step.
    TensorFrames(Vec<Vec<Matrix3<f64>>>),
}

/// Hierarchical result namespace addressed by `/`-separated path strings.
///
/// The driver writes collected per-step observables under the `interactive`
/// group while the session is live and copies them under `generic` at close;
/// post-processing reads from `generic`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStore {
    nodes: BTreeMap<String, StoreValue>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, value: StoreValue) {
        self.nodes.insert(path.to_string(), value);
    }

    pub fn get(&self, path: &str) -> Option<&StoreValue> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// A scoped view rooted at `group`; paths inside are relative.
    pub fn open(&mut self, group: &str) -> StoreGroup<'_> {
        StoreGroup {
            store: self,
            prefix: format!("{group}/"),
        }
    }

    /// Names of the leaf nodes directly under `group`.
    pub fn list_nodes(&self, group: &str) -> Vec<String> {
        let prefix = format!("{group}/");
        self.nodes
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(|rest| rest.to_string())
            .collect()
    }

    /// Names of the child groups directly under `group`.
    pub fn list_groups(&self, group: &str) -> Vec<String> {
        let prefix = format!("{group}/");
        let mut groups: Vec<String> = self
            .nodes
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split_once('/').map(|(head, _)| head.to_string()))
            .collect();
        groups.dedup();
        groups
    }

    /// Top-level group names.
    pub fn root_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .nodes
            .keys()
            .filter_map(|k| k.split_once('/').map(|(head, _)| head.to_string()))
            .collect();
        groups.dedup();
        groups
    }
}

/// Mutable view of one group inside a [`ResultStore`].
pub struct StoreGroup<'a> {
    store: &'a mut ResultStore,
    prefix: String,
}

impl StoreGroup<'_> {
    pub fn insert(&mut self, path: &str, value: StoreValue) {
        let full = format!("{}{}", self.prefix, path);
        self.store.insert(&full, value);
    }

    pub fn get(&self, path: &str) -> Option<&StoreValue> {
        self.store.get(&format!("{}{}", self.prefix, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> ResultStore {
        let mut store = ResultStore::new();
        store.insert(
            "interactive/energy_tot",
            StoreValue::ScalarSeries(vec![-1.0, -2.0]),
        );
        store.insert(
            "interactive/steps",
            StoreValue::ScalarSeries(vec![0.0, 100.0]),
        );
        store.insert(
            "generic/dft/energy_free",
            StoreValue::ScalarSeries(vec![-3.0]),
        );
        store
    }

    #[test]
    fn nodes_resolve_by_path_string() {
        let store = populated();
        assert_eq!(
            store.get("interactive/energy_tot"),
            Some(&StoreValue::ScalarSeries(vec![-1.0, -2.0]))
        );
        assert!(store.get("interactive/missing").is_none());
    }

    #[test]
    fn list_nodes_returns_direct_leaves_only() {
        let store = populated();
        assert_eq!(store.list_nodes("interactive"), vec!["energy_tot", "steps"]);
        assert_eq!(store.list_nodes("generic"), Vec::<String>::new());
    }

    #[test]
    fn list_groups_returns_direct_children() {
        let store = populated();
        assert_eq!(store.list_groups("generic"), vec!["dft"]);
        assert_eq!(store.root_groups(), vec!["generic", "interactive"]);
    }

    #[test]
    fn group_views_prefix_their_paths() {
        let mut store = populated();
        let mut group = store.open("generic");
        group.insert("volume", StoreValue::ScalarSeries(vec![8.0]));
        assert!(store.contains("generic/volume"));
    }
}
