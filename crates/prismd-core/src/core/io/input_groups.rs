use itertools::Itertools;
use nalgebra::Matrix3;

/// A single value inside an input group.
///
/// Only fields that are actually present get serialized; optional settings
/// are simply never added to the group.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Flag(bool),
    Integer(i64),
    Scalar(f64),
    Text(String),
    Vector(Vec<f64>),
    Matrix(Matrix3<f64>),
    Group(Group),
    /// The same key repeated once per group (e.g. multiple `species` blocks).
    Repeated(Vec<Group>),
}

/// An ordered, typed tree of named entries, serialized to the brace-nested,
/// tab-indented input dialect the DFT engine parses:
///
/// ```text
/// structure {
///     cell = [[10.2, 0.0, 0.0], [0.0, 10.2, 0.0], [0.0, 0.0, 10.2]];
///     species {
///         element = "Si";
///         atom {
///             coords = [0.0, 0.0, 0.0];
///             relative = true;
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    entries: Vec<(String, Entry)>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(mut self, key: &str, entry: Entry) -> Self {
        self.entries.push((key.to_string(), entry));
        self
    }

    pub fn flag(self, key: &str, value: bool) -> Self {
        self.push(key, Entry::Flag(value))
    }

    pub fn integer(self, key: &str, value: i64) -> Self {
        self.push(key, Entry::Integer(value))
    }

    pub fn scalar(self, key: &str, value: f64) -> Self {
        self.push(key, Entry::Scalar(value))
    }

    pub fn text(self, key: &str, value: &str) -> Self {
        self.push(key, Entry::Text(value.to_string()))
    }

    pub fn vector(self, key: &str, values: Vec<f64>) -> Self {
        self.push(key, Entry::Vector(values))
    }

    pub fn matrix(self, key: &str, value: Matrix3<f64>) -> Self {
        self.push(key, Entry::Matrix(value))
    }

    pub fn group(self, key: &str, value: Group) -> Self {
        self.push(key, Entry::Group(value))
    }

    pub fn repeated(self, key: &str, groups: Vec<Group>) -> Self {
        self.push(key, Entry::Repeated(groups))
    }

    /// Serializes the tree, preserving entry order and the exact layout the
    /// engine's parser expects (tab indentation, `key = value;` scalars,
    /// braces around nested groups, repeated keys for list entries).
    pub fn to_text(&self) -> String {
        self.write(0)
    }

    fn write(&self, indent: usize) -> String {
        let mut out = String::new();
        for (key, entry) in &self.entries {
            match entry {
                Entry::Repeated(groups) => {
                    for group in groups {
                        out.push_str(&Self::entry_line(
                            key,
                            &Self::group_value(group, indent),
                            indent,
                        ));
                    }
                }
                Entry::Group(group) => {
                    out.push_str(&Self::entry_line(
                        key,
                        &Self::group_value(group, indent),
                        indent,
                    ));
                }
                other => {
                    out.push_str(&Self::entry_line(key, &Self::scalar_value(other), indent));
                }
            }
        }
        out
    }

    fn entry_line(key: &str, value: &str, indent: usize) -> String {
        format!("{}{}{}\n", "\t".repeat(indent), key, value)
    }

    fn group_value(group: &Group, indent: usize) -> String {
        if group.is_empty() {
            " {}".to_string()
        } else {
            format!(" {{\n{}{}}}", group.write(indent + 1), "\t".repeat(indent))
        }
    }

    fn scalar_value(entry: &Entry) -> String {
        match entry {
            Entry::Flag(v) => format!(" = {v};"),
            Entry::Integer(v) => format!(" = {v};"),
            Entry::Scalar(v) => format!(" = {};", fmt_float(*v)),
            Entry::Text(v) => format!(" = {v};"),
            Entry::Vector(values) => {
                format!(" = [{}];", values.iter().map(|v| fmt_float(*v)).join(", "))
            }
            Entry::Matrix(m) => {
                let rows = (0..3)
                    .map(|i| {
                        format!(
                            "[{}]",
                            (0..3).map(|j| fmt_float(m[(i, j)])).join(", ")
                        )
                    })
                    .join(", ");
                format!(" = [{rows}];")
            }
            Entry::Group(_) | Entry::Repeated(_) => unreachable!("handled in write"),
        }
    }
}

fn fmt_float(v: f64) -> String {
    format!("{v:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    #[test]
    fn scalars_flags_and_vectors_serialize_inline() {
        let group = Group::new()
            .integer("maxSteps", 100)
            .scalar("dEnergy", 1e-7)
            .flag("keepRhoFixed", false)
            .vector("coords", vec![0.0, 0.5, 0.5]);
        assert_eq!(
            group.to_text(),
            "maxSteps = 100;\ndEnergy = 1e-7;\nkeepRhoFixed = false;\ncoords = [0.0, 0.5, 0.5];\n"
        );
    }

    #[test]
    fn nested_groups_use_tab_indented_braces() {
        let atom = Group::new().vector("coords", vec![0.0, 0.0, 0.0]).flag("relative", true);
        let species = Group::new().text("element", "\"Si\"").group("atom", atom);
        let structure = Group::new().group("species", species);
        assert_eq!(
            structure.to_text(),
            "species {\n\telement = \"Si\";\n\tatom {\n\t\tcoords = [0.0, 0.0, 0.0];\n\t\trelative = true;\n\t}\n}\n"
        );
    }

    #[test]
    fn repeated_entries_emit_the_key_once_per_group() {
        let a = Group::new().text("element", "\"Al\"");
        let b = Group::new().text("element", "\"O\"");
        let root = Group::new().repeated("species", vec![a, b]);
        assert_eq!(
            root.to_text(),
            "species {\n\telement = \"Al\";\n}\nspecies {\n\telement = \"O\";\n}\n"
        );
    }

    #[test]
    fn empty_groups_collapse_to_braces() {
        let root = Group::new().group("ricQN", Group::new());
        assert_eq!(root.to_text(), "ricQN {}\n");
    }

    #[test]
    fn matrices_serialize_as_nested_lists() {
        let root = Group::new().matrix("cell", Matrix3::identity());
        assert_eq!(
            root.to_text(),
            "cell = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];\n"
        );
    }
}
