use crate::core::error::{Error, Result};

/// Multi-level labelled tree of attribute values. Each value is a path of labels,
/// one per level from the top, and may stop above the bottom level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyType {
    levels: Vec<String>,
    paths: Vec<Vec<String>>,
    finalized: bool,
}

impl HierarchyType {
    pub fn new(levels: Vec<String>) -> Self {
        HierarchyType {
            levels,
            paths: Vec::new(),
            finalized: false,
        }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn add_value(&mut self, path: Vec<String>) -> Result<()> {
        if self.finalized {
            return Err(Error::invalid_state(format!(
                "Cannot add {} to a finalized hierarchy",
                path.join("/")
            )));
        }
        if path.is_empty() || path.len() > self.levels.len() {
            return Err(Error::invalid_input(format!(
                "Path {} must have between 1 and {} labels",
                path.join("/"),
                self.levels.len()
            )));
        }
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
        Ok(())
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn values(&self, fail_on_non_finalized: bool) -> Result<&[Vec<String>]> {
        if fail_on_non_finalized && !self.finalized {
            return Err(Error::invalid_state("Hierarchy is not finalized; its values are open"));
        }
        Ok(&self.paths)
    }
}

/// Every root-to-leaf label path of a forest, depth first, each leaf once.
/// A node with no children is a leaf wherever it sits.
pub fn leaf_paths<'a, N, C, L>(roots: &'a [N], children: C, label: L) -> Vec<Vec<String>>
where
    C: Fn(&'a N) -> &'a [N],
    L: Fn(&'a N) -> &'a str,
{
    let mut paths = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut stack: Vec<(&'a N, usize)> = roots.iter().rev().map(|node| (node, 0)).collect();

    while let Some((node, depth)) = stack.pop() {
        path.truncate(depth);
        path.push(label(node).to_string());

        let kids = children(node);
        if kids.is_empty() {
            paths.push(path.clone());
        } else {
            stack.extend(kids.iter().rev().map(|kid| (kid, depth + 1)));
        }
    }
    paths
}
