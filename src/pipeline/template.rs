//! Immutable workflow template

use std::fmt;

/// One stage of the workflow template and its direct successors.
///
/// A template is an owned tree built once before any run and never mutated
/// afterwards; ownership of the successor list makes cycles unrepresentable,
/// so any constructible template is acyclic. Every document's job-instance
/// tree is stamped out of the same template by deep copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowNode {
    name: String,
    successors: Vec<WorkflowNode>,
}

impl WorkflowNode {
    /// Create a stage with no successors
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            successors: Vec::new(),
        }
    }

    /// Replace the successor list and return the node, enabling fluent
    /// single-expression construction:
    ///
    /// ```ignore
    /// let template = WorkflowNode::new("extractor").then([
    ///     WorkflowNode::new("tokenizer")
    ///         .then([WorkflowNode::new("pos"), WorkflowNode::new("freqdist")]),
    /// ]);
    /// ```
    ///
    /// Consuming `self` means a node cannot be aliased across branches while
    /// it is still being built.
    pub fn then(mut self, successors: impl IntoIterator<Item = WorkflowNode>) -> Self {
        self.successors = successors.into_iter().collect();
        self
    }

    /// Stage name, an opaque worker-type selector for the manager
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct successors to run after this stage completes
    pub fn successors(&self) -> &[WorkflowNode] {
        &self.successors
    }

    /// Total number of stages in this subtree
    pub fn stage_count(&self) -> usize {
        1 + self.successors.iter().map(WorkflowNode::stage_count).sum::<usize>()
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{}{}", "  ".repeat(depth), self.name)?;
        for successor in &self.successors {
            successor.render(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkflowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_then_replaces_successors() {
        let node = WorkflowNode::new("extractor")
            .then([WorkflowNode::new("old")])
            .then([WorkflowNode::new("tokenizer")]);

        assert_eq!(node.successors().len(), 1);
        assert_eq!(node.successors()[0].name(), "tokenizer");
    }

    #[test]
    fn test_fluent_tree_construction() {
        let template = WorkflowNode::new("extractor").then([WorkflowNode::new("tokenizer")
            .then([WorkflowNode::new("pos"), WorkflowNode::new("freqdist")])]);

        assert_eq!(template.name(), "extractor");
        assert_eq!(template.stage_count(), 4);

        let tokenizer = &template.successors()[0];
        assert_eq!(tokenizer.name(), "tokenizer");
        assert_eq!(tokenizer.successors().len(), 2);
    }

    #[test]
    fn test_display_renders_indented_tree() {
        let template =
            WorkflowNode::new("a").then([WorkflowNode::new("b").then([WorkflowNode::new("c")])]);

        assert_eq!(template.to_string(), "a\n  b\n    c\n");
    }
}
