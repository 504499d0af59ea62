//! Declarative pipeline shape and compilation into a workflow template

use crate::pipeline::WorkflowNode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Declarative pipeline: a flat stage list with "run after" edges,
/// compiled into the immutable [`WorkflowNode`] tree the engine consumes
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Stages of the pipeline
    pub stages: Vec<StageConfig>,
}

/// One stage and the stages to run after it completes
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    /// Stage name (worker-type selector for the manager)
    pub name: String,

    /// Names of the stages to fan out to on completion
    #[serde(default)]
    pub then: Vec<String>,
}

impl PipelineConfig {
    /// The built-in pipeline used when no configuration provides one:
    /// extractor -> tokenizer -> {pos, freqdist}
    pub fn default_pipeline() -> Self {
        Self {
            stages: vec![
                StageConfig {
                    name: "extractor".into(),
                    then: vec!["tokenizer".into()],
                },
                StageConfig {
                    name: "tokenizer".into(),
                    then: vec!["pos".into(), "freqdist".into()],
                },
                StageConfig {
                    name: "pos".into(),
                    then: Vec::new(),
                },
                StageConfig {
                    name: "freqdist".into(),
                    then: Vec::new(),
                },
            ],
        }
    }

    /// Validate the pipeline shape before compilation
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.stages.is_empty() {
            errors.push("pipeline has no stages".to_string());
            return Err(errors);
        }

        let mut names = HashSet::new();
        for stage in &self.stages {
            if !names.insert(stage.name.as_str()) {
                errors.push(format!("duplicate stage '{}'", stage.name));
            }
        }

        // Each stage may be the successor of at most one other stage: the
        // supported shape is a tree rooted at a single entry stage.
        let mut predecessor_counts: HashMap<&str, usize> = HashMap::new();
        for stage in &self.stages {
            for successor in &stage.then {
                if !names.contains(successor.as_str()) {
                    errors.push(format!(
                        "stage '{}' runs unknown stage '{}' on completion",
                        stage.name, successor
                    ));
                    continue;
                }
                *predecessor_counts.entry(successor.as_str()).or_default() += 1;
            }
        }
        for (name, count) in &predecessor_counts {
            if *count > 1 {
                errors.push(format!("stage '{}' has {} predecessors, expected at most 1", name, count));
            }
        }

        // Exactly one root stage may exist
        let roots: Vec<&str> = self
            .stages
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| !predecessor_counts.contains_key(name))
            .collect();
        match roots.len() {
            1 => {}
            0 => errors.push("pipeline has no root stage (cyclic shape)".to_string()),
            _ => errors.push(format!("pipeline has multiple root stages: {}", roots.join(", "))),
        }

        // A single root and at-most-one-predecessor do not rule out a cycle
        // among non-root stages (it forms its own island where every member
        // has exactly one predecessor). Every stage must be reachable from
        // the root, which makes the shape a tree.
        if errors.is_empty() {
            let edges: HashMap<&str, &[String]> = self
                .stages
                .iter()
                .map(|s| (s.name.as_str(), s.then.as_slice()))
                .collect();

            let mut reachable = HashSet::new();
            let mut frontier = vec![roots[0]];
            while let Some(name) = frontier.pop() {
                if reachable.insert(name) {
                    if let Some(successors) = edges.get(name) {
                        frontier.extend(successors.iter().map(String::as_str));
                    }
                }
            }

            for stage in &self.stages {
                if !reachable.contains(stage.name.as_str()) {
                    errors.push(format!(
                        "stage '{}' is unreachable from root '{}' (cyclic shape)",
                        stage.name, roots[0]
                    ));
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Compile the stage list into a workflow template
    pub fn build(&self) -> anyhow::Result<WorkflowNode> {
        self.validate().map_err(|errors| {
            anyhow::anyhow!("invalid pipeline:\n  {}", errors.join("\n  "))
        })?;

        let edges: HashMap<&str, &[String]> = self
            .stages
            .iter()
            .map(|s| (s.name.as_str(), s.then.as_slice()))
            .collect();

        let referenced: HashSet<&str> = self
            .stages
            .iter()
            .flat_map(|s| s.then.iter().map(String::as_str))
            .collect();

        // validate() guarantees exactly one root exists
        let root = self
            .stages
            .iter()
            .map(|s| s.name.as_str())
            .find(|name| !referenced.contains(name))
            .ok_or_else(|| anyhow::anyhow!("pipeline has no root stage"))?;

        fn build_node(name: &str, edges: &HashMap<&str, &[String]>) -> WorkflowNode {
            let successors = edges
                .get(name)
                .into_iter()
                .flat_map(|s| s.iter())
                .map(|successor| build_node(successor, edges));
            WorkflowNode::new(name).then(successors.collect::<Vec<_>>())
        }

        Ok(build_node(root, &edges))
    }
}
