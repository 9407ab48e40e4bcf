//! Pipeline declaration parsing.
//!
//! ```kdl
//! pipeline "warehouse-sql"
//!
//! stage "Source" {
//!     action "github-source" {
//!         source
//!         output "source"
//!     }
//! }
//!
//! stage "Build" {
//!     action "sql-build" {
//!         run "psql -f init.sql"
//!         input "source"
//!         output "sql-bundle"
//!     }
//! }
//! ```

use kdl::{KdlDocument, KdlNode};
use std::collections::BTreeSet;

use groundwork_core::pipeline::{Action, ActionKind, Pipeline, Stage};

use crate::{ConfigError, ConfigResult};

/// Parse a pipeline definition from KDL text.
///
/// Stage order in the file is the total stage order of the pipeline.
/// Artifact lineage itself is enforced by the orchestrator before a run
/// starts; parsing only checks structure.
pub fn parse_pipeline(kdl: &str) -> ConfigResult<Pipeline> {
    let doc: KdlDocument = kdl.parse()?;

    let mut name = String::new();
    let mut stages = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "pipeline" => {
                name = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("pipeline name".to_string()))?;
            }
            "stage" => stages.push(parse_stage(node)?),
            _ => {} // Ignore unknown nodes
        }
    }

    if name.is_empty() {
        return Err(ConfigError::MissingField("pipeline name".to_string()));
    }
    if stages.is_empty() {
        return Err(ConfigError::MissingField(format!(
            "stages for pipeline '{name}'"
        )));
    }

    let mut seen = BTreeSet::new();
    for stage in &stages {
        if !seen.insert(stage.name.clone()) {
            return Err(ConfigError::Duplicate(format!("stage '{}'", stage.name)));
        }
    }

    Ok(Pipeline { name, stages })
}

fn parse_stage(node: &KdlNode) -> ConfigResult<Stage> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("stage name".to_string()))?;

    let mut actions = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "action" {
                actions.push(parse_action(&name, child)?);
            }
        }
    }

    if actions.is_empty() {
        return Err(ConfigError::MissingField(format!(
            "actions for stage '{name}'"
        )));
    }

    let mut seen = BTreeSet::new();
    for action in &actions {
        if !seen.insert(action.name.clone()) {
            return Err(ConfigError::Duplicate(format!(
                "action '{}' in stage '{name}'",
                action.name
            )));
        }
    }

    Ok(Stage { name, actions })
}

fn parse_action(stage: &str, node: &KdlNode) -> ConfigResult<Action> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField(format!("action name in stage '{stage}'")))?;

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut kind: Option<ActionKind> = None;
    let mut commands = Vec::new();
    let mut publish = false;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "input" => inputs.extend(get_all_string_args(child)),
                "output" => outputs.extend(get_all_string_args(child)),
                "source" => kind = Some(ActionKind::Source),
                "run" => {
                    if let Some(cmd) = get_first_string_arg(child) {
                        commands.push(cmd);
                    }
                }
                "publish" => {
                    publish = true;
                    if let Some(cmd) = get_first_string_arg(child) {
                        commands.push(cmd);
                    }
                }
                "deploy" => {
                    let stack = get_string_prop(child, "stack").ok_or_else(|| {
                        ConfigError::MissingField(format!("deploy stack in action '{name}'"))
                    })?;
                    kind = Some(ActionKind::Deploy { stack });
                }
                _ => {}
            }
        }
    }

    let kind = match kind {
        Some(kind) if commands.is_empty() => kind,
        Some(_) => {
            return Err(ConfigError::InvalidValue {
                field: format!("action '{name}'"),
                message: "run/publish cannot be combined with source or deploy".to_string(),
            });
        }
        None if !commands.is_empty() => {
            if publish {
                ActionKind::PublishAssets { commands }
            } else {
                ActionKind::Build { commands }
            }
        }
        None => {
            return Err(ConfigError::MissingField(format!(
                "action '{name}' declares nothing to do"
            )));
        }
    };

    Ok(Action {
        name,
        inputs,
        outputs,
        kind,
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}
