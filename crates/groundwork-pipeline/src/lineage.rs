//! Artifact lineage validation.

use std::collections::BTreeMap;

use groundwork_core::pipeline::{Pipeline, SOURCE_ARTIFACT};
use groundwork_core::{Error, Result};

/// Check artifact lineage across a pipeline's stages.
///
/// Every artifact an action consumes must be produced by some strictly
/// earlier stage, or be the designated external source artifact. Every
/// artifact name is produced at most once. Runs before any stage starts, so
/// a bad pipeline never executes at all.
pub fn validate_lineage(pipeline: &Pipeline) -> Result<()> {
    // artifact name -> stage index that produces it
    let mut produced: BTreeMap<&str, usize> = BTreeMap::new();

    for (index, stage) in pipeline.stages.iter().enumerate() {
        for action in &stage.actions {
            for input in &action.inputs {
                if input == SOURCE_ARTIFACT {
                    continue;
                }
                match produced.get(input.as_str()) {
                    Some(at) if *at < index => {}
                    _ => {
                        return Err(Error::UnknownArtifact {
                            stage: stage.name.clone(),
                            artifact: input.clone(),
                        });
                    }
                }
            }
        }
        // Outputs land after inputs are checked: a stage cannot consume its
        // own outputs.
        for action in &stage.actions {
            for output in &action.outputs {
                if produced.insert(output, index).is_some() {
                    return Err(Error::DuplicateArtifact {
                        stage: stage.name.clone(),
                        artifact: output.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
