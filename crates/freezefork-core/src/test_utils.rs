//! Test utilities for Freezefork

use std::fs;

use tempfile::TempDir;

use crate::builder::DependencyGraphBuilder;
use crate::cad::{CadReference, InMemoryModel};
use crate::graph::DependencyGraph;
use crate::identity::IdentityComputer;

/// Create a temporary directory containing the given files.
pub fn create_files(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    for (path, content) in files {
        let full_path = root.join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }

        fs::write(&full_path, content).unwrap();
    }

    temp_dir
}

/// Empty model anchored at the temp directory, case-sensitive on every host.
pub fn model_in(dir: &TempDir) -> InMemoryModel {
    InMemoryModel::new(dir.path()).unwrap().case_insensitive(false)
}

/// `arm.asm` referencing `base.part` and `arm_drawing.draw`, all present.
pub fn create_arm_assembly() -> (TempDir, InMemoryModel) {
    let dir = create_files(&[
        ("arm.asm", "assembly arm v1"),
        ("base.part", "solid base plate"),
        ("arm_drawing.draw", "drawing sheet 1"),
    ]);
    let model = model_in(&dir)
        .with_root("arm.asm")
        .document(
            "arm.asm",
            vec![
                CadReference::inferred("base.part"),
                CadReference::inferred("arm_drawing.draw"),
            ],
        )
        .unwrap();
    (dir, model)
}

pub fn builder() -> DependencyGraphBuilder {
    DependencyGraphBuilder::new().case_insensitive(false)
}

/// Build and hash the model's active document.
pub fn scan(model: &InMemoryModel) -> DependencyGraph {
    let graph = builder().scan_active(model).unwrap();
    IdentityComputer::with_workers(2).identify(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_arm_assembly() {
        let (dir, _model) = create_arm_assembly();
        let root = dir.path();

        assert!(root.join("arm.asm").exists());
        assert!(root.join("base.part").exists());
        assert!(root.join("arm_drawing.draw").exists());
    }
}
