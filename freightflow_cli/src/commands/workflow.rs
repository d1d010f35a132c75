use crate::config::Config;
use crate::documents::read_document;
use anyhow::{Context, Result, bail};
use freightflow_core::{Engine, WorkflowConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub fn load<P: AsRef<Path>>(root: &Path, file: P) -> Result<()> {
    let file_path = file.as_ref();

    println!("Loading workflow from: {}", file_path.display());

    let workflow_json: Value = read_document(file_path)?;

    let mut engine = Engine::new();
    let workflow = engine
        .load_workflow_from_json(workflow_json)
        .context("Workflow validation failed")?;

    println!("Workflow validated successfully");
    print_workflow(&workflow);

    let workflows_dir = Config::workflows_dir(root);
    std::fs::create_dir_all(&workflows_dir).context("Failed to create workflows directory")?;

    let workflow_file = workflows_dir.join(format!("{}.json", workflow.id));

    let json_str =
        serde_json::to_string_pretty(workflow.as_ref()).context("Failed to serialize workflow")?;

    std::fs::write(&workflow_file, json_str).context("Failed to write workflow file")?;

    println!("Workflow saved to: {}", workflow_file.display());

    Ok(())
}

pub fn list(root: &Path) -> Result<()> {
    let workflows_dir = Config::workflows_dir(root);

    if !workflows_dir.exists() {
        println!("No workflows loaded.");
        println!("Load a workflow with: freightflow workflow load <file>");
        return Ok(());
    }

    let mut workflows = Vec::new();

    for entry in std::fs::read_dir(&workflows_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            match load_workflow_from_file(&path) {
                Ok(workflow) => workflows.push(workflow),
                Err(e) => {
                    eprintln!("Failed to load {}: {}", path.display(), e);
                }
            }
        }
    }

    if workflows.is_empty() {
        println!("No workflows found.");
        return Ok(());
    }

    workflows.sort_by(|a, b| a.id.cmp(&b.id));
    println!("Loaded workflows ({}):\n", workflows.len());

    for workflow in workflows {
        print_workflow(&workflow);
        println!();
    }

    Ok(())
}

/// Accepts either a path to a definition file or the id of a saved workflow.
pub fn resolve_workflow_arg(root: &Path, arg: &str) -> Result<WorkflowConfig> {
    let as_path = PathBuf::from(arg);
    if as_path.exists() {
        return load_workflow_from_file(&as_path);
    }

    let saved = Config::workflows_dir(root).join(format!("{}.json", arg));
    if saved.exists() {
        return load_workflow_from_file(&saved);
    }

    bail!(
        "Workflow '{}' is neither a file nor a saved workflow. Load one with: freightflow workflow load <file>",
        arg
    )
}

pub fn load_workflow_from_file<P: AsRef<Path>>(path: P) -> Result<WorkflowConfig> {
    let workflow_json: Value = read_document(path.as_ref())?;

    let mut engine = Engine::new();
    let workflow = engine
        .load_workflow_from_json(workflow_json)
        .context("Failed to load workflow")?;

    Ok(workflow.as_ref().clone())
}

fn print_workflow(workflow: &WorkflowConfig) {
    println!("{}", workflow.name);
    println!("ID:          {}", workflow.id);
    println!("Description: {}", workflow.description);
    println!("Steps:       {}", workflow.steps.len());
    for (i, step) in workflow.steps.iter().enumerate() {
        let condition = match step.condition_value {
            Some(value) => format!("{:?} {}", step.condition_type, value),
            None => format!("{:?}", step.condition_type),
        };
        let kind = if step.is_system_step { "system" } else { "human" };
        println!(
            "  {}. {:<12} {:<28} role={:<20} {} ({})",
            i + 1,
            step.id,
            step.step_name,
            step.role_id,
            condition,
            kind
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"
id: fba_standard
name: FBA Standard
steps:
  - id: L1
    stepName: Operational Review
    roleId: ops_manager
  - id: L2
    stepName: Finance Approval
    roleId: finance_controller
    conditionType: AMOUNT_GT
    conditionValue: 10000
"#;

    #[test]
    fn loaded_workflow_can_be_found_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("fba.yaml");
        std::fs::write(&source, DEFINITION).unwrap();

        load(dir.path(), &source).unwrap();
        let workflow = resolve_workflow_arg(dir.path(), "fba_standard").unwrap();

        assert!(Config::workflows_dir(dir.path()).join("fba_standard.json").exists());
        assert_eq!(workflow.steps.len(), 2);
        assert_eq!(workflow.steps[1].condition_value, Some(10000.0));
    }

    #[test]
    fn invalid_workflow_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("empty.json");
        std::fs::write(&source, r#"{"id": "empty", "name": "Empty", "steps": []}"#).unwrap();

        assert!(load(dir.path(), &source).is_err());
        assert!(!Config::workflows_dir(dir.path()).join("empty.json").exists());
    }

    #[test]
    fn unknown_workflow_arg() {
        let dir = tempfile::tempdir().unwrap();

        let err = resolve_workflow_arg(dir.path(), "ghost").unwrap_err();

        assert!(err.to_string().contains("neither a file nor a saved workflow"));
    }
}
