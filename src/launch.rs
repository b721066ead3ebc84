//! Discovery and launch of the web interfaces shipped with the repository

use crate::prompt::Prompter;
use crate::uv::UvRunner;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Entry point every interface directory must contain
pub const INTERFACE_FILE: &str = "gradio_interface.py";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Directory name, e.g. `Standard`
    pub name: String,
    pub path: PathBuf,
}

/// Interfaces under `dir`, sorted by name; empty when `dir` is missing
pub fn discover_interfaces(dir: &Path) -> Vec<Interface> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut interfaces: Vec<Interface> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let script = path.join(INTERFACE_FILE);
            let name = path.file_name()?.to_string_lossy().into_owned();
            script.is_file().then_some(Interface { name, path: script })
        })
        .collect();

    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}

/// Pick an interface by name, or ask for a number when none was requested
pub fn select_interface<'a>(
    interfaces: &'a [Interface],
    requested: Option<&str>,
    prompter: &mut dyn Prompter,
) -> Result<&'a Interface> {
    if interfaces.is_empty() {
        anyhow::bail!("No interfaces found");
    }

    if let Some(requested) = requested {
        return interfaces
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(requested))
            .with_context(|| {
                let names: Vec<_> = interfaces.iter().map(|i| i.name.as_str()).collect();
                format!(
                    "Unknown interface '{}', available: {}",
                    requested,
                    names.join(", ")
                )
            });
    }

    if let [only] = interfaces {
        tracing::info!(interface = %only.name, "Only one interface available");
        return Ok(only);
    }

    println!("\nAvailable interfaces:");
    for (index, interface) in interfaces.iter().enumerate() {
        println!("  {}. {}", index + 1, interface.name);
    }

    let answer = prompter.ask(&format!("Select an interface (1-{})", interfaces.len()))?;
    answer
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| interfaces.get(index))
        .with_context(|| format!("Invalid selection: '{}'", answer.trim()))
}

/// Run an interface to completion from the repository root and return its exit code
pub async fn launch(uv: &UvRunner, interface: &Interface) -> Result<i32> {
    let script = interface
        .path
        .strip_prefix(uv.project_dir())
        .with_context(|| {
            format!(
                "{:?} is outside the repository {:?}",
                interface.path,
                uv.project_dir()
            )
        })?;

    println!("\nStarting Zonos with {} interface...", interface.name);
    let code = uv.run_script(script).await?;
    tracing::info!(interface = %interface.name, exit_code = code, "Interface exited");
    Ok(code)
}
