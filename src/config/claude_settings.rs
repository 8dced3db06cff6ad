//! Claude Code settings writer for hook registration
//!
//! `ccnotify install` adds a command hook for each event in [`HOOK_EVENTS`]
//! to the user settings file (`~/.claude/settings.json`). Existing settings
//! and unrelated hooks are preserved, and a run that changes nothing leaves
//! the file untouched.

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Claude Code hook events and the ccnotify subcommand handling each
pub const HOOK_EVENTS: [(&str, &str); 2] = [("Stop", "stop"), ("Notification", "notification")];

/// Default Claude Code user settings path
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude").join("settings.json"))
}

/// Register ccnotify hooks in the settings file at `path`
///
/// `binary` is the command Claude Code runs (usually the absolute path of
/// the current executable). Returns the events that were added; an empty
/// list means every hook was already present.
pub fn register_hooks(path: &Path, binary: &str) -> Result<Vec<&'static str>> {
    let mut root = read_settings(path)?;
    let added = merge_hooks(&mut root, binary)?;

    if added.is_empty() {
        debug!("Hooks already registered in {:?}", path);
        return Ok(added);
    }

    if path.exists() {
        let backup = path.with_extension("json.bak");
        std::fs::copy(path, &backup)
            .with_context(|| format!("Failed to back up {:?} to {:?}", path, backup))?;
        info!("Backed up settings to {:?}", backup);
    } else if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let mut content = serde_json::to_string_pretty(&root)?;
    content.push('\n');
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
    info!("Registered hooks {:?} in {:?}", added, path);

    Ok(added)
}

/// Read settings JSON; a missing or blank file is an empty object
fn read_settings(path: &Path) -> Result<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(json!({})),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
    };
    if content.trim().is_empty() {
        return Ok(json!({}));
    }
    let value: Value =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
    if !value.is_object() {
        bail!("Settings file {:?} is not a JSON object", path);
    }
    Ok(value)
}

/// Add missing hook groups to `root`, returning the events that changed
fn merge_hooks(root: &mut Value, binary: &str) -> Result<Vec<&'static str>> {
    let Some(root) = root.as_object_mut() else {
        bail!("Settings root is not a JSON object");
    };
    let hooks = root
        .entry("hooks")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(hooks) = hooks.as_object_mut() else {
        bail!("\"hooks\" is not a JSON object");
    };

    let mut added = Vec::new();
    for (event, subcommand) in HOOK_EVENTS {
        let command = format!("{} {}", binary, subcommand);
        let groups = hooks
            .entry(event)
            .or_insert_with(|| Value::Array(Vec::new()));
        let Some(groups) = groups.as_array_mut() else {
            bail!("\"hooks.{}\" is not a JSON array", event);
        };

        if groups.iter().any(|group| has_command(group, &command)) {
            continue;
        }
        groups.push(json!({
            "matcher": "",
            "hooks": [{ "type": "command", "command": command }],
        }));
        added.push(event);
    }
    Ok(added)
}

fn has_command(group: &Value, command: &str) -> bool {
    group
        .get("hooks")
        .and_then(Value::as_array)
        .is_some_and(|hooks| {
            hooks
                .iter()
                .any(|hook| hook.get("command").and_then(Value::as_str) == Some(command))
        })
}
