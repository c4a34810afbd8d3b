//! `show` - print tracked keys and their values

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use reconcile::Entry;
use std::collections::BTreeMap;

use crate::Context;
use crate::cli::ShowArgs;
use crate::commands::tracked_names;
use crate::state::{ResourceState, State};
use crate::ui;

const VALUE_WIDTH: usize = 50;

pub fn run(ctx: &Context, args: &ShowArgs) -> Result<()> {
    let state = ctx.state_file()?;
    let selected = select(&state.state, args.target.resource.as_deref())?;

    if args.json {
        println!("{}", render_json(&selected)?);
        return Ok(());
    }

    if selected.is_empty() {
        ui::info(&format!("Nothing tracked in {}", state.path().display()));
        return Ok(());
    }

    ui::header("Tracked Consul Keys");
    for (name, resource) in &selected {
        show_resource(name, resource);
    }

    Ok(())
}

fn select<'a>(
    state: &'a State,
    target: Option<&str>,
) -> Result<BTreeMap<String, &'a ResourceState>> {
    let mut selected = BTreeMap::new();
    for name in tracked_names(state, target)? {
        if let Some(resource) = state.get(&name) {
            selected.insert(name, resource);
        }
    }
    Ok(selected)
}

fn render_json(selected: &BTreeMap<String, &ResourceState>) -> Result<String> {
    serde_json::to_string_pretty(selected).context("Failed to serialize state")
}

fn entry_line(entry: &Entry) -> String {
    let value = if entry.is_managed_write() {
        ui::truncate_value(entry.value(), VALUE_WIDTH)
    } else {
        "(read only)".to_string()
    };
    let mut line = format!("{} = {value}", entry.path);
    if entry.flags != 0 {
        line.push_str(&format!(" (flags {})", entry.flags));
    }
    if entry.delete_on_remove {
        line.push_str(" [delete]");
    }
    line
}

fn show_resource(name: &str, resource: &ResourceState) {
    ui::section(name);
    ui::kv("datacenter", &resource.datacenter);
    ui::kv(
        "last applied",
        &resource.last_applied.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    println!("  {}", ui::count(resource.keys.len(), "key").dimmed());
    for entry in resource.keys.iter() {
        println!("    {}", entry_line(entry));
    }

    if !resource.var.is_empty() {
        println!("  {}", "vars".dimmed());
        for (label, value) in &resource.var {
            println!(
                "    {} = {}",
                label.bold(),
                ui::truncate_value(value, VALUE_WIDTH)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::AppliedResult;

    fn state() -> State {
        let mut state = State::default();
        let mut result = AppliedResult {
            entries: [Entry::write("app/v", "2").with_label("v").with_delete(true)]
                .into_iter()
                .collect(),
            scope: "dc1".to_string(),
            ..AppliedResult::default()
        };
        result.vars.insert("v".into(), "2".into());
        state.record("app", &result);
        state.record("other", &AppliedResult::default());
        state
    }

    #[test]
    fn test_select_target() {
        let state = state();
        assert_eq!(select(&state, None).unwrap().len(), 2);
        assert_eq!(
            select(&state, Some("app")).unwrap().keys().collect::<Vec<_>>(),
            vec!["app"]
        );
        assert!(select(&state, Some("missing")).is_err());
    }

    #[test]
    fn test_render_json() {
        let state = state();
        let json = render_json(&select(&state, Some("app")).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["app"]["datacenter"], "dc1");
        assert_eq!(value["app"]["var"]["v"], "2");
        assert_eq!(value["app"]["keys"][0]["path"], "app/v");
    }

    #[test]
    fn test_entry_line() {
        assert_eq!(
            entry_line(&Entry::write("a", "1").with_flags(3).with_delete(true)),
            "a = 1 (flags 3) [delete]"
        );
        assert_eq!(entry_line(&Entry::read("r")), "r = (read only)");
    }
}
