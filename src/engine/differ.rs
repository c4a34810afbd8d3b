//! Plan computation and display

use anyhow::Result;
use colored::Colorize;
use reconcile::{ChangeSet, EntrySet, Operation, Plan, plan, teardown_plan};
use similar::{ChangeTag, TextDiff};

use crate::ui;

const VALUE_WIDTH: usize = 40;

/// Why a resource is being planned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Declared in the manifest
    Reconcile,
    /// Tracked but no longer declared, or explicitly destroyed
    Teardown,
}

/// Predicted operations for one resource
#[derive(Debug, Clone)]
pub struct ResourcePlan {
    pub name: String,
    pub mode: PlanMode,
    pub plan: Plan,
}

impl ResourcePlan {
    pub fn reconcile(name: &str, previous: &EntrySet, desired: &EntrySet) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            mode: PlanMode::Reconcile,
            plan: plan(previous, desired)?,
        })
    }

    pub fn teardown(name: &str, tracked: &EntrySet) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            mode: PlanMode::Teardown,
            plan: teardown_plan(tracked)?,
        })
    }

    /// Check if applying would change the store or the tracked entries
    pub fn has_changes(&self) -> bool {
        !self.plan.changes.is_empty() || self.mode == PlanMode::Teardown
    }
}

/// How one planned operation is shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLine {
    pub symbol: char,
    pub path: String,
    pub detail: String,
    /// Previous and new value when a managed value is rewritten
    pub rewrite: Option<(String, String)>,
}

fn added_value<'a>(changes: &'a ChangeSet, path: &str) -> Option<&'a str> {
    changes
        .to_add
        .iter()
        .find(|e| e.path == path && e.is_managed_write())
        .map(|e| e.value())
}

fn removed_value<'a>(changes: &'a ChangeSet, path: &str) -> Option<&'a str> {
    changes
        .to_remove
        .iter()
        .find(|e| e.path == path && e.is_managed_write())
        .map(|e| e.value())
}

/// Describe the operations of a plan, one line each
pub fn plan_lines(plan: &Plan) -> Vec<PlanLine> {
    let rewritten = plan.changes.rewritten_paths();

    plan.operations
        .iter()
        .filter(|op| !matches!(op, Operation::KeepRewritten { .. }))
        .map(|op| {
            let path = op.path().to_string();
            match op {
                Operation::Put { flags, .. } if rewritten.contains(path.as_str()) => {
                    let new = added_value(&plan.changes, &path).unwrap_or_default();
                    let old = removed_value(&plan.changes, &path).unwrap_or_default();
                    PlanLine {
                        symbol: '~',
                        detail: format!("{} (flags {flags})", ui::truncate_value(new, VALUE_WIDTH)),
                        rewrite: Some((old.to_string(), new.to_string())),
                        path,
                    }
                }
                Operation::Put { flags, .. } => {
                    let new = added_value(&plan.changes, &path).unwrap_or_default();
                    PlanLine {
                        symbol: '+',
                        detail: format!("{} (flags {flags})", ui::truncate_value(new, VALUE_WIDTH)),
                        rewrite: None,
                        path,
                    }
                }
                Operation::Delete { .. } => PlanLine {
                    symbol: '-',
                    detail: "(will delete)".to_string(),
                    rewrite: None,
                    path,
                },
                Operation::Untrack { .. } => PlanLine {
                    symbol: '-',
                    detail: "(stop tracking, key kept)".to_string(),
                    rewrite: None,
                    path,
                },
                Operation::SkipEmptyWrite { .. } => PlanLine {
                    symbol: '=',
                    detail: "(read only)".to_string(),
                    rewrite: None,
                    path,
                },
                Operation::KeepRewritten { .. } | Operation::Read { .. } => PlanLine {
                    symbol: ' ',
                    detail: String::new(),
                    rewrite: None,
                    path,
                },
            }
        })
        .collect()
}

/// Line-level diff of two values, unchanged lines dropped
pub fn value_diff(old: &str, new: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| (change.tag(), change.value().trim_end_matches('\n').to_string()))
        .collect()
}

/// Display plans in a user-friendly format
pub fn display_plans(plans: &[ResourcePlan]) {
    let changed: Vec<&ResourcePlan> = plans.iter().filter(|p| p.has_changes()).collect();

    if changed.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Key Changes".bold()
    );
    println!("│");

    for resource in &changed {
        let title = match resource.mode {
            PlanMode::Reconcile => resource.name.bold().to_string(),
            PlanMode::Teardown => format!("{} {}", resource.name.bold(), "(teardown)".red()),
        };
        println!("│ {title}");

        for line in plan_lines(&resource.plan) {
            let symbol = match line.symbol {
                '+' => "+".green(),
                '-' => "-".red(),
                '~' => "~".yellow(),
                _ => "=".dimmed(),
            };
            println!("│   {} {:<30} {}", symbol, line.path, line.detail.dimmed());

            if let Some((old, new)) = &line.rewrite {
                for (tag, text) in value_diff(old, new) {
                    match tag {
                        ChangeTag::Delete => println!("│       {}", format!("- {text}").red()),
                        ChangeTag::Insert => println!("│       {}", format!("+ {text}").green()),
                        ChangeTag::Equal => {}
                    }
                }
            }
        }
        println!("│");
    }

    let mut total = reconcile::ApplySummary::default();
    for resource in &changed {
        total.merge(&resource.plan.summary());
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to write, {} to delete, {} to untrack",
        total.written.to_string().green(),
        total.deleted.to_string().red(),
        total.untracked.to_string().yellow()
    );
    println!("└─────────────────────────────────────────────────────┘");
}
