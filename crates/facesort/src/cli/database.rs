//! The `facesort database` command: an interactive menu for roster
//! management — add / remove / list / show / stats / validate.
//!
//! Reimplemented as an explicit `prompt -> dispatch -> continue/exit`
//! state machine rather than an exceptions-for-control-flow loop: every
//! step returns a result, and bad input simply redraws the same prompt.

use clap::Args;
use console::Style;
use dialoguer::{Confirm, Input, Select};
use facesort_core::roster::{self, Roster};
use facesort_core::{Config, Engine};
use std::path::PathBuf;

use super::theme::{facesort_theme, print_banner};

/// Arguments for the `database` command. No flags today; present for
/// symmetry with the other subcommands and to leave room for `--roster-file`.
#[derive(Args, Debug)]
pub struct DatabaseArgs {}

const MENU_ITEMS: &[&str] = &["Add", "Remove", "List", "Show", "Stats", "Validate", "Exit"];

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt (Ctrl+C / terminal disconnect), and `Err` for other I/O failures.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn execute(_args: DatabaseArgs, config: Config) -> anyhow::Result<()> {
    print_banner();
    let theme = facesort_theme();
    let mut roster = Roster::load(config.roster_path())?;

    loop {
        let Some(selection) = handle_interrupt(
            Select::with_theme(&theme)
                .with_prompt("Roster")
                .items(MENU_ITEMS)
                .default(0)
                .interact_opt(),
        )?
        .flatten() else {
            break;
        };

        match selection {
            0 => add(&theme, &mut roster, &config).await?,
            1 => remove(&theme, &mut roster)?,
            2 => list(&roster),
            3 => show(&theme, &roster)?,
            4 => stats(&roster),
            5 => validate(&roster),
            6 => break,
            _ => unreachable!(),
        }
    }

    Ok(())
}

async fn add(
    theme: &dialoguer::theme::ColorfulTheme,
    roster: &mut Roster,
    config: &Config,
) -> anyhow::Result<()> {
    let Some(name) = handle_interrupt(
        Input::<String>::with_theme(theme)
            .with_prompt("Subject name")
            .interact_text(),
    )? else {
        return Ok(());
    };

    let Some(reference) = handle_interrupt(
        Input::<String>::with_theme(theme)
            .with_prompt("Reference photo path")
            .interact_text(),
    )? else {
        return Ok(());
    };
    let reference_path = PathBuf::from(reference);

    if !reference_path.exists() {
        let red = Style::new().for_stderr().red();
        eprintln!("  {} no such file: {}", red.apply_to("✗"), reference_path.display());
        return Ok(());
    }

    let notes = handle_interrupt(
        Input::<String>::with_theme(theme)
            .with_prompt("Notes (optional)")
            .allow_empty(true)
            .interact_text(),
    )?
    .filter(|s| !s.is_empty());

    let engine = Engine::new(config.clone()).await?;
    let description = match engine.describe_reference_photo(&reference_path).await {
        Ok(description) => description,
        Err(e) => {
            let red = Style::new().for_stderr().red();
            eprintln!("  {} failed to describe reference photo: {e}", red.apply_to("✗"));
            return Ok(());
        }
    };

    let sanitized = roster::sanitize_name(&name);
    let entry = roster::new_entry(sanitized.clone(), description, vec![reference_path], notes);
    match roster.add(entry) {
        Ok(()) => {
            let green = Style::new().for_stderr().green();
            eprintln!("  {} added {sanitized}", green.apply_to("✓"));
        }
        Err(e) => eprintln!("  {} {e}", Style::new().for_stderr().red().apply_to("✗")),
    }
    Ok(())
}

fn remove(
    theme: &dialoguer::theme::ColorfulTheme,
    roster: &mut Roster,
) -> anyhow::Result<()> {
    if roster.entries().is_empty() {
        eprintln!("  roster is empty");
        return Ok(());
    }

    let names: Vec<&str> = roster.entries().iter().map(|e| e.name.as_str()).collect();
    let Some(index) = handle_interrupt(
        Select::with_theme(theme)
            .with_prompt("Remove which entry?")
            .items(&names)
            .interact_opt(),
    )?
    .flatten() else {
        return Ok(());
    };
    let name = names[index].to_string();

    let confirmed = handle_interrupt(
        Confirm::with_theme(theme)
            .with_prompt(format!("Remove '{name}'?"))
            .default(false)
            .interact(),
    )?
    .unwrap_or(false);
    if !confirmed {
        return Ok(());
    }

    roster.remove(&name)?;
    eprintln!("  {} removed {name}", Style::new().for_stderr().green().apply_to("✓"));
    Ok(())
}

fn list(roster: &Roster) {
    if roster.entries().is_empty() {
        eprintln!("  roster is empty");
        return;
    }
    eprintln!();
    for entry in roster.entries() {
        eprintln!("  {}", entry.name);
    }
    eprintln!();
}

fn show(
    theme: &dialoguer::theme::ColorfulTheme,
    roster: &Roster,
) -> anyhow::Result<()> {
    if roster.entries().is_empty() {
        eprintln!("  roster is empty");
        return Ok(());
    }

    let names: Vec<&str> = roster.entries().iter().map(|e| e.name.as_str()).collect();
    let Some(index) = handle_interrupt(
        Select::with_theme(theme)
            .with_prompt("Show which entry?")
            .items(&names)
            .interact_opt(),
    )?
    .flatten() else {
        return Ok(());
    };
    let entry = &roster.entries()[index];

    let label = Style::new().for_stderr().bold();
    eprintln!();
    eprintln!("    {:<16} {}", label.apply_to("Name:"), entry.name);
    eprintln!("    {:<16} {}", label.apply_to("Description:"), entry.description);
    eprintln!(
        "    {:<16} {}",
        label.apply_to("References:"),
        entry
            .reference_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if let Some(ref notes) = entry.notes {
        eprintln!("    {:<16} {}", label.apply_to("Notes:"), notes);
    }
    eprintln!("    {:<16} {}", label.apply_to("Registered:"), entry.created_at);
    eprintln!();
    Ok(())
}

fn stats(roster: &Roster) {
    let total = roster.entries().len();
    let with_notes = roster.entries().iter().filter(|e| e.notes.is_some()).count();
    let total_references: usize = roster.entries().iter().map(|e| e.reference_paths.len()).sum();

    eprintln!();
    eprintln!("    {:<20} {total}", "Entries:");
    eprintln!("    {:<20} {with_notes}", "With notes:");
    eprintln!("    {:<20} {total_references}", "Reference photos:");
    eprintln!("    {:<20} {}", "Backing file:", roster.path().display());
    eprintln!();
}

fn validate(roster: &Roster) {
    let problems = roster.validate();
    if problems.is_empty() {
        eprintln!("  {} roster is consistent", Style::new().for_stderr().green().apply_to("✓"));
        return;
    }
    let red = Style::new().for_stderr().red();
    eprintln!();
    for problem in problems {
        eprintln!("  {} {problem}", red.apply_to("✗"));
    }
    eprintln!();
}
