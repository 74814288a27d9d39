//! Interactive review of the files the checks flagged.
//!
//! For every check with flagged files the user keeps the current decisions,
//! sets one action for all of them, or walks through the files one by one.

use dialoguer::Select;
use mediabatch_core::{Action, BatchEngine, CheckKind, FileId};

use crate::cli::theme::{self, handle_interrupt};

/// Choice offered for a whole check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckChoice {
    Keep,
    FileByFile,
    All(Action),
}

fn check_choices(check: CheckKind) -> Vec<CheckChoice> {
    let mut choices = vec![CheckChoice::Keep, CheckChoice::FileByFile];
    choices.extend(check.possible_actions().iter().map(|a| CheckChoice::All(*a)));
    choices
}

fn choice_label(choice: CheckChoice) -> String {
    match choice {
        CheckChoice::Keep => "Keep current decisions".to_string(),
        CheckChoice::FileByFile => "Decide file by file".to_string(),
        CheckChoice::All(action) => format!("All files: {}", action.text(None)),
    }
}

/// Review every check. Returns `false` when the user interrupted.
pub fn review(engine: &mut BatchEngine) -> anyhow::Result<bool> {
    let checks = engine.pipeline().checks().to_vec();
    for check in checks {
        let flagged = engine.batch().flagged(check);
        if flagged.is_empty() {
            continue;
        }
        if !review_check(engine, check, &flagged)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn review_check(engine: &mut BatchEngine, check: CheckKind, flagged: &[FileId]) -> anyhow::Result<bool> {
    let theme = theme::review_theme();
    eprintln!();
    eprintln!(
        "  {} {}",
        theme::heading().apply_to(check.name()),
        theme::dim().apply_to(format!("({} file(s))", flagged.len()))
    );
    for id in flagged {
        eprintln!("    {}", describe(engine, check, *id));
    }

    let choices = check_choices(check);
    let labels: Vec<String> = choices.iter().map(|c| choice_label(*c)).collect();
    let Some(selection) = handle_interrupt(
        Select::with_theme(&theme)
            .with_prompt(format!("{} check", check.name()))
            .items(&labels)
            .default(0)
            .interact_opt(),
    )?
    .flatten() else {
        return Ok(false);
    };

    match choices[selection] {
        CheckChoice::Keep => Ok(true),
        CheckChoice::All(action) => {
            engine.set_decisions(check, action)?;
            Ok(true)
        }
        CheckChoice::FileByFile => {
            for id in flagged {
                if !review_file(engine, check, *id)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn review_file(engine: &mut BatchEngine, check: CheckKind, id: FileId) -> anyhow::Result<bool> {
    let theme = theme::review_theme();
    let file = engine.batch().file(id);
    let actions = check.possible_actions();
    let labels: Vec<String> = actions.iter().map(|a| a.text(Some(file))).collect();
    let current = file
        .decision(check)
        .and_then(|d| actions.iter().position(|a| *a == d))
        .unwrap_or(0);
    let prompt = engine.display_path(file.path()).display().to_string();

    let Some(selection) = handle_interrupt(
        Select::with_theme(&theme)
            .with_prompt(prompt)
            .items(&labels)
            .default(current)
            .interact(),
    )?
    else {
        return Ok(false);
    };
    engine.set_decision(id, check, actions[selection])?;
    Ok(true)
}

fn describe(engine: &BatchEngine, check: CheckKind, id: FileId) -> String {
    let file = engine.batch().file(id);
    let decision = file
        .decision(check)
        .map(|action| action.text(Some(file)))
        .unwrap_or_else(|| "Ignore file".to_string());
    format!(
        "{}  {}",
        engine.display_path(file.path()).display(),
        theme::dim().apply_to(decision)
    )
}
