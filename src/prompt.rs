use anyhow::Result;
use dialoguer::{Input, Password};

/// Prompt for a non-empty line. `Input` re-prompts on blank input by
/// default, which is exactly the loop the interactive flow wants.
pub fn required(label: &str) -> Result<String> {
    let value: String = Input::new().with_prompt(label).interact_text()?;
    Ok(value.trim().to_string())
}

pub fn password(label: &str) -> Result<String> {
    Ok(Password::new().with_prompt(label).interact()?)
}

/// Yes/no question. Blank input re-prompts; anything else is parsed with
/// `parse_yes`.
pub fn confirm(label: &str) -> Result<bool> {
    let answer: String = Input::new()
        .with_prompt(format!("{} [Y/n]", label))
        .interact_text()?;
    Ok(parse_yes(&answer))
}

/// Optional numeric cap. Blank or non-numeric input means no cap.
pub fn optional_count(label: &str) -> Result<Option<usize>> {
    let raw: String = Input::new()
        .with_prompt(label)
        .allow_empty(true)
        .interact_text()?;
    Ok(parse_count(&raw))
}

/// An answer counts as yes iff it starts with `y`/`Y`.
fn parse_yes(answer: &str) -> bool {
    answer
        .trim()
        .chars()
        .next()
        .map(|c| c.eq_ignore_ascii_case(&'y'))
        .unwrap_or(false)
}

fn parse_count(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
