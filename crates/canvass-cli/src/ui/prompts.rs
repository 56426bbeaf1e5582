//! Interactive prompts.

use dialoguer::{Confirm, Password, theme::ColorfulTheme};

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

/// Prompt for a new password twice, hiding input.
pub fn new_password(prompt: &str) -> Result<String, dialoguer::Error> {
    Password::with_theme(&theme())
        .with_prompt(prompt)
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()
}

/// Yes/no question defaulting to no.
pub fn confirm(prompt: &str) -> Result<bool, dialoguer::Error> {
    Confirm::with_theme(&theme())
        .with_prompt(prompt)
        .default(false)
        .interact()
}
