// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Interactive single-selection menu.
//!
//! Tools that support interactive use present a small arrow-key menu of
//! actions, run the selected action, and show the menu again until the user
//! picks the exit entry or cancels the prompt with Esc or Ctrl-C.

use inquire::{Confirm, InquireError, Select};
use std::fmt::Display;
use tracing::{error, instrument};

/// Ask the user to pick one entry out of a listing.
pub trait Prompter {
    /// Show options and return index of selected one.
    ///
    /// A cancelled prompt yields `None`.
    ///
    /// # Errors
    ///
    /// - Return [`MenuError::Prompt`] if the terminal cannot be used.
    fn select(&mut self, title: &str, options: &[String]) -> Result<Option<usize>>;

    /// Ask a yes or no question. A cancelled prompt counts as no.
    ///
    /// # Errors
    ///
    /// - Return [`MenuError::Prompt`] if the terminal cannot be used.
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Prompter using the terminal through inquire.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn select(&mut self, title: &str, options: &[String]) -> Result<Option<usize>> {
        match Select::new(title, options.to_vec()).raw_prompt() {
            Ok(choice) => Ok(Some(choice.index)),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
            Err(err) => Err(MenuError::Prompt(err)),
        }
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        match Confirm::new(question).with_default(false).prompt() {
            Ok(answer) => Ok(answer),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
            Err(err) => Err(MenuError::Prompt(err)),
        }
    }
}

/// Entry of a menu.
pub trait MenuChoice: Display + Copy {
    /// Check if entry leaves the menu.
    fn is_exit(&self) -> bool;
}

/// Show menu in a loop, running the action of each selected entry.
///
/// Action failures are logged, and the menu shows up again. The loop ends
/// when the exit entry is chosen or the prompt is cancelled.
///
/// # Errors
///
/// - Return [`MenuError::Prompt`] if the terminal cannot be used.
#[instrument(skip_all, level = "debug")]
pub fn run_loop<P, C, F>(prompter: &mut P, title: &str, choices: &[C], mut action: F) -> Result<()>
where
    P: Prompter,
    C: MenuChoice,
    F: FnMut(C) -> anyhow::Result<()>,
{
    let options = choices.iter().map(ToString::to_string).collect::<Vec<_>>();
    loop {
        let Some(index) = prompter.select(title, &options)? else {
            return Ok(());
        };

        let choice = choices[index];
        if choice.is_exit() {
            return Ok(());
        }

        if let Err(err) = action(choice) {
            error!("{choice} failed: {err:?}");
        }
    }
}

/// Menu error types.
#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    /// Prompt could not be shown or read.
    #[error(transparent)]
    Prompt(#[from] InquireError),
}

/// Friendly result alias :3
pub type Result<T, E = MenuError> = std::result::Result<T, E>;

#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::collections::VecDeque;

    /// Prompter replaying canned answers.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedPrompter {
        pub(crate) selections: VecDeque<Option<usize>>,
        pub(crate) answers: VecDeque<bool>,
        pub(crate) shown: usize,
    }

    impl ScriptedPrompter {
        pub(crate) fn new(selections: impl IntoIterator<Item = Option<usize>>) -> Self {
            Self {
                selections: selections.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn select(&mut self, _title: &str, _options: &[String]) -> Result<Option<usize>> {
            self.shown += 1;
            Ok(self.selections.pop_front().flatten())
        }

        fn confirm(&mut self, _question: &str) -> Result<bool> {
            Ok(self.answers.pop_front().unwrap_or(false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{scripted::ScriptedPrompter, *};
    use pretty_assertions::assert_eq;
    use std::fmt::{Formatter, Result as FmtResult};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Choice {
        Ok,
        Broken,
        Exit,
    }

    impl Display for Choice {
        fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
            write!(fmt, "{self:?}")
        }
    }

    impl MenuChoice for Choice {
        fn is_exit(&self) -> bool {
            matches!(self, Self::Exit)
        }
    }

    const CHOICES: [Choice; 3] = [Choice::Ok, Choice::Broken, Choice::Exit];

    #[test]
    fn loop_survives_failing_action() -> anyhow::Result<()> {
        let mut prompter = ScriptedPrompter::new([Some(1), Some(0), Some(2), Some(0)]);
        let mut ran = Vec::new();
        run_loop(&mut prompter, "menu", &CHOICES, |choice| {
            ran.push(choice);
            match choice {
                Choice::Broken => anyhow::bail!("boom"),
                _ => Ok(()),
            }
        })?;

        assert_eq!(ran, vec![Choice::Broken, Choice::Ok]);
        assert_eq!(prompter.shown, 3);

        Ok(())
    }

    #[test]
    fn loop_ends_on_cancel() -> anyhow::Result<()> {
        let mut prompter = ScriptedPrompter::new([Some(0), None, Some(0)]);
        let mut count = 0;
        run_loop(&mut prompter, "menu", &CHOICES, |_| {
            count += 1;
            Ok(())
        })?;

        assert_eq!(count, 1);

        Ok(())
    }
}
