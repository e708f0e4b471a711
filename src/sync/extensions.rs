// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! IDE extension listing.
//!
//! Extensions are identified as `publisher.name`, and the IDE treats these
//! identifiers case-insensitively. The backed up listing is a plain text file
//! with one identifier per line. It is fully overwritten on backup, and fully
//! replayed on restore.

use crate::syscall::{Invocation, Shell, ShellError};

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{info, instrument, warn};

/// Deduplicated listing of extension identifiers.
///
/// # Invariant
///
/// - No duplicate identifiers, ignoring case.
/// - Identifiers are always kept sorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtensionList {
    ids: BTreeMap<String, String>,
}

impl ExtensionList {
    /// Construct new empty listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an identifier, keeping the first spelling seen.
    pub fn insert(&mut self, id: impl AsRef<str>) {
        let id = normalize(id.as_ref());
        if id.is_empty() {
            return;
        }

        self.ids
            .entry(id.to_ascii_lowercase())
            .or_insert_with(|| id.to_string());
    }

    /// Check if identifier is part of listing.
    pub fn contains(&self, id: impl AsRef<str>) -> bool {
        self.ids
            .contains_key(&normalize(id.as_ref()).to_ascii_lowercase())
    }

    /// Iterate over identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// INVARIANT: Drop "@version" suffix of `--show-versions` output.
fn normalize(id: &str) -> &str {
    let id = id.trim();
    id.split_once('@').map(|(id, _)| id).unwrap_or(id).trim()
}

impl From<&str> for ExtensionList {
    fn from(content: &str) -> Self {
        let mut list = Self::new();
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.starts_with('#'))
            .for_each(|line| list.insert(line));
        list
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExtensionList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        iter.into_iter().for_each(|id| list.insert(id));
        list
    }
}

impl Display for ExtensionList {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for id in self.iter() {
            writeln!(fmt, "{id}")?;
        }

        Ok(())
    }
}

/// Difference between desired and installed extensions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtensionDiff {
    /// Desired but not installed.
    pub missing: Vec<String>,

    /// Installed but not desired.
    pub extra: Vec<String>,
}

impl ExtensionDiff {
    /// Compute difference between two listings.
    pub fn between(desired: &ExtensionList, installed: &ExtensionList) -> Self {
        Self {
            missing: desired
                .iter()
                .filter(|id| !installed.contains(id))
                .map(ToString::to_string)
                .collect(),
            extra: installed
                .iter()
                .filter(|id| !desired.contains(id))
                .map(ToString::to_string)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Extension management through the IDE's command line interface.
#[derive(Debug)]
pub struct ExtensionCli<'a, S: Shell> {
    shell: &'a S,
    program: &'a str,
}

impl<'a, S: Shell> ExtensionCli<'a, S> {
    /// Construct new extension manager using target IDE program.
    pub fn new(shell: &'a S, program: &'a str) -> Self {
        Self { shell, program }
    }

    /// Check if IDE program can be found.
    pub fn is_available(&self) -> bool {
        self.shell.exists(self.program)
    }

    /// List currently installed extensions.
    ///
    /// # Errors
    ///
    /// - Return [`ShellError`] if the IDE program fails.
    pub fn installed(&self) -> Result<ExtensionList, ShellError> {
        let output = self
            .shell
            .run(&Invocation::new(self.program).arg("--list-extensions"))?;
        Ok(ExtensionList::from(output.as_str()))
    }

    /// Install every listed extension, continuing past failures.
    ///
    /// Returns identifiers that failed to install.
    #[instrument(skip(self, ids), level = "debug")]
    pub fn install_all(&self, ids: &[String]) -> Vec<String> {
        self.apply_all("--install-extension", ids)
    }

    /// Uninstall every listed extension, continuing past failures.
    ///
    /// Returns identifiers that failed to uninstall.
    #[instrument(skip(self, ids), level = "debug")]
    pub fn uninstall_all(&self, ids: &[String]) -> Vec<String> {
        self.apply_all("--uninstall-extension", ids)
    }

    fn apply_all(&self, flag: &str, ids: &[String]) -> Vec<String> {
        let mut failed = Vec::new();
        for id in ids {
            info!("{} {id}", flag.trim_start_matches("--").replace('-', " "));
            let invocation = Invocation::new(self.program).args([flag, id.as_str()]);
            if let Err(err) = self.shell.run(&invocation) {
                warn!("{err}");
                failed.push(id.clone());
            }
        }

        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::fake::FakeShell;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_dedupes_ignoring_case() {
        let list = ExtensionList::from(indoc! {r#"
            # exported listing
            rust-lang.rust-analyzer
            ms-python.python@2024.2.1

              Rust-Lang.Rust-Analyzer
            esbenp.prettier-vscode
        "#});

        let expect = indoc! {r#"
            esbenp.prettier-vscode
            ms-python.python
            rust-lang.rust-analyzer
        "#};
        assert_eq!(list.to_string(), expect);
        assert_eq!(list.len(), 3);
        assert!(list.contains("MS-Python.Python"));
    }

    #[test]
    fn diff_reports_missing_and_extra() {
        let desired = ["a.one", "b.two", "c.three"].into_iter().collect();
        let installed = ["B.Two", "d.four"].into_iter().collect();

        let result = ExtensionDiff::between(&desired, &installed);
        let expect = ExtensionDiff {
            missing: vec!["a.one".into(), "c.three".into()],
            extra: vec!["d.four".into()],
        };
        assert_eq!(result, expect);
        assert!(ExtensionDiff::between(&desired, &desired).is_empty());
    }

    #[test]
    fn install_all_continues_past_failures() {
        let shell = FakeShell::default().fail("antigravity --install-extension b.two");
        let cli = ExtensionCli::new(&shell, "antigravity");

        let failed = cli.install_all(&["a.one".into(), "b.two".into(), "c.three".into()]);

        assert_eq!(failed, vec!["b.two".to_string()]);
        assert_eq!(
            shell.calls(),
            vec![
                "antigravity --install-extension a.one",
                "antigravity --install-extension b.two",
                "antigravity --install-extension c.three",
            ]
        );
    }

    #[test]
    fn installed_parses_cli_output() -> anyhow::Result<()> {
        let shell = FakeShell::default()
            .output("antigravity --list-extensions", "a.one\nb.two\n");
        let cli = ExtensionCli::new(&shell, "antigravity");

        let result = cli.installed()?;
        assert_eq!(result.iter().collect::<Vec<_>>(), vec!["a.one", "b.two"]);

        Ok(())
    }
}
