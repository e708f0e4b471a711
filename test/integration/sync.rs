// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{MachineFixture, RemoteFixture};

use homeops::{
    config::{RemoteConfig, SyncConfig},
    path::Platform,
    sync::Syncer,
    syscall::SystemShell,
};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::env::current_dir;

fn syncer(machine: &MachineFixture, remote: &RemoteFixture) -> Result<Syncer<SystemShell>> {
    let config = SyncConfig {
        repo_dir: machine.repo_dir(),
        ide_cli: "homeops-no-such-ide".into(),
        user_dir: Some(machine.user_dir()),
        files: vec!["settings.json".into(), "keybindings.json".into()],
        dirs: vec!["snippets".into()],
        remote: Some(RemoteConfig {
            url: remote.url(),
            branch: "main".into(),
        }),
        prune_extensions: false,
    };

    Ok(Syncer::new(config, SystemShell, Platform::Linux)?)
}

const SETTINGS: &str = indoc! {r#"
    {
        "editor.fontSize": 14,
        "files.autoSave": "afterDelay"
    }
"#};

#[sealed_test]
fn backup_pushes_settings_to_remote() -> Result<()> {
    let root = current_dir()?;
    let remote = RemoteFixture::new(root.join("remote.git"))?;
    let laptop = MachineFixture::new(root.join("laptop"))?;
    laptop.write_setting("settings.json", SETTINGS)?;
    laptop.write_setting("snippets/rust.json", "{}")?;

    let summary = syncer(&laptop, &remote)?.backup()?;
    assert!(summary.pushed);
    assert_eq!(summary.files_synced, 2);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(remote.commit_count()?, 1);
    assert_eq!(remote.read("settings.json")?.as_deref(), Some(SETTINGS));
    assert_eq!(remote.read("snippets/rust.json")?.as_deref(), Some("{}"));
    assert_eq!(remote.read("keybindings.json")?, None);

    Ok(())
}

#[sealed_test]
fn backup_commits_only_when_settings_change() -> Result<()> {
    let root = current_dir()?;
    let remote = RemoteFixture::new(root.join("remote.git"))?;
    let laptop = MachineFixture::new(root.join("laptop"))?;
    laptop.write_setting("settings.json", SETTINGS)?;

    let syncer = syncer(&laptop, &remote)?;
    assert!(syncer.backup()?.pushed);
    assert!(!syncer.backup()?.pushed);
    assert_eq!(remote.commit_count()?, 1);

    laptop.write_setting("settings.json", "{}")?;
    assert!(syncer.backup()?.pushed);
    assert_eq!(remote.commit_count()?, 2);
    assert_eq!(remote.read("settings.json")?.as_deref(), Some("{}"));

    Ok(())
}

#[sealed_test]
fn backup_removes_deleted_snippets_from_remote() -> Result<()> {
    let root = current_dir()?;
    let remote = RemoteFixture::new(root.join("remote.git"))?;
    let laptop = MachineFixture::new(root.join("laptop"))?;
    laptop.write_setting("snippets/rust.json", "{}")?;
    laptop.write_setting("snippets/go.json", "{}")?;

    let syncer = syncer(&laptop, &remote)?;
    syncer.backup()?;
    std::fs::remove_file(laptop.user_dir().join("snippets/go.json"))?;
    syncer.backup()?;

    assert_eq!(remote.read("snippets/go.json")?, None);
    assert_eq!(remote.read("snippets/rust.json")?.as_deref(), Some("{}"));

    Ok(())
}

#[sealed_test]
fn restore_carries_settings_to_another_machine() -> Result<()> {
    let root = current_dir()?;
    let remote = RemoteFixture::new(root.join("remote.git"))?;
    let laptop = MachineFixture::new(root.join("laptop"))?;
    laptop.write_setting("settings.json", SETTINGS)?;
    laptop.write_setting("snippets/rust.json", "{}")?;
    syncer(&laptop, &remote)?.backup()?;

    let desktop = MachineFixture::new(root.join("desktop"))?;
    desktop.write_setting("settings.json", "{}")?;
    desktop.write_setting("snippets/local.json", "[]")?;

    let summary = syncer(&desktop, &remote)?.restore()?;
    assert!(summary.pulled);
    assert_eq!(desktop.read_setting("settings.json").as_deref(), Some(SETTINGS));
    assert_eq!(desktop.read_setting("snippets/rust.json").as_deref(), Some("{}"));
    assert_eq!(desktop.read_setting("snippets/local.json").as_deref(), Some("[]"));

    Ok(())
}

#[sealed_test]
fn status_is_clean_after_restore() -> Result<()> {
    let root = current_dir()?;
    let remote = RemoteFixture::new(root.join("remote.git"))?;
    let laptop = MachineFixture::new(root.join("laptop"))?;
    laptop.write_setting("settings.json", SETTINGS)?;
    syncer(&laptop, &remote)?.backup()?;

    let desktop = MachineFixture::new(root.join("desktop"))?;
    let syncer = syncer(&desktop, &remote)?;
    syncer.restore()?;
    assert!(syncer.status()?.is_clean());

    desktop.write_setting("keybindings.json", "[]")?;
    assert!(!syncer.status()?.is_clean());

    Ok(())
}
