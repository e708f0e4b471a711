// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Media server service control.

use crate::{
    config::{ServiceConfig, ServiceManager},
    path::Platform,
    syscall::{Invocation, Shell, ShellError},
};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{info, instrument};

/// Service known to a service manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    name: String,
    manager: ServiceManager,
}

impl Service {
    /// Construct new service, detecting service manager from platform when
    /// configuration leaves it out.
    pub fn new(config: &ServiceConfig, platform: Platform) -> Self {
        let manager = config.manager.unwrap_or(match platform {
            Platform::Windows => ServiceManager::Windows,
            Platform::MacOs => ServiceManager::Launchd,
            Platform::Linux | Platform::Wsl => ServiceManager::Systemd,
        });

        Self {
            name: config.name.clone(),
            manager,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Invocation that stops the service.
    pub fn stop_invocation(&self) -> Invocation {
        self.invocation("stop")
    }

    /// Invocation that starts the service.
    pub fn start_invocation(&self) -> Invocation {
        self.invocation("start")
    }

    fn invocation(&self, action: &str) -> Invocation {
        let program = match self.manager {
            ServiceManager::Systemd => "systemctl",
            ServiceManager::Windows => "net",
            ServiceManager::Launchd => "launchctl",
        };

        Invocation::new(program).args([action, self.name.as_str()])
    }
}

/// Track whether a service was stopped, so it can be brought back.
///
/// # Invariant
///
/// - The service is only started if this guard stopped it.
/// - A successful start is never repeated.
#[derive(Debug)]
pub struct ServiceGuard<S: Shell> {
    shell: Arc<S>,
    service: Service,
    stopped: AtomicBool,
}

impl<S: Shell> ServiceGuard<S> {
    /// Construct new guard over target service.
    pub fn new(shell: Arc<S>, service: Service) -> Self {
        Self {
            shell,
            service,
            stopped: AtomicBool::new(false),
        }
    }

    /// Stop the service.
    ///
    /// # Errors
    ///
    /// - Return [`ShellError`] if the service manager refuses.
    #[instrument(skip(self), level = "debug")]
    pub fn stop(&self) -> Result<(), ShellError> {
        info!("stop service {}", self.service.name());
        self.shell.run(&self.service.stop_invocation())?;
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Start the service again if this guard stopped it.
    ///
    /// Returns `true` if service was started by this call.
    ///
    /// # Errors
    ///
    /// - Return [`ShellError`] if the service manager refuses. The guard
    ///   still considers the service stopped afterwards.
    #[instrument(skip(self), level = "debug")]
    pub fn restart(&self) -> Result<bool, ShellError> {
        if !self.stopped.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        info!("start service {}", self.service.name());
        if let Err(err) = self.shell.run(&self.service.start_invocation()) {
            self.stopped.store(true, Ordering::SeqCst);
            return Err(err);
        }

        Ok(true)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::fake::FakeShell;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn plex(manager: Option<ServiceManager>) -> ServiceConfig {
        ServiceConfig {
            name: "plexmediaserver".into(),
            manager,
        }
    }

    #[test_case(Platform::Linux, "systemctl stop plexmediaserver"; "linux uses systemd")]
    #[test_case(Platform::Wsl, "systemctl stop plexmediaserver"; "wsl uses systemd")]
    #[test_case(Platform::Windows, "net stop plexmediaserver"; "windows uses net")]
    #[test_case(Platform::MacOs, "launchctl stop plexmediaserver"; "macos uses launchctl")]
    #[test]
    fn detect_manager_from_platform(platform: Platform, expect: &str) {
        let service = Service::new(&plex(None), platform);
        pretty_assertions::assert_eq!(service.stop_invocation().to_string(), expect);
    }

    #[test]
    fn configured_manager_wins() {
        let service = Service::new(&plex(Some(ServiceManager::Launchd)), Platform::Linux);
        assert_eq!(
            service.start_invocation().to_string(),
            "launchctl start plexmediaserver"
        );
    }

    #[test]
    fn restart_only_after_stop_and_only_once() -> anyhow::Result<()> {
        let shell = Arc::new(FakeShell::default());
        let guard = ServiceGuard::new(shell.clone(), Service::new(&plex(None), Platform::Linux));

        assert!(!guard.restart()?);
        guard.stop()?;
        assert!(guard.is_stopped());
        assert!(guard.restart()?);
        assert!(!guard.restart()?);
        assert_eq!(
            shell.calls(),
            vec!["systemctl stop plexmediaserver", "systemctl start plexmediaserver"]
        );

        Ok(())
    }

    #[test]
    fn failed_restart_keeps_service_stopped() -> anyhow::Result<()> {
        let shell = Arc::new(FakeShell::default().fail("systemctl start plexmediaserver"));
        let guard = ServiceGuard::new(shell.clone(), Service::new(&plex(None), Platform::Linux));

        guard.stop()?;
        assert!(guard.restart().is_err());
        assert!(guard.is_stopped());

        Ok(())
    }

    #[test]
    fn failed_stop_is_not_restarted() -> anyhow::Result<()> {
        let shell = Arc::new(FakeShell::default().fail("systemctl stop plexmediaserver"));
        let guard = ServiceGuard::new(shell.clone(), Service::new(&plex(None), Platform::Linux));

        assert!(guard.stop().is_err());
        assert!(!guard.restart()?);
        assert_eq!(shell.calls(), vec!["systemctl stop plexmediaserver"]);

        Ok(())
    }
}
