//! Manual command input and the manual/autonomous blending policy

use crate::common::VelocityCommand;
use crate::config::NavigationPolicy;

/// Decoded receiver frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManualCommand {
    pub linear: f64,
    pub angular: f64,
    /// State of the autonomy switch channel
    pub autonomous: bool,
}

impl ManualCommand {
    pub fn velocity(&self) -> VelocityCommand {
        VelocityCommand::new(self.linear, self.angular)
    }
}

/// RC receiver. Returns `None` when no valid frame is available (signal lost).
pub trait Receiver {
    fn latest_command(&mut self) -> Option<ManualCommand>;
}

/// Where the command for a cycle came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Manual,
    Autonomous,
    Stopped,
}

/// Resolves exactly one velocity command per cycle
#[derive(Debug, Clone, Copy)]
pub struct CommandBlender {
    policy: NavigationPolicy,
    deadband: f64,
}

impl CommandBlender {
    pub fn new(policy: NavigationPolicy, deadband: f64) -> Self {
        CommandBlender { policy, deadband }
    }

    pub fn policy(&self) -> NavigationPolicy {
        self.policy
    }

    /// Pick the command for this cycle. `autonomous` is only evaluated when
    /// the policy selects it, so the waypoint navigator's progress is left
    /// alone while under manual control.
    pub fn resolve(
        &self,
        manual: Option<ManualCommand>,
        autonomous: impl FnOnce() -> VelocityCommand,
    ) -> (VelocityCommand, CommandSource) {
        match (self.policy, manual) {
            (NavigationPolicy::ManualOverride, Some(m)) if self.is_active(&m) => {
                (m.velocity(), CommandSource::Manual)
            }
            (NavigationPolicy::ManualOverride, _) => (autonomous(), CommandSource::Autonomous),
            (NavigationPolicy::ModeSwitch, Some(m)) if m.autonomous => {
                (autonomous(), CommandSource::Autonomous)
            }
            (NavigationPolicy::ModeSwitch, Some(m)) => (m.velocity(), CommandSource::Manual),
            (NavigationPolicy::ModeSwitch, None) => (VelocityCommand::idle(), CommandSource::Stopped),
        }
    }

    fn is_active(&self, command: &ManualCommand) -> bool {
        command.linear.abs() > self.deadband || command.angular.abs() > self.deadband
    }
}
