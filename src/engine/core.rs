// src/engine/core.rs

//! Pure supervisor state machine.
//!
//! [`SupervisorCore`] consumes [`SupervisorInput`]s and produces:
//! - an updated state
//! - a list of [`SupervisorCommand`]s describing what the IO shell should do
//!   next
//!
//! The async shell (`engine::supervisor::Supervisor`) owns the timers, the
//! channels and the child process. The core has no Tokio types and performs
//! no IO, so every transition is unit tested below.

use crate::engine::{CoreStep, SupervisorCommand, SupervisorInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// A child is being launched.
    Starting,
    /// The child is running; waiting for a trigger, its exit or shutdown.
    Running,
    /// The child exited on its own and auto-restart is off.
    TriggerWait,
    /// Waiting out the settle delay. Triggers are absorbed.
    Delaying,
    /// The child was asked to stop; waiting for it to be reaped.
    Stopping,
    /// Shutdown requested; waiting for the child to be reaped.
    ShuttingDown,
    /// Terminal.
    Exited,
}

#[derive(Debug)]
pub struct SupervisorCore {
    state: SupervisorState,
    child_alive: bool,
    restart_on_exit: bool,
}

impl SupervisorCore {
    pub fn new(restart_on_exit: bool) -> Self {
        Self {
            state: SupervisorState::Starting,
            child_alive: false,
            restart_on_exit,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn child_alive(&self) -> bool {
        self.child_alive
    }

    /// Commands to run before the first input: launch the first child.
    pub fn start(&self) -> CoreStep {
        CoreStep::continue_with(vec![SupervisorCommand::Launch])
    }

    /// Whether the shell should be listening for triggers right now.
    pub fn accepts_triggers(&self) -> bool {
        matches!(
            self.state,
            SupervisorState::Running | SupervisorState::TriggerWait
        )
    }

    /// Whether outer cancellation still needs to be observed.
    pub fn accepts_cancel(&self) -> bool {
        !matches!(
            self.state,
            SupervisorState::ShuttingDown | SupervisorState::Exited
        )
    }

    /// Handle a single input, updating state and returning the resulting
    /// commands for the shell.
    pub fn step(&mut self, input: SupervisorInput) -> CoreStep {
        use SupervisorState as S;

        match (self.state, input) {
            (S::Exited, _) => CoreStep::exit(),

            (S::ShuttingDown, SupervisorInput::ChildExited) => {
                self.child_alive = false;
                self.state = S::Exited;
                CoreStep::exit()
            }
            (S::ShuttingDown, _) => CoreStep::idle(),

            (_, SupervisorInput::Cancelled) => {
                if self.child_alive {
                    self.state = S::ShuttingDown;
                    CoreStep::continue_with(vec![SupervisorCommand::StopChild])
                } else {
                    self.state = S::Exited;
                    CoreStep::exit()
                }
            }

            (S::Starting, SupervisorInput::Launched) => {
                self.child_alive = true;
                self.state = S::Running;
                CoreStep::idle()
            }

            (S::Running | S::TriggerWait, SupervisorInput::Triggered(_)) => self.arm_delay(),

            (S::Running, SupervisorInput::ChildExited) => {
                self.child_alive = false;
                if self.restart_on_exit {
                    self.arm_delay()
                } else {
                    self.state = S::TriggerWait;
                    CoreStep::idle()
                }
            }

            (S::Delaying, SupervisorInput::DelayElapsed) => {
                if self.child_alive {
                    self.state = S::Stopping;
                    CoreStep::continue_with(vec![SupervisorCommand::StopChild])
                } else {
                    self.launch()
                }
            }

            (S::Stopping, SupervisorInput::ChildExited) => {
                self.child_alive = false;
                self.launch()
            }

            (_, SupervisorInput::ChildExited) => {
                self.child_alive = false;
                CoreStep::idle()
            }

            // Triggers outside Running/TriggerWait are absorbed, stray
            // timer or launch notifications are ignored.
            _ => CoreStep::idle(),
        }
    }

    fn arm_delay(&mut self) -> CoreStep {
        self.state = SupervisorState::Delaying;
        CoreStep::continue_with(vec![SupervisorCommand::ArmDelay])
    }

    fn launch(&mut self) -> CoreStep {
        self.state = SupervisorState::Starting;
        CoreStep::continue_with(vec![SupervisorCommand::Launch])
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use SupervisorCommand::*;
    use SupervisorInput as I;

    fn running(restart_on_exit: bool) -> SupervisorCore {
        let mut core = SupervisorCore::new(restart_on_exit);
        assert_eq!(core.start().commands, vec![Launch]);
        core.step(I::Launched);
        assert_eq!(core.state(), SupervisorState::Running);
        core
    }

    fn trigger() -> SupervisorInput {
        I::Triggered(PathBuf::from("a.go"))
    }

    #[test]
    fn trigger_delays_then_stops_then_relaunches() {
        let mut core = running(false);

        assert_eq!(core.step(trigger()).commands, vec![ArmDelay]);
        assert_eq!(core.state(), SupervisorState::Delaying);
        assert!(!core.accepts_triggers());

        assert_eq!(core.step(I::DelayElapsed).commands, vec![StopChild]);
        assert_eq!(core.state(), SupervisorState::Stopping);

        assert_eq!(core.step(I::ChildExited).commands, vec![Launch]);
        assert_eq!(core.state(), SupervisorState::Starting);
        assert!(!core.child_alive());
    }

    #[test]
    fn triggers_while_delaying_are_absorbed() {
        let mut core = running(false);
        core.step(trigger());

        let step = core.step(trigger());
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), SupervisorState::Delaying);
    }

    #[test]
    fn exit_without_auto_restart_waits_for_trigger() {
        let mut core = running(false);

        let step = core.step(I::ChildExited);
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), SupervisorState::TriggerWait);
        assert!(core.accepts_triggers());

        assert_eq!(core.step(trigger()).commands, vec![ArmDelay]);
        // Nothing to stop: relaunch straight after the delay.
        assert_eq!(core.step(I::DelayElapsed).commands, vec![Launch]);
    }

    #[test]
    fn exit_with_auto_restart_schedules_delayed_restart() {
        let mut core = running(true);

        assert_eq!(core.step(I::ChildExited).commands, vec![ArmDelay]);
        assert_eq!(core.step(I::DelayElapsed).commands, vec![Launch]);
    }

    #[test]
    fn child_exiting_during_delay_skips_stop() {
        let mut core = running(false);
        core.step(trigger());
        core.step(I::ChildExited);

        assert_eq!(core.step(I::DelayElapsed).commands, vec![Launch]);
    }

    #[test]
    fn cancel_with_live_child_stops_it_first() {
        let mut core = running(false);

        let step = core.step(I::Cancelled);
        assert_eq!(step.commands, vec![StopChild]);
        assert!(step.keep_running);
        assert!(!core.accepts_cancel());

        assert!(core.step(trigger()).commands.is_empty());
        let step = core.step(I::ChildExited);
        assert!(!step.keep_running);
        assert_eq!(core.state(), SupervisorState::Exited);
    }

    #[test]
    fn cancel_without_child_exits_immediately() {
        let mut core = running(false);
        core.step(I::ChildExited);

        let step = core.step(I::Cancelled);
        assert!(!step.keep_running);
        assert_eq!(core.state(), SupervisorState::Exited);
    }

    #[test]
    fn cancel_during_delay_with_live_child() {
        let mut core = running(true);
        core.step(trigger());

        assert_eq!(core.step(I::Cancelled).commands, vec![StopChild]);
        assert_eq!(core.state(), SupervisorState::ShuttingDown);
        assert!(core.step(I::DelayElapsed).commands.is_empty());
    }
}
