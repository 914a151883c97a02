use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

bitflags! {
    /// Set of filesystem operations carried by a single watch event.
    ///
    /// The native backend may report several operations on one notification;
    /// the polling backend always reports exactly one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Op: u8 {
        const CREATE = 1 << 0;
        const WRITE = 1 << 1;
        const REMOVE = 1 << 2;
        const RENAME = 1 << 3;
        const CHMOD = 1 << 4;
    }
}

impl Op {
    /// Parse a single operation name as used by `--filter` (case-insensitive).
    ///
    /// Distinct from the generated `Op::from_name`, which only knows the exact
    /// upper-case flag names.
    pub fn from_filter_name(name: &str) -> Option<Op> {
        match name.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Some(Op::CREATE),
            "WRITE" => Some(Op::WRITE),
            "REMOVE" => Some(Op::REMOVE),
            "RENAME" => Some(Op::RENAME),
            "CHMOD" => Some(Op::CHMOD),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// Signal used to ask the command's process group to stop.
///
/// On Windows there is no signal delivery; only `Term` is accepted there and
/// it is implemented as a forced tree kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopSignal {
    Hup,
    Int,
    Quit,
    Kill,
    Usr1,
    Usr2,
    #[default]
    Term,
    Winch,
}

impl StopSignal {
    /// Canonical `SIGXXX` name, used in logs.
    pub fn name(self) -> &'static str {
        match self {
            StopSignal::Hup => "SIGHUP",
            StopSignal::Int => "SIGINT",
            StopSignal::Quit => "SIGQUIT",
            StopSignal::Kill => "SIGKILL",
            StopSignal::Usr1 => "SIGUSR1",
            StopSignal::Usr2 => "SIGUSR2",
            StopSignal::Term => "SIGTERM",
            StopSignal::Winch => "SIGWINCH",
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(not(windows))]
impl FromStr for StopSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1" | "HUP" | "SIGHUP" | "SIG_HUP" => Ok(StopSignal::Hup),
            "2" | "INT" | "SIGINT" | "SIG_INT" => Ok(StopSignal::Int),
            "3" | "QUIT" | "SIGQUIT" | "SIG_QUIT" => Ok(StopSignal::Quit),
            "9" | "KILL" | "SIGKILL" | "SIG_KILL" => Ok(StopSignal::Kill),
            "10" | "USR1" | "SIGUSR1" | "SIG_USR1" => Ok(StopSignal::Usr1),
            "12" | "USR2" | "SIGUSR2" | "SIG_USR2" => Ok(StopSignal::Usr2),
            "" | "15" | "TERM" | "SIGTERM" | "SIG_TERM" => Ok(StopSignal::Term),
            "28" | "WINCH" | "SIGWINCH" | "SIG_WINCH" => Ok(StopSignal::Winch),
            _ => Err(format!("unsupported signal: {s}")),
        }
    }
}

#[cfg(windows)]
impl FromStr for StopSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "15" | "TERM" | "SIGTERM" | "SIG_TERM" => Ok(StopSignal::Term),
            _ => Err("signal option (--signal, -s) is not available on Windows".to_string()),
        }
    }
}
