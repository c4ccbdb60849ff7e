use std::fmt;
use std::str::FromStr;

use nix::sys::signal::Signal;
use serde::Deserialize;

/// Whether a cleanly started instance is relaunched after it exits.
///
/// - `Never`: the instance stays `EXITED`.
/// - `Unexpected`: relaunch only when the exit code is not listed in
///   `exitcodes` (default).
/// - `Always`: relaunch unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutorestartMode {
    #[serde(alias = "false")]
    Never,
    Unexpected,
    #[serde(alias = "true")]
    Always,
}

impl Default for AutorestartMode {
    fn default() -> Self {
        AutorestartMode::Unexpected
    }
}

impl AutorestartMode {
    /// Decide whether an instance that exited with `code` is relaunched.
    pub fn should_restart(self, code: i32, accepted: &[i32]) -> bool {
        match self {
            AutorestartMode::Never => false,
            AutorestartMode::Always => true,
            AutorestartMode::Unexpected => !accepted.contains(&code),
        }
    }
}

impl FromStr for AutorestartMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" | "false" => Ok(AutorestartMode::Never),
            "unexpected" => Ok(AutorestartMode::Unexpected),
            "always" | "true" => Ok(AutorestartMode::Always),
            other => Err(format!(
                "invalid autorestart: {other} (expected \"never\", \"unexpected\" or \"always\")"
            )),
        }
    }
}

/// Signal delivered to a job's process group as the second stop attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum StopSignal {
    Term,
    Hup,
    Int,
    Quit,
    Kill,
    Usr1,
    Usr2,
}

impl Default for StopSignal {
    fn default() -> Self {
        StopSignal::Term
    }
}

impl StopSignal {
    pub fn as_signal(self) -> Signal {
        match self {
            StopSignal::Term => Signal::SIGTERM,
            StopSignal::Hup => Signal::SIGHUP,
            StopSignal::Int => Signal::SIGINT,
            StopSignal::Quit => Signal::SIGQUIT,
            StopSignal::Kill => Signal::SIGKILL,
            StopSignal::Usr1 => Signal::SIGUSR1,
            StopSignal::Usr2 => Signal::SIGUSR2,
        }
    }
}

impl FromStr for StopSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "TERM" => Ok(StopSignal::Term),
            "HUP" => Ok(StopSignal::Hup),
            "INT" => Ok(StopSignal::Int),
            "QUIT" => Ok(StopSignal::Quit),
            "KILL" => Ok(StopSignal::Kill),
            "USR1" => Ok(StopSignal::Usr1),
            "USR2" => Ok(StopSignal::Usr2),
            _ => Err(format!("unsupported stop signal: {}", s.trim())),
        }
    }
}

impl TryFrom<String> for StopSignal {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopSignal::Term => "TERM",
            StopSignal::Hup => "HUP",
            StopSignal::Int => "INT",
            StopSignal::Quit => "QUIT",
            StopSignal::Kill => "KILL",
            StopSignal::Usr1 => "USR1",
            StopSignal::Usr2 => "USR2",
        };
        f.write_str(name)
    }
}
