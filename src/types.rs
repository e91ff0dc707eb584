use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::ChildwardenError;

/// Termination signals a managed process can be sent.
///
/// Names are accepted with or without the `SIG` prefix and in any case
/// (`"SIGTERM"`, `"term"`, `"Term"`). On non-Unix platforms every variant
/// degrades to a plain kill of the child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Signal {
    Interrupt,
    #[default]
    Terminate,
    Quit,
    Hangup,
    Kill,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Quit => "SIGQUIT",
            Signal::Hangup => "SIGHUP",
            Signal::Kill => "SIGKILL",
        }
    }

    /// POSIX signal number (also used for `128 + n` exit codes).
    pub fn number(self) -> i32 {
        match self {
            Signal::Hangup => 1,
            Signal::Interrupt => 2,
            Signal::Quit => 3,
            Signal::Kill => 9,
            Signal::Terminate => 15,
        }
    }

    #[cfg(unix)]
    pub fn to_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal as Nix;
        match self {
            Signal::Interrupt => Nix::SIGINT,
            Signal::Terminate => Nix::SIGTERM,
            Signal::Quit => Nix::SIGQUIT,
            Signal::Hangup => Nix::SIGHUP,
            Signal::Kill => Nix::SIGKILL,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = ChildwardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "INT" => Ok(Signal::Interrupt),
            "TERM" => Ok(Signal::Terminate),
            "QUIT" => Ok(Signal::Quit),
            "HUP" => Ok(Signal::Hangup),
            "KILL" => Ok(Signal::Kill),
            _ => Err(ChildwardenError::UnknownSignal(s.to_string())),
        }
    }
}

impl TryFrom<String> for Signal {
    type Error = ChildwardenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
