//! Signal name table.
//!
//! Maps signal numbers to short lowercase names (`term`, `kill`, ...) and
//! back. Lookups by name accept `SIGTERM`, `TERM` and `term`.

/// One table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct SignalName {
    /// Signal number.
    pub number: i32,
    /// Full name, e.g. `SIGTERM`.
    pub name: &'static str,
    /// Short lowercase name, e.g. `term`.
    pub short: &'static str,
}

/// Builds a table entry from a `libc` constant.
macro_rules! sig {
    ($num:ident, $short:literal) => {
        SignalName {
            number: libc::$num,
            name: stringify!($num),
            short: $short,
        }
    };
}

/// Standard POSIX signals.
const STANDARD: &[SignalName] = &[
    sig!(SIGHUP, "hup"),
    sig!(SIGINT, "int"),
    sig!(SIGQUIT, "quit"),
    sig!(SIGILL, "ill"),
    sig!(SIGABRT, "abrt"),
    sig!(SIGFPE, "fpe"),
    sig!(SIGKILL, "kill"),
    sig!(SIGSEGV, "segv"),
    sig!(SIGPIPE, "pipe"),
    sig!(SIGALRM, "alrm"),
    sig!(SIGTERM, "term"),
    sig!(SIGUSR1, "usr1"),
    sig!(SIGUSR2, "usr2"),
    sig!(SIGCHLD, "chld"),
    sig!(SIGCONT, "cont"),
    sig!(SIGSTOP, "stop"),
    sig!(SIGTSTP, "tstp"),
    sig!(SIGTTIN, "ttin"),
    sig!(SIGTTOU, "ttou"),
    sig!(SIGBUS, "bus"),
    sig!(SIGPROF, "prof"),
    sig!(SIGSYS, "sys"),
    sig!(SIGTRAP, "trap"),
    sig!(SIGURG, "urg"),
    sig!(SIGVTALRM, "vtalrm"),
    sig!(SIGXCPU, "xcpu"),
    sig!(SIGXFSZ, "xfsz"),
    sig!(SIGIO, "io"),
    sig!(SIGWINCH, "winch"),
];

/// Platform extras. Aliases (`SIGIOT`, `SIGPOLL`) come after
/// their canonical entries so number lookups prefer the canonical name.
#[cfg(any(target_os = "linux", target_os = "android"))]
const EXTRA: &[SignalName] = &[
    sig!(SIGSTKFLT, "stkflt"),
    sig!(SIGPWR, "pwr"),
    sig!(SIGIOT, "iot"),
    sig!(SIGPOLL, "poll"),
];

/// Platform extras.
#[cfg(any(target_os = "macos", target_os = "ios"))]
const EXTRA: &[SignalName] = &[sig!(SIGEMT, "emt"), sig!(SIGINFO, "info")];

/// Platform extras.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios"
)))]
const EXTRA: &[SignalName] = &[];

/// Iterates over every known signal.
pub fn signals() -> impl Iterator<Item = &'static SignalName> {
    STANDARD.iter().chain(EXTRA)
}

/// Short name of signal `number`, e.g. `term` for 15.
pub fn signal_name(number: i32) -> Option<&'static str> {
    if number <= 0 {
        return None;
    }
    signals().find(|s| s.number == number).map(|s| s.short)
}

/// Number of the signal called `name` (`SIGTERM`, `TERM` or `term`).
pub fn signal_number(name: &str) -> Option<i32> {
    let upper = name.to_ascii_uppercase();
    let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
    signals()
        .find(|s| s.name.get(3..) == Some(bare))
        .map(|s| s.number)
}
