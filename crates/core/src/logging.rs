//! Category-based logging shared by the emulator crates.
//!
//! Components log through [`log`] with a [`LogCategory`] and a [`LogLevel`].
//! The message is built lazily, so a disabled category costs one atomic load.
//!
//! - Every category has its own level. A category left at `Off` falls back
//!   to the global level.
//! - Output is rate limited per category over a one-second window. Dropped
//!   messages are summarised once the window rolls over.
//! - Output goes to stderr, or to a file written by a background thread once
//!   [`LogConfig::set_log_file`] has been called.
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Timer, LogLevel::Debug, || {
//!     format!("RIOT: timer underflow at cycle {}", 1234)
//! });
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level '{0}' (expected off, error, warn, info, debug or trace)")]
pub struct ParseLogLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(LogLevel::Off),
            "error" | "err" | "1" => Ok(LogLevel::Error),
            "warn" | "warning" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

impl LogLevel {
    const fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Emulator component a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Instruction execution and halting
    CPU,
    /// Address decoding and deferred writes
    Bus,
    /// TIA beam, strobes and frame hand-off
    Video,
    /// RIOT interval timer
    Timer,
    /// BRK, RTI and WSYNC halt/resume
    Interrupts,
    /// Undocumented opcodes and unmapped registers
    Stubs,
}

impl LogCategory {
    pub const ALL: [LogCategory; 6] = [
        LogCategory::CPU,
        LogCategory::Bus,
        LogCategory::Video,
        LogCategory::Timer,
        LogCategory::Interrupts,
        LogCategory::Stubs,
    ];

    const fn index(self) -> usize {
        match self {
            LogCategory::CPU => 0,
            LogCategory::Bus => 1,
            LogCategory::Video => 2,
            LogCategory::Timer => 3,
            LogCategory::Interrupts => 4,
            LogCategory::Stubs => 5,
        }
    }
}

const CATEGORY_COUNT: usize = LogCategory::ALL.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Allowed,
    /// Allowed, and this many messages were dropped in the previous window
    AllowedAfterDrops(usize),
    Dropped,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Option<Instant>,
    admitted: usize,
    dropped: usize,
}

/// Fixed one-second window counter per category
struct RateLimiter {
    max_per_window: AtomicUsize,
    window: Duration,
    windows: Mutex<[Window; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_per_window: usize) -> Self {
        Self {
            max_per_window: AtomicUsize::new(max_per_window),
            window: Duration::from_secs(1),
            windows: Mutex::new(
                [Window {
                    started: None,
                    admitted: 0,
                    dropped: 0,
                }; CATEGORY_COUNT],
            ),
        }
    }

    fn admit(&self, category: LogCategory, now: Instant) -> Admission {
        let max = self.max_per_window.load(Ordering::Relaxed);
        let mut windows = lock(&self.windows);
        let w = &mut windows[category.index()];

        let mut carried_drops = 0;
        let expired = match w.started {
            Some(start) => now.duration_since(start) >= self.window,
            None => true,
        };
        if expired {
            carried_drops = w.dropped;
            *w = Window {
                started: Some(now),
                admitted: 0,
                dropped: 0,
            };
        }

        if w.admitted < max {
            w.admitted += 1;
            if carried_drops > 0 {
                Admission::AllowedAfterDrops(carried_drops)
            } else {
                Admission::Allowed
            }
        } else {
            w.dropped += 1;
            Admission::Dropped
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-wide logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; CATEGORY_COUNT],
    file_sink: Mutex<Option<Sender<String>>>,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    const DEFAULT_RATE_LIMIT: usize = 60;

    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: Default::default(),
            file_sink: Mutex::new(None),
            rate_limiter: RateLimiter::new(Self::DEFAULT_RATE_LIMIT),
        }
    }

    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category with its own level ignores the global one.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let threshold = match self.get_level(category) {
            LogLevel::Off => self.get_global_level(),
            own => own,
        };
        level <= threshold
    }

    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Maximum messages per category per second
    pub fn set_rate_limit(&self, max_per_second: usize) {
        self.rate_limiter
            .max_per_window
            .store(max_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_per_window.load(Ordering::Relaxed)
    }

    /// Send output to `path` (appending) instead of stderr.
    ///
    /// The file is written from a background thread so emulation never
    /// blocks on disk I/O.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                for line in receiver {
                    let _ = writeln!(file, "{}", line);
                    let _ = file.flush();
                }
            })?;

        *lock(&self.file_sink) = Some(sender);
        Ok(())
    }

    /// Go back to stderr. The writer thread exits once its channel closes.
    pub fn clear_log_file(&self) {
        *lock(&self.file_sink) = None;
    }

    fn emit(&self, line: String) {
        let sink = lock(&self.file_sink);
        match sink.as_ref() {
            Some(sender) => {
                if let Err(unsent) = sender.send(line) {
                    eprintln!("{}", unsent.0);
                }
            }
            None => eprintln!("{}", line),
        }
    }
}

/// Log a lazily formatted message.
///
/// `message_fn` only runs when the category is enabled at `level` and the
/// category is under its rate limit.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    match config.rate_limiter.admit(category, Instant::now()) {
        Admission::Dropped => {}
        Admission::Allowed => config.emit(message_fn()),
        Admission::AllowedAfterDrops(count) => {
            config.emit(format!(
                "[{:?}] rate limit exceeded, {} message(s) dropped",
                category, count
            ));
            config.emit(message_fn());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_levels() {
        assert_eq!("off".parse(), Ok(LogLevel::Off));
        assert_eq!("ERROR".parse(), Ok(LogLevel::Error));
        assert_eq!("err".parse(), Ok(LogLevel::Error));
        assert_eq!("Warning".parse(), Ok(LogLevel::Warn));
        assert_eq!("3".parse(), Ok(LogLevel::Info));
        assert_eq!("debug".parse(), Ok(LogLevel::Debug));
        assert_eq!("trace".parse(), Ok(LogLevel::Trace));
        assert_eq!(
            "loud".parse::<LogLevel>(),
            Err(ParseLogLevelError("loud".to_string()))
        );
    }

    #[test]
    fn levels_are_ordered_by_verbosity() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        assert!(config.should_log(LogCategory::Video, LogLevel::Error));
        assert!(!config.should_log(LogCategory::Video, LogLevel::Warn));

        config.set_level(LogCategory::Video, LogLevel::Trace);
        assert!(config.should_log(LogCategory::Video, LogLevel::Trace));
        assert!(!config.should_log(LogCategory::Timer, LogLevel::Warn));
    }

    #[test]
    fn off_messages_never_log() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        assert!(!config.should_log(LogCategory::CPU, LogLevel::Off));
    }

    #[test]
    fn reset_turns_everything_off() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Info);
        config.set_level(LogCategory::Bus, LogLevel::Debug);
        config.reset();
        assert_eq!(config.get_global_level(), LogLevel::Off);
        for category in LogCategory::ALL {
            assert_eq!(config.get_level(category), LogLevel::Off);
        }
    }

    #[test]
    fn rate_limiter_caps_each_window() {
        let limiter = RateLimiter::new(3);
        let t0 = Instant::now();
        for _ in 0..3 {
            assert_eq!(limiter.admit(LogCategory::CPU, t0), Admission::Allowed);
        }
        assert_eq!(limiter.admit(LogCategory::CPU, t0), Admission::Dropped);
        assert_eq!(limiter.admit(LogCategory::CPU, t0), Admission::Dropped);

        // Other categories have their own budget
        assert_eq!(limiter.admit(LogCategory::Timer, t0), Admission::Allowed);
    }

    #[test]
    fn rate_limiter_reports_drops_when_window_rolls_over() {
        let limiter = RateLimiter::new(1);
        let t0 = Instant::now();
        assert_eq!(limiter.admit(LogCategory::Bus, t0), Admission::Allowed);
        assert_eq!(limiter.admit(LogCategory::Bus, t0), Admission::Dropped);
        assert_eq!(limiter.admit(LogCategory::Bus, t0), Admission::Dropped);

        let t1 = t0 + Duration::from_millis(1100);
        assert_eq!(
            limiter.admit(LogCategory::Bus, t1),
            Admission::AllowedAfterDrops(2)
        );
        assert_eq!(limiter.admit(LogCategory::Bus, t1), Admission::Dropped);
    }

    #[test]
    fn rate_limit_is_adjustable() {
        let config = LogConfig::new();
        assert_eq!(config.get_rate_limit(), 60);
        config.set_rate_limit(5);
        assert_eq!(config.get_rate_limit(), 5);
    }
}
