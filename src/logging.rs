// src/logging.rs
//
// Bridge logging.
//
// Every line is `HH:MM:SS.mmm [component] message`, component being one of
// `[serial]`, `[supervisor]`, `[bridge]`, `[telemetry]` or `[sensors]`.
// Lines go to stderr and, with `--log-dir`, to a per-run file as well.
// Per-frame traffic is only traced with `--verbose`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Current run's log file, if `--log-dir` was given
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Frame and chunk tracing. Telemetry runs at the sensor rate, so this is off by default.
static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Start a `YYYYmmdd-HHMMSS-balancebridge.log` for this run under `log_dir`.
/// On Unix `balancebridge.log` is pointed at it so the current run is easy to tail.
pub fn init_file_logging(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|e| format!("Failed to create log dir: {}", e))?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-balancebridge.log")
        .to_string();
    let log_path = log_dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to create log file: {}", e))?;

    // Windows symlinks need elevation
    #[cfg(unix)]
    {
        let symlink_path = log_dir.join("balancebridge.log");
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            eprintln!(
                "{} [logging] Failed to create balancebridge.log symlink: {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                e
            );
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    // Not tlog!: the file should not open with its own announcement
    eprintln!(
        "{} [logging] File logging started: {}",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        log_path.display()
    );

    Ok(())
}

/// Close the run's log file. Stderr logging carries on.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.is_some() {
            *guard = None;
            eprintln!(
                "{} [logging] File logging stopped",
                chrono::Local::now().format("%H:%M:%S%.3f")
            );
        }
    }
}

/// Log one bridge event, e.g. `tlog!("[serial] Opened {}", name)`.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let msg = format!("{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), format_args!($($arg)*));
        eprintln!("{}", msg);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }};
}

/// Per-frame trace, dropped unless `--verbose`
macro_rules! vlog {
    ($($arg:tt)*) => {{
        if $crate::logging::is_verbose() {
            tlog!($($arg)*);
        }
    }};
}
