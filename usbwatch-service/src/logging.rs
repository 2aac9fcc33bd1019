// SPDX-License-Identifier: GPL-3.0-only

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Daily files are named `usbwatch.log.YYYY-MM-DD`.
const LOG_PREFIX: &str = "usbwatch.log";
const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub(crate) fn init(config: &Config) {
    let directive = config.log_level.as_directive();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn")
            .add_directive(
                format!("usbwatch={directive}")
                    .parse()
                    .expect("Invalid log directive: usbwatch level"),
            )
            .add_directive(
                format!("usbwatch_sys={directive}")
                    .parse()
                    .expect("Invalid log directive: usbwatch_sys level"),
            )
    });

    // Events themselves go to stdout, diagnostics to stderr.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let log_file = if config.log_to_disk {
        match open_log_file() {
            Ok(log_file) => Some(log_file),
            Err(e) => {
                // No subscriber yet.
                eprintln!("usbwatch: file logging disabled: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let (file_layer, opened) = match log_file {
        Some(LogFile {
            writer,
            guard,
            dir,
            pruned,
        }) => {
            let _ = LOG_GUARD.set(guard);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false);
            (Some(layer), Some((dir, pruned)))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some((dir, pruned)) = opened {
        tracing::debug!(
            "Logging to {} ({} expired log file(s) removed)",
            dir.display(),
            pruned
        );
    }
}

struct LogFile {
    writer: NonBlocking,
    guard: WorkerGuard,
    dir: PathBuf,
    pruned: usize,
}

fn open_log_file() -> anyhow::Result<LogFile> {
    let dir = log_dir(|key| env::var_os(key))
        .context("neither USBWATCH_LOG_DIR, XDG_STATE_HOME nor HOME is set")?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("create log directory {}", dir.display()))?;

    let cutoff = SystemTime::now()
        .checked_sub(RETENTION)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let pruned = prune_logs(&dir, cutoff)
        .with_context(|| format!("prune log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, LOG_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    Ok(LogFile {
        writer,
        guard,
        dir,
        pruned,
    })
}

/// `USBWATCH_LOG_DIR`, else `usbwatch` under the XDG state directory.
fn log_dir(var: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    if let Some(dir) = var("USBWATCH_LOG_DIR") {
        return Some(PathBuf::from(dir));
    }

    let state = var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| var("HOME").map(|home| Path::new(&home).join(".local/state")))?;
    Some(state.join("usbwatch"))
}

/// Remove rolled log files last modified before `cutoff`; returns how many.
fn prune_logs(dir: &Path, cutoff: SystemTime) -> io::Result<usize> {
    let mut removed = 0;

    for entry in fs::read_dir(dir)?.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(LOG_PREFIX) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let expired = metadata.is_file()
            && metadata.modified().is_ok_and(|modified| modified < cutoff);

        if expired && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("usbwatch-{label}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    fn write_aged(path: &Path, age: Duration) {
        fs::write(path, b"log line").expect("write file");
        File::options()
            .write(true)
            .open(path)
            .expect("open file")
            .set_modified(SystemTime::now() - age)
            .expect("backdate file");
    }

    #[test]
    fn prune_removes_only_expired_rolled_logs() {
        let dir = scratch_dir("prune");
        let expired = dir.join("usbwatch.log.2026-10-01");
        let fresh = dir.join("usbwatch.log.2026-10-19");
        let unrelated = dir.join("notes.txt");
        let week_and_a_day = RETENTION + Duration::from_secs(24 * 60 * 60);
        write_aged(&expired, week_and_a_day);
        write_aged(&unrelated, week_and_a_day);
        write_aged(&fresh, Duration::from_secs(60));

        let removed = prune_logs(&dir, SystemTime::now() - RETENTION).expect("prune logs");

        assert_eq!(removed, 1);
        assert!(!expired.exists());
        assert!(fresh.exists());
        assert!(unrelated.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    fn vars(set: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<OsString> {
        move |key: &str| {
            set.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| OsString::from(*value))
        }
    }

    #[test]
    fn log_dir_prefers_override_then_xdg_then_home() {

        assert_eq!(
            log_dir(vars(&[("USBWATCH_LOG_DIR", "/var/log/usbwatch"), ("HOME", "/home/a")])),
            Some(PathBuf::from("/var/log/usbwatch"))
        );
        assert_eq!(
            log_dir(vars(&[("XDG_STATE_HOME", "/state"), ("HOME", "/home/a")])),
            Some(PathBuf::from("/state/usbwatch"))
        );
        assert_eq!(
            log_dir(vars(&[("HOME", "/home/a")])),
            Some(PathBuf::from("/home/a/.local/state/usbwatch"))
        );
        assert_eq!(log_dir(vars(&[])), None);
    }
}
