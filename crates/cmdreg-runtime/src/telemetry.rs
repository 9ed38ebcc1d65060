//! Process-wide tracing setup.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use cmdreg_config::ObservabilityConfig;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Environment override for `observability.log_file`.
pub const LOG_FILE_ENV: &str = "CMDREG_LOG_FILE";

/// Install the global subscriber once; later calls are ignored.
///
/// `RUST_LOG` wins over `observability.log_level`. Logs go to stdout unless a
/// log file is configured.
pub fn init_tracing(observability: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let log_file_path = std::env::var(LOG_FILE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| observability.log_file.clone());
        let file_writer = log_file_path.as_deref().and_then(create_log_writer);
        let fallback_level = fallback_level(&observability.log_level);

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(fallback_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        match file_writer {
            Some(writer) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer)
                    .try_init();
            }
            None => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .try_init();
            }
        }

        tracing::info!(
            log_level = %observability.log_level,
            log_file = log_file_path.as_deref().unwrap_or("(stdout)"),
            "tracing initialized"
        );
    });
}

fn fallback_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn create_log_writer(path: &str) -> Option<SharedFileMakeWriter> {
    let file_path = Path::new(path);
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = create_dir_all(parent) {
                eprintln!("failed to create log directory '{}': {}", parent.display(), err);
                return None;
            }
        }
    }
    match OpenOptions::new().create(true).append(true).open(file_path) {
        Ok(file) => Some(SharedFileMakeWriter {
            file: Arc::new(Mutex::new(file)),
        }),
        Err(err) => {
            eprintln!("failed to open log file '{}': {}", file_path.display(), err);
            None
        }
    }
}

#[derive(Clone)]
struct SharedFileMakeWriter {
    file: Arc<Mutex<File>>,
}

struct SharedFileWriter {
    file: Arc<Mutex<File>>,
}

impl<'a> MakeWriter<'a> for SharedFileMakeWriter {
    type Writer = SharedFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileWriter {
            file: Arc::clone(&self.file),
        }
    }
}

impl io::Write for SharedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file mutex poisoned"))?;
        io::Write::write(&mut *file, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file mutex poisoned"))?;
        io::Write::flush(&mut *file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fallback_level_defaults_to_info() {
        assert_eq!(fallback_level(" DEBUG "), "debug");
        assert_eq!(fallback_level("verbose"), "info");
    }

    #[test]
    fn test_log_writer_appends_to_file() {
        let root = std::env::temp_dir().join(format!("cmdreg-log-{}", uuid::Uuid::new_v4()));
        let path = root.join("nested").join("cmdreg.log");
        let make = create_log_writer(&path.to_string_lossy()).expect("writer");

        make.make_writer().write_all(b"one\n").unwrap();
        make.make_writer().write_all(b"two\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        let _ = std::fs::remove_dir_all(root);
    }
}
