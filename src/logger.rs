use {
    chrono::{Local, SecondsFormat},
    log::{logger, set_boxed_logger, set_max_level, LevelFilter, Log, Metadata, Record},
    std::{
        fs::{File, OpenOptions},
        io::{self, Write as _},
        path::Path,
        sync::{Mutex, PoisonError},
    },
};

/// Mirrors every record to stderr and appends it to the log file, which is what `/logs` sends.
struct Logger {
    file: Mutex<File>,
}

fn format_record(record: &Record) -> String {
    format!(
        "{} {:<5} {}: {}\n",
        Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        record.level(),
        record.module_path().unwrap_or(""),
        record.args(),
    )
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // Dependencies are only heard from at `info` and above
        metadata.level() <= log::max_level()
            && (metadata.level() <= log::Level::Info
                || metadata.target().starts_with(env!("CARGO_CRATE_NAME")))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_record(record);
        _ = io::stderr().write_all(line.as_bytes());
        _ = self.file.lock().unwrap_or_else(PoisonError::into_inner).write_all(line.as_bytes());
    }

    fn flush(&self) {
        _ = self.file.lock().unwrap_or_else(PoisonError::into_inner).flush();
    }
}

pub fn init(path: &Path, level: LevelFilter) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    set_boxed_logger(Box::new(Logger { file: Mutex::new(file) })).map_err(io::Error::other)?;
    set_max_level(level);
    Ok(())
}

pub fn deinit() {
    logger().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_single_lines_with_level_and_module() {
        let line = format_record(
            &Record::builder()
                .args(format_args!("Downloading {}", "song"))
                .level(log::Level::Warn)
                .module_path(Some("songdrop_bot::bot"))
                .build(),
        );
        assert!(line.ends_with("WARN  songdrop_bot::bot: Downloading song\n"), "{line}");
        assert_eq!(line.matches('\n').count(), 1);
    }
}
