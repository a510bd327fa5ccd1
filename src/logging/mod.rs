use std::{
    fmt::Write as _,
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    thread,
};

use chrono::{format::DelayedFormat, DateTime, Local};
use crossbeam_channel::{unbounded, Sender};
use once_cell::sync::Lazy;
use strum::Display;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

/// 單次寫檔的緩衝上限，超過就先 flush
const FLUSH_THRESHOLD: usize = 4096;

/// 日誌等級
#[derive(Display, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }
}

/// 以獨立線程寫入 `log/{日期}_{name}.log` 的檔案日誌
pub struct Logger {
    writer: Option<Sender<LogMessage>>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        let log_path = match Self::get_log_path(log_name) {
            Some(p) => p,
            None => {
                error_console(format!("Failed to create log directory for {}", log_name));
                return Logger { writer: None };
            }
        };
        let (tx, rx) = unbounded::<LogMessage>();

        // 寫入檔案的操作使用另一個線程處理
        let spawned = thread::Builder::new()
            .name(format!("log-{}", log_name))
            .spawn(move || {
                let file = match OpenOptions::new().create(true).append(true).open(&log_path) {
                    Ok(f) => f,
                    Err(why) => {
                        error_console(format!(
                            "Failed to open log file {:?} because {:?}",
                            log_path, why
                        ));
                        return;
                    }
                };

                let mut writer = BufWriter::new(file);
                let mut line = String::with_capacity(FLUSH_THRESHOLD);

                for received in &rx {
                    if writeln!(
                        &mut line,
                        "{} {} {}",
                        received.created_at.format("%F %X%.6f"),
                        received.level,
                        received.msg
                    )
                    .is_err()
                    {
                        continue;
                    }

                    if rx.is_empty() || line.len() >= FLUSH_THRESHOLD {
                        if let Err(why) = writer.write_all(line.as_bytes()) {
                            error_console(format!(
                                "Failed to write to log file. because:{:#?}\r\nmsg:{}",
                                why, line
                            ));
                        }

                        if let Err(why) = writer.flush() {
                            error_console(format!("Failed to flush log file. because:{:#?}", why));
                        }

                        line.clear();
                    }
                }
            });

        if let Err(why) = spawned {
            error_console(format!("Failed to spawn log writer because {:?}", why));
            return Logger { writer: None };
        }

        Logger { writer: Some(tx) }
    }

    pub fn debug(&self, log: impl Into<String>) {
        self.send(Level::Debug, log.into());
    }

    pub fn info(&self, log: impl Into<String>) {
        self.send(Level::Info, log.into());
    }

    pub fn warn(&self, log: impl Into<String>) {
        self.send(Level::Warn, log.into());
    }

    pub fn error(&self, log: impl Into<String>) {
        let msg = log.into();
        error_console(msg.clone());
        self.send(Level::Error, msg);
    }

    fn send(&self, level: Level, msg: String) {
        match &self.writer {
            Some(writer) => {
                if let Err(why) = writer.send(LogMessage::new(level, msg)) {
                    error_console(why.to_string());
                }
            }
            // 檔案寫不了就退回 console
            None => info_console(format!("{} {}", level, msg)),
        }
    }

    fn get_log_path(name: &str) -> Option<PathBuf> {
        let path = Path::new("log");

        if !path.exists() {
            fs::create_dir_all(path).ok()?;
        }

        let mut log_path = PathBuf::from(path);
        log_path.push(format!("{}_{}.log", Local::now().format("%Y-%m-%d"), name));

        Some(log_path)
    }
}

pub fn debug_file_async(log: impl Into<String>) {
    LOGGER.debug(log);
}

pub fn info_file_async(log: impl Into<String>) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: impl Into<String>) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: impl Into<String>) {
    LOGGER.error(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    eprintln!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Info.to_string(), "Info");
        assert_eq!(Level::Error.to_string(), "Error");
    }

    #[test]
    fn test_named_logger_writes_file() {
        let logger = Logger::new("logging_test");
        logger.info("寫入測試");
        thread::sleep(Duration::from_millis(200));

        let path = Logger::get_log_path("logging_test").expect("log path");
        let content = fs::read_to_string(path).expect("log file");
        assert!(content.contains("Info 寫入測試"));
    }
}
