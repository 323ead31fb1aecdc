use std::{fmt::Write as _, thread};

use chrono::{format::DelayedFormat, Local};
use once_cell::sync::Lazy;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::logging::rotate::Rotate;

pub mod rotate;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

/// 累積到此長度或佇列已空時才寫入檔案
const BATCH_SIZE: usize = 4096;

pub struct Logger {
    info_writer: UnboundedSender<String>,
    warn_writer: UnboundedSender<String>,
    error_writer: UnboundedSender<String>,
    debug_writer: UnboundedSender<String>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        Logger {
            info_writer: Self::create_writer(&format!("{}_info", log_name)),
            warn_writer: Self::create_writer(&format!("{}_warn", log_name)),
            error_writer: Self::create_writer(&format!("{}_error", log_name)),
            debug_writer: Self::create_writer(&format!("{}_debug", log_name)),
        }
    }

    pub fn info(&self, log: impl Into<String>) {
        Self::send(log.into(), &self.info_writer);
    }

    pub fn warn(&self, log: impl Into<String>) {
        Self::send(log.into(), &self.warn_writer);
    }

    pub fn error(&self, log: impl Into<String>) {
        Self::send(log.into(), &self.error_writer);
    }

    pub fn debug(&self, log: impl Into<String>) {
        Self::send(log.into(), &self.debug_writer);
    }

    fn send(msg: String, writer: &UnboundedSender<String>) {
        if let Err(why) = writer.send(msg) {
            error_console(why.to_string());
        }
    }

    fn create_writer(log_name: &str) -> UnboundedSender<String> {
        let (tx, mut rx) = unbounded_channel::<String>();
        let mut rotate = Rotate::new(format!("log/%Y-%m-%d-{}.log", log_name));

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let mut line = String::with_capacity(BATCH_SIZE);

            while let Some(received) = rx.blocking_recv() {
                let now = Local::now();
                if write!(&mut line, "{} {}\r\n", now.format("%F %X%.6f"), received).is_err() {
                    continue;
                }

                if rx.is_empty() || line.len() >= BATCH_SIZE {
                    if let Err(why) = rotate.write_msg(now, line.as_bytes()) {
                        error_console(format!(
                            "Failed to write to log file. because:{:#?}\r\nmsg:{}",
                            why, line
                        ));
                    }

                    rotate.flush();
                    line.clear();
                }
            }
        });

        tx
    }
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

pub fn debug_file_async(log: impl Into<String>) {
    LOGGER.debug(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    println!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}
