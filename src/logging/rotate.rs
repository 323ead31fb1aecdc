use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, TimeDelta};
use rayon::prelude::*;

use crate::logging;

/// 預設單檔最大大小：10 MB
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
/// 預設保留天數：7 天
const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// 依日期與大小輪轉的日誌檔
pub struct Rotate {
    /// 檔名模式，例如 "log/%Y-%m-%d-info.log"
    fn_pattern: String,
    /// 當前完整檔名（含 generation）
    cur_fn: String,
    /// 當前基礎檔名（不含 generation，由日期決定）
    cur_base_fn: String,
    out_fh: Option<BufWriter<File>>,
    /// 當前世代編號，只增不減
    generation: u32,
    max_size: u64,
    /// 當前檔案已寫入大小
    current_size: u64,
    max_age: TimeDelta,
}

impl Rotate {
    pub fn new(fn_pattern: String) -> Self {
        Self::with_options(fn_pattern, DEFAULT_MAX_SIZE, DEFAULT_MAX_AGE_DAYS)
    }

    /// # Arguments
    /// * `fn_pattern` - 檔名模式，例如 "log/%Y-%m-%d-info.log"
    /// * `max_size` - 單檔最大大小 (bytes)
    /// * `max_age_days` - 日誌保留天數
    pub fn with_options(fn_pattern: String, max_size: u64, max_age_days: i64) -> Self {
        Rotate {
            fn_pattern,
            cur_fn: String::new(),
            cur_base_fn: String::new(),
            out_fh: None,
            generation: 0,
            max_size,
            current_size: 0,
            max_age: TimeDelta::try_days(max_age_days).unwrap_or(TimeDelta::days(7)),
        }
    }

    /// 寫入日誌訊息，自動處理日期變更與大小輪轉
    pub fn write_msg(&mut self, now: DateTime<Local>, msg: &[u8]) -> Result<()> {
        let base_fn = now.format(&self.fn_pattern).to_string();

        // 日期變更：重設 generation
        if base_fn != self.cur_base_fn {
            self.generation = 0;
            self.cur_base_fn = base_fn;
            self.open_new_file()?;
            self.cleanup_old_files(now);
        }

        // 重啟後既有的世代檔可能已滿，往後找到放得下或全新的檔案為止
        while self.current_size > 0 && self.current_size + msg.len() as u64 > self.max_size {
            self.generation += 1;
            self.open_new_file()?;
        }

        let writer = self
            .out_fh
            .as_mut()
            .ok_or_else(|| anyhow!("Log file {} is not opened", self.cur_fn))?;
        writer.write_all(msg)?;
        self.current_size += msg.len() as u64;

        Ok(())
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.out_fh.as_mut() {
            if let Err(why) = writer.flush() {
                logging::error_console(format!(
                    "Failed to flush log file({}). because:{:#?}",
                    self.cur_fn, why
                ));
            }
        }
    }

    /// generation = 0: "log/2025-02-03-info.log"
    /// generation = 2: "log/2025-02-03-info.2.log"
    fn generate_full_fn(base_fn: &str, generation: u32) -> String {
        if generation == 0 {
            return base_fn.to_string();
        }

        let path = Path::new(base_fn);
        let parent = path.parent().unwrap_or(Path::new(""));
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("log");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("log");

        parent
            .join(format!("{}.{}.{}", stem, generation, ext))
            .to_string_lossy()
            .to_string()
    }

    fn open_new_file(&mut self) -> Result<()> {
        self.flush();

        let filename = Self::generate_full_fn(&self.cur_base_fn, self.generation);
        if let Some(parent) = Path::new(&filename).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.out_fh = Some(BufWriter::with_capacity(4096, file));
        self.cur_fn = filename;

        Ok(())
    }

    /// 清理超過 max_age 的檔案
    fn cleanup_old_files(&self, now: DateTime<Local>) {
        let files = match Self::files_in_directory(&self.cur_fn) {
            Ok(files) => files,
            Err(why) => {
                logging::error_console(format!(
                    "Failed to list_files_in_directory because {:?}",
                    why
                ));
                return;
            }
        };

        let cut_off = (now - self.max_age).timestamp().max(0) as u64;
        let to_unlink: Vec<PathBuf> = files
            .into_iter()
            .filter(|file| {
                fs::metadata(file)
                    .and_then(|metadata| metadata.modified())
                    .ok()
                    .and_then(|system_time| system_time.duration_since(UNIX_EPOCH).ok())
                    .is_some_and(|duration| duration.as_secs() <= cut_off)
            })
            .collect();

        to_unlink
            .par_iter()
            .with_min_len(num_cpus::get())
            .for_each(|unlink| match fs::remove_file(unlink) {
                Err(why) => {
                    logging::error_console(format!(
                        "couldn't remove the file({}). because {:?}",
                        unlink.display(),
                        why
                    ));
                }
                Ok(_) => {
                    logging::info_console(format!(
                        "the file has been deleted:{}",
                        unlink.display()
                    ));
                }
            });
    }

    fn files_in_directory<P: AsRef<Path>>(file_path: P) -> Result<Vec<PathBuf>, io::Error> {
        let parent_dir = file_path
            .as_ref()
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Parent directory not found"))?;

        let mut files = Vec::new();
        for entry in fs::read_dir(parent_dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }

        Ok(files)
    }
}

impl Drop for Rotate {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn temp_pattern(name: &str) -> (PathBuf, String) {
        let dir = std::env::temp_dir().join(format!("twse_realtime_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let pattern = dir.join("%Y-%m-%d-test.log").to_string_lossy().to_string();
        (dir, pattern)
    }

    #[test]
    fn test_generation_filename() {
        let base = "log/2025-02-03-info.log";
        assert_eq!(Rotate::generate_full_fn(base, 0), "log/2025-02-03-info.log");
        assert_eq!(Rotate::generate_full_fn(base, 1), "log/2025-02-03-info.1.log");
        assert_eq!(Rotate::generate_full_fn(base, 2), "log/2025-02-03-info.2.log");
    }

    /// generation 只增不減，且不會覆蓋舊檔案
    #[test]
    fn test_size_rotation_no_overwrite() {
        let (dir, pattern) = temp_pattern("size");
        let now = Local::now();
        let final_generation = {
            let mut r = Rotate::with_options(pattern, 512, 7);
            for i in 0..50 {
                let msg = format!("Line {:03} - {}\r\n", i, "X".repeat(50));
                r.write_msg(now, msg.as_bytes()).unwrap();
            }
            r.generation
        };

        assert!(final_generation >= 3, "實際: {}", final_generation);

        let files: HashSet<String> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(files.len() as u32, final_generation + 1, "{:?}", files);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_size_rotation_skips_full_generations() {
        let (dir, pattern) = temp_pattern("restart");
        let now = Local::now();
        let base_fn = now.format(&pattern).to_string();
        let full_fn = Rotate::generate_full_fn(&base_fn, 1);

        fs::create_dir_all(&dir).unwrap();
        fs::write(&base_fn, "X".repeat(512)).unwrap();
        fs::write(&full_fn, "X".repeat(512)).unwrap();

        {
            let mut r = Rotate::with_options(pattern, 512, 7);
            r.write_msg(now, b"after restart\r\n").unwrap();
            assert_eq!(r.generation, 2);
        }

        assert_eq!(fs::metadata(&base_fn).unwrap().len(), 512);
        assert_eq!(fs::metadata(&full_fn).unwrap().len(), 512);
        let next_fn = Rotate::generate_full_fn(&base_fn, 2);
        assert_eq!(fs::read_to_string(next_fn).unwrap(), "after restart\r\n");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_date_rotation() {
        let (dir, pattern) = temp_pattern("date");
        let now = Local::now();
        {
            let mut r = Rotate::new(pattern);
            r.write_msg(now, b"Day 1\r\n").unwrap();
            r.write_msg(now + TimeDelta::days(1), b"Day 2\r\n").unwrap();
            assert_eq!(r.generation, 0);
        }

        let count = fs::read_dir(&dir).unwrap().flatten().count();
        assert_eq!(count, 2);

        let _ = fs::remove_dir_all(&dir);
    }
}
