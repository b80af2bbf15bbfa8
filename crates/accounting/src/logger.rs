//! 호스트 기록 — 호스트별 append-only 기록 파일
//!
//! 호스트마다 `<log_dir>/<주소>` 파일 하나를 두고, 기록할 때마다 한 줄을 덧붙입니다.
//!
//! ```text
//! <epoch 초> <누적 tx 바이트> <누적 rx 바이트>\n
//! ```
//!
//! 기록되는 타임스탬프는 호스트의 `last_logged_time`(기록 구간의 시작)이며,
//! 기록이 끝나면 `last_logged_time`을 `now`로 갱신합니다.
//! 파일은 단일 writer를 가정하며 프로세스 간 잠금은 하지 않습니다.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::address::to_text;
use crate::error::AccountingError;
use crate::table::Host;

/// 호스트 카운터를 영속화하는 trait
///
/// 실패는 호출자에게 전달되며, 호출자는 로그를 남기고 다른 호스트 처리를 계속합니다.
pub trait HostSink {
    /// 호스트의 현재 카운터를 기록하고 `last_logged_time`을 `now`로 갱신합니다.
    fn flush(&mut self, host: &mut Host, now: u64) -> Result<(), AccountingError>;
}

/// 파일 기반 호스트 기록기
#[derive(Debug, Clone)]
pub struct FileHostLogger {
    log_dir: PathBuf,
}

impl FileHostLogger {
    /// 기록 디렉토리를 준비합니다. 없으면 생성합니다.
    pub fn open(log_dir: impl AsRef<Path>) -> Result<Self, AccountingError> {
        let log_dir = log_dir.as_ref();
        if log_dir.as_os_str().is_empty() {
            return Err(AccountingError::LogPath {
                path: String::new(),
                reason: "log directory must not be empty".to_owned(),
            });
        }

        fs::create_dir_all(log_dir).map_err(|e| AccountingError::LogPath {
            path: log_dir.display().to_string(),
            reason: e.to_string(),
        })?;
        if !log_dir.is_dir() {
            return Err(AccountingError::LogPath {
                path: log_dir.display().to_string(),
                reason: "not a directory".to_owned(),
            });
        }

        Ok(Self {
            log_dir: log_dir.to_path_buf(),
        })
    }

    /// 기록 디렉토리
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// 호스트의 기록 파일 경로
    pub fn path_for(&self, host: &Host) -> PathBuf {
        self.log_dir.join(to_text(host.address()))
    }
}

impl HostSink for FileHostLogger {
    fn flush(&mut self, host: &mut Host, now: u64) -> Result<(), AccountingError> {
        let record = LogRecord::from_host(host);
        let path = self.path_for(host);

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(record.to_string().as_bytes())?;

        debug!(
            host = %host.address(),
            path = %path.display(),
            tx = record.tx_bytes,
            rx = record.rx_bytes,
            "host record appended"
        );
        host.last_logged_time = now;
        Ok(())
    }
}

/// 기록 파일의 한 줄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    /// 기록 구간 시작 시각 (Unix epoch 초)
    pub timestamp: u64,
    /// 누적 송신 바이트
    pub tx_bytes: u64,
    /// 누적 수신 바이트
    pub rx_bytes: u64,
}

impl LogRecord {
    /// 호스트의 현재 상태로 레코드를 만듭니다.
    pub fn from_host(host: &Host) -> Self {
        Self {
            timestamp: host.last_logged_time,
            tx_bytes: host.tx_bytes,
            rx_bytes: host.rx_bytes,
        }
    }
}

/// 줄바꿈을 포함한 한 줄을 출력합니다.
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} {}", self.timestamp, self.tx_bytes, self.rx_bytes)
    }
}

impl FromStr for LogRecord {
    type Err = AccountingError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| AccountingError::MalformedRecord {
            line: line.to_owned(),
            reason: reason.to_owned(),
        };

        let mut fields = line.trim_end_matches(['\r', '\n']).split(' ');
        let mut next = |name: &str| -> Result<u64, AccountingError> {
            let field = fields
                .next()
                .ok_or_else(|| malformed(&format!("missing {name} field")))?;
            field
                .parse::<u64>()
                .map_err(|e| malformed(&format!("invalid {name} '{field}': {e}")))
        };

        let record = Self {
            timestamp: next("timestamp")?,
            tx_bytes: next("tx")?,
            rx_bytes: next("rx")?,
        };
        if fields.next().is_some() {
            return Err(malformed("unexpected trailing field"));
        }
        Ok(record)
    }
}

/// 기록 파일 한 줄을 파싱합니다.
pub fn parse_record(line: &str) -> Result<LogRecord, AccountingError> {
    line.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    fn host_with_traffic(tx: u64, rx: u64, created: u64) -> Host {
        let mut host = Host::new(Address::ipv4([192, 168, 0, 7]), created);
        host.tx_bytes = tx;
        host.rx_bytes = rx;
        host
    }

    #[test]
    fn flush_appends_line_and_advances_logged_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = FileHostLogger::open(dir.path()).unwrap();
        let mut host = host_with_traffic(1500, 300, 1_000);

        logger.flush(&mut host, 2_000).unwrap();
        assert_eq!(host.last_logged_time, 2_000);

        host.tx_bytes += 10;
        logger.flush(&mut host, 3_000).unwrap();

        let content = fs::read_to_string(dir.path().join("192.168.0.7")).unwrap();
        assert_eq!(content, "1000 1500 300\n2000 1510 300\n");
    }

    #[test]
    fn open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let logger = FileHostLogger::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(logger.log_dir(), nested.as_path());
    }

    #[test]
    fn open_rejects_empty_and_file_paths() {
        assert!(matches!(
            FileHostLogger::open(""),
            Err(AccountingError::LogPath { .. })
        ));

        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            FileHostLogger::open(file.path()),
            Err(AccountingError::LogPath { .. })
        ));
    }

    #[test]
    fn flush_failure_leaves_logged_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = FileHostLogger::open(dir.path()).unwrap();
        let mut host = host_with_traffic(1, 1, 10);
        // 기록 파일 위치에 디렉토리를 만들어 쓰기를 실패시킴
        fs::create_dir(logger.path_for(&host)).unwrap();

        assert!(logger.flush(&mut host, 20).is_err());
        assert_eq!(host.last_logged_time, 10);
    }

    #[test]
    fn written_line_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = FileHostLogger::open(dir.path()).unwrap();
        let mut host = host_with_traffic(u64::from(u32::MAX) + 5, 42, 1_700_000_000);
        logger.flush(&mut host, 1_700_000_300).unwrap();

        let content = fs::read_to_string(logger.path_for(&host)).unwrap();
        let record = parse_record(content.lines().next().unwrap()).unwrap();
        assert_eq!(
            record,
            LogRecord {
                timestamp: 1_700_000_000,
                tx_bytes: u64::from(u32::MAX) + 5,
                rx_bytes: 42,
            }
        );
    }

    #[test]
    fn parse_record_rejects_malformed_lines() {
        for line in ["", "1 2", "1 2 3 4", "a 2 3", "1  2 3", "-1 2 3"] {
            assert!(
                matches!(
                    parse_record(line),
                    Err(AccountingError::MalformedRecord { .. })
                ),
                "line {line:?} should be rejected"
            );
        }
    }
}
