//! Security-audit log collection behind a [`LogSource`] seam: the platform
//! source reads the Windows Security event log; everywhere else the source
//! reports unavailable and the scan degrades to an empty result.

use super::Collection;
use crate::error::Diagnostic;
use crate::features::LogFeatures;
use crate::report::{EntityMetadata, LogMetadata};
use chrono::{DateTime, Timelike, Utc};
use thiserror::Error;

/// Hard cap on audit events examined per scan, newest first.
pub const MAX_LOG_EVENTS: usize = 50;

/// One audit event as read from the log, before feature encoding.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub event_id: u32,
    pub event_type: u16,
    pub source_name: String,
    pub time_generated: DateTime<Utc>,
    pub event_category: u16,
    pub string_inserts: Vec<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum LogSourceError {
    #[error("audit log unavailable: {0}")]
    Unavailable(String),
    #[error("audit log access denied: {0}")]
    PermissionDenied(String),
}

pub trait LogSource: Send + Sync {
    /// Newest-first read of at most `limit` records.
    fn read_recent(&self, limit: usize) -> Result<Vec<AuditRecord>, LogSourceError>;
}

pub struct LogCollector {
    source: Box<dyn LogSource>,
    limit: usize,
}

impl LogCollector {
    pub fn new(source: Box<dyn LogSource>, limit: usize) -> Self {
        Self {
            source,
            limit: limit.min(MAX_LOG_EVENTS),
        }
    }

    pub fn platform(limit: usize) -> Self {
        Self::new(Box::new(SecurityEventLog::new()), limit)
    }

    pub fn collect(&self) -> Collection {
        let records = match self.source.read_recent(self.limit) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "audit log collection degraded");
                let diagnostic = match &e {
                    LogSourceError::PermissionDenied(detail) => {
                        Diagnostic::permission_denied(detail.clone())
                    }
                    LogSourceError::Unavailable(detail) => {
                        Diagnostic::source_unavailable(detail.clone())
                    }
                };
                return Collection::degraded(diagnostic);
            }
        };

        let mut collection = Collection::default();
        for record in records.into_iter().take(self.limit) {
            let features = LogFeatures {
                event_id: record.event_id,
                event_type: record.event_type,
                source_len: record.source_name.len(),
                error_or_warning: matches!(record.event_type, 1 | 2),
                inserts_len: record.string_inserts.iter().map(|s| s.len()).sum(),
                hour: record.time_generated.hour(),
                system_source: record.source_name.to_uppercase().contains("SYSTEM"),
                data_len: record.data.len(),
            };
            let metadata = EntityMetadata::Log(LogMetadata {
                event_id: record.event_id & 0xFFFF,
                event_type: record.event_type,
                source_name: record.source_name,
                time_generated: record.time_generated,
                event_category: record.event_category,
            });
            collection.entries.push((features.encode(), metadata));
        }
        collection
    }
}

/// The local Security event log.
#[derive(Default)]
pub struct SecurityEventLog;

impl SecurityEventLog {
    pub fn new() -> Self {
        Self
    }
}

impl LogSource for SecurityEventLog {
    #[cfg(windows)]
    fn read_recent(&self, limit: usize) -> Result<Vec<AuditRecord>, LogSourceError> {
        windows_impl::read_security_log(limit)
    }

    #[cfg(not(windows))]
    fn read_recent(&self, _limit: usize) -> Result<Vec<AuditRecord>, LogSourceError> {
        Err(LogSourceError::Unavailable(
            "security event log is only readable on Windows".into(),
        ))
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::{AuditRecord, LogSourceError};
    use chrono::DateTime;
    use windows::core::{w, PCWSTR};
    use windows::Win32::Foundation::{
        ERROR_ACCESS_DENIED, ERROR_HANDLE_EOF, ERROR_INSUFFICIENT_BUFFER,
    };
    use windows::Win32::System::EventLog::{
        CloseEventLog, EventLogHandle, OpenEventLogW, ReadEventLogW, EVENTLOGRECORD,
        EVENTLOG_BACKWARDS_READ, EVENTLOG_SEQUENTIAL_READ,
    };

    struct LogHandle(EventLogHandle);

    impl Drop for LogHandle {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseEventLog(self.0);
            }
        }
    }

    pub fn read_security_log(limit: usize) -> Result<Vec<AuditRecord>, LogSourceError> {
        let handle = unsafe { OpenEventLogW(PCWSTR::null(), w!("Security")) }.map_err(|e| {
            if e.code() == ERROR_ACCESS_DENIED.to_hresult() {
                LogSourceError::PermissionDenied(e.message().to_string())
            } else {
                LogSourceError::Unavailable(e.message().to_string())
            }
        })?;
        let handle = LogHandle(handle);

        let mut records = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        while records.len() < limit {
            let mut read = 0u32;
            let mut needed = 0u32;
            let result = unsafe {
                ReadEventLogW(
                    handle.0,
                    EVENTLOG_BACKWARDS_READ | EVENTLOG_SEQUENTIAL_READ,
                    0,
                    buf.as_mut_ptr().cast(),
                    buf.len() as u32,
                    &mut read,
                    &mut needed,
                )
            };
            match result {
                Ok(()) => parse_batch(&buf[..read as usize], limit, &mut records),
                Err(e) if e.code() == ERROR_HANDLE_EOF.to_hresult() => break,
                Err(e) if e.code() == ERROR_INSUFFICIENT_BUFFER.to_hresult() => {
                    buf.resize(needed as usize, 0);
                }
                Err(e) if records.is_empty() => {
                    if e.code() == ERROR_ACCESS_DENIED.to_hresult() {
                        return Err(LogSourceError::PermissionDenied(e.message().to_string()));
                    }
                    return Err(LogSourceError::Unavailable(e.message().to_string()));
                }
                // keep what was read before the failure
                Err(_) => break,
            }
        }
        records.truncate(limit);
        Ok(records)
    }

    /// Walk one read buffer of variable-length EVENTLOGRECORDs. Offsets inside
    /// a record are relative to that record's start.
    fn parse_batch(buf: &[u8], limit: usize, out: &mut Vec<AuditRecord>) {
        let header = std::mem::size_of::<EVENTLOGRECORD>();
        let mut offset = 0usize;
        while out.len() < limit && offset + header <= buf.len() {
            let record: EVENTLOGRECORD =
                unsafe { std::ptr::read_unaligned(buf.as_ptr().add(offset).cast()) };
            let len = record.Length as usize;
            if len < header || offset + len > buf.len() {
                break;
            }

            let (source_name, _) = wide_string_at(buf, offset + header);

            let mut string_inserts = Vec::with_capacity(record.NumStrings as usize);
            let mut pos = offset + record.StringOffset as usize;
            for _ in 0..record.NumStrings {
                let (s, next) = wide_string_at(buf, pos);
                string_inserts.push(s);
                pos = next;
            }

            let data_start = offset + record.DataOffset as usize;
            let data_end = data_start.saturating_add(record.DataLength as usize);
            let data = if record.DataLength > 0 && data_end <= buf.len() {
                buf[data_start..data_end].to_vec()
            } else {
                Vec::new()
            };

            out.push(AuditRecord {
                event_id: record.EventID,
                event_type: record.EventType,
                source_name,
                time_generated: DateTime::from_timestamp(record.TimeGenerated as i64, 0)
                    .unwrap_or(DateTime::UNIX_EPOCH),
                event_category: record.EventCategory,
                string_inserts,
                data,
            });
            offset += len;
        }
    }

    /// Null-terminated UTF-16 string at `start`; returns the string and the
    /// position just past its terminator.
    fn wide_string_at(buf: &[u8], start: usize) -> (String, usize) {
        let mut units = Vec::new();
        let mut pos = start;
        while pos + 1 < buf.len() {
            let unit = u16::from_le_bytes([buf[pos], buf[pos + 1]]);
            pos += 2;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        (String::from_utf16_lossy(&units), pos)
    }
}
