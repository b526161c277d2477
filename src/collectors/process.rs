//! Process feature collection (cross-platform via sysinfo). Socket and thread
//! counts come from /proc on Linux and degrade to zero elsewhere or when
//! access is denied, mirroring the rest of the per-entity tolerance.

use super::Collection;
use crate::error::Diagnostic;
use crate::features::ProcessFeatures;
use crate::report::{EntityMetadata, ProcessMetadata};
use std::sync::Mutex;
use sysinfo::{Process, System, Users};

pub struct ProcessCollector {
    sys: Mutex<System>,
}

impl ProcessCollector {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new_all()),
        }
    }

    /// Snapshot all visible processes, ordered by pid.
    pub fn collect(&self) -> Collection {
        let mut sys = match self.sys.lock() {
            Ok(guard) => guard,
            Err(_) => {
                return Collection::degraded(Diagnostic::source_unavailable(
                    "process table state lost; previous enumeration panicked",
                ))
            }
        };
        sys.refresh_all();
        sys.refresh_processes();

        let users = Users::new_with_refreshed_list();
        let total_memory = sys.total_memory();

        let mut procs: Vec<(u32, &Process)> = sys
            .processes()
            .iter()
            .map(|(pid, proc_)| (pid.as_u32(), proc_))
            .collect();
        procs.sort_unstable_by_key(|(pid, _)| *pid);

        let mut collection = Collection::default();
        for (pid, proc_) in procs {
            let name = proc_.name().to_string();
            let username = proc_
                .user_id()
                .and_then(|uid| users.get_user_by_id(uid))
                .map(|u| u.name().to_string())
                .unwrap_or_default();

            let memory_percent = if total_memory > 0 {
                proc_.memory() as f32 / total_memory as f32 * 100.0
            } else {
                0.0
            };
            let exe_extension = proc_
                .exe()
                .map(|p| p.to_string_lossy().to_ascii_lowercase().ends_with(".exe"))
                .unwrap_or(false);

            let features = ProcessFeatures {
                pid,
                name_len: name.len(),
                system_user: username.to_uppercase().contains("SYSTEM") || username == "root",
                cpu_percent: proc_.cpu_usage(),
                memory_percent,
                connection_count: connection_count(pid),
                exe_extension,
                thread_count: thread_count(pid),
            };
            let metadata = EntityMetadata::Process(ProcessMetadata {
                pid,
                process_name: name,
            });
            collection.entries.push((features.encode(), metadata));
        }
        collection
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Open sockets for one pid, counted from its fd table.
#[cfg(target_os = "linux")]
fn connection_count(pid: u32) -> usize {
    let entries = match std::fs::read_dir(format!("/proc/{pid}/fd")) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            std::fs::read_link(e.path())
                .map(|target| target.to_string_lossy().starts_with("socket:"))
                .unwrap_or(false)
        })
        .count()
}

#[cfg(not(target_os = "linux"))]
fn connection_count(_pid: u32) -> usize {
    0
}

#[cfg(target_os = "linux")]
fn thread_count(pid: u32) -> usize {
    std::fs::read_dir(format!("/proc/{pid}/task"))
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn thread_count(_pid: u32) -> usize {
    0
}
