//! File feature collection: walk the target, digest every file, short-circuit
//! on a registry hit, otherwise extract stat features. Content reads (digest,
//! document keyword scan) happen before the stat call so the access-time
//! features reflect the state the scan found, not the scan's own reads.

use super::Collection;
use crate::error::ScanError;
use crate::features::{FeatureVector, FileFeatures};
use crate::report::{DetectionMethod, EntityMetadata, FileMetadata};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

const SUSPICIOUS_KEYWORDS: [&str; 14] = [
    "malware",
    "virus",
    "trojan",
    "worm",
    "exploit",
    "payload",
    "ransomware",
    "keylogger",
    "backdoor",
    "rootkit",
    "phishing",
    "attack",
    "hacker",
    "botnet",
];

#[derive(Default)]
pub struct FileCollector;

impl FileCollector {
    pub fn new() -> Self {
        Self
    }

    /// Scan one file, or every file under a directory (symlinks not followed,
    /// entries in name order). A nonexistent target is the one error that
    /// reaches the caller; unreadable files inside an existing tree are
    /// skipped.
    pub fn collect(
        &self,
        target: &Path,
        hashes: &HashSet<String>,
    ) -> Result<Collection, ScanError> {
        if !target.exists() {
            return Err(ScanError::TargetNotFound {
                path: target.to_path_buf(),
            });
        }

        let mut collection = Collection::default();
        if target.is_file() {
            scan_one(target, hashes, &mut collection);
        } else {
            for entry in WalkDir::new(target).follow_links(false).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::debug!(error = %e, "walk entry skipped");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                scan_one(entry.path(), hashes, &mut collection);
            }
        }
        Ok(collection)
    }
}

fn scan_one(path: &Path, hashes: &HashSet<String>, out: &mut Collection) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_path = path.display().to_string();

    let digest = hash_file(path);
    if let Some(d) = digest.as_deref() {
        if hashes.contains(d) {
            tracing::info!(path = %file_path, digest = %d, "known-malicious digest");
            let metadata = EntityMetadata::File(FileMetadata {
                file_name,
                file_path,
                digest,
                detection: DetectionMethod::Hash,
                original_path: None,
                keyword_flag: None,
            });
            out.entries.push((FeatureVector::zeroed(), metadata));
            return;
        }
    }

    let keyword_flag = keyword_scan(path, &file_name);
    let md = match std::fs::metadata(path) {
        Ok(md) => md,
        Err(e) => {
            tracing::debug!(path = %file_path, error = %e, "file skipped");
            return;
        }
    };

    let lower = file_name.to_ascii_lowercase();
    let (mtime_ctime_delta_secs, atime_mtime_delta_secs, hard_links) = stat_times(&md);
    let features = FileFeatures {
        size_bytes: md.len(),
        executable_extension: [".exe", ".dll", ".sys"].iter().any(|e| lower.ends_with(e)),
        hidden: file_name.starts_with('.'),
        mtime_ctime_delta_secs,
        atime_mtime_delta_secs,
        name_len: file_name.len(),
        hard_links,
        executable_permission: executable_permission(&md),
    };
    let metadata = EntityMetadata::File(FileMetadata {
        file_name,
        file_path,
        digest,
        detection: DetectionMethod::Ml,
        original_path: None,
        keyword_flag,
    });
    out.entries.push((features.encode(), metadata));
}

fn hash_file(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Some(format!("{:x}", hasher.finalize()))
}

#[cfg(unix)]
fn stat_times(md: &std::fs::Metadata) -> (f64, f64, u64) {
    use std::os::unix::fs::MetadataExt;
    (
        md.mtime() as f64 - md.ctime() as f64,
        md.atime() as f64 - md.mtime() as f64,
        md.nlink(),
    )
}

#[cfg(not(unix))]
fn stat_times(md: &std::fs::Metadata) -> (f64, f64, u64) {
    fn epoch_secs(t: std::io::Result<std::time::SystemTime>) -> f64 {
        t.ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
    let created = epoch_secs(md.created());
    let modified = epoch_secs(md.modified());
    let accessed = epoch_secs(md.accessed());
    // hard link count is not portably exposed here
    (modified - created, accessed - modified, 1)
}

#[cfg(unix)]
fn executable_permission(md: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    md.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn executable_permission(_md: &std::fs::Metadata) -> bool {
    true
}

/// Document content check. Only `.pdf` and `.docx` are examined; anything else
/// gets no flag at all. Parse failures count as no keywords found.
fn keyword_scan(path: &Path, file_name: &str) -> Option<bool> {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        Some(pdf_contains_keywords(path))
    } else if lower.ends_with(".docx") {
        Some(docx_contains_keywords(path))
    } else {
        None
    }
}

fn contains_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    SUSPICIOUS_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn pdf_contains_keywords(path: &Path) -> bool {
    let doc = match lopdf::Document::load(path) {
        Ok(doc) => doc,
        Err(_) => return false,
    };
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    match doc.extract_text(&pages) {
        Ok(text) => contains_keyword(&text),
        Err(_) => false,
    }
}

fn docx_contains_keywords(path: &Path) -> bool {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(_) => return false,
    };
    let mut part = match archive.by_name("word/document.xml") {
        Ok(part) => part,
        Err(_) => return false,
    };
    let mut xml = String::new();
    if part.read_to_string(&mut xml).is_err() {
        return false;
    }
    contains_keyword(&strip_xml_tags(&xml))
}

fn strip_xml_tags(xml: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    for c in xml.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}
