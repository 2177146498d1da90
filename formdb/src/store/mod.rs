use crate::document::Submission;
use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Alphabet for the random id suffix (lowercase base36)
const ID_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h',
    'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

const ID_SUFFIX_LEN: usize = 9;

/// Direction of the `createdAt` ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `"asc"` sorts ascending; any other value sorts descending.
    pub fn parse(value: &str) -> Self {
        if value == "asc" {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }
}

/// Parameters for a paginated, searched listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionQuery {
    /// 1-indexed page number
    pub page: usize,
    pub limit: usize,
    /// Accepted for interface compatibility. Ordering always uses `createdAt`.
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub search: String,
}

impl Default for SubmissionQuery {
    fn default() -> Self {
        SubmissionQuery {
            page: 1,
            limit: 10,
            sort_by: "createdAt".to_string(),
            sort_order: SortOrder::Desc,
            search: String::new(),
        }
    }
}

/// Pagination metadata, computed over the filtered set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
    pub total_count: usize,
}

/// One page of query results
#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    pub data: Vec<Submission>,
    pub pagination: Pagination,
}

/// Owns the submission collection and its JSON file.
///
/// The whole collection lives in memory in insertion order. It is read once
/// on open and every mutation rewrites the file in full. Persistence errors
/// are logged and swallowed, so memory can drift from disk after a failed
/// write. Callers sharing a store between threads must serialize access
/// (the server keeps it behind a `Mutex`).
pub struct SubmissionStore {
    path: PathBuf,
    submissions: Vec<Submission>,
}

impl SubmissionStore {
    /// Open the store backed by the JSON file at `path`.
    /// A missing file yields an empty store; an unreadable or corrupt file
    /// is logged and also yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let submissions = load_submissions(&path);
        SubmissionStore { path, submissions }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    /// All submissions in insertion order
    pub fn all(&self) -> &[Submission] {
        &self.submissions
    }

    /// Get a submission by id
    pub fn get(&self, id: &str) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.id == id)
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Append a new submission. The payload is stored as given; validation
    /// is the caller's job.
    pub fn add(&mut self, data: Map<String, Value>) -> Submission {
        let submission = Submission {
            id: self.generate_id(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data,
        };

        self.submissions.push(submission.clone());
        self.persist();
        log::debug!("Added submission {}", submission.id);
        submission
    }

    /// Replace a submission's data wholesale. `id` and `createdAt` are kept.
    /// Returns `None` without touching the file when the id is unknown.
    pub fn update(&mut self, id: &str, data: Map<String, Value>) -> Option<Submission> {
        let index = self.submissions.iter().position(|s| s.id == id)?;

        self.submissions[index].data = data;
        let updated = self.submissions[index].clone();
        self.persist();
        log::debug!("Updated submission {id}");
        Some(updated)
    }

    /// Remove a submission. Returns `false` without touching the file when
    /// the id is unknown.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(index) = self.submissions.iter().position(|s| s.id == id) else {
            return false;
        };

        self.submissions.remove(index);
        self.persist();
        log::debug!("Deleted submission {id}");
        true
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Filter by search text, sort by `createdAt`, then slice out one page.
    /// Pages past the end are empty rather than an error.
    pub fn query(&self, query: &SubmissionQuery) -> QueryPage {
        let needle = query.search.to_lowercase();
        let mut filtered: Vec<&Submission> = self
            .submissions
            .iter()
            .filter(|s| needle.is_empty() || s.matches(&needle))
            .collect();

        // Stable sort on the timestamp string; ties keep insertion order
        match query.sort_order {
            SortOrder::Asc => filtered.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::Desc => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        let total_count = filtered.len();
        let total_pages = if query.limit == 0 {
            0
        } else {
            total_count.div_ceil(query.limit)
        };
        let start = query.page.saturating_sub(1).saturating_mul(query.limit);

        let data = filtered
            .into_iter()
            .skip(start)
            .take(query.limit)
            .cloned()
            .collect();

        QueryPage {
            data,
            pagination: Pagination {
                page: query.page,
                limit: query.limit,
                total_pages,
                total_count,
            },
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    /// `sub_<epoch millis>_<9 base36 chars>`, regenerated on the rare clash
    fn generate_id(&self) -> String {
        loop {
            let id = format!(
                "sub_{}_{}",
                Utc::now().timestamp_millis(),
                nanoid::nanoid!(ID_SUFFIX_LEN, &ID_ALPHABET)
            );
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = self.write_file() {
            log::error!("Error saving submissions to {}: {e}", self.path.display());
        }
    }

    /// Write the full collection to a temp file beside the target, then
    /// rename it into place.
    fn write_file(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(&self.submissions)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn load_submissions(path: &Path) -> Vec<Submission> {
    if !path.exists() {
        log::info!("No submissions file at {}, starting empty", path.display());
        return Vec::new();
    }

    match read_submissions(path) {
        Ok(submissions) => {
            log::info!("Loaded {} submissions from {}", submissions.len(), path.display());
            submissions
        }
        Err(e) => {
            log::error!("Error loading submissions from {}: {e}", path.display());
            Vec::new()
        }
    }
}

fn read_submissions(path: &Path) -> Result<Vec<Submission>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
