//! Unified diff parsing into structured file patches.
//!
//! The input is the raw text body served under the diff media type. A
//! malformed diff indicates a protocol-level problem, so parse failures are
//! surfaced as [`ApiError::DiffParse`] and treated as fatal by the
//! change-set pipeline.

use crate::api::error::ApiError;

/// How a file changed within a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChangeKind {
    /// File exists in both revisions.
    #[default]
    Modified,
    /// File is new in the head revision.
    Added,
    /// File was removed in the head revision.
    Deleted,
}

/// One contiguous change region within a file patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    /// First line of the region in the old revision.
    pub old_start: u32,
    /// Line count of the region in the old revision.
    pub old_count: u32,
    /// First line of the region in the new revision.
    pub new_start: u32,
    /// Line count of the region in the new revision.
    pub new_count: u32,
    /// Raw hunk lines including their `+`/`-`/space prefixes.
    pub lines: Vec<String>,
}

/// Structured representation of a single file's changes within a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Path of the file in the head revision (or the old path for
    /// deletions).
    pub path: String,
    /// Change classification.
    pub change: ChangeKind,
    /// Added line count.
    pub additions: u32,
    /// Removed line count.
    pub deletions: u32,
    /// Change regions in file order.
    pub hunks: Vec<DiffHunk>,
}

/// Paths touched by a list of patches, in patch order.
#[must_use]
pub fn changed_paths(patches: &[FilePatch]) -> Vec<&str> {
    patches.iter().map(|patch| patch.path.as_str()).collect()
}

/// Parses unified diff text into per-file patches.
///
/// An empty or whitespace-only body parses to an empty list (an empty diff
/// between identical revisions is valid).
///
/// # Errors
///
/// Returns [`ApiError::DiffParse`] on malformed file or hunk headers.
pub fn parse_unified_diff(raw: &str) -> Result<Vec<FilePatch>, ApiError> {
    let mut parser = Parser::default();
    for line in raw.lines() {
        parser.feed(line)?;
    }
    Ok(parser.finish())
}

#[derive(Default)]
struct Parser {
    files: Vec<FilePatch>,
    current_file: Option<FilePatch>,
    current_hunk: Option<DiffHunk>,
}

impl Parser {
    fn feed(&mut self, line: &str) -> Result<(), ApiError> {
        if let Some(header) = line.strip_prefix("diff --git ") {
            self.flush_file();
            self.current_file = Some(Self::start_file(header)?);
            return Ok(());
        }
        if line.starts_with("@@") {
            if self.current_file.is_none() {
                return Err(diff_error("hunk header before any file header"));
            }
            self.flush_hunk();
            self.current_hunk = Some(parse_hunk_header(line)?);
            return Ok(());
        }
        if let Some(old_path) = line.strip_prefix("--- ") {
            if old_path.trim() == "/dev/null"
                && let Some(file) = self.current_file.as_mut()
            {
                file.change = ChangeKind::Added;
            }
            return Ok(());
        }
        if let Some(new_path) = line.strip_prefix("+++ ") {
            if new_path.trim() == "/dev/null"
                && let Some(file) = self.current_file.as_mut()
            {
                file.change = ChangeKind::Deleted;
            }
            return Ok(());
        }
        self.feed_hunk_line(line);
        Ok(())
    }

    fn start_file(header: &str) -> Result<FilePatch, ApiError> {
        let mut parts = header.split_whitespace();
        let a_path = parts
            .next()
            .ok_or_else(|| diff_error("file header is missing the a/ path"))?;
        let b_path = parts
            .next()
            .ok_or_else(|| diff_error("file header is missing the b/ path"))?;
        let path = b_path
            .strip_prefix("b/")
            .or_else(|| a_path.strip_prefix("a/"))
            .unwrap_or(b_path);
        Ok(FilePatch {
            path: path.to_owned(),
            change: ChangeKind::Modified,
            additions: 0,
            deletions: 0,
            hunks: Vec::new(),
        })
    }

    fn feed_hunk_line(&mut self, line: &str) {
        let (Some(file), Some(hunk)) = (self.current_file.as_mut(), self.current_hunk.as_mut())
        else {
            return;
        };
        // "\ No newline at end of file" and mode lines fall through here and
        // are kept out of the hunk body.
        let is_addition = line.starts_with('+');
        let is_removal = line.starts_with('-');
        if is_addition {
            file.additions += 1;
        } else if is_removal {
            file.deletions += 1;
        } else if !line.starts_with(' ') && !line.is_empty() {
            return;
        }
        hunk.lines.push(line.to_owned());
    }

    fn flush_hunk(&mut self) {
        if let (Some(file), Some(hunk)) = (self.current_file.as_mut(), self.current_hunk.take()) {
            file.hunks.push(hunk);
        }
    }

    fn flush_file(&mut self) {
        self.flush_hunk();
        if let Some(file) = self.current_file.take() {
            self.files.push(file);
        }
    }

    fn finish(mut self) -> Vec<FilePatch> {
        self.flush_file();
        self.files
    }
}

fn parse_hunk_header(line: &str) -> Result<DiffHunk, ApiError> {
    let stripped = line
        .strip_prefix("@@")
        .ok_or_else(|| diff_error("hunk header must start with @@"))?;
    let (ranges, _) = stripped
        .split_once("@@")
        .ok_or_else(|| diff_error("hunk header must close with @@"))?;
    let mut parts = ranges.split_whitespace();
    let old_part = parts
        .next()
        .ok_or_else(|| diff_error("hunk header is missing the old range"))?;
    let new_part = parts
        .next()
        .ok_or_else(|| diff_error("hunk header is missing the new range"))?;

    let (old_start, old_count) = parse_range(old_part, '-')?;
    let (new_start, new_count) = parse_range(new_part, '+')?;
    Ok(DiffHunk {
        old_start,
        old_count,
        new_start,
        new_count,
        lines: Vec::new(),
    })
}

fn parse_range(part: &str, prefix: char) -> Result<(u32, u32), ApiError> {
    let range = part
        .strip_prefix(prefix)
        .ok_or_else(|| diff_error(&format!("range {part:?} lacks the {prefix} prefix")))?;
    let (start_text, count_text) = range.split_once(',').unwrap_or((range, "1"));
    let start = start_text
        .parse::<u32>()
        .map_err(|_| diff_error(&format!("invalid range start in {part:?}")))?;
    let count = count_text
        .parse::<u32>()
        .map_err(|_| diff_error(&format!("invalid range count in {part:?}")))?;
    Ok((start, count))
}

fn diff_error(message: &str) -> ApiError {
    ApiError::DiffParse {
        message: message.to_owned(),
    }
}
