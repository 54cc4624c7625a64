use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::config::HeaderConfig;
use crate::models::{CellValue, HeaderSpec};

// Placeholder labels decoders emit for header cells they could not name.
static SENTINEL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)Unnamed:?\s*\d*", r"(?i)level:?\s*\d*", r"^\d+$"]
        .iter()
        .map(|p| Regex::new(p).expect("valid sentinel regex"))
        .collect()
});

static NUMBERED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d+").expect("valid numbered suffix regex"));

/// Collapses a multi-row header into one name per column.
#[derive(Debug, Clone)]
pub struct HeaderFlattener {
    separator: String,
    dedupe_names: bool,
}

impl HeaderFlattener {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            dedupe_names: true,
        }
    }

    pub fn from_config(config: &HeaderConfig) -> Self {
        Self::new(config.separator.clone()).with_dedupe(config.dedupe_column_names)
    }

    /// With dedupe off, two columns that clean to the same name keep it.
    pub fn with_dedupe(mut self, dedupe_names: bool) -> Self {
        self.dedupe_names = dedupe_names;
        self
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Flattens `header_rows` (one entry per header level) into `ncols` names.
    pub fn flatten(&self, header_rows: &[Vec<CellValue>], ncols: usize) -> HeaderSpec {
        let mut grid: Vec<Vec<Option<String>>> = header_rows
            .iter()
            .map(|row| {
                (0..ncols)
                    .map(|col| match row.get(col) {
                        Some(cell) if !cell.is_blank() => Some(cell.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .collect();
        fill_merged_levels(&mut grid);

        let mut names = Vec::with_capacity(ncols);
        let mut fallback_columns = Vec::new();

        for col in 0..ncols {
            let parts: Vec<String> = grid
                .iter()
                .filter_map(|level| level[col].as_deref())
                .filter_map(|fragment| self.clean_fragment(fragment))
                .filter(|part| self.is_meaningful(part))
                .collect();

            let joined = self.tidy_separators(&parts.join(&self.separator));

            if parts.is_empty() || !self.is_meaningful(&joined) {
                fallback_columns.push(col);
                names.push(format!("column_{}", names.len()));
            } else {
                names.push(joined);
            }
        }

        if self.dedupe_names {
            names = self.dedupe(names);
        }

        debug!(
            "Flattened {} header level(s) into {} column(s), {} fallback name(s)",
            header_rows.len(),
            names.len(),
            fallback_columns.len()
        );

        HeaderSpec::new(names, fallback_columns)
    }

    /// Strips decoder sentinels and numbered suffixes. `None` when nothing is left.
    pub fn clean_fragment(&self, raw: &str) -> Option<String> {
        let mut cleaned = raw.to_string();
        for pattern in SENTINEL_PATTERNS.iter() {
            cleaned = pattern.replace_all(&cleaned, "").to_string();
        }
        cleaned = NUMBERED_SUFFIX.replace_all(&cleaned, "").to_string();

        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    }

    /// Non-empty, not purely digits and not just separators.
    pub fn is_meaningful(&self, part: &str) -> bool {
        let part = part.trim();
        if part.is_empty() {
            return false;
        }
        if part.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        !part.replace(self.separator.as_str(), "").trim().is_empty()
    }

    fn tidy_separators(&self, name: &str) -> String {
        let sep = self.separator.as_str();
        let doubled = sep.repeat(2);
        let mut out = name.to_string();
        while out.contains(&doubled) {
            out = out.replace(&doubled, sep);
        }
        while let Some(rest) = out.strip_prefix(sep) {
            out = rest.to_string();
        }
        while let Some(rest) = out.strip_suffix(sep) {
            out = rest.to_string();
        }
        out
    }

    /// Appends `{sep}1`, `{sep}2`, ... to names already used by an earlier column.
    fn dedupe(&self, names: Vec<String>) -> Vec<String> {
        let original: HashSet<String> = names.iter().cloned().collect();
        let mut assigned: HashSet<String> = HashSet::with_capacity(names.len());
        let mut out = Vec::with_capacity(names.len());

        for name in names {
            if assigned.insert(name.clone()) {
                out.push(name);
                continue;
            }

            let mut suffix = 1;
            let renamed = loop {
                let candidate = format!("{}{}{}", name, self.separator, suffix);
                if !assigned.contains(&candidate) && !original.contains(&candidate) {
                    break candidate;
                }
                suffix += 1;
            };
            debug!("Duplicate column name '{}' renamed to '{}'", name, renamed);
            assigned.insert(renamed.clone());
            out.push(renamed);
        }

        out
    }
}

impl Default for HeaderFlattener {
    fn default() -> Self {
        Self::new("_")
    }
}

/// Recovers merged header cells: in every level but the last, an empty cell
/// takes its left neighbour's label unless the level above starts a new group there.
fn fill_merged_levels(grid: &mut [Vec<Option<String>>]) {
    let levels = grid.len();
    if levels < 2 {
        return;
    }
    let width = grid[0].len();
    let mut control = vec![true; width];

    for level in grid.iter_mut().take(levels - 1) {
        let mut last = level.first().cloned().flatten();
        for i in 1..width {
            if !control[i] {
                last = level[i].clone();
            }
            if level[i].is_none() {
                level[i] = last.clone();
            } else {
                control[i] = false;
                last = level[i].clone();
            }
        }
    }
}
