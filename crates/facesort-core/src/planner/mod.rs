//! Converts per-photo classification decisions into filesystem placements.
//!
//! A dry-run plan is just the `Placement` list with `destination_path` left
//! unset; resolving names (and their collisions) is a separate step so a
//! caller can print a plan without touching the filesystem.

use crate::types::{Category, Placement};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct Planner {
    output_root: PathBuf,
}

impl Planner {
    pub fn new(output_root: PathBuf) -> Self {
        Self { output_root }
    }

    /// Fill in `destination_path` for each placement, resolving filename
    /// collisions within the same destination directory by appending a
    /// numeric suffix (`_2`, `_3`, ...) to the file stem.
    pub fn resolve(&self, mut placements: Vec<Placement>) -> Vec<Placement> {
        let mut reserved: HashMap<PathBuf, usize> = HashMap::new();

        for placement in &mut placements {
            let dir = self.category_dir(placement.category, &placement.destination_name);
            let file_name = placement
                .source_path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("unnamed"));

            let stem = file_name
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unnamed")
                .to_string();
            let ext = file_name.extension().and_then(|e| e.to_str());

            let candidate = dir.join(&file_name);
            let key = candidate.clone();
            let count = reserved.entry(key).or_insert(0);
            *count += 1;

            let destination = if *count == 1 {
                candidate
            } else {
                let suffixed = match ext {
                    Some(ext) => format!("{stem}_{count}.{ext}"),
                    None => format!("{stem}_{count}"),
                };
                dir.join(suffixed)
            };

            placement.destination_path = Some(destination);
        }

        placements
    }

    /// Destination directory for a category, e.g. `<output>/<Name>/` for
    /// single-subject or `<output>/Multiple_People/<Joined_Names>/`. The
    /// unknown/no-faces buckets are flat — `destination_name` only matters
    /// for the categories whose layout nests by name.
    fn category_dir(&self, category: Category, destination_name: &str) -> PathBuf {
        match category {
            Category::SingleSubject => self.output_root.join(destination_name),
            Category::MultipleSubjects => self
                .output_root
                .join(Category::MultipleSubjects.folder_name())
                .join(destination_name),
            Category::UnknownSubjects => self
                .output_root
                .join(Category::UnknownSubjects.folder_name()),
            Category::NoFaces => self.output_root.join(Category::NoFaces.folder_name()),
        }
    }
}

/// Build a `Placement` for a single photo given its classification.
pub fn classify_placement(
    source_path: &Path,
    category: Category,
    destination_name: String,
) -> Placement {
    Placement {
        source_path: source_path.to_path_buf(),
        category,
        destination_name,
        destination_path: None,
        error: None,
    }
}

/// Build a `Placement` for a photo whose vision analysis failed after
/// exhausting retries. Still routed under `NoFaces` rather than dropped,
/// but carries the failure reason for the report.
pub fn classify_vision_failure(source_path: &Path, message: String) -> Placement {
    Placement {
        source_path: source_path.to_path_buf(),
        category: Category::NoFaces,
        destination_name: String::new(),
        destination_path: None,
        error: Some(message),
    }
}
