//! File discovery for finding candidate photos in a source directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;

/// Discovers image files in directories.
pub struct FileDiscovery {
    config: ProcessingConfig,
    recursive: bool,
}

/// Information about a discovered file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FileDiscovery {
    /// Create a new file discovery instance that walks subdirectories.
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            config,
            recursive: true,
        }
    }

    /// Create a file discovery instance with an explicit recursion setting.
    pub fn with_recursive(config: ProcessingConfig, recursive: bool) -> Self {
        Self { config, recursive }
    }

    /// Discover all supported image files at a path, sorted by path.
    ///
    /// Enumeration order is load-bearing: the clusterer and planner assign
    /// images strictly in this order so that a run is reproducible.
    ///
    /// If path is a file, returns it if supported.
    /// If path is a directory, finds all supported files beneath it —
    /// subdirectories included unless this instance was built non-recursive.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            if self.is_supported(path) {
                if let Ok(meta) = std::fs::metadata(path) {
                    return vec![DiscoveredFile {
                        path: path.to_path_buf(),
                        size: meta.len(),
                    }];
                }
            }
            return vec![];
        }

        let mut files = Vec::new();
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        for entry in WalkDir::new(path)
            .follow_links(true)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if entry_path.is_file() && self.is_supported(entry_path) {
                if let Ok(meta) = entry.metadata() {
                    files.push(DiscoveredFile {
                        path: entry_path.to_path_buf(),
                        size: meta.len(),
                    });
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.to_lowercase() == ext_lower)
            })
            .unwrap_or(false)
    }

    /// Get total size of all discovered files.
    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        let config = ProcessingConfig::default();
        let discovery = FileDiscovery::new(config);

        assert!(discovery.is_supported(Path::new("test.jpg")));
        assert!(discovery.is_supported(Path::new("test.JPG")));
        assert!(discovery.is_supported(Path::new("test.jpeg")));
        assert!(discovery.is_supported(Path::new("test.png")));
        assert!(discovery.is_supported(Path::new("test.heic")));
        assert!(discovery.is_supported(Path::new("test.gif")));
        assert!(discovery.is_supported(Path::new("test.webp")));
        assert!(!discovery.is_supported(Path::new("test.txt")));
        assert!(!discovery.is_supported(Path::new("test.pdf")));
    }

    #[test]
    fn test_total_size() {
        let files = vec![
            DiscoveredFile {
                path: PathBuf::from("a.jpg"),
                size: 100,
            },
            DiscoveredFile {
                path: PathBuf::from("b.jpg"),
                size: 200,
            },
        ];

        assert_eq!(FileDiscovery::total_size(&files), 300);
    }

    #[test]
    fn test_discover_sorts_by_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("z.jpg"), b"\xff\xd8\xff").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"\xff\xd8\xff").unwrap();

        let discovery = FileDiscovery::new(ProcessingConfig::default());
        let files = discovery.discover(dir.path());

        assert_eq!(files.len(), 2);
        assert!(files[0].path.to_string_lossy().ends_with("a.jpg"));
        assert!(files[1].path.to_string_lossy().ends_with("z.jpg"));
    }

    #[test]
    fn test_non_recursive_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top.jpg"), b"\xff\xd8\xff").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("inner.jpg"), b"\xff\xd8\xff").unwrap();

        let discovery = FileDiscovery::with_recursive(ProcessingConfig::default(), false);
        let files = discovery.discover(dir.path());

        assert_eq!(files.len(), 1);
        assert!(files[0].path.to_string_lossy().ends_with("top.jpg"));
    }
}
