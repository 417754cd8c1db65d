//! Client-side extension filtering

use bridge_traits::storage::RemoteFile;
use core_runtime::config::{normalize_extension, DEFAULT_VIDEO_EXTENSIONS};

/// Case-insensitive file name suffix filter.
///
/// Extensions are normalized to lowercase with a leading dot, so `"MP4"`,
/// `"mp4"` and `".mp4"` are equivalent. An empty filter accepts every file.
///
/// ```
/// use core_sync::ExtensionFilter;
///
/// let filter = ExtensionFilter::new([".mp4"]);
/// let names = ["a.MP4", "b.txt", "c.mp4"];
/// let kept: Vec<_> = names.into_iter().filter(|n| filter.matches_name(n)).collect();
/// assert_eq!(kept, ["a.MP4", "c.mp4"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim();
            if ext.is_empty() || ext == "." {
                continue;
            }
            let ext = normalize_extension(ext);
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self {
            extensions: normalized,
        }
    }

    /// `.mp4, .avi, .mov, .mkv, .flv, .wmv`
    pub fn video() -> Self {
        Self::new(DEFAULT_VIDEO_EXTENSIONS)
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let name = name.to_lowercase();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    pub fn matches(&self, file: &RemoteFile) -> bool {
        self.matches_name(&file.name)
    }

    /// Keep matching files, in order
    pub fn apply(&self, files: Vec<RemoteFile>) -> Vec<RemoteFile> {
        files.into_iter().filter(|f| self.matches(f)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_and_dedup() {
        let filter = ExtensionFilter::new(["MP4", ".mp4", " .Mkv ", "", "."]);
        assert_eq!(filter.extensions(), [".mp4", ".mkv"]);
    }

    #[test]
    fn test_video_defaults() {
        let filter = ExtensionFilter::video();
        assert!(filter.matches_name("clip.WMV"));
        assert!(filter.matches_name("holiday.final.mov"));
        assert!(!filter.matches_name("notes.txt"));
        assert!(!filter.matches_name("mp4"));
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = ExtensionFilter::new(Vec::<String>::new());
        assert!(filter.is_empty());
        assert!(filter.matches_name("anything.bin"));
    }

    #[test]
    fn test_suffix_not_substring() {
        let filter = ExtensionFilter::new([".mp4"]);
        assert!(!filter.matches_name("video.mp4.part"));
    }
}
