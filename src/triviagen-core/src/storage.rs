//! On-disk layout for generated artifacts.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const AUDIO_DIR: &str = "audios";
const PHOTOS_DIR: &str = "photos";

static RESERVED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("reserved-character pattern is valid")
});

/// Data directory holding one subdirectory per artifact kind.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `<name>.mp3` narration files.
    pub fn audio_dir(&self) -> PathBuf {
        self.root.join(AUDIO_DIR)
    }

    /// Directory for `<name>.jpg` image files.
    pub fn photos_dir(&self) -> PathBuf {
        self.root.join(PHOTOS_DIR)
    }
}

/// Path of `<dir>/<name>.<extension>` with `name` made safe for use as a file name.
pub fn artifact_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", sanitize_file_stem(name), extension))
}

/// Replace path separators and characters reserved on common filesystems.
///
/// Generated items are free text and may contain `/` or `:`; everything else
/// is kept as-is so file names stay recognisable.
pub fn sanitize_file_stem(name: &str) -> String {
    let sanitized = RESERVED_CHARS.replace_all(name.trim(), "_");
    let sanitized = sanitized.trim_matches('.');
    if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_subdirectories() {
        let layout = DataLayout::new("/srv/data");
        assert_eq!(layout.audio_dir(), PathBuf::from("/srv/data/audios"));
        assert_eq!(layout.photos_dir(), PathBuf::from("/srv/data/photos"));
    }

    #[test]
    fn test_plain_name_is_untouched() {
        assert_eq!(sanitize_file_stem("Margarita cocktail photo"), "Margarita cocktail photo");
        assert_eq!(
            artifact_path(Path::new("out"), "sample", "mp3"),
            PathBuf::from("out/sample.mp3")
        );
    }

    #[test]
    fn test_separators_are_replaced() {
        assert_eq!(sanitize_file_stem("AC/DC: live"), "AC_DC_ live");
        assert_eq!(sanitize_file_stem("..\\secret"), "_secret");
    }

    #[test]
    fn test_every_reserved_character_is_replaced() {
        let sanitized = sanitize_file_stem("a/b\\c:d*e?f\"g<h>i|j\tk\u{1}l");
        assert_eq!(sanitized, "a_b_c_d_e_f_g_h_i_j_k_l");
        for reserved in ['/', '\\', ':', '*', '?', '"', '<', '>', '|'] {
            assert!(!sanitized.contains(reserved));
        }
    }

    #[test]
    fn test_empty_name_gets_placeholder() {
        assert_eq!(sanitize_file_stem("   "), "untitled");
        assert_eq!(sanitize_file_stem(".."), "untitled");
    }
}
