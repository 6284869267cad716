use std::path::Path;

use anyhow::{Context as _, Result};

/// Load a playlist: one video path per line. Trailing newlines are stripped
/// and blank lines skipped, so a trailing newline at the end of the file does
/// not produce a phantom entry.
pub fn load(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read playlist {}", path.display()))?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn playlist_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn strips_trailing_newline() {
        let file = playlist_file("a.mp4\nb.mp4\n");
        assert_eq!(load(file.path()).unwrap(), vec!["a.mp4", "b.mp4"]);
    }

    #[test]
    fn skips_blank_lines() {
        let file = playlist_file("a.mp4\n\n\nb.mp4\n\n");
        assert_eq!(load(file.path()).unwrap(), vec!["a.mp4", "b.mp4"]);
    }

    #[test]
    fn empty_playlist_is_empty_not_an_error() {
        let file = playlist_file("");
        assert!(load(file.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_playlist_is_an_error() {
        assert!(load(Path::new("no-such-playlist.txt")).is_err());
    }
}
