//! Prompt lists: one prompt per line, surrounding whitespace ignored, blank
//! lines skipped.

use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read prompts from {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("{} contains no prompts", path.display())]
    Empty { path: PathBuf },
}

pub fn parse_prompts(content: &str) -> Vec<String> {
    content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads and parses a prompt file. A file without a single prompt is an error.
pub async fn load_prompts(path: impl AsRef<Path>) -> Result<Vec<String>, ParseError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let prompts = parse_prompts(&content);
    if prompts.is_empty() {
        return Err(ParseError::Empty { path: path.to_path_buf() });
    }
    debug!(path = %path.display(), count = prompts.len(), "prompts loaded");
    Ok(prompts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn blank_lines_and_padding_are_dropped() {
        let prompts = parse_prompts("  a red fox \n\n\t\nblue whale\r\n   \nlast");
        assert_eq!(prompts, vec!["a red fox", "blue whale", "last"]);
    }

    #[test]
    fn order_and_unicode_are_kept() {
        let prompts = parse_prompts("\u{feff}zèbre\n日本の庭\nzèbre\n");
        assert_eq!(prompts, vec!["zèbre", "日本の庭", "zèbre"]);
    }

    #[test]
    fn empty_content_has_no_prompts() {
        assert!(parse_prompts("").is_empty());
        assert!(parse_prompts("\n \n").is_empty());
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first\n\nsecond").unwrap();

        let prompts = load_prompts(file.path()).await.unwrap();
        assert_eq!(prompts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn whitespace_only_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "   \n\n").unwrap();

        let err = load_prompts(file.path()).await.unwrap_err();
        assert!(matches!(err, ParseError::Empty { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_prompts(dir.path().join("nope.txt")).await.unwrap_err();
        assert!(matches!(err, ParseError::Read { .. }));
    }
}
