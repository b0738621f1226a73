use std::{fs, path::Path};

use crate::types::HarvestError;

/// Trimmed, non-blank lines of the wordlist in file order. Duplicates are
/// kept.
pub fn read_wordlist(path: &Path) -> Result<Vec<String>, HarvestError> {
    let data = fs::read_to_string(path).map_err(|source| HarvestError::Wordlist {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Like [`read_wordlist`] but logs the failure and hands back an empty list.
pub fn load_wordlist(path: &Path) -> Vec<String> {
    match read_wordlist(path) {
        Ok(words) => {
            info!("loaded {} words from {:?}", words.len(), path);
            words
        }
        Err(e) => {
            error!("error loading wordlist: {}", e);
            vec![]
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn keeps_trimmed_non_blank_lines_in_order() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "  alpha \n\n\tbeta\n   \r\ngamma\r\nalpha\n").unwrap();

        let words = load_wordlist(f.path());
        assert_eq!(words, vec!["alpha", "beta", "gamma", "alpha"]);
    }

    #[test]
    fn missing_file_gives_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");

        assert!(load_wordlist(&path).is_empty());
        match read_wordlist(&path) {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn invalid_utf8_gives_empty_list() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0x66, 0x6f, 0xff, 0xfe, 0x0a]).unwrap();

        assert!(load_wordlist(f.path()).is_empty());
    }
}
