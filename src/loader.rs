use std::fs;

use crate::error::EmuError;

/// Parse a program image file: whitespace-separated signed decimal
/// integers, one per memory cell, in order starting at address 0.
pub fn load_image(path: &str) -> Result<Vec<i32>, EmuError> {
    let text = fs::read_to_string(path).map_err(|source| EmuError::ImageIo {
        path: path.to_string(),
        source,
    })?;

    text.split_whitespace()
        .map(|token| {
            token.parse::<i32>().map_err(|source| EmuError::ImageParse {
                path: path.to_string(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_whitespace_separated_integers() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tetracore-loader-test-{}.tmp", std::process::id()));
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "22 0 7 0\n22 1 5 0\n0 0 0 0").unwrap();
        drop(f);

        let image = load_image(path.to_str().unwrap()).unwrap();
        assert_eq!(image, vec![22, 0, 7, 0, 22, 1, 5, 0, 0, 0, 0, 0]);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(load_image("/nonexistent/tetracore/image.txt").is_err());
    }

    #[test]
    fn non_integer_token_is_reported() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tetracore-loader-test-bad-{}.tmp", std::process::id()));
        fs::write(&path, "1 2 notanumber 4").unwrap();
        assert!(load_image(path.to_str().unwrap()).is_err());
        fs::remove_file(&path).ok();
    }
}
