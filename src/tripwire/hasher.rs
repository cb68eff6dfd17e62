//! BLAKE3 hashing of block definitions and generated artifacts.

use std::io::{self, Read};
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash in-memory bytes the same way [`hash_file`] hashes a file.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(data).to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opt_methane.gjf");
        std::fs::write(&path, "%chk=x.chk\n#opt\n").unwrap();
        let h = hash_file(&path).unwrap();
        assert!(h.starts_with("blake3:"));
        assert_eq!(h.len(), 7 + 64);
    }

    #[test]
    fn test_hash_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.inp");
        let body = b"! B3LYP def2-SVP\n* xyzfile 0 1 a.xyz\n";
        std::fs::write(&path, body).unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(body));
    }

    #[test]
    fn test_hash_string() {
        let h1 = hash_string("$opt\n# opt");
        let h2 = hash_string("$opt\n# opt");
        let h3 = hash_string("$opt\n# opt freq");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert!(h1.starts_with("blake3:"));
    }

    #[test]
    fn test_hash_file_not_found() {
        let result = hash_file(Path::new("/nonexistent/file.gjf"));
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
