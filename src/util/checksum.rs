use std::fmt::{Display, Formatter};

use sha1::{Digest, Sha1};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha1,
    Md5,
}
impl ChecksumAlgorithm {
    /// in order of preference
    pub const ALL: [ChecksumAlgorithm; 2] = [ChecksumAlgorithm::Sha1, ChecksumAlgorithm::Md5];

    /// file name suffix without the leading '.'
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Md5 => "md5",
        }
    }

    /// Recognizes `.sha1` / `.md5` checksum file paths
    pub fn from_path(path: &str) -> Option<ChecksumAlgorithm> {
        Self::ALL.into_iter()
            .find(|alg| path.len() > alg.extension().len() + 1
                && path.ends_with(alg.extension())
                && path[..path.len() - alg.extension().len()].ends_with('.'))
    }

    /// strips the checksum suffix, returning the path of the checksummed file
    pub fn strip_suffix<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_suffix(self.extension())
            .and_then(|p| p.strip_suffix('.'))
    }

    pub fn companion_path(&self, path: &str) -> String {
        format!("{}.{}", path, self.extension())
    }

    pub fn digest_hex(&self, data: &[u8]) -> String {
        match self {
            ChecksumAlgorithm::Sha1 => hex::encode(Sha1::digest(data)),
            ChecksumAlgorithm::Md5 => hex::encode(md5::compute(data).0),
        }
    }

    fn hex_len(&self) -> usize {
        match self {
            ChecksumAlgorithm::Sha1 => 40,
            ChecksumAlgorithm::Md5 => 32,
        }
    }

    /// Extracts the hash from the content of a checksum file. Both the plain format
    ///  (`<hash>` optionally followed by a file name) and the BSD format
    ///  (`SHA1 (file) = <hash>`) are accepted.
    pub fn parse_checksum_file(&self, content: &[u8]) -> Option<String> {
        let text = std::str::from_utf8(content).ok()?.trim();
        let candidate = match text.rfind('=') {
            Some(idx) => text[idx + 1..].trim(),
            None => text.split_whitespace().next()?,
        };

        if candidate.len() == self.hex_len() && candidate.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(candidate.to_ascii_lowercase())
        }
        else {
            None
        }
    }

    /// true if the checksum file content matches the data
    pub fn verify(&self, data: &[u8], checksum_file: &[u8]) -> bool {
        match self.parse_checksum_file(checksum_file) {
            Some(expected) => expected == self.digest_hex(data),
            None => false,
        }
    }
}
impl Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Incremental hashing for data that arrives in chunks
#[derive(Clone)]
pub enum StreamingDigest {
    Sha1(Sha1),
    Md5(md5::Context),
}
impl StreamingDigest {
    pub fn new(algorithm: ChecksumAlgorithm) -> StreamingDigest {
        match algorithm {
            ChecksumAlgorithm::Sha1 => StreamingDigest::Sha1(Sha1::default()),
            ChecksumAlgorithm::Md5 => StreamingDigest::Md5(md5::Context::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingDigest::Sha1(hasher) => hasher.update(data),
            StreamingDigest::Md5(context) => context.consume(data),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            StreamingDigest::Sha1(hasher) => hex::encode(hasher.finalize()),
            StreamingDigest::Md5(context) => hex::encode(context.compute().0),
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    #[rstest]
    #[case::sha1("a/b/1.0/b-1.0.jar.sha1", Some(ChecksumAlgorithm::Sha1))]
    #[case::md5("a/b/1.0/b-1.0.jar.md5", Some(ChecksumAlgorithm::Md5))]
    #[case::metadata("a/b/maven-metadata.xml.sha1", Some(ChecksumAlgorithm::Sha1))]
    #[case::plain("a/b/1.0/b-1.0.jar", None)]
    #[case::no_dot("a/b/1.0/sha1", None)]
    #[case::bare_suffix(".sha1", None)]
    fn test_from_path(#[case] path: &str, #[case] expected: Option<ChecksumAlgorithm>) {
        assert_eq!(ChecksumAlgorithm::from_path(path), expected);
    }

    #[test]
    fn test_digests() {
        assert_eq!(ChecksumAlgorithm::Sha1.digest_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(ChecksumAlgorithm::Md5.digest_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");

        let mut streaming = StreamingDigest::new(ChecksumAlgorithm::Sha1);
        streaming.update(b"a");
        streaming.update(b"bc");
        assert_eq!(streaming.finalize_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[rstest]
    #[case::plain("a9993e364706816aba3e25717850c26c9cd0d89d", true)]
    #[case::with_file_name("A9993E364706816ABA3E25717850C26C9CD0D89D  abc.txt\n", true)]
    #[case::bsd("SHA1 (abc.txt) = a9993e364706816aba3e25717850c26c9cd0d89d", true)]
    #[case::wrong("0000000000000000000000000000000000000000", false)]
    #[case::garbage("not a checksum", false)]
    #[case::empty("", false)]
    fn test_verify_sha1(#[case] checksum_file: &str, #[case] expected: bool) {
        assert_eq!(ChecksumAlgorithm::Sha1.verify(b"abc", checksum_file.as_bytes()), expected);
    }
}
