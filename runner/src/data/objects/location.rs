//! Object location parsing
//!
//! - `s3://bucket/path/to/key` -> S3 object
//! - `file:///abs/path` or a plain path -> local file

use std::fmt;
use std::path::PathBuf;

use super::error::StorageError;

const S3_SCHEME: &str = "s3://";
const FILE_SCHEME: &str = "file://";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectLocation {
    S3 { bucket: String, key: String },
    File(PathBuf),
}

impl ObjectLocation {
    pub fn parse(location: &str) -> Result<Self, StorageError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(StorageError::InvalidLocation("empty location".to_string()));
        }

        if let Some(rest) = location.strip_prefix(S3_SCHEME) {
            let (bucket, key) = rest
                .split_once('/')
                .ok_or_else(|| StorageError::InvalidLocation(location.to_string()))?;
            if bucket.is_empty() || key.is_empty() {
                return Err(StorageError::InvalidLocation(location.to_string()));
            }
            return Ok(Self::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        let path = location.strip_prefix(FILE_SCHEME).unwrap_or(location);
        if path.is_empty() || (location.contains("://") && !location.starts_with(FILE_SCHEME)) {
            return Err(StorageError::InvalidLocation(location.to_string()));
        }
        Ok(Self::File(PathBuf::from(path)))
    }

    pub fn is_s3(&self) -> bool {
        matches!(self, Self::S3 { .. })
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 { bucket, key } => write!(f, "{S3_SCHEME}{bucket}/{key}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3() {
        assert_eq!(
            ObjectLocation::parse("s3://data-bucket/cleaned/output.jsonl").unwrap(),
            ObjectLocation::S3 {
                bucket: "data-bucket".to_string(),
                key: "cleaned/output.jsonl".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_file() {
        assert_eq!(
            ObjectLocation::parse("file:///tmp/in.jsonl").unwrap(),
            ObjectLocation::File(PathBuf::from("/tmp/in.jsonl"))
        );
        assert_eq!(
            ObjectLocation::parse("data/in.jsonl").unwrap(),
            ObjectLocation::File(PathBuf::from("data/in.jsonl"))
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ObjectLocation::parse("").is_err());
        assert!(ObjectLocation::parse("s3://bucket-only").is_err());
        assert!(ObjectLocation::parse("s3:///key").is_err());
        assert!(ObjectLocation::parse("s3://bucket/").is_err());
        assert!(ObjectLocation::parse("gs://bucket/key").is_err());
    }

    #[test]
    fn test_display_round_trips_s3() {
        let loc = ObjectLocation::parse("s3://b/k/v.jsonl").unwrap();
        assert_eq!(loc.to_string(), "s3://b/k/v.jsonl");
        assert!(loc.is_s3());
    }
}
