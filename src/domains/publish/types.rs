use crate::errors::DigestError;
use std::fmt;
use std::str::FromStr;

/// Publisher states for one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Init,
    Fetch,
    Send,
    Done,
    Failed,
}

impl PublishState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PublishState::Done | PublishState::Failed)
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Init => "INIT",
            PublishState::Fetch => "FETCH",
            PublishState::Send => "SEND",
            PublishState::Done => "DONE",
            PublishState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful stream publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub stream_id: i64,
    pub chunks_sent: usize,
    pub records_sent: usize,
    pub records_skipped: u64,
    pub bytes_sent: u64,
    pub state: PublishState,
}

/// Content digest over a chunk's exact bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// 160-bit SHA-1
    #[default]
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    /// Length of the hex-encoded digest
    pub fn hex_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 40,
            DigestAlgorithm::Sha256 => 64,
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(DigestAlgorithm::Sha1),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            _ => Err(DigestError::Unsupported(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_names() {
        assert_eq!("SHA-1".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha1);
        assert_eq!("sha256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!(
            "md5".parse::<DigestAlgorithm>(),
            Err(DigestError::Unsupported("md5".to_string()))
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(PublishState::Done.is_terminal());
        assert!(PublishState::Failed.is_terminal());
        assert!(!PublishState::Fetch.is_terminal());
        assert_eq!(PublishState::Send.to_string(), "SEND");
    }
}
