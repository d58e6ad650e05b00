//! Object-store and cache key schemes.

use crate::{JobId, UserId};

/// Container extension of transcoded output.
pub const PROCESSED_EXTENSION: &str = "mp4";

/// Key of a raw upload: `raw/user_{owner}/{job}-{filename}`.
pub fn raw_key(owner_id: &UserId, job_id: &JobId, filename: &str) -> String {
    format!("raw/user_{}/{}-{}", owner_id, job_id, filename)
}

/// Key of transcoded output: `processed/user_{owner}/{job}.mp4`.
pub fn processed_key(owner_id: &UserId, job_id: &JobId) -> String {
    format!("processed/user_{}/{}.{}", owner_id, job_id, PROCESSED_EXTENSION)
}

/// Cache key of a job's summary.
pub fn summary_cache_key(video_id: &JobId) -> String {
    format!("summary:{}", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_schemes() {
        let owner = UserId::from("u1");
        let job = JobId::from("j1");
        assert_eq!(raw_key(&owner, &job, "clip.mp4"), "raw/user_u1/j1-clip.mp4");
        assert_eq!(processed_key(&owner, &job), "processed/user_u1/j1.mp4");
        assert_eq!(summary_cache_key(&job), "summary:j1");
    }
}
