//! Queue payload types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use storagex_models::{JobId, Resolution};

/// Transcode request carried by one queue message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeJob {
    /// Job to drive
    pub job_id: JobId,
    /// Raw object key in the raw bucket
    #[serde(alias = "filename")]
    pub source_key: String,
    /// Target resolution; missing or unknown values mean 720p
    #[serde(default)]
    pub resolution: Resolution,
}

impl TranscodeJob {
    pub fn new(job_id: JobId, source_key: impl Into<String>) -> Self {
        Self {
            job_id,
            source_key: source_key.into(),
            resolution: Resolution::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }
}

/// Decoded body of a queue message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Job(TranscodeJob),
    /// Undecodable body that still names the job it was meant for.
    Malformed {
        job_id: JobId,
        raw: String,
        error: String,
    },
}

impl Payload {
    /// Decode a message body.
    ///
    /// A body that is not a valid [`TranscodeJob`] but carries a `job_id`
    /// decodes as [`Payload::Malformed`]. Anything else is an error: there is
    /// no job to fail, so the caller can only drop it.
    pub fn decode(raw: &str) -> Result<Self, String> {
        let error = match serde_json::from_str::<TranscodeJob>(raw) {
            Ok(job) => return Ok(Payload::Job(job)),
            Err(e) => e.to_string(),
        };

        let job_id = serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|value| match value.get("job_id") {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(JobId::from(s.trim())),
                Some(Value::Number(n)) => Some(JobId::from_string(n.to_string())),
                _ => None,
            });

        match job_id {
            Some(job_id) => Ok(Payload::Malformed {
                job_id,
                raw: raw.to_string(),
                error,
            }),
            None => Err(error),
        }
    }

    /// Message body as it should be written back to a stream.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Payload::Job(job) => serde_json::to_string(job),
            Payload::Malformed { raw, .. } => Ok(raw.clone()),
        }
    }
}

/// A message handed to a consumer and not yet acked.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: String,
    pub payload: Payload,
}

impl Delivery {
    pub fn job_id(&self) -> &JobId {
        match &self.payload {
            Payload::Job(job) => &job.job_id,
            Payload::Malformed { job_id, .. } => job_id,
        }
    }

    /// The transcode request, unless the payload was malformed.
    pub fn job(&self) -> Option<&TranscodeJob> {
        match &self.payload {
            Payload::Job(job) => Some(job),
            Payload::Malformed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_defaults_to_720p() {
        let job: TranscodeJob =
            serde_json::from_str(r#"{"job_id": "j1", "source_key": "raw/user_1/j1-a.mp4"}"#)
                .unwrap();
        assert_eq!(job.resolution, Resolution::P720);

        let job: TranscodeJob = serde_json::from_str(
            r#"{"job_id": "j1", "source_key": "k", "resolution": "4k"}"#,
        )
        .unwrap();
        assert_eq!(job.resolution, Resolution::P720);
    }

    #[test]
    fn test_accepts_filename_field() {
        let job: TranscodeJob =
            serde_json::from_str(r#"{"job_id": "j1", "filename": "raw/user_1/j1-a.mp4"}"#)
                .unwrap();
        assert_eq!(job.source_key, "raw/user_1/j1-a.mp4");
    }

    #[test]
    fn test_missing_job_id_is_rejected() {
        assert!(serde_json::from_str::<TranscodeJob>(r#"{"source_key": "k"}"#).is_err());
        assert!(Payload::decode(r#"{"source_key": "k"}"#).is_err());
        assert!(Payload::decode(r#"{"job_id": "  "}"#).is_err());
        assert!(Payload::decode("not json").is_err());
    }

    #[test]
    fn test_payload_without_source_still_names_job() {
        let payload = Payload::decode(r#"{"job_id": "j1"}"#).unwrap();
        let Payload::Malformed { job_id, raw, error } = payload else {
            panic!("expected a malformed payload");
        };
        assert_eq!(job_id, JobId::from("j1"));
        assert_eq!(raw, r#"{"job_id": "j1"}"#);
        assert!(error.contains("source_key"));

        let payload = Payload::decode(r#"{"job_id": 17, "source_key": 3}"#).unwrap();
        let delivery = Delivery {
            message_id: "1-0".to_string(),
            payload,
        };
        assert_eq!(delivery.job_id(), &JobId::from("17"));
        assert!(delivery.job().is_none());
    }

    #[test]
    fn test_valid_payload_decodes_as_job() {
        let payload = Payload::decode(r#"{"job_id": "j1", "source_key": "k"}"#).unwrap();
        assert_eq!(payload, Payload::Job(TranscodeJob::new(JobId::from("j1"), "k")));
    }
}
