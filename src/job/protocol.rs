//! JSON wire messages exchanged between a caller and an execution context.
//!
//! Requests carry an `id` and a `cmd` tag next to the command's fields:
//!
//! ```json
//! {"id": "5f0c…", "cmd": "PAD_PREVIEW", "profile": {"outer": […]}, "height": 2.0}
//! {"id": "5f0c…", "cmd": "CANCEL"}
//! ```
//!
//! Replies are `{"ok": true, "id", "result"}` or `{"ok": false, "id", "error"}`.

use crate::boolean::BooleanOp;
use crate::errors::KernelError;
use crate::float_types::Real;
use crate::sketch::Profile;
use crate::solid::Solid;
use crate::tessellate::{Mesh, Tessellation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use uuid::Uuid;

/// Tag of the message that abandons a job.
pub const CANCEL_TAG: &str = "CANCEL";

/// Correlation token pairing a reply with its request.
///
/// Any JSON string or number is accepted and echoed back unchanged. Ids the
/// kernel mints itself are random (v4) UUID strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    Number(serde_json::Number),
    Text(String),
}

impl JobId {
    /// A fresh random (v4) id.
    pub fn new() -> Self {
        JobId::Text(Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for JobId {
    fn from(n: u64) -> Self {
        JobId::Number(n.into())
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId::Text(s.to_string())
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobId::Number(n) => n.fmt(f),
            JobId::Text(s) => f.write_str(s),
        }
    }
}

/// Work an execution context knows how to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    SanitizeProfile {
        profile: Profile,
    },
    PadPreview {
        profile: Profile,
        height: Real,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tess: Option<Tessellation>,
    },
    BooleanPreview {
        op: BooleanOp,
        a: Solid,
        b: Solid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tess: Option<Tessellation>,
    },
    TessellateRefine {
        shape: Solid,
        tess: Tessellation,
    },
}

impl Command {
    /// Every `cmd` tag that maps onto a [`Command`].
    pub const TAGS: [&'static str; 4] = [
        "SANITIZE_PROFILE",
        "PAD_PREVIEW",
        "BOOLEAN_PREVIEW",
        "TESSELLATE_REFINE",
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Command::SanitizeProfile { .. } => Self::TAGS[0],
            Command::PadPreview { .. } => Self::TAGS[1],
            Command::BooleanPreview { .. } => Self::TAGS[2],
            Command::TessellateRefine { .. } => Self::TAGS[3],
        }
    }
}

/// A command together with its correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(flatten)]
    pub command: Command,
}

/// A mesh plus the solid it was emitted from, so the solid can be refined or
/// composed later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preview {
    pub mesh: Mesh,
    pub shape: Solid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refined {
    pub mesh: Mesh,
}

/// Successful result of a job.
///
/// `SANITIZE_PROFILE` yields a profile, `PAD_PREVIEW` and `BOOLEAN_PREVIEW`
/// a [`Preview`], `TESSELLATE_REFINE` a [`Refined`] mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    Preview(Preview),
    Refined(Refined),
    Profile(Profile),
}

impl JobOutput {
    pub fn mesh(&self) -> Option<&Mesh> {
        match self {
            JobOutput::Preview(p) => Some(&p.mesh),
            JobOutput::Refined(r) => Some(&r.mesh),
            JobOutput::Profile(_) => None,
        }
    }
}

/// Exactly one per job that was not cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "ReplyRepr", try_from = "ReplyRepr")]
pub enum JobResult {
    Ok { id: JobId, result: JobOutput },
    Err { id: JobId, error: Option<String> },
}

impl JobResult {
    pub fn id(&self) -> JobId {
        match self {
            JobResult::Ok { id, .. } | JobResult::Err { id, .. } => id.clone(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, JobResult::Ok { .. })
    }

    /// Caller-side view of the reply.
    pub fn into_result(self) -> Result<JobOutput, KernelError> {
        match self {
            JobResult::Ok { result, .. } => Ok(result),
            JobResult::Err { error, .. } => Err(KernelError::from_reply(error)),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ReplyRepr {
    ok: bool,
    id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<JobOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<JobResult> for ReplyRepr {
    fn from(reply: JobResult) -> Self {
        match reply {
            JobResult::Ok { id, result } => ReplyRepr {
                ok: true,
                id,
                result: Some(result),
                error: None,
            },
            JobResult::Err { id, error } => ReplyRepr {
                ok: false,
                id,
                result: None,
                error,
            },
        }
    }
}

impl TryFrom<ReplyRepr> for JobResult {
    type Error = String;

    fn try_from(repr: ReplyRepr) -> Result<Self, Self::Error> {
        match (repr.ok, repr.result) {
            (true, Some(result)) => Ok(JobResult::Ok {
                id: repr.id,
                result,
            }),
            (true, None) => Err(format!("reply {} is ok but carries no result", repr.id)),
            (false, _) => Ok(JobResult::Err {
                id: repr.id,
                error: repr.error,
            }),
        }
    }
}

/// A decoded request.
#[derive(Debug, Clone)]
pub enum Request {
    Job(Job),
    Cancel(JobId),
}

/// A request that could not be decoded. `id` is set when it was readable, in
/// which case the failure is owed a reply.
#[derive(Debug)]
pub struct Rejected {
    pub id: Option<JobId>,
    pub error: KernelError,
}

/// Reads the `id` field of a raw request, if it is a string or a number.
pub fn peek_id(value: &Value) -> Option<JobId> {
    value
        .get("id")
        .and_then(|id| JobId::deserialize(id).ok())
}

/// Decodes a raw request, telling unknown command tags apart from malformed
/// payloads.
pub fn decode_request(value: Value) -> Result<Request, Rejected> {
    let id = peek_id(&value);
    let reject = |error| Rejected {
        id: id.clone(),
        error,
    };

    let tag = match value.get("cmd") {
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => return Err(reject(KernelError::UnknownCommand(other.to_string()))),
        None => {
            return Err(reject(KernelError::Kernel(
                "request has no cmd field".to_string(),
            )));
        },
    };

    if tag == CANCEL_TAG {
        return match id.clone() {
            Some(id) => Ok(Request::Cancel(id)),
            None => Err(reject(KernelError::Kernel(
                "CANCEL without a readable id".to_string(),
            ))),
        };
    }
    if !Command::TAGS.contains(&tag.as_str()) {
        return Err(reject(KernelError::UnknownCommand(tag)));
    }

    serde_json::from_value::<Job>(value)
        .map(Request::Job)
        .map_err(|e| reject(KernelError::Wire(e)))
}
