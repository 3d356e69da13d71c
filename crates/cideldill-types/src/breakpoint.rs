use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::call::CallSite;
use crate::payload::{Format, Payload};

/// What happens after a breakpointed function returns control to the
/// debugger: stay stopped, or let it go. Client libraries vary on whether
/// the wire value is `"go"` or `"continue"` — we normalize to `Go`
/// internally and accept both spellings on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterBehavior {
    Stop,
    Go,
}

impl AfterBehavior {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "stop" => Some(Self::Stop),
            "go" | "continue" => Some(Self::Go),
            _ => None,
        }
    }

    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Go => "go",
        }
    }
}

/// The `call/start` payload that gets parked while a call is paused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStartPayload {
    pub method_name: String,
    pub target: PayloadRef,
    pub args: Vec<PayloadRef>,
    pub kwargs: std::collections::BTreeMap<String, PayloadRef>,
    pub call_site: CallSite,
    pub process_pid: u32,
    pub process_start_time: f64,
    pub page_url: Option<String>,
    pub preferred_format: Format,
    pub signature: Option<String>,
}

/// A `{cid, data?}` reference as it appears on the wire: `data` (base64) is
/// present only when the client believes the server doesn't have the blob
/// yet, per its per-connection CID cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadRef {
    pub cid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A host call blocked at a breakpoint pending a resume action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedExecution {
    pub pause_id: Uuid,
    pub call_data: CallStartPayload,
    pub paused_at: f64,
    pub preferred_format: Format,
}

/// `continue | modify | skip | raise | replace`.
///
/// Payloads carried inside each variant tag their own `serialization_format`
/// explicitly so a non-native peer can decode JSON while a native one
/// consumes binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResumeAction {
    Continue,
    Modify {
        modified_args: Vec<ActionPayload>,
        modified_kwargs: std::collections::BTreeMap<String, ActionPayload>,
    },
    Skip {
        fake_result: Option<ActionPayload>,
    },
    Raise {
        exception_type: String,
        exception_message: String,
    },
    Replace {
        function_name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPayload {
    pub cid: String,
    pub data: String,
    pub serialization_format: Format,
}

impl ActionPayload {
    pub fn from_payload(p: &Payload) -> Self {
        use base64::Engine as _;
        Self {
            cid: p.cid.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&p.bytes),
            serialization_format: p.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_behavior_normalizes_continue_to_go() {
        assert_eq!(AfterBehavior::parse("continue"), Some(AfterBehavior::Go));
        assert_eq!(AfterBehavior::parse("go"), Some(AfterBehavior::Go));
        assert_eq!(AfterBehavior::parse("stop"), Some(AfterBehavior::Stop));
        assert_eq!(AfterBehavior::parse("bogus"), None);
    }

    #[test]
    fn after_behavior_wire_str_is_always_go_not_continue() {
        assert_eq!(AfterBehavior::Go.as_wire_str(), "go");
    }

    #[test]
    fn resume_action_modify_serializes_with_action_tag() {
        let action = ResumeAction::Modify {
            modified_args: vec![],
            modified_kwargs: Default::default(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "modify");
    }
}
