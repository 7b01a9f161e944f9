/*!
 * Remote resource representations
 *
 * State strings are parsed into enums; values this crate does not know are
 * kept verbatim in `Other` and treated as still in progress.
 */

use crate::config::mask_secret;
use crate::error::{DsxError, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Header name used for the EDR auth code when the EDR names none
pub const DEFAULT_AUTH_KEY: &str = "Authorization";

/// Characters of a non-JSON body shown in a preview
const PREVIEW_CHARS: usize = 200;

/// Items of a JSON array shown in a preview
const PREVIEW_ITEMS: usize = 2;

macro_rules! remote_state {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            /// State label not known to this crate
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Other(s) => s,
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s {
                    $($label => $name::$variant,)+
                    other => $name::Other(other.to_string()),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

remote_state! {
    /// Contract negotiation state
    NegotiationState {
        Initial => "INITIAL",
        Requesting => "REQUESTING",
        Requested => "REQUESTED",
        Offering => "OFFERING",
        Offered => "OFFERED",
        Accepting => "ACCEPTING",
        Accepted => "ACCEPTED",
        Agreeing => "AGREEING",
        Agreed => "AGREED",
        Verifying => "VERIFYING",
        Verified => "VERIFIED",
        Finalizing => "FINALIZING",
        Finalized => "FINALIZED",
        Terminating => "TERMINATING",
        Terminated => "TERMINATED",
    }
}

remote_state! {
    /// Transfer process state
    TransferState {
        Initial => "INITIAL",
        Provisioning => "PROVISIONING",
        Provisioned => "PROVISIONED",
        Requesting => "REQUESTING",
        Requested => "REQUESTED",
        Starting => "STARTING",
        Started => "STARTED",
        Suspending => "SUSPENDING",
        Suspended => "SUSPENDED",
        Completing => "COMPLETING",
        Completed => "COMPLETED",
        Terminating => "TERMINATING",
        Terminated => "TERMINATED",
    }
}

remote_state! {
    /// Status of a credential issuance request
    CredentialStatus {
        Created => "CREATED",
        Requesting => "REQUESTING",
        Requested => "REQUESTED",
        Issued => "ISSUED",
        Failed => "FAILED",
        Rejected => "REJECTED",
    }
}

/// Asset id and the offer policy to negotiate against; immutable once extracted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offer {
    pub asset_id: String,
    pub policy: Value,
}

impl Offer {
    /// `@id` of the offer policy
    pub fn policy_id(&self) -> &str {
        self.policy
            .get("@id")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

fn required_str<'a>(doc: &'a Value, field: &str, what: &str) -> Result<&'a str> {
    doc.get(field).and_then(Value::as_str).ok_or_else(|| {
        DsxError::MalformedResponse(format!("{} response has no '{}' field", what, field))
    })
}

fn optional_str(doc: &Value, field: &str) -> Option<String> {
    doc.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Snapshot of a contract negotiation
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiation {
    pub id: String,
    pub state: NegotiationState,
    /// Present once the negotiation is finalized
    pub agreement_id: Option<String>,
}

impl Negotiation {
    pub fn from_json(doc: &Value) -> Result<Self> {
        Ok(Self {
            id: optional_str(doc, "@id").unwrap_or_default(),
            state: required_str(doc, "state", "negotiation")?.into(),
            agreement_id: optional_str(doc, "contractAgreementId"),
        })
    }
}

/// Snapshot of a transfer process
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProcess {
    pub id: String,
    pub state: TransferState,
}

impl TransferProcess {
    pub fn from_json(doc: &Value) -> Result<Self> {
        Ok(Self {
            id: optional_str(doc, "@id").unwrap_or_default(),
            state: required_str(doc, "state", "transfer process")?.into(),
        })
    }
}

/// Snapshot of a credential request's status resource
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRequestStatus {
    pub status: CredentialStatus,
}

impl CredentialRequestStatus {
    pub fn from_json(doc: &Value) -> Result<Self> {
        Ok(Self {
            status: required_str(doc, "status", "credential request")?.into(),
        })
    }
}

/// Endpoint Data Reference: where and how to pull the data
#[derive(Clone, PartialEq, Eq)]
pub struct Edr {
    pub endpoint: String,
    pub auth_code: String,
    pub auth_key: String,
}

impl fmt::Debug for Edr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edr")
            .field("endpoint", &self.endpoint)
            .field("auth_code", &mask_secret(&self.auth_code))
            .field("auth_key", &self.auth_key)
            .finish()
    }
}

impl Edr {
    /// Extract the endpoint details from one EDR entry.
    ///
    /// Endpoint and auth code must be non-empty; the auth key falls back to
    /// `Authorization`.
    pub fn from_json(doc: &Value) -> Result<Self> {
        let endpoint = optional_str(doc, "edc:endpoint")
            .ok_or_else(|| DsxError::MalformedEdr("missing edc:endpoint".to_string()))?;
        let auth_code = optional_str(doc, "edc:authCode")
            .ok_or_else(|| DsxError::MalformedEdr("missing edc:authCode".to_string()))?;
        let auth_key =
            optional_str(doc, "edc:authKey").unwrap_or_else(|| DEFAULT_AUTH_KEY.to_string());

        Ok(Self {
            endpoint,
            auth_code,
            auth_key,
        })
    }
}

/// Body returned by the data plane, with a short preview for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPayload {
    pub status: u16,
    #[serde(skip)]
    pub body: String,
    pub bytes: usize,
    /// First items of an array, the whole object, or the head of a non-JSON body
    pub preview: Value,
    /// Items beyond the preview when the body is a JSON array
    pub remaining_items: usize,
}

impl DataPayload {
    pub fn new(status: u16, body: String) -> Self {
        let (preview, remaining_items) = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(items)) => {
                let remaining = items.len().saturating_sub(PREVIEW_ITEMS);
                let head = items.into_iter().take(PREVIEW_ITEMS).collect();
                (Value::Array(head), remaining)
            }
            Ok(other) => (other, 0),
            Err(_) => (
                Value::String(body.chars().take(PREVIEW_CHARS).collect()),
                0,
            ),
        };

        Self {
            status,
            bytes: body.len(),
            body,
            preview,
            remaining_items,
        }
    }
}
