//! Signaling messages
//!
//! Negotiation payloads exchanged through the relay. The relay boundary
//! carries typed envelopes; the serde derives define the JSON interchange
//! form a real relay publishes, with the wire tags the original transport
//! used ("offer", "answer", "ice-candidate").

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{ChannelId, ParticipantId};

/// A session description, opaque to the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sdp(pub String);

impl fmt::Display for Sdp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One ICE candidate as discovered by a connectivity session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u32>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        IceCandidate {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

/// A negotiation message addressed to one participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalPayload {
    Offer { sdp: Sdp },
    Answer { sdp: Sdp },
    #[serde(rename = "ice-candidate")]
    Candidate { candidate: IceCandidate },
}

impl SignalPayload {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalPayload::Offer { .. } => "offer",
            SignalPayload::Answer { .. } => "answer",
            SignalPayload::Candidate { .. } => "ice-candidate",
        }
    }
}

/// The envelope published on the relay: payload plus addressing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub payload: SignalPayload,
}

/// An outbound signal queued by the peer manager, not yet enveloped.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressedSignal {
    pub to: ParticipantId,
    pub payload: SignalPayload,
}

/// A relay topic. One per channel for signaling traffic.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    pub fn signaling(channel: ChannelId) -> Self {
        Topic(format!("signaling:{channel}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
