//! Actions, effects, artifacts, and fulfillment records.
//!
//! An [`Action`] is a proposal to mutate simulation state; it only becomes
//! real after budget admission and application to the kernel. An [`Effect`]
//! is a proposed side-effect routed to an adapter, and its outcome is
//! captured in exactly one [`FulfillmentRecord`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::enums::{EffectKind, Fulfillment, FulfillmentStatus};
use crate::ids::EffectId;

/// A proposal from a persona to mutate simulation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Action {
    /// Name of the persona that proposed the action.
    pub actor_id: String,
    /// The tick the action was proposed in.
    pub tick: u64,
    /// Action kind (e.g. `"move"`). Mapped to a kernel code on application.
    pub kind: String,
    /// Free-form parameters. `value` (integer) is passed to the kernel;
    /// `category` overrides the configured budget category.
    pub params: BTreeMap<String, Value>,
}

impl Action {
    /// Create an action with no parameters.
    pub fn new(actor_id: &str, tick: u64, kind: &str) -> Self {
        Self {
            actor_id: actor_id.to_owned(),
            tick,
            kind: kind.to_owned(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_owned(), value.into());
        self
    }

    /// The integer `value` parameter, or 0 when absent or not an integer.
    pub fn value(&self) -> i64 {
        self.params.get("value").and_then(Value::as_i64).unwrap_or(0)
    }

    /// The explicit `category` parameter, if any.
    pub fn category(&self) -> Option<&str> {
        self.params.get("category").and_then(Value::as_str)
    }
}

/// Reference to an artifact produced by a persona.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ArtifactRef {
    /// Stable artifact identifier (e.g. `"plan:3"`).
    pub id: String,
    /// Artifact kind (e.g. `"plan"`).
    pub kind: String,
}

impl ArtifactRef {
    /// Create a reference.
    pub fn new(kind: &str, id: &str) -> Self {
        Self {
            id: id.to_owned(),
            kind: kind.to_owned(),
        }
    }
}

/// An artifact published by a persona during a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Artifact {
    /// Reference other personas can cite as `sourceRef`.
    pub reference: ArtifactRef,
    /// Name of the publishing persona. Filled in by the orchestrator.
    pub produced_by: String,
    /// Tick of publication.
    pub tick: u64,
    /// Artifact body.
    pub body: Value,
}

/// An effect as proposed by a persona, before it is numbered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectProposal {
    /// Effect kind.
    pub kind: EffectKind,
    /// Fulfillment class.
    pub fulfillment: Fulfillment,
    /// Effect payload.
    pub data: BTreeMap<String, Value>,
    /// Artifact the effect refers to, if any.
    pub source_ref: Option<ArtifactRef>,
}

impl EffectProposal {
    /// Propose an effect of `kind` with the kind's default fulfillment class.
    pub fn new(kind: EffectKind) -> Self {
        let fulfillment = kind.default_fulfillment();
        Self {
            kind,
            fulfillment,
            data: BTreeMap::new(),
            source_ref: None,
        }
    }

    /// A `log` effect carrying `message`.
    pub fn log(message: &str) -> Self {
        Self::new(EffectKind::Log).with_data("message", message)
    }

    /// Builder-style payload insertion.
    #[must_use]
    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_owned(), value.into());
        self
    }

    /// Builder-style `sourceRef`.
    #[must_use]
    pub fn with_source_ref(mut self, source_ref: ArtifactRef) -> Self {
        self.source_ref = Some(source_ref);
        self
    }

    /// Builder-style fulfillment class.
    #[must_use]
    pub fn with_fulfillment(mut self, fulfillment: Fulfillment) -> Self {
        self.fulfillment = fulfillment;
        self
    }
}

/// A numbered side-effect, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Effect {
    /// Derived from `(tick, index, kind, value)`.
    pub id: EffectId,
    /// Tick the effect was emitted in.
    pub tick: u64,
    /// Kind tag.
    #[ts(as = "String")]
    pub kind: EffectKind,
    /// Fulfillment class.
    pub fulfillment: Fulfillment,
    /// Payload.
    pub data: BTreeMap<String, Value>,
    /// Artifact the effect refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<ArtifactRef>,
}

impl Effect {
    /// Number a proposal. The id's value component is the canonical JSON of
    /// the payload.
    pub fn from_proposal(tick: u64, index: u64, proposal: EffectProposal) -> Self {
        let value = serde_json::to_string(&proposal.data).unwrap_or_default();
        Self::with_value(tick, index, &value, proposal)
    }

    /// Number a proposal whose identity value is given explicitly (used for
    /// kernel-drained effects, whose value is the kernel's numeric payload).
    pub fn with_value(tick: u64, index: u64, value: &str, proposal: EffectProposal) -> Self {
        Self {
            id: EffectId::derive(tick, index, proposal.kind.as_str(), value),
            tick,
            kind: proposal.kind,
            fulfillment: proposal.fulfillment,
            data: proposal.data,
            source_ref: proposal.source_ref,
        }
    }

    /// The `message` payload field, if present.
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }
}

/// The recorded outcome of attempting to realize one effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FulfillmentRecord {
    /// The effect this record is about.
    pub effect: Effect,
    /// Outcome.
    pub status: FulfillmentStatus,
    /// Adapter result, when fulfilled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Why the effect was deferred or failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FulfillmentRecord {
    /// A fulfilled record.
    pub fn fulfilled(effect: Effect, result: Value) -> Self {
        Self {
            effect,
            status: FulfillmentStatus::Fulfilled,
            result: Some(result),
            reason: None,
        }
    }

    /// A deferred record.
    pub fn deferred(effect: Effect, reason: &str) -> Self {
        Self {
            effect,
            status: FulfillmentStatus::Deferred,
            result: None,
            reason: Some(reason.to_owned()),
        }
    }

    /// An error record.
    pub fn error(effect: Effect, reason: &str) -> Self {
        Self {
            effect,
            status: FulfillmentStatus::Error,
            result: None,
            reason: Some(reason.to_owned()),
        }
    }
}

/// A telemetry record, as handed to the telemetry adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TelemetryRecord {
    /// Metric or event name.
    pub name: String,
    /// Tick the record belongs to.
    pub tick: u64,
    /// Record fields.
    pub fields: BTreeMap<String, Value>,
}

impl TelemetryRecord {
    /// Create an empty record.
    pub fn new(name: &str, tick: u64) -> Self {
        Self {
            name: name.to_owned(),
            tick,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// Wrap this record in a `telemetry` effect proposal.
    pub fn into_proposal(self) -> EffectProposal {
        EffectProposal::new(EffectKind::Telemetry)
            .with_data("name", self.name)
            .with_data("tick", self.tick)
            .with_data("fields", Value::Object(self.fields.into_iter().collect()))
    }

    /// Rebuild a record from a `telemetry` effect's payload.
    pub fn from_effect(effect: &Effect) -> Self {
        let name = effect
            .data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("telemetry")
            .to_owned();
        let fields = effect
            .data
            .get("fields")
            .and_then(Value::as_object)
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Self {
            name,
            tick: effect.tick,
            fields,
        }
    }
}
