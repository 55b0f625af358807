//! # Domain Events and Subscriptions
//!
//! [`Event`] is the message pushed to subscribers. Its payload is a JSON-like
//! mapping ([`serde_json::Map`]) so event sources can be written, loaded from
//! files and inspected without touching protobuf types. On the wire the
//! payload travels as a `google.protobuf.Struct`.
//!
//! ## Wire mapping
//!
//! | JSON            | `google.protobuf.Value` |
//! |-----------------|-------------------------|
//! | `null`          | `null_value`            |
//! | `bool`          | `bool_value`            |
//! | number          | `number_value` (`f64`)  |
//! | string          | `string_value`          |
//! | array           | `list_value`            |
//! | object          | `struct_value`          |
//!
//! `Struct` numbers are always doubles. When decoding, integral values that
//! fit into the exactly-representable `f64` range come back as JSON integers;
//! non-finite doubles are rejected because JSON cannot carry them.

use crate::{Error, Result, proto};
use prost_types::value::Kind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Largest integer magnitude an `f64` represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// An incoming subscription, built from the wire [`proto::StreamRequest`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub client_id: String,
}

impl SubscriptionRequest {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

impl From<proto::StreamRequest> for SubscriptionRequest {
    fn from(req: proto::StreamRequest) -> Self {
        Self {
            client_id: req.client_id,
        }
    }
}

/// A single event delivered on a subscription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier, unique within one subscription.
    pub event_id: String,
    /// Type tag such as `USER_LOGIN`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Structured payload.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Event {
    pub fn new(
        event_id: impl Into<String>,
        kind: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            kind: kind.into(),
            payload,
        }
    }
}

impl TryFrom<Event> for proto::Event {
    type Error = Error;

    fn try_from(event: Event) -> Result<Self> {
        Ok(Self {
            event_id: event.event_id,
            r#type: event.kind,
            payload: Some(encode_struct(event.payload)?),
        })
    }
}

impl TryFrom<proto::Event> for Event {
    type Error = Error;

    fn try_from(event: proto::Event) -> Result<Self> {
        let payload = match event.payload {
            Some(payload) => decode_struct(payload)?,
            None => Map::new(),
        };
        Ok(Self {
            event_id: event.event_id,
            kind: event.r#type,
            payload,
        })
    }
}

fn encode_struct(map: Map<String, Value>) -> Result<prost_types::Struct> {
    let fields = map
        .into_iter()
        .map(|(key, value)| Ok((key, encode_value(value)?)))
        .collect::<Result<_>>()?;
    Ok(prost_types::Struct { fields })
}

fn encode_value(value: Value) -> Result<prost_types::Value> {
    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(b) => Kind::BoolValue(b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().ok_or_else(|| Error::Encode {
            reason: format!("number {n} is not representable as a double"),
        })?),
        Value::String(s) => Kind::StringValue(s),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items
                .into_iter()
                .map(encode_value)
                .collect::<Result<_>>()?,
        }),
        Value::Object(map) => Kind::StructValue(encode_struct(map)?),
    };
    Ok(prost_types::Value { kind: Some(kind) })
}

fn decode_struct(s: prost_types::Struct) -> Result<Map<String, Value>> {
    s.fields
        .into_iter()
        .map(|(key, value)| Ok((key, decode_value(value)?)))
        .collect()
}

fn decode_value(value: prost_types::Value) -> Result<Value> {
    Ok(match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::NumberValue(n)) => decode_number(n)?,
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(decode_value)
                .collect::<Result<_>>()?,
        ),
        Some(Kind::StructValue(s)) => Value::Object(decode_struct(s)?),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn decode_number(n: f64) -> Result<Value> {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Ok(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| Error::Encode {
            reason: format!("non-finite number {n} cannot be represented in JSON"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn encodes_nested_payload_as_struct() -> Result<()> {
        let event = Event::new(
            "evt-002",
            "ORDER_CREATED",
            object(json!({
                "order_id": "ord_abc_987",
                "value": 99.95,
                "paid": true,
                "coupon": null,
                "items": [{"sku": "A1", "qty": 2}],
            })),
        );

        let wire = proto::Event::try_from(event)?;
        assert_eq!(wire.event_id, "evt-002");
        assert_eq!(wire.r#type, "ORDER_CREATED");

        let payload = wire.payload.expect("payload is always set");
        assert_eq!(
            payload.fields["value"].kind,
            Some(Kind::NumberValue(99.95))
        );
        assert_eq!(payload.fields["paid"].kind, Some(Kind::BoolValue(true)));
        assert!(matches!(
            payload.fields["coupon"].kind,
            Some(Kind::NullValue(_))
        ));
        let Some(Kind::ListValue(items)) = &payload.fields["items"].kind else {
            panic!("items should be a list");
        };
        assert!(matches!(items.values[0].kind, Some(Kind::StructValue(_))));
        Ok(())
    }

    #[test]
    fn decodes_integral_doubles_as_integers() -> Result<()> {
        let wire = proto::Event::try_from(Event::new(
            "evt-003",
            "SYSTEM_PING",
            object(json!({"latency_ms": 50, "ratio": 0.5})),
        ))?;

        let event = Event::try_from(wire)?;
        assert_eq!(event.payload["latency_ms"], json!(50));
        assert_eq!(event.payload["ratio"], json!(0.5));
        Ok(())
    }

    #[test]
    fn rejects_non_finite_numbers_on_decode() {
        let mut fields = std::collections::BTreeMap::new();
        fields.insert(
            "latency_ms".to_string(),
            prost_types::Value {
                kind: Some(Kind::NumberValue(f64::NAN)),
            },
        );
        let wire = proto::Event {
            event_id: "evt-x".to_string(),
            r#type: "SYSTEM_PING".to_string(),
            payload: Some(prost_types::Struct {
                fields: fields.into_iter().collect(),
            }),
        };

        assert!(matches!(Event::try_from(wire), Err(Error::Encode { .. })));
    }

    #[test]
    fn missing_payload_decodes_as_empty_map() -> Result<()> {
        let event = Event::try_from(proto::Event {
            event_id: "evt-001".to_string(),
            r#type: "USER_LOGIN".to_string(),
            payload: None,
        })?;
        assert!(event.payload.is_empty());
        Ok(())
    }

    #[test]
    fn deserializes_type_field_into_kind() {
        let event: Event = serde_json::from_value(json!({
            "event_id": "evt-001",
            "type": "USER_LOGIN",
            "payload": {"user_id": "usr_123"},
        }))
        .expect("valid event json");
        assert_eq!(event.kind, "USER_LOGIN");
        assert_eq!(event.payload["user_id"], json!("usr_123"));
    }

    #[test]
    fn subscription_request_from_wire() {
        let req = SubscriptionRequest::from(proto::StreamRequest {
            client_id: "cli-42".to_string(),
        });
        assert_eq!(req, SubscriptionRequest::new("cli-42"));
    }
}
