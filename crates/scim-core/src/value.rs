//! SCIM attribute values and value resolvers.
//!
//! A SCIM attribute value is either a primitive scalar, a structure of named
//! sub-values, or a sequence of such structures (multi-valued). Resolvers
//! convert between scalar values and native Rust types; they are stateless
//! and safe for unrestricted concurrent use.

use crate::error::{Error, Result};
use crate::schema::{AttributeDescriptor, AttributeType};
use base64::prelude::{Engine, BASE64_STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A primitive SCIM value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScimScalar {
    /// UTF-8 string
    String(String),
    /// Boolean
    Boolean(bool),
    /// Decimal number
    Decimal(f64),
    /// Integer number
    Integer(i64),
    /// Timestamp
    DateTime(DateTime<Utc>),
    /// Raw binary data
    Binary(Vec<u8>),
}

impl ScimScalar {
    /// Renders the scalar in its transport form, the representation stored
    /// in directory attribute values and JSON strings.
    #[must_use]
    pub fn to_transport_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            Self::Binary(bytes) => BASE64_STANDARD.encode(bytes),
        }
    }

    /// Returns the string content when the scalar is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for ScimScalar {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ScimScalar {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl Serialize for ScimScalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Decimal(d) => serializer.serialize_f64(*d),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::DateTime(_) | Self::Binary(_) => {
                serializer.serialize_str(&self.to_transport_string())
            }
        }
    }
}

/// A structure of named sub-values, as held by complex attributes and by
/// each element of a multi-valued attribute.
///
/// Multi-valued elements carry at minimum a `type` discriminator and a
/// `value`; all other sub-values are optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComplexValue {
    sub_values: BTreeMap<String, ScimScalar>,
}

impl ComplexValue {
    /// Creates an empty structure.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sub-value, replacing any previous value under the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ScimScalar>) -> Self {
        self.sub_values.insert(name.into(), value.into());
        self
    }

    /// Sets a sub-value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ScimScalar>) {
        self.sub_values.insert(name.into(), value.into());
    }

    /// Looks up a sub-value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScimScalar> {
        self.sub_values.get(name)
    }

    /// Returns the string content of a sub-value, if present and a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ScimScalar::as_str)
    }

    /// The `type` discriminator of a multi-valued element (e.g. `work`).
    #[must_use]
    pub fn type_discriminator(&self) -> Option<&str> {
        self.get_str("type")
    }

    /// The `value` sub-value of a multi-valued element.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.get_str("value")
    }

    /// Returns true if no sub-values are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sub_values.is_empty()
    }

    /// Iterates over the sub-values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScimScalar)> {
        self.sub_values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for ComplexValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sub_values.len()))?;
        for (name, value) in &self.sub_values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The value of a SCIM attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ScimValue {
    /// A primitive scalar
    Scalar(ScimScalar),
    /// A structure of named sub-values
    Complex(ComplexValue),
    /// A sequence of structures; element `type` discriminators need not be
    /// unique
    Multi(Vec<ComplexValue>),
}

impl ScimValue {
    /// Convenience constructor for a string scalar value.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(ScimScalar::String(value.into()))
    }

    /// Returns the scalar when this value is a primitive.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&ScimScalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Returns the structure when this value is complex.
    #[must_use]
    pub fn as_complex(&self) -> Option<&ComplexValue> {
        match self {
            Self::Complex(complex) => Some(complex),
            _ => None,
        }
    }

    /// Returns the element sequence when this value is multi-valued.
    #[must_use]
    pub fn as_multi(&self) -> Option<&[ComplexValue]> {
        match self {
            Self::Multi(elements) => Some(elements.as_slice()),
            _ => None,
        }
    }
}

impl Serialize for ScimValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(scalar) => scalar.serialize(serializer),
            Self::Complex(complex) => complex.serialize(serializer),
            Self::Multi(elements) => {
                let mut seq = serializer.serialize_seq(Some(elements.len()))?;
                for element in elements {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
        }
    }
}

/// Converts between scalar attribute values and instances of a native type.
///
/// `to_instance` fails with [`Error::MalformedValue`] on input that does not
/// represent a well-formed `T`; `from_instance` is total.
pub trait AttributeValueResolver<T> {
    /// Creates a native instance from the given scalar value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedValue`] if the value cannot represent `T`.
    fn to_instance(&self, value: &ScimScalar) -> Result<T>;

    /// Creates a scalar value from the given native instance.
    fn from_instance(&self, descriptor: &AttributeDescriptor, instance: T) -> ScimScalar;
}

/// Resolver for string values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringResolver;

impl AttributeValueResolver<String> for StringResolver {
    fn to_instance(&self, value: &ScimScalar) -> Result<String> {
        match value {
            ScimScalar::String(s) => Ok(s.clone()),
            other => Err(malformed("string", other)),
        }
    }

    fn from_instance(&self, _descriptor: &AttributeDescriptor, instance: String) -> ScimScalar {
        ScimScalar::String(instance)
    }
}

/// Resolver for boolean values.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanResolver;

impl AttributeValueResolver<bool> for BooleanResolver {
    fn to_instance(&self, value: &ScimScalar) -> Result<bool> {
        match value {
            ScimScalar::Boolean(b) => Ok(*b),
            ScimScalar::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            ScimScalar::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(malformed("boolean", other)),
        }
    }

    fn from_instance(&self, _descriptor: &AttributeDescriptor, instance: bool) -> ScimScalar {
        ScimScalar::Boolean(instance)
    }
}

/// Resolver for RFC 3339 date-time values.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeResolver;

impl AttributeValueResolver<DateTime<Utc>> for DateTimeResolver {
    fn to_instance(&self, value: &ScimScalar) -> Result<DateTime<Utc>> {
        match value {
            ScimScalar::DateTime(dt) => Ok(*dt),
            ScimScalar::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| Error::MalformedValue(format!("invalid date-time {s}: {err}"))),
            other => Err(malformed("date-time", other)),
        }
    }

    fn from_instance(
        &self,
        _descriptor: &AttributeDescriptor,
        instance: DateTime<Utc>,
    ) -> ScimScalar {
        ScimScalar::DateTime(instance)
    }
}

/// Resolver for binary values, base64-encoded in transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryResolver;

impl AttributeValueResolver<Vec<u8>> for BinaryResolver {
    fn to_instance(&self, value: &ScimScalar) -> Result<Vec<u8>> {
        match value {
            ScimScalar::Binary(bytes) => Ok(bytes.clone()),
            ScimScalar::String(s) => BASE64_STANDARD
                .decode(s)
                .map_err(|err| Error::MalformedValue(format!("invalid base64 value: {err}"))),
            other => Err(malformed("binary", other)),
        }
    }

    fn from_instance(&self, _descriptor: &AttributeDescriptor, instance: Vec<u8>) -> ScimScalar {
        ScimScalar::Binary(instance)
    }
}

/// Decodes a directory transport string into a scalar of the descriptor's
/// declared type, dispatching through the matching value resolver.
///
/// This is the translation path resource mappers use when turning entry
/// values into SCIM attribute values.
///
/// # Errors
///
/// Returns [`Error::MalformedValue`] when the raw value does not represent
/// the declared type, or when the descriptor is complex (a complex
/// attribute has no scalar form).
pub fn decode_value(descriptor: &AttributeDescriptor, raw: &str) -> Result<ScimScalar> {
    let value = ScimScalar::String(raw.to_string());
    match descriptor.data_type() {
        AttributeType::String => StringResolver
            .to_instance(&value)
            .map(|s| StringResolver.from_instance(descriptor, s)),
        AttributeType::Boolean => BooleanResolver
            .to_instance(&value)
            .map(|b| BooleanResolver.from_instance(descriptor, b)),
        AttributeType::DateTime => DateTimeResolver
            .to_instance(&value)
            .map(|dt| DateTimeResolver.from_instance(descriptor, dt)),
        AttributeType::Binary => BinaryResolver
            .to_instance(&value)
            .map(|bytes| BinaryResolver.from_instance(descriptor, bytes)),
        AttributeType::Integer => raw
            .parse::<i64>()
            .map(ScimScalar::Integer)
            .map_err(|err| Error::MalformedValue(format!("invalid integer {raw}: {err}"))),
        AttributeType::Decimal => raw
            .parse::<f64>()
            .map(ScimScalar::Decimal)
            .map_err(|err| Error::MalformedValue(format!("invalid decimal {raw}: {err}"))),
        AttributeType::Complex => Err(no_scalar_form(descriptor)),
    }
}

/// Encodes a scalar into its directory transport string, dispatching
/// through the matching value resolver so the value is validated against
/// the descriptor's declared type.
///
/// # Errors
///
/// Returns [`Error::MalformedValue`] when the scalar does not represent
/// the declared type, or when the descriptor is complex.
pub fn encode_value(descriptor: &AttributeDescriptor, value: &ScimScalar) -> Result<String> {
    match descriptor.data_type() {
        AttributeType::String => StringResolver.to_instance(value),
        AttributeType::Boolean => BooleanResolver
            .to_instance(value)
            .map(|b| BooleanResolver.from_instance(descriptor, b).to_transport_string()),
        AttributeType::DateTime => DateTimeResolver
            .to_instance(value)
            .map(|dt| DateTimeResolver.from_instance(descriptor, dt).to_transport_string()),
        AttributeType::Binary => BinaryResolver
            .to_instance(value)
            .map(|bytes| BinaryResolver.from_instance(descriptor, bytes).to_transport_string()),
        AttributeType::Integer => match value {
            ScimScalar::Integer(i) => Ok(i.to_string()),
            other => Err(malformed("integer", other)),
        },
        AttributeType::Decimal => match value {
            ScimScalar::Decimal(d) => Ok(d.to_string()),
            other => Err(malformed("decimal", other)),
        },
        AttributeType::Complex => Err(no_scalar_form(descriptor)),
    }
}

fn no_scalar_form(descriptor: &AttributeDescriptor) -> Error {
    Error::MalformedValue(format!(
        "attribute {} is complex and has no scalar form",
        descriptor.name()
    ))
}

fn malformed(expected: &str, actual: &ScimScalar) -> Error {
    Error::MalformedValue(format!("expected a {expected} value, got {actual:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDescriptor, AttributeType};
    use chrono::TimeZone;

    fn descriptor(data_type: AttributeType) -> AttributeDescriptor {
        AttributeDescriptor::simple("test", data_type)
    }

    #[test]
    fn string_round_trip() {
        let resolver = StringResolver;
        let desc = descriptor(AttributeType::String);
        let value = resolver.from_instance(&desc, "b jensen".to_string());
        assert_eq!(resolver.to_instance(&value).unwrap(), "b jensen");
    }

    #[test]
    fn boolean_round_trip() {
        let resolver = BooleanResolver;
        let desc = descriptor(AttributeType::Boolean);
        for flag in [true, false] {
            let value = resolver.from_instance(&desc, flag);
            assert_eq!(resolver.to_instance(&value).unwrap(), flag);
        }
        assert!(resolver
            .to_instance(&ScimScalar::String("yes".to_string()))
            .is_err());
    }

    #[test]
    fn date_time_round_trip() {
        let resolver = DateTimeResolver;
        let desc = descriptor(AttributeType::DateTime);
        let instant = Utc.with_ymd_and_hms(2011, 8, 1, 18, 29, 49).unwrap();
        let value = resolver.from_instance(&desc, instant);
        assert_eq!(resolver.to_instance(&value).unwrap(), instant);

        let parsed = resolver
            .to_instance(&ScimScalar::String("2011-08-01T18:29:49Z".to_string()))
            .unwrap();
        assert_eq!(parsed, instant);

        let err = resolver
            .to_instance(&ScimScalar::String("not-a-date".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedValue(_)));
    }

    #[test]
    fn binary_round_trip() {
        let resolver = BinaryResolver;
        let desc = descriptor(AttributeType::Binary);
        let bytes = vec![0u8, 159, 146, 150];
        let value = resolver.from_instance(&desc, bytes.clone());
        assert_eq!(resolver.to_instance(&value).unwrap(), bytes);

        let decoded = resolver
            .to_instance(&ScimScalar::String(BASE64_STANDARD.encode(&bytes)))
            .unwrap();
        assert_eq!(decoded, bytes);

        assert!(resolver
            .to_instance(&ScimScalar::String("!!!".to_string()))
            .is_err());
    }

    #[test]
    fn complex_value_discriminators() {
        let element = ComplexValue::new()
            .with("type", "work")
            .with("value", "bjensen@example.com");
        assert_eq!(element.type_discriminator(), Some("work"));
        assert_eq!(element.value(), Some("bjensen@example.com"));
        assert!(element.get("primary").is_none());
    }

    #[test]
    fn scalar_transport_forms() {
        assert_eq!(
            ScimScalar::Boolean(true).to_transport_string(),
            "true"
        );
        assert_eq!(ScimScalar::Integer(42).to_transport_string(), "42");
        let instant = Utc.with_ymd_and_hms(2011, 8, 1, 18, 29, 49).unwrap();
        assert_eq!(
            ScimScalar::DateTime(instant).to_transport_string(),
            "2011-08-01T18:29:49Z"
        );
    }

    #[test]
    fn value_serialization() {
        let value = ScimValue::Multi(vec![
            ComplexValue::new().with("type", "work").with("value", "a@b.c"),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"[{"type":"work","value":"a@b.c"}]"#);
    }

    #[test]
    fn decode_dispatches_on_declared_type() {
        let decoded = decode_value(&descriptor(AttributeType::String), "bjensen").unwrap();
        assert_eq!(decoded, ScimScalar::String("bjensen".to_string()));

        let decoded = decode_value(&descriptor(AttributeType::Boolean), "TRUE").unwrap();
        assert_eq!(decoded, ScimScalar::Boolean(true));

        let instant = Utc.with_ymd_and_hms(2011, 8, 1, 18, 29, 49).unwrap();
        let decoded =
            decode_value(&descriptor(AttributeType::DateTime), "2011-08-01T18:29:49Z").unwrap();
        assert_eq!(decoded, ScimScalar::DateTime(instant));

        let decoded = decode_value(&descriptor(AttributeType::Integer), "42").unwrap();
        assert_eq!(decoded, ScimScalar::Integer(42));

        let err = decode_value(&descriptor(AttributeType::Boolean), "maybe").unwrap_err();
        assert!(matches!(err, Error::MalformedValue(_)));
    }

    #[test]
    fn encode_dispatches_on_declared_type() {
        let encoded = encode_value(
            &descriptor(AttributeType::Boolean),
            &ScimScalar::Boolean(false),
        )
        .unwrap();
        assert_eq!(encoded, "false");

        let instant = Utc.with_ymd_and_hms(2011, 8, 1, 18, 29, 49).unwrap();
        let encoded = encode_value(
            &descriptor(AttributeType::DateTime),
            &ScimScalar::DateTime(instant),
        )
        .unwrap();
        assert_eq!(encoded, "2011-08-01T18:29:49Z");

        let bytes = vec![1u8, 2, 3];
        let encoded = encode_value(
            &descriptor(AttributeType::Binary),
            &ScimScalar::Binary(bytes.clone()),
        )
        .unwrap();
        assert_eq!(encoded, BASE64_STANDARD.encode(&bytes));

        // A value of the wrong kind is rejected against the declared type.
        let err = encode_value(
            &descriptor(AttributeType::String),
            &ScimScalar::Boolean(true),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedValue(_)));
    }

    #[test]
    fn decode_encode_round_trip_through_descriptor() {
        for (data_type, raw) in [
            (AttributeType::String, "b jensen"),
            (AttributeType::Boolean, "true"),
            (AttributeType::DateTime, "2011-08-01T18:29:49Z"),
            (AttributeType::Integer, "7"),
        ] {
            let descriptor = descriptor(data_type);
            let decoded = decode_value(&descriptor, raw).unwrap();
            assert_eq!(encode_value(&descriptor, &decoded).unwrap(), raw);
        }
    }

    #[test]
    fn complex_descriptor_has_no_scalar_form() {
        let descriptor = AttributeDescriptor::complex("name", Vec::new());
        assert!(decode_value(&descriptor, "x").is_err());
        assert!(encode_value(&descriptor, &ScimScalar::String("x".to_string())).is_err());
    }
}
