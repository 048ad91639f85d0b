use json::JsonValue;
use palette::Srgb;

use crate::error::ValidationError;

const MESSAGE_TYPE: &str = "colorsend";

/// A color event as delivered by a trigger source. Only constructible from a
/// payload that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    pub north_color: Srgb<u8>,
    pub south_color: Srgb<u8>,
    pub result_color: Srgb<u8>,
}

impl TriggerEvent {
    pub fn new(north_color: Srgb<u8>, south_color: Srgb<u8>, result_color: Srgb<u8>) -> Self {
        TriggerEvent {
            north_color,
            south_color,
            result_color,
        }
    }

    pub fn parse(payload: &str) -> Result<TriggerEvent, ValidationError> {
        let json = json::parse(payload)?;
        TriggerEvent::try_from(&json)
    }
}

impl TryFrom<&JsonValue> for TriggerEvent {
    type Error = ValidationError;

    fn try_from(json: &JsonValue) -> Result<Self, Self::Error> {
        if !json.is_object() {
            return Err(ValidationError::NotAnObject);
        }

        if json.has_key("type") {
            match json["type"].as_str() {
                Some(MESSAGE_TYPE) => {}
                Some(other) => return Err(ValidationError::UnknownType(other.to_string())),
                None => return Err(ValidationError::UnknownType(json["type"].dump())),
            }
        }

        Ok(TriggerEvent {
            north_color: parse_color(json, "north_color")?,
            south_color: parse_color(json, "south_color")?,
            result_color: parse_color(json, "result_color")?,
        })
    }
}

fn parse_color(json: &JsonValue, field: &'static str) -> Result<Srgb<u8>, ValidationError> {
    if !json.has_key(field) {
        return Err(ValidationError::MissingField(field));
    }

    let value = &json[field];
    let channels = if value.is_array() {
        if value.len() != 3 {
            return Err(ValidationError::WrongShape(field));
        }
        [&value[0], &value[1], &value[2]]
    } else if value.is_object() {
        if !value.has_key("r") || !value.has_key("g") || !value.has_key("b") {
            return Err(ValidationError::WrongShape(field));
        }
        [&value["r"], &value["g"], &value["b"]]
    } else {
        return Err(ValidationError::WrongShape(field));
    };

    let r = parse_channel(channels[0], field)?;
    let g = parse_channel(channels[1], field)?;
    let b = parse_channel(channels[2], field)?;
    Ok(Srgb::new(r, g, b))
}

fn parse_channel(value: &JsonValue, field: &'static str) -> Result<u8, ValidationError> {
    let invalid = || ValidationError::InvalidChannel {
        field,
        value: value.dump(),
    };

    // Only integral numbers count; 12.5 or "12" are rejected rather than coerced.
    let number = value.as_f64().ok_or_else(invalid)?;
    if number.fract() != 0.0 || !(0.0..=255.0).contains(&number) {
        return Err(invalid());
    }

    Ok(number as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_colors() {
        let event = TriggerEvent::parse(
            r#"{"north_color": [255, 0, 0], "south_color": [0, 255, 0], "result_color": [0, 0, 255]}"#,
        )
        .unwrap();

        assert_eq!(event.north_color, Srgb::new(255, 0, 0));
        assert_eq!(event.south_color, Srgb::new(0, 255, 0));
        assert_eq!(event.result_color, Srgb::new(0, 0, 255));
    }

    #[test]
    fn parses_object_colors_and_type() {
        let event = TriggerEvent::parse(
            r#"{"type": "colorsend",
                "north_color": {"r": 1, "g": 2, "b": 3},
                "south_color": [4, 5, 6],
                "result_color": {"r": 7, "g": 8, "b": 9}}"#,
        )
        .unwrap();

        assert_eq!(event.north_color, Srgb::new(1, 2, 3));
        assert_eq!(event.result_color, Srgb::new(7, 8, 9));
    }

    #[test]
    fn rejects_missing_field() {
        let err = TriggerEvent::parse(r#"{"north_color": [0, 0, 0], "result_color": [0, 0, 0]}"#)
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("south_color")));
    }

    #[test]
    fn rejects_bad_shapes() {
        let cases = [
            r#"{"north_color": [0, 0], "south_color": [0, 0, 0], "result_color": [0, 0, 0]}"#,
            r#"{"north_color": "red", "south_color": [0, 0, 0], "result_color": [0, 0, 0]}"#,
            r#"{"north_color": {"r": 0, "g": 0}, "south_color": [0, 0, 0], "result_color": [0, 0, 0]}"#,
        ];
        for payload in cases {
            let err = TriggerEvent::parse(payload).unwrap_err();
            assert!(
                matches!(err, ValidationError::WrongShape("north_color")),
                "{payload}: {err}"
            );
        }
    }

    #[test]
    fn rejects_bad_channels() {
        let cases = [
            r#"{"north_color": [0, 0, 256], "south_color": [0, 0, 0], "result_color": [0, 0, 0]}"#,
            r#"{"north_color": [0, -1, 0], "south_color": [0, 0, 0], "result_color": [0, 0, 0]}"#,
            r#"{"north_color": [0.5, 0, 0], "south_color": [0, 0, 0], "result_color": [0, 0, 0]}"#,
            r#"{"north_color": ["0", 0, 0], "south_color": [0, 0, 0], "result_color": [0, 0, 0]}"#,
        ];
        for payload in cases {
            let err = TriggerEvent::parse(payload).unwrap_err();
            assert!(
                matches!(err, ValidationError::InvalidChannel { field: "north_color", .. }),
                "{payload}: {err}"
            );
        }
    }

    #[test]
    fn rejects_non_objects_and_foreign_types() {
        assert!(matches!(
            TriggerEvent::parse("[1, 2, 3]").unwrap_err(),
            ValidationError::NotAnObject
        ));
        assert!(matches!(
            TriggerEvent::parse("{not json").unwrap_err(),
            ValidationError::Json(_)
        ));
        assert!(matches!(
            TriggerEvent::parse(r#"{"type": "colorcollide"}"#).unwrap_err(),
            ValidationError::UnknownType(_)
        ));
    }
}
