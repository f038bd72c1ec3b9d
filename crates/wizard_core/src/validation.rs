use std::collections::HashMap;

use shared::protocol::FieldError;

/// Turn the remote `{param, msg}` list into the keyed lookup the per-step
/// renderers consume. Callers replace their previous map with the returned
/// one on every submission attempt so stale entries never leak between
/// attempts; when a param repeats, the later message wins.
pub fn build_validation_error_map(errors: &[FieldError]) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(errors.len());
    for error in errors {
        map.insert(error.param.clone(), error.msg.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_error(param: &str, msg: &str) -> FieldError {
        FieldError {
            param: param.into(),
            msg: msg.into(),
        }
    }

    #[test]
    fn empty_input_yields_empty_map() {
        assert!(build_validation_error_map(&[]).is_empty());
    }

    #[test]
    fn last_message_wins_for_a_repeated_param() {
        let map = build_validation_error_map(&[
            field_error("name", "required"),
            field_error("name", "too short"),
        ]);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("name").map(String::as_str), Some("too short"));
    }

    #[test]
    fn distinct_params_map_independently() {
        let map = build_validation_error_map(&[
            field_error("startDate", "required"),
            field_error("endDate", "must be after start"),
        ]);

        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get("endDate").map(String::as_str),
            Some("must be after start")
        );
    }
}
