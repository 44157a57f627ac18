//! End-to-end tests for form state transitions and validation visibility.

use std::sync::Arc;

use form_engine::{
    build_path, parse_address, project, Action, FieldError, FieldPath, FieldTree, Form, FormState,
    JsonSchema, Outcome, Reducer, SelectOption, SourceReducer, Target, ValidationSchema,
    GENERAL_ERROR_KEY,
};
use serde_json::{json, Value};

fn tree(definition: Value) -> FieldTree {
    FieldTree::from_json(definition).unwrap()
}

fn require_non_empty(fields: &'static [&'static str]) -> ValidationSchema {
    ValidationSchema::from_fn(move |data| {
        fields
            .iter()
            .filter(|name| data[**name].as_str().map_or(true, str::is_empty))
            .map(|name| FieldError::new([*name], format!("{} is required", name)))
            .collect()
    })
}

fn update(field: &str, value: Value, schema: Option<ValidationSchema>) -> Action {
    Action::UpdateFieldValue {
        field: field.to_string(),
        value,
        schema,
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn update_clears_error_and_validates() {
        let reducer = Reducer::new(FormState::new(tree(json!({
            "projectName": { "type": "text", "value": "" },
            "dailyBudget": { "type": "number", "value": "" }
        }))));
        let state = reducer.reduce(
            &reducer.initial_state(),
            &update("projectName", json!("Foo"), Some(require_non_empty(&["projectName"]))),
        );

        assert_eq!(
            state.fields.get("projectName").unwrap().value(),
            Some(json!("Foo"))
        );
        assert!(!state.errors.contains_key("projectName"));
        assert!(state.is_valid);
    }

    #[test]
    fn array_paths_normalize_end_to_end() {
        let schema = JsonSchema::new(&json!({
            "type": "object",
            "properties": {
                "categoryGroups": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "minLength": 1 },
                            "cpc": { "type": "string", "minLength": 1 }
                        },
                        "required": ["name", "cpc"]
                    }
                }
            }
        }))
        .unwrap()
        .with_message("categoryGroups.*.cpc", "Max CPC is required");

        let mut form = Form::new(tree(json!({
            "categoryGroups": {
                "type": "array",
                "value": [{ "name": "", "cpc": "" }],
                "fields": {
                    "name": { "type": "text" },
                    "cpc": { "type": "number" }
                }
            }
        })))
        .with_schema(ValidationSchema::new(schema));

        form.update_field("categoryGroups[0].name", json!("Shoes"));
        form.mark_touched("categoryGroups[0].cpc");

        let errors = &form.state().errors;
        assert_eq!(errors["categoryGroups.0.cpc"], "Max CPC is required");
        assert!(!errors.contains_key("categoryGroups.0.name"));
        assert!(form.state().is_touched("categoryGroups.0.name"));
    }

    #[test]
    fn options_load_without_touching_validation() {
        let mut form = Form::new(tree(json!({
            "projectName": { "type": "text", "value": "" },
            "bidStrategy": { "type": "select", "value": "", "options": [] }
        })))
        .with_schema(require_non_empty(&["projectName"]));
        form.validate_field_on_blur("projectName");
        let errors = form.state().errors.clone();
        let is_valid = form.state().is_valid;

        form.set_field_loading("bidStrategy", true);
        assert!(form.state().fields.get("bidStrategy").unwrap().loading);
        form.update_field_options("bidStrategy", vec![SelectOption::new("a", "A")]);
        form.set_field_loading("bidStrategy", false);

        let node = form.state().fields.get("bidStrategy").unwrap();
        assert!(!node.loading);
        assert_eq!(node.options.as_ref().unwrap().len(), 1);
        assert_eq!(form.state().errors, errors);
        assert_eq!(form.state().is_valid, is_valid);
    }

    #[test]
    fn nested_group_address() {
        assert_eq!(
            build_path(&["targeting", "countries"], Target::Value),
            "fields.targeting.fields.countries.value"
        );
    }
}

mod properties {
    use super::*;

    fn nested() -> FieldTree {
        tree(json!({
            "a": { "type": "text", "value": "" },
            "g": {
                "type": "group",
                "fields": {
                    "b": { "type": "text", "value": "" },
                    "h": {
                        "type": "group",
                        "fields": {
                            "c": { "type": "number", "value": "" },
                            "i": {
                                "type": "group",
                                "fields": { "d": { "type": "date", "value": "" } }
                            }
                        }
                    }
                }
            },
            "other": {
                "type": "group",
                "fields": { "x": { "type": "text", "value": "keep" } }
            }
        }))
    }

    #[test]
    fn reduce_never_mutates_input_and_shares_siblings() {
        let reducer = Reducer::new(FormState::new(nested()));
        let before = reducer.initial_state();
        let snapshot = before.clone();

        let after = reducer.reduce(&before, &update("g.h.c", json!("7"), None));

        assert_eq!(before, snapshot);
        assert!(!after.fields.ptr_eq(&before.fields));
        assert!(after.fields.fields().same_node(before.fields.fields(), "other"));
        assert!(after.fields.fields().same_node(before.fields.fields(), "a"));
        assert!(!after.fields.fields().same_node(before.fields.fields(), "g"));
    }

    #[test]
    fn addresses_round_trip_at_every_depth() {
        let paths: [&[&str]; 4] = [&["a"], &["g", "b"], &["g", "h", "c"], &["g", "h", "i", "d"]];
        let mut fields = nested();
        for (n, parts) in paths.into_iter().enumerate() {
            let address = build_path(parts, Target::Value);
            let (segments, target) = parse_address(&address).unwrap();
            assert_eq!(target, Target::Value);

            let path = FieldPath::parse(&segments.join(".")).unwrap();
            let value = json!(format!("v{}", n));
            fields = fields.set_value(&path, value.clone()).unwrap();
            assert_eq!(fields.get_value(&path), Some(value.clone()));
            assert_eq!(fields.get_by_address(&address), Some(value));
        }
    }

    #[test]
    fn projection_omits_undefined() {
        let data = project(&tree(json!({
            "set": { "type": "text", "value": "x" },
            "unset": { "type": "text" },
            "g": { "type": "group", "fields": { "unset": { "type": "select" } } }
        })));
        assert_eq!(data, json!({ "set": "x", "g": {} }));
    }

    fn two_failing() -> (Reducer, ValidationSchema) {
        let reducer = Reducer::new(FormState::new(tree(json!({
            "a": { "type": "text", "value": "" },
            "b": { "type": "text", "value": "" }
        }))));
        (reducer, require_non_empty(&["a", "b"]))
    }

    #[test]
    fn identical_dispatches_give_identical_results() {
        let (reducer, schema) = two_failing();
        let action = update("a", json!(""), Some(schema));
        let start = reducer.initial_state();
        let first = reducer.reduce(&start, &action);
        let second = reducer.reduce(&start, &action);
        assert_eq!(first.errors, second.errors);
        assert_eq!(first.is_valid, second.is_valid);
    }

    #[test]
    fn only_touched_errors_are_displayed() {
        let (reducer, schema) = two_failing();
        let state = reducer.reduce(
            &reducer.initial_state(),
            &update("a", json!(""), Some(schema)),
        );
        assert!(state.errors.contains_key("a"));
        assert!(!state.errors.contains_key("b"));
        assert!(state.full_errors.contains_key("b"));
        assert!(!state.is_valid);
    }

    #[test]
    fn validate_all_displays_everything() {
        let (reducer, schema) = two_failing();
        let state = reducer.reduce(&reducer.initial_state(), &Action::SetValidateAll(true));
        let state = reducer.reduce(&state, &update("a", json!(""), Some(schema)));
        assert!(state.errors.contains_key("a"));
        assert!(state.errors.contains_key("b"));
    }

    struct OnlyReset;

    impl SourceReducer for OnlyReset {
        fn reduce(&self, state: &FormState, action: &Action) -> Outcome {
            match action {
                Action::Source { name, .. } if name == "CLEAR_TOUCHED" => {
                    let mut next = state.clone();
                    next.touched_fields.clear();
                    Outcome::Handled(next)
                }
                _ => Outcome::Unhandled,
            }
        }
    }

    #[test]
    fn source_reducer_handles_or_falls_through() {
        let reducer = Reducer::new(FormState::new(nested())).with_source(Arc::new(OnlyReset));
        let state = reducer.reduce(&reducer.initial_state(), &update("a", json!("x"), None));
        assert!(state.is_touched("a"));

        let cleared = reducer.reduce(
            &state,
            &Action::Source {
                name: "CLEAR_TOUCHED".into(),
                payload: Value::Null,
            },
        );
        assert!(cleared.touched_fields.is_empty());
        assert!(cleared.fields.ptr_eq(&state.fields));

        let untouched = reducer.reduce(
            &state,
            &Action::Source {
                name: "SOMETHING_ELSE".into(),
                payload: Value::Null,
            },
        );
        assert_eq!(untouched, state);
    }

    #[test]
    fn reset_copies_the_initial_snapshot() {
        let reducer = Reducer::new(FormState::new(nested()));
        let edited = reducer.reduce(&reducer.initial_state(), &update("g.b", json!("x"), None));

        let reset = reducer.reduce(&edited, &Action::ResetForm);
        assert_eq!(reset.fields, reducer.initial().fields);
        assert!(!reset.fields.ptr_eq(&reducer.initial().fields));
        assert!(!reset
            .fields
            .fields()
            .same_node(reducer.initial().fields.fields(), "g"));

        let _after = reducer.reduce(&reset, &update("g.b", json!("y"), None));
        assert_eq!(
            reducer.initial().fields.get_value(&FieldPath::parse("g.b").unwrap()),
            Some(json!(""))
        );
    }
}

mod failures {
    use super::*;

    #[test]
    fn write_through_missing_node_is_ignored() {
        let reducer = Reducer::new(FormState::new(tree(json!({
            "targeting": { "type": "group", "fields": {} }
        }))));
        let before = reducer.initial_state();
        let after = reducer.reduce(&before, &update("targeting.countries", json!(["us"]), None));
        assert_eq!(after, before);
    }

    #[test]
    fn panicking_schema_becomes_general_error() {
        let schema = ValidationSchema::from_fn(|_| -> Vec<FieldError> { panic!("bad schema") });
        let mut form = Form::new(tree(json!({ "a": { "type": "text", "value": "" } })))
            .with_schema(schema);
        form.update_field("a", json!("x"));

        let state = form.state();
        assert!(!state.is_valid);
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors.contains_key(GENERAL_ERROR_KEY));
        assert_eq!(state.fields.get("a").unwrap().value(), Some(json!("x")));
    }

    #[test]
    fn missing_schema_clears_only_the_edited_field() {
        let mut form = Form::new(tree(json!({
            "a": { "type": "text", "value": "" },
            "b": { "type": "text", "value": "" }
        })))
        .with_schema(require_non_empty(&["a", "b"]));
        form.set_validate_all(true);
        form.validate_field_on_blur("a");
        assert_eq!(form.state().errors.len(), 2);

        form.dispatch(update("a", json!("x"), None));
        assert!(!form.state().errors.contains_key("a"));
        assert!(form.state().errors.contains_key("b"));
        assert!(!form.state().is_valid);
    }
}
