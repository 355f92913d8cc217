use biograph::core::{Row, Scalar};
use biograph::execution::regroup::{expand, regroup, GroupedObject, Value};
use biograph::parsing::schema_config::{FieldSpec, SchemaRegistry};
use biograph::Error;

/// Person schema with a nested event list, each event carrying a place and
/// a list of related people.
fn person_schema() -> FieldSpec {
    let registry = SchemaRegistry::from_json_str(
        r#"{
            "people": {
                "id": "?person$anchor",
                "label": "?label",
                "events": {
                    "id": "?event$anchor$list",
                    "label": "?eventLabel",
                    "place": {"id": "?place", "label": "?placeLabel"},
                    "relations": {"id": "?other$anchor$list", "label": "?otherLabel"}
                }
            }
        }"#,
    )
    .unwrap();
    registry.get("people").unwrap().clone()
}

fn row(pairs: &[(&str, &str)]) -> Row {
    Row::from_pairs(pairs.iter().copied())
}

/// The join-exploded rows a SPARQL endpoint returns for two people, one of
/// them taking part in a birth and a wedding with a second participant.
fn exploded_rows() -> Vec<Row> {
    vec![
        row(&[
            ("person", "p1"),
            ("label", "Anna"),
            ("event", "e1"),
            ("eventLabel", "Birth of Anna"),
            ("place", "vienna"),
            ("placeLabel", "Vienna"),
        ]),
        row(&[
            ("person", "p1"),
            ("label", "Anna"),
            ("event", "e2"),
            ("eventLabel", "Wedding"),
            ("place", "graz"),
            ("placeLabel", "Graz"),
            ("other", "p2"),
            ("otherLabel", "Karl"),
        ]),
        row(&[
            ("person", "p1"),
            ("label", "Anna"),
            ("event", "e2"),
            ("eventLabel", "Wedding"),
            ("place", "graz"),
            ("placeLabel", "Graz"),
            ("other", "p3"),
            ("otherLabel", "Maria"),
        ]),
        row(&[("person", "p2"), ("label", "Karl")]),
    ]
}

fn ids(objects: &[&GroupedObject]) -> Vec<String> {
    objects.iter().map(|o| o.scalar("id").unwrap().to_string()).collect()
}

// ========================================================================
// Grouping
// ========================================================================

#[test]
fn test_person_event_scenario() {
    let people = regroup(&exploded_rows(), &person_schema(), None).unwrap();
    assert_eq!(people.len(), 2);

    let anna = &people[0];
    assert_eq!(anna.scalar("label"), Some(&Scalar::from("Anna")));

    let events = anna.get("events").unwrap().objects();
    assert_eq!(ids(&events), vec!["e1", "e2"]);

    let birth_place = events[0].get("place").unwrap();
    assert!(matches!(birth_place, Value::Object(_)));
    assert_eq!(birth_place.objects()[0].scalar("label"), Some(&Scalar::from("Vienna")));
    assert!(events[0].get("relations").is_none());

    let relations = events[1].get("relations").unwrap().objects();
    assert_eq!(ids(&relations), vec!["p2", "p3"]);
    assert_eq!(relations[1].scalar("label"), Some(&Scalar::from("Maria")));

    let karl = &people[1];
    assert_eq!(karl.scalar("id"), Some(&Scalar::from("p2")));
    assert!(karl.get("events").is_none());
}

#[test]
fn test_scalar_promotion() {
    let schema = FieldSpec::root(vec![FieldSpec::anchor("id", "id"), FieldSpec::scalar("label", "label")]);
    let rows = vec![row(&[("id", "a"), ("label", "X")]), row(&[("id", "a"), ("label", "Y")])];

    let objects = regroup(&rows, &schema, None).unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(
        objects[0].get("label"),
        Some(&Value::List(vec![Scalar::from("X"), Scalar::from("Y")]))
    );
}

#[test]
fn test_list_field_with_one_value_stays_a_list() {
    let schema = FieldSpec::root(vec![FieldSpec::anchor("id", "id"), FieldSpec::list("aliases", "alias")]);
    let rows = vec![row(&[("id", "a"), ("alias", "X")]), row(&[("id", "a"), ("alias", "X")])];

    let objects = regroup(&rows, &schema, None).unwrap();
    assert_eq!(objects[0].get("aliases"), Some(&Value::List(vec![Scalar::from("X")])));
}

#[test]
fn test_one_object_per_distinct_anchor() {
    let schema = FieldSpec::root(vec![FieldSpec::anchor("id", "id"), FieldSpec::scalar("n", "n")]);
    let rows: Vec<Row> = (0..30i64)
        .map(|i| Row::from_pairs([("id", Scalar::Integer(i % 7)), ("n", Scalar::Integer(i))]))
        .collect();

    let objects = regroup(&rows, &schema, None).unwrap();
    assert_eq!(objects.len(), 7);
    for object in &objects {
        let anchor = object.scalar("id").unwrap().as_i64().unwrap();
        for value in object.get("n").unwrap().scalars() {
            assert_eq!(value.as_i64().unwrap() % 7, anchor);
        }
    }
}

#[test]
fn test_typed_anchor_values_are_distinct() {
    let schema = FieldSpec::root(vec![FieldSpec::anchor("id", "id")]);
    let rows = vec![
        Row::from_pairs([("id", Scalar::Integer(1))]),
        Row::from_pairs([("id", Scalar::from("1"))]),
    ];
    assert_eq!(regroup(&rows, &schema, None).unwrap().len(), 2);
}

#[test]
fn test_empty_row_set_with_valid_schema() {
    assert!(regroup(&[], &person_schema(), None).unwrap().is_empty());
}

#[test]
fn test_misconfigured_schema_fails_even_for_empty_input() {
    let schema = FieldSpec::root(vec![
        FieldSpec::anchor("id", "a"),
        FieldSpec::anchor("other", "b"),
    ]);
    assert!(matches!(regroup(&[], &schema, None), Err(Error::SchemaConfig(_))));
}

// ========================================================================
// Inverse
// ========================================================================

#[test]
fn test_regroup_of_expanded_objects_is_stable() {
    let schema = person_schema();
    let grouped = regroup(&exploded_rows(), &schema, None).unwrap();
    let regrouped = regroup(&expand(&grouped, &schema), &schema, None).unwrap();
    assert_eq!(grouped, regrouped);
}

#[test]
fn test_expand_multiplies_list_fields() {
    let schema = FieldSpec::root(vec![
        FieldSpec::anchor("id", "id"),
        FieldSpec::scalar("label", "label"),
        FieldSpec::list("alias", "alias"),
    ]);
    let rows = vec![
        row(&[("id", "a"), ("label", "X"), ("alias", "1")]),
        row(&[("id", "a"), ("label", "Y"), ("alias", "2")]),
    ];
    let grouped = regroup(&rows, &schema, None).unwrap();
    assert_eq!(expand(&grouped, &schema).len(), 4);
}

// ========================================================================
// Serialization
// ========================================================================

#[test]
fn test_serialized_shape() {
    let people = regroup(&exploded_rows(), &person_schema(), None).unwrap();
    let json = serde_json::to_value(&people).unwrap();

    assert_eq!(json[0]["id"], "p1");
    assert_eq!(json[0]["events"][1]["place"]["label"], "Graz");
    assert_eq!(json[0]["events"][1]["relations"][0]["label"], "Karl");
    assert!(json[0].get("_additional_values").is_none());
    assert!(json[1].get("events").is_none());
}
