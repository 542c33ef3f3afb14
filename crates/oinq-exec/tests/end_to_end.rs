//! Façade to data source and back, against the in-memory source.

use std::sync::Arc;

use oinq_exec::{Element, Group, MockDataSource, Query, QueryError, QueryProvider, Record};
use oinq_ir::build::ExprExt;
use oinq_ir::{DataType, ExprError, FieldType, RecordType};
use oinq_pig::TranslateError;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, PartialEq, Deserialize)]
struct Person {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Age")]
    age: i64,
    #[serde(rename = "Email")]
    email: Option<String>,
}

impl Element for Person {
    fn data_type() -> DataType {
        DataType::Record(Self::record_type())
    }
}

impl Record for Person {
    fn record_type() -> RecordType {
        RecordType::new(
            "Person",
            vec![
                FieldType::new("Name", DataType::String),
                FieldType::new("Age", DataType::Int64),
                FieldType::new("Email", DataType::String).nullable(),
            ],
        )
    }
}

fn people(rows: Vec<Vec<Value>>) -> (Arc<MockDataSource>, Query<Person>) {
    let source = Arc::new(MockDataSource::new("people").with_rows(rows));
    let provider = Arc::new(QueryProvider::new(source.clone()));
    (source, Query::new(provider))
}

#[test]
fn test_filter_then_select_names() {
    let (source, people) = people(vec![vec![json!("Ann")], vec![json!("Bo")]]);
    let names = people
        .filter(|r| r.field("Age").gt(30))
        .select::<String>(|r| r.field("Name"));

    assert_eq!(names.to_vec().unwrap(), vec!["Ann".to_string(), "Bo".to_string()]);
    assert_eq!(
        source.received(),
        vec!["A = LOAD 'people'; B = FILTER A BY Age > 30; C = FOREACH B GENERATE Name; DUMP C;"]
    );
}

#[test]
fn test_null_field_maps_to_none() {
    let (_, people) = people(vec![
        vec![json!("Ann"), json!(31), Value::Null],
        vec![json!("Bo"), json!("42"), json!("bo@example.com")],
    ]);
    let without_email = people.filter(|r| r.field("Email").is_null());
    assert_eq!(
        without_email.rendered_text().unwrap(),
        "A = LOAD 'people'; B = FILTER A BY Email IS NULL; DUMP B;"
    );

    let rows = people.to_vec().unwrap();
    assert_eq!(
        rows,
        vec![
            Person {
                name: "Ann".to_string(),
                age: 31,
                email: None,
            },
            Person {
                name: "Bo".to_string(),
                age: 42,
                email: Some("bo@example.com".to_string()),
            },
        ]
    );
}

#[test]
fn test_executor_error_surfaces_unchanged() {
    let source = Arc::new(MockDataSource::new("people").failing("cluster unavailable"));
    let people: Query<Person> = Query::new(Arc::new(QueryProvider::new(source)));

    let err = people.to_vec().unwrap_err();
    assert!(matches!(err, QueryError::Executor(_)));
    assert_eq!(err.to_string(), "cluster unavailable");
}

#[test]
fn test_unsupported_combinator_renders_nothing() {
    let (source, people) = people(vec![]);
    let windowed = people.apply("window", vec![oinq_ir::build::lit(3)]);

    let err = windowed.rendered_text().unwrap_err();
    assert!(matches!(
        err,
        QueryError::Translate(TranslateError::UnsupportedOperation(ref op)) if op == "window"
    ));
    assert!(windowed.to_vec().is_err());
    assert!(source.received().is_empty());
}

#[test]
fn test_each_execution_translates_again() {
    let (source, people) = people(vec![vec![json!("Ann"), json!(31), Value::Null]]);
    let adults = people.filter(|r| r.field("Age").ge(18)).take(5);

    adults.to_vec().unwrap();
    adults.to_vec().unwrap();

    let received = source.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0], received[1]);
    assert_eq!(received[0], "A = LOAD 'people'; B = FILTER A BY Age >= 18; C = LIMIT B 5; DUMP C;");
}

#[test]
fn test_count() {
    let (_, people) = people(vec![vec![json!(7)]]);
    let count = people.filter(|r| r.field("Age").gt(30)).count();

    assert_eq!(
        count.rendered_text().unwrap(),
        "A = LOAD 'people'; B = FILTER A BY Age > 30; C = GROUP B ALL; \
         D = FOREACH C GENERATE COUNT(B) AS value; DUMP D;"
    );
    assert_eq!(count.get().unwrap(), Some(7));
}

#[test]
fn test_primitive_source_uses_positional_field() {
    let rows = vec![vec![json!(4)], vec![json!(9)]];
    let source = Arc::new(MockDataSource::new("nums").with_rows(rows));
    let provider = Arc::new(QueryProvider::new(source.clone()));
    let chain = oinq_ir::build::source("nums", DataType::Int64);
    let nums = Query::<i64>::from_chain(provider, chain).unwrap();

    assert_eq!(nums.filter(|x| x.gt(3)).to_vec().unwrap(), vec![4, 9]);
    assert_eq!(
        nums.sum::<i64>(|x| x.clone()).rendered_text().unwrap(),
        "A = LOAD 'nums'; B = GROUP A ALL; C = FOREACH B GENERATE SUM(A.$0) AS value; DUMP C;"
    );
    assert_eq!(source.received(), vec!["A = LOAD 'nums'; B = FILTER A BY $0 > 3; DUMP B;"]);
}

#[test]
fn test_first_on_empty_source() {
    let (_, people) = people(vec![]);
    let first = people.first_where(|r| r.field("Name").equals("Zed"));

    assert_eq!(
        first.rendered_text().unwrap(),
        "A = LOAD 'people'; B = FILTER A BY Name == 'Zed'; C = LIMIT B 1; DUMP C;"
    );
    assert_eq!(first.get().unwrap(), None);
}

#[derive(Debug, PartialEq, Deserialize)]
struct AgeCount {
    #[serde(rename = "Age")]
    age: i64,
    #[serde(rename = "Count")]
    count: i64,
}

impl Element for AgeCount {
    fn data_type() -> DataType {
        DataType::Record(RecordType::new(
            "AgeCount",
            vec![
                FieldType::new("Age", DataType::Int64),
                FieldType::new("Count", DataType::Int64),
            ],
        ))
    }
}

#[test]
fn test_group_then_count_per_key() {
    let (_, people) = people(vec![vec![json!(30), json!(2)], vec![json!(41), json!(1)]]);
    let shape = match AgeCount::data_type() {
        DataType::Record(record) => record,
        other => panic!("unexpected {other}"),
    };
    let counts = people
        .group_by::<i64>(|r| r.field("Age"))
        .select::<AgeCount>(|g| {
            oinq_ir::build::record_init(
                shape,
                vec![
                    ("Age", g.field("Key")),
                    ("Count", g.method("Count", vec![], DataType::Int64)),
                ],
            )
        });

    assert_eq!(
        counts.rendered_text().unwrap(),
        "A = LOAD 'people'; B = GROUP A BY Age; \
         C = FOREACH B GENERATE group AS Age, COUNT(A) AS Count; DUMP C;"
    );
    assert_eq!(
        counts.to_vec().unwrap(),
        vec![AgeCount { age: 30, count: 2 }, AgeCount { age: 41, count: 1 }]
    );
}

#[test]
fn test_groups_decode_with_elements() {
    let (_, people) = people(vec![vec![
        json!(30),
        json!([["Ann", 30, null], ["Cy", 30, "cy@example.com"]]),
    ]]);
    let groups: Vec<Group<i64, Person>> =
        people.group_by::<i64>(|r| r.field("Age")).to_vec().unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, 30);
    assert_eq!(groups[0].elements[1].email.as_deref(), Some("cy@example.com"));
}

#[test]
fn test_nested_average_as_scalar() {
    let (source, people) = people(vec![]);
    let average = people.average(|x| x.field("Age"));
    let older = people.filter(|r| r.field("Age").gt(average.expr()));

    assert!(older.to_vec().unwrap().is_empty());
    assert_eq!(
        source.received(),
        vec![
            "A = LOAD 'people'; B = LOAD 'people'; C = FOREACH B GENERATE Age; D = GROUP C ALL; \
             E = FOREACH D GENERATE AVG(C.Age) AS value; F = FILTER A BY Age > E.value; DUMP F;"
        ]
    );
}

#[test]
fn test_single_rejects_many_rows() {
    let (_, people) = people(vec![
        vec![json!("Ann"), json!(31), Value::Null],
        vec![json!("Bo"), json!(42), Value::Null],
    ]);

    let err = people.single().unwrap_err();
    assert!(matches!(err, QueryError::Argument(_)));
}

#[test]
fn test_bad_raw_field_is_a_type_mismatch() {
    let (_, people) = people(vec![vec![json!("Ann"), json!("old"), Value::Null]]);

    let err = people.to_vec().unwrap_err();
    assert!(matches!(
        err,
        QueryError::Translate(TranslateError::Expr(ExprError::TypeMismatch { .. }))
    ));
}

#[test]
fn test_display_names_the_chain() {
    let (_, people) = people(vec![]);
    assert_eq!(people.to_string(), "Query(Person)");
    assert_eq!(
        people.filter(|r| r.field("Age").gt(1)).take(3).to_string(),
        "people.Where.Take"
    );
}
