//! Render-shape tests: chains built by hand and checked against the exact
//! Pig Latin they produce.

use oinq_ir::build::*;
use oinq_ir::{DataType, Expr, ExprError, FieldType, RecordType};
use oinq_pig::{render, translate, Cardinality, RenderOptions, Terminal, TranslateError};

fn person() -> DataType {
    DataType::Record(RecordType::new(
        "Person",
        vec![
            FieldType::new("Name", DataType::String),
            FieldType::new("Age", DataType::Int64),
            FieldType::new("Email", DataType::String).nullable(),
        ],
    ))
}

fn summary() -> RecordType {
    RecordType::new(
        "Summary",
        vec![
            FieldType::new("Name", DataType::String),
            FieldType::new("Age", DataType::Int64),
        ],
    )
}

fn people() -> Expr {
    source("people", person())
}

fn element(chain: &Expr) -> DataType {
    chain.data_type().element_type().cloned().unwrap_or(DataType::Unknown)
}

fn with_lambda(
    chain: Expr,
    method: &str,
    body: impl FnOnce(&Expr) -> Expr,
    result: DataType,
) -> Expr {
    let lambda = lambda_with("r", element(&chain), body);
    call(None, method, vec![chain, lambda], result)
}

fn filter(chain: Expr, body: impl FnOnce(&Expr) -> Expr) -> Expr {
    let result = chain.data_type();
    with_lambda(chain, "Where", body, result)
}

fn select(chain: Expr, result: DataType, body: impl FnOnce(&Expr) -> Expr) -> Expr {
    with_lambda(chain, "Select", body, DataType::query(result))
}

fn order_by(chain: Expr, body: impl FnOnce(&Expr) -> Expr) -> Expr {
    let result = chain.data_type();
    with_lambda(chain, "OrderBy", body, result)
}

fn then_by(chain: Expr, body: impl FnOnce(&Expr) -> Expr) -> Expr {
    let result = chain.data_type();
    with_lambda(chain, "ThenBy", body, result)
}

fn take(chain: Expr, count: i64) -> Expr {
    let result = chain.data_type();
    call(None, "Take", vec![chain, lit(count)], result)
}

fn summarize(chain: Expr) -> Expr {
    select(chain, DataType::Record(summary()), |r| {
        record_init(summary(), vec![("Name", r.field("Name")), ("Age", r.field("Age"))])
    })
}

fn statement_kinds(text: &str) -> Vec<String> {
    text.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let op = s.split_once(" = ").map_or(s, |(_, body)| body);
            op.split_whitespace().next().unwrap_or_default().to_string()
        })
        .collect()
}

#[test]
fn test_filter_then_project() {
    let chain = select(filter(people(), |r| r.field("Age").gt(30)), DataType::String, |r| {
        r.field("Name")
    });

    assert_eq!(
        render(&chain).unwrap(),
        "A = LOAD 'people'; B = FILTER A BY Age > 30; C = FOREACH B GENERATE Name; DUMP C;"
    );
}

#[test]
fn test_statement_order_is_fixed() {
    type Step = fn(Expr) -> Expr;
    let by_age: Step = |c| filter(c, |r| r.field("Age").gt(30));
    let sort: Step = |c| order_by(c, |r| r.field("Age"));
    let project: Step = summarize;

    let orders: [[Step; 3]; 6] = [
        [by_age, sort, project],
        [by_age, project, sort],
        [sort, by_age, project],
        [sort, project, by_age],
        [project, by_age, sort],
        [project, sort, by_age],
    ];

    for steps in orders {
        let chain = take(steps.iter().fold(people(), |chain, step| step(chain)), 10);
        let text = render(&chain).unwrap();
        assert_eq!(
            statement_kinds(&text),
            vec!["LOAD", "FILTER", "FOREACH", "ORDER", "LIMIT", "DUMP"],
            "unexpected statements in {text}"
        );
    }
}

#[test]
fn test_filter_on_derived_column_wraps() {
    let shape = RecordType::new(
        "Next",
        vec![
            FieldType::new("Name", DataType::String),
            FieldType::new("Next", DataType::Int64),
        ],
    );
    let projected = select(people(), DataType::Record(shape.clone()), |r| {
        record_init(shape, vec![("Name", r.field("Name")), ("Next", r.field("Age").add(1))])
    });
    let chain = filter(projected, |r| r.field("Next").gt(30));

    let text = render(&chain).unwrap();
    assert_eq!(
        text,
        "A = LOAD 'people'; B = FOREACH A GENERATE Name, Age + 1 AS Next; \
         C = FILTER B BY Next > 30; D = FOREACH C GENERATE Name, Next; DUMP D;"
    );
    assert_eq!(text.matches("FOREACH").count(), 2);
}

#[test]
fn test_filter_on_renamed_column_merges() {
    let chain = filter(summarize(people()), |r| r.field("Age").ge(18));
    assert_eq!(
        render(&chain).unwrap(),
        "A = LOAD 'people'; B = FILTER A BY Age >= 18; C = FOREACH B GENERATE Name, Age; DUMP C;"
    );
}

#[test]
fn test_null_comparison_renders_is_null() {
    let chain = filter(people(), |r| r.field("Email").equals(null(DataType::String)));
    let translated = translate(&chain, &RenderOptions::default()).unwrap();
    assert_eq!(
        translated.text,
        "A = LOAD 'people'; B = FILTER A BY Email IS NULL; DUMP B;"
    );

    let chain = filter(people(), |r| r.field("Email").not_equals(null(DataType::String)));
    assert_eq!(
        render(&chain).unwrap(),
        "A = LOAD 'people'; B = FILTER A BY Email IS NOT NULL; DUMP B;"
    );
}

#[test]
fn test_unsupported_combinator() {
    let chain = call(None, "window", vec![people(), lit(3)], people().data_type());
    let err = render(&chain).unwrap_err();
    assert!(matches!(err, TranslateError::UnsupportedOperation(ref op) if op == "window"));
}

#[test]
fn test_multi_column_scalar_is_rejected() {
    let first = call(None, "First", vec![summarize(people())], DataType::Record(summary()));
    let chain = filter(people(), |r| r.field("Age").gt(&first));

    let err = translate(&chain, &RenderOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        TranslateError::Expr(ExprError::InvalidScalarSubquery { columns: 2 })
    ));
}

#[test]
fn test_scalar_subquery_renders_before_use() {
    let average = call(
        None,
        "Average",
        vec![people(), lambda_with("x", person(), |x| x.field("Age"))],
        DataType::Float64,
    );
    let chain = filter(people(), |r| r.field("Age").gt(&average));

    assert_eq!(
        render(&chain).unwrap(),
        "A = LOAD 'people'; B = LOAD 'people'; C = FOREACH B GENERATE Age; D = GROUP C ALL; \
         E = FOREACH D GENERATE AVG(C.Age) AS value; F = FILTER A BY Age > E.value; DUMP F;"
    );
}

#[test]
fn test_group_then_project() {
    let counts = RecordType::new(
        "AgeCount",
        vec![
            FieldType::new("Age", DataType::Int64),
            FieldType::new("Count", DataType::Int64),
        ],
    );
    let grouped = with_lambda(
        people(),
        "GroupBy",
        |r| r.field("Age"),
        DataType::query(DataType::grouping(DataType::Int64, person())),
    );
    let chain = select(grouped, DataType::Record(counts.clone()), |g| {
        record_init(
            counts,
            vec![
                ("Age", g.field("Key")),
                ("Count", g.method("Count", vec![], DataType::Int64)),
            ],
        )
    });

    assert_eq!(
        render(&chain).unwrap(),
        "A = LOAD 'people'; B = GROUP A BY Age; \
         C = FOREACH B GENERATE group AS Age, COUNT(A) AS Count; DUMP C;"
    );
}

#[test]
fn test_count_is_single_row() {
    let chain = call(
        None,
        "Count",
        vec![filter(people(), |r| r.field("Age").gt(30))],
        DataType::Int64,
    );
    let translated = translate(&chain, &RenderOptions::default()).unwrap();

    assert_eq!(
        translated.text,
        "A = LOAD 'people'; B = FILTER A BY Age > 30; C = GROUP B ALL; \
         D = FOREACH C GENERATE COUNT(B) AS value; DUMP D;"
    );
    assert_eq!(translated.cardinality, Cardinality::Single);
    assert_eq!(translated.projector.width(), 1);
}

#[test]
fn test_count_with_predicate_filters() {
    let chain = call(
        None,
        "Count",
        vec![people(), lambda_with("r", person(), |r| r.field("Age").gt(30))],
        DataType::Int64,
    );
    assert_eq!(
        render(&chain).unwrap(),
        "A = LOAD 'people'; B = FILTER A BY Age > 30; C = GROUP B ALL; \
         D = FOREACH C GENERATE COUNT(B) AS value; DUMP D;"
    );
}

fn nums() -> Expr {
    source("nums", DataType::Int64)
}

fn sum(chain: Expr, body: impl FnOnce(&Expr) -> Expr) -> Expr {
    with_lambda(chain, "Sum", body, DataType::Int64)
}

#[test]
fn test_primitive_rows_bind_to_positional_field() {
    assert_eq!(
        render(&filter(nums(), |x| x.gt(3))).unwrap(),
        "A = LOAD 'nums'; B = FILTER A BY $0 > 3; DUMP B;"
    );
    assert_eq!(
        render(&sum(nums(), |x| x.clone())).unwrap(),
        "A = LOAD 'nums'; B = GROUP A ALL; C = FOREACH B GENERATE SUM(A.$0) AS value; DUMP C;"
    );
    assert_eq!(
        render(&call(None, "Max", vec![take(nums(), 5)], DataType::Int64)).unwrap(),
        "A = LOAD 'nums'; B = LIMIT A 5; C = GROUP B ALL; \
         D = FOREACH C GENERATE MAX(B.$0) AS value; DUMP D;"
    );
}

#[test]
fn test_aggregate_needs_one_selected_column() {
    // The filter's implicit Age column must not stand in for the row.
    let identity = sum(filter(people(), |r| r.field("Age").gt(3)), |r| r.clone());
    let err = render(&identity).unwrap_err();
    assert!(matches!(err, TranslateError::Expr(ExprError::Argument(_))));

    let pair = sum(people(), |r| {
        record_init(summary(), vec![("Name", r.field("Name")), ("Age", r.field("Age"))])
    });
    let err = render(&pair).unwrap_err();
    assert!(matches!(err, TranslateError::Expr(ExprError::Argument(_))));

    let bare = call(None, "Sum", vec![people()], DataType::Int64);
    let err = render(&bare).unwrap_err();
    assert!(matches!(err, TranslateError::Expr(ExprError::Argument(_))));
}

#[test]
fn test_record_row_is_not_a_value() {
    let chain = filter(people(), |r| r.equals(lit("Ann")));
    let err = render(&chain).unwrap_err();
    assert!(matches!(err, TranslateError::Expr(ExprError::Argument(_))));
}

#[test]
fn test_projection_dropping_sort_key_wraps() {
    let chain = select(order_by(people(), |r| r.field("Age")), DataType::String, |r| {
        r.field("Name")
    });
    assert_eq!(
        render(&chain).unwrap(),
        "A = LOAD 'people'; B = ORDER A BY Age ASC; C = FOREACH B GENERATE Name; DUMP C;"
    );
}

// A filter after a limit must not move ahead of it, so this chain keeps
// LIMIT before FILTER. The fixed order holds for clauses that merge.
#[test]
fn test_limits_keep_minimum_and_filter_after_limit_wraps() {
    let chain = filter(take(take(people(), 10), 3), |r| r.field("Age").gt(30));
    assert_eq!(
        render(&chain).unwrap(),
        "A = LOAD 'people'; B = LIMIT A 3; C = FILTER B BY Age > 30; DUMP C;"
    );
}

#[test]
fn test_then_by_appends() {
    let chain = then_by(order_by(people(), |r| r.field("Age")), |r| r.field("Name"));
    assert_eq!(
        render(&chain).unwrap(),
        "A = LOAD 'people'; B = ORDER A BY Age ASC, Name ASC; DUMP B;"
    );

    let err = render(&then_by(people(), |r| r.field("Name"))).unwrap_err();
    assert!(matches!(err, TranslateError::Expr(ExprError::Argument(_))));
}

#[test]
fn test_order_by_computed_expression() {
    let chain = order_by(people(), |r| r.field("Age").add(1));
    let err = render(&chain).unwrap_err();
    assert!(matches!(
        err,
        TranslateError::UnsupportedOperation(ref op) if op == "order by computed expression"
    ));
}

#[test]
fn test_literal_type_mismatch() {
    let chain = filter(people(), |r| r.field("Age").gt("thirty"));
    let err = render(&chain).unwrap_err();
    assert!(matches!(
        err,
        TranslateError::Expr(ExprError::TypeMismatch { ref target, .. }) if target == "Age"
    ));
}

#[test]
fn test_store_terminal() {
    let options = RenderOptions {
        terminal: Terminal::Store("out/adults".to_string()),
        separator: "\n".to_string(),
    };
    let chain = filter(people(), |r| r.field("Age").ge(18));
    let translated = translate(&chain, &options).unwrap();
    assert_eq!(
        translated.text,
        "A = LOAD 'people';\nB = FILTER A BY Age >= 18;\nSTORE B INTO 'out/adults';"
    );
}
