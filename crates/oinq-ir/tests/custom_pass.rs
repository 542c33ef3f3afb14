//! A pass written outside the crate, overriding a single hook.

use std::sync::Arc;

use oinq_ir::build::*;
use oinq_ir::walker::{walk_member, Rewriter};
use oinq_ir::{DataType, Expr, ExprError, FieldType, Member, Node, RecordType, Select};

/// Renames one record field wherever it is read.
struct RenameField<'a> {
    from: &'a str,
    to: &'a str,
    renamed: usize,
}

impl Rewriter for RenameField<'_> {
    type Error = ExprError;

    fn visit_member(&mut self, expr: &Expr, node: &Member) -> Result<Expr, ExprError> {
        let walked = walk_member(self, expr, node)?;
        match walked.as_ref() {
            Node::Member(m) if m.member == self.from => {
                self.renamed += 1;
                Ok(Node::Member(Member {
                    member: self.to.to_string(),
                    ..m.clone()
                })
                .into_expr())
            }
            _ => Ok(walked),
        }
    }
}

fn person() -> DataType {
    DataType::Record(RecordType::new(
        "Person",
        vec![
            FieldType::new("Name", DataType::String),
            FieldType::new("Age", DataType::Int64),
        ],
    ))
}

#[test]
fn test_rename_inside_lambda() {
    let predicate = lambda_with("r", person(), |r| {
        r.field("Age").gt(30).and(r.field("Name").not_equals("Bo"))
    });

    let mut pass = RenameField {
        from: "Age",
        to: "Years",
        renamed: 0,
    };
    let renamed = pass.visit(&predicate).unwrap();

    assert_eq!(pass.renamed, 1);
    assert!(!Arc::ptr_eq(&predicate, &renamed));
    assert!(oinq_ir::fingerprint(&renamed) != oinq_ir::fingerprint(&predicate));

    let Node::Lambda(lambda) = renamed.as_ref() else {
        panic!("expected a lambda, got {:?}", renamed.kind());
    };
    let Node::Binary(and) = lambda.body.as_ref() else {
        panic!("expected a conjunction");
    };
    let Node::Binary(gt) = and.left.as_ref() else {
        panic!("expected a comparison");
    };
    assert!(matches!(gt.left.as_ref(), Node::Member(m) if m.member == "Years"));
}

#[test]
fn test_untouched_tree_is_shared() {
    let projection = record_init(
        RecordType::new("Only", vec![FieldType::new("Name", DataType::String)]),
        vec![("Name", param("r", person()).field("Name"))],
    );

    let mut pass = RenameField {
        from: "Age",
        to: "Years",
        renamed: 0,
    };
    assert!(Arc::ptr_eq(&projection, &pass.visit(&projection).unwrap()));

    let select = Arc::new(Select::base("people", person()));
    assert!(Arc::ptr_eq(&select, &pass.visit_select(&select).unwrap()));
    assert_eq!(pass.renamed, 0);
}
