use quarry::query::compiled::CompiledExpression;
use quarry::query::expr::{Expr, Placeholder};
use quarry::query::fragment::{Fragment, FragmentStore, FragmentTable};
use quarry::query::node::{BuildScope, BuildState, Selection, SelectionNode};
use quarry::query::operation::{Operation, QueryDocument};
use quarry::query::types::{RecordType, ValueType};
use quarry::query::value::{Record, Value};
use quarry::{CompilerOptions, QueryError};
use serde_json::json;

fn pet_ty() -> ValueType {
    RecordType::named("Pet")
        .with_field("name", ValueType::String)
        .into()
}

fn person_ty() -> ValueType {
    RecordType::named("Person")
        .with_field("name", ValueType::String)
        .with_field("age", ValueType::Int)
        .with_field("pet", pet_ty())
        .into()
}

fn root_ty() -> ValueType {
    RecordType::named("Query")
        .with_field("me", person_ty())
        .with_field("people", ValueType::list_of(person_ty()))
        .into()
}

fn person(name: &str, age: i64, pet: Option<&str>) -> Value {
    let pet = pet.map(|p| Value::from(Record::new().with("name", p)));
    Record::new()
        .with("name", name)
        .with("age", age)
        .with("pet", pet.unwrap_or(Value::Null))
        .into()
}

fn member(target: &Expr, name: &str) -> Expr {
    Expr::member(target.clone(), name).unwrap()
}

fn leaf(target: &Expr, name: &str) -> SelectionNode {
    SelectionNode::leaf(name, CompiledExpression::wrap(member(target, name)))
}

/// `fragment PersonFields on Person { name age }`
fn person_fields() -> Fragment {
    let ctx = Placeholder::new("person", person_ty());
    let this = Expr::param(&ctx);
    Fragment::new(
        "PersonFields",
        ctx,
        vec![leaf(&this, "name"), leaf(&this, "age")],
    )
}

/// `fragment WithPet on Person { name pet { name } }`
fn with_pet() -> Fragment {
    let ctx = Placeholder::new("person", person_ty());
    let this = Expr::param(&ctx);
    let pet_base = CompiledExpression::wrap(member(&this, "pet"));
    let pet_expr = pet_base.expr().clone();
    let pet = SelectionNode::new("pet", Some(pet_base), vec![leaf(&pet_expr, "name").into()])
        .unwrap();
    Fragment::new("WithPet", ctx, vec![leaf(&this, "name"), pet])
}

fn me_base(root: &Placeholder) -> CompiledExpression {
    CompiledExpression::wrap(member(&Expr::param(root), "me"))
}

fn people_base(root: &Placeholder) -> CompiledExpression {
    CompiledExpression::wrap(member(&Expr::param(root), "people"))
}

#[test]
fn scalar_spread_matches_handwritten_fields() {
    let root = Placeholder::new("root", root_ty());
    let mut store = FragmentStore::new();
    store.insert(person_fields()).unwrap();

    let me = me_base(&root);
    let me_expr = me.expr().clone();
    let mut manual = SelectionNode::new(
        "me",
        Some(me.clone()),
        vec![leaf(&me_expr, "name").into(), leaf(&me_expr, "age").into()],
    )
    .unwrap();
    let mut spread =
        SelectionNode::new("me", Some(me), vec![Selection::spread("PersonFields")]).unwrap();

    let mut scope = BuildScope::new(&store);
    let expected = manual.compiled_expression(&mut scope).unwrap().clone();
    let actual = spread.compiled_expression(&mut scope).unwrap().clone();

    assert_eq!(actual, expected);
    let names: Vec<_> = spread.fields().iter().map(SelectionNode::name).collect();
    assert_eq!(names, ["name", "age"]);
}

#[test]
fn collection_spread_is_rebased_onto_the_element() {
    let root = Placeholder::new("root", root_ty());
    let element = Placeholder::new("p", person_ty());
    let this = Expr::param(&element);
    let mut store = FragmentStore::new();
    store.insert(person_fields()).unwrap();

    let mut manual = SelectionNode::new(
        "people",
        Some(people_base(&root)),
        vec![leaf(&this, "name").into(), leaf(&this, "age").into()],
    )
    .unwrap()
    .with_element(element.clone());
    let mut spread = SelectionNode::new(
        "people",
        Some(people_base(&root)),
        vec![Selection::spread("PersonFields")],
    )
    .unwrap()
    .with_element(element)
    .with_required_parameters(vec![root.clone()]);

    let mut scope = BuildScope::new(&store);
    let expected = manual.compiled_expression(&mut scope).unwrap().clone();
    assert_eq!(spread.compiled_expression(&mut scope).unwrap(), &expected);

    let data = Value::from(
        Record::new().with("me", Value::Null).with(
            "people",
            vec![person("Ada", 36, None), person("Alan", 41, Some("Rex"))],
        ),
    );
    let result = spread.execute(&mut scope, &[data]).unwrap();
    assert_eq!(
        result.to_json(),
        json!([{"name": "Ada", "age": 36}, {"name": "Alan", "age": 41}])
    );
}

#[test]
fn fragment_is_unchanged_after_use_at_two_sites() {
    let root = Placeholder::new("root", root_ty());
    let mut store = FragmentStore::new();
    store.insert(with_pet()).unwrap();
    let template_before = store.lookup("WithPet").unwrap().clone();

    let mut me = SelectionNode::new("me", Some(me_base(&root)), vec![Selection::spread("WithPet")])
        .unwrap()
        .with_required_parameters(vec![root.clone()]);
    let mut people = SelectionNode::new(
        "people",
        Some(people_base(&root)),
        vec![Selection::spread("WithPet")],
    )
    .unwrap()
    .with_required_parameters(vec![root.clone()]);

    let mut scope = BuildScope::new(&store);
    let me_expr = me.compiled_expression(&mut scope).unwrap().clone();
    let people_expr = people.compiled_expression(&mut scope).unwrap().clone();

    let fragment = store.lookup("WithPet").unwrap();
    assert_eq!(fragment.fields().len(), 2);
    assert_eq!(fragment.fields()[1].state(), BuildState::Unbuilt);
    assert_eq!(
        fragment.fields()[1].base().map(CompiledExpression::expr),
        template_before.fields()[1].base().map(CompiledExpression::expr)
    );

    assert!(!me_expr.references(fragment.select_context()));
    assert!(!people_expr.references(fragment.select_context()));
    assert!(!me_expr.references(people.element().unwrap()));

    let data = Value::from(
        Record::new()
            .with("me", person("Ada", 36, Some("Tom")))
            .with("people", vec![person("Alan", 41, None)]),
    );
    assert_eq!(
        me.execute(&mut scope, std::slice::from_ref(&data))
            .unwrap()
            .to_json(),
        json!({"name": "Ada", "pet": {"name": "Tom"}})
    );
    assert_eq!(
        people.execute(&mut scope, &[data]).unwrap().to_json(),
        json!([{"name": "Alan", "pet": null}])
    );
}

#[test]
fn fragments_may_spread_other_fragments() {
    let root = Placeholder::new("root", root_ty());
    let outer_ctx = Placeholder::new("outer", person_ty());
    let outer_this = Expr::param(&outer_ctx);
    let nested = SelectionNode::new(
        "details",
        Some(CompiledExpression::wrap(outer_this.clone())),
        vec![Selection::spread("PersonFields")],
    )
    .unwrap();
    let outer = Fragment::new("Outer", outer_ctx, vec![leaf(&outer_this, "name"), nested]);

    let mut store = FragmentStore::new();
    store.insert(outer).unwrap();
    store.insert(person_fields()).unwrap();

    let mut me = SelectionNode::new("me", Some(me_base(&root)), vec![Selection::spread("Outer")])
        .unwrap()
        .with_required_parameters(vec![root.clone()]);
    let data = Value::from(
        Record::new()
            .with("me", person("Ada", 36, None))
            .with("people", Vec::<Value>::new()),
    );

    let result = me.execute(&mut BuildScope::new(&store), &[data]).unwrap();

    assert_eq!(
        result.to_json(),
        json!({"name": "Ada", "details": {"name": "Ada", "age": 36}})
    );
}

#[test]
fn same_fragment_twice_repeats_its_constants() {
    let ctx = Placeholder::new("person", person_ty());
    let this = Expr::param(&ctx);
    let tagged = Fragment::new(
        "Tagged",
        ctx,
        vec![
            leaf(&this, "name"),
            SelectionNode::leaf("kind", CompiledExpression::literal("human")),
        ],
    );
    let mut store = FragmentStore::new();
    store.insert(tagged).unwrap();

    let root = Placeholder::new("root", root_ty());
    let root_expr = Expr::param(&root);
    let me = SelectionNode::new("me", Some(me_base(&root)), vec![Selection::spread("Tagged")])
        .unwrap();
    let people = SelectionNode::new(
        "people",
        Some(people_base(&root)),
        vec![Selection::spread("Tagged")],
    )
    .unwrap();
    let mut query = SelectionNode::new(
        "query",
        Some(CompiledExpression::wrap(root_expr)),
        vec![me.into(), people.into()],
    )
    .unwrap()
    .with_required_parameters(vec![root.clone()]);

    let mut scope = BuildScope::new(&store);
    query.compiled_expression(&mut scope).unwrap();
    let constants = query.constant_parameters();
    assert_eq!(constants.len(), 2);
    assert_eq!(constants[0].0, constants[1].0);

    let data = Value::from(
        Record::new()
            .with("me", person("Ada", 36, None))
            .with("people", vec![person("Alan", 41, None)]),
    );
    let result = query.execute(&mut scope, &[data]).unwrap();
    assert_eq!(
        result.to_json(),
        json!({
            "me": {"name": "Ada", "kind": "human"},
            "people": [{"name": "Alan", "kind": "human"}]
        })
    );
}

#[test]
fn document_resolves_fragments_declared_after_use() {
    let root = Placeholder::new("root", root_ty());
    let mut op = Operation::new(Some("Profile".into()), root.clone());
    op.add_field(
        SelectionNode::new("me", Some(me_base(&root)), vec![Selection::spread("PersonFields")])
            .unwrap(),
    );

    let mut doc = QueryDocument::new();
    doc.add_operation(op);
    doc.add_fragment(person_fields()).unwrap();

    let data = Value::from(
        Record::new()
            .with("me", person("Ada", 36, None))
            .with("people", Vec::<Value>::new()),
    );
    let response = doc.execute(Some("Profile"), &data).unwrap();

    assert!(response.errors.is_empty());
    assert_eq!(
        response.to_json(),
        json!({"data": {"me": {"name": "Ada", "age": 36}}})
    );
}

#[test]
fn undeclared_fragment_fails_without_an_expression() {
    let root = Placeholder::new("root", root_ty());
    let mut me = SelectionNode::new("me", Some(me_base(&root)), vec![Selection::spread("Missing")])
        .unwrap();
    let store = FragmentStore::new();

    let err = me
        .compiled_expression(&mut BuildScope::new(&store))
        .unwrap_err();

    assert_eq!(
        err,
        QueryError::FragmentNotFound {
            name: "Missing".into()
        }
    );
    assert_eq!(me.state(), BuildState::Unbuilt);
    assert!(me.fields().is_empty());
}

#[test]
fn document_reports_fragment_cycles_per_field() {
    let a_ctx = Placeholder::new("a", person_ty());
    let b_ctx = Placeholder::new("b", person_ty());
    let a = Fragment::new(
        "A",
        a_ctx.clone(),
        vec![SelectionNode::new(
            "again",
            Some(CompiledExpression::wrap(Expr::param(&a_ctx))),
            vec![Selection::spread("B")],
        )
        .unwrap()],
    );
    let b = Fragment::new(
        "B",
        b_ctx.clone(),
        vec![SelectionNode::new(
            "back",
            Some(CompiledExpression::wrap(Expr::param(&b_ctx))),
            vec![Selection::spread("A")],
        )
        .unwrap()],
    );

    let root = Placeholder::new("root", root_ty());
    let mut op = Operation::new(None, root.clone());
    op.add_field(
        SelectionNode::new("me", Some(me_base(&root)), vec![Selection::spread("A")]).unwrap(),
    );
    op.add_field(SelectionNode::leaf(
        "count",
        CompiledExpression::literal(1_i64),
    ));
    let mut doc = QueryDocument::new();
    doc.add_fragment(a).unwrap();
    doc.add_fragment(b).unwrap();
    doc.add_operation(op);

    let data = Value::from(
        Record::new()
            .with("me", person("Ada", 36, None))
            .with("people", Vec::<Value>::new()),
    );
    let response = doc.execute(None, &data).unwrap();

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].field, "me");
    assert_eq!(response.errors[0].code, "FragmentCycle");
    assert!(response.errors[0].message.contains("A -> B -> A"));
    assert_eq!(response.to_json()["data"], json!({"me": null, "count": 1}));
}

#[test]
fn fragment_depth_limit_is_configurable() {
    let root = Placeholder::new("root", root_ty());
    let outer_ctx = Placeholder::new("outer", person_ty());
    let nested = SelectionNode::new(
        "details",
        Some(CompiledExpression::wrap(Expr::param(&outer_ctx))),
        vec![Selection::spread("PersonFields")],
    )
    .unwrap();
    let mut store = FragmentStore::new();
    store
        .insert(Fragment::new("Outer", outer_ctx, vec![nested]))
        .unwrap();
    store.insert(person_fields()).unwrap();
    let options = CompilerOptions {
        max_fragment_depth: 1,
        ..CompilerOptions::default()
    };

    let mut me = SelectionNode::new("me", Some(me_base(&root)), vec![Selection::spread("Outer")])
        .unwrap();
    let err = me
        .compiled_expression(&mut BuildScope::new(&store).with_options(&options))
        .unwrap_err();

    assert_eq!(
        err,
        QueryError::DepthExceeded {
            what: "fragment",
            max: 1
        }
    );
}

#[test]
fn document_applies_its_compiler_options() {
    let outer_ctx = Placeholder::new("outer", person_ty());
    let nested = SelectionNode::new(
        "details",
        Some(CompiledExpression::wrap(Expr::param(&outer_ctx))),
        vec![Selection::spread("PersonFields")],
    )
    .unwrap();
    let options = CompilerOptions::from_toml_str("max_fragment_depth = 1\n").unwrap();

    let root = Placeholder::new("root", root_ty());
    let mut op = Operation::new(None, root.clone());
    op.add_field(
        SelectionNode::new("me", Some(me_base(&root)), vec![Selection::spread("Outer")]).unwrap(),
    );
    op.add_field(
        SelectionNode::new(
            "direct",
            Some(me_base(&root)),
            vec![Selection::spread("PersonFields")],
        )
        .unwrap(),
    );
    let mut doc = QueryDocument::new().with_options(options);
    doc.add_fragment(Fragment::new("Outer", outer_ctx, vec![nested]))
        .unwrap();
    doc.add_fragment(person_fields()).unwrap();
    assert_eq!(doc.options().max_fragment_depth, 1);

    let data = Value::from(
        Record::new()
            .with("me", person("Ada", 36, None))
            .with("people", Vec::<Value>::new()),
    );
    let response = doc.execute(None, &data).unwrap();

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].field, "me");
    assert_eq!(response.errors[0].code, "DepthExceeded");
    assert_eq!(
        response.to_json()["data"],
        json!({"me": null, "direct": {"name": "Ada", "age": 36}})
    );
}
