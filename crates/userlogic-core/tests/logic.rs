use pretty_assertions::assert_eq;
use serde_json::{json, Value as Json};
use std::sync::atomic::{AtomicUsize, Ordering};
use userlogic_core::{
    build_logic_map, compile, eval_logic_map, CompileError, CompileOptions, CompileResult,
    Compiler, EvalResult, Evaluate, InheritingResolver, Logic, LogicNode, LogicOptions, Operations,
    Value,
};

fn check(definition: Json, context: Json, expected: Json) {
    let logic = Logic::new(&definition).unwrap();
    assert_eq!(logic.evaluate_json(&context).unwrap(), expected, "{definition}");
}

fn eval_map(definition: Json, context: Json) -> Json {
    let map = build_logic_map(&definition).unwrap();
    eval_logic_map(&map, &Value::from(context)).unwrap().to_json()
}

#[test]
fn evaluates_arrays() {
    check(json!(["$foo", "bar"]), json!({"foo": "test"}), json!(["test", "bar"]));
}

#[test]
fn reports_lookups_once_at_construction() {
    let mut lookups: Vec<Vec<String>> = Vec::new();
    let mut record = |path: &[String]| lookups.push(path.to_vec());
    let logic = Logic::with_options(
        &json!({"eq": ["$foo.test", 5]}),
        LogicOptions {
            report_lookup: Some(&mut record),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(lookups, vec![vec!["foo".to_string(), "test".to_string()]]);

    logic.evaluate_json(&json!({"foo": {"test": 5}})).unwrap();
    logic.evaluate_json(&json!({})).unwrap();
    assert_eq!(lookups.len(), 1);
}

#[test]
fn compiling_twice_is_deterministic() {
    let definition = json!({
        "object": {
            "greeting": "`Hi ${user.name}!`",
            "adult": {"gte": ["$user.age", 18]},
            "tags": {"split": ["$user.tags", ","]},
        }
    });
    let context = json!({"user": {"name": "ann", "age": 30, "tags": "a,b"}});
    let first = Logic::new(&definition).unwrap().evaluate_json(&context).unwrap();
    let second = Logic::new(&definition).unwrap().evaluate_json(&context).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, json!({"greeting": "Hi ann!", "adult": true, "tags": ["a", "b"]}));
}

#[test]
fn not_ops() {
    check(json!({"not": true}), json!({}), json!(false));
    check(json!({"not": false}), json!({}), json!(true));
}

#[test]
fn eq_ops() {
    check(json!({"eq": ["a", "b"]}), json!({}), json!(false));
    check(json!({"eq": ["a", "a"]}), json!({}), json!(true));
}

#[test]
fn and_ops() {
    check(json!({"and": [true, false]}), json!({}), json!(false));
    check(json!({"and": [true, true]}), json!({}), json!(true));
    check(json!({"and": [true, true, false]}), json!({}), json!(false));
}

#[test]
fn or_ops() {
    check(json!({"or": [false, false]}), json!({}), json!(false));
    check(json!({"or": [false, true]}), json!({}), json!(true));
    check(json!({"or": [true, true]}), json!({}), json!(true));
    check(json!({"or": [false, false, true]}), json!({}), json!(true));
}

static PROBES: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct Probe;

impl Evaluate for Probe {
    fn evaluate(&self, _context: &Value) -> EvalResult {
        PROBES.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Bool(true))
    }
}

fn op_probe(_definition: &Json, _compiler: &mut Compiler<'_>) -> CompileResult<LogicNode> {
    Ok(LogicNode::Custom(Box::new(Probe)))
}

#[test]
fn and_or_evaluate_every_operand() {
    let mut overrides = Operations::empty();
    overrides.register_extension("probe", op_probe);
    let build = |definition: Json| {
        Logic::with_options(
            &definition,
            LogicOptions {
                operations: Some(&overrides),
                ..Default::default()
            },
        )
        .unwrap()
    };

    let and = build(json!({"and": [false, {"probe": null}, false]}));
    let or = build(json!({"or": [true, {"probe": null}]}));

    let before = PROBES.load(Ordering::SeqCst);
    assert_eq!(and.evaluate_json(&json!({})).unwrap(), json!(false));
    assert_eq!(or.evaluate_json(&json!({})).unwrap(), json!(true));
    assert_eq!(PROBES.load(Ordering::SeqCst) - before, 2);
}

#[test]
fn literals() {
    check(json!({"literal": {"test": 4}}), json!({}), json!({"test": 4}));
    check(json!({"literal": {"test": [1, 2, 3]}}), json!({}), json!({"test": [1, 2, 3]}));
    check(json!({"literal": {"test": {"foo": [1, 2, 3]}}}), json!({}), json!({"test": {"foo": [1, 2, 3]}}));
    check(json!({"literal": {"test": {"$logic": {"or": [false, 5]}}}}), json!({}), json!({"test": 5}));
    check(json!({"literal": {"test": [{"$logic": {"or": [false, 5]}}]}}), json!({}), json!({"test": [5]}));
}

#[test]
fn value_templates() {
    check(json!("$foo.bar"), json!({"foo": {"bar": 5}}), json!(5));
    let logic = Logic::new(&json!("$foo.missing")).unwrap();
    assert_eq!(logic.evaluate(&Value::from(json!({"foo": {}}))).unwrap(), Value::Undefined);
}

#[test]
fn value_templates_with_inheritance() {
    let logic = Logic::with_options(
        &json!("$scope.theme"),
        LogicOptions {
            resolver: Some(std::sync::Arc::new(InheritingResolver::new("parent"))),
            ..Default::default()
        },
    )
    .unwrap();
    let context = json!({"scope": {"parent": {"theme": "dark"}}});
    assert_eq!(logic.evaluate_json(&context).unwrap(), json!("dark"));
}

#[test]
fn string_templates() {
    check(json!("`Yes ${foo.bar}!`"), json!({"foo": {"bar": 5}}), json!("Yes 5!"));
    check(json!("`Yes ${foo.baz}!`"), json!({"foo": {"bar": 5}}), json!("Yes ${foo.baz}!"));
}

#[test]
fn objects() {
    check(
        json!({"object": {"foo": {"not": 1}, "bar": {"and": [true, false]}}}),
        json!({}),
        json!({"foo": false, "bar": false}),
    );
}

#[test]
fn object_properties() {
    check(json!({"object-property": [{"literal": {"foo": {"bar": 3}}}, "foo"]}), json!({}), json!({"bar": 3}));
    check(json!({"object-property": [{"literal": {"foo": {"bar": 3}}}, "foo.bar"]}), json!({}), json!(3));
    check(json!({"object-property": [{"literal": {"foo": {"bar": 3}}}, "foo", "bar"]}), json!({}), json!(3));
    check(
        json!({"object-property": [{"literal": {"foo": {"bar": 3}}}, "$key", "bar"]}),
        json!({"key": "foo"}),
        json!(3),
    );
}

#[test]
fn ifs() {
    check(json!({"if": [true, "yup", "nope"]}), json!({}), json!("yup"));
    check(json!({"if": [false, "yup", "nope"]}), json!({}), json!("nope"));
    check(json!({"if": ["$missing", "yup", "nope"]}), json!({}), json!("nope"));
}

#[test]
fn maps() {
    check(json!({"map": [["one", "two"], "`${map.value}!`"]}), json!({}), json!(["one!", "two!"]));
    check(
        json!({"map": [{"literal": {"first": "one", "second": "two"}}, "`${map.key} ${map.value}!`"]}),
        json!({}),
        json!({"first": "first one!", "second": "second two!"}),
    );
    check(json!({"map": ["$items", "$map.index"]}), json!({"items": ["a", "b", "c"]}), json!([0, 1, 2]));
}

#[test]
fn string_utilities() {
    check(json!({"capitalize": "hello"}), json!({}), json!("Hello"));
    check(json!({"concat": ["$a", "b", 1]}), json!({"a": "a"}), json!("ab1"));
    check(json!({"split": ["a b c", " "]}), json!({}), json!(["a", "b", "c"]));
    check(json!({"join": [["a", "b"], "+"]}), json!({}), json!("a+b"));
    check(json!({"typeof": "$x"}), json!({"x": [1]}), json!("array"));
    check(json!({"typeof": "$nope"}), json!({}), json!("undefined"));
}

#[test]
fn comparisons() {
    check(json!({"gt": ["$n", 3]}), json!({"n": 4}), json!(true));
    check(json!({"gte": [3, 3]}), json!({}), json!(true));
    check(json!({"lt": ["a", "b"]}), json!({}), json!(true));
    check(json!({"lte": [2.5, 2]}), json!({}), json!(false));
}

#[test]
fn compile_errors() {
    assert_eq!(
        Logic::new(&json!("`unterminated")).unwrap_err(),
        CompileError::MalformedTemplate("`unterminated".to_string())
    );
    assert_eq!(
        Logic::new(&json!({"bogus": 1})).unwrap_err(),
        CompileError::UnknownOperation("bogus".to_string())
    );
}

#[test]
fn runtime_type_errors_abort_evaluation() {
    let logic = Logic::new(&json!({"object": {"ok": 1, "bad": {"capitalize": "$n"}}})).unwrap();
    assert!(logic.evaluate_json(&json!({"n": 5})).is_err());
}

#[test]
fn low_level_compile_uses_given_registry() {
    let mut ops = Operations::empty();
    ops.register("literal", userlogic_core::Operation::Builtin(userlogic_core::Builtin::Literal));
    let node = compile(
        &json!("text"),
        CompileOptions {
            operations: Some(&ops),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(node.evaluate(&Value::Null).unwrap(), Value::string("text"));

    let err = compile(
        &json!("$path"),
        CompileOptions {
            operations: Some(&ops),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err, CompileError::UnknownOperation("value-template".to_string()));
}

#[test]
fn simple_logic_maps() {
    let out = eval_map(
        json!({"foo": {"concat": ["$test", "b"]}, "bar": {"concat": ["$test", "c"]}}),
        json!({"test": "a"}),
    );
    assert_eq!(out, json!({"foo": "ab", "bar": "ac"}));
}

#[test]
fn logic_maps_with_top_level_logic() {
    let out = eval_map(
        json!({"$logic": {"object": {"foo": {"concat": ["$test", "b"]}, "bar": {"concat": ["$test", "c"]}}}}),
        json!({"test": "a"}),
    );
    assert_eq!(out, json!({"foo": "ab", "bar": "ac"}));
}

#[test]
fn logic_maps_with_a_value_template() {
    let out = eval_map(json!("$test"), json!({"test": {"foo": "ab", "bar": "ac"}}));
    assert_eq!(out, json!({"foo": "ab", "bar": "ac"}));
    assert_eq!(eval_map(json!("$test"), json!({"test": 1})), json!(1));
}

#[test]
fn logic_maps_with_conditional_values() {
    let out = eval_map(
        json!([
            {"spam": "foo"},
            {"if": {"eq": [5, 5]}, "ham": "bar"},
            {"if": {"eq": [5, 8]}, "eggs": "baz"},
        ]),
        json!({}),
    );
    assert_eq!(out, json!({"spam": "foo", "ham": "bar"}));
}

#[test]
fn results_keep_declared_key_order() {
    let logic = Logic::new(&json!({"object": {"zeta": 1, "alpha": {"concat": ["$a", "!"]}}})).unwrap();
    let out = logic.evaluate_json(&json!({"a": "x"})).unwrap();
    assert_eq!(serde_json::to_string(&out).unwrap(), r#"{"zeta":1,"alpha":"x!"}"#);

    let keyed = eval_map(json!({"zeta": "$b", "alpha": "$a"}), json!({"a": 1, "b": 2}));
    assert_eq!(serde_json::to_string(&keyed).unwrap(), r#"{"zeta":2,"alpha":1}"#);

    let merged = eval_map(json!([{"zeta": 1}, {"if": true, "alpha": 2, "zeta": 3}]), json!({}));
    assert_eq!(serde_json::to_string(&merged).unwrap(), r#"{"zeta":3,"alpha":2}"#);
}

#[test]
fn concat_prints_extreme_floats_in_exponent_form() {
    check(json!({"concat": ["$n", "|", "$m"]}), json!({"n": 1e21, "m": 1e-7}), json!("1e+21|1e-7"));
}
