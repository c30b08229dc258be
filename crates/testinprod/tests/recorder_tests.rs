//! End-to-end tests: instrument a class, call it, inspect the generated module.

use std::{cell::RefCell, rc::Rc};

use pretty_assertions::assert_eq;
use testinprod::{
    ClassDef, CollectStringWriter, ConstructorRegistry, ExcType, Exception, FileWriter, FunctionId,
    InstrumentOptions, Instrumenter, Record, RecordingTracer, ScriptedPrompt, TraceEvent, Value, VariantKind,
    instrument, parse_literal,
};

fn calculator() -> ClassDef {
    ClassDef::new("Calculator")
        .method("add", ["a", "b"], |args, _| match args {
            [Value::Int(a), Value::Int(b)] => Ok(Value::Int(a + b)),
            [Value::Text(a), Value::Text(b)] => Ok(Value::Text(format!("{a}{b}"))),
            _ => Err(Exception::new(ExcType::TypeError, "unsupported operand type(s) for +")),
        })
        .method("div", ["a", "b"], |args, _| match args {
            [_, Value::Int(0)] => Err(Exception::new(ExcType::ZeroDivisionError, "division by zero")),
            [Value::Int(a), Value::Int(b)] => Ok(Value::Int(a / b)),
            _ => Err(Exception::new(ExcType::TypeError, "unsupported operand type(s) for /")),
        })
}

fn greeter() -> ClassDef {
    ClassDef::new("Greeter")
        .method("greet", ["person"], |args, _| {
            let name = args[0].get_attr("name")?;
            Ok(Value::from(format!("Hi {name}")))
        })
        .method("greet_all", ["people"], |args, _| {
            let mut greetings = Vec::new();
            for person in args[0].iterate()? {
                greetings.push(Value::from(format!("Hi {}", person.get_attr("name")?)));
            }
            Ok(Value::List(greetings))
        })
}

fn helper_class() -> ClassDef {
    ClassDef::new("HelperClass")
        .constructor(["number"], |args, _| {
            let number = args.first().cloned().unwrap_or(Value::Int(6));
            Ok(Value::object(
                Record::new("HelperClass").with_attr("hello", Value::List(vec![number])),
            ))
        })
        .method("my_func", ["self", "lst"], |args, _| {
            let Value::List(mut items) = args[1].clone() else {
                return Err(Exception::new(ExcType::TypeError, "lst must be a list"));
            };
            if let Value::List(hello) = args[0].get_attr("hello")? {
                items.extend(hello);
            }
            Ok(Value::List(items))
        })
}

fn person(name: &str) -> Value {
    Value::object(Record::new("Person").with_attr("name", name))
}

#[test]
fn literal_call_becomes_one_assertion() {
    let calculator = instrument(calculator(), InstrumentOptions::default());

    let out = calculator.call("add", &[Value::Int(2), Value::Int(3)], &[]).unwrap();

    assert_eq!(out, Value::Int(5));
    assert_eq!(
        calculator.module_text(),
        "\
from unittest.mock import MagicMock, Mock, call
from calculator import Calculator


class TestCalculator(object):
    def test_add_1(self):
        assert 5 == Calculator.add(2, 3)
"
    );
}

#[test]
fn empty_module_has_a_placeholder_body() {
    let calculator = instrument(calculator(), InstrumentOptions::default().module_path("app.calc"));
    assert_eq!(
        calculator.module_text(),
        "\
from unittest.mock import MagicMock, Mock, call
from app.calc import Calculator


class TestCalculator(object):
    pass
"
    );
}

#[test]
fn only_successful_calls_become_cases() {
    let calculator = instrument(calculator(), InstrumentOptions::default());
    calculator
        .call("add", &[Value::from("a")], &[("b".to_owned(), Value::from("b"))])
        .unwrap_err();
    calculator.call("add", &[Value::from("a"), Value::from("b")], &[]).unwrap();

    let cases = calculator.cases();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].body, vec!["assert 'ab' == Calculator.add('a', 'b')"]);
}

#[test]
fn opaque_argument_becomes_a_mock() {
    let greeter = instrument(greeter(), InstrumentOptions::default());

    let out = greeter.call("greet", &[person("Al")], &[]).unwrap();

    assert_eq!(out, Value::from("Hi Al"));
    let cases = greeter.cases();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].name, "test_greet_1");
    assert_eq!(
        cases[0].body,
        vec!["person = Mock(name='Al')", "assert 'Hi Al' == Greeter.greet(person)"]
    );
}

#[test]
fn iterated_argument_renders_inline() {
    let greeter = instrument(greeter(), InstrumentOptions::default());
    let people = Value::List(vec![person("Al"), person("Bo")]);

    let out = greeter.call("greet_all", &[people], &[]).unwrap();

    assert_eq!(out, Value::List(vec![Value::from("Hi Al"), Value::from("Hi Bo")]));
    assert_eq!(
        greeter.cases()[0].body,
        vec![
            "people_0 = Mock(name='Al')",
            "people_1 = Mock(name='Bo')",
            "assert ['Hi Al', 'Hi Bo'] == Greeter.greet_all([people_0, people_1])",
        ]
    );
}

#[test]
fn caller_gets_the_real_objects_back() {
    let echo = instrument(
        ClassDef::new("Echo").method("echo", ["value"], |args, _| Ok(args[0].clone())),
        InstrumentOptions::default(),
    );
    let original = person("Al");

    let out = echo.call("echo", &[original.clone()], &[]).unwrap();

    assert!(matches!(out, Value::Object(_)));
    assert_eq!(out, original);
}

#[test]
fn identical_calls_are_emitted_once() {
    let tracer = Rc::new(RefCell::new(RecordingTracer::new()));
    let calculator = Instrumenter::new(InstrumentOptions::default())
        .tracer(Rc::clone(&tracer))
        .instrument(calculator());

    calculator.call("add", &[Value::Int(2), Value::Int(3)], &[]).unwrap();
    let module = calculator.module_text();
    calculator.call("add", &[Value::Int(2), Value::Int(3)], &[]).unwrap();

    assert_eq!(calculator.log().len(), 2);
    assert_eq!(calculator.module_text(), module);
    let function = FunctionId::new("Calculator", "add");
    assert_eq!(
        tracer.borrow().events(),
        &[
            TraceEvent::CallRecorded {
                function: function.clone(),
                index: 0
            },
            TraceEvent::CaseEmitted {
                name: "test_add_1".to_owned(),
                variant: None
            },
            TraceEvent::ModuleWritten {
                class_name: "Calculator".to_owned(),
                cases: 1
            },
            TraceEvent::CallRecorded {
                function: function.clone(),
                index: 1
            },
            TraceEvent::DuplicateSkipped { function, variant: None },
            TraceEvent::ModuleWritten {
                class_name: "Calculator".to_owned(),
                cases: 1
            },
        ]
    );
}

#[test]
fn successful_call_writes_the_module_once() {
    let writer = Rc::new(RefCell::new(CollectStringWriter::new()));
    let calculator = Instrumenter::new(InstrumentOptions::default())
        .writer(Rc::clone(&writer))
        .instrument(calculator());

    calculator.call("add", &[Value::Int(2), Value::Int(3)], &[]).unwrap();

    let writer = writer.borrow();
    assert_eq!(writer.writes(), 1);
    assert_eq!(writer.output(), Some(calculator.module_text().as_str()));
}

#[test]
fn failed_calls_record_nothing() {
    let writer = Rc::new(RefCell::new(CollectStringWriter::new()));
    let calculator = Instrumenter::new(InstrumentOptions::default())
        .writer(Rc::clone(&writer))
        .instrument(calculator());

    let err = calculator.call("div", &[Value::Int(1), Value::Int(0)], &[]).unwrap_err();

    assert_eq!(err.exc_type(), ExcType::ZeroDivisionError);
    assert!(calculator.log().is_empty());
    assert!(calculator.cases().is_empty());
    assert_eq!(writer.borrow().writes(), 0);
}

#[test]
fn unknown_method_is_an_attribute_error() {
    let calculator = instrument(calculator(), InstrumentOptions::default());
    let err = calculator.call("pow", &[Value::Int(2)], &[]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::AttributeError);
    assert!(calculator.log().is_empty());
}

#[test]
fn thorough_mode_adds_variants() {
    let calculator = instrument(calculator(), InstrumentOptions::default().thorough(true));

    calculator.call("add", &[Value::Int(2), Value::Int(3)], &[]).unwrap();

    let cases = calculator.cases();
    let names: Vec<&str> = cases.iter().map(|case| case.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "test_add_1",
            "test_add_fuzz_1",
            "test_add_fuzz_2",
            "test_add_fuzz_3",
            "test_add_metamorphic_1",
            "test_add_metamorphic_2",
            "test_add_fuzz_4",
            "test_add_fuzz_5",
            "test_add_fuzz_6",
            "test_add_metamorphic_3",
            "test_add_metamorphic_4",
        ]
    );
    assert_eq!(cases[3].variant, Some(VariantKind::Fuzz));
    assert_eq!(
        cases[3].body,
        vec![
            "try:",
            "    Calculator.add('', 3)",
            "except (AttributeError, IndexError, KeyError, TypeError, ValueError, ZeroDivisionError):",
            "    pass",
        ]
    );
    assert_eq!(cases[4].body[1], "    Calculator.add(-2, 3)");
    assert_eq!(cases[5].body[1], "    Calculator.add(4, 3)");
    assert_eq!(cases[10].body[1], "    Calculator.add(2, 6)");
}

#[test]
fn variants_keep_the_mock_setup() {
    let greeter = ClassDef::new("Greeter").method("greet", ["person", "greeting"], |args, _| {
        Ok(Value::from(format!("{} {}", args[1], args[0].get_attr("name")?)))
    });
    let greeter = instrument(greeter, InstrumentOptions::default().thorough(true));

    greeter.call("greet", &[person("Al"), Value::from("Hi")], &[]).unwrap();

    let cases = greeter.cases();
    let metamorphic: Vec<&str> = cases
        .iter()
        .filter(|case| case.variant == Some(VariantKind::Metamorphic))
        .map(|case| case.body[2].as_str())
        .collect();
    assert_eq!(
        metamorphic,
        vec![
            "    Greeter.greet(person, '')",
            "    Greeter.greet(person, 'hi')",
            "    Greeter.greet(person, 'HI')",
        ]
    );
    assert!(cases.iter().skip(1).all(|case| case.body[0] == "person = Mock(name='Al')"));
}

#[test]
fn call_matching_an_earlier_variant_gets_a_baseline() {
    let tracer = Rc::new(RefCell::new(RecordingTracer::new()));
    let calculator = Instrumenter::new(InstrumentOptions::default().thorough(true))
        .tracer(Rc::clone(&tracer))
        .instrument(calculator());

    calculator.call("add", &[Value::Int(2), Value::Int(3)], &[]).unwrap();
    let before = calculator.cases().len();
    // 2 + 6 was already emitted as a metamorphic variant, without an expected value
    calculator.call("add", &[Value::Int(2), Value::Int(6)], &[]).unwrap();

    let cases = calculator.cases();
    assert_eq!(cases.len(), before + 8);
    assert_eq!(cases[before].name, "test_add_2");
    assert_eq!(cases[before].body, vec!["assert 8 == Calculator.add(2, 6)"]);
    let function = FunctionId::new("Calculator", "add");
    let tracer = tracer.borrow();
    assert!(!tracer.events().contains(&TraceEvent::DuplicateSkipped {
        function: function.clone(),
        variant: None,
    }));
    // the fuzz substitutions of the second argument are the same as before
    let skipped = tracer
        .events()
        .iter()
        .filter(|event| {
            **event
                == TraceEvent::DuplicateSkipped {
                    function: function.clone(),
                    variant: Some(VariantKind::Fuzz),
                }
        })
        .count();
    assert_eq!(skipped, 3);
}

#[test]
fn variant_matching_an_earlier_call_is_skipped() {
    let tracer = Rc::new(RefCell::new(RecordingTracer::new()));
    let calculator = Instrumenter::new(InstrumentOptions::default().thorough(true))
        .tracer(Rc::clone(&tracer))
        .instrument(calculator());

    calculator.call("add", &[Value::Int(-2), Value::Int(3)], &[]).unwrap();
    // negating the first argument gives back the call above
    calculator.call("add", &[Value::Int(2), Value::Int(3)], &[]).unwrap();

    let cases = calculator.cases();
    let mentions = cases
        .iter()
        .filter(|case| case.body.iter().any(|line| line.contains("Calculator.add(-2, 3)")))
        .count();
    assert_eq!(mentions, 1);
    assert!(cases.iter().any(|case| case.body == vec!["assert 5 == Calculator.add(2, 3)"]));
    assert!(tracer.borrow().events().contains(&TraceEvent::DuplicateSkipped {
        function: FunctionId::new("Calculator", "add"),
        variant: Some(VariantKind::Metamorphic),
    }));
}

#[test]
fn distinct_collaborators_get_their_own_cases() {
    let greeter = instrument(greeter(), InstrumentOptions::default());

    greeter.call("greet", &[person("Al")], &[]).unwrap();
    greeter.call("greet", &[person("Bob")], &[]).unwrap();
    greeter.call("greet", &[person("Bob")], &[]).unwrap();

    let cases = greeter.cases();
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[1].name, "test_greet_2");
    assert_eq!(
        cases[1].body,
        vec!["person = Mock(name='Bob')", "assert 'Hi Bob' == Greeter.greet(person)"]
    );
}

#[test]
fn emitted_assertion_reads_back_as_the_recorded_call() {
    let calculator = instrument(calculator(), InstrumentOptions::default());
    let args = vec![Value::from("a, b"), Value::from("c")];

    let out = calculator.call("add", &args, &[]).unwrap();

    let cases = calculator.cases();
    let line = cases[0].body[0].strip_prefix("assert ").unwrap();
    let (expected, call) = line.split_once(" == ").unwrap();
    let inner = call.strip_prefix("Calculator.add(").unwrap().strip_suffix(')').unwrap();
    assert_eq!(parse_literal(expected).unwrap(), out);
    assert_eq!(&parse_literal(expected).unwrap(), calculator.log().get(0).unwrap().output());
    assert_eq!(parse_literal(&format!("[{inner}]")).unwrap(), Value::List(args));
}

#[test]
fn limited_tracer_keeps_the_first_events() {
    let tracer = Rc::new(RefCell::new(RecordingTracer::with_limit(2)));
    let calculator = Instrumenter::new(InstrumentOptions::default())
        .tracer(Rc::clone(&tracer))
        .instrument(calculator());

    calculator.call("add", &[Value::Int(1), Value::Int(2)], &[]).unwrap();
    calculator.call("add", &[Value::Int(3), Value::Int(4)], &[]).unwrap();

    assert_eq!(calculator.cases().len(), 2);
    assert_eq!(
        tracer.borrow().events(),
        &[
            TraceEvent::CallRecorded {
                function: FunctionId::new("Calculator", "add"),
                index: 0
            },
            TraceEvent::CaseEmitted {
                name: "test_add_1".to_owned(),
                variant: None
            },
        ]
    );
}

#[test]
fn untrusted_cases_need_confirmation() {
    let prompt = Rc::new(RefCell::new(ScriptedPrompt::new(["n", "what?", "y"])));
    let tracer = Rc::new(RefCell::new(RecordingTracer::new()));
    let calculator = Instrumenter::new(InstrumentOptions::default().trusted(false))
        .prompt(Rc::clone(&prompt))
        .tracer(Rc::clone(&tracer))
        .instrument(calculator());

    calculator.call("add", &[Value::Int(1), Value::Int(2)], &[]).unwrap();
    calculator.call("add", &[Value::Int(3), Value::Int(4)], &[]).unwrap();
    // rejected cases are not offered again
    calculator.call("add", &[Value::Int(1), Value::Int(2)], &[]).unwrap();

    let cases = calculator.cases();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].body, vec!["assert 7 == Calculator.add(3, 4)"]);

    let prompt = prompt.borrow();
    assert_eq!(prompt.questions().len(), 3);
    assert!(prompt.questions()[0].starts_with("assert 3 == Calculator.add(1, 2)\n"));
    assert_eq!(prompt.remaining(), 0);
    assert!(tracer.borrow().events().contains(&TraceEvent::CaseRejected {
        function: FunctionId::new("Calculator", "add")
    }));
}

#[test]
fn closed_confirmation_channel_rejects() {
    let calculator = Instrumenter::new(InstrumentOptions::default().trusted(false))
        .prompt(ScriptedPrompt::default())
        .instrument(calculator());

    let out = calculator.call("add", &[Value::Int(1), Value::Int(2)], &[]).unwrap();

    assert_eq!(out, Value::Int(3));
    assert!(calculator.cases().is_empty());
}

#[test]
fn constructed_instances_are_rebuilt_in_tests() {
    let helper = instrument(helper_class(), InstrumentOptions::default());

    let instance = helper.construct(&[Value::Int(3)], &[]).unwrap();
    let out = helper
        .call("my_func", &[instance, Value::List(vec![Value::Int(55)])], &[])
        .unwrap();

    assert_eq!(out, Value::List(vec![Value::Int(55), Value::Int(3)]));
    assert_eq!(helper.log().len(), 1);
    assert_eq!(helper.constructors().len(), 1);
    assert_eq!(
        helper.cases()[0].body,
        vec!["assert [55, 3] == HelperClass.my_func(HelperClass(3), [55])"]
    );
    assert!(helper.module_text().contains("from helper_class import HelperClass\n"));
}

#[test]
fn shared_registry_renders_other_classes() {
    let registry = ConstructorRegistry::new();
    let helper = Instrumenter::new(InstrumentOptions::default().module_path("lib.helpers"))
        .constructors(registry.clone())
        .instrument(helper_class());
    let user = Instrumenter::new(InstrumentOptions::default())
        .constructors(registry)
        .instrument(ClassDef::new("User").method("hello_of", ["helper"], |args, _| {
            args[0].get_attr("hello")
        }));

    let instance = helper.construct(&[], &[]).unwrap();
    user.call("hello_of", &[instance], &[]).unwrap();

    assert_eq!(
        user.cases()[0].body,
        vec!["assert [6] == User.hello_of(HelperClass())"]
    );
    assert!(user.module_text().contains("from lib.helpers import HelperClass\n"));
}

#[test]
fn constructor_must_return_an_object() {
    let broken = instrument(
        ClassDef::new("Broken").constructor(Vec::<String>::new(), |_, _| Ok(Value::Int(1))),
        InstrumentOptions::default(),
    );
    let err = broken.construct(&[], &[]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert!(broken.constructors().is_empty());
}

#[test]
fn nested_instrumented_calls_record_in_both_windows() {
    let inner = Rc::new(instrument(greeter(), InstrumentOptions::default()));
    let outer_greeter = Rc::clone(&inner);
    let outer = instrument(
        ClassDef::new("Host").method("welcome", ["guest"], move |args, _| {
            let greeting = outer_greeter.call("greet", &[args[0].clone()], &[])?;
            Ok(Value::from(format!("{greeting}!")))
        }),
        InstrumentOptions::default(),
    );

    outer.call("welcome", &[person("Al")], &[]).unwrap();

    assert_eq!(
        inner.cases()[0].body,
        vec!["person = Mock(name='Al')", "assert 'Hi Al' == Greeter.greet(person)"]
    );
    assert_eq!(
        outer.cases()[0].body,
        vec!["guest = Mock(name='Al')", "assert 'Hi Al!' == Host.welcome(guest)"]
    );
}

#[test]
fn file_writer_keeps_the_module_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let writer = FileWriter::new(dir.path().join("generated"));
    let path = writer.module_path("Calculator");
    let calculator = Instrumenter::new(InstrumentOptions::default())
        .writer(writer)
        .instrument(calculator());

    calculator.call("add", &[Value::Int(2), Value::Int(3)], &[]).unwrap();
    calculator.call("add", &[Value::Int(4), Value::Int(5)], &[]).unwrap();

    assert_eq!(path, dir.path().join("generated").join("test_Calculator.py"));
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, calculator.module_text());
    assert!(written.contains("    def test_add_2(self):\n        assert 9 == Calculator.add(4, 5)\n"));
}

#[test]
fn trace_log_serializes_to_json() {
    let greeter = instrument(greeter(), InstrumentOptions::default());
    greeter.call("greet", &[person("Al")], &[]).unwrap();

    let json = greeter.log().to_json_value();
    assert_eq!(json[0]["function"], "Greeter.greet");
    assert_eq!(json[0]["output"], "Hi Al");
    let history = &json[0]["args"][0]["$proxy"]["history"];
    assert_eq!(history["reads"][0]["name"], "name");
    assert_eq!(history["reads"][0]["value"], "Al");
}
