//! Demonstration classes the CLI can instrument.

use testinprod::{ClassDef, ExcType, Exception, Record, Value};

/// Names of the bundled classes, for `--help` and error messages.
pub const CLASSES: [&str; 3] = ["Calculator", "Greeter", "HelperClass"];

/// Looks up a bundled class by name.
pub fn class(name: &str) -> Option<ClassDef> {
    match name {
        "Calculator" => Some(calculator()),
        "Greeter" => Some(greeter()),
        "HelperClass" => Some(helper_class()),
        _ => None,
    }
}

fn calculator() -> ClassDef {
    ClassDef::new("Calculator")
        .method("add", ["a", "b"], |args, _| arithmetic('+', args))
        .method("sub", ["a", "b"], |args, _| arithmetic('-', args))
        .method("mul", ["a", "b"], |args, _| arithmetic('*', args))
        .method("div", ["a", "b"], |args, _| arithmetic('/', args))
}

/// Python semantics for `a <op> b` over ints and floats, plus `str + str`.
fn arithmetic(op: char, args: &[Value]) -> Result<Value, Exception> {
    let [a, b] = args else {
        return Err(Exception::new(
            ExcType::TypeError,
            format!("expected 2 arguments, got {}", args.len()),
        ));
    };
    match (op, a, b) {
        ('+', Value::Text(a), Value::Text(b)) => return Ok(Value::Text(format!("{a}{b}"))),
        ('/', _, Value::Int(0)) => return Err(Exception::new(ExcType::ZeroDivisionError, "division by zero")),
        ('/', _, Value::Float(f)) if *f == 0.0 => {
            return Err(Exception::new(ExcType::ZeroDivisionError, "float division by zero"));
        }
        _ => {}
    }
    if let (Value::Int(a), Value::Int(b)) = (number(a), number(b)) {
        let result = match op {
            '+' => a.checked_add(b),
            '-' => a.checked_sub(b),
            '*' => a.checked_mul(b),
            _ => None,
        };
        if let Some(result) = result {
            return Ok(Value::Int(result));
        }
    }
    match (as_float(a), as_float(b)) {
        (Some(a), Some(b)) => Ok(Value::Float(match op {
            '+' => a + b,
            '-' => a - b,
            '*' => a * b,
            _ => a / b,
        })),
        _ => Err(Exception::new(
            ExcType::TypeError,
            format!(
                "unsupported operand type(s) for {op}: '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ),
        )),
    }
}

/// Booleans take part in arithmetic as 0 and 1.
fn number(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Int(i64::from(*b)),
        other => other.clone(),
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match number(value) {
        Value::Int(i) => Some(i as f64),
        Value::Float(f) => Some(f),
        _ => None,
    }
}

fn greeter() -> ClassDef {
    ClassDef::new("Greeter")
        .method("greet", ["person"], |args, _| {
            let person = args
                .first()
                .ok_or_else(|| Exception::new(ExcType::TypeError, "greet() missing 'person'"))?;
            Ok(Value::from(format!("Hi {}", person.get_attr("name")?)))
        })
        .method("greet_all", ["people"], |args, _| {
            let people = args
                .first()
                .ok_or_else(|| Exception::new(ExcType::TypeError, "greet_all() missing 'people'"))?;
            let mut greetings = Vec::new();
            for person in people.iterate()? {
                greetings.push(Value::from(format!("Hi {}", person.get_attr("name")?)));
            }
            Ok(Value::List(greetings))
        })
}

fn helper_class() -> ClassDef {
    ClassDef::new("HelperClass")
        .constructor(["number"], |args, kwargs| {
            let number = args
                .first()
                .or_else(|| kwargs.iter().find(|(name, _)| name == "number").map(|(_, value)| value))
                .cloned()
                .unwrap_or(Value::Int(6));
            Ok(Value::object(
                Record::new("HelperClass").with_attr("hello", Value::List(vec![number])),
            ))
        })
        .method("my_func", ["self", "lst"], |args, _| {
            let [this, lst] = args else {
                return Err(Exception::new(ExcType::TypeError, "my_func() takes self and lst"));
            };
            let mut items: Vec<Value> = lst.iterate()?.collect();
            items.extend(this.get_attr("hello")?.iterate()?);
            Ok(Value::List(items))
        })
}
