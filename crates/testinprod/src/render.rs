//! Rendering values as Python source.
//!
//! Primitives and containers become literals. Opaque values become mock objects rebuilt
//! from their interaction history, registered with the [`DependencyTracker`] so that the
//! test can declare them up front and assert on how they were used afterwards.
//!
//! | Recorded on the proxy | Rendered as |
//! |-----------------------|-------------|
//! | attribute reads | keyword fields of the mock constructor |
//! | calls | `return_value=...` or `side_effect=[...]`, plus call assertions |
//! | other protocol operations | `MagicMock(**{'__len__.return_value': ...})` |
//! | iteration | an inline `iter([...])` of the produced values |
//! | primitive attribute writes | `assert ident.attr == value` after the call |
//!
//! An instance built by an instrumented constructor is rendered as that constructor
//! call instead, since the real class reproduces its behavior.

use indexmap::{IndexMap, IndexSet};

use crate::{
    capability::Operation,
    error::RenderError,
    object::ObjectId,
    proxy::{InteractionHistory, OperationRecord, Proxy},
    tracker::{DependencyTracker, is_identifier},
    value::{Value, string_repr},
};

/// Fields that carry meaning of their own in a mock constructor.
const MOCK_OPTIONS: [&str; 4] = ["return_value", "side_effect", "spec", "wraps"];

/// Renders `value` as Python source, registering mocks with `tracker` under `hint`.
///
/// Deterministic: the same value rendered against a tracker in the same state yields the
/// same text.
pub fn render(value: &Value, tracker: &mut DependencyTracker, hint: &str) -> Result<String, RenderError> {
    match value {
        Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_) => Ok(value.py_repr()),
        Value::List(items) => Ok(format!("[{}]", render_items(items, tracker, hint)?.join(", "))),
        Value::Tuple(items) => {
            let rendered = render_items(items, tracker, hint)?;
            if rendered.len() == 1 {
                Ok(format!("({},)", rendered[0]))
            } else {
                Ok(format!("({})", rendered.join(", ")))
            }
        }
        Value::Dict(pairs) => {
            let key_hint = format!("{hint}_key");
            let value_hint = format!("{hint}_value");
            let mut entries = Vec::with_capacity(pairs.len());
            for (key, value) in pairs {
                let key = render(key, tracker, &key_hint)?;
                let value = render(value, tracker, &value_hint)?;
                entries.push(format!("{key}: {value}"));
            }
            Ok(format!("{{{}}}", entries.join(", ")))
        }
        Value::Object(object) => {
            render_constructed(object.id(), tracker, hint)?.ok_or_else(|| RenderError::Unrenderable {
                class_name: object.class_name().to_owned(),
            })
        }
        Value::Proxy(proxy) => render_proxy(proxy, tracker, hint),
    }
}

/// Renders positional items, hinting each with its index.
fn render_items(items: &[Value], tracker: &mut DependencyTracker, hint: &str) -> Result<Vec<String>, RenderError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| render(item, tracker, &format!("{hint}_{index}")))
        .collect()
}

/// Renders the constructor call that built the instance `id`, if one was recorded.
fn render_constructed(id: ObjectId, tracker: &mut DependencyTracker, hint: &str) -> Result<Option<String>, RenderError> {
    let Some(call) = tracker.constructors().and_then(|registry| registry.get(id)) else {
        return Ok(None);
    };
    tracker.add_import(format!("from {} import {}", call.module_path, call.class_name));
    let mut args = render_items(&call.args, tracker, hint)?;
    for (name, value) in &call.kwargs {
        args.push(format!("{name}={}", render(value, tracker, name)?));
    }
    Ok(Some(format!("{}({})", call.class_name, args.join(", "))))
}

fn render_proxy(proxy: &Proxy, tracker: &mut DependencyTracker, hint: &str) -> Result<String, RenderError> {
    if let Some(constructed) = render_constructed(proxy.target().id(), tracker, hint)? {
        return Ok(constructed);
    }
    let history = proxy.history();
    if let Some(produced) = history.first_iteration() {
        return Ok(format!("iter([{}])", render_items(produced, tracker, hint)?.join(", ")));
    }

    let key = proxy.key();
    if let Some(ident) = tracker.rendered(key) {
        return Ok(ident.to_owned());
    }
    if !tracker.enter(key) {
        return Err(RenderError::Cyclic {
            class_name: proxy.class_name().to_owned(),
        });
    }
    let result = render_mock(&history, tracker, hint);
    tracker.leave(key);
    let ident = result?;
    tracker.remember(key, ident.clone());
    Ok(ident)
}

/// Builds and registers the mock for one history, then records its assertions.
fn render_mock(history: &InteractionHistory, tracker: &mut DependencyTracker, hint: &str) -> Result<String, RenderError> {
    let mut fields = Vec::new();
    // entries that cannot be plain keyword fields: `**{'name': value}`
    let mut configure = Vec::new();

    let mut read_names = IndexSet::new();
    for read in &history.reads {
        if read.name == "__class__" || !read_names.insert(read.name.as_str()) {
            continue;
        }
        let rendered = render(&read.value, tracker, &read.name)?;
        if is_identifier(&read.name) && !MOCK_OPTIONS.contains(&read.name.as_str()) {
            fields.push(format!("{}={rendered}", read.name));
        } else {
            configure.push((string_repr(&read.name), rendered));
        }
    }

    let calls: Vec<_> = history.invocations(Operation::Call).collect();
    if let Some((_, _, first)) = calls.first() {
        let outputs: Vec<&Value> = calls.iter().map(|(_, _, output)| *output).collect();
        if outputs.iter().all(|output| *output == *first) {
            fields.push(format!("return_value={}", render(first, tracker, "return_value")?));
        } else {
            let rendered = outputs
                .iter()
                .map(|output| render(output, tracker, "return_value"))
                .collect::<Result<Vec<_>, _>>()?;
            fields.push(format!("side_effect=[{}]", rendered.join(", ")));
        }
    }

    let mut protocol: IndexMap<Operation, Vec<&Value>> = IndexMap::new();
    for (op, output) in history.operations.iter().filter_map(|record| match record {
        OperationRecord::Invoke { op, output, .. } if *op != Operation::Call => Some((*op, output)),
        _ => None,
    }) {
        protocol.entry(op).or_default().push(output);
    }
    let magic = !protocol.is_empty();
    for (op, outputs) in &protocol {
        let op_hint = format!("{hint}_{}", op.dunder().trim_matches('_'));
        if outputs.iter().all(|output| *output == outputs[0]) {
            let rendered = render(outputs[0], tracker, &op_hint)?;
            configure.push((string_repr(&format!("{}.return_value", op.dunder())), rendered));
        } else {
            let rendered = outputs
                .iter()
                .map(|output| render(output, tracker, &op_hint))
                .collect::<Result<Vec<_>, _>>()?;
            configure.push((
                string_repr(&format!("{}.side_effect", op.dunder())),
                format!("[{}]", rendered.join(", ")),
            ));
        }
    }

    if !configure.is_empty() {
        let entries: Vec<String> = configure.iter().map(|(key, value)| format!("{key}: {value}")).collect();
        fields.push(format!("**{{{}}}", entries.join(", ")));
    }
    let constructor = if magic { "MagicMock" } else { "Mock" };
    let ident = tracker.register(hint, format!("{constructor}({})", fields.join(", ")));

    let assert_hint = format!("assert_args_{hint}");
    for (args, kwargs, _) in &calls {
        // argument-level checks only when the arguments are plain literals
        let all_primitive = args.iter().all(Value::is_primitive) && kwargs.iter().all(|(_, value)| value.is_primitive());
        if all_primitive {
            let args = args
                .iter()
                .map(|arg| render(arg, tracker, &assert_hint))
                .collect::<Result<Vec<_>, _>>()?;
            let kwargs = kwargs
                .iter()
                .map(|(name, value)| Ok((name.clone(), render(value, tracker, &assert_hint)?)))
                .collect::<Result<Vec<_>, RenderError>>()?;
            tracker.assert_called(&ident, Some((args, kwargs)));
        } else {
            tracker.assert_called(&ident, None);
        }
    }

    let mut written: IndexMap<&str, &Value> = IndexMap::new();
    for write in &history.writes {
        written.insert(write.name.as_str(), &write.value);
    }
    for (name, value) in written {
        if value.is_primitive() && is_identifier(name) {
            tracker.assert_attribute(&ident, name, &value.py_repr());
        }
    }

    Ok(ident)
}
