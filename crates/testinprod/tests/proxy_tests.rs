//! Tests for interception proxies and tracking windows.
//!
//! These exercise the proxy layer directly, without an instrumented class: histories,
//! re-entrancy suppression, window closing and layering across nested windows.

use pretty_assertions::assert_eq;
use testinprod::{
    ExcType, Function, OperationRecord, Proxy, Record, TrackingFlag, TrackingState, Value, capability::Operation, track,
};

fn person() -> Value {
    Value::object(Record::new("Person").with_attr("name", "Al"))
}

/// Tracks `value` and returns the proxy it became.
fn proxied(value: &Value, flag: &TrackingFlag) -> Proxy {
    match track(value, flag) {
        Value::Proxy(proxy) => proxy,
        other => panic!("expected a proxy, got {other:?}"),
    }
}

#[test]
fn reads_are_recorded_with_their_values() {
    let flag = TrackingFlag::new();
    let proxy = proxied(&person(), &flag);

    assert_eq!(proxy.get_attr("name").unwrap(), Value::from("Al"));

    let history = proxy.history();
    assert_eq!(history.reads.len(), 1);
    assert_eq!(history.reads[0].name, "name");
    assert_eq!(history.reads[0].value, Value::from("Al"));
}

#[test]
fn suspended_window_records_nothing() {
    let flag = TrackingFlag::new();
    let proxy = proxied(&person(), &flag);
    {
        let _guard = flag.suspend();
        assert_eq!(flag.state(), TrackingState::Suspended);
        assert_eq!(proxy.get_attr("name").unwrap(), Value::from("Al"));
    }
    assert!(proxy.history().is_empty());
    assert!(flag.is_active());

    proxy.get_attr("name").unwrap();
    assert_eq!(proxy.history().len(), 1);
}

#[test]
fn failed_read_restores_tracking() {
    let flag = TrackingFlag::new();
    let proxy = proxied(&person(), &flag);

    let err = proxy.get_attr("age").unwrap_err();
    assert_eq!(err.exc_type(), ExcType::AttributeError);
    assert!(flag.is_active());
    assert!(proxy.history().is_empty());
}

#[test]
fn closed_window_passes_through() {
    let flag = TrackingFlag::new();
    let proxy = proxied(&person(), &flag);
    flag.close();

    assert_eq!(proxy.get_attr("name").unwrap(), Value::from("Al"));
    proxy.set_attr("name", Value::from("Bo")).unwrap();
    assert!(proxy.history().is_empty());
    assert_eq!(proxy.get_attr("name").unwrap(), Value::from("Bo"));

    drop(flag.suspend());
    assert_eq!(flag.state(), TrackingState::Closed);
}

#[test]
fn nested_guards_restore_in_order() {
    let flag = TrackingFlag::new();
    let outer = flag.suspend();
    let inner = flag.suspend();
    drop(inner);
    assert_eq!(flag.state(), TrackingState::Suspended);
    drop(outer);
    assert_eq!(flag.state(), TrackingState::Active);
}

#[test]
fn calls_on_returned_values_are_tracked() {
    let shout = Function::new("shout", |args, _| Ok(Value::from(args[0].to_string().to_uppercase())));
    let speaker = Value::object(Record::new("Speaker").with_attr("shout", Value::object(shout)));
    let flag = TrackingFlag::new();
    let proxy = proxied(&speaker, &flag);

    let method = proxy.get_attr("shout").unwrap();
    assert!(matches!(method, Value::Proxy(_)));
    assert_eq!(method.call(&[Value::from("hey")], &[]).unwrap(), Value::from("HEY"));

    let Value::Proxy(method) = &proxy.history().reads[0].value else {
        panic!("read value should be the proxy handed out");
    };
    let calls: Vec<_> = method.history().invocations(Operation::Call).map(|(args, _, out)| (args.to_vec(), out.clone())).collect();
    assert_eq!(calls, vec![(vec![Value::from("hey")], Value::from("HEY"))]);
}

#[test]
fn writes_reach_the_target() {
    let record = person();
    let flag = TrackingFlag::new();
    let proxy = proxied(&record, &flag);

    proxy.set_attr("age", Value::Int(31)).unwrap();

    assert_eq!(record.get_attr("age").unwrap(), Value::Int(31));
    let history = proxy.history();
    assert_eq!(history.writes.len(), 1);
    assert_eq!(history.writes[0].name, "age");
    assert_eq!(history.writes[0].value, Value::Int(31));
}

#[test]
fn iteration_records_produced_values() {
    let bag = Value::object(Record::new("Bag").with_items(vec![Value::Int(1), Value::Int(2)]));
    let flag = TrackingFlag::new();
    let proxy = proxied(&bag, &flag);

    let produced: Vec<Value> = proxy.iterate().unwrap().collect();
    assert_eq!(produced, vec![Value::Int(1), Value::Int(2)]);

    let history = proxy.history();
    assert_eq!(
        history.operations,
        vec![OperationRecord::Iterate {
            produced: vec![Value::Int(1), Value::Int(2)],
            exhausted: true,
        }]
    );
}

#[test]
fn produced_values_survive_later_mutation() {
    let bag = Value::object(Record::new("Bag").with_items(vec![Value::Int(1), Value::Int(2)]));
    let flag = TrackingFlag::new();
    let proxy = proxied(&bag, &flag);

    let produced: Vec<Value> = proxy.iterate().unwrap().collect();
    bag.invoke(Operation::SetItem, &[Value::Int(0), Value::Int(99)], &[]).unwrap();

    assert_eq!(produced, vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(proxy.history().first_iteration(), Some([Value::Int(1), Value::Int(2)].as_slice()));
    let current: Vec<Value> = bag.iterate().unwrap().collect();
    assert_eq!(current, vec![Value::Int(99), Value::Int(2)]);
}

#[test]
fn item_assignment_checks_the_index() {
    let bag = Value::object(Record::new("Bag").with_items(vec![Value::Int(1), Value::Int(2)]));

    bag.invoke(Operation::SetItem, &[Value::Int(-1), Value::Int(7)], &[]).unwrap();
    assert_eq!(bag.invoke(Operation::GetItem, &[Value::Int(1)], &[]).unwrap(), Value::Int(7));
    let err = bag
        .invoke(Operation::SetItem, &[Value::Int(2), Value::Int(0)], &[])
        .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::IndexError);
    let err = person()
        .invoke(Operation::SetItem, &[Value::Int(0), Value::Int(0)], &[])
        .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

#[test]
fn partial_iteration_is_not_exhausted() {
    let bag = Value::object(Record::new("Bag").with_items(vec![Value::Int(1), Value::Int(2)]));
    let flag = TrackingFlag::new();
    let proxy = proxied(&bag, &flag);

    let first = proxy.iterate().unwrap().next();
    assert_eq!(first, Some(Value::Int(1)));
    assert_eq!(proxy.history().first_iteration(), Some([Value::Int(1)].as_slice()));
    assert!(matches!(
        proxy.history().operations[0],
        OperationRecord::Iterate { exhausted: false, .. }
    ));
}

#[test]
fn unsupported_iteration_propagates_type_error() {
    let flag = TrackingFlag::new();
    let proxy = proxied(&person(), &flag);

    let Err(err) = proxy.iterate() else {
        panic!("a record without items is not iterable");
    };
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert!(proxy.history().is_empty());
    assert!(flag.is_active());
}

#[test]
fn protocol_operations_are_recorded() {
    let bag = Value::object(Record::new("Bag").with_items(vec![Value::Int(7)]));
    let flag = TrackingFlag::new();
    let proxy = proxied(&bag, &flag);

    assert_eq!(proxy.invoke(Operation::Len, &[], &[]).unwrap(), Value::Int(1));
    assert_eq!(
        proxy.invoke(Operation::GetItem, &[Value::Int(-1)], &[]).unwrap(),
        Value::Int(7)
    );
    let history = proxy.history();
    assert_eq!(history.invocations(Operation::Len).count(), 1);
    assert_eq!(history.invocations(Operation::GetItem).count(), 1);
}

#[test]
fn containers_are_copied_and_their_objects_tracked() {
    let flag = TrackingFlag::new();
    let list = Value::List(vec![Value::Int(1), person()]);

    let Value::List(tracked) = track(&list, &flag) else {
        panic!("a list stays a list");
    };
    assert_eq!(tracked[0], Value::Int(1));
    assert!(matches!(tracked[1], Value::Proxy(_)));
    assert_eq!(Value::List(tracked).unwrapped(), list);
}

#[test]
fn same_window_keeps_the_proxy() {
    let flag = TrackingFlag::new();
    let proxy = proxied(&person(), &flag);

    let again = proxied(&Value::Proxy(proxy.clone()), &flag);
    again.get_attr("name").unwrap();
    assert_eq!(proxy.history().reads.len(), 1);
}

#[test]
fn nested_windows_layer_proxies() {
    let outer_flag = TrackingFlag::new();
    let outer = proxied(&person(), &outer_flag);
    let inner_flag = TrackingFlag::new();
    let inner = proxied(&Value::Proxy(outer.clone()), &inner_flag);

    inner.get_attr("name").unwrap();
    assert_eq!(inner.history().reads.len(), 1);
    assert_eq!(outer.history().reads.len(), 1);

    // the caller of the inner window gets back the outer window's proxy
    let Value::Proxy(unwrapped) = Value::Proxy(inner).unwrapped() else {
        panic!("unwrapping a layer yields the enclosing proxy");
    };
    unwrapped.get_attr("name").unwrap();
    assert_eq!(outer.history().reads.len(), 2);
}

#[test]
fn closing_the_inner_window_keeps_the_outer_recording() {
    let outer_flag = TrackingFlag::new();
    let outer = proxied(&person(), &outer_flag);
    let inner_flag = TrackingFlag::new();
    let inner = proxied(&Value::Proxy(outer.clone()), &inner_flag);
    inner_flag.close();

    inner.get_attr("name").unwrap();
    assert!(inner.history().is_empty());
    assert_eq!(outer.history().reads.len(), 1);
}
