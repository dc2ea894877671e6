//! History store tests

use sensewire_core::{
    Error, FieldHistory, FieldType, RingBuffer, SensorRegistry, SensorSchema, Value,
    DEFAULT_MAX_RECORDS,
};

fn index_registry(max_records: usize) -> SensorRegistry {
    let mut registry = SensorRegistry::with_capacity(max_records);
    registry
        .register_passive(
            SensorSchema::builder("prediction")
                .field("index", FieldType::UInt8)
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
}

#[test]
fn test_latest_follows_each_packet() {
    let registry = index_registry(DEFAULT_MAX_RECORDS);

    registry.on_raw_buffer("prediction", &[3]).unwrap();
    assert_eq!(registry.latest("prediction", "index").unwrap(), Value::UInt8(3));

    registry.on_raw_buffer("prediction", &[4]).unwrap();
    assert_eq!(registry.latest("prediction", "index").unwrap(), Value::UInt8(4));
    assert_eq!(registry.history("prediction", "index").unwrap().len(), 2);
}

#[test]
fn test_empty_history() {
    let registry = index_registry(DEFAULT_MAX_RECORDS);

    match registry.latest("prediction", "index") {
        Err(Error::EmptyHistory { sensor, field }) => {
            assert_eq!(sensor, "prediction");
            assert_eq!(field, "index");
        }
        other => panic!("expected EmptyHistory, got {:?}", other),
    }
    assert!(registry.snapshot("prediction").is_err());
}

#[test]
fn test_fifo_keeps_last_max_records() {
    let max_records = 8;
    let extra = 5;
    let registry = index_registry(max_records);

    for i in 0..(max_records + extra) as u8 {
        registry.on_raw_buffer("prediction", &[i]).unwrap();
    }

    let history = registry.history("prediction", "index").unwrap();
    let expected: Vec<Value> = (extra as u8..(max_records + extra) as u8)
        .map(Value::UInt8)
        .collect();
    assert_eq!(history, expected);
}

#[test]
fn test_default_depth() {
    let registry = index_registry(DEFAULT_MAX_RECORDS);
    for i in 0..200u8 {
        registry.on_raw_buffer("prediction", &[i]).unwrap();
    }

    let history = registry.history("prediction", "index").unwrap();
    assert_eq!(history.len(), 64);
    assert_eq!(history.first(), Some(&Value::UInt8(136)));
    assert_eq!(history.last(), Some(&Value::UInt8(199)));
}

#[test]
fn test_ring_buffer_reusable_for_any_type() {
    let mut buf: RingBuffer<&str> = RingBuffer::new(2);
    buf.push("a");
    buf.push("b");
    assert_eq!(buf.push("c"), Some("a"));
    assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec!["b", "c"]);

    let mut field: FieldHistory = FieldHistory::new(1);
    field.push(Value::Float32(1.0));
    field.push(Value::Float32(2.0));
    assert_eq!(field.latest(), Some(&Value::Float32(2.0)));
    assert_eq!(field.len(), 1);
}

#[test]
fn test_fields_of_one_record_stay_aligned() {
    let mut registry = SensorRegistry::with_capacity(4);
    registry
        .register_passive(
            SensorSchema::builder("pair")
                .field("a", FieldType::UInt8)
                .field("b", FieldType::UInt16)
                .build()
                .unwrap(),
        )
        .unwrap();

    for i in 0..10u8 {
        registry.on_raw_buffer("pair", &[i, i, 0]).unwrap();
    }

    let a = registry.history("pair", "a").unwrap();
    let b = registry.history("pair", "b").unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.as_i64(), y.as_i64());
    }

    let snapshot = registry.snapshot("pair").unwrap();
    assert_eq!(snapshot[0].value, Value::UInt8(9));
    assert_eq!(snapshot[1].value, Value::UInt16(9));
}
