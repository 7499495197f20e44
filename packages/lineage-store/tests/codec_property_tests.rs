//! Property-based tests for the value codec
//!
//! Invariants that hold for every value:
//! - decode(encode(v)) == v, consuming exactly the encoded bytes
//! - size(v) == encode(v).len()
//! - integers take their shortest encoding
//! - arbitrary input never panics the decoder

use lineage_store::codec::{decode, encode_to_vec, size, Value};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Value::Int),
        (-64i64..64).prop_map(Value::Int),
        prop::collection::vec(any::<u8>(), 0..300).prop_map(Value::Bytes),
    ];
    leaf.prop_recursive(4, 64, 20, |inner| {
        (0u8..16, prop::collection::vec(inner, 0..20))
            .prop_map(|(tag, fields)| Value::block(tag, fields))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_decode_inverts_encode(value in arb_value()) {
        let bytes = encode_to_vec(&value);
        let (decoded, used) = decode(&bytes).unwrap();
        prop_assert_eq!(used, bytes.len());
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn prop_size_matches_encoding(value in arb_value()) {
        prop_assert_eq!(size(&value), encode_to_vec(&value).len());
    }

    #[test]
    fn prop_int_encoding_is_minimal(n in any::<i64>()) {
        let expected = if (0..64).contains(&n) {
            1
        } else if i8::try_from(n).is_ok() {
            2
        } else if i16::try_from(n).is_ok() {
            3
        } else if i32::try_from(n).is_ok() {
            5
        } else {
            9
        };
        prop_assert_eq!(encode_to_vec(&Value::Int(n)).len(), expected);
    }

    #[test]
    fn prop_decoder_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&bytes);
    }

    #[test]
    fn prop_truncation_is_an_error(value in arb_value(), cut in any::<prop::sample::Index>()) {
        let bytes = encode_to_vec(&value);
        let cut = cut.index(bytes.len());
        prop_assert!(decode(&bytes[..cut]).is_err());
    }
}

#[test]
fn test_known_encodings() {
    assert_eq!(encode_to_vec(&Value::Int(5)), vec![0x45]);
    assert_eq!(encode_to_vec(&Value::Int(-1)), vec![0x00, 0xff]);
    assert_eq!(encode_to_vec(&Value::Int(300)), vec![0x01, 0x01, 0x2c]);
    assert_eq!(encode_to_vec(&Value::string("ab")), vec![0x22, b'a', b'b']);
    assert_eq!(
        encode_to_vec(&Value::block(0, vec![Value::Int(1), Value::Int(2)])),
        vec![0xa0, 0x41, 0x42]
    );
    assert_eq!(
        encode_to_vec(&Value::string(&"x".repeat(40)))[..2],
        [0x09, 40]
    );
}
