//! Scenario tests for the schema macros, decoding contexts and dictionaries

use crate::cell::{Cell, CellBuilder, boc_to_hex, hex_to_boc};
use crate::tlb::*;
use crate::utils::{CodecConfig, LabelPolicy};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;

tlb_struct! {
    #[derive(Debug, Clone, PartialEq)]
    struct Header: "hdr#c0ffee01" {
        version: u8,
        flags: u64 => "12bits",
        owner: Option<Bits256> => "maybe",
        note: Option<Text> => "maybe ^",
        payload: u32 => "^",
    }
}

tlb_struct! {
    #[derive(Debug, Clone, PartialEq)]
    struct Envelope {
        id: u32,
        header: Header => "^",
        action: Action,
    }
}

tlb_sum! {
    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Transfer: "transfer#0f8a7ea5" { amount: Grams, to: Bits256 },
        Burn: "burn#595f07bc" { amount: Grams },
        Ping: "$0",
    }
}

tlb_sum! {
    #[derive(Debug, Clone, PartialEq)]
    enum Overlapping {
        Short: "$1",
        Long: "$10" { value: u8 },
    }
}

fn header() -> Header {
    Header {
        version: 2,
        flags: 0xABC,
        owner: Some(Bits256([7; 32])),
        note: Some(Text::from("hello")),
        payload: 99,
    }
}

/// Decodes through real bag-of-cells bytes and checks the bytes are stable
fn through_boc<T: TlbDecode + TlbEncode>(value: &T) -> T {
    let hex = to_boc_hex(value).unwrap();
    let decoded: T = from_boc_hex(&hex).unwrap();
    assert_eq!(to_boc_hex(&decoded).unwrap(), hex);
    decoded
}

/// Test struct fields, magic and annotations through BoC bytes
#[test]
fn test_struct_roundtrip() {
    let value = Envelope {
        id: 1,
        header: header(),
        action: Action::Transfer {
            amount: Grams(1_000_000_000),
            to: Bits256([0xEE; 32]),
        },
    };
    assert_eq!(through_boc(&value), value);

    let absent = Header {
        owner: None,
        note: None,
        ..header()
    };
    let cell = marshal(&absent).unwrap();
    // magic, version, 12 flag bits and two presence bits
    assert_eq!(cell.bit_len(), 32 + 8 + 12 + 2);
    assert_eq!(cell.reference_count(), 1);
    assert_eq!(through_boc(&absent), absent);
}

/// Test bags of cells with a CRC32C checksum
#[test]
fn test_boc_with_checksum() {
    let value = header();
    let boc = to_boc(&value, true).unwrap();
    assert_eq!(from_boc::<Header>(&boc).unwrap(), value);
    let plain = to_boc(&value, false).unwrap();
    assert_eq!(boc.len(), plain.len() + 4);
}

/// Test that a wrong magic is reported as such
#[test]
fn test_magic_mismatch() {
    let mut builder = CellBuilder::new();
    builder.store_u32(0xdeadbeef).unwrap();
    let cell = builder.build().unwrap();
    let err = unmarshal::<Header>(&cell).unwrap_err();
    assert!(matches!(err, TlbError::MagicMismatch { found: 0xdeadbeef, .. }));
}

/// Test variant dispatch and selector names
#[test]
fn test_sum_type_dispatch() {
    for action in [
        Action::Transfer {
            amount: Grams(5),
            to: Bits256::default(),
        },
        Action::Burn { amount: Grams(0) },
        Action::Ping,
    ] {
        let decoded = through_boc(&action);
        assert_eq!(decoded.sum_type(), action.sum_type());
        assert_eq!(decoded, action);
    }
    assert_eq!(marshal(&Action::Ping).unwrap().bit_len(), 1);

    let mut builder = CellBuilder::new();
    builder.store_u32(0xffffffff).unwrap();
    let err = unmarshal::<Action>(&builder.build().unwrap()).unwrap_err();
    assert!(matches!(err, TlbError::SumTypeMismatch { type_name: "Action" }));
    assert_eq!(err.to_string(), "cannot decode sum type Action");
}

/// Test that variants are tried in declaration order, not by longest tag
#[test]
fn test_sum_type_first_match() {
    let long = Overlapping::Long { value: 0xFF };
    let cell = marshal(&long).unwrap();
    assert_eq!(cell.bit_string().to_fift_hex(), "BFE_");

    // `$1` is a prefix of `$10` and is declared first, so it wins
    let mut slice = cell.as_slice();
    let decoded = Overlapping::decode_tlb(&mut slice, &mut Decoder::new()).unwrap();
    assert_eq!(decoded, Overlapping::Short);
    assert_eq!(decoded.sum_type(), "Short");
    assert_eq!(slice.remaining_bits(), 9);
}

/// Test the field path attached to errors in debug mode
#[test]
fn test_debug_path() {
    let mut inner = CellBuilder::new();
    write_tag(&mut inner, "#c0ffee01").unwrap();
    inner.store_byte(2).unwrap();
    let mut outer = CellBuilder::new();
    outer.store_u32(1).unwrap();
    outer.store_reference(inner.build().unwrap()).unwrap();
    let cell = outer.build().unwrap();

    let err = unmarshal::<Envelope>(&cell).unwrap_err();
    assert_eq!(err.path(), None);

    let config = CodecConfig {
        debug_path: true,
        ..CodecConfig::default()
    };
    let err = Decoder::from_config(&config)
        .decode::<Envelope>(&cell)
        .unwrap_err();
    assert_eq!(err.path(), Some("header.flags"));
    assert!(matches!(err.root_cause(), TlbError::Cell(_)));
    assert!(err.to_string().starts_with("header.flags: "));

    let mut builder = CellBuilder::new();
    write_tag(&mut builder, "#595f07bc").unwrap();
    builder.store_uint(9, 4).unwrap();
    let err = Decoder::new()
        .with_debug_path(true)
        .decode::<Action>(&builder.build().unwrap())
        .unwrap_err();
    assert_eq!(err.path(), Some("Burn.amount"));
}

/// Test the encoder reports paths too
#[test]
fn test_encode_debug_path() {
    tlb_struct! {
        struct Narrow {
            small: u64 => "4bits",
        }
    }
    let mut encoder = Encoder::new().with_debug_path(true);
    let err = encoder.encode(&Narrow { small: 16 }).unwrap_err();
    assert_eq!(err.path(), Some("small"));
}

fn library_fixture() -> (Arc<Cell>, Arc<Cell>) {
    let code = marshal(&0xC0DEu32).unwrap();
    let mut builder = CellBuilder::new();
    builder.store_reference(Cell::library(&code.hash()).unwrap()).unwrap();
    (code, builder.build().unwrap())
}

/// Test library cells with and without a resolver
#[test]
fn test_library_resolution() {
    let (code, cell) = library_fixture();

    let err = unmarshal::<Ref<u32>>(&cell).unwrap_err();
    assert!(matches!(err, TlbError::LibraryResolverMissing { .. }));

    let expected = code.hash();
    let resolved = code.clone();
    let resolver = move |hash: &[u8; 32]| (*hash == expected).then(|| resolved.clone());
    let mut decoder = Decoder::new().with_library_resolver(Arc::new(resolver));
    assert_eq!(decoder.decode::<Ref<u32>>(&cell).unwrap().0, 0xC0DE);

    let mut decoder = Decoder::new().with_library_resolver(Arc::new(|_: &[u8; 32]| -> Option<Arc<Cell>> { None }));
    let err = decoder.decode::<Ref<u32>>(&cell).unwrap_err();
    assert!(matches!(err, TlbError::LibraryNotFound { .. }));

    let mut decoder =
        Decoder::new().with_library_resolver(Arc::new(|_: &[u8; 32]| Some(Arc::new(Cell::new()))));
    assert!(decoder.decode::<Ref<u32>>(&cell).is_err());
}

/// Test that raw cells keep library placeholders untouched
#[test]
fn test_library_kept_by_raw_cells() {
    let (code, cell) = library_fixture();
    let raw = unmarshal::<Ref<Arc<Cell>>>(&cell).unwrap().0;
    assert_eq!(raw.library_hash(), Some(code.hash()));

    let any = unmarshal::<Ref<Any>>(&cell).unwrap().0;
    assert_eq!(any.cell().cell_type(), crate::cell::CellType::Library);
    assert_eq!(marshal(&Ref(any)).unwrap().hash(), cell.hash());
}

/// Test that the trie depends only on the set of keys
#[test]
fn test_hashmap_key_order_invariance() {
    let mut rng = rand::thread_rng();
    let mut unique = BTreeMap::new();
    while unique.len() < 150 {
        unique.insert(rng.gen_range(0..=u32::MAX), rng.gen_range(0..=u16::MAX));
    }
    let mut items: Vec<(u32, u16)> = unique.into_iter().collect();
    let sorted = items.clone();

    let reference = marshal(&HashmapE::from_items(items.clone())).unwrap();
    for _ in 0..5 {
        items.shuffle(&mut rng);
        let cell = marshal(&HashmapE::from_items(items.clone())).unwrap();
        assert_eq!(cell.hash(), reference.hash());
    }

    let decoded: HashmapE<u32, u16> = through_boc(&HashmapE::from_items(items));
    assert_eq!(decoded.items(), sorted.as_slice());
}

/// Test the canonical label policy
#[test]
fn test_canonical_labels() {
    let map = HashmapE::from_items(vec![(0u32, 1u8), (1, 2)]);

    let default = marshal(&map).unwrap();
    // 31 shared zero bits: hml_long beats hml_short
    assert_eq!(default.reference(0).unwrap().bit_len(), 2 + 6 + 31);

    let config = CodecConfig {
        label_policy: LabelPolicy::Canonical,
        ..CodecConfig::default()
    };
    let canonical = Encoder::from_config(&config).encode(&map).unwrap();
    assert_eq!(canonical.reference(0).unwrap().bit_len(), 3 + 6);

    let decoded: HashmapE<u32, u8> = unmarshal(&canonical).unwrap();
    assert_eq!(decoded, map);
}

/// Test lookups in a dictionary stored behind a reference
#[test]
fn test_hashmap_of_structs() {
    let map: HashmapE<Bits256, Header> = (0..4u8)
        .map(|i| {
            (
                Bits256([i; 32]),
                Header {
                    version: i,
                    ..header()
                },
            )
        })
        .collect();
    let cell = marshal(&map).unwrap();
    let found = HashmapE::<Bits256, Header>::lookup(
        &mut cell.as_slice(),
        &Bits256([3; 32]),
        &mut Decoder::new(),
    )
    .unwrap();
    assert_eq!(found.map(|h| h.version), Some(3));

    let reparsed = hex_to_boc(&boc_to_hex(&cell, false).unwrap()).unwrap();
    let decoded: HashmapE<Bits256, Header> = unmarshal(&reparsed).unwrap();
    assert_eq!(decoded.len(), 4);
}

/// Test `Either`, `Maybe` and `EitherRef` inside a schema
#[test]
fn test_combinators_in_schema() {
    tlb_struct! {
        #[derive(Debug, Clone, PartialEq)]
        struct Mixed {
            choice: Either<u8, Unary>,
            opt: Maybe<Int<7>>,
            body: EitherRef<Bits512>,
            tail: VarUInteger<32>,
        }
    }
    let value = Mixed {
        choice: Either::Right(Unary(3)),
        opt: Maybe::some(Int(-5)),
        body: EitherRef::Ref(Bits512([1; 64])),
        tail: VarUInteger::from(12345u64),
    };
    assert_eq!(through_boc(&value), value);
}
