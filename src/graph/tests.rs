// src/graph/tests.rs

use super::*;
use crate::platform::headless::HeadlessDisplay;
use test_log::test;

#[test]
fn names_resolve_case_insensitively() {
    assert_eq!(GraphKind::from_name("conti"), Some(GraphKind::Conti));
    assert_eq!(GraphKind::from_name(" Bytes "), Some(GraphKind::Bytes));
    assert_eq!(GraphKind::from_name("BYTEMAP"), Some(GraphKind::Bytemap));
    assert_eq!(GraphKind::from_name("hexdump"), None);
}

#[test]
fn indices_are_dense() {
    for (i, kind) in GraphKind::ALL.into_iter().enumerate() {
        assert_eq!(kind.index(), i);
        assert_eq!(GraphKind::from_index(i), Some(kind));
    }
    assert_eq!(GraphKind::from_index(3), None);
}

#[test]
fn serde_uses_lowercase_names() {
    let json = serde_json::to_string(&GraphKind::Bytemap).unwrap();
    assert_eq!(json, "\"bytemap\"");
    let kind: GraphKind = serde_json::from_str("\"bytes\"").unwrap();
    assert_eq!(kind, GraphKind::Bytes);
}

#[test]
fn built_analyzers_report_their_kind() {
    let palette = crate::color::Palette::default();
    for kind in GraphKind::ALL {
        let analyzer = kind.build(&palette);
        assert_eq!(analyzer.kind(), kind);
        assert_eq!(analyzer.name(), kind.name());
        assert_eq!(kind.intrinsic_size(), (256, 256));
    }
    assert!(GraphKind::Bytes.resizable());
    assert!(!GraphKind::Conti.resizable());
}

#[test]
fn analyzers_do_not_share_state() {
    let palette = crate::color::Palette::default();
    let mut a = PairGrid::new(palette.clone());
    let mut b = PairGrid::new(palette);
    let mut display = HeadlessDisplay::new(256, 256);
    a.start_block(0, &mut display).unwrap();
    b.start_block(0, &mut display).unwrap();
    a.analyze(b"abab", &mut display).unwrap();
    assert_eq!(a.matrix().count(b'a', b'b'), 2);
    assert_eq!(b.matrix().count(b'a', b'b'), 0);
}
