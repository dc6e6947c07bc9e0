// tests/property/parser_test.rs

//! Property-based tests for request line parsing and framing

use bytes::{Bytes, BytesMut};
use kvserver::KvError;
use kvserver::core::protocol::{ClientRequest, RequestLine, RequestLineCodec};
use proptest::prelude::*;
use tokio_util::codec::Decoder;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_well_formed_lines_parse_to_their_fields(
        key in "[^:\r\n]{0,32}",
        old in "[^:\r\n]{0,32}",
        new in "[^:\r\n]{0,32}",
    ) {
        let put = format!("Put:{key}:{old}");
        prop_assert_eq!(
            ClientRequest::parse(put.as_bytes()).unwrap(),
            ClientRequest::Put { key: key.clone(), value: Bytes::from(old.clone()) }
        );

        let update = format!("Update:{key}:{old}:{new}");
        prop_assert_eq!(
            ClientRequest::parse(update.as_bytes()).unwrap(),
            ClientRequest::Update {
                key: key.clone(),
                old: Bytes::from(old.clone()),
                new: Bytes::from(new.clone()),
            }
        );

        let get = format!("Get:{key}");
        prop_assert_eq!(
            ClientRequest::parse(get.as_bytes()).unwrap(),
            ClientRequest::Get { key: key.clone() }
        );
    }

    #[test]
    fn test_parser_never_panics(line in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = ClientRequest::parse(&line);
    }

    #[test]
    fn test_unknown_types_are_rejected(kind in "[A-Za-z]{1,12}", key in "[a-z]{1,8}") {
        prop_assume!(!["Put", "Get", "Delete", "Update"].contains(&kind.as_str()));
        let line = format!("{kind}:{key}");
        prop_assert_eq!(
            ClientRequest::parse(line.as_bytes()).unwrap_err(),
            KvError::UnknownRequestType(kind)
        );
    }

    #[test]
    fn test_framing_is_independent_of_chunking(
        lines in prop::collection::vec("[^\r\n]{0,40}", 1..20),
        split in 1usize..64,
    ) {
        let mut wire = Vec::new();
        for line in &lines {
            wire.extend_from_slice(line.as_bytes());
            wire.push(b'\n');
        }

        let mut codec = RequestLineCodec::default();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for chunk in wire.chunks(split) {
            buf.extend_from_slice(chunk);
            while let Some(line) = codec.decode(&mut buf).unwrap() {
                match line {
                    RequestLine::Complete(line) => {
                        decoded.push(String::from_utf8(line.to_vec()).unwrap())
                    }
                    RequestLine::TooLong(limit) => prop_assert!(false, "unexpected overlong line, limit {}", limit),
                }
            }
        }
        prop_assert_eq!(decoded, lines);
    }

    #[test]
    fn test_overlong_lines_are_skipped_without_losing_neighbours(
        lines in prop::collection::vec("[a-z]{0,24}", 1..20),
        split in 1usize..32,
    ) {
        const LIMIT: usize = 12;
        let mut wire = Vec::new();
        for line in &lines {
            wire.extend_from_slice(line.as_bytes());
            wire.push(b'\n');
        }

        let mut codec = RequestLineCodec::new(LIMIT);
        let mut buf = BytesMut::new();
        let mut kept = Vec::new();
        let mut skipped = 0;
        for chunk in wire.chunks(split) {
            buf.extend_from_slice(chunk);
            while let Some(line) = codec.decode(&mut buf).unwrap() {
                match line {
                    RequestLine::Complete(line) => kept.push(String::from_utf8(line.to_vec()).unwrap()),
                    RequestLine::TooLong(_) => skipped += 1,
                }
            }
        }

        let expected: Vec<String> = lines.iter().filter(|l| l.len() <= LIMIT).cloned().collect();
        prop_assert_eq!(skipped, lines.len() - expected.len());
        prop_assert_eq!(kept, expected);
    }
}
