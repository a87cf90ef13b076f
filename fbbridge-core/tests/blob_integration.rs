mod common;

use fbbridge_core::consts::{ISC_BAD_SEGSTR_HANDLE, ISC_SEGSTR_NO_OP};
use fbbridge_core::db::{BlobState, SeekMode};
use fbbridge_core::{ConnectionProperties, ParameterBuffer};
use test_case::test_case;

use common::FakeClient;

#[test_case(4, &[4, 4, 2] ; "split by buffer size")]
#[test_case(16, &[10] ; "single segment")]
#[test_case(0, &[1; 10] ; "zero buffer size clamps to one")]
fn test_write_splits_segments(blob_buffer_size: usize, expected: &[usize]) {
    let client = FakeClient::with_all_features();
    let properties = ConnectionProperties {
        blob_buffer_size,
        ..ConnectionProperties::new("employee")
    };
    let db = common::database_with(&client, properties);
    db.attach().expect("attach");
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");

    let mut blob = db.create_blob_for_output(&tr, None).expect("blob");
    assert!(blob.blob_id().is_null());
    blob.open().expect("open");
    assert!(!blob.blob_id().is_null());
    blob.write(b"0123456789").expect("write");
    blob.close().expect("close");
    assert_eq!(blob.state(), BlobState::Closed);

    let segments = client.blob_segments(blob.blob_id()).expect("stored");
    let lengths: Vec<usize> = segments.iter().map(Vec::len).collect();
    assert_eq!(lengths, expected);
    assert_eq!(segments.concat(), b"0123456789");
}

#[test]
fn test_read_segments_until_eof() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");
    let blob_id = client.store_blob(&[b"hello ", b"world"]);

    let mut blob = db.create_blob_for_input(&tr, blob_id, None).expect("blob");
    blob.open().expect("open");
    assert_eq!(blob.get_segment(4).expect("partial"), b"hell");
    assert!(!blob.is_eof());
    assert_eq!(blob.get_segment(100).expect("rest"), b"o ");
    assert_eq!(blob.get_segment(100).expect("second"), b"world");
    assert_eq!(blob.get_segment(100).expect("eof"), b"");
    assert!(blob.is_eof());
    assert_eq!(blob.get_segment(100).expect("after eof"), b"");

    let info = blob.info().expect("info");
    assert_eq!(info.segment_count, 2);
    assert_eq!(info.max_segment, 6);
    assert_eq!(info.total_length, 11);
    blob.close().expect("close");
}

#[test]
fn test_read_fills_minimum() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");
    let blob_id = client.store_blob(&[b"ab", b"cd", b"ef"]);

    let mut blob = db.create_blob_for_input(&tr, blob_id, None).expect("blob");
    blob.open().expect("open");
    let mut out = [0u8; 8];
    assert_eq!(blob.read(&mut out, 3).expect("read"), 4);
    assert_eq!(&out[..4], b"abcd");
    assert_eq!(blob.read(&mut out, 8).expect("read rest"), 2);
    assert_eq!(&out[..2], b"ef");
    assert!(blob.is_eof());
}

#[test]
fn test_direction_is_enforced() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");

    let mut output = db.create_blob_for_output(&tr, None).expect("blob");
    output.open().expect("open");
    let err = output.get_segment(10).unwrap_err();
    assert_eq!(err.error_code(), Some(ISC_SEGSTR_NO_OP));
    assert!(output.seek(0, SeekMode::Absolute).is_err());

    let blob_id = client.store_blob(&[b"x"]);
    let mut input = db.create_blob_for_input(&tr, blob_id, None).expect("blob");
    input.open().expect("open");
    assert_eq!(
        input.write(b"y").unwrap_err().error_code(),
        Some(ISC_SEGSTR_NO_OP)
    );
    assert_eq!(input.seek(0, SeekMode::FromTail).expect("seek"), 0);
}

#[test]
fn test_output_blob_cannot_reopen() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");
    let mut blob = db.create_blob_for_output(&tr, None).expect("blob");
    blob.open().expect("open");
    blob.close().expect("close");

    let err = blob.open().unwrap_err();
    assert_eq!(err.error_code(), Some(ISC_SEGSTR_NO_OP));
    assert_eq!(client.count("create_blob"), 1);
}

#[test]
fn test_unopened_blob_rejects_io() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");
    let mut blob = db.create_blob_for_output(&tr, None).expect("blob");
    let err = blob.write(b"data").unwrap_err();
    assert_eq!(err.error_code(), Some(ISC_BAD_SEGSTR_HANDLE));
    blob.close().expect("closing an unopened blob");
    assert_eq!(client.count("close_blob"), 0);
}

#[test]
fn test_cancel_discards_output() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");
    let mut blob = db.create_blob_for_output(&tr, None).expect("blob");
    blob.open().expect("open");
    blob.write(b"discard me").expect("write");
    blob.cancel().expect("cancel");
    blob.cancel().expect("cancel again");

    assert!(client.blob_segments(blob.blob_id()).is_none());
    assert_eq!(client.count("cancel_blob"), 1);
}

#[test]
fn test_dropped_blobs_are_released() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");

    let mut output = db.create_blob_for_output(&tr, None).expect("blob");
    output.open().expect("open");
    drop(output);
    assert_eq!(client.count("cancel_blob"), 1);

    let blob_id = client.store_blob(&[b"x"]);
    let mut input = db.create_blob_for_input(&tr, blob_id, None).expect("blob");
    input.open().expect("open");
    drop(input);
    assert_eq!(client.count("close_blob"), 1);
}

#[test]
fn test_blob_needs_active_transaction() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");
    tr.commit().expect("commit");
    let mut blob = db.create_blob_for_output(&tr, None).expect("blob");
    assert!(blob.open().unwrap_err().is_illegal_state());
}

#[test]
fn test_second_close_does_not_reach_library() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::concurrency())
        .expect("start");
    let blob_id = client.store_blob(&[b"abc"]);
    let mut blob = db.create_blob_for_input(&tr, blob_id, None).expect("blob");
    blob.open().expect("open");

    blob.close().expect("close");
    blob.close().expect("second close");
    assert_eq!(blob.state(), BlobState::Closed);
    assert_eq!(client.count("close_blob"), 1);

    drop(blob);
    assert_eq!(client.count("close_blob"), 1);
}
