mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fbbridge_core::consts::{
    ISC_BAD_DB_HANDLE, ISC_CURSOR_NOT_OPEN, ISC_DSQL_CURSOR_ERR, ISC_NETWORK_ERROR, ISC_SQLERR,
};
use fbbridge_core::db::{ResourceKind, StatementState};
use fbbridge_core::info::StatementType;
use fbbridge_core::status::WarningCallback;
use fbbridge_core::{
    ClientFeature, ConnectionProperties, DatabaseWarning, ExceptionListener, ExecuteResult,
    FbError, FbResult, ParameterBuffer,
};
use test_case::test_case;

use common::{FakeClient, EXECUTE_ECHO, INSERT_ROW, SELECT_IDS, SELECT_WIDE};

fn integer(row: &[Option<Vec<u8>>], index: usize) -> i32 {
    let bytes: [u8; 4] = row[index]
        .as_deref()
        .expect("value")
        .try_into()
        .expect("four bytes");
    i32::from_ne_bytes(bytes)
}

#[test]
fn test_select_round_trip() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    assert!(db.is_attached());
    let info = db.info().expect("info");
    assert_eq!((info.ods_major, info.ods_minor, info.dialect), (13, 1, 3));

    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    assert_eq!(stmt.state(), StatementState::New);

    stmt.prepare(SELECT_IDS).expect("prepare");
    assert_eq!(stmt.state(), StatementState::Prepared);
    assert_eq!(stmt.statement_type(), Some(StatementType::Select));
    assert_eq!(stmt.fields().count(), 1);
    assert_eq!(stmt.fields().field(0).expect("field").field_name, "ID");

    assert_eq!(stmt.execute(&[]).expect("execute"), ExecuteResult::Cursor);
    assert_eq!(stmt.state(), StatementState::CursorOpen);
    assert_eq!(stmt.fetch_rows(10).expect("fetch"), 3);
    assert!(stmt.all_rows_fetched());
    let values: Vec<i32> = std::iter::from_fn(|| stmt.take_row())
        .map(|row| integer(&row, 0))
        .collect();
    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(stmt.fetch_rows(10).expect("fetch after end"), 0);

    stmt.close_cursor().expect("close cursor");
    assert_eq!(stmt.state(), StatementState::Prepared);
    stmt.close().expect("close");
    tr.commit().expect("commit");
    db.detach().expect("detach");
    assert!(!db.is_attached());

    assert_eq!(
        client.calls(),
        vec![
            "attach_database",
            "database_info",
            "start_transaction",
            "dsql_allocate_statement",
            "dsql_prepare",
            "dsql_describe",
            "dsql_describe_bind",
            "dsql_sql_info",
            "dsql_execute",
            "dsql_fetch",
            "dsql_fetch",
            "dsql_fetch",
            "dsql_fetch",
            "dsql_free_statement(close)",
            "dsql_free_statement(drop)",
            "commit_transaction",
            "detach_database",
        ]
    );
}

#[test]
fn test_fetch_respects_row_limit() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    stmt.prepare(SELECT_IDS).expect("prepare");
    stmt.execute(&[]).expect("execute");

    assert_eq!(stmt.fetch_rows(2).expect("fetch"), 2);
    assert!(!stmt.all_rows_fetched());
    assert_eq!(stmt.buffered_rows(), 2);
    assert_eq!(stmt.fetch_rows(2).expect("fetch"), 1);
    assert!(stmt.all_rows_fetched());
    assert_eq!(stmt.buffered_rows(), 3);
}

#[test]
fn test_wide_result_grows_descriptor() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    stmt.prepare(SELECT_WIDE).expect("prepare");
    assert_eq!(stmt.fields().count(), 12);
    assert_eq!(client.count("dsql_describe"), 2);

    stmt.execute(&[]).expect("execute");
    stmt.fetch_rows(1).expect("fetch");
    let row = stmt.take_row().expect("row");
    assert_eq!(row.len(), 12);
    assert!((0..12).all(|index| integer(&row, index) == 7));
}

#[test]
fn test_procedure_returns_singleton() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    stmt.prepare(EXECUTE_ECHO).expect("prepare");
    assert_eq!(stmt.statement_type(), Some(StatementType::ExecProcedure));
    assert_eq!(stmt.parameters().count(), 1);

    let result = stmt.execute(&[Some(b"hello".to_vec())]).expect("execute");
    assert_eq!(result, ExecuteResult::Singleton);
    assert_eq!(stmt.state(), StatementState::Prepared);
    assert_eq!(stmt.take_row(), Some(vec![Some(b"hello".to_vec())]));
    assert_eq!(client.count("dsql_execute2"), 1);
    assert_eq!(client.count("dsql_execute"), 0);

    let err = stmt.fetch_rows(1).unwrap_err();
    assert_eq!(err.error_code(), Some(ISC_CURSOR_NOT_OPEN));
}

#[test]
fn test_execute_twice_needs_cursor_close() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    stmt.prepare(SELECT_IDS).expect("prepare");
    stmt.execute(&[]).expect("execute");

    let err = stmt.execute(&[]).unwrap_err();
    assert!(err.is_illegal_state());
    assert_eq!(err.error_code(), Some(ISC_DSQL_CURSOR_ERR));

    stmt.close_cursor().expect("close cursor");
    stmt.execute(&[]).expect("execute again");
}

#[test]
fn test_reprepare_keeps_buffers_for_same_shape() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    stmt.prepare(SELECT_IDS).expect("prepare");
    stmt.execute(&[]).expect("execute");

    // an open cursor is closed by the next prepare
    stmt.prepare("SELECT ID FROM U").expect("prepare again");
    assert_eq!(stmt.state(), StatementState::Prepared);
    assert_eq!(client.count("dsql_allocate_statement"), 1);
    assert_eq!(client.count("dsql_free_statement(close)"), 1);

    stmt.prepare(INSERT_ROW).expect("prepare insert");
    assert!(stmt.fields().is_empty());
    assert_eq!(stmt.execute(&[]).expect("execute"), ExecuteResult::NoResult);
}

#[test]
fn test_failed_prepare_leaves_error_state() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");

    client.fail_next("dsql_prepare", ISC_SQLERR);
    let err = stmt.prepare("SELEC broken").unwrap_err();
    assert_eq!(err.error_code(), Some(ISC_SQLERR));
    assert_eq!(stmt.state(), StatementState::Error);
    assert!(stmt.execute(&[]).unwrap_err().is_illegal_state());

    stmt.prepare(SELECT_IDS).expect("recovered");
    assert_eq!(stmt.state(), StatementState::Prepared);
}

#[test]
fn test_double_release_is_noop() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    stmt.prepare(SELECT_IDS).expect("prepare");

    stmt.close().expect("close");
    stmt.close().expect("close again");
    tr.commit().expect("commit");
    tr.commit().expect("commit again");
    db.detach().expect("detach");
    db.detach().expect("detach again");

    assert_eq!(client.count("dsql_free_statement(drop)"), 1);
    assert_eq!(client.count("commit_transaction"), 1);
    assert_eq!(client.count("detach_database"), 1);
}

#[test]
fn test_closed_statement_rejects_use() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    stmt.close().expect("close");
    assert!(stmt.prepare(SELECT_IDS).unwrap_err().is_illegal_state());
    assert_eq!(client.count("dsql_allocate_statement"), 0);
}

#[test]
fn test_timeout_sent_only_when_supported() {
    let with_timeout = FakeClient::with_all_features();
    let without_timeout = FakeClient::new([ClientFeature::FbPing]);

    for client in [&with_timeout, &without_timeout] {
        let db = common::attached(client);
        let tr = db
            .start_transaction(&ParameterBuffer::read_committed())
            .expect("start");
        let mut stmt = db.create_statement(Some(&tr)).expect("statement");
        stmt.set_timeout(Some(Duration::from_millis(1500)))
            .expect("timeout");
        stmt.prepare(INSERT_ROW).expect("prepare");
        stmt.execute(&[]).expect("execute");
    }

    assert_eq!(with_timeout.timeouts(), vec![1500]);
    assert_eq!(without_timeout.count("dsql_set_timeout"), 0);
}

#[test]
fn test_timeout_limit() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let mut stmt = db.create_statement(None).expect("statement");
    let err = stmt
        .set_timeout(Some(Duration::from_secs(u64::from(u32::MAX))))
        .unwrap_err();
    assert!(matches!(err, FbError::LimitExceeded { .. }));
    assert_eq!(stmt.timeout(), None);
}

#[test_case(&[ClientFeature::FbPing], true ; "nul terminated with fb_ping")]
#[test_case(&[], false ; "rejected without fb_ping")]
fn test_statement_text_over_64k(features: &[ClientFeature], accepted: bool) {
    let client = FakeClient::new(features.iter().copied());
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    let sql = format!("INSERT INTO T VALUES ('{}')", "x".repeat(70_000));

    let result = stmt.prepare(&sql);
    if accepted {
        result.expect("prepare");
        let (length, text) = client.prepared().pop().expect("prepared");
        assert_eq!(length, 0);
        assert_eq!(text.len(), sql.len() + 1);
        assert_eq!(text.last(), Some(&0));
    } else {
        assert!(matches!(
            result.unwrap_err(),
            FbError::LimitExceeded { limit: 65_535, .. }
        ));
        assert_eq!(client.count("dsql_prepare"), 0);
    }
}

#[test]
fn test_statement_text_at_limit_keeps_length() {
    let client = FakeClient::new([]);
    let db = common::attached(&client);
    let sql = "x".repeat(65_535);
    db.execute_immediate(&sql, None).expect("execute immediate");
    let (length, text) = client.prepared().pop().expect("executed");
    assert_eq!(length, 65_535);
    assert_eq!(text.len(), 65_535);
}

#[test]
fn test_ping_falls_back_to_info() {
    let pinging = FakeClient::with_all_features();
    common::attached(&pinging).ping().expect("ping");
    assert_eq!(pinging.count("ping"), 1);

    let legacy = FakeClient::new([]);
    common::attached(&legacy).ping().expect("ping");
    assert_eq!(legacy.count("ping"), 0);
    assert_eq!(legacy.count("database_info"), 2);
}

#[test]
fn test_failed_attach_info_detaches() {
    let client = FakeClient::with_all_features();
    let db = common::database(&client);
    client.fail_next("database_info", ISC_NETWORK_ERROR);

    let err = db.attach().unwrap_err();
    assert_eq!(err.error_code(), Some(ISC_NETWORK_ERROR));
    assert!(!db.is_attached());
    assert_eq!(client.count("detach_database"), 1);

    db.attach().expect("second attach");
    assert!(db.is_attached());
}

#[test]
fn test_unattached_database_rejects_calls() {
    let client = FakeClient::with_all_features();
    let db = common::database(&client);
    let err = db
        .start_transaction(&ParameterBuffer::read_committed())
        .unwrap_err();
    assert_eq!(err.error_code(), Some(ISC_BAD_DB_HANDLE));
    assert!(db.create_statement(None).unwrap_err().is_illegal_state());
    assert!(client.calls().is_empty());
}

#[test]
fn test_attach_twice_is_illegal() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    assert!(db.attach().unwrap_err().is_illegal_state());
    assert_eq!(client.count("attach_database"), 1);
}

#[derive(Default)]
struct RecordingListener(Mutex<Vec<Option<i32>>>);

impl ExceptionListener for RecordingListener {
    fn error_occurred(&self, error: &FbError) {
        self.0.lock().unwrap().push(error.error_code());
    }
}

#[test]
fn test_exception_listeners_see_library_errors() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let recording = Arc::new(RecordingListener::default());
    let listener: Arc<dyn ExceptionListener> = recording.clone();
    db.add_exception_listener(Arc::clone(&listener));

    client.fail_next("start_transaction", ISC_NETWORK_ERROR);
    db.start_transaction(&ParameterBuffer::read_committed())
        .unwrap_err();
    assert_eq!(*recording.0.lock().unwrap(), vec![Some(ISC_NETWORK_ERROR)]);

    db.remove_exception_listener(&listener);
    client.fail_next("start_transaction", ISC_NETWORK_ERROR);
    db.start_transaction(&ParameterBuffer::read_committed())
        .unwrap_err();
    assert_eq!(recording.0.lock().unwrap().len(), 1);
}

#[test]
fn test_live_resources_follow_handles() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let stmt = db.create_statement(Some(&tr)).expect("statement");
    assert_eq!(db.live_resources(ResourceKind::Transaction).unwrap(), 1);
    assert_eq!(db.live_resources(ResourceKind::Statement).unwrap(), 1);

    drop(stmt);
    assert_eq!(db.live_resources(ResourceKind::Statement).unwrap(), 0);
    tr.commit().expect("commit");
    drop(tr);
    assert_eq!(db.live_resources(ResourceKind::Transaction).unwrap(), 0);
}

#[test]
fn test_statement_of_closed_attachment_is_not_freed() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    stmt.prepare(SELECT_IDS).expect("prepare");
    tr.commit().expect("commit");
    db.detach().expect("detach");
    db.attach().expect("reattach");

    let err = stmt.execute(&[]).unwrap_err();
    assert!(err.is_illegal_state());
    drop(stmt);
    assert_eq!(client.count("dsql_free_statement(drop)"), 0);
}

#[test]
fn test_transaction_of_other_database_is_rejected() {
    let client = FakeClient::with_all_features();
    let first = common::attached(&client);
    let second = common::attached(&client);
    let tr = first
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let err = second.create_statement(Some(&tr)).unwrap_err();
    assert!(matches!(err, FbError::InvalidArgument(_)));
}

#[test]
fn test_create_and_drop_database() {
    let client = FakeClient::with_all_features();
    let db = common::database_with(&client, ConnectionProperties::new("/tmp/new.fdb"));
    assert_eq!(db.attach_name(), "/tmp/new.fdb");
    db.create().expect("create");
    assert!(db.is_attached());
    db.drop_database().expect("drop");
    assert!(!db.is_attached());
    assert_eq!(
        client.calls(),
        vec!["create_database", "database_info", "drop_database"]
    );
}

#[derive(Default)]
struct Warnings(Mutex<Vec<DatabaseWarning>>);

impl WarningCallback for Warnings {
    fn warning(&self, warning: DatabaseWarning) {
        self.0.lock().unwrap().push(warning);
    }
}

#[test]
fn test_cursor_name_needs_prepared_statement() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    assert!(stmt.set_cursor_name("C1").unwrap_err().is_illegal_state());

    stmt.prepare(SELECT_IDS).expect("prepare");
    assert!(matches!(
        stmt.set_cursor_name("C\0"),
        Err(FbError::InvalidArgument(_))
    ));
    stmt.set_cursor_name("C1").expect("cursor name");
    assert_eq!(client.count("dsql_set_cursor_name"), 1);
}

#[test]
fn test_warnings_reach_callback_without_failing() {
    const WARNING: i32 = 335_544_807;
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let warnings = Arc::new(Warnings::default());
    db.set_warning_callback(Some(warnings.clone()));
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("start");
    let mut stmt = db.create_statement(Some(&tr)).expect("statement");
    stmt.prepare(SELECT_IDS).expect("prepare");

    client.warn_next("dsql_set_cursor_name", WARNING);
    stmt.set_cursor_name("C1").expect("warning is not an error");
    let seen = warnings.0.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].code, WARNING);
}

/// Listener that queries the database it is registered on.
struct ReenteringListener {
    db: fbbridge_core::Database,
    seen: Mutex<Vec<FbResult<usize>>>,
}

impl ExceptionListener for ReenteringListener {
    fn error_occurred(&self, _error: &FbError) {
        let live = self.db.live_resources(ResourceKind::Transaction);
        self.seen.lock().unwrap().push(live);
    }
}

impl WarningCallback for ReenteringListener {
    fn warning(&self, _warning: DatabaseWarning) {
        let live = self.db.live_resources(ResourceKind::Transaction);
        self.seen.lock().unwrap().push(live);
    }
}

#[test]
fn test_listener_can_use_database_after_failure() {
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let reentering = Arc::new(ReenteringListener {
        db: db.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let listener: Arc<dyn ExceptionListener> = reentering.clone();
    db.add_exception_listener(Arc::clone(&listener));

    client.fail_next("start_transaction", ISC_NETWORK_ERROR);
    let err = db
        .start_transaction(&ParameterBuffer::read_committed())
        .unwrap_err();
    assert_eq!(err.error_code(), Some(ISC_NETWORK_ERROR));

    let seen = std::mem::take(&mut *reentering.seen.lock().unwrap());
    assert_eq!(seen.len(), 1);
    assert_eq!(*seen[0].as_ref().expect("live count"), 1);
    db.remove_exception_listener(&listener);
    assert_eq!(db.live_resources(ResourceKind::Transaction).expect("count"), 0);
}

#[test]
fn test_warning_callback_can_use_database() {
    const WARNING: i32 = 335_544_807;
    let client = FakeClient::with_all_features();
    let db = common::attached(&client);
    let reentering = Arc::new(ReenteringListener {
        db: db.clone(),
        seen: Mutex::new(Vec::new()),
    });
    db.set_warning_callback(Some(reentering.clone()));

    client.warn_next("start_transaction", WARNING);
    let tr = db
        .start_transaction(&ParameterBuffer::read_committed())
        .expect("warning is not an error");

    let seen = std::mem::take(&mut *reentering.seen.lock().unwrap());
    assert_eq!(seen.len(), 1);
    assert_eq!(*seen[0].as_ref().expect("live count"), 1);
    db.set_warning_callback(None);
    tr.commit().expect("commit");
}
