mod support;

use car_core::{
    CallContext, CarChanges, CarListQuery, CarRepository, ContextError, Database, DbError,
    RepoError, StoreError, TxError,
};
use std::cell::Cell;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use support::RecordingResolver;

fn setup() -> (Database, CarRepository) {
    let db = Database::open_in_memory().unwrap();
    let repo = CarRepository::new(Arc::new(RecordingResolver::default()));
    (db, repo)
}

#[test]
fn failed_unit_of_work_discards_its_create() {
    let (db, repo) = setup();
    let ctx = CallContext::background();
    let attempted = Cell::new(0);

    let err = db
        .run_in_transaction(&ctx, |session| -> Result<(), RepoError> {
            let id = repo.save(session, &CarChanges::new().model("Golf"))?;
            attempted.set(id);
            Err(RepoError::CarNotFound(-1))
        })
        .unwrap_err();

    assert!(matches!(err, RepoError::CarNotFound(-1)));
    assert!(attempted.get() > 0);
    assert!(matches!(
        repo.get_by_id(&db.session(&ctx), attempted.get()),
        Err(RepoError::CarNotFound(id)) if id == attempted.get()
    ));
}

#[test]
fn successful_unit_of_work_is_visible_afterwards() {
    let (db, repo) = setup();
    let ctx = CallContext::background();

    let (first, second) = db
        .run_in_transaction(&ctx, |session| -> Result<(i64, i64), RepoError> {
            let first = repo.save(session, &CarChanges::new().model("Golf"))?;
            let second = repo.save(session, &CarChanges::new().model("Polo"))?;
            repo.update(session, first, &CarChanges::new().registered_at(10))?;
            Ok((first, second))
        })
        .unwrap();

    let page = repo
        .list_car(&db.session(&ctx), &CarListQuery::new(1, 10))
        .unwrap();
    let ids = page.items.iter().map(|item| item.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![first, second]);
}

#[test]
fn reads_inside_unit_of_work_see_uncommitted_writes() {
    let (db, repo) = setup();
    let ctx = CallContext::background();

    let total = db
        .run_in_transaction(&ctx, |session| -> Result<u64, RepoError> {
            repo.save(session, &CarChanges::new().model("Golf"))?;
            Ok(repo.list_car(session, &CarListQuery::new(1, 10))?.total)
        })
        .unwrap();

    assert_eq!(total, 1);
}

#[test]
fn nested_transaction_is_rejected() {
    let (db, repo) = setup();
    let ctx = CallContext::background();

    let err = db
        .run_in_transaction(&ctx, |session| -> Result<(), RepoError> {
            repo.save(session, &CarChanges::new().model("Golf"))?;
            db.run_in_transaction(session.context(), |inner| {
                repo.save(inner, &CarChanges::new().model("Polo"))
                    .map(|_| ())
            })
        })
        .unwrap_err();

    assert!(matches!(err, RepoError::Transaction(TxError::Nested)));
    let page = repo
        .list_car(&db.session(&ctx), &CarListQuery::new(1, 10))
        .unwrap();
    assert_eq!(page.total, 0);
}

/// Runs `op` on its own thread and fails the test if it does not finish in time.
fn finishes_promptly<T: Send + 'static>(op: impl FnOnce() -> T + Send + 'static) -> T {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(op());
    });
    receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("unit of work blocked on the shared connection")
}

#[test]
fn nested_transaction_with_outer_context_is_rejected() {
    let (db, repo) = setup();

    let (err, total) = finishes_promptly(move || {
        let ctx = CallContext::background();
        let err = db
            .run_in_transaction(&ctx, |session| -> Result<(), RepoError> {
                repo.save(session, &CarChanges::new().model("Golf"))?;
                db.run_in_transaction(&ctx, |inner| {
                    repo.save(inner, &CarChanges::new().model("Polo")).map(|_| ())
                })
            })
            .unwrap_err();
        let total = repo
            .list_car(&db.session(&ctx), &CarListQuery::new(1, 10))
            .unwrap()
            .total;
        (err, total)
    });

    assert!(matches!(err, RepoError::Transaction(TxError::Nested)));
    assert_eq!(total, 0);
}

#[test]
fn ambient_session_inside_unit_of_work_fails_instead_of_blocking() {
    let (db, repo) = setup();

    let (err, total) = finishes_promptly(move || {
        let ctx = CallContext::background();
        let err = db
            .run_in_transaction(&ctx, |session| -> Result<(), RepoError> {
                repo.save(session, &CarChanges::new().model("Golf"))?;
                repo.save(&db.session(&ctx), &CarChanges::new().model("Polo"))?;
                Ok(())
            })
            .unwrap_err();
        let total = repo
            .list_car(&db.session(&ctx), &CarListQuery::new(1, 10))
            .unwrap()
            .total;
        (err, total)
    });

    assert!(matches!(
        err,
        RepoError::Store(StoreError::Db(DbError::HeldByTransaction))
    ));
    assert_eq!(total, 0);
}

#[test]
fn other_threads_wait_for_a_running_unit_of_work() {
    let (db, repo) = setup();
    let ctx = CallContext::background();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let writer = {
        let db = db.clone();
        let repo = repo.clone();
        thread::spawn(move || {
            let ctx = CallContext::background();
            db.run_in_transaction(&ctx, |session| -> Result<(), RepoError> {
                repo.save(session, &CarChanges::new().model("Golf"))?;
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(())
            })
        })
    };

    started_rx.recv().unwrap();
    let reader = {
        let db = db.clone();
        let repo = repo.clone();
        thread::spawn(move || {
            let ctx = CallContext::background();
            repo.list_car(&db.session(&ctx), &CarListQuery::new(1, 10))
                .map(|page| page.total)
        })
    };
    release_tx.send(()).unwrap();

    writer.join().unwrap().unwrap();
    assert_eq!(reader.join().unwrap().unwrap(), 1);
    let page = repo
        .list_car(&db.session(&ctx), &CarListQuery::new(1, 10))
        .unwrap();
    assert_eq!(page.total, 1);
}

#[test]
fn cancellation_inside_unit_of_work_rolls_back() {
    let (db, repo) = setup();
    let ctx = CallContext::background();

    let err = db
        .run_in_transaction(&ctx, |session| -> Result<(), RepoError> {
            repo.save(session, &CarChanges::new().model("Golf"))?;
            session.context().cancel();
            repo.save(session, &CarChanges::new().model("Polo"))?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::Interrupted(ContextError::Cancelled)
    ));

    let fresh = CallContext::background();
    let page = repo
        .list_car(&db.session(&fresh), &CarListQuery::new(1, 10))
        .unwrap();
    assert_eq!(page.total, 0);
}

#[test]
fn expired_deadline_prevents_transaction() {
    let (db, repo) = setup();
    let ctx = CallContext::background().with_deadline(std::time::Instant::now());

    let err = db
        .run_in_transaction(&ctx, |session| {
            repo.save(session, &CarChanges::new().model("Golf"))
        })
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::Interrupted(ContextError::DeadlineExceeded)
    ));
}

#[test]
fn file_database_commits_are_durable_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cars.db");
    let ctx = CallContext::background();
    let repo = CarRepository::new(Arc::new(RecordingResolver::default()));

    let id = {
        let db = Database::open(&path).unwrap();
        let id = db
            .run_in_transaction(&ctx, |session| {
                repo.save(session, &CarChanges::new().model("Golf"))
            })
            .unwrap();
        db.close().unwrap();
        id
    };

    let reopened = Database::open(&path).unwrap();
    let view = repo.get_by_id(&reopened.session(&ctx), id).unwrap();
    assert_eq!(view.model.as_deref(), Some("Golf"));
}
