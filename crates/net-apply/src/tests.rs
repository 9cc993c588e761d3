//! Tests for transactional apply and filtered reads

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use log::Level;
    use mockall::Sequence;
    use tempfile::TempDir;

    use ncif_config::{EncoderOptions, PayloadEncoder, ResponseDecoder};
    use ncif_core::{
        ConfigObject, ConfigSet, Datastore, ErrorKind, Filter, Ipv4Address, NetconfError,
        SessionError, TransactionState,
    };

    use crate::context::{EngineContext, EngineLogger, EnglishMessages};
    use crate::session::{MockSession, RpcReply, Session};
    use crate::{AuditSink, DeviceLocks, ReadEngine, TransactionalApplier};

    #[derive(Default)]
    struct CapturingLogger {
        lines: Mutex<Vec<(Level, String)>>,
    }

    impl CapturingLogger {
        fn lines_at(&self, level: Level) -> Vec<String> {
            self.lines
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, line)| line.clone())
                .collect()
        }
    }

    impl EngineLogger for CapturingLogger {
        fn log(&self, level: Level, message: &str) {
            self.lines.lock().unwrap().push((level, message.to_string()));
        }
    }

    fn desired() -> ConfigSet {
        ConfigSet::new(vec![
            ConfigObject::new("Gi0/0")
                .with_description("uplink")
                .with_address(Ipv4Address::new("10.0.0.1", "255.255.255.0")),
            ConfigObject::new("Gi0/1").with_description("core"),
        ])
        .unwrap()
    }

    fn applier() -> TransactionalApplier {
        TransactionalApplier::default().with_context(EngineContext::silent())
    }

    fn session() -> MockSession {
        let mut session = MockSession::new();
        session.expect_host().return_const("sandbox".to_string());
        session
    }

    fn rejected(operation: &str) -> SessionError {
        SessionError::Rejected {
            operation: operation.to_string(),
            message: "resource denied".to_string(),
        }
    }

    #[tokio::test]
    async fn test_lock_failure_touches_nothing_else() {
        let mut session = session();
        session
            .expect_lock()
            .times(1)
            .returning(|_| Err(rejected("lock")));
        session.expect_edit_config().never();
        session.expect_validate().never();
        session.expect_commit().never();
        session.expect_discard().never();
        session.expect_unlock().never();

        let err = applier().apply(&desired(), &session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockFailed);
        match err {
            NetconfError::Apply(apply) => {
                assert_eq!(apply.host, "sandbox");
                assert_eq!(apply.last_state, TransactionState::Idle);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn test_successful_edit_and_validate_commits() {
        let mut seq = Sequence::new();
        let mut session = session();
        session
            .expect_lock()
            .withf(|target| *target == Datastore::Candidate)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        session
            .expect_edit_config()
            .withf(|target, document| {
                *target == Datastore::Candidate
                    && document.contains("<interface-name>Gi0/0</interface-name>")
                    && document.contains("<interface-name>Gi0/1</interface-name>")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(RpcReply::ok()));
        session
            .expect_validate()
            .withf(|source| *source == Datastore::Candidate)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(RpcReply::ok()));
        session
            .expect_commit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        session
            .expect_unlock()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        session.expect_discard().never();

        let outcome = applier().apply(&desired(), &session).await.unwrap();
        assert!(outcome.committed);
        assert_eq!(outcome.final_state, TransactionState::Committed);
        assert_eq!(outcome.failure_reason, None);
        assert_eq!(outcome.applied, desired());
        assert_eq!(outcome.host, "sandbox");
        assert!(outcome.transaction_id.starts_with("txn_"));
    }

    #[tokio::test]
    async fn test_rejected_edit_is_discarded() {
        let mut seq = Sequence::new();
        let mut session = session();
        session
            .expect_lock()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        session
            .expect_edit_config()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(RpcReply::rejected(vec!["bad netmask".to_string()])));
        session
            .expect_validate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(RpcReply::ok()));
        session
            .expect_discard()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        session
            .expect_unlock()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        session.expect_commit().never();

        let outcome = applier().apply(&desired(), &session).await.unwrap();
        assert!(!outcome.committed);
        assert_eq!(outcome.final_state, TransactionState::Discarded);
        assert_eq!(outcome.failure_reason, Some(ErrorKind::EditFailed));
        assert_eq!(outcome.rejections, vec!["bad netmask".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_validation_is_discarded() {
        let mut session = session();
        session.expect_lock().times(1).returning(|_| Ok(()));
        session
            .expect_edit_config()
            .times(1)
            .returning(|_, _| Ok(RpcReply::ok()));
        session
            .expect_validate()
            .times(1)
            .returning(|_| Ok(RpcReply::rejected(vec!["duplicate address".to_string()])));
        session.expect_discard().times(1).returning(|| Ok(()));
        session.expect_unlock().times(1).returning(|_| Ok(()));
        session.expect_commit().never();

        let outcome = applier().apply(&desired(), &session).await.unwrap();
        assert_eq!(outcome.final_state, TransactionState::Discarded);
        assert_eq!(outcome.failure_reason, Some(ErrorKind::ValidateFailed));
        assert_eq!(outcome.rejections, vec!["duplicate address".to_string()]);
    }

    #[tokio::test]
    async fn test_commit_only_when_both_steps_succeed() {
        for (edit_ok, validate_ok) in [(true, true), (true, false), (false, true), (false, false)]
        {
            let should_commit = edit_ok && validate_ok;
            let reply = |ok: bool| {
                if ok {
                    RpcReply::ok()
                } else {
                    RpcReply::rejected(Vec::new())
                }
            };

            let mut session = session();
            session.expect_lock().times(1).returning(|_| Ok(()));
            let edit = reply(edit_ok);
            session
                .expect_edit_config()
                .times(1)
                .returning(move |_, _| Ok(edit.clone()));
            let validate = reply(validate_ok);
            session
                .expect_validate()
                .times(1)
                .returning(move |_| Ok(validate.clone()));
            session
                .expect_commit()
                .times(usize::from(should_commit))
                .returning(|| Ok(()));
            session
                .expect_discard()
                .times(usize::from(!should_commit))
                .returning(|| Ok(()));
            session.expect_unlock().times(1).returning(|_| Ok(()));

            let outcome = applier().apply(&desired(), &session).await.unwrap();
            assert_eq!(outcome.committed, should_commit);
        }
    }

    #[tokio::test]
    async fn test_commit_failure_discards_and_releases() {
        let mut seq = Sequence::new();
        let mut session = session();
        session
            .expect_lock()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        session
            .expect_edit_config()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(RpcReply::ok()));
        session
            .expect_validate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(RpcReply::ok()));
        session
            .expect_commit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(rejected("commit")));
        session
            .expect_discard()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        session
            .expect_unlock()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let err = applier().apply(&desired(), &session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommitFailed);
        match err {
            NetconfError::Apply(apply) => {
                assert_eq!(apply.last_state, TransactionState::Validated)
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn test_edit_transport_failure_aborts() {
        let mut session = session();
        session.expect_lock().times(1).returning(|_| Ok(()));
        session
            .expect_edit_config()
            .times(1)
            .returning(|_, _| Err(SessionError::Transport("channel closed".to_string())));
        session.expect_validate().never();
        session.expect_commit().never();
        session.expect_discard().times(1).returning(|| Ok(()));
        session.expect_unlock().times(1).returning(|_| Ok(()));

        let err = applier().apply(&desired(), &session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EditFailed);
        assert!(err.to_string().contains("channel closed"));
    }

    #[tokio::test]
    async fn test_validate_timeout_aborts() {
        let mut session = session();
        session.expect_lock().times(1).returning(|_| Ok(()));
        session
            .expect_edit_config()
            .times(1)
            .returning(|_, _| Ok(RpcReply::ok()));
        session
            .expect_validate()
            .times(1)
            .returning(|_| Err(SessionError::Timeout(Duration::from_secs(30))));
        session.expect_commit().never();
        session.expect_discard().times(1).returning(|| Ok(()));
        session.expect_unlock().times(1).returning(|_| Ok(()));

        let err = applier().apply(&desired(), &session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidateFailed);
    }

    #[tokio::test]
    async fn test_release_failure_is_logged_not_raised() {
        let logger = Arc::new(CapturingLogger::default());
        let applier = TransactionalApplier::default()
            .with_context(EngineContext::new(logger.clone(), Arc::new(EnglishMessages)));

        let mut session = session();
        session.expect_lock().times(1).returning(|_| Ok(()));
        session
            .expect_edit_config()
            .times(1)
            .returning(|_, _| Ok(RpcReply::ok()));
        session
            .expect_validate()
            .times(1)
            .returning(|_| Ok(RpcReply::ok()));
        session.expect_commit().times(1).returning(|| Ok(()));
        session
            .expect_unlock()
            .times(1)
            .returning(|_| Err(SessionError::Transport("broken pipe".to_string())));

        let outcome = applier.apply(&desired(), &session).await.unwrap();
        assert!(outcome.committed);

        let errors = logger.lines_at(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unlock"));
        assert!(errors[0].contains("broken pipe"));
        assert!(logger
            .lines_at(Level::Debug)
            .iter()
            .any(|line| line.ends_with("Committed -> Released")));
    }

    #[tokio::test]
    async fn test_empty_set_policy_rejects_before_locking() {
        let applier = TransactionalApplier::new(PayloadEncoder::new(
            EncoderOptions::default().require_non_empty(true),
        ))
        .with_context(EngineContext::silent());

        let mut session = session();
        session.expect_lock().never();

        let err = applier
            .apply(&ConfigSet::empty(), &session)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyConfigSet);
    }

    /// Hand written session recording calls and lock overlap
    struct RecordingSession {
        host: String,
        reply: Result<String, String>,
        calls: Mutex<Vec<String>>,
        holders: Arc<AtomicUsize>,
        max_holders: Arc<AtomicUsize>,
    }

    impl RecordingSession {
        fn new(host: &str, reply: Result<&str, &str>) -> Self {
            Self {
                host: host.to_string(),
                reply: reply.map(str::to_string).map_err(str::to_string),
                calls: Mutex::new(Vec::new()),
                holders: Arc::new(AtomicUsize::new(0)),
                max_holders: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn sharing_counters(host: &str, other: &RecordingSession) -> Self {
            Self {
                holders: other.holders.clone(),
                max_holders: other.max_holders.clone(),
                ..Self::new(host, Ok("<data/>"))
            }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl Session for RecordingSession {
        fn host(&self) -> String {
            self.host.clone()
        }

        async fn get_config(
            &self,
            _source: Datastore,
            _filter: &Filter,
        ) -> Result<String, SessionError> {
            self.record("get-config");
            self.reply.clone().map_err(SessionError::Transport)
        }

        async fn lock(&self, _target: Datastore) -> Result<(), SessionError> {
            self.record("lock");
            let holders = self.holders.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_holders.fetch_max(holders, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        }

        async fn unlock(&self, _target: Datastore) -> Result<(), SessionError> {
            self.record("unlock");
            self.holders.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn edit_config(
            &self,
            _target: Datastore,
            _document: &str,
        ) -> Result<RpcReply, SessionError> {
            self.record("edit-config");
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(RpcReply::ok())
        }

        async fn validate(&self, _source: Datastore) -> Result<RpcReply, SessionError> {
            self.record("validate");
            Ok(RpcReply::ok())
        }

        async fn commit(&self) -> Result<(), SessionError> {
            self.record("commit");
            Ok(())
        }

        async fn discard(&self) -> Result<(), SessionError> {
            self.record("discard-changes");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_applies_to_one_device_are_serialized() {
        let locks = Arc::new(DeviceLocks::new());
        let first = Arc::new(RecordingSession::new("r1", Ok("<data/>")));
        let second = Arc::new(RecordingSession::sharing_counters("r1", &first));

        let mut tasks = Vec::new();
        for session in [first.clone(), second.clone()] {
            let applier = TransactionalApplier::default()
                .with_device_locks(locks.clone())
                .with_context(EngineContext::silent());
            tasks.push(tokio::spawn(async move {
                applier.apply(&desired(), session.as_ref()).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap().committed);
        }

        assert_eq!(first.max_holders.load(Ordering::SeqCst), 1);
        assert_eq!(
            *first.calls.lock().unwrap(),
            vec!["lock", "edit-config", "validate", "commit", "unlock"]
        );
    }

    const SCENARIO_REPLY: &str = "<data><interfaces><interface>\
        <interface-name>Gi0/0</interface-name><description>uplink</description>\
        <ipv4><addresses><address><address>10.0.0.1</address>\
        <netmask>255.255.255.0</netmask></address></addresses></ipv4>\
        </interface></interfaces></data>";

    #[tokio::test]
    async fn test_read_decodes_and_stores_reply() {
        let temp_dir = TempDir::new().unwrap();
        let audit = AuditSink::new(temp_dir.path());
        let engine = ReadEngine::new(ResponseDecoder::default())
            .with_audit(audit.clone())
            .with_context(EngineContext::silent());
        let session = RecordingSession::new("10.10.20.70", Ok(SCENARIO_REPLY));

        let set = engine
            .read(&Filter::new("<interfaces/>"), &session)
            .await
            .unwrap();
        assert_eq!(
            set.get("Gi0/0"),
            Some(
                &ConfigObject::new("Gi0/0")
                    .with_description("uplink")
                    .with_address(Ipv4Address::new("10.0.0.1", "255.255.255.0"))
            )
        );
        assert_eq!(
            std::fs::read_to_string(audit.path_for("10.10.20.70")).unwrap(),
            SCENARIO_REPLY
        );
    }

    #[tokio::test]
    async fn test_read_survives_audit_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let logger = Arc::new(CapturingLogger::default());
        let engine = ReadEngine::default()
            .with_audit(AuditSink::new(&blocker))
            .with_context(EngineContext::new(logger.clone(), Arc::new(EnglishMessages)));
        let session = RecordingSession::new("r1", Ok(SCENARIO_REPLY));

        let set = engine.read(&Filter::new("<interfaces/>"), &session).await.unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(logger.lines_at(Level::Warn).len(), 1);
    }

    #[tokio::test]
    async fn test_read_classifies_failures() {
        let temp_dir = TempDir::new().unwrap();
        let audit = AuditSink::new(temp_dir.path());
        let engine = ReadEngine::default()
            .with_audit(audit.clone())
            .with_context(EngineContext::silent());

        let unreachable = RecordingSession::new("r1", Err("No route to host"));
        let err = engine
            .read(&Filter::new("<interfaces/>"), &unreachable)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportUnreachable);
        assert_eq!(err.host(), Some("r1"));

        let unexpected = RecordingSession::new("r2", Ok("<rpc-reply><ok/></rpc-reply>"));
        let err = engine
            .read(&Filter::new("<interfaces/>"), &unexpected)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProjectionMissing);
        assert!(audit.path_for("r2").exists());
    }

    #[tokio::test]
    async fn test_read_empty_data_matches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let audit = AuditSink::new(temp_dir.path());
        let engine = ReadEngine::default()
            .with_audit(audit.clone())
            .with_context(EngineContext::silent());

        for (host, reply) in [
            ("r3", "<data/>"),
            ("r4", r#"<data xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"></data>"#),
        ] {
            let session = RecordingSession::new(host, Ok(reply));
            let set = engine
                .read(&Filter::new("<interfaces/>"), &session)
                .await
                .unwrap();
            assert!(set.is_empty());
            assert_eq!(std::fs::read_to_string(audit.path_for(host)).unwrap(), reply);
        }
    }
}
