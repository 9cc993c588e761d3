//! Tests for ssh sessions against scripted ssh stand-ins

#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use tempfile::TempDir;

    use ncif_apply::{Connector, Session};
    use ncif_config::Settings;
    use ncif_core::{Datastore, ErrorKind, Filter, SessionError};

    use crate::{FailureClassifier, SshConnector, SshOptions};

    const HELLO: &str = "<hello xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\"><capabilities>\
        <capability>urn:ietf:params:netconf:base:1.0</capability>\
        <capability>urn:ietf:params:netconf:capability:candidate:1.0</capability>\
        <capability>urn:ietf:params:netconf:capability:validate:1.0</capability>\
        </capabilities><session-id>17</session-id></hello>";

    fn options(command: &Path) -> SshOptions {
        SshOptions {
            command: command.display().to_string(),
            host: "sandbox-iosxr-1.cisco.com".to_string(),
            port: 830,
            username: "admin".to_string(),
            password: None,
            key_file: None,
            hostkey_verify: true,
            allow_agent: true,
            look_for_keys: true,
            timeout: Duration::from_secs(5),
            askpass_program: None,
        }
    }

    /// Write an executable shell script standing in for ssh
    fn fake_ssh(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-ssh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn frame(message: &str) -> String {
        format!("printf '%s]]>]]>' '{}'\n", message)
    }

    #[test]
    fn test_arguments_from_settings() {
        let settings = Settings {
            host: "10.10.20.70".to_string(),
            username: "admin".to_string(),
            ..Settings::default()
        };
        let args = SshOptions::from_settings(&settings).arguments();

        assert_eq!(&args[..5], ["-s", "-p", "830", "-l", "admin"]);
        assert!(args.contains(&"ConnectTimeout=30".to_string()));
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(!args.contains(&"StrictHostKeyChecking=no".to_string()));
        assert_eq!(&args[args.len() - 2..], ["10.10.20.70", "netconf"]);
    }

    #[test]
    fn test_arguments_relaxed_auth() {
        let mut options = options(Path::new("ssh"));
        options.hostkey_verify = false;
        options.allow_agent = false;
        options.password = Some("secret".to_string());
        options.key_file = Some(PathBuf::from("/home/admin/.ssh/id_ed25519"));
        let args = options.arguments();

        for expected in [
            "StrictHostKeyChecking=no",
            "UserKnownHostsFile=/dev/null",
            "IdentityAgent=none",
            "IdentitiesOnly=yes",
            "NumberOfPasswordPrompts=1",
            "/home/admin/.ssh/id_ed25519",
        ] {
            assert!(args.contains(&expected.to_string()), "missing {}", expected);
        }
        assert!(!args.contains(&"BatchMode=yes".to_string()));
        assert!(!format!("{:?}", options).contains("secret"));
    }

    #[test]
    fn test_failure_classification() {
        let classifier = FailureClassifier::new().unwrap();

        assert!(matches!(
            classifier.classify("Warning: Permanently added\nadmin@r1: Permission denied (publickey,password).\n"),
            Some(SessionError::Authentication(_))
        ));
        assert!(matches!(
            classifier.classify("ssh: Could not resolve hostname nowhere: Name or service not known"),
            Some(SessionError::Transport(_))
        ));
        assert!(matches!(
            classifier.classify("ssh: connect to host r1 port 830: Connection timed out"),
            Some(SessionError::Transport(_))
        ));
        assert!(classifier.classify("debug1: Reading configuration data").is_none());
    }

    #[tokio::test]
    async fn test_scripted_session() {
        let dir = TempDir::new().unwrap();
        let data = "<rpc-reply message-id=\"2\"><data><interfaces>\
            <interface><interface-name>Gi0/0</interface-name></interface>\
            </interfaces></data></rpc-reply>";
        let script = [
            frame(HELLO),
            frame("<rpc-reply message-id=\"1\"><ok/></rpc-reply>"),
            frame(data),
            frame("<rpc-reply message-id=\"3\"><rpc-error><error-severity>error</error-severity><error-message>bad value</error-message></rpc-error></rpc-reply>"),
            frame("<rpc-reply message-id=\"4\"><ok/></rpc-reply>"),
            "cat > /dev/null".to_string(),
        ]
        .concat();
        let connector = SshConnector::new(options(&fake_ssh(&dir, &script)));

        let session = connector.connect().await.unwrap();
        assert_eq!(session.host(), "sandbox-iosxr-1.cisco.com");
        assert_eq!(session.capabilities().len(), 3);

        session.lock(Datastore::Candidate).await.unwrap();

        let document = session
            .get_config(Datastore::Running, &Filter::new("<interfaces/>"))
            .await
            .unwrap();
        assert!(document.starts_with("<data>"));
        assert!(document.contains("<interface-name>Gi0/0</interface-name>"));

        let reply = session
            .edit_config(Datastore::Candidate, "<config/>")
            .await
            .unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.errors, vec!["bad value".to_string()]);

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_late_reply_after_timeout_is_skipped() {
        let dir = TempDir::new().unwrap();
        let script = [
            frame(HELLO),
            "sleep 1\n".to_string(),
            frame("<rpc-reply message-id=\"1\"><ok/></rpc-reply>"),
            frame("<rpc-reply message-id=\"2\"><ok/></rpc-reply>"),
            frame("<rpc-reply message-id=\"3\"><ok/></rpc-reply>"),
            "cat > /dev/null".to_string(),
        ]
        .concat();
        let mut options = options(&fake_ssh(&dir, &script));
        options.timeout = Duration::from_millis(800);
        let session = SshConnector::new(options).connect().await.unwrap();

        let err = session.lock(Datastore::Candidate).await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));

        session.unlock(Datastore::Candidate).await.unwrap();
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_authentication_failure() {
        let dir = TempDir::new().unwrap();
        let script = "echo 'admin@sandbox: Permission denied (publickey,password).' >&2\nexit 255";
        let connector = SshConnector::new(options(&fake_ssh(&dir, script)));

        let err = connector.connect().await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(err.to_string().contains("Permission denied"));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let dir = TempDir::new().unwrap();
        let script = "echo 'ssh: connect to host sandbox port 830: Connection refused' >&2\nexit 255";
        let connector = SshConnector::new(options(&fake_ssh(&dir, script)));

        let err = connector.connect().await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::TransportUnreachable);
    }

    #[tokio::test]
    async fn test_silent_device_times_out() {
        let dir = TempDir::new().unwrap();
        let mut options = options(&fake_ssh(&dir, "sleep 10"));
        options.timeout = Duration::from_millis(200);

        let err = SshConnector::new(options).connect().await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::TransportUnreachable);
    }

    #[tokio::test]
    async fn test_missing_ssh_binary() {
        let dir = TempDir::new().unwrap();
        let connector = SshConnector::new(options(&dir.path().join("no-such-ssh")));

        let err = connector.connect().await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::TransportUnreachable);
    }
}
