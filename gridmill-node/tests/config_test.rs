use gridmill_node::{load_worker_config, MasterTarget, NodeError, WorkerConfig};
use std::io::Write;

#[test]
fn test_load_full_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "masters": [ {{ "hostname": "mill-1", "ip": "10.0.0.5", "port": 40000 }} ] }}"#
    )
    .unwrap();

    let config = load_worker_config(file.path()).unwrap();
    assert_eq!(config.masters.len(), 1);
    assert_eq!(config.masters[0].hostname, "mill-1");
    assert_eq!(
        config.masters[0].resolve().unwrap(),
        "10.0.0.5:40000".parse().unwrap()
    );
}

#[test]
fn test_missing_port_defaults() {
    let target = MasterTarget {
        hostname: "mill-1".into(),
        ip: Some("10.0.0.5".into()),
        port: None,
    };
    assert_eq!(target.resolve().unwrap(), "10.0.0.5:33310".parse().unwrap());
}

#[test]
fn test_missing_ip_resolves_hostname() {
    let target = MasterTarget {
        hostname: "localhost".into(),
        ip: None,
        port: Some(41000),
    };
    let addr = target.resolve().unwrap();
    assert_eq!(addr.port(), 41000);
    assert!(addr.ip().is_loopback());
}

#[test]
fn test_unresolvable_hostname_is_an_error() {
    let target = MasterTarget {
        hostname: "no-such-host.invalid".into(),
        ip: None,
        port: None,
    };
    assert!(matches!(target.resolve(), Err(NodeError::Resolve(_))));
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(matches!(
        load_worker_config(&path),
        Err(NodeError::Config { .. })
    ));
}

#[test]
fn test_malformed_file_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    assert!(matches!(
        load_worker_config(file.path()),
        Err(NodeError::Config { .. })
    ));
}

#[test]
fn test_config_roundtrips_through_serde() {
    let config = WorkerConfig {
        masters: vec![
            MasterTarget {
                hostname: "mill-1".into(),
                ip: None,
                port: None,
            },
            MasterTarget {
                hostname: "mill-2".into(),
                ip: Some("192.0.2.1".into()),
                port: Some(33311),
            },
        ],
    };
    let text = serde_json::to_string(&config).unwrap();
    let back: WorkerConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, config);
}
