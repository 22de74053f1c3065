use std::io::Write;
use std::time::Duration;

use folio::config::{Config, Limits};

#[test]
fn test_default_network_section() {
    let cfg = Config::default();

    assert_eq!(cfg.network.port, 8080);
    assert_eq!(cfg.network.listen, 5);
    assert!(cfg.network.interface.is_none());
    assert!(!cfg.network.ipv6);
    assert!(cfg.www_root.is_none());
}

#[test]
fn test_default_limits() {
    let limits = Limits::default();

    assert_eq!(limits.max_clients, 0);
    assert_eq!(limits.clients_per_thread, 5);
    assert_eq!(limits.thread_floor, 0);
    assert_eq!(limits.max_header_line, 2048);
    assert_eq!(limits.timeout_secs, 5);
    assert_eq!(limits.thread_timeout_secs, 2);
}

#[test]
fn test_timeout_durations() {
    let limits = Limits::default();

    assert_eq!(limits.idle_timeout(), Duration::from_secs(5));
    assert_eq!(limits.thread_timeout(), Duration::from_secs(2));
}

#[test]
fn test_from_file_full() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "network:\n  interface: 127.0.0.1\n  port: 5984\n  listen: 64\n  ipv6: false\n\
         limits:\n  max_clients: 100\n  clients_per_thread: 10\n  thread_floor: 4\n  timeout_secs: 30\n\
         www_root: /var/www"
    )
    .unwrap();

    let cfg = Config::from_file(file.path()).unwrap();

    assert_eq!(cfg.network.interface.as_deref(), Some("127.0.0.1"));
    assert_eq!(cfg.network.port, 5984);
    assert_eq!(cfg.network.listen, 64);
    assert_eq!(cfg.limits.max_clients, 100);
    assert_eq!(cfg.limits.clients_per_thread, 10);
    assert_eq!(cfg.limits.thread_floor, 4);
    assert_eq!(cfg.limits.timeout_secs, 30);
    assert_eq!(cfg.www_root.as_deref(), Some(std::path::Path::new("/var/www")));
}

#[test]
fn test_from_file_partial_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "network:\n  port: 9000").unwrap();

    let cfg = Config::from_file(file.path()).unwrap();

    assert_eq!(cfg.network.port, 9000);
    assert_eq!(cfg.network.listen, 5);
    assert_eq!(cfg.limits.clients_per_thread, 5);
}

#[test]
fn test_from_file_missing_is_an_error() {
    assert!(Config::from_file(std::path::Path::new("/nonexistent/folio.yaml")).is_err());
}
