use std::path::Path;

use statik::config::{Backend, Cli, Config};

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.root, Path::new("."));
    assert_eq!(cfg.index, "index.html");
    assert!(cfg.list_directories);
    assert_eq!(cfg.threads, 4);
    assert_eq!(cfg.slots, 64);
    assert_eq!(cfg.backend, Backend::Epoll);
    assert!(!cfg.chroot);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_config_from_yaml_keeps_defaults_for_missing_keys() {
    let cfg = Config::from_yaml_str(
        "listen_addr: \"0.0.0.0:3000\"\nroot: /srv/www\nbackend: poll\nlist_directories: false\n",
    )
    .unwrap();

    assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.root, Path::new("/srv/www"));
    assert_eq!(cfg.backend, Backend::Poll);
    assert!(!cfg.list_directories);
    assert_eq!(cfg.threads, 4);
}

#[test]
fn test_config_rejects_unknown_backend() {
    assert!(Config::from_yaml_str("backend: select\n").is_err());
}

#[test]
fn test_config_file_and_listen_env() {
    let path = std::env::temp_dir().join(format!("statik-config-{}.yaml", std::process::id()));
    std::fs::write(&path, "listen_addr: \"127.0.0.1:9000\"\nthreads: 2\n").unwrap();

    unsafe {
        std::env::set_var("LISTEN", "0.0.0.0:5000");
    }
    let cfg = Config::load(Some(&path)).unwrap();
    unsafe {
        std::env::remove_var("LISTEN");
    }

    assert_eq!(cfg.listen_addr, "0.0.0.0:5000");
    assert_eq!(cfg.threads, 2);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_config_missing_file() {
    assert!(Config::load(Some(Path::new("/nonexistent/statik.yaml"))).is_err());
}

#[test]
fn test_config_validation() {
    let mut cfg = Config::default();
    cfg.threads = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.slots = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.index = String::new();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_fd_budget() {
    let mut cfg = Config::default();
    cfg.threads = 2;
    cfg.slots = 10;
    assert_eq!(cfg.fd_budget(), 3 + 2 + 20 + 10);
}

#[test]
fn test_cli_overrides() {
    let mut cfg = Config::default();
    let cli = Cli {
        listen: Some("[::1]:8443".to_string()),
        threads: Some(1),
        no_listing: true,
        backend: Some(Backend::Poll),
        ..Cli::default()
    };
    cli.apply(&mut cfg);

    assert_eq!(cfg.listen_addr, "[::1]:8443");
    assert_eq!(cfg.threads, 1);
    assert!(!cfg.list_directories);
    assert_eq!(cfg.backend, Backend::Poll);
    assert_eq!(cfg.slots, 64);
}

#[test]
fn test_cli_parses_flags() {
    use clap::Parser;

    let cli = Cli::try_parse_from(["statik", "-r", "/tmp", "-t", "8", "--backend", "poll"]).unwrap();
    assert_eq!(cli.root.as_deref(), Some(Path::new("/tmp")));
    assert_eq!(cli.threads, Some(8));
    assert_eq!(cli.backend, Some(Backend::Poll));
}
