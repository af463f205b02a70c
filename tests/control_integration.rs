//! Integration tests for keyword-level service operations

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use svcctl::{
    CommandError, ConfigOptions, LogOptions, ManagerError, ManagerKind, SafeRestart, ScriptedRunner,
    ServiceControl, ServiceError, Settings,
};

const ACTIVE: &str = "\
● fail2ban.service - Fail2Ban Service
     Loaded: loaded (/lib/systemd/system/fail2ban.service; enabled; preset: enabled)
     Active: active (running) since Mon 2024-01-01 10:00:00 UTC; 2s ago
";

const INACTIVE: &str = "\
○ fail2ban.service - Fail2Ban Service
     Loaded: loaded (/lib/systemd/system/fail2ban.service; enabled; preset: enabled)
     Active: inactive (dead)
";

fn args(argv: &[String]) -> Vec<&str> {
    argv.iter().map(String::as_str).collect()
}

fn settings(dir: &Path, kind: ManagerKind) -> Settings {
    Settings {
        resource_dir: dir.to_path_buf(),
        priority: vec![kind],
        elevation_tool: None,
        init_retries: 1,
        ..Settings::default()
    }
}

/// systemd host with fail2ban installed; `running` tracks start/stop
fn fail2ban_host(running: Arc<AtomicBool>) -> Arc<ScriptedRunner> {
    Arc::new(
        ScriptedRunner::new(move |argv| match args(argv).as_slice() {
            ["systemctl", "list-unit-files", "fail2ban.service"] => {
                Ok("fail2ban.service enabled enabled\n\n1 unit files listed.\n".into())
            }
            ["systemctl", "list-unit-files", _] => Err(CommandError::exit(argv, 1, "0 unit files listed.\n")),
            ["systemctl", "list-unit-files", "--type=service", "--no-legend"] => {
                Ok("fail2ban.service enabled enabled\n".into())
            }
            ["systemctl", "start" | "restart", "fail2ban.service"] => {
                running.store(true, Ordering::SeqCst);
                Ok(String::new())
            }
            ["systemctl", "stop", "fail2ban.service"] => {
                running.store(false, Ordering::SeqCst);
                Ok(String::new())
            }
            ["systemctl", "status", "fail2ban.service"] => {
                if running.load(Ordering::SeqCst) {
                    Ok(ACTIVE.into())
                } else {
                    Err(CommandError::exit(argv, 3, INACTIVE))
                }
            }
            ["systemctl", "is-enabled", "fail2ban.service"] => Ok("enabled\n".into()),
            ["systemctl", "reload", "fail2ban.service"] => Ok(String::new()),
            ["tail", ..] | ["cat", ..] => Ok("last line\n".into()),
            ["fail2ban-client", "-t"] => Ok("OK: configuration test is successful\n".into()),
            ["false"] => Err(CommandError::exit(argv, 1, "ERROR: bad jail\n")),
            _ => Err(CommandError::exit(argv, 1, "unexpected command\n")),
        })
        .with_programs(&["systemctl"]),
    )
}

async fn fail2ban_control(dir: &Path) -> (ServiceControl, Arc<ScriptedRunner>, Arc<AtomicBool>) {
    let running = Arc::new(AtomicBool::new(false));
    let runner = fail2ban_host(running.clone());
    let control = ServiceControl::with_runner(settings(dir, ManagerKind::Systemd), runner.clone())
        .await
        .unwrap();
    (control, runner, running)
}

#[tokio::test]
async fn test_start_then_status_active() {
    let dir = tempfile::tempdir().unwrap();
    let (control, runner, _) = fail2ban_control(dir.path()).await;

    let before = control.status("fail2ban").await.unwrap();
    assert!(!before.is_active);
    assert!(before.is_enabled);
    assert!(before.is_exists);

    let result = control.start("fail2ban").await.unwrap();
    assert!(result.success);
    assert_eq!(result.message, "start : fail2ban.service completed");
    assert_eq!(runner.count(|a| a == ["systemctl", "start", "fail2ban.service"]), 1);

    let after = control.status("fail2ban").await.unwrap();
    assert!(after.is_active);
    assert!(after.output.contains("active (running)"));

    control.stop("fail2ban").await.unwrap();
    assert!(!control.is_active("fail2ban").await);
}

#[tokio::test]
async fn test_status_serializes_camel_case() {
    let dir = tempfile::tempdir().unwrap();
    let (control, _, _) = fail2ban_control(dir.path()).await;

    let status = control.status("fail2ban").await.unwrap();
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["isActive"], false);
    assert_eq!(json["isEnabled"], true);
    assert_eq!(json["isExists"], true);
}

#[tokio::test]
async fn test_display_helpers_swallow_errors() {
    let dir = tempfile::tempdir().unwrap();
    let (control, _, _) = fail2ban_control(dir.path()).await;

    assert!(control.is_exist("fail2ban").await);
    assert!(control.is_enabled("fail2ban").await);

    assert!(!control.is_exist("nonexistent-xyz").await);
    assert!(!control.is_active("nonexistent-xyz").await);
    assert!(!control.is_enabled("nonexistent-xyz").await);
    assert!(control.status("nonexistent-xyz").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_custom_action_verbs() {
    let dir = tempfile::tempdir().unwrap();
    let (control, runner, _) = fail2ban_control(dir.path()).await;

    let result = control.custom_action("reload", "fail2ban").await.unwrap();
    assert_eq!(result.message, "reload : fail2ban.service completed");
    assert_eq!(runner.count(|a| a == ["systemctl", "reload", "fail2ban.service"]), 1);

    let err = control.custom_action("rm -rf", "fail2ban").await.unwrap_err();
    assert!(matches!(err, ServiceError::Manager(ManagerError::InvalidAction(_))));
}

#[tokio::test]
async fn test_failed_action_carries_output() {
    let dir = tempfile::tempdir().unwrap();
    let (control, _, _) = fail2ban_control(dir.path()).await;

    let err = control.enable("fail2ban").await.unwrap_err();
    match err {
        ServiceError::CommandFailed { service, action, source } => {
            assert_eq!(service, "fail2ban.service");
            assert_eq!(action, "enable");
            assert!(source.output.contains("unexpected command"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_safe_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (control, runner, running) = fail2ban_control(dir.path()).await;
    let conf = dir.path().join("jail.local");
    fs::write(&conf, "[DEFAULT]\n").unwrap();

    let opts = SafeRestart {
        config_paths: vec![conf.clone()],
        check: Some(vec!["fail2ban-client".into(), "-t".into()]),
    };
    control.safe_restart("fail2ban", &opts).await.unwrap();
    assert!(running.load(Ordering::SeqCst));
    assert_eq!(runner.count(|a| a == ["fail2ban-client", "-t"]), 1);
}

#[tokio::test]
async fn test_safe_restart_refuses_bad_config() {
    let dir = tempfile::tempdir().unwrap();
    let (control, runner, _) = fail2ban_control(dir.path()).await;

    let missing = SafeRestart {
        config_paths: vec![PathBuf::from("/nonexistent/jail.local")],
        check: None,
    };
    let err = control.safe_restart("fail2ban", &missing).await.unwrap_err();
    assert!(matches!(err, ServiceError::ConfigMissing(_)));

    let failing = SafeRestart {
        config_paths: Vec::new(),
        check: Some(vec!["false".into()]),
    };
    let err = control.safe_restart("fail2ban", &failing).await.unwrap_err();
    match err {
        ServiceError::ConfigTest(e) => assert!(e.output.contains("bad jail")),
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(runner.count(|a| a.get(1).is_some_and(|v| v == "restart")), 0);
}

#[tokio::test]
async fn test_safe_restart_requires_active() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new(|argv| match args(argv).as_slice() {
            ["systemctl", "list-unit-files", "nginx.service"] => Ok("nginx.service enabled enabled\n".into()),
            ["systemctl", "restart", "nginx.service"] => Ok(String::new()),
            // Crashes right after restarting
            ["systemctl", "status", "nginx.service"] => {
                Err(CommandError::exit(argv, 3, "Active: failed (Result: exit-code)"))
            }
            _ => Err(CommandError::exit(argv, 1, "")),
        })
        .with_programs(&["systemctl"]),
    );
    let control = ServiceControl::with_runner(settings(dir.path(), ManagerKind::Systemd), runner)
        .await
        .unwrap();

    let err = control.safe_restart("nginx", &SafeRestart::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotActiveAfterRestart(ref name) if name == "nginx.service"));
}

#[tokio::test]
async fn test_unit_path_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let etc = dir.path().join("etc");
    let lib = dir.path().join("lib");
    fs::create_dir_all(&etc).unwrap();
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join("fail2ban.service"), "[Unit]\n").unwrap();

    let running = Arc::new(AtomicBool::new(false));
    let settings = Settings {
        unit_paths: vec![etc.clone(), lib.clone()],
        ..settings(dir.path(), ManagerKind::Systemd)
    };
    let control = ServiceControl::with_runner(settings, fail2ban_host(running))
        .await
        .unwrap();

    assert_eq!(control.service_path("fail2ban").await.unwrap(), lib.join("fail2ban.service"));

    // An override in /etc takes precedence
    fs::write(etc.join("fail2ban.service"), "[Unit]\n").unwrap();
    assert_eq!(control.service_path("fail2ban").await.unwrap(), etc.join("fail2ban.service"));
}

#[tokio::test]
async fn test_unit_path_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new(|argv| match args(argv).as_slice() {
            ["systemctl", "list-unit-files", name] if *name == "a..b.service" => Ok("a..b.service\n".into()),
            _ => Err(CommandError::exit(argv, 1, "")),
        })
        .with_programs(&["systemctl"]),
    );
    let control = ServiceControl::with_runner(settings(dir.path(), ManagerKind::Systemd), runner)
        .await
        .unwrap();

    let err = control.service_path("a..b").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidPath(_)));
}

#[tokio::test]
async fn test_view_log() {
    let dir = tempfile::tempdir().unwrap();
    let (control, runner, _) = fail2ban_control(dir.path()).await;
    let log = dir.path().join("fail2ban.log");
    fs::write(&log, "first\nlast line\n").unwrap();
    let log_arg = log.display().to_string();

    let out = control
        .view_log(&log, &LogOptions { tail_lines: "+1".into() })
        .await
        .unwrap();
    assert_eq!(out, "last line\n");
    assert_eq!(runner.count(|a| a == ["tail", "-n", "1", log_arg.as_str()]), 1);

    control.view_log(&log, &LogOptions::default()).await.unwrap();
    assert_eq!(runner.count(|a| a == ["tail", "-n", "100", log_arg.as_str()]), 1);

    let err = control
        .view_log(&dir.path().join("missing.log"), &LogOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::LogNotFound(_)));
    assert_eq!(runner.count(|a| a.len() == 4 && a[3].ends_with("missing.log")), 0);
}

#[tokio::test]
async fn test_view_config() {
    let dir = tempfile::tempdir().unwrap();
    let (control, runner, _) = fail2ban_control(dir.path()).await;
    let conf = dir.path().join("jail.local");
    let conf_arg = conf.display().to_string();

    for whole in ["", "0"] {
        control
            .view_config(&conf, &ConfigOptions { tail_lines: whole.into() })
            .await
            .unwrap();
    }
    assert_eq!(runner.count(|a| a == ["cat", conf_arg.as_str()]), 2);

    control
        .view_config(&conf, &ConfigOptions { tail_lines: "20".into() })
        .await
        .unwrap();
    assert_eq!(runner.count(|a| a == ["tail", "-n", "20", conf_arg.as_str()]), 1);
}

/// SysV host with scripts under a scratch init directory
fn sysv_control_settings(dir: &Path) -> Settings {
    let init_dir = dir.join("init.d");
    fs::create_dir_all(&init_dir).unwrap();
    fs::write(init_dir.join("cron"), "#!/bin/sh\n").unwrap();
    Settings {
        init_dir,
        rc_root: dir.to_path_buf(),
        ..settings(dir, ManagerKind::SysVinit)
    }
}

#[tokio::test]
async fn test_sysv_status() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new(|argv| match args(argv).as_slice() {
            ["service", "cron", "status"] => Ok("cron is running.\n".into()),
            ["sh", "-c", _] => Ok("enabled\n".into()),
            _ => Err(CommandError::exit(argv, 1, "")),
        })
        .with_programs(&["service"]),
    );
    let control = ServiceControl::with_runner(sysv_control_settings(dir.path()), runner)
        .await
        .unwrap();

    assert_eq!(control.get_service_name("cron.service").await.unwrap(), "cron");
    let status = control.status("cron").await.unwrap();
    assert!(status.is_active && status.is_enabled && status.is_exists);
    assert_eq!(
        control.service_path("cron").await.unwrap(),
        dir.path().join("init.d").join("cron")
    );
}

#[tokio::test]
async fn test_sysv_not_found_output_is_inactive_and_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new(|argv| Err(CommandError::exit(argv, 1, "/etc/init.d/cron: not found\n")))
            .with_programs(&["service"]),
    );
    let control = ServiceControl::with_runner(sysv_control_settings(dir.path()), runner)
        .await
        .unwrap();

    let status = control.status("cron").await.unwrap();
    assert!(!status.is_active);
    assert!(!status.is_enabled);
    assert!(status.is_exists);
}

#[tokio::test]
async fn test_openrc_status() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new(|argv| match args(argv).as_slice() {
            ["rc-service", "-l"] => Ok("nginx\nsshd\n".into()),
            ["rc-service", "nginx", "status"] => Ok(" * status: started\n".into()),
            ["rc-update", "check", "nginx"] => Ok("                nginx | default\n".into()),
            ["rc-service", "nginx", "restart"] => Ok(" * Starting nginx ...  [ ok ]\n".into()),
            _ => Err(CommandError::exit(argv, 1, "")),
        })
        .with_programs(&["rc-service"]),
    );
    let control = ServiceControl::with_runner(settings(dir.path(), ManagerKind::OpenRc), runner.clone())
        .await
        .unwrap();

    let status = control.status("nginx").await.unwrap();
    assert!(status.is_active && status.is_enabled && status.is_exists);

    let result = control.restart("nginx").await.unwrap();
    assert!(result.output.contains("[ ok ]"));
    assert_eq!(runner.count(|a| a == ["rc-service", "nginx", "restart"]), 1);
}

#[tokio::test]
async fn test_journal_errors_do_not_hide_running_unit() {
    const NGINX_STATUS: &str = "\
● nginx.service - A high performance web server and a reverse proxy server
     Loaded: loaded (/lib/systemd/system/nginx.service; enabled; preset: enabled)
     Active: active (running) since Mon 2024-01-01 10:00:00 UTC; 5min ago
Jan 01 10:00:00 web nginx[812]: open() \"/var/www/favicon.ico\" failed (2: No such file or directory)
Jan 01 10:00:01 web nginx[812]: upstream not found, retrying
";
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new(|argv| match args(argv).as_slice() {
            ["systemctl", "list-unit-files", "nginx.service"] => {
                Ok("nginx.service enabled enabled\n\n1 unit files listed.\n".into())
            }
            ["systemctl", "status", "nginx.service"] => Ok(NGINX_STATUS.into()),
            ["systemctl", "is-enabled", "nginx.service"] => Ok("enabled\n".into()),
            ["systemctl", "restart", "nginx.service"] => Ok(String::new()),
            _ => Err(CommandError::exit(argv, 1, "0 unit files listed.\n")),
        })
        .with_programs(&["systemctl"]),
    );
    let control = ServiceControl::with_runner(settings(dir.path(), ManagerKind::Systemd), runner)
        .await
        .unwrap();

    let status = control.status("nginx").await.unwrap();
    assert!(status.is_active);
    assert!(status.is_enabled);

    control.safe_restart("nginx", &SafeRestart::default()).await.unwrap();
}

#[tokio::test]
async fn test_sysv_existence_stays_inside_init_dir() {
    let dir = tempfile::tempdir().unwrap();
    let settings = sysv_control_settings(dir.path());
    fs::write(dir.path().join("outside"), "#!/bin/sh\n").unwrap();
    let runner = Arc::new(
        ScriptedRunner::new(|argv| Err(CommandError::exit(argv, 1, ""))).with_programs(&["service"]),
    );
    let control = ServiceControl::with_runner(settings, runner).await.unwrap();

    assert!(!control.confirm_exists("../outside").await.unwrap());
    assert!(!control.confirm_exists("..").await.unwrap());
    assert!(!control.is_exist("../outside").await);
    assert!(control.confirm_exists("cron").await.unwrap());
}
