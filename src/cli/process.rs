use std::{env, path::Path, process::Stdio};

use anyhow::Result;
use sysinfo::{get_current_pid, Signal, System};

use crate::engine::args::DaemonArgs;

use super::daemon_path::to_daemon_path;

pub fn kill_previous_servers(name: &Path) {
    let system = System::new_all();
    let current_id = get_current_pid().unwrap();
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            // Term lets the daemon flush its buffered deltas. On Windows
            // kill_with is unsupported and the process is terminated
            // forcefully.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
        }
    }
}

/// Stops a previous daemon and spawns a new one as a detached process.
pub fn restart_server(args: &DaemonArgs) -> Result<()> {
    let daemon_name = to_daemon_path(env::current_exe().expect("Can't operate without an executable"));
    kill_previous_servers(&daemon_name);
    let mut command = std::process::Command::new(daemon_name);
    command.args(daemon_args(args));

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x00000008;
        command.creation_flags(DETACHED_PROCESS);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }

    println!("Spawning");
    #[allow(clippy::zombie_processes)]
    let _ = command.spawn()?;
    println!("Success");
    Ok(())
}

fn daemon_args(args: &DaemonArgs) -> Vec<String> {
    let mut out = vec![
        "--watch".to_string(),
        args.watch.to_string_lossy().into_owned(),
    ];
    if let Some(dir) = &args.dir {
        out.push("--dir".to_string());
        out.push(dir.to_string_lossy().into_owned());
    }
    if !args.languages.is_empty() {
        let languages: Vec<String> = args
            .languages
            .iter()
            .map(|l| format!("{l:?}").to_lowercase())
            .collect();
        out.push("--languages".to_string());
        out.push(languages.join(","));
    }
    if let Some(goal) = args.goal {
        out.push("--goal".to_string());
        out.push(goal.to_string());
    }
    if let Some(log) = args.log {
        out.push("--log-filter".to_string());
        out.push(log.to_string());
    }
    if args.log_console {
        out.push("--log-console".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::engine::{args::DaemonArgs, counter::Language};

    use super::daemon_args;

    #[test]
    fn forwards_daemon_options() {
        let args = DaemonArgs {
            force: false,
            dir: Some(PathBuf::from("/tmp/app")),
            watch: PathBuf::from("/home/me/writing"),
            languages: vec![Language::Latin, Language::Cjk],
            goal: Some(500),
            log_console: false,
            log: None,
        };
        assert_eq!(
            daemon_args(&args),
            vec![
                "--watch",
                "/home/me/writing",
                "--dir",
                "/tmp/app",
                "--languages",
                "latin,cjk",
                "--goal",
                "500",
            ]
        );
    }
}
