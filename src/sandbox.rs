//! Subprocess sandbox: run argv commands with path containment and argv discipline.
//!
//! Every rule is checked before anything is spawned:
//!
//! - `argv` is non-empty; a lone element that looks like a shell line is refused.
//! - `cwd` and every argument value, read as a path from `cwd` and resolved
//!   through symlinks, stay inside the repo root. Bare flags are skipped.
//! - The child environment starts empty except for `PATH`, plus an explicit allowlist.
//! - No shell is ever involved: argv goes straight to `execvp`.
//!
//! Each stream keeps at most `max_output_bytes` (plus one byte to detect the
//! cut). A timeout kills the child's whole process group, and output still in
//! flight is collected for a short grace period only, so descendants holding
//! the pipes open cannot stretch the call past its deadline.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use std::{env, fs, io};

use serde::Serialize;
use tracing::{debug, warn};

/// Substrings that make a single-element argv look like a shell line.
const SHELL_MARKERS: &[&str] = &[" ", ";", "&&", "||", "|", "$", "`"];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to keep reading pipes after a timed-out child is killed.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

const READ_CHUNK: usize = 8192;

/// Symlink hops followed while resolving one argument, as in Linux `MAXSYMLINKS`.
const MAX_LINK_HOPS: u32 = 40;

/// A command or path was refused before spawning, or the spawn itself failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    #[error("argv_rejected:{0}")]
    ArgvRejected(&'static str),

    #[error("path_rejected:{0}")]
    PathRejected(&'static str),

    #[error("spawn_failed:{0}")]
    SpawnFailed(String),
}

pub type Result<T> = core::result::Result<T, SandboxError>;

/// How to run one command.
#[derive(Debug, Clone)]
pub struct SandboxOptions<'a> {
    pub repo_root: &'a Path,

    /// Repo-relative working directory. `None` runs at the repo root.
    pub cwd: Option<&'a str>,
    pub timeout: Duration,
    pub env_allowlist: &'a [String],

    /// Per-stream cap on captured bytes.
    pub max_output_bytes: usize,
}

/// What happened when a command ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub argv: Vec<String>,

    /// `None` when the child timed out or was ended by a signal.
    pub returncode: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration_sec: f64,
}

/// Check argv shape without touching the filesystem.
pub fn validate_argv(argv: &[String]) -> Result<()> {
    let Some(first) = argv.first() else {
        return Err(SandboxError::ArgvRejected("empty"));
    };
    if argv.iter().any(String::is_empty) {
        return Err(SandboxError::ArgvRejected("empty_arg"));
    }
    if argv.len() == 1 && SHELL_MARKERS.iter().any(|m| first.contains(m)) {
        return Err(SandboxError::ArgvRejected("shell_like"));
    }
    Ok(())
}

/// Resolve a repo-relative path, refusing anything that could escape the root.
///
/// Empty strings, absolute paths, and `..` segments are refused outright.
/// The result is a real path (symlinks resolved as far as the path exists)
/// that lies within the real repo root. The root itself counts as within.
pub fn resolve_repo_path(repo_root: &Path, relative: &str) -> Result<PathBuf> {
    if relative.is_empty() {
        return Err(SandboxError::PathRejected("empty"));
    }
    let rel = Path::new(relative);
    if rel.is_absolute() || relative.starts_with('/') {
        return Err(SandboxError::PathRejected("absolute"));
    }
    if rel.components().any(|c| c == Component::ParentDir) {
        return Err(SandboxError::PathRejected("parent_ref"));
    }

    let root = real_root(repo_root)?;
    let resolved = real_path(&root.join(rel));
    if !resolved.starts_with(&root) {
        return Err(SandboxError::PathRejected("outside_repo"));
    }
    Ok(resolved)
}

/// Run `argv` under the sandbox rules and capture its output.
pub fn run_argv(argv: &[String], options: &SandboxOptions<'_>) -> Result<CommandOutcome> {
    validate_argv(argv)?;

    let root = real_root(options.repo_root)?;
    let cwd = match options.cwd {
        Some(cwd) => resolve_repo_path(&root, cwd)?,
        None => root.clone(),
    };
    if !cwd.is_dir() {
        return Err(SandboxError::PathRejected("cwd_not_directory"));
    }
    check_path_arguments(&root, &cwd, &argv[1..])?;

    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .current_dir(&cwd)
        .env_clear()
        .envs(child_env(options.env_allowlist))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut command);

    debug!(argv = ?argv, cwd = %cwd.display(), "spawning sandboxed command");
    let started = Instant::now();
    let deadline = started + options.timeout;
    let mut child = command
        .spawn()
        .map_err(|e| SandboxError::SpawnFailed(format!("{}: {e}", argv[0])))?;

    let keep = options.max_output_bytes.saturating_add(1);
    let stdout = drain(child.stdout.take(), keep);
    let stderr = drain(child.stderr.take(), keep);
    let (returncode, timed_out) = wait_until(&mut child, deadline)
        .map_err(|e| SandboxError::SpawnFailed(format!("{}: {e}", argv[0])))?;
    if timed_out {
        warn!(argv = ?argv, timeout_sec = options.timeout.as_secs(), "command timed out");
    }

    // A clean exit may still leave descendants holding the pipes; they get
    // until the deadline. A killed child gets the grace period.
    let collect_until = if timed_out {
        Instant::now() + DRAIN_GRACE
    } else {
        deadline.max(Instant::now() + DRAIN_GRACE)
    };
    let (stdout, stdout_truncated) =
        truncate_lossy(&collect(stdout, collect_until), options.max_output_bytes);
    let (stderr, stderr_truncated) =
        truncate_lossy(&collect(stderr, collect_until), options.max_output_bytes);

    Ok(CommandOutcome {
        argv: argv.to_vec(),
        returncode,
        timed_out,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        duration_sec: started.elapsed().as_secs_f64(),
    })
}

/// Cut `bytes` to at most `max` bytes and decode, replacing invalid UTF-8.
///
/// A character split by the cut is dropped rather than replaced, so the
/// result never exceeds `max` bytes when the input is valid UTF-8.
pub fn truncate_lossy(bytes: &[u8], max: usize) -> (String, bool) {
    let truncated = bytes.len() > max;
    let mut kept = if truncated { &bytes[..max] } else { bytes };
    // `error_len() == None` means the input ended mid-character.
    if truncated
        && let Err(e) = std::str::from_utf8(kept)
        && e.error_len().is_none()
    {
        kept = &kept[..e.valid_up_to()];
    }
    (String::from_utf8_lossy(kept).into_owned(), truncated)
}

// ── Helpers ──

fn real_root(repo_root: &Path) -> Result<PathBuf> {
    repo_root
        .canonicalize()
        .map_err(|_| SandboxError::PathRejected("repo_root_unresolvable"))
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest.
fn real_path(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(real) = current.canonicalize() {
            let mut resolved = real;
            for part in missing.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (current.file_name(), current.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// The value an argument hands to the program: the whole argument, or the
/// part after `=` in `--flag=value`. Bare flags carry no path.
fn argument_value(arg: &str) -> Option<&str> {
    match arg.split_once('=') {
        Some((flag, value)) if flag.starts_with('-') => Some(value),
        _ if arg.starts_with('-') => None,
        _ => Some(arg),
    }
}

/// Resolve `value` against `base` the way the kernel walks it.
///
/// Each existing component is canonicalized as it is reached, so a `..`
/// after a symlink climbs out of the link's target, not out of the link.
/// Dangling links are followed through their target text. Components that
/// don't exist yet are appended as written. `None` means too many link hops.
fn resolve_argument(base: &Path, value: &Path, hops: &mut u32) -> Option<PathBuf> {
    let mut resolved = base.to_path_buf();
    for component in value.components() {
        match component {
            Component::Prefix(prefix) => resolved = PathBuf::from(prefix.as_os_str()),
            Component::RootDir => resolved.push(Component::RootDir),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                if let Ok(real) = resolved.canonicalize() {
                    resolved = real;
                } else if let Ok(target) = fs::read_link(&resolved) {
                    *hops += 1;
                    if *hops > MAX_LINK_HOPS {
                        return None;
                    }
                    resolved.pop();
                    resolved = resolve_argument(&resolved, &target, hops)?;
                }
            }
        }
    }
    Some(resolved)
}

/// Every argument value is resolved as a path from `cwd`. Plain words land
/// inside `cwd` and pass; anything that reaches outside the root is refused.
fn check_path_arguments(root: &Path, cwd: &Path, args: &[String]) -> Result<()> {
    for arg in args {
        let Some(value) = argument_value(arg) else {
            continue;
        };
        if value.starts_with('~') {
            return Err(SandboxError::PathRejected("argument_home_ref"));
        }
        let mut hops = 0;
        match resolve_argument(cwd, Path::new(value), &mut hops) {
            Some(resolved) if resolved.starts_with(root) => {}
            Some(_) => return Err(SandboxError::PathRejected("argument_outside_repo")),
            None => return Err(SandboxError::PathRejected("argument_link_loop")),
        }
    }
    Ok(())
}

fn child_env(allowlist: &[String]) -> Vec<(String, OsString)> {
    let mut vars = Vec::new();
    if let Some(path) = env::var_os("PATH") {
        vars.push(("PATH".to_string(), path));
    }
    for name in allowlist {
        if name == "PATH" {
            continue;
        }
        if let Some(value) = env::var_os(name) {
            vars.push((name.clone(), value));
        }
    }
    vars
}

/// Read `pipe` on its own thread, forwarding at most `keep` bytes.
///
/// The reader keeps consuming past `keep` so the child never blocks on a
/// full pipe. The channel closes when the pipe does.
fn drain<R: Read + Send + 'static>(pipe: Option<R>, keep: usize) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut reader| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut chunk = vec![0u8; READ_CHUNK];
            let mut room = keep;
            loop {
                // A read error ends the capture; whatever arrived is kept.
                let n = match reader.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                let take = n.min(room);
                if take > 0 {
                    room -= take;
                    if tx.send(chunk[..take].to_vec()).is_err() {
                        break;
                    }
                }
            }
        });
        rx
    })
}

/// Gather forwarded chunks until the pipe closes or `until` passes.
fn collect(chunks: Option<Receiver<Vec<u8>>>, until: Instant) -> Vec<u8> {
    let mut buf = Vec::new();
    let Some(chunks) = chunks else {
        return buf;
    };
    while let Ok(chunk) = chunks.recv_timeout(until.saturating_duration_since(Instant::now())) {
        buf.extend_from_slice(&chunk);
    }
    buf
}

/// Poll the child until it exits or `deadline` passes. Returns `(returncode, timed_out)`.
fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<(Option<i32>, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code(), false));
        }
        if Instant::now() >= deadline {
            kill_process_group(child);
            // The child may exit between the poll and the kill.
            let _ = child.kill();
            child.wait()?;
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Put the child at the head of a new process group so a timeout can reach
/// everything it started.
#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt as _;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// Best effort `SIGKILL` to the child's process group.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let group = format!("-{}", child.id());
    let status = Command::new("kill")
        .args(["-KILL", "--", group.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        debug!(error = %e, "failed to signal process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    fn options(root: &Path) -> SandboxOptions<'_> {
        SandboxOptions {
            repo_root: root,
            cwd: None,
            timeout: Duration::from_secs(10),
            env_allowlist: &[],
            max_output_bytes: 4096,
        }
    }

    #[test]
    fn shell_like_single_element_is_rejected() {
        let dir = TempDir::new().unwrap();
        for line in ["echo hello", "ls;rm", "a&&b", "a||b", "a|b", "$HOME", "`id`"] {
            let err = run_argv(&argv(&[line]), &options(dir.path())).unwrap_err();
            assert_eq!(err, SandboxError::ArgvRejected("shell_like"), "{line}");
            assert_eq!(err.to_string(), "argv_rejected:shell_like");
        }
    }

    #[test]
    fn shell_markers_in_later_arguments_are_plain_data() {
        let dir = TempDir::new().unwrap();
        let out = run_argv(&argv(&["echo", "a b; c"]), &options(dir.path())).unwrap();
        assert_eq!(out.stdout, "a b; c\n");
        assert_eq!(out.returncode, Some(0));
    }

    #[test]
    fn empty_argv_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            run_argv(&[], &options(dir.path())).unwrap_err(),
            SandboxError::ArgvRejected("empty")
        );
        assert_eq!(
            run_argv(&argv(&["echo", ""]), &options(dir.path())).unwrap_err(),
            SandboxError::ArgvRejected("empty_arg")
        );
    }

    #[test]
    fn cwd_must_stay_inside_repo() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        for (cwd, reason) in [
            ("", "empty"),
            ("/tmp", "absolute"),
            ("../", "parent_ref"),
            ("sub/../..", "parent_ref"),
        ] {
            let mut opts = options(dir.path());
            opts.cwd = Some(cwd);
            let err = run_argv(&argv(&["pwd"]), &opts).unwrap_err();
            assert_eq!(err, SandboxError::PathRejected(reason), "{cwd}");
        }

        let mut opts = options(dir.path());
        opts.cwd = Some("sub");
        let out = run_argv(&argv(&["pwd"]), &opts).unwrap();
        assert!(out.stdout.trim_end().ends_with("sub"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_cwd_escaping_repo_is_rejected() {
        let outside = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let mut opts = options(dir.path());
        opts.cwd = Some("escape");
        assert_eq!(
            run_argv(&argv(&["pwd"]), &opts).unwrap_err(),
            SandboxError::PathRejected("outside_repo")
        );
    }

    #[test]
    fn path_arguments_outside_repo_are_rejected() {
        let dir = TempDir::new().unwrap();
        for args in [
            ["cat", "/etc/passwd"],
            ["cat", "../secret"],
            ["cat", "--file=/etc/hosts"],
            ["cat", "~/.ssh/id_rsa"],
        ] {
            let err = run_argv(&argv(&args), &options(dir.path())).unwrap_err();
            assert!(
                matches!(err, SandboxError::PathRejected(_)),
                "{args:?} gave {err}"
            );
        }
    }

    #[test]
    fn path_arguments_inside_repo_are_allowed() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("b.txt"), "inside").unwrap();

        let mut opts = options(dir.path());
        opts.cwd = Some("a");
        let out = run_argv(&argv(&["cat", "../b.txt"]), &opts).unwrap();
        assert_eq!(out.stdout, "inside");

        let absolute = dir.path().join("b.txt").canonicalize().unwrap();
        let out = run_argv(
            &argv(&["cat", absolute.to_str().unwrap()]),
            &options(dir.path()),
        )
        .unwrap();
        assert_eq!(out.stdout, "inside");
    }

    #[test]
    fn environment_is_allowlisted() {
        let dir = TempDir::new().unwrap();
        let out = run_argv(&argv(&["env"]), &options(dir.path())).unwrap();
        let names: Vec<&str> = out
            .stdout
            .lines()
            .filter_map(|l| l.split_once('=').map(|(k, _)| k))
            .collect();
        assert!(names.iter().all(|n| *n == "PATH" || *n == "PWD"), "{names:?}");

        // PATH is always present, so allowlisting it is harmless.
        let allow = vec!["PATH".to_string()];
        let mut opts = options(dir.path());
        opts.env_allowlist = &allow;
        let out = run_argv(&argv(&["env"]), &opts).unwrap();
        assert_eq!(out.stdout.matches("PATH=").count(), 1);
    }

    #[test]
    fn output_is_truncated_per_stream() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(dir.path());
        opts.max_output_bytes = 4;
        let out = run_argv(
            &argv(&["sh", "-c", "printf 0123456789; printf ab >&2"]),
            &opts,
        )
        .unwrap();
        assert_eq!(out.stdout, "0123");
        assert!(out.stdout_truncated);
        assert_eq!(out.stderr, "ab");
        assert!(!out.stderr_truncated);
    }

    #[test]
    fn timeout_kills_and_reports_no_returncode() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(dir.path());
        opts.timeout = Duration::from_millis(200);
        let out = run_argv(&argv(&["sleep", "5"]), &opts).unwrap();
        assert!(out.timed_out);
        assert_eq!(out.returncode, None);
        assert!(out.duration_sec < 5.0);
    }

    #[test]
    fn nonzero_exit_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let out = run_argv(&argv(&["sh", "-c", "exit 3"]), &options(dir.path())).unwrap();
        assert_eq!(out.returncode, Some(3));
        assert!(!out.timed_out);
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let err = run_argv(&argv(&["definitely-not-a-real-program-xyz"]), &options(dir.path()))
            .unwrap_err();
        assert!(matches!(err, SandboxError::SpawnFailed(_)));
    }

    #[test]
    fn timeout_is_not_held_open_by_grandchildren() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(dir.path());
        opts.timeout = Duration::from_millis(200);

        // `sh` forks `sleep`, which inherits both pipes.
        let started = Instant::now();
        let out = run_argv(&argv(&["sh", "-c", "sleep 4; echo done"]), &opts).unwrap();
        assert!(out.timed_out);
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
        assert!(!out.stdout.contains("done"));
    }

    #[test]
    fn output_before_timeout_is_kept() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(dir.path());
        opts.timeout = Duration::from_millis(300);
        let out = run_argv(&argv(&["sh", "-c", "echo started; sleep 4"]), &opts).unwrap();
        assert!(out.timed_out);
        assert_eq!(out.stdout, "started\n");
    }

    #[test]
    fn truncate_lossy_drops_split_characters() {
        let (text, truncated) = truncate_lossy("héllo".as_bytes(), 2);
        assert!(truncated);
        assert_eq!(text, "h");

        let (text, truncated) = truncate_lossy("héllo".as_bytes(), 3);
        assert!(truncated);
        assert_eq!(text, "hé");
    }

    #[test]
    fn truncate_lossy_still_replaces_invalid_bytes() {
        let (text, truncated) = truncate_lossy(b"a\xffb", 8);
        assert!(!truncated);
        assert_eq!(text, "a\u{FFFD}b");
    }

    #[test]
    fn multibyte_output_stays_within_cap() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(dir.path());
        opts.max_output_bytes = 5;
        let out = run_argv(&argv(&["printf", "ééé"]), &opts).unwrap();
        assert!(out.stdout_truncated);
        assert_eq!(out.stdout, "éé");
    }

    // ── Symlinked path arguments ──

    /// `<base>/repo` is the root; `<base>/outside` holds a secret.
    /// `repo/escape -> outside`, `repo/inner -> outside/deep`, `repo/sub/` is real.
    #[cfg(unix)]
    struct LinkedRepo {
        base: TempDir,
    }

    #[cfg(unix)]
    impl LinkedRepo {
        fn new() -> Self {
            let base = TempDir::new().unwrap();
            let repo = base.path().join("repo");
            let outside = base.path().join("outside");
            fs::create_dir_all(repo.join("sub")).unwrap();
            fs::create_dir_all(outside.join("deep")).unwrap();
            fs::write(outside.join("secret"), "TOP-SECRET").unwrap();
            fs::write(repo.join("notes.txt"), "inside").unwrap();
            std::os::unix::fs::symlink(&outside, repo.join("escape")).unwrap();
            std::os::unix::fs::symlink(outside.join("deep"), repo.join("inner")).unwrap();
            Self { base }
        }

        fn root(&self) -> PathBuf {
            self.base.path().join("repo").canonicalize().unwrap()
        }

        fn outside(&self) -> PathBuf {
            self.base.path().join("outside").canonicalize().unwrap()
        }
    }

    #[cfg(unix)]
    #[test]
    fn plain_argument_through_symlinked_dir_is_rejected() {
        let fixture = LinkedRepo::new();
        let root = fixture.root();
        for arg in ["escape/secret", "escape", "--input=escape/secret", "inner"] {
            let err = run_argv(&argv(&["cat", arg]), &options(&root)).unwrap_err();
            assert_eq!(err, SandboxError::PathRejected("argument_outside_repo"), "{arg}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn parent_ref_after_symlink_climbs_from_the_target() {
        let fixture = LinkedRepo::new();
        let root = fixture.root();

        // `inner/..` is `outside`, not the repo root.
        let err = run_argv(&argv(&["cat", "inner/../secret"]), &options(&root)).unwrap_err();
        assert_eq!(err, SandboxError::PathRejected("argument_outside_repo"));

        // Without a link on the way, `..` stays a plain climb.
        let out = run_argv(&argv(&["cat", "sub/../notes.txt"]), &options(&root)).unwrap();
        assert_eq!(out.stdout, "inside");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_to_outside_is_rejected() {
        let fixture = LinkedRepo::new();
        let root = fixture.root();
        std::os::unix::fs::symlink(fixture.outside().join("planted"), root.join("trap")).unwrap();

        let err = run_argv(&argv(&["touch", "trap"]), &options(&root)).unwrap_err();
        assert_eq!(err, SandboxError::PathRejected("argument_outside_repo"));
        assert!(!fixture.outside().join("planted").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink("b", dir.path().join("a")).unwrap();
        std::os::unix::fs::symlink("a", dir.path().join("b")).unwrap();

        let err = run_argv(&argv(&["cat", "a"]), &options(dir.path())).unwrap_err();
        assert_eq!(err, SandboxError::PathRejected("argument_link_loop"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_staying_inside_is_allowed() {
        let fixture = LinkedRepo::new();
        let root = fixture.root();
        std::os::unix::fs::symlink(root.join("sub"), root.join("alias")).unwrap();
        fs::write(root.join("sub/data.txt"), "via alias").unwrap();

        let out = run_argv(&argv(&["cat", "alias/data.txt"]), &options(&root)).unwrap();
        assert_eq!(out.stdout, "via alias");
    }

    #[cfg(unix)]
    mod containment {
        use super::*;

        use proptest::prelude::*;

        /// Where an argument starts, relative to the repo fixture.
        #[derive(Debug, Clone, Copy)]
        enum Start {
            Bare,
            Sub,
            SubUp,
            Inner,
            InnerUp,
            Escape,
            Up,
            Absolute,
        }

        impl Start {
            fn text(self, fixture: &LinkedRepo) -> String {
                match self {
                    Self::Bare => String::new(),
                    Self::Sub => "sub/".to_string(),
                    Self::SubUp => "sub/../".to_string(),
                    Self::Inner => "inner/".to_string(),
                    Self::InnerUp => "inner/../".to_string(),
                    Self::Escape => "escape/".to_string(),
                    Self::Up => "../".to_string(),
                    Self::Absolute => format!("{}/", fixture.outside().display()),
                }
            }

            /// The directory the kernel would actually open.
            fn real_dir(self, fixture: &LinkedRepo) -> PathBuf {
                match self {
                    Self::Bare | Self::SubUp => fixture.root(),
                    Self::Sub => fixture.root().join("sub"),
                    Self::Inner => fixture.outside().join("deep"),
                    Self::InnerUp | Self::Escape | Self::Absolute => fixture.outside(),
                    Self::Up => fixture.base.path().canonicalize().unwrap(),
                }
            }
        }

        fn arb_start() -> impl Strategy<Value = Start> {
            prop::sample::select(vec![
                Start::Bare,
                Start::Sub,
                Start::SubUp,
                Start::Inner,
                Start::InnerUp,
                Start::Escape,
                Start::Up,
                Start::Absolute,
            ])
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(48))]

            #[test]
            fn arguments_resolving_outside_never_run(
                start in arb_start(),
                name in prop::sample::select(vec!["secret", "fresh"]),
                as_flag in any::<bool>(),
            ) {
                let fixture = LinkedRepo::new();
                let root = fixture.root();
                let path = format!("{}{name}", start.text(&fixture));
                let arg = if as_flag { format!("--reference={path}") } else { path };
                let target = start.real_dir(&fixture).join(name);
                let outside = !target.starts_with(&root);

                let result = run_argv(&argv(&["touch", &arg]), &options(&root));
                if outside {
                    prop_assert_eq!(
                        result.unwrap_err(),
                        SandboxError::PathRejected("argument_outside_repo")
                    );
                    if name == "fresh" {
                        prop_assert!(!target.exists(), "{} was created", target.display());
                    }
                } else {
                    prop_assert!(result.is_ok(), "{arg} gave {result:?}");
                }
            }
        }
    }
}
