//! One-shot process setup performed after binding and before the workers
//! start: descriptor limit, chroot and dropping to an unprivileged user.

use std::ffi::CString;
use std::io;
use std::path::Path;

use anyhow::{Context, anyhow, bail};
use tracing::{info, warn};

use crate::config::Config;

/// Raises the soft open-file limit to `wanted`, capped by the hard limit.
/// Failure is logged and otherwise ignored.
pub fn raise_fd_limit(wanted: u64) {
    let mut lim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut lim) } < 0 {
        warn!(error = %io::Error::last_os_error(), "getrlimit failed");
        return;
    }

    let target = (wanted as libc::rlim_t).min(lim.rlim_max);
    if lim.rlim_cur >= target {
        return;
    }
    if target < wanted as libc::rlim_t {
        warn!(wanted, hard = lim.rlim_max, "open-file hard limit is below what the slots need");
    }

    lim.rlim_cur = target;
    if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &lim) } < 0 {
        warn!(error = %io::Error::last_os_error(), "setrlimit failed");
    }
}

/// Applies the chroot and user/group settings of `cfg`. After a chroot the
/// served root becomes `/`.
pub fn drop_privileges(cfg: &mut Config) -> anyhow::Result<()> {
    // resolve names before the chroot hides /etc/passwd and /etc/group
    let gid = cfg.group.as_deref().map(lookup_group).transpose()?;
    let uid = cfg.user.as_deref().map(lookup_user).transpose()?;

    if cfg.chroot {
        chroot(&cfg.root)?;
        cfg.root = "/".into();
        info!("changed root directory");
    }

    if let Some(gid) = gid {
        if unsafe { libc::setgroups(1, &gid) } < 0 {
            return Err(io::Error::last_os_error()).context("setgroups failed");
        }
        if unsafe { libc::setgid(gid) } < 0 {
            return Err(io::Error::last_os_error()).context("setgid failed");
        }
    }
    if let Some(uid) = uid {
        if unsafe { libc::setuid(uid) } < 0 {
            return Err(io::Error::last_os_error()).context("setuid failed");
        }
    }

    if gid.is_some() || uid.is_some() {
        info!(uid = ?uid, gid = ?gid, "dropped privileges");
    }
    if unsafe { libc::geteuid() } == 0 {
        warn!("serving as root");
    }
    Ok(())
}

fn chroot(root: &Path) -> anyhow::Result<()> {
    let dir = c_path(root)?;
    if unsafe { libc::chdir(dir.as_ptr()) } < 0 {
        return Err(io::Error::last_os_error())
            .with_context(|| format!("chdir to {} failed", root.display()));
    }
    let here = c_path(Path::new("."))?;
    if unsafe { libc::chroot(here.as_ptr()) } < 0 {
        return Err(io::Error::last_os_error())
            .with_context(|| format!("chroot into {} failed", root.display()));
    }
    let slash = c_path(Path::new("/"))?;
    if unsafe { libc::chdir(slash.as_ptr()) } < 0 {
        return Err(io::Error::last_os_error()).context("chdir to new root failed");
    }
    Ok(())
}

fn c_path(path: &Path) -> anyhow::Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| anyhow!("path {} contains a NUL byte", path.display()))
}

fn lookup_user(name: &str) -> anyhow::Result<libc::uid_t> {
    let c_name = CString::new(name).map_err(|_| anyhow!("invalid user name {name:?}"))?;
    let pw = unsafe { libc::getpwnam(c_name.as_ptr()) };
    if pw.is_null() {
        bail!("unknown user {name:?}");
    }
    Ok(unsafe { (*pw).pw_uid })
}

fn lookup_group(name: &str) -> anyhow::Result<libc::gid_t> {
    let c_name = CString::new(name).map_err(|_| anyhow!("invalid group name {name:?}"))?;
    let gr = unsafe { libc::getgrnam(c_name.as_ptr()) };
    if gr.is_null() {
        bail!("unknown group {name:?}");
    }
    Ok(unsafe { (*gr).gr_gid })
}
