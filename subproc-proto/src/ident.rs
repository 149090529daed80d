//! User and group name resolution.

#![allow(unsafe_code)]

use std::ffi::{CString, OsStr, c_char, c_int};
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::ptr;

use nix::errno::Errno;

/// Scratch buffer size for the first lookup attempt.
const INITIAL_BUF_SIZE: usize = 1024;

/// Lookups needing more scratch space than this are treated as failures.
const MAX_BUF_SIZE: usize = 1 << 20;

/// Maps user and group names onto numeric ids.
///
/// Lookups may block (NSS, LDAP). "Not found" and lookup failures are not
/// distinguished; both yield `None`.
pub trait IdentityResolver {
    /// Resolves a user name to its uid.
    fn user_id(&self, name: &OsStr) -> Option<u32>;

    /// Resolves a group name to its gid.
    fn group_id(&self, name: &OsStr) -> Option<u32>;
}

impl<T: IdentityResolver + ?Sized> IdentityResolver for &T {
    fn user_id(&self, name: &OsStr) -> Option<u32> {
        (**self).user_id(name)
    }

    fn group_id(&self, name: &OsStr) -> Option<u32> {
        (**self).group_id(name)
    }
}

/// Resolver backed by the system databases (`getpwnam_r` / `getgrnam_r`).
///
/// Names are passed through byte for byte, so non-UTF-8 names are looked
/// up like any other.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct SystemIdentities;

impl IdentityResolver for SystemIdentities {
    fn user_id(&self, name: &OsStr) -> Option<u32> {
        lookup(name, "user", |cname, entry: *mut libc::passwd, buf, len, result| {
            // SAFETY: every pointer is valid for the duration of the call and
            // `len` is the length of `buf`.
            unsafe { libc::getpwnam_r(cname, entry, buf, len, result) }
        })
        .map(|pw| pw.pw_uid)
    }

    fn group_id(&self, name: &OsStr) -> Option<u32> {
        lookup(name, "group", |cname, entry: *mut libc::group, buf, len, result| {
            // SAFETY: as above.
            unsafe { libc::getgrnam_r(cname, entry, buf, len, result) }
        })
        .map(|gr| gr.gr_gid)
    }
}

/// Runs a reentrant `get*nam_r` lookup, growing the scratch buffer on
/// `ERANGE`.
///
/// Only plain-data fields of the returned entry may be used; its string
/// pointers refer into the scratch buffer, which is freed on return.
fn lookup<T: Copy>(
    name: &OsStr,
    what: &str,
    mut call: impl FnMut(*const c_char, *mut T, *mut c_char, usize, *mut *mut T) -> c_int,
) -> Option<T> {
    // Database names never contain NUL.
    let cname = CString::new(name.as_bytes()).ok()?;
    let mut buf: Vec<c_char> = vec![0; INITIAL_BUF_SIZE];
    loop {
        let mut entry = MaybeUninit::<T>::uninit();
        let mut result: *mut T = ptr::null_mut();
        let rc = call(
            cname.as_ptr(),
            entry.as_mut_ptr(),
            buf.as_mut_ptr(),
            buf.len(),
            &raw mut result,
        );
        if rc == 0 {
            if result.is_null() {
                return None;
            }
            // SAFETY: on success with a non-null result the entry was filled in.
            return Some(unsafe { entry.assume_init() });
        }
        let errno = Errno::from_raw(rc);
        if errno == Errno::ERANGE && buf.len() < MAX_BUF_SIZE {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        tracing::debug!(kind = what, name = ?name, %errno, "identity lookup failed");
        return None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_resolve_to_none() {
        let db = SystemIdentities;
        assert_eq!(db.user_id(OsStr::new("no-such-user-subproc-test")), None);
        assert_eq!(db.group_id(OsStr::new("no-such-group-subproc-test")), None);
    }

    #[test]
    fn non_utf8_name_is_looked_up() {
        let name = OsStr::from_bytes(b"\xff\xfe");
        assert_eq!(SystemIdentities.user_id(name), None);
        assert_eq!(SystemIdentities.group_id(name), None);
    }

    #[test]
    fn name_with_nul_is_none() {
        assert_eq!(SystemIdentities.user_id(OsStr::from_bytes(b"root\0x")), None);
    }

    #[test]
    fn lookup_grows_buffer_on_erange() {
        let mut sizes = Vec::new();
        let found = lookup(OsStr::new("big"), "user", |_, entry: *mut u32, _, len, result| {
            sizes.push(len);
            if len < INITIAL_BUF_SIZE * 4 {
                return libc::ERANGE;
            }
            // SAFETY: test pointers come straight from `lookup`.
            unsafe {
                entry.write(7);
                *result = entry;
            }
            0
        });
        assert_eq!(found, Some(7));
        assert_eq!(sizes, [INITIAL_BUF_SIZE, INITIAL_BUF_SIZE * 2, INITIAL_BUF_SIZE * 4]);
    }

    #[test]
    fn lookup_gives_up_on_other_errors() {
        let found = lookup(OsStr::new("x"), "group", |_, _: *mut u32, _, _, _| libc::EIO);
        assert_eq!(found, None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn root_resolves_to_zero() {
        assert_eq!(SystemIdentities.user_id(OsStr::new("root")), Some(0));
        assert_eq!(SystemIdentities.group_id(OsStr::new("root")), Some(0));
    }
}
