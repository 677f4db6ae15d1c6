use nix::unistd::{Group, User};

use crate::error::{Error, Result};
use crate::mapping::IdKind;

/// numeric identity of a user account
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub uid: u32,
    /// primary group
    pub gid: u32,
}

/// resolves account names to numeric ids
pub trait IdentityLookup {
    fn lookup_user(&self, name: &str) -> Result<UserRecord>;
    fn lookup_group(&self, name: &str) -> Result<u32>;

    /// numeric id of `name` in the given id space
    fn lookup_id(&self, name: &str, kind: IdKind) -> Result<u32> {
        match kind {
            IdKind::Uid => self.lookup_user(name).map(|user| user.uid),
            IdKind::Gid => self.lookup_group(name),
        }
    }
}

impl<L: IdentityLookup + ?Sized> IdentityLookup for &L {
    fn lookup_user(&self, name: &str) -> Result<UserRecord> {
        (**self).lookup_user(name)
    }

    fn lookup_group(&self, name: &str) -> Result<u32> {
        (**self).lookup_group(name)
    }
}

/// lookup through the system account databases (getpwnam_r / getgrnam_r)
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemLookup;

impl IdentityLookup for SystemLookup {
    fn lookup_user(&self, name: &str) -> Result<UserRecord> {
        match User::from_name(name) {
            Ok(Some(user)) => Ok(UserRecord {
                uid: user.uid.as_raw(),
                gid: user.gid.as_raw(),
            }),
            Ok(None) => Err(lookup_failed(IdKind::Uid, name, "no such user")),
            Err(errno) => Err(lookup_failed(IdKind::Uid, name, errno.desc())),
        }
    }

    fn lookup_group(&self, name: &str) -> Result<u32> {
        match Group::from_name(name) {
            Ok(Some(group)) => Ok(group.gid.as_raw()),
            Ok(None) => Err(lookup_failed(IdKind::Gid, name, "no such group")),
            Err(errno) => Err(lookup_failed(IdKind::Gid, name, errno.desc())),
        }
    }
}

pub(crate) fn lookup_failed(kind: IdKind, name: &str, reason: impl Into<String>) -> Error {
    Error::IdentityLookupFailed {
        kind,
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// in-memory account table for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FakeLookup {
    users: std::collections::HashMap<String, UserRecord>,
    groups: std::collections::HashMap<String, u32>,
}

#[cfg(test)]
impl FakeLookup {
    pub(crate) fn user(mut self, name: &str, uid: u32, gid: u32) -> Self {
        self.users.insert(name.to_string(), UserRecord { uid, gid });
        self
    }

    pub(crate) fn group(mut self, name: &str, gid: u32) -> Self {
        self.groups.insert(name.to_string(), gid);
        self
    }
}

#[cfg(test)]
impl IdentityLookup for FakeLookup {
    fn lookup_user(&self, name: &str) -> Result<UserRecord> {
        self.users
            .get(name)
            .copied()
            .ok_or_else(|| lookup_failed(IdKind::Uid, name, "no such user"))
    }

    fn lookup_group(&self, name: &str) -> Result<u32> {
        self.groups
            .get(name)
            .copied()
            .ok_or_else(|| lookup_failed(IdKind::Gid, name, "no such group"))
    }
}
