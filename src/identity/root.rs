use crate::error::{Error, Result};
use crate::identity::{IdentityLookup, IdentitySource};

/// remapped root token that selects (and if needed creates) the default account
pub const DEFAULT_SPECIFIER: &str = "default";

impl<L: IdentityLookup> IdentitySource<L> {
    /// resolve a remapped root specification into a host (uid, gid) pair.
    ///
    /// accepted forms:
    ///   uid                 - numeric uid; gid defaults to the same value
    ///   uid:gid             - both numeric
    ///   username            - gid looked up as a group of the same name
    ///   username:groupname  - each looked up separately (either side may be numeric)
    ///   default             - the configured default account, provisioned when missing
    pub fn resolve_remapped_root(&self, spec: &str) -> Result<(u32, u32)> {
        let parts: Vec<&str> = spec.split(':').collect();
        if parts.len() > 2 {
            return Err(Error::InvalidRootSpec(spec.to_string()));
        }
        let user_part = parts[0];
        let group_part = parts.get(1).copied();

        let (uid, lookup_name) = match parse_numeric_id(user_part) {
            Some(uid) => (uid, None),
            None => {
                let is_default = user_part == DEFAULT_SPECIFIER;
                let lookup_name = if is_default {
                    self.default_account.as_str()
                } else {
                    user_part
                };

                match self.lookup.lookup_user(lookup_name) {
                    Ok(user) => (user.uid, Some(lookup_name)),
                    Err(err) if is_default => {
                        tracing::debug!(
                            account = lookup_name,
                            error = %err,
                            "default remapped root account missing, provisioning"
                        );
                        return self.provisioner.provision(lookup_name);
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        let gid = match (group_part, lookup_name) {
            (Some(group), _) => match parse_numeric_id(group) {
                Some(gid) => gid,
                None => self.lookup.lookup_group(group)?,
            },
            (None, Some(name)) => self.lookup.lookup_group(name)?,
            (None, None) => uid,
        };

        tracing::debug!(spec, uid, gid, "resolved remapped root");
        Ok((uid, gid))
    }

    /// host uid that stands in for root when translating a tree.
    ///
    /// this is the uid of the configured container root account, or the
    /// uid of the current process when that account does not exist.
    pub fn resolve_container_root_id(&self) -> Result<u32> {
        match self.lookup.lookup_user(&self.container_root_account) {
            Ok(user) => Ok(user.uid),
            Err(Error::IdentityLookupFailed { reason, .. }) => {
                let uid = nix::unistd::getuid().as_raw();
                tracing::debug!(
                    account = %self.container_root_account,
                    reason = %reason,
                    uid,
                    "container root account missing, using current uid"
                );
                Ok(uid)
            }
            Err(err) => Err(err),
        }
    }
}

fn parse_numeric_id(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
