use gatehouse_core::{IamError, PermissionId};

use crate::{PermissionSet, Principal, Role};

/// Compute the effective permissions of a principal.
///
/// The result is the exact union of the permission sets of the roles the
/// principal currently holds. Roles passed in that the principal does not
/// hold are ignored, so callers may hand over the whole role table.
///
/// - No IO
/// - No panics
pub fn resolve_effective_permissions<'a, I>(principal: &Principal, roles: I) -> PermissionSet
where
    I: IntoIterator<Item = &'a Role>,
{
    roles
        .into_iter()
        .filter(|role| principal.has_role(&role.id))
        .flat_map(|role| role.permissions.iter().cloned())
        .collect()
}

/// Pure membership check against an effective permission set.
pub fn authorize(permissions: &PermissionSet, required: &PermissionId) -> Result<(), IamError> {
    if permissions.contains(required) {
        Ok(())
    } else {
        Err(IamError::forbidden(required.as_str()))
    }
}
