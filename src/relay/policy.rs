use crate::Result;
use crate::store::AuthorizationCheck;
use crate::types::{Course, Rights, Role, Subject};

/// Rights that make a caller a course manager.
pub const MANAGER_RIGHTS: Rights = Rights::UPDATE.union(Rights::CREATE);
/// Rights that make a caller a student.
pub const STUDENT_RIGHTS: Rights = Rights::READ;

/// Resolves the caller's role in `course`.
///
/// Managers win over students; `None` means the caller has no access.
pub async fn resolve_role(
    authorization: &dyn AuthorizationCheck,
    subject: Option<&Subject>,
    course: &Course,
) -> Result<Option<Role>> {
    if authorization
        .has_any_right(subject, course, MANAGER_RIGHTS)
        .await?
    {
        return Ok(Some(Role::CourseManager));
    }
    if authorization
        .has_any_right(subject, course, STUDENT_RIGHTS)
        .await?
    {
        return Ok(Some(Role::Student));
    }
    Ok(None)
}
