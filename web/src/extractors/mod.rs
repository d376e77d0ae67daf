pub(crate) mod authenticated_user;
pub(crate) mod upgrade_identity;
