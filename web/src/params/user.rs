use domain::user::Role;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[schema(as = user::UpdateRoleParams)]
pub(crate) struct UpdateRoleParams {
    pub(crate) role: Role,
}
