//! Administration listings served by the backend

use super::models::{DictType, Role, User};
use crate::api::{ApiClient, ApiError, Page, PageQuery};

pub const USER_LIST_ENDPOINT: &str = "/system/user/list";
pub const ROLE_LIST_ENDPOINT: &str = "/system/role/list";
pub const DICT_TYPE_LIST_ENDPOINT: &str = "/system/dict/type/list";

pub async fn list_users(
    api: &ApiClient,
    page: PageQuery,
    user_name: Option<&str>,
) -> Result<Page<User>, ApiError> {
    let filters: Vec<(String, String)> = user_name
        .filter(|n| !n.is_empty())
        .map(|n| ("userName".to_string(), n.to_string()))
        .into_iter()
        .collect();
    api.list_page(USER_LIST_ENDPOINT, page, &filters).await
}

pub async fn list_roles(api: &ApiClient, page: PageQuery) -> Result<Page<Role>, ApiError> {
    api.list_page(ROLE_LIST_ENDPOINT, page, &[]).await
}

pub async fn list_dict_types(api: &ApiClient, page: PageQuery) -> Result<Page<DictType>, ApiError> {
    api.list_page(DICT_TYPE_LIST_ENDPOINT, page, &[]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_listing_deserializes_from_envelope() {
        let raw = r#"{
            "code": 200,
            "msg": "查询成功",
            "data": {
                "total": 1,
                "rows": [{"userId": 1, "userName": "admin", "nickName": "管理员", "status": "0"}]
            }
        }"#;
        let resp: crate::api::ApiResponse<Page<User>> = serde_json::from_str(raw).unwrap();
        let page = resp.into_result().unwrap().unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].user_name, "admin");
        assert_eq!(page.rows[0].status, super::super::models::RecordStatus::Enabled);
    }
}
