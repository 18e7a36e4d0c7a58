//! In-memory administration repository.
//!
//! Owned by whoever constructs it and handed to the code that needs it;
//! there is no process-wide instance.

use chrono::Utc;
use thiserror::Error;

use super::models::{
    DataCategory, DictData, DictType, Permission, RecordStatus, Role, User, UserForm,
};
use crate::api::{Page, PageQuery};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AdminError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("Duplicate {0}")]
    Duplicate(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
}

fn not_found(kind: &'static str, id: impl ToString) -> AdminError {
    AdminError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAdminRepository {
    users: Vec<User>,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    dict_types: Vec<DictType>,
    dict_data: Vec<DictData>,
    categories: Vec<DataCategory>,
    next_id: u64,
}

impl InMemoryAdminRepository {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Repository pre-filled with the records the console ships with
    pub fn seeded() -> Result<Self, AdminError> {
        let mut repo = Self::new();
        repo.seed()?;
        Ok(repo)
    }

    /// Insert the demo records; fails on the first conflicting one
    pub fn seed(&mut self) -> Result<(), AdminError> {
        let list = self.create_permission("User list", "system:user:list", None);
        let edit = self.create_permission("User edit", "system:user:edit", None);
        let qc = self.create_permission("Run QC", "data:qc:run", None);

        let admin_role = self.create_role("Administrator", "admin", 1)?.role_id;
        let auditor_role = self.create_role("Data auditor", "auditor", 2)?.role_id;
        self.grant_permissions(
            admin_role,
            &[list.permission_id, edit.permission_id, qc.permission_id],
        )?;
        self.grant_permissions(auditor_role, &[qc.permission_id])?;

        let admin = self.create_user(UserForm::new("admin").with_email("admin@example.org"))?;
        self.assign_roles(admin.user_id, &[admin_role])?;
        let auditor = self.create_user(UserForm::new("auditor"))?;
        self.assign_roles(auditor.user_id, &[auditor_role])?;

        let dict = self.create_dict_type("QC type", "qc_type")?;
        for (i, (label, value)) in [
            ("Completeness", "completeness"),
            ("Consistency", "consistency"),
            ("Accuracy", "accuracy"),
            ("Timeliness", "timeliness"),
        ]
        .into_iter()
        .enumerate()
        {
            self.add_dict_data(&dict.dict_type, label, value, i as u32)?;
        }

        let root = self.create_category("Clinical", None, 1)?;
        self.create_category("Outpatient", Some(root.category_id), 1)?;
        self.create_category("Inpatient", Some(root.category_id), 2)?;

        Ok(())
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Users whose name contains `name_filter`, paginated
    pub fn list_users(&self, name_filter: Option<&str>, page: PageQuery) -> Page<User> {
        let matching: Vec<User> = self
            .users
            .iter()
            .filter(|u| name_filter.map_or(true, |f| u.user_name.contains(f)))
            .cloned()
            .collect();
        Page::from_slice(&matching, page)
    }

    pub fn get_user(&self, user_id: u64) -> Result<&User, AdminError> {
        self.users
            .iter()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| not_found("user", user_id))
    }

    pub fn create_user(&mut self, form: UserForm) -> Result<User, AdminError> {
        let name = form.user_name.trim();
        if name.is_empty() {
            return Err(AdminError::Invalid("user name cannot be empty".to_string()));
        }
        if self.users.iter().any(|u| u.user_name == name) {
            return Err(AdminError::Duplicate(format!("user name {}", name)));
        }

        let user = User {
            user_id: self.allocate_id(),
            user_name: name.to_string(),
            nick_name: form.nick_name,
            email: form.email,
            phonenumber: form.phonenumber,
            status: form.status,
            role_ids: Vec::new(),
            create_time: Some(Utc::now()),
        };
        self.users.push(user.clone());
        Ok(user)
    }

    pub fn update_user(&mut self, user_id: u64, form: UserForm) -> Result<User, AdminError> {
        let name = form.user_name.trim().to_string();
        if name.is_empty() {
            return Err(AdminError::Invalid("user name cannot be empty".to_string()));
        }
        if self
            .users
            .iter()
            .any(|u| u.user_name == name && u.user_id != user_id)
        {
            return Err(AdminError::Duplicate(format!("user name {}", name)));
        }

        let user = self
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| not_found("user", user_id))?;
        user.user_name = name;
        user.nick_name = form.nick_name;
        user.email = form.email;
        user.phonenumber = form.phonenumber;
        user.status = form.status;
        Ok(user.clone())
    }

    pub fn set_user_status(&mut self, user_id: u64, status: RecordStatus) -> Result<(), AdminError> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| not_found("user", user_id))?;
        user.status = status;
        Ok(())
    }

    pub fn delete_user(&mut self, user_id: u64) -> Result<User, AdminError> {
        let index = self
            .users
            .iter()
            .position(|u| u.user_id == user_id)
            .ok_or_else(|| not_found("user", user_id))?;
        Ok(self.users.remove(index))
    }

    /// Replace a user's roles; every role must exist
    pub fn assign_roles(&mut self, user_id: u64, role_ids: &[u64]) -> Result<(), AdminError> {
        if let Some(missing) = role_ids
            .iter()
            .find(|id| !self.roles.iter().any(|r| r.role_id == **id))
        {
            return Err(not_found("role", missing));
        }
        let user = self
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| not_found("user", user_id))?;

        let mut ids = role_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        user.role_ids = ids;
        Ok(())
    }

    /// Permission strings granted through the user's enabled roles
    pub fn user_permissions(&self, user_id: u64) -> Result<Vec<String>, AdminError> {
        let user = self.get_user(user_id)?;
        let mut perms: Vec<String> = self
            .roles
            .iter()
            .filter(|r| r.status == RecordStatus::Enabled && user.role_ids.contains(&r.role_id))
            .flat_map(|r| r.permission_ids.iter())
            .filter_map(|pid| self.permissions.iter().find(|p| p.permission_id == *pid))
            .map(|p| p.perms.clone())
            .collect();
        perms.sort();
        perms.dedup();
        Ok(perms)
    }

    // ========================================================================
    // Roles and permissions
    // ========================================================================

    pub fn list_roles(&self, page: PageQuery) -> Page<Role> {
        let mut roles = self.roles.clone();
        roles.sort_by_key(|r| r.role_sort);
        Page::from_slice(&roles, page)
    }

    pub fn create_role(
        &mut self,
        role_name: &str,
        role_key: &str,
        role_sort: u32,
    ) -> Result<Role, AdminError> {
        if role_key.trim().is_empty() {
            return Err(AdminError::Invalid("role key cannot be empty".to_string()));
        }
        if self.roles.iter().any(|r| r.role_key == role_key) {
            return Err(AdminError::Duplicate(format!("role key {}", role_key)));
        }
        let role = Role {
            role_id: self.allocate_id(),
            role_name: role_name.to_string(),
            role_key: role_key.to_string(),
            role_sort,
            status: RecordStatus::Enabled,
            permission_ids: Vec::new(),
        };
        self.roles.push(role.clone());
        Ok(role)
    }

    /// Delete a role and unassign it from every user
    pub fn delete_role(&mut self, role_id: u64) -> Result<Role, AdminError> {
        let index = self
            .roles
            .iter()
            .position(|r| r.role_id == role_id)
            .ok_or_else(|| not_found("role", role_id))?;
        for user in &mut self.users {
            user.role_ids.retain(|id| *id != role_id);
        }
        Ok(self.roles.remove(index))
    }

    pub fn set_role_status(&mut self, role_id: u64, status: RecordStatus) -> Result<(), AdminError> {
        let role = self
            .roles
            .iter_mut()
            .find(|r| r.role_id == role_id)
            .ok_or_else(|| not_found("role", role_id))?;
        role.status = status;
        Ok(())
    }

    pub fn create_permission(&mut self, name: &str, perms: &str, parent_id: Option<u64>) -> Permission {
        let permission = Permission {
            permission_id: self.allocate_id(),
            name: name.to_string(),
            perms: perms.to_string(),
            parent_id,
        };
        self.permissions.push(permission.clone());
        permission
    }

    pub fn list_permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn grant_permissions(&mut self, role_id: u64, permission_ids: &[u64]) -> Result<(), AdminError> {
        if let Some(missing) = permission_ids
            .iter()
            .find(|id| !self.permissions.iter().any(|p| p.permission_id == **id))
        {
            return Err(not_found("permission", missing));
        }
        let role = self
            .roles
            .iter_mut()
            .find(|r| r.role_id == role_id)
            .ok_or_else(|| not_found("role", role_id))?;
        for id in permission_ids {
            if !role.permission_ids.contains(id) {
                role.permission_ids.push(*id);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Dictionaries
    // ========================================================================

    pub fn list_dict_types(&self, page: PageQuery) -> Page<DictType> {
        Page::from_slice(&self.dict_types, page)
    }

    pub fn create_dict_type(&mut self, dict_name: &str, dict_type: &str) -> Result<DictType, AdminError> {
        if self.dict_types.iter().any(|d| d.dict_type == dict_type) {
            return Err(AdminError::Duplicate(format!("dictionary type {}", dict_type)));
        }
        let dict = DictType {
            dict_id: self.allocate_id(),
            dict_name: dict_name.to_string(),
            dict_type: dict_type.to_string(),
            status: RecordStatus::Enabled,
        };
        self.dict_types.push(dict.clone());
        Ok(dict)
    }

    pub fn add_dict_data(
        &mut self,
        dict_type: &str,
        label: &str,
        value: &str,
        sort: u32,
    ) -> Result<DictData, AdminError> {
        if !self.dict_types.iter().any(|d| d.dict_type == dict_type) {
            return Err(not_found("dictionary type", dict_type));
        }
        if self
            .dict_data
            .iter()
            .any(|d| d.dict_type == dict_type && d.dict_value == value)
        {
            return Err(AdminError::Duplicate(format!("{} value {}", dict_type, value)));
        }
        let data = DictData {
            dict_code: self.allocate_id(),
            dict_type: dict_type.to_string(),
            dict_label: label.to_string(),
            dict_value: value.to_string(),
            dict_sort: sort,
        };
        self.dict_data.push(data.clone());
        Ok(data)
    }

    /// Entries of one dictionary, ordered by sort key
    pub fn dict_data(&self, dict_type: &str) -> Vec<DictData> {
        let mut data: Vec<DictData> = self
            .dict_data
            .iter()
            .filter(|d| d.dict_type == dict_type)
            .cloned()
            .collect();
        data.sort_by_key(|d| d.dict_sort);
        data
    }

    /// Remove a dictionary type together with its entries
    pub fn delete_dict_type(&mut self, dict_id: u64) -> Result<DictType, AdminError> {
        let index = self
            .dict_types
            .iter()
            .position(|d| d.dict_id == dict_id)
            .ok_or_else(|| not_found("dictionary type", dict_id))?;
        let removed = self.dict_types.remove(index);
        self.dict_data.retain(|d| d.dict_type != removed.dict_type);
        Ok(removed)
    }

    // ========================================================================
    // Data categories
    // ========================================================================

    pub fn create_category(
        &mut self,
        name: &str,
        parent_id: Option<u64>,
        order_num: u32,
    ) -> Result<DataCategory, AdminError> {
        if let Some(parent) = parent_id {
            if !self.categories.iter().any(|c| c.category_id == parent) {
                return Err(not_found("category", parent));
            }
        }
        let category = DataCategory {
            category_id: self.allocate_id(),
            category_name: name.to_string(),
            parent_id,
            order_num,
        };
        self.categories.push(category.clone());
        Ok(category)
    }

    /// Direct children of `parent_id` (`None` for roots), ordered
    pub fn child_categories(&self, parent_id: Option<u64>) -> Vec<DataCategory> {
        let mut children: Vec<DataCategory> = self
            .categories
            .iter()
            .filter(|c| c.parent_id == parent_id)
            .cloned()
            .collect();
        children.sort_by_key(|c| c.order_num);
        children
    }

    /// Categories with children cannot be deleted
    pub fn delete_category(&mut self, category_id: u64) -> Result<DataCategory, AdminError> {
        if self
            .categories
            .iter()
            .any(|c| c.parent_id == Some(category_id))
        {
            return Err(AdminError::Invalid(format!(
                "category {} still has children",
                category_id
            )));
        }
        let index = self
            .categories
            .iter()
            .position(|c| c.category_id == category_id)
            .ok_or_else(|| not_found("category", category_id))?;
        Ok(self.categories.remove(index))
    }
}
