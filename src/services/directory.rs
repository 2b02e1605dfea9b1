//! User/provider directory.
//!
//! Maps verified identities to local accounts. First login creates the
//! account and assigns its role from, in order: the admin allow-list, the
//! provider allow-list, a provider request carrying business details, and
//! finally the customer default. Repeat logins never change the role.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sea_orm::{DatabaseConnection, TransactionTrait};

use crate::config::{AppConfig, ProviderAllowlistEntry};
use crate::error::{ServiceError, is_unique_violation};
use crate::identity::IdentityProvider;
use crate::models::{Role, provider, user};
use crate::repositories::provider::BusinessInfo;
use crate::repositories::user::NewUser;
use crate::repositories::{ProviderRepository, UserRepository};
use crate::services::Actor;

/// Privileged emails supplied by configuration.
#[derive(Debug, Clone, Default)]
pub struct RoleAllowlists {
    admin_emails: HashSet<String>,
    providers: HashMap<String, ProviderAllowlistEntry>,
}

impl RoleAllowlists {
    pub fn new(
        admin_emails: impl IntoIterator<Item = String>,
        providers: impl IntoIterator<Item = ProviderAllowlistEntry>,
    ) -> Self {
        Self {
            admin_emails: admin_emails
                .into_iter()
                .map(|email| email.trim().to_lowercase())
                .collect(),
            providers: providers
                .into_iter()
                .map(|entry| (entry.email.trim().to_lowercase(), entry))
                .collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.admin_emails.iter().cloned(),
            config.provider_allowlist.iter().cloned(),
        )
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.contains(&email.trim().to_lowercase())
    }

    pub fn provider_entry(&self, email: &str) -> Option<&ProviderAllowlistEntry> {
        self.providers.get(&email.trim().to_lowercase())
    }
}

/// Inputs to first-login account resolution
#[derive(Debug, Clone, Default)]
pub struct AccountRequest {
    pub subject_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub requested_role: Option<Role>,
    pub business_name: Option<String>,
    pub business_description: Option<String>,
}

/// A local account with its provider profile, if it has one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user: user::Model,
    pub provider: Option<provider::Model>,
}

impl Account {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user.id.clone(), self.user.role)
    }
}

/// Outcome of [`Directory::resolve_or_create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Existing(Account),
    Created(Account),
}

impl Resolution {
    pub fn account(&self) -> &Account {
        match self {
            Resolution::Existing(account) | Resolution::Created(account) => account,
        }
    }

    pub fn into_account(self) -> Account {
        match self {
            Resolution::Existing(account) | Resolution::Created(account) => account,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Resolution::Created(_))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Role and optional business profile chosen for a new account.
fn assign_role(
    allowlists: &RoleAllowlists,
    request: &AccountRequest,
    email: &str,
    display_name: &str,
) -> Result<(Role, Option<BusinessInfo>), ServiceError> {
    let supplied = match (
        non_blank(request.business_name.as_deref()),
        non_blank(request.business_description.as_deref()),
    ) {
        (Some(business_name), Some(description)) => Some(BusinessInfo {
            business_name,
            description,
        }),
        _ => None,
    };

    if allowlists.is_admin(email) {
        return Ok((Role::Admin, None));
    }

    if let Some(entry) = allowlists.provider_entry(email) {
        let info = supplied.unwrap_or_else(|| BusinessInfo {
            business_name: entry
                .business_name
                .clone()
                .unwrap_or_else(|| display_name.to_string()),
            description: entry.description.clone().unwrap_or_default(),
        });
        return Ok((Role::Provider, Some(info)));
    }

    if request.requested_role == Some(Role::Provider) {
        return match supplied {
            Some(info) => Ok((Role::Provider, Some(info))),
            None => Err(ServiceError::validation(
                "business_name and business_description are required for provider accounts",
            )),
        };
    }

    Ok((Role::Customer, None))
}

#[derive(Clone)]
pub struct Directory {
    db: Arc<DatabaseConnection>,
    users: UserRepository,
    providers: ProviderRepository,
    allowlists: Arc<RoleAllowlists>,
    identity: Arc<dyn IdentityProvider>,
}

impl Directory {
    pub fn new(
        db: Arc<DatabaseConnection>,
        allowlists: Arc<RoleAllowlists>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            providers: ProviderRepository::new(db.clone()),
            db,
            allowlists,
            identity,
        }
    }

    async fn load_account(&self, user: user::Model) -> Result<Account, ServiceError> {
        let provider = self.providers.find_by_user_id(&user.id).await?;
        Ok(Account { user, provider })
    }

    /// Return the account for `subject_id`, creating it on first login.
    pub async fn resolve_or_create(
        &self,
        request: AccountRequest,
    ) -> Result<Resolution, ServiceError> {
        if let Some(user) = self.users.find_by_id(&request.subject_id).await? {
            return Ok(Resolution::Existing(self.load_account(user).await?));
        }

        let email = non_blank(request.email.as_deref())
            .ok_or_else(|| ServiceError::validation("Email missing from identity token"))?;
        let display_name = non_blank(request.display_name.as_deref())
            .unwrap_or_else(|| "Unnamed User".to_string());

        let (role, business) = assign_role(&self.allowlists, &request, &email, &display_name)?;

        let new_user = NewUser {
            id: request.subject_id.clone(),
            email,
            display_name,
            phone: non_blank(request.phone.as_deref()),
            role,
        };

        match self.insert_account(new_user, business).await {
            Ok(account) => {
                tracing::info!(
                    user_id = %account.user.id,
                    role = account.user.role.as_str(),
                    "Account created"
                );
                metrics::counter!("accounts_created_total", "role" => role.as_str()).increment(1);
                Ok(Resolution::Created(account))
            }
            Err(err) if is_unique_violation(&err) => {
                // A concurrent first login for the same subject won the race
                if let Some(user) = self.users.find_by_id(&request.subject_id).await? {
                    return Ok(Resolution::Existing(self.load_account(user).await?));
                }
                Err(ServiceError::conflict(
                    "An account with this email already exists",
                ))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// User row and provider row commit together or not at all.
    async fn insert_account(
        &self,
        new_user: NewUser,
        business: Option<BusinessInfo>,
    ) -> Result<Account, sea_orm::DbErr> {
        let txn = self.db.begin().await?;
        let user = UserRepository::insert_on(&txn, new_user).await?;
        let provider = match business {
            Some(info) => Some(ProviderRepository::insert_on(&txn, &user.id, info).await?),
            None => None,
        };
        txn.commit().await?;
        Ok(Account { user, provider })
    }

    pub async fn get_profile(&self, subject_id: &str) -> Result<Account, ServiceError> {
        let user = self
            .users
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;
        self.load_account(user).await
    }

    /// Delete the caller's own account, then revoke it upstream. A revoke
    /// failure is logged and does not undo the local deletion.
    pub async fn delete_account(&self, subject_id: &str) -> Result<(), ServiceError> {
        if !self.users.delete_by_id(subject_id).await? {
            return Err(ServiceError::not_found("User not found"));
        }
        tracing::info!(user_id = subject_id, "Account deleted");

        if let Err(err) = self.identity.revoke(subject_id).await {
            tracing::warn!(user_id = subject_id, error = %err, "Upstream identity revoke failed");
        }
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(self.users.list_all().await?)
    }

    /// Admin removal of another account. The upstream identity is left alone.
    pub async fn remove_user(&self, actor: &Actor, target_id: &str) -> Result<(), ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("Admin access required"));
        }
        if actor.user_id == target_id {
            return Err(ServiceError::validation(
                "Admins cannot delete their own account",
            ));
        }
        if !self.users.delete_by_id(target_id).await? {
            return Err(ServiceError::not_found("User not found"));
        }
        tracing::info!(admin_id = %actor.user_id, user_id = target_id, "User removed by admin");
        Ok(())
    }

    /// Admin role change. The provider profile is created or removed in the
    /// same transaction so that it exists exactly when the role is provider.
    pub async fn set_role(
        &self,
        actor: &Actor,
        target_id: &str,
        role: Role,
        business_name: Option<String>,
        business_description: Option<String>,
    ) -> Result<Account, ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("Admin access required"));
        }

        let existing = self
            .users
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        let txn = self.db.begin().await?;
        let current_provider = ProviderRepository::find_by_user_id_on(&txn, target_id).await?;

        let provider = match (role, current_provider) {
            (Role::Provider, Some(profile)) => Some(profile),
            (Role::Provider, None) => {
                let info = BusinessInfo {
                    business_name: non_blank(business_name.as_deref())
                        .unwrap_or_else(|| existing.display_name.clone()),
                    description: non_blank(business_description.as_deref()).unwrap_or_default(),
                };
                Some(ProviderRepository::insert_on(&txn, target_id, info).await?)
            }
            (_, Some(_)) => {
                ProviderRepository::delete_by_user_id_on(&txn, target_id).await?;
                None
            }
            (_, None) => None,
        };

        let user = UserRepository::set_role_on(&txn, existing, role).await?;
        txn.commit().await?;

        tracing::info!(
            admin_id = %actor.user_id,
            user_id = target_id,
            role = role.as_str(),
            "Role assigned"
        );
        Ok(Account { user, provider })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlists() -> RoleAllowlists {
        RoleAllowlists::new(
            vec!["Boss@Example.com".to_string()],
            vec![
                ProviderAllowlistEntry {
                    email: "chef@example.com".to_string(),
                    business_name: Some("Chef Co".to_string()),
                    description: Some("Dinners".to_string()),
                },
                ProviderAllowlistEntry {
                    email: "bare@example.com".to_string(),
                    business_name: None,
                    description: None,
                },
            ],
        )
    }

    fn request(role: Option<Role>, name: Option<&str>, desc: Option<&str>) -> AccountRequest {
        AccountRequest {
            subject_id: "uid".to_string(),
            requested_role: role,
            business_name: name.map(String::from),
            business_description: desc.map(String::from),
            ..AccountRequest::default()
        }
    }

    #[test]
    fn admin_allowlist_wins_over_provider_request() {
        let (role, business) = assign_role(
            &allowlists(),
            &request(Some(Role::Provider), Some("Biz"), Some("Desc")),
            "boss@example.com",
            "Boss",
        )
        .unwrap();
        assert_eq!(role, Role::Admin);
        assert!(business.is_none());
    }

    #[test]
    fn provider_allowlist_uses_supplied_then_listed_business_info() {
        let lists = allowlists();

        let (role, business) =
            assign_role(&lists, &request(None, None, None), "chef@example.com", "Chef").unwrap();
        assert_eq!(role, Role::Provider);
        assert_eq!(business.unwrap().business_name, "Chef Co");

        let (_, business) = assign_role(
            &lists,
            &request(None, Some("Own Biz"), Some("Own Desc")),
            "chef@example.com",
            "Chef",
        )
        .unwrap();
        assert_eq!(business.unwrap().business_name, "Own Biz");

        let (_, business) =
            assign_role(&lists, &request(None, None, None), "bare@example.com", "Bare").unwrap();
        let business = business.unwrap();
        assert_eq!(business.business_name, "Bare");
        assert_eq!(business.description, "");
    }

    #[test]
    fn provider_request_requires_business_details() {
        let err = assign_role(
            &allowlists(),
            &request(Some(Role::Provider), Some("Biz"), Some("  ")),
            "someone@example.com",
            "Someone",
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let (role, _) = assign_role(
            &allowlists(),
            &request(Some(Role::Provider), Some("Biz"), Some("Desc")),
            "someone@example.com",
            "Someone",
        )
        .unwrap();
        assert_eq!(role, Role::Provider);
    }

    #[test]
    fn admin_request_without_allowlist_is_customer() {
        let (role, business) = assign_role(
            &allowlists(),
            &request(Some(Role::Admin), None, None),
            "someone@example.com",
            "Someone",
        )
        .unwrap();
        assert_eq!(role, Role::Customer);
        assert!(business.is_none());
    }
}
