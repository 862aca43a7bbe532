//! Request bodies for onboarding, admin provisioning and admin sign-up

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// `POST /api/onboarding` body: `{"data": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingEnvelope {
    pub data: OnboardingPayload,
}

/// Sections are optional at parse time so a missing one is a validation
/// error naming it rather than a generic JSON rejection
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingPayload {
    pub personal: Option<PersonalInfo>,
    pub store: Option<StoreInfo>,
    pub business: Option<BusinessInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "personal.fullName is required"))]
    pub full_name: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 40, message = "personal.phoneNumber is required"))]
    pub phone_number: String,

    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    #[serde(default)]
    #[validate(length(min = 1, max = 120, message = "store.storeName is required"))]
    pub store_name: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 2000, message = "store.storeDescription is required"))]
    pub store_description: String,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "business.businessType is required"))]
    pub business_type: String,

    #[serde(default)]
    pub business_name: Option<String>,

    #[serde(default)]
    pub sales_channels: Vec<String>,

    #[serde(default)]
    pub monthly_revenue: Option<String>,
}

/// Payload with every section present, trimmed and checked
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidOnboarding {
    pub personal: PersonalInfo,
    pub store: StoreInfo,
    pub business: BusinessInfo,
}

fn trim(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// Trim, drop blank categories and dedupe them case-insensitively
pub(crate) fn clean_categories(categories: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    categories
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(c.to_lowercase()))
        .collect()
}

impl OnboardingPayload {
    /// Check every section; nothing is written when this fails
    pub fn validate_sections(self) -> Result<ValidOnboarding> {
        let mut personal = self
            .personal
            .ok_or_else(|| AppError::validation("personal section is required"))?;
        let mut store = self
            .store
            .ok_or_else(|| AppError::validation("store section is required"))?;
        let mut business = self
            .business
            .ok_or_else(|| AppError::validation("business section is required"))?;

        trim(&mut personal.full_name);
        trim(&mut personal.phone_number);
        trim(&mut store.store_name);
        trim(&mut store.store_description);
        trim(&mut business.business_type);
        store.categories = clean_categories(store.categories);

        personal.validate()?;
        store.validate()?;
        business.validate()?;

        if store.categories.is_empty() {
            return Err(AppError::Validation {
                message: "store.categories needs at least one category".to_string(),
                field: Some("categories".to_string()),
            });
        }

        Ok(ValidOnboarding {
            personal,
            store,
            business,
        })
    }
}

/// `POST /api/tenants` body
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminTenantRequest {
    #[validate(length(min = 1, max = 200, message = "fullName is required"))]
    pub full_name: String,

    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,

    #[serde(default)]
    pub phone_number: Option<String>,

    #[validate(length(min = 1, max = 120, message = "storeName is required"))]
    pub store_name: String,

    #[serde(default)]
    pub store_description: Option<String>,

    #[serde(default)]
    pub store_location: Option<String>,

    #[serde(default)]
    pub categories: Vec<String>,
}

impl AdminTenantRequest {
    pub fn normalized(mut self) -> Result<Self> {
        trim(&mut self.full_name);
        trim(&mut self.store_name);
        self.email = self.email.trim().to_lowercase();
        self.categories = clean_categories(self.categories);

        self.validate()?;

        if self.categories.is_empty() {
            return Err(AppError::Validation {
                message: "categories needs at least one category".to_string(),
                field: Some("categories".to_string()),
            });
        }
        Ok(self)
    }
}

/// `POST /api/admin-signup` body
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminSignupRequest {
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
}
