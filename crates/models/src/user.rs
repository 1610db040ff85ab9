use chrono::Utc;
use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::validation::{self, FieldError};

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Role {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "admin")]
    Admin,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Rides,
    Reservations,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Rides => Entity::has_many(crate::ride::Entity).into(),
            Relation::Reservations => Entity::has_many(crate::reservation::Entity).into(),
        }
    }
}

impl Related<crate::ride::Entity> for Entity {
    fn to() -> RelationDef { Relation::Rides.def() }
}

impl Related<crate::reservation::Entity> for Entity {
    fn to() -> RelationDef { Relation::Reservations.def() }
}

impl ActiveModelBehavior for ActiveModel {}

/// Input for a new account. The credential arrives already hashed; hashing
/// belongs to the authentication layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
}

/// Emails compare case-insensitively; they are stored in this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_new_user(input: &NewUser) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validation::check_email(&mut errors, "email", &input.email);
    validation::require_text(&mut errors, "first_name", &input.first_name, 128);
    validation::require_text(&mut errors, "last_name", &input.last_name, 128);
    if input.password_hash.trim().is_empty() {
        errors.push(FieldError::new("password_hash", "required"));
    }
    errors
}

pub fn active_model(input: &NewUser) -> ActiveModel {
    let now = Utc::now().into();
    ActiveModel {
        email: Set(normalize_email(&input.email)),
        first_name: Set(input.first_name.trim().to_string()),
        last_name: Set(input.last_name.trim().to_string()),
        password_hash: Set(input.password_hash.clone()),
        role: Set(input.role.clone()),
        verified: Set(input.verified),
        reset_token: Set(None),
        reset_token_expires_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

pub async fn create<C: ConnectionTrait>(db: &C, input: &NewUser) -> Result<Model, ModelError> {
    validation::into_result(validate_new_user(input))?;
    active_model(input).insert(db).await.map_err(|e| ModelError::Db(e.to_string()))
}

pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<Model>, ModelError> {
    Entity::find()
        .filter(Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))
}
