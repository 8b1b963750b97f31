//! Request and response models for the API.
//!
//! Documents are stored in Redis as the same JSON they are served as, so
//! field names here are the wire names (camelCase).

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Every collection the service exposes under `/api/{collection}`.
pub const COLLECTIONS: [&str; 5] = ["users", "tasks", "customers", "products", "students"];

// ============================================================================
// Auth Models
// ============================================================================

/// Login request body. Missing fields deserialize as empty strings so a
/// malformed body fails the credential check like any other mismatch.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// The identity and role embedded in a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUser {
    pub username: String,
    pub role: String,
}

/// Response after a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: TokenUser,
}

/// Response for `GET /auth/me`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: TokenUser,
    pub expires_at: i64,
}

// ============================================================================
// Document Models
// ============================================================================

/// Fields every stored document carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocMeta {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Paginated list response.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub items: Vec<T>,
}

/// Whether a document body is being validated for POST or PUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Replace,
}

/// A document type stored in its own collection.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Client-supplied body for create and replace.
    type Draft: DeserializeOwned + Send;

    /// Collection name; also the URL segment and Redis key prefix.
    const COLLECTION: &'static str;
    /// Human-readable name used in error messages.
    const LABEL: &'static str;
    const DEFAULT_LIMIT: usize = 10;
    /// JSON field whose value must be unique across the collection.
    const UNIQUE_FIELD: Option<&'static str> = None;
    /// Boolean query parameter that filters listings.
    const FILTER_PARAM: Option<&'static str> = None;

    /// Error message when required fields are missing or mistyped.
    fn required_message(mode: WriteMode) -> &'static str;

    /// Validate a draft and build the document.
    fn from_draft(draft: Self::Draft, mode: WriteMode, meta: DocMeta) -> Result<Self, AppError>;

    fn meta(&self) -> &DocMeta;

    fn meta_mut(&mut self) -> &mut DocMeta;

    fn unique_value(&self) -> Option<&str> {
        None
    }

    fn filter_value(&self) -> Option<bool> {
        None
    }

    /// Parse a raw JSON body. Any type mismatch is reported as a missing field.
    fn parse(body: serde_json::Value, mode: WriteMode, meta: DocMeta) -> Result<Self, AppError> {
        let draft: Self::Draft = serde_json::from_value(body)
            .map_err(|_| AppError::BadRequest(Self::required_message(mode).to_string()))?;
        Self::from_draft(draft, mode, meta)
    }
}

/// Trim a string, treating blank as absent.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_email(value: Option<String>) -> Option<String> {
    clean(value).map(|v| v.to_lowercase())
}

/// Check that a string has the shape of a document id (24 lowercase hex chars).
pub fn is_document_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

// ----------------------------------------------------------------------------
// Users
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub meta: DocMeta,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UserDraft {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Resource for User {
    type Draft = UserDraft;
    const COLLECTION: &'static str = "users";
    const LABEL: &'static str = "User";
    const UNIQUE_FIELD: Option<&'static str> = Some("email");

    fn required_message(_mode: WriteMode) -> &'static str {
        "email and name are required"
    }

    fn from_draft(draft: UserDraft, mode: WriteMode, meta: DocMeta) -> Result<Self, AppError> {
        match (clean_email(draft.email), clean(draft.name)) {
            (Some(email), Some(name)) => Ok(User { meta, email, name }),
            _ => Err(AppError::BadRequest(Self::required_message(mode).to_string())),
        }
    }

    fn meta(&self) -> &DocMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocMeta {
        &mut self.meta
    }

    fn unique_value(&self) -> Option<&str> {
        Some(&self.email)
    }
}

// ----------------------------------------------------------------------------
// Tasks
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(flatten)]
    pub meta: DocMeta,
    pub title: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: Option<String>,
    /// Raw value: create coerces any JSON type, replace demands a boolean.
    pub completed: Option<serde_json::Value>,
    pub user_id: Option<serde_json::Value>,
}

/// Truthiness of a loosely typed flag: `null`, `false`, `0`, `NaN` and `""`
/// are false, everything else is true.
fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

impl Resource for Task {
    type Draft = TaskDraft;
    const COLLECTION: &'static str = "tasks";
    const LABEL: &'static str = "Task";
    const FILTER_PARAM: Option<&'static str> = Some("completed");

    fn required_message(mode: WriteMode) -> &'static str {
        match mode {
            WriteMode::Create => "title is required",
            WriteMode::Replace => "title (string) and completed (boolean) are required",
        }
    }

    fn from_draft(draft: TaskDraft, mode: WriteMode, meta: DocMeta) -> Result<Self, AppError> {
        let missing = || AppError::BadRequest(Self::required_message(mode).to_string());

        let title = clean(draft.title).ok_or_else(missing)?;
        let completed = match (mode, draft.completed) {
            (WriteMode::Create, value) => value.as_ref().is_some_and(truthy),
            (WriteMode::Replace, Some(serde_json::Value::Bool(b))) => b,
            (WriteMode::Replace, _) => return Err(missing()),
        };
        let user_id = match draft.user_id {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(id)) => clean(Some(id)),
            Some(_) => return Err(AppError::BadRequest("invalid userId".to_string())),
        };
        if let Some(ref id) = user_id {
            if !is_document_id(id) {
                return Err(AppError::BadRequest("invalid userId".to_string()));
            }
        }

        Ok(Task {
            meta,
            title,
            completed,
            user_id,
        })
    }

    fn meta(&self) -> &DocMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocMeta {
        &mut self.meta
    }

    fn filter_value(&self) -> Option<bool> {
        Some(self.completed)
    }
}

// ----------------------------------------------------------------------------
// Customers
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(flatten)]
    pub meta: DocMeta,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerDraft {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl Resource for Customer {
    type Draft = CustomerDraft;
    const COLLECTION: &'static str = "customers";
    const LABEL: &'static str = "Customer";
    const UNIQUE_FIELD: Option<&'static str> = Some("email");

    fn required_message(_mode: WriteMode) -> &'static str {
        "name and email are required"
    }

    fn from_draft(draft: CustomerDraft, mode: WriteMode, meta: DocMeta) -> Result<Self, AppError> {
        match (clean(draft.name), clean_email(draft.email)) {
            (Some(name), Some(email)) => Ok(Customer {
                meta,
                name,
                email,
                phone: clean(draft.phone),
                address: clean(draft.address),
            }),
            _ => Err(AppError::BadRequest(Self::required_message(mode).to_string())),
        }
    }

    fn meta(&self) -> &DocMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocMeta {
        &mut self.meta
    }

    fn unique_value(&self) -> Option<&str> {
        Some(&self.email)
    }
}

// ----------------------------------------------------------------------------
// Products
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(flatten)]
    pub meta: DocMeta,
    pub name: String,
    pub price: f64,
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub in_stock: Option<bool>,
    pub description: Option<String>,
}

impl Resource for Product {
    type Draft = ProductDraft;
    const COLLECTION: &'static str = "products";
    const LABEL: &'static str = "Product";
    const FILTER_PARAM: Option<&'static str> = Some("inStock");

    fn required_message(mode: WriteMode) -> &'static str {
        match mode {
            WriteMode::Create => "name and price (number) are required",
            WriteMode::Replace => {
                "name (string), price (number), inStock (boolean) are required"
            }
        }
    }

    fn from_draft(draft: ProductDraft, mode: WriteMode, meta: DocMeta) -> Result<Self, AppError> {
        let missing = || AppError::BadRequest(Self::required_message(mode).to_string());

        let name = clean(draft.name).ok_or_else(missing)?;
        let price = draft.price.ok_or_else(missing)?;
        if !price.is_finite() || price < 0.0 {
            return Err(AppError::BadRequest(
                "price must be a non-negative number".to_string(),
            ));
        }
        let in_stock = match mode {
            WriteMode::Create => draft.in_stock.unwrap_or(true),
            WriteMode::Replace => draft.in_stock.ok_or_else(missing)?,
        };

        Ok(Product {
            meta,
            name,
            price,
            in_stock,
            description: clean(draft.description),
        })
    }

    fn meta(&self) -> &DocMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocMeta {
        &mut self.meta
    }

    fn filter_value(&self) -> Option<bool> {
        Some(self.in_stock)
    }
}

// ----------------------------------------------------------------------------
// Students
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(flatten)]
    pub meta: DocMeta,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub cohort: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub cohort: Option<String>,
}

impl Resource for Student {
    type Draft = StudentDraft;
    const COLLECTION: &'static str = "students";
    const LABEL: &'static str = "Student";
    const DEFAULT_LIMIT: usize = 50;
    const UNIQUE_FIELD: Option<&'static str> = Some("email");

    fn required_message(_mode: WriteMode) -> &'static str {
        "firstName, lastName, and email are required"
    }

    fn from_draft(draft: StudentDraft, mode: WriteMode, meta: DocMeta) -> Result<Self, AppError> {
        match (
            clean(draft.first_name),
            clean(draft.last_name),
            clean_email(draft.email),
        ) {
            (Some(first_name), Some(last_name), Some(email)) => Ok(Student {
                meta,
                first_name,
                last_name,
                email,
                cohort: clean(draft.cohort),
            }),
            _ => Err(AppError::BadRequest(Self::required_message(mode).to_string())),
        }
    }

    fn meta(&self) -> &DocMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocMeta {
        &mut self.meta
    }

    fn unique_value(&self) -> Option<&str> {
        Some(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> DocMeta {
        let now = Utc::now();
        DocMeta {
            id: "65f1c2a0aabbccddeeff0011".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn bad_request_message(err: AppError) -> String {
        match err {
            AppError::BadRequest(msg) => msg,
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_is_document_id() {
        assert!(is_document_id("65f1c2a0aabbccddeeff0011"));
        assert!(!is_document_id("65F1C2A0AABBCCDDEEFF0011"));
        assert!(!is_document_id("65f1c2a0aabbccddeeff001"));
        assert!(!is_document_id("zzf1c2a0aabbccddeeff0011"));
        assert!(!is_document_id(""));
    }

    #[test]
    fn test_customer_email_normalized() {
        let customer = Customer::parse(
            json!({"name": "  Jane Doe ", "email": " Jane@Example.COM ", "phone": "   "}),
            WriteMode::Create,
            meta(),
        )
        .unwrap();
        assert_eq!(customer.name, "Jane Doe");
        assert_eq!(customer.email, "jane@example.com");
        assert_eq!(customer.phone, None);
        assert_eq!(customer.unique_value(), Some("jane@example.com"));
    }

    #[test]
    fn test_customer_missing_email() {
        let err = Customer::parse(json!({"name": "Jane"}), WriteMode::Create, meta()).unwrap_err();
        assert_eq!(bad_request_message(err), "name and email are required");
    }

    #[test]
    fn test_wrong_type_reported_as_required() {
        let err =
            Customer::parse(json!({"name": 42, "email": "a@b.c"}), WriteMode::Create, meta())
                .unwrap_err();
        assert_eq!(bad_request_message(err), "name and email are required");
    }

    #[test]
    fn test_task_create_defaults_completed() {
        let task = Task::parse(json!({"title": "Write docs"}), WriteMode::Create, meta()).unwrap();
        assert!(!task.completed);
        assert_eq!(task.user_id, None);
        assert_eq!(task.filter_value(), Some(false));
    }

    #[test]
    fn test_task_replace_requires_completed() {
        let err = Task::parse(json!({"title": "Write docs"}), WriteMode::Replace, meta())
            .unwrap_err();
        assert_eq!(
            bad_request_message(err),
            "title (string) and completed (boolean) are required"
        );
    }

    #[test]
    fn test_task_create_coerces_completed() {
        for (value, expected) in [
            (json!("true"), true),
            (json!(1), true),
            (json!(""), false),
            (json!(0), false),
            (json!(null), false),
        ] {
            let task = Task::parse(
                json!({"title": "Write docs", "completed": value}),
                WriteMode::Create,
                meta(),
            )
            .unwrap();
            assert_eq!(task.completed, expected, "completed: {}", value);
        }
    }

    #[test]
    fn test_task_replace_rejects_non_boolean_completed() {
        let err = Task::parse(
            json!({"title": "Write docs", "completed": "true"}),
            WriteMode::Replace,
            meta(),
        )
        .unwrap_err();
        assert_eq!(
            bad_request_message(err),
            "title (string) and completed (boolean) are required"
        );
    }

    #[test]
    fn test_task_mistyped_user_id() {
        let err = Task::parse(
            json!({"title": "Write docs", "userId": 42}),
            WriteMode::Create,
            meta(),
        )
        .unwrap_err();
        assert_eq!(bad_request_message(err), "invalid userId");
    }

    #[test]
    fn test_task_invalid_user_id() {
        let err = Task::parse(
            json!({"title": "Write docs", "userId": "not-an-id"}),
            WriteMode::Create,
            meta(),
        )
        .unwrap_err();
        assert_eq!(bad_request_message(err), "invalid userId");
    }

    #[test]
    fn test_product_defaults_in_stock() {
        let product = Product::parse(
            json!({"name": "Trail Runner Pro", "price": 189.0}),
            WriteMode::Create,
            meta(),
        )
        .unwrap();
        assert!(product.in_stock);
        assert_eq!(product.filter_value(), Some(true));
    }

    #[test]
    fn test_product_price_must_be_number() {
        let err = Product::parse(
            json!({"name": "Trail Runner Pro", "price": "189"}),
            WriteMode::Create,
            meta(),
        )
        .unwrap_err();
        assert_eq!(
            bad_request_message(err),
            "name and price (number) are required"
        );
    }

    #[test]
    fn test_product_negative_price() {
        let err = Product::parse(
            json!({"name": "Refund", "price": -1.0}),
            WriteMode::Create,
            meta(),
        )
        .unwrap_err();
        assert_eq!(
            bad_request_message(err),
            "price must be a non-negative number"
        );
    }

    #[test]
    fn test_product_replace_requires_in_stock() {
        let err = Product::parse(
            json!({"name": "Trail Runner Pro", "price": 189.0}),
            WriteMode::Replace,
            meta(),
        )
        .unwrap_err();
        assert!(bad_request_message(err).contains("inStock (boolean)"));
    }

    #[test]
    fn test_student_cohort_serialized_as_null() {
        let student = Student::parse(
            json!({"firstName": "Ada", "lastName": "Lovelace", "email": "ADA@example.com"}),
            WriteMode::Create,
            meta(),
        )
        .unwrap();
        let value = serde_json::to_value(&student).unwrap();
        assert_eq!(value["cohort"], serde_json::Value::Null);
        assert_eq!(value["email"], "ada@example.com");
        assert_eq!(value["firstName"], "Ada");
        assert!(value["createdAt"].is_string());
        assert_eq!(value["id"], "65f1c2a0aabbccddeeff0011");
    }

    #[test]
    fn test_document_json_is_flat() {
        let user = User::parse(
            json!({"email": "x@y.z", "name": "X"}),
            WriteMode::Create,
            meta(),
        )
        .unwrap();
        let text = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&text).unwrap();
        assert_eq!(back.meta, user.meta);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("meta").is_none());
        assert_eq!(value["email"], "x@y.z");
    }

    #[test]
    fn test_login_request_tolerates_missing_fields() {
        let req: LoginRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.username, "");
        assert_eq!(req.password, "");
    }

    #[test]
    fn test_login_response_wire_names() {
        let resp = LoginResponse {
            token: "t".to_string(),
            expires_in: 3600,
            user: TokenUser {
                username: "admin".to_string(),
                role: "Manager".to_string(),
            },
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["expiresIn"], 3600);
        assert_eq!(value["user"]["username"], "admin");
        assert_eq!(value["user"]["role"], "Manager");
    }
}
