use mongodb::bson::{oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};

/// Usuário armazenado na collection `users`.
///
/// Only `_id`, `email` and `picture` are known to the server; everything else
/// the client submits is kept verbatim in `attributes`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: Option<ObjectId>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub attributes: Document,
}

impl User {
    pub fn from_document(mut doc: Document) -> Self {
        let id = match doc.remove("_id") {
            Some(Bson::ObjectId(oid)) => Some(oid),
            Some(other) => {
                doc.insert("_id", other);
                None
            }
            None => None,
        };
        let email = take_string(&mut doc, "email");
        let picture = take_string(&mut doc, "picture");

        User {
            id,
            email,
            picture,
            attributes: doc,
        }
    }

    pub fn into_document(self) -> Document {
        let mut doc = Document::new();
        if let Some(id) = self.id {
            doc.insert("_id", id);
        }
        if let Some(email) = self.email {
            doc.insert("email", email);
        }
        if let Some(picture) = self.picture {
            doc.insert("picture", picture);
        }
        doc.extend(self.attributes);
        doc
    }
}

fn take_string(doc: &mut Document, key: &str) -> Option<String> {
    match doc.get(key) {
        Some(Bson::String(_)) => match doc.remove(key) {
            Some(Bson::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Query string de `/user`
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Email usado como filtro (obrigatório)
    pub email: Option<String>,
}

/// Response de usuário
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        let attributes = match Bson::Document(u.attributes).into_relaxed_extjson() {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        UserResponse {
            id: u.id.map(|id| id.to_hex()).unwrap_or_default(),
            email: u.email,
            picture: u.picture,
            attributes,
        }
    }
}

/// OpenAPI view of a user. Extra attributes are free-form.
#[derive(Serialize, utoipa::ToSchema)]
#[allow(dead_code)]
pub struct UserSchema {
    pub id: String,
    pub email: Option<String>,
    pub picture: Option<String>,
}

/// OpenAPI view of the multipart form accepted by `POST /user`
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct CreateUserForm {
    pub email: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub picture: Vec<u8>,
}
