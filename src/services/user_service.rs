// ==================== USER STORE ====================
// Persistência da collection `users` no MongoDB.
// Cada operação HTTP corresponde a exatamente uma chamada aqui.

use crate::{
    database::{MongoDB, USERS_COLLECTION},
    models::User,
    utils::StoreError,
};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::ReturnDocument,
    Collection,
};

/// Persistence seam for the user resource.
///
/// Lookups return `Ok(None)` when nothing matches the email; only driver
/// failures are errors.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users in storage order
    async fn find_all(&self) -> Result<Vec<User>, StoreError>;

    /// First user whose `email` equals the given one
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Applies `changes` as a `$set` on the first match and returns the updated user
    async fn update_by_email(&self, email: &str, changes: Document) -> Result<Option<User>, StoreError>;

    /// Removes the first match and returns it
    async fn remove_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Persists a new user and returns it with its assigned id
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

pub struct MongoUserStore {
    db: MongoDB,
    users: Collection<Document>,
}

impl MongoUserStore {
    pub fn new(db: MongoDB) -> Self {
        let users = db.collection::<Document>(USERS_COLLECTION);
        Self { db, users }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let docs: Vec<Document> = self.users.find(doc! {}).await?.try_collect().await?;
        Ok(docs.into_iter().map(User::from_document).collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let found = self.users.find_one(doc! { "email": email }).await?;
        Ok(found.map(User::from_document))
    }

    async fn update_by_email(&self, email: &str, changes: Document) -> Result<Option<User>, StoreError> {
        // MongoDB rejects an empty $set
        if changes.is_empty() {
            return self.find_by_email(email).await;
        }

        let updated = self
            .users
            .find_one_and_update(doc! { "email": email }, doc! { "$set": changes })
            .return_document(ReturnDocument::After)
            .await?;

        Ok(updated.map(User::from_document))
    }

    async fn remove_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let removed = self.users.find_one_and_delete(doc! { "email": email }).await?;
        Ok(removed.map(User::from_document))
    }

    async fn insert(&self, mut user: User) -> Result<User, StoreError> {
        if user.id.is_none() {
            user.id = Some(ObjectId::new());
        }

        let document = user.clone().into_document();
        self.users.insert_one(&document).await?;

        Ok(user)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.ping().await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store backing the handler tests
    #[derive(Default)]
    pub struct InMemoryUserStore {
        users: Mutex<Vec<Document>>,
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl InMemoryUserStore {
        pub fn with_users(users: Vec<User>) -> Self {
            let store = Self::default();
            {
                let mut docs = store.users.lock().unwrap();
                for mut user in users {
                    user.id.get_or_insert_with(ObjectId::new);
                    docs.push(user.into_document());
                }
            }
            store
        }

        /// Number of store operations performed so far
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Makes every following operation fail
        pub fn fail(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        fn enter(&self) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("in-memory store set to fail".into()));
            }
            Ok(())
        }

        fn position(docs: &[Document], email: &str) -> Option<usize> {
            docs.iter().position(|d| d.get_str("email").ok() == Some(email))
        }
    }

    #[async_trait]
    impl UserStore for InMemoryUserStore {
        async fn find_all(&self) -> Result<Vec<User>, StoreError> {
            self.enter()?;
            let docs = self.users.lock().unwrap();
            Ok(docs.iter().cloned().map(User::from_document).collect())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.enter()?;
            let docs = self.users.lock().unwrap();
            Ok(Self::position(&docs, email).map(|i| User::from_document(docs[i].clone())))
        }

        async fn update_by_email(&self, email: &str, changes: Document) -> Result<Option<User>, StoreError> {
            self.enter()?;
            let mut docs = self.users.lock().unwrap();
            let Some(i) = Self::position(&docs, email) else {
                return Ok(None);
            };
            for (key, value) in changes {
                docs[i].insert(key, value);
            }
            Ok(Some(User::from_document(docs[i].clone())))
        }

        async fn remove_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.enter()?;
            let mut docs = self.users.lock().unwrap();
            Ok(Self::position(&docs, email).map(|i| User::from_document(docs.remove(i))))
        }

        async fn insert(&self, mut user: User) -> Result<User, StoreError> {
            self.enter()?;
            user.id.get_or_insert_with(ObjectId::new);
            self.users.lock().unwrap().push(user.clone().into_document());
            Ok(user)
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.enter()
        }
    }
}
