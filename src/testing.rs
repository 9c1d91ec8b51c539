//! In-memory stand-ins for the external services, used by unit and router tests.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use jsonwebtoken::Algorithm;
use time::OffsetDateTime;

use crate::auth::{jwt::TokenService, password::CredentialHasher};
use crate::cache::UserCache;
use crate::config::{AppConfig, JwtConfig, MailConfig, StorageConfig};
use crate::contacts::repo::{ContactFilter, ContactRepository};
use crate::contacts::repo_types::{Contact, ContactFields};
use crate::db::UniqueViolation;
use crate::mail::{EmailMessage, Mailer};
use crate::state::AppState;
use crate::storage::StorageClient;
use crate::users::repo::UserRepository;
use crate::users::repo_types::{NewUser, User};

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret".into(),
        algorithm: Algorithm::HS256,
        access_ttl_minutes: 15,
        refresh_ttl_minutes: 60 * 24 * 7,
        email_ttl_minutes: 60 * 24,
    }
}

pub fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        redis_url: "redis://unused".into(),
        base_url: "http://localhost:8080".into(),
        bind_addr: ([127, 0, 0, 1], 0).into(),
        salt_length: 16,
        user_cache_ttl_seconds: 900,
        jwt: jwt_config(),
        storage: StorageConfig {
            endpoint: "http://storage.test".into(),
            bucket: "contacts".into(),
            access_key: "key".into(),
            secret_key: "secret".into(),
            public_url: "http://storage.test/contacts".into(),
        },
        mail: MailConfig {
            api_url: None,
            api_key: String::new(),
            from: "no-reply@contacts.local".into(),
            from_name: "Contacts App".into(),
        },
    }
}

#[derive(Default)]
pub struct MemoryUserRepository {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserRepository {
    /// Inserts directly, bypassing uniqueness checks. The password is a placeholder.
    pub fn insert_user(&self, username: &str, email: &str, confirmed: bool) -> User {
        let mut rows = self.rows.lock().unwrap();
        let user = User {
            id: rows.len() as i64 + 1,
            username: username.into(),
            email: email.into(),
            password: "unusable".into(),
            salt: String::new(),
            created_at: OffsetDateTime::now_utc(),
            refresh_token: None,
            confirmed,
            avatar: None,
        };
        rows.push(user.clone());
        user
    }

    pub fn remove(&self, email: &str) {
        self.rows.lock().unwrap().retain(|u| u.email != email);
    }

    pub fn snapshot(&self, email: &str) -> Option<User> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    fn modify<F: FnOnce(&mut User)>(&self, email: &str, f: F) -> anyhow::Result<User> {
        let mut rows = self.rows.lock().unwrap();
        let user = rows
            .iter_mut()
            .find(|u| u.email == email)
            .ok_or_else(|| anyhow::anyhow!("no user {email}"))?;
        f(user);
        Ok(user.clone())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.snapshot(email))
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.email == new.email) {
            return Err(anyhow::Error::new(UniqueViolation("users_email_key".into())));
        }
        if rows.iter().any(|u| u.username == new.username) {
            return Err(anyhow::Error::new(UniqueViolation("users_username_key".into())));
        }
        let user = User {
            id: rows.len() as i64 + 1,
            username: new.username,
            email: new.email,
            password: new.password_hash,
            salt: new.salt,
            created_at: OffsetDateTime::now_utc(),
            refresh_token: None,
            confirmed: false,
            avatar: None,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn update_token(&self, email: &str, token: Option<&str>) -> anyhow::Result<()> {
        self.modify(email, |u| u.refresh_token = token.map(str::to_string))?;
        Ok(())
    }

    async fn confirm_email(&self, email: &str) -> anyhow::Result<()> {
        self.modify(email, |u| u.confirmed = true)?;
        Ok(())
    }

    async fn update_avatar(&self, email: &str, avatar_url: &str) -> anyhow::Result<User> {
        self.modify(email, |u| u.avatar = Some(avatar_url.to_string()))
    }

    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
        salt: &str,
    ) -> anyhow::Result<User> {
        self.modify(email, |u| {
            u.password = password_hash.to_string();
            u.salt = salt.to_string();
        })
    }
}

#[derive(Default)]
pub struct MemoryUserCache {
    entries: Mutex<HashMap<String, User>>,
}

#[async_trait]
impl UserCache for MemoryUserCache {
    async fn lookup(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.entries.lock().unwrap().get(email).cloned())
    }

    async fn store(&self, email: &str, user: &User) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(email.to_string(), user.clone());
        Ok(())
    }
}

/// Mirrors the (email, user_id) and (phone, user_id) unique constraints.
#[derive(Default)]
pub struct MemoryContactRepository {
    rows: Mutex<Vec<Contact>>,
    next_id: Mutex<i64>,
}

fn clashes(rows: &[Contact], user_id: i64, skip_id: Option<i64>, fields: &ContactFields) -> bool {
    rows.iter().any(|c| {
        c.user_id == user_id
            && Some(c.id) != skip_id
            && (c.email == fields.email || c.phone == fields.phone)
    })
}

#[async_trait]
impl ContactRepository for MemoryContactRepository {
    async fn list(&self, user_id: i64, filter: ContactFilter) -> anyhow::Result<Vec<Contact>> {
        let rows = self.rows.lock().unwrap();
        let owned = rows.iter().filter(|c| c.user_id == user_id);
        let found = match filter {
            ContactFilter::All => owned.cloned().collect(),
            ContactFilter::Name(term) => {
                let term = term.to_lowercase();
                owned
                    .filter(|c| {
                        c.first_name.to_lowercase().contains(&term)
                            || c.last_name.to_lowercase().contains(&term)
                    })
                    .cloned()
                    .collect()
            }
            ContactFilter::Email(term) => {
                let term = term.to_lowercase();
                owned
                    .filter(|c| c.email.to_lowercase().contains(&term))
                    .cloned()
                    .collect()
            }
        };
        Ok(found)
    }

    async fn get(&self, user_id: i64, contact_id: i64) -> anyhow::Result<Option<Contact>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == contact_id && c.user_id == user_id)
            .cloned())
    }

    async fn create(&self, user_id: i64, fields: ContactFields) -> anyhow::Result<Contact> {
        let mut rows = self.rows.lock().unwrap();
        if clashes(&rows, user_id, None, &fields) {
            return Err(anyhow::Error::new(UniqueViolation("contacts_email_user".into())));
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let contact = fields.into_contact(*next, user_id);
        rows.push(contact.clone());
        Ok(contact)
    }

    async fn update(
        &self,
        user_id: i64,
        contact_id: i64,
        fields: ContactFields,
    ) -> anyhow::Result<Option<Contact>> {
        let mut rows = self.rows.lock().unwrap();
        if !rows.iter().any(|c| c.id == contact_id && c.user_id == user_id) {
            return Ok(None);
        }
        if clashes(&rows, user_id, Some(contact_id), &fields) {
            return Err(anyhow::Error::new(UniqueViolation("contacts_email_user".into())));
        }
        let updated = fields.into_contact(contact_id, user_id);
        for row in rows.iter_mut().filter(|c| c.id == contact_id) {
            *row = updated.clone();
        }
        Ok(Some(updated))
    }

    async fn delete(&self, user_id: i64, contact_id: i64) -> anyhow::Result<Option<Contact>> {
        let mut rows = self.rows.lock().unwrap();
        let pos = rows
            .iter()
            .position(|c| c.id == contact_id && c.user_id == user_id);
        Ok(pos.map(|i| rows.remove(i)))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn fail_deliveries(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Waits for detached send tasks until at least `count` messages arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<EmailMessage> {
        for _ in 0..200 {
            {
                let sent = self.sent.lock().unwrap();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} emails to be sent");
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("relay unavailable");
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
}

impl MemoryStorage {
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("http://storage.test/contacts/{key}")
    }
}

/// An [`AppState`] wired to in-memory services, with handles kept for assertions.
pub struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUserRepository>,
    pub mailer: Arc<RecordingMailer>,
    pub storage: Arc<MemoryStorage>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = app_config();
        let users = Arc::new(MemoryUserRepository::default());
        let mailer = Arc::new(RecordingMailer::default());
        let storage = Arc::new(MemoryStorage::default());
        let state = AppState {
            users: users.clone(),
            contacts: Arc::new(MemoryContactRepository::default()),
            cache: Arc::new(MemoryUserCache::default()),
            tokens: Arc::new(TokenService::new(&config.jwt)),
            hasher: CredentialHasher::new(config.salt_length),
            storage: storage.clone(),
            mailer: mailer.clone(),
            config: Arc::new(config),
        };
        Self {
            state,
            users,
            mailer,
            storage,
        }
    }

    /// Registers a user with a real password hash.
    pub async fn seed_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirmed: bool,
    ) -> User {
        let (password_hash, salt) = self.state.hasher.hash(password).unwrap();
        self.users
            .create(NewUser {
                username: username.into(),
                email: email.into(),
                password_hash,
                salt,
            })
            .await
            .unwrap();
        if confirmed {
            self.users.confirm_email(email).await.unwrap();
        }
        self.users.snapshot(email).unwrap()
    }

    pub fn access_token(&self, email: &str) -> String {
        self.state.tokens.create_access_token(email, None).unwrap()
    }
}
