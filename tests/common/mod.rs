#![allow(dead_code)]

use std::sync::Arc;

use excel_analytics::{
    AppConfig, AppState, InMemoryRepository, InMemoryStorage, accounts,
    client::{ApiClient, Session},
    config::SeedAccount,
    create_router,
    models::{LoginRequest, RegisterRequest, Role},
    repository::RepositoryState,
    storage::StorageState,
};
use rust_xlsxwriter::Workbook;
use tokio::net::TcpListener;

pub const SUPERADMIN_EMAIL: &str = "root@example.com";
pub const SUPERADMIN_PASSWORD: &str = "root-password";

/// TestApp
///
/// A server on an ephemeral port over the in-memory repository and storage.
/// The concrete handles are kept so tests can inspect state directly.
pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryRepository>,
    pub storage: Arc<InMemoryStorage>,
    pub client: ApiClient,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default()).await
}

pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let storage = Arc::new(InMemoryStorage::new());

    accounts::ensure_seed_account(
        repo.as_ref(),
        &SeedAccount {
            name: "Root".to_string(),
            email: SUPERADMIN_EMAIL.to_string(),
            password: SUPERADMIN_PASSWORD.to_string(),
        },
    )
    .await
    .expect("seeding the superadmin failed");

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: storage.clone() as StorageState,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        client: ApiClient::new(address.clone()),
        address,
        repo,
        storage,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) {
        self.client
            .register(&RegisterRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .expect("registration failed");
    }

    pub async fn login(&self, email: &str, password: &str) -> Session {
        let mut session = Session::new();
        self.client
            .login(
                &mut session,
                &LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                    role: None,
                },
            )
            .await
            .expect("login failed");
        session
    }

    /// Registers a fresh `user` and returns its session.
    pub async fn user_session(&self, name: &str) -> Session {
        let email = format!("{}@example.com", name.to_lowercase());
        self.register(name, &email, "password123").await;
        let session = self.login(&email, "password123").await;
        assert_eq!(session.context().map(|c| c.role), Some(Role::User));
        session
    }

    pub async fn superadmin_session(&self) -> Session {
        self.login(SUPERADMIN_EMAIL, SUPERADMIN_PASSWORD).await
    }
}

pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Fixture cell for `workbook_bytes`.
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Bool(bool),
    Blank,
}

/// Builds an in-memory xlsx whose first sheet holds `rows`.
pub fn workbook_bytes(rows: &[Vec<Cell>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            match cell {
                Cell::Text(s) => {
                    sheet.write_string(r, c, *s).unwrap();
                }
                Cell::Number(n) => {
                    sheet.write_number(r, c, *n).unwrap();
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, *b).unwrap();
                }
                Cell::Blank => {}
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Two regions with totals, the fixture most tests upload.
pub fn sales_workbook() -> Vec<u8> {
    workbook_bytes(&[
        vec![Cell::Text("Region"), Cell::Text("Total")],
        vec![Cell::Text("North"), Cell::Number(120.0)],
        vec![Cell::Text("South"), Cell::Number(80.5)],
    ])
}
