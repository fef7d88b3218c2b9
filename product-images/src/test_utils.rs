//! Test constructors: an in-memory product table, in-memory storage and a test server wired with
//! the real router.

use crate::config::{Config, StorageBackendConfig};
use crate::db::errors::{DbError, Result as DbResult};
use crate::db::handlers::ProductStore;
use crate::db::models::products::ProductImage;
use crate::storage::MemoryStorage;
use crate::types::ProductId;
use crate::{AppState, Application};
use axum_test::TestServer;
use std::sync::{Arc, Mutex};
use url::Url;

/// [`ProductStore`] over a `Vec`, keeping insertion order like a heap table scan.
#[derive(Clone, Default)]
pub struct MemoryProductStore {
    rows: Arc<Mutex<Vec<ProductImage>>>,
    failure: Arc<Mutex<Option<String>>>,
    update_count: Arc<Mutex<usize>>,
}

impl MemoryProductStore {
    pub fn with_products(rows: &[(ProductId, Option<&str>)]) -> Self {
        let store = Self::default();
        *store.rows.lock().unwrap() = rows
            .iter()
            .map(|(id, imagen)| ProductImage {
                id_producto: *id,
                imagen: imagen.map(str::to_string),
            })
            .collect();
        store
    }

    /// Make every following query fail as if the database returned this error
    pub fn fail_queries(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap() = Some(message.into());
    }

    /// `None` if the product does not exist, `Some(None)` if it has no image
    pub fn image_of(&self, id: ProductId) -> Option<Option<String>> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.id_producto == id)
            .map(|row| row.imagen.clone())
    }

    pub fn rows(&self) -> Vec<(ProductId, Option<String>)> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .map(|row| (row.id_producto, row.imagen.clone()))
            .collect()
    }

    /// Number of update attempts, including ones that matched no row
    pub fn update_count(&self) -> usize {
        *self.update_count.lock().unwrap()
    }

    fn check_failure(&self) -> DbResult<()> {
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(DbError::Other(anyhow::anyhow!(message.clone()))),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ProductStore for MemoryProductStore {
    async fn list_images(&self) -> DbResult<Vec<ProductImage>> {
        self.check_failure()?;
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn update_image_url(&self, id: ProductId, url: &str) -> DbResult<u64> {
        *self.update_count.lock().unwrap() += 1;
        self.check_failure()?;

        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for row in rows.iter_mut().filter(|row| row.id_producto == id) {
            row.imagen = Some(url.to_string());
            affected += 1;
        }
        Ok(affected)
    }
}

pub fn test_storage() -> MemoryStorage {
    MemoryStorage::new(Url::parse("http://localhost:3000/media").unwrap(), "productos".to_string())
}

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    };
    config.storage.backend = StorageBackendConfig::Memory {
        base_url: Url::parse("http://localhost:3000/media").unwrap(),
    };
    config.database.pool.max_connections = 1;
    config
}

pub fn create_test_app(products: MemoryProductStore, storage: MemoryStorage) -> TestServer {
    create_test_app_with_config(create_test_config(), products, storage)
}

pub fn create_test_app_with_config(config: Config, products: MemoryProductStore, storage: MemoryStorage) -> TestServer {
    let state = AppState::builder()
        .products(Arc::new(products))
        .storage(Arc::new(storage))
        .config(config)
        .build();

    Application::with_state(state)
        .expect("Failed to create application")
        .into_test_server()
}
