//! Book catalog service

use serde_json::Value;

use crate::{
    error::AppResult,
    models::book::{Book, BookFilter, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        self.repository.books.find_all(filter).await
    }

    pub async fn get(&self, isbn: &str) -> AppResult<Book> {
        self.repository.books.find_one(isbn).await
    }

    /// Validate a create body and insert the book
    pub async fn create(&self, body: &Value) -> AppResult<Book> {
        let book = CreateBook::parse(body).map_err(|e| {
            tracing::warn!("Rejected book creation: {}", e);
            e
        })?;
        let created = self.repository.books.create(&book).await?;
        tracing::info!(isbn = %created.isbn, "Book created");
        Ok(created)
    }

    /// Validate an update body and apply it
    pub async fn update(&self, isbn: &str, body: &Value) -> AppResult<Book> {
        let data = UpdateBook::parse(body).map_err(|e| {
            tracing::warn!(isbn, "Rejected book update: {}", e);
            e
        })?;
        let updated = self.repository.books.update(isbn, &data).await?;
        tracing::info!(isbn, "Book updated");
        Ok(updated)
    }

    pub async fn delete(&self, isbn: &str) -> AppResult<()> {
        self.repository.books.remove(isbn).await?;
        tracing::info!(isbn, "Book deleted");
        Ok(())
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
